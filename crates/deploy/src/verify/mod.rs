//! Source verification of recorded contracts.
//!
//! Constructor arguments are re-derived from the same [`ContractSpec`] used at
//! deployment time, so the encoding is byte-identical to what was deployed.

mod etherscan;

use std::sync::Arc;

use alloy_core::primitives::Address;

pub use etherscan::{EtherscanConfig, EtherscanVerifier};

use crate::{
    contract::{ContractId, ContractSpec},
    error::{DeployError, VerificationFailure},
    plan::Plan,
    registry::AddressRegistry,
    step::StepAction,
};

/// Successful outcomes of a verification submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    AlreadyVerified,
}

/// Everything a verification service needs about one deployed instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub address: Address,
    pub contract: ContractId,
    /// Linked library addresses.
    pub libraries: Vec<(ContractId, Address)>,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Vec<u8>,
}

/// An external source verification backend, typically a block explorer.
#[async_trait::async_trait]
pub trait VerificationService: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> anyhow::Result<VerificationStatus>;
}

/// A contract to verify: its registry name and how it was constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationEntry {
    pub name: String,
    pub spec: ContractSpec,
}

impl VerificationEntry {
    pub fn new(name: impl Into<String>, spec: ContractSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }

    /// One entry per deploy step of the plan, in plan order.
    pub fn from_plan(plan: &Plan) -> Vec<Self> {
        plan.steps
            .iter()
            .filter_map(|step| match &step.action {
                StepAction::Deploy { name, spec } => Some(Self::new(name.clone(), spec.clone())),
                StepAction::Call(_) => None,
            })
            .collect()
    }
}

/// Outcome of a verification pass.
#[derive(Debug, Default)]
pub struct VerificationReport {
    pub verified: Vec<String>,
    pub already_verified: Vec<String>,
    pub failures: Vec<VerificationFailure>,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn collected failures into a single [`DeployError::VerificationFailed`].
    pub fn into_result(self) -> Result<(), DeployError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(DeployError::VerificationFailed {
                failures: self.failures,
            })
        }
    }
}

/// Submits every entry to a [`VerificationService`], collecting failures.
#[derive(Debug)]
pub struct Verifier<S> {
    registry: Arc<AddressRegistry>,
    network: String,
    service: S,
}

impl<S: VerificationService> Verifier<S> {
    pub fn new(registry: Arc<AddressRegistry>, network: impl Into<String>, service: S) -> Self {
        Self {
            registry,
            network: network.into(),
            service,
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Verify every entry in order. One entry failing does not stop the others.
    ///
    /// Only a corrupt or unreadable registry aborts the pass.
    pub async fn verify_all(
        &self,
        entries: &[VerificationEntry],
    ) -> Result<VerificationReport, DeployError> {
        self.registry.entries(&self.network)?;

        let mut report = VerificationReport::default();
        for entry in entries {
            tracing::info!(name = %entry.name, contract = %entry.spec.contract, "Verifying contract...");

            let request = match self.request_for(entry) {
                Ok(request) => request,
                Err(err) => {
                    tracing::warn!(name = %entry.name, error = %err, "Cannot verify contract");
                    report.failures.push(VerificationFailure {
                        name: entry.name.clone(),
                        address: None,
                        error: err.into(),
                    });
                    continue;
                }
            };

            match self.service.verify(&request).await {
                Ok(VerificationStatus::Verified) => {
                    tracing::info!(name = %entry.name, address = %request.address, "Contract verified");
                    report.verified.push(entry.name.clone());
                }
                Ok(VerificationStatus::AlreadyVerified) => {
                    tracing::info!(name = %entry.name, address = %request.address, "Contract already verified");
                    report.already_verified.push(entry.name.clone());
                }
                Err(err) => {
                    tracing::warn!(
                        name = %entry.name,
                        address = %request.address,
                        error = %format!("{err:#}"),
                        "Verification failed"
                    );
                    report.failures.push(VerificationFailure {
                        name: entry.name.clone(),
                        address: Some(request.address),
                        error: err.into(),
                    });
                }
            }
        }

        tracing::info!(
            verified = report.verified.len(),
            already_verified = report.already_verified.len(),
            failed = report.failures.len(),
            "Verification pass complete"
        );
        Ok(report)
    }

    fn request_for(&self, entry: &VerificationEntry) -> Result<VerificationRequest, DeployError> {
        let address = self.registry.resolve(&self.network, &entry.name)?;
        let resolved = entry
            .spec
            .resolve(|name| self.registry.resolve(&self.network, name))?;

        Ok(VerificationRequest {
            address,
            constructor_args: resolved.encoded_args(),
            contract: resolved.contract,
            libraries: resolved.libraries,
        })
    }
}
