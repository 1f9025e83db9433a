use std::sync::Arc;

use alloy_core::primitives::{Address, U256};

use crate::{
    contract::{Arg, ContractId, ContractSpec},
    error::DeployError,
    gateway::{CallRequest, ChainGateway, InstantiateRequest, Receipt},
    mirror::MirrorQueue,
    registry::AddressRegistry,
    step::CallSpec,
};

/// Gas limit attached to every action unless configured otherwise.
pub const DEFAULT_COST_CEILING: u64 = 10_000_000;

/// A contract instance confirmed on chain and recorded in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedContract {
    pub name: String,
    pub contract: ContractId,
    pub address: Address,
    pub receipt: Receipt,
}

/// Performs single on-chain actions against one network.
///
/// Every address is resolved through the registry at the moment it is needed and
/// every new instance is written back before the action returns.
#[derive(Debug)]
pub struct Deployer<G> {
    registry: Arc<AddressRegistry>,
    network: String,
    gateway: G,
    mirror: MirrorQueue,
    cost_ceiling: u64,
}

impl<G: ChainGateway> Deployer<G> {
    pub fn new(registry: Arc<AddressRegistry>, network: impl Into<String>, gateway: G) -> Self {
        Self {
            registry,
            network: network.into(),
            gateway,
            mirror: MirrorQueue::disabled(),
            cost_ceiling: DEFAULT_COST_CEILING,
        }
    }

    pub fn with_mirror(mut self, mirror: MirrorQueue) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_cost_ceiling(mut self, cost_ceiling: u64) -> Self {
        self.cost_ceiling = cost_ceiling;
        self
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn mirror(&self) -> &MirrorQueue {
        &self.mirror
    }

    /// Look up a name that must already be recorded for the active network.
    pub fn resolve(&self, name: &str) -> Result<Address, DeployError> {
        self.registry.resolve(&self.network, name)
    }

    /// Instantiate `spec` and record the new address under `name`.
    ///
    /// Dependencies are resolved before anything is submitted. If the gateway fails,
    /// the registry is left untouched. If recording fails, the error carries the new
    /// address.
    pub async fn deploy(
        &self,
        name: &str,
        spec: &ContractSpec,
    ) -> Result<DeployedContract, DeployError> {
        let resolved = spec.resolve(|dependency| self.resolve(dependency))?;

        tracing::info!(name, contract = %spec.contract, "Deploying contract...");

        let deployment = self
            .gateway
            .instantiate(InstantiateRequest::new(resolved, self.cost_ceiling))
            .await
            .map_err(|e| DeployError::DeploymentFailed {
                name: name.to_string(),
                source: e.into(),
            })?;

        let previous = self
            .registry
            .write(&self.network, name, deployment.address)
            .map_err(|e| {
                tracing::error!(
                    name,
                    address = %deployment.address,
                    tx_hash = %deployment.receipt.transaction_hash,
                    error = %e,
                    "Contract deployed but not recorded"
                );
                DeployError::Unrecorded {
                    name: name.to_string(),
                    address: deployment.address,
                    transaction_hash: deployment.receipt.transaction_hash,
                    source: Box::new(e),
                }
            })?;
        if let Some(previous) = previous
            && previous != deployment.address
        {
            tracing::warn!(
                name,
                previous = %previous,
                address = %deployment.address,
                "Registry entry overwritten, the previous instance is orphaned"
            );
        }

        tracing::info!(
            name,
            address = %deployment.address,
            tx_hash = %deployment.receipt.transaction_hash,
            gas_used = deployment.receipt.gas_used,
            "Contract deployed"
        );

        self.mirror.submit(spec.contract.name(), deployment.address);

        Ok(DeployedContract {
            name: name.to_string(),
            contract: spec.contract.clone(),
            address: deployment.address,
            receipt: deployment.receipt,
        })
    }

    /// Invoke a method on the contract recorded under `call.target`.
    pub async fn call(&self, call: &CallSpec) -> Result<Receipt, DeployError> {
        let to = self.resolve(&call.target)?;
        self.call_address(&call.target, to, &call.signature, &call.args, call.value)
            .await
    }

    /// Invoke a method on a literal address. `name` identifies the action in errors.
    pub async fn call_address(
        &self,
        name: &str,
        to: Address,
        signature: &str,
        args: &[Arg],
        value: U256,
    ) -> Result<Receipt, DeployError> {
        let mut lookup = |dependency: &str| self.resolve(dependency);
        let args = args
            .iter()
            .map(|arg| arg.resolve(&mut lookup))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(name, to = %to, method = signature, "Sending transaction...");

        let receipt = self
            .gateway
            .call(CallRequest {
                to,
                signature: signature.to_string(),
                args,
                value,
                cost_ceiling: self.cost_ceiling,
            })
            .await
            .map_err(|e| DeployError::DeploymentFailed {
                name: name.to_string(),
                source: e.into(),
            })?;

        tracing::info!(
            name,
            method = signature,
            tx_hash = %receipt.transaction_hash,
            "Transaction confirmed"
        );
        Ok(receipt)
    }
}
