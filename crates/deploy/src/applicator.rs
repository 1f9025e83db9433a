//! One-shot registration of deployed contracts with an external registrar.

use alloy_core::primitives::{Address, U256, address};
use serde::{Deserialize, Serialize};

use crate::{
    contract::Arg,
    deployer::Deployer,
    error::DeployError,
    gateway::{ChainGateway, Receipt},
};

/// The VRC25 issuer that sponsors gas fees for registered contracts.
pub const DEFAULT_REGISTRAR: Address = address!("0x8c0faeb5c6bed2129b8674f262fd45c4e9468bee");

/// Registration entry point of the registrar.
pub const REGISTRAR_ENTRY_POINT: &str = "apply(address)";

/// 10 native tokens.
pub const DEFAULT_APPLY_VALUE: U256 = U256::from_limbs([10_000_000_000_000_000_000, 0, 0, 0]);

/// Which registrar to call and how much to attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarConfig {
    pub address: Address,
    /// Value attached to every application, in wei.
    pub value: U256,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_REGISTRAR,
            value: DEFAULT_APPLY_VALUE,
        }
    }
}

/// Applies recorded contracts to a registrar.
///
/// Registration is not idempotent from this side: applying twice sends two
/// transactions.
#[derive(Debug)]
pub struct Applicator<'a, G> {
    deployer: &'a Deployer<G>,
    registrar: RegistrarConfig,
}

impl<'a, G: ChainGateway> Applicator<'a, G> {
    pub fn new(deployer: &'a Deployer<G>, registrar: RegistrarConfig) -> Self {
        Self {
            deployer,
            registrar,
        }
    }

    /// Register the contract recorded under `name`.
    pub async fn apply(&self, name: &str) -> Result<Receipt, DeployError> {
        // Resolve first so nothing is sent for an unknown name.
        let target = self.deployer.resolve(name)?;

        tracing::info!(
            name,
            target = %target,
            registrar = %self.registrar.address,
            value = %self.registrar.value,
            "Applying contract to registrar..."
        );

        self.deployer
            .call_address(
                name,
                self.registrar.address,
                REGISTRAR_ENTRY_POINT,
                &[Arg::Address(target)],
                self.registrar.value,
            )
            .await
    }

    /// Apply every name in order, stopping at the first failure.
    pub async fn apply_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Receipt>, DeployError> {
        let mut receipts = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            receipts.push(self.apply(name).await.map_err(|e| e.in_step(name))?);
        }
        Ok(receipts)
    }
}
