//! The boundary to the blockchain network.
//!
//! A [`ChainGateway`] submits one action at a time and only returns once the action
//! is confirmed (or has failed). Timeouts are the gateway's business.

mod provider;

use std::future::Future;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, U256},
};

pub use provider::{RpcGateway, RpcGatewayConfig, SignerMode};

use crate::contract::{ContractId, ResolvedSpec};

/// Confirmation of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
}

/// A confirmed contract instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub receipt: Receipt,
}

/// Request to create a contract instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstantiateRequest {
    pub contract: ContractId,
    /// Library addresses to link into the creation code.
    pub libraries: Vec<(ContractId, Address)>,
    pub args: Vec<DynSolValue>,
    /// Maximum gas the action may consume.
    pub cost_ceiling: u64,
}

impl InstantiateRequest {
    pub fn new(spec: ResolvedSpec, cost_ceiling: u64) -> Self {
        Self {
            contract: spec.contract,
            libraries: spec.libraries,
            args: spec.args,
            cost_ceiling,
        }
    }
}

/// Request to invoke a method on a deployed contract.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub to: Address,
    /// Canonical method signature, e.g. `enableFeeAmount(uint24,int24)`.
    pub signature: String,
    pub args: Vec<DynSolValue>,
    /// Native value attached to the call.
    pub value: U256,
    /// Maximum gas the action may consume.
    pub cost_ceiling: u64,
}

impl CallRequest {
    /// The calldata: 4-byte selector followed by the encoded arguments.
    pub fn calldata(&self) -> Vec<u8> {
        let selector = &alloy_core::primitives::keccak256(self.signature.as_bytes())[..4];
        let mut data = selector.to_vec();
        data.extend(crate::contract::encode_args(&self.args));
        data
    }
}

/// Submits actions to a network and waits for their confirmation.
pub trait ChainGateway: Send + Sync {
    /// Deploy a contract and wait until its creation is confirmed.
    fn instantiate(
        &self,
        request: InstantiateRequest,
    ) -> impl Future<Output = anyhow::Result<Deployment>> + Send;

    /// Send a transaction to a contract and wait until it is confirmed.
    fn call(&self, request: CallRequest) -> impl Future<Output = anyhow::Result<Receipt>> + Send;

    /// The accounts actions are sent from.
    fn signers(&self) -> impl Future<Output = anyhow::Result<Vec<Address>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calldata_appends_encoded_args() {
        let target = Address::repeat_byte(0x11);
        let request = CallRequest {
            to: Address::ZERO,
            signature: "apply(address)".to_string(),
            args: vec![DynSolValue::Address(target)],
            value: U256::ZERO,
            cost_ceiling: 0,
        };

        let data = request.calldata();
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[16..36], target.as_slice());
    }

    #[test]
    fn test_calldata_transfer_selector() {
        let request = CallRequest {
            to: Address::ZERO,
            signature: "transfer(address,uint256)".to_string(),
            args: vec![],
            value: U256::ZERO,
            cost_ceiling: 0,
        };

        assert_eq!(request.calldata(), hex::decode("a9059cbb").unwrap());
    }
}
