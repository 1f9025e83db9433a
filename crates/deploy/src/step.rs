//! Deployment steps: one on-chain action each.

use alloy_core::primitives::U256;

use crate::contract::{Arg, ContractSpec};

/// A method invocation on a contract already recorded in the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec {
    /// Registry name of the contract to call.
    pub target: String,
    /// Canonical method signature, e.g. `setFeeProtocolDefault(uint16,uint16)`.
    pub signature: String,
    pub args: Vec<Arg>,
    /// Native value attached to the call.
    pub value: U256,
}

impl CallSpec {
    pub fn new(target: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            signature: signature.into(),
            args: Vec::new(),
            value: U256::ZERO,
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Registry names read by this call: the target, then its arguments.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.target.as_str()).chain(self.args.iter().filter_map(Arg::dependency))
    }
}

/// What a step does.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Instantiate a contract and record it under `name`.
    Deploy { name: String, spec: ContractSpec },
    /// Invoke a method on a recorded contract.
    Call(CallSpec),
}

/// A labelled unit of a deployment plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub label: String,
    pub action: StepAction,
}

impl Step {
    pub fn deploy(label: impl Into<String>, name: impl Into<String>, spec: ContractSpec) -> Self {
        Self {
            label: label.into(),
            action: StepAction::Deploy {
                name: name.into(),
                spec,
            },
        }
    }

    pub fn call(label: impl Into<String>, call: CallSpec) -> Self {
        Self {
            label: label.into(),
            action: StepAction::Call(call),
        }
    }

    /// Registry names this step reads, in the order they are resolved.
    pub fn dependencies(&self) -> Vec<&str> {
        match &self.action {
            StepAction::Deploy { spec, .. } => spec.dependencies().collect(),
            StepAction::Call(call) => call.dependencies().collect(),
        }
    }

    /// The registry name this step writes, if any.
    pub fn writes(&self) -> Option<&str> {
        match &self.action {
            StepAction::Deploy { name, .. } => Some(name),
            StepAction::Call(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_step_reads_and_writes() {
        let step = Step::deploy(
            "DEPLOY_SWAP_ROUTER",
            "SwapRouter",
            ContractSpec::new("contracts/periphery/SwapRouter.sol:SwapRouter")
                .arg(Arg::registry("RabbitSwapV3Factory"))
                .arg(Arg::registry("WETH")),
        );

        assert_eq!(step.dependencies(), vec!["RabbitSwapV3Factory", "WETH"]);
        assert_eq!(step.writes(), Some("SwapRouter"));
    }

    #[test]
    fn test_call_step_reads_target_first() {
        let step = Step::call(
            "ADD_1BP_FEE_TIER",
            CallSpec::new("RabbitSwapV3Factory", "enableFeeAmount(uint24,int24)")
                .arg(Arg::uint(100, 24))
                .arg(Arg::int(1, 24)),
        );

        assert_eq!(step.dependencies(), vec!["RabbitSwapV3Factory"]);
        assert_eq!(step.writes(), None);
    }
}
