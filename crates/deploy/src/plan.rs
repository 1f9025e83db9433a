//! Ordered deployment plans and their pre-flight validation.

use std::collections::HashSet;

use crate::{error::DeployError, registry::RegistryRecord, step::Step};

/// An ordered sequence of steps.
///
/// The order must be a topological order of the dependencies between steps: a step
/// reading a name must come after the step writing it. [`Plan::validate`] checks this
/// before anything is sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append the steps of another plan.
    pub fn extend(mut self, other: Plan) -> Self {
        self.steps.extend(other.steps);
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the step with the given label.
    pub fn position(&self, label: &str) -> Result<usize, DeployError> {
        self.steps
            .iter()
            .position(|step| step.label == label)
            .ok_or_else(|| DeployError::UnknownStep(label.to_string()))
    }

    /// Check that every dependency of the steps from `start` on is satisfied in order.
    ///
    /// A dependency is satisfied if it is already in `existing` or written by an
    /// earlier step at or after `start`. Steps before `start` are not run, so their
    /// writes do not count.
    pub fn validate(
        &self,
        network: &str,
        existing: &RegistryRecord,
        start: usize,
    ) -> Result<(), DeployError> {
        let steps = self.steps.get(start..).unwrap_or_default();
        let mut available: HashSet<&str> = existing.keys().map(String::as_str).collect();

        for (index, step) in steps.iter().enumerate() {
            for name in step.dependencies() {
                if available.contains(name) {
                    continue;
                }

                let written_by = steps[index + 1..]
                    .iter()
                    .find(|later| later.writes() == Some(name))
                    .map(|writer| writer.label.clone());

                return Err(DeployError::UnresolvedDependency {
                    network: network.to_string(),
                    name: name.to_string(),
                    written_by,
                }
                .in_step(step.label.clone()));
            }

            if let Some(name) = step.writes() {
                available.insert(name);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::Address;

    use super::*;
    use crate::{
        contract::{Arg, ContractSpec},
        step::CallSpec,
    };

    fn deploy_factory() -> Step {
        Step::deploy(
            "DEPLOY_FACTORY",
            "Factory",
            ContractSpec::new("contracts/core/Factory.sol:Factory"),
        )
    }

    fn configure_factory() -> Step {
        Step::call(
            "CONFIGURE_FACTORY",
            CallSpec::new("Factory", "enableFeeAmount(uint24,int24)")
                .arg(Arg::uint(100, 24))
                .arg(Arg::int(1, 24)),
        )
    }

    #[test]
    fn test_valid_order() {
        let plan = Plan::new("core")
            .step(deploy_factory())
            .step(configure_factory());

        plan.validate("testnet", &RegistryRecord::new(), 0).unwrap();
    }

    #[test]
    fn test_read_before_later_write_names_the_writer() {
        let plan = Plan::new("core")
            .step(configure_factory())
            .step(deploy_factory());

        let err = plan
            .validate("testnet", &RegistryRecord::new(), 0)
            .unwrap_err();

        assert_eq!(err.step(), Some("CONFIGURE_FACTORY"));
        assert!(matches!(
            err.root(),
            DeployError::UnresolvedDependency { name, written_by: Some(writer), .. }
                if name == "Factory" && writer == "DEPLOY_FACTORY"
        ));
    }

    #[test]
    fn test_missing_dependency_is_unresolved() {
        let plan = Plan::new("router").step(Step::deploy(
            "DEPLOY_ROUTER",
            "Router",
            ContractSpec::new("contracts/Router.sol:Router").arg(Arg::registry("WETH")),
        ));

        let err = plan
            .validate("testnet", &RegistryRecord::new(), 0)
            .unwrap_err();
        assert!(matches!(
            err.root(),
            DeployError::UnresolvedDependency { name, written_by: None, .. } if name == "WETH"
        ));
    }

    #[test]
    fn test_existing_entries_satisfy_dependencies() {
        let plan = Plan::new("core").step(configure_factory());
        let existing = RegistryRecord::from([("Factory".to_string(), Address::repeat_byte(0xaa))]);

        plan.validate("testnet", &existing, 0).unwrap();
    }

    #[test]
    fn test_skipped_steps_do_not_provide_names() {
        let plan = Plan::new("core")
            .step(deploy_factory())
            .step(configure_factory());

        let err = plan
            .validate("testnet", &RegistryRecord::new(), 1)
            .unwrap_err();
        assert!(matches!(
            err.root(),
            DeployError::UnresolvedDependency { name, .. } if name == "Factory"
        ));
    }

    #[test]
    fn test_position_of_unknown_label() {
        let plan = Plan::new("core").step(deploy_factory());

        assert_eq!(plan.position("DEPLOY_FACTORY").unwrap(), 0);
        assert!(matches!(
            plan.position("DEPLOY_NOTHING"),
            Err(DeployError::UnknownStep(label)) if label == "DEPLOY_NOTHING"
        ));
    }
}
