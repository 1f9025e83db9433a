//! Error taxonomy for deployment, verification and registry operations.

use alloy_core::primitives::{Address, B256};

/// Boxed error used as the cause of collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the deployment subsystem.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A step asked for an address that is not registered for the active network.
    ///
    /// `written_by` names the step of the same plan that would record the name, when
    /// that step is ordered after the reader.
    #[error(
        "address not found in registry for {name} (network {network}){}",
        later_writer(.written_by)
    )]
    UnresolvedDependency {
        network: String,
        name: String,
        written_by: Option<String>,
    },

    /// The chain gateway rejected or reverted an instantiation or a call.
    #[error("on-chain action for {name} failed")]
    DeploymentFailed {
        name: String,
        #[source]
        source: BoxError,
    },

    /// One or more entries of a verification pass failed.
    #[error("{} contract verification(s) failed: {}", .failures.len(), failure_names(.failures))]
    VerificationFailed { failures: Vec<VerificationFailure> },

    /// The persisted record for a network could not be parsed.
    #[error("registry record for network {network} is corrupt")]
    RegistryCorrupt {
        network: String,
        #[source]
        source: BoxError,
    },

    /// The registry backend could not be read or written.
    #[error("registry storage failed for network {network}")]
    RegistryStorage {
        network: String,
        #[source]
        source: BoxError,
    },

    /// A contract was deployed but its address could not be recorded.
    ///
    /// The instance exists on chain. Record `address` by hand before re-running, or
    /// the next run deploys it again.
    #[error("{name} was deployed at {address} (tx {transaction_hash}) but could not be recorded")]
    Unrecorded {
        name: String,
        address: Address,
        transaction_hash: B256,
        #[source]
        source: Box<DeployError>,
    },

    /// A resume point names a step that is not part of the plan.
    #[error("step {0} is not part of the plan")]
    UnknownStep(String),

    /// A literal argument could not be encoded.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A step of a plan failed; wraps the underlying cause.
    #[error("step {step} failed")]
    Step {
        step: String,
        #[source]
        source: Box<DeployError>,
    },
}

impl DeployError {
    pub fn unresolved(network: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnresolvedDependency {
            network: network.into(),
            name: name.into(),
            written_by: None,
        }
    }

    /// Wrap this error with the label of the step that produced it.
    pub fn in_step(self, step: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, unwrapping any step context.
    pub fn root(&self) -> &DeployError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// The label of the outermost failing step, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Step { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// A single failed entry of a verification pass.
#[derive(Debug)]
pub struct VerificationFailure {
    /// The metadata name of the contract.
    pub name: String,
    /// The resolved address, when resolution got that far.
    pub address: Option<Address>,
    /// The cause of the failure.
    pub error: BoxError,
}

fn later_writer(written_by: &Option<String>) -> String {
    written_by
        .as_ref()
        .map(|step| format!(", it is only written later by step {step}"))
        .unwrap_or_default()
}

fn failure_names(failures: &[VerificationFailure]) -> String {
    failures
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
