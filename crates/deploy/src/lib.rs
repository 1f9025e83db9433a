//! rabbit-deploy - Deployment library for the RabbitSwap V3 contracts.
//!
//! This crate runs ordered deployment plans against an EVM network, records every
//! deployed address in a per-network registry, verifies the deployed sources on
//! block explorers and registers contracts with the network's fee registrar.

pub mod applicator;
pub mod artifacts;
pub mod catalog;
pub mod config;
pub mod contract;
mod deployer;
pub mod error;
mod fs;
pub mod gateway;
pub mod mirror;
pub mod orchestrator;
pub mod plan;
pub mod registry;
mod rpc;
pub mod step;
#[cfg(test)]
mod testing;
pub mod verify;

pub use applicator::{Applicator, RegistrarConfig};
pub use artifacts::ArtifactStore;
pub use catalog::{CatalogParams, PlanKind};
pub use config::RabbitConfig;
pub use contract::{Arg, ContractId, ContractSpec};
pub use deployer::{DEFAULT_COST_CEILING, DeployedContract, Deployer};
pub use error::DeployError;
pub use gateway::{ChainGateway, RpcGateway, SignerMode};
pub use mirror::{HttpMirror, IndexMirror, MirrorQueue};
pub use orchestrator::{Orchestrator, RunOptions, RunReport, StepOutcome};
pub use plan::Plan;
pub use registry::AddressRegistry;
pub use step::{CallSpec, Step, StepAction};
pub use verify::{
    EtherscanVerifier, VerificationEntry, VerificationReport, VerificationService, Verifier,
};
