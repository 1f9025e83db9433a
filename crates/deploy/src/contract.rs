//! Contract identifiers and constructor/call argument schemas.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, I256, U256},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// Fully qualified contract identifier: `<source path>:<contract name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[display("{_0}")]
pub struct ContractId(String);

impl ContractId {
    pub fn new(fully_qualified: impl Into<String>) -> Self {
        Self(fully_qualified.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The source file path, e.g. `contracts/core/RabbitSwapV3Factory.sol`.
    pub fn source_path(&self) -> &str {
        self.0.rsplit_once(':').map_or(self.0.as_str(), |(path, _)| path)
    }

    /// The bare contract name, e.g. `RabbitSwapV3Factory`.
    pub fn name(&self) -> &str {
        self.0.rsplit_once(':').map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl From<&str> for ContractId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One constructor or call argument.
///
/// [`Arg::Registry`] is the only variant that depends on chain state: it is looked up
/// in the address registry when the step runs, which makes it a dependency edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// The address registered under a logical name.
    Registry(String),
    Address(Address),
    /// An unsigned integer of the given bit width.
    Uint(U256, usize),
    /// A signed integer of the given bit width.
    Int(I256, usize),
    Bytes32(B256),
    Bytes(Bytes),
    String(String),
}

impl Arg {
    pub fn registry(name: impl Into<String>) -> Self {
        Self::Registry(name.into())
    }

    pub fn uint(value: u64, bits: usize) -> Self {
        Self::Uint(U256::from(value), bits)
    }

    pub fn int(value: i64, bits: usize) -> Self {
        Self::Int(I256::try_from(value).unwrap_or_default(), bits)
    }

    /// The registry name this argument reads, if any.
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::Registry(name) => Some(name),
            _ => None,
        }
    }

    /// Turn the argument into an ABI value, looking up registry references.
    pub fn resolve<F>(&self, lookup: &mut F) -> Result<DynSolValue, DeployError>
    where
        F: FnMut(&str) -> Result<Address, DeployError>,
    {
        Ok(match self {
            Self::Registry(name) => DynSolValue::Address(lookup(name)?),
            Self::Address(address) => DynSolValue::Address(*address),
            Self::Uint(value, bits) => DynSolValue::Uint(*value, *bits),
            Self::Int(value, bits) => DynSolValue::Int(*value, *bits),
            Self::Bytes32(word) => DynSolValue::FixedBytes(*word, 32),
            Self::Bytes(bytes) => DynSolValue::Bytes(bytes.to_vec()),
            Self::String(s) => DynSolValue::String(s.clone()),
        })
    }
}

/// A library that must be linked into a contract's bytecode before deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryLink {
    /// The library as it appears in the artifact's link references.
    pub library: ContractId,
    /// The registry name holding the deployed library address.
    pub name: String,
}

/// What to instantiate: the contract, its linked libraries and its constructor arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractSpec {
    pub contract: ContractId,
    pub libraries: Vec<LibraryLink>,
    pub args: Vec<Arg>,
}

impl ContractSpec {
    pub fn new(contract: impl Into<ContractId>) -> Self {
        Self {
            contract: contract.into(),
            libraries: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn link(mut self, library: impl Into<ContractId>, name: impl Into<String>) -> Self {
        self.libraries.push(LibraryLink {
            library: library.into(),
            name: name.into(),
        });
        self
    }

    /// Registry names read by this spec, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.libraries
            .iter()
            .map(|link| link.name.as_str())
            .chain(self.args.iter().filter_map(Arg::dependency))
    }

    /// Resolve libraries and arguments against the registry.
    pub fn resolve<F>(&self, mut lookup: F) -> Result<ResolvedSpec, DeployError>
    where
        F: FnMut(&str) -> Result<Address, DeployError>,
    {
        let libraries = self
            .libraries
            .iter()
            .map(|link| Ok((link.library.clone(), lookup(&link.name)?)))
            .collect::<Result<Vec<_>, DeployError>>()?;

        let args = self
            .args
            .iter()
            .map(|arg| arg.resolve(&mut lookup))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedSpec {
            contract: self.contract.clone(),
            libraries,
            args,
        })
    }
}

/// A [`ContractSpec`] with every registry reference replaced by an address.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSpec {
    pub contract: ContractId,
    pub libraries: Vec<(ContractId, Address)>,
    pub args: Vec<DynSolValue>,
}

impl ResolvedSpec {
    /// The ABI-encoded constructor arguments, as appended to the creation code.
    pub fn encoded_args(&self) -> Vec<u8> {
        encode_args(&self.args)
    }
}

/// ABI-encode a list of values as a parameter tuple.
pub fn encode_args(args: &[DynSolValue]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(args.to_vec()).abi_encode_params()
}

/// Encode a short ASCII label as a right-padded `bytes32`.
pub fn label_to_bytes32(label: &str) -> Result<B256, DeployError> {
    if label.len() > 32 || !label.is_ascii() {
        return Err(DeployError::InvalidArgument(format!(
            "label {label:?} must be ASCII and at most 32 characters"
        )));
    }

    let mut word = [0u8; 32];
    word[..label.len()].copy_from_slice(label.as_bytes());
    Ok(B256::from(word))
}
