//! Per-network registry of deployed contract addresses.
//!
//! The registry maps a logical contract name to the address it was deployed at,
//! separately for every network. It is the only place addresses are kept: steps,
//! the verifier and the applicator all re-resolve through it.

mod backend;

use std::{collections::BTreeMap, path::PathBuf, str::FromStr, sync::Mutex};

use alloy_core::primitives::Address;

pub use backend::{FileBackend, MemoryBackend, RegistryBackend};

use crate::error::DeployError;

/// The addresses recorded for one network, keyed by logical name.
pub type RegistryRecord = BTreeMap<String, Address>;

/// Name to address store backed by a [`RegistryBackend`].
///
/// Writes are read-modify-write merges of the full per-network record, serialized
/// within the process. Nothing guards against two processes writing the same
/// network at once.
pub struct AddressRegistry {
    backend: Box<dyn RegistryBackend>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for AddressRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressRegistry").finish_non_exhaustive()
    }
}

impl AddressRegistry {
    pub fn new(backend: impl RegistryBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            write_lock: Mutex::new(()),
        }
    }

    /// A registry persisted as `<dir>/<network>.json`.
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(dir))
    }

    /// A registry that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Load the full record for a network. A network never written is empty.
    pub fn entries(&self, network: &str) -> Result<RegistryRecord, DeployError> {
        let raw = self
            .backend
            .load(network)
            .map_err(|e| DeployError::RegistryStorage {
                network: network.to_string(),
                source: e.into(),
            })?;

        match raw {
            Some(raw) => parse_record(network, &raw),
            None => Ok(RegistryRecord::new()),
        }
    }

    /// Look up a name. Absence is not an error here.
    pub fn read(&self, network: &str, name: &str) -> Result<Option<Address>, DeployError> {
        Ok(self.entries(network)?.get(name).copied())
    }

    /// Look up a name that must be present.
    pub fn resolve(&self, network: &str, name: &str) -> Result<Address, DeployError> {
        self.read(network, name)?
            .ok_or_else(|| DeployError::unresolved(network, name))
    }

    /// Record `address` under `name`, returning the address it replaced.
    ///
    /// Other names of the same network are preserved. The write is durable
    /// once this returns.
    pub fn write(
        &self,
        network: &str,
        name: &str,
        address: Address,
    ) -> Result<Option<Address>, DeployError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut record = self.entries(network)?;
        let previous = record.insert(name.to_string(), address);

        let contents = render_record(&record);
        self.backend
            .store(network, &contents)
            .map_err(|e| DeployError::RegistryStorage {
                network: network.to_string(),
                source: e.into(),
            })?;

        tracing::debug!(network, name, address = %address, "Registry entry written");
        Ok(previous)
    }
}

fn parse_record(network: &str, raw: &str) -> Result<RegistryRecord, DeployError> {
    let corrupt = |source: crate::error::BoxError| DeployError::RegistryCorrupt {
        network: network.to_string(),
        source,
    };

    let entries: BTreeMap<String, String> =
        serde_json::from_str(raw).map_err(|e| corrupt(e.into()))?;

    entries
        .into_iter()
        .map(|(name, value)| {
            Address::from_str(&value)
                .map(|address| (name.clone(), address))
                .map_err(|e| corrupt(format!("invalid address {value:?} for {name}: {e}").into()))
        })
        .collect()
}

fn render_record(record: &RegistryRecord) -> String {
    let document: BTreeMap<&str, String> = record
        .iter()
        .map(|(name, address)| (name.as_str(), address.to_checksum(None)))
        .collect();

    // A map of strings always serializes.
    serde_json::to_string_pretty(&document).unwrap_or_default()
}
