//! Storage backends for the address registry.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Context;

use crate::fs::FsHandler;

/// Raw storage for per-network registry documents.
///
/// Backends only move bytes around; parsing and merging live in
/// [`AddressRegistry`](super::AddressRegistry).
pub trait RegistryBackend: Send + Sync {
    /// Load the raw document for a network, or `None` if nothing was stored yet.
    fn load(&self, network: &str) -> anyhow::Result<Option<String>>;

    /// Replace the raw document for a network. Must be durable on return.
    fn store(&self, network: &str, contents: &str) -> anyhow::Result<()>;
}

/// One pretty-printed JSON file per network: `<dir>/<network>.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the per-network files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file backing the given network.
    pub fn path_for(&self, network: &str) -> PathBuf {
        self.dir.join(format!("{network}.json"))
    }
}

impl RegistryBackend for FileBackend {
    fn load(&self, network: &str) -> anyhow::Result<Option<String>> {
        FsHandler::read_optional(&self.path_for(network))
    }

    fn store(&self, network: &str, contents: &str) -> anyhow::Result<()> {
        let path = self.path_for(network);
        FsHandler::write_durable(&path, contents)
            .with_context(|| format!("Failed to persist registry for {network}"))?;
        tracing::debug!(path = %path.display(), "Registry file written");
        Ok(())
    }
}

/// In-memory backend, mostly useful in tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a network with a raw document, which may be deliberately malformed.
    pub fn with_document(self, network: impl Into<String>, contents: impl Into<String>) -> Self {
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(network.into(), contents.into());
        self
    }

    /// The raw document currently stored for a network.
    pub fn document(&self, network: &str) -> Option<String> {
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(network)
            .cloned()
    }
}

impl RegistryBackend for MemoryBackend {
    fn load(&self, network: &str) -> anyhow::Result<Option<String>> {
        Ok(self.document(network))
    }

    fn store(&self, network: &str, contents: &str) -> anyhow::Result<()> {
        self.documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(network.to_string(), contents.to_string());
        Ok(())
    }
}

impl<T: RegistryBackend + ?Sized> RegistryBackend for std::sync::Arc<T> {
    fn load(&self, network: &str) -> anyhow::Result<Option<String>> {
        (**self).load(network)
    }

    fn store(&self, network: &str, contents: &str) -> anyhow::Result<()> {
        (**self).store(network, contents)
    }
}
