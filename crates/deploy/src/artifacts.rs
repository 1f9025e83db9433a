//! Loading of compiled contract artifacts.
//!
//! Artifacts follow the hardhat layout: `<dir>/<source path>/<Name>.json` holds the
//! creation bytecode and its library link references, and the sibling
//! `<Name>.dbg.json` points at the build-info file with the compiler input.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::contract::ContractId;

const ADDRESS_LEN: usize = 20;

/// A byte range of the creation code to be replaced by a library address.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LinkOffset {
    pub start: usize,
    pub length: usize,
}

/// The parts of a compilation artifact needed for deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub source_name: String,
    /// Hex creation code, possibly with unlinked library placeholders.
    pub bytecode: String,
    /// Source path -> library name -> offsets.
    #[serde(default)]
    pub link_references: BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>,
}

impl Artifact {
    /// Substitute library addresses into the creation code and decode it.
    ///
    /// Fails if a library referenced by the artifact was not provided.
    pub fn link(&self, libraries: &[(ContractId, Address)]) -> Result<Vec<u8>> {
        let mut code = self
            .bytecode
            .trim_start_matches("0x")
            .to_string();
        if !code.is_ascii() {
            anyhow::bail!("Bytecode of {} is not valid hex", self.contract_name);
        }

        for (source, names) in &self.link_references {
            for (name, offsets) in names {
                let address = libraries
                    .iter()
                    .find(|(id, _)| id.source_path() == source && id.name() == name)
                    .map(|(_, address)| *address)
                    .with_context(|| {
                        format!(
                            "Missing address for library {source}:{name} required by {}",
                            self.contract_name
                        )
                    })?;
                let replacement = hex::encode(address);

                for offset in offsets {
                    let range = offset
                        .start
                        .checked_mul(2)
                        .zip(offset.start.checked_add(ADDRESS_LEN).and_then(|e| e.checked_mul(2)))
                        .filter(|(_, end)| offset.length == ADDRESS_LEN && *end <= code.len());
                    let Some((begin, end)) = range else {
                        anyhow::bail!(
                            "Invalid link reference for {source}:{name} at byte {}",
                            offset.start
                        );
                    };
                    code.replace_range(begin..end, &replacement);
                }
            }
        }

        hex::decode(&code).with_context(|| {
            format!(
                "Bytecode of {} is not valid hex after linking",
                self.contract_name
            )
        })
    }
}

/// Compiler input and version for a contract, as needed by source verification.
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// e.g. `0.7.6+commit.7338295f`.
    pub solc_long_version: String,
    /// The standard-JSON compiler input.
    pub input: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildInfoFile {
    solc_long_version: String,
    input: Value,
}

/// Reads artifacts from a compilation output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The artifact file for a contract.
    pub fn artifact_path(&self, contract: &ContractId) -> PathBuf {
        self.dir
            .join(contract.source_path())
            .join(format!("{}.json", contract.name()))
    }

    fn debug_path(&self, contract: &ContractId) -> PathBuf {
        self.dir
            .join(contract.source_path())
            .join(format!("{}.dbg.json", contract.name()))
    }

    pub fn load(&self, contract: &ContractId) -> Result<Artifact> {
        let path = self.artifact_path(contract);
        read_json(&path).with_context(|| format!("Failed to load artifact for {contract}"))
    }

    /// Load the build info referenced by a contract's debug file.
    pub fn build_info(&self, contract: &ContractId) -> Result<BuildInfo> {
        let debug_path = self.debug_path(contract);
        let debug: DebugFile = read_json(&debug_path)?;

        let build_info_path = debug_path
            .parent()
            .context("Debug file must have a parent directory")?
            .join(&debug.build_info);
        let file: BuildInfoFile = read_json(&build_info_path)
            .with_context(|| format!("Failed to load build info for {contract}"))?;

        Ok(BuildInfo {
            solc_long_version: file.solc_long_version,
            input: file.input,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;
    use tempdir::TempDir;

    use super::*;

    const LIBRARY: &str = "contracts/periphery/libraries/NFTDescriptor.sol:NFTDescriptor";

    fn linked_artifact() -> Artifact {
        // 2 bytes of code, a 20 byte placeholder, 1 trailing byte.
        let placeholder = "__$cea9be979eee3d87fb124d6cbb244bb0b5$__";
        serde_json::from_value(serde_json::json!({
            "contractName": "NonfungibleTokenPositionDescriptor",
            "sourceName": "contracts/periphery/NonfungibleTokenPositionDescriptor.sol",
            "bytecode": format!("0x6080{placeholder}ff"),
            "linkReferences": {
                "contracts/periphery/libraries/NFTDescriptor.sol": {
                    "NFTDescriptor": [{ "start": 2, "length": 20 }]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_link_substitutes_library_address() {
        let library = address!("0x1111111111111111111111111111111111111111");
        let code = linked_artifact()
            .link(&[(ContractId::new(LIBRARY), library)])
            .unwrap();

        assert_eq!(code.len(), 23);
        assert_eq!(&code[..2], &[0x60, 0x80]);
        assert_eq!(&code[2..22], library.as_slice());
        assert_eq!(code[22], 0xff);
    }

    #[test]
    fn test_link_requires_every_library() {
        let err = linked_artifact().link(&[]).unwrap_err();
        assert!(err.to_string().contains("NFTDescriptor"));
    }

    #[test]
    fn test_link_rejects_out_of_range_offset() {
        let mut artifact = linked_artifact();
        artifact.link_references.values_mut().for_each(|names| {
            names.values_mut().for_each(|offsets| offsets[0].start = usize::MAX / 2)
        });

        let library = address!("0x1111111111111111111111111111111111111111");
        let err = artifact
            .link(&[(ContractId::new(LIBRARY), library)])
            .unwrap_err();
        assert!(err.to_string().contains("Invalid link reference"));
    }

    #[test]
    fn test_link_rejects_non_ascii_bytecode() {
        let mut artifact = linked_artifact();
        artifact.bytecode = format!("0x60é{}", &artifact.bytecode[6..]);

        let library = address!("0x1111111111111111111111111111111111111111");
        let err = artifact
            .link(&[(ContractId::new(LIBRARY), library)])
            .unwrap_err();
        assert!(err.to_string().contains("is not valid hex"));
    }

    #[test]
    fn test_load_and_build_info() {
        let temp_dir = TempDir::new("rabbit-artifacts").expect("Failed to create temp dir");
        let store = ArtifactStore::new(temp_dir.path());
        let id = ContractId::new("contracts/core/RabbitSwapV3Factory.sol:RabbitSwapV3Factory");

        let artifact_dir = temp_dir.path().join("contracts/core/RabbitSwapV3Factory.sol");
        std::fs::create_dir_all(&artifact_dir).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("build-info")).unwrap();

        std::fs::write(
            artifact_dir.join("RabbitSwapV3Factory.json"),
            r#"{"contractName":"RabbitSwapV3Factory","sourceName":"contracts/core/RabbitSwapV3Factory.sol","bytecode":"0x6080","linkReferences":{}}"#,
        )
        .unwrap();
        std::fs::write(
            artifact_dir.join("RabbitSwapV3Factory.dbg.json"),
            r#"{"_format":"hh-sol-dbg-1","buildInfo":"../../../build-info/abc.json"}"#,
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("build-info/abc.json"),
            r#"{"solcVersion":"0.7.6","solcLongVersion":"0.7.6+commit.7338295f","input":{"language":"Solidity"}}"#,
        )
        .unwrap();

        let artifact = store.load(&id).unwrap();
        assert_eq!(artifact.link(&[]).unwrap(), vec![0x60, 0x80]);

        let build_info = store.build_info(&id).unwrap();
        assert_eq!(build_info.solc_long_version, "0.7.6+commit.7338295f");
        assert_eq!(build_info.input["language"], "Solidity");
    }
}
