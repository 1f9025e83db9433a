//! Layered configuration: built-in defaults, then `Rabbit.toml`, then `RABBIT_*` env.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    applicator::RegistrarConfig,
    catalog::{CatalogParams, DEFAULT_NATIVE_CURRENCY_LABEL},
    deployer::DEFAULT_COST_CEILING,
    gateway::RpcGatewayConfig,
    mirror::MirrorConfig,
    registry::AddressRegistry,
    verify::EtherscanConfig,
};

/// The default name of the configuration file.
pub const CONFIG_FILENAME: &str = "Rabbit.toml";

/// Prefix of configuration environment variables. `__` separates nested keys.
pub const ENV_PREFIX: &str = "RABBIT_";

/// Network identifier used when none is selected. Its registry file is `metadata.json`.
pub const DEFAULT_NETWORK_ID: &str = "metadata";

/// The network whose RPC settings back [`DEFAULT_NETWORK_ID`].
pub const LOCALHOST: &str = "localhost";

/// Connection settings of one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Explorer used for source verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer: Option<EtherscanConfig>,
}

impl NetworkConfig {
    fn new(rpc_url: &str, chain_id: Option<u64>, explorer: Option<(&str, Option<&str>)>) -> Self {
        Self {
            rpc_url: parse_builtin_url(rpc_url),
            chain_id,
            explorer: explorer.map(|(api_url, api_key)| EtherscanConfig {
                api_url: parse_builtin_url(api_url),
                api_key: api_key.map(str::to_string),
            }),
        }
    }
}

fn parse_builtin_url(url: &str) -> Url {
    Url::parse(url).expect("built-in network URLs are valid")
}

fn builtin_networks() -> BTreeMap<String, NetworkConfig> {
    BTreeMap::from([
        (
            "tomo-mainnet".to_string(),
            NetworkConfig::new(
                "https://viction.blockpi.network/v1/rpc/public",
                Some(88),
                Some((
                    "https://www.vicscan.xyz/api/contract/hardhat/verify",
                    Some("tomoscan2023"),
                )),
            ),
        ),
        (
            "tomo-testnet".to_string(),
            NetworkConfig::new(
                "https://rpc-testnet.viction.xyz",
                Some(89),
                Some((
                    "https://scan-api-testnet.viction.xyz/api/contract/hardhat/verify",
                    Some("tomoscan2023"),
                )),
            ),
        ),
        (
            "arbitrumOne".to_string(),
            NetworkConfig::new(
                "https://arb1.arbitrum.io/rpc",
                Some(42161),
                Some(("https://api.arbiscan.io/api", None)),
            ),
        ),
        (
            "arbitrumSepolia".to_string(),
            NetworkConfig::new(
                "https://sepolia-rollup.arbitrum.io/rpc",
                Some(421614),
                Some(("https://api-sepolia.arbiscan.io/api", None)),
            ),
        ),
        (
            LOCALHOST.to_string(),
            NetworkConfig::new("http://127.0.0.1:8545", None, None),
        ),
    ])
}

/// Configuration of the deployment tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RabbitConfig {
    /// The selected network. `None` targets [`DEFAULT_NETWORK_ID`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Directory of the per-network address files.
    pub metadata_dir: PathBuf,
    /// Directory of the compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    /// Gas limit of every transaction.
    pub cost_ceiling: u64,
    pub native_currency_label: String,
    pub registrar: RegistrarConfig,
    /// Index mirror. Pushes only happen when this is set and the mirror is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<MirrorConfig>,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for RabbitConfig {
    fn default() -> Self {
        Self {
            network: None,
            networks: builtin_networks(),
            metadata_dir: PathBuf::from("metadata"),
            artifacts_dir: PathBuf::from("artifacts"),
            cost_ceiling: DEFAULT_COST_CEILING,
            native_currency_label: DEFAULT_NATIVE_CURRENCY_LABEL.to_string(),
            registrar: RegistrarConfig::default(),
            mirror: None,
            confirmation_timeout_secs: 300,
            poll_interval_ms: 1_000,
        }
    }
}

impl RabbitConfig {
    /// The configuration layers, lowest priority first.
    pub fn figment(path: Option<&Path>) -> Figment {
        let path = path.unwrap_or_else(|| Path::new(CONFIG_FILENAME));
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load from defaults, the TOML file (if present) and the environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config: Self = Self::figment(path)
            .extract()
            .context("Failed to load configuration")?;

        tracing::debug!(
            network = config.network_id(),
            metadata_dir = %config.metadata_dir.display(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Identifier of the active network, as used for the registry.
    pub fn network_id(&self) -> &str {
        self.network.as_deref().unwrap_or(DEFAULT_NETWORK_ID)
    }

    /// Connection settings of the active network.
    pub fn network_config(&self) -> anyhow::Result<&NetworkConfig> {
        let id = match self.network_id() {
            DEFAULT_NETWORK_ID => LOCALHOST,
            other => other,
        };
        self.networks.get(id).with_context(|| {
            format!(
                "Unknown network {id}, expected one of: {}",
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    /// The registry persisted under the metadata directory.
    pub fn registry(&self) -> AddressRegistry {
        AddressRegistry::file(&self.metadata_dir)
    }

    pub fn catalog_params(&self) -> CatalogParams {
        CatalogParams {
            native_currency_label: self.native_currency_label.clone(),
        }
    }

    pub fn gateway_config(&self) -> anyhow::Result<RpcGatewayConfig> {
        let network = self.network_config()?;
        Ok(RpcGatewayConfig {
            rpc_url: network.rpc_url.clone(),
            chain_id: network.chain_id,
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        })
    }
}
