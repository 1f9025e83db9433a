use std::path::PathBuf;

use alloy_core::primitives::U256;
use clap::{ArgAction, Parser, Subcommand, builder::FalseyValueParser};
use rabbit_deploy::{PlanKind, RabbitConfig, catalog::names};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "rabbit")]
#[command(
    author,
    version,
    about = "Deploy, verify and register the RabbitSwap V3 contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "RABBIT_VERBOSITY", default_value_t = LevelFilter::INFO, global = true)]
    pub verbosity: LevelFilter,

    /// The network to target, e.g. `tomo-testnet`.
    ///
    /// If not provided, addresses are recorded in `metadata.json` and the local node is used.
    #[arg(short, long, env = "HARDHAT_NETWORK", global = true)]
    pub network: Option<String>,

    /// Private key of the deployer account.
    ///
    /// If not provided, the node's first unlocked account signs.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true, global = true)]
    pub private_key: Option<String>,

    /// Path to the configuration file. Defaults to `Rabbit.toml`.
    #[arg(long, alias = "conf", env = "RABBIT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Directory of the per-network address files.
    #[arg(long, global = true)]
    pub metadata_dir: Option<PathBuf>,

    /// Directory of the compiled contract artifacts.
    #[arg(long, global = true)]
    pub artifacts_dir: Option<PathBuf>,

    /// Label of the native currency shown by the position descriptor.
    #[arg(long, env = "nativeCurrencyLabel", global = true)]
    pub native_currency_label: Option<String>,

    /// Push deployed contracts to the configured index mirror.
    #[arg(
        long,
        env = "ETHERNAL_PUSH",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new(),
        global = true
    )]
    pub ethernal_push: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a deployment plan.
    Deploy {
        /// The plan to run.
        #[arg(long, default_value_t = PlanKind::Core)]
        plan: PlanKind,

        /// Label of the step to resume from. Earlier steps are not run.
        #[arg(long)]
        from: Option<String>,

        /// Deploy contracts again even if they are already recorded.
        ///
        /// The previously recorded instances are orphaned.
        #[arg(long, env = "RABBIT_REDEPLOY", default_value_t = false)]
        redeploy: bool,

        /// Validate the plan against the registry without sending anything.
        #[arg(long)]
        dry_run: bool,

        /// Send configuration calls even when their target contract was skipped.
        ///
        /// By default a call is only sent in the run that deployed its target.
        #[arg(long)]
        always_call: bool,
    },

    /// Verify the sources of a plan's contracts on the network's explorer.
    Verify {
        #[arg(long, default_value_t = PlanKind::Core)]
        plan: PlanKind,
    },

    /// Register deployed contracts with the fee registrar.
    Apply {
        /// Registry names of the contracts to register.
        #[arg(default_values = [names::NFT_POSITION_MANAGER, names::SWAP_ROUTER])]
        names: Vec<String>,

        /// Value attached to each application, in wei.
        #[arg(long)]
        value: Option<U256>,
    },

    /// Print the addresses recorded for the network.
    List,

    /// Print the accounts transactions are sent from.
    Signers,
}

impl Cli {
    /// Load the configuration and apply the command line overrides.
    pub fn load_config(&self) -> anyhow::Result<RabbitConfig> {
        let mut config = RabbitConfig::load(self.config.as_deref())?;

        if let Some(network) = &self.network {
            config.network = Some(network.clone());
        }
        if let Some(dir) = &self.metadata_dir {
            config.metadata_dir = dir.clone();
        }
        if let Some(dir) = &self.artifacts_dir {
            config.artifacts_dir = dir.clone();
        }
        if let Some(label) = &self.native_currency_label {
            config.native_currency_label = label.clone();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_deploy_arguments() {
        let cli = Cli::try_parse_from([
            "rabbit",
            "--network",
            "tomo-testnet",
            "deploy",
            "--plan",
            "swap-router-test",
            "--from",
            "DEPLOY_SWAP_ROUTER_TEST",
            "--dry-run",
            "--always-call",
        ])
        .unwrap();

        assert_eq!(cli.network.as_deref(), Some("tomo-testnet"));
        match cli.command {
            Command::Deploy {
                plan,
                from,
                dry_run,
                always_call,
                ..
            } => {
                assert_eq!(plan, PlanKind::SwapRouterTest);
                assert_eq!(from.as_deref(), Some("DEPLOY_SWAP_ROUTER_TEST"));
                assert!(dry_run);
                assert!(always_call);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_apply_defaults_to_periphery() {
        let cli = Cli::try_parse_from(["rabbit", "apply", "--value", "1000"]).unwrap();

        match cli.command {
            Command::Apply { names, value } => {
                assert_eq!(names, vec!["NFTPositionManager", "SwapRouter"]);
                assert_eq!(value, Some(U256::from(1000u64)));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
