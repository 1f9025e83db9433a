//! rabbit deploys, verifies and registers the RabbitSwap V3 contracts.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use commands::Context;
use rabbit_deploy::RunOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = cli.load_config()?;
    let ctx = Context {
        config,
        private_key: cli.private_key.clone(),
        ethernal_push: cli.ethernal_push,
    };

    let result = match cli.command {
        Command::Deploy {
            plan,
            from,
            redeploy,
            dry_run,
            always_call,
        } => {
            let options = RunOptions {
                redeploy,
                from,
                dry_run,
                always_call,
            };
            commands::deploy(&ctx, plan, options).await
        }
        Command::Verify { plan } => commands::verify(&ctx, plan).await,
        Command::Apply { names, value } => commands::apply(&ctx, &names, value).await,
        Command::List => commands::list(&ctx),
        Command::Signers => commands::signers(&ctx).await,
    };

    if let Err(err) = &result {
        tracing::error!(network = ctx.config.network_id(), error = %format!("{err:#}"), "Command failed");
    }
    result
}
