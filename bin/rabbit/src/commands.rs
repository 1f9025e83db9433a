use std::{str::FromStr, sync::Arc};

use alloy_core::primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context as _;
use comfy_table::Table;
use rabbit_deploy::{
    AddressRegistry, Applicator, ArtifactStore, Deployer, EtherscanVerifier, HttpMirror,
    MirrorQueue, Orchestrator, PlanKind, RabbitConfig, RpcGateway, RunOptions, RunReport,
    SignerMode, StepOutcome, VerificationEntry, Verifier,
    gateway::{CallRequest, ChainGateway, Deployment, InstantiateRequest, Receipt},
};

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub config: RabbitConfig,
    pub private_key: Option<String>,
    pub ethernal_push: bool,
}

impl Context {
    fn registry(&self) -> Arc<AddressRegistry> {
        Arc::new(self.config.registry())
    }

    fn artifacts(&self) -> ArtifactStore {
        ArtifactStore::new(&self.config.artifacts_dir)
    }

    fn signer(&self) -> anyhow::Result<SignerMode> {
        match &self.private_key {
            Some(key) => Ok(SignerMode::Local(
                PrivateKeySigner::from_str(key).context("Invalid private key")?,
            )),
            None => Ok(SignerMode::Node),
        }
    }

    async fn gateway(&self) -> anyhow::Result<RpcGateway> {
        RpcGateway::connect(self.config.gateway_config()?, self.artifacts(), self.signer()?).await
    }

    fn mirror(&self) -> anyhow::Result<MirrorQueue> {
        if !self.ethernal_push {
            return Ok(MirrorQueue::disabled());
        }

        match &self.config.mirror {
            Some(mirror) => Ok(MirrorQueue::new(Arc::new(HttpMirror::new(mirror.clone())?))),
            None => {
                tracing::warn!("Index push requested but no mirror is configured, skipping pushes");
                Ok(MirrorQueue::disabled())
            }
        }
    }

    async fn deployer(&self) -> anyhow::Result<Deployer<RpcGateway>> {
        Ok(Deployer::new(
            self.registry(),
            self.config.network_id(),
            self.gateway().await?,
        )
        .with_mirror(self.mirror()?)
        .with_cost_ceiling(self.config.cost_ceiling))
    }
}

pub async fn deploy(ctx: &Context, plan: PlanKind, options: RunOptions) -> anyhow::Result<()> {
    let plan = plan.plan(&ctx.config.catalog_params())?;

    let report = if options.dry_run {
        // Nothing is sent, so no connection is needed.
        let deployer = Deployer::new(ctx.registry(), ctx.config.network_id(), Offline);
        Orchestrator::new(deployer).run(&plan, &options).await?
    } else {
        Orchestrator::new(ctx.deployer().await?)
            .run(&plan, &options)
            .await?
    };

    println!("{}", report_table(&report));
    Ok(())
}

pub async fn verify(ctx: &Context, plan: PlanKind) -> anyhow::Result<()> {
    let plan = plan.plan(&ctx.config.catalog_params())?;
    let network = ctx.config.network_config()?;
    let explorer = network
        .explorer
        .clone()
        .with_context(|| format!("No explorer configured for network {}", ctx.config.network_id()))?;

    let verifier = Verifier::new(
        ctx.registry(),
        ctx.config.network_id(),
        EtherscanVerifier::new(explorer, ctx.artifacts())?,
    );

    let report = verifier
        .verify_all(&VerificationEntry::from_plan(&plan))
        .await?;
    report.into_result()?;
    Ok(())
}

pub async fn apply(ctx: &Context, names: &[String], value: Option<U256>) -> anyhow::Result<()> {
    let mut registrar = ctx.config.registrar.clone();
    if let Some(value) = value {
        registrar.value = value;
    }

    let deployer = ctx.deployer().await?;
    let receipts = Applicator::new(&deployer, registrar)
        .apply_all(names)
        .await?;

    for (name, receipt) in names.iter().zip(receipts) {
        println!("{name}: {}", receipt.transaction_hash);
    }
    Ok(())
}

pub fn list(ctx: &Context) -> anyhow::Result<()> {
    let network = ctx.config.network_id();
    let entries = ctx.registry().entries(network)?;

    let mut table = Table::new();
    table.set_header(vec!["Name", "Address"]);
    for (name, address) in &entries {
        table.add_row(vec![name.clone(), address.to_checksum(None)]);
    }

    println!("Network: {network}");
    println!("{table}");
    Ok(())
}

pub async fn signers(ctx: &Context) -> anyhow::Result<()> {
    let gateway = ctx.gateway().await?;
    for signer in gateway.signers().await? {
        println!("{signer}");
    }
    Ok(())
}

fn report_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Step", "Outcome", "Detail"]);
    for step in &report.steps {
        let (outcome, detail) = match step.outcome {
            StepOutcome::Deployed(address) => ("deployed", address.to_string()),
            StepOutcome::Skipped(address) => ("skipped", address.to_string()),
            StepOutcome::Called(tx_hash) => ("called", tx_hash.to_string()),
            StepOutcome::CallSkipped => ("skipped", String::new()),
            StepOutcome::Planned => ("planned", String::new()),
        };
        table.add_row(vec![step.label.clone(), outcome.to_string(), detail]);
    }
    table
}

/// Gateway for dry runs. Any attempt to send is an error.
struct Offline;

impl ChainGateway for Offline {
    async fn instantiate(&self, request: InstantiateRequest) -> anyhow::Result<Deployment> {
        anyhow::bail!("Dry run cannot deploy {}", request.contract)
    }

    async fn call(&self, request: CallRequest) -> anyhow::Result<Receipt> {
        anyhow::bail!("Dry run cannot call {}", request.signature)
    }

    async fn signers(&self) -> anyhow::Result<Vec<Address>> {
        Ok(Vec::new())
    }
}
