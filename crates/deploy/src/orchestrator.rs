//! Sequential, fail-stop execution of deployment plans.

use std::collections::HashSet;

use alloy_core::primitives::{Address, B256};

use crate::{
    deployer::Deployer,
    error::DeployError,
    gateway::ChainGateway,
    plan::Plan,
    step::{Step, StepAction},
};

/// How a plan is run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Deploy again even if the name is already recorded, orphaning the old instance.
    pub redeploy: bool,
    /// Label of the first step to run. Earlier steps are not executed.
    pub from: Option<String>,
    /// Only validate the plan and report what would run.
    pub dry_run: bool,
    /// Send configuration calls even when their target was already deployed by an
    /// earlier run.
    pub always_call: bool,
}

/// What happened to one step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A new instance was deployed and recorded.
    Deployed(Address),
    /// The name was already recorded, nothing was submitted.
    Skipped(Address),
    /// A method call was confirmed in the given transaction.
    Called(B256),
    /// The call's target was skipped in this run, so the call was not sent again.
    CallSkipped,
    /// Dry run: the step would be executed.
    Planned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub label: String,
    pub outcome: StepOutcome,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub plan: String,
    pub network: String,
    pub steps: Vec<StepReport>,
    /// Number of deployments pushed to the index mirror.
    pub mirrored: usize,
}

impl RunReport {
    fn labels(&self, keep: impl Fn(&StepOutcome) -> bool) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| keep(&step.outcome))
            .map(|step| step.label.as_str())
            .collect()
    }

    pub fn deployed(&self) -> Vec<&str> {
        self.labels(|outcome| matches!(outcome, StepOutcome::Deployed(_)))
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.labels(|outcome| {
            matches!(outcome, StepOutcome::Skipped(_) | StepOutcome::CallSkipped)
        })
    }

    pub fn called(&self) -> Vec<&str> {
        self.labels(|outcome| matches!(outcome, StepOutcome::Called(_)))
    }
}

/// Runs plans one step at a time.
///
/// A step starts only once the previous one has been confirmed and recorded. The
/// first failure stops the run; whatever earlier steps recorded stays recorded.
#[derive(Debug)]
pub struct Orchestrator<G> {
    deployer: Deployer<G>,
}

impl<G: ChainGateway> Orchestrator<G> {
    pub fn new(deployer: Deployer<G>) -> Self {
        Self { deployer }
    }

    pub fn deployer(&self) -> &Deployer<G> {
        &self.deployer
    }

    pub async fn run(&self, plan: &Plan, options: &RunOptions) -> Result<RunReport, DeployError> {
        let network = self.deployer.network();
        let start = match &options.from {
            Some(label) => self.resume_position(plan, label)?,
            None => 0,
        };

        // Fails on a corrupt record before anything is submitted.
        let existing = self.deployer.registry().entries(network)?;
        plan.validate(network, &existing, start)?;

        tracing::info!(
            plan = %plan.name,
            network,
            steps = plan.len() - start,
            dry_run = options.dry_run,
            "Starting deployment plan..."
        );

        let mut report = RunReport {
            plan: plan.name.clone(),
            network: network.to_string(),
            ..Default::default()
        };

        let result = self.run_steps(plan, start, options, &mut report).await;

        report.mirrored = self.deployer.mirror().drain().await;
        result?;

        tracing::info!(
            plan = %plan.name,
            deployed = report.deployed().len(),
            skipped = report.skipped().len(),
            called = report.called().len(),
            "Deployment plan complete"
        );
        Ok(report)
    }

    fn resume_position(&self, plan: &Plan, label: &str) -> Result<usize, DeployError> {
        let start = plan.position(label)?;
        tracing::info!(from = label, skipped = start, "Resuming plan");
        Ok(start)
    }

    async fn run_steps(
        &self,
        plan: &Plan,
        start: usize,
        options: &RunOptions,
        report: &mut RunReport,
    ) -> Result<(), DeployError> {
        // Names whose deploy step found an existing record in this run.
        let mut skipped = HashSet::new();

        for step in &plan.steps[start..] {
            let outcome = self
                .run_step(step, options, &skipped)
                .await
                .map_err(|e| e.in_step(step.label.clone()))?;

            if let (StepOutcome::Skipped(_), StepAction::Deploy { name, .. }) =
                (outcome, &step.action)
            {
                skipped.insert(name.clone());
            }

            report.steps.push(StepReport {
                label: step.label.clone(),
                outcome,
            });
        }
        Ok(())
    }

    async fn run_step(
        &self,
        step: &Step,
        options: &RunOptions,
        skipped: &HashSet<String>,
    ) -> Result<StepOutcome, DeployError> {
        match &step.action {
            StepAction::Deploy { name, spec } => {
                if !options.redeploy {
                    let recorded = self
                        .deployer
                        .registry()
                        .read(self.deployer.network(), name)?;
                    if let Some(address) = recorded {
                        tracing::warn!(
                            step = %step.label,
                            name = %name,
                            address = %address,
                            "Already deployed, skipping"
                        );
                        return Ok(StepOutcome::Skipped(address));
                    }
                }

                if options.dry_run {
                    return Ok(StepOutcome::Planned);
                }

                let deployed = self.deployer.deploy(name, spec).await?;
                Ok(StepOutcome::Deployed(deployed.address))
            }
            StepAction::Call(call) => {
                if !options.always_call && skipped.contains(&call.target) {
                    tracing::warn!(
                        step = %step.label,
                        target = %call.target,
                        signature = %call.signature,
                        "Target already deployed, skipping call"
                    );
                    return Ok(StepOutcome::CallSkipped);
                }

                if options.dry_run {
                    return Ok(StepOutcome::Planned);
                }

                let receipt = self.deployer.call(call).await?;
                Ok(StepOutcome::Called(receipt.transaction_hash))
            }
        }
    }
}
