//! Verification through an Etherscan-compatible explorer API.

use std::time::Duration;

use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::{VerificationRequest, VerificationService, VerificationStatus};
use crate::artifacts::ArtifactStore;

/// Explorer API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtherscanConfig {
    pub api_url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl ApiResponse {
    fn result_text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("verification still pending")]
struct Pending;

fn is_already_verified(text: &str) -> bool {
    text.to_ascii_lowercase().contains("already verified")
}

/// Submits standard-JSON sources to an explorer and waits for the verdict.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    config: EtherscanConfig,
    artifacts: ArtifactStore,
    poll_interval: Duration,
    max_polls: usize,
}

impl EtherscanVerifier {
    pub fn new(config: EtherscanConfig, artifacts: ArtifactStore) -> anyhow::Result<Self> {
        Ok(Self {
            client: crate::rpc::create_client(crate::rpc::DEFAULT_REQUEST_TIMEOUT)?,
            config,
            artifacts,
            poll_interval: Duration::from_secs(5),
            max_polls: 24,
        })
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: usize) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self
    }

    /// The form fields of a `verifysourcecode` submission.
    fn submission(&self, request: &VerificationRequest) -> anyhow::Result<Vec<(&'static str, String)>> {
        let build_info = self.artifacts.build_info(&request.contract)?;

        let mut input = build_info.input;
        for (library, address) in &request.libraries {
            input["settings"]["libraries"][library.source_path()][library.name()] =
                Value::String(address.to_checksum(None));
        }

        let mut form = vec![
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_checksum(None)),
            ("sourceCode", serde_json::to_string(&input)?),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", request.contract.to_string()),
            ("compilerversion", format!("v{}", build_info.solc_long_version)),
            // Sic, the API expects this spelling.
            ("constructorArguements", hex::encode(&request.constructor_args)),
        ];
        if let Some(key) = &self.config.api_key {
            form.push(("apikey", key.clone()));
        }
        Ok(form)
    }

    async fn check_status(&self, guid: &str) -> anyhow::Result<VerificationStatus> {
        let mut query = vec![
            ("module", "contract"),
            ("action", "checkverifystatus"),
            ("guid", guid),
        ];
        if let Some(key) = &self.config.api_key {
            query.push(("apikey", key.as_str()));
        }

        let response: ApiResponse = self
            .client
            .get(self.config.api_url.clone())
            .query(&query)
            .send()
            .await
            .context("Failed to query verification status")?
            .json()
            .await
            .context("Failed to parse verification status")?;

        let text = response.result_text();
        if text.starts_with("Pending") {
            return Err(Pending.into());
        }
        if is_already_verified(&text) {
            return Ok(VerificationStatus::AlreadyVerified);
        }
        if response.status == "1" || text.starts_with("Pass") {
            return Ok(VerificationStatus::Verified);
        }
        anyhow::bail!("Verification failed: {text}")
    }
}

#[async_trait::async_trait]
impl VerificationService for EtherscanVerifier {
    async fn verify(&self, request: &VerificationRequest) -> anyhow::Result<VerificationStatus> {
        let form = self.submission(request)?;

        let response: ApiResponse = self
            .client
            .post(self.config.api_url.clone())
            .form(&form)
            .send()
            .await
            .with_context(|| format!("Failed to submit {} for verification", request.contract))?
            .json()
            .await
            .context("Failed to parse verification response")?;

        let text = response.result_text();
        if is_already_verified(&text) || is_already_verified(&response.message) {
            return Ok(VerificationStatus::AlreadyVerified);
        }
        if response.status != "1" {
            anyhow::bail!("Explorer rejected submission: {} ({text})", response.message);
        }

        tracing::debug!(guid = %text, contract = %request.contract, "Verification submitted");

        (|| self.check_status(&text))
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(self.max_polls),
            )
            .when(|err: &anyhow::Error| err.is::<Pending>())
            .await
            .with_context(|| format!("Verification of {} did not complete", request.contract))
    }
}
