//! Best-effort mirroring of deployments to an external contract index.
//!
//! Pushes never block a step and never fail it: they run as background tasks
//! and their failures are only logged.

use std::sync::{Arc, Mutex};

use alloy_core::primitives::Address;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;
use url::Url;

/// An external index that is told about every newly deployed contract.
#[async_trait::async_trait]
pub trait IndexMirror: Send + Sync {
    async fn push(&self, name: &str, address: Address) -> anyhow::Result<()>;
}

/// Settings of an [`HttpMirror`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Base URL of the index API.
    pub url: Url,
    /// Workspace the contracts are filed under.
    pub workspace: String,
    /// Bearer token, if the API requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Pushes contracts to an Ethernal-style HTTP API.
#[derive(Debug, Clone)]
pub struct HttpMirror {
    client: reqwest::Client,
    config: MirrorConfig,
}

impl HttpMirror {
    pub fn new(mut config: MirrorConfig) -> anyhow::Result<Self> {
        // Joining replaces the last path segment unless the base ends in a slash.
        if !config.url.path().ends_with('/') {
            let path = format!("{}/", config.url.path());
            config.url.set_path(&path);
        }

        Ok(Self {
            client: crate::rpc::create_client(crate::rpc::DEFAULT_REQUEST_TIMEOUT)?,
            config,
        })
    }

    fn endpoint(&self, address: Address) -> anyhow::Result<Url> {
        self.config
            .url
            .join(&format!("api/contracts/{}", address.to_checksum(None)))
            .context("Invalid mirror URL")
    }
}

#[async_trait::async_trait]
impl IndexMirror for HttpMirror {
    async fn push(&self, name: &str, address: Address) -> anyhow::Result<()> {
        let mut request = self.client.post(self.endpoint(address)?).json(&json!({
            "workspace": self.config.workspace,
            "data": {
                "name": name,
                "address": address.to_checksum(None),
            }
        }));
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to push {name} to the index"))?
            .error_for_status()
            .with_context(|| format!("Index rejected {name}"))?;

        Ok(())
    }
}

/// Runs mirror pushes in the background and collects their handles.
#[derive(Default)]
pub struct MirrorQueue {
    mirror: Option<Arc<dyn IndexMirror>>,
    pending: Mutex<Vec<(String, JoinHandle<anyhow::Result<()>>)>>,
}

impl std::fmt::Debug for MirrorQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorQueue")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl MirrorQueue {
    pub fn new(mirror: Arc<dyn IndexMirror>) -> Self {
        Self {
            mirror: Some(mirror),
            pending: Mutex::default(),
        }
    }

    /// A queue that drops every push.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.mirror.is_some()
    }

    /// Start pushing `name` in the background. Must be called inside a tokio runtime.
    pub fn submit(&self, name: &str, address: Address) {
        let Some(mirror) = self.mirror.clone() else {
            return;
        };

        let task_name = name.to_string();
        let handle = tokio::spawn(async move { mirror.push(&task_name, address).await });

        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((name.to_string(), handle));
    }

    /// Wait for every submitted push. Returns how many succeeded.
    pub async fn drain(&self) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock().unwrap_or_else(|e| e.into_inner()));

        let mut pushed = 0;
        for (name, handle) in pending {
            match handle.await {
                Ok(Ok(())) => {
                    tracing::debug!(name = %name, "Pushed contract to index");
                    pushed += 1;
                }
                Ok(Err(err)) => {
                    tracing::warn!(name = %name, error = %format!("{err:#}"), "Index push failed");
                }
                Err(err) => {
                    tracing::warn!(name = %name, error = %err, "Index push task panicked");
                }
            }
        }
        pushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHttp;

    struct RecordingMirror {
        pushed: Mutex<Vec<(String, Address)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl IndexMirror for RecordingMirror {
        async fn push(&self, name: &str, address: Address) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("index unavailable");
            }
            self.pushed.lock().unwrap().push((name.to_string(), address));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_drain_waits_for_pushes() {
        let mirror = Arc::new(RecordingMirror {
            pushed: Mutex::default(),
            fail: false,
        });
        let queue = MirrorQueue::new(mirror.clone());

        queue.submit("RabbitSwapV3Factory", Address::repeat_byte(1));
        queue.submit("TickLens", Address::repeat_byte(2));

        assert_eq!(queue.drain().await, 2);
        assert_eq!(mirror.pushed.lock().unwrap().len(), 2);
        assert_eq!(queue.drain().await, 0);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let queue = MirrorQueue::new(Arc::new(RecordingMirror {
            pushed: Mutex::default(),
            fail: true,
        }));

        queue.submit("TickLens", Address::repeat_byte(2));
        assert_eq!(queue.drain().await, 0);
    }

    #[tokio::test]
    async fn test_disabled_queue_ignores_submissions() {
        let queue = MirrorQueue::disabled();
        queue.submit("TickLens", Address::repeat_byte(2));

        assert!(!queue.is_enabled());
        assert_eq!(queue.drain().await, 0);
    }

    #[test]
    fn test_endpoint_appends_checksummed_address() {
        let mirror = HttpMirror::new(MirrorConfig {
            url: Url::parse("https://app.tryethernal.com/").unwrap(),
            workspace: "rabbit".to_string(),
            token: None,
        })
        .unwrap();

        let address: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        assert_eq!(
            mirror.endpoint(address).unwrap().as_str(),
            "https://app.tryethernal.com/api/contracts/0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let mirror = HttpMirror::new(MirrorConfig {
            url: Url::parse("https://index.example.com/v2").unwrap(),
            workspace: "rabbit".to_string(),
            token: None,
        })
        .unwrap();

        let address: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        assert_eq!(
            mirror.endpoint(address).unwrap().as_str(),
            "https://index.example.com/v2/api/contracts/0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[tokio::test]
    async fn test_push_posts_contract() {
        let server = MockHttp::start(|_| (200, json!({}))).await;
        let mirror = HttpMirror::new(MirrorConfig {
            url: server.url().join("index").unwrap(),
            workspace: "rabbit".to_string(),
            token: Some("secret".to_string()),
        })
        .unwrap();

        let address: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        mirror.push("TickLens", address).await.unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(
            requests[0].path,
            "/index/api/contracts/0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
        assert_eq!(requests[0].header("authorization"), Some("Bearer secret"));
        assert_eq!(
            requests[0].json(),
            json!({
                "workspace": "rabbit",
                "data": {"name": "TickLens", "address": "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"}
            })
        );
    }

    #[tokio::test]
    async fn test_push_surfaces_rejection() {
        let server = MockHttp::start(|_| (401, json!({"message": "unauthorized"}))).await;
        let mirror = HttpMirror::new(MirrorConfig {
            url: server.url(),
            workspace: "rabbit".to_string(),
            token: None,
        })
        .unwrap();

        let err = mirror.push("TickLens", Address::repeat_byte(2)).await.unwrap_err();
        assert_eq!(err.to_string(), "Index rejected TickLens");
        assert_eq!(server.requests()[0].header("authorization"), None);
    }
}
