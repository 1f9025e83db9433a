//! [`ChainGateway`] on top of an `alloy` provider.

use std::time::Duration;

use alloy::{
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::{
        client::RpcClient,
        types::{TransactionReceipt, TransactionRequest},
    },
};
use alloy_core::primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use url::Url;

use super::{CallRequest, ChainGateway, Deployment, InstantiateRequest, Receipt};
use crate::{artifacts::ArtifactStore, contract::encode_args};

/// Who signs the transactions sent by an [`RpcGateway`].
#[derive(Debug, Clone)]
pub enum SignerMode {
    /// Sign locally and submit raw transactions.
    Local(PrivateKeySigner),
    /// Let the node sign with its first unlocked account (dev nodes).
    Node,
}

/// Connection settings for an [`RpcGateway`].
#[derive(Debug, Clone)]
pub struct RpcGatewayConfig {
    pub rpc_url: Url,
    /// Expected chain id. Checked against the node when set.
    pub chain_id: Option<u64>,
    /// How long to wait for a transaction to be included.
    pub confirmation_timeout: Duration,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
}

/// Sends transactions through a provider and waits for their receipts.
///
/// Transactions carry an explicit gas price, so they go out as legacy transactions.
/// Viction does not accept typed fee-market transactions.
pub struct RpcGateway {
    provider: DynProvider<Ethereum>,
    artifacts: ArtifactStore,
    from: Address,
    chain_id: u64,
    confirmation_timeout: Duration,
}

impl std::fmt::Debug for RpcGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcGateway")
            .field("chain_id", &self.chain_id)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl RpcGateway {
    /// Connect to the endpoint and resolve the chain id and sender.
    pub async fn connect(
        config: RpcGatewayConfig,
        artifacts: ArtifactStore,
        signer: SignerMode,
    ) -> anyhow::Result<Self> {
        let client =
            RpcClient::new_http(config.rpc_url.clone()).with_poll_interval(config.poll_interval);

        let (provider, from) = match signer {
            SignerMode::Local(signer) => {
                let from = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_client(client);
                (DynProvider::new(provider), Some(from))
            }
            SignerMode::Node => {
                let provider = ProviderBuilder::new().connect_client(client);
                (DynProvider::new(provider), None)
            }
        };

        let chain_id = provider
            .get_chain_id()
            .await
            .with_context(|| format!("Failed to reach RPC endpoint {}", config.rpc_url))?;

        if let Some(expected) = config.chain_id
            && expected != chain_id
        {
            anyhow::bail!(
                "RPC endpoint {} serves chain {chain_id}, expected {expected}",
                config.rpc_url
            );
        }

        let from = match from {
            Some(from) => from,
            None => *provider
                .get_accounts()
                .await
                .context("Failed to list node accounts")?
                .first()
                .context("Node has no unlocked account and no private key was provided")?,
        };

        tracing::info!(rpc_url = %config.rpc_url, chain_id, from = %from, "Connected to network");

        Ok(Self {
            provider,
            artifacts,
            from,
            chain_id,
            confirmation_timeout: config.confirmation_timeout,
        })
    }

    /// The account transactions are sent from.
    pub fn sender(&self) -> Address {
        self.from
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Submit a transaction and wait for a successful receipt.
    async fn submit(&self, tx: TransactionRequest) -> anyhow::Result<TransactionReceipt> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .context("Failed to fetch gas price")?;
        let tx = tx.with_from(self.from).with_gas_price(gas_price);

        let pending = self.provider.send_transaction(tx).await?;
        let hash = *pending.tx_hash();
        tracing::debug!(tx_hash = %hash, "Transaction submitted");

        let receipt = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .with_context(|| {
                format!(
                    "Transaction {hash} not confirmed within {}s",
                    self.confirmation_timeout.as_secs()
                )
            })?;

        ensure_success(receipt)
    }
}

/// Reject reverted transactions.
fn ensure_success(receipt: TransactionReceipt) -> anyhow::Result<TransactionReceipt> {
    if !receipt.status() {
        anyhow::bail!(
            "Transaction {} reverted in block {}",
            receipt.transaction_hash,
            receipt.block_number.unwrap_or_default()
        );
    }

    tracing::debug!(
        tx_hash = %receipt.transaction_hash,
        block_number = receipt.block_number,
        gas_used = receipt.gas_used,
        "Transaction confirmed"
    );
    Ok(receipt)
}

/// The instance created by a successful creation transaction.
fn deployment_from(receipt: &TransactionReceipt) -> anyhow::Result<Deployment> {
    let address = receipt.contract_address.with_context(|| {
        format!(
            "Receipt of {} has no contract address",
            receipt.transaction_hash
        )
    })?;

    Ok(Deployment {
        address,
        receipt: Receipt::from(receipt),
    })
}

impl From<&TransactionReceipt> for Receipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used,
        }
    }
}

impl ChainGateway for RpcGateway {
    async fn instantiate(&self, request: InstantiateRequest) -> anyhow::Result<Deployment> {
        let artifact = self.artifacts.load(&request.contract)?;
        let mut code = artifact.link(&request.libraries)?;
        code.extend(encode_args(&request.args));

        let tx = TransactionRequest::default()
            .with_deploy_code(code)
            .with_value(U256::ZERO)
            .with_gas_limit(request.cost_ceiling);

        let receipt = self
            .submit(tx)
            .await
            .with_context(|| format!("Failed to deploy {}", request.contract))?;

        deployment_from(&receipt)
    }

    async fn call(&self, request: CallRequest) -> anyhow::Result<Receipt> {
        let tx = TransactionRequest::default()
            .with_to(request.to)
            .with_input(request.calldata())
            .with_value(request.value)
            .with_gas_limit(request.cost_ceiling);

        let receipt = self
            .submit(tx)
            .await
            .with_context(|| format!("Failed to send {} to {}", request.signature, request.to))?;

        Ok(Receipt::from(&receipt))
    }

    async fn signers(&self) -> anyhow::Result<Vec<Address>> {
        let accounts = self.provider.get_accounts().await.unwrap_or_default();
        if accounts.contains(&self.from) {
            Ok(accounts)
        } else {
            Ok(vec![self.from])
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::address;
    use serde_json::{Value, json};

    use super::*;
    use crate::testing::MockHttp;

    const CREATED: Address = address!("0x5fbdb2315678afecb367f032d93f642f64180aa3");
    const ACCOUNT: Address = address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");

    fn receipt(status: &str, contract_address: Option<Address>) -> TransactionReceipt {
        serde_json::from_value(json!({
            "type": "0x0",
            "status": status,
            "cumulativeGasUsed": "0x5208",
            "logs": [],
            "logsBloom": format!("0x{}", "0".repeat(512)),
            "transactionHash": "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060",
            "transactionIndex": "0x0",
            "blockHash": "0x4e3a3754410177e6937ef1f84bba68ea139e8d1a2258c5f85db9f1cd715a1bdd",
            "blockNumber": "0x10",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": ACCOUNT,
            "to": null,
            "contractAddress": contract_address,
        }))
        .unwrap()
    }

    #[test]
    fn test_successful_creation_receipt() {
        let deployment = deployment_from(&ensure_success(receipt("0x1", Some(CREATED))).unwrap())
            .unwrap();

        assert_eq!(deployment.address, CREATED);
        assert_eq!(deployment.receipt.block_number, 16);
        assert_eq!(deployment.receipt.gas_used, 21_000);
    }

    #[test]
    fn test_reverted_receipt_is_an_error() {
        let err = ensure_success(receipt("0x0", Some(CREATED))).unwrap_err();
        assert!(err.to_string().contains("reverted in block 16"));
    }

    #[test]
    fn test_creation_receipt_without_address_is_an_error() {
        let err = deployment_from(&receipt("0x1", None)).unwrap_err();
        assert!(err.to_string().contains("has no contract address"));
    }

    fn node(chain_id: &'static str) -> impl Fn(&str, &Value) -> Value + Send + Sync + 'static {
        move |method, _params| match method {
            "eth_chainId" => json!(chain_id),
            "eth_accounts" => json!([ACCOUNT, CREATED]),
            other => panic!("unexpected method {other}"),
        }
    }

    fn config(url: Url, chain_id: Option<u64>) -> RpcGatewayConfig {
        RpcGatewayConfig {
            rpc_url: url,
            chain_id,
            confirmation_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_connect_uses_first_node_account() {
        let server = MockHttp::json_rpc(node("0x59")).await;

        let gateway = RpcGateway::connect(
            config(server.url(), Some(89)),
            ArtifactStore::new("artifacts"),
            SignerMode::Node,
        )
        .await
        .unwrap();

        assert_eq!(gateway.chain_id(), 89);
        assert_eq!(gateway.sender(), ACCOUNT);
        assert_eq!(gateway.signers().await.unwrap(), vec![ACCOUNT, CREATED]);
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_chain() {
        let server = MockHttp::json_rpc(node("0x58")).await;

        let err = RpcGateway::connect(
            config(server.url(), Some(89)),
            ArtifactStore::new("artifacts"),
            SignerMode::Node,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("serves chain 88, expected 89"));
    }
}
