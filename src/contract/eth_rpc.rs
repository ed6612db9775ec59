//! JSON-RPC implementation of the contract and provider surface.
//!
//! Plain `eth_call` / `eth_sendTransaction` over HTTP against whatever node
//! holds the sender account; the node (or the wallet behind it) signs. The
//! gateway never touches keys.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use num_bigint::BigUint;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::abi::{
    decode_address_return, decode_auction_records, decode_revert_reason, encode_call, AbiValue,
};
use crate::contract::{selectors, AuctionContract, ConfirmedTx, TxError};

const RPC_TIMEOUT: Duration = Duration::from_secs(10);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Give a transaction two minutes to mine before reporting failure.
const RECEIPT_POLL_ATTEMPTS: u32 = 120;

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

impl JsonRpcError {
    /// Best-effort revert reason from the error payload. Nodes differ: geth
    /// puts the `Error(string)` bytes in `data`, some wrap them once more.
    fn revert_reason(&self) -> Option<String> {
        let hex_payload = match &self.data {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Object(obj)) => obj.get("data").and_then(Value::as_str),
            _ => None,
        }?;
        let bytes = hex::decode(hex_payload.strip_prefix("0x")?).ok()?;
        decode_revert_reason(&bytes)
    }
}

/// Transaction parameters for `eth_sendTransaction` / replay via `eth_call`.
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub from: String,
    pub to: String,
    pub data: Vec<u8>,
    pub value: Option<BigUint>,
}

impl TxRequest {
    fn to_params(&self) -> Value {
        let mut tx = json!({
            "from": self.from,
            "to": self.to,
            "data": format!("0x{}", hex::encode(&self.data)),
        });
        if let Some(value) = &self.value {
            tx["value"] = Value::String(format!("0x{value:x}"));
        }
        tx
    }
}

/// Thin JSON-RPC client. Cheap to clone; clones share the HTTP pool.
#[derive(Clone)]
pub struct EthRpcClient {
    client: reqwest::Client,
    rpc_url: String,
    next_id: Arc<AtomicU64>,
}

impl EthRpcClient {
    pub fn new(rpc_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            rpc_url,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        self.client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("RPC request {method} failed"))?
            .json()
            .await
            .with_context(|| format!("failed to parse RPC response for {method}"))
    }

    /// One call where a result is required.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let response = self.request(method, params).await?;
        if let Some(err) = response.error {
            if let Some(reason) = err.revert_reason() {
                bail!("execution reverted: {reason}");
            }
            bail!("RPC error {} on {method}: {}", err.code, err.message);
        }
        response
            .result
            .ok_or_else(|| anyhow!("no result in RPC response for {method}"))
    }

    pub async fn eth_call(&self, to: &str, data: &[u8], block: &str) -> Result<Vec<u8>> {
        let params = json!([{ "to": to, "data": format!("0x{}", hex::encode(data)) }, block]);
        let result = self.call("eth_call", params).await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| anyhow!("eth_call result is not a string"))?;
        hex::decode(hex_str.trim_start_matches("0x")).context("eth_call result is not hex")
    }

    pub async fn send_transaction(&self, tx: &TxRequest) -> Result<String> {
        let result = self
            .call("eth_sendTransaction", json!([tx.to_params()]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("eth_sendTransaction result is not a hash"))
    }

    /// `None` while the transaction is still pending.
    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<Value>> {
        let response = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if let Some(err) = response.error {
            bail!("RPC error {}: {}", err.code, err.message);
        }
        Ok(response.result.filter(|v| !v.is_null()))
    }

    pub async fn accounts(&self) -> Result<Vec<String>> {
        let result = self.call("eth_accounts", json!([])).await?;
        serde_json::from_value(result).context("eth_accounts result is not an address list")
    }

    pub async fn network_id(&self) -> Result<String> {
        let result = self.call("net_version", json!([])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("net_version result is not a string"))
    }

    /// Replays a mined transaction as a read call to recover its revert
    /// reason. Best effort; `None` when the node gives nothing decodable.
    async fn replay_for_revert_reason(&self, tx: &TxRequest, block: &str) -> Option<String> {
        let params = json!([tx.to_params(), block]);
        match self.request("eth_call", params).await {
            Ok(response) => {
                if let Some(err) = response.error {
                    return err.revert_reason();
                }
                let hex_str = response.result.as_ref()?.as_str()?;
                let bytes = hex::decode(hex_str.strip_prefix("0x")?).ok()?;
                decode_revert_reason(&bytes)
            }
            Err(err) => {
                debug!(error = %err, "revert reason replay failed");
                None
            }
        }
    }
}

/// Wallet/provider handshake result: which account sends transactions and
/// which network the node is on.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub account: String,
    pub network_id: String,
}

/// Resolves the sender account and network id, preferring an explicitly
/// configured account over the node's first unlocked one.
pub async fn detect_provider(
    rpc: &EthRpcClient,
    preferred_account: Option<String>,
) -> Result<ProviderInfo> {
    let network_id = rpc.network_id().await.context("provider not reachable")?;

    let account = match preferred_account {
        Some(account) => account,
        None => rpc
            .accounts()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("provider exposes no unlocked accounts; set SENDER_ACCOUNT"))?,
    };

    Ok(ProviderInfo {
        account,
        network_id,
    })
}

/// An in-flight transaction. `confirmed()` is the awaitable outcome: it
/// resolves once mined or reports the revert reason verbatim.
pub struct TxHandle {
    rpc: EthRpcClient,
    call: TxRequest,
    pub tx_hash: String,
}

impl TxHandle {
    pub async fn confirmed(&self) -> Result<ConfirmedTx, TxError> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            match self.rpc.transaction_receipt(&self.tx_hash).await {
                Ok(Some(receipt)) => return self.interpret(receipt).await,
                Ok(None) => {}
                Err(err) => {
                    // Transient node trouble; the receipt may still appear.
                    warn!(tx = %self.tx_hash, error = %err, "receipt poll failed");
                }
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
        Err(TxError::Failed(format!(
            "transaction {} not mined within {} seconds",
            self.tx_hash, RECEIPT_POLL_ATTEMPTS
        )))
    }

    async fn interpret(&self, receipt: Value) -> Result<ConfirmedTx, TxError> {
        let status = receipt["status"].as_str().unwrap_or("0x0");
        let block_number = receipt["blockNumber"]
            .as_str()
            .and_then(parse_quantity)
            .unwrap_or_default();

        if status == "0x1" {
            return Ok(ConfirmedTx {
                tx_hash: self.tx_hash.clone(),
                block_number,
            });
        }

        let block_tag = receipt["blockNumber"]
            .as_str()
            .unwrap_or("latest")
            .to_string();
        let reason = self
            .rpc
            .replay_for_revert_reason(&self.call, &block_tag)
            .await
            .unwrap_or_else(|| "execution reverted".to_string());
        Err(TxError::Reverted(reason))
    }
}

/// Parses a JSON-RPC hex quantity ("0x1a") into a u64.
fn parse_quantity(s: &str) -> Option<u64> {
    u64::from_str_radix(s.strip_prefix("0x")?, 16).ok()
}

/// [`AuctionContract`] against a deployed AuctionSystem address.
///
/// Both the RPC endpoint and the sender account are injected; nothing here is
/// ambient or global.
pub struct AuctionSystemClient {
    rpc: EthRpcClient,
    address: String,
    from: String,
}

impl AuctionSystemClient {
    pub fn new(rpc: EthRpcClient, address: String, from: String) -> Self {
        Self { rpc, address, from }
    }

    async fn send(&self, data: Vec<u8>, value: Option<BigUint>) -> Result<TxHandle> {
        let call = TxRequest {
            from: self.from.clone(),
            to: self.address.clone(),
            data,
            value,
        };
        let tx_hash = self.rpc.send_transaction(&call).await?;
        debug!(tx = %tx_hash, "transaction submitted");
        Ok(TxHandle {
            rpc: self.rpc.clone(),
            call,
            tx_hash,
        })
    }
}

#[async_trait]
impl AuctionContract for AuctionSystemClient {
    async fn get_auctions(&self) -> Result<Vec<Vec<AbiValue>>> {
        let data = encode_call(selectors::GET_AUCTIONS, &[])?;
        let out = self.rpc.eth_call(&self.address, &data, "latest").await?;
        let records =
            decode_auction_records(&out).context("failed to decode getAuctions response")?;
        debug!(count = records.len(), "fetched auction records");
        Ok(records)
    }

    async fn create_auction(
        &self,
        description: &str,
        time_to_live_minutes: u64,
    ) -> Result<TxHandle> {
        let data = encode_call(
            selectors::CREATE_AUCTION,
            &[
                AbiValue::Str(description.to_string()),
                AbiValue::Uint(BigUint::from(time_to_live_minutes)),
            ],
        )?;
        self.send(data, None).await
    }

    async fn bid(&self, auction_id: u64, value_wei: BigUint) -> Result<TxHandle> {
        let data = encode_call(selectors::BID, &[AbiValue::Uint(BigUint::from(auction_id))])?;
        self.send(data, Some(value_wei)).await
    }

    async fn refund(&self, auction_id: u64) -> Result<TxHandle> {
        let data = encode_call(
            selectors::REFUND,
            &[AbiValue::Uint(BigUint::from(auction_id))],
        )?;
        self.send(data, None).await
    }

    async fn get_winner(&self, auction_id: u64) -> Result<String> {
        let data = encode_call(
            selectors::GET_WINNER,
            &[AbiValue::Uint(BigUint::from(auction_id))],
        )?;
        let out = self.rpc.eth_call(&self.address, &data, "latest").await?;
        decode_address_return(&out).context("failed to decode getWinner response")
    }

    async fn receipt(&self, auction_id: u64) -> Result<TxHandle> {
        let data = encode_call(
            selectors::RECEIPT,
            &[AbiValue::Uint(BigUint::from(auction_id))],
        )?;
        self.send(data, None).await
    }

    async fn auction_withdraw(&self, auction_id: u64) -> Result<TxHandle> {
        let data = encode_call(
            selectors::AUCTION_WITHDRAW,
            &[AbiValue::Uint(BigUint::from(auction_id))],
        )?;
        self.send(data, None).await
    }
}
