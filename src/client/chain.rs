//! Minimal JSON-RPC chain client
//!
//! Requests go through the session's own HTTP client so a wallet's proxy
//! covers its chain traffic too, exactly like the API calls. Only the
//! handful of methods the mining flow needs is implemented.

use alloy::primitives::U256;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{Error, Result};

pub struct ChainClient {
    http: reqwest::Client,
    rpc_url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Transaction receipt, reduced to what the activation flow checks
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub block_number: Option<String>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1"))
    }
}

impl ChainClient {
    /// Wrap an existing HTTP client (shared with the API session).
    pub fn new(http: reqwest::Client, rpc_url: impl Into<String>) -> Self {
        Self {
            http,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn request(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!("rpc {} (id {})", method, id);
        let response = self.http.post(&self.rpc_url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Rpc(format!("{method} returned HTTP {status}: {text}")));
        }

        let envelope: RpcEnvelope = response.json().await?;
        if let Some(err) = envelope.error {
            return Err(Error::Rpc(format!(
                "{method} failed: {} (code {})",
                err.message, err.code
            )));
        }

        Ok(envelope.result.unwrap_or(serde_json::Value::Null))
    }

    /// `eth_getBalance` at latest, in wei.
    pub async fn get_balance(&self, address: &str) -> Result<U256> {
        let result = self
            .request("eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_hex_u256(result.as_str().unwrap_or_default())
    }

    /// `eth_getTransactionCount` at latest - the next usable nonce.
    pub async fn transaction_count(&self, address: &str) -> Result<u64> {
        let result = self
            .request("eth_getTransactionCount", json!([address, "latest"]))
            .await?;
        parse_hex_u64(result.as_str().unwrap_or_default())
    }

    /// Read-only `eth_call` against a contract.
    pub async fn call(&self, to: &str, data: &str) -> Result<String> {
        let result = self
            .request("eth_call", json!([{"to": to, "data": data}, "latest"]))
            .await?;
        Ok(result.as_str().unwrap_or_default().to_string())
    }

    /// Broadcast a signed raw transaction, returning its hash.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String> {
        let result = self
            .request("eth_sendRawTransaction", json!([format!("0x{}", hex::encode(raw))]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Rpc("eth_sendRawTransaction returned no hash".to_string()))
    }

    /// Receipt for a transaction hash, `None` while still pending.
    pub async fn get_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>> {
        let result = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(result)?))
    }

    /// Poll for a receipt until `timeout` elapses.
    ///
    /// The wait is bounded: a stalled chain or dead RPC must not hang a
    /// whole batch run.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<TxReceipt> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(receipt) = self.get_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(Error::ReceiptTimeout(timeout.as_secs()));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

fn parse_hex_u64(text: &str) -> Result<u64> {
    let digits = text.trim_start_matches("0x");
    u64::from_str_radix(digits, 16)
        .map_err(|_| Error::Rpc(format!("expected hex quantity, got '{text}'")))
}

fn parse_hex_u256(text: &str) -> Result<U256> {
    let digits = text.trim_start_matches("0x");
    U256::from_str_radix(digits, 16)
        .map_err(|_| Error::Rpc(format!("expected hex quantity, got '{text}'")))
}

/// Wei to whole-coin units for display purposes only.
pub fn wei_to_eth(wei: U256) -> f64 {
    wei.to_string().parse::<f64>().unwrap_or(0.0) / 1e18
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_quantities() {
        assert_eq!(parse_hex_u64("0x10").unwrap(), 16);
        assert_eq!(parse_hex_u64("0x0").unwrap(), 0);
        assert!(parse_hex_u64("banana").is_err());

        let wei = parse_hex_u256("0xde0b6b3a7640000").unwrap(); // 1e18
        assert_eq!(wei_to_eth(wei), 1.0);
    }

    #[test]
    fn test_receipt_status() {
        let ok: TxReceipt =
            serde_json::from_str(r#"{"status": "0x1", "transactionHash": "0xabc"}"#).unwrap();
        assert!(ok.succeeded());

        let reverted: TxReceipt = serde_json::from_str(r#"{"status": "0x0"}"#).unwrap();
        assert!(!reverted.succeeded());

        let missing: TxReceipt = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!missing.succeeded());
    }

    #[test]
    fn test_rpc_envelope_error() {
        let envelope: RpcEnvelope = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#,
        )
        .unwrap();
        assert!(envelope.result.is_none());
        assert_eq!(envelope.error.unwrap().code, -32000);
    }

    #[test]
    fn test_wei_to_eth_rounds_sanely() {
        assert_eq!(wei_to_eth(U256::ZERO), 0.0);
        let half = parse_hex_u256("0x6f05b59d3b20000").unwrap(); // 0.5e18
        assert!((wei_to_eth(half) - 0.5).abs() < 1e-12);
    }
}
