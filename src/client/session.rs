//! Protocol state machine for one wallet
//!
//! Unauthenticated -> Authenticated (nonce challenge + personal-message
//! signature) -> mining active or inactive, derived from the remote
//! `lastMiningTime` timestamp on every check.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::vault::proxy::ProxyEndpoint;

use super::api::{ApiResponse, Assignment, LoginData, MiningTime, NonceData, UserInfo};
use super::chain::ChainClient;

/// One mining activation holds for 24 hours
pub const MINING_WINDOW_SECS: i64 = 86_400;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";

/// Mining state derived from the authoritative remote timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningState {
    Active {
        time_left_secs: i64,
        total_secs: i64,
    },
    Inactive {
        total_secs: i64,
    },
}

/// Per-wallet client for the reward service and chain
pub struct SessionClient {
    http: reqwest::Client,
    chain: ChainClient,
    api_base: String,
    signer: PrivateKeySigner,
    address: String,
    contract: Address,
    contract_hex: String,
    selector: [u8; 4],
    chain_id: u64,
    gas_price_wei: u128,
    gas_limit: u64,
    receipt_timeout: Duration,
    receipt_poll: Duration,
    token: Option<String>,
}

impl SessionClient {
    /// Build a session for one wallet, optionally routed through a proxy.
    ///
    /// The same HTTP client carries API and chain traffic, so the proxy
    /// covers both.
    pub fn new(
        config: &Config,
        private_key: &str,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|_| Error::Validation("invalid private key".to_string()))?;
        let address = signer.address().to_checksum(None);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&config.api.origin)
                .map_err(|e| Error::Config(format!("invalid origin header: {e}")))?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}/", config.api.origin))
                .map_err(|e| Error::Config(format!("invalid referer header: {e}")))?,
        );

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.api.timeout_ms));
        if let Some(endpoint) = proxy {
            // One URL serves both schemes, Proxy::all applies it to both
            builder = builder.proxy(
                reqwest::Proxy::all(&endpoint.http)
                    .map_err(|e| Error::Validation(format!("unusable proxy URL: {e}")))?,
            );
        }
        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        let contract: Address = config
            .chain
            .mining_contract
            .parse()
            .map_err(|_| Error::Config("mining_contract is not an address".to_string()))?;

        Ok(Self {
            chain: ChainClient::new(http.clone(), config.chain.rpc_url.clone()),
            http,
            api_base: config.api.base_url.trim_end_matches('/').to_string(),
            signer,
            address,
            contract,
            contract_hex: contract.to_checksum(None),
            selector: config.activation_selector_bytes(),
            chain_id: config.chain.chain_id,
            gas_price_wei: config.chain.gas_price_wei,
            gas_limit: config.chain.gas_limit,
            receipt_timeout: Duration::from_secs(config.chain.receipt_timeout_secs),
            receipt_poll: Duration::from_millis(config.chain.receipt_poll_ms),
            token: None,
        })
    }

    /// Checksummed address of this session's wallet.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Nonce-challenge login: fetch a one-time nonce, sign it with the
    /// wallet key, trade the signature for a bearer token.
    pub async fn login(&mut self) -> Result<()> {
        let nonce = self.generate_nonce().await?;

        let signature = self
            .signer
            .sign_message_sync(nonce.as_bytes())
            .map_err(|e| Error::Auth(format!("failed to sign nonce: {e}")))?;

        let payload = json!({
            "address": self.address,
            "signature": format!("0x{}", hex::encode(signature.as_bytes())),
            "message": nonce,
        });

        let response = self
            .http
            .post(format!("{}/wallet/login", self.api_base))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("login rejected ({status}): {body}")));
        }

        let parsed: ApiResponse<LoginData> = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("unparseable login response: {e}")))?;

        self.token = Some(parsed.data.token);
        debug!("Logged in {}", self.address);
        Ok(())
    }

    async fn generate_nonce(&self) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/wallet/generateNonce", self.api_base))
            .json(&json!({"walletAddress": self.address}))
            .send()
            .await
            .map_err(|e| Error::Auth(format!("nonce request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("nonce rejected ({status}): {body}")));
        }

        let parsed: ApiResponse<NonceData> = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("unparseable nonce response: {e}")))?;
        Ok(parsed.data.nonce)
    }

    fn bearer(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| Error::Auth("not logged in".to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let response = self
            .http
            .get(format!("{}/{}", self.api_base, endpoint))
            .bearer_auth(self.bearer()?)
            .send()
            .await?;
        decode(endpoint, response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{}", self.api_base, endpoint))
            .bearer_auth(self.bearer()?)
            .json(body)
            .send()
            .await?;
        decode(endpoint, response).await
    }

    /// Account profile and reward totals.
    pub async fn get_user_info(&self) -> Result<UserInfo> {
        self.get_json("user/getUserInfo").await
    }

    /// Last activation timestamp and accumulated mining seconds.
    pub async fn get_total_mining_time(&self) -> Result<MiningTime> {
        self.get_json("assignment/totalMiningTime").await
    }

    /// Available assignments (social tasks etc.).
    pub async fn get_assignment_list(&self) -> Result<Vec<Assignment>> {
        self.post_json("assignment/list", &json!({})).await
    }

    /// Native balance of the wallet, in wei, straight from the chain.
    pub async fn get_balance(&self) -> Result<U256> {
        self.chain.get_balance(&self.address).await
    }

    /// Derive the mining state from the remote timestamp.
    ///
    /// A read-only call against the mining contract doubles as a chain
    /// connectivity probe; the timestamp stays the single source of truth
    /// and the call result never overrides it.
    pub async fn mining_state(&self) -> Result<MiningState> {
        let mining_time = self.get_total_mining_time().await?;

        let probe_data = format!("0x{}", hex::encode(self.selector));
        match self.chain.call(&self.contract_hex, &probe_data).await {
            Ok(_) => debug!("Mining contract reachable"),
            Err(e) => warn!("Mining contract probe failed: {}", e),
        }

        let now = Utc::now().timestamp();
        Ok(match mining_time.last_mining_time {
            Some(last) if is_active(last, now) => MiningState::Active {
                time_left_secs: time_left(last, now),
                total_secs: mining_time.total_mining_time,
            },
            _ => MiningState::Inactive {
                total_secs: mining_time.total_mining_time,
            },
        })
    }

    /// Whether the 24-hour mining window is currently open.
    pub async fn check_mining_status(&self) -> Result<bool> {
        Ok(matches!(self.mining_state().await?, MiningState::Active { .. }))
    }

    /// Activate mining: on-chain transaction, receipt, server-side state
    /// update, verification re-read.
    ///
    /// The four steps are sequential and not retried. A failure surfaces
    /// immediately with no rollback - once broadcast, the transaction is
    /// irreversible regardless of later API failures.
    pub async fn activate_mining(&self) -> Result<()> {
        // 1. Build and sign the activation transaction
        let nonce = self.chain.transaction_count(&self.address).await?;
        let mut tx = self.build_activation_tx(nonce);
        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| Error::Transaction(format!("failed to sign: {e}")))?;
        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
        let raw = envelope.encoded_2718();

        // 2. Broadcast and wait for the receipt
        let tx_hash = self.chain.send_raw_transaction(&raw).await?;
        info!("Activation transaction sent: {}", tx_hash);

        let receipt = self
            .chain
            .wait_for_receipt(&tx_hash, self.receipt_timeout, self.receipt_poll)
            .await?;
        if !receipt.succeeded() {
            return Err(Error::Transaction(format!(
                "transaction {tx_hash} did not succeed (status {:?})",
                receipt.status
            )));
        }

        // 3. Reconcile server-side state
        self.post_json::<serde_json::Value>("assignment/startMining", &json!({"status": false}))
            .await?;

        // 4. Verify the service now reports an activation timestamp
        let verify = self.get_total_mining_time().await?;
        if verify.last_mining_time.is_none() {
            return Err(Error::ActivationVerify);
        }

        info!("Mining activated for {}", self.address);
        Ok(())
    }

    /// Legacy transaction invoking the fixed activation selector with zero
    /// value at a fixed gas price and limit.
    fn build_activation_tx(&self, nonce: u64) -> TxLegacy {
        TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price: self.gas_price_wei,
            gas_limit: self.gas_limit,
            to: TxKind::Call(self.contract),
            value: U256::ZERO,
            input: Bytes::copy_from_slice(&self.selector),
        }
    }
}

async fn decode<T: DeserializeOwned>(endpoint: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Remote {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let parsed: ApiResponse<T> = response.json().await.map_err(|e| Error::Remote {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body: format!("unparseable body: {e}"),
    })?;
    Ok(parsed.data)
}

/// Active iff less than 24 hours have passed since the last activation.
fn is_active(last_mining_time: i64, now: i64) -> bool {
    now - last_mining_time < MINING_WINDOW_SECS
}

/// Seconds until the current window closes (may be negative once expired).
fn time_left(last_mining_time: i64, now: i64) -> i64 {
    last_mining_time + MINING_WINDOW_SECS - now
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    fn session() -> SessionClient {
        SessionClient::new(&Config::default(), KEY_ONE, None).unwrap()
    }

    #[test]
    fn test_window_boundaries() {
        let now = 1_700_086_400;

        // One hour in: active
        assert!(is_active(now - 3_600, now));
        // 25 hours in: inactive
        assert!(!is_active(now - 90_000, now));
        // One second inside the window
        assert!(is_active(now - (MINING_WINDOW_SECS - 1), now));
        // Exactly at the boundary the window is closed
        assert!(!is_active(now - MINING_WINDOW_SECS, now));
    }

    #[test]
    fn test_time_left_arithmetic() {
        let now = 1_700_000_000;
        assert_eq!(time_left(now - 3_600, now), MINING_WINDOW_SECS - 3_600);
        assert!(time_left(now - 90_000, now) < 0);
    }

    #[test]
    fn test_session_derives_checksummed_address() {
        let client = session();
        assert!(client.address().starts_with("0x"));

        let parsed: Address = client.address().parse().unwrap();
        assert_eq!(parsed.to_checksum(None), client.address());
    }

    #[test]
    fn test_nonce_signature_recovers_to_wallet() {
        let client = session();
        let nonce = "Sign this message: 61ca1c7e";

        let signature = client.signer.sign_message_sync(nonce.as_bytes()).unwrap();
        let recovered = signature.recover_address_from_msg(nonce.as_bytes()).unwrap();
        assert_eq!(recovered, client.signer.address());

        // Wire form: 0x + 65 bytes of hex
        let encoded = format!("0x{}", hex::encode(signature.as_bytes()));
        assert_eq!(encoded.len(), 2 + 130);
    }

    #[test]
    fn test_activation_tx_shape() {
        let client = session();
        let tx = client.build_activation_tx(7);

        assert_eq!(tx.chain_id, Some(1125));
        assert_eq!(tx.nonce, 7);
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.gas_limit, 100_000);
        assert_eq!(tx.gas_price, 110_000_000);
        assert_eq!(tx.to, TxKind::Call(client.contract));
        assert_eq!(tx.input.as_ref(), client.selector.as_slice());
    }

    #[test]
    fn test_unauthenticated_calls_refuse_locally() {
        let client = session();
        assert!(matches!(client.bearer(), Err(Error::Auth(_))));
    }
}
