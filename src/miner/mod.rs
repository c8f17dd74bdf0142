//! Batch mining orchestration
//!
//! Drives a selection of wallets through login and activation, one at a
//! time, in randomized order with a randomized pause before each turn.
//! The pacing exists to avoid bursty, fingerprintable request patterns,
//! not for throughput. The pause policy is injected via `DelayStrategy`.

use rand::prelude::*;
use rand::rngs::StdRng;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::client::{MiningState, SessionClient, MINING_WINDOW_SECS};
use crate::client::api::UserInfo;
use crate::config::{Config, MiningConfig};
use crate::error::Result;
use crate::vault::{ProxyVault, WalletVault};

/// Pause policy applied before each wallet's turn
pub trait DelayStrategy: Send {
    fn next_delay(&mut self) -> Duration;
}

/// Uniform random pause, 1-20 seconds by default
pub struct UniformDelay {
    min_secs: u64,
    max_secs: u64,
    rng: StdRng,
}

impl UniformDelay {
    pub fn new(min_secs: u64, max_secs: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            min_secs,
            max_secs,
            rng,
        }
    }

    pub fn from_config(config: &MiningConfig) -> Self {
        Self::new(config.delay_min_secs, config.delay_max_secs, None)
    }
}

impl DelayStrategy for UniformDelay {
    fn next_delay(&mut self) -> Duration {
        Duration::from_secs(self.rng.gen_range(self.min_secs..=self.max_secs))
    }
}

/// No pause. For tests and status sweeps.
pub struct NoDelay;

impl DelayStrategy for NoDelay {
    fn next_delay(&mut self) -> Duration {
        Duration::ZERO
    }
}

/// Final state of one wallet within a run
#[derive(Debug, Clone, PartialEq)]
pub enum WalletStatus {
    /// Activation transaction and API reconciliation both succeeded
    Started,
    /// The 24-hour window was already open; activation skipped
    AlreadyMining,
    /// Login, query or activation failed; the run continued
    Error(String),
}

impl std::fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletStatus::Started => write!(f, "Mining Started"),
            WalletStatus::AlreadyMining => write!(f, "Already Mining"),
            WalletStatus::Error(e) => write!(f, "Error: {e}"),
        }
    }
}

/// Per-wallet outcome of a mining run
#[derive(Debug, Clone)]
pub struct WalletOutcome {
    pub wallet: String,
    pub address: String,
    /// Masked proxy URL, or "No proxy"
    pub proxy: String,
    pub status: WalletStatus,
    /// Seconds until the current window closes
    pub time_left_secs: Option<i64>,
    /// Accumulated mining seconds reported by the service
    pub total_secs: Option<i64>,
    pub initial_reward: f64,
    pub final_reward: f64,
}

impl WalletOutcome {
    pub fn reward_change(&self) -> f64 {
        self.final_reward - self.initial_reward
    }
}

/// Aggregated result of one mining run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub processed: usize,
    pub started: usize,
    pub skipped: usize,
    pub errored: usize,
    /// Sum of final total-reward readings across successful wallets
    pub combined_reward: f64,
    pub outcomes: Vec<WalletOutcome>,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: Vec<WalletOutcome>) -> Self {
        let mut summary = RunSummary {
            processed: outcomes.len(),
            ..Default::default()
        };

        for outcome in &outcomes {
            match outcome.status {
                WalletStatus::Started => {
                    summary.started += 1;
                    summary.combined_reward += outcome.final_reward;
                }
                WalletStatus::AlreadyMining => {
                    summary.skipped += 1;
                    summary.combined_reward += outcome.final_reward;
                }
                WalletStatus::Error(_) => summary.errored += 1,
            }
        }

        summary.outcomes = outcomes;
        summary
    }
}

/// Per-account entry of a status sweep
#[derive(Debug, Clone)]
pub struct AccountStatus {
    pub wallet: String,
    pub address: String,
    pub proxy: String,
    pub state: Option<MiningState>,
    pub reward: f64,
    pub user: Option<UserInfo>,
    pub error: Option<String>,
}

/// Aggregated result of a status sweep
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub accounts: Vec<AccountStatus>,
    pub active: usize,
    pub total_reward: f64,
}

/// Drives SessionClients over vault-backed wallets
pub struct Orchestrator<'a> {
    config: &'a Config,
    wallets: &'a WalletVault,
    proxies: &'a ProxyVault,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, wallets: &'a WalletVault, proxies: &'a ProxyVault) -> Self {
        Self {
            config,
            wallets,
            proxies,
        }
    }

    /// Run mining over the selected (name, address) pairs.
    ///
    /// Wallets are processed sequentially in shuffled order, pausing per
    /// the delay strategy before each turn. One wallet's failure is
    /// recorded and the run moves on.
    pub async fn run_mining(
        &self,
        selected: &[(String, String)],
        delays: &mut dyn DelayStrategy,
    ) -> RunSummary {
        let mut order: Vec<(String, String)> = selected.to_vec();
        order.shuffle(&mut rand::thread_rng());

        info!(
            "Starting mining run over {} wallet(s), randomized order",
            order.len()
        );

        let mut outcomes = Vec::with_capacity(order.len());
        for (name, address) in &order {
            let delay = delays.next_delay();
            if !delay.is_zero() {
                info!("Waiting {}s before {}", delay.as_secs(), name);
                tokio::time::sleep(delay).await;
            }

            let outcome = match self.process_wallet(name, address).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("{} failed: {}", name, e);
                    WalletOutcome {
                        wallet: name.clone(),
                        address: address.clone(),
                        proxy: self.proxy_label(address),
                        status: WalletStatus::Error(e.to_string()),
                        time_left_secs: None,
                        total_secs: None,
                        initial_reward: 0.0,
                        final_reward: 0.0,
                    }
                }
            };

            info!("{}: {}", name, outcome.status);
            outcomes.push(outcome);
        }

        RunSummary::from_outcomes(outcomes)
    }

    async fn process_wallet(&self, name: &str, address: &str) -> Result<WalletOutcome> {
        let (private_key, _) = self.wallets.get_wallet(name)?;
        let proxy_record = self.proxies.get_proxy_record(address)?;

        let proxy_label = match &proxy_record {
            Some(record) => record.masked_url(),
            None => {
                warn!("No proxy configured for {}", name);
                "No proxy".to_string()
            }
        };

        let endpoint = proxy_record.as_ref().map(|r| r.endpoint());
        let mut client = SessionClient::new(self.config, &private_key, endpoint.as_ref())?;
        client.login().await?;

        let initial_reward = client.get_user_info().await?.total_reward;

        match client.mining_state().await? {
            MiningState::Active {
                time_left_secs,
                total_secs,
            } => {
                let final_reward = client.get_user_info().await?.total_reward;
                Ok(WalletOutcome {
                    wallet: name.to_string(),
                    address: address.to_string(),
                    proxy: proxy_label,
                    status: WalletStatus::AlreadyMining,
                    time_left_secs: Some(time_left_secs),
                    total_secs: Some(total_secs),
                    initial_reward,
                    final_reward,
                })
            }
            MiningState::Inactive { .. } => {
                client.activate_mining().await?;

                // Give the service a moment before the final reward read
                tokio::time::sleep(Duration::from_secs(self.config.mining.settle_wait_secs)).await;
                let final_reward = client.get_user_info().await?.total_reward;

                Ok(WalletOutcome {
                    wallet: name.to_string(),
                    address: address.to_string(),
                    proxy: proxy_label,
                    status: WalletStatus::Started,
                    time_left_secs: Some(MINING_WINDOW_SECS),
                    total_secs: Some(0),
                    initial_reward,
                    final_reward,
                })
            }
        }
    }

    /// Check every stored wallet without activating anything.
    pub async fn status_sweep(&self) -> Result<StatusReport> {
        let wallets = self.wallets.list_wallets()?;
        let mut report = StatusReport::default();

        info!("Checking status for {} account(s)", wallets.len());

        for (name, address) in &wallets {
            let entry = match self.sweep_one(name, address).await {
                Ok(entry) => entry,
                Err(e) => {
                    error!("{} failed: {}", name, e);
                    AccountStatus {
                        wallet: name.clone(),
                        address: address.clone(),
                        proxy: self.proxy_label(address),
                        state: None,
                        reward: 0.0,
                        user: None,
                        error: Some(e.to_string()),
                    }
                }
            };

            if matches!(entry.state, Some(MiningState::Active { .. })) {
                report.active += 1;
            }
            report.total_reward += entry.reward;
            report.accounts.push(entry);
        }

        Ok(report)
    }

    async fn sweep_one(&self, name: &str, address: &str) -> Result<AccountStatus> {
        let (private_key, _) = self.wallets.get_wallet(name)?;
        let proxy_record = self.proxies.get_proxy_record(address)?;
        let proxy_label = proxy_record
            .as_ref()
            .map(|r| r.masked_url())
            .unwrap_or_else(|| "No proxy".to_string());

        let endpoint = proxy_record.as_ref().map(|r| r.endpoint());
        let mut client = SessionClient::new(self.config, &private_key, endpoint.as_ref())?;
        client.login().await?;

        let user = client.get_user_info().await?;
        let state = client.mining_state().await?;

        Ok(AccountStatus {
            wallet: name.to_string(),
            address: address.to_string(),
            proxy: proxy_label,
            state: Some(state),
            reward: user.total_reward,
            user: Some(user),
            error: None,
        })
    }

    fn proxy_label(&self, address: &str) -> String {
        self.proxies
            .get_proxy_record(address)
            .ok()
            .flatten()
            .map(|r| r.masked_url())
            .unwrap_or_else(|| "No proxy".to_string())
    }
}

/// Human form of a remaining-time value: "23h 59m", or "Ready" once the
/// window has expired.
pub fn format_time_left(secs: i64) -> String {
    if secs <= 0 {
        return "Ready".to_string();
    }
    format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: WalletStatus, final_reward: f64) -> WalletOutcome {
        WalletOutcome {
            wallet: "Wallet_1".to_string(),
            address: "0xabc".to_string(),
            proxy: "No proxy".to_string(),
            status,
            time_left_secs: None,
            total_secs: None,
            initial_reward: 1.0,
            final_reward,
        }
    }

    #[test]
    fn test_uniform_delay_stays_in_range() {
        let mut delays = UniformDelay::new(1, 20, Some(42));
        for _ in 0..200 {
            let delay = delays.next_delay();
            assert!(delay.as_secs() >= 1);
            assert!(delay.as_secs() <= 20);
        }
    }

    #[test]
    fn test_uniform_delay_deterministic_with_seed() {
        let mut a = UniformDelay::new(1, 20, Some(7));
        let mut b = UniformDelay::new(1, 20, Some(7));
        for _ in 0..20 {
            assert_eq!(a.next_delay(), b.next_delay());
        }
    }

    #[test]
    fn test_no_delay_is_zero() {
        assert_eq!(NoDelay.next_delay(), Duration::ZERO);
    }

    #[test]
    fn test_summary_counts_by_status() {
        let summary = RunSummary::from_outcomes(vec![
            outcome(WalletStatus::Started, 10.0),
            outcome(WalletStatus::AlreadyMining, 5.0),
            outcome(WalletStatus::AlreadyMining, 5.0),
            outcome(WalletStatus::Error("login rejected".to_string()), 0.0),
        ]);

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.started, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.combined_reward, 20.0);
    }

    #[test]
    fn test_reward_change() {
        let entry = outcome(WalletStatus::Started, 11.5);
        assert_eq!(entry.reward_change(), 10.5);
    }

    #[test]
    fn test_format_time_left() {
        assert_eq!(format_time_left(86_340), "23h 59m");
        assert_eq!(format_time_left(3_660), "1h 1m");
        assert_eq!(format_time_left(0), "Ready");
        assert_eq!(format_time_left(-5), "Ready");
    }
}
