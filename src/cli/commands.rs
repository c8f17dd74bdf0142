//! CLI command implementations

use anyhow::{Context, Result};
use dialoguer::{Confirm, Password};
use std::path::Path;
use tracing::warn;

use crate::client::{wei_to_eth, MiningState};
use crate::config::Config;
use crate::miner::{format_time_left, Orchestrator, UniformDelay, WalletStatus};
use crate::vault::proxy::ProxyId;
use crate::vault::selection::parse_selection;
use crate::vault::{BatchOutcome, ProxyVault, WalletVault};

/// Prompt for the storage password and open both vaults.
///
/// One prompt covers both stores by convention; their salts and keys stay
/// independent.
fn open_vaults(config: &Config) -> Result<(WalletVault, ProxyVault)> {
    let password = Password::new()
        .with_prompt("Storage password")
        .interact()
        .context("failed to read password")?;

    let wallets = WalletVault::open(
        Path::new(&config.storage.wallet_file),
        Path::new(&config.storage.wallet_salt_file),
        &password,
    )?;
    let proxies = ProxyVault::open(
        Path::new(&config.storage.proxy_file),
        Path::new(&config.storage.proxy_salt_file),
        &password,
    )?;

    Ok((wallets, proxies))
}

fn print_batch(label: &str, outcome: &BatchOutcome) {
    println!("\n{label} completed:");
    println!("  Succeeded: {}", outcome.succeeded);
    println!("  Failed:    {}", outcome.failed);
    for error in &outcome.errors {
        println!("  - {error}");
    }
}

/// Add a single wallet; the key is prompted without echo.
pub fn wallet_add(config: &Config) -> Result<()> {
    let (wallets, _) = open_vaults(config)?;

    let key = Password::new()
        .with_prompt("Private key (0x optional)")
        .interact()
        .context("failed to read private key")?;

    let name = wallets.add_wallet(&key)?;
    let (_, address) = wallets.get_wallet(&name)?;
    println!("Added {name}: {address}");
    Ok(())
}

/// Add several comma-separated keys at once.
pub fn wallet_bulk_add(config: &Config) -> Result<()> {
    let (wallets, _) = open_vaults(config)?;

    let keys = Password::new()
        .with_prompt("Private keys, comma separated")
        .interact()
        .context("failed to read private keys")?;

    let outcome = wallets.bulk_add_wallets(&keys);
    print_batch("Import", &outcome);
    Ok(())
}

/// List stored wallets with their proxy binding.
pub fn wallet_list(config: &Config) -> Result<()> {
    let (wallets, proxies) = open_vaults(config)?;

    let listed = wallets.list_wallets()?;
    if listed.is_empty() {
        println!("No wallets stored.");
        return Ok(());
    }

    for (name, address) in listed {
        let proxy = proxies
            .get_proxy_record(&address)?
            .map(|r| r.masked_url())
            .unwrap_or_else(|| "No proxy".to_string());
        println!("{name}: {address} ({proxy})");
    }
    Ok(())
}

/// Remove wallets by selection string.
pub fn wallet_remove(config: &Config, selection: &str) -> Result<()> {
    let (wallets, _) = open_vaults(config)?;
    let outcome = wallets.bulk_remove_wallets(selection)?;
    print_batch("Removal", &outcome);
    Ok(())
}

/// Add comma-separated proxy URLs to the unassigned pool.
pub fn proxy_add(config: &Config, urls: &str) -> Result<()> {
    let (_, proxies) = open_vaults(config)?;
    let outcome = proxies.bulk_add_urls(urls)?;
    print_batch("Proxy import", &outcome);
    Ok(())
}

/// Import wallet-assigned proxies from a CSV file.
pub fn proxy_import_csv(config: &Config, path: &Path) -> Result<()> {
    let (_, proxies) = open_vaults(config)?;
    let outcome = proxies.import_csv(path)?;
    print_batch("CSV import", &outcome);
    Ok(())
}

/// Import wallet-assigned proxies from a JSON file.
pub fn proxy_import_json(config: &Config, path: &Path) -> Result<()> {
    let (_, proxies) = open_vaults(config)?;
    let outcome = proxies.import_json(path)?;
    print_batch("JSON import", &outcome);
    Ok(())
}

/// Rebuild wallet->proxy assignments round-robin over the pool.
pub fn proxy_assign(config: &Config, force: bool) -> Result<()> {
    let (wallets, proxies) = open_vaults(config)?;

    let listed = wallets.list_wallets()?;
    if listed.is_empty() {
        println!("No wallets stored.");
        return Ok(());
    }

    if !force {
        println!("This clears every existing assignment and rebuilds it in sequence.");
        let proceed = Confirm::new()
            .with_prompt(format!("Reassign proxies across {} wallet(s)?", listed.len()))
            .default(false)
            .interact()?;
        if !proceed {
            return Ok(());
        }
    }

    let addresses: Vec<String> = listed.iter().map(|(_, address)| address.clone()).collect();
    let outcome = proxies.auto_assign(&addresses)?;
    print_batch("Auto-assignment", &outcome);

    for (name, address) in &listed {
        let proxy = proxies
            .get_proxy_record(address)?
            .map(|r| r.masked_url())
            .unwrap_or_else(|| "No proxy".to_string());
        println!("{name}: {proxy}");
    }
    Ok(())
}

/// List every stored proxy entry.
pub fn proxy_list(config: &Config) -> Result<()> {
    let (_, proxies) = open_vaults(config)?;

    let listed = proxies.list_proxies()?;
    if listed.is_empty() {
        println!("No proxies stored.");
        return Ok(());
    }

    for (id, record) in listed {
        match id {
            ProxyId::Unassigned(_) => println!("{id} (unassigned): {}", record.masked_url()),
            ProxyId::Assigned(_) => println!("{id}: {}", record.masked_url()),
        }
    }
    Ok(())
}

/// Show proxy usage statistics.
pub fn proxy_stats(config: &Config) -> Result<()> {
    let (_, proxies) = open_vaults(config)?;
    let stats = proxies.proxy_stats()?;

    println!("Unique configurations: {}", stats.total_configs);
    println!("Unassigned pool:       {}", stats.unassigned);
    println!("Assigned to wallets:   {}", stats.assigned);
    if !stats.usage.is_empty() {
        println!("\nUsage:");
        for (proxy, count) in &stats.usage {
            println!("  {proxy}: {count} wallet(s)");
        }
    }
    Ok(())
}

/// Remove a proxy entry by identifier (`proxy_<n>` or wallet address).
pub fn proxy_remove(config: &Config, id: &str) -> Result<()> {
    let (_, proxies) = open_vaults(config)?;
    let id = ProxyId::from_key(id);
    proxies.remove_proxy(&id)?;
    println!("Removed {id}");
    Ok(())
}

/// Run mining for the selected wallets (all when no selection given).
pub async fn mine(config: &Config, selection: Option<&str>) -> Result<()> {
    let (wallets, proxies) = open_vaults(config)?;

    let listed = wallets.list_wallets()?;
    if listed.is_empty() {
        println!("No wallets stored. Add one first.");
        return Ok(());
    }

    let selected: Vec<(String, String)> = match selection {
        Some(selection) => {
            let numbers = parse_selection(selection)?;
            let mut picked = Vec::new();
            for number in numbers {
                let name = format!("Wallet_{number}");
                match listed.iter().find(|(n, _)| n == &name) {
                    Some(pair) => picked.push(pair.clone()),
                    None => warn!("No wallet numbered {}, skipping", number),
                }
            }
            picked
        }
        None => listed,
    };

    if selected.is_empty() {
        println!("Selection matched no wallets.");
        return Ok(());
    }

    let orchestrator = Orchestrator::new(config, &wallets, &proxies);
    let mut delays = UniformDelay::from_config(&config.mining);
    let summary = orchestrator.run_mining(&selected, &mut delays).await;

    println!("\n=== Mining Summary ===");
    println!("Processed:       {}", summary.processed);
    println!("Started:         {}", summary.started);
    println!("Already mining:  {}", summary.skipped);
    println!("Errored:         {}", summary.errored);
    println!("Combined reward: {}", summary.combined_reward);

    for outcome in &summary.outcomes {
        println!("\n{} ({})", outcome.wallet, outcome.address);
        println!("  Proxy:  {}", outcome.proxy);
        println!("  Status: {}", outcome.status);
        if let Some(left) = outcome.time_left_secs {
            println!("  Time left: {}", format_time_left(left));
        }
        if !matches!(outcome.status, WalletStatus::Error(_)) {
            println!(
                "  Reward: {} -> {} ({:+})",
                outcome.initial_reward,
                outcome.final_reward,
                outcome.reward_change()
            );
        }
    }
    Ok(())
}

/// Check mining status and rewards for every stored wallet.
pub async fn status(config: &Config) -> Result<()> {
    let (wallets, proxies) = open_vaults(config)?;
    let orchestrator = Orchestrator::new(config, &wallets, &proxies);

    let report = orchestrator.status_sweep().await?;
    if report.accounts.is_empty() {
        println!("No wallets stored.");
        return Ok(());
    }

    println!("\n=== Account Status ===");
    println!("Accounts:     {}", report.accounts.len());
    println!("Active:       {}", report.active);
    println!("Total reward: {}", report.total_reward);

    for account in &report.accounts {
        println!("\n{} ({})", account.wallet, account.address);
        println!("  Proxy: {}", account.proxy);
        match (&account.state, &account.error) {
            (Some(MiningState::Active { time_left_secs, total_secs }), _) => {
                println!("  Mining: Active");
                println!("  Time left: {}", format_time_left(*time_left_secs));
                println!("  Total mining time: {:.1}h", *total_secs as f64 / 3600.0);
            }
            (Some(MiningState::Inactive { .. }), _) => println!("  Mining: Inactive"),
            (None, Some(error)) => println!("  Mining: Error ({error})"),
            (None, None) => println!("  Mining: Unknown"),
        }
        println!("  Reward: {}", account.reward);
        if let Some(user) = &account.user {
            println!("  Invitation code: {}", user.invitation_code);
            println!("  Invites: {}", user.invite_count);
        }
    }
    Ok(())
}

/// Show one wallet's on-chain balance.
pub async fn balance(config: &Config, wallet: &str) -> Result<()> {
    let (wallets, proxies) = open_vaults(config)?;

    let (private_key, address) = wallets.get_wallet(wallet)?;
    let endpoint = proxies.get_proxy_record(&address)?.map(|r| r.endpoint());

    let client = crate::client::SessionClient::new(config, &private_key, endpoint.as_ref())?;
    let wei = client.get_balance().await?;
    println!("{wallet} ({address}): {:.6}", wei_to_eth(wei));
    Ok(())
}
