//! Telepath - Custodial UTXO Wallet Core
//!
//! Run modes:
//!   telepath run                          - Run the balance monitor until Ctrl+C
//!   telepath balance <addr>               - One refresh, then print the balance
//!   telepath reserve <addr> <sats>        - One refresh, then reserve funds
//!   telepath spend <addr> <id> <dest>     - One refresh, then spend a reservation
//!   telepath seen <addr>                  - Record an address observation for discovery

use std::env;
use std::process;

use telepath::logging::{self, LogEvent, LogLevel};
use telepath::types::ErrorResponse;
use telepath::{
    ReserveRequest, Result, SingleKeySigner, SpendRequest, TelepathConfig, Wallet, WalletError,
};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let outcome = match args[1].as_str() {
        "run" => run_monitor().await,
        "balance" => run_balance(&args[2..]).await,
        "reserve" => run_reserve(&args[2..]).await,
        "spend" => run_spend(&args[2..]).await,
        "seen" => run_seen(&args[2..]).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    };

    if let Err(e) = outcome {
        let body = ErrorResponse::from(&e);
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| e.to_string())
        );
        process::exit(1);
    }
}

fn print_usage() {
    println!("Telepath - Custodial UTXO Wallet Core");
    println!();
    println!("Usage:");
    println!("  telepath run                        Run the balance monitor until Ctrl+C");
    println!("  telepath balance <addr>             Print balance net of reservations");
    println!("  telepath reserve <addr> <sats>      Reserve funds on an address");
    println!("  telepath spend <addr> <id> <dest>   Spend a reservation to <dest>");
    println!("  telepath seen <addr>                Record an address observation");
    println!();
    println!("Environment Variables:");
    println!("  TELEPATH_NETWORK          mainnet | testnet | regtest (default: mainnet)");
    println!("  TELEPATH_EXPLORER_URL     Ledger explorer base URL");
    println!("  TELEPATH_PUSH_URL         Transaction push endpoint");
    println!("  TELEPATH_RESERVE_DB       Reservation database path");
    println!("  TELEPATH_SEEN_DB          Seen-address database path");
    println!("  TELEPATH_FIXED_FEE_SATS   Fee deducted from each spend (default: 20400)");
    println!("  TELEPATH_SIGNING_KEY      WIF or hex private key (spend only)");
    println!("  TELEPATH_LOG_LEVEL        trace | debug | info | warn | error");
    println!("  TELEPATH_LOG_JSON         1 for JSON log output");
}

/// Load configuration and initialize logging
fn bootstrap() -> Result<TelepathConfig> {
    let config = TelepathConfig::from_env()?;
    logging::init_from_config(&config)?;
    Ok(config)
}

/// Build the wallet and run one refresh covering `address`
async fn wallet_for(config: &TelepathConfig, address: &str) -> Result<Wallet> {
    let wallet = Wallet::from_config(config)?;
    wallet
        .monitor()
        .register_addresses(vec![address.to_string()])
        .await;
    wallet.monitor().refresh_balances().await?;
    Ok(wallet)
}

fn required<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| WalletError::validation(format!("missing argument <{}>", name)))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to render output: {}", e),
    }
}

async fn run_monitor() -> Result<()> {
    let config = bootstrap()?;
    config.print_summary();

    let wallet = Wallet::from_config(&config)?;
    let monitor = wallet.monitor().clone();
    let handle = monitor.clone().spawn();

    tracing::info!(
        target: "telepath::monitor",
        "{}",
        LogEvent::new(LogLevel::Info, logging::EventCategory::System, "startup").to_json()
    );
    println!("Monitoring addresses seen in the last {}s", config.discovery_window.as_secs());
    println!("Press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "telepath::monitor", error = %e, "failed to listen for Ctrl+C");
    }

    monitor.stop().await;
    if let Err(e) = handle.await {
        tracing::warn!(target: "telepath::monitor", error = %e, "monitor task ended abnormally");
    }

    tracing::info!(
        target: "telepath::monitor",
        "{}",
        LogEvent::new(LogLevel::Info, logging::EventCategory::System, "shutdown").to_json()
    );
    Ok(())
}

async fn run_balance(args: &[String]) -> Result<()> {
    let address = required(args, 0, "addr")?;
    let config = bootstrap()?;
    let wallet = wallet_for(&config, address).await?;

    print_json(&wallet.balance(address).await?);
    Ok(())
}

async fn run_reserve(args: &[String]) -> Result<()> {
    let address = required(args, 0, "addr")?;
    let amount = telepath::units::parse_sats(required(args, 1, "sats")?)
        .ok_or_else(|| WalletError::validation("<sats> must be an integer amount"))?;

    let config = bootstrap()?;
    let wallet = wallet_for(&config, address).await?;

    print_json(&wallet.reserve(address, &ReserveRequest { amount }).await?);
    Ok(())
}

async fn run_spend(args: &[String]) -> Result<()> {
    let address = required(args, 0, "addr")?;
    let reservation_id = required(args, 1, "id")?;
    let destination = required(args, 2, "dest")?;

    let config = bootstrap()?;
    let encoded_key = env::var("TELEPATH_SIGNING_KEY")
        .map_err(|_| WalletError::Config(telepath::ConfigError::MissingEnvVar(
            "TELEPATH_SIGNING_KEY".to_string(),
        )))?;
    let signer = SingleKeySigner::parse(&encoded_key, config.network.bitcoin_network())?;

    let wallet = wallet_for(&config, address).await?;
    let request = SpendRequest {
        destination_account: destination.to_string(),
    };

    print_json(
        &wallet
            .spend(address, reservation_id, &request, signer.private_key())
            .await?,
    );
    Ok(())
}

async fn run_seen(args: &[String]) -> Result<()> {
    let address = required(args, 0, "addr")?;
    let config = bootstrap()?;

    let wallet = Wallet::from_config(&config)?;
    wallet.record_seen(address).await?;
    println!("recorded {}", address);
    Ok(())
}
