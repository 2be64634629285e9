//! Block verification sentry.
//!
//! Attests to execution blocks on behalf of one committee member:
//!
//! 1. Subscribe to verification requests from the consensus extension
//! 2. Wait for the requested block on the execution node
//! 3. Derive the block's receipts root from its receipts
//! 4. Sign the attestation with the validator's BLS key
//! 5. Submit the signed attestation back to the consensus extension
//!
//! ## Architecture
//!
//! ```text
//!   CL ext        Sentry               EL
//!   |              |                   |
//!   |--request---->|                   |
//!   |              |--block, receipts->|
//!   |              |<------------------|
//!   |              |                   |
//!   |     (receipts root + sign)       |
//!   |              |                   |
//!   |<--attestation|                   |
//! ```

use std::path::PathBuf;

use anyhow::{Context, bail};
use attestor_bls::SecretKeyBytes;
use clap::{Parser, Subcommand};
use futures::future::select_all;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use verification_sentry::{Config, ElClient, SubmitClient, VerificationService};

#[derive(Parser, Debug)]
#[command(name = "verification-sentry")]
#[command(about = "Attest to execution blocks pushed by a consensus extension")]
struct Cli {
    #[arg(long, short, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// BLS secret key, 32 bytes big-endian hex.
    #[arg(
        long,
        env = "ATTESTOR_BLS_SECRET_KEY",
        hide_env_values = true,
        global = true
    )]
    bls_secret_key: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the sentry (default).
    Run,
    /// Print the public key derived from the BLS secret key.
    Pubkey,
    /// Generate a fresh BLS key pair.
    Keygen,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    attestor_bls::init_once()?;
    debug!(ready = attestor_bls::is_initialized(), "BLS backend self-test passed");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&cli.config, secret_key(cli.bls_secret_key.as_deref())?).await,
        Command::Pubkey => {
            let secret = secret_key(cli.bls_secret_key.as_deref())?;
            let (_, public_key) = attestor_bls::derive_public_key(secret.as_be_bytes())?;
            println!("{public_key}");
            Ok(())
        }
        Command::Keygen => {
            let secret = attestor_bls::generate_secret_key()?;
            let (_, public_key) = attestor_bls::derive_public_key(secret.as_be_bytes())?;
            println!("secret_key: 0x{}", secret.to_hex());
            println!("public_key: {public_key}");
            Ok(())
        }
    }
}

fn secret_key(hex: Option<&str>) -> anyhow::Result<SecretKeyBytes> {
    let Some(hex) = hex else {
        bail!("BLS secret key missing, pass --bls-secret-key or set ATTESTOR_BLS_SECRET_KEY");
    };
    SecretKeyBytes::from_hex(hex).context("invalid BLS secret key")
}

async fn run(config_path: &PathBuf, secret: SecretKeyBytes) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;

    info!(
        subscription_url = %config.subscription_url,
        execution_url = %config.execution_url,
        submission_url = %config.submission_url,
        namespace = %config.rpc_namespace,
        max_retries = config.max_retries,
        "Loaded configuration"
    );

    let el_client = ElClient::new(config.execution_url.clone(), config.request_timeout())?;
    let submit_client = SubmitClient::new(
        config.submission_url.clone(),
        config.methods().submit,
        config.request_timeout(),
    )?;

    let service = VerificationService::new(&config, secret, el_client, submit_client)?;
    info!(pubkey = %service.public_key(), "Validator key loaded");

    let shutdown_token = CancellationToken::new();

    let mut handle = {
        let shutdown_token = shutdown_token.clone();
        tokio::spawn(async move { service.run(shutdown_token).await })
    };

    let mut signals: Vec<_> = [SignalKind::interrupt(), SignalKind::terminate()]
        .into_iter()
        .filter_map(|kind| signal(kind).ok())
        .collect();

    if signals.is_empty() {
        bail!("No shutdown signals could be registered");
    }

    let result = tokio::select! {
        result = &mut handle => result,
        _ = select_all(signals.iter_mut().map(|s| Box::pin(s.recv()))) => {
            info!("Received shutdown signal, shutting down");
            shutdown_token.cancel();
            handle.await
        }
    };

    match result.context("verification service panicked")? {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "Verification service stopped");
            Err(e.into())
        }
    }
}
