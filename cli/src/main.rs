// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Meridian CLI
//!
//! Entry point for the `meridian` binary. Parses CLI arguments, initializes
//! logging, loads the client config, and runs one subcommand:
//!
//! - `keygen`        — generate a private key
//! - `freeze`        — build a transaction and freeze it for several nodes
//! - `sign`          — produce detached signatures for an envelope
//! - `add-signature` — attach detached signatures
//! - `inspect`       — show records, hashes and signatures
//! - `strip`         — remove all signatures into a snapshot
//! - `restore`       — put a snapshot back
//! - `submit`        — execute against the network
//! - `version`       — print build version information

mod cli;
mod interchange;
mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use meridian_sdk::crypto::{KeyAlgorithm, PrivateKey};
use meridian_sdk::execution::ExecutionMetrics;
use meridian_sdk::transaction::{RawOperation, Signatures, TransactionBuilder};
use meridian_sdk::{Client, ClientConfig, TcpTransport, TransactionId};

use cli::{Algorithm, Commands, MeridianCli};
use interchange::{EnvelopeReport, KeySignatures, SignatureSnapshot};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MeridianCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Keygen(args) => keygen(args),
        Commands::Freeze(args) => freeze(args, config),
        Commands::Sign(args) => sign(args),
        Commands::AddSignature(args) => add_signature(args),
        Commands::Inspect(args) => inspect(args),
        Commands::Strip(args) => strip(args),
        Commands::Restore(args) => restore(args),
        Commands::Submit(args) => submit(args, config).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = ClientConfig::from_json(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(config)
}

fn client(config: ClientConfig) -> Result<Client> {
    Client::from_config(config, Arc::new(TcpTransport::new())).context("failed to set up network")
}

fn output_path(out: Option<PathBuf>, input: &Path) -> PathBuf {
    out.unwrap_or_else(|| input.to_path_buf())
}

fn read_key(inline: Option<String>, file: Option<PathBuf>) -> Result<PrivateKey> {
    let text = match (inline, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read key file {}", path.display()))?,
        (None, None) => bail!("a private key is required (--key, --key-file or MERIDIAN_KEY)"),
    };
    text.trim().parse().context("invalid private key")
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let algorithm = match args.algorithm {
        Algorithm::Ed25519 => KeyAlgorithm::Ed25519,
        Algorithm::Secp256k1 => KeyAlgorithm::EcdsaSecp256k1,
    };
    let key = PrivateKey::generate(algorithm);

    match args.out {
        Some(path) => {
            std::fs::write(&path, key.to_prefixed_hex() + "\n")
                .with_context(|| format!("failed to write key to {}", path.display()))?;

            // Restrict permissions on Unix.
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
            }

            println!("Private key : {}", path.display());
        }
        None => println!("Private key : {}", key.to_prefixed_hex()),
    }
    println!("Public key  : {}", key.public_key());
    Ok(())
}

fn freeze(args: cli::FreezeArgs, config: ClientConfig) -> Result<()> {
    let payload = hex::decode(&args.payload).context("--payload must be hex")?;

    let mut builder = TransactionBuilder::new(RawOperation::new(args.kind, payload))
        .transaction_id(TransactionId::generate(args.payer))
        .memo(args.memo)
        .node_account_ids(args.nodes);
    if let Some(fee) = args.max_fee {
        builder = builder.max_fee(fee);
    }
    if let Some(secs) = args.valid_duration {
        builder = builder.valid_duration(Duration::from_secs(secs));
    }

    let envelope = client(config)?
        .freeze(builder.build())
        .context("failed to freeze transaction")?;
    interchange::write_envelope(&args.out, &envelope)?;

    tracing::info!(nodes = envelope.len(), out = %args.out.display(), "envelope frozen");
    println!(
        "Frozen {} for nodes {}",
        envelope
            .transaction_id()
            .map(|id| id.to_string())
            .unwrap_or_default(),
        join(envelope.node_account_ids())
    );
    Ok(())
}

fn sign(args: cli::SignArgs) -> Result<()> {
    let envelope = interchange::read_envelope(&args.envelope)?;
    let key = read_key(args.key, args.key_file)?;
    let signatures = envelope.sign(&key).context("failed to sign envelope")?;
    let detached = KeySignatures::new(key.public_key(), &signatures);

    match args.out {
        Some(path) => {
            interchange::write_json(&path, &detached)?;
            eprintln!("Wrote {} signatures to {}", signatures.len(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&detached)?),
    }
    Ok(())
}

fn add_signature(args: cli::AddSignatureArgs) -> Result<()> {
    let mut envelope = interchange::read_envelope(&args.envelope)?;

    for path in &args.signatures {
        let detached: KeySignatures = interchange::read_json(path)?;
        envelope
            .add_signature(
                &detached.public_key,
                Signatures::Many(detached.decode_signatures()?),
            )
            .with_context(|| format!("cannot attach {}", path.display()))?;
        tracing::info!(public_key = %detached.public_key, "signatures attached");
    }
    envelope
        .verify_signatures()
        .context("an attached signature does not verify")?;

    let out = output_path(args.out, &args.envelope);
    interchange::write_envelope(&out, &envelope)
}

fn inspect(args: cli::InspectArgs) -> Result<()> {
    let envelope = interchange::read_envelope(&args.envelope)?;
    let report = EnvelopeReport::new(&envelope);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Transaction : {}",
        report.transaction_id.as_deref().unwrap_or("-")
    );
    println!(
        "Signatures  : {}",
        if report.signatures_valid { "valid" } else { "INVALID" }
    );
    for record in &report.records {
        println!();
        println!("Node {}", record.node_id);
        println!("  hash : {}", record.transaction_hash);
        println!("  body : {} bytes", record.body_len);
        for entry in &record.signatures {
            println!("  {} x{}", entry.public_key, entry.signatures.len());
        }
    }
    Ok(())
}

fn strip(args: cli::StripArgs) -> Result<()> {
    let mut envelope = interchange::read_envelope(&args.envelope)?;
    let removed = envelope
        .remove_all_signatures()
        .context("failed to remove signatures")?;

    interchange::write_json(&args.snapshot, &SignatureSnapshot::new(&envelope, &removed))?;
    let out = output_path(args.out, &args.envelope);
    interchange::write_envelope(&out, &envelope)?;

    println!("Removed signatures of {} keys", removed.len());
    for (key, signatures) in removed.iter() {
        println!("  {key} x{}", signatures.len());
    }
    Ok(())
}

fn restore(args: cli::RestoreArgs) -> Result<()> {
    let mut envelope = interchange::read_envelope(&args.envelope)?;
    let snapshot: SignatureSnapshot = interchange::read_json(&args.snapshot)?;

    let node_ids: Vec<String> = envelope
        .node_account_ids()
        .iter()
        .map(ToString::to_string)
        .collect();
    let snapshot_ids: Vec<&String> = snapshot.records.iter().map(|r| &r.node_id).collect();
    if snapshot_ids != node_ids.iter().collect::<Vec<_>>() {
        bail!("snapshot was taken from a different envelope");
    }

    envelope
        .restore_signatures(&snapshot.to_removed()?)
        .context("failed to restore signatures")?;
    envelope
        .verify_signatures()
        .context("a restored signature does not verify")?;

    let out = output_path(args.out, &args.envelope);
    interchange::write_envelope(&out, &envelope)
}

async fn submit(args: cli::SubmitArgs, mut config: ClientConfig) -> Result<()> {
    if let Some(deadline) = args.deadline_ms {
        config.deadline_ms = deadline;
    }
    let mut envelope = interchange::read_envelope(&args.envelope)?;

    let metrics = ExecutionMetrics::new().context("failed to create metrics")?;
    let mut client = client(config)?.with_metrics(metrics);
    if let (Some(id), Some(key)) = (args.operator_id, args.operator_key) {
        let key: PrivateKey = key.trim().parse().context("invalid operator key")?;
        client = client.with_operator(id, key);
    }

    tracing::info!(
        nodes = envelope.len(),
        network_size = client.network().len(),
        "submitting envelope"
    );
    let result = client.execute(&mut envelope).await;

    if args.metrics {
        if let Some(metrics) = client.metrics() {
            eprintln!("{}", metrics.encode()?);
        }
    }

    let response = result.context("submission failed")?;
    println!("Status      : {}", response.status);
    println!("Node        : {}", response.node_id);
    println!("Attempts    : {}", response.attempts);
    println!("Hash        : {}", hex::encode(response.transaction_hash));
    if let Some(id) = response.transaction_id {
        println!("Transaction : {id}");
    }
    Ok(())
}

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Prints version information to stdout.
fn print_version() {
    println!("meridian     {}", env!("CARGO_PKG_VERSION"));
    println!("envelope fmt {}", meridian_sdk::config::ENVELOPE_FORMAT_VERSION);
    println!("rustc        {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
