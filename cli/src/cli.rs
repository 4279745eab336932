//! # CLI Interface
//!
//! Defines the command-line argument structure for `meridian` using `clap`
//! derive. The subcommands follow the offline multi-signature workflow:
//! `freeze` an envelope, pass it around for `sign`, collect with
//! `add-signature`, look at it with `inspect`, and finally `submit`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use meridian_sdk::account::AccountId;

use crate::logging::LogFormat;

/// Meridian multi-node transaction tool.
///
/// Builds transactions for several nodes at once, collects signatures from
/// independent (possibly offline) signers, and submits the result to the
/// first healthy node.
#[derive(Parser, Debug)]
#[command(
    name = "meridian",
    about = "Meridian multi-node transaction tool",
    version,
    propagate_version = true
)]
pub struct MeridianCli {
    /// Client configuration file (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', global = true, env = "MERIDIAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, env = "MERIDIAN_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default log level when `RUST_LOG` is not set.
    #[arg(long, global = true, env = "MERIDIAN_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new private key.
    Keygen(KeygenArgs),
    /// Build a transaction and freeze it into an envelope file.
    Freeze(FreezeArgs),
    /// Produce detached signatures for every record of an envelope.
    Sign(SignArgs),
    /// Attach detached signatures to an envelope.
    AddSignature(AddSignatureArgs),
    /// Show records, hashes and signatures of an envelope.
    Inspect(InspectArgs),
    /// Remove every signature, saving them to a snapshot file.
    Strip(StripArgs),
    /// Put back the signatures saved by `strip`.
    Restore(RestoreArgs),
    /// Submit an envelope to the network.
    Submit(SubmitArgs),
    /// Print version information and exit.
    Version,
}

/// Signing algorithms accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    Ed25519,
    Secp256k1,
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    #[arg(long, short = 'a', value_enum, default_value_t = Algorithm::Ed25519)]
    pub algorithm: Algorithm,

    /// Write the private key here (mode 0600) instead of printing it.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct FreezeArgs {
    /// Paying account, e.g. `0.0.1001`.
    #[arg(long, env = "MERIDIAN_OPERATOR_ID")]
    pub payer: AccountId,

    /// Target nodes, comma separated. Defaults to the client's node choice.
    #[arg(long, value_delimiter = ',')]
    pub nodes: Vec<AccountId>,

    /// Operation kind, e.g. `crypto_transfer`.
    #[arg(long)]
    pub kind: String,

    /// Hex-encoded operation payload.
    #[arg(long, default_value = "")]
    pub payload: String,

    #[arg(long, default_value = "")]
    pub memo: String,

    /// Max fee in the smallest unit.
    #[arg(long)]
    pub max_fee: Option<u64>,

    /// Validity window in seconds.
    #[arg(long)]
    pub valid_duration: Option<u64>,

    /// Envelope output file.
    #[arg(long, short = 'o')]
    pub out: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SignArgs {
    /// Envelope file.
    #[arg(long, short = 'e')]
    pub envelope: PathBuf,

    /// Private key (`ed25519:<hex>` / `secp256k1:<hex>`).
    ///
    /// **Prefer `--key-file`**: arguments end up in shell history.
    #[arg(long, env = "MERIDIAN_KEY", conflicts_with = "key_file")]
    pub key: Option<String>,

    /// File holding the private key.
    #[arg(long)]
    pub key_file: Option<PathBuf>,

    /// Signatures output file (JSON). Printed to stdout when omitted.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct AddSignatureArgs {
    #[arg(long, short = 'e')]
    pub envelope: PathBuf,

    /// Detached signature files produced by `sign`.
    #[arg(long, short = 's', required = true, num_args = 1..)]
    pub signatures: Vec<PathBuf>,

    /// Output file. Overwrites the input envelope when omitted.
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    #[arg(long, short = 'e')]
    pub envelope: PathBuf,

    /// Emit JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct StripArgs {
    #[arg(long, short = 'e')]
    pub envelope: PathBuf,

    /// Where the removed signatures go (JSON).
    #[arg(long)]
    pub snapshot: PathBuf,

    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct RestoreArgs {
    #[arg(long, short = 'e')]
    pub envelope: PathBuf,

    /// Snapshot written by `strip`.
    #[arg(long)]
    pub snapshot: PathBuf,

    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct SubmitArgs {
    #[arg(long, short = 'e')]
    pub envelope: PathBuf,

    /// Operator account. Together with `--operator-key`, signs before
    /// submitting if the operator has not signed yet.
    #[arg(long, env = "MERIDIAN_OPERATOR_ID", requires = "operator_key")]
    pub operator_id: Option<AccountId>,

    #[arg(long, env = "MERIDIAN_OPERATOR_KEY", requires = "operator_id")]
    pub operator_key: Option<String>,

    /// Overrides the configured execution deadline.
    #[arg(long)]
    pub deadline_ms: Option<u64>,

    /// Print Prometheus metrics after the submission.
    #[arg(long)]
    pub metrics: bool,
}
