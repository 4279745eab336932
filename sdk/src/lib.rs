// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Meridian SDK
//!
//! Client-side engine for ledgers that want one signed copy of every
//! transaction per node. You build a transaction once; the SDK freezes it
//! into N per-node records, lets any number of co-signers (online or
//! air-gapped) attach signatures, and then submits it to whichever node is
//! healthy, backing off from the ones that are not.
//!
//! ## Architecture
//!
//! - **network** — node addresses, per-node health, the managed node pool.
//! - **transaction** — logical transactions, the multi-node envelope, the
//!   signature maps, the interchange format.
//! - **execution** — the transport seam, status classification, the retry
//!   engine, metrics.
//! - **crypto** — Ed25519 and ECDSA secp256k1 keys, SHA-384 hashes.
//! - **account** — account and transaction identifiers.
//! - **config** — constants and the serde-loadable client config.
//! - **client** — everything above wired together.
//!
//! ## Design Philosophy
//!
//! 1. An envelope is frozen exactly once and executed at most once.
//! 2. Signatures are never deduplicated behind the caller's back.
//! 3. One execution talks to one node at a time. A deadline always wins.

pub mod account;
pub mod client;
pub mod config;
pub mod crypto;
pub mod execution;
pub mod network;
pub mod transaction;

pub use account::{AccountId, TransactionId};
pub use client::{Client, Operator};
pub use config::ClientConfig;
pub use execution::{ExecuteError, ExecuteOptions, Executor, TcpTransport, Transport};
pub use network::{ManagedNetwork, NetworkName, NodeAddress, Topology};
pub use transaction::{Signatures, TransactionEnvelope, TransactionError};
