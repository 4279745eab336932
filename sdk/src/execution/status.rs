//! Remote status codes and node responses.
//!
//! A node answers every request with a [`NodeResponse`]. Its [`Status`]
//! decides what the engine does next: `Ok` ends the execution, a transient
//! status moves on to another node, anything else is a definitive
//! rejection and is handed to the caller as-is.

use std::fmt;

use bincode::Options;
use serde::{Deserialize, Serialize};

/// Status reported by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    InvalidTransaction,
    PayerAccountNotFound,
    InvalidNodeAccount,
    TransactionExpired,
    InvalidTransactionStart,
    InvalidSignature,
    MemoTooLong,
    InsufficientTxFee,
    InsufficientPayerBalance,
    DuplicateTransaction,
    Busy,
    PlatformTransactionNotCreated,
    PlatformNotActive,
    /// A code this SDK does not know. Treated as a rejection.
    Unrecognized(u32),
}

impl Status {
    pub fn code(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::InvalidTransaction => 1,
            Self::PayerAccountNotFound => 2,
            Self::InvalidNodeAccount => 3,
            Self::TransactionExpired => 4,
            Self::InvalidTransactionStart => 5,
            Self::InvalidSignature => 7,
            Self::MemoTooLong => 8,
            Self::InsufficientTxFee => 9,
            Self::InsufficientPayerBalance => 10,
            Self::DuplicateTransaction => 11,
            Self::Busy => 12,
            Self::PlatformTransactionNotCreated => 23,
            Self::PlatformNotActive => 26,
            Self::Unrecognized(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::InvalidTransaction,
            2 => Self::PayerAccountNotFound,
            3 => Self::InvalidNodeAccount,
            4 => Self::TransactionExpired,
            5 => Self::InvalidTransactionStart,
            7 => Self::InvalidSignature,
            8 => Self::MemoTooLong,
            9 => Self::InsufficientTxFee,
            10 => Self::InsufficientPayerBalance,
            11 => Self::DuplicateTransaction,
            12 => Self::Busy,
            23 => Self::PlatformTransactionNotCreated,
            26 => Self::PlatformNotActive,
            other => Self::Unrecognized(other),
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Ok
    }

    /// The node could not take the request right now; another node might.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Busy | Self::PlatformTransactionNotCreated | Self::PlatformNotActive
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::InvalidTransaction => write!(f, "INVALID_TRANSACTION"),
            Self::PayerAccountNotFound => write!(f, "PAYER_ACCOUNT_NOT_FOUND"),
            Self::InvalidNodeAccount => write!(f, "INVALID_NODE_ACCOUNT"),
            Self::TransactionExpired => write!(f, "TRANSACTION_EXPIRED"),
            Self::InvalidTransactionStart => write!(f, "INVALID_TRANSACTION_START"),
            Self::InvalidSignature => write!(f, "INVALID_SIGNATURE"),
            Self::MemoTooLong => write!(f, "MEMO_TOO_LONG"),
            Self::InsufficientTxFee => write!(f, "INSUFFICIENT_TX_FEE"),
            Self::InsufficientPayerBalance => write!(f, "INSUFFICIENT_PAYER_BALANCE"),
            Self::DuplicateTransaction => write!(f, "DUPLICATE_TRANSACTION"),
            Self::Busy => write!(f, "BUSY"),
            Self::PlatformTransactionNotCreated => write!(f, "PLATFORM_TRANSACTION_NOT_CREATED"),
            Self::PlatformNotActive => write!(f, "PLATFORM_NOT_ACTIVE"),
            Self::Unrecognized(code) => write!(f, "UNRECOGNIZED({code})"),
        }
    }
}

impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_code)
    }
}

/// Largest response the engine will decode.
const MAX_RESPONSE_SIZE: u64 = 64 * 1024;

/// What a node sends back for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResponse {
    pub status: Status,
    /// Free-form detail from the node, possibly empty.
    pub message: String,
}

impl NodeResponse {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            message: String::new(),
        }
    }

    pub fn with_message(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_limit(MAX_RESPONSE_SIZE)
            .with_fixint_encoding()
            .with_big_endian()
            .reject_trailing_bytes()
    }

    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        Self::options().serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        Self::options().deserialize(bytes)
    }
}
