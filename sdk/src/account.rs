//! Account and transaction identifiers.
//!
//! Nodes are addressed by the account that the network assigned to them
//! (`0.0.3`, `0.0.4`, ...), so [`AccountId`] doubles as the node identifier
//! everywhere in the SDK. A [`TransactionId`] pins a logical transaction to
//! its payer and the instant it becomes valid; every per-node copy of a
//! transaction shares the same id.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing identifiers from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountIdError {
    #[error("malformed account id {0:?}: expected <shard>.<realm>.<num> or <num>")]
    Malformed(String),

    #[error("malformed transaction id {0:?}: expected <account>@<seconds>.<nanos>")]
    MalformedTransactionId(String),
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A network account, written `shard.realm.num`.
///
/// Ordering is lexicographic over `(shard, realm, num)`, which is the order
/// the network map uses when it lists nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl AccountId {
    /// Account `0.0.num`, the common case for node accounts.
    pub const fn new(num: u64) -> Self {
        Self {
            shard: 0,
            realm: 0,
            num,
        }
    }

    pub const fn with_shard_realm(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    /// Fixed-width big-endian encoding used inside body bytes.
    pub fn to_bytes(&self) -> [u8; 24] {
        let mut out = [0u8; 24];
        out[..8].copy_from_slice(&self.shard.to_be_bytes());
        out[8..16].copy_from_slice(&self.realm.to_be_bytes());
        out[16..].copy_from_slice(&self.num.to_be_bytes());
        out
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AccountIdError::Malformed(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        let parse = |p: &str| -> Result<u64, AccountIdError> {
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            p.parse().map_err(|_| malformed())
        };
        match parts.as_slice() {
            [num] => Ok(Self::new(parse(num)?)),
            [shard, realm, num] => Ok(Self::with_shard_realm(
                parse(shard)?,
                parse(realm)?,
                parse(num)?,
            )),
            _ => Err(malformed()),
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamp / TransactionId
// ---------------------------------------------------------------------------

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            seconds: now.timestamp(),
            nanos: now.timestamp_subsec_nanos(),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}

/// Identity of one logical transaction: payer account plus valid-start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId {
    pub account_id: AccountId,
    pub valid_start: Timestamp,
}

impl TransactionId {
    /// A fresh id for `payer`, valid from the current wall-clock time.
    pub fn generate(payer: AccountId) -> Self {
        Self {
            account_id: payer,
            valid_start: Timestamp::now(),
        }
    }

    pub fn with_valid_start(payer: AccountId, valid_start: Timestamp) -> Self {
        Self {
            account_id: payer,
            valid_start,
        }
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.valid_start)
    }
}

impl FromStr for TransactionId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AccountIdError::MalformedTransactionId(s.to_string());
        let (account, time) = s.trim().split_once('@').ok_or_else(malformed)?;
        let (seconds, nanos) = time.split_once('.').ok_or_else(malformed)?;
        Ok(Self {
            account_id: account.parse().map_err(|_| malformed())?,
            valid_start: Timestamp {
                seconds: seconds.parse().map_err(|_| malformed())?,
                nanos: nanos.parse().map_err(|_| malformed())?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_and_short_forms() {
        assert_eq!("0.0.3".parse::<AccountId>().unwrap(), AccountId::new(3));
        assert_eq!("7".parse::<AccountId>().unwrap(), AccountId::new(7));
        assert_eq!(
            "1.2.3".parse::<AccountId>().unwrap(),
            AccountId::with_shard_realm(1, 2, 3)
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "0.0", "0.0.x", "0..3", "0.0.3.4", "-1", "0.0.+3"] {
            assert!(bad.parse::<AccountId>().is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn account_ordering_follows_components() {
        assert!(AccountId::new(3) < AccountId::new(4));
        assert!(AccountId::new(99) < AccountId::with_shard_realm(0, 1, 0));
    }

    #[test]
    fn transaction_id_display_roundtrip() {
        let id = TransactionId::with_valid_start(
            AccountId::new(1001),
            Timestamp {
                seconds: 1_700_000_000,
                nanos: 42,
            },
        );
        let text = id.to_string();
        assert_eq!(text, "0.0.1001@1700000000.000000042");
        assert_eq!(text.parse::<TransactionId>().unwrap(), id);
    }

    #[test]
    fn generated_ids_use_payer() {
        let id = TransactionId::generate(AccountId::new(2));
        assert_eq!(id.account_id, AccountId::new(2));
        assert!(id.valid_start.seconds > 1_600_000_000);
    }
}
