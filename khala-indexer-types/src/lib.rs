// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Chain-level value types shared across the indexer.
//!
//! Everything in this crate is already decoded: the raw SCALE layer lives
//! outside the indexer and delivers typed values (see the `khala-indexer`
//! crate for the event payloads themselves).

pub mod location;
pub mod ss58;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Block height on the chain being indexed.
pub type BlockNumber = u64;

/// Balance in minor units (12 decimals on Khala).
pub type Balance = u128;

/// ChainBridge chain identifier (one byte on the wire).
pub type BridgeChainId = u8;

/// Per-source-chain monotonic counter identifying a bridge transfer.
pub type DepositNonce = u64;

/// A raw 32-byte account id, as carried in events before SS58 re-encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId32(pub [u8; 32]);

impl AccountId32 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Re-encode with the given SS58 network prefix.
    pub fn to_ss58(&self, prefix: u16) -> String {
        ss58::encode(&self.0, prefix)
    }
}

impl fmt::Display for AccountId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for AccountId32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Header fields of the block currently being processed.
///
/// Provenance (hash, timestamp) is captured upstream and supplied here;
/// the indexer never recomputes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockContext {
    pub height: BlockNumber,
    pub hash: String,
    pub parent_hash: String,
    /// Unix millis from the timestamp inherent.
    pub timestamp_ms: u64,
    /// Runtime spec version the block was authored under.
    pub spec_version: u32,
}

/// Metadata of the extrinsic an event originated from, when signed
/// origin information is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxMeta {
    pub hash: String,
    /// SS58 address of the signer; absent for unsigned origins.
    pub signer: Option<String>,
    pub is_signed: bool,
}
