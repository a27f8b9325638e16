// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Multi-location destination types.
//!
//! A multi-location is a small tree of typed segments plus a `parents`
//! depth counter, describing a destination across chain boundaries. The
//! resolver in `khala-indexer` classifies these into a
//! [`CanonicalDestination`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// One typed segment of a multi-location interior.
///
/// This is a closed set: encodings observed on the wire that do not fit one
/// of these tags never reach the indexer (the decoding layer drops them),
/// so an exhaustive match here covers every classifiable shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Junction {
    /// A sibling or downstream parachain, by id.
    Parachain(u32),
    /// A 32-byte account on some chain in the route.
    AccountId32([u8; 32]),
    /// Opaque key bytes; meaning depends on position (bridge discriminator,
    /// external recipient, ...).
    GeneralKey(Vec<u8>),
    /// Numeric discriminator, used by bridge routes to carry the external
    /// chain id.
    GeneralIndex(u128),
}

impl fmt::Display for Junction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Junction::Parachain(id) => write!(f, "Parachain({})", id),
            Junction::AccountId32(b) => write!(f, "AccountId32(0x{})", hex::encode(b)),
            Junction::GeneralKey(b) => write!(f, "GeneralKey(0x{})", hex::encode(b)),
            Junction::GeneralIndex(i) => write!(f, "GeneralIndex({})", i),
        }
    }
}

/// A hierarchical destination: `parents` levels up, then the interior
/// segments in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiLocation {
    pub parents: u8,
    pub interior: Vec<Junction>,
}

impl MultiLocation {
    pub fn new(parents: u8, interior: Vec<Junction>) -> Self {
        Self { parents, interior }
    }
}

impl fmt::Display for MultiLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{parents: {}, interior: [", self.parents)?;
        for (i, junction) in self.interior.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", junction)?;
        }
        write!(f, "]}}")
    }
}

/// Which class of chain a destination resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainClass {
    /// An account on the chain being indexed.
    Local,
    /// A named sibling parachain reachable via the relay.
    Sibling,
    /// The relay (parent) chain itself.
    Relay,
    /// No recognized shape; callers must not persist records derived
    /// from this.
    Unknown,
}

impl fmt::Display for ChainClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainClass::Local => write!(f, "Local"),
            ChainClass::Sibling => write!(f, "Sibling"),
            ChainClass::Relay => write!(f, "Relay"),
            ChainClass::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Canonical form of a resolved destination. Value type only, never
/// persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalDestination {
    pub chain_class: ChainClass,
    /// External (non-parachain) chain id for recognized bridge routes.
    pub chain_id: Option<u32>,
    /// SS58 address for account destinations, 0x-hex for raw key bytes.
    pub recipient: String,
    /// True for 3-segment routes forwarded to an externally-addressed
    /// destination.
    pub is_forwarded: bool,
}

impl CanonicalDestination {
    pub fn unknown() -> Self {
        Self {
            chain_class: ChainClass::Unknown,
            chain_id: None,
            recipient: String::new(),
            is_forwarded: false,
        }
    }

    pub fn is_recognized(&self) -> bool {
        self.chain_class != ChainClass::Unknown
    }
}
