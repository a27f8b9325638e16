// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Destination resolution.
//!
//! Cross-consensus destinations arrive as multi-location trees whose
//! encoding drifted across runtime versions. The resolver classifies the
//! shapes the chain has actually emitted into a [`CanonicalDestination`];
//! every other shape is `Unknown` and the caller must not persist anything
//! derived from it. Classification is best-effort and side-effect free.

use khala_indexer_types::location::{
    CanonicalDestination, ChainClass, Junction, MultiLocation,
};
use khala_indexer_types::ss58;

/// GeneralKey discriminator marking a ChainBridge route.
pub const BRIDGE_ROUTE_KEY: &[u8] = b"cb";

/// Pure classifier from multi-location shapes to canonical destinations.
#[derive(Debug, Clone, Copy)]
pub struct DestinationResolver {
    ss58_prefix: u16,
}

impl DestinationResolver {
    pub fn new(ss58_prefix: u16) -> Self {
        Self { ss58_prefix }
    }

    pub fn resolve(&self, location: &MultiLocation) -> CanonicalDestination {
        use Junction::*;

        match (location.parents, location.interior.as_slice()) {
            // Account on this chain.
            (0, [AccountId32(account)]) => CanonicalDestination {
                chain_class: ChainClass::Local,
                chain_id: None,
                recipient: ss58::encode(account, self.ss58_prefix),
                is_forwarded: false,
            },

            // Account on the relay chain.
            (1, [AccountId32(account)]) => CanonicalDestination {
                chain_class: ChainClass::Relay,
                chain_id: None,
                recipient: ss58::encode(account, self.ss58_prefix),
                is_forwarded: false,
            },

            // Account on a named sibling parachain.
            (1, [Parachain(para_id), AccountId32(account)]) => CanonicalDestination {
                chain_class: ChainClass::Sibling,
                chain_id: Some(*para_id),
                recipient: ss58::encode(account, self.ss58_prefix),
                is_forwarded: false,
            },

            // ChainBridge route: the named parachain forwards to an external
            // chain identified by the GeneralIndex. Recipient stays raw.
            (0, [Parachain(_), GeneralKey(key), GeneralIndex(chain_id), GeneralKey(recipient)])
                if key.as_slice() == BRIDGE_ROUTE_KEY =>
            {
                // A chain id wider than u32 names no registered chain;
                // don't persist a recognized route without one.
                match u32::try_from(*chain_id) {
                    Ok(chain_id) => CanonicalDestination {
                        chain_class: ChainClass::Sibling,
                        chain_id: Some(chain_id),
                        recipient: format!("0x{}", hex::encode(recipient)),
                        is_forwarded: false,
                    },
                    Err(_) => CanonicalDestination::unknown(),
                }
            }

            // Account-style cross-chain route with no external chain id.
            (0, [Parachain(para_id), AccountId32(account)]) => CanonicalDestination {
                chain_class: ChainClass::Sibling,
                chain_id: Some(*para_id),
                recipient: ss58::encode(account, self.ss58_prefix),
                is_forwarded: false,
            },

            // Forwarded route to an externally-addressed destination.
            (0, [first, _, GeneralKey(recipient)]) => CanonicalDestination {
                chain_class: ChainClass::Sibling,
                chain_id: match first {
                    Parachain(id) => Some(*id),
                    _ => None,
                },
                recipient: format!("0x{}", hex::encode(recipient)),
                is_forwarded: true,
            },

            // Never guess at an unrecognized shape.
            _ => CanonicalDestination::unknown(),
        }
    }
}
