// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Typed chain event payloads.
//!
//! The decoding layer delivers events with their fields already decoded;
//! this enum is the closed set the indexer reacts to. Anything outside it
//! never reaches `process_block`.

use khala_indexer_types::location::MultiLocation;
use khala_indexer_types::{Balance, BridgeChainId, DepositNonce, TxMeta};
use serde::{Deserialize, Serialize};

/// A decoded runtime event the indexer consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    /// `treasury.Deposit` - funds moved into the treasury pot.
    TreasuryDeposit { amount: Balance },

    /// `phalaMining.MinerSettled` - a worker payout, with the amount still
    /// in the 64.64 fixed-point wire encoding.
    MinerSettled { payout_bits: u128 },

    /// `chainBridge.FungibleTransfer` - outbound bridge initiation.
    FungibleTransfer {
        dest_chain_id: BridgeChainId,
        deposit_nonce: DepositNonce,
        /// Opaque asset identifier, 0x-hex.
        resource_id: String,
        amount: Balance,
        /// Destination-chain recipient, 0x-hex.
        recipient: String,
    },

    /// `chainBridge.VoteFor` - a relayer vote on an inbound proposal.
    ProposalVoteFor {
        origin_chain_id: BridgeChainId,
        deposit_nonce: DepositNonce,
        /// From the vote extrinsic's arguments when available.
        resource_id: Option<String>,
    },

    /// `chainBridge.ProposalApproved`
    ProposalApproved {
        origin_chain_id: BridgeChainId,
        deposit_nonce: DepositNonce,
    },

    /// `chainBridge.ProposalRejected`
    ProposalRejected {
        origin_chain_id: BridgeChainId,
        deposit_nonce: DepositNonce,
    },

    /// `chainBridge.ProposalSucceeded` - inbound transfer executed.
    ProposalSucceeded {
        origin_chain_id: BridgeChainId,
        deposit_nonce: DepositNonce,
    },

    /// `chainBridge.ProposalFailed` - inbound transfer execution failed.
    ProposalFailed {
        origin_chain_id: BridgeChainId,
        deposit_nonce: DepositNonce,
    },

    /// `xTokens.Transferred` family - cross-consensus transfer with a
    /// multi-location destination.
    XTokensTransferred {
        amount: Balance,
        dest: MultiLocation,
    },
}

impl ChainEvent {
    /// Pallet the event was emitted from, for logs and metrics labels.
    pub fn section(&self) -> &'static str {
        match self {
            ChainEvent::TreasuryDeposit { .. } => "treasury",
            ChainEvent::MinerSettled { .. } => "phalaMining",
            ChainEvent::FungibleTransfer { .. }
            | ChainEvent::ProposalVoteFor { .. }
            | ChainEvent::ProposalApproved { .. }
            | ChainEvent::ProposalRejected { .. }
            | ChainEvent::ProposalSucceeded { .. }
            | ChainEvent::ProposalFailed { .. } => "chainBridge",
            ChainEvent::XTokensTransferred { .. } => "xTokens",
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            ChainEvent::TreasuryDeposit { .. } => "Deposit",
            ChainEvent::MinerSettled { .. } => "MinerSettled",
            ChainEvent::FungibleTransfer { .. } => "FungibleTransfer",
            ChainEvent::ProposalVoteFor { .. } => "VoteFor",
            ChainEvent::ProposalApproved { .. } => "ProposalApproved",
            ChainEvent::ProposalRejected { .. } => "ProposalRejected",
            ChainEvent::ProposalSucceeded { .. } => "ProposalSucceeded",
            ChainEvent::ProposalFailed { .. } => "ProposalFailed",
            ChainEvent::XTokensTransferred { .. } => "Transferred",
        }
    }
}

/// One event with its originating-extrinsic metadata, in emission order
/// within the block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub event: ChainEvent,
    /// Absent for events emitted outside an extrinsic (inherents, hooks).
    pub tx: Option<TxMeta>,
}

impl EventRecord {
    pub fn new(event: ChainEvent, tx: Option<TxMeta>) -> Self {
        Self { event, tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_method_pairs() {
        let ev = ChainEvent::TreasuryDeposit { amount: 1 };
        assert_eq!((ev.section(), ev.method()), ("treasury", "Deposit"));

        let ev = ChainEvent::ProposalVoteFor {
            origin_chain_id: 1,
            deposit_nonce: 7,
            resource_id: None,
        };
        assert_eq!((ev.section(), ev.method()), ("chainBridge", "VoteFor"));

        let ev = ChainEvent::XTokensTransferred {
            amount: 0,
            dest: MultiLocation::new(0, vec![]),
        };
        assert_eq!((ev.section(), ev.method()), ("xTokens", "Transferred"));
    }
}
