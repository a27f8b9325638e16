// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Persisted entity models.
//!
//! Every entity is keyed by a string id (see [`keys`]) and owned by the
//! external store; the indexer holds no entity beyond the block currently
//! being processed.

use khala_indexer_types::{Balance, BlockNumber, BridgeChainId, DepositNonce};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key construction for every entity kind.
pub mod keys {
    use khala_indexer_types::{BlockNumber, BridgeChainId, DepositNonce};

    pub fn cumulative(prefix: &str, height: BlockNumber) -> String {
        format!("{}-{}", prefix, height)
    }

    pub fn head(prefix: &str) -> String {
        format!("{}-head", prefix)
    }

    pub fn circulation(height: BlockNumber) -> String {
        format!("circulation-{}", height)
    }

    pub fn outbound(dest_chain_id: BridgeChainId, nonce: DepositNonce) -> String {
        format!("outbound-{}-{}", dest_chain_id, nonce)
    }

    pub fn inbound(origin_chain_id: BridgeChainId, nonce: DepositNonce) -> String {
        format!("inbound-{}-{}", origin_chain_id, nonce)
    }

    pub fn tx(hash: &str) -> String {
        format!("tx-{}", hash)
    }

    pub fn block(hash: &str) -> String {
        format!("block-{}", hash)
    }

    pub fn spec_version(version: u32) -> String {
        format!("spec-{}", version)
    }

    pub fn xcm_transfer(tx_hash: &str) -> String {
        format!("xcm-{}", tx_hash)
    }
}

/// One cumulative total at a block height that contained a relevant event.
///
/// `previous_height` names the snapshot the total was carried forward from
/// (None at pipeline start). Keeping the link makes duplicate delivery a
/// pure recompute instead of a double-apply, and lets the accumulator
/// verify ordering without scanning the key space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeSnapshot {
    pub block_height: BlockNumber,
    pub amount: Balance,
    pub previous_height: Option<BlockNumber>,
}

/// Latest snapshot height for one metric. The only piece of carry-forward
/// state that is not addressed by block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricHead {
    pub block_height: BlockNumber,
}

/// Derived circulating supply, computed at a fixed block cadence from
/// externally queried balances rather than accumulated deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CirculationSnapshot {
    pub block_height: BlockNumber,
    /// issuance minus bridge reserve minus mining reserve.
    pub khala: Balance,
    /// issuance minus mining reserve only.
    pub total: Balance,
}

/// Lifecycle status of an inbound bridge proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Initiated,
    Approved,
    Rejected,
    Succeeded,
    Failed,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Rejected | ProposalStatus::Succeeded | ProposalStatus::Failed
        )
    }

    /// Valid forward edges of the proposal state machine:
    /// `Initiated -> {Approved, Rejected}`, `Approved -> {Succeeded, Failed}`.
    pub fn can_transition(&self, to: ProposalStatus) -> bool {
        matches!(
            (self, to),
            (ProposalStatus::Initiated, ProposalStatus::Approved)
                | (ProposalStatus::Initiated, ProposalStatus::Rejected)
                | (ProposalStatus::Approved, ProposalStatus::Succeeded)
                | (ProposalStatus::Approved, ProposalStatus::Failed)
        )
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalStatus::Initiated => write!(f, "Initiated"),
            ProposalStatus::Approved => write!(f, "Approved"),
            ProposalStatus::Rejected => write!(f, "Rejected"),
            ProposalStatus::Succeeded => write!(f, "Succeeded"),
            ProposalStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Outbound bridge initiation. Immutable after creation; outbound transfers
/// have no further lifecycle on this side of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeOutboundRecord {
    pub dest_chain_id: BridgeChainId,
    pub deposit_nonce: DepositNonce,
    pub resource_id: String,
    pub amount: Balance,
    pub recipient: String,
    /// Absent for unsigned origins.
    pub sender: Option<String>,
    /// TxRef id of the initiating transaction.
    pub send_tx: String,
    /// Whether the initiation was signed by the configured router account.
    pub is_router_origin: bool,
    pub created_at: u64,
}

/// Inbound bridge proposal, keyed by `(origin chain, deposit nonce)`.
/// Created on the first vote, mutated by every later vote or status change,
/// retained forever for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeInboundRecord {
    pub origin_chain_id: BridgeChainId,
    pub deposit_nonce: DepositNonce,
    pub resource_id: Option<String>,
    pub status: ProposalStatus,
    /// Append-only vote log, in observation order. Never gated by status.
    pub vote_txs: Vec<String>,
    /// Set on the Approved -> Succeeded edge.
    pub execute_tx: Option<String>,
    pub created_at: u64,
}

/// One transaction reference, created once per unique hash and shared by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRef {
    pub hash: String,
    pub signer: Option<String>,
}

/// Block provenance record, one per processed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block_height: BlockNumber,
    pub parent_hash: String,
    pub timestamp_ms: u64,
}

/// First block a runtime spec version was observed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecVersionRecord {
    pub block_height: BlockNumber,
}

/// Recognized cross-consensus transfer initiation, with its resolved
/// destination. Unrecognized destinations never produce one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XcmTransferRecord {
    pub amount: Balance,
    pub chain_class: String,
    pub dest_chain_id: Option<u32>,
    pub recipient: String,
    pub is_forwarded: bool,
    pub sender: Option<String>,
    pub send_tx: String,
    pub created_at: u64,
}

/// Union of everything the entity store can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Cumulative(CumulativeSnapshot),
    Head(MetricHead),
    Circulation(CirculationSnapshot),
    Outbound(BridgeOutboundRecord),
    Inbound(BridgeInboundRecord),
    Tx(TxRef),
    Block(BlockRecord),
    SpecVersion(SpecVersionRecord),
    XcmTransfer(XcmTransferRecord),
}

impl Entity {
    /// Entity kind name, for logs and wrong-kind errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Cumulative(_) => "cumulative",
            Entity::Head(_) => "head",
            Entity::Circulation(_) => "circulation",
            Entity::Outbound(_) => "outbound",
            Entity::Inbound(_) => "inbound",
            Entity::Tx(_) => "tx",
            Entity::Block(_) => "block",
            Entity::SpecVersion(_) => "spec_version",
            Entity::XcmTransfer(_) => "xcm_transfer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_transition_table() {
        use ProposalStatus::*;
        assert!(Initiated.can_transition(Approved));
        assert!(Initiated.can_transition(Rejected));
        assert!(Approved.can_transition(Succeeded));
        assert!(Approved.can_transition(Failed));

        // Nothing leaves a terminal state.
        for terminal in [Rejected, Succeeded, Failed] {
            for to in [Initiated, Approved, Rejected, Succeeded, Failed] {
                assert!(!terminal.can_transition(to));
            }
        }
        // No skipping Initiated -> Succeeded/Failed.
        assert!(!Initiated.can_transition(Succeeded));
        assert!(!Initiated.can_transition(Failed));
        // Self-edges are not transitions.
        assert!(!Approved.can_transition(Approved));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!ProposalStatus::Initiated.is_terminal());
        assert!(!ProposalStatus::Approved.is_terminal());
        assert!(ProposalStatus::Rejected.is_terminal());
        assert!(ProposalStatus::Succeeded.is_terminal());
        assert!(ProposalStatus::Failed.is_terminal());
    }

    #[test]
    fn key_formats() {
        assert_eq!(keys::cumulative("treasury", 42), "treasury-42");
        assert_eq!(keys::head("mining"), "mining-head");
        assert_eq!(keys::circulation(300), "circulation-300");
        assert_eq!(keys::outbound(1, 7), "outbound-1-7");
        assert_eq!(keys::inbound(2, 9), "inbound-2-9");
        assert_eq!(keys::tx("0xabc"), "tx-0xabc");
    }
}
