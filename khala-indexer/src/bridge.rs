// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Bridge transfer tracking.
//!
//! Outbound transfers are a single immutable record; inbound proposals are
//! a state machine driven by relayer votes and status events. Status
//! transitions follow a strict forward table and anything outside it is
//! dropped and counted, never applied. The vote log is append-only and is
//! never gated by the proposal's status, regardless of how late a vote
//! event arrives.

use crate::config::IndexerConfig;
use crate::error::IndexerResult;
use crate::events::ChainEvent;
use crate::metrics::IndexerMetrics;
use khala_indexer_store::models::{
    BridgeInboundRecord, BridgeOutboundRecord, ProposalStatus, TxRef, XcmTransferRecord,
};
use khala_indexer_store::{keys, Entity, EntityStore, EntityStoreExt};
use khala_indexer_types::location::MultiLocation;
use khala_indexer_types::{Balance, BlockContext, BridgeChainId, DepositNonce, TxMeta};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct BridgeTracker {
    store: Arc<dyn EntityStore>,
    metrics: Arc<IndexerMetrics>,
}

impl BridgeTracker {
    pub fn new(store: Arc<dyn EntityStore>, metrics: Arc<IndexerMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Ensure a `TxRef` exists for the extrinsic and return its id.
    ///
    /// Transaction references are created once per unique hash and shared
    /// by id from every record that mentions them.
    async fn record_tx(&self, tx: &TxMeta) -> IndexerResult<String> {
        let id = keys::tx(&tx.hash);
        if self.store.get_tx(&id).await?.is_none() {
            self.store
                .upsert(
                    &id,
                    Entity::Tx(TxRef {
                        hash: tx.hash.clone(),
                        signer: tx.signer.clone(),
                    }),
                )
                .await?;
        }
        Ok(id)
    }

    /// `chainBridge.FungibleTransfer`: outbound initiation.
    ///
    /// Replay safe: an existing record for `(dest, nonce)` is left untouched.
    pub async fn on_fungible_transfer(
        &self,
        block: &BlockContext,
        tx: Option<&TxMeta>,
        dest_chain_id: BridgeChainId,
        deposit_nonce: DepositNonce,
        resource_id: &str,
        amount: Balance,
        recipient: &str,
        config: &IndexerConfig,
    ) -> IndexerResult<()> {
        let id = keys::outbound(dest_chain_id, deposit_nonce);
        if self.store.get_outbound(&id).await?.is_some() {
            debug!("[BridgeTracker] Outbound {} already recorded, skipping", id);
            return Ok(());
        }
        let tx = match tx {
            Some(tx) => tx,
            None => {
                // The pallet only emits this from an extrinsic; seeing it
                // without one means the decoding layer lost the linkage.
                warn!(
                    "[BridgeTracker] FungibleTransfer without extrinsic at block {}, dropping",
                    block.height
                );
                return Ok(());
            }
        };
        let send_tx = self.record_tx(tx).await?;
        let sender = tx.signer.clone();
        let is_router_origin = sender.as_deref() == Some(config.router_account.as_str());

        self.store
            .upsert(
                &id,
                Entity::Outbound(BridgeOutboundRecord {
                    dest_chain_id,
                    deposit_nonce,
                    resource_id: resource_id.to_string(),
                    amount,
                    recipient: recipient.to_string(),
                    sender,
                    send_tx,
                    is_router_origin,
                    created_at: block.timestamp_ms,
                }),
            )
            .await?;
        self.metrics.bridge_outbound_created.inc();
        info!(
            "[BridgeTracker] Outbound transfer to chain {} nonce {} for {} (router: {})",
            dest_chain_id, deposit_nonce, amount, is_router_origin
        );
        Ok(())
    }

    /// `chainBridge.VoteFor`: first vote creates the proposal as Initiated,
    /// every vote appends to the log.
    pub async fn on_proposal_vote(
        &self,
        block: &BlockContext,
        tx: Option<&TxMeta>,
        origin_chain_id: BridgeChainId,
        deposit_nonce: DepositNonce,
        resource_id: Option<&str>,
    ) -> IndexerResult<()> {
        let id = keys::inbound(origin_chain_id, deposit_nonce);
        let mut record = match self.store.get_inbound(&id).await? {
            Some(record) => record,
            None => {
                self.metrics.bridge_inbound_created.inc();
                info!(
                    "[BridgeTracker] New inbound proposal from chain {} nonce {}",
                    origin_chain_id, deposit_nonce
                );
                BridgeInboundRecord {
                    origin_chain_id,
                    deposit_nonce,
                    resource_id: None,
                    status: ProposalStatus::Initiated,
                    vote_txs: Vec::new(),
                    execute_tx: None,
                    created_at: block.timestamp_ms,
                }
            }
        };

        // The resource id only appears in vote extrinsics; keep the first.
        if record.resource_id.is_none() {
            record.resource_id = resource_id.map(|s| s.to_string());
        }
        if let Some(tx) = tx {
            let vote_tx = self.record_tx(tx).await?;
            record.vote_txs.push(vote_tx);
            self.metrics.bridge_votes_recorded.inc();
        }
        self.store.upsert(&id, Entity::Inbound(record)).await?;
        Ok(())
    }

    /// A `chainBridge.Proposal*` status event.
    ///
    /// Applied only when a record exists and the edge is in the transition
    /// table; everything else is dropped with a labelled counter. The
    /// executing extrinsic is attached on the Approved -> Succeeded edge.
    pub async fn apply_status(
        &self,
        tx: Option<&TxMeta>,
        origin_chain_id: BridgeChainId,
        deposit_nonce: DepositNonce,
        to: ProposalStatus,
    ) -> IndexerResult<()> {
        let id = keys::inbound(origin_chain_id, deposit_nonce);
        let mut record = match self.store.get_inbound(&id).await? {
            Some(record) => record,
            None => {
                // A status event for a proposal we never saw a vote for;
                // happens when indexing starts mid-lifecycle.
                warn!(
                    "[BridgeTracker] {} for unknown proposal chain {} nonce {}, dropping",
                    to, origin_chain_id, deposit_nonce
                );
                self.metrics
                    .bridge_status_dropped
                    .with_label_values(&["no_record"])
                    .inc();
                return Ok(());
            }
        };

        if record.status == to {
            debug!(
                "[BridgeTracker] Proposal chain {} nonce {} already {}, skipping",
                origin_chain_id, deposit_nonce, to
            );
            self.metrics
                .bridge_status_dropped
                .with_label_values(&["duplicate"])
                .inc();
            return Ok(());
        }
        if !record.status.can_transition(to) {
            warn!(
                "[BridgeTracker] Invalid transition {} -> {} for chain {} nonce {}, dropping",
                record.status, to, origin_chain_id, deposit_nonce
            );
            self.metrics
                .bridge_status_dropped
                .with_label_values(&["invalid_transition"])
                .inc();
            return Ok(());
        }

        if to == ProposalStatus::Succeeded {
            if let Some(tx) = tx {
                record.execute_tx = Some(self.record_tx(tx).await?);
            }
        }
        record.status = to;
        self.store.upsert(&id, Entity::Inbound(record)).await?;
        let status_label = to.to_string();
        self.metrics
            .bridge_status_applied
            .with_label_values(&[status_label.as_str()])
            .inc();
        info!(
            "[BridgeTracker] Proposal chain {} nonce {} -> {}",
            origin_chain_id, deposit_nonce, to
        );
        Ok(())
    }

    /// `xTokens.Transferred`: record the transfer with its resolved
    /// destination. Unrecognized destinations are counted and dropped.
    pub async fn on_xtokens_transferred(
        &self,
        block: &BlockContext,
        tx: Option<&TxMeta>,
        amount: Balance,
        dest: &MultiLocation,
        resolver: &crate::destination::DestinationResolver,
    ) -> IndexerResult<()> {
        let resolved = resolver.resolve(dest);
        if !resolved.is_recognized() {
            warn!(
                "[BridgeTracker] Unrecognized destination {} at block {}, dropping",
                dest, block.height
            );
            self.metrics.unrecognized_destinations.inc();
            return Ok(());
        }
        let tx = match tx {
            Some(tx) => tx,
            None => {
                warn!(
                    "[BridgeTracker] xTokens transfer without extrinsic at block {}, dropping",
                    block.height
                );
                return Ok(());
            }
        };
        let id = keys::xcm_transfer(&tx.hash);
        if self.store.get_xcm_transfer(&id).await?.is_some() {
            return Ok(());
        }
        let send_tx = self.record_tx(tx).await?;
        self.store
            .upsert(
                &id,
                Entity::XcmTransfer(XcmTransferRecord {
                    amount,
                    chain_class: resolved.chain_class.to_string(),
                    dest_chain_id: resolved.chain_id,
                    recipient: resolved.recipient,
                    is_forwarded: resolved.is_forwarded,
                    sender: tx.signer.clone(),
                    send_tx,
                    created_at: block.timestamp_ms,
                }),
            )
            .await?;
        self.metrics.xcm_transfers_recorded.inc();
        info!(
            "[BridgeTracker] Cross-consensus transfer of {} to {} at block {}",
            amount, resolved.chain_class, block.height
        );
        Ok(())
    }

    /// Dispatch one bridge-related event. Non-bridge events are ignored.
    pub async fn handle_event(
        &self,
        block: &BlockContext,
        event: &ChainEvent,
        tx: Option<&TxMeta>,
        config: &IndexerConfig,
        resolver: &crate::destination::DestinationResolver,
    ) -> IndexerResult<()> {
        match event {
            ChainEvent::FungibleTransfer {
                dest_chain_id,
                deposit_nonce,
                resource_id,
                amount,
                recipient,
            } => {
                self.on_fungible_transfer(
                    block,
                    tx,
                    *dest_chain_id,
                    *deposit_nonce,
                    resource_id,
                    *amount,
                    recipient,
                    config,
                )
                .await
            }
            ChainEvent::ProposalVoteFor {
                origin_chain_id,
                deposit_nonce,
                resource_id,
            } => {
                self.on_proposal_vote(
                    block,
                    tx,
                    *origin_chain_id,
                    *deposit_nonce,
                    resource_id.as_deref(),
                )
                .await
            }
            ChainEvent::ProposalApproved {
                origin_chain_id,
                deposit_nonce,
            } => {
                self.apply_status(tx, *origin_chain_id, *deposit_nonce, ProposalStatus::Approved)
                    .await
            }
            ChainEvent::ProposalRejected {
                origin_chain_id,
                deposit_nonce,
            } => {
                self.apply_status(tx, *origin_chain_id, *deposit_nonce, ProposalStatus::Rejected)
                    .await
            }
            ChainEvent::ProposalSucceeded {
                origin_chain_id,
                deposit_nonce,
            } => {
                self.apply_status(tx, *origin_chain_id, *deposit_nonce, ProposalStatus::Succeeded)
                    .await
            }
            ChainEvent::ProposalFailed {
                origin_chain_id,
                deposit_nonce,
            } => {
                self.apply_status(tx, *origin_chain_id, *deposit_nonce, ProposalStatus::Failed)
                    .await
            }
            ChainEvent::XTokensTransferred { amount, dest } => {
                self.on_xtokens_transferred(block, tx, *amount, dest, resolver)
                    .await
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KHALA_SS58_PREFIX;
    use crate::destination::DestinationResolver;
    use khala_indexer_store::MemoryStore;
    use khala_indexer_types::location::Junction;

    fn tracker() -> (Arc<MemoryStore>, BridgeTracker) {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(IndexerMetrics::new_for_testing());
        let tracker = BridgeTracker::new(store.clone(), metrics);
        (store, tracker)
    }

    fn block(height: u64) -> BlockContext {
        BlockContext {
            height,
            hash: format!("0xblock{}", height),
            parent_hash: format!("0xblock{}", height.saturating_sub(1)),
            timestamp_ms: 1_640_000_000_000 + height * 12_000,
            spec_version: 1_170,
        }
    }

    fn signed_tx(hash: &str, signer: &str) -> TxMeta {
        TxMeta {
            hash: hash.to_string(),
            signer: Some(signer.to_string()),
            is_signed: true,
        }
    }

    #[tokio::test]
    async fn inbound_lifecycle_happy_path() {
        let (store, tracker) = tracker();
        let b = block(100);

        let v1 = signed_tx("0xv1", "relayer-a");
        let v2 = signed_tx("0xv2", "relayer-b");
        tracker
            .on_proposal_vote(&b, Some(&v1), 1, 42, Some("0xresource"))
            .await
            .unwrap();
        tracker
            .on_proposal_vote(&b, Some(&v2), 1, 42, Some("0xresource"))
            .await
            .unwrap();

        let record = store
            .get_inbound(&keys::inbound(1, 42))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ProposalStatus::Initiated);
        assert_eq!(record.vote_txs, vec!["tx-0xv1", "tx-0xv2"]);
        assert_eq!(record.resource_id.as_deref(), Some("0xresource"));

        tracker
            .apply_status(None, 1, 42, ProposalStatus::Approved)
            .await
            .unwrap();
        let exec = signed_tx("0xexec", "relayer-a");
        tracker
            .apply_status(Some(&exec), 1, 42, ProposalStatus::Succeeded)
            .await
            .unwrap();

        let record = store
            .get_inbound(&keys::inbound(1, 42))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ProposalStatus::Succeeded);
        assert_eq!(record.execute_tx.as_deref(), Some("tx-0xexec"));
        // Votes from before the transition are intact.
        assert_eq!(record.vote_txs.len(), 2);
    }

    #[tokio::test]
    async fn terminal_status_never_reverts() {
        let (store, tracker) = tracker();
        let b = block(100);
        tracker
            .on_proposal_vote(&b, Some(&signed_tx("0xv1", "r")), 1, 7, None)
            .await
            .unwrap();
        tracker
            .apply_status(None, 1, 7, ProposalStatus::Rejected)
            .await
            .unwrap();

        // Neither a skip-ahead nor a fresh Approved can move it.
        tracker
            .apply_status(None, 1, 7, ProposalStatus::Approved)
            .await
            .unwrap();
        tracker
            .apply_status(None, 1, 7, ProposalStatus::Succeeded)
            .await
            .unwrap();
        let record = store.get_inbound(&keys::inbound(1, 7)).await.unwrap().unwrap();
        assert_eq!(record.status, ProposalStatus::Rejected);
    }

    #[tokio::test]
    async fn late_vote_still_appends_after_terminal_status() {
        let (store, tracker) = tracker();
        let b = block(100);
        tracker
            .on_proposal_vote(&b, Some(&signed_tx("0xv1", "r")), 1, 7, None)
            .await
            .unwrap();
        tracker
            .apply_status(None, 1, 7, ProposalStatus::Approved)
            .await
            .unwrap();
        tracker
            .apply_status(Some(&signed_tx("0xexec", "r")), 1, 7, ProposalStatus::Succeeded)
            .await
            .unwrap();

        tracker
            .on_proposal_vote(&block(101), Some(&signed_tx("0xv-late", "s")), 1, 7, None)
            .await
            .unwrap();
        let record = store.get_inbound(&keys::inbound(1, 7)).await.unwrap().unwrap();
        assert_eq!(record.status, ProposalStatus::Succeeded);
        assert_eq!(record.vote_txs, vec!["tx-0xv1", "tx-0xv-late"]);
    }

    #[tokio::test]
    async fn status_without_record_is_dropped() {
        let (store, tracker) = tracker();
        tracker
            .apply_status(None, 3, 99, ProposalStatus::Approved)
            .await
            .unwrap();
        assert!(store.get_inbound(&keys::inbound(3, 99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn outbound_is_replay_safe_and_flags_router() {
        let (store, tracker) = tracker();
        let config = IndexerConfig::default();
        let b = block(50);
        let tx = signed_tx("0xsend", &config.router_account);

        tracker
            .on_fungible_transfer(&b, Some(&tx), 2, 11, "0xres", 500, "0xrecipient", &config)
            .await
            .unwrap();
        let record = store
            .get_outbound(&keys::outbound(2, 11))
            .await
            .unwrap()
            .unwrap();
        assert!(record.is_router_origin);
        assert_eq!(record.amount, 500);
        assert_eq!(record.send_tx, "tx-0xsend");

        // Replayed block with a different tx must not overwrite.
        let other = signed_tx("0xother", "someone-else");
        tracker
            .on_fungible_transfer(&b, Some(&other), 2, 11, "0xres", 500, "0xrecipient", &config)
            .await
            .unwrap();
        let record = store
            .get_outbound(&keys::outbound(2, 11))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.send_tx, "tx-0xsend");
    }

    #[tokio::test]
    async fn xtokens_transfer_to_sibling_parachain() {
        let (store, tracker) = tracker();
        let resolver = DestinationResolver::new(KHALA_SS58_PREFIX);
        let b = block(200);
        let tx = signed_tx("0xxcm", "sender");

        let dest = MultiLocation::new(
            1,
            vec![Junction::Parachain(2000), Junction::AccountId32([7u8; 32])],
        );
        tracker
            .on_xtokens_transferred(&b, Some(&tx), 1_000, &dest, &resolver)
            .await
            .unwrap();

        let record = store
            .get_xcm_transfer(&keys::xcm_transfer("0xxcm"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.dest_chain_id, Some(2000));
        assert_eq!(record.chain_class, "Sibling");
        assert!(!record.is_forwarded);
    }

    #[tokio::test]
    async fn unrecognized_destination_is_dropped() {
        let (store, tracker) = tracker();
        let resolver = DestinationResolver::new(KHALA_SS58_PREFIX);
        let b = block(200);
        let tx = signed_tx("0xxcm", "sender");

        // Bare GeneralIndex matches no known pattern.
        let dest = MultiLocation::new(0, vec![Junction::GeneralIndex(9)]);
        tracker
            .on_xtokens_transferred(&b, Some(&tx), 1_000, &dest, &resolver)
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }
}
