// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Block-level event dispatch.
//!
//! `ChainEventHandler` owns one instance of every component and processes
//! blocks strictly in delivery order: provenance records first, then the
//! bridge and cross-consensus events in emission order, then the ledger
//! accumulation and the circulation cadence. Component errors that the
//! components themselves classify as recoverable never reach this layer;
//! anything returned here stops the pipeline.

use crate::bridge::BridgeTracker;
use crate::config::IndexerConfig;
use crate::destination::DestinationResolver;
use crate::error::{IndexerError, IndexerResult};
use crate::events::EventRecord;
use crate::ledger::{BalanceProvider, LedgerAccumulator};
use crate::metrics::IndexerMetrics;
use khala_indexer_store::models::{BlockRecord, SpecVersionRecord};
use khala_indexer_store::{keys, Entity, EntityStore, EntityStoreExt};
use khala_indexer_types::BlockContext;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// One block with its decoded events, as produced by the ingestion side.
#[derive(Debug)]
pub struct BlockMessage {
    pub block: BlockContext,
    pub events: Vec<EventRecord>,
}

pub struct ChainEventHandler {
    store: Arc<dyn EntityStore>,
    balances: Arc<dyn BalanceProvider>,
    config: IndexerConfig,
    metrics: Arc<IndexerMetrics>,
    ledger: LedgerAccumulator,
    bridge: BridgeTracker,
    resolver: DestinationResolver,
}

impl ChainEventHandler {
    pub fn new(
        store: Arc<dyn EntityStore>,
        balances: Arc<dyn BalanceProvider>,
        config: IndexerConfig,
        metrics: Arc<IndexerMetrics>,
    ) -> Self {
        let ledger = LedgerAccumulator::new(store.clone(), metrics.clone());
        let bridge = BridgeTracker::new(store.clone(), metrics.clone());
        let resolver = DestinationResolver::new(config.ss58_prefix);
        Self {
            store,
            balances,
            config,
            metrics,
            ledger,
            bridge,
            resolver,
        }
    }

    pub async fn process_block(
        &self,
        block: &BlockContext,
        events: &[EventRecord],
    ) -> IndexerResult<()> {
        self.record_provenance(block).await?;

        for record in events {
            self.metrics
                .events_processed
                .with_label_values(&[record.event.section(), record.event.method()])
                .inc();
            self.bridge
                .handle_event(
                    block,
                    &record.event,
                    record.tx.as_ref(),
                    &self.config,
                    &self.resolver,
                )
                .await?;
        }

        self.ledger.apply_block(block.height, events).await?;
        self.ledger
            .update_circulation(block.height, self.balances.as_ref(), &self.config)
            .await?;

        self.metrics.blocks_processed.inc();
        self.metrics.last_processed_block.set(block.height as i64);
        Ok(())
    }

    /// Block record plus the first-seen height of its runtime spec version.
    async fn record_provenance(&self, block: &BlockContext) -> IndexerResult<()> {
        self.store
            .upsert(
                &keys::block(&block.hash),
                Entity::Block(BlockRecord {
                    block_height: block.height,
                    parent_hash: block.parent_hash.clone(),
                    timestamp_ms: block.timestamp_ms,
                }),
            )
            .await?;

        let spec_key = keys::spec_version(block.spec_version);
        if self.store.get_spec_version(&spec_key).await?.is_none() {
            info!(
                "[ChainEventHandler] Runtime spec version {} first seen at block {}",
                block.spec_version, block.height
            );
            self.store
                .upsert(
                    &spec_key,
                    Entity::SpecVersion(SpecVersionRecord {
                        block_height: block.height,
                    }),
                )
                .await?;
        }
        Ok(())
    }
}

/// Drain block messages until the channel closes, cancellation is requested,
/// or a block fails. Sequencing and consistency errors are not survivable -
/// continuing past one would corrupt every later cumulative total - so they
/// end the task and are surfaced to the supervisor through the join handle.
pub fn run_event_handler(
    handler: ChainEventHandler,
    mut rx: mpsc::Receiver<BlockMessage>,
    cancel: CancellationToken,
) -> JoinHandle<Result<(), IndexerError>> {
    tokio::spawn(async move {
        info!("[ChainEventHandler] Event handler started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[ChainEventHandler] Shutdown requested, stopping");
                    return Ok(());
                }
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        info!("[ChainEventHandler] Block channel closed, stopping");
                        return Ok(());
                    };
                    if let Err(e) = handler.process_block(&msg.block, &msg.events).await {
                        error!(
                            "[ChainEventHandler] Failed to process block {}: {:?}",
                            msg.block.height, e
                        );
                        return Err(e);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChainEvent;
    use khala_indexer_store::models::ProposalStatus;
    use khala_indexer_store::MemoryStore;
    use khala_indexer_types::Balance;

    struct StaticBalances {
        issuance: Balance,
    }

    #[async_trait::async_trait]
    impl BalanceProvider for StaticBalances {
        async fn total_issuance(&self) -> anyhow::Result<Balance> {
            Ok(self.issuance)
        }

        async fn free_balance(&self, _account: &str) -> anyhow::Result<Balance> {
            Ok(0)
        }
    }

    fn handler() -> (Arc<MemoryStore>, ChainEventHandler) {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(IndexerMetrics::new_for_testing());
        let balances = Arc::new(StaticBalances { issuance: 1_000_000 });
        let handler = ChainEventHandler::new(
            store.clone(),
            balances,
            IndexerConfig::default(),
            metrics,
        );
        (store, handler)
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

    #[tokio::test]
    async fn block_processing_records_provenance_once_per_spec_version() {
        let (store, handler) = handler();
        handler.process_block(&block(1), &[]).await.unwrap();
        handler.process_block(&block(2), &[]).await.unwrap();

        assert!(store.get_block(&keys::block("0xblock1")).await.unwrap().is_some());
        assert!(store.get_block(&keys::block("0xblock2")).await.unwrap().is_some());
        let spec = store
            .get_spec_version(&keys::spec_version(1_170))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(spec.block_height, 1);
    }

    #[tokio::test]
    async fn full_block_touches_ledger_and_bridge() {
        let (store, handler) = handler();
        let tx = khala_indexer_types::TxMeta {
            hash: "0xvote".to_string(),
            signer: Some("relayer".to_string()),
            is_signed: true,
        };
        let events = vec![
            EventRecord::new(ChainEvent::TreasuryDeposit { amount: 250 }, None),
            EventRecord::new(
                ChainEvent::ProposalVoteFor {
                    origin_chain_id: 1,
                    deposit_nonce: 5,
                    resource_id: None,
                },
                Some(tx),
            ),
        ];
        handler.process_block(&block(10), &events).await.unwrap();

        let treasury = store
            .get_cumulative(&keys::cumulative("treasury", 10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(treasury.amount, 250);
        let inbound = store.get_inbound(&keys::inbound(1, 5)).await.unwrap().unwrap();
        assert_eq!(inbound.status, ProposalStatus::Initiated);
        assert_eq!(inbound.vote_txs, vec!["tx-0xvote"]);
    }

    #[tokio::test]
    async fn circulation_written_at_cadence_during_block_flow() {
        let (store, handler) = handler();
        handler.process_block(&block(299), &[]).await.unwrap();
        handler.process_block(&block(300), &[]).await.unwrap();

        assert!(store.get_circulation(&keys::circulation(299)).await.unwrap().is_none());
        let snap = store
            .get_circulation(&keys::circulation(300))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.total, 1_000_000);
    }

    #[tokio::test]
    async fn run_loop_surfaces_fatal_errors() {
        let (_store, handler) = handler();
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let join = run_event_handler(handler, rx, cancel);

        let deposit =
            |h: u64| BlockMessage {
                block: block(h),
                events: vec![EventRecord::new(ChainEvent::TreasuryDeposit { amount: 1 }, None)],
            };
        tx.send(deposit(100)).await.unwrap();
        // Out of order: the loop must stop and report, not continue.
        tx.send(deposit(90)).await.unwrap();
        drop(tx);

        let result = join.await.unwrap();
        match result {
            Err(IndexerError::SequenceViolation { head, block, .. }) => {
                assert_eq!(head, 100);
                assert_eq!(block, 90);
            }
            other => panic!("expected sequence violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn run_loop_stops_on_cancellation() {
        let (_store, handler) = handler();
        let (_tx, rx) = mpsc::channel::<BlockMessage>(1);
        let cancel = CancellationToken::new();
        let join = run_event_handler(handler, rx, cancel.clone());

        cancel.cancel();
        assert!(join.await.unwrap().is_ok());
    }
}
