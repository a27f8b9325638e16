// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};

/// Counters and gauges for the indexing pipeline.
#[derive(Clone)]
pub struct IndexerMetrics {
    pub(crate) blocks_processed: IntCounter,
    pub(crate) last_processed_block: IntGauge,
    pub(crate) events_processed: IntCounterVec,

    pub(crate) ledger_snapshots_written: IntCounterVec,
    pub(crate) duplicate_block_recomputes: IntCounterVec,

    pub(crate) circulation_snapshots_written: IntCounter,
    pub(crate) circulation_query_failures: IntCounter,

    pub(crate) bridge_outbound_created: IntCounter,
    pub(crate) bridge_inbound_created: IntCounter,
    pub(crate) bridge_votes_recorded: IntCounter,
    pub(crate) bridge_status_applied: IntCounterVec,
    pub(crate) bridge_status_dropped: IntCounterVec,

    pub(crate) xcm_transfers_recorded: IntCounter,
    pub(crate) unrecognized_destinations: IntCounter,
}

impl IndexerMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            blocks_processed: register_int_counter_with_registry!(
                "indexer_blocks_processed",
                "Total number of blocks processed",
                registry,
            )
            .unwrap(),
            last_processed_block: register_int_gauge_with_registry!(
                "indexer_last_processed_block",
                "Height of the last fully processed block",
                registry,
            )
            .unwrap(),
            events_processed: register_int_counter_vec_with_registry!(
                "indexer_events_processed",
                "Total number of events processed, by pallet and method",
                &["section", "method"],
                registry,
            )
            .unwrap(),
            ledger_snapshots_written: register_int_counter_vec_with_registry!(
                "indexer_ledger_snapshots_written",
                "Cumulative ledger snapshots written, by metric",
                &["metric"],
                registry,
            )
            .unwrap(),
            duplicate_block_recomputes: register_int_counter_vec_with_registry!(
                "indexer_duplicate_block_recomputes",
                "Duplicate block deliveries recomputed idempotently, by metric",
                &["metric"],
                registry,
            )
            .unwrap(),
            circulation_snapshots_written: register_int_counter_with_registry!(
                "indexer_circulation_snapshots_written",
                "Circulating-supply snapshots written at cadence boundaries",
                registry,
            )
            .unwrap(),
            circulation_query_failures: register_int_counter_with_registry!(
                "indexer_circulation_query_failures",
                "Balance/issuance queries that failed at a cadence boundary",
                registry,
            )
            .unwrap(),
            bridge_outbound_created: register_int_counter_with_registry!(
                "indexer_bridge_outbound_created",
                "Outbound bridge records created",
                registry,
            )
            .unwrap(),
            bridge_inbound_created: register_int_counter_with_registry!(
                "indexer_bridge_inbound_created",
                "Inbound bridge records created on first vote",
                registry,
            )
            .unwrap(),
            bridge_votes_recorded: register_int_counter_with_registry!(
                "indexer_bridge_votes_recorded",
                "Votes appended to inbound bridge records",
                registry,
            )
            .unwrap(),
            bridge_status_applied: register_int_counter_vec_with_registry!(
                "indexer_bridge_status_applied",
                "Inbound proposal status transitions applied, by new status",
                &["status"],
                registry,
            )
            .unwrap(),
            bridge_status_dropped: register_int_counter_vec_with_registry!(
                "indexer_bridge_status_dropped",
                "Inbound proposal status events dropped, by reason",
                &["reason"],
                registry,
            )
            .unwrap(),
            xcm_transfers_recorded: register_int_counter_with_registry!(
                "indexer_xcm_transfers_recorded",
                "Cross-consensus transfers recorded with a recognized destination",
                registry,
            )
            .unwrap(),
            unrecognized_destinations: register_int_counter_with_registry!(
                "indexer_unrecognized_destinations",
                "Cross-consensus transfers dropped with an unrecognized destination",
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }
}
