// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Event-indexing core for the Khala parachain.
//!
//! Consumes decoded runtime events block by block and maintains economic
//! ledgers (cumulative treasury inflow, cumulative mining payouts,
//! circulating supply at a fixed cadence), bridge transfer records with a
//! strict proposal state machine, and cross-consensus transfer records with
//! hierarchically resolved destinations. All persistence goes through the
//! key-value entity store in `khala-indexer-store`.

#![allow(clippy::too_many_arguments)]

pub mod bridge;
pub mod config;
pub mod destination;
pub mod error;
pub mod events;
pub mod fixed_point;
pub mod handler;
pub mod ledger;
pub mod metrics;

pub use config::IndexerConfig;
pub use error::{IndexerError, IndexerResult};
pub use events::{ChainEvent, EventRecord};
pub use handler::{run_event_handler, BlockMessage, ChainEventHandler};
pub use ledger::BalanceProvider;
pub use metrics::IndexerMetrics;
