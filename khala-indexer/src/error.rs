// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

use khala_indexer_store::StoreError;
use khala_indexer_types::BlockNumber;

/// Errors that abort processing of the current block.
///
/// Non-fatal conditions (unrecognized destination shapes, transient balance
/// query failures) are not represented here: those paths skip the affected
/// record, log, and bump a counter instead.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// A fetched head/snapshot does not match the expected predecessor.
    /// Delivery must be strictly height-ordered; continuing would produce
    /// an inconsistent cumulative total.
    #[error(
        "sequence violation for {metric}: head snapshot at block {head} \
         is ahead of incoming block {block}"
    )]
    SequenceViolation {
        metric: &'static str,
        head: BlockNumber,
        block: BlockNumber,
    },

    /// A snapshot the head pointer references is missing or of the wrong
    /// shape. The store contents are inconsistent with the carry-forward
    /// invariants.
    #[error("inconsistent store for {metric}: {detail}")]
    InconsistentSnapshot {
        metric: &'static str,
        detail: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IndexerError {
    /// Short stable label for metrics and alerting.
    pub fn error_type(&self) -> &'static str {
        match self {
            IndexerError::SequenceViolation { .. } => "sequence_violation",
            IndexerError::InconsistentSnapshot { .. } => "inconsistent_snapshot",
            IndexerError::Store(_) => "store_error",
        }
    }
}

pub type IndexerResult<T> = Result<T, IndexerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_types_are_stable_prometheus_labels() {
        let errors = [
            IndexerError::SequenceViolation {
                metric: "treasury",
                head: 100,
                block: 99,
            },
            IndexerError::InconsistentSnapshot {
                metric: "mining",
                detail: "missing".to_string(),
            },
            IndexerError::Store(StoreError::Backend("down".to_string())),
        ];
        for err in errors {
            let label = err.error_type();
            assert!(!label.is_empty());
            assert!(label.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn sequence_violation_display_names_blocks() {
        let err = IndexerError::SequenceViolation {
            metric: "treasury",
            head: 100,
            block: 98,
        };
        let msg = err.to_string();
        assert!(msg.contains("treasury"));
        assert!(msg.contains("100"));
        assert!(msg.contains("98"));
    }
}
