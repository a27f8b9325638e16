// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! Entity store boundary.
//!
//! The indexer core writes through an abstract key-value interface with
//! get/upsert semantics; both calls are assumed to execute within the same
//! logical transaction scope as the triggering event, so partial writes are
//! never observable. A production deployment binds this to its database;
//! [`MemoryStore`] is the in-process implementation used by tests and local
//! runs.

pub mod models;

pub use models::{keys, Entity};

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Errors surfaced by an entity store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store failed (connection, transaction, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
    /// An id resolved to an entity of a different kind than the caller
    /// expected. Indicates a key-space collision, not a data race.
    #[error("entity at {id} has kind {found}, expected {expected}")]
    WrongKind {
        id: String,
        expected: &'static str,
        found: &'static str,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstract entity store with get/upsert semantics.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(&self, id: &str) -> StoreResult<Option<Entity>>;
    async fn upsert(&self, id: &str, entity: Entity) -> StoreResult<()>;
}

/// Generates [`EntityStoreExt`] with one kind-checked getter per entity
/// variant.
macro_rules! typed_getters {
    ($($name:ident => $variant:ident($ty:ty), $kind:literal;)+) => {
        /// Kind-checked getters over any [`EntityStore`].
        #[async_trait]
        pub trait EntityStoreExt: EntityStore {
            $(
                async fn $name(&self, id: &str) -> StoreResult<Option<$ty>> {
                    match self.get(id).await? {
                        None => Ok(None),
                        Some(Entity::$variant(v)) => Ok(Some(v)),
                        Some(other) => Err(StoreError::WrongKind {
                            id: id.to_string(),
                            expected: $kind,
                            found: other.kind(),
                        }),
                    }
                }
            )+
        }
    };
}

typed_getters! {
    get_cumulative => Cumulative(models::CumulativeSnapshot), "cumulative";
    get_head => Head(models::MetricHead), "head";
    get_circulation => Circulation(models::CirculationSnapshot), "circulation";
    get_outbound => Outbound(models::BridgeOutboundRecord), "outbound";
    get_inbound => Inbound(models::BridgeInboundRecord), "inbound";
    get_tx => Tx(models::TxRef), "tx";
    get_block => Block(models::BlockRecord), "block";
    get_spec_version => SpecVersion(models::SpecVersionRecord), "spec_version";
    get_xcm_transfer => XcmTransfer(models::XcmTransferRecord), "xcm_transfer";
}

#[async_trait]
impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

/// In-memory entity store.
pub struct MemoryStore {
    entities: RwLock<HashMap<String, Entity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored entities. Test helper.
    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn get(&self, id: &str) -> StoreResult<Option<Entity>> {
        Ok(self.entities.read().await.get(id).cloned())
    }

    async fn upsert(&self, id: &str, entity: Entity) -> StoreResult<()> {
        self.entities.write().await.insert(id.to_string(), entity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{MetricHead, TxRef};

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = MemoryStore::new();
        let tx = TxRef {
            hash: "0xdead".to_string(),
            signer: Some("alice".to_string()),
        };
        store
            .upsert(&keys::tx("0xdead"), Entity::Tx(tx.clone()))
            .await
            .unwrap();

        match store.get(&keys::tx("0xdead")).await.unwrap() {
            Some(Entity::Tx(found)) => assert_eq!(found, tx),
            other => panic!("unexpected entity: {:?}", other),
        }
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("no-such-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn typed_getter_rejects_wrong_kind() {
        let store = MemoryStore::new();
        store
            .upsert(
                "some-id",
                Entity::Head(MetricHead { block_height: 5 }),
            )
            .await
            .unwrap();

        let err = store.get_tx("some-id").await.unwrap_err();
        match err {
            StoreError::WrongKind {
                expected, found, ..
            } => {
                assert_eq!(expected, "tx");
                assert_eq!(found, "head");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // The typed getter for the right kind still works.
        assert_eq!(
            store.get_head("some-id").await.unwrap().unwrap().block_height,
            5
        );
    }

    #[tokio::test]
    async fn upsert_overwrites() {
        let store = MemoryStore::new();
        let id = keys::head("treasury");
        store
            .upsert(&id, Entity::Head(MetricHead { block_height: 1 }))
            .await
            .unwrap();
        store
            .upsert(&id, Entity::Head(MetricHead { block_height: 2 }))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        match store.get(&id).await.unwrap() {
            Some(Entity::Head(head)) => assert_eq!(head.block_height, 2),
            other => panic!("unexpected entity: {:?}", other),
        }
    }
}
