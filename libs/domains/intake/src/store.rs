use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use crate::error::{IntakeError, IntakeResult};
use crate::models::{Document, FieldFilter, Fields};

/// Document store capability
///
/// Implementations: [`crate::FirestoreStore`] (Firestore REST) and
/// [`InMemoryDocumentStore`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents of `collection` matching an equality filter
    async fn query(&self, collection: &str, filter: &FieldFilter) -> IntakeResult<Vec<Document>>;

    /// Merge `fields` into an existing document; other fields are left untouched
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> IntakeResult<()>;
}

/// One recorded update call
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCall {
    pub collection: String,
    pub id: String,
    pub fields: Fields,
}

/// In-memory store for tests and local runs
///
/// Supports failure injection: [`fail_queries`](Self::fail_queries) makes every
/// query fail, [`fail_updates_after`](Self::fail_updates_after) lets the first
/// `n` updates of one document succeed and fails the rest.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Fields>>>,
    updates: RwLock<Vec<UpdateCall>>,
    failing_queries: AtomicBool,
    update_budgets: RwLock<HashMap<String, usize>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, collection: &str, document: Document) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(document.id, document.fields);
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone()))
    }

    /// Every successful update, in call order
    pub async fn updates(&self) -> Vec<UpdateCall> {
        self.updates.read().await.clone()
    }

    pub fn fail_queries(&self, fail: bool) {
        self.failing_queries.store(fail, Ordering::SeqCst);
    }

    /// Allow `allowed` more updates of document `id`, then fail
    pub async fn fail_updates_after(&self, id: &str, allowed: usize) {
        self.update_budgets
            .write()
            .await
            .insert(id.to_string(), allowed);
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn query(&self, collection: &str, filter: &FieldFilter) -> IntakeResult<Vec<Document>> {
        if self.failing_queries.load(Ordering::SeqCst) {
            return Err(IntakeError::Store("store unreachable".to_string()));
        }

        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .filter(|doc| filter.matches(doc))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> IntakeResult<()> {
        {
            let mut budgets = self.update_budgets.write().await;
            if let Some(remaining) = budgets.get_mut(id) {
                if *remaining == 0 {
                    return Err(IntakeError::Store(format!("write rejected for {}", id)));
                }
                *remaining -= 1;
            }
        }

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        let existing = docs
            .get_mut(id)
            .ok_or_else(|| IntakeError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        existing.extend(fields.clone());

        self.updates.write().await.push(UpdateCall {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
        Ok(())
    }
}
