//! In-memory document store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::RwLock;

use super::new_id;
use crate::documents::{compare_values, Direction, Document, DocumentStore, Fields, Query, WriteMode};
use crate::error::{BackendError, BackendResult};

/// Document store kept in process memory, ordered by document id.
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Fields>>>,
    calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of documents in `collection`.
    pub async fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn enter(&self) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("document store unreachable".to_string()));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn put_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        mode: WriteMode,
    ) -> BackendResult<()> {
        self.enter()?;
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        if mode == WriteMode::Merge {
            if let Some(existing) = documents.get_mut(id) {
                existing.extend(fields);
                return Ok(());
            }
        }
        documents.insert(id.to_string(), fields);
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> BackendResult<Option<Document>> {
        self.enter()?;
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn add_document(&self, collection: &str, fields: Fields) -> BackendResult<String> {
        self.enter()?;
        let id = new_id();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> BackendResult<()> {
        self.enter()?;
        if let Some(documents) = self.collections.write().await.get_mut(collection) {
            documents.remove(id);
        }
        Ok(())
    }

    async fn query_documents(&self, collection: &str, query: &Query) -> BackendResult<Vec<Document>> {
        self.enter()?;
        let collections = self.collections.read().await;
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = documents
            .iter()
            .filter(|(_, fields)| query.filters.iter().all(|filter| filter.matches(fields)))
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect();

        if let Some(order) = &query.order {
            // Documents lacking the ordered field are excluded, as the hosted store does.
            matched.retain(|document| document.fields.contains_key(&order.field));
            matched.sort_by(|a, b| {
                let ordering = compare_values(&a.fields[&order.field], &b.fields[&order.field])
                    .unwrap_or(std::cmp::Ordering::Equal);
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }
}
