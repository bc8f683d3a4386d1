//! In-memory store implementation.
//!
//! Backs the test suites and any ephemeral deployment. Collections are
//! ordered maps, so listings come back in lexicographic id order without any
//! extra work: the same order [`crate::FileStore`] produces from sorted
//! directory entries.

use crate::document::merge_fields;
use crate::watch::Watchers;
use crate::{
    CollectionEvent, CollectionPath, CollectionWatch, Document, DocumentEvent, DocumentPath,
    DocumentStore, DocumentWatch, Fields, StoreResult, SubscriptionGuard,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A [`DocumentStore`] kept entirely in process memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    /// Collection key -> document id -> fields.
    collections: BTreeMap<String, BTreeMap<String, Fields>>,
    watchers: Watchers,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means another thread panicked mid-write;
        // the data itself is still a consistent map.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn collection_snapshot(inner: &MemoryInner, key: &str) -> Vec<Document> {
    inner
        .collections
        .get(key)
        .map(|docs| {
            docs.iter()
                .map(|(id, fields)| Document {
                    id: id.clone(),
                    fields: fields.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn document_snapshot(inner: &MemoryInner, path: &DocumentPath) -> Option<Document> {
    inner
        .collections
        .get(&path.parent().key())
        .and_then(|docs| docs.get(path.id()))
        .map(|fields| Document {
            id: path.id().to_owned(),
            fields: fields.clone(),
        })
}

/// Publishes a document change and its parent collection's new contents.
fn publish_change(inner: &mut MemoryInner, path: &DocumentPath) {
    let snapshot = document_snapshot(inner, path);
    inner
        .watchers
        .publish_document(&path.key(), snapshot.as_ref());

    let collection_key = path.parent().key();
    let docs = collection_snapshot(inner, &collection_key);
    inner.watchers.publish_collection(&collection_key, &docs);
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        Ok(document_snapshot(&self.lock(), path))
    }

    async fn list_documents(&self, path: &CollectionPath) -> StoreResult<Vec<Document>> {
        Ok(collection_snapshot(&self.lock(), &path.key()))
    }

    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        let mut inner = self.lock();
        inner
            .collections
            .entry(path.parent().key())
            .or_default()
            .insert(path.id().to_owned(), fields);
        publish_change(&mut inner, path);
        Ok(())
    }

    async fn merge_document(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        let mut inner = self.lock();
        let entry = inner
            .collections
            .entry(path.parent().key())
            .or_default()
            .entry(path.id().to_owned())
            .or_default();
        merge_fields(entry, fields);
        publish_change(&mut inner, path);
        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> StoreResult<()> {
        let mut inner = self.lock();
        let collection_key = path.parent().key();
        let removed = inner
            .collections
            .get_mut(&collection_key)
            .and_then(|docs| docs.remove(path.id()))
            .is_some();
        if removed {
            publish_change(&mut inner, path);
        }
        Ok(())
    }

    fn watch_document(&self, path: &DocumentPath) -> DocumentWatch {
        let key = path.key();
        let mut inner = self.lock();
        let (token, events) = inner.watchers.subscribe_document(&key);

        let snapshot = document_snapshot(&inner, path);
        inner
            .watchers
            .send_document(&key, token, DocumentEvent::Snapshot(snapshot));

        let registry = Arc::clone(&self.inner);
        let guard_key = key.clone();
        let guard = SubscriptionGuard::new(move || {
            let mut inner = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            inner.watchers.unsubscribe_document(&guard_key, token);
        });

        DocumentWatch { events, guard }
    }

    fn watch_collection(&self, path: &CollectionPath) -> CollectionWatch {
        let key = path.key();
        let mut inner = self.lock();
        let (token, events) = inner.watchers.subscribe_collection(&key);

        let docs = collection_snapshot(&inner, &key);
        inner
            .watchers
            .send_collection(&key, token, CollectionEvent::Snapshot(docs));

        let registry = Arc::clone(&self.inner);
        let guard_key = key.clone();
        let guard = SubscriptionGuard::new(move || {
            let mut inner = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            inner.watchers.unsubscribe_collection(&guard_key, token);
        });

        CollectionWatch { events, guard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apr_types::RecordId;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn patient_path(id: &str) -> DocumentPath {
        CollectionPath::root("patients")
            .expect("valid collection")
            .doc(&RecordId::new(id).expect("valid id"))
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        let path = patient_path("p1");
        store
            .set_document(&path, fields(json!({"name": "Ana"})))
            .await
            .expect("set");

        let doc = store
            .get_document(&path)
            .await
            .expect("get")
            .expect("document exists");
        assert_eq!(doc.id, "p1");
        assert_eq!(doc.fields["name"], json!("Ana"));
    }

    #[tokio::test]
    async fn merge_preserves_unnamed_fields() {
        let store = MemoryStore::new();
        let path = patient_path("p1");
        store
            .set_document(&path, fields(json!({"name": "Ana", "sex": "female"})))
            .await
            .expect("set");
        store
            .merge_document(&path, fields(json!({"name": "Ana Souza"})))
            .await
            .expect("merge");

        let doc = store
            .get_document(&path)
            .await
            .expect("get")
            .expect("document exists");
        assert_eq!(doc.fields["name"], json!("Ana Souza"));
        assert_eq!(doc.fields["sex"], json!("female"));
    }

    #[tokio::test]
    async fn watch_delivers_initial_then_updates_in_write_order() {
        let store = MemoryStore::new();
        let path = patient_path("p1");

        let mut watch = store.watch_document(&path);
        match watch.events.recv().await {
            Some(DocumentEvent::Snapshot(None)) => {}
            other => panic!("expected initial absent snapshot, got {other:?}"),
        }

        store
            .set_document(&path, fields(json!({"v": 1})))
            .await
            .expect("set");
        store
            .merge_document(&path, fields(json!({"v": 2})))
            .await
            .expect("merge");

        for expected in [1, 2] {
            match watch.events.recv().await {
                Some(DocumentEvent::Snapshot(Some(doc))) => {
                    assert_eq!(doc.fields["v"], json!(expected));
                }
                other => panic!("expected snapshot {expected}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn collection_watch_lists_in_id_order() {
        let store = MemoryStore::new();
        let procedures = patient_path("p1")
            .collection("procedures")
            .expect("valid collection");

        // Insert out of order; listings must still be sorted by id.
        for id in ["b", "a", "c"] {
            let path = procedures.doc(&RecordId::new(id).expect("valid id"));
            store
                .set_document(&path, fields(json!({"id": id})))
                .await
                .expect("set");
        }

        let mut watch = store.watch_collection(&procedures);
        match watch.events.recv().await {
            Some(CollectionEvent::Snapshot(docs)) => {
                let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
                assert_eq!(ids, ["a", "b", "c"]);
            }
            other => panic!("expected collection snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disposed_watch_stops_delivery() {
        let store = MemoryStore::new();
        let path = patient_path("p1");

        let mut watch = store.watch_document(&path);
        watch.guard.dispose();
        watch.guard.dispose();

        store
            .set_document(&path, fields(json!({"v": 1})))
            .await
            .expect("set");

        // Only the initial snapshot was enqueued before disposal.
        match watch.events.recv().await {
            Some(DocumentEvent::Snapshot(None)) => {}
            other => panic!("expected initial snapshot, got {other:?}"),
        }
        assert!(watch.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn delete_notifies_with_absent_snapshot() {
        let store = MemoryStore::new();
        let path = patient_path("p1");
        store
            .set_document(&path, fields(json!({"v": 1})))
            .await
            .expect("set");

        let mut watch = store.watch_document(&path);
        // Skip the initial present snapshot.
        let _ = watch.events.recv().await;

        store.delete_document(&path).await.expect("delete");
        match watch.events.recv().await {
            Some(DocumentEvent::Snapshot(None)) => {}
            other => panic!("expected absent snapshot after delete, got {other:?}"),
        }
    }
}
