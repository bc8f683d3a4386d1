//! On-disk store implementation.
//!
//! Each document is one JSON file under the data root, mirroring the path
//! structure:
//!
//! ```text
//! <root>/patients/p1.json
//! <root>/patients/p1/procedures/proc1.json
//! <root>/patients/p1/procedures/proc1/surgery/current.json
//! ```
//!
//! A document's sub-collections live in the directory named after the
//! document (without the `.json` suffix), so a document and its children
//! never collide.
//!
//! Change notification is in-process only: watchers see writes made through
//! this store instance, which is all the single-process server needs.

use crate::document::merge_fields;
use crate::watch::Watchers;
use crate::{
    CollectionEvent, CollectionPath, CollectionWatch, Document, DocumentEvent, DocumentPath,
    DocumentStore, DocumentWatch, Fields, StoreError, StoreResult, SubscriptionGuard,
};
use async_trait::async_trait;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// A [`DocumentStore`] persisting every document as a JSON file.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
    inner: Arc<Mutex<Watchers>>,
}

impl FileStore {
    /// Opens a store rooted at an existing directory.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidRootDirectory` if `root` does not exist or
    /// is not a directory.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StoreError::InvalidRootDirectory(
                root.display().to_string(),
            ));
        }
        Ok(Self {
            root: root.to_path_buf(),
            inner: Arc::new(Mutex::new(Watchers::default())),
        })
    }

    /// The data root this store reads and writes under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, Watchers> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn document_file(&self, path: &DocumentPath) -> PathBuf {
        let mut file = self.root.clone();
        let segments = path.segments();
        for segment in &segments[..segments.len() - 1] {
            file.push(segment);
        }
        // Appending the suffix by hand keeps ids containing dots intact.
        file.push(format!("{}.json", path.id()));
        file
    }

    fn collection_dir(&self, path: &CollectionPath) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in path.segments() {
            dir.push(segment);
        }
        dir
    }

    fn read_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let file = self.document_file(path);
        let contents = match fs::read_to_string(&file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(file.display().to_string(), e)),
        };
        let fields: Fields = serde_json::from_str(&contents).map_err(|e| {
            StoreError::Deserialization {
                path: path.key(),
                message: e.to_string(),
            }
        })?;
        Ok(Some(Document {
            id: path.id().to_owned(),
            fields,
        }))
    }

    /// Reads every document in a collection, sorted by id.
    ///
    /// Files that are not valid JSON objects are logged and skipped so one
    /// damaged record cannot make a whole collection unreadable.
    fn read_collection(&self, path: &CollectionPath) -> StoreResult<Vec<Document>> {
        let dir = self.collection_dir(path);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir.display().to_string(), e)),
        };

        let mut ids = Vec::new();
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if !entry_path.is_file() {
                continue;
            }
            if entry_path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = entry_path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_owned());
            }
        }
        ids.sort();

        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            let file = dir.join(format!("{id}.json"));
            let contents = match fs::read_to_string(&file) {
                Ok(contents) => contents,
                Err(e) => {
                    tracing::warn!("skipping unreadable document {}: {e}", file.display());
                    continue;
                }
            };
            match serde_json::from_str::<Fields>(&contents) {
                Ok(fields) => docs.push(Document { id, fields }),
                Err(e) => {
                    tracing::warn!("skipping malformed document {}: {e}", file.display());
                }
            }
        }
        Ok(docs)
    }

    fn write_document(&self, path: &DocumentPath, fields: &Fields) -> StoreResult<()> {
        let file = self.document_file(path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io(parent.display().to_string(), e))?;
        }
        let contents = serde_json::to_string_pretty(fields).map_err(|e| {
            StoreError::Serialization {
                path: path.key(),
                message: e.to_string(),
            }
        })?;
        fs::write(&file, contents).map_err(|e| StoreError::io(file.display().to_string(), e))
    }

    /// Publishes a document change and its parent collection's new contents.
    fn publish_change(&self, watchers: &mut Watchers, path: &DocumentPath) -> StoreResult<()> {
        let snapshot = self.read_document(path)?;
        watchers.publish_document(&path.key(), snapshot.as_ref());

        let collection = path.parent();
        let docs = self.read_collection(&collection)?;
        watchers.publish_collection(&collection.key(), &docs);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let _guard = self.lock();
        self.read_document(path)
    }

    async fn list_documents(&self, path: &CollectionPath) -> StoreResult<Vec<Document>> {
        let _guard = self.lock();
        self.read_collection(path)
    }

    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        let mut watchers = self.lock();
        self.write_document(path, &fields)?;
        self.publish_change(&mut watchers, path)
    }

    async fn merge_document(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()> {
        let mut watchers = self.lock();
        let mut current = self
            .read_document(path)?
            .map(|doc| doc.fields)
            .unwrap_or_default();
        merge_fields(&mut current, fields);
        self.write_document(path, &current)?;
        self.publish_change(&mut watchers, path)
    }

    async fn delete_document(&self, path: &DocumentPath) -> StoreResult<()> {
        let mut watchers = self.lock();
        let file = self.document_file(path);
        match fs::remove_file(&file) {
            Ok(()) => self.publish_change(&mut watchers, path),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(file.display().to_string(), e)),
        }
    }

    fn watch_document(&self, path: &DocumentPath) -> DocumentWatch {
        let key = path.key();
        let mut watchers = self.lock();
        let (token, events) = watchers.subscribe_document(&key);

        match self.read_document(path) {
            Ok(snapshot) => {
                watchers.send_document(&key, token, DocumentEvent::Snapshot(snapshot))
            }
            Err(e) => {
                tracing::warn!("initial read failed for watch on {key}: {e}");
                watchers.send_document(&key, token, DocumentEvent::Lost(e));
            }
        }

        let registry = Arc::clone(&self.inner);
        let guard_key = key.clone();
        let guard = SubscriptionGuard::new(move || {
            let mut watchers = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            watchers.unsubscribe_document(&guard_key, token);
        });

        DocumentWatch { events, guard }
    }

    fn watch_collection(&self, path: &CollectionPath) -> CollectionWatch {
        let key = path.key();
        let mut watchers = self.lock();
        let (token, events) = watchers.subscribe_collection(&key);

        match self.read_collection(path) {
            Ok(docs) => {
                watchers.send_collection(&key, token, CollectionEvent::Snapshot(docs))
            }
            Err(e) => {
                tracing::warn!("initial read failed for watch on {key}: {e}");
                watchers.send_collection(&key, token, CollectionEvent::Lost(e));
            }
        }

        let registry = Arc::clone(&self.inner);
        let guard_key = key.clone();
        let guard = SubscriptionGuard::new(move || {
            let mut watchers = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            watchers.unsubscribe_collection(&guard_key, token);
        });

        CollectionWatch { events, guard }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentEvent;
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

    #[test]
    fn open_rejects_missing_root() {
        let err = FileStore::open("/definitely/not/a/real/dir").expect_err("expected rejection");
        assert!(matches!(err, StoreError::InvalidRootDirectory(_)));
    }

    #[tokio::test]
    async fn set_then_get_round_trips_via_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
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
        assert_eq!(doc.fields["name"], json!("Ana"));
        assert!(dir.path().join("patients/p1.json").is_file());
    }

    #[tokio::test]
    async fn nested_documents_live_beside_parent_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");

        let procedure = patient_path("p1")
            .collection("procedures")
            .expect("valid collection")
            .doc(&RecordId::new("proc1").expect("valid id"));
        store
            .set_document(&procedure, fields(json!({"hospital": "Santa Casa"})))
            .await
            .expect("set");

        assert!(dir.path().join("patients/p1/procedures/proc1.json").is_file());
    }

    #[tokio::test]
    async fn lists_in_lexicographic_id_order_and_skips_damaged_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
        let patients = CollectionPath::root("patients").expect("valid collection");

        for id in ["zz", "aa", "mm"] {
            let path = patients.doc(&RecordId::new(id).expect("valid id"));
            store
                .set_document(&path, fields(json!({"id": id})))
                .await
                .expect("set");
        }
        std::fs::write(dir.path().join("patients/broken.json"), "not json")
            .expect("write damaged file");

        let docs = store.list_documents(&patients).await.expect("list");
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["aa", "mm", "zz"]);
    }

    #[tokio::test]
    async fn watch_sees_writes_through_this_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
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
        match watch.events.recv().await {
            Some(DocumentEvent::Snapshot(Some(doc))) => assert_eq!(doc.fields["v"], json!(1)),
            other => panic!("expected written snapshot, got {other:?}"),
        }
    }
}
