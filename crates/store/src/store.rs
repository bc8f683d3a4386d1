//! The storage interface services are written against.

use crate::{
    CollectionPath, CollectionWatch, Document, DocumentPath, DocumentWatch, Fields, StoreResult,
};
use async_trait::async_trait;

/// A document-oriented store with live change subscriptions.
///
/// Implementations guarantee:
///
/// - per-document write ordering of delivered snapshots,
/// - an initial snapshot on every new watch (the current state at
///   registration time),
/// - collection listings in lexicographic document-id order,
/// - durability of a write before the call returns (to the extent the
///   backing medium provides it).
///
/// Services receive the store as an `Arc<dyn DocumentStore>` so tests can
/// substitute their own implementation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point-reads one document. `None` means the document does not exist.
    async fn get_document(&self, path: &DocumentPath) -> StoreResult<Option<Document>>;

    /// Lists all documents in a collection, in lexicographic id order.
    async fn list_documents(&self, path: &CollectionPath) -> StoreResult<Vec<Document>>;

    /// Replaces a document's fields wholesale, creating it if absent.
    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()>;

    /// Merges fields into a document, creating it if absent. Only the named
    /// top-level fields change; all others are left untouched.
    async fn merge_document(&self, path: &DocumentPath, fields: Fields) -> StoreResult<()>;

    /// Deletes a document. Deleting an absent document is a no-op.
    async fn delete_document(&self, path: &DocumentPath) -> StoreResult<()>;

    /// Subscribes to one document's changes. The current state is delivered
    /// immediately as the first event.
    fn watch_document(&self, path: &DocumentPath) -> DocumentWatch;

    /// Subscribes to a collection's changes. The current contents are
    /// delivered immediately as the first event.
    fn watch_collection(&self, path: &CollectionPath) -> CollectionWatch;
}
