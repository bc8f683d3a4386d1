//! APR Document Store
//!
//! This crate provides document storage and live change subscriptions for the
//! Anaesthesia Procedure Record (APR).
//!
//! ## Design Principles
//!
//! - Documents are addressed by typed paths that alternate collection and
//!   document segments; paths are validated on construction, never at use.
//! - Reads, writes and subscriptions go through the [`DocumentStore`] trait,
//!   which is injected into services as an `Arc<dyn DocumentStore>`; there is
//!   no process-global store handle.
//! - Each individual document's change events are delivered in write order.
//!   No ordering is promised between different documents.
//! - Subscriptions return an event channel plus a [`SubscriptionGuard`] whose
//!   disposal is idempotent and also runs on drop.
//! - Collection listings are always in lexicographic document-id order, so
//!   "the first document" is the same document every time.
//!
//! ## Storage Model
//!
//! ```text
//! patients/{patient_id}                               # root document
//! patients/{patient_id}/procedures/{procedure_id}     # nested document
//! patients/{patient_id}/procedures/{procedure_id}/surgery/current
//! ```
//!
//! Two implementations are provided: [`MemoryStore`] for tests and
//! [`FileStore`], which keeps each document as a JSON file on disk.

mod document;
mod file;
mod memory;
mod path;
mod store;
mod watch;

pub use document::{Document, Fields};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use path::{CollectionPath, DocumentPath};
pub use store::DocumentStore;
pub use watch::{CollectionEvent, CollectionWatch, DocumentEvent, DocumentWatch, SubscriptionGuard};

/// Errors that can occur during store operations.
///
/// Variants carry rendered messages rather than source errors so events can
/// be fanned out to any number of subscribers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A path segment was empty or contained forbidden characters
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// An I/O operation against the backing storage failed
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    /// Document contents could not be serialised
    #[error("Failed to serialise document {path}: {message}")]
    Serialization { path: String, message: String },

    /// Document contents could not be deserialised
    #[error("Failed to deserialise document {path}: {message}")]
    Deserialization { path: String, message: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Convenience alias used throughout this crate.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
