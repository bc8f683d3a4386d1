//! Typed store paths.
//!
//! A path is an alternating sequence of collection names and document
//! identifiers. A [`CollectionPath`] has an odd number of segments
//! (`patients`, `patients/p1/procedures`); a [`DocumentPath`] has an even
//! number (`patients/p1`). Building a path validates every segment, so a
//! constructed path can be turned into a storage key or a directory location
//! without further checks.

use crate::{StoreError, StoreResult};
use apr_types::RecordId;
use std::fmt;

fn validate_segment(segment: &str) -> StoreResult<String> {
    RecordId::new(segment)
        .map(|id| id.as_str().to_owned())
        .map_err(|e| StoreError::InvalidPath(format!("segment '{segment}': {e}")))
}

/// Path addressing a collection of documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    /// Creates a top-level collection path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidPath` if the name is empty or contains
    /// characters forbidden in identifiers.
    pub fn root(name: &str) -> StoreResult<Self> {
        Ok(Self {
            segments: vec![validate_segment(name)?],
        })
    }

    /// Returns the path of the document with the given identifier inside
    /// this collection.
    pub fn doc(&self, id: &RecordId) -> DocumentPath {
        let mut segments = self.segments.clone();
        segments.push(id.as_str().to_owned());
        DocumentPath { segments }
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The canonical string key for this collection (`a/b/c`).
    pub fn key(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Path addressing a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    /// Returns the path of a sub-collection nested under this document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidPath` if the collection name is empty or
    /// contains characters forbidden in identifiers.
    pub fn collection(&self, name: &str) -> StoreResult<CollectionPath> {
        let mut segments = self.segments.clone();
        segments.push(validate_segment(name)?);
        Ok(CollectionPath { segments })
    }

    /// The collection this document belongs to.
    pub fn parent(&self) -> CollectionPath {
        CollectionPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    /// The document's own identifier (the last path segment).
    pub fn id(&self) -> &str {
        self.segments
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The canonical string key for this document (`a/b/c/d`).
    pub fn key(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
