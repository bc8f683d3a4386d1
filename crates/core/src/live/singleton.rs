//! Typed adapter over a singleton sub-collection subscription.
//!
//! A singleton sub-collection is expected to hold at most one document, but
//! the store cannot enforce that. This adapter projects "the first document,
//! if any": first in the store's lexicographic id order, so the choice is
//! the same on every delivery. Zero documents is the valid "no sub-record
//! yet" state, not an error.

use crate::live::document::LiveEvent;
use apr_store::{CollectionEvent, CollectionPath, DocumentStore, SubscriptionGuard};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio::sync::mpsc;

/// Live, typed view of a singleton sub-collection.
pub(crate) struct SingletonSubscriber<T> {
    events: mpsc::UnboundedReceiver<CollectionEvent>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> SingletonSubscriber<T> {
    /// Establishes the subscription and returns the typed event source plus
    /// the disposer guard.
    pub(crate) fn subscribe(
        store: &dyn DocumentStore,
        path: &CollectionPath,
    ) -> (Self, SubscriptionGuard) {
        let (events, guard) = store.watch_collection(path).into_parts();
        (
            Self {
                events,
                _marker: PhantomData,
            },
            guard,
        )
    }

    /// The next typed event; `None` once the subscription is disposed and
    /// drained.
    pub(crate) async fn next(&mut self) -> Option<LiveEvent<T>> {
        let event = self.events.recv().await?;
        Some(match event {
            CollectionEvent::Snapshot(docs) => match docs.first() {
                None => LiveEvent::Value(None),
                Some(doc) => match doc.decode::<T>() {
                    Ok(value) => LiveEvent::Value(Some(value)),
                    Err(e) => LiveEvent::Failed(e),
                },
            },
            CollectionEvent::Lost(e) => LiveEvent::Failed(e),
        })
    }
}
