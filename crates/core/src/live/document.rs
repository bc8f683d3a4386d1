//! Typed adapter over a single-document subscription.
//!
//! Wraps the store's raw [`DocumentEvent`] channel and decodes each snapshot
//! into the target type. "Document absent" and "decode/transport failure"
//! stay distinct so callers can apply different policies to roots and
//! sub-records.

use apr_store::{DocumentEvent, DocumentPath, DocumentStore, StoreError, SubscriptionGuard};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tokio::sync::mpsc;

/// A decoded live event.
#[derive(Debug)]
pub(crate) enum LiveEvent<T> {
    /// The current value; `None` means the record does not exist.
    Value(Option<T>),
    /// The subscription or the decode failed.
    Failed(StoreError),
}

/// Live, typed view of one document.
pub(crate) struct DocumentSubscriber<T> {
    events: mpsc::UnboundedReceiver<DocumentEvent>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> DocumentSubscriber<T> {
    /// Establishes the subscription and returns the typed event source plus
    /// the disposer guard, separately, so teardown ownership can live apart
    /// from event consumption.
    pub(crate) fn subscribe(
        store: &dyn DocumentStore,
        path: &DocumentPath,
    ) -> (Self, SubscriptionGuard) {
        let (events, guard) = store.watch_document(path).into_parts();
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
            DocumentEvent::Snapshot(None) => LiveEvent::Value(None),
            DocumentEvent::Snapshot(Some(doc)) => match doc.decode::<T>() {
                Ok(value) => LiveEvent::Value(Some(value)),
                Err(e) => LiveEvent::Failed(e),
            },
            DocumentEvent::Lost(e) => LiveEvent::Failed(e),
        })
    }
}
