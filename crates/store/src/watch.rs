//! Live subscription plumbing.
//!
//! Every watch hands back two things: an unbounded event channel and a
//! [`SubscriptionGuard`]. The guard detaches the subscriber from the store's
//! registry; disposing it twice is a no-op, and dropping it disposes it.
//!
//! Event fan-out happens while the store's state lock is held, which is what
//! gives each document its write-order delivery guarantee. Nothing is
//! promised about ordering *between* documents.

use crate::{Document, StoreError};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// A change notification for a single document.
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    /// The document's current state; `None` means it does not exist.
    Snapshot(Option<Document>),
    /// The subscription failed; no further snapshots will arrive.
    Lost(StoreError),
}

/// A change notification for a collection.
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    /// All documents in the collection, in lexicographic id order.
    Snapshot(Vec<Document>),
    /// The subscription failed; no further snapshots will arrive.
    Lost(StoreError),
}

/// Detaches a subscriber from the store when disposed.
///
/// Disposal is idempotent: the detach closure runs at most once, no matter
/// how many times [`dispose`](Self::dispose) is called, and dropping an
/// undisposed guard disposes it.
pub struct SubscriptionGuard {
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    /// Wraps a detach closure. The closure runs at most once.
    ///
    /// Public so store implementations can be composed: a wrapping store
    /// chains its own teardown in front of the inner guard's.
    pub fn new(unregister: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// Detaches the subscriber. Safe to call any number of times.
    pub fn dispose(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }

    /// Whether the guard has already been disposed.
    pub fn is_disposed(&self) -> bool {
        self.unregister.is_none()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A live subscription to one document.
#[derive(Debug)]
pub struct DocumentWatch {
    /// Snapshot and error events, in delivery order.
    pub events: mpsc::UnboundedReceiver<DocumentEvent>,
    /// Detaches this watch from the store.
    pub guard: SubscriptionGuard,
}

impl DocumentWatch {
    /// Splits the watch into its event channel and guard, so ownership of
    /// teardown can live apart from the consumer of events.
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<DocumentEvent>, SubscriptionGuard) {
        (self.events, self.guard)
    }
}

/// A live subscription to one collection.
#[derive(Debug)]
pub struct CollectionWatch {
    /// Snapshot and error events, in delivery order.
    pub events: mpsc::UnboundedReceiver<CollectionEvent>,
    /// Detaches this watch from the store.
    pub guard: SubscriptionGuard,
}

impl CollectionWatch {
    /// Splits the watch into its event channel and guard.
    pub fn into_parts(self) -> (mpsc::UnboundedReceiver<CollectionEvent>, SubscriptionGuard) {
        (self.events, self.guard)
    }
}

/// Registry of live subscribers, keyed by path.
///
/// Owned by a store implementation and always accessed under that store's
/// state lock, so registrations, writes and fan-out are serialised.
#[derive(Default, Debug)]
pub(crate) struct Watchers {
    next_id: u64,
    documents: HashMap<String, HashMap<u64, mpsc::UnboundedSender<DocumentEvent>>>,
    collections: HashMap<String, HashMap<u64, mpsc::UnboundedSender<CollectionEvent>>>,
}

impl Watchers {
    /// Registers a document subscriber and returns its token and channel.
    pub(crate) fn subscribe_document(
        &mut self,
        key: &str,
    ) -> (u64, mpsc::UnboundedReceiver<DocumentEvent>) {
        let token = self.allocate_token();
        let (tx, rx) = mpsc::unbounded_channel();
        self.documents
            .entry(key.to_owned())
            .or_default()
            .insert(token, tx);
        (token, rx)
    }

    /// Registers a collection subscriber and returns its token and channel.
    pub(crate) fn subscribe_collection(
        &mut self,
        key: &str,
    ) -> (u64, mpsc::UnboundedReceiver<CollectionEvent>) {
        let token = self.allocate_token();
        let (tx, rx) = mpsc::unbounded_channel();
        self.collections
            .entry(key.to_owned())
            .or_default()
            .insert(token, tx);
        (token, rx)
    }

    pub(crate) fn unsubscribe_document(&mut self, key: &str, token: u64) {
        if let Some(subscribers) = self.documents.get_mut(key) {
            subscribers.remove(&token);
            if subscribers.is_empty() {
                self.documents.remove(key);
            }
        }
    }

    pub(crate) fn unsubscribe_collection(&mut self, key: &str, token: u64) {
        if let Some(subscribers) = self.collections.get_mut(key) {
            subscribers.remove(&token);
            if subscribers.is_empty() {
                self.collections.remove(key);
            }
        }
    }

    /// Delivers a document snapshot to every subscriber of `key`.
    pub(crate) fn publish_document(&mut self, key: &str, snapshot: Option<&Document>) {
        if let Some(subscribers) = self.documents.get_mut(key) {
            subscribers.retain(|_, tx| {
                tx.send(DocumentEvent::Snapshot(snapshot.cloned())).is_ok()
            });
        }
    }

    /// Delivers a collection snapshot to every subscriber of `key`.
    pub(crate) fn publish_collection(&mut self, key: &str, docs: &[Document]) {
        if let Some(subscribers) = self.collections.get_mut(key) {
            subscribers.retain(|_, tx| {
                tx.send(CollectionEvent::Snapshot(docs.to_vec())).is_ok()
            });
        }
    }

    /// Delivers an event to one document subscriber only. Used to hand a
    /// freshly registered watch its initial state (or the error that stood
    /// in for it).
    pub(crate) fn send_document(&mut self, key: &str, token: u64, event: DocumentEvent) {
        if let Some(tx) = self.documents.get(key).and_then(|subs| subs.get(&token)) {
            let _ = tx.send(event);
        }
    }

    /// Delivers an event to one collection subscriber only.
    pub(crate) fn send_collection(&mut self, key: &str, token: u64, event: CollectionEvent) {
        if let Some(tx) = self.collections.get(key).and_then(|subs| subs.get(&token)) {
            let _ = tx.send(event);
        }
    }

    fn allocate_token(&mut self) -> u64 {
        let token = self.next_id;
        self.next_id += 1;
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_disposes_exactly_once() {
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = count.clone();
        let mut guard = SubscriptionGuard::new(move || {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        assert!(!guard.is_disposed());
        guard.dispose();
        guard.dispose();
        assert!(guard.is_disposed());
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn guard_disposes_on_drop() {
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = count.clone();
        drop(SubscriptionGuard::new(move || {
            seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribed_watcher_receives_nothing() {
        let mut watchers = Watchers::default();
        let (token, mut rx) = watchers.subscribe_document("patients/p1");
        watchers.unsubscribe_document("patients/p1", token);
        watchers.publish_document("patients/p1", None);
        assert!(rx.try_recv().is_err());
    }
}
