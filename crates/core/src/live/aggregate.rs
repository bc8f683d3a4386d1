//! The live procedure aggregate.
//!
//! Composes one patient root, one procedure root and the three optional
//! sub-records (surgery, pre-anaesthetic, PACU) into a continuously-updated
//! value, published through a `tokio::sync::watch` channel.
//!
//! ## Loading
//!
//! The aggregate is loading until both root subscriptions have delivered at
//! least one snapshot (present, absent or failed). A small readiness state
//! machine tracks this join; once ready, the aggregate never reports
//! loading again for the life of the subscription.
//!
//! ## Errors
//!
//! A missing or failed *root* makes the whole aggregate unusable and is
//! surfaced in [`ProcedureAggregate::error`]. A missing or failed
//! *sub-record* is normal application state: the corresponding field is
//! simply absent, and failures are logged, never escalated.
//!
//! ## Teardown
//!
//! [`AggregateHandle`] owns the five subscription disposers. `shutdown()`
//! (or dropping the handle) disposes each exactly once, synchronously; the
//! pump task then drains and exits on its own. To follow a different
//! (patient, procedure) pair, shut the old handle down first and subscribe
//! again; snapshots from the old pair can never reach the new handle's
//! channel.

use crate::error::RecordResult;
use crate::live::document::{DocumentSubscriber, LiveEvent};
use crate::live::singleton::SingletonSubscriber;
use crate::live::status::{derive_status, DerivedStatus};
use crate::patient::Patient;
use crate::paths;
use crate::procedure::Procedure;
use crate::records::pacu::RecoveryRecord;
use crate::records::pre_anaesthetic::PreAnaestheticEvaluation;
use crate::records::surgery::SurgeryRecord;
use apr_store::{DocumentStore, StoreError, SubscriptionGuard};
use apr_types::RecordId;
use std::sync::Arc;
use tokio::sync::watch;

/// A blocking error on one of the aggregate's root subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("patient record {0} was not found")]
    PatientNotFound(String),
    #[error("procedure record {0} was not found")]
    ProcedureNotFound(String),
    #[error("live subscription to {target} failed: {message}")]
    Subscription { target: String, message: String },
}

/// The composed, always-current view of a procedure and its optional
/// dependent clinical records.
#[derive(Debug, Clone)]
pub struct ProcedureAggregate {
    /// The patient identifier this aggregate follows.
    pub patient_id: RecordId,
    /// The procedure identifier this aggregate follows.
    pub procedure_id: RecordId,
    /// The patient snapshot, once loaded and found.
    pub patient: Option<Patient>,
    /// The procedure snapshot, once loaded and found.
    pub procedure: Option<Procedure>,
    /// The intraoperative record, when one exists.
    pub surgery: Option<SurgeryRecord>,
    /// The pre-anaesthetic evaluation, when one exists.
    pub pre_anaesthetic: Option<PreAnaestheticEvaluation>,
    /// The recovery record, when one exists.
    pub pacu: Option<RecoveryRecord>,
    /// True until both root subscriptions have delivered a first snapshot.
    pub loading: bool,
    /// Set when a root is missing or its subscription failed.
    pub error: Option<AggregateError>,
    /// Completeness rules derived from sub-record presence.
    pub status: DerivedStatus,
}

impl ProcedureAggregate {
    fn pending(patient_id: RecordId, procedure_id: RecordId) -> Self {
        Self {
            patient_id,
            procedure_id,
            patient: None,
            procedure: None,
            surgery: None,
            pre_anaesthetic: None,
            pacu: None,
            loading: true,
            error: None,
            status: derive_status(false, false, false),
        }
    }
}

/// Entry point for live aggregate subscriptions.
#[derive(Clone)]
pub struct ProcedureLive {
    store: Arc<dyn DocumentStore>,
}

impl ProcedureLive {
    /// Creates the subscription service backed by the given store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Subscribes to one (patient, procedure) pair.
    ///
    /// Establishes all five underlying subscriptions (two roots, three
    /// singleton sub-collections) and spawns the pump task that folds their
    /// events into [`ProcedureAggregate`] values. Must be called from within
    /// a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidIdentifier`, before any store call, if
    /// either identifier is empty or malformed.
    pub fn subscribe(
        &self,
        patient_id: &str,
        procedure_id: &str,
    ) -> RecordResult<AggregateHandle> {
        let patient_id = RecordId::new(patient_id)?;
        let procedure_id = RecordId::new(procedure_id)?;
        let store = self.store.as_ref();

        let (patient_events, patient_guard) =
            DocumentSubscriber::subscribe(store, &paths::patient_doc(&patient_id));
        let (procedure_events, procedure_guard) =
            DocumentSubscriber::subscribe(store, &paths::procedure_doc(&patient_id, &procedure_id));
        let (surgery_events, surgery_guard) = SingletonSubscriber::subscribe(
            store,
            &paths::surgery_collection(&patient_id, &procedure_id),
        );
        let (pre_anaesthetic_events, pre_anaesthetic_guard) = SingletonSubscriber::subscribe(
            store,
            &paths::pre_anaesthetic_collection(&patient_id, &procedure_id),
        );
        let (pacu_events, pacu_guard) = SingletonSubscriber::subscribe(
            store,
            &paths::pacu_collection(&patient_id, &procedure_id),
        );

        let (out, rx) = watch::channel(ProcedureAggregate::pending(
            patient_id.clone(),
            procedure_id.clone(),
        ));

        let pump = AggregatePump {
            patient_id,
            procedure_id,
            patient_events,
            procedure_events,
            surgery_events,
            pre_anaesthetic_events,
            pacu_events,
            out,
            patient_state: RootState::Pending,
            procedure_state: RootState::Pending,
            readiness: Readiness::Pending,
            surgery: None,
            pre_anaesthetic: None,
            pacu: None,
        };
        tokio::spawn(pump.run());

        Ok(AggregateHandle {
            rx,
            guards: vec![
                patient_guard,
                procedure_guard,
                surgery_guard,
                pre_anaesthetic_guard,
                pacu_guard,
            ],
        })
    }
}

/// A live aggregate subscription.
///
/// Holds the output channel and the five subscription disposers. Dropping
/// the handle tears the subscription down.
#[derive(Debug)]
pub struct AggregateHandle {
    rx: watch::Receiver<ProcedureAggregate>,
    guards: Vec<SubscriptionGuard>,
}

impl AggregateHandle {
    /// The most recently published aggregate value.
    pub fn current(&self) -> ProcedureAggregate {
        self.rx.borrow().clone()
    }

    /// A watch receiver for consumers that want to follow changes
    /// themselves.
    pub fn watch(&self) -> watch::Receiver<ProcedureAggregate> {
        self.rx.clone()
    }

    /// Waits for the next published change. Returns `false` once the pump
    /// has ended and no further changes can arrive.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until the aggregate has settled (loading is over) and returns
    /// it. Also returns early if the subscription ends first.
    pub async fn settled(&mut self) -> ProcedureAggregate {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if !current.loading {
                return current;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }

    /// Disposes all five underlying subscriptions.
    ///
    /// Each disposer runs exactly once no matter how many times this is
    /// called; the pump task drains its channels and exits afterwards.
    pub fn shutdown(&mut self) {
        for guard in &mut self.guards {
            guard.dispose();
        }
    }
}

/// First-snapshot join over the two root subscriptions.
///
/// Replaces the fixed settle delay of earlier renditions: loading ends
/// exactly when both roots have reported once, and the machine never moves
/// backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Readiness {
    Pending,
    PatientReady,
    ProcedureReady,
    Ready,
}

impl Readiness {
    fn note_patient(&mut self) {
        *self = match self {
            Readiness::Pending | Readiness::PatientReady => Readiness::PatientReady,
            Readiness::ProcedureReady | Readiness::Ready => Readiness::Ready,
        };
    }

    fn note_procedure(&mut self) {
        *self = match self {
            Readiness::Pending | Readiness::ProcedureReady => Readiness::ProcedureReady,
            Readiness::PatientReady | Readiness::Ready => Readiness::Ready,
        };
    }

    fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// Last-known state of one root subscription.
enum RootState<T> {
    Pending,
    Present(T),
    Missing,
    Failed(StoreError),
}

impl<T: Clone> RootState<T> {
    fn value(&self) -> Option<T> {
        match self {
            RootState::Present(value) => Some(value.clone()),
            _ => None,
        }
    }
}

enum PumpEvent {
    Patient(Option<LiveEvent<Patient>>),
    Procedure(Option<LiveEvent<Procedure>>),
    Surgery(Option<LiveEvent<SurgeryRecord>>),
    PreAnaesthetic(Option<LiveEvent<PreAnaestheticEvaluation>>),
    Pacu(Option<LiveEvent<RecoveryRecord>>),
}

/// Folds the five subscriptions into published aggregate values.
struct AggregatePump {
    patient_id: RecordId,
    procedure_id: RecordId,
    patient_events: DocumentSubscriber<Patient>,
    procedure_events: DocumentSubscriber<Procedure>,
    surgery_events: SingletonSubscriber<SurgeryRecord>,
    pre_anaesthetic_events: SingletonSubscriber<PreAnaestheticEvaluation>,
    pacu_events: SingletonSubscriber<RecoveryRecord>,
    out: watch::Sender<ProcedureAggregate>,
    patient_state: RootState<Patient>,
    procedure_state: RootState<Procedure>,
    readiness: Readiness,
    surgery: Option<SurgeryRecord>,
    pre_anaesthetic: Option<PreAnaestheticEvaluation>,
    pacu: Option<RecoveryRecord>,
}

impl AggregatePump {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                e = self.patient_events.next() => PumpEvent::Patient(e),
                e = self.procedure_events.next() => PumpEvent::Procedure(e),
                e = self.surgery_events.next() => PumpEvent::Surgery(e),
                e = self.pre_anaesthetic_events.next() => PumpEvent::PreAnaesthetic(e),
                e = self.pacu_events.next() => PumpEvent::Pacu(e),
            };
            if !self.apply(event) {
                break;
            }
            self.publish();
        }
    }

    /// Applies one event to the pump state. Returns `false` when the event's
    /// channel has closed, which ends the pump.
    fn apply(&mut self, event: PumpEvent) -> bool {
        match event {
            PumpEvent::Patient(event) => {
                let Some(event) = event else { return false };
                self.readiness.note_patient();
                self.patient_state = Self::root_state(event);
            }
            PumpEvent::Procedure(event) => {
                let Some(event) = event else { return false };
                self.readiness.note_procedure();
                self.procedure_state = Self::root_state(event);
            }
            PumpEvent::Surgery(event) => {
                let Some(event) = event else { return false };
                self.surgery = Self::sub_record("surgery", event);
            }
            PumpEvent::PreAnaesthetic(event) => {
                let Some(event) = event else { return false };
                self.pre_anaesthetic = Self::sub_record("pre_anaesthetic", event);
            }
            PumpEvent::Pacu(event) => {
                let Some(event) = event else { return false };
                self.pacu = Self::sub_record("pacu", event);
            }
        }
        true
    }

    fn root_state<T>(event: LiveEvent<T>) -> RootState<T> {
        match event {
            LiveEvent::Value(Some(value)) => RootState::Present(value),
            LiveEvent::Value(None) => RootState::Missing,
            LiveEvent::Failed(e) => RootState::Failed(e),
        }
    }

    /// Sub-record events never poison the aggregate: a failure leaves the
    /// field absent and is only logged.
    fn sub_record<T>(name: &str, event: LiveEvent<T>) -> Option<T> {
        match event {
            LiveEvent::Value(value) => value,
            LiveEvent::Failed(e) => {
                tracing::warn!("{name} sub-record subscription degraded: {e}");
                None
            }
        }
    }

    fn error(&self) -> Option<AggregateError> {
        match &self.patient_state {
            RootState::Failed(e) => {
                return Some(AggregateError::Subscription {
                    target: paths::patient_doc(&self.patient_id).key(),
                    message: e.to_string(),
                })
            }
            RootState::Missing => {
                return Some(AggregateError::PatientNotFound(self.patient_id.to_string()))
            }
            _ => {}
        }
        match &self.procedure_state {
            RootState::Failed(e) => Some(AggregateError::Subscription {
                target: paths::procedure_doc(&self.patient_id, &self.procedure_id).key(),
                message: e.to_string(),
            }),
            RootState::Missing => Some(AggregateError::ProcedureNotFound(
                self.procedure_id.to_string(),
            )),
            _ => None,
        }
    }

    fn publish(&self) {
        let aggregate = ProcedureAggregate {
            patient_id: self.patient_id.clone(),
            procedure_id: self.procedure_id.clone(),
            patient: self.patient_state.value(),
            procedure: self.procedure_state.value(),
            surgery: self.surgery.clone(),
            pre_anaesthetic: self.pre_anaesthetic.clone(),
            pacu: self.pacu.clone(),
            loading: !self.readiness.is_ready(),
            error: self.error(),
            status: derive_status(
                self.surgery.is_some(),
                self.pre_anaesthetic.is_some(),
                self.pacu.is_some(),
            ),
        };
        self.out.send_replace(aggregate);
    }
}
