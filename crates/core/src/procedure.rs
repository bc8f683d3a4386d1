//! Procedure registration and lifecycle.
//!
//! A procedure is one planned or performed intervention for a patient. It is
//! registered under the patient's `procedures` sub-collection and carries:
//!
//! - the billing kind (public system vs insurance) and billing-code entries
//! - the hospital and responsible surgeons
//! - a lifecycle status with terminal timestamps
//! - a revision counter bumped on every field update (see
//!   [`crate::mutations::ProcedureMutations`])

use crate::error::{RecordError, RecordResult};
use crate::paths;
use apr_store::{Document, DocumentStore};
use apr_types::{NonEmptyText, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// How the procedure is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    /// Billed to the public health system.
    PublicSystem,
    /// Billed to a private insurer.
    Insurance,
}

impl ProcedureKind {
    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureKind::PublicSystem => "public_system",
            ProcedureKind::Insurance => "insurance",
        }
    }

    /// Parses the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public_system" => Some(ProcedureKind::PublicSystem),
            "insurance" => Some(ProcedureKind::Insurance),
            _ => None,
        }
    }
}

/// Lifecycle status of a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl ProcedureStatus {
    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcedureStatus::Scheduled => "scheduled",
            ProcedureStatus::InProgress => "in_progress",
            ProcedureStatus::Completed => "completed",
            ProcedureStatus::Cancelled => "cancelled",
        }
    }

    /// Parses the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(ProcedureStatus::Scheduled),
            "in_progress" => Some(ProcedureStatus::InProgress),
            "completed" => Some(ProcedureStatus::Completed),
            "cancelled" => Some(ProcedureStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the status ends the procedure's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcedureStatus::Completed | ProcedureStatus::Cancelled)
    }
}

/// One billing-code entry on a procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingEntry {
    /// The billing code (insurer or public-system table code).
    pub code: NonEmptyText,
    /// Free-text description of the entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Amount billed for this entry.
    pub amount: f64,
    /// Whether payment for this entry has been received.
    #[serde(default)]
    pub paid: bool,
}

/// A procedure root document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    /// Unique identifier of the procedure document.
    pub id: RecordId,
    /// The owning patient.
    pub patient_id: RecordId,
    /// How the procedure is billed.
    pub kind: ProcedureKind,
    /// Hospital where the intervention takes place.
    pub hospital: NonEmptyText,
    /// Responsible surgeons.
    pub surgeons: Vec<NonEmptyText>,
    /// Billing-code entries.
    #[serde(default)]
    pub billing: Vec<BillingEntry>,
    /// Free-text description of the intervention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: ProcedureStatus,
    /// Revision counter, bumped on every field update.
    #[serde(default)]
    pub revision: u64,
    /// When the intervention is scheduled to take place.
    pub scheduled_for: DateTime<Utc>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
    /// Stamped when status becomes `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Stamped when status becomes `cancelled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Procedure {
    /// Sum of all billing entry amounts.
    pub fn billed_total(&self) -> f64 {
        self.billing.iter().map(|entry| entry.amount).sum()
    }

    /// Sum of billing entry amounts whose payment has been received.
    pub fn received_total(&self) -> f64 {
        self.billing
            .iter()
            .filter(|entry| entry.paid)
            .map(|entry| entry.amount)
            .sum()
    }
}

/// Attributes required to register a procedure.
#[derive(Debug, Clone)]
pub struct NewProcedure {
    pub kind: ProcedureKind,
    pub hospital: NonEmptyText,
    pub surgeons: Vec<NonEmptyText>,
    pub billing: Vec<BillingEntry>,
    pub description: Option<String>,
    pub scheduled_for: DateTime<Utc>,
}

/// Service for procedure registration and reads.
#[derive(Clone)]
pub struct ProcedureService {
    store: Arc<dyn DocumentStore>,
}

impl ProcedureService {
    /// Creates a service backed by the given store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Registers a new procedure under a patient.
    ///
    /// The parent patient must exist; registration is how a procedure gains
    /// its one mandatory root dependency.
    ///
    /// # Errors
    ///
    /// - `RecordError::PatientNotFound` if the patient does not exist.
    /// - `RecordError::InvalidInput` if no surgeon is named.
    pub async fn register(
        &self,
        patient_id: &RecordId,
        registration: NewProcedure,
    ) -> RecordResult<Procedure> {
        if registration.surgeons.is_empty() {
            return Err(RecordError::InvalidInput(
                "at least one responsible surgeon is required".into(),
            ));
        }
        if self
            .store
            .get_document(&paths::patient_doc(patient_id))
            .await?
            .is_none()
        {
            return Err(RecordError::PatientNotFound(patient_id.to_string()));
        }

        let id = RecordId::new(Uuid::new_v4().simple().to_string())?;
        let now = Utc::now();
        let procedure = Procedure {
            id: id.clone(),
            patient_id: patient_id.clone(),
            kind: registration.kind,
            hospital: registration.hospital,
            surgeons: registration.surgeons,
            billing: registration.billing,
            description: registration.description,
            status: ProcedureStatus::Scheduled,
            revision: 0,
            scheduled_for: registration.scheduled_for,
            created_at: now,
            updated_at: now,
            completed_at: None,
            cancelled_at: None,
        };

        let fields = Document::encode(&procedure)?;
        self.store
            .set_document(&paths::procedure_doc(patient_id, &id), fields)
            .await?;
        tracing::info!("registered procedure {id} for patient {patient_id}");
        Ok(procedure)
    }

    /// Point-reads one procedure.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::ProcedureNotFound` if no document exists under
    /// the identifier pair.
    pub async fn get(
        &self,
        patient_id: &RecordId,
        procedure_id: &RecordId,
    ) -> RecordResult<Procedure> {
        let doc = self
            .store
            .get_document(&paths::procedure_doc(patient_id, procedure_id))
            .await?
            .ok_or_else(|| RecordError::ProcedureNotFound(procedure_id.to_string()))?;
        Ok(doc.decode()?)
    }

    /// Lists all procedures registered under a patient.
    ///
    /// Documents that fail to decode are logged as warnings and skipped.
    pub async fn list_for_patient(&self, patient_id: &RecordId) -> RecordResult<Vec<Procedure>> {
        let docs = self
            .store
            .list_documents(&paths::procedures(patient_id))
            .await?;
        let mut procedures = Vec::with_capacity(docs.len());
        for doc in docs {
            match doc.decode::<Procedure>() {
                Ok(procedure) => procedures.push(procedure),
                Err(e) => tracing::warn!("failed to decode procedure {}: {e}", doc.id),
            }
        }
        Ok(procedures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::{BiologicalSex, NewPatient, PatientService};
    use apr_store::MemoryStore;
    use chrono::NaiveDate;

    async fn patient_on(store: Arc<MemoryStore>) -> RecordId {
        let patients = PatientService::new(store);
        patients
            .create_patient(NewPatient {
                name: NonEmptyText::new("Ana Souza").expect("valid name"),
                birth_date: NaiveDate::from_ymd_opt(1987, 5, 14).expect("valid date"),
                sex: BiologicalSex::Female,
                health_card_number: None,
            })
            .await
            .expect("create patient")
            .id
    }

    fn registration() -> NewProcedure {
        NewProcedure {
            kind: ProcedureKind::Insurance,
            hospital: NonEmptyText::new("Santa Casa").expect("valid hospital"),
            surgeons: vec![NonEmptyText::new("Dr. Prado").expect("valid name")],
            billing: vec![BillingEntry {
                code: NonEmptyText::new("31005497").expect("valid code"),
                description: Some("Cholecystectomy".into()),
                amount: 1850.0,
                paid: false,
            }],
            description: Some("Video-assisted cholecystectomy".into()),
            scheduled_for: Utc::now(),
        }
    }

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let patient_id = patient_on(store.clone()).await;
        let service = ProcedureService::new(store);

        let registered = service
            .register(&patient_id, registration())
            .await
            .expect("register procedure");
        assert_eq!(registered.status, ProcedureStatus::Scheduled);
        assert_eq!(registered.revision, 0);

        let fetched = service
            .get(&patient_id, &registered.id)
            .await
            .expect("get procedure");
        assert_eq!(fetched, registered);
    }

    #[tokio::test]
    async fn register_requires_existing_patient() {
        let service = ProcedureService::new(Arc::new(MemoryStore::new()));
        let err = service
            .register(&RecordId::new("ghost").expect("valid id"), registration())
            .await
            .expect_err("expected rejection");
        assert!(matches!(err, RecordError::PatientNotFound(_)));
    }

    #[tokio::test]
    async fn register_requires_a_surgeon() {
        let store = Arc::new(MemoryStore::new());
        let patient_id = patient_on(store.clone()).await;
        let service = ProcedureService::new(store);

        let mut no_surgeon = registration();
        no_surgeon.surgeons.clear();
        let err = service
            .register(&patient_id, no_surgeon)
            .await
            .expect_err("expected rejection");
        assert!(matches!(err, RecordError::InvalidInput(_)));
    }

    #[test]
    fn billing_totals_split_billed_and_received() {
        let mut procedure = Procedure {
            id: RecordId::new("proc1").expect("valid id"),
            patient_id: RecordId::new("p1").expect("valid id"),
            kind: ProcedureKind::Insurance,
            hospital: NonEmptyText::new("Santa Casa").expect("valid hospital"),
            surgeons: vec![],
            billing: vec![
                BillingEntry {
                    code: NonEmptyText::new("31005497").expect("valid code"),
                    description: None,
                    amount: 1000.0,
                    paid: true,
                },
                BillingEntry {
                    code: NonEmptyText::new("31005500").expect("valid code"),
                    description: None,
                    amount: 500.0,
                    paid: false,
                },
            ],
            description: None,
            status: ProcedureStatus::Scheduled,
            revision: 0,
            scheduled_for: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
        };

        assert_eq!(procedure.billed_total(), 1500.0);
        assert_eq!(procedure.received_total(), 1000.0);

        procedure.billing[1].paid = true;
        assert_eq!(procedure.received_total(), 1500.0);
    }

    #[test]
    fn status_wire_form_round_trips() {
        for status in [
            ProcedureStatus::Scheduled,
            ProcedureStatus::InProgress,
            ProcedureStatus::Completed,
            ProcedureStatus::Cancelled,
        ] {
            assert_eq!(ProcedureStatus::parse(status.as_str()), Some(status));
        }
        assert!(ProcedureStatus::parse("archived").is_none());
        assert!(ProcedureStatus::Completed.is_terminal());
        assert!(ProcedureStatus::Cancelled.is_terminal());
        assert!(!ProcedureStatus::Scheduled.is_terminal());
    }
}
