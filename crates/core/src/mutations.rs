//! Fire-and-forget mutation helpers for a procedure and its sub-records.
//!
//! Every helper performs a single-document merge write (only the named
//! fields change) and stamps `updated_at` in the same write. No helper
//! retries: on failure the error is surfaced, the store is untouched (the
//! store's write atomicity means a document is never partially written) and
//! the caller decides what to do.
//!
//! Sub-record writes always target the well-known `current` document inside
//! the singleton sub-collection, so a procedure can never accumulate more
//! than one surgery record through this path.

use crate::constants::UPDATED_AT_FIELD;
use crate::error::{RecordError, RecordResult};
use crate::paths;
use crate::procedure::ProcedureStatus;
use crate::records::pacu::RecoveryRecord;
use crate::records::pre_anaesthetic::PreAnaestheticEvaluation;
use crate::records::surgery::SurgeryRecord;
use apr_store::{CollectionPath, Document, DocumentPath, DocumentStore, Fields};
use apr_types::RecordId;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Mutation helpers scoped to one (patient, procedure) pair.
#[derive(Clone)]
pub struct ProcedureMutations {
    store: Arc<dyn DocumentStore>,
    patient_id: RecordId,
    procedure_id: RecordId,
}

impl std::fmt::Debug for ProcedureMutations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcedureMutations")
            .field("patient_id", &self.patient_id)
            .field("procedure_id", &self.procedure_id)
            .finish_non_exhaustive()
    }
}

impl ProcedureMutations {
    /// Validates the identifier pair and builds the helper set.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::InvalidIdentifier`, before any store call, if
    /// either identifier is empty or malformed.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        patient_id: &str,
        procedure_id: &str,
    ) -> RecordResult<Self> {
        Ok(Self {
            store,
            patient_id: RecordId::new(patient_id)?,
            procedure_id: RecordId::new(procedure_id)?,
        })
    }

    fn procedure_path(&self) -> DocumentPath {
        paths::procedure_doc(&self.patient_id, &self.procedure_id)
    }

    /// Merges fields into the procedure root.
    ///
    /// Bumps the revision counter by exactly one as part of the same write.
    /// The counter is read immediately before the write; two concurrent
    /// editors can both read revision N and both write N+1, losing one
    /// increment. Last write wins per field; an accepted property of this
    /// data layer.
    ///
    /// # Errors
    ///
    /// - `RecordError::ProcedureNotFound` if the procedure does not exist.
    /// - `RecordError::UpdateFailed` if the store write fails.
    pub async fn update_procedure(&self, fields: Fields) -> RecordResult<()> {
        let path = self.procedure_path();
        let current = self
            .store
            .get_document(&path)
            .await?
            .ok_or_else(|| RecordError::ProcedureNotFound(self.procedure_id.to_string()))?;
        let revision = current
            .fields
            .get("revision")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        let mut fields = fields;
        fields.insert("revision".into(), Value::from(revision + 1));
        self.stamp(&mut fields);

        self.merge(&path, fields).await
    }

    /// Transitions the procedure's lifecycle status.
    ///
    /// Terminal statuses additionally stamp their timestamp: `completed`
    /// sets `completed_at`, `cancelled` sets `cancelled_at`.
    ///
    /// # Errors
    ///
    /// - `RecordError::ProcedureNotFound` if the procedure does not exist.
    /// - `RecordError::UpdateFailed` if the store write fails.
    pub async fn set_status(&self, status: ProcedureStatus) -> RecordResult<()> {
        let path = self.procedure_path();
        if self.store.get_document(&path).await?.is_none() {
            return Err(RecordError::ProcedureNotFound(self.procedure_id.to_string()));
        }

        let mut fields = Fields::new();
        fields.insert("status".into(), Value::String(status.as_str().to_owned()));
        match status {
            ProcedureStatus::Completed => {
                fields.insert("completed_at".into(), Value::String(Utc::now().to_rfc3339()));
            }
            ProcedureStatus::Cancelled => {
                fields.insert("cancelled_at".into(), Value::String(Utc::now().to_rfc3339()));
            }
            ProcedureStatus::Scheduled | ProcedureStatus::InProgress => {}
        }
        self.stamp(&mut fields);

        self.merge(&path, fields).await
    }

    /// Saves the intraoperative record (the auto-save write). Creates the
    /// singleton document on the first entry.
    pub async fn save_surgery(&self, record: &SurgeryRecord) -> RecordResult<()> {
        self.save_sub_record(
            paths::surgery_collection(&self.patient_id, &self.procedure_id),
            record,
        )
        .await
    }

    /// Saves the pre-anaesthetic evaluation.
    pub async fn save_pre_anaesthetic(
        &self,
        evaluation: &PreAnaestheticEvaluation,
    ) -> RecordResult<()> {
        self.save_sub_record(
            paths::pre_anaesthetic_collection(&self.patient_id, &self.procedure_id),
            evaluation,
        )
        .await
    }

    /// Saves the post-anaesthesia recovery record.
    pub async fn save_pacu(&self, record: &RecoveryRecord) -> RecordResult<()> {
        self.save_sub_record(
            paths::pacu_collection(&self.patient_id, &self.procedure_id),
            record,
        )
        .await
    }

    async fn save_sub_record<T: Serialize>(
        &self,
        collection: CollectionPath,
        record: &T,
    ) -> RecordResult<()> {
        let mut fields = Document::encode(record)?;
        self.stamp(&mut fields);
        self.merge(&paths::singleton_doc(&collection), fields).await
    }

    fn stamp(&self, fields: &mut Fields) {
        fields.insert(
            UPDATED_AT_FIELD.into(),
            Value::String(Utc::now().to_rfc3339()),
        );
    }

    async fn merge(&self, path: &DocumentPath, fields: Fields) -> RecordResult<()> {
        self.store
            .merge_document(path, fields)
            .await
            .map_err(|source| RecordError::UpdateFailed {
                target: path.key(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::{BiologicalSex, NewPatient, PatientService};
    use crate::procedure::{NewProcedure, Procedure, ProcedureKind, ProcedureService};
    use apr_store::MemoryStore;
    use apr_types::NonEmptyText;
    use chrono::NaiveDate;
    use serde_json::json;

    async fn seeded() -> (Arc<MemoryStore>, RecordId, RecordId) {
        let store = Arc::new(MemoryStore::new());
        let patient = PatientService::new(store.clone())
            .create_patient(NewPatient {
                name: NonEmptyText::new("Ana Souza").expect("valid name"),
                birth_date: NaiveDate::from_ymd_opt(1987, 5, 14).expect("valid date"),
                sex: BiologicalSex::Female,
                health_card_number: None,
            })
            .await
            .expect("create patient");
        let procedure = ProcedureService::new(store.clone())
            .register(
                &patient.id,
                NewProcedure {
                    kind: ProcedureKind::Insurance,
                    hospital: NonEmptyText::new("Santa Casa").expect("valid hospital"),
                    surgeons: vec![NonEmptyText::new("Dr. Prado").expect("valid name")],
                    billing: vec![],
                    description: Some("Video-assisted cholecystectomy".into()),
                    scheduled_for: Utc::now(),
                },
            )
            .await
            .expect("register procedure");
        (store, patient.id, procedure.id)
    }

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    async fn read_procedure(
        store: &Arc<MemoryStore>,
        patient_id: &RecordId,
        procedure_id: &RecordId,
    ) -> Procedure {
        ProcedureService::new(store.clone())
            .get(patient_id, procedure_id)
            .await
            .expect("get procedure")
    }

    #[tokio::test]
    async fn update_merges_named_fields_and_bumps_revision() {
        let (store, patient_id, procedure_id) = seeded().await;
        let mutations =
            ProcedureMutations::new(store.clone(), patient_id.as_str(), procedure_id.as_str())
                .expect("valid identifiers");

        let before = read_procedure(&store, &patient_id, &procedure_id).await;
        mutations
            .update_procedure(fields(json!({"hospital": "Hospital Central"})))
            .await
            .expect("update procedure");

        let after = read_procedure(&store, &patient_id, &procedure_id).await;
        assert_eq!(after.hospital.as_str(), "Hospital Central");
        assert_eq!(after.revision, before.revision + 1);
        assert_eq!(after.description, before.description);
        assert!(after.updated_at >= before.updated_at);
    }

    #[tokio::test]
    async fn sequential_updates_increment_revision_each_time() {
        let (store, patient_id, procedure_id) = seeded().await;
        let mutations =
            ProcedureMutations::new(store, patient_id.as_str(), procedure_id.as_str())
                .expect("valid identifiers");

        mutations
            .update_procedure(fields(json!({"description": "first"})))
            .await
            .expect("first update");
        mutations
            .update_procedure(fields(json!({"description": "second"})))
            .await
            .expect("second update");

        // Two reads would have raced here under concurrency; sequentially
        // each read observes the previous write.
        let mutations_store = mutations.store.clone();
        let doc = mutations_store
            .get_document(&paths::procedure_doc(&patient_id, &procedure_id))
            .await
            .expect("get")
            .expect("document exists");
        assert_eq!(doc.fields["revision"], json!(2));
    }

    #[tokio::test]
    async fn update_missing_procedure_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mutations = ProcedureMutations::new(store, "p1", "ghost").expect("valid identifiers");
        let err = mutations
            .update_procedure(Fields::new())
            .await
            .expect_err("expected rejection");
        assert!(matches!(err, RecordError::ProcedureNotFound(_)));
    }

    #[tokio::test]
    async fn invalid_identifiers_are_rejected_at_construction() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let err = ProcedureMutations::new(store, "", "proc1").expect_err("expected rejection");
        assert!(matches!(err, RecordError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn terminal_statuses_stamp_their_timestamps() {
        let (store, patient_id, procedure_id) = seeded().await;
        let mutations =
            ProcedureMutations::new(store.clone(), patient_id.as_str(), procedure_id.as_str())
                .expect("valid identifiers");

        mutations
            .set_status(ProcedureStatus::InProgress)
            .await
            .expect("set in_progress");
        let in_progress = read_procedure(&store, &patient_id, &procedure_id).await;
        assert_eq!(in_progress.status, ProcedureStatus::InProgress);
        assert!(in_progress.completed_at.is_none());

        mutations
            .set_status(ProcedureStatus::Completed)
            .await
            .expect("set completed");
        let completed = read_procedure(&store, &patient_id, &procedure_id).await;
        assert_eq!(completed.status, ProcedureStatus::Completed);
        assert!(completed.completed_at.is_some());
        assert!(completed.cancelled_at.is_none());
    }

    #[tokio::test]
    async fn cancelling_stamps_cancelled_at() {
        let (store, patient_id, procedure_id) = seeded().await;
        let mutations =
            ProcedureMutations::new(store.clone(), patient_id.as_str(), procedure_id.as_str())
                .expect("valid identifiers");

        mutations
            .set_status(ProcedureStatus::Cancelled)
            .await
            .expect("set cancelled");
        let cancelled = read_procedure(&store, &patient_id, &procedure_id).await;
        assert!(cancelled.cancelled_at.is_some());
        assert!(cancelled.completed_at.is_none());
    }

    #[tokio::test]
    async fn surgery_auto_save_writes_the_singleton_document() {
        let (store, patient_id, procedure_id) = seeded().await;
        let mutations =
            ProcedureMutations::new(store.clone(), patient_id.as_str(), procedure_id.as_str())
                .expect("valid identifiers");

        let mut record = SurgeryRecord::empty();
        record.anaesthesia_description = Some("General anaesthesia".into());
        mutations.save_surgery(&record).await.expect("save surgery");

        let collection = paths::surgery_collection(&patient_id, &procedure_id);
        let docs = store
            .list_documents(&collection)
            .await
            .expect("list surgery collection");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "current");

        // A second save merges into the same document instead of adding one.
        record.anaesthesia_description = Some("General anaesthesia, tracheal tube".into());
        mutations.save_surgery(&record).await.expect("save surgery");
        let docs = store
            .list_documents(&collection)
            .await
            .expect("list surgery collection");
        assert_eq!(docs.len(), 1);
    }
}
