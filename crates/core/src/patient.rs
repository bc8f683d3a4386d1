//! Patient intake and identity management.
//!
//! This module provides functionality for creating and correcting patient
//! records. It handles:
//!
//! - Intake of new patients with demographic attributes
//! - Identity-correction updates (name, birth date, sex, health-card number)
//! - Listing and point-reads of patient documents
//!
//! Patients are never deleted in normal operation; a procedure always keeps
//! a resolvable parent patient.

use crate::constants::UPDATED_AT_FIELD;
use crate::error::{RecordError, RecordResult};
use crate::paths;
use apr_store::{Document, DocumentStore, Fields};
use apr_types::{NonEmptyText, RecordId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Biological sex as recorded at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiologicalSex {
    Female,
    Male,
}

impl BiologicalSex {
    /// The stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            BiologicalSex::Female => "female",
            BiologicalSex::Male => "male",
        }
    }

    /// Parses the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "female" => Some(BiologicalSex::Female),
            "male" => Some(BiologicalSex::Male),
            _ => None,
        }
    }
}

/// A patient root document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Unique identifier of the patient document.
    pub id: RecordId,
    /// Full name.
    pub name: NonEmptyText,
    /// Date of birth.
    pub birth_date: NaiveDate,
    /// Biological sex.
    pub sex: BiologicalSex,
    /// National health-card number, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_card_number: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Attributes required to create a patient.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: NonEmptyText,
    pub birth_date: NaiveDate,
    pub sex: BiologicalSex,
    pub health_card_number: Option<String>,
}

/// A partial identity correction. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct IdentityCorrection {
    pub name: Option<NonEmptyText>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<BiologicalSex>,
    pub health_card_number: Option<String>,
}

impl IdentityCorrection {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.birth_date.is_none()
            && self.sex.is_none()
            && self.health_card_number.is_none()
    }
}

/// Service for patient intake operations.
#[derive(Clone)]
pub struct PatientService {
    store: Arc<dyn DocumentStore>,
}

impl PatientService {
    /// Creates a service backed by the given store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Creates a new patient record.
    ///
    /// A fresh identifier is allocated (canonical 32-hex UUID) and both
    /// `created_at` and `updated_at` are stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns a `RecordError` if the document cannot be serialised or the
    /// store write fails.
    pub async fn create_patient(&self, intake: NewPatient) -> RecordResult<Patient> {
        let id = RecordId::new(Uuid::new_v4().simple().to_string())?;
        let now = Utc::now();
        let patient = Patient {
            id: id.clone(),
            name: intake.name,
            birth_date: intake.birth_date,
            sex: intake.sex,
            health_card_number: intake.health_card_number,
            created_at: now,
            updated_at: now,
        };

        let fields = Document::encode(&patient)?;
        self.store
            .set_document(&paths::patient_doc(&id), fields)
            .await?;
        tracing::info!("created patient {id}");
        Ok(patient)
    }

    /// Point-reads one patient.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::PatientNotFound` if no document exists under
    /// the identifier.
    pub async fn get_patient(&self, id: &RecordId) -> RecordResult<Patient> {
        let doc = self
            .store
            .get_document(&paths::patient_doc(id))
            .await?
            .ok_or_else(|| RecordError::PatientNotFound(id.to_string()))?;
        Ok(doc.decode()?)
    }

    /// Applies an identity correction as a merge write.
    ///
    /// Only the named fields change; `updated_at` is stamped in the same
    /// write.
    ///
    /// # Errors
    ///
    /// - `RecordError::InvalidInput` if the correction names no fields.
    /// - `RecordError::PatientNotFound` if the patient does not exist.
    pub async fn correct_identity(
        &self,
        id: &RecordId,
        correction: IdentityCorrection,
    ) -> RecordResult<()> {
        if correction.is_empty() {
            return Err(RecordError::InvalidInput(
                "identity correction names no fields".into(),
            ));
        }
        // Corrections must not resurrect deleted/never-created patients.
        self.get_patient(id).await?;

        let mut fields = Fields::new();
        if let Some(name) = correction.name {
            fields.insert("name".into(), Value::String(name.as_str().to_owned()));
        }
        if let Some(birth_date) = correction.birth_date {
            fields.insert(
                "birth_date".into(),
                Value::String(birth_date.format("%Y-%m-%d").to_string()),
            );
        }
        if let Some(sex) = correction.sex {
            fields.insert("sex".into(), Value::String(sex.as_str().to_owned()));
        }
        if let Some(card) = correction.health_card_number {
            fields.insert("health_card_number".into(), Value::String(card));
        }
        fields.insert(
            UPDATED_AT_FIELD.into(),
            Value::String(Utc::now().to_rfc3339()),
        );

        self.store
            .merge_document(&paths::patient_doc(id), fields)
            .await?;
        Ok(())
    }

    /// Lists all patient records.
    ///
    /// Documents that fail to decode are logged as warnings and skipped, so
    /// one damaged record cannot hide the rest.
    pub async fn list_patients(&self) -> RecordResult<Vec<Patient>> {
        let docs = self.store.list_documents(&paths::patients()).await?;
        let mut patients = Vec::with_capacity(docs.len());
        for doc in docs {
            match doc.decode::<Patient>() {
                Ok(patient) => patients.push(patient),
                Err(e) => tracing::warn!("failed to decode patient {}: {e}", doc.id),
            }
        }
        Ok(patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apr_store::MemoryStore;

    fn service() -> PatientService {
        PatientService::new(Arc::new(MemoryStore::new()))
    }

    fn intake(name: &str) -> NewPatient {
        NewPatient {
            name: NonEmptyText::new(name).expect("valid name"),
            birth_date: NaiveDate::from_ymd_opt(1987, 5, 14).expect("valid date"),
            sex: BiologicalSex::Female,
            health_card_number: Some("700000000000001".into()),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let service = service();
        let created = service
            .create_patient(intake("Ana Souza"))
            .await
            .expect("create patient");

        let fetched = service
            .get_patient(&created.id)
            .await
            .expect("get patient");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn get_missing_patient_is_not_found() {
        let service = service();
        let err = service
            .get_patient(&RecordId::new("missing").expect("valid id"))
            .await
            .expect_err("expected not found");
        assert!(matches!(err, RecordError::PatientNotFound(_)));
    }

    #[tokio::test]
    async fn correction_changes_named_fields_only() {
        let service = service();
        let created = service
            .create_patient(intake("Ana Sousa"))
            .await
            .expect("create patient");

        service
            .correct_identity(
                &created.id,
                IdentityCorrection {
                    name: Some(NonEmptyText::new("Ana Souza").expect("valid name")),
                    ..IdentityCorrection::default()
                },
            )
            .await
            .expect("correct identity");

        let fetched = service.get_patient(&created.id).await.expect("get patient");
        assert_eq!(fetched.name.as_str(), "Ana Souza");
        assert_eq!(fetched.birth_date, created.birth_date);
        assert_eq!(fetched.sex, created.sex);
        assert!(fetched.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn empty_correction_is_rejected() {
        let service = service();
        let created = service
            .create_patient(intake("Ana Souza"))
            .await
            .expect("create patient");

        let err = service
            .correct_identity(&created.id, IdentityCorrection::default())
            .await
            .expect_err("expected rejection");
        assert!(matches!(err, RecordError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn list_returns_all_created_patients() {
        let service = service();
        service
            .create_patient(intake("Ana Souza"))
            .await
            .expect("create patient");
        service
            .create_patient(intake("Bruno Lima"))
            .await
            .expect("create patient");

        let patients = service.list_patients().await.expect("list");
        assert_eq!(patients.len(), 2);
    }
}
