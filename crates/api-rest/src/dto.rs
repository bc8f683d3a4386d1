//! REST wire models.
//!
//! Flat request/response structures with plain string fields, translated to
//! and from the strongly-typed domain models at the handler boundary.
//! Dates travel as ISO 8601 strings (`YYYY-MM-DD` for birth dates, RFC 3339
//! for timestamps); closed enums travel in their stored wire form
//! (`insurance`, `in_progress`, `female`, …).

use apr_core::{
    BillingEntry, DerivedStatus, MonthlySummary, Patient, Procedure,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// One patient, in wire form.
#[derive(Debug, Serialize, ToSchema)]
pub struct PatientRes {
    pub id: String,
    pub name: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
    /// `female` or `male`
    pub sex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_card_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Patient> for PatientRes {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id.to_string(),
            name: patient.name.to_string(),
            birth_date: patient.birth_date.format("%Y-%m-%d").to_string(),
            sex: patient.sex.as_str().to_owned(),
            health_card_number: patient.health_card_number,
            created_at: patient.created_at.to_rfc3339(),
            updated_at: patient.updated_at.to_rfc3339(),
        }
    }
}

/// Patient listing response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<PatientRes>,
}

/// Patient intake request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePatientReq {
    pub name: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
    /// `female` or `male`
    pub sex: String,
    #[serde(default)]
    pub health_card_number: Option<String>,
}

/// Identity-correction request; absent fields are left untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePatientReq {
    #[serde(default)]
    pub name: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub birth_date: Option<String>,
    /// `female` or `male`
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub health_card_number: Option<String>,
}

/// One billing-code entry, in wire form.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BillingEntryDto {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub paid: bool,
}

impl From<BillingEntry> for BillingEntryDto {
    fn from(entry: BillingEntry) -> Self {
        Self {
            code: entry.code.to_string(),
            description: entry.description,
            amount: entry.amount,
            paid: entry.paid,
        }
    }
}

/// One procedure, in wire form.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProcedureRes {
    pub id: String,
    pub patient_id: String,
    /// `public_system` or `insurance`
    pub kind: String,
    pub hospital: String,
    pub surgeons: Vec<String>,
    pub billing: Vec<BillingEntryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `scheduled`, `in_progress`, `completed` or `cancelled`
    pub status: String,
    pub revision: u64,
    pub scheduled_for: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<String>,
}

impl From<Procedure> for ProcedureRes {
    fn from(procedure: Procedure) -> Self {
        Self {
            id: procedure.id.to_string(),
            patient_id: procedure.patient_id.to_string(),
            kind: procedure.kind.as_str().to_owned(),
            hospital: procedure.hospital.to_string(),
            surgeons: procedure.surgeons.iter().map(ToString::to_string).collect(),
            billing: procedure.billing.into_iter().map(Into::into).collect(),
            description: procedure.description,
            status: procedure.status.as_str().to_owned(),
            revision: procedure.revision,
            scheduled_for: procedure.scheduled_for.to_rfc3339(),
            created_at: procedure.created_at.to_rfc3339(),
            updated_at: procedure.updated_at.to_rfc3339(),
            completed_at: procedure.completed_at.map(|t| t.to_rfc3339()),
            cancelled_at: procedure.cancelled_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Procedure listing response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListProceduresRes {
    pub procedures: Vec<ProcedureRes>,
}

/// Procedure registration request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterProcedureReq {
    /// `public_system` or `insurance`
    pub kind: String,
    pub hospital: String,
    pub surgeons: Vec<String>,
    #[serde(default)]
    pub billing: Vec<BillingEntryDto>,
    #[serde(default)]
    pub description: Option<String>,
    /// RFC 3339
    pub scheduled_for: String,
}

/// Status transition request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetStatusReq {
    /// `scheduled`, `in_progress`, `completed` or `cancelled`
    pub status: String,
}

/// Procedure field update request; the named fields are merged into the
/// procedure root and the revision counter is bumped.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProcedureReq {
    /// Top-level fields to merge into the procedure document.
    #[schema(value_type = Object)]
    pub fields: serde_json::Value,
}

/// Save request for a clinical sub-record: the full record, merge-saved
/// into its singleton document.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveRecordReq {
    #[schema(value_type = Object)]
    pub record: serde_json::Value,
}

/// The derived-status block, in wire form.
#[derive(Debug, Serialize, ToSchema)]
pub struct DerivedStatusRes {
    /// `not_started`, `in_progress` or `completed`
    pub overall: String,
    pub present_count: u8,
    pub has_any: bool,
    pub is_complete: bool,
}

impl From<DerivedStatus> for DerivedStatusRes {
    fn from(status: DerivedStatus) -> Self {
        Self {
            overall: status.overall.as_str().to_owned(),
            present_count: status.present_count,
            has_any: status.has_any,
            is_complete: status.is_complete,
        }
    }
}

/// One settled view of the procedure aggregate.
#[derive(Debug, Serialize, ToSchema)]
pub struct AggregateRes {
    pub patient_id: String,
    pub procedure_id: String,
    #[schema(value_type = Object, nullable)]
    pub patient: Option<serde_json::Value>,
    #[schema(value_type = Object, nullable)]
    pub procedure: Option<serde_json::Value>,
    #[schema(value_type = Object, nullable)]
    pub surgery: Option<serde_json::Value>,
    #[schema(value_type = Object, nullable)]
    pub pre_anaesthetic: Option<serde_json::Value>,
    #[schema(value_type = Object, nullable)]
    pub pacu: Option<serde_json::Value>,
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: DerivedStatusRes,
}

/// One month's billing totals, in wire form.
#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlySummaryRes {
    /// `YYYY-MM`
    pub month: String,
    pub procedures: usize,
    pub total_billed: f64,
    pub total_received: f64,
}

impl From<MonthlySummary> for MonthlySummaryRes {
    fn from(summary: MonthlySummary) -> Self {
        Self {
            month: summary.month.to_string(),
            procedures: summary.procedures,
            total_billed: summary.total_billed,
            total_received: summary.total_received,
        }
    }
}

/// Monthly billing summaries response.
#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlySummariesRes {
    pub months: Vec<MonthlySummaryRes>,
}

/// Technique description request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TechniqueReq {
    /// `general`, `spinal`, `epidural`, `sedation` or `local`
    pub kind: String,
    /// `face_mask`, `laryngeal_mask` or `tracheal_tube`
    #[serde(default)]
    pub airway: Option<String>,
    #[serde(default)]
    pub induction_agents: Vec<String>,
    #[serde(default)]
    pub maintenance_agent: Option<String>,
    #[serde(default)]
    pub local_anaesthetic: Option<String>,
    #[serde(default)]
    pub puncture_level: Option<String>,
}

/// Technique description response.
#[derive(Debug, Serialize, ToSchema)]
pub struct TechniqueRes {
    pub description: String,
}
