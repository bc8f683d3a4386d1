//! # APR Core
//!
//! Core business logic for the APR anaesthesia procedure record system.
//!
//! This crate contains the domain model and pure data operations:
//! - Patient intake and procedure registration against an injected
//!   [`apr_store::DocumentStore`]
//! - The live procedure aggregate: one patient + one procedure + three
//!   optional sub-records, kept current via store subscriptions
//! - Derived completeness/status rules over the aggregate
//! - Mutation helpers with merge semantics and timestamp stamping
//! - Monthly financial summaries and the anaesthesia technique
//!   description generator
//!
//! **No API concerns**: HTTP servers and CLI parsing belong in `api-rest`
//! and `apr-cli`.

pub mod constants;
pub mod error;
pub mod financial;
pub mod live;
pub mod mutations;
pub mod paths;
pub mod patient;
pub mod procedure;
pub mod records;
pub mod technique;

pub use apr_types::{NonEmptyText, RecordId, TextError};
pub use error::{RecordError, RecordResult};
pub use financial::{monthly_summaries, MonthKey, MonthlySummary, SummaryFilter};
pub use live::aggregate::{AggregateError, AggregateHandle, ProcedureAggregate, ProcedureLive};
pub use live::status::{derive_status, DerivedStatus, OverallStatus};
pub use mutations::ProcedureMutations;
pub use patient::{BiologicalSex, IdentityCorrection, NewPatient, Patient, PatientService};
pub use procedure::{
    BillingEntry, NewProcedure, Procedure, ProcedureKind, ProcedureService, ProcedureStatus,
};
pub use records::pacu::RecoveryRecord;
pub use records::pre_anaesthetic::{
    AirwayAssessment, AsaClass, AsaClassification, ClearanceDecision, Comorbidity,
    MallampatiClass, OrganSystem, PreAnaestheticEvaluation,
};
pub use records::surgery::{
    mean_arterial_pressure, MedicationDose, MedicationRoute, SurgeryRecord, VitalSignObservation,
};
pub use technique::{describe, AirwayDevice, TechniqueKind, TechniqueSelection};
