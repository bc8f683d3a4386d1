//! Store layout names used throughout the core.

/// Top-level collection holding one document per patient.
pub const PATIENTS_COLLECTION: &str = "patients";

/// Sub-collection of a patient holding one document per procedure.
pub const PROCEDURES_COLLECTION: &str = "procedures";

/// Singleton sub-collection of a procedure: the intraoperative record.
pub const SURGERY_COLLECTION: &str = "surgery";

/// Singleton sub-collection of a procedure: the pre-anaesthetic evaluation.
pub const PRE_ANAESTHETIC_COLLECTION: &str = "pre_anaesthetic";

/// Singleton sub-collection of a procedure: the post-anaesthesia recovery
/// record.
pub const PACU_COLLECTION: &str = "pacu";

/// Well-known document id used for all writes into singleton
/// sub-collections.
///
/// Writing to a fixed id keeps each singleton collection at one document;
/// readers still tolerate arbitrary contents because the store cannot
/// enforce this.
pub const SINGLETON_DOC_ID: &str = "current";

/// Field stamped with the time of every mutation.
pub const UPDATED_AT_FIELD: &str = "updated_at";
