//! Post-anaesthesia recovery (PACU) record.
//!
//! Reserved slot: the aggregate composes this record and the store layout
//! names its sub-collection, but no clinical workflow writes one yet beyond
//! admission/discharge bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The post-anaesthesia recovery record of a procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    /// When the patient was admitted to the recovery unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admitted_at: Option<DateTime<Utc>>,
    /// When the patient was discharged from the recovery unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discharged_at: Option<DateTime<Utc>>,
    /// Free-text recovery notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}
