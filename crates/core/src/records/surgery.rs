//! The intraoperative surgery record.
//!
//! Created lazily on the first intraoperative entry and then continuously
//! merged into by auto-save while the procedure runs. Once the procedure is
//! finalised the UI stops writing; the data layer does not enforce
//! immutability.

use apr_types::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Route of administration for an intraoperative medication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationRoute {
    Intravenous,
    Intramuscular,
    Subcutaneous,
    Inhalation,
    Oral,
    Epidural,
    Intrathecal,
}

/// One administered medication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationDose {
    /// Medication name.
    pub name: NonEmptyText,
    /// Dose as charted (e.g. "2 mg", "100 mcg").
    pub dose: NonEmptyText,
    /// Route of administration.
    pub route: MedicationRoute,
    /// When the dose was given.
    pub administered_at: DateTime<Utc>,
}

/// Computes the mean arterial pressure from systolic and diastolic
/// pressures, in mmHg.
pub fn mean_arterial_pressure(systolic: f64, diastolic: f64) -> f64 {
    (systolic + 2.0 * diastolic) / 3.0
}

/// One timestamped vital-sign observation.
///
/// Construct with [`VitalSignObservation::new`] so the mean arterial
/// pressure is always derived from the pressures recorded alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSignObservation {
    /// When the observation was taken.
    pub observed_at: DateTime<Utc>,
    /// Heart rate, beats per minute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<f64>,
    /// Systolic blood pressure, mmHg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic_mmhg: Option<f64>,
    /// Diastolic blood pressure, mmHg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic_mmhg: Option<f64>,
    /// Mean arterial pressure, mmHg. Derived from the pressures above.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_arterial_mmhg: Option<f64>,
    /// Peripheral oxygen saturation, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spo2_percent: Option<f64>,
    /// Body temperature, degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_celsius: Option<f64>,
}

impl VitalSignObservation {
    /// Creates an observation, deriving the mean arterial pressure when both
    /// systolic and diastolic values are present.
    pub fn new(
        observed_at: DateTime<Utc>,
        heart_rate: Option<f64>,
        systolic_mmhg: Option<f64>,
        diastolic_mmhg: Option<f64>,
        spo2_percent: Option<f64>,
        temperature_celsius: Option<f64>,
    ) -> Self {
        let mean_arterial_mmhg = match (systolic_mmhg, diastolic_mmhg) {
            (Some(sys), Some(dia)) => Some(mean_arterial_pressure(sys, dia)),
            _ => None,
        };
        Self {
            observed_at,
            heart_rate,
            systolic_mmhg,
            diastolic_mmhg,
            mean_arterial_mmhg,
            spo2_percent,
            temperature_celsius,
        }
    }
}

/// The intraoperative record of a procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurgeryRecord {
    /// When anaesthesia induction started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub induction_at: Option<DateTime<Utc>>,
    /// When the maintenance phase started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_started_at: Option<DateTime<Utc>>,
    /// Administered medications, in charting order.
    #[serde(default)]
    pub medications: Vec<MedicationDose>,
    /// Vital-sign observations, in charting order.
    #[serde(default)]
    pub vitals: Vec<VitalSignObservation>,
    /// Free-text description of the anaesthesia technique used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anaesthesia_description: Option<String>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl SurgeryRecord {
    /// An empty record stamped with the current time, for the first
    /// intraoperative entry.
    pub fn empty() -> Self {
        Self {
            induction_at: None,
            maintenance_started_at: None,
            medications: Vec::new(),
            vitals: Vec::new(),
            anaesthesia_description: None,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_arterial_pressure_is_weighted_towards_diastole() {
        let map = mean_arterial_pressure(120.0, 80.0);
        assert!((map - 93.333).abs() < 0.01, "got {map}");
    }

    #[test]
    fn observation_derives_map_only_with_both_pressures() {
        let now = Utc::now();
        let with_both =
            VitalSignObservation::new(now, Some(72.0), Some(120.0), Some(80.0), Some(98.0), None);
        assert!(with_both.mean_arterial_mmhg.is_some());

        let missing_diastolic =
            VitalSignObservation::new(now, Some(72.0), Some(120.0), None, Some(98.0), None);
        assert!(missing_diastolic.mean_arterial_mmhg.is_none());
    }

    #[test]
    fn record_serialises_without_absent_fields() {
        let record = SurgeryRecord::empty();
        let json = serde_json::to_value(&record).expect("serialize");
        assert!(json.get("induction_at").is_none());
        assert!(json.get("medications").is_some());
    }
}
