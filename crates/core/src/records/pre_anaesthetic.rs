//! The pre-anaesthetic evaluation.
//!
//! A structured pre-operative assessment: comorbidities grouped by organ
//! system, airway findings, the ASA physical-status classification and the
//! clearance decision. Read-only after clearance is recorded (a UI
//! convention, not a storage invariant).

use apr_types::NonEmptyText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Organ systems used to group comorbidities.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OrganSystem {
    Cardiovascular,
    Respiratory,
    Renal,
    Hepatic,
    Endocrine,
    Neurologic,
    Haematologic,
    Gastrointestinal,
    Musculoskeletal,
}

/// One comorbidity finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comorbidity {
    /// The organ system the condition belongs to.
    pub system: OrganSystem,
    /// The condition (e.g. "hypertension", "asthma").
    pub condition: NonEmptyText,
    /// Free-text notes on severity or treatment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Mallampati airway classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MallampatiClass {
    ClassI,
    ClassII,
    ClassIII,
    ClassIV,
}

/// Airway assessment findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirwayAssessment {
    /// Mallampati classification.
    pub mallampati: MallampatiClass,
    /// Inter-incisor mouth opening, centimetres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouth_opening_cm: Option<f64>,
    /// Whether neck mobility is limited.
    #[serde(default)]
    pub limited_neck_mobility: bool,
    /// Free-text airway notes (dentition, previous difficult airway).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// ASA physical-status class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsaClass {
    I,
    Ii,
    Iii,
    Iv,
    V,
    Vi,
}

impl AsaClass {
    fn roman(&self) -> &'static str {
        match self {
            AsaClass::I => "I",
            AsaClass::Ii => "II",
            AsaClass::Iii => "III",
            AsaClass::Iv => "IV",
            AsaClass::V => "V",
            AsaClass::Vi => "VI",
        }
    }
}

/// Full ASA classification, including the emergency modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsaClassification {
    /// The physical-status class.
    pub class: AsaClass,
    /// Whether the procedure is an emergency ("E" modifier).
    #[serde(default)]
    pub emergency: bool,
}

impl fmt::Display for AsaClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ASA {}", self.class.roman())?;
        if self.emergency {
            write!(f, "-E")?;
        }
        Ok(())
    }
}

/// Outcome of the pre-operative visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearanceDecision {
    /// Cleared for the procedure.
    Cleared,
    /// Cleared with restrictions noted in the evaluation.
    ClearedWithRestrictions,
    /// Deferred pending further work-up.
    Deferred,
}

/// The pre-anaesthetic evaluation of a procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreAnaestheticEvaluation {
    /// Comorbidity findings, in charting order.
    #[serde(default)]
    pub comorbidities: Vec<Comorbidity>,
    /// Airway assessment, once performed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airway: Option<AirwayAssessment>,
    /// ASA classification, once assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asa: Option<AsaClassification>,
    /// Clearance decision, once recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clearance: Option<ClearanceDecision>,
    /// Free-text evaluation notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the pre-operative visit took place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<DateTime<Utc>>,
    /// When the record was last modified.
    pub updated_at: DateTime<Utc>,
}

impl PreAnaestheticEvaluation {
    /// Groups the comorbidity findings by organ system, preserving charting
    /// order within each group.
    pub fn comorbidities_by_system(&self) -> BTreeMap<OrganSystem, Vec<&Comorbidity>> {
        let mut grouped: BTreeMap<OrganSystem, Vec<&Comorbidity>> = BTreeMap::new();
        for comorbidity in &self.comorbidities {
            grouped.entry(comorbidity.system).or_default().push(comorbidity);
        }
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comorbidity(system: OrganSystem, condition: &str) -> Comorbidity {
        Comorbidity {
            system,
            condition: NonEmptyText::new(condition).expect("valid condition"),
            notes: None,
        }
    }

    #[test]
    fn groups_comorbidities_by_system() {
        let evaluation = PreAnaestheticEvaluation {
            comorbidities: vec![
                comorbidity(OrganSystem::Cardiovascular, "hypertension"),
                comorbidity(OrganSystem::Respiratory, "asthma"),
                comorbidity(OrganSystem::Cardiovascular, "atrial fibrillation"),
            ],
            airway: None,
            asa: None,
            clearance: None,
            notes: None,
            evaluated_at: None,
            updated_at: Utc::now(),
        };

        let grouped = evaluation.comorbidities_by_system();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&OrganSystem::Cardiovascular].len(), 2);
        assert_eq!(
            grouped[&OrganSystem::Cardiovascular][0].condition.as_str(),
            "hypertension"
        );
    }

    #[test]
    fn asa_display_includes_emergency_modifier() {
        let routine = AsaClassification {
            class: AsaClass::Iii,
            emergency: false,
        };
        let emergency = AsaClassification {
            class: AsaClass::Iii,
            emergency: true,
        };
        assert_eq!(routine.to_string(), "ASA III");
        assert_eq!(emergency.to_string(), "ASA III-E");
    }
}
