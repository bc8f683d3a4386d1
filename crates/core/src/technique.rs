//! Anaesthesia technique description assembly.
//!
//! Builds the free-text technique paragraph of the intraoperative record
//! from a structured selection. Rule-based sentence assembly: a base
//! sentence for the technique kind, then one clause per selected option.
//! The output is plain prose meant to be pasted into
//! [`crate::records::surgery::SurgeryRecord::anaesthesia_description`] and
//! edited freely afterwards.

use apr_types::NonEmptyText;
use serde::{Deserialize, Serialize};

/// The anaesthesia technique family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechniqueKind {
    General,
    Spinal,
    Epidural,
    Sedation,
    Local,
}

/// Airway management for general anaesthesia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AirwayDevice {
    FaceMask,
    LaryngealMask,
    TrachealTube,
}

impl AirwayDevice {
    fn phrase(&self) -> &'static str {
        match self {
            AirwayDevice::FaceMask => "airway maintained with a face mask",
            AirwayDevice::LaryngealMask => "airway secured with a laryngeal mask",
            AirwayDevice::TrachealTube => "airway secured by tracheal intubation",
        }
    }
}

/// The options selected on the technique form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechniqueSelection {
    /// The technique family.
    pub kind: TechniqueKind,
    /// Airway management, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub airway: Option<AirwayDevice>,
    /// Induction agents, in administration order.
    #[serde(default)]
    pub induction_agents: Vec<NonEmptyText>,
    /// Maintenance agent, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_agent: Option<NonEmptyText>,
    /// Local anaesthetic used for regional techniques.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_anaesthetic: Option<NonEmptyText>,
    /// Puncture level for neuraxial techniques (e.g. "L3-L4").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puncture_level: Option<NonEmptyText>,
}

fn base_sentence(kind: TechniqueKind) -> &'static str {
    match kind {
        TechniqueKind::General => {
            "General anaesthesia after standard monitoring and peripheral venous access"
        }
        TechniqueKind::Spinal => {
            "Spinal anaesthesia after standard monitoring, with the patient seated"
        }
        TechniqueKind::Epidural => "Epidural anaesthesia after standard monitoring",
        TechniqueKind::Sedation => "Intravenous sedation after standard monitoring",
        TechniqueKind::Local => "Local anaesthesia with monitored anaesthesia care",
    }
}

fn join_agents(agents: &[NonEmptyText]) -> String {
    let names: Vec<&str> = agents.iter().map(NonEmptyText::as_str).collect();
    match names.as_slice() {
        [] => String::new(),
        [single] => (*single).to_owned(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// Assembles the technique description paragraph.
pub fn describe(selection: &TechniqueSelection) -> String {
    let mut clauses: Vec<String> = vec![base_sentence(selection.kind).to_owned()];

    if !selection.induction_agents.is_empty() {
        clauses.push(format!(
            "induction with {}",
            join_agents(&selection.induction_agents)
        ));
    }
    if let Some(agent) = &selection.maintenance_agent {
        clauses.push(format!("maintenance with {agent}"));
    }
    if let Some(airway) = selection.airway {
        clauses.push(airway.phrase().to_owned());
    }
    if let Some(level) = &selection.puncture_level {
        clauses.push(format!("puncture at the {level} interspace"));
    }
    if let Some(local) = &selection.local_anaesthetic {
        clauses.push(format!("using {local}"));
    }

    let mut description = clauses.join("; ");
    description.push('.');
    description
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> NonEmptyText {
        NonEmptyText::new(name).expect("valid agent name")
    }

    #[test]
    fn general_anaesthesia_mentions_every_selected_option() {
        let selection = TechniqueSelection {
            kind: TechniqueKind::General,
            airway: Some(AirwayDevice::TrachealTube),
            induction_agents: vec![agent("propofol"), agent("fentanyl"), agent("rocuronium")],
            maintenance_agent: Some(agent("sevoflurane")),
            local_anaesthetic: None,
            puncture_level: None,
        };

        let description = describe(&selection);
        assert!(description.starts_with("General anaesthesia"));
        assert!(description.contains("propofol, fentanyl and rocuronium"));
        assert!(description.contains("maintenance with sevoflurane"));
        assert!(description.contains("tracheal intubation"));
        assert!(description.ends_with('.'));
    }

    #[test]
    fn spinal_block_mentions_level_and_local_anaesthetic() {
        let selection = TechniqueSelection {
            kind: TechniqueKind::Spinal,
            airway: None,
            induction_agents: vec![],
            maintenance_agent: None,
            local_anaesthetic: Some(agent("hyperbaric bupivacaine 0.5%")),
            puncture_level: Some(agent("L3-L4")),
        };

        let description = describe(&selection);
        assert!(description.starts_with("Spinal anaesthesia"));
        assert!(description.contains("L3-L4 interspace"));
        assert!(description.contains("hyperbaric bupivacaine 0.5%"));
        assert!(!description.contains("induction"));
        assert!(!description.contains("airway"));
    }

    #[test]
    fn unselected_options_leave_no_trace() {
        let selection = TechniqueSelection {
            kind: TechniqueKind::Sedation,
            airway: None,
            induction_agents: vec![agent("midazolam")],
            maintenance_agent: None,
            local_anaesthetic: None,
            puncture_level: None,
        };

        let description = describe(&selection);
        assert_eq!(
            description,
            "Intravenous sedation after standard monitoring; induction with midazolam."
        );
    }
}
