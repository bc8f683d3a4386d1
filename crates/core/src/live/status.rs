//! Derived completeness rules.
//!
//! The overall status of a procedure is a pure function of which of the
//! three optional sub-records are present. It is recomputed on every
//! aggregate change and never stored, so it cannot drift from the
//! underlying snapshots.

use serde::{Deserialize, Serialize};

/// Overall documentation status of a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// None of the three sub-records exist yet.
    NotStarted,
    /// Some, but not all, sub-records exist.
    InProgress,
    /// All three sub-records exist.
    Completed,
}

impl OverallStatus {
    /// The wire string form (`not_started`, `in_progress`, `completed`).
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::NotStarted => "not_started",
            OverallStatus::InProgress => "in_progress",
            OverallStatus::Completed => "completed",
        }
    }
}

/// The derived-status block exposed on the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedStatus {
    /// Overall documentation status.
    pub overall: OverallStatus,
    /// How many of the three sub-records are present (0–3).
    pub present_count: u8,
    /// Whether any sub-record is present.
    pub has_any: bool,
    /// Whether all three sub-records are present.
    pub is_complete: bool,
}

/// Computes the derived status from sub-record presence.
pub fn derive_status(surgery: bool, pre_anaesthetic: bool, pacu: bool) -> DerivedStatus {
    let present_count = [surgery, pre_anaesthetic, pacu]
        .into_iter()
        .filter(|present| *present)
        .count() as u8;
    let overall = match present_count {
        0 => OverallStatus::NotStarted,
        3 => OverallStatus::Completed,
        _ => OverallStatus::InProgress,
    };
    DerivedStatus {
        overall,
        present_count,
        has_any: present_count > 0,
        is_complete: present_count == 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_eight_presence_combinations() {
        for surgery in [false, true] {
            for pre_anaesthetic in [false, true] {
                for pacu in [false, true] {
                    let status = derive_status(surgery, pre_anaesthetic, pacu);
                    let expected_count =
                        u8::from(surgery) + u8::from(pre_anaesthetic) + u8::from(pacu);

                    assert_eq!(status.present_count, expected_count);
                    assert_eq!(status.has_any, expected_count > 0);
                    assert_eq!(status.is_complete, expected_count == 3);
                    match expected_count {
                        0 => assert_eq!(status.overall, OverallStatus::NotStarted),
                        3 => assert_eq!(status.overall, OverallStatus::Completed),
                        _ => assert_eq!(status.overall, OverallStatus::InProgress),
                    }
                }
            }
        }
    }

    #[test]
    fn wire_strings_match_the_documented_values() {
        assert_eq!(OverallStatus::NotStarted.as_str(), "not_started");
        assert_eq!(OverallStatus::InProgress.as_str(), "in_progress");
        assert_eq!(OverallStatus::Completed.as_str(), "completed");
    }
}
