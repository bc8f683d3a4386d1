//! Monthly financial summaries.
//!
//! The billing view iterates already-fetched procedures and folds their
//! billing entries into per-month totals. This is a pure client-side
//! aggregation; nothing here talks to the store.

use crate::procedure::{Procedure, ProcedureKind};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A calendar month, used as the grouping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// The month the procedures were scheduled in.
    pub month: MonthKey,
    /// Number of procedures contributing to this month.
    pub procedures: usize,
    /// Sum of all billing entry amounts.
    pub total_billed: f64,
    /// Sum of billing entry amounts whose payment has been received.
    pub total_received: f64,
}

/// Which procedures a summary should include.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryFilter {
    /// Restrict to insurance-billed procedures.
    pub insurance_only: bool,
}

/// Folds procedures into per-month billing totals, grouped by the calendar
/// month of each procedure's scheduled date and sorted chronologically.
pub fn monthly_summaries(procedures: &[Procedure], filter: SummaryFilter) -> Vec<MonthlySummary> {
    let mut months: BTreeMap<MonthKey, MonthlySummary> = BTreeMap::new();

    for procedure in procedures {
        if filter.insurance_only && procedure.kind != ProcedureKind::Insurance {
            continue;
        }
        let key = MonthKey {
            year: procedure.scheduled_for.year(),
            month: procedure.scheduled_for.month(),
        };
        let summary = months.entry(key).or_insert_with(|| MonthlySummary {
            month: key,
            procedures: 0,
            total_billed: 0.0,
            total_received: 0.0,
        });
        summary.procedures += 1;
        summary.total_billed += procedure.billed_total();
        summary.total_received += procedure.received_total();
    }

    months.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::{BillingEntry, ProcedureStatus};
    use apr_types::{NonEmptyText, RecordId};
    use chrono::{TimeZone, Utc};

    fn procedure(
        id: &str,
        kind: ProcedureKind,
        year: i32,
        month: u32,
        entries: Vec<(f64, bool)>,
    ) -> Procedure {
        Procedure {
            id: RecordId::new(id).expect("valid id"),
            patient_id: RecordId::new("p1").expect("valid id"),
            kind,
            hospital: NonEmptyText::new("Santa Casa").expect("valid hospital"),
            surgeons: vec![],
            billing: entries
                .into_iter()
                .map(|(amount, paid)| BillingEntry {
                    code: NonEmptyText::new("31005497").expect("valid code"),
                    description: None,
                    amount,
                    paid,
                })
                .collect(),
            description: None,
            status: ProcedureStatus::Scheduled,
            revision: 0,
            scheduled_for: Utc
                .with_ymd_and_hms(year, month, 10, 8, 0, 0)
                .single()
                .expect("valid date"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn groups_by_scheduled_month_in_chronological_order() {
        let procedures = vec![
            procedure("a", ProcedureKind::Insurance, 2026, 3, vec![(1000.0, true)]),
            procedure("b", ProcedureKind::Insurance, 2026, 1, vec![(500.0, false)]),
            procedure("c", ProcedureKind::Insurance, 2026, 3, vec![(250.0, false)]),
        ];

        let summaries = monthly_summaries(&procedures, SummaryFilter::default());
        assert_eq!(summaries.len(), 2);

        assert_eq!(summaries[0].month.to_string(), "2026-01");
        assert_eq!(summaries[0].procedures, 1);
        assert_eq!(summaries[0].total_billed, 500.0);
        assert_eq!(summaries[0].total_received, 0.0);

        assert_eq!(summaries[1].month.to_string(), "2026-03");
        assert_eq!(summaries[1].procedures, 2);
        assert_eq!(summaries[1].total_billed, 1250.0);
        assert_eq!(summaries[1].total_received, 1000.0);
    }

    #[test]
    fn insurance_filter_excludes_public_system_procedures() {
        let procedures = vec![
            procedure("a", ProcedureKind::Insurance, 2026, 2, vec![(800.0, true)]),
            procedure("b", ProcedureKind::PublicSystem, 2026, 2, vec![(300.0, true)]),
        ];

        let all = monthly_summaries(&procedures, SummaryFilter::default());
        assert_eq!(all[0].total_billed, 1100.0);

        let insurance = monthly_summaries(
            &procedures,
            SummaryFilter {
                insurance_only: true,
            },
        );
        assert_eq!(insurance[0].total_billed, 800.0);
        assert_eq!(insurance[0].procedures, 1);
    }

    #[test]
    fn empty_input_yields_no_summaries() {
        assert!(monthly_summaries(&[], SummaryFilter::default()).is_empty());
    }
}
