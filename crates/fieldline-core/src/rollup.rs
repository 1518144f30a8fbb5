// Cost rollup engine
//
// Aggregates calendar assignments (assignee, rate, date range) into
// per-entity labor cost summaries. Hours are computed from the overlap
// between each assignment's span and the query range, clipped to the query
// range, never extended. Assignments carry whole-day spans, so overlap days
// convert to hours via a fixed work-day length.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::assignment::CalendarAssignment;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Default hours counted per assigned work day
pub const DEFAULT_WORK_DAY_HOURS: f64 = 8.0;

/// Inclusive date range for a rollup query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Per-assignee line in a rollup summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AssigneeRollup {
    pub assignee_id: String,
    pub hours: f64,
    pub cost: f64,
    /// True when any contributing assignment has no rate. Distinguishes
    /// "zero dollars" from "unknown dollars".
    pub rate_missing: bool,
}

/// Aggregated labor cost for one entity over a date range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RollupSummary {
    pub total_hours: f64,
    pub total_cost: f64,
    pub per_assignee: Vec<AssigneeRollup>,
}

/// Labor cost aggregation over calendar assignments
#[derive(Debug, Clone)]
pub struct RollupEngine {
    work_day_hours: f64,
}

impl RollupEngine {
    pub fn new() -> Self {
        Self {
            work_day_hours: DEFAULT_WORK_DAY_HOURS,
        }
    }

    pub fn with_work_day_hours(work_day_hours: f64) -> Self {
        Self { work_day_hours }
    }

    /// Days of overlap between an assignment's span and the query range.
    /// Both ranges are inclusive; an open-ended assignment runs to the end
    /// of the query range.
    fn overlap_days(assignment: &CalendarAssignment, range: &DateRange) -> i64 {
        let start = assignment.start_date.max(range.from);
        let end = assignment.end_date.unwrap_or(range.to).min(range.to);
        if end < start {
            return 0;
        }
        (end - start).num_days() + 1
    }

    /// Aggregate the given assignments over the query range.
    ///
    /// Assignments with no rate contribute zero cost but their hours still
    /// accumulate, and the assignee line is flagged `rate_missing`.
    pub fn rollup(&self, assignments: &[CalendarAssignment], range: &DateRange) -> RollupSummary {
        let mut per_assignee: BTreeMap<String, AssigneeRollup> = BTreeMap::new();

        for assignment in assignments {
            let days = Self::overlap_days(assignment, range);
            if days == 0 {
                continue;
            }
            let hours = days as f64 * self.work_day_hours;
            let cost = assignment.rate_per_hour.map_or(0.0, |rate| rate * hours);

            let line = per_assignee
                .entry(assignment.assignee_id.clone())
                .or_insert_with(|| AssigneeRollup {
                    assignee_id: assignment.assignee_id.clone(),
                    hours: 0.0,
                    cost: 0.0,
                    rate_missing: false,
                });
            line.hours += hours;
            line.cost += cost;
            line.rate_missing |= assignment.rate_per_hour.is_none();
        }

        let total_hours = per_assignee.values().map(|a| a.hours).sum();
        let total_cost = per_assignee.values().map(|a| a.cost).sum();

        RollupSummary {
            total_hours,
            total_cost,
            per_assignee: per_assignee.into_values().collect(),
        }
    }
}

impl Default for RollupEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EntityType;

    fn assignment(
        assignee: &str,
        start: (i32, u32, u32),
        end: Option<(i32, u32, u32)>,
        rate: Option<f64>,
    ) -> CalendarAssignment {
        CalendarAssignment {
            entity_type: EntityType::WorkOrder,
            entity_id: "WO-1".to_string(),
            assignee_id: assignee.to_string(),
            calendar_id: "cal-primary".to_string(),
            provider_event_id: "gev-1".to_string(),
            etag: None,
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: end.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            rate_per_hour: rate,
        }
    }

    fn range(from: (i32, u32, u32), to: (i32, u32, u32)) -> DateRange {
        DateRange {
            from: NaiveDate::from_ymd_opt(from.0, from.1, from.2).unwrap(),
            to: NaiveDate::from_ymd_opt(to.0, to.1, to.2).unwrap(),
        }
    }

    #[test]
    fn range_outside_span_contributes_nothing() {
        let engine = RollupEngine::new();
        let assignments = [assignment("SUB-1", (2024, 6, 1), Some((2024, 6, 5)), Some(50.0))];
        let summary = engine.rollup(&assignments, &range((2024, 7, 1), (2024, 7, 31)));
        assert_eq!(summary.total_hours, 0.0);
        assert_eq!(summary.total_cost, 0.0);
        assert!(summary.per_assignee.is_empty());
    }

    #[test]
    fn overlap_is_clipped_to_query_range() {
        let engine = RollupEngine::new();
        // 10-day assignment, 3 days inside the range
        let assignments = [assignment("SUB-1", (2024, 6, 1), Some((2024, 6, 10)), Some(50.0))];
        let summary = engine.rollup(&assignments, &range((2024, 6, 8), (2024, 6, 20)));
        assert_eq!(summary.total_hours, 3.0 * 8.0);
        assert_eq!(summary.total_cost, 3.0 * 8.0 * 50.0);
    }

    #[test]
    fn missing_rate_accumulates_hours_with_zero_cost() {
        let engine = RollupEngine::new();
        // 5-day assignment fully containing a 3-day query range
        let assignments = [assignment("SUB-2", (2024, 6, 1), Some((2024, 6, 5)), None)];
        let summary = engine.rollup(&assignments, &range((2024, 6, 2), (2024, 6, 4)));
        assert_eq!(summary.total_hours, 3.0 * 8.0);
        assert_eq!(summary.total_cost, 0.0);
        assert_eq!(summary.per_assignee.len(), 1);
        assert!(summary.per_assignee[0].rate_missing);
    }

    #[test]
    fn open_ended_assignment_runs_to_end_of_range() {
        let engine = RollupEngine::new();
        let assignments = [assignment("SUB-3", (2024, 6, 10), None, Some(40.0))];
        let summary = engine.rollup(&assignments, &range((2024, 6, 1), (2024, 6, 12)));
        assert_eq!(summary.total_hours, 3.0 * 8.0);
    }

    #[test]
    fn per_assignee_lines_accumulate_across_assignments() {
        let engine = RollupEngine::new();
        let assignments = [
            assignment("SUB-1", (2024, 6, 1), Some((2024, 6, 2)), Some(50.0)),
            assignment("SUB-1", (2024, 6, 4), Some((2024, 6, 4)), None),
            assignment("SUB-2", (2024, 6, 1), Some((2024, 6, 1)), Some(60.0)),
        ];
        let summary = engine.rollup(&assignments, &range((2024, 6, 1), (2024, 6, 30)));
        assert_eq!(summary.per_assignee.len(), 2);
        let sub1 = &summary.per_assignee[0];
        assert_eq!(sub1.assignee_id, "SUB-1");
        assert_eq!(sub1.hours, 3.0 * 8.0);
        assert_eq!(sub1.cost, 2.0 * 8.0 * 50.0);
        assert!(sub1.rate_missing);
        let sub2 = &summary.per_assignee[1];
        assert_eq!(sub2.cost, 8.0 * 60.0);
        assert!(!sub2.rate_missing);
    }

    #[test]
    fn custom_work_day_hours() {
        let engine = RollupEngine::with_work_day_hours(10.0);
        let assignments = [assignment("SUB-1", (2024, 6, 1), Some((2024, 6, 1)), Some(10.0))];
        let summary = engine.rollup(&assignments, &range((2024, 6, 1), (2024, 6, 1)));
        assert_eq!(summary.total_hours, 10.0);
        assert_eq!(summary.total_cost, 100.0);
    }
}
