//! Department statistics
//!
//! Pure aggregation over a snapshot of a department's employees. The input
//! slice order is the tie-breaking order, and the facade
//! always hands these functions employees sorted by ascending id.
//!
//! Empty input never divides by zero: every numeric metric is `0.0`, every
//! employee reference is `None` and every id list is empty.

use crate::{Employee, ExternalId};
use serde::Serialize;
use std::collections::BTreeMap;

/// Normalized position label -> number of employees holding it.
pub type PositionHistogram = BTreeMap<String, usize>;

/// Salary aggregates for one department.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalaryStatistics {
    pub total: f64,
    pub average: f64,
    pub highest: f64,
    pub highest_employee: Option<ExternalId>,
    pub lowest: f64,
    pub lowest_employee: Option<ExternalId>,
}

/// Performance aggregates for one department.
///
/// Only employees with a finite performance score take part.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceStatistics {
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub percentile25: f64,
    pub median: f64,
    pub percentile75: f64,
    /// Ascending by score; equal scores keep input order.
    pub sorted_employee_ids: Vec<ExternalId>,
}

/// Normalize a position label for grouping. Blank labels normalize to `None`.
pub fn normalize_position(position: &str) -> Option<String> {
    let trimmed = position.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Count employees per normalized position label.
pub fn position_histogram(employees: &[Employee]) -> PositionHistogram {
    let mut histogram = PositionHistogram::new();
    for label in employees
        .iter()
        .filter_map(|e| e.position.as_deref())
        .filter_map(normalize_position)
    {
        *histogram.entry(label).or_insert(0) += 1;
    }
    histogram
}

/// Total, average and extremes of employee salaries.
pub fn salary_statistics(employees: &[Employee]) -> SalaryStatistics {
    let Some(first) = employees.first() else {
        return SalaryStatistics::default();
    };

    let mut total = 0.0;
    let mut highest = first;
    let mut lowest = first;
    for employee in employees {
        total += employee.salary;
        // Strict comparisons keep the first employee on ties.
        if employee.salary > highest.salary {
            highest = employee;
        }
        if employee.salary < lowest.salary {
            lowest = employee;
        }
    }

    SalaryStatistics {
        total,
        average: total / employees.len() as f64,
        highest: highest.salary,
        highest_employee: Some(highest.id),
        lowest: lowest.salary,
        lowest_employee: Some(lowest.id),
    }
}

/// Average, extremes, quartiles and ranking of performance scores.
pub fn performance_statistics(employees: &[Employee]) -> PerformanceStatistics {
    let mut ranked: Vec<(ExternalId, f64)> = employees
        .iter()
        .filter_map(|e| e.performance.filter(|p| p.is_finite()).map(|p| (e.id, p)))
        .collect();

    if ranked.is_empty() {
        return PerformanceStatistics::default();
    }

    // sort_by is stable, so equal scores stay in input order.
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let scores: Vec<f64> = ranked.iter().map(|(_, score)| *score).collect();
    let sum: f64 = scores.iter().sum();

    PerformanceStatistics {
        average: sum / scores.len() as f64,
        highest: scores[scores.len() - 1],
        lowest: scores[0],
        percentile25: percentile(&scores, 0.25),
        median: percentile(&scores, 0.5),
        percentile75: percentile(&scores, 0.75),
        sorted_employee_ids: ranked.into_iter().map(|(id, _)| id).collect(),
    }
}

/// Percentile of an ascending slice by linear interpolation between the two
/// nearest order statistics (`rank = p * (n - 1)`).
///
/// `p` is clamped to `[0, 1]`; an empty slice yields `0.0`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let fraction = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmployeeDraft;
    use chrono::NaiveDate;

    fn id(raw: u32) -> ExternalId {
        ExternalId::new(raw).unwrap()
    }

    fn employee(raw_id: u32, position: Option<&str>, salary: f64, performance: Option<f64>) -> Employee {
        let hired = NaiveDate::from_ymd_opt(2023, 9, 1).unwrap();
        let mut draft = EmployeeDraft::new(format!("E{}", raw_id), hired).with_salary(salary);
        draft.position = position.map(str::to_string);
        draft.performance = performance;
        Employee::from_draft(id(raw_id), draft, None)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_position_histogram_normalizes_labels() {
        let employees = vec![
            employee(1, Some("  DataScientist "), 1.0, None),
            employee(2, Some("datascientist"), 1.0, None),
            employee(3, Some("Manager"), 1.0, None),
            employee(4, None, 1.0, None),
            employee(5, Some("   "), 1.0, None),
        ];

        let histogram = position_histogram(&employees);
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram.get("datascientist"), Some(&2));
        assert_eq!(histogram.get("manager"), Some(&1));
    }

    #[test]
    fn test_empty_department_defaults() {
        assert!(position_histogram(&[]).is_empty());

        let salary = salary_statistics(&[]);
        assert_eq!(salary, SalaryStatistics::default());
        assert_eq!(salary.average, 0.0);
        assert!(salary.highest_employee.is_none());

        let performance = performance_statistics(&[]);
        assert_eq!(performance, PerformanceStatistics::default());
        assert!(performance.sorted_employee_ids.is_empty());
        assert!(!performance.average.is_nan());
    }

    #[test]
    fn test_salary_statistics_single_employee() {
        let stats = salary_statistics(&[employee(2, Some("SoftwareEngineer"), 50.0, Some(90.0))]);
        assert_eq!(stats.total, 50.0);
        assert_eq!(stats.average, 50.0);
        assert_eq!(stats.highest_employee, Some(id(2)));
        assert_eq!(stats.lowest_employee, Some(id(2)));
    }

    #[test]
    fn test_salary_statistics_first_occurrence_wins_ties() {
        let employees = vec![
            employee(1, None, 100.0, None),
            employee(2, None, 10.5, None),
            employee(3, None, 100.0, None),
            employee(4, None, 10.5, None),
        ];
        let stats = salary_statistics(&employees);
        assert!(approx(stats.total, 221.0));
        assert!(approx(stats.average, 55.25));
        assert_eq!(stats.highest_employee, Some(id(1)));
        assert_eq!(stats.lowest_employee, Some(id(2)));
    }

    #[test]
    fn test_performance_statistics_excludes_unset_scores() {
        let employees = vec![
            employee(1, Some("DataScientist"), 10.5, Some(100.0)),
            employee(2, Some("DataScientist"), 20.5, Some(90.0)),
            employee(3, Some("DataScientist"), 30.5, Some(80.0)),
            employee(4, Some("DataScientist"), 40.5, Some(70.0)),
            employee(5, None, 0.0, None),
        ];

        let stats = performance_statistics(&employees);
        assert_eq!(stats.highest, 100.0);
        assert_eq!(stats.lowest, 70.0);
        assert!(approx(stats.average, 85.0));
        assert!(approx(stats.percentile25, 77.5));
        assert!(approx(stats.median, 85.0));
        assert!(approx(stats.percentile75, 92.5));
        assert_eq!(stats.sorted_employee_ids, vec![id(4), id(3), id(2), id(1)]);
    }

    #[test]
    fn test_performance_ties_keep_input_order() {
        let employees = vec![
            employee(1, None, 0.0, Some(80.0)),
            employee(2, None, 0.0, Some(60.0)),
            employee(3, None, 0.0, Some(80.0)),
            employee(4, None, 0.0, Some(60.0)),
        ];
        let stats = performance_statistics(&employees);
        assert_eq!(stats.sorted_employee_ids, vec![id(2), id(4), id(1), id(3)]);
    }

    #[test]
    fn test_performance_ignores_non_finite_scores() {
        let employees = vec![
            employee(1, None, 0.0, Some(f64::NAN)),
            employee(2, None, 0.0, Some(40.0)),
        ];
        let stats = performance_statistics(&employees);
        assert_eq!(stats.sorted_employee_ids, vec![id(2)]);
        assert_eq!(stats.median, 40.0);
    }

    #[test]
    fn test_percentile_edges() {
        assert_eq!(percentile(&[], 0.5), 0.0);
        assert_eq!(percentile(&[7.0], 0.25), 7.0);
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 0.0), 1.0);
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 1.0), 3.0);
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 0.5), 2.0);
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 7.0), 3.0);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
