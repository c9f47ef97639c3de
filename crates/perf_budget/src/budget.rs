//! Performance budgets and violation tracking

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Budget for a single loaded resource, in milliseconds.
pub const SLOW_RESOURCE_MS: f64 = 1000.0;

/// Main-thread tasks longer than this are reported as long tasks.
pub const LONG_TASK_MS: f64 = 50.0;

/// Render budget for one component (one frame at 60fps).
pub const COMPONENT_RENDER_MS: f64 = 16.67;

/// Budget for a single API round trip, in milliseconds.
pub const SLOW_API_MS: f64 = 500.0;

/// Read-only table of per-metric thresholds.
///
/// Thresholds are in milliseconds, except for layout shift which is
/// unitless. The table is assembled once with the builder methods and
/// only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetTable {
    budgets: BTreeMap<String, f64>,
}

impl BudgetTable {
    /// Create an empty table. Every metric passes against it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard Core Web Vitals budgets ("good" thresholds).
    pub fn standard() -> Self {
        Self::empty()
            .with_budget("FCP", 1800.0)
            .with_budget("LCP", 2500.0)
            .with_budget("FID", 100.0)
            .with_budget("CLS", 0.1)
            .with_budget("TTFB", 800.0)
    }

    /// Builder method to add or replace a threshold.
    pub fn with_budget(mut self, metric: impl Into<String>, threshold: f64) -> Self {
        self.budgets.insert(metric.into(), threshold);
        self
    }

    /// Get the threshold for a metric, if it has one.
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.budgets.get(metric).copied()
    }

    /// Number of metrics with a budget.
    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    /// Check if the table has no budgets.
    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }

    /// Iterate over `(metric, threshold)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.budgets.iter().map(|(name, budget)| (name.as_str(), *budget))
    }

    /// Check a value against the metric's budget.
    ///
    /// Returns a violation only when the metric has a budget and the value
    /// is strictly greater than it. Non-finite values never violate.
    pub fn check(&self, metric: &str, value: f64) -> Option<BudgetViolation> {
        let budget = self.get(metric)?;
        exceeds(value, budget).then(|| BudgetViolation::new(metric, value, budget))
    }

    /// Check every budgeted metric using `lookup` to find its current value.
    ///
    /// Metrics that `lookup` does not know about are treated as passing.
    pub fn evaluate<F>(&self, lookup: F) -> BudgetReport
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut checked = 0;
        let mut violations = Vec::new();

        for (metric, _) in self.iter() {
            let Some(value) = lookup(metric) else {
                continue;
            };
            checked += 1;
            if let Some(violation) = self.check(metric, value) {
                violations.push(violation);
            }
        }

        BudgetReport::from_violations(violations, checked)
    }
}

/// Returns true if `value` is over `budget`.
///
/// Shared by the fixed per-kind thresholds so that every comparison uses the
/// same strict rule.
pub fn exceeds(value: f64, budget: f64) -> bool {
    value.is_finite() && value > budget
}

/// Calculate violation severity based on how much the actual exceeds budget.
pub fn violation_severity(actual: f64, budget: f64) -> ViolationSeverity {
    let ratio = actual / budget;
    if ratio > 3.0 {
        ViolationSeverity::Critical
    } else if ratio > 2.0 {
        ViolationSeverity::High
    } else if ratio > 1.5 {
        ViolationSeverity::Medium
    } else {
        ViolationSeverity::Low
    }
}

/// Severity level of a budget violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    /// Minor violation (1-1.5x budget)
    Low,
    /// Moderate violation (1.5-2x budget)
    Medium,
    /// Significant violation (2-3x budget)
    High,
    /// Severe violation (>3x budget)
    Critical,
}

impl ViolationSeverity {
    /// Get the lowercase name used in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationSeverity::Low => "low",
            ViolationSeverity::Medium => "medium",
            ViolationSeverity::High => "high",
            ViolationSeverity::Critical => "critical",
        }
    }
}

/// A performance budget violation.
///
/// Generated when a measurement exceeds its budget threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetViolation {
    /// Metric that was over budget (e.g. "LCP", "component_Header_render_time")
    pub metric: String,
    /// Observed value
    pub value: f64,
    /// Budget threshold
    pub budget: f64,
    /// Severity of the violation
    pub severity: ViolationSeverity,
}

impl BudgetViolation {
    /// Create a new budget violation, grading its severity.
    pub fn new(metric: impl Into<String>, value: f64, budget: f64) -> Self {
        Self {
            metric: metric.into(),
            value,
            budget,
            severity: violation_severity(value, budget),
        }
    }

    /// Percentage over budget: `((value - budget) / budget) * 100`.
    pub fn percent_over(&self) -> f64 {
        (self.value - self.budget) / self.budget * 100.0
    }

    /// Check if this is a critical violation.
    pub fn is_critical(&self) -> bool {
        matches!(self.severity, ViolationSeverity::Critical)
    }
}

impl std::fmt::Display for BudgetViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {:.2} (budget: {:.2}, {:.1}% over)",
            self.metric,
            self.value,
            self.budget,
            self.percent_over()
        )
    }
}

/// Result of checking a set of metrics against a budget table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetReport {
    /// All violations in this report
    pub violations: Vec<BudgetViolation>,
    /// Number of metrics that had a value and were compared
    pub checked: usize,
    /// Number of critical violations
    pub critical_count: usize,
    /// Number of high severity violations
    pub high_count: usize,
}

impl BudgetReport {
    /// Create a new budget report from violations.
    pub fn from_violations(violations: Vec<BudgetViolation>, checked: usize) -> Self {
        let critical_count = violations
            .iter()
            .filter(|v| v.is_critical())
            .count();
        let high_count = violations
            .iter()
            .filter(|v| matches!(v.severity, ViolationSeverity::High))
            .count();

        Self {
            violations,
            checked,
            critical_count,
            high_count,
        }
    }

    /// True when no compared metric was over budget.
    pub fn within_budget(&self) -> bool {
        self.violations.is_empty()
    }

    /// Check if there are any critical violations.
    pub fn has_critical(&self) -> bool {
        self.critical_count > 0
    }

    /// Get the violation for a metric, if any.
    pub fn violation_for(&self, metric: &str) -> Option<&BudgetViolation> {
        self.violations.iter().find(|v| v.metric == metric)
    }
}

impl std::fmt::Display for BudgetReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.violations.is_empty() {
            write!(f, "All {} budgeted metrics within budget", self.checked)
        } else {
            writeln!(
                f,
                "Budget Report: {} of {} metrics over budget",
                self.violations.len(),
                self.checked
            )?;
            for v in &self.violations {
                writeln!(f, "  - [{}] {}", v.severity.as_str(), v)?;
            }
            Ok(())
        }
    }
}
