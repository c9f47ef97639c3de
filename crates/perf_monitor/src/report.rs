//! The monitor's accumulated performance report.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::error::Error;

use crate::error::TelemetryResult;
use crate::key::{MetricCategory, MetricKey, ResourceKind};
use crate::session::PageContext;

/// One error handed to the monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    /// Error message
    pub message: String,
    /// When the error was tracked
    pub timestamp: DateTime<Utc>,
    /// Source chain, one cause per line, if the error had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorRecord {
    /// Create a record from a message and optional stack.
    pub fn new(message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            stack,
        }
    }

    /// Create a record from an error, rendering its source chain as the stack.
    pub fn from_error(error: &(dyn Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        let stack = (!causes.is_empty()).then(|| causes.join("\n"));
        Self::new(error.to_string(), stack)
    }
}

/// Running aggregate for one resource kind after an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceAggregate {
    /// Number of resources of this kind observed
    pub count: u64,
    /// Mean load time across those resources
    pub average: f64,
}

/// One metric as it appears in an exported report.
///
/// `name` is the flat display name and may repeat across entries;
/// `category` plus `subject` identify the metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricEntry<'a> {
    pub category: MetricCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<&'a str>,
    pub name: String,
    pub value: f64,
}

impl<'a> MetricEntry<'a> {
    fn new(key: &'a MetricKey, value: f64) -> Self {
        Self {
            category: key.category(),
            subject: key.subject(),
            name: key.to_string(),
            value,
        }
    }
}

fn serialize_metrics<S: Serializer>(
    metrics: &BTreeMap<MetricKey, f64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(metrics.iter().map(|(key, value)| MetricEntry::new(key, *value)))
}

/// Consolidated state of everything the monitor has observed.
///
/// The monitor hands out clones of this; a snapshot does not change when the
/// monitor records more samples. Metrics serialize as a list of
/// [`MetricEntry`] values in key order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    #[serde(serialize_with = "serialize_metrics")]
    metrics: BTreeMap<MetricKey, f64>,
    errors: Vec<ErrorRecord>,
    #[serde(flatten)]
    context: PageContext,
}

impl PerformanceReport {
    /// Create an empty report for a page.
    pub fn new(context: PageContext) -> Self {
        Self {
            metrics: BTreeMap::new(),
            errors: Vec::new(),
            context,
        }
    }

    /// Get a metric value.
    pub fn metric(&self, key: &MetricKey) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    /// Get a metric by its flat name (e.g. `"LCP"`, `"api__orders_duration"`).
    ///
    /// The name is first resolved to its typed key with
    /// [`MetricKey::from_name`]. Otherwise the metric is found by display
    /// name, but only when exactly one metric renders to it.
    pub fn metric_by_name(&self, name: &str) -> Option<f64> {
        if let Some(value) = self.metric(&MetricKey::from_name(name)) {
            return Some(value);
        }

        let mut named = self.metrics.iter().filter(|(key, _)| key.to_string() == name);
        match (named.next(), named.next()) {
            (Some((_, value)), None) => Some(*value),
            _ => None,
        }
    }

    /// All metrics.
    pub fn metrics(&self) -> &BTreeMap<MetricKey, f64> {
        &self.metrics
    }

    /// Metrics in export form, in key order.
    pub fn metric_entries(&self) -> impl Iterator<Item = MetricEntry<'_>> {
        self.metrics.iter().map(|(key, value)| MetricEntry::new(key, *value))
    }

    /// All tracked errors, oldest first.
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }

    /// Page identity captured at construction.
    pub fn context(&self) -> &PageContext {
        &self.context
    }

    /// User agent captured at construction.
    pub fn user_agent(&self) -> &str {
        &self.context.user_agent
    }

    /// Page URL captured at construction.
    pub fn url(&self) -> &str {
        &self.context.url
    }

    /// When the report was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.context.timestamp
    }

    /// Get the running aggregate for a resource kind, if any were observed.
    pub fn resource_aggregate(&self, kind: ResourceKind) -> Option<ResourceAggregate> {
        let count = self.metric(&MetricKey::ResourceCount(kind))?;
        let average = self.metric(&MetricKey::ResourceAverage(kind))?;
        Some(ResourceAggregate {
            count: count as u64,
            average,
        })
    }

    /// Set a metric, replacing any previous value.
    pub(crate) fn set(&mut self, key: MetricKey, value: f64) {
        self.metrics.insert(key, value);
    }

    /// Fold one load time into the kind's running average and count.
    ///
    /// Both keys are written together:
    /// `avg_n = (avg_{n-1} * (n-1) + value) / n`.
    pub(crate) fn record_resource(
        &mut self,
        kind: ResourceKind,
        load_time: f64,
    ) -> ResourceAggregate {
        let (previous_count, previous_average) = self
            .resource_aggregate(kind)
            .map(|agg| (agg.count, agg.average))
            .unwrap_or((0, 0.0));

        let count = previous_count + 1;
        let average = (previous_average * previous_count as f64 + load_time) / count as f64;

        self.metrics.insert(MetricKey::ResourceAverage(kind), average);
        self.metrics.insert(MetricKey::ResourceCount(kind), count as f64);

        ResourceAggregate { count, average }
    }

    /// Append an error record.
    pub(crate) fn push_error(&mut self, record: ErrorRecord) {
        self.errors.push(record);
    }

    /// Render the report as indented JSON for humans.
    pub fn to_pretty_json(&self) -> TelemetryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Counts used for periodic logging.
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            metric_count: self.metrics.len(),
            error_count: self.errors.len(),
            resources_observed: self
                .metrics
                .iter()
                .filter(|(key, _)| matches!(key, MetricKey::ResourceCount(_)))
                .map(|(_, count)| *count as u64)
                .sum(),
        }
    }
}

/// Headline counts of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Number of distinct metrics
    pub metric_count: usize,
    /// Number of tracked errors
    pub error_count: usize,
    /// Total resources observed across all kinds
    pub resources_observed: u64,
}
