//! Analytics events emitted by the monitor.

use chrono::Utc;
use perf_budget::BudgetViolation;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::key::ResourceKind;

/// Wire format posted to the analytics endpoint.
///
/// `{event, data, timestamp, url}` where `timestamp` is milliseconds since
/// the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    /// Event name (e.g. `slow_api`)
    pub event: String,
    /// Event-specific fields
    pub data: Value,
    /// When the event was emitted, in epoch milliseconds
    pub timestamp: i64,
    /// Page the event came from
    pub url: String,
}

impl AnalyticsEvent {
    /// Create an event stamped with the current time.
    pub fn new(event: impl Into<String>, data: Value, url: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: Utc::now().timestamp_millis(),
            url: url.into(),
        }
    }

    /// Read a numeric field from `data`.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.data.get(field).and_then(Value::as_f64)
    }

    /// Read a string field from `data`.
    pub fn string(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str)
    }
}

/// Events the monitor knows how to emit.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A budgeted metric (web vital) exceeded its budget
    PerformanceViolation(BudgetViolation),
    /// A single resource took longer than the slow-resource threshold
    SlowResource {
        /// Resource URL
        name: String,
        /// Resource classification
        kind: ResourceKind,
        /// Load time in milliseconds
        duration: f64,
        /// Threshold in milliseconds
        budget: f64,
    },
    /// A main-thread task exceeded the long-task threshold
    LongTask {
        /// Task duration in milliseconds
        duration: f64,
        /// Task start time, if known
        start_time: Option<f64>,
        /// Threshold in milliseconds
        budget: f64,
    },
    /// A component render exceeded the frame budget
    SlowComponent {
        /// Component name
        component: String,
        /// Render time in milliseconds
        render_time: f64,
        /// Threshold in milliseconds
        budget: f64,
    },
    /// An API call exceeded the slow-API threshold
    SlowApi {
        /// Endpoint as given by the caller
        endpoint: String,
        /// Duration in milliseconds
        duration: f64,
        /// HTTP status code
        status: u16,
        /// Threshold in milliseconds
        budget: f64,
    },
    /// Every API call, regardless of latency
    ApiCall {
        /// Endpoint as given by the caller
        endpoint: String,
        /// Duration in milliseconds
        duration: f64,
        /// HTTP status code
        status: u16,
    },
    /// Application-defined metric
    CustomMetric {
        /// Metric name
        name: String,
        /// Value
        value: f64,
    },
    /// An error handed to the monitor
    Error {
        /// Error message
        message: String,
        /// Source chain, if any
        stack: Option<String>,
        /// Caller-supplied context
        context: Map<String, Value>,
    },
    /// Final report sent at shutdown
    PerformanceSummary(Value),
}

impl MonitorEvent {
    /// Get the event name for this event type.
    pub fn event_name(&self) -> &'static str {
        match self {
            MonitorEvent::PerformanceViolation(_) => "performance_violation",
            MonitorEvent::SlowResource { .. } => "slow_resource",
            MonitorEvent::LongTask { .. } => "long_task",
            MonitorEvent::SlowComponent { .. } => "slow_component",
            MonitorEvent::SlowApi { .. } => "slow_api",
            MonitorEvent::ApiCall { .. } => "api_call",
            MonitorEvent::CustomMetric { .. } => "custom_metric",
            MonitorEvent::Error { .. } => "error",
            MonitorEvent::PerformanceSummary(_) => "performance_summary",
        }
    }

    /// The event-specific payload.
    pub fn data(&self) -> Value {
        match self {
            MonitorEvent::PerformanceViolation(violation) => json!({
                "metric": violation.metric,
                "value": violation.value,
                "budget": violation.budget,
                "percentage_over": violation.percent_over(),
                "severity": violation.severity.as_str(),
            }),
            MonitorEvent::SlowResource { name, kind, duration, budget } => json!({
                "name": name,
                "type": kind.as_str(),
                "duration": duration,
                "budget": budget,
            }),
            MonitorEvent::LongTask { duration, start_time, budget } => json!({
                "duration": duration,
                "start_time": start_time,
                "budget": budget,
            }),
            MonitorEvent::SlowComponent { component, render_time, budget } => json!({
                "component": component,
                "render_time": render_time,
                "budget": budget,
            }),
            MonitorEvent::SlowApi { endpoint, duration, status, budget } => json!({
                "endpoint": endpoint,
                "duration": duration,
                "status": status,
                "budget": budget,
            }),
            MonitorEvent::ApiCall { endpoint, duration, status } => json!({
                "endpoint": endpoint,
                "duration": duration,
                "status": status,
            }),
            MonitorEvent::CustomMetric { name, value } => json!({
                "name": name,
                "value": value,
            }),
            MonitorEvent::Error { message, stack, context } => json!({
                "message": message,
                "stack": stack,
                "context": context,
            }),
            MonitorEvent::PerformanceSummary(report) => report.clone(),
        }
    }

    /// Convert to the wire format for the given page.
    pub fn to_event(&self, url: &str) -> AnalyticsEvent {
        AnalyticsEvent::new(self.event_name(), self.data(), url)
    }
}
