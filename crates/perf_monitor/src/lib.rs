//! Performance Monitor
//!
//! Client-side performance telemetry for a web dashboard. The monitor
//! collects signals about one page load and keeps them in a single report:
//!
//! - Core web vitals (CLS, FID, FCP, LCP, TTFB) checked against budgets
//! - Navigation timing phases derived from the navigation entry
//! - Per-kind resource load averages and counts
//! - Long tasks, component render times and API call latency
//! - Application-defined custom metrics
//! - Errors forwarded to an error tracker
//!
//! Threshold crossings become analytics events. In production builds the
//! events go through a bounded queue that a background task flushes to the
//! analytics endpoint; elsewhere they only reach the optional analytics hook.
//!
//! # Example
//!
//! ```rust
//! use perf_monitor::{MonitorConfig, PerformanceMonitor, VitalName, WebVital};
//!
//! let monitor = PerformanceMonitor::new(MonitorConfig::new("/dashboard")).unwrap();
//!
//! monitor.record_vital(WebVital::new(VitalName::Lcp, 2100.0));
//! monitor.track_api_call("/orders", 320.0, 200);
//! monitor.track_custom_metric("orders_rendered", 25.0);
//!
//! let report = monitor.get_performance_report();
//! assert_eq!(report.metric_by_name("LCP"), Some(2100.0));
//! assert_eq!(report.metric_by_name("api__orders_duration"), Some(320.0));
//! assert!(monitor.check_performance_budgets().within_budget());
//! ```
//!
//! # Modules
//!
//! - [`monitor`] - The monitor, its configuration and lifecycle
//! - [`entry`] - Performance entries and web vitals fed into the monitor
//! - [`key`] - Typed metric keys and resource classification
//! - [`report`] - The aggregated performance report
//! - [`event`] - Analytics events and their wire format
//! - [`sink`] - Analytics sinks, hooks and error trackers
//! - [`transport`] - Bounded delivery queue and background flushing
//! - [`tracking`] - Component, API and image instrumentation helpers

pub mod entry;
mod error;
pub mod event;
pub mod key;
pub mod monitor;
mod observer;
pub mod report;
mod session;
pub mod sink;
pub mod tracking;
pub mod transport;

pub use entry::{
    EntryType, LongTaskTiming, NavigationTiming, PerformanceEntry, ResourceTiming, WebVital,
};
pub use error::{TelemetryError, TelemetryResult};
pub use event::{AnalyticsEvent, MonitorEvent};
pub use key::{
    sanitize_key, MetricCategory, MetricKey, NavigationPhase, ResourceKind, VitalName,
};
pub use monitor::{Environment, MonitorConfig, PerformanceMonitor, PerformanceMonitorBuilder};
pub use report::{
    ErrorRecord, MetricEntry, PerformanceReport, ReportSummary, ResourceAggregate,
};
pub use session::{default_user_agent, PageContext};
pub use sink::{
    AnalyticsHook, AnalyticsSink, ErrorTracker, HttpSink, MemorySink, NullSink,
    TracingErrorTracker,
};
pub use tracking::{
    check_performance_budgets, track_api_call, track_api_call_with, track_image_load,
    with_performance_tracking, ComponentTimer, ErrorStatus,
};
pub use transport::{DispatchConfig, DispatchStats, EventDispatcher, FlushOutcome};

pub use perf_budget::{BudgetReport, BudgetTable, BudgetViolation, ViolationSeverity};
