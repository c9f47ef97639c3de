//! Instrumentation helpers layered over [`PerformanceMonitor`].
//!
//! These wrap a piece of work, time it, record the result on the monitor
//! and hand the work's own outcome back unchanged.

use perf_budget::{BudgetReport, BudgetTable, PerfTimer};
use serde_json::{json, Map};
use std::future::Future;

use crate::error::TelemetryError;
use crate::key::MetricKey;
use crate::monitor::PerformanceMonitor;
use crate::report::PerformanceReport;

/// Times a component render; records it on the monitor when dropped.
///
/// ```rust
/// use perf_monitor::{MonitorConfig, PerformanceMonitor};
///
/// let monitor = PerformanceMonitor::new(MonitorConfig::new("/")).unwrap();
/// {
///     let _render = monitor.track_component("OrderTable");
///     // ... render ...
/// }
/// let report = monitor.get_performance_report();
/// assert!(report.metric_by_name("component_OrderTable_render_time").is_some());
/// ```
#[must_use = "the render time is recorded when the timer is dropped"]
pub struct ComponentTimer<'a> {
    monitor: &'a PerformanceMonitor,
    timer: Option<PerfTimer>,
}

impl<'a> ComponentTimer<'a> {
    /// Start timing a component render.
    pub fn new(monitor: &'a PerformanceMonitor, component: &str) -> Self {
        Self {
            monitor,
            timer: Some(PerfTimer::new(component)),
        }
    }

    /// Component being timed.
    pub fn component(&self) -> &str {
        self.timer.as_ref().map(PerfTimer::name).unwrap_or_default()
    }

    /// Time since the render started.
    pub fn elapsed_ms(&self) -> f64 {
        self.timer.as_ref().map(PerfTimer::elapsed_ms).unwrap_or_default()
    }

    /// Stop now, record, and return the render time.
    pub fn finish(mut self) -> f64 {
        self.record().unwrap_or_default()
    }

    fn record(&mut self) -> Option<f64> {
        let timer = self.timer.take()?;
        let component = timer.name().to_string();
        let render_time = timer.stop();
        self.monitor.track_component_render(&component, render_time);
        Some(render_time)
    }
}

impl Drop for ComponentTimer<'_> {
    fn drop(&mut self) {
        self.record();
    }
}

/// Time a component render for the rest of the enclosing scope.
#[macro_export]
macro_rules! track_component {
    ($monitor:expr, $name:expr) => {
        let _component_timer = $crate::ComponentTimer::new(&$monitor, $name);
    };
}

/// Run `render` and record how long it took as a component render.
pub fn with_performance_tracking<R>(
    monitor: &PerformanceMonitor,
    component: &str,
    render: impl FnOnce() -> R,
) -> R {
    let _timer = ComponentTimer::new(monitor, component);
    render()
}

/// Errors that may carry an HTTP status code.
pub trait ErrorStatus {
    /// Status code carried by the error, if any
    fn status_code(&self) -> Option<u16>;
}

impl ErrorStatus for reqwest::Error {
    fn status_code(&self) -> Option<u16> {
        self.status().map(|status| status.as_u16())
    }
}

impl ErrorStatus for TelemetryError {
    fn status_code(&self) -> Option<u16> {
        None
    }
}

impl ErrorStatus for std::io::Error {
    fn status_code(&self) -> Option<u16> {
        None
    }
}

/// Status recorded for a failed call whose error carries no status.
pub const UNKNOWN_FAILURE_STATUS: u16 = 500;

/// Time an API call and record it on the monitor.
///
/// Success records status 200; failure records the error's status, or 500.
/// The call's result is returned unchanged.
pub async fn track_api_call<T, E, Fut>(
    monitor: &PerformanceMonitor,
    endpoint: &str,
    call: Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: ErrorStatus,
{
    track_api_call_with(monitor, endpoint, call, |result| match result {
        Ok(_) => 200,
        Err(err) => err.status_code().unwrap_or(UNKNOWN_FAILURE_STATUS),
    })
    .await
}

/// Like [`track_api_call`] with a caller-supplied status mapping.
pub async fn track_api_call_with<T, E, Fut, S>(
    monitor: &PerformanceMonitor,
    endpoint: &str,
    call: Fut,
    status_of: S,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    S: FnOnce(&Result<T, E>) -> u16,
{
    let timer = PerfTimer::new(endpoint);
    let result = call.await;
    let duration_ms = timer.stop();

    monitor.track_api_call(endpoint, duration_ms, status_of(&result));
    result
}

/// Time an image load.
///
/// Success records the custom metric `image_load_{src}` and calls
/// `on_load`. Failure records an error with `src` and `load_time` context
/// and calls `on_error`. The load's result is returned unchanged.
pub async fn track_image_load<T, E, Fut, L, F>(
    monitor: &PerformanceMonitor,
    src: &str,
    load: Fut,
    on_load: L,
    on_error: F,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    L: FnOnce(&T),
    F: FnOnce(&E),
{
    let timer = PerfTimer::new(src);
    let result = load.await;
    let elapsed_ms = timer.stop();

    match &result {
        Ok(image) => {
            monitor.track_custom_metric(&format!("image_load_{}", src), elapsed_ms);
            on_load(image);
        }
        Err(err) => {
            let failure = TelemetryError::ImageLoad {
                src: src.to_string(),
                elapsed_ms,
            };
            let mut context = Map::new();
            context.insert("src".to_string(), json!(src));
            context.insert("load_time".to_string(), json!(elapsed_ms));

            monitor.track_error(&failure, Some(context));
            on_error(err);
        }
    }

    result
}

/// Compare a report's budgeted metrics against a budget table.
///
/// Each budget name is resolved to its typed key, so a custom metric that
/// shares a vital's name is never checked in its place. Metrics missing
/// from the report are skipped.
pub fn check_performance_budgets(
    report: &PerformanceReport,
    budgets: &BudgetTable,
) -> BudgetReport {
    budgets.evaluate(|metric| report.metric(&MetricKey::from_name(metric)))
}
