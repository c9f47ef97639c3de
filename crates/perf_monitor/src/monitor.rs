//! The performance monitor: owns the report, applies budgets, emits events.

use perf_budget::{
    exceeds, BudgetReport, BudgetTable, COMPONENT_RENDER_MS, LONG_TASK_MS, SLOW_API_MS,
    SLOW_RESOURCE_MS,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::entry::{LongTaskTiming, NavigationTiming, PerformanceEntry, ResourceTiming, WebVital};
use crate::error::{TelemetryError, TelemetryResult};
use crate::event::{AnalyticsEvent, MonitorEvent};
use crate::key::MetricKey;
use crate::observer::ObserverSet;
use crate::report::{ErrorRecord, PerformanceReport};
use crate::session::{default_user_agent, PageContext};
use crate::sink::{
    AnalyticsHook, AnalyticsSink, ErrorTracker, HttpSink, NullSink, TracingErrorTracker,
};
use crate::tracking::{check_performance_budgets, ComponentTimer};
use crate::transport::{
    run_flush_loop, DispatchConfig, DispatchStats, EventDispatcher, FlushOutcome,
};

/// Build configuration the monitor runs under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development: no remote delivery
    #[default]
    Development,
    /// Test runs: no remote delivery, no periodic snapshots
    Test,
    /// Production: events are posted to the analytics endpoint
    Production,
}

impl Environment {
    /// Check if events should be delivered remotely.
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

/// Configuration for the performance monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Build environment
    pub environment: Environment,
    /// Base URL of the analytics backend
    pub endpoint: String,
    /// User agent recorded in the report
    pub user_agent: String,
    /// Page URL recorded in the report and on every event
    pub url: String,
    /// How often a report snapshot is logged
    pub snapshot_interval: Duration,
    /// Event delivery configuration
    pub dispatch: DispatchConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            endpoint: String::new(),
            user_agent: default_user_agent(),
            url: String::new(),
            snapshot_interval: Duration::from_secs(30),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Create a config for the given page URL.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Set the analytics endpoint.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Set the environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// Set the snapshot logging interval.
    pub fn with_snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Set event delivery configuration.
    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }
}

/// Builder wiring a monitor to its collaborators.
pub struct PerformanceMonitorBuilder {
    config: MonitorConfig,
    budgets: BudgetTable,
    sink: Option<Arc<dyn AnalyticsSink>>,
    hook: Option<Arc<dyn AnalyticsHook>>,
    error_tracker: Option<Arc<dyn ErrorTracker>>,
}

impl PerformanceMonitorBuilder {
    /// Start from a config, the standard budgets and default collaborators.
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            budgets: BudgetTable::standard(),
            sink: None,
            hook: None,
            error_tracker: None,
        }
    }

    /// Replace the budget table.
    pub fn budgets(mut self, budgets: BudgetTable) -> Self {
        self.budgets = budgets;
        self
    }

    /// Deliver events to this sink instead of the default.
    pub fn sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Call this hook for every emitted event.
    pub fn hook(mut self, hook: Arc<dyn AnalyticsHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Forward tracked errors to this tracker.
    pub fn error_tracker(mut self, tracker: Arc<dyn ErrorTracker>) -> Self {
        self.error_tracker = Some(tracker);
        self
    }

    /// Build the monitor.
    ///
    /// Without an explicit sink, production builds post to the configured
    /// endpoint and other builds discard events.
    pub fn build(self) -> TelemetryResult<PerformanceMonitor> {
        let config = self.config;
        config.dispatch.validate()?;

        if config.environment != Environment::Test && config.snapshot_interval.is_zero() {
            return Err(TelemetryError::InvalidConfig(
                "snapshot_interval must be non-zero".to_string(),
            ));
        }

        let remote = config.environment.is_production();
        let sink: Arc<dyn AnalyticsSink> = match self.sink {
            Some(sink) => sink,
            None if remote => Arc::new(HttpSink::new(&config.endpoint, config.dispatch.timeout)?),
            None => Arc::new(NullSink),
        };

        let dispatcher = Arc::new(EventDispatcher::new(
            config.dispatch.clone(),
            config.url.clone(),
            remote,
            sink,
            self.hook,
        ));

        let context = PageContext::new(config.user_agent.clone(), config.url.clone());

        tracing::info!(
            target: "perf_monitor",
            environment = config.environment.as_str(),
            url = %config.url,
            session_id = %context.session_id,
            "performance monitor created"
        );

        Ok(PerformanceMonitor {
            report: Arc::new(Mutex::new(PerformanceReport::new(context))),
            budgets: self.budgets,
            observers: ObserverSet::connected(),
            dispatcher,
            error_tracker: self
                .error_tracker
                .unwrap_or_else(|| Arc::new(TracingErrorTracker)),
            background: Mutex::new(None),
            shut_down: AtomicBool::new(false),
            config,
        })
    }
}

struct BackgroundTasks {
    token: CancellationToken,
    flush: JoinHandle<()>,
    snapshot: Option<JoinHandle<()>>,
}

/// Aggregates performance signals for one page load.
///
/// Every tracking operation takes `&self` and never fails; share the
/// monitor with `Arc`.
pub struct PerformanceMonitor {
    config: MonitorConfig,
    budgets: BudgetTable,
    report: Arc<Mutex<PerformanceReport>>,
    observers: ObserverSet,
    dispatcher: Arc<EventDispatcher>,
    error_tracker: Arc<dyn ErrorTracker>,
    background: Mutex<Option<BackgroundTasks>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("config", &self.config)
            .field("budgets", &self.budgets)
            .field("observers", &self.observers)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl PerformanceMonitor {
    /// Create a monitor with default collaborators.
    pub fn new(config: MonitorConfig) -> TelemetryResult<Self> {
        Self::builder(config).build()
    }

    /// Start building a monitor.
    pub fn builder(config: MonitorConfig) -> PerformanceMonitorBuilder {
        PerformanceMonitorBuilder::new(config)
    }

    fn report(&self) -> MutexGuard<'_, PerformanceReport> {
        lock_report(&self.report)
    }

    fn emit(&self, event: MonitorEvent) {
        self.dispatcher.emit(&event);
    }

    /// Handle one web-vitals callback.
    pub fn record_vital(&self, vital: WebVital) {
        if !vital.value.is_finite() {
            tracing::trace!(
                target: "perf_monitor::vitals",
                name = vital.name.as_str(),
                "ignoring non-finite vital"
            );
            return;
        }

        self.report().set(MetricKey::Vital(vital.name), vital.value);

        tracing::trace!(
            target: "perf_monitor::vitals",
            name = vital.name.as_str(),
            value = vital.value,
            "vital recorded"
        );

        if let Some(violation) = self.budgets.check(vital.name.as_str(), vital.value) {
            tracing::warn!(
                target: "perf_monitor::vitals",
                metric = %violation.metric,
                value = violation.value,
                budget = violation.budget,
                percent_over = violation.percent_over(),
                "performance budget exceeded"
            );
            self.emit(MonitorEvent::PerformanceViolation(violation));
        }
    }

    /// Handle one entry from a performance observer.
    ///
    /// Entries whose observer has been disconnected are ignored.
    pub fn observe(&self, entry: &PerformanceEntry) {
        if !self.observers.is_connected(entry.entry_type()) {
            tracing::trace!(
                target: "perf_monitor::observer",
                entry_type = entry.entry_type().as_str(),
                "observer disconnected, entry ignored"
            );
            return;
        }

        match entry {
            PerformanceEntry::Navigation(timing) => self.handle_navigation(timing),
            PerformanceEntry::Resource(timing) => self.handle_resource(timing),
            PerformanceEntry::LongTask(timing) => self.handle_long_task(timing),
        }
    }

    fn handle_navigation(&self, timing: &NavigationTiming) {
        let intervals = timing.intervals();
        {
            let mut report = self.report();
            for (phase, value) in &intervals {
                report.set(MetricKey::Navigation(*phase), *value);
            }
        }

        tracing::debug!(
            target: "perf_monitor::navigation",
            intervals = intervals.len(),
            "navigation timing recorded"
        );
    }

    fn handle_resource(&self, timing: &ResourceTiming) {
        let Some(load_time) = timing.load_time() else {
            return;
        };

        let kind = timing.kind();
        let aggregate = self.report().record_resource(kind, load_time);

        tracing::trace!(
            target: "perf_monitor::resource",
            name = %timing.name,
            kind = kind.as_str(),
            load_time,
            count = aggregate.count,
            average = aggregate.average,
            "resource recorded"
        );

        if exceeds(load_time, SLOW_RESOURCE_MS) {
            tracing::warn!(
                target: "perf_monitor::resource",
                name = %timing.name,
                kind = kind.as_str(),
                load_time,
                "slow resource"
            );
            self.emit(MonitorEvent::SlowResource {
                name: timing.name.clone(),
                kind,
                duration: load_time,
                budget: SLOW_RESOURCE_MS,
            });
        }
    }

    fn handle_long_task(&self, timing: &LongTaskTiming) {
        let Some(duration) = crate::entry::finite(timing.duration) else {
            return;
        };

        self.report().set(MetricKey::LongTask, duration);

        if exceeds(duration, LONG_TASK_MS) {
            tracing::warn!(
                target: "perf_monitor::longtask",
                duration,
                start_time = timing.start_time,
                "long task detected"
            );
            self.emit(MonitorEvent::LongTask {
                duration,
                start_time: timing.start_time,
                budget: LONG_TASK_MS,
            });
        }
    }

    /// Record an application-defined metric. Last write wins.
    pub fn track_custom_metric(&self, name: &str, value: f64) {
        self.report().set(MetricKey::Custom(name.to_string()), value);
        self.emit(MonitorEvent::CustomMetric {
            name: name.to_string(),
            value,
        });
    }

    /// Record how long a component took to render.
    pub fn track_component_render(&self, name: &str, render_time_ms: f64) {
        self.report()
            .set(MetricKey::ComponentRender(name.to_string()), render_time_ms);

        if exceeds(render_time_ms, COMPONENT_RENDER_MS) {
            tracing::warn!(
                target: "perf_monitor::component",
                component = name,
                render_time_ms,
                "slow component render"
            );
            self.emit(MonitorEvent::SlowComponent {
                component: name.to_string(),
                render_time: render_time_ms,
                budget: COMPONENT_RENDER_MS,
            });
        }
    }

    /// Record one API call's duration and status.
    pub fn track_api_call(&self, endpoint: &str, duration_ms: f64, status_code: u16) {
        self.report()
            .set(MetricKey::ApiDuration(endpoint.to_string()), duration_ms);

        if exceeds(duration_ms, SLOW_API_MS) {
            tracing::warn!(
                target: "perf_monitor::api",
                endpoint,
                duration_ms,
                status = status_code,
                "slow API call"
            );
            self.emit(MonitorEvent::SlowApi {
                endpoint: endpoint.to_string(),
                duration: duration_ms,
                status: status_code,
                budget: SLOW_API_MS,
            });
        }

        self.emit(MonitorEvent::ApiCall {
            endpoint: endpoint.to_string(),
            duration: duration_ms,
            status: status_code,
        });
    }

    /// Record an application error and forward it to the error tracker.
    ///
    /// The error is not re-raised.
    pub fn track_error(&self, error: &(dyn Error + 'static), context: Option<Map<String, Value>>) {
        self.track_error_record(ErrorRecord::from_error(error), context);
    }

    /// Record an already-built error record.
    pub fn track_error_record(&self, record: ErrorRecord, context: Option<Map<String, Value>>) {
        let context = context.unwrap_or_default();

        self.report().push_error(record.clone());
        self.error_tracker.capture_exception(&record, &context);
        self.emit(MonitorEvent::Error {
            message: record.message,
            stack: record.stack,
            context,
        });
    }

    /// Start timing a component; the time is recorded when the guard drops.
    pub fn track_component(&self, name: &str) -> ComponentTimer<'_> {
        ComponentTimer::new(self, name)
    }

    /// Snapshot of the current report.
    pub fn get_performance_report(&self) -> PerformanceReport {
        self.report().clone()
    }

    /// Human-readable dump of the current report.
    pub fn export_performance_data(&self) -> String {
        let report = self.get_performance_report();
        match report.to_pretty_json() {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    target: "perf_monitor",
                    error = %err,
                    "failed to render report as JSON"
                );
                format!("{:#?}", report)
            }
        }
    }

    /// Compare the current report against the budget table.
    pub fn check_performance_budgets(&self) -> BudgetReport {
        check_performance_budgets(&self.report(), &self.budgets)
    }

    /// Disconnect the three performance observers. Safe to call repeatedly.
    pub fn cleanup(&self) {
        let disconnected = self.observers.disconnect_all();
        if disconnected > 0 {
            tracing::debug!(
                target: "perf_monitor::observer",
                disconnected,
                "performance observers disconnected"
            );
        }
    }

    /// Number of observers still connected.
    pub fn active_observers(&self) -> usize {
        self.observers.active_count()
    }

    /// Spawn the flush task and, outside test builds, the snapshot task.
    ///
    /// Must be called from within a tokio runtime. Calling it again, or after
    /// shutdown, does nothing.
    pub fn start(&self) -> TelemetryResult<()> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| TelemetryError::NoRuntime)?;

        let mut background = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        if background.is_some() || self.shut_down.load(Ordering::Acquire) {
            return Ok(());
        }

        let token = CancellationToken::new();
        let flush = handle.spawn(run_flush_loop(Arc::clone(&self.dispatcher), token.clone()));
        let snapshot = (self.config.environment != Environment::Test).then(|| {
            handle.spawn(run_snapshot_loop(
                Arc::clone(&self.report),
                self.config.snapshot_interval,
                token.clone(),
            ))
        });

        *background = Some(BackgroundTasks {
            token,
            flush,
            snapshot,
        });

        tracing::debug!(target: "perf_monitor", "background tasks started");
        Ok(())
    }

    /// Deliver queued events now.
    pub async fn flush(&self) -> FlushOutcome {
        self.dispatcher.flush().await
    }

    /// Emit the final summary, disconnect observers, stop background tasks
    /// and flush. Calling it again does nothing.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let summary = match serde_json::to_value(&self.get_performance_report()) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(target: "perf_monitor", error = %err, "failed to serialize summary");
                Value::Null
            }
        };
        self.emit(MonitorEvent::PerformanceSummary(summary));
        self.cleanup();

        let background = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match background {
            Some(tasks) => {
                tasks.token.cancel();
                if let Err(err) = tasks.flush.await {
                    tracing::warn!(
                        target: "perf_monitor",
                        error = %err,
                        "flush task ended abnormally"
                    );
                }
                if let Some(snapshot) = tasks.snapshot {
                    if let Err(err) = snapshot.await {
                        tracing::warn!(
                            target: "perf_monitor",
                            error = %err,
                            "snapshot task ended abnormally"
                        );
                    }
                }
            }
            None => {
                self.dispatcher.flush().await;
            }
        }

        let stats = self.dispatcher.stats();
        let session_age_ms = self.report().context().age().as_millis() as u64;
        tracing::info!(
            target: "perf_monitor",
            session_age_ms,
            delivered = stats.delivered,
            failed = stats.failed,
            dropped = stats.dropped,
            "performance monitor shut down"
        );
    }

    /// Check if shutdown has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Events waiting for delivery.
    pub fn queued_events(&self) -> Vec<AnalyticsEvent> {
        self.dispatcher.queued()
    }

    /// Delivery counters.
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Get the configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Get the budget table.
    pub fn budgets(&self) -> &BudgetTable {
        &self.budgets
    }
}

fn lock_report(report: &Mutex<PerformanceReport>) -> MutexGuard<'_, PerformanceReport> {
    report.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Log a report summary every `period` until cancelled.
async fn run_snapshot_loop(
    report: Arc<Mutex<PerformanceReport>>,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let (summary, names) = {
                    let report = lock_report(&report);
                    let names: Vec<String> =
                        report.metric_entries().map(|entry| entry.name).collect();
                    (report.summary(), names)
                };
                tracing::info!(
                    target: "perf_monitor::snapshot",
                    metrics = summary.metric_count,
                    errors = summary.error_count,
                    resources = summary.resources_observed,
                    names = %names.join(","),
                    "performance report snapshot"
                );
                if tracing::enabled!(target: "perf_monitor::snapshot", tracing::Level::DEBUG) {
                    match lock_report(&report).to_pretty_json() {
                        Ok(json) => {
                            tracing::debug!(target: "perf_monitor::snapshot", report = %json);
                        }
                        Err(err) => {
                            tracing::warn!(
                                target: "perf_monitor::snapshot",
                                error = %err,
                                "failed to render snapshot"
                            );
                        }
                    }
                }
            }
        }
    }
}
