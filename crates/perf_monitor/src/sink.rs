//! Outbound collaborators: the analytics sink, the optional analytics hook,
//! and the error tracker.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::{TelemetryError, TelemetryResult};
use crate::event::AnalyticsEvent;
use crate::report::ErrorRecord;

/// Destination for queued analytics events.
///
/// Implementations deliver one event per call. The dispatcher never retries
/// a failed send.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Deliver one event
    async fn send(&self, event: &AnalyticsEvent) -> TelemetryResult<()>;

    /// Get sink name for logging
    fn name(&self) -> &str;
}

/// Posts events as JSON to `{endpoint}/api/analytics/performance`.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    /// Path appended to the configured endpoint.
    pub const PATH: &'static str = "/api/analytics/performance";

    /// Create a sink for the given base endpoint.
    pub fn new(endpoint: &str, timeout: Duration) -> TelemetryResult<Self> {
        if endpoint.is_empty() {
            return Err(TelemetryError::InvalidConfig(
                "analytics endpoint must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: format!("{}{}", endpoint.trim_end_matches('/'), Self::PATH),
        })
    }

    /// Full URL events are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AnalyticsSink for HttpSink {
    async fn send(&self, event: &AnalyticsEvent) -> TelemetryResult<()> {
        let response = self.client.post(&self.url).json(event).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Transport(format!(
                "analytics endpoint returned {}",
                status
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Discards every event. Used outside production.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl AnalyticsSink for NullSink {
    async fn send(&self, _event: &AnalyticsEvent) -> TelemetryResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Keeps delivered events in memory.
///
/// Useful for tests and for hosts that forward events themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AnalyticsEvent>>,
    failing: AtomicBool,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that rejects every send.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    /// Toggle rejection of sends.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Events delivered so far.
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events delivered so far with the given name.
    pub fn events_named(&self, name: &str) -> Vec<AnalyticsEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.event == name)
            .collect()
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn send(&self, event: &AnalyticsEvent) -> TelemetryResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TelemetryError::Transport("memory sink rejected event".to_string()));
        }

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Synchronous analytics hook (gtag-shaped), called for every event as it
/// is emitted.
pub trait AnalyticsHook: Send + Sync {
    /// Receive an event name and its data
    fn event(&self, name: &str, data: &Value);
}

impl<F> AnalyticsHook for F
where
    F: Fn(&str, &Value) + Send + Sync,
{
    fn event(&self, name: &str, data: &Value) {
        self(name, data)
    }
}

/// Error-tracking service (Sentry-shaped).
pub trait ErrorTracker: Send + Sync {
    /// Report an exception with caller-supplied context
    fn capture_exception(&self, error: &ErrorRecord, extra: &Map<String, Value>);
}

/// Logs captured exceptions through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorTracker;

impl ErrorTracker for TracingErrorTracker {
    fn capture_exception(&self, error: &ErrorRecord, extra: &Map<String, Value>) {
        let extra = Value::Object(extra.clone());
        tracing::error!(
            target: "perf_monitor::error",
            message = %error.message,
            stack = error.stack.as_deref().unwrap_or(""),
            extra = %extra,
            "exception captured"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn make_event(name: &str) -> AnalyticsEvent {
        AnalyticsEvent::new(name, json!({}), "/")
    }

    #[test]
    fn test_http_sink_url() {
        let sink = HttpSink::new("https://shop.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(sink.url(), "https://shop.example.com/api/analytics/performance");
        assert_eq!(sink.name(), "http");
    }

    #[test]
    fn test_http_sink_rejects_empty_endpoint() {
        let result = HttpSink::new("", Duration::from_secs(5));
        assert!(matches!(result, Err(TelemetryError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_null_sink() {
        assert!(NullSink.send(&make_event("x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = MemorySink::new();
        sink.send(&make_event("a")).await.unwrap();
        sink.send(&make_event("b")).await.unwrap();
        sink.send(&make_event("a")).await.unwrap();

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.events_named("a").len(), 2);
    }

    #[tokio::test]
    async fn test_memory_sink_failing() {
        let sink = MemorySink::failing();
        let result = sink.send(&make_event("a")).await;
        assert!(matches!(result, Err(TelemetryError::Transport(_))));
        assert!(sink.events().is_empty());

        sink.set_failing(false);
        assert!(sink.send(&make_event("a")).await.is_ok());
    }

    #[test]
    fn test_closure_hook() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let hook = move |name: &str, _data: &Value| {
            captured.lock().unwrap().push(name.to_string());
        };

        hook.event("slow_api", &json!({}));
        assert_eq!(*seen.lock().unwrap(), vec!["slow_api".to_string()]);
    }

    #[test]
    fn test_tracing_error_tracker_does_not_panic() {
        let record = ErrorRecord::new("boom", None);
        TracingErrorTracker.capture_exception(&record, &Map::new());
    }

    #[test]
    fn test_tracing_error_tracker_with_context() {
        let record = ErrorRecord::new("quote failed", Some("caused by: timeout".into()));
        let mut extra = Map::new();
        extra.insert("page".into(), json!("quotes"));
        extra.insert("attempt".into(), json!(2));
        TracingErrorTracker.capture_exception(&record, &extra);
    }
}
