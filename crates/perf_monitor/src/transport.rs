//! Event delivery: a bounded queue drained by a background flush task.
//!
//! Delivery is best effort. When the queue is full the oldest event is
//! dropped; a failed send is logged and counted, never retried.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{TelemetryError, TelemetryResult};
use crate::event::{AnalyticsEvent, MonitorEvent};
use crate::sink::{AnalyticsHook, AnalyticsSink};

/// Configuration for event delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Maximum queued events before the oldest is dropped
    pub queue_capacity: usize,
    /// Queue length that triggers an early flush
    pub batch_size: usize,
    /// How often the background task flushes
    pub flush_interval: Duration,
    /// Request timeout for the HTTP sink
    pub timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            batch_size: 50,
            flush_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
        }
    }
}

impl DispatchConfig {
    /// Set the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject values the dispatcher cannot run with.
    pub fn validate(&self) -> TelemetryResult<()> {
        if self.queue_capacity == 0 {
            return Err(TelemetryError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(TelemetryError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(TelemetryError::InvalidConfig(
                "flush_interval must be non-zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(TelemetryError::InvalidConfig(
                "timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bounded FIFO of events awaiting delivery.
#[derive(Debug)]
pub struct DeliveryQueue {
    events: VecDeque<AnalyticsEvent>,
    capacity: usize,
    dropped: u64,
}

impl DeliveryQueue {
    /// Create a queue holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Append an event, returning the oldest event if it had to be dropped.
    pub fn push(&mut self, event: AnalyticsEvent) -> Option<AnalyticsEvent> {
        let evicted = if self.events.len() >= self.capacity {
            self.dropped += 1;
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// Remove and return every queued event.
    pub fn take_all(&mut self) -> Vec<AnalyticsEvent> {
        self.events.drain(..).collect()
    }

    /// Get the number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events dropped to make room.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Iterate over queued events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &AnalyticsEvent> {
        self.events.iter()
    }
}

/// Result of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Events accepted by the sink
    pub sent: usize,
    /// Events the sink rejected (and that were discarded)
    pub failed: usize,
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Events waiting in the queue
    pub queued: usize,
    /// Events accepted by the sink
    pub delivered: u64,
    /// Events the sink rejected
    pub failed: u64,
    /// Events dropped because the queue was full
    pub dropped: u64,
}

/// Routes emitted events to the analytics hook and the delivery queue.
pub struct EventDispatcher {
    config: DispatchConfig,
    url: String,
    remote: bool,
    queue: Mutex<DeliveryQueue>,
    sink: Arc<dyn AnalyticsSink>,
    hook: Option<Arc<dyn AnalyticsHook>>,
    wake: Notify,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("config", &self.config)
            .field("url", &self.url)
            .field("remote", &self.remote)
            .field("sink", &self.sink.name())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl EventDispatcher {
    /// Create a dispatcher.
    ///
    /// When `remote` is false, events reach the hook but are never queued
    /// for the sink.
    pub fn new(
        config: DispatchConfig,
        url: impl Into<String>,
        remote: bool,
        sink: Arc<dyn AnalyticsSink>,
        hook: Option<Arc<dyn AnalyticsHook>>,
    ) -> Self {
        let queue = Mutex::new(DeliveryQueue::new(config.queue_capacity));
        Self {
            config,
            url: url.into(),
            remote,
            queue,
            sink,
            hook,
            wake: Notify::new(),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    fn queue(&self) -> MutexGuard<'_, DeliveryQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit an event. Never blocks on delivery.
    pub fn emit(&self, event: &MonitorEvent) {
        let wire = event.to_event(&self.url);

        if let Some(hook) = &self.hook {
            hook.event(&wire.event, &wire.data);
        }

        if !self.remote {
            tracing::trace!(
                target: "perf_monitor::dispatch",
                event = %wire.event,
                "remote delivery disabled, event not queued"
            );
            return;
        }

        let (queued, evicted) = {
            let mut queue = self.queue();
            let evicted = queue.push(wire);
            (queue.len(), evicted)
        };

        if let Some(evicted) = evicted {
            tracing::warn!(
                target: "perf_monitor::dispatch",
                dropped_event = %evicted.event,
                capacity = self.config.queue_capacity,
                "analytics queue full, dropped oldest event"
            );
        }

        if queued >= self.config.batch_size {
            self.wake.notify_one();
        }
    }

    /// Send every queued event once.
    ///
    /// Failed sends are logged and discarded.
    pub async fn flush(&self) -> FlushOutcome {
        let batch = self.queue().take_all();
        let mut outcome = FlushOutcome::default();

        for event in &batch {
            match self.sink.send(event).await {
                Ok(()) => outcome.sent += 1,
                Err(err) => {
                    outcome.failed += 1;
                    tracing::error!(
                        target: "perf_monitor::dispatch",
                        sink = self.sink.name(),
                        event = %event.event,
                        error = %err,
                        "failed to deliver analytics event"
                    );
                }
            }
        }

        self.delivered.fetch_add(outcome.sent as u64, Ordering::Relaxed);
        self.failed.fetch_add(outcome.failed as u64, Ordering::Relaxed);

        if !batch.is_empty() {
            tracing::debug!(
                target: "perf_monitor::dispatch",
                sent = outcome.sent,
                failed = outcome.failed,
                "flushed analytics queue"
            );
        }

        outcome
    }

    /// Copy of the events currently waiting for delivery.
    pub fn queued(&self) -> Vec<AnalyticsEvent> {
        self.queue().iter().cloned().collect()
    }

    /// Current delivery counters.
    pub fn stats(&self) -> DispatchStats {
        let queue = self.queue();
        DispatchStats {
            queued: queue.len(),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: queue.dropped(),
        }
    }

    /// Whether events are queued for the sink.
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Get the dispatch configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}

/// Flush on every interval tick and whenever a full batch is waiting, until
/// cancelled. A final flush runs on cancellation.
pub async fn run_flush_loop(dispatcher: Arc<EventDispatcher>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(dispatcher.config.flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                dispatcher.flush().await;
                break;
            }
            _ = ticker.tick() => {
                dispatcher.flush().await;
            }
            _ = dispatcher.wake.notified() => {
                dispatcher.flush().await;
            }
        }
    }

    tracing::debug!(target: "perf_monitor::dispatch", "flush loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde_json::{json, Value};

    fn make_event(name: &str) -> AnalyticsEvent {
        AnalyticsEvent::new(name, json!({}), "/")
    }

    fn custom(name: &str) -> MonitorEvent {
        MonitorEvent::CustomMetric {
            name: name.to_string(),
            value: 1.0,
        }
    }

    fn make_dispatcher(config: DispatchConfig, sink: Arc<MemorySink>) -> EventDispatcher {
        EventDispatcher::new(config, "https://shop.example.com/", true, sink, None)
    }

    #[test]
    fn test_dispatch_config_default() {
        let config = DispatchConfig::default();
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dispatch_config_validate() {
        let zero_capacity = DispatchConfig::default().with_queue_capacity(0);
        assert!(matches!(
            zero_capacity.validate(),
            Err(TelemetryError::InvalidConfig(_))
        ));

        let zero_batch = DispatchConfig::default().with_batch_size(0);
        assert!(zero_batch.validate().is_err());

        let zero_interval = DispatchConfig::default().with_flush_interval(Duration::ZERO);
        assert!(zero_interval.validate().is_err());

        let zero_timeout = DispatchConfig::default().with_timeout(Duration::ZERO);
        assert!(matches!(
            zero_timeout.validate(),
            Err(TelemetryError::InvalidConfig(msg)) if msg.contains("timeout")
        ));
    }

    #[test]
    fn test_queue_drops_oldest() {
        let mut queue = DeliveryQueue::new(2);
        assert!(queue.push(make_event("a")).is_none());
        assert!(queue.push(make_event("b")).is_none());

        let evicted = queue.push(make_event("c")).unwrap();
        assert_eq!(evicted.event, "a");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);

        let names: Vec<_> = queue.iter().map(|e| e.event.clone()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_queue_take_all() {
        let mut queue = DeliveryQueue::new(10);
        queue.push(make_event("a"));
        queue.push(make_event("b"));

        let taken = queue.take_all();
        assert_eq!(taken.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_emit_queues_event() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = make_dispatcher(DispatchConfig::default(), sink);

        dispatcher.emit(&custom("cart_size"));

        let queued = dispatcher.queued();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].event, "custom_metric");
        assert_eq!(queued[0].url, "https://shop.example.com/");
    }

    #[test]
    fn test_emit_without_remote_skips_queue() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher =
            EventDispatcher::new(DispatchConfig::default(), "/", false, sink, None);

        dispatcher.emit(&custom("x"));
        assert!(dispatcher.queued().is_empty());
        assert!(!dispatcher.is_remote());
    }

    #[test]
    fn test_emit_calls_hook() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let hook: Arc<dyn AnalyticsHook> = Arc::new(move |name: &str, data: &Value| {
            captured
                .lock()
                .unwrap()
                .push((name.to_string(), data["name"].clone()));
        });

        let dispatcher = EventDispatcher::new(
            DispatchConfig::default(),
            "/",
            false,
            Arc::new(MemorySink::new()),
            Some(hook),
        );
        dispatcher.emit(&custom("cart_size"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "custom_metric");
        assert_eq!(seen[0].1, json!("cart_size"));
    }

    #[test]
    fn test_emit_overflow_counts_drops() {
        let sink = Arc::new(MemorySink::new());
        let config = DispatchConfig::default().with_queue_capacity(3);
        let dispatcher = make_dispatcher(config, sink);

        for i in 0..5 {
            dispatcher.emit(&custom(&format!("m{i}")));
        }

        let stats = dispatcher.stats();
        assert_eq!(stats.queued, 3);
        assert_eq!(stats.dropped, 2);

        let names: Vec<_> = dispatcher
            .queued()
            .iter()
            .map(|e| e.string("name").unwrap_or_default().to_string())
            .collect();
        assert_eq!(names, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_flush_delivers_and_clears() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = make_dispatcher(DispatchConfig::default(), Arc::clone(&sink));

        dispatcher.emit(&custom("a"));
        dispatcher.emit(&custom("b"));

        let outcome = dispatcher.flush().await;
        assert_eq!(outcome, FlushOutcome { sent: 2, failed: 0 });
        assert!(dispatcher.queued().is_empty());
        assert_eq!(sink.events().len(), 2);
        assert_eq!(dispatcher.stats().delivered, 2);
    }

    #[tokio::test]
    async fn test_flush_failure_is_not_retried() {
        let sink = Arc::new(MemorySink::failing());
        let dispatcher = make_dispatcher(DispatchConfig::default(), Arc::clone(&sink));

        dispatcher.emit(&custom("a"));
        let outcome = dispatcher.flush().await;
        assert_eq!(outcome, FlushOutcome { sent: 0, failed: 1 });

        // The failed event is gone; a later flush has nothing to resend.
        sink.set_failing(false);
        let outcome = dispatcher.flush().await;
        assert_eq!(outcome, FlushOutcome::default());
        assert!(sink.events().is_empty());
        assert_eq!(dispatcher.stats().failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_loop_interval() {
        let sink = Arc::new(MemorySink::new());
        let config = DispatchConfig::default().with_flush_interval(Duration::from_secs(5));
        let dispatcher = Arc::new(make_dispatcher(config, Arc::clone(&sink)));
        let token = CancellationToken::new();

        let handle = tokio::spawn(run_flush_loop(Arc::clone(&dispatcher), token.clone()));

        dispatcher.emit(&custom("a"));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(sink.events().len(), 1);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_loop_batch_trigger() {
        let sink = Arc::new(MemorySink::new());
        let config = DispatchConfig::default()
            .with_batch_size(3)
            .with_flush_interval(Duration::from_secs(3600));
        let dispatcher = Arc::new(make_dispatcher(config, Arc::clone(&sink)));
        let token = CancellationToken::new();

        let handle = tokio::spawn(run_flush_loop(Arc::clone(&dispatcher), token.clone()));
        // Let the loop consume its immediate first tick.
        tokio::time::sleep(Duration::from_millis(10)).await;

        for i in 0..3 {
            dispatcher.emit(&custom(&format!("m{i}")));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.events().len(), 3);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_loop_final_flush_on_cancel() {
        let sink = Arc::new(MemorySink::new());
        let config = DispatchConfig::default().with_flush_interval(Duration::from_secs(3600));
        let dispatcher = Arc::new(make_dispatcher(config, Arc::clone(&sink)));
        let token = CancellationToken::new();

        let handle = tokio::spawn(run_flush_loop(Arc::clone(&dispatcher), token.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;

        dispatcher.emit(&custom("late"));
        token.cancel();
        handle.await.unwrap();

        assert_eq!(sink.events_named("custom_metric").len(), 1);
    }
}
