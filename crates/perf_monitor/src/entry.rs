//! Performance signals fed into the monitor.
//!
//! Entries deserialize from the JSON shape produced by the browser's
//! `PerformanceEntry.toJSON()`, tagged by `entryType`. Every timestamp is
//! optional: a missing or non-finite field makes the intervals that depend
//! on it absent rather than wrong.

use serde::{Deserialize, Serialize};

use crate::key::{NavigationPhase, ResourceKind, VitalName};

/// One entry delivered by a performance observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entryType", rename_all = "lowercase")]
pub enum PerformanceEntry {
    /// The page's navigation timing entry
    Navigation(NavigationTiming),
    /// One fetched resource
    Resource(ResourceTiming),
    /// One main-thread long task
    LongTask(LongTaskTiming),
}

/// Which observer an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// `navigation`
    Navigation,
    /// `resource`
    Resource,
    /// `longtask`
    LongTask,
}

impl EntryType {
    /// All observed entry types.
    pub const ALL: [EntryType; 3] = [
        EntryType::Navigation,
        EntryType::Resource,
        EntryType::LongTask,
    ];

    /// Get the browser's name for this entry type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Navigation => "navigation",
            EntryType::Resource => "resource",
            EntryType::LongTask => "longtask",
        }
    }
}

impl PerformanceEntry {
    /// Get the entry type.
    pub fn entry_type(&self) -> EntryType {
        match self {
            PerformanceEntry::Navigation(_) => EntryType::Navigation,
            PerformanceEntry::Resource(_) => EntryType::Resource,
            PerformanceEntry::LongTask(_) => EntryType::LongTask,
        }
    }
}

/// Navigation timing fields, in milliseconds relative to time origin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationTiming {
    pub start_time: Option<f64>,
    pub domain_lookup_start: Option<f64>,
    pub domain_lookup_end: Option<f64>,
    pub connect_start: Option<f64>,
    pub connect_end: Option<f64>,
    pub secure_connection_start: Option<f64>,
    pub request_start: Option<f64>,
    pub response_start: Option<f64>,
    pub response_end: Option<f64>,
    pub dom_interactive: Option<f64>,
    pub dom_complete: Option<f64>,
    pub load_event_start: Option<f64>,
    pub load_event_end: Option<f64>,
}

impl NavigationTiming {
    /// Compute every derivable interval.
    ///
    /// TLS negotiation is only reported when a secure connection was made
    /// (`secureConnectionStart > 0`).
    pub fn intervals(&self) -> Vec<(NavigationPhase, f64)> {
        let tls_start = self.secure_connection_start.filter(|start| *start > 0.0);

        [
            (
                NavigationPhase::DnsLookup,
                interval(self.domain_lookup_start, self.domain_lookup_end),
            ),
            (
                NavigationPhase::TcpConnect,
                interval(self.connect_start, self.connect_end),
            ),
            (NavigationPhase::TlsNegotiation, interval(tls_start, self.connect_end)),
            (
                NavigationPhase::RequestResponse,
                interval(self.request_start, self.response_end),
            ),
            (
                NavigationPhase::DomProcessing,
                interval(self.dom_interactive, self.dom_complete),
            ),
            (
                NavigationPhase::LoadComplete,
                interval(self.load_event_start, self.load_event_end),
            ),
            (
                NavigationPhase::TotalLoadTime,
                interval(self.start_time.or(Some(0.0)), self.load_event_end),
            ),
        ]
        .into_iter()
        .filter_map(|(phase, value)| value.map(|v| (phase, v)))
        .collect()
    }
}

/// Resource timing for one fetched asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceTiming {
    /// Resource URL
    pub name: String,
    pub start_time: Option<f64>,
    pub response_end: Option<f64>,
    /// Browser-reported duration, used when `responseEnd` is missing
    pub duration: Option<f64>,
    pub initiator_type: Option<String>,
    pub transfer_size: Option<f64>,
}

impl ResourceTiming {
    /// Create a resource entry from a URL and its start/end times.
    pub fn new(name: impl Into<String>, start_time: f64, response_end: f64) -> Self {
        Self {
            name: name.into(),
            start_time: Some(start_time),
            response_end: Some(response_end),
            ..Default::default()
        }
    }

    /// Load duration: `responseEnd - startTime`, falling back to `duration`.
    pub fn load_time(&self) -> Option<f64> {
        interval(self.start_time, self.response_end).or_else(|| finite(self.duration))
    }

    /// Classify this resource by URL.
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::classify(&self.name)
    }
}

/// A long task reported by the main thread.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LongTaskTiming {
    pub name: Option<String>,
    pub start_time: Option<f64>,
    pub duration: Option<f64>,
}

impl LongTaskTiming {
    /// Create a long task entry.
    pub fn new(start_time: f64, duration: f64) -> Self {
        Self {
            name: Some("self".to_string()),
            start_time: Some(start_time),
            duration: Some(duration),
        }
    }
}

/// A single web-vitals callback invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebVital {
    pub name: VitalName,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl WebVital {
    /// Create a vital sample.
    pub fn new(name: VitalName, value: f64) -> Self {
        Self { name, value, id: None }
    }
}

/// Keep a value only if it is finite.
pub(crate) fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// `end - start`, or `None` if either side is missing or non-finite, or the
/// end event has not happened yet. Browsers report `0` for an end
/// timestamp that has not been reached.
fn interval(start: Option<f64>, end: Option<f64>) -> Option<f64> {
    let (start, end) = (finite(start)?, finite(end)?);
    (end > 0.0 && end >= start).then_some(end - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_navigation() -> NavigationTiming {
        NavigationTiming {
            start_time: Some(0.0),
            domain_lookup_start: Some(5.0),
            domain_lookup_end: Some(25.0),
            connect_start: Some(25.0),
            connect_end: Some(85.0),
            secure_connection_start: Some(45.0),
            request_start: Some(90.0),
            response_start: Some(200.0),
            response_end: Some(260.0),
            dom_interactive: Some(600.0),
            dom_complete: Some(1100.0),
            load_event_start: Some(1100.0),
            load_event_end: Some(1130.0),
        }
    }

    #[test]
    fn test_navigation_intervals() {
        let intervals = full_navigation().intervals();
        assert_eq!(intervals.len(), 7);
        assert!(intervals.contains(&(NavigationPhase::DnsLookup, 20.0)));
        assert!(intervals.contains(&(NavigationPhase::TcpConnect, 60.0)));
        assert!(intervals.contains(&(NavigationPhase::TlsNegotiation, 40.0)));
        assert!(intervals.contains(&(NavigationPhase::RequestResponse, 170.0)));
        assert!(intervals.contains(&(NavigationPhase::DomProcessing, 500.0)));
        assert!(intervals.contains(&(NavigationPhase::LoadComplete, 30.0)));
        assert!(intervals.contains(&(NavigationPhase::TotalLoadTime, 1130.0)));
    }

    #[test]
    fn test_navigation_without_tls() {
        let mut timing = full_navigation();
        timing.secure_connection_start = Some(0.0);

        let intervals = timing.intervals();
        assert_eq!(intervals.len(), 6);
        assert!(!intervals.iter().any(|(p, _)| *p == NavigationPhase::TlsNegotiation));
    }

    #[test]
    fn test_navigation_missing_fields() {
        let timing = NavigationTiming {
            domain_lookup_start: Some(1.0),
            domain_lookup_end: Some(f64::NAN),
            connect_start: Some(3.0),
            connect_end: Some(9.0),
            ..Default::default()
        };

        let intervals = timing.intervals();
        assert_eq!(intervals, vec![(NavigationPhase::TcpConnect, 6.0)]);
    }

    #[test]
    fn test_navigation_load_not_finished() {
        let mut timing = full_navigation();
        timing.load_event_start = Some(1100.0);
        timing.load_event_end = Some(0.0);

        let intervals = timing.intervals();
        assert!(!intervals.iter().any(|(p, _)| *p == NavigationPhase::LoadComplete));
        assert!(!intervals.iter().any(|(p, _)| *p == NavigationPhase::TotalLoadTime));
    }

    #[test]
    fn test_navigation_in_progress_records_nothing() {
        let timing = NavigationTiming {
            start_time: Some(0.0),
            load_event_start: Some(0.0),
            load_event_end: Some(0.0),
            dom_interactive: Some(0.0),
            dom_complete: Some(0.0),
            ..Default::default()
        };
        assert!(timing.intervals().is_empty());
    }

    #[test]
    fn test_zero_length_interval_is_kept() {
        let timing = NavigationTiming {
            domain_lookup_start: Some(12.0),
            domain_lookup_end: Some(12.0),
            ..Default::default()
        };
        assert_eq!(timing.intervals(), vec![(NavigationPhase::DnsLookup, 0.0)]);
    }

    #[test]
    fn test_resource_load_time() {
        let entry = ResourceTiming::new("/app.js", 100.0, 350.0);
        assert_eq!(entry.load_time(), Some(250.0));
        assert_eq!(entry.kind(), ResourceKind::Script);

        let fallback = ResourceTiming {
            name: "/font.woff2".into(),
            duration: Some(42.0),
            ..Default::default()
        };
        assert_eq!(fallback.load_time(), Some(42.0));

        let missing = ResourceTiming {
            name: "/x".into(),
            ..Default::default()
        };
        assert_eq!(missing.load_time(), None);
    }

    #[test]
    fn test_entry_deserialization_from_browser_json() {
        let json = r#"[
            {"entryType": "navigation", "name": "https://shop.example.com/",
             "startTime": 0, "domainLookupStart": 2, "domainLookupEnd": 12,
             "connectStart": 12, "connectEnd": 40, "secureConnectionStart": 20,
             "requestStart": 41, "responseEnd": 120, "domInteractive": 300,
             "domComplete": 700, "loadEventStart": 700, "loadEventEnd": 710},
            {"entryType": "resource", "name": "https://shop.example.com/main.css",
             "startTime": 50, "responseEnd": 90, "initiatorType": "link"},
            {"entryType": "longtask", "name": "self", "startTime": 400, "duration": 75}
        ]"#;

        let entries: Vec<PerformanceEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].entry_type(), EntryType::Navigation);
        assert_eq!(entries[2].entry_type(), EntryType::LongTask);

        match &entries[1] {
            PerformanceEntry::Resource(resource) => {
                assert_eq!(resource.kind(), ResourceKind::Stylesheet);
                assert_eq!(resource.load_time(), Some(40.0));
                assert_eq!(resource.initiator_type.as_deref(), Some("link"));
            }
            other => panic!("expected resource entry, got {other:?}"),
        }
    }

    #[test]
    fn test_web_vital_deserialization() {
        let vital: WebVital = serde_json::from_str(r#"{"name": "LCP", "value": 2100.5}"#).unwrap();
        assert_eq!(vital, WebVital::new(VitalName::Lcp, 2100.5));
    }

    #[test]
    fn test_entry_type_names() {
        let names: Vec<_> = EntryType::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(names, vec!["navigation", "resource", "longtask"]);
    }
}
