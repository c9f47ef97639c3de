//! Typed metric keys.
//!
//! Each metric in a [`PerformanceReport`](crate::PerformanceReport) is
//! identified by a [`MetricKey`] rather than a hand-built string. The
//! `Display` implementation renders the flat names used in budget tables
//! and logs (`LCP`, `resource_script_avg_load_time`,
//! `api__orders_duration`, ...). Flat names are not unique: a custom
//! metric may be called `LCP`, and endpoint sanitization is lossy. Exports
//! therefore carry the key's category and subject next to its name.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Core Web Vitals reported by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VitalName {
    /// Cumulative layout shift (unitless)
    Cls,
    /// First input delay
    Fid,
    /// First contentful paint
    Fcp,
    /// Largest contentful paint
    Lcp,
    /// Time to first byte
    Ttfb,
}

impl VitalName {
    /// All vitals, in subscription order.
    pub const ALL: [VitalName; 5] = [
        VitalName::Cls,
        VitalName::Fid,
        VitalName::Fcp,
        VitalName::Lcp,
        VitalName::Ttfb,
    ];

    /// Get the metric name.
    pub fn as_str(&self) -> &'static str {
        match self {
            VitalName::Cls => "CLS",
            VitalName::Fid => "FID",
            VitalName::Fcp => "FCP",
            VitalName::Lcp => "LCP",
            VitalName::Ttfb => "TTFB",
        }
    }

    /// Look up a vital by its metric name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|vital| vital.as_str() == name)
    }
}

/// Intervals derived from the navigation timing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NavigationPhase {
    /// domainLookupEnd - domainLookupStart
    DnsLookup,
    /// connectEnd - connectStart
    TcpConnect,
    /// connectEnd - secureConnectionStart
    TlsNegotiation,
    /// responseEnd - requestStart
    RequestResponse,
    /// domComplete - domInteractive
    DomProcessing,
    /// loadEventEnd - loadEventStart
    LoadComplete,
    /// loadEventEnd - startTime
    TotalLoadTime,
}

impl NavigationPhase {
    /// All phases, in the order they occur during a page load.
    pub const ALL: [NavigationPhase; 7] = [
        NavigationPhase::DnsLookup,
        NavigationPhase::TcpConnect,
        NavigationPhase::TlsNegotiation,
        NavigationPhase::RequestResponse,
        NavigationPhase::DomProcessing,
        NavigationPhase::LoadComplete,
        NavigationPhase::TotalLoadTime,
    ];

    /// Get the metric name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationPhase::DnsLookup => "dns_lookup",
            NavigationPhase::TcpConnect => "tcp_connect",
            NavigationPhase::TlsNegotiation => "tls_negotiation",
            NavigationPhase::RequestResponse => "request_response",
            NavigationPhase::DomProcessing => "dom_processing",
            NavigationPhase::LoadComplete => "load_complete",
            NavigationPhase::TotalLoadTime => "total_load_time",
        }
    }

    /// Look up a phase by its metric name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.as_str() == name)
    }
}

/// Classification of a loaded resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// JavaScript bundles
    Script,
    /// CSS
    Stylesheet,
    /// Images
    Image,
    /// Backend API requests
    Api,
    /// Anything else (fonts, documents, ...)
    Other,
}

impl ResourceKind {
    /// All kinds.
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Script,
        ResourceKind::Stylesheet,
        ResourceKind::Image,
        ResourceKind::Api,
        ResourceKind::Other,
    ];

    /// Look up a kind by its lowercase name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Get the lowercase name used in metric keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Script => "script",
            ResourceKind::Stylesheet => "stylesheet",
            ResourceKind::Image => "image",
            ResourceKind::Api => "api",
            ResourceKind::Other => "other",
        }
    }

    /// Classify a resource by its URL.
    ///
    /// Extension checks run before the `/api/` check, so an image served
    /// from under `/api/` is still an image.
    pub fn classify(url: &str) -> Self {
        let patterns = patterns();
        if matches(&patterns.script, url) {
            ResourceKind::Script
        } else if matches(&patterns.stylesheet, url) {
            ResourceKind::Stylesheet
        } else if matches(&patterns.image, url) {
            ResourceKind::Image
        } else if url.contains("/api/") {
            ResourceKind::Api
        } else {
            ResourceKind::Other
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ResourcePatterns {
    script: Option<Regex>,
    stylesheet: Option<Regex>,
    image: Option<Regex>,
}

fn patterns() -> &'static ResourcePatterns {
    static PATTERNS: OnceLock<ResourcePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ResourcePatterns {
        script: Regex::new(r"\.js$").ok(),
        stylesheet: Regex::new(r"\.css$").ok(),
        image: Regex::new(r"(?i)\.(png|jpe?g|gif|svg|webp|avif|ico)$").ok(),
    })
}

fn matches(pattern: &Option<Regex>, url: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(url))
}

/// Replace every character that is not an ASCII letter or digit with `_`.
pub fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Identifies one metric in the report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKey {
    /// A Core Web Vital, latest value
    Vital(VitalName),
    /// A navigation timing interval
    Navigation(NavigationPhase),
    /// Running average load time for a resource kind
    ResourceAverage(ResourceKind),
    /// Number of resources of a kind observed
    ResourceCount(ResourceKind),
    /// Latest long task duration
    LongTask,
    /// Latest render time of a named component
    ComponentRender(String),
    /// Latest duration of an API endpoint, keyed by the raw endpoint
    ApiDuration(String),
    /// Application-defined metric
    Custom(String),
}

/// Family a metric key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Vital,
    Navigation,
    ResourceAverage,
    ResourceCount,
    LongTask,
    Component,
    Api,
    Custom,
}

impl MetricKey {
    /// Resolve a flat metric name to the key it names.
    ///
    /// Built-in names win over custom metrics of the same name, so `"LCP"`
    /// always means the vital. API durations cannot be recovered from their
    /// sanitized name and resolve to a custom key.
    pub fn from_name(name: &str) -> Self {
        if let Some(vital) = VitalName::from_name(name) {
            return MetricKey::Vital(vital);
        }
        if let Some(phase) = NavigationPhase::from_name(name) {
            return MetricKey::Navigation(phase);
        }
        if name == "long_task_duration" {
            return MetricKey::LongTask;
        }
        if let Some(rest) = name.strip_prefix("resource_") {
            if let Some(kind) = rest
                .strip_suffix("_avg_load_time")
                .and_then(ResourceKind::from_name)
            {
                return MetricKey::ResourceAverage(kind);
            }
            if let Some(kind) = rest.strip_suffix("_count").and_then(ResourceKind::from_name) {
                return MetricKey::ResourceCount(kind);
            }
        }
        if let Some(component) = name
            .strip_prefix("component_")
            .and_then(|rest| rest.strip_suffix("_render_time"))
            .filter(|component| !component.is_empty())
        {
            return MetricKey::ComponentRender(component.to_string());
        }
        MetricKey::Custom(name.to_string())
    }

    /// Get the key's family.
    pub fn category(&self) -> MetricCategory {
        match self {
            MetricKey::Vital(_) => MetricCategory::Vital,
            MetricKey::Navigation(_) => MetricCategory::Navigation,
            MetricKey::ResourceAverage(_) => MetricCategory::ResourceAverage,
            MetricKey::ResourceCount(_) => MetricCategory::ResourceCount,
            MetricKey::LongTask => MetricCategory::LongTask,
            MetricKey::ComponentRender(_) => MetricCategory::Component,
            MetricKey::ApiDuration(_) => MetricCategory::Api,
            MetricKey::Custom(_) => MetricCategory::Custom,
        }
    }

    /// What the key is about within its family: the vital, phase, resource
    /// kind, component, raw endpoint or custom name.
    pub fn subject(&self) -> Option<&str> {
        match self {
            MetricKey::Vital(vital) => Some(vital.as_str()),
            MetricKey::Navigation(phase) => Some(phase.as_str()),
            MetricKey::ResourceAverage(kind) | MetricKey::ResourceCount(kind) => {
                Some(kind.as_str())
            }
            MetricKey::LongTask => None,
            MetricKey::ComponentRender(name)
            | MetricKey::ApiDuration(name)
            | MetricKey::Custom(name) => Some(name.as_str()),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKey::Vital(vital) => f.write_str(vital.as_str()),
            MetricKey::Navigation(phase) => f.write_str(phase.as_str()),
            MetricKey::ResourceAverage(kind) => write!(f, "resource_{}_avg_load_time", kind),
            MetricKey::ResourceCount(kind) => write!(f, "resource_{}_count", kind),
            MetricKey::LongTask => f.write_str("long_task_duration"),
            MetricKey::ComponentRender(name) => write!(f, "component_{}_render_time", name),
            MetricKey::ApiDuration(endpoint) => {
                write!(f, "api_{}_duration", sanitize_key(endpoint))
            }
            MetricKey::Custom(name) => f.write_str(name),
        }
    }
}

impl From<VitalName> for MetricKey {
    fn from(vital: VitalName) -> Self {
        MetricKey::Vital(vital)
    }
}

impl From<NavigationPhase> for MetricKey {
    fn from(phase: NavigationPhase) -> Self {
        MetricKey::Navigation(phase)
    }
}
