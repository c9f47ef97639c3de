//! Recorded performance signals and their replay through a monitor.

use anyhow::Context;
use perf_monitor::{PerformanceEntry, PerformanceMonitor, WebVital};
use serde::Deserialize;
use std::path::Path;

/// One API call captured in a recording.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCallSample {
    pub endpoint: String,
    pub duration: f64,
    #[serde(default = "default_status")]
    pub status: u16,
}

fn default_status() -> u16 {
    200
}

/// One component render captured in a recording.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSample {
    pub name: String,
    pub render_time: f64,
}

/// One application-defined metric captured in a recording.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomMetricSample {
    pub name: String,
    pub value: f64,
}

/// Everything captured from one page load. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recording {
    pub vitals: Vec<WebVital>,
    pub entries: Vec<PerformanceEntry>,
    pub api_calls: Vec<ApiCallSample>,
    pub components: Vec<ComponentSample>,
    pub custom_metrics: Vec<CustomMetricSample>,
}

impl Recording {
    /// Parse a recording from JSON text.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("recording is not valid JSON")
    }

    /// Read and parse a recording file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.vitals.len()
            + self.entries.len()
            + self.api_calls.len()
            + self.components.len()
            + self.custom_metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feed every sample into the monitor: entries first, then vitals,
    /// API calls, component renders and custom metrics.
    pub fn replay(&self, monitor: &PerformanceMonitor) {
        for entry in &self.entries {
            monitor.observe(entry);
        }
        for vital in &self.vitals {
            monitor.record_vital(vital.clone());
        }
        for call in &self.api_calls {
            monitor.track_api_call(&call.endpoint, call.duration, call.status);
        }
        for component in &self.components {
            monitor.track_component_render(&component.name, component.render_time);
        }
        for metric in &self.custom_metrics {
            monitor.track_custom_metric(&metric.name, metric.value);
        }

        tracing::debug!(samples = self.len(), "recording replayed");
    }
}
