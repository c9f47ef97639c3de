//! Page context captured once per monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Identity of the page load a monitor is observing.
///
/// Captured once at construction and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    /// Unique identifier for this page load
    pub session_id: String,
    /// Browser user agent string
    pub user_agent: String,
    /// Page URL
    pub url: String,
    /// When monitoring started
    pub timestamp: DateTime<Utc>,
}

impl PageContext {
    /// Capture a new page context.
    pub fn new(user_agent: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_agent: user_agent.into(),
            url: url.into(),
            timestamp: Utc::now(),
        }
    }

    /// Time elapsed since the context was captured.
    pub fn age(&self) -> Duration {
        let diff = Utc::now().signed_duration_since(self.timestamp);
        Duration::from_millis(diff.num_milliseconds().max(0) as u64)
    }
}

/// Default user agent for hosts that do not supply one.
pub fn default_user_agent() -> String {
    format!(
        "perf_monitor/{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}
