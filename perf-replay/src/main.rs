//! Replays a recorded page load through the performance monitor and prints
//! the resulting report and budget verdict.

mod recording;

use anyhow::Context;
use clap::Parser;
use perf_monitor::{BudgetReport, Environment, MonitorConfig, PerformanceMonitor, PerformanceReport};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recording::Recording;

#[derive(Parser, Debug)]
#[command(name = "perf-replay")]
#[command(version, about = "Replay recorded performance entries and check budgets")]
struct Args {
    /// JSON recording with optional `vitals`, `entries`, `apiCalls`,
    /// `components` and `customMetrics` arrays
    input: PathBuf,

    /// Page URL recorded in the report
    #[arg(long, default_value = "/")]
    url: String,

    /// Analytics backend to post events to (production only)
    #[arg(long)]
    endpoint: Option<String>,

    /// Run as a production build: events are delivered to the endpoint
    #[arg(long, requires = "endpoint")]
    production: bool,

    /// Print a one-line summary instead of the full report
    #[arg(long)]
    summary: bool,

    /// Exit with an error when any budget is exceeded
    #[arg(long)]
    fail_on_violation: bool,
}

impl Args {
    fn monitor_config(&self) -> MonitorConfig {
        let environment = if self.production {
            Environment::Production
        } else {
            Environment::Development
        };

        let config = MonitorConfig::new(&self.url).with_environment(environment);
        match &self.endpoint {
            Some(endpoint) => config.with_endpoint(endpoint),
            None => config,
        }
    }
}

fn summary_line(report: &PerformanceReport) -> String {
    let summary = report.summary();
    format!(
        "{}: {} metrics, {} errors, {} resources",
        report.url(),
        summary.metric_count,
        summary.error_count,
        summary.resources_observed
    )
}

fn print_verdict(budgets: &BudgetReport) {
    if budgets.within_budget() {
        println!("budgets: ok ({} checked)", budgets.checked);
    } else {
        println!("{}", budgets);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the report on stdout stays parseable
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let recording = Recording::load(&args.input)?;
    tracing::info!(
        input = %args.input.display(),
        samples = recording.len(),
        "replaying recording"
    );
    if recording.is_empty() {
        tracing::warn!("recording contains no samples");
    }

    let monitor = PerformanceMonitor::new(args.monitor_config())
        .context("failed to create performance monitor")?;
    monitor.start()?;

    recording.replay(&monitor);

    let budgets = monitor.check_performance_budgets();
    if args.summary {
        println!("{}", summary_line(&monitor.get_performance_report()));
    } else {
        println!("{}", monitor.export_performance_data());
    }
    print_verdict(&budgets);

    monitor.shutdown().await;

    let stats = monitor.dispatch_stats();
    if stats.failed > 0 || stats.dropped > 0 {
        tracing::warn!(
            failed = stats.failed,
            dropped = stats.dropped,
            "some events were not delivered"
        );
    }

    if args.fail_on_violation && !budgets.within_budget() {
        anyhow::bail!("{} performance budget(s) exceeded", budgets.violations.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["perf-replay", "load.json", "--summary"]).unwrap();
        assert_eq!(args.input, PathBuf::from("load.json"));
        assert!(args.summary);
        assert!(!args.production);
        assert_eq!(args.monitor_config().environment, Environment::Development);
    }

    #[test]
    fn test_production_requires_endpoint() {
        assert!(Args::try_parse_from(["perf-replay", "load.json", "--production"]).is_err());

        let args = Args::try_parse_from([
            "perf-replay",
            "load.json",
            "--production",
            "--endpoint",
            "https://analytics.example.com",
        ])
        .unwrap();
        let config = args.monitor_config();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.endpoint, "https://analytics.example.com");
    }

    #[test]
    fn test_summary_line() {
        let monitor = PerformanceMonitor::new(MonitorConfig::new("/orders")).unwrap();
        monitor.track_custom_metric("rows", 10.0);
        let line = summary_line(&monitor.get_performance_report());
        assert_eq!(line, "/orders: 1 metrics, 0 errors, 0 resources");
    }
}
