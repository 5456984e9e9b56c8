//! Integration tests for the global logging pipeline.
//!
//! Everything runs in one test because a process can install only one
//! global subscriber.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::Error;

#[derive(Default)]
struct CapturingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CapturingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

#[test]
fn test_global_logging_forwards_workspace_events_to_sink() {
    let sink = Arc::new(CapturingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).unwrap();

    tracing::debug!(
        target: "core_onboarding::wizard",
        step = 3,
        email = "front.desk@example.com",
        "Step blocked by validation"
    );
    tracing::info!(target: "core_auth::credentials", password = "Practice2024", "Password updated");
    // Dependencies are capped at warn regardless of the configured level
    tracing::info!(target: "hyper::client", "connection reused");

    let entries = sink.entries.lock().unwrap().clone();
    assert_eq!(entries.len(), 2);

    assert_eq!(entries[0].level, LogLevel::Debug);
    assert_eq!(entries[0].fields.get("step"), Some(&"3".to_string()));
    assert_eq!(
        entries[0].fields.get("email"),
        Some(&"f***@[REDACTED]".to_string())
    );
    assert_eq!(
        entries[1].fields.get("password"),
        Some(&"[REDACTED]".to_string())
    );

    assert!(matches!(init_logging(config), Err(Error::Logging(_))));
}
