//! Logging setup.

use std::cell::Cell;
use std::fmt::{self, Write as _};
use std::path::Path;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::Context;
use tracing_subscriber::{fmt as tfmt, prelude::*, EnvFilter, Layer};
use trading_core::error::TradingError;
use trading_core::traits::ReportSink;

const LOG_FILE_PREFIX: &str = "trading-bot.log";

/// Logging options.
#[derive(Clone, Default)]
pub struct LoggingOptions<'a> {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: &'a str,
    pub json: bool,
    /// Directory for daily-rolling log files
    pub file_dir: Option<&'a Path>,
    /// Sink receiving WARN and above
    pub activity: Option<Arc<dyn ReportSink>>,
}

/// Setup logging.
///
/// Keep the returned guard alive for the life of the process so the file
/// writer flushes on exit.
pub fn setup_logging(options: LoggingOptions<'_>) -> Result<Option<WorkerGuard>, TradingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(options.level));

    let (pretty, json) = if options.json {
        (None, Some(tfmt::layer().json()))
    } else {
        (Some(tfmt::layer().pretty()), None)
    };

    let (file, guard) = match options.file_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(tfmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(file)
        .with(options.activity.map(ActivityLayer::new))
        .try_init()
        .map_err(|e| TradingError::Internal(format!("logging already initialized: {e}")))?;

    Ok(guard)
}

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

/// Forwards WARN and ERROR events to a report sink's activity log.
///
/// Events carrying `severity = "critical"` are recorded as `CRITICAL`.
pub struct ActivityLayer {
    sink: Arc<dyn ReportSink>,
}

impl ActivityLayer {
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for ActivityLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }

        // The sink may itself log; never feed that back into the sink.
        FORWARDING.with(|forwarding| {
            if forwarding.replace(true) {
                return;
            }
            let mut visitor = ActivityVisitor::default();
            event.record(&mut visitor);
            let label = if visitor.critical { "CRITICAL" } else { level.as_str() };
            let _ = self.sink.append_activity(label, &visitor.finish());
            forwarding.set(false);
        });
    }
}

#[derive(Default)]
struct ActivityVisitor {
    message: String,
    fields: String,
    critical: bool,
}

impl ActivityVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{} ({})", self.message, self.fields.trim_start())
        }
    }
}

impl Visit for ActivityVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "severity" {
            self.critical |= value.eq_ignore_ascii_case("critical");
        } else if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReportSink;
    use tracing::{error, info, warn};

    #[test]
    fn test_activity_layer_forwards_warnings_only() {
        let sink = Arc::new(MemoryReportSink::new());
        let subscriber = tracing_subscriber::registry().with(ActivityLayer::new(sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            info!("Tick complete");
            warn!(ticket = 42, "Modify rejected");
            error!(severity = "critical", "State file is corrupt");
        });

        let activity = sink.activity();
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0].0, "WARN");
        assert_eq!(activity[0].1, "Modify rejected (ticket=42)");
        assert_eq!(activity[1].0, "CRITICAL");
        assert_eq!(activity[1].1, "State file is corrupt");
    }
}
