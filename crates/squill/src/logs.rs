//! Classify server notices for logging.

use tokio_postgres::error::DbError;
use tracing::Level;

/// Map a server severity string to a log level. Unknown severities land
/// on INFO rather than being dropped.
pub fn severity_level(severity: &str) -> Level {
    match severity {
        "DEBUG" => Level::DEBUG,
        "LOG" | "INFO" | "NOTICE" => Level::INFO,
        "WARNING" => Level::WARN,
        "ERROR" | "FATAL" | "PANIC" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Classify the notices a DDL statement produced.
pub fn ddl_logs<'a>(
    notices: impl IntoIterator<Item = &'a DbError>,
) -> Vec<(Level, String)> {
    notices
        .into_iter()
        .map(|notice| (severity_level(notice.severity()), notice.message().to_string()))
        .collect()
}

/// Emit one classified message through `tracing`.
pub fn emit(level: Level, message: &str) {
    if level == Level::ERROR {
        tracing::error!("{message}");
    } else if level == Level::WARN {
        tracing::warn!("{message}");
    } else if level == Level::DEBUG {
        tracing::debug!("{message}");
    } else if level == Level::TRACE {
        tracing::trace!("{message}");
    } else {
        tracing::info!("{message}");
    }
}
