//! Structured Logging for Telepath
//!
//! `tracing` is used everywhere. Reservation and spend events are
//! additionally rendered as `LogEvent` JSON records so that ledger activity
//! can be audited from log aggregation alone.
//!
//! # Usage
//!
//! ```rust,ignore
//! use telepath::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON mode for production
//! tracing::info!(target: "telepath::monitor", addresses = 12, "refresh complete");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Balance refresh cycles
    Monitor,
    /// Reservation creation and lookup
    Reservation,
    /// Build / sign / broadcast / commit
    Spend,
    /// System events (startup, shutdown)
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    /// Log level
    pub level: String,
    /// Event category
    pub category: EventCategory,
    /// Human-readable message
    pub message: String,
    /// Correlation ID (reservation id for ledger events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Duration in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    /// Create a new log event
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: format!("{:?}", level).to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Add correlation ID
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Add duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Add error details
    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    /// Render this event as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Domain Event Logging
// ============================================================================

/// Log the outcome of one balance refresh cycle
pub fn log_refresh_event(addresses: usize, batches: usize, duration_ms: u64, error: Option<&str>) {
    let success = error.is_none();
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let mut event = LogEvent::new(level, EventCategory::Monitor, "balance_refresh")
        .with_duration(duration_ms)
        .with_data(serde_json::json!({
            "addresses": addresses,
            "batches": batches,
            "success": success
        }));

    if let Some(err) = error {
        event = event.with_error("REFRESH_ABORTED", err);
        tracing::warn!(target: "telepath::monitor", "{}", event.to_json());
    } else {
        tracing::debug!(target: "telepath::monitor", "{}", event.to_json());
    }
}

/// Log a reservation event; `amount_sats` is left out when not known
pub fn log_reservation_event(
    event_type: &str,
    reservation_id: &str,
    address: &str,
    amount_sats: Option<i64>,
    error: Option<&str>,
) {
    let event = reservation_event(event_type, reservation_id, address, amount_sats, error);
    if error.is_some() {
        tracing::warn!(target: "telepath::ledger", "{}", event.to_json());
    } else {
        tracing::info!(target: "telepath::ledger", "{}", event.to_json());
    }
}

fn reservation_event(
    event_type: &str,
    reservation_id: &str,
    address: &str,
    amount_sats: Option<i64>,
    error: Option<&str>,
) -> LogEvent {
    let level = if error.is_none() { LogLevel::Info } else { LogLevel::Warn };
    let mut data = serde_json::json!({ "address": address });
    if let Some(amount) = amount_sats {
        data["amount_sats"] = serde_json::json!(amount);
    }

    let event = LogEvent::new(level, EventCategory::Reservation, event_type)
        .with_correlation_id(reservation_id)
        .with_data(data);

    match error {
        Some(err) => event.with_error("RESERVATION_ERROR", err),
        None => event,
    }
}

/// Log a spend event
pub fn log_spend_event(
    event_type: &str,
    reservation_id: &str,
    address: &str,
    amount_sats: i64,
    txid: Option<&str>,
    error: Option<(&str, &str)>,
) {
    let level = if error.is_none() { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Spend, event_type)
        .with_correlation_id(reservation_id)
        .with_data(serde_json::json!({
            "address": address,
            "amount_sats": amount_sats,
            "txid": txid
        }));

    if let Some((code, message)) = error {
        event = event.with_error(code, message);
        tracing::error!(target: "telepath::spend", "{}", event.to_json());
    } else {
        tracing::info!(target: "telepath::spend", "{}", event.to_json());
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let level_name = Level::from(level).as_str().to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("telepath={},reqwest=warn", level_name)));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from TelepathConfig
pub fn init_from_config(config: &super::config::TelepathConfig) -> Result<(), LoggingError> {
    init_logging(LogLevel::from(config.log_level.as_str()), config.log_json)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}
