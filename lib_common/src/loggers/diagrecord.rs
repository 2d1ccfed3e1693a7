use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// # Diagnostic Severity
///
/// Severity scale for diagnostic records, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl DiagLevel {
    /// Maps the severity onto the `log` facade's level scale.
    pub fn as_log_level(self) -> log::Level {
        match self {
            DiagLevel::Trace => log::Level::Trace,
            DiagLevel::Debug => log::Level::Debug,
            DiagLevel::Info => log::Level::Info,
            DiagLevel::Warn => log::Level::Warn,
            DiagLevel::Error => log::Level::Error,
        }
    }
}

/// # Diagnostic Record
///
/// One structured diagnostic entry. The `extra` field carries arbitrary JSON
/// context (event names, payload shapes, close reasons) alongside the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagRecord {
    /// Timestamp (UTC) when the record was created.
    pub ts: DateTime<Utc>,
    /// The severity level of the record.
    pub level: DiagLevel,
    /// The component that produced the record (e.g., "search_wss").
    pub component: String,
    /// The message text.
    pub text: String,
    /// Flexible JSON value for structured context, if any.
    pub extra: Option<Value>,
}

impl DiagRecord {
    pub fn new(level: DiagLevel, component: &str, text: &str, extra: Option<Value>) -> Self {
        Self {
            ts: Utc::now(),
            level,
            component: component.to_string(),
            text: text.to_string(),
            extra,
        }
    }
}
