use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::diagrecord::{DiagLevel, DiagRecord};

/// # Diagnostic Sink
///
/// Receiver for structured diagnostic records. The streaming client and its
/// components hold an injected `Arc<dyn DiagnosticSink>` rather than writing
/// to a global logger, so the destination is decided by the composition root.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, record: DiagRecord);
}

/// # Component Diagnostics Handle
///
/// A per-component front end over a shared sink. Mirrors the leveled
/// `message + optional JSON extra` call shape used across the platform's
/// services.
#[derive(Clone)]
pub struct Diag {
    component: &'static str,
    sink: Arc<dyn DiagnosticSink>,
}

impl Diag {
    pub fn new(component: &'static str, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { component, sink }
    }

    /// The sink this handle writes to, for handing to sub-components.
    pub fn sink(&self) -> Arc<dyn DiagnosticSink> {
        Arc::clone(&self.sink)
    }

    fn emit(&self, level: DiagLevel, text: &str, extra: Option<Value>) {
        self.sink
            .record(DiagRecord::new(level, self.component, text, extra));
    }

    pub fn trace(&self, text: &str, extra: Option<Value>) {
        self.emit(DiagLevel::Trace, text, extra);
    }

    pub fn debug(&self, text: &str, extra: Option<Value>) {
        self.emit(DiagLevel::Debug, text, extra);
    }

    pub fn info(&self, text: &str, extra: Option<Value>) {
        self.emit(DiagLevel::Info, text, extra);
    }

    pub fn warn(&self, text: &str, extra: Option<Value>) {
        self.emit(DiagLevel::Warn, text, extra);
    }

    pub fn error(&self, text: &str, extra: Option<Value>) {
        self.emit(DiagLevel::Error, text, extra);
    }
}

/// # Log Facade Sink
///
/// Forwards records to the `log` crate, using the component as the target.
/// The production default: whatever subscriber the binary installed (fern,
/// env_logger, ...) receives the output.
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&self, record: DiagRecord) {
        match &record.extra {
            Some(extra) => log::log!(
                target: record.component.as_str(),
                record.level.as_log_level(),
                "{} {}",
                record.text,
                extra
            ),
            None => log::log!(
                target: record.component.as_str(),
                record.level.as_log_level(),
                "{}",
                record.text
            ),
        }
    }
}

/// # Memory Sink
///
/// Collects records in memory so tests can assert on emitted diagnostics
/// without capturing a global stream.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<DiagRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<DiagRecord> {
        self.records.lock().expect("MemorySink lock poisoned").clone()
    }

    /// True if any record at `level` contains `needle` in its text.
    pub fn contains(&self, level: DiagLevel, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|r| r.level == level && r.text.contains(needle))
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, record: DiagRecord) {
        self.records.lock().expect("MemorySink lock poisoned").push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_captures_levels_and_extras() {
        let sink = Arc::new(MemorySink::new());
        let diag = Diag::new("unit", Arc::clone(&sink) as Arc<dyn DiagnosticSink>);

        diag.info("connected", None);
        diag.warn("dropped frame", Some(serde_json::json!({"event": "bogus"})));

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, DiagLevel::Info);
        assert_eq!(records[0].component, "unit");
        assert!(sink.contains(DiagLevel::Warn, "dropped frame"));
        assert_eq!(
            records[1].extra,
            Some(serde_json::json!({"event": "bogus"}))
        );
    }
}
