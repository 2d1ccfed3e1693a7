//! # Diagnostics Module
//!
//! Structured, injectable diagnostics for the streaming client. Components
//! write leveled records through a `DiagnosticSink` collaborator instead of a
//! global stream, so tests can assert on what was emitted.

/// The structured diagnostic record and severity levels.
pub mod diagrecord;

/// Sink trait plus the log-facade and in-memory implementations.
pub mod sink;
