//! Build diagnostics.
//!
//! Errors and warnings are collected into a [`DiagnosticSink`] as the
//! build runs and emitted in a stable order at the end: per source file
//! in source order, across files in entry-discovery order. Errors never
//! abort the build early; a build with any error produces no chunks.

use std::path::PathBuf;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Secondary location attached to a diagnostic, pointing at the
/// configuration file that drove the outcome (`package.json`,
/// `tsconfig.json`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub message: String,
    pub path: Option<PathBuf>,
}

impl Note {
    pub fn new(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { message: message.into(), path: Some(path.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Source file the diagnostic points at, if any.
    pub path: Option<PathBuf>,
    pub notes: Vec<Note>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, message: message.into(), path: None, notes: Vec::new() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, message: message.into(), path: None, notes: Vec::new() }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }
}

/// Ordering key: (module discovery index, statement index within the
/// module). Diagnostics with no source location sort after located ones
/// in emission order.
pub(crate) type OrderKey = (u32, u32);

pub(crate) const UNORDERED: OrderKey = (u32::MAX, u32::MAX);

/// Thread-safe collector. Walker workers push from the parse pool;
/// DCE and the linker push single-threaded.
#[derive(Default)]
pub struct DiagnosticSink {
    entries: Mutex<Vec<(OrderKey, Diagnostic)>>,
}

impl DiagnosticSink {
    pub(crate) fn push(&self, key: OrderKey, diagnostic: Diagnostic) {
        self.entries.lock().push((key, diagnostic));
    }

    pub(crate) fn push_unordered(&self, diagnostic: Diagnostic) {
        self.push(UNORDERED, diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.lock().iter().any(|(_, d)| d.severity == Severity::Error)
    }

    /// Stable-sort by order key and hand the diagnostics out.
    pub fn finish(self) -> Vec<Diagnostic> {
        let mut entries = self.entries.into_inner();
        entries.sort_by_key(|(key, _)| *key);
        entries.into_iter().map(|(_, d)| d).collect()
    }
}
