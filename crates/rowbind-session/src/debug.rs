//! Statement diagnostics.
//!
//! When enabled, every statement is handed to a [`DebugSink`] together with
//! its arguments immediately before it reaches the executor. This is a
//! debugging aid and separate from the structured `tracing` events the rest of
//! the crate emits.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rowbind_core::Value;

/// Receives every statement while diagnostics are on.
pub trait DebugSink: Send + Sync {
    fn statement(&self, sql: &str, args: &[Value]);
}

/// Emits statements as `tracing` events at DEBUG on target `rowbind::sql`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DebugSink for TracingSink {
    fn statement(&self, sql: &str, args: &[Value]) {
        tracing::debug!(target: "rowbind::sql", sql, args = ?args, "statement");
    }
}

/// Writes the statement on one line and its arguments on the next.
pub struct WriterSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl WriterSink {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }

    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl fmt::Debug for WriterSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}

impl DebugSink for WriterSink {
    fn statement(&self, sql: &str, args: &[Value]) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let args = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        // A failing debug writer must not fail the statement.
        let _ = writeln!(out, "{sql}").and_then(|()| writeln!(out, "{args}"));
    }
}

/// The sink plus its runtime on/off switch.
pub(crate) struct Diagnostics {
    enabled: AtomicBool,
    sink: Arc<dyn DebugSink>,
}

impl Diagnostics {
    pub(crate) fn new(enabled: bool, sink: Arc<dyn DebugSink>) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            sink,
        }
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub(crate) fn emit(&self, sql: &str, args: &[Value]) {
        tracing::trace!(sql, "executing");
        if self.is_enabled() {
            self.sink.statement(sql, args);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}
