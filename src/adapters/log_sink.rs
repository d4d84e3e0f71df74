//! Diagnostic sinks: one backed by the `log` facade, one recording in memory.

use log::{Level, LevelFilter};
use std::cell::RefCell;
use std::rc::Rc;

use crate::ports::diagnostic_port::{DiagnosticEvent, DiagnosticLevel, DiagnosticSink};

pub const LOG_TARGET: &str = "trade_analyzer";

impl From<DiagnosticLevel> for Level {
    fn from(level: DiagnosticLevel) -> Self {
        match level {
            DiagnosticLevel::Error => Level::Error,
            DiagnosticLevel::Warn => Level::Warn,
            DiagnosticLevel::Info => Level::Info,
            DiagnosticLevel::Debug => Level::Debug,
        }
    }
}

/// Forwards events to whatever logger the binary installed.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    level: LevelFilter,
}

impl LogSink {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    pub fn enabled(&self, level: DiagnosticLevel) -> bool {
        Level::from(level) <= self.level
    }
}

impl DiagnosticSink for LogSink {
    fn emit(&self, event: DiagnosticEvent) {
        if !self.enabled(event.level) {
            return;
        }
        log::log!(target: LOG_TARGET, Level::from(event.level), "{}", format_event(&event));
    }
}

/// `message key=value key=value`
pub fn format_event(event: &DiagnosticEvent) -> String {
    let mut line = event.message.clone();
    for (key, value) in &event.context {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(value);
    }
    line
}

/// Records every event. Clones share the same buffer, so a test can keep one
/// handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Rc<RefCell<Vec<DiagnosticEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.borrow().clone()
    }

    pub fn at_level(&self, level: DiagnosticLevel) -> Vec<DiagnosticEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.level == level)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events.borrow_mut().push(event);
    }
}
