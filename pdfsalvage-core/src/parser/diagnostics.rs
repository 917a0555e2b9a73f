//! Structured warnings and errors raised while loading
//!
//! Every recoverable problem the loader works around is logged through
//! `tracing` and also kept in a [`Diagnostics`] list, so callers can inspect
//! what was repaired without installing a subscriber.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// One recorded problem and the byte position it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub position: Option<usize>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.position {
            Some(position) => write!(f, "{level} at byte {position}: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, position: Option<usize>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(position = ?position, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            message,
            position,
        });
    }

    pub fn error(&mut self, position: Option<usize>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(position = ?position, "{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message,
            position,
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Error)
    }

    /// True if any entry's message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|d| d.message.contains(needle))
    }
}
