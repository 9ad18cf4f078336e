//! Diagnostics collector: recoverable problems found while loading and
//! generating.
//!
//! Nothing in the loader or the emitter aborts on malformed input. Each
//! problem is recorded here and mirrored to `tracing`.

use std::fmt;

use tracing::{error, warn};

/// How bad a recorded problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// Pipeline stage a diagnostic originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Doxygen index/compound loading and member parsing.
    Load,
    /// Header scanning for handle macros.
    Handles,
    /// Registry insert/merge.
    Registry,
    /// End-of-load unresolved reference batch.
    Resolve,
    /// Registry → xml generation.
    Emit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Load => "load",
            Stage::Handles => "handles",
            Stage::Registry => "registry",
            Stage::Resolve => "resolve",
            Stage::Emit => "emit",
        };
        f.write_str(s)
    }
}

/// A single recorded problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    /// The identifier the problem is about, when there is one.
    pub identifier: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.identifier {
            Some(id) => write!(f, "{level} [{}] `{id}`: {}", self.stage, self.message),
            None => write!(f, "{level} [{}] {}", self.stage, self.message),
        }
    }
}

/// Ordered list of diagnostics for one generation run.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    unresolved: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and mirror it to the log.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        let id = diagnostic.identifier.as_deref().unwrap_or("");
        match diagnostic.severity {
            Severity::Warning => {
                warn!(stage = %diagnostic.stage, name = id, "{}", diagnostic.message)
            }
            Severity::Error => {
                error!(stage = %diagnostic.stage, name = id, "{}", diagnostic.message)
            }
        }
        self.entries.push(diagnostic);
    }

    pub fn warn(&mut self, stage: Stage, identifier: Option<&str>, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Warning,
            stage,
            identifier: identifier.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn error(&mut self, stage: Stage, identifier: Option<&str>, message: impl Into<String>) {
        self.push(Diagnostic {
            severity: Severity::Error,
            stage,
            identifier: identifier.map(str::to_string),
            message: message.into(),
        });
    }

    /// Record the end-of-load batch of names that were referenced but never
    /// defined. One `Resolve` warning is pushed per name.
    pub fn report_unresolved(&mut self, mut names: Vec<String>) {
        names.sort();
        for name in &names {
            self.warn(
                Stage::Resolve,
                Some(name),
                "referenced but never defined by any loaded api",
            );
        }
        self.unresolved = names;
    }

    /// Names reported by the last [`report_unresolved`](Self::report_unresolved) call.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn by_stage(&self, stage: Stage) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.stage == stage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }
}
