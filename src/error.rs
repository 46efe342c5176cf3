//! Error types for the check-in workflow

use thiserror::Error;

/// Errors surfaced while driving the browser through the stage sequence.
#[derive(Debug, Error, Clone)]
pub enum WorkflowError {
    /// A bounded wait elapsed before its condition held.
    #[error("wait timed out after {elapsed_ms}ms: {what}")]
    WaitTimeout { what: String, elapsed_ms: u64 },

    /// The page title stayed empty across the whole refresh budget.
    #[error("page title stayed empty after {0} refreshes")]
    TitleUnavailable(u32),

    /// A selector resolved to nothing at interaction time.
    #[error("element not found: {0}")]
    ElementMissing(String),

    /// CDP transport or protocol failure.
    #[error("browser error: {0}")]
    Browser(String),
}

impl WorkflowError {
    /// Timeout-class errors drive the outer retry loop; everything else
    /// propagates and terminates the run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::WaitTimeout { .. } | WorkflowError::TitleUnavailable(_)
        )
    }

    pub(crate) fn timeout(what: impl Into<String>, elapsed_ms: u64) -> Self {
        WorkflowError::WaitTimeout {
            what: what.into(),
            elapsed_ms,
        }
    }
}
