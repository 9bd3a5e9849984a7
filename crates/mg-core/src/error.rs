//! Error types shared by the filtering core.
//!
//! None of these are fatal. Callers either fail open (malformed input,
//! storage), skip the current element (DOM), or abort silently (context gone).

use thiserror::Error;

/// Messages the browser uses once the extension's API surface is torn down.
const CONTEXT_GONE_PATTERNS: &[&str] = &[
    "extension context invalidated",
    "context invalidated",
    "receiving end does not exist",
    "message port closed",
    "no tab with id",
];

/// Top-level error for core operations.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("extension context is gone")]
    ContextGone,
    #[error("malformed url: {0}")]
    MalformedUrl(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Element(#[from] DomError),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Failure reading or writing the persisted settings.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage read failed: {0}")]
    Read(String),
    #[error("storage write failed for '{key}': {reason}")]
    Write { key: String, reason: String },
    #[error("invalid stored value for '{key}'")]
    InvalidValue { key: String },
}

/// A DOM API threw while processing a single element.
#[derive(Debug, Error)]
pub enum DomError {
    #[error("element is detached")]
    Detached,
    #[error("dom operation '{op}' failed: {reason}")]
    Operation { op: &'static str, reason: String },
}

impl DomError {
    pub fn op(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Operation { op, reason: reason.into() }
    }
}

/// A host (browser API) call failed.
#[derive(Debug, Error)]
#[error("{call} failed: {message}")]
pub struct HostError {
    pub call: &'static str,
    pub message: String,
}

impl HostError {
    pub fn new(call: &'static str, message: impl Into<String>) -> Self {
        Self { call, message: message.into() }
    }

    /// Whether this failure means the extension context was torn down.
    pub fn is_context_gone(&self) -> bool {
        is_context_gone_message(&self.message)
    }
}

/// Pattern-match an error message against the known context-gone messages.
pub fn is_context_gone_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONTEXT_GONE_PATTERNS.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_gone_detection() {
        assert!(is_context_gone_message("Error: Extension context invalidated."));
        assert!(is_context_gone_message(
            "Could not establish connection. Receiving end does not exist."
        ));
        assert!(!is_context_gone_message("QuotaExceededError"));
    }

    #[test]
    fn test_host_error_context_gone() {
        let err = HostError::new("notify", "Extension context invalidated");
        assert!(err.is_context_gone());
        let err = HostError::new("notify", "permission denied");
        assert!(!err.is_context_gone());
    }

    #[test]
    fn test_error_display() {
        let err = FilterError::from(StorageError::Read("quota".into()));
        assert_eq!(err.to_string(), "storage read failed: quota");
        let err = FilterError::from(DomError::op("setValue", "readonly"));
        assert_eq!(err.to_string(), "dom operation 'setValue' failed: readonly");
    }
}
