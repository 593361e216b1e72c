//! Error types for locator system

use cdp_adapter::AdapterError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No candidate matched an attached node within the budget
    #[error("Element not found: {target} (waited {timeout_ms}ms)")]
    ElementNotFound { target: String, timeout_ms: u64 },

    /// No candidate matched a node with a rendered box within the budget
    #[error("Element not visible: {target} (waited {timeout_ms}ms)")]
    ElementNotVisible { target: String, timeout_ms: u64 },

    /// The document failed while being queried
    #[error("Document error while resolving {target}: {source}")]
    Document {
        target: String,
        #[source]
        source: AdapterError,
    },
}

impl LocatorError {
    /// Whether the failure is a plain timeout rather than a document fault.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LocatorError::ElementNotFound { .. } | LocatorError::ElementNotVisible { .. }
        )
    }
}
