//! Error types for action primitives

use action_locator::LocatorError;
use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

/// Errors raised while applying a primitive to the document
#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// The target could not be resolved
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// The node left the document between resolution and use
    #[error("Element detached during {operation} on {selector}")]
    Detached {
        operation: &'static str,
        selector: String,
    },

    /// The document failed while the primitive was applied
    #[error("Document error during {operation} on {selector}: {source}")]
    Document {
        operation: &'static str,
        selector: String,
        #[source]
        source: AdapterError,
    },

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),
}

impl ActionError {
    /// Wrap an adapter failure with the operation and selector it happened on.
    pub fn document(operation: &'static str, selector: impl Into<String>, err: AdapterError) -> Self {
        let selector = selector.into();
        if err.is(AdapterErrorKind::NodeDetached) {
            ActionError::Detached {
                operation,
                selector,
            }
        } else {
            ActionError::Document {
                operation,
                selector,
                source: err,
            }
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, ActionError::Interrupted(_))
    }
}
