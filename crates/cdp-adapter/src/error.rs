use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by the adapter.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error, Serialize, Deserialize)]
pub enum AdapterErrorKind {
    #[error("node detached from document")]
    NodeDetached,
    #[error("native click rejected")]
    ClickRejected,
    #[error("invalid selector")]
    InvalidSelector,
    #[error("script evaluation failed")]
    Script,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to higher layers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn detached() -> Self {
        Self::new(AdapterErrorKind::NodeDetached)
    }

    pub fn is(&self, kind: AdapterErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<chromiumoxide::error::CdpError> for AdapterError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        use chromiumoxide::error::CdpError;
        match err {
            CdpError::JavascriptException(details) => {
                AdapterError::new(AdapterErrorKind::Script).with_hint(details.text.clone())
            }
            other => AdapterError::new(AdapterErrorKind::CdpIo).with_hint(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hint() {
        let err = AdapterError::new(AdapterErrorKind::ClickRejected).with_hint("covered by div");
        assert_eq!(err.to_string(), "native click rejected: covered by div");
        assert!(err.is(AdapterErrorKind::ClickRejected));
    }
}
