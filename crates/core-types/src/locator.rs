use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::PlanError;

/// Addressing mode of a selector expression.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorMode {
    /// CSS-like structural query (`document.querySelector`)
    Structural,

    /// Document path query (XPath)
    Path,
}

impl SelectorMode {
    /// Infer the addressing mode from the expression syntax.
    pub fn infer(expression: &str) -> Self {
        let trimmed = expression.trim_start();
        let path_prefixes = ["/", "./", "(/", "(./"];
        if path_prefixes.iter().any(|prefix| trimmed.starts_with(prefix)) {
            SelectorMode::Path
        } else {
            SelectorMode::Structural
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SelectorMode::Structural => "css",
            SelectorMode::Path => "xpath",
        }
    }
}

/// One selector expression tried while resolving a logical target.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct LocatorCandidate {
    pub expression: String,
    pub mode: SelectorMode,
}

impl LocatorCandidate {
    /// Build a candidate, inferring its addressing mode.
    pub fn new(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        let mode = SelectorMode::infer(&expression);
        Self { expression, mode }
    }

    pub fn structural(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            mode: SelectorMode::Structural,
        }
    }

    pub fn path(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            mode: SelectorMode::Path,
        }
    }
}

impl fmt::Display for LocatorCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mode.name(), self.expression)
    }
}

/// Non-empty, ordered list of candidates for one logical element.
///
/// Order is preference order: the locator tries the first candidate first.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LocatorCandidate>", into = "Vec<LocatorCandidate>")]
pub struct Target {
    candidates: Vec<LocatorCandidate>,
}

impl Target {
    pub fn new(candidates: Vec<LocatorCandidate>) -> Result<Self, PlanError> {
        let candidates: Vec<LocatorCandidate> = candidates
            .into_iter()
            .filter(|candidate| !candidate.expression.trim().is_empty())
            .collect();
        if candidates.is_empty() {
            return Err(PlanError::EmptyTarget);
        }
        Ok(Self { candidates })
    }

    /// Build a target from raw selector strings, inferring each mode.
    pub fn from_expressions<I, S>(expressions: I) -> Result<Self, PlanError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(expressions.into_iter().map(LocatorCandidate::new).collect())
    }

    pub fn single(expression: impl Into<String>) -> Result<Self, PlanError> {
        Self::new(vec![LocatorCandidate::new(expression)])
    }

    pub fn candidates(&self) -> &[LocatorCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn first(&self) -> &LocatorCandidate {
        &self.candidates[0]
    }

    /// Selector expressions joined for logs and error messages.
    pub fn describe(&self) -> String {
        self.candidates
            .iter()
            .map(|candidate| candidate.expression.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl TryFrom<Vec<LocatorCandidate>> for Target {
    type Error = PlanError;

    fn try_from(candidates: Vec<LocatorCandidate>) -> Result<Self, Self::Error> {
        Target::new(candidates)
    }
}

impl From<Target> for Vec<LocatorCandidate> {
    fn from(target: Target) -> Self {
        target.candidates
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_path_mode_from_syntax() {
        assert_eq!(SelectorMode::infer("//button[@id='x']"), SelectorMode::Path);
        assert_eq!(SelectorMode::infer("(//a)[2]"), SelectorMode::Path);
        assert_eq!(SelectorMode::infer("./span"), SelectorMode::Path);
        assert_eq!(SelectorMode::infer("#btn"), SelectorMode::Structural);
        assert_eq!(
            SelectorMode::infer("a[title='New']"),
            SelectorMode::Structural
        );
    }

    #[test]
    fn target_rejects_blank_candidates() {
        assert!(matches!(
            Target::from_expressions(["", "   "]),
            Err(PlanError::EmptyTarget)
        ));

        let target = Target::from_expressions(["", "#a", "//b"]).unwrap();
        assert_eq!(target.len(), 2);
        assert_eq!(target.first().expression, "#a");
        assert_eq!(target.candidates()[1].mode, SelectorMode::Path);
        assert_eq!(target.describe(), "#a | //b");
    }

    #[test]
    fn target_deserialization_is_validated() {
        let empty: Result<Target, _> = serde_json::from_str("[]");
        assert!(empty.is_err());
    }
}
