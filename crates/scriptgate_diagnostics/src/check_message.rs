use serde::{Deserialize, Serialize};

/// Severity of a single [`CheckMessage`]. Only `Error` messages cause
/// [`crate::CheckError`] to be raised; `Warning` messages are informational
/// (unused declarations, oversized scripts, bare final-expression values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One diagnostic produced by the compatibility checker (§4.3): a stable
/// `code` (`E001`..`E012`, `W001`..`W004`, or the sandbox-originated
/// `E100`), a human-readable `message`, the 1-based source `line`/0-based
/// `column` it applies to, its optional end position, and its
/// [`Severity`]. `suggestion` carries a short fix-it hint for the handful
/// of codes that have an obvious one (e.g. "remove the `class` statement").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckMessage {
    pub code: &'static str,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
    pub severity: Severity,
    pub suggestion: Option<String>,
}

impl CheckMessage {
    pub fn error(code: &'static str, message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            code,
            message: message.into(),
            line,
            column,
            end_line: None,
            end_column: None,
            severity: Severity::Error,
            suggestion: None,
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            code,
            message: message.into(),
            line,
            column,
            end_line: None,
            end_column: None,
            severity: Severity::Warning,
            suggestion: None,
        }
    }

    pub fn with_end(mut self, end_line: u32, end_column: u32) -> Self {
        self.end_line = Some(end_line);
        self.end_column = Some(end_column);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// The aggregate result of running the compatibility checker (§4.3) over a
/// parsed script: every message it produced, plus the summary counts and
/// feature usage the original implementation surfaces as `info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub messages: Vec<CheckMessage>,
    pub externals_count: usize,
    pub inputs_count: usize,
    pub lines_of_code: usize,
    pub features_used: Vec<String>,
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        !self.messages.iter().any(CheckMessage::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &CheckMessage> {
        self.messages.iter().filter(|m| m.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &CheckMessage> {
        self.messages.iter().filter(|m| !m.is_error())
    }
}
