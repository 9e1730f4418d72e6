use miette::Diagnostic;
use thiserror::Error;

use crate::check_message::CheckMessage;

/// A script failed to parse as valid syntax (a genuine syntax error, not a
/// subset violation — those are [`CheckError`]s).
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
#[error("{message}")]
#[diagnostic(code(scriptgate::parse_error))]
pub struct ParseError {
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: Option<u32>, column: Option<u32>) -> Self {
        Self { message: message.into(), line, column }
    }
}

/// The script parsed, but violates one or more subset rules (§4.3 of the
/// checker's diagnostic table). Carries every [`CheckMessage`] of severity
/// `Error` that the compatibility checker emitted, not just the first one,
/// so a caller can report them all at once.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
#[error("script failed compatibility check ({} error(s))", .messages.len())]
#[diagnostic(code(scriptgate::check_error))]
pub struct CheckError {
    pub messages: Vec<CheckMessage>,
}

impl CheckError {
    pub fn new(messages: Vec<CheckMessage>) -> Self {
        Self { messages }
    }
}

/// A caller supplied inputs that don't satisfy the script's declared
/// `InputSpec` map (missing a required input, or — in strict mode —
/// supplying one the script never declared).
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
#[error("{message}")]
#[diagnostic(code(scriptgate::input_error))]
pub struct InputError {
    pub message: String,
    pub input_name: String,
}

impl InputError {
    pub fn new(message: impl Into<String>, input_name: impl Into<String>) -> Self {
        Self { message: message.into(), input_name: input_name.into() }
    }
}

/// A caller's externals don't satisfy the script's declared `ExternalSpec`
/// map.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
#[error("{message}")]
#[diagnostic(code(scriptgate::external_error))]
pub struct ExternalError {
    pub message: String,
    pub function_name: String,
}

impl ExternalError {
    pub fn new(message: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self { message: message.into(), function_name: function_name.into() }
    }
}

/// The sandbox raised while executing the transformed script, and the error
/// could be attributed to a source line. Not raised for resource-limit
/// violations — see [`LimitError`], which is a disjoint sibling rather than
/// a subtype of this one (the original implementation nested `LimitError`
/// under its execution error; this port keeps them apart so callers can
/// `matches!` on the kind of failure without downcasting).
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
#[error("{}", format_execution_message(&self.message, self.line, self.column))]
#[diagnostic(code(scriptgate::execution_error))]
pub struct ExecutionError {
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub source_context: Option<String>,
    pub suggestion: Option<String>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>, line: Option<u32>, column: Option<u32>) -> Self {
        Self { message: message.into(), line, column, source_context: None, suggestion: None }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.source_context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// The full user-visible rendering §7 describes: `Line N`, the
    /// message, a blank line, the `>`-marked source context window (if
    /// one was attached), and a trailing `Suggestion: …` line (if one was
    /// attached). [`std::fmt::Display`] stays terser (`Line N: message`)
    /// for log lines and `{err}` interpolation; this method is for a
    /// caller that wants the full multi-line report.
    pub fn render(&self) -> String {
        let mut out = self.line.map_or_else(|| self.message.clone(), |line| format!("Line {line}\n{}", self.message));
        if let Some(context) = &self.source_context {
            out.push_str("\n\n");
            out.push_str(context);
        }
        if let Some(suggestion) = &self.suggestion {
            out.push_str("\nSuggestion: ");
            out.push_str(suggestion);
        }
        out
    }
}

fn format_execution_message(message: &str, line: Option<u32>, _column: Option<u32>) -> String {
    line.map_or_else(|| message.to_owned(), |line| format!("Line {line}: {message}"))
}

/// What kind of resource a [`LimitError`] was raised for. Used both to
/// render a useful message and by callers that branch on the kind of limit
/// that tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Memory,
    Duration,
    Recursion,
    Allocations,
    /// The sandbox reported a limit violation but neither its exception
    /// type nor its message matched a known keyword (§4.7 step 3).
    Unknown,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Duration => "duration",
            Self::Recursion => "recursion",
            Self::Allocations => "allocations",
            Self::Unknown => "unknown",
        })
    }
}

impl LimitKind {
    /// Maps a free-text limit-kind tag (from the sandbox's own `Limit`
    /// variant, or scanned out of a runtime error's message) to a
    /// `LimitKind`, matching on substring keywords per §4.7 step 3.
    pub fn detect(text: &str) -> Self {
        let lower = text.to_ascii_lowercase();
        if lower.contains("memory") {
            Self::Memory
        } else if lower.contains("duration") || lower.contains("timeout") {
            Self::Duration
        } else if lower.contains("recursion") {
            Self::Recursion
        } else if lower.contains("allocation") {
            Self::Allocations
        } else {
            Self::Unknown
        }
    }
}

/// A configured resource limit (§5, [`scriptgate_limits::Limits`]) was
/// exceeded during execution. Deliberately **not** a variant nested inside
/// [`ExecutionError`] — see its doc comment — so that `matches!(err,
/// GatewayError::Limit(_))` alone is sufficient to detect a limit failure.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
#[error("{kind} limit exceeded: {message}")]
#[diagnostic(code(scriptgate::limit_error))]
pub struct LimitError {
    pub kind: LimitKind,
    pub message: String,
    pub line: Option<u32>,
}

impl LimitError {
    pub fn new(kind: LimitKind, message: impl Into<String>, line: Option<u32>) -> Self {
        Self { kind, message: message.into(), line }
    }
}

/// The script ran to completion, but its result failed validation against
/// the caller-supplied output schema.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq)]
#[error("output validation failed: {message}")]
#[diagnostic(code(scriptgate::output_error))]
pub struct OutputError {
    pub message: String,
    pub validation_errors: Vec<String>,
}

impl OutputError {
    pub fn new(message: impl Into<String>, validation_errors: Vec<String>) -> Self {
        Self { message: message.into(), validation_errors }
    }
}

/// The union of everything that can go wrong loading, checking or running a
/// script. `#[non_exhaustive]` so adding a new failure mode later isn't a
/// breaking change for crates that match on this.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("could not read script at {path}")]
    #[diagnostic(code(scriptgate::io_error))]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Check(#[from] CheckError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    External(#[from] ExternalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Limit(#[from] LimitError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Output(#[from] OutputError),
}

impl GatewayError {
    /// True for [`GatewayError::Limit`] only. Exists mainly to document, in
    /// one place, that limit failures are never mistaken for ordinary
    /// execution failures (see [`LimitError`]'s doc comment).
    pub fn is_limit(&self) -> bool {
        matches!(self, Self::Limit(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn render_includes_line_context_and_suggestion() {
        let err = ExecutionError::new("boom", Some(7), None)
            .with_context(">    7 | x = 1\n")
            .with_suggestion("check the value of x");
        let rendered = err.render();
        assert!(rendered.starts_with("Line 7\nboom\n\n"));
        assert!(rendered.contains(">    7 | x = 1"));
        assert!(rendered.ends_with("Suggestion: check the value of x"));
    }

    #[test]
    fn limit_kind_detects_known_keywords() {
        assert_eq!(LimitKind::detect("memory budget exceeded"), LimitKind::Memory);
        assert_eq!(LimitKind::detect("timeout after 500ms"), LimitKind::Duration);
        assert_eq!(LimitKind::detect("max recursion depth hit"), LimitKind::Recursion);
        assert_eq!(LimitKind::detect("allocation cap reached"), LimitKind::Allocations);
        assert_eq!(LimitKind::detect("something else entirely"), LimitKind::Unknown);
    }

    #[test]
    fn limit_is_never_an_execution_error() {
        let limit: GatewayError = LimitError::new(LimitKind::Duration, "too slow", None).into();
        assert!(limit.is_limit());
        assert!(!matches!(limit, GatewayError::Execution(_)));
    }
}
