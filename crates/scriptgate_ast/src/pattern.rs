use scriptgate_span::Span;

use crate::expr::Expr;

/// `match`/`case` patterns (PEP 634). Parsed structurally enough to walk and
/// report on, but — since `match` statements are unconditionally rejected by
/// the compatibility checker (E004) — not to the depth a general-purpose
/// Python implementation would need; there is no pattern-matching
/// interpreter downstream of this AST that would ever consume one.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    Wildcard,
    Capture(String),
    Value(Expr),
    Sequence(Vec<Pattern>),
    Mapping(Vec<(Expr, Pattern)>),
    Class { cls: Expr, patterns: Vec<Pattern>, kwd_patterns: Vec<(String, Pattern)> },
    Or(Vec<Pattern>),
    As { pattern: Box<Pattern>, name: Option<String> },
}
