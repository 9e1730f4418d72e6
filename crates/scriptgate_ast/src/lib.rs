//! AST for the restricted, Python-shaped scripting subset Script Gateway
//! accepts.
//!
//! Nodes are plain owned trees (`Box<Expr>`, `Vec<Stmt>`), not arena
//! allocated. See the crate-level design notes in the workspace root's
//! `DESIGN.md` for why: this AST is built once per script load rather than
//! millions of times per CI run, so the bump-allocator machinery a
//! high-throughput JS toolchain needs would only add ceremony here.
//!
//! Type annotations and default-value expressions are stored as the raw
//! source text they were written with (`Option<String>`), never evaluated
//! or re-parsed into sub-expressions. Nothing downstream needs their
//! structure — the checker treats them as opaque, the stub generator prints
//! them back out verbatim, and Python type-checks them on the sandbox side.

mod expr;
mod operator;
mod pattern;
mod stmt;

pub use expr::{Comprehension, Constant, Expr, ExprKind, FStringPart, Keyword};
pub use operator::{BinOp, BoolOp, CmpOp, UnaryOp};
pub use pattern::{Pattern, PatternKind};
pub use stmt::{
    Assert, Assign, AugAssign, AnnAssign, ClassDef, ExceptHandler, For, FunctionDef, If, Import,
    ImportAlias, ImportFrom, MatchCase, Param, ParamKind, Raise, Stmt, StmtKind, Try, While, With,
    WithItem,
};

pub use scriptgate_span::{GetSpan, Position, Span};

/// The root of a parsed script: its statements in source order, plus the
/// split source lines every downstream component (checker, line mapper,
/// error context rendering) needs.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub source_lines: Vec<String>,
}

impl Program {
    pub fn new(body: Vec<Stmt>, source_lines: Vec<String>) -> Self {
        Self { body, source_lines }
    }
}
