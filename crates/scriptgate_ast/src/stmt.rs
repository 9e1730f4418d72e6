use scriptgate_span::Span;

use crate::expr::Expr;
use crate::operator::BinOp;
use crate::pattern::Pattern;

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl scriptgate_span::GetSpan for Stmt {
    fn span(&self) -> Span {
        self.span
    }
}

/// `import a.b.c [as alias]`, one per name in an `import a, b as c`
/// statement.
#[derive(Debug, Clone)]
pub struct ImportAlias {
    pub name: String,
    pub as_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub names: Vec<ImportAlias>,
}

#[derive(Debug, Clone)]
pub struct ImportFrom {
    /// `None` for a relative-only import (`from . import x`); `level`
    /// carries the number of leading dots.
    pub module: Option<String>,
    pub level: u32,
    pub names: Vec<ImportAlias>,
}

/// The five parameter kinds Python distinguishes, in the order they must
/// appear in a signature. Mirrors the classification the declaration
/// extractor needs to assign each parameter a [`ParamKind`] tag on its
/// `ParameterSpec`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    /// Raw source text of the type annotation, if any — never parsed into
    /// an expression (see the crate-level docs).
    pub annotation: Option<String>,
    /// Raw source text of the default value expression, if any.
    pub default: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
    /// Raw source text of the return annotation, if any.
    pub returns: Option<String>,
    pub is_async: bool,
    pub docstring: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    pub keywords: Vec<crate::expr::Keyword>,
    pub body: Vec<Stmt>,
    pub decorators: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct Assign {
    pub targets: Vec<Expr>,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct AnnAssign {
    pub target: Expr,
    pub annotation: String,
    pub value: Option<Expr>,
    /// True when `target` is a bare name (`x: int = 1`) rather than an
    /// attribute or subscript target (`self.x: int = 1`), matching Python's
    /// `AnnAssign.simple` field — the declaration extractor only considers
    /// simple targets for `Input(...)` bindings.
    pub simple: bool,
}

#[derive(Debug, Clone)]
pub struct AugAssign {
    pub target: Expr,
    pub op: BinOp,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct For {
    pub target: Expr,
    pub iter: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
    pub is_async: bool,
}

#[derive(Debug, Clone)]
pub struct While {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct If {
    pub test: Expr,
    pub body: Vec<Stmt>,
    pub orelse: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct WithItem {
    pub context_expr: Expr,
    pub optional_vars: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct With {
    pub items: Vec<WithItem>,
    pub body: Vec<Stmt>,
    pub is_async: bool,
}

#[derive(Debug, Clone)]
pub struct Raise {
    pub exc: Option<Expr>,
    pub cause: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct Assert {
    pub test: Expr,
    pub msg: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct ExceptHandler {
    pub typ: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Try {
    pub body: Vec<Stmt>,
    pub handlers: Vec<ExceptHandler>,
    pub orelse: Vec<Stmt>,
    pub finalbody: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Import(Import),
    ImportFrom(ImportFrom),
    FunctionDef(FunctionDef),
    ClassDef(ClassDef),
    Return(Option<Expr>),
    Delete(Vec<Expr>),
    Assign(Assign),
    AugAssign(AugAssign),
    AnnAssign(AnnAssign),
    For(For),
    While(While),
    If(If),
    With(With),
    Raise(Raise),
    Assert(Assert),
    Try(Try),
    Match { subject: Expr, cases: Vec<MatchCase> },
    Global(Vec<String>),
    Nonlocal(Vec<String>),
    Expr(Expr),
    Pass,
    Break,
    Continue,
}
