//! Declaration extraction (C3): walks only the top level of the module
//! body and records the `@external`-decorated functions and `Input(...)`
//! assignments a script declares.
//!
//! Nested occurrences — inside another function or class body — are
//! deliberately invisible here (P7, "nested-declaration immunity"); the
//! caller only ever sees this module iterate `program.body` one level
//! deep.

use indexmap::IndexMap;
use scriptgate_ast::{
    AnnAssign, Assign, Constant, Expr, ExprKind, FunctionDef, Program, Stmt, StmtKind,
};
use scriptgate_diagnostics::ParseError;
use scriptgate_span::GetSpan;
use serde::{Deserialize, Serialize};

pub use scriptgate_ast::ParamKind;

/// One parameter of a declared external function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub type_annotation: Option<String>,
    pub has_default: bool,
    /// Opaque textual representation of the default expression — never
    /// evaluated (§9's resolved Open Question: always store source text).
    pub default_repr: Option<String>,
    pub kind: ParamKind,
}

/// A declared `@external` / `@host.external` function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSpec {
    pub name: String,
    pub is_async: bool,
    pub parameters: Vec<ParameterSpec>,
    pub return_type: Option<String>,
    pub docstring: Option<String>,
    pub source_line: u32,
    pub source_column: u32,
}

/// A declared `name: T = Input("name"[, default=...])` top-level binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub type_annotation: Option<String>,
    pub default: Option<String>,
    pub required: bool,
    pub source_line: u32,
    pub source_column: u32,
    pub declared_name: Option<String>,
}

/// Everything the extractor collected from one module, in source
/// declaration order (hence `IndexMap`, not a `HashMap` or `BTreeMap` —
/// see the crate-level note in `SPEC_FULL.md` §3).
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub externals: IndexMap<String, ExternalSpec>,
    pub inputs: IndexMap<String, InputSpec>,
}

/// True for a bare `external` name or any `*.external` attribute access —
/// the decorator test never compares against a specific host module alias
/// (§9, "structural match").
pub fn is_external_decorator(expr: &Expr) -> bool {
    matches!(expr.kind.call_target_name(), Some("external"))
        && matches!(expr.kind, ExprKind::Name(_) | ExprKind::Attribute { .. })
}

/// True for a bare `Input(...)` or `*.Input(...)` call — same structural
/// match as [`is_external_decorator`].
pub fn is_input_call(call_target: &Expr) -> bool {
    matches!(call_target.kind.call_target_name(), Some("Input"))
        && matches!(call_target.kind, ExprKind::Name(_) | ExprKind::Attribute { .. })
}

pub fn extract_declarations(program: &Program) -> Result<Declarations, ParseError> {
    let mut decls = Declarations::default();
    for stmt in &program.body {
        match &stmt.kind {
            StmtKind::FunctionDef(f) if has_external_decorator(f) => {
                let spec = build_external_spec(stmt, f);
                decls.externals.insert(spec.name.clone(), spec);
            }
            StmtKind::AnnAssign(ann) => {
                if let Some(spec) = try_extract_input_annassign(stmt, ann)? {
                    decls.inputs.insert(spec.name.clone(), spec);
                }
            }
            StmtKind::Assign(assign) => {
                if let Some(spec) = try_extract_input_assign(stmt, assign)? {
                    decls.inputs.insert(spec.name.clone(), spec);
                }
            }
            _ => {}
        }
    }
    Ok(decls)
}

fn has_external_decorator(f: &FunctionDef) -> bool {
    f.decorators.iter().any(is_external_decorator)
}

fn build_external_spec(stmt: &Stmt, f: &FunctionDef) -> ExternalSpec {
    let parameters = f
        .params
        .iter()
        // `self` in positional-or-keyword position is an artifact of a
        // script accidentally shaping an external like a method; it is
        // dropped rather than surfaced as a real parameter (§4.2).
        .filter(|p| !(p.name == "self" && p.kind == ParamKind::PositionalOrKeyword))
        .map(|p| ParameterSpec {
            name: p.name.clone(),
            type_annotation: p.annotation.clone(),
            has_default: p.default.is_some(),
            default_repr: p.default.clone(),
            kind: p.kind,
        })
        .collect();
    let pos = stmt.span().start;
    ExternalSpec {
        name: f.name.clone(),
        is_async: f.is_async,
        parameters,
        return_type: f.returns.clone(),
        docstring: f.docstring.clone(),
        source_line: pos.line,
        source_column: pos.column,
    }
}

fn try_extract_input_annassign(
    stmt: &Stmt,
    ann: &AnnAssign,
) -> Result<Option<InputSpec>, ParseError> {
    if !ann.simple {
        return Ok(None);
    }
    let ExprKind::Name(target_name) = &ann.target.kind else { return Ok(None) };
    let Some(value) = &ann.value else { return Ok(None) };
    let ExprKind::Call { func, args, keywords } = &value.kind else { return Ok(None) };
    if !is_input_call(func) {
        return Ok(None);
    }
    build_input_spec(stmt, target_name, Some(ann.annotation.clone()), args, keywords)
}

fn try_extract_input_assign(stmt: &Stmt, assign: &Assign) -> Result<Option<InputSpec>, ParseError> {
    if assign.targets.len() != 1 {
        return Ok(None);
    }
    let ExprKind::Name(target_name) = &assign.targets[0].kind else { return Ok(None) };
    let ExprKind::Call { func, args, keywords } = &assign.value.kind else { return Ok(None) };
    if !is_input_call(func) {
        return Ok(None);
    }
    build_input_spec(stmt, target_name, None, args, keywords)
}

fn build_input_spec(
    stmt: &Stmt,
    target_name: &str,
    annotation: Option<String>,
    args: &[Expr],
    keywords: &[scriptgate_ast::Keyword],
) -> Result<Option<InputSpec>, ParseError> {
    let declared_name = match args.first().map(|e| &e.kind) {
        Some(ExprKind::Constant(Constant::Str(s))) => Some(s.clone()),
        _ => None,
    };
    if let Some(declared) = &declared_name {
        if !declared.is_empty() && declared != target_name {
            let pos = stmt.span().start;
            return Err(ParseError::new(
                format!(
                    "Input() name {declared:?} does not match assigned variable {target_name:?}"
                ),
                Some(pos.line),
                Some(pos.column),
            ));
        }
    }
    let default = keywords
        .iter()
        .find(|kw| kw.arg.as_deref() == Some("default"))
        .and_then(|kw| literal_repr(&kw.value));
    // A `default=` keyword whose value isn't a literal still leaves the
    // spec's default unrepresentable as text, so it's treated the same as
    // no default at all: required.
    let required = default.is_none();
    let pos = stmt.span().start;
    Ok(Some(InputSpec {
        name: target_name.to_owned(),
        type_annotation: annotation,
        default,
        required,
        source_line: pos.line,
        source_column: pos.column,
        declared_name,
    }))
}

/// Renders a literal `Constant` expression back to source text. Used only
/// for `Input(default=...)` values — non-literal defaults are treated as
/// absent (§4.2: "otherwise the spec's default is `None` and `required =
/// true`"), so this never needs to handle arbitrary expressions.
fn literal_repr(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Constant(Constant::None) => Some("None".to_owned()),
        ExprKind::Constant(Constant::Bool(b)) => Some(if *b { "True" } else { "False" }.to_owned()),
        ExprKind::Constant(Constant::Int { text, .. }) => Some(text.clone()),
        ExprKind::Constant(Constant::Float { text, .. }) => Some(text.clone()),
        ExprKind::Constant(Constant::Str(s)) => Some(python_str_repr(s)),
        ExprKind::Constant(Constant::Ellipsis) => Some("...".to_owned()),
        ExprKind::UnaryOp { op, operand } => {
            let inner = literal_repr(operand)?;
            Some(format!("{}{inner}", op.as_str()))
        }
        _ => None,
    }
}

fn python_str_repr(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use scriptgate_parser::Parser;

    fn parse(src: &str) -> Program {
        Parser::new(src).parse().unwrap().program
    }

    #[test]
    fn extracts_external_with_annotations() {
        let program = parse(
            "from host import external\n@external\nasync def double(n: int) -> int: ...\n",
        );
        let decls = extract_declarations(&program).unwrap();
        let spec = decls.externals.get("double").unwrap();
        assert!(spec.is_async);
        assert_eq!(spec.parameters.len(), 1);
        assert_eq!(spec.parameters[0].type_annotation.as_deref(), Some("int"));
        assert_eq!(spec.return_type.as_deref(), Some("int"));
    }

    #[test]
    fn extracts_input_with_matching_name() {
        let program = parse("x: int = Input(\"x\")\n");
        let decls = extract_declarations(&program).unwrap();
        let spec = decls.inputs.get("x").unwrap();
        assert!(spec.required);
        assert_eq!(spec.type_annotation.as_deref(), Some("int"));
    }

    #[test]
    fn rejects_mismatched_input_name() {
        let program = parse("budget: float = Input(\"totally_wrong\")\n");
        let err = extract_declarations(&program).unwrap_err();
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn ignores_nested_declarations() {
        let program = parse(
            "from host import external\ndef outer():\n    @external\n    def inner(x: int) -> str: ...\n    return inner(5)\n",
        );
        let decls = extract_declarations(&program).unwrap();
        assert!(decls.externals.is_empty());
    }

    #[test]
    fn input_default_literal_is_not_required() {
        let program = parse("x: int = Input(\"x\", default=5)\n");
        let decls = extract_declarations(&program).unwrap();
        let spec = decls.inputs.get("x").unwrap();
        assert!(!spec.required);
        assert_eq!(spec.default.as_deref(), Some("5"));
    }
}
