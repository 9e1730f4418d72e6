//! The compatibility checker (C4): walks the entire AST and emits the
//! coded diagnostics of §4.3, plus the `features_used` tracking that
//! populates `CheckResult::info`.

use std::collections::BTreeSet;

use scriptgate_ast::{
    Comprehension, Expr, ExprKind, FStringPart, FunctionDef, Param, ParamKind, Pattern,
    PatternKind, Program, Stmt, StmtKind,
};
use scriptgate_diagnostics::{CheckMessage, CheckResult};
use scriptgate_span::GetSpan;

use crate::allowlist::{is_allowed_module, top_level_token};
use crate::declarations::{is_external_decorator, is_input_call, Declarations};

const MAX_LINES: usize = 200;

struct Ctx<'a> {
    decls: &'a Declarations,
    messages: Vec<CheckMessage>,
    used_names: std::collections::HashSet<String>,
    features: BTreeSet<&'static str>,
    /// Set while walking an `@external` function's body: nested forbidden
    /// constructs there must still surface their E0xx diagnostics
    /// (grail's `generic_visit` keeps recursing into a decorated
    /// function's body too), but the body isn't code that ever runs — it
    /// is stripped before execution — so it must not contribute to
    /// `features_used`.
    suppress_features: bool,
}

pub fn check(program: &Program, decls: &Declarations) -> CheckResult {
    log::debug!(
        "checking program ({} top-level statements, {} externals, {} inputs)",
        program.body.len(),
        decls.externals.len(),
        decls.inputs.len()
    );
    let mut ctx = Ctx {
        decls,
        messages: Vec::new(),
        used_names: std::collections::HashSet::new(),
        features: BTreeSet::new(),
        suppress_features: false,
    };

    for stmt in &program.body {
        walk_stmt(stmt, &mut ctx, true);
    }

    check_declaration_shapes(decls, &mut ctx);
    check_unused_declarations(decls, &mut ctx);
    check_final_statement(program, &mut ctx);

    let lines_of_code = program.source_lines.len();
    if lines_of_code > MAX_LINES {
        ctx.messages.push(CheckMessage::warning(
            "W004",
            format!("script is {lines_of_code} lines long; scripts over {MAX_LINES} lines are discouraged"),
            1,
            0,
        ));
    }

    ctx.messages.sort_by_key(|m| (m.line, m.column, m.code));

    CheckResult {
        messages: ctx.messages,
        externals_count: decls.externals.len(),
        inputs_count: decls.inputs.len(),
        lines_of_code,
        features_used: ctx.features.iter().map(|s| (*s).to_owned()).collect(),
    }
}

fn walk_stmt(stmt: &Stmt, ctx: &mut Ctx, is_top_level: bool) {
    let pos = stmt.span().start;
    match &stmt.kind {
        StmtKind::ClassDef(class) => {
            ctx.messages.push(CheckMessage::error(
                "E001",
                format!("class definitions are not allowed ({})", class.name),
                pos.line,
                pos.column,
            ));
            for base in &class.bases {
                walk_expr(base, ctx);
            }
            for kw in &class.keywords {
                walk_expr(&kw.value, ctx);
            }
            for s in &class.body {
                walk_stmt(s, ctx, false);
            }
        }
        StmtKind::FunctionDef(f) => {
            let is_external = is_top_level && has_external_decorator(f);
            if f.is_async && !is_external && !ctx.suppress_features {
                ctx.features.insert("async_await");
            }
            for d in &f.decorators {
                walk_expr(d, ctx);
            }
            for p in &f.params {
                walk_param(p, ctx);
            }
            if is_external {
                check_external_body_shape(f, pos.line, pos.column, ctx);
                // Still walk the body so nested forbidden constructs (a
                // stray `class`, `with`, `match`, ...) surface their own
                // diagnostics "anywhere" per §4.3, matching grail's
                // `generic_visit` continuing into a decorated function's
                // body. E006/E007 are already handled above and in
                // `check_declaration_shapes`, so this never duplicates
                // those; feature tracking is suppressed since this body
                // is stripped before execution and never actually runs.
                let outer_suppress = ctx.suppress_features;
                ctx.suppress_features = true;
                for s in &f.body {
                    walk_stmt(s, ctx, false);
                }
                ctx.suppress_features = outer_suppress;
            } else {
                for s in &f.body {
                    walk_stmt(s, ctx, false);
                }
            }
        }
        StmtKind::Return(Some(e)) | StmtKind::Expr(e) => walk_expr(e, ctx),
        StmtKind::Return(None) => {}
        StmtKind::Delete(targets) => {
            ctx.messages.push(CheckMessage::error(
                "E011",
                "'del' statements are not allowed",
                pos.line,
                pos.column,
            ));
            for t in targets {
                walk_expr(t, ctx);
            }
        }
        StmtKind::Assign(a) => {
            for t in &a.targets {
                walk_expr(t, ctx);
            }
            walk_expr(&a.value, ctx);
        }
        StmtKind::AugAssign(a) => {
            walk_expr(&a.target, ctx);
            walk_expr(&a.value, ctx);
        }
        StmtKind::AnnAssign(a) => {
            walk_expr(&a.target, ctx);
            if let Some(v) = &a.value {
                walk_expr(v, ctx);
            }
        }
        StmtKind::For(f) => {
            if !ctx.suppress_features {
                ctx.features.insert("for_loop");
            }
            walk_expr(&f.target, ctx);
            walk_expr(&f.iter, ctx);
            for s in &f.body {
                walk_stmt(s, ctx, false);
            }
            for s in &f.orelse {
                walk_stmt(s, ctx, false);
            }
        }
        StmtKind::While(w) => {
            walk_expr(&w.test, ctx);
            for s in &w.body {
                walk_stmt(s, ctx, false);
            }
            for s in &w.orelse {
                walk_stmt(s, ctx, false);
            }
        }
        StmtKind::If(i) => {
            walk_expr(&i.test, ctx);
            for s in &i.body {
                walk_stmt(s, ctx, false);
            }
            for s in &i.orelse {
                walk_stmt(s, ctx, false);
            }
        }
        StmtKind::With(w) => {
            ctx.messages.push(CheckMessage::error(
                "E003",
                "'with' statements are not allowed",
                pos.line,
                pos.column,
            ));
            for item in &w.items {
                walk_expr(&item.context_expr, ctx);
                if let Some(v) = &item.optional_vars {
                    walk_expr(v, ctx);
                }
            }
            for s in &w.body {
                walk_stmt(s, ctx, false);
            }
        }
        StmtKind::Raise(r) => {
            if let Some(e) = &r.exc {
                walk_expr(e, ctx);
            }
            if let Some(c) = &r.cause {
                walk_expr(c, ctx);
            }
        }
        StmtKind::Assert(a) => {
            walk_expr(&a.test, ctx);
            if let Some(m) = &a.msg {
                walk_expr(m, ctx);
            }
        }
        StmtKind::Try(t) => {
            for s in &t.body {
                walk_stmt(s, ctx, false);
            }
            for h in &t.handlers {
                if let Some(typ) = &h.typ {
                    walk_expr(typ, ctx);
                }
                for s in &h.body {
                    walk_stmt(s, ctx, false);
                }
            }
            for s in &t.orelse {
                walk_stmt(s, ctx, false);
            }
            for s in &t.finalbody {
                walk_stmt(s, ctx, false);
            }
        }
        StmtKind::Match { subject, cases } => {
            ctx.messages.push(CheckMessage::error(
                "E004",
                "'match' statements are not allowed",
                pos.line,
                pos.column,
            ));
            walk_expr(subject, ctx);
            for case in cases {
                walk_pattern(&case.pattern, ctx);
                if let Some(g) = &case.guard {
                    walk_expr(g, ctx);
                }
                for s in &case.body {
                    walk_stmt(s, ctx, false);
                }
            }
        }
        StmtKind::Global(_) => {
            ctx.messages.push(CheckMessage::error(
                "E009",
                "'global' statements are not allowed",
                pos.line,
                pos.column,
            ));
        }
        StmtKind::Nonlocal(_) => {
            ctx.messages.push(CheckMessage::error(
                "E010",
                "'nonlocal' statements are not allowed",
                pos.line,
                pos.column,
            ));
        }
        StmtKind::Import(import) => {
            // One E005 per `import a, b` statement naming every disallowed
            // alias, not one per alias: §4.3 phrases the trigger as "once
            // per import clause", and a single diagnostic already lists
            // every offending module the clause named.
            let bad: Vec<&str> = import
                .names
                .iter()
                .map(|a| top_level_token(&a.name))
                .filter(|n| !is_allowed_module(n))
                .collect();
            if !bad.is_empty() {
                ctx.messages.push(CheckMessage::error(
                    "E005",
                    format!("import of disallowed module(s): {}", bad.join(", ")),
                    pos.line,
                    pos.column,
                ));
            }
        }
        StmtKind::ImportFrom(import) => {
            let token = import.module.as_deref().map(top_level_token);
            let allowed = token.is_some_and(is_allowed_module);
            if !allowed {
                ctx.messages.push(CheckMessage::error(
                    "E005",
                    format!(
                        "import from disallowed module '{}'",
                        token.unwrap_or("<relative>")
                    ),
                    pos.line,
                    pos.column,
                ));
            }
        }
        StmtKind::Pass | StmtKind::Break | StmtKind::Continue => {}
    }
}

fn walk_param(p: &Param, ctx: &mut Ctx) {
    let _ = p;
    let _ = ctx;
}

fn walk_pattern(pattern: &Pattern, ctx: &mut Ctx) {
    match &pattern.kind {
        PatternKind::Wildcard | PatternKind::Capture(_) => {}
        PatternKind::Value(e) => walk_expr(e, ctx),
        PatternKind::Sequence(items) => items.iter().for_each(|p| walk_pattern(p, ctx)),
        PatternKind::Mapping(entries) => entries.iter().for_each(|(k, v)| {
            walk_expr(k, ctx);
            walk_pattern(v, ctx);
        }),
        PatternKind::Class { cls, patterns, kwd_patterns } => {
            walk_expr(cls, ctx);
            patterns.iter().for_each(|p| walk_pattern(p, ctx));
            kwd_patterns.iter().for_each(|(_, p)| walk_pattern(p, ctx));
        }
        PatternKind::Or(alts) => alts.iter().for_each(|p| walk_pattern(p, ctx)),
        PatternKind::As { pattern, .. } => walk_pattern(pattern, ctx),
    }
}

fn walk_comprehensions(gens: &[Comprehension], ctx: &mut Ctx) {
    for g in gens {
        walk_expr(&g.target, ctx);
        walk_expr(&g.iter, ctx);
        for i in &g.ifs {
            walk_expr(i, ctx);
        }
    }
}

fn walk_expr(expr: &Expr, ctx: &mut Ctx) {
    let pos = expr.span().start;
    match &expr.kind {
        ExprKind::Name(name) => {
            ctx.used_names.insert(name.clone());
        }
        ExprKind::Attribute { value, attr } => {
            ctx.used_names.insert(attr.clone());
            walk_expr(value, ctx);
        }
        ExprKind::Call { func, args, keywords } => {
            walk_expr(func, ctx);
            // `@external`/`Input(...)` calls are declarations, walked by
            // the declaration extractor; here we still record `func`'s
            // name use above (consistent with W002/W003 wanting every
            // *reference*, including the declaring call itself, to count
            // — a script that declares but never calls an external still
            // "names" it once via the decorator, handled separately).
            let _ = is_input_call(func);
            for a in args {
                walk_expr(a, ctx);
            }
            for k in keywords {
                walk_expr(&k.value, ctx);
            }
        }
        ExprKind::Lambda { params, body } => {
            ctx.messages.push(CheckMessage::error(
                "E012",
                "lambda expressions are not allowed",
                pos.line,
                pos.column,
            ));
            for p in params {
                walk_param(p, ctx);
            }
            walk_expr(body, ctx);
        }
        ExprKind::Await(inner) => walk_expr(inner, ctx),
        ExprKind::Yield(inner) => {
            ctx.messages.push(CheckMessage::error(
                "E002",
                "'yield' is not allowed",
                pos.line,
                pos.column,
            ));
            if let Some(i) = inner {
                walk_expr(i, ctx);
            }
        }
        ExprKind::YieldFrom(inner) => {
            ctx.messages.push(CheckMessage::error(
                "E002",
                "'yield from' is not allowed",
                pos.line,
                pos.column,
            ));
            walk_expr(inner, ctx);
        }
        ExprKind::ListComp { elt, generators } => {
            if !ctx.suppress_features {
                ctx.features.insert("list_comprehension");
            }
            walk_expr(elt, ctx);
            walk_comprehensions(generators, ctx);
        }
        ExprKind::SetComp { elt, generators } => {
            walk_expr(elt, ctx);
            walk_comprehensions(generators, ctx);
        }
        ExprKind::DictComp { key, value, generators } => {
            if !ctx.suppress_features {
                ctx.features.insert("dict_comprehension");
            }
            walk_expr(key, ctx);
            walk_expr(value, ctx);
            walk_comprehensions(generators, ctx);
        }
        ExprKind::GeneratorExp { elt, generators } => {
            walk_expr(elt, ctx);
            walk_comprehensions(generators, ctx);
        }
        ExprKind::BinOp { left, right, .. } => {
            walk_expr(left, ctx);
            walk_expr(right, ctx);
        }
        ExprKind::UnaryOp { operand, .. } => walk_expr(operand, ctx),
        ExprKind::BoolOp { values, .. } => values.iter().for_each(|v| walk_expr(v, ctx)),
        ExprKind::Compare { left, comparators, .. } => {
            walk_expr(left, ctx);
            comparators.iter().for_each(|c| walk_expr(c, ctx));
        }
        ExprKind::IfExp { test, body, orelse } => {
            walk_expr(test, ctx);
            walk_expr(body, ctx);
            walk_expr(orelse, ctx);
        }
        ExprKind::JoinedStr(parts) => {
            if !ctx.suppress_features {
                ctx.features.insert("f_string");
            }
            for part in parts {
                if let FStringPart::Expr { expr, .. } = part {
                    walk_expr(expr, ctx);
                }
            }
        }
        ExprKind::Tuple(items) | ExprKind::List(items) | ExprKind::SetLit(items) => {
            items.iter().for_each(|i| walk_expr(i, ctx));
        }
        ExprKind::Dict { keys, values } => {
            for k in keys.iter().flatten() {
                walk_expr(k, ctx);
            }
            values.iter().for_each(|v| walk_expr(v, ctx));
        }
        ExprKind::Subscript { value, slice } => {
            walk_expr(value, ctx);
            walk_expr(slice, ctx);
        }
        ExprKind::Slice { lower, upper, step } => {
            [lower, upper, step].into_iter().flatten().for_each(|e| walk_expr(e, ctx));
        }
        ExprKind::Starred(inner) => walk_expr(inner, ctx),
        ExprKind::NamedExpr { target, value } => {
            walk_expr(target, ctx);
            walk_expr(value, ctx);
        }
        ExprKind::Constant(_) => {}
    }
}

fn has_external_decorator(f: &FunctionDef) -> bool {
    f.decorators.iter().any(is_external_decorator)
}

/// E006/E007: re-walks the same top-level external nodes the extractor
/// saw, checking the shape invariants the extractor itself doesn't
/// enforce (it only records what it finds).
///
/// Deliberately one E006 per external, not one per missing
/// parameter/return annotation: §4.3 calls the trigger "external function
/// missing return or parameter annotation" (singular diagnostic per
/// external), and a caller fixing the first reported annotation gap would
/// otherwise have to re-run `check` repeatedly to discover the next one
/// the collapsed message already names in full.
fn check_declaration_shapes(decls: &Declarations, ctx: &mut Ctx) {
    for spec in decls.externals.values() {
        let missing_annotation =
            spec.return_type.is_none() || spec.parameters.iter().any(|p| p.type_annotation.is_none());
        if missing_annotation {
            ctx.messages.push(CheckMessage::error(
                "E006",
                format!("external '{}' is missing a parameter or return annotation", spec.name),
                spec.source_line,
                spec.source_column,
            ));
        }
    }
    for spec in decls.inputs.values() {
        if spec.type_annotation.is_none() {
            ctx.messages.push(CheckMessage::error(
                "E008",
                format!("input '{}' is missing a type annotation", spec.name),
                spec.source_line,
                spec.source_column,
            ));
        }
    }
}

/// E007 needs the actual function body, which isn't part of `ExternalSpec`
/// — called separately from the top-level statement walk below.
pub(crate) fn check_external_body_shape(f: &FunctionDef, line: u32, column: u32, ctx: &mut Ctx) {
    let body = &f.body;
    let rest = if matches!(
        body.first().map(|s| &s.kind),
        Some(StmtKind::Expr(Expr { kind: ExprKind::Constant(scriptgate_ast::Constant::Str(_)), .. }))
    ) {
        &body[1..]
    } else {
        &body[..]
    };
    let is_single_ellipsis = rest.len() == 1
        && matches!(
            &rest[0].kind,
            StmtKind::Expr(Expr { kind: ExprKind::Constant(scriptgate_ast::Constant::Ellipsis), .. })
        );
    if !is_single_ellipsis {
        ctx.messages.push(CheckMessage::error(
            "E007",
            format!("external '{}' body must be a single '...' (an optional docstring may precede it)", f.name),
            line,
            column,
        ));
    }
}

fn check_unused_declarations(decls: &Declarations, ctx: &mut Ctx) {
    for spec in decls.externals.values() {
        if !ctx.used_names.contains(&spec.name) {
            ctx.messages.push(CheckMessage::warning(
                "W002",
                format!("external '{}' is declared but never referenced", spec.name),
                spec.source_line,
                spec.source_column,
            ));
        }
    }
    for spec in decls.inputs.values() {
        if !ctx.used_names.contains(&spec.name) {
            ctx.messages.push(CheckMessage::warning(
                "W003",
                format!("input '{}' is declared but never referenced", spec.name),
                spec.source_line,
                spec.source_column,
            ));
        }
    }
}

fn check_final_statement(program: &Program, ctx: &mut Ctx) {
    let Some(last) = program.body.last() else { return };
    let StmtKind::Expr(e) = &last.kind else { return };
    let is_bare_literal = matches!(
        e.kind,
        ExprKind::List(_) | ExprKind::Dict { .. } | ExprKind::SetLit(_) | ExprKind::Tuple(_)
    );
    if is_bare_literal {
        let pos = last.span().start;
        ctx.messages.push(CheckMessage::warning(
            "W001",
            "final statement is a bare literal expression with no effect",
            pos.line,
            pos.column,
        ));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::declarations::extract_declarations;
    use scriptgate_parser::Parser;

    fn run_check(src: &str) -> CheckResult {
        let program = Parser::new(src).parse().unwrap().program;
        let decls = extract_declarations(&program).unwrap();
        check(&program, &decls)
    }

    #[test]
    fn flags_class_definition() {
        let result = run_check("class Foo:\n    pass\n");
        assert!(result.messages.iter().any(|m| m.code == "E001"));
    }

    #[test]
    fn flags_disallowed_import() {
        let result = run_check("import os\n");
        assert!(result.messages.iter().any(|m| m.code == "E005" && m.line == 1));
    }

    #[test]
    fn allows_host_and_typing_imports() {
        let result = run_check("from host import external, Input\nfrom typing import Any\n");
        assert!(!result.messages.iter().any(|m| m.code == "E005"));
    }

    #[test]
    fn flags_lambda_and_with_and_match() {
        let result = run_check(
            "f = lambda x: x\nwith open('f') as fh:\n    pass\nmatch f:\n    case _:\n        pass\n",
        );
        let codes: Vec<_> = result.messages.iter().map(|m| m.code).collect();
        assert!(codes.contains(&"E012"));
        assert!(codes.contains(&"E003"));
        assert!(codes.contains(&"E004"));
    }

    #[test]
    fn flags_forbidden_constructs_nested_inside_an_external_body() {
        let result = run_check(
            "from host import external\n@external\ndef f(x: int) -> int:\n    class Inner:\n        pass\n",
        );
        let codes: Vec<_> = result.messages.iter().map(|m| m.code).collect();
        assert!(codes.contains(&"E007"), "expected E007 for the non-ellipsis body, got {codes:?}");
        assert!(codes.contains(&"E001"), "expected E001 for the nested class, got {codes:?}");
    }

    #[test]
    fn external_body_contents_are_excluded_from_features_used() {
        let result = run_check(
            "from host import external\n@external\nasync def f(x: int) -> int:\n    for y in range(x):\n        pass\n",
        );
        assert!(!result.features_used.contains(&"for_loop".to_owned()));
        assert!(!result.features_used.contains(&"async_await".to_owned()));
    }

    #[test]
    fn warns_on_unused_input() {
        let result = run_check("x: int = Input(\"x\")\ny = 1\n");
        assert!(result.messages.iter().any(|m| m.code == "W003"));
    }

    #[test]
    fn tracks_feature_usage() {
        let result = run_check("xs = [n for n in range(3)]\nname = f\"{xs}\"\n");
        assert!(result.features_used.contains(&"list_comprehension".to_owned()));
        assert!(result.features_used.contains(&"f_string".to_owned()));
    }

    #[test]
    fn valid_trivial_double_script_has_no_errors() {
        let result = run_check(
            "from host import external, Input\nx: int = Input(\"x\")\n@external\nasync def double(n: int) -> int: ...\nresult = double(x)\n",
        );
        assert!(result.messages.iter().all(|m| m.severity != scriptgate_diagnostics::Severity::Error));
    }
}
