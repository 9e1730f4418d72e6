//! Turns a (post-strip) AST back into source text.
//!
//! The output does not have to match the original script's formatting —
//! §1 is explicit that only line-to-line *semantic* mapping is
//! guaranteed, not formatting — but it does have to re-parse as valid
//! subset syntax (§4.4: "if it does not, the stripper fails fatally").
//! Each statement is printed starting on its own line so the line-map
//! construction in `linemap_build` can rely on "one top-level-ish
//! statement per source line" holding for simple scripts; nested blocks
//! indent by four spaces, matching the convention every example script in
//! this crate's tests is written in.

use scriptgate_ast::{
    Comprehension, Constant, Expr, ExprKind, FStringPart, Keyword, Param, ParamKind, Pattern,
    PatternKind, Stmt, StmtKind,
};

pub fn unparse_program(body: &[Stmt]) -> String {
    let mut printer = Printer::default();
    printer.block(body);
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, stmts: &[Stmt]) {
        if stmts.is_empty() {
            self.line("pass");
            return;
        }
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn indented(&mut self, stmts: &[Stmt]) {
        self.indent += 1;
        self.block(stmts);
        self.indent -= 1;
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Import(import) => {
                let names: Vec<String> = import.names.iter().map(fmt_alias).collect();
                self.line(&format!("import {}", names.join(", ")));
            }
            StmtKind::ImportFrom(import) => {
                let dots = ".".repeat(import.level as usize);
                let module = import.module.as_deref().unwrap_or("");
                let names: Vec<String> = import.names.iter().map(fmt_alias).collect();
                self.line(&format!("from {dots}{module} import {}", names.join(", ")));
            }
            StmtKind::FunctionDef(f) => {
                for d in &f.decorators {
                    self.line(&format!("@{}", expr(d)));
                }
                let kw = if f.is_async { "async def" } else { "def" };
                let params = fmt_params(&f.params);
                let returns = f.returns.as_deref().map_or_else(String::new, |r| format!(" -> {r}"));
                self.line(&format!("{kw} {}({params}){returns}:", f.name));
                self.indented(&f.body);
            }
            StmtKind::ClassDef(c) => {
                for d in &c.decorators {
                    self.line(&format!("@{}", expr(d)));
                }
                let mut parts: Vec<String> = c.bases.iter().map(expr).collect();
                parts.extend(c.keywords.iter().map(fmt_keyword));
                let args = if parts.is_empty() { String::new() } else { format!("({})", parts.join(", ")) };
                self.line(&format!("class {}{args}:", c.name));
                self.indented(&c.body);
            }
            StmtKind::Return(value) => {
                self.line(&value.as_ref().map_or_else(|| "return".to_owned(), |v| format!("return {}", expr(v))));
            }
            StmtKind::Delete(targets) => {
                let items: Vec<String> = targets.iter().map(expr).collect();
                self.line(&format!("del {}", items.join(", ")));
            }
            StmtKind::Assign(a) => {
                let targets: Vec<String> = a.targets.iter().map(expr).collect();
                self.line(&format!("{} = {}", targets.join(" = "), expr(&a.value)));
            }
            StmtKind::AugAssign(a) => {
                self.line(&format!("{} {}= {}", expr(&a.target), a.op.as_str(), expr(&a.value)));
            }
            StmtKind::AnnAssign(a) => {
                let value = a.value.as_ref().map_or_else(String::new, |v| format!(" = {}", expr(v)));
                self.line(&format!("{}: {}{value}", expr(&a.target), a.annotation));
            }
            StmtKind::For(f) => {
                let kw = if f.is_async { "async for" } else { "for" };
                self.line(&format!("{kw} {} in {}:", expr(&f.target), expr(&f.iter)));
                self.indented(&f.body);
                if !f.orelse.is_empty() {
                    self.line("else:");
                    self.indented(&f.orelse);
                }
            }
            StmtKind::While(w) => {
                self.line(&format!("while {}:", expr(&w.test)));
                self.indented(&w.body);
                if !w.orelse.is_empty() {
                    self.line("else:");
                    self.indented(&w.orelse);
                }
            }
            StmtKind::If(i) => {
                self.line(&format!("if {}:", expr(&i.test)));
                self.indented(&i.body);
                self.elif_or_else(&i.orelse);
            }
            StmtKind::With(w) => {
                let kw = if w.is_async { "async with" } else { "with" };
                let items: Vec<String> = w
                    .items
                    .iter()
                    .map(|item| {
                        item.optional_vars.as_ref().map_or_else(
                            || expr(&item.context_expr),
                            |v| format!("{} as {}", expr(&item.context_expr), expr(v)),
                        )
                    })
                    .collect();
                self.line(&format!("{kw} {}:", items.join(", ")));
                self.indented(&w.body);
            }
            StmtKind::Raise(r) => {
                let mut text = "raise".to_owned();
                if let Some(e) = &r.exc {
                    text.push(' ');
                    text.push_str(&expr(e));
                }
                if let Some(c) = &r.cause {
                    text.push_str(&format!(" from {}", expr(c)));
                }
                self.line(&text);
            }
            StmtKind::Assert(a) => {
                let msg = a.msg.as_ref().map_or_else(String::new, |m| format!(", {}", expr(m)));
                self.line(&format!("assert {}{msg}", expr(&a.test)));
            }
            StmtKind::Try(t) => {
                self.line("try:");
                self.indented(&t.body);
                for h in &t.handlers {
                    let mut header = "except".to_owned();
                    if let Some(typ) = &h.typ {
                        header.push(' ');
                        header.push_str(&expr(typ));
                        if let Some(name) = &h.name {
                            header.push_str(&format!(" as {name}"));
                        }
                    }
                    header.push(':');
                    self.line(&header);
                    self.indented(&h.body);
                }
                if !t.orelse.is_empty() {
                    self.line("else:");
                    self.indented(&t.orelse);
                }
                if !t.finalbody.is_empty() {
                    self.line("finally:");
                    self.indented(&t.finalbody);
                }
            }
            StmtKind::Match { subject, cases } => {
                self.line(&format!("match {}:", expr(subject)));
                self.indent += 1;
                for case in cases {
                    let guard = case.guard.as_ref().map_or_else(String::new, |g| format!(" if {}", expr(g)));
                    self.line(&format!("case {}{guard}:", pattern(&case.pattern)));
                    self.indented(&case.body);
                }
                self.indent -= 1;
            }
            StmtKind::Global(names) => self.line(&format!("global {}", names.join(", "))),
            StmtKind::Nonlocal(names) => self.line(&format!("nonlocal {}", names.join(", "))),
            StmtKind::Expr(e) => self.line(&expr(e)),
            StmtKind::Pass => self.line("pass"),
            StmtKind::Break => self.line("break"),
            StmtKind::Continue => self.line("continue"),
        }
    }

    fn elif_or_else(&mut self, orelse: &[Stmt]) {
        if orelse.len() == 1 {
            if let StmtKind::If(nested) = &orelse[0].kind {
                self.line(&format!("elif {}:", expr(&nested.test)));
                self.indented(&nested.body);
                self.elif_or_else(&nested.orelse);
                return;
            }
        }
        if !orelse.is_empty() {
            self.line("else:");
            self.indented(orelse);
        }
    }
}

fn fmt_alias(alias: &scriptgate_ast::ImportAlias) -> String {
    alias.as_name.as_ref().map_or_else(|| alias.name.clone(), |a| format!("{} as {a}", alias.name))
}

fn fmt_keyword(kw: &Keyword) -> String {
    kw.arg.as_ref().map_or_else(|| format!("**{}", expr(&kw.value)), |a| format!("{a}={}", expr(&kw.value)))
}

fn fmt_params(params: &[Param]) -> String {
    let mut parts = Vec::with_capacity(params.len());
    let mut emitted_slash_boundary = false;
    let mut emitted_star = false;
    for (i, p) in params.iter().enumerate() {
        if p.kind == ParamKind::PositionalOnly {
            emitted_slash_boundary = true;
        } else if emitted_slash_boundary {
            parts.push("/".to_owned());
            emitted_slash_boundary = false;
        }
        if p.kind == ParamKind::KeywordOnly && !emitted_star {
            parts.push("*".to_owned());
            emitted_star = true;
        }
        let mut text = match p.kind {
            ParamKind::VarPositional => format!("*{}", p.name),
            ParamKind::VarKeyword => format!("**{}", p.name),
            _ => p.name.clone(),
        };
        if let Some(ann) = &p.annotation {
            text.push_str(&format!(": {ann}"));
        }
        if let Some(default) = &p.default {
            text.push_str(&format!(" = {default}"));
        }
        parts.push(text);
        let _ = i;
    }
    if emitted_slash_boundary {
        parts.push("/".to_owned());
    }
    parts.join(", ")
}

fn pattern(p: &Pattern) -> String {
    match &p.kind {
        PatternKind::Wildcard => "_".to_owned(),
        PatternKind::Capture(name) => name.clone(),
        PatternKind::Value(e) => expr(e),
        PatternKind::Sequence(items) => format!("[{}]", items.iter().map(pattern).collect::<Vec<_>>().join(", ")),
        PatternKind::Mapping(entries) => format!(
            "{{{}}}",
            entries.iter().map(|(k, v)| format!("{}: {}", expr(k), pattern(v))).collect::<Vec<_>>().join(", ")
        ),
        PatternKind::Class { cls, patterns, kwd_patterns } => {
            let mut parts: Vec<String> = patterns.iter().map(pattern).collect();
            parts.extend(kwd_patterns.iter().map(|(k, v)| format!("{k}={}", pattern(v))));
            format!("{}({})", expr(cls), parts.join(", "))
        }
        PatternKind::Or(alts) => alts.iter().map(pattern).collect::<Vec<_>>().join(" | "),
        PatternKind::As { pattern: inner, name } => {
            let name = name.as_deref().unwrap_or("_");
            format!("{} as {name}", pattern(inner))
        }
    }
}

pub(crate) fn expr(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Constant(c) => constant(c),
        ExprKind::Name(name) => name.clone(),
        ExprKind::Attribute { value, attr } => format!("{}.{attr}", expr(value)),
        ExprKind::Call { func, args, keywords } => {
            let mut parts: Vec<String> = args.iter().map(expr).collect();
            parts.extend(keywords.iter().map(fmt_keyword));
            format!("{}({})", expr(func), parts.join(", "))
        }
        ExprKind::Lambda { params, body } => format!("lambda {}: {}", fmt_params(params), expr(body)),
        ExprKind::Await(inner) => format!("await {}", expr(inner)),
        ExprKind::Yield(inner) => inner.as_ref().map_or_else(|| "yield".to_owned(), |v| format!("yield {}", expr(v))),
        ExprKind::YieldFrom(inner) => format!("yield from {}", expr(inner)),
        ExprKind::ListComp { elt, generators } => format!("[{} {}]", expr(elt), comprehensions(generators)),
        ExprKind::SetComp { elt, generators } => format!("{{{} {}}}", expr(elt), comprehensions(generators)),
        ExprKind::DictComp { key, value, generators } => {
            format!("{{{}: {} {}}}", expr(key), expr(value), comprehensions(generators))
        }
        ExprKind::GeneratorExp { elt, generators } => format!("({} {})", expr(elt), comprehensions(generators)),
        ExprKind::BinOp { left, op, right } => format!("({} {} {})", expr(left), op.as_str(), expr(right)),
        ExprKind::UnaryOp { op, operand } => format!("{}{}", op.as_str(), expr(operand)),
        ExprKind::BoolOp { op, values } => {
            let parts: Vec<String> = values.iter().map(expr).collect();
            format!("({})", parts.join(&format!(" {} ", op.as_str())))
        }
        ExprKind::Compare { left, ops, comparators } => {
            let mut text = expr(left);
            for (op, rhs) in ops.iter().zip(comparators) {
                text.push_str(&format!(" {} {}", op.as_str(), expr(rhs)));
            }
            format!("({text})")
        }
        ExprKind::IfExp { test, body, orelse } => {
            format!("({} if {} else {})", expr(body), expr(test), expr(orelse))
        }
        ExprKind::JoinedStr(parts) => fstring(parts),
        ExprKind::Tuple(items) => {
            if items.is_empty() {
                "()".to_owned()
            } else if items.len() == 1 {
                format!("({},)", expr(&items[0]))
            } else {
                format!("({})", items.iter().map(expr).collect::<Vec<_>>().join(", "))
            }
        }
        ExprKind::List(items) => format!("[{}]", items.iter().map(expr).collect::<Vec<_>>().join(", ")),
        ExprKind::SetLit(items) => format!("{{{}}}", items.iter().map(expr).collect::<Vec<_>>().join(", ")),
        ExprKind::Dict { keys, values } => {
            let parts: Vec<String> = keys
                .iter()
                .zip(values)
                .map(|(k, v)| k.as_ref().map_or_else(|| format!("**{}", expr(v)), |k| format!("{}: {}", expr(k), expr(v))))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        ExprKind::Subscript { value, slice } => format!("{}[{}]", expr(value), expr(slice)),
        ExprKind::Slice { lower, upper, step } => {
            let l = lower.as_ref().map_or_else(String::new, |e| expr(e));
            let u = upper.as_ref().map_or_else(String::new, |e| expr(e));
            match step {
                Some(s) => format!("{l}:{u}:{}", expr(s)),
                None => format!("{l}:{u}"),
            }
        }
        ExprKind::Starred(inner) => format!("*{}", expr(inner)),
        ExprKind::NamedExpr { target, value } => format!("({} := {})", expr(target), expr(value)),
    }
}

fn comprehensions(gens: &[Comprehension]) -> String {
    gens.iter()
        .map(|g| {
            let kw = if g.is_async { "async for" } else { "for" };
            let mut text = format!("{kw} {} in {}", expr(&g.target), expr(&g.iter));
            for cond in &g.ifs {
                text.push_str(&format!(" if {}", expr(cond)));
            }
            text
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn fstring(parts: &[FStringPart]) -> String {
    let mut body = String::new();
    for part in parts {
        match part {
            FStringPart::Literal(s) => body.push_str(&s.replace('{', "{{").replace('}', "}}")),
            FStringPart::Expr { expr: e, conversion, format_spec } => {
                body.push('{');
                body.push_str(&expr(e));
                if let Some(c) = conversion {
                    body.push('!');
                    body.push(*c);
                }
                if let Some(spec) = format_spec {
                    body.push(':');
                    body.push_str(spec);
                }
                body.push('}');
            }
        }
    }
    format!("f{body:?}")
}

fn constant(c: &Constant) -> String {
    match c {
        Constant::None => "None".to_owned(),
        Constant::Bool(b) => if *b { "True" } else { "False" }.to_owned(),
        Constant::Int { text, .. } => text.clone(),
        Constant::Float { text, .. } => text.clone(),
        Constant::Str(s) => format!("{s:?}"),
        Constant::Bytes(b) => format!("b{:?}", String::from_utf8_lossy(b)),
        Constant::Ellipsis => "...".to_owned(),
    }
}
