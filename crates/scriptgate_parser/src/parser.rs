//! The recursive-descent statement and expression parser.
//!
//! Organized as one function per grammar production, the same way
//! `oxc_parser` lays out its statement/expression parsing rather than
//! driving everything off a generic Pratt-parser table — it reads closer to
//! the grammar it implements, which matters more here than raw parsing
//! throughput.

use scriptgate_ast::{
    Assert, Assign, AnnAssign, AugAssign, BinOp, BoolOp, ClassDef, CmpOp, Comprehension, Constant,
    ExceptHandler, Expr, ExprKind, FStringPart, For, FunctionDef, If, Import, ImportAlias,
    ImportFrom, Keyword, MatchCase, Param, ParamKind, Pattern, PatternKind, Raise, Stmt, StmtKind,
    Try, UnaryOp, While, With, WithItem,
};
use scriptgate_span::{Position, SourceText, Span};

use crate::lexer::{Kind, Token};
use crate::literal::{self, FStringPartRaw};
use crate::{unexpected_token, ParseError};

pub struct StmtParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: SourceText,
    _phantom: std::marker::PhantomData<&'a str>,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> StmtParser<'a> {
    pub fn new(tokens: &'a [Token], source: &'a str) -> Self {
        Self { tokens, pos: 0, source: SourceText::new(source), _phantom: std::marker::PhantomData }
    }

    // --- token stream helpers -------------------------------------------------

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn cur_kind(&self) -> Kind {
        self.cur().kind
    }

    fn at(&self, kind: Kind) -> bool {
        self.cur_kind() == kind
    }

    fn at_ident(&self, text: &str) -> bool {
        self.cur_kind() == Kind::Ident && self.cur().text == text
    }

    fn advance(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: Kind) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(unexpected_token(self.cur()))
        }
    }

    /// Skips blank logical lines (bare `Newline` tokens), which appear
    /// between statements at every block level.
    fn skip_blank_lines(&mut self) {
        while self.at(Kind::Newline) {
            self.advance();
        }
    }

    fn is_eof(&self) -> bool {
        self.at(Kind::Eof)
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let pos = self.cur().start;
        ParseError::new(message.into(), Some(pos.line), Some(pos.column))
    }

    // --- module / block --------------------------------------------------------

    pub fn parse_module(&mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        self.skip_blank_lines();
        while !self.is_eof() {
            body.push(self.parse_statement()?);
            self.skip_blank_lines();
        }
        Ok(body)
    }

    /// Parses a `:` suite, either an indented block or a one-line suite
    /// (`if x: y = 1`).
    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.eat(Kind::Colon)?;
        if self.at(Kind::Newline) {
            self.advance();
            self.skip_blank_lines();
            self.eat(Kind::Indent)?;
            let mut body = Vec::new();
            self.skip_blank_lines();
            while !self.at(Kind::Dedent) {
                body.push(self.parse_statement()?);
                self.skip_blank_lines();
            }
            self.eat(Kind::Dedent)?;
            Ok(body)
        } else {
            self.parse_simple_stmt_line()
        }
    }

    // --- statements --------------------------------------------------------

    fn parse_statement(&mut self) -> PResult<Stmt> {
        match self.cur_kind() {
            Kind::At => self.parse_decorated(),
            Kind::Def => self.parse_function_def(false),
            Kind::Async => self.parse_async_stmt(),
            Kind::Class => self.parse_class_def(),
            Kind::If => self.parse_if(),
            Kind::While => self.parse_while(),
            Kind::For => self.parse_for(false),
            Kind::Try => self.parse_try(),
            Kind::With => self.parse_with(false),
            Kind::Ident if self.at_ident("match") && self.looks_like_match_header() => {
                self.parse_match()
            }
            _ => {
                let mut stmts = self.parse_simple_stmt_line()?;
                if stmts.len() == 1 {
                    Ok(stmts.remove(0))
                } else {
                    // Multiple `;`-separated simple statements on one
                    // logical line collapse to their own statements in
                    // `body` rather than being wrapped — the caller
                    // flattens via `parse_simple_stmt_line` already
                    // returning a `Vec`, so this branch only triggers from
                    // `parse_statement`'s single-statement callers; wrap
                    // the rest behind a synthetic no-op boundary isn't
                    // needed since `parse_module`/`parse_block` call
                    // `parse_simple_stmt_line` directly for their simple
                    // case. Here we only ever see a single statement.
                    Ok(stmts.remove(0))
                }
            }
        }
    }

    /// A crude lookahead: does the line starting at the current `match`
    /// token look like `match <expr>:` rather than a use of `match` as an
    /// ordinary identifier? `match` and `case` are soft keywords in Python;
    /// this parser resolves the ambiguity by scanning forward on the same
    /// logical line for a bracket-depth-zero `:` immediately followed by a
    /// `Newline`.
    fn looks_like_match_header(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos + 1;
        while let Some(tok) = self.tokens.get(i) {
            match tok.kind {
                Kind::Newline if depth == 0 => return false,
                Kind::LParen | Kind::LBracket | Kind::LBrace => depth += 1,
                Kind::RParen | Kind::RBracket | Kind::RBrace => depth -= 1,
                Kind::Colon if depth == 0 => {
                    return matches!(
                        self.tokens.get(i + 1).map(|t| t.kind),
                        Some(Kind::Newline)
                    );
                }
                Kind::Eq | Kind::Semi if depth == 0 => return false,
                _ => {}
            }
            i += 1;
        }
        false
    }

    fn parse_simple_stmt_line(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![self.parse_simple_stmt()?];
        while self.at(Kind::Semi) {
            self.advance();
            if self.at(Kind::Newline) || self.is_eof() {
                break;
            }
            stmts.push(self.parse_simple_stmt()?);
        }
        if self.at(Kind::Newline) {
            self.advance();
        }
        Ok(stmts)
    }

    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let start = self.cur().start;
        let kind = match self.cur_kind() {
            Kind::Pass => {
                self.advance();
                StmtKind::Pass
            }
            Kind::Break => {
                self.advance();
                StmtKind::Break
            }
            Kind::Continue => {
                self.advance();
                StmtKind::Continue
            }
            Kind::Global => {
                self.advance();
                StmtKind::Global(self.parse_name_list()?)
            }
            Kind::Nonlocal => {
                self.advance();
                StmtKind::Nonlocal(self.parse_name_list()?)
            }
            Kind::Del => {
                self.advance();
                let mut targets = vec![self.parse_expr()?];
                while self.at(Kind::Comma) {
                    self.advance();
                    if matches!(self.cur_kind(), Kind::Newline | Kind::Semi) {
                        break;
                    }
                    targets.push(self.parse_expr()?);
                }
                StmtKind::Delete(targets)
            }
            Kind::Return => {
                self.advance();
                let value = if matches!(self.cur_kind(), Kind::Newline | Kind::Semi) {
                    None
                } else {
                    Some(self.parse_testlist()?)
                };
                StmtKind::Return(value)
            }
            Kind::Raise => {
                self.advance();
                let (exc, cause) = if matches!(self.cur_kind(), Kind::Newline | Kind::Semi) {
                    (None, None)
                } else {
                    let exc = self.parse_expr()?;
                    let cause = if self.at(Kind::From) {
                        self.advance();
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    (Some(exc), cause)
                };
                StmtKind::Raise(Raise { exc, cause })
            }
            Kind::Assert => {
                self.advance();
                let test = self.parse_test()?;
                let msg = if self.at(Kind::Comma) {
                    self.advance();
                    Some(self.parse_test()?)
                } else {
                    None
                };
                StmtKind::Assert(Assert { test, msg })
            }
            Kind::Import => {
                self.advance();
                StmtKind::Import(Import { names: self.parse_import_alias_list()? })
            }
            Kind::From => {
                self.advance();
                let mut level = 0u32;
                while self.at(Kind::Dot) || self.at(Kind::Ellipsis) {
                    level += if self.at(Kind::Ellipsis) { 3 } else { 1 };
                    self.advance();
                }
                let module = if self.at(Kind::Import) { None } else { Some(self.parse_dotted_name()?) };
                self.eat(Kind::Import)?;
                let names = if self.at(Kind::Star) {
                    self.advance();
                    vec![ImportAlias { name: "*".to_owned(), as_name: None }]
                } else if self.at(Kind::LParen) {
                    self.advance();
                    let names = self.parse_import_alias_list()?;
                    self.eat(Kind::RParen)?;
                    names
                } else {
                    self.parse_import_alias_list()?
                };
                StmtKind::ImportFrom(ImportFrom { module, level, names })
            }
            _ => return self.parse_expr_or_assign_stmt(),
        };
        let end = self.prev_end();
        Ok(Stmt::new(kind, Span::new(start, end)))
    }

    fn prev_end(&self) -> Position {
        self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].end
    }

    fn parse_name_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.eat(Kind::Ident)?.text];
        while self.at(Kind::Comma) {
            self.advance();
            names.push(self.eat(Kind::Ident)?.text);
        }
        Ok(names)
    }

    fn parse_dotted_name(&mut self) -> PResult<String> {
        let mut name = self.eat(Kind::Ident)?.text;
        while self.at(Kind::Dot) {
            self.advance();
            name.push('.');
            name.push_str(&self.eat(Kind::Ident)?.text);
        }
        Ok(name)
    }

    fn parse_import_alias_list(&mut self) -> PResult<Vec<ImportAlias>> {
        let mut names = vec![self.parse_import_alias()?];
        while self.at(Kind::Comma) {
            self.advance();
            if matches!(self.cur_kind(), Kind::Newline | Kind::RParen) {
                break;
            }
            names.push(self.parse_import_alias()?);
        }
        Ok(names)
    }

    fn parse_import_alias(&mut self) -> PResult<ImportAlias> {
        let name = self.parse_dotted_name()?;
        let as_name = if self.at(Kind::As) {
            self.advance();
            Some(self.eat(Kind::Ident)?.text)
        } else {
            None
        };
        Ok(ImportAlias { name, as_name })
    }

    fn parse_expr_or_assign_stmt(&mut self) -> PResult<Stmt> {
        let start = self.cur().start;
        let first = self.parse_testlist_star()?;

        if self.at(Kind::Colon) {
            self.advance();
            let annotation = self.capture_raw_text_until(&[Kind::Eq, Kind::Newline, Kind::Semi]);
            let value = if self.at(Kind::Eq) {
                self.advance();
                Some(self.parse_testlist()?)
            } else {
                None
            };
            let simple = matches!(first.kind, ExprKind::Name(_));
            let end = self.prev_end();
            return Ok(Stmt::new(
                StmtKind::AnnAssign(AnnAssign { target: first, annotation, value, simple }),
                Span::new(start, end),
            ));
        }

        if let Some(op) = aug_assign_op(self.cur_kind()) {
            self.advance();
            let value = self.parse_testlist()?;
            let end = self.prev_end();
            return Ok(Stmt::new(
                StmtKind::AugAssign(AugAssign { target: first, op, value }),
                Span::new(start, end),
            ));
        }

        if self.at(Kind::Eq) {
            let mut targets = vec![first];
            let mut value = None;
            while self.at(Kind::Eq) {
                self.advance();
                let next = self.parse_testlist_star()?;
                if self.at(Kind::Eq) {
                    targets.push(next);
                } else {
                    value = Some(next);
                }
            }
            let value = value.ok_or_else(|| self.error_here("expected expression after '='"))?;
            let end = self.prev_end();
            return Ok(Stmt::new(
                StmtKind::Assign(Assign { targets, value }),
                Span::new(start, end),
            ));
        }

        let end = self.prev_end();
        Ok(Stmt::new(StmtKind::Expr(first), Span::new(start, end)))
    }

    // --- compound statements -------------------------------------------------

    fn parse_decorated(&mut self) -> PResult<Stmt> {
        let mut decorators = Vec::new();
        while self.at(Kind::At) {
            self.advance();
            decorators.push(self.parse_test()?);
            self.skip_blank_lines();
        }
        let mut stmt = match self.cur_kind() {
            Kind::Def => self.parse_function_def(false)?,
            Kind::Async => self.parse_async_stmt()?,
            Kind::Class => self.parse_class_def()?,
            _ => return Err(self.error_here("expected function or class definition after decorator")),
        };
        match &mut stmt.kind {
            StmtKind::FunctionDef(f) => f.decorators = decorators,
            StmtKind::ClassDef(c) => c.decorators = decorators,
            _ => {}
        }
        Ok(stmt)
    }

    fn parse_async_stmt(&mut self) -> PResult<Stmt> {
        self.advance();
        match self.cur_kind() {
            Kind::Def => self.parse_function_def(true),
            Kind::For => self.parse_for(true),
            Kind::With => self.parse_with(true),
            _ => Err(self.error_here("expected 'def', 'for' or 'with' after 'async'")),
        }
    }

    fn parse_function_def(&mut self, is_async: bool) -> PResult<Stmt> {
        let start = self.cur().start;
        self.eat(Kind::Def)?;
        let name = self.eat(Kind::Ident)?.text;
        self.eat(Kind::LParen)?;
        let params = self.parse_param_list(Kind::RParen)?;
        self.eat(Kind::RParen)?;
        let returns = if self.at(Kind::Arrow) {
            self.advance();
            Some(self.capture_raw_text_until(&[Kind::Colon]))
        } else {
            None
        };
        let body = self.parse_block()?;
        let docstring = extract_docstring(&body);
        let end = self.prev_end();
        Ok(Stmt::new(
            StmtKind::FunctionDef(FunctionDef {
                name,
                params,
                body,
                decorators: Vec::new(),
                returns,
                is_async,
                docstring,
            }),
            Span::new(start, end),
        ))
    }

    fn parse_param_list(&mut self, terminator: Kind) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        let mut seen_star = false;
        let mut seen_star_star = false;
        while !self.at(terminator) {
            let start = self.cur().start;
            if self.at(Kind::Star) {
                self.advance();
                if self.at(Kind::Comma) || self.at(terminator) {
                    // bare `*` keyword-only marker
                    seen_star = true;
                } else {
                    let name = self.eat(Kind::Ident)?.text;
                    let annotation = self.maybe_parse_annotation()?;
                    let end = self.prev_end();
                    params.push(Param {
                        name,
                        kind: ParamKind::VarPositional,
                        annotation,
                        default: None,
                        span: Span::new(start, end),
                    });
                    seen_star = true;
                }
            } else if self.at(Kind::Pow) {
                self.advance();
                let name = self.eat(Kind::Ident)?.text;
                let annotation = self.maybe_parse_annotation()?;
                let end = self.prev_end();
                params.push(Param {
                    name,
                    kind: ParamKind::VarKeyword,
                    annotation,
                    default: None,
                    span: Span::new(start, end),
                });
                seen_star_star = true;
            } else if self.at(Kind::Slash) {
                self.advance();
                for p in &mut params {
                    if p.kind == ParamKind::PositionalOrKeyword {
                        p.kind = ParamKind::PositionalOnly;
                    }
                }
            } else {
                let name = self.eat(Kind::Ident)?.text;
                let annotation = self.maybe_parse_annotation()?;
                let default = if self.at(Kind::Eq) {
                    self.advance();
                    Some(self.capture_raw_text_until(&[Kind::Comma, terminator]))
                } else {
                    None
                };
                let kind = if seen_star_star {
                    return Err(self.error_here("parameter after **kwargs"));
                } else if seen_star {
                    ParamKind::KeywordOnly
                } else {
                    ParamKind::PositionalOrKeyword
                };
                let end = self.prev_end();
                params.push(Param { name, kind, annotation, default, span: Span::new(start, end) });
            }

            if self.at(Kind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(params)
    }

    fn maybe_parse_annotation(&mut self) -> PResult<Option<String>> {
        if self.at(Kind::Colon) {
            self.advance();
            Ok(Some(self.capture_raw_text_until(&[Kind::Comma, Kind::Eq, Kind::RParen])))
        } else {
            Ok(None)
        }
    }

    fn parse_class_def(&mut self) -> PResult<Stmt> {
        let start = self.cur().start;
        self.eat(Kind::Class)?;
        let name = self.eat(Kind::Ident)?.text;
        let mut bases = Vec::new();
        let mut keywords = Vec::new();
        if self.at(Kind::LParen) {
            self.advance();
            while !self.at(Kind::RParen) {
                if self.at(Kind::Ident) && self.peek_kind(1) == Some(Kind::Eq) {
                    let arg = self.advance().text;
                    self.advance();
                    let value = self.parse_test()?;
                    keywords.push(Keyword { arg: Some(arg), value });
                } else {
                    bases.push(self.parse_test()?);
                }
                if self.at(Kind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.eat(Kind::RParen)?;
        }
        let body = self.parse_block()?;
        let end = self.prev_end();
        Ok(Stmt::new(
            StmtKind::ClassDef(ClassDef { name, bases, keywords, body, decorators: Vec::new() }),
            Span::new(start, end),
        ))
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let start = self.cur().start;
        self.eat(Kind::If)?;
        let test = self.parse_testlist()?;
        let body = self.parse_block()?;
        let orelse = self.parse_elif_or_else()?;
        let end = self.prev_end();
        Ok(Stmt::new(StmtKind::If(If { test, body, orelse }), Span::new(start, end)))
    }

    fn parse_elif_or_else(&mut self) -> PResult<Vec<Stmt>> {
        if self.at(Kind::Elif) {
            let start = self.cur().start;
            self.advance();
            let test = self.parse_testlist()?;
            let body = self.parse_block()?;
            let orelse = self.parse_elif_or_else()?;
            let end = self.prev_end();
            Ok(vec![Stmt::new(StmtKind::If(If { test, body, orelse }), Span::new(start, end))])
        } else if self.at(Kind::Else) {
            self.advance();
            self.parse_block()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let start = self.cur().start;
        self.eat(Kind::While)?;
        let test = self.parse_testlist()?;
        let body = self.parse_block()?;
        let orelse = self.parse_optional_else()?;
        let end = self.prev_end();
        Ok(Stmt::new(StmtKind::While(While { test, body, orelse }), Span::new(start, end)))
    }

    fn parse_optional_else(&mut self) -> PResult<Vec<Stmt>> {
        if self.at(Kind::Else) {
            self.advance();
            self.parse_block()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_for(&mut self, is_async: bool) -> PResult<Stmt> {
        let start = self.cur().start;
        self.eat(Kind::For)?;
        let target = self.parse_target_list()?;
        self.eat(Kind::In)?;
        let iter = self.parse_testlist()?;
        let body = self.parse_block()?;
        let orelse = self.parse_optional_else()?;
        let end = self.prev_end();
        Ok(Stmt::new(
            StmtKind::For(For { target, iter, body, orelse, is_async }),
            Span::new(start, end),
        ))
    }

    /// Assignment/`for`-target lists allow bare commas without parens
    /// (`for k, v in items:`), which `parse_testlist` already supports, but
    /// not the trailing `in`/`:` those contexts use as their terminator —
    /// handled by `parse_testlist`'s caller checking the next token.
    fn parse_target_list(&mut self) -> PResult<Expr> {
        self.parse_testlist()
    }

    fn parse_with(&mut self, is_async: bool) -> PResult<Stmt> {
        let start = self.cur().start;
        self.eat(Kind::With)?;
        let mut items = vec![self.parse_with_item()?];
        while self.at(Kind::Comma) {
            self.advance();
            items.push(self.parse_with_item()?);
        }
        let body = self.parse_block()?;
        let end = self.prev_end();
        Ok(Stmt::new(StmtKind::With(With { items, body, is_async }), Span::new(start, end)))
    }

    fn parse_with_item(&mut self) -> PResult<WithItem> {
        let context_expr = self.parse_test()?;
        let optional_vars =
            if self.at(Kind::As) {
                self.advance();
                Some(self.parse_target()?)
            } else {
                None
            };
        Ok(WithItem { context_expr, optional_vars })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let start = self.cur().start;
        self.eat(Kind::Try)?;
        let body = self.parse_block()?;
        let mut handlers = Vec::new();
        while self.at(Kind::Except) {
            self.advance();
            if self.at(Kind::Star) {
                self.advance();
            }
            let (typ, name) = if self.at(Kind::Colon) {
                (None, None)
            } else {
                let typ = self.parse_test()?;
                let name = if self.at(Kind::As) {
                    self.advance();
                    Some(self.eat(Kind::Ident)?.text)
                } else {
                    None
                };
                (Some(typ), name)
            };
            let handler_body = self.parse_block()?;
            handlers.push(ExceptHandler { typ, name, body: handler_body });
        }
        let orelse = self.parse_optional_else()?;
        let finalbody = if self.at(Kind::Finally) {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };
        let end = self.prev_end();
        Ok(Stmt::new(
            StmtKind::Try(Try { body, handlers, orelse, finalbody }),
            Span::new(start, end),
        ))
    }

    fn parse_match(&mut self) -> PResult<Stmt> {
        let start = self.cur().start;
        self.advance(); // 'match'
        let subject = self.parse_testlist()?;
        self.eat(Kind::Colon)?;
        self.eat(Kind::Newline)?;
        self.skip_blank_lines();
        self.eat(Kind::Indent)?;
        let mut cases = Vec::new();
        self.skip_blank_lines();
        while self.at_ident("case") {
            self.advance();
            let pattern = self.parse_pattern()?;
            let guard = if self.at(Kind::If) {
                self.advance();
                Some(self.parse_testlist()?)
            } else {
                None
            };
            let body = self.parse_block()?;
            cases.push(MatchCase { pattern, guard, body });
            self.skip_blank_lines();
        }
        self.eat(Kind::Dedent)?;
        let end = self.prev_end();
        Ok(Stmt::new(StmtKind::Match { subject, cases }, Span::new(start, end)))
    }

    fn parse_pattern(&mut self) -> PResult<Pattern> {
        let start = self.cur().start;
        let mut pattern = self.parse_pattern_atom()?;
        if self.at(Kind::Pipe) {
            let mut alts = vec![pattern];
            while self.at(Kind::Pipe) {
                self.advance();
                alts.push(self.parse_pattern_atom()?);
            }
            let end = self.prev_end();
            pattern = Pattern { kind: PatternKind::Or(alts), span: Span::new(start, end) };
        }
        if self.at(Kind::As) {
            self.advance();
            let name = self.eat(Kind::Ident)?.text;
            let end = self.prev_end();
            pattern = Pattern {
                kind: PatternKind::As { pattern: Box::new(pattern), name: Some(name) },
                span: Span::new(start, end),
            };
        }
        Ok(pattern)
    }

    fn parse_pattern_atom(&mut self) -> PResult<Pattern> {
        let start = self.cur().start;
        let kind = if self.at_ident("_") {
            self.advance();
            PatternKind::Wildcard
        } else if self.at(Kind::LBracket) {
            self.advance();
            let mut items = Vec::new();
            while !self.at(Kind::RBracket) {
                items.push(self.parse_pattern()?);
                if self.at(Kind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.eat(Kind::RBracket)?;
            PatternKind::Sequence(items)
        } else if self.at(Kind::LBrace) {
            self.advance();
            let mut entries = Vec::new();
            while !self.at(Kind::RBrace) {
                let key = self.parse_test()?;
                self.eat(Kind::Colon)?;
                let value = self.parse_pattern()?;
                entries.push((key, value));
                if self.at(Kind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.eat(Kind::RBrace)?;
            PatternKind::Mapping(entries)
        } else if self.at(Kind::Ident) && self.peek_kind(1) == Some(Kind::LParen) {
            let cls = self.parse_atom()?;
            self.eat(Kind::LParen)?;
            let mut patterns = Vec::new();
            let mut kwd_patterns = Vec::new();
            while !self.at(Kind::RParen) {
                if self.at(Kind::Ident) && self.peek_kind(1) == Some(Kind::Eq) {
                    let name = self.advance().text;
                    self.advance();
                    kwd_patterns.push((name, self.parse_pattern()?));
                } else {
                    patterns.push(self.parse_pattern()?);
                }
                if self.at(Kind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.eat(Kind::RParen)?;
            PatternKind::Class { cls, patterns, kwd_patterns }
        } else if self.at(Kind::Ident) {
            PatternKind::Capture(self.advance().text)
        } else {
            PatternKind::Value(self.parse_test()?)
        };
        let end = self.prev_end();
        Ok(Pattern { kind, span: Span::new(start, end) })
    }

    // --- expressions ---------------------------------------------------------

    /// `testlist`: one or more `test`s separated by commas, collapsing to a
    /// bare expression when there's exactly one (no trailing comma) or a
    /// [`ExprKind::Tuple`] otherwise.
    fn parse_testlist(&mut self) -> PResult<Expr> {
        self.parse_comma_separated(Self::parse_test)
    }

    fn parse_testlist_star(&mut self) -> PResult<Expr> {
        self.parse_comma_separated(Self::parse_star_or_test)
    }

    fn parse_comma_separated(
        &mut self,
        mut elem: impl FnMut(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let start = self.cur().start;
        let first = elem(self)?;
        if !self.at(Kind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.at(Kind::Comma) {
            self.advance();
            if self.at_statement_terminator() {
                break;
            }
            items.push(elem(self)?);
        }
        let end = self.prev_end();
        Ok(Expr::new(ExprKind::Tuple(items), Span::new(start, end)))
    }

    fn at_statement_terminator(&self) -> bool {
        matches!(
            self.cur_kind(),
            Kind::Newline
                | Kind::Semi
                | Kind::Colon
                | Kind::Eq
                | Kind::RParen
                | Kind::RBracket
                | Kind::RBrace
                | Kind::In
                | Kind::Eof
        )
    }

    fn parse_star_or_test(&mut self) -> PResult<Expr> {
        if self.at(Kind::Star) {
            let start = self.cur().start;
            self.advance();
            let inner = self.parse_test()?;
            let end = self.prev_end();
            return Ok(Expr::new(ExprKind::Starred(Box::new(inner)), Span::new(start, end)));
        }
        self.parse_test()
    }

    /// Top-level expression: lambda, conditional, or boolean-or chain. Named
    /// `test` to match the grammar production it implements.
    fn parse_test(&mut self) -> PResult<Expr> {
        if self.at(Kind::Lambda) {
            return self.parse_lambda();
        }
        let start = self.cur().start;
        let body = self.parse_or_test()?;
        if self.at(Kind::If) {
            self.advance();
            let test = self.parse_or_test()?;
            self.eat(Kind::Else)?;
            let orelse = self.parse_test()?;
            let end = self.prev_end();
            return Ok(Expr::new(
                ExprKind::IfExp {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                },
                Span::new(start, end),
            ));
        }
        Ok(body)
    }

    /// `namedexpr_test`: a `test`, optionally preceded by a walrus target
    /// (`name := test`), as used in comprehension conditions and
    /// parenthesized contexts.
    fn parse_namedexpr(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        if self.at(Kind::Ident) && self.peek_kind(1) == Some(Kind::ColonEq) {
            let name = self.advance().text;
            self.advance();
            let value = self.parse_test()?;
            let end = self.prev_end();
            return Ok(Expr::new(
                ExprKind::NamedExpr {
                    target: Box::new(Expr::new(ExprKind::Name(name), Span::new(start, start))),
                    value: Box::new(value),
                },
                Span::new(start, end),
            ));
        }
        self.parse_test()
    }

    fn parse_lambda(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        self.eat(Kind::Lambda)?;
        let params = if self.at(Kind::Colon) { Vec::new() } else { self.parse_param_list(Kind::Colon)? };
        self.eat(Kind::Colon)?;
        let body = self.parse_test()?;
        let end = self.prev_end();
        Ok(Expr::new(
            ExprKind::Lambda { params, body: Box::new(body) },
            Span::new(start, end),
        ))
    }

    fn parse_or_test(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        let first = self.parse_and_test()?;
        if !self.at(Kind::Or) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.at(Kind::Or) {
            self.advance();
            values.push(self.parse_and_test()?);
        }
        let end = self.prev_end();
        Ok(Expr::new(ExprKind::BoolOp { op: BoolOp::Or, values }, Span::new(start, end)))
    }

    fn parse_and_test(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        let first = self.parse_not_test()?;
        if !self.at(Kind::And) {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.at(Kind::And) {
            self.advance();
            values.push(self.parse_not_test()?);
        }
        let end = self.prev_end();
        Ok(Expr::new(ExprKind::BoolOp { op: BoolOp::And, values }, Span::new(start, end)))
    }

    fn parse_not_test(&mut self) -> PResult<Expr> {
        if self.at(Kind::Not) {
            let start = self.cur().start;
            self.advance();
            let operand = self.parse_not_test()?;
            let end = self.prev_end();
            return Ok(Expr::new(
                ExprKind::UnaryOp { op: UnaryOp::Not, operand: Box::new(operand) },
                Span::new(start, end),
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        let left = self.parse_bitor()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.try_parse_cmp_op()? {
            ops.push(op);
            comparators.push(self.parse_bitor()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        let end = self.prev_end();
        Ok(Expr::new(
            ExprKind::Compare { left: Box::new(left), ops, comparators },
            Span::new(start, end),
        ))
    }

    fn try_parse_cmp_op(&mut self) -> PResult<Option<CmpOp>> {
        let op = match self.cur_kind() {
            Kind::EqEq => CmpOp::Eq,
            Kind::NotEq => CmpOp::NotEq,
            Kind::Lt => CmpOp::Lt,
            Kind::LtE => CmpOp::LtE,
            Kind::Gt => CmpOp::Gt,
            Kind::GtE => CmpOp::GtE,
            Kind::In => CmpOp::In,
            Kind::Is => {
                self.advance();
                if self.at(Kind::Not) {
                    self.advance();
                    return Ok(Some(CmpOp::IsNot));
                }
                return Ok(Some(CmpOp::Is));
            }
            Kind::Not if self.peek_kind(1) == Some(Kind::In) => {
                self.advance();
                self.advance();
                return Ok(Some(CmpOp::NotIn));
            }
            _ => return Ok(None),
        };
        self.advance();
        Ok(Some(op))
    }

    fn peek_kind(&self, n: usize) -> Option<Kind> {
        self.tokens.get(self.pos + n).map(|t| t.kind)
    }

    fn parse_bitor(&mut self) -> PResult<Expr> {
        self.parse_left_assoc_binop(Self::parse_bitxor, &[(Kind::Pipe, BinOp::BitOr)])
    }

    fn parse_bitxor(&mut self) -> PResult<Expr> {
        self.parse_left_assoc_binop(Self::parse_bitand, &[(Kind::Caret, BinOp::BitXor)])
    }

    fn parse_bitand(&mut self) -> PResult<Expr> {
        self.parse_left_assoc_binop(Self::parse_shift, &[(Kind::Amp, BinOp::BitAnd)])
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        self.parse_left_assoc_binop(
            Self::parse_arith,
            &[(Kind::LShift, BinOp::LShift), (Kind::RShift, BinOp::RShift)],
        )
    }

    fn parse_arith(&mut self) -> PResult<Expr> {
        self.parse_left_assoc_binop(
            Self::parse_term,
            &[(Kind::Plus, BinOp::Add), (Kind::Minus, BinOp::Sub)],
        )
    }

    fn parse_term(&mut self) -> PResult<Expr> {
        self.parse_left_assoc_binop(
            Self::parse_factor,
            &[
                (Kind::Star, BinOp::Mult),
                (Kind::Slash, BinOp::Div),
                (Kind::FloorDiv, BinOp::FloorDiv),
                (Kind::Percent, BinOp::Mod),
                (Kind::At, BinOp::MatMult),
            ],
        )
    }

    fn parse_left_assoc_binop(
        &mut self,
        mut next: impl FnMut(&mut Self) -> PResult<Expr>,
        ops: &[(Kind, BinOp)],
    ) -> PResult<Expr> {
        let start = self.cur().start;
        let mut left = next(self)?;
        loop {
            let Some(&(_, op)) = ops.iter().find(|(k, _)| self.at(*k)) else { break };
            self.advance();
            let right = next(self)?;
            let end = self.prev_end();
            left = Expr::new(
                ExprKind::BinOp { left: Box::new(left), op, right: Box::new(right) },
                Span::new(start, end),
            );
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        let op = match self.cur_kind() {
            Kind::Plus => UnaryOp::UAdd,
            Kind::Minus => UnaryOp::USub,
            Kind::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_factor()?;
        let end = self.prev_end();
        Ok(Expr::new(ExprKind::UnaryOp { op, operand: Box::new(operand) }, Span::new(start, end)))
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        let base = self.parse_await_or_trailer()?;
        if self.at(Kind::Pow) {
            self.advance();
            let exponent = self.parse_factor()?;
            let end = self.prev_end();
            return Ok(Expr::new(
                ExprKind::BinOp { left: Box::new(base), op: BinOp::Pow, right: Box::new(exponent) },
                Span::new(start, end),
            ));
        }
        Ok(base)
    }

    fn parse_await_or_trailer(&mut self) -> PResult<Expr> {
        if self.at(Kind::Await) {
            let start = self.cur().start;
            self.advance();
            let operand = self.parse_await_or_trailer()?;
            let end = self.prev_end();
            return Ok(Expr::new(ExprKind::Await(Box::new(operand)), Span::new(start, end)));
        }
        self.parse_trailers()
    }

    fn parse_trailers(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        let mut expr = self.parse_atom()?;
        loop {
            expr = match self.cur_kind() {
                Kind::Dot => {
                    self.advance();
                    let attr = self.eat(Kind::Ident)?.text;
                    let end = self.prev_end();
                    Expr::new(
                        ExprKind::Attribute { value: Box::new(expr), attr },
                        Span::new(start, end),
                    )
                }
                Kind::LParen => {
                    self.advance();
                    let (args, keywords) = self.parse_call_args()?;
                    self.eat(Kind::RParen)?;
                    let end = self.prev_end();
                    Expr::new(
                        ExprKind::Call { func: Box::new(expr), args, keywords },
                        Span::new(start, end),
                    )
                }
                Kind::LBracket => {
                    self.advance();
                    let slice = self.parse_subscript()?;
                    self.eat(Kind::RBracket)?;
                    let end = self.prev_end();
                    Expr::new(
                        ExprKind::Subscript { value: Box::new(expr), slice: Box::new(slice) },
                        Span::new(start, end),
                    )
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> PResult<(Vec<Expr>, Vec<Keyword>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.at(Kind::RParen) {
            if self.at(Kind::Pow) {
                self.advance();
                keywords.push(Keyword { arg: None, value: self.parse_test()? });
            } else if self.at(Kind::Ident) && self.peek_kind(1) == Some(Kind::Eq) {
                let name = self.advance().text;
                self.advance();
                keywords.push(Keyword { arg: Some(name), value: self.parse_test()? });
            } else if self.at(Kind::Star) {
                self.advance();
                let start = self.cur().start;
                let inner = self.parse_test()?;
                let end = self.prev_end();
                args.push(Expr::new(
                    ExprKind::Starred(Box::new(inner)),
                    Span::new(start, end),
                ));
            } else {
                let value = self.parse_namedexpr()?;
                if self.at(Kind::For) || self.at_ident("async") {
                    let generators = self.parse_comprehension_clauses()?;
                    args.push(Expr::new(
                        ExprKind::GeneratorExp { elt: Box::new(value.clone()), generators },
                        value.span,
                    ));
                } else {
                    args.push(value);
                }
            }
            if self.at(Kind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn parse_subscript(&mut self) -> PResult<Expr> {
        self.parse_comma_separated(Self::parse_slice_item)
    }

    fn parse_slice_item(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        let lower = if matches!(self.cur_kind(), Kind::Colon | Kind::RBracket | Kind::Comma) {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        if !self.at(Kind::Colon) {
            return Ok(*lower.unwrap_or_else(|| {
                Box::new(Expr::new(ExprKind::Constant(Constant::None), Span::new(start, start)))
            }));
        }
        self.advance();
        let upper = if matches!(self.cur_kind(), Kind::Colon | Kind::RBracket | Kind::Comma) {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        let step = if self.at(Kind::Colon) {
            self.advance();
            if matches!(self.cur_kind(), Kind::RBracket | Kind::Comma) {
                None
            } else {
                Some(Box::new(self.parse_test()?))
            }
        } else {
            None
        };
        let end = self.prev_end();
        Ok(Expr::new(ExprKind::Slice { lower, upper, step }, Span::new(start, end)))
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        match self.cur_kind() {
            Kind::Ident => {
                let text = self.advance().text;
                Ok(Expr::new(ExprKind::Name(text), Span::new(start, self.prev_end())))
            }
            Kind::Int => {
                let text = self.advance().text;
                let constant = literal::decode_number(&text, false)?;
                Ok(Expr::new(ExprKind::Constant(constant), Span::new(start, self.prev_end())))
            }
            Kind::Float => {
                let text = self.advance().text;
                let constant = literal::decode_number(&text, true)?;
                Ok(Expr::new(ExprKind::Constant(constant), Span::new(start, self.prev_end())))
            }
            Kind::Str => self.parse_string_literal(start),
            Kind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Constant(Constant::Bool(true)), Span::new(start, self.prev_end())))
            }
            Kind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Constant(Constant::Bool(false)), Span::new(start, self.prev_end())))
            }
            Kind::None_ => {
                self.advance();
                Ok(Expr::new(ExprKind::Constant(Constant::None), Span::new(start, self.prev_end())))
            }
            Kind::Ellipsis => {
                self.advance();
                Ok(Expr::new(ExprKind::Constant(Constant::Ellipsis), Span::new(start, self.prev_end())))
            }
            Kind::Yield => self.parse_yield(),
            Kind::LParen => self.parse_paren_expr(),
            Kind::LBracket => self.parse_list_or_listcomp(),
            Kind::LBrace => self.parse_dict_or_set(),
            Kind::Minus | Kind::Plus | Kind::Tilde => self.parse_factor(),
            _ => Err(unexpected_token(self.cur())),
        }
    }

    fn parse_string_literal(&mut self, start: Position) -> PResult<Expr> {
        let mut text = self.advance().text;
        // Adjacent string literals implicitly concatenate, matching
        // Python's `"a" "b"` == `"ab"`.
        while self.at(Kind::Str) {
            text.push_str(&self.advance().text);
        }
        let decoded = literal::decode_string(&text);
        let end = self.prev_end();
        let span = Span::new(start, end);
        if decoded.is_fstring {
            let mut parts = Vec::new();
            for part in literal::split_fstring_parts(&decoded.value) {
                parts.push(match part {
                    FStringPartRaw::Literal(s) => FStringPart::Literal(s),
                    FStringPartRaw::Expr { expr_text, conversion, format_spec } => {
                        let sub_tokens = crate::lexer::Lexer::new(&expr_text)
                            .tokenize()
                            .map_err(|(m, p)| ParseError::new(m, Some(p.line), Some(p.column)))?;
                        let mut sub_parser = StmtParser::new(&sub_tokens, &expr_text);
                        let sub_expr = sub_parser.parse_test()?;
                        FStringPart::Expr { expr: Box::new(sub_expr), conversion, format_spec }
                    }
                });
            }
            Ok(Expr::new(ExprKind::JoinedStr(parts), span))
        } else if decoded.is_bytes {
            Ok(Expr::new(ExprKind::Constant(Constant::Bytes(decoded.value.into_bytes())), span))
        } else {
            Ok(Expr::new(ExprKind::Constant(Constant::Str(decoded.value)), span))
        }
    }

    fn parse_yield(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        self.advance();
        if self.at(Kind::From) {
            self.advance();
            let value = self.parse_test()?;
            let end = self.prev_end();
            return Ok(Expr::new(ExprKind::YieldFrom(Box::new(value)), Span::new(start, end)));
        }
        let value = if self.at_statement_terminator() || self.at(Kind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_testlist()?))
        };
        let end = self.prev_end();
        Ok(Expr::new(ExprKind::Yield(value), Span::new(start, end)))
    }

    fn parse_paren_expr(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        self.advance();
        if self.at(Kind::RParen) {
            self.advance();
            return Ok(Expr::new(ExprKind::Tuple(Vec::new()), Span::new(start, self.prev_end())));
        }
        let first = self.parse_star_or_namedexpr()?;
        if self.at(Kind::For) || self.at_ident("async") {
            let generators = self.parse_comprehension_clauses()?;
            self.eat(Kind::RParen)?;
            let end = self.prev_end();
            return Ok(Expr::new(
                ExprKind::GeneratorExp { elt: Box::new(first), generators },
                Span::new(start, end),
            ));
        }
        if self.at(Kind::Comma) {
            let mut items = vec![first];
            while self.at(Kind::Comma) {
                self.advance();
                if self.at(Kind::RParen) {
                    break;
                }
                items.push(self.parse_star_or_namedexpr()?);
            }
            self.eat(Kind::RParen)?;
            let end = self.prev_end();
            return Ok(Expr::new(ExprKind::Tuple(items), Span::new(start, end)));
        }
        self.eat(Kind::RParen)?;
        Ok(first)
    }

    fn parse_star_or_namedexpr(&mut self) -> PResult<Expr> {
        if self.at(Kind::Star) {
            return self.parse_star_or_test();
        }
        self.parse_namedexpr()
    }

    fn parse_list_or_listcomp(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        self.advance();
        if self.at(Kind::RBracket) {
            self.advance();
            return Ok(Expr::new(ExprKind::List(Vec::new()), Span::new(start, self.prev_end())));
        }
        let first = self.parse_star_or_namedexpr()?;
        if self.at(Kind::For) || self.at_ident("async") {
            let generators = self.parse_comprehension_clauses()?;
            self.eat(Kind::RBracket)?;
            let end = self.prev_end();
            return Ok(Expr::new(
                ExprKind::ListComp { elt: Box::new(first), generators },
                Span::new(start, end),
            ));
        }
        let mut items = vec![first];
        while self.at(Kind::Comma) {
            self.advance();
            if self.at(Kind::RBracket) {
                break;
            }
            items.push(self.parse_star_or_namedexpr()?);
        }
        self.eat(Kind::RBracket)?;
        let end = self.prev_end();
        Ok(Expr::new(ExprKind::List(items), Span::new(start, end)))
    }

    fn parse_dict_or_set(&mut self) -> PResult<Expr> {
        let start = self.cur().start;
        self.advance();
        if self.at(Kind::RBrace) {
            self.advance();
            return Ok(Expr::new(
                ExprKind::Dict { keys: Vec::new(), values: Vec::new() },
                Span::new(start, self.prev_end()),
            ));
        }

        if self.at(Kind::Pow) {
            self.advance();
            let value = self.parse_or_test()?;
            let mut keys = vec![None];
            let mut values = vec![value];
            while self.at(Kind::Comma) {
                self.advance();
                if self.at(Kind::RBrace) {
                    break;
                }
                if self.at(Kind::Pow) {
                    self.advance();
                    keys.push(None);
                    values.push(self.parse_or_test()?);
                } else {
                    let k = self.parse_test()?;
                    self.eat(Kind::Colon)?;
                    let v = self.parse_test()?;
                    keys.push(Some(k));
                    values.push(v);
                }
            }
            self.eat(Kind::RBrace)?;
            let end = self.prev_end();
            return Ok(Expr::new(ExprKind::Dict { keys, values }, Span::new(start, end)));
        }

        let first = self.parse_namedexpr()?;
        if self.at(Kind::Colon) {
            self.advance();
            let first_value = self.parse_test()?;
            if self.at(Kind::For) || self.at_ident("async") {
                let generators = self.parse_comprehension_clauses()?;
                self.eat(Kind::RBrace)?;
                let end = self.prev_end();
                return Ok(Expr::new(
                    ExprKind::DictComp {
                        key: Box::new(first),
                        value: Box::new(first_value),
                        generators,
                    },
                    Span::new(start, end),
                ));
            }
            let mut keys = vec![Some(first)];
            let mut values = vec![first_value];
            while self.at(Kind::Comma) {
                self.advance();
                if self.at(Kind::RBrace) {
                    break;
                }
                if self.at(Kind::Pow) {
                    self.advance();
                    keys.push(None);
                    values.push(self.parse_or_test()?);
                } else {
                    let k = self.parse_test()?;
                    self.eat(Kind::Colon)?;
                    let v = self.parse_test()?;
                    keys.push(Some(k));
                    values.push(v);
                }
            }
            self.eat(Kind::RBrace)?;
            let end = self.prev_end();
            return Ok(Expr::new(ExprKind::Dict { keys, values }, Span::new(start, end)));
        }

        if self.at(Kind::For) || self.at_ident("async") {
            let generators = self.parse_comprehension_clauses()?;
            self.eat(Kind::RBrace)?;
            let end = self.prev_end();
            return Ok(Expr::new(
                ExprKind::SetComp { elt: Box::new(first), generators },
                Span::new(start, end),
            ));
        }

        let mut items = vec![first];
        while self.at(Kind::Comma) {
            self.advance();
            if self.at(Kind::RBrace) {
                break;
            }
            items.push(self.parse_star_or_namedexpr()?);
        }
        self.eat(Kind::RBrace)?;
        let end = self.prev_end();
        Ok(Expr::new(ExprKind::SetLit(items), Span::new(start, end)))
    }

    fn parse_comprehension_clauses(&mut self) -> PResult<Vec<Comprehension>> {
        let mut clauses = Vec::new();
        loop {
            let is_async = if self.at_ident("async") {
                self.advance();
                true
            } else {
                false
            };
            if !self.at(Kind::For) {
                break;
            }
            self.advance();
            let target = self.parse_target_list()?;
            self.eat(Kind::In)?;
            let iter = self.parse_or_test()?;
            let mut ifs = Vec::new();
            while self.at(Kind::If) {
                self.advance();
                ifs.push(self.parse_or_test()?);
            }
            clauses.push(Comprehension { target, iter, ifs, is_async });
        }
        Ok(clauses)
    }

    fn parse_target(&mut self) -> PResult<Expr> {
        self.parse_trailers()
    }

    // --- raw-text capture for annotations/defaults -------------------------

    /// Consumes tokens until one of `terminators` is reached at bracket
    /// depth zero, returning the exact source text spanned — annotations
    /// and parameter defaults are never turned into sub-expressions (see
    /// the crate-level docs on `scriptgate_ast`), just captured verbatim so
    /// they can be printed back out unchanged by the stub generator.
    fn capture_raw_text_until(&mut self, terminators: &[Kind]) -> String {
        let start = self.cur().start;
        let mut depth = 0i32;
        let mut last_end = start;
        let mut consumed = false;
        while !self.is_eof() {
            if depth == 0 && terminators.contains(&self.cur_kind()) {
                break;
            }
            match self.cur_kind() {
                Kind::LParen | Kind::LBracket | Kind::LBrace => depth += 1,
                Kind::RParen | Kind::RBracket | Kind::RBrace => depth -= 1,
                _ => {}
            }
            last_end = self.cur().end;
            consumed = true;
            self.advance();
        }
        if !consumed {
            return String::new();
        }
        let (start_off, end_off) = (self.source.offset_of(start), self.source.offset_of(last_end));
        self.source.as_str()[start_off..end_off].to_owned()
    }
}

fn aug_assign_op(kind: Kind) -> Option<BinOp> {
    Some(match kind {
        Kind::PlusEq => BinOp::Add,
        Kind::MinusEq => BinOp::Sub,
        Kind::StarEq => BinOp::Mult,
        Kind::SlashEq => BinOp::Div,
        Kind::FloorDivEq => BinOp::FloorDiv,
        Kind::PercentEq => BinOp::Mod,
        Kind::PowEq => BinOp::Pow,
        Kind::AtEq => BinOp::MatMult,
        Kind::AmpEq => BinOp::BitAnd,
        Kind::PipeEq => BinOp::BitOr,
        Kind::CaretEq => BinOp::BitXor,
        Kind::LShiftEq => BinOp::LShift,
        Kind::RShiftEq => BinOp::RShift,
        _ => return None,
    })
}

fn extract_docstring(body: &[Stmt]) -> Option<String> {
    let first = body.first()?;
    match &first.kind {
        StmtKind::Expr(Expr { kind: ExprKind::Constant(Constant::Str(s)), .. }) => Some(s.clone()),
        _ => None,
    }
}

