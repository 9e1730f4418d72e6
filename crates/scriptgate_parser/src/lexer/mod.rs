//! Indentation-sensitive tokenizer for the scripting subset.
//!
//! Python's grammar is not context-free at the token level: blocks are
//! delimited by indentation rather than braces, and the tokenizer has to
//! track bracket nesting to know whether a newline ends a logical line or is
//! just whitespace inside an open `(`/`[`/`{`. This lexer folds both
//! concerns in here (rather than splitting a separate "layout" pass the way
//! `rustc`/`oxc` can get away with for brace-delimited languages) and emits
//! a flat token stream with explicit `Indent`/`Dedent`/`Newline` tokens, the
//! same strategy CPython's own tokenizer uses.

mod cursor;
mod kind;
mod number;
mod string;

pub use kind::Kind;

use scriptgate_span::Position;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: Kind,
    pub start: Position,
    pub end: Position,
    /// The token's exact source text, used verbatim for identifiers,
    /// operators and — critically — for annotation/default-value spans,
    /// which downstream code reassembles by slicing source text rather than
    /// by unparsing a sub-expression (see the crate-level docs on
    /// `scriptgate_ast`).
    pub text: String,
}

pub struct Lexer<'a> {
    cursor: cursor::Cursor<'a>,
    indent_stack: Vec<usize>,
    bracket_depth: u32,
    at_line_start: bool,
    pending_dedents: u32,
    emitted_final_newline: bool,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            cursor: cursor::Cursor::new(source),
            indent_stack: vec![0],
            bracket_depth: 0,
            at_line_start: true,
            pending_dedents: 0,
            emitted_final_newline: false,
            done: false,
        }
    }

    /// Tokenizes the entire source up front. Scripts accepted by this crate
    /// are small (§4 size budget), so there is no benefit to a lazily pulled
    /// token stream the way a reparse-heavy JS lexer needs.
    pub fn tokenize(mut self) -> Result<Vec<Token>, (String, Position)> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token() {
                Ok(Some(tok)) => {
                    let is_eof = tok.kind == Kind::Eof;
                    tokens.push(tok);
                    if is_eof {
                        break;
                    }
                }
                Ok(None) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, (String, Position)> {
        if self.done {
            return Ok(Some(self.make(Kind::Eof, self.cursor.position(), self.cursor.position(), String::new())));
        }

        if self.pending_dedents > 0 {
            self.pending_dedents -= 1;
            let pos = self.cursor.position();
            return Ok(Some(self.make(Kind::Dedent, pos, pos, String::new())));
        }

        if self.at_line_start && self.bracket_depth == 0 {
            return self.handle_line_start();
        }

        self.skip_inline_whitespace_and_comments();

        if self.cursor.is_eof() {
            return self.finish();
        }

        let start = self.cursor.position();
        let c = self.cursor.peek().unwrap();

        if c == '\n' {
            self.cursor.bump();
            if self.bracket_depth > 0 {
                return Ok(None);
            }
            self.at_line_start = true;
            let end = self.cursor.position();
            return Ok(Some(self.make(Kind::Newline, start, end, "\n".to_owned())));
        }

        if c == '\\' && self.cursor.peek_at(1) == Some('\n') {
            self.cursor.bump();
            self.cursor.bump();
            return Ok(None);
        }

        if c.is_ascii_digit() || (c == '.' && self.cursor.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            return number::lex_number(&mut self.cursor, start).map(Some);
        }

        if is_ident_start(c) {
            return Ok(Some(self.lex_ident_or_keyword(start)));
        }

        if is_string_prefix_start(c) {
            if let Some(tok) = string::try_lex_prefixed_string(&mut self.cursor, start)? {
                return Ok(Some(tok));
            }
        }

        if c == '"' || c == '\'' {
            return string::lex_string(&mut self.cursor, start, "").map(Some);
        }

        self.lex_operator(start)
    }

    fn finish(&mut self) -> Result<Option<Token>, (String, Position)> {
        let pos = self.cursor.position();
        if !self.emitted_final_newline {
            self.emitted_final_newline = true;
            return Ok(Some(self.make(Kind::Newline, pos, pos, String::new())));
        }
        if self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            return Ok(Some(self.make(Kind::Dedent, pos, pos, String::new())));
        }
        self.done = true;
        Ok(Some(self.make(Kind::Eof, pos, pos, String::new())))
    }

    fn handle_line_start(&mut self) -> Result<Option<Token>, (String, Position)> {
        let mut indent = 0usize;
        loop {
            match self.cursor.peek() {
                Some(' ') => {
                    indent += 1;
                    self.cursor.bump();
                }
                Some('\t') => {
                    indent += 8 - (indent % 8);
                    self.cursor.bump();
                }
                _ => break,
            }
        }

        if matches!(self.cursor.peek(), Some('#')) {
            while !matches!(self.cursor.peek(), None | Some('\n')) {
                self.cursor.bump();
            }
        }

        if matches!(self.cursor.peek(), None) {
            self.at_line_start = false;
            return self.finish();
        }

        if matches!(self.cursor.peek(), Some('\n')) {
            let start = self.cursor.position();
            self.cursor.bump();
            let end = self.cursor.position();
            return Ok(Some(self.make(Kind::Newline, start, end, "\n".to_owned())));
        }

        self.at_line_start = false;
        let current = *self.indent_stack.last().unwrap();
        let pos = self.cursor.position();
        if indent > current {
            self.indent_stack.push(indent);
            return Ok(Some(self.make(Kind::Indent, pos, pos, String::new())));
        }
        if indent < current {
            let mut dedents = 0u32;
            while *self.indent_stack.last().unwrap() > indent {
                self.indent_stack.pop();
                dedents += 1;
            }
            if *self.indent_stack.last().unwrap() != indent {
                return Err(("inconsistent indentation".to_owned(), pos));
            }
            self.pending_dedents = dedents - 1;
            return Ok(Some(self.make(Kind::Dedent, pos, pos, String::new())));
        }
        Ok(None)
    }

    fn skip_inline_whitespace_and_comments(&mut self) {
        loop {
            match self.cursor.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.cursor.bump();
                }
                Some('#') => {
                    while !matches!(self.cursor.peek(), None | Some('\n')) {
                        self.cursor.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_ident_or_keyword(&mut self, start: Position) -> Token {
        let mut text = String::new();
        while let Some(c) = self.cursor.peek() {
            if is_ident_continue(c) {
                text.push(c);
                self.cursor.bump();
            } else {
                break;
            }
        }
        let end = self.cursor.position();
        let kind = kind::keyword_kind(&text).unwrap_or(Kind::Ident);
        self.make(kind, start, end, text)
    }

    fn lex_operator(&mut self, start: Position) -> Result<Option<Token>, (String, Position)> {
        let start_byte = self.cursor.byte_pos();
        let c = self.cursor.bump().unwrap();
        if matches!(c, '(' | '[' | '{') {
            self.bracket_depth += 1;
        } else if matches!(c, ')' | ']' | '}') {
            self.bracket_depth = self.bracket_depth.saturating_sub(1);
        }

        macro_rules! two {
            ($next:expr, $two_kind:expr, $one_kind:expr) => {{
                if self.cursor.peek() == Some($next) {
                    self.cursor.bump();
                    $two_kind
                } else {
                    $one_kind
                }
            }};
        }

        let kind = match c {
            '(' => Kind::LParen,
            ')' => Kind::RParen,
            '[' => Kind::LBracket,
            ']' => Kind::RBracket,
            '{' => Kind::LBrace,
            '}' => Kind::RBrace,
            ',' => Kind::Comma,
            ':' => two!('=', Kind::ColonEq, Kind::Colon),
            ';' => Kind::Semi,
            '.' => {
                if self.cursor.peek() == Some('.') && self.cursor.peek_at(1) == Some('.') {
                    self.cursor.bump();
                    self.cursor.bump();
                    Kind::Ellipsis
                } else {
                    Kind::Dot
                }
            }
            '@' => two!('=', Kind::AtEq, Kind::At),
            '+' => two!('=', Kind::PlusEq, Kind::Plus),
            '-' => {
                if self.cursor.peek() == Some('>') {
                    self.cursor.bump();
                    Kind::Arrow
                } else {
                    two!('=', Kind::MinusEq, Kind::Minus)
                }
            }
            '*' => {
                if self.cursor.peek() == Some('*') {
                    self.cursor.bump();
                    two!('=', Kind::PowEq, Kind::Pow)
                } else {
                    two!('=', Kind::StarEq, Kind::Star)
                }
            }
            '/' => {
                if self.cursor.peek() == Some('/') {
                    self.cursor.bump();
                    two!('=', Kind::FloorDivEq, Kind::FloorDiv)
                } else {
                    two!('=', Kind::SlashEq, Kind::Slash)
                }
            }
            '%' => two!('=', Kind::PercentEq, Kind::Percent),
            '&' => two!('=', Kind::AmpEq, Kind::Amp),
            '|' => two!('=', Kind::PipeEq, Kind::Pipe),
            '^' => two!('=', Kind::CaretEq, Kind::Caret),
            '~' => Kind::Tilde,
            '=' => two!('=', Kind::EqEq, Kind::Eq),
            '!' => {
                if self.cursor.peek() == Some('=') {
                    self.cursor.bump();
                    Kind::NotEq
                } else {
                    return Err(("unexpected character '!'".to_owned(), start));
                }
            }
            '<' => {
                if self.cursor.peek() == Some('<') {
                    self.cursor.bump();
                    two!('=', Kind::LShiftEq, Kind::LShift)
                } else {
                    two!('=', Kind::LtE, Kind::Lt)
                }
            }
            '>' => {
                if self.cursor.peek() == Some('>') {
                    self.cursor.bump();
                    two!('=', Kind::RShiftEq, Kind::RShift)
                } else {
                    two!('=', Kind::GtE, Kind::Gt)
                }
            }
            other => return Err((format!("unexpected character {other:?}"), start)),
        };
        let end = self.cursor.position();
        let text = self.cursor.slice_bytes(start_byte, self.cursor.byte_pos());
        Ok(Some(self.make(kind, start, end, text)))
    }

    fn make(&self, kind: Kind, start: Position, end: Position, text: String) -> Token {
        Token { kind, start, end, text }
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn is_string_prefix_start(c: char) -> bool {
    matches!(c, 'r' | 'R' | 'b' | 'B' | 'f' | 'F' | 'u' | 'U')
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(src: &str) -> Vec<Kind> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_simple_assignment() {
        let ks = kinds("x = 1\n");
        assert_eq!(ks, vec![Kind::Ident, Kind::Eq, Kind::Int, Kind::Newline, Kind::Eof]);
    }

    #[test]
    fn tracks_indentation() {
        let ks = kinds("if x:\n    y = 1\nz = 2\n");
        assert!(ks.contains(&Kind::Indent));
        assert!(ks.contains(&Kind::Dedent));
    }

    #[test]
    fn brackets_suppress_newlines() {
        let ks = kinds("x = (\n    1,\n    2,\n)\n");
        let newline_count = ks.iter().filter(|k| **k == Kind::Newline).count();
        assert_eq!(newline_count, 1);
    }
}
