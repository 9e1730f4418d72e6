//! Recursive-descent parser for the restricted scripting subset.
//!
//! # Scope
//!
//! This parser accepts true syntax errors as [`ParseError`]s, but it does
//! **not** reject subset violations like `class` definitions, `yield`, or
//! disallowed imports — those are structurally valid syntax that the
//! compatibility checker (`scriptgate_semantic`) rejects in a later pass.
//! Keeping "is this well-formed" and "is this allowed here" as separate
//! stages keeps each one's diagnostics focused, and means a future subset
//! relaxation (e.g. allowing `with`) only touches the checker.
//!
//! # Example
//!
//! ```
//! use scriptgate_parser::Parser;
//!
//! let result = Parser::new("x: int = 1\n").parse();
//! assert!(result.is_ok());
//! ```

mod lexer;
mod literal;
mod parser;

pub use scriptgate_diagnostics::ParseError;

use lexer::{Kind, Lexer, Token};
use scriptgate_ast::Program;
use scriptgate_span::Position;

/// Everything a successful parse produces, plus the split source lines
/// every later stage needs for diagnostics and line mapping.
#[derive(Debug)]
pub struct ParserReturn {
    pub program: Program,
}

pub struct Parser<'a> {
    source: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Tokenizes and parses the whole source, returning the first syntax
    /// error encountered. Unlike `oxc_parser`, which collects every error
    /// across a file so a linter can report them all, this parser stops at
    /// the first one: there is no use in reporting "errors after a syntax
    /// error" for a script this small, and CPython's own parser does the
    /// same.
    pub fn parse(self) -> Result<ParserReturn, ParseError> {
        log::debug!("parsing script ({} bytes)", self.source.len());
        let tokens = Lexer::new(self.source)
            .tokenize()
            .map_err(|(message, pos)| ParseError::new(message, Some(pos.line), Some(pos.column)))?;
        let source_lines: Vec<String> = split_lines(self.source);
        let body = parser::StmtParser::new(&tokens, self.source).parse_module()?;
        Ok(ParserReturn { program: Program::new(body, source_lines) })
    }
}

fn split_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }
    text.split('\n').map(|s| s.strip_suffix('\r').unwrap_or(s).to_owned()).collect()
}

pub(crate) fn unexpected_token(tok: &Token) -> ParseError {
    ParseError::new(
        format!("unexpected token {:?} ({:?})", tok.kind, tok.text),
        Some(tok.start.line),
        Some(tok.start.column),
    )
}

pub(crate) fn eof_position(tokens: &[Token]) -> Position {
    tokens.last().map_or(Position::new(1, 0), |t| t.start)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn smoke_test() {
        let ret = Parser::new("x = 1\ny = x + 1\n").parse().unwrap();
        assert_eq!(ret.program.body.len(), 2);
    }

    #[test]
    fn reports_parse_error_with_location() {
        let err = Parser::new("def f(:\n    pass\n").parse().unwrap_err();
        assert!(err.line.is_some());
    }
}
