//! Turns a checked [`scriptgate_ast::Program`] into the text a sandbox
//! actually executes (C5 stripper + unparser), the line map back to the
//! original source (C6), and the type stub the sandbox checks it against
//! (C11).
//!
//! The three are produced together by [`generate`] because the line map
//! depends on re-parsing the unparsed text (§4.5) — by the time that
//! reparse has happened, the executable text and stub are already free.

mod linemap;
mod stripper;
mod stub;
mod unparse;

pub use linemap::{build_line_map, LineMap};
pub use stripper::{strip_declarations, HOST_MODULE};
pub use stub::generate_stub;
pub use unparse::unparse_program;

use scriptgate_ast::Program;
use scriptgate_diagnostics::ParseError;
use scriptgate_semantic::Declarations;

/// Everything derived from one `strip → unparse → reparse → map` pass.
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub executable_text: String,
    pub line_map: LineMap,
    pub stub_text: String,
}

/// Strips `program`'s top-level declarations, renders the remainder back
/// to text, and builds the line map and type stub from it.
///
/// The re-parse of the generated text uses the same parser the original
/// load did; per §4.4, a script whose stripped form fails to re-parse is
/// a gateway bug, not a user error — that case surfaces as a plain
/// [`ParseError`] rather than a [`scriptgate_diagnostics::CheckError`].
pub fn generate(program: &Program, decls: &Declarations) -> Result<GeneratedCode, ParseError> {
    let stripped = strip_declarations(program);
    let executable_text = unparse_program(&stripped.body);
    let reparsed = scriptgate_parser::Parser::new(&executable_text).parse().map_err(|e| {
        ParseError::new(
            format!("generated executable text failed to re-parse: {}", e.message),
            e.line,
            e.column,
        )
    })?;
    let line_map = build_line_map(&stripped, &reparsed.program);
    let stub_text = generate_stub(decls);
    Ok(GeneratedCode { executable_text, line_map, stub_text })
}

#[cfg(test)]
mod test {
    use super::*;
    use scriptgate_parser::Parser;
    use scriptgate_semantic::extract_declarations;

    #[test]
    fn round_trips_a_small_script() {
        let source = "from host import external, Input\n\
            @external\n\
            def add(a: int, b: int) -> int: ...\n\
            \n\
            x: int = Input(\"x\")\n\
            \n\
            y = add(x, 1)\n\
            print(y)\n";
        let program = Parser::new(source).parse().unwrap().program;
        let decls = extract_declarations(&program).unwrap();
        let generated = generate(&program, &decls).unwrap();

        assert!(!generated.executable_text.contains("Input"));
        assert!(!generated.executable_text.contains("def add"));
        assert!(generated.executable_text.contains("y = add(x, 1)"));
        assert!(generated.executable_text.contains("print(y)"));
        assert!(generated.stub_text.contains("x: int"));
        assert!(generated.stub_text.contains("def add"));
        assert!(generated.line_map.len() > 0);
    }
}
