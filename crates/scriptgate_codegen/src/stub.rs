//! Type-stub generation (C11): renders a `.pyi`-shaped text the sandbox's
//! type checker can validate the executable text against, with one
//! variable declaration per input and one function stub per external
//! (§4.11).
//!
//! Annotations are opaque text (never parsed — see the AST crate's
//! top-level docs), so the only structural work here is deciding which
//! `typing` names the stub actually uses, via whole-identifier matching
//! rather than a substring search: an annotation like `MyOptional` must
//! not pull in `Optional`.

use scriptgate_semantic::{Declarations, ExternalSpec, InputSpec, ParamKind};

/// Every name this crate will offer from `typing` if a stub's annotation
/// text happens to reference it. Kept as a fixed list rather than
/// deriving it from the `typing` module itself — the stub generator only
/// ever echoes back annotations a script itself wrote, so it only needs
/// to recognize names scripts are actually likely to use.
const TYPING_NAMES: &[&str] = &[
    "Any", "Optional", "Union", "List", "Dict", "Tuple", "Set", "Sequence", "Mapping", "Callable",
    "Iterable", "Iterator", "Literal",
];

pub fn generate_stub(decls: &Declarations) -> String {
    let mut body = String::new();
    for input in decls.inputs.values() {
        body.push_str(&input_stub_line(input));
        body.push('\n');
    }
    if !decls.inputs.is_empty() && !decls.externals.is_empty() {
        body.push('\n');
    }
    for (i, external) in decls.externals.values().enumerate() {
        if i > 0 {
            body.push('\n');
        }
        body.push_str(&external_stub_lines(external));
    }

    let used = referenced_typing_names(&body);
    if used.is_empty() {
        body
    } else {
        format!("from typing import {}\n\n{body}", used.join(", "))
    }
}

fn input_stub_line(input: &InputSpec) -> String {
    let annotation = input.type_annotation.as_deref().unwrap_or("Any");
    format!("{}: {annotation}", input.name)
}

fn external_stub_lines(external: &ExternalSpec) -> String {
    let params = external
        .parameters
        .iter()
        .map(|p| {
            let mut text = match p.kind {
                ParamKind::VarPositional => format!("*{}", p.name),
                ParamKind::VarKeyword => format!("**{}", p.name),
                _ => p.name.clone(),
            };
            let annotation = p.type_annotation.as_deref().unwrap_or("Any");
            text.push_str(&format!(": {annotation}"));
            if p.has_default {
                text.push_str(" = ...");
            }
            text
        })
        .collect::<Vec<_>>()
        .join(", ");
    let returns = external.return_type.as_deref().unwrap_or("Any");
    let kw = if external.is_async { "async def" } else { "def" };
    format!("{kw} {}({params}) -> {returns}: ...", external.name)
}

/// Finds every `typing` name that occurs as a whole identifier (not as a
/// substring of a longer one) anywhere in `text`.
fn referenced_typing_names(text: &str) -> Vec<&'static str> {
    TYPING_NAMES.iter().copied().filter(|name| contains_identifier(text, name)).collect()
}

fn contains_identifier(haystack: &str, needle: &str) -> bool {
    let bytes = haystack.as_bytes();
    let needle_bytes = needle.as_bytes();
    let mut start = 0;
    while let Some(rel) = haystack[start..].find(needle) {
        let idx = start + rel;
        let before_ok = idx == 0 || !is_ident_byte(bytes[idx - 1]);
        let after = idx + needle_bytes.len();
        let after_ok = after >= bytes.len() || !is_ident_byte(bytes[after]);
        if before_ok && after_ok {
            return true;
        }
        start = idx + 1;
    }
    false
}

fn is_ident_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

#[cfg(test)]
mod test {
    use super::*;
    use scriptgate_parser::Parser;
    use scriptgate_semantic::extract_declarations;

    fn declarations(src: &str) -> Declarations {
        let program = Parser::new(src).parse().unwrap().program;
        extract_declarations(&program).unwrap()
    }

    #[test]
    fn emits_any_for_missing_annotations() {
        let decls = declarations("x = Input(\"x\")\n");
        let stub = generate_stub(&decls);
        assert!(stub.contains("x: Any"));
        assert!(stub.starts_with("from typing import Any"));
    }

    #[test]
    fn omits_typing_import_when_unused() {
        let decls = declarations("x: int = Input(\"x\")\n");
        let stub = generate_stub(&decls);
        assert!(!stub.contains("from typing import"));
        assert!(stub.contains("x: int"));
    }

    #[test]
    fn does_not_match_typing_name_as_substring() {
        let decls = declarations("x: MyOptional = Input(\"x\")\n");
        let stub = generate_stub(&decls);
        assert!(!stub.contains("from typing import"));
    }

    #[test]
    fn renders_external_signature() {
        let decls = declarations(
            "from host import external\n@external\nasync def add(a: int, b: int = 0) -> int: ...\n",
        );
        let stub = generate_stub(&decls);
        assert!(stub.contains("async def add(a: int, b: int = ...) -> int: ..."));
    }
}
