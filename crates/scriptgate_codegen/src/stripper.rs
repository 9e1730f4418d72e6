//! Declaration stripping (C5): removes the host-import, `@external`
//! function defs, and `Input(...)` bindings a script declared at the top
//! level, leaving everything else byte-for-byte structurally intact
//! (§4.4).
//!
//! Only top-level statements are ever candidates for removal — this
//! mirrors the extractor's own top-level-only walk (P7) and guarantees a
//! script that merely *mentions* `external`/`Input` inside a nested scope
//! is untouched.

use scriptgate_ast::{Program, Stmt, StmtKind};
use scriptgate_semantic::{is_external_decorator, is_input_call};

pub const HOST_MODULE: &str = "host";

/// Returns a copy of `program` with its top-level declaration statements
/// removed. The clone is shallow in spirit — nested bodies are untouched —
/// but `Stmt`/`Expr` nodes are `Clone`, so this is a cheap, ordinary tree
/// copy rather than a bespoke deep-copy routine.
pub fn strip_declarations(program: &Program) -> Program {
    let body = program.body.iter().filter(|stmt| !is_removable(stmt)).cloned().collect();
    Program::new(body, program.source_lines.clone())
}

fn is_removable(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::ImportFrom(import) => {
            import.level == 0 && import.module.as_deref() == Some(HOST_MODULE)
        }
        StmtKind::FunctionDef(f) => f.decorators.iter().any(is_external_decorator),
        StmtKind::AnnAssign(ann) => ann.simple && is_input_binding(ann.value.as_ref()),
        StmtKind::Assign(assign) => {
            assign.targets.len() == 1
                && matches!(assign.targets[0].kind, scriptgate_ast::ExprKind::Name(_))
                && is_input_binding(Some(&assign.value))
        }
        _ => false,
    }
}

fn is_input_binding(value: Option<&scriptgate_ast::Expr>) -> bool {
    let Some(value) = value else { return false };
    matches!(&value.kind, scriptgate_ast::ExprKind::Call { func, .. } if is_input_call(func))
}

#[cfg(test)]
mod test {
    use super::*;
    use scriptgate_parser::Parser;

    fn parse(src: &str) -> Program {
        Parser::new(src).parse().unwrap().program
    }

    #[test]
    fn removes_host_import_external_and_input() {
        let program = parse(
            "from host import external, Input\n\
             @external\n\
             def add(a: int, b: int) -> int: ...\n\
             x: int = Input(\"x\")\n\
             print(x)\n",
        );
        let stripped = strip_declarations(&program);
        assert_eq!(stripped.body.len(), 1);
        assert!(matches!(stripped.body[0].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn preserves_unrelated_imports_and_nested_declarations() {
        let program = parse(
            "import math\n\
             from host import external\n\
             def outer():\n    \
                 @external\n    \
                 def inner(): ...\n    \
                 return 1\n",
        );
        let stripped = strip_declarations(&program);
        assert_eq!(stripped.body.len(), 2);
        assert!(matches!(stripped.body[0].kind, StmtKind::Import(_)));
        assert!(matches!(stripped.body[1].kind, StmtKind::FunctionDef(_)));
    }

    #[test]
    fn preserves_non_simple_annassign_target() {
        let program = parse("class C:\n    pass\nc = C()\nc.x: int = 1\n");
        let stripped = strip_declarations(&program);
        assert_eq!(stripped.body.len(), program.body.len());
    }
}
