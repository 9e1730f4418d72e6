//! The bidirectional executable-line ↔ source-line map (C6).
//!
//! The stripper never tracks line correspondence statement-by-statement
//! while it transforms the tree — instead it builds the map after the
//! fact by walking the original (pre-strip) statement positions in the
//! same source order as the post-strip, re-parsed executable text's
//! statement positions, and zipping the two sequences together (§4.5).
//! This keeps the transform itself a plain filter with no bookkeeping,
//! at the cost of re-parsing the generated text once per load.

use std::collections::HashMap;

use scriptgate_ast::{MatchCase, Program, Stmt, StmtKind};
use scriptgate_span::GetSpan;

/// Maps executable (post-strip) line numbers to source (pre-strip) line
/// numbers and back. Built once per load and never mutated afterward.
#[derive(Debug, Clone, Default)]
pub struct LineMap {
    executable_to_source: HashMap<u32, u32>,
    source_to_executable: HashMap<u32, u32>,
}

impl LineMap {
    /// Records one `(executable_line, source_line)` correspondence.
    /// First writer wins in both directions: once a line has an entry it
    /// is never overwritten, so a source line that produced several
    /// executable lines (or vice versa) always resolves to the first —
    /// i.e. earliest-in-source-order — match.
    pub fn add(&mut self, executable_line: u32, source_line: u32) {
        self.executable_to_source.entry(executable_line).or_insert(source_line);
        self.source_to_executable.entry(source_line).or_insert(executable_line);
    }

    pub fn executable_to_source(&self, executable_line: u32) -> Option<u32> {
        self.executable_to_source.get(&executable_line).copied()
    }

    pub fn source_to_executable(&self, source_line: u32) -> Option<u32> {
        self.source_to_executable.get(&source_line).copied()
    }

    pub fn len(&self) -> usize {
        self.executable_to_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executable_to_source.is_empty()
    }
}

/// Builds a [`LineMap`] from the (stripped, pre-renumbering) source-side
/// AST and the AST obtained by re-parsing the generated executable text.
/// Both trees are walked in source order collecting every statement's
/// start line; the two sequences are then zipped pairwise (§4.5). The
/// sequences are necessarily the same length because the executable text
/// was produced by unparsing `stripped` verbatim — the re-parse can only
/// disagree on line *numbers*, never on the statement count or shape.
pub fn build_line_map(stripped: &Program, reparsed: &Program) -> LineMap {
    let source_lines = collect_statement_lines(&stripped.body);
    let executable_lines = collect_statement_lines(&reparsed.body);
    let mut map = LineMap::default();
    for (exe_line, src_line) in executable_lines.into_iter().zip(source_lines) {
        map.add(exe_line, src_line);
    }
    map
}

fn collect_statement_lines(stmts: &[Stmt]) -> Vec<u32> {
    let mut lines = Vec::new();
    for stmt in stmts {
        walk_stmt(stmt, &mut lines);
    }
    lines
}

fn walk_stmt(stmt: &Stmt, lines: &mut Vec<u32>) {
    lines.push(stmt.span().start.line);
    match &stmt.kind {
        StmtKind::FunctionDef(f) => {
            for s in &f.body {
                walk_stmt(s, lines);
            }
        }
        StmtKind::ClassDef(c) => {
            for s in &c.body {
                walk_stmt(s, lines);
            }
        }
        StmtKind::For(f) => {
            for s in f.body.iter().chain(&f.orelse) {
                walk_stmt(s, lines);
            }
        }
        StmtKind::While(w) => {
            for s in w.body.iter().chain(&w.orelse) {
                walk_stmt(s, lines);
            }
        }
        StmtKind::If(i) => {
            for s in i.body.iter().chain(&i.orelse) {
                walk_stmt(s, lines);
            }
        }
        StmtKind::With(w) => {
            for s in &w.body {
                walk_stmt(s, lines);
            }
        }
        StmtKind::Try(t) => {
            for s in &t.body {
                walk_stmt(s, lines);
            }
            for h in &t.handlers {
                for s in &h.body {
                    walk_stmt(s, lines);
                }
            }
            for s in t.orelse.iter().chain(&t.finalbody) {
                walk_stmt(s, lines);
            }
        }
        StmtKind::Match { cases, .. } => {
            for case in cases {
                walk_match_case(case, lines);
            }
        }
        _ => {}
    }
}

fn walk_match_case(case: &MatchCase, lines: &mut Vec<u32>) {
    for s in &case.body {
        walk_stmt(s, lines);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scriptgate_parser::Parser;

    fn parse(src: &str) -> Program {
        Parser::new(src).parse().unwrap().program
    }

    #[test]
    fn maps_same_shaped_programs_line_for_line() {
        let stripped = parse("x = 1\ny = 2\n");
        let reparsed = parse("x = 1\ny = 2\n");
        let map = build_line_map(&stripped, &reparsed);
        assert_eq!(map.executable_to_source(1), Some(1));
        assert_eq!(map.executable_to_source(2), Some(2));
    }

    #[test]
    fn maps_across_differing_line_numbers() {
        // Source had a removed declaration between two kept statements;
        // the stripped copy keeps its original line numbers (3 and 7),
        // but the regenerated text collapses them to consecutive lines.
        let stripped = parse("\n\nx = 1\n\n\n\ny = 2\n");
        let reparsed = parse("x = 1\ny = 2\n");
        let map = build_line_map(&stripped, &reparsed);
        assert_eq!(map.executable_to_source(1), Some(3));
        assert_eq!(map.executable_to_source(2), Some(7));
        assert_eq!(map.source_to_executable(3), Some(1));
        assert_eq!(map.source_to_executable(7), Some(2));
    }

    #[test]
    fn first_writer_wins_on_repeated_lines() {
        let mut map = LineMap::default();
        map.add(1, 5);
        map.add(1, 9);
        assert_eq!(map.executable_to_source(1), Some(5));
    }
}
