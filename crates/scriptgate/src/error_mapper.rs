//! The line-map bridge (§4.7): translates a [`SandboxError`] raised at run
//! time into the typed [`GatewayError`] variant a caller should see,
//! resolving the offending source line through the bundle's [`LineMap`]
//! without ever falling back to the executable line number (P8).

use once_cell::sync::Lazy;
use regex::Regex;
use scriptgate_codegen::LineMap;
use scriptgate_diagnostics::{ExecutionError, GatewayError, LimitError, LimitKind};
use scriptgate_sandbox::SandboxError;
use scriptgate_span::SourceText;

static LINE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bline\s+(\d+)\b").unwrap());

/// Maps a sandbox failure to the `GatewayError` a `run()` caller receives.
pub fn map_sandbox_error(
    err: &SandboxError,
    line_map: &LineMap,
    source_lines: &[String],
) -> GatewayError {
    match err {
        SandboxError::Typing(message) => {
            GatewayError::Execution(ExecutionError::new(message.clone(), None, None))
        }
        SandboxError::Syntax(message) => GatewayError::Execution(ExecutionError::new(
            format!("syntax error in generated code: {message}"),
            None,
            None,
        )),
        SandboxError::Limit { kind, message } => {
            let source_line = resolve_source_line(message, &[], line_map);
            GatewayError::Limit(LimitError::new(LimitKind::detect(kind), message.clone(), source_line))
        }
        SandboxError::Runtime { message, traceback, exception } => {
            let source_line = resolve_source_line(message, traceback, line_map);

            let exception_kind = exception.type_name.as_deref().map(LimitKind::detect);
            let message_kind = LimitKind::detect(message);
            let detected = exception_kind
                .filter(|k| *k != LimitKind::Unknown)
                .or_else(|| (message_kind != LimitKind::Unknown).then_some(message_kind));
            if let Some(kind) = detected {
                return GatewayError::Limit(LimitError::new(kind, message.clone(), source_line));
            }

            let mut execution_error = ExecutionError::new(message.clone(), source_line, None);
            if let Some(line) = source_line {
                execution_error = execution_error.with_context(context_window(source_lines, line));
            }
            GatewayError::Execution(execution_error)
        }
    }
}

/// Step 1: prefer the top traceback frame's executable line, translated
/// through the line map. Step 2: if there is no frame, scan the message
/// text for a `line <N>` pattern instead. Either way, a miss stays a miss
/// — the executable line number is never substituted for the unresolved
/// source line (P8).
fn resolve_source_line(
    message: &str,
    traceback: &[scriptgate_sandbox::Frame],
    line_map: &LineMap,
) -> Option<u32> {
    if let Some(frame) = traceback.first() {
        return line_map.executable_to_source(frame.executable_line);
    }
    let executable_line: u32 = LINE_PATTERN.captures(message)?.get(1)?.as_str().parse().ok()?;
    line_map.executable_to_source(executable_line)
}

fn context_window(source_lines: &[String], line: u32) -> String {
    let source = SourceText::new(source_lines.join("\n"));
    source.context_display(line, 2)
}

#[cfg(test)]
mod test {
    use super::*;
    use scriptgate_sandbox::Frame;

    fn map_with(pairs: &[(u32, u32)]) -> LineMap {
        let mut map = LineMap::default();
        for (exe, src) in pairs {
            map.add(*exe, *src);
        }
        map
    }

    #[test]
    fn resolves_source_line_through_traceback_frame() {
        let map = map_with(&[(3, 8)]);
        let err = SandboxError::Runtime {
            message: "boom".to_owned(),
            traceback: vec![Frame { executable_line: 3, source_line_text: None }],
            exception: scriptgate_sandbox::ExceptionInfo::default(),
        };
        let lines = vec!["a".to_owned(); 10];
        let mapped = map_sandbox_error(&err, &map, &lines);
        match mapped {
            GatewayError::Execution(e) => assert_eq!(e.line, Some(8)),
            other => panic!("expected Execution, got {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_message_line_scan() {
        let map = map_with(&[(5, 12)]);
        let err = SandboxError::Runtime {
            message: "error at line 5, column 2".to_owned(),
            traceback: vec![],
            exception: scriptgate_sandbox::ExceptionInfo::default(),
        };
        let lines = vec!["a".to_owned(); 20];
        let mapped = map_sandbox_error(&err, &map, &lines);
        match mapped {
            GatewayError::Execution(e) => assert_eq!(e.line, Some(12)),
            other => panic!("expected Execution, got {other:?}"),
        }
    }

    #[test]
    fn unmapped_executable_line_never_falls_back_to_itself() {
        let map = LineMap::default();
        let err = SandboxError::Runtime {
            message: "boom".to_owned(),
            traceback: vec![Frame { executable_line: 42, source_line_text: None }],
            exception: scriptgate_sandbox::ExceptionInfo::default(),
        };
        let mapped = map_sandbox_error(&err, &map, &[]);
        match mapped {
            GatewayError::Execution(e) => assert_eq!(e.line, None),
            other => panic!("expected Execution, got {other:?}"),
        }
    }

    #[test]
    fn detects_limit_from_exception_type_before_message() {
        let err = SandboxError::Runtime {
            message: "operation failed".to_owned(),
            traceback: vec![],
            exception: scriptgate_sandbox::ExceptionInfo { type_name: Some("MemoryError".to_owned()) },
        };
        let mapped = map_sandbox_error(&err, &LineMap::default(), &[]);
        assert!(mapped.is_limit());
    }

    #[test]
    fn limit_error_is_never_mistaken_for_execution_error() {
        let err = SandboxError::Limit { kind: "duration".to_owned(), message: "too slow".to_owned() };
        let mapped = map_sandbox_error(&err, &LineMap::default(), &[]);
        assert!(mapped.is_limit());
        assert!(!matches!(mapped, GatewayError::Execution(_)));
    }
}
