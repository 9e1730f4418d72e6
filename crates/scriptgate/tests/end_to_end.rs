//! End-to-end scenarios from §8 of the specification, driven through the
//! public `ScriptBundle` API against the in-memory `MockSandbox` double
//! (this workspace vendors no real sandbox — see the crate docs).

use std::collections::HashMap;
use std::fs;

use scriptgate::{GatewayError, LoadOptions, RunOptions, ScriptBundle};
use scriptgate_sandbox::testing::MockSandbox;
use serde_json::Value;

async fn load(source: &str) -> ScriptBundle {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.gw");
    fs::write(&path, source).unwrap();
    ScriptBundle::load(&path, LoadOptions::new()).await.unwrap()
}

async fn load_with_artifacts(source: &str, artifact_dir: &std::path::Path) -> ScriptBundle {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.gw");
    fs::write(&path, source).unwrap();
    ScriptBundle::load(&path, LoadOptions::new().with_artifact_dir(artifact_dir)).await.unwrap()
}

/// Scenario 1: trivial double.
#[tokio::test]
async fn trivial_double() {
    let bundle = load(
        "from host import external, Input\n\
         x: int = Input(\"x\")\n\
         @external\n\
         async def double(n: int) -> int: ...\n\
         result = await double(x)\n",
    )
    .await;
    assert!(bundle.executable_text().contains("result = await double(x)"));
    assert!(!bundle.executable_text().contains("Input"));

    let sandbox = MockSandbox::new(|ctx, _print| {
        let n = ctx.inputs.get("x").and_then(Value::as_i64).unwrap_or(0);
        Ok(Value::from(n * 2))
    });
    let mut inputs = HashMap::new();
    inputs.insert("x".to_owned(), Value::from(5));
    let result =
        bundle.run(&sandbox, RunOptions::new().with_inputs(inputs)).await.unwrap();
    assert_eq!(result, Value::from(10));
}

/// Scenario 2: a duration limit violation surfaces as `LimitError`,
/// never `ExecutionError` (P6).
#[tokio::test]
async fn limit_exceeded_is_disjoint_from_execution_error() {
    let bundle = load("while True:\n    pass\n").await;
    let sandbox = MockSandbox::failing(|| scriptgate_sandbox::SandboxError::Limit {
        kind: "duration".to_owned(),
        message: "exceeded 1ms".to_owned(),
    });
    let limits = scriptgate_limits::Limits::builder().max_duration_str("1ms").unwrap().build();
    let err = bundle
        .run(&sandbox, RunOptions::new().with_limits(limits))
        .await
        .unwrap_err();
    assert!(err.is_limit());
    assert!(!matches!(err, GatewayError::Execution(_)));
}

/// Scenario 3: a disallowed import fails `load` with `CheckError`
/// carrying E005 and the offending line.
#[tokio::test]
async fn forbidden_import_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.gw");
    fs::write(&path, "import os\n").unwrap();
    let err = ScriptBundle::load(&path, LoadOptions::new()).await.unwrap_err();
    match err {
        GatewayError::Check(check_err) => {
            assert!(check_err.messages.iter().any(|m| m.code == "E005" && m.line == 1));
        }
        other => panic!("expected CheckError, got {other:?}"),
    }
}

/// Scenario 4: nested-declaration immunity (P7) — `load` succeeds and
/// the inner `@external` is invisible to the bundle.
#[tokio::test]
async fn nested_declaration_is_invisible() {
    let bundle = load(
        "from host import external\n\
         def outer():\n    \
             @external\n    \
             def inner(x: int) -> str: ...\n    \
             return inner(5)\n",
    )
    .await;
    assert!(bundle.externals().is_empty());
}

/// Scenario 5: an `Input()` declared-name/variable-name mismatch is a
/// `ParseError`, not a `CheckError`.
#[tokio::test]
async fn input_name_mismatch_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("script.gw");
    fs::write(&path, "budget: float = Input(\"totally_wrong\")\n").unwrap();
    let err = ScriptBundle::load(&path, LoadOptions::new()).await.unwrap_err();
    match err {
        GatewayError::Parse(parse_err) => assert_eq!(parse_err.line, Some(1)),
        other => panic!("expected ParseError, got {other:?}"),
    }
}

/// Scenario 6: a runtime error attributed to an executable line is
/// translated back to the source line it was stripped from.
#[tokio::test]
async fn runtime_error_line_survives_the_strip() {
    let bundle = load(
        "from host import external\n\
         budget: float = Input(\"budget\")\n\
         \n\
         @external\n\
         def helper() -> int: ...\n\
         \n\
         result = budget * 2\n",
    )
    .await;
    let executable_line =
        bundle.line_map().source_to_executable(7).expect("final statement must be mapped");
    let sandbox = MockSandbox::failing(move || {
        scriptgate_sandbox::testing::runtime_error_at(executable_line, "division by zero")
    });
    let mut inputs = HashMap::new();
    inputs.insert("budget".to_owned(), Value::from(2.0));
    let err = bundle
        .run(&sandbox, RunOptions::new().with_inputs(inputs))
        .await
        .unwrap_err();
    match err {
        GatewayError::Execution(e) => assert_eq!(e.line, Some(7)),
        other => panic!("expected ExecutionError, got {other:?}"),
    }
}

/// P8: an executable line the line map never recorded must never fall
/// back to being reported as the (wrong) source line.
#[tokio::test]
async fn unmapped_executable_line_has_no_source_line() {
    let bundle = load("x = 1\n").await;
    let sandbox = MockSandbox::failing(|| {
        scriptgate_sandbox::testing::runtime_error_at(9999, "boom")
    });
    let err = bundle.run(&sandbox, RunOptions::new()).await.unwrap_err();
    match err {
        GatewayError::Execution(e) => assert_eq!(e.line, None),
        other => panic!("expected ExecutionError, got {other:?}"),
    }
}

/// P4: checking the same parsed script twice (through two independent
/// loads of identical source) produces bit-for-bit identical results.
#[tokio::test]
async fn check_is_idempotent() {
    let source = "from host import external, Input\nx: int = Input(\"x\")\n@external\nasync def double(n: int) -> int: ...\nresult = double(x)\n";
    let bundle_a = load(source).await;
    let bundle_b = load(source).await;
    let sandbox = MockSandbox::returning(Value::Null);
    let result_a = bundle_a.check(&sandbox, None).await;
    let result_b = bundle_b.check(&sandbox, None).await;
    assert_eq!(result_a, result_b);
}

/// §4.8 step 6: `load` writes the five artifact files, and a later
/// `check()` call overwrites `check.json` without raising even though
/// the directory already exists (§5's EEXIST tolerance).
#[tokio::test]
async fn load_and_check_write_artifacts_without_raising_on_overwrite() {
    let artifact_root = tempfile::tempdir().unwrap();
    let bundle = load_with_artifacts(
        "from host import external, Input\nx: int = Input(\"x\")\n@external\nasync def double(n: int) -> int: ...\nresult = double(x)\n",
        artifact_root.path(),
    )
    .await;
    let script_dir = artifact_root.path().join(bundle.name());
    for name in ["stubs.pyi", "monty_code.py", "check.json", "externals.json", "inputs.json"] {
        assert!(script_dir.join(name).exists(), "missing artifact {name}");
    }

    let sandbox = MockSandbox::returning(Value::Null);
    bundle.check(&sandbox, None).await;
    bundle.check(&sandbox, None).await;
    assert!(script_dir.join("check.json").exists());
}

/// Strict-mode validation: an undeclared external supplied at run time
/// is rejected before the sandbox is ever invoked.
#[tokio::test]
async fn strict_mode_rejects_undeclared_external() {
    let bundle = load("x = 1\n").await;
    let sandbox = MockSandbox::returning(Value::Null);
    let mut externals: HashMap<String, scriptgate_sandbox::ExternalCallback> = HashMap::new();
    externals.insert(
        "not_declared".to_owned(),
        std::sync::Arc::new(|_args, _kwargs| Value::Null),
    );
    let err = bundle
        .run(&sandbox, RunOptions::new().with_externals(externals).with_strict_validation(true))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::External(_)));
}

/// Non-strict mode only warns about the same undeclared external
/// (execution proceeds).
#[tokio::test]
async fn non_strict_mode_allows_undeclared_external() {
    let bundle = load("x = 1\n").await;
    let sandbox = MockSandbox::returning(Value::from(1));
    let mut externals: HashMap<String, scriptgate_sandbox::ExternalCallback> = HashMap::new();
    externals.insert(
        "not_declared".to_owned(),
        std::sync::Arc::new(|_args, _kwargs| Value::Null),
    );
    let result = bundle
        .run(&sandbox, RunOptions::new().with_externals(externals).with_strict_validation(false))
        .await
        .unwrap();
    assert_eq!(result, Value::from(1));
}
