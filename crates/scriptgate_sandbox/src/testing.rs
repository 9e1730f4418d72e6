//! An in-memory [`Sandbox`] double used by this workspace's own tests.
//!
//! There is no vendored interpreter in this repo (§1: the sandbox is an
//! external collaborator), so integration tests that exercise
//! `scriptgate::ScriptBundle::run` configure a `MockSandbox` with a
//! closure standing in for "the sandbox ran the executable text and
//! produced this value" — the same way a host application's own test
//! suite would stub out its real sandbox dependency.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{ExternalCallback, Frame, PrintCallback, Sandbox, SandboxError, SandboxInstance};

/// Everything one `run_async` call received, handed to the configured
/// closure so it can compute a canned result (or raise a canned error)
/// based on the inputs/externals/limits a test cares about.
pub struct RunContext {
    pub executable_text: String,
    pub inputs: HashMap<String, Value>,
    pub externals: HashMap<String, ExternalCallback>,
    pub limits: serde_json::Map<String, Value>,
}

type RunFn = dyn Fn(&RunContext, Option<&PrintCallback>) -> Result<Value, SandboxError> + Send + Sync;

/// A [`Sandbox`] whose `run_async` defers entirely to a test-supplied
/// closure. `prepare` always succeeds unless `fail_typing` is set, since
/// no test in this workspace needs to exercise a real type checker.
pub struct MockSandbox {
    run_fn: Arc<RunFn>,
    fail_typing: bool,
}

impl MockSandbox {
    pub fn new<F>(run_fn: F) -> Self
    where
        F: Fn(&RunContext, Option<&PrintCallback>) -> Result<Value, SandboxError> + Send + Sync + 'static,
    {
        Self { run_fn: Arc::new(run_fn), fail_typing: false }
    }

    /// A sandbox that always returns `value`, ignoring its inputs.
    pub fn returning(value: Value) -> Self {
        Self::new(move |_ctx, _print| Ok(value.clone()))
    }

    /// A sandbox that always raises `err`, useful for exercising the
    /// coordinator's error-mapping path (§4.7) without a real failure.
    pub fn failing(make_err: impl Fn() -> SandboxError + Send + Sync + 'static) -> Self {
        Self::new(move |_ctx, _print| Err(make_err()))
    }

    pub fn with_failing_typecheck(mut self) -> Self {
        self.fail_typing = true;
        self
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    async fn prepare(
        &self,
        executable_text: &str,
        _script_name: &str,
        type_check: bool,
        _stubs: &str,
        _input_names: &[String],
        _external_names: &[String],
    ) -> Result<SandboxInstance, SandboxError> {
        if type_check && self.fail_typing {
            return Err(SandboxError::Typing("mock type-check failure".to_owned()));
        }
        Ok(SandboxInstance::new(executable_text.to_owned()))
    }

    async fn run_async(
        &self,
        instance: &SandboxInstance,
        inputs: HashMap<String, Value>,
        externals: HashMap<String, ExternalCallback>,
        _files: HashMap<String, Vec<u8>>,
        _environ: HashMap<String, String>,
        limits: serde_json::Map<String, Value>,
        print_callback: Option<&PrintCallback>,
    ) -> Result<Value, SandboxError> {
        let executable_text =
            instance.0.downcast_ref::<String>().cloned().unwrap_or_default();
        let ctx = RunContext { executable_text, inputs, externals, limits };
        (self.run_fn)(&ctx, print_callback)
    }
}

/// Builds a [`SandboxError::Runtime`] whose single traceback frame points
/// at `executable_line`, for tests exercising the line-map bridge (§4.7
/// step 1, scenario 6).
pub fn runtime_error_at(executable_line: u32, message: impl Into<String>) -> SandboxError {
    SandboxError::Runtime {
        message: message.into(),
        traceback: vec![Frame { executable_line, source_line_text: None }],
        exception: crate::ExceptionInfo::default(),
    }
}
