//! The sandbox interface Script Gateway drives to execute and type-check
//! transformed scripts (§6, "Sandbox interface (consumed)").
//!
//! The sandbox itself — the actual interpreter that runs the stripped
//! executable text — is an external collaborator out of scope for this
//! crate (§1's non-goals): "the core does not execute user code itself".
//! This crate only defines the narrow `Sandbox` trait the coordinator
//! (`scriptgate`) calls through, plus the typed errors a conforming
//! implementation raises. A different sandbox with the same shape can be
//! substituted by implementing [`Sandbox`].
//!
//! `testing` exposes an in-memory mock used by this workspace's own
//! integration tests, since no real interpreter is vendored here.

pub mod testing;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// A single stack frame the sandbox can report on a runtime failure,
/// carrying enough detail for the coordinator's error mapper (§4.7) to
/// translate an executable-text line back to a source line via the
/// [line map][scriptgate-codegen-linemap].
///
/// [scriptgate-codegen-linemap]: https://docs.rs/scriptgate_codegen
#[derive(Debug, Clone)]
pub struct Frame {
    pub executable_line: u32,
    pub source_line_text: Option<String>,
}

/// What a `RuntimeError` actually was on the host-language side (e.g. the
/// Python exception class name), exposed so the coordinator's error
/// mapper can use it for limit-kind detection before falling back to
/// scanning the message text (§4.7 step 3).
#[derive(Debug, Clone, Default)]
pub struct ExceptionInfo {
    pub type_name: Option<String>,
}

/// Errors a conforming [`Sandbox`] implementation raises. Mirrors the
/// shapes §6 requires: a stub-mismatch `TypingError`, a `LimitError` with
/// a `limit_type` tag, a `SyntaxError`, and a generic `RuntimeError` that
/// optionally exposes a traceback and the underlying exception type.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("type checking failed: {0}")]
    Typing(String),

    #[error("{kind} limit exceeded: {message}")]
    Limit { kind: String, message: String },

    #[error("syntax error in generated code: {0}")]
    Syntax(String),

    #[error("{message}")]
    Runtime { message: String, traceback: Vec<Frame>, exception: ExceptionInfo },
}

impl SandboxError {
    pub fn traceback(&self) -> &[Frame] {
        match self {
            Self::Runtime { traceback, .. } => traceback,
            _ => &[],
        }
    }

    pub fn exception(&self) -> Option<&ExceptionInfo> {
        match self {
            Self::Runtime { exception, .. } => Some(exception),
            _ => None,
        }
    }
}

/// An opaque, prepared handle a [`Sandbox`] hands back from
/// [`Sandbox::prepare`] and later consumes in [`Sandbox::run_async`].
/// Kept as a type-erased box because different sandbox backends need
/// wildly different internal state (a subprocess handle, an embedded
/// interpreter context, ...) and the coordinator never inspects it.
pub struct SandboxInstance(pub Box<dyn std::any::Any + Send + Sync>);

impl SandboxInstance {
    pub fn new<T: std::any::Any + Send + Sync>(value: T) -> Self {
        Self(Box::new(value))
    }
}

/// A callback invoked once per `print(...)` (or equivalent) call the
/// sandbox observes while running, so the coordinator can surface `print`
/// lifecycle events (§4.8) without buffering the whole run's output.
pub type PrintCallback = Box<dyn Fn(&str) + Send + Sync>;

/// The narrow contract the coordinator (C10) drives. See the crate docs
/// for why this crate only declares the interface rather than
/// implementing an interpreter.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Prepares the executable text for execution, optionally
    /// type-checking it against `stubs` first. Raises
    /// [`SandboxError::Typing`] on a stub/type mismatch.
    async fn prepare(
        &self,
        executable_text: &str,
        script_name: &str,
        type_check: bool,
        stubs: &str,
        input_names: &[String],
        external_names: &[String],
    ) -> Result<SandboxInstance, SandboxError>;

    /// Runs a previously prepared instance with the given inputs,
    /// external callables (invoked indirectly — the mock in `testing`
    /// calls them directly; a real sandbox would marshal them across a
    /// process or FFI boundary), virtual files, environment map, merged
    /// resource limits, and an optional print-capture hook.
    async fn run_async(
        &self,
        instance: &SandboxInstance,
        inputs: HashMap<String, Value>,
        externals: HashMap<String, ExternalCallback>,
        files: HashMap<String, Vec<u8>>,
        environ: HashMap<String, String>,
        limits: serde_json::Map<String, Value>,
        print_callback: Option<&PrintCallback>,
    ) -> Result<Value, SandboxError>;
}

/// A host-supplied implementation of one declared external. Boxed as a
/// plain synchronous closure over JSON values: the declared-name/type
/// validation (§4.8 step 2) happens in the coordinator before this is
/// ever invoked, so the callback itself only needs to compute a value.
pub type ExternalCallback = std::sync::Arc<dyn Fn(Vec<Value>, HashMap<String, Value>) -> Value + Send + Sync>;
