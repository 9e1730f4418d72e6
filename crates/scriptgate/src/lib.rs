//! Script Gateway's coordinator crate: the `load` → `check` → `run`
//! lifecycle of §4.8 ("Script Bundle & Coordinator", C9/C10).
//!
//! [`ScriptBundle::load`] drives the full pipeline other crates in this
//! workspace implement in isolation — parse (`scriptgate_parser`),
//! extract declarations and check compatibility (`scriptgate_semantic`),
//! strip and generate executable text + line map + stub
//! (`scriptgate_codegen`) — and bundles the result. [`ScriptBundle::check`]
//! and [`ScriptBundle::run`] then drive a caller-supplied
//! [`scriptgate_sandbox::Sandbox`] implementation, translating every
//! failure back to a source line through the line map (§4.7) so a host
//! application never has to reason about the transformed text its users
//! never see.
//!
//! This crate does not execute user code itself (§1's non-goal) — see
//! `scriptgate_sandbox::testing::MockSandbox` for the double this
//! crate's own tests drive in place of a real interpreter.

mod artifacts;
mod bundle;
mod error_mapper;
pub mod events;
mod validation;

pub use bundle::{LoadOptions, RunOptions, ScriptBundle};
pub use events::{EventCallback, EventType, ScriptEvent};
pub use validation::OutputValidator;

pub use scriptgate_diagnostics::{
    CheckError, CheckMessage, CheckResult, ExecutionError, ExternalError, GatewayError,
    InputError, LimitError, LimitKind, OutputError, ParseError, Severity,
};
pub use scriptgate_limits::Limits;
pub use scriptgate_sandbox::{ExternalCallback, PrintCallback, Sandbox};
pub use scriptgate_semantic::{Declarations, ExternalSpec, InputSpec, ParamKind, ParameterSpec};
