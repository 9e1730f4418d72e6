//! Error and diagnostic types shared by every stage of the Script Gateway
//! pipeline (parse, check, codegen, run).
//!
//! The type hierarchy intentionally mirrors the error taxonomy of the
//! implementation this crate is ported from rather than Rust's usual
//! "one big enum with `#[from]` everywhere" shortcut: callers that only care
//! about, say, input validation failures can match on [`InputError`]
//! directly instead of destructuring [`GatewayError`].

mod check_message;
mod error;

pub use check_message::{CheckMessage, CheckResult, Severity};
pub use error::{
    CheckError, ExecutionError, ExternalError, GatewayError, InputError, LimitError, LimitKind,
    OutputError, ParseError,
};

pub use miette;
pub use thiserror;
