//! Declaration extraction (C3) and compatibility checking (C4) for the
//! Script Gateway subset.
//!
//! These two passes run over the same parsed [`scriptgate_ast::Program`]:
//! the extractor (`declarations`) collects what the script *declares*
//! (`@external` functions, `Input(...)` bindings), and the checker
//! (`checker`) walks the full tree to decide whether the script is
//! otherwise *allowed* (§4.3's coded diagnostics). They are kept in
//! separate modules — rather than one combined visitor — because the
//! extractor only ever looks at the top level (P7) while the checker
//! walks everything, and conflating the two traversal depths in one pass
//! is a frequent source of "nested declaration leaked into the top-level
//! map" bugs in implementations of this kind of subset checker.

mod allowlist;
mod checker;
mod declarations;

pub use allowlist::{is_allowed_module, ALLOWED_MODULES};
pub use checker::check;
pub use declarations::{
    extract_declarations, is_external_decorator, is_input_call, Declarations, ExternalSpec,
    InputSpec, ParamKind, ParameterSpec,
};
