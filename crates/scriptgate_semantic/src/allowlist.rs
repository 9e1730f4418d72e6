//! The fixed allow-list of importable top-level module names (§4.3, E005).
//!
//! Three names are admitted: the host-declaration module a script imports
//! `external`/`Input` from (named `host` in this crate's own fixtures —
//! see `SPEC_FULL.md` §6), plus `typing` (type-hint names) and
//! `__future__` (forward-compat pragmas). Anything else surfaces E005.

pub const ALLOWED_MODULES: &[&str] = &["host", "typing", "__future__"];

pub fn is_allowed_module(top_level_name: &str) -> bool {
    ALLOWED_MODULES.contains(&top_level_name)
}

/// The top-level token of a (possibly dotted) module path: `"os.path"` ->
/// `"os"`. Import allow-listing matches on this token only (§4.3).
pub fn top_level_token(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}
