//! Runtime input/external validation (§4.8 `run` steps 1–2) and the
//! optional output-schema validation hook (step 7).

use std::collections::HashMap;

use scriptgate_diagnostics::{ExternalError, InputError};
use scriptgate_sandbox::ExternalCallback;
use scriptgate_semantic::Declarations;
use serde_json::Value;

/// Checks `inputs` against the bundle's declared [`InputSpec`] map:
/// - every required (no default) input must be present;
/// - in strict mode, a supplied input the script never declared is an
///   error; otherwise it only produces a warning string for the caller to
///   log (the checker never discovers this case, since it is a property
///   of runtime arguments, not of the script itself).
pub fn validate_inputs(
    decls: &Declarations,
    inputs: &HashMap<String, Value>,
    strict: bool,
) -> Result<Vec<String>, InputError> {
    for spec in decls.inputs.values() {
        if spec.required && !inputs.contains_key(&spec.name) {
            return Err(InputError::new(
                format!("missing required input '{}'", spec.name),
                spec.name.clone(),
            ));
        }
    }
    let mut warnings = Vec::new();
    for name in inputs.keys() {
        if !decls.inputs.contains_key(name) {
            if strict {
                return Err(InputError::new(
                    format!("undeclared input '{name}' supplied in strict mode"),
                    name.clone(),
                ));
            }
            warnings.push(format!("input '{name}' was supplied but not declared by the script"));
        }
    }
    Ok(warnings)
}

/// Symmetric to [`validate_inputs`]: every declared external must have a
/// supplied implementation, and an undeclared one supplied in strict mode
/// is an error rather than a warning.
pub fn validate_externals(
    decls: &Declarations,
    externals: &HashMap<String, ExternalCallback>,
    strict: bool,
) -> Result<Vec<String>, ExternalError> {
    for spec in decls.externals.values() {
        if !externals.contains_key(&spec.name) {
            return Err(ExternalError::new(
                format!("missing implementation for external '{}'", spec.name),
                spec.name.clone(),
            ));
        }
    }
    let mut warnings = Vec::new();
    for name in externals.keys() {
        if !decls.externals.contains_key(name) {
            if strict {
                return Err(ExternalError::new(
                    format!("undeclared external '{name}' supplied in strict mode"),
                    name.clone(),
                ));
            }
            warnings
                .push(format!("external '{name}' was supplied but not declared by the script"));
        }
    }
    Ok(warnings)
}

/// A caller-supplied schema `run()` validates a successful result against
/// before returning it (§4.8 step 7). Distinct from the sandbox's own type
/// checking: this runs on the *output value*, after execution, entirely
/// within the host process.
pub trait OutputValidator: Send + Sync {
    /// Returns the (possibly coerced) value on success, or the list of
    /// validation error messages on failure.
    fn validate(&self, value: Value) -> Result<Value, Vec<String>>;
}

#[cfg(test)]
mod test {
    use super::*;
    use scriptgate_parser::Parser;
    use scriptgate_semantic::extract_declarations;

    fn decls(src: &str) -> Declarations {
        let program = Parser::new(src).parse().unwrap().program;
        extract_declarations(&program).unwrap()
    }

    #[test]
    fn missing_required_input_is_an_error() {
        let decls = decls("x: int = Input(\"x\")\n");
        let err = validate_inputs(&decls, &HashMap::new(), true).unwrap_err();
        assert_eq!(err.input_name, "x");
    }

    #[test]
    fn undeclared_input_warns_in_non_strict_mode() {
        let decls = decls("x: int = Input(\"x\")\n");
        let mut inputs = HashMap::new();
        inputs.insert("x".to_owned(), Value::from(1));
        inputs.insert("y".to_owned(), Value::from(2));
        let warnings = validate_inputs(&decls, &inputs, false).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn undeclared_input_errors_in_strict_mode() {
        let decls = decls("x: int = Input(\"x\")\n");
        let mut inputs = HashMap::new();
        inputs.insert("x".to_owned(), Value::from(1));
        inputs.insert("y".to_owned(), Value::from(2));
        assert!(validate_inputs(&decls, &inputs, true).is_err());
    }

    #[test]
    fn missing_external_implementation_is_an_error() {
        let decls = decls("from host import external\n@external\ndef f(a: int) -> int: ...\n");
        let err = validate_externals(&decls, &HashMap::new(), true).unwrap_err();
        assert_eq!(err.function_name, "f");
    }
}
