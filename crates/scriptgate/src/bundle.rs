//! The script bundle and execution coordinator (C9, C10): the `load` →
//! `check` → `run` lifecycle described in §4.8.
//!
//! `ScriptBundle` is built once by [`ScriptBundle::load`] and is
//! thereafter immutable except for the cached parse result it keeps so
//! `check()` never re-reads the script from disk (§3 "Lifecycles",
//! avoiding the time-of-check/time-of-use race called out in §4.8).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use scriptgate_ast::Program;
use scriptgate_codegen::{generate, LineMap};
use scriptgate_diagnostics::{
    CheckError, CheckMessage, CheckResult, ExecutionError, GatewayError, OutputError,
};
use scriptgate_limits::Limits;
use scriptgate_parser::Parser;
use scriptgate_sandbox::{ExternalCallback, PrintCallback, Sandbox, SandboxError};
use scriptgate_semantic::{extract_declarations, Declarations, ExternalSpec, InputSpec};
use serde_json::Value;

use crate::artifacts;
use crate::error_mapper::map_sandbox_error;
use crate::events::{EventCallback, EventType, ScriptEvent};
use crate::validation::{validate_externals, validate_inputs, OutputValidator};

/// Everything `check()` needs to re-run the compatibility checker
/// without touching the filesystem again.
struct CachedParse {
    program: Program,
    decls: Declarations,
}

/// Construction-time options for [`ScriptBundle::load`]. All fields are
/// optional — an unset `limits` leaves the bundle with no baseline
/// budget (§4.8 step 3 falls back to [`Limits::default_preset`] only at
/// run time), and an unset `artifact_dir` means `load`/`check` never
/// touch disk beyond reading the script itself.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub limits: Option<Limits>,
    pub files: HashMap<String, Vec<u8>>,
    pub environ: HashMap<String, String>,
    pub artifact_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_files(mut self, files: HashMap<String, Vec<u8>>) -> Self {
        self.files = files;
        self
    }

    pub fn with_environ(mut self, environ: HashMap<String, String>) -> Self {
        self.environ = environ;
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }
}

/// Per-call options for [`ScriptBundle::run`]. `strict_validation`
/// defaults to `true` per §4.8: an undeclared input/external supplied
/// while strict is an [`scriptgate_diagnostics::InputError`] /
/// [`scriptgate_diagnostics::ExternalError`] rather than a warning.
pub struct RunOptions {
    pub inputs: HashMap<String, Value>,
    pub externals: HashMap<String, ExternalCallback>,
    pub files: Option<HashMap<String, Vec<u8>>>,
    pub environ: Option<HashMap<String, String>>,
    pub limits: Option<Limits>,
    pub print_callback: Option<PrintCallback>,
    pub on_event: Option<EventCallback>,
    pub output_validator: Option<Box<dyn OutputValidator>>,
    pub strict_validation: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            inputs: HashMap::new(),
            externals: HashMap::new(),
            files: None,
            environ: None,
            limits: None,
            print_callback: None,
            on_event: None,
            output_validator: None,
            strict_validation: true,
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inputs(mut self, inputs: HashMap<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_externals(mut self, externals: HashMap<String, ExternalCallback>) -> Self {
        self.externals = externals;
        self
    }

    pub fn with_files(mut self, files: HashMap<String, Vec<u8>>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn with_environ(mut self, environ: HashMap<String, String>) -> Self {
        self.environ = Some(environ);
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn with_print_callback(mut self, callback: PrintCallback) -> Self {
        self.print_callback = Some(callback);
        self
    }

    pub fn with_on_event(mut self, callback: EventCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    pub fn with_output_validator(mut self, validator: Box<dyn OutputValidator>) -> Self {
        self.output_validator = Some(validator);
        self
    }

    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }
}

/// A loaded, checked script, bundled with everything `check()` and
/// `run()` need (§3 "ScriptBundle"): its executable text, type stub,
/// line map, and the declarations extracted at load time.
pub struct ScriptBundle {
    path: PathBuf,
    name: String,
    executable_text: String,
    stub_text: String,
    line_map: LineMap,
    source_lines: Vec<String>,
    limits: Option<Limits>,
    files: HashMap<String, Vec<u8>>,
    environ: HashMap<String, String>,
    artifact_dir: Option<PathBuf>,
    parse: CachedParse,
}

impl ScriptBundle {
    /// Runs the full `load` pipeline of §4.8: parse, check, (on error)
    /// raise `CheckError`, generate the executable text + stub + line
    /// map, optionally write artifacts, and bundle the result.
    pub async fn load(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self, GatewayError> {
        let path = path.as_ref().to_path_buf();
        let source =
            fs::read_to_string(&path).map_err(|source| GatewayError::Io { path: path.clone(), source })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_owned());
        log::debug!("loading script '{name}' from {}", path.display());

        let program = Parser::new(&source).parse()?.program;
        let decls = extract_declarations(&program)?;
        let check_result = scriptgate_semantic::check(&program, &decls);
        if !check_result.is_ok() {
            let errors: Vec<CheckMessage> = check_result.errors().cloned().collect();
            log::debug!(
                "script '{name}' failed compatibility check ({} error(s))",
                errors.len()
            );
            return Err(CheckError::new(errors).into());
        }

        let generated = generate(&program, &decls)?;

        if let Some(dir) = &options.artifact_dir {
            artifacts::write_load_artifacts(
                dir,
                &name,
                &generated.stub_text,
                &generated.executable_text,
                &check_result,
                &decls.externals,
                &decls.inputs,
            );
        }

        Ok(Self {
            path,
            name,
            executable_text: generated.executable_text,
            stub_text: generated.stub_text,
            line_map: generated.line_map,
            source_lines: program.source_lines.clone(),
            limits: options.limits,
            files: options.files,
            environ: options.environ,
            artifact_dir: options.artifact_dir,
            parse: CachedParse { program, decls },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn externals(&self) -> &IndexMap<String, ExternalSpec> {
        &self.parse.decls.externals
    }

    pub fn inputs(&self) -> &IndexMap<String, InputSpec> {
        &self.parse.decls.inputs
    }

    pub fn executable_text(&self) -> &str {
        &self.executable_text
    }

    pub fn stub_text(&self) -> &str {
        &self.stub_text
    }

    pub fn line_map(&self) -> &LineMap {
        &self.line_map
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    pub fn limits(&self) -> Option<&Limits> {
        self.limits.as_ref()
    }

    /// Re-runs the compatibility checker against the cached parse result
    /// (§4.8: never re-reads the file) and additionally asks `sandbox`
    /// to type-check the executable text against the stub. A type
    /// mismatch is appended as a synthetic `E100` error diagnostic
    /// rather than raised — `check()` always returns, it never fails.
    pub async fn check<S: Sandbox>(
        &self,
        sandbox: &S,
        on_event: Option<&EventCallback>,
    ) -> CheckResult {
        if let Some(callback) = on_event {
            callback(&ScriptEvent::new(EventType::CheckStart, &self.name));
        }
        let start = Instant::now();

        let mut result = scriptgate_semantic::check(&self.parse.program, &self.parse.decls);

        let input_names: Vec<String> = self.parse.decls.inputs.keys().cloned().collect();
        let external_names: Vec<String> = self.parse.decls.externals.keys().cloned().collect();
        match sandbox
            .prepare(
                &self.executable_text,
                &self.name,
                true,
                &self.stub_text,
                &input_names,
                &external_names,
            )
            .await
        {
            Ok(_instance) => {}
            Err(SandboxError::Typing(message)) => {
                result.messages.push(CheckMessage::error("E100", message, 1, 0));
                result.messages.sort_by_key(|m| (m.line, m.column, m.code));
            }
            Err(other) => {
                log::debug!("sandbox.prepare raised a non-typing error during check(): {other}");
            }
        }

        if let Some(dir) = &self.artifact_dir {
            artifacts::write_check_artifact(dir, &self.name, &result);
        }

        if let Some(callback) = on_event {
            callback(
                &ScriptEvent::new(EventType::CheckComplete, &self.name)
                    .with_duration_ms(start.elapsed().as_secs_f64() * 1000.0),
            );
        }

        result
    }

    /// Validates inputs/externals, merges limits, drives the sandbox
    /// through one execution, and maps any failure back through the
    /// line map (§4.8 `run` steps 1–7).
    pub async fn run<S: Sandbox>(
        &self,
        sandbox: &S,
        options: RunOptions,
    ) -> Result<Value, GatewayError> {
        let RunOptions {
            inputs,
            externals,
            files,
            environ,
            limits,
            print_callback,
            on_event,
            output_validator,
            strict_validation,
        } = options;

        for warning in validate_inputs(&self.parse.decls, &inputs, strict_validation)? {
            log::warn!("{warning}");
        }
        for warning in validate_externals(&self.parse.decls, &externals, strict_validation)? {
            log::warn!("{warning}");
        }

        let merged_limits = self.merge_limits(limits.as_ref());

        let event_sink = on_event.map(Arc::new);
        emit(&event_sink, ScriptEvent::new(EventType::RunStart, &self.name).with_counts(inputs.len(), externals.len()));

        let start = Instant::now();
        let input_names: Vec<String> = self.parse.decls.inputs.keys().cloned().collect();
        let external_names: Vec<String> = self.parse.decls.externals.keys().cloned().collect();

        let instance = match sandbox
            .prepare(&self.executable_text, &self.name, false, &self.stub_text, &input_names, &external_names)
            .await
        {
            Ok(instance) => instance,
            Err(err) => return Err(self.fail_run(&err, &event_sink, start.elapsed().as_secs_f64() * 1000.0)),
        };

        let name = self.name.clone();
        let print_sink = event_sink.clone();
        let combined_print: Option<PrintCallback> = if print_callback.is_some() || print_sink.is_some() {
            Some(Box::new(move |text: &str| {
                if let Some(callback) = &print_callback {
                    callback(text);
                }
                emit(&print_sink, ScriptEvent::new(EventType::Print, &name).with_text(text));
            }))
        } else {
            None
        };

        let run_result = sandbox
            .run_async(
                &instance,
                inputs,
                externals,
                files.unwrap_or_else(|| self.files.clone()),
                environ.unwrap_or_else(|| self.environ.clone()),
                merged_limits.to_runtime(),
                combined_print.as_ref(),
            )
            .await;

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        match run_result {
            Ok(value) => {
                let value = match output_validator {
                    Some(validator) => validator
                        .validate(value)
                        .map_err(|errors| OutputError::new("script result failed output validation", errors))?,
                    None => value,
                };
                if let Some(dir) = &self.artifact_dir {
                    artifacts::append_run_log(dir, &self.name, "success", duration_ms);
                }
                emit(
                    &event_sink,
                    ScriptEvent::new(EventType::RunComplete, &self.name)
                        .with_duration_ms(duration_ms)
                        .with_result_summary(summarize(&value)),
                );
                Ok(value)
            }
            Err(err) => Err(self.fail_run(&err, &event_sink, duration_ms)),
        }
    }

    /// Maps a sandbox error, emits `run_error`, appends the non-fatal
    /// run log entry, and returns the mapped [`GatewayError`] for the
    /// caller to propagate (§4.8 step 6).
    fn fail_run(
        &self,
        err: &SandboxError,
        event_sink: &Option<Arc<EventCallback>>,
        duration_ms: f64,
    ) -> GatewayError {
        let mapped = map_sandbox_error(err, &self.line_map, &self.source_lines);
        if let Some(dir) = &self.artifact_dir {
            artifacts::append_run_log(dir, &self.name, &format!("error: {mapped}"), duration_ms);
        }
        emit(event_sink, ScriptEvent::new(EventType::RunError, &self.name).with_error(mapped.to_string()));
        mapped
    }

    /// §4.6: per-call overrides win over the bundle's own limits, which
    /// win over the `default` preset — the preset is only reached for
    /// fields neither side set (§4.8 step 3).
    fn merge_limits(&self, overrides: Option<&Limits>) -> Limits {
        let base = self.limits.unwrap_or_else(Limits::default_preset);
        match overrides {
            Some(overrides) => base.merge(overrides),
            None => base,
        }
    }

    /// Synchronous convenience wrapper around [`ScriptBundle::run`].
    /// Refuses rather than nesting a runtime inside an already-running
    /// one (§5: mirrors the original's `asyncio.get_running_loop()`
    /// probe).
    pub fn run_sync<S: Sandbox>(
        &self,
        sandbox: &S,
        options: RunOptions,
    ) -> Result<Value, GatewayError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(GatewayError::Execution(ExecutionError::new(
                "run_sync() cannot be called from within an already-running async runtime; \
                 await run() directly instead",
                None,
                None,
            )));
        }
        let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().map_err(
            |err| GatewayError::Execution(ExecutionError::new(format!("failed to start runtime: {err}"), None, None)),
        )?;
        runtime.block_on(self.run(sandbox, options))
    }
}

fn emit(sink: &Option<Arc<EventCallback>>, event: ScriptEvent) {
    if let Some(callback) = sink {
        callback(&event);
    }
}

/// A bounded, single-line stand-in for a result value in the run log and
/// `result_summary` event field — never the full payload, since a
/// script can return an arbitrarily large value.
fn summarize(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > 200 {
        let truncated: String = text.chars().take(200).collect();
        format!("{truncated}…")
    } else {
        text
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scriptgate_sandbox::testing::{runtime_error_at, MockSandbox};
    use std::sync::Mutex;

    async fn load_source(source: &str) -> ScriptBundle {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.gw");
        fs::write(&path, source).unwrap();
        // `load()` never re-reads the file afterward (it caches the
        // parse result), so the bundle outlives the directory safely.
        ScriptBundle::load(&path, LoadOptions::new()).await.unwrap()
    }

    #[tokio::test]
    async fn load_rejects_a_script_with_check_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.gw");
        fs::write(&path, "import os\n").unwrap();
        let err = ScriptBundle::load(&path, LoadOptions::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Check(_)));
    }

    #[tokio::test]
    async fn trivial_double_script_runs_end_to_end() {
        let bundle = load_source(
            "from host import external, Input\n\
             x: int = Input(\"x\")\n\
             @external\n\
             async def double(n: int) -> int: ...\n\
             result = double(x)\n",
        )
        .await;
        assert_eq!(bundle.externals().len(), 1);
        assert_eq!(bundle.inputs().len(), 1);

        let sandbox = MockSandbox::returning(Value::from(10));
        let mut inputs = HashMap::new();
        inputs.insert("x".to_owned(), Value::from(5));
        let options = RunOptions::new().with_inputs(inputs);
        let result = bundle.run(&sandbox, options).await.unwrap();
        assert_eq!(result, Value::from(10));
    }

    #[tokio::test]
    async fn missing_required_input_is_rejected_before_the_sandbox_runs() {
        let bundle = load_source("x: int = Input(\"x\")\nprint(x)\n").await;
        let sandbox = MockSandbox::returning(Value::Null);
        let err = bundle.run(&sandbox, RunOptions::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Input(_)));
    }

    #[tokio::test]
    async fn limit_error_is_never_an_execution_error() {
        let bundle = load_source("while True:\n    pass\n").await;
        let sandbox = MockSandbox::failing(|| SandboxError::Limit {
            kind: "duration".to_owned(),
            message: "exceeded 1ms".to_owned(),
        });
        let err = bundle.run(&sandbox, RunOptions::new()).await.unwrap_err();
        assert!(err.is_limit());
        assert!(!matches!(err, GatewayError::Execution(_)));
    }

    #[tokio::test]
    async fn sandbox_error_line_is_mapped_through_the_line_map() {
        let bundle = load_source(
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
            bundle.line_map().source_to_executable(7).expect("line 7 should survive strip");
        let sandbox = MockSandbox::failing(move || runtime_error_at(executable_line, "boom"));
        let mut inputs = HashMap::new();
        inputs.insert("budget".to_owned(), Value::from(1.0));
        let err = bundle
            .run(&sandbox, RunOptions::new().with_inputs(inputs))
            .await
            .unwrap_err();
        match err {
            GatewayError::Execution(e) => assert_eq!(e.line, Some(7)),
            other => panic!("expected Execution, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_events_fire_in_order() {
        let bundle = load_source("print('hi')\n").await;
        let sandbox = MockSandbox::new(|_ctx, print_cb| {
            if let Some(cb) = print_cb {
                cb("hi");
            }
            Ok(Value::from(1))
        });
        let seen: Arc<Mutex<Vec<EventType>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let on_event: EventCallback = Box::new(move |event| {
            recorder.lock().unwrap().push(event.event_type);
        });
        bundle.run(&sandbox, RunOptions::new().with_on_event(on_event)).await.unwrap();
        let events = seen.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![EventType::RunStart, EventType::Print, EventType::RunComplete]
        );
    }

    #[test]
    fn run_sync_refuses_inside_a_running_runtime() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let bundle = load_source("x = 1\n").await;
            let sandbox = MockSandbox::returning(Value::from(1));
            let err = bundle.run_sync(&sandbox, RunOptions::new()).unwrap_err();
            assert!(matches!(err, GatewayError::Execution(_)));
        });
    }
}
