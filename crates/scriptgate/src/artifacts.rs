//! The artifacts manager (C12): writes the on-disk artifact directory
//! (§6) and the append-only run log.
//!
//! Every write here is wrapped so an `io::Error` is logged via
//! `log::warn!` and swallowed — artifact failures never propagate as
//! errors (§4.8 step 6, §7's "Local recovery" policy). Concurrent
//! `check()` calls on the same path are expected to race on these files;
//! `create_dir_all` and plain overwrite-on-write already tolerate that
//! without raising (§5, "Shared-resource rules").

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use scriptgate_diagnostics::CheckResult;
use scriptgate_semantic::{ExternalSpec, InputSpec};

fn script_dir(artifact_dir: &Path, script_stem: &str) -> PathBuf {
    artifact_dir.join(script_stem)
}

fn ensure_dir(dir: &Path) {
    if let Err(err) = fs::create_dir_all(dir) {
        log::warn!("could not create artifact directory {}: {err}", dir.display());
    }
}

fn write_text(dir: &Path, file_name: &str, contents: &str) {
    let path = dir.join(file_name);
    if let Err(err) = fs::write(&path, contents) {
        log::warn!("could not write artifact {}: {err}", path.display());
    }
}

fn write_json(dir: &Path, file_name: &str, value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => write_text(dir, file_name, &json),
        Err(err) => log::warn!("could not serialize artifact {file_name}: {err}"),
    }
}

/// Writes `stubs.pyi`, `monty_code.py`, `check.json`, `externals.json`
/// and `inputs.json` for one `load()` call (§6). The executable-text
/// file keeps the original implementation's `monty_code.py` name for
/// artifact-layout compatibility even though nothing here is Python.
pub fn write_load_artifacts(
    artifact_dir: &Path,
    script_stem: &str,
    stub_text: &str,
    executable_text: &str,
    check_result: &CheckResult,
    externals: &IndexMap<String, ExternalSpec>,
    inputs: &IndexMap<String, InputSpec>,
) {
    let dir = script_dir(artifact_dir, script_stem);
    ensure_dir(&dir);
    write_text(&dir, "stubs.pyi", stub_text);
    write_text(&dir, "monty_code.py", executable_text);
    write_json(&dir, "check.json", check_result);
    write_json(&dir, "externals.json", externals);
    write_json(&dir, "inputs.json", inputs);
}

/// Re-writes `check.json` after a `check()` call, which may have
/// appended a synthetic `E100` diagnostic `load()` never sees (the
/// sandbox's own type checker runs only in `check()`).
pub fn write_check_artifact(artifact_dir: &Path, script_stem: &str, check_result: &CheckResult) {
    let dir = script_dir(artifact_dir, script_stem);
    ensure_dir(&dir);
    write_json(&dir, "check.json", check_result);
}

/// Appends one line to `run.log`: a timestamp, duration, outcome, and a
/// truncated summary. Never the full result payload — a script that
/// returns megabytes of output must not turn the log into the same
/// thing.
pub fn append_run_log(artifact_dir: &Path, script_stem: &str, outcome: &str, duration_ms: f64) {
    let dir = script_dir(artifact_dir, script_stem);
    ensure_dir(&dir);
    let path = dir.join("run.log");
    let timestamp =
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0);
    let truncated: String = outcome.chars().take(200).collect();
    let line = format!("{timestamp:.3} {duration_ms:.2}ms {truncated}\n");
    let result = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut f| f.write_all(line.as_bytes()));
    if let Err(err) = result {
        log::warn!("could not append to run log {}: {err}", path.display());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use scriptgate_diagnostics::CheckResult;

    #[test]
    fn writes_all_five_files_and_tolerates_repeat_calls() {
        let tmp = tempfile::tempdir().unwrap();
        let check_result = CheckResult::default();
        let externals = IndexMap::new();
        let inputs = IndexMap::new();

        write_load_artifacts(
            tmp.path(),
            "demo",
            "x: int",
            "x = 1\n",
            &check_result,
            &externals,
            &inputs,
        );
        // Writing twice must not panic (EEXIST / overwrite tolerance).
        write_load_artifacts(
            tmp.path(),
            "demo",
            "x: int",
            "x = 1\n",
            &check_result,
            &externals,
            &inputs,
        );

        let dir = tmp.path().join("demo");
        for name in ["stubs.pyi", "monty_code.py", "check.json", "externals.json", "inputs.json"] {
            assert!(dir.join(name).exists(), "missing artifact {name}");
        }
    }

    #[test]
    fn run_log_appends_rather_than_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        append_run_log(tmp.path(), "demo", "success", 12.5);
        append_run_log(tmp.path(), "demo", "error: boom", 3.0);
        let contents = fs::read_to_string(tmp.path().join("demo").join("run.log")).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn missing_artifact_dir_parent_is_non_fatal() {
        // A path nested under a file (not a directory) can never be
        // created; this must log a warning, not panic or return an error.
        let tmp = tempfile::tempdir().unwrap();
        let blocked = tmp.path().join("not_a_dir");
        fs::write(&blocked, b"x").unwrap();
        append_run_log(&blocked, "demo", "success", 1.0);
    }
}
