//! Lifecycle events the coordinator emits while checking and running a
//! bundle (§4.8 "Events").
//!
//! `ScriptBundle` never buffers these — an `on_event` callback, if
//! supplied, is invoked synchronously as each event occurs, in the
//! ordering guarantee of §5: `run_start` strictly precedes any `print`,
//! which strictly precede the terminal `run_complete`/`run_error`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RunStart,
    RunComplete,
    RunError,
    Print,
    CheckStart,
    CheckComplete,
}

/// One lifecycle record. Optional fields are populated only for the event
/// types that carry them (`text` for `Print`, `error` for `RunError`, and
/// so on) — present as `None`/omitted rather than given a meaningless
/// default for the others.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub script_name: String,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_summary: Option<String>,
}

impl ScriptEvent {
    pub fn new(event_type: EventType, script_name: impl Into<String>) -> Self {
        Self {
            event_type,
            script_name: script_name.into(),
            timestamp: now_unix_seconds(),
            duration_ms: None,
            text: None,
            error: None,
            input_count: None,
            external_count: None,
            result_summary: None,
        }
    }

    pub fn with_duration_ms(mut self, ms: f64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_counts(mut self, input_count: usize, external_count: usize) -> Self {
        self.input_count = Some(input_count);
        self.external_count = Some(external_count);
        self
    }

    pub fn with_result_summary(mut self, summary: impl Into<String>) -> Self {
        self.result_summary = Some(summary.into());
        self
    }
}

fn now_unix_seconds() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// A caller-supplied sink for [`ScriptEvent`]s.
pub type EventCallback = Box<dyn Fn(&ScriptEvent) + Send + Sync>;
