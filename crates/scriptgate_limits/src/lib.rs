//! Resource budgets (C7): memory, wall-clock duration, recursion depth and
//! allocation-count ceilings a host enforces on a sandbox run.
//!
//! `Limits` is immutable after construction (§3) and accepts either
//! structured numeric fields or the human-readable strings described
//! below, which are parsed once at construction time — never re-parsed on
//! every `merge`/`to_runtime` call.
//!
//! - memory: `^\d+(\.\d+)?(kb|mb|gb)$`, case-insensitive; `kb`/`mb`/`gb`
//!   multiply by 1024/1048576/1073741824 respectively.
//! - duration: `^\d+(\.\d+)?(ms|s)$`; `ms` divides by 1000 to produce
//!   seconds.

use once_cell::sync::Lazy;
use regex::Regex;
use scriptgate_diagnostics::ParseError;
use serde::{Deserialize, Serialize};

static MEMORY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)(kb|mb|gb)$").unwrap());
static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d+(?:\.\d+)?)(ms|s)$").unwrap());

fn parse_memory(s: &str) -> Result<u64, ParseError> {
    let caps = MEMORY_RE
        .captures(s.trim())
        .ok_or_else(|| ParseError::new(format!("invalid memory limit string {s:?}"), None, None))?;
    let value: f64 = caps[1].parse().expect("regex guarantees numeric group");
    let multiplier = match caps[2].to_ascii_lowercase().as_str() {
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        _ => unreachable!("regex only matches kb/mb/gb"),
    };
    Ok((value * multiplier) as u64)
}

fn parse_duration(s: &str) -> Result<f64, ParseError> {
    let caps = DURATION_RE.captures(s.trim()).ok_or_else(|| {
        ParseError::new(format!("invalid duration limit string {s:?}"), None, None)
    })?;
    let value: f64 = caps[1].parse().expect("regex guarantees numeric group");
    Ok(match caps[2].to_ascii_lowercase().as_str() {
        "ms" => value / 1000.0,
        "s" => value,
        _ => unreachable!("regex only matches ms/s"),
    })
}

/// Resource budget passed to the sandbox for one run. Every field is
/// optional; an absent field is unconstrained. See the crate docs for the
/// accepted string formats.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Limits {
    pub max_memory_bytes: Option<u64>,
    pub max_duration_seconds: Option<f64>,
    pub max_recursion: Option<u32>,
    pub max_allocations: Option<u64>,
    pub gc_interval: Option<u32>,
}

impl Limits {
    pub fn builder() -> LimitsBuilder {
        LimitsBuilder::default()
    }

    /// `{8 MiB, 500 ms, recursion 120}` — for scripts processing untrusted
    /// input with no slack.
    pub fn strict() -> Self {
        Self {
            max_memory_bytes: Some(8 * 1024 * 1024),
            max_duration_seconds: Some(0.5),
            max_recursion: Some(120),
            max_allocations: None,
            gc_interval: None,
        }
    }

    /// `{16 MiB, 2 s, recursion 200}` — the baseline used when a bundle
    /// has no limits configured anywhere (§4.8 step 3).
    pub fn default_preset() -> Self {
        Self {
            max_memory_bytes: Some(16 * 1024 * 1024),
            max_duration_seconds: Some(2.0),
            max_recursion: Some(200),
            max_allocations: None,
            gc_interval: None,
        }
    }

    /// `{64 MiB, 5 s, recursion 400}` — for trusted or long-running
    /// scripts.
    pub fn permissive() -> Self {
        Self {
            max_memory_bytes: Some(64 * 1024 * 1024),
            max_duration_seconds: Some(5.0),
            max_recursion: Some(400),
            max_allocations: None,
            gc_interval: None,
        }
    }

    /// Returns a new `Limits` where each field is `overrides`'s value if
    /// set, else `self`'s (P5: `base.merge(empty) == base`).
    pub fn merge(&self, overrides: &Limits) -> Self {
        Self {
            max_memory_bytes: overrides.max_memory_bytes.or(self.max_memory_bytes),
            max_duration_seconds: overrides.max_duration_seconds.or(self.max_duration_seconds),
            max_recursion: overrides.max_recursion.or(self.max_recursion),
            max_allocations: overrides.max_allocations.or(self.max_allocations),
            gc_interval: overrides.gc_interval.or(self.gc_interval),
        }
    }

    /// Emits the key map the sandbox interface understands (§4.6):
    /// `max_memory` (bytes), `max_duration` (`max_duration_secs`),
    /// `max_recursion` (`max_recursion_depth`), others pass through.
    /// `None` fields are omitted entirely rather than serialized as
    /// `null`, since the sandbox interface treats a missing key as
    /// unconstrained.
    pub fn to_runtime(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        if let Some(v) = self.max_memory_bytes {
            map.insert("max_memory".to_owned(), serde_json::json!(v));
        }
        if let Some(v) = self.max_duration_seconds {
            map.insert("max_duration_secs".to_owned(), serde_json::json!(v));
        }
        if let Some(v) = self.max_recursion {
            map.insert("max_recursion_depth".to_owned(), serde_json::json!(v));
        }
        if let Some(v) = self.max_allocations {
            map.insert("max_allocations".to_owned(), serde_json::json!(v));
        }
        if let Some(v) = self.gc_interval {
            map.insert("gc_interval".to_owned(), serde_json::json!(v));
        }
        map
    }
}

/// Constructs a [`Limits`] from either numeric or human-readable string
/// fields, failing at build time (never later) if a string is malformed.
#[derive(Debug, Clone, Default)]
pub struct LimitsBuilder {
    max_memory_bytes: Option<u64>,
    max_duration_seconds: Option<f64>,
    max_recursion: Option<u32>,
    max_allocations: Option<u64>,
    gc_interval: Option<u32>,
}

impl LimitsBuilder {
    pub fn max_memory_bytes(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    pub fn max_memory_str(mut self, s: &str) -> Result<Self, ParseError> {
        self.max_memory_bytes = Some(parse_memory(s)?);
        Ok(self)
    }

    pub fn max_duration_seconds(mut self, secs: f64) -> Self {
        self.max_duration_seconds = Some(secs);
        self
    }

    pub fn max_duration_str(mut self, s: &str) -> Result<Self, ParseError> {
        self.max_duration_seconds = Some(parse_duration(s)?);
        Ok(self)
    }

    pub fn max_recursion(mut self, depth: u32) -> Self {
        self.max_recursion = Some(depth);
        self
    }

    pub fn max_allocations(mut self, count: u64) -> Self {
        self.max_allocations = Some(count);
        self
    }

    pub fn gc_interval(mut self, interval: u32) -> Self {
        self.gc_interval = Some(interval);
        self
    }

    pub fn build(self) -> Limits {
        Limits {
            max_memory_bytes: self.max_memory_bytes,
            max_duration_seconds: self.max_duration_seconds,
            max_recursion: self.max_recursion,
            max_allocations: self.max_allocations,
            gc_interval: self.gc_interval,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_memory_strings() {
        assert_eq!(parse_memory("8mb").unwrap(), 8 * 1024 * 1024);
        assert_eq!(parse_memory("1.5GB").unwrap(), (1.5 * 1024.0 * 1024.0 * 1024.0) as u64);
        assert_eq!(parse_memory("512kb").unwrap(), 512 * 1024);
    }

    #[test]
    fn rejects_malformed_memory_string() {
        assert!(parse_memory("8 megabytes").is_err());
    }

    #[test]
    fn parses_duration_strings() {
        assert_eq!(parse_duration("1ms").unwrap(), 0.001);
        assert_eq!(parse_duration("2s").unwrap(), 2.0);
    }

    #[test]
    fn merge_identity_with_empty_overrides() {
        let base = Limits::default_preset();
        assert_eq!(base.merge(&Limits::default()), base);
    }

    #[test]
    fn merge_prefers_override_field() {
        let base = Limits::default_preset();
        let overrides = Limits::builder().max_duration_str("1ms").unwrap().build();
        let merged = base.merge(&overrides);
        assert_eq!(merged.max_duration_seconds, Some(0.001));
        assert_eq!(merged.max_memory_bytes, base.max_memory_bytes);
    }

    #[test]
    fn to_runtime_omits_unset_fields() {
        let limits = Limits::builder().max_memory_bytes(1024).build();
        let runtime = limits.to_runtime();
        assert!(runtime.contains_key("max_memory"));
        assert!(!runtime.contains_key("max_duration_secs"));
    }

    #[test]
    fn presets_match_spec_values() {
        let strict = Limits::strict();
        assert_eq!(strict.max_memory_bytes, Some(8 * 1024 * 1024));
        assert_eq!(strict.max_duration_seconds, Some(0.5));
        assert_eq!(strict.max_recursion, Some(120));
    }
}
