//! Structured JSON-lines logging.
//!
//! Every record is one JSON object on stderr, so stdout stays free for
//! command output. Setting `LOG_DIR` additionally writes the run's records
//! to `<LOG_DIR>/<run_id>/events.jsonl` (info and above) and `trace.jsonl`
//! (debug and trace).
//!
//! Filtering:
//! - `LOG_LEVEL`: trace | debug | info | warn | error (default info)
//! - `LOG_DOMAINS`: comma-separated domain list or `all`
//! - `PROFILE_SAMPLE`: fraction of profile scopes that report, 0.0..=1.0

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use crate::fortune::{FortuneSummary, ScoreBreakdown};

// =============================================================================
// Levels and domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|v| Level::parse(&v))
            .unwrap_or(Level::Info)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Calendar, // Pillar parsing, decade derivation
    Marker,   // ShenSha evaluation
    Fortune,  // Yearly scoring and candles
    Input,    // Request validation
    Export,   // Series files and manifests
    Server,   // HTTP requests
    System,   // Startup, config
    Profile,  // Timing scopes
    Audit,    // Series digests
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Calendar => "calendar",
            Domain::Marker => "marker",
            Domain::Fortune => "fortune",
            Domain::Input => "input",
            Domain::Export => "export",
            Domain::Server => "server",
            Domain::System => "system",
            Domain::Profile => "profile",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        domain_allowed(filter().domains.as_deref(), self.as_str())
    }
}

fn domain_allowed(domains: Option<&str>, name: &str) -> bool {
    match domains {
        None | Some("all") => true,
        Some(list) => list.split(',').any(|d| d.trim() == name),
    }
}

struct Filter {
    level: Level,
    domains: Option<String>,
}

static FILTER: OnceLock<Filter> = OnceLock::new();

fn filter() -> &'static Filter {
    FILTER.get_or_init(|| Filter {
        level: Level::from_env(),
        domains: std::env::var("LOG_DOMAINS").ok(),
    })
}

/// True when a record at `level` in `domain` would be written.
pub fn enabled(level: Level, domain: Domain) -> bool {
    level >= filter().level && domain.is_enabled()
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

struct FileSinks {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

struct RunContext {
    run_id: String,
    files: Option<FileSinks>,
}

fn run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let files = std::env::var("LOG_DIR")
            .ok()
            .and_then(|base| open_sinks(PathBuf::from(base).join(&run_id), &run_id));
        RunContext { run_id, files }
    })
}

fn open_sinks(run_dir: PathBuf, run_id: &str) -> Option<FileSinks> {
    let opened = create_dir_all(&run_dir).and_then(|_| {
        std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        )?;
        let events = File::create(run_dir.join("events.jsonl"))?;
        let trace = File::create(run_dir.join("trace.jsonl"))?;
        Ok(FileSinks {
            events: Mutex::new(BufWriter::new(events)),
            trace: Mutex::new(BufWriter::new(trace)),
        })
    });
    match opened {
        Ok(sinks) => Some(sinks),
        Err(err) => {
            eprintln!("[log] file sink disabled, {}: {}", run_dir.display(), err);
            None
        }
    }
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry if the level and domain pass the filter.
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if !enabled(level, domain) {
        return;
    }
    let ctx = run_context();
    let line = format_record(&ctx.run_id, next_seq(), level, domain, event, fields);
    if let Some(files) = &ctx.files {
        match level {
            Level::Trace | Level::Debug => write_line(&files.trace, &line),
            _ => write_line(&files.events, &line),
        }
    }
    eprintln!("{}", line);
}

fn format_record(
    run_id: &str,
    seq: u64,
    level: Level,
    domain: Domain,
    event: &str,
    mut fields: Map<String, Value>,
) -> String {
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(seq));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("domain".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    entry.insert("data".to_string(), Value::Object(fields));
    Value::Object(entry).to_string()
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Domain helpers
// =============================================================================

pub fn log_markers(label: &str, pillar: &str, names: &[&str]) {
    log(
        Level::Debug,
        Domain::Marker,
        "markers",
        obj(&[
            ("label", v_str(label)),
            ("pillar", v_str(pillar)),
            ("count", json!(names.len())),
            ("names", json!(names)),
        ]),
    );
}

pub fn log_decades(month: &str, forward: bool, count: usize) {
    log(
        Level::Debug,
        Domain::Calendar,
        "decades_derived",
        obj(&[
            ("month", v_str(month)),
            ("forward", json!(forward)),
            ("count", json!(count)),
        ]),
    );
}

pub fn log_projection_start(birth_year: i32, day: &str, base_score: f64, onset_age: u32, horizon: usize) {
    log(
        Level::Info,
        Domain::Fortune,
        "projection_start",
        obj(&[
            ("birth_year", json!(birth_year)),
            ("day", v_str(day)),
            ("base_score", v_num(base_score)),
            ("onset_age", json!(onset_age)),
            ("horizon", json!(horizon)),
        ]),
    );
}

/// Per-year term breakdown. Trace only; a projection emits a hundred of these.
pub fn log_year_breakdown(year: i32, decade: &str, annual: &str, breakdown: &ScoreBreakdown, composite: f64) {
    if !enabled(Level::Trace, Domain::Fortune) {
        return;
    }
    log(
        Level::Trace,
        Domain::Fortune,
        "year_score",
        obj(&[
            ("year", json!(year)),
            ("decade", v_str(decade)),
            ("annual", v_str(annual)),
            ("terms", serde_json::to_value(breakdown).unwrap_or(Value::Null)),
            ("composite", v_num(composite)),
        ]),
    );
}

pub fn log_projection_done(summary: &FortuneSummary) {
    log(
        Level::Info,
        Domain::Fortune,
        "projection_done",
        obj(&[
            ("first_year", json!(summary.first_year)),
            ("last_year", json!(summary.last_year)),
            ("peak_year", json!(summary.peak_year)),
            ("peak_score", v_num(summary.peak_score)),
            ("trough_year", json!(summary.trough_year)),
            ("trough_score", v_num(summary.trough_score)),
            ("mean_score", v_num(summary.mean_score)),
        ]),
    );
}

pub fn log_input_rejected(source: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Input,
        "input_rejected",
        obj(&[("source", v_str(source)), ("msg", v_str(reason))]),
    );
}

pub fn log_export(path: &str, sha256: &str, points: usize) {
    log(
        Level::Info,
        Domain::Export,
        "series_written",
        obj(&[
            ("path", v_str(path)),
            ("sha256", v_str(sha256)),
            ("points", json!(points)),
        ]),
    );
}

pub fn log_request(method: &str, path: &str, status: u16, elapsed_ms: f64) {
    let level = if status >= 500 {
        Level::Error
    } else if status >= 400 {
        Level::Warn
    } else {
        Level::Info
    };
    log(
        level,
        Domain::Server,
        "request",
        obj(&[
            ("method", v_str(method)),
            ("path", v_str(path)),
            ("status", json!(status)),
            ("elapsed_ms", v_num(elapsed_ms)),
        ]),
    );
}

/// Digest of a produced artefact, for replay comparison.
pub fn log_audit(event_type: &str, digest: &str) {
    log(
        Level::Info,
        Domain::Audit,
        event_type,
        obj(&[("sha256", v_str(digest))]),
    );
}

// =============================================================================
// Profiling
// =============================================================================

/// Emits elapsed time at trace level when dropped.
pub struct ProfileScope {
    module: &'static str,
    label: &'static str,
    started: Instant,
    enabled: bool,
}

impl ProfileScope {
    pub fn new(module: &'static str, label: &'static str) -> Self {
        Self {
            module,
            label,
            started: Instant::now(),
            enabled: enabled(Level::Trace, Domain::Profile) && Self::should_sample(),
        }
    }

    fn should_sample() -> bool {
        std::env::var("PROFILE_SAMPLE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(sample_hit)
            .unwrap_or(true)
    }
}

fn sample_hit(p: f64) -> bool {
    if p >= 1.0 {
        true
    } else if p <= 0.0 {
        false
    } else {
        let seq = PROFILE_SEQ.fetch_add(1, Ordering::SeqCst);
        ((seq % 10_000) as f64 / 10_000.0) < p
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        log(
            Level::Trace,
            Domain::Profile,
            "profile",
            obj(&[
                ("module", v_str(self.module)),
                ("label", v_str(self.label)),
                ("elapsed_ms", v_num(elapsed_ms)),
            ]),
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
