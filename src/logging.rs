//! Structured logging for the monitoring loop.
//!
//! Every record is one JSON line: `ts`, `run_id`, `seq`, `lvl`, `component`,
//! `event`, optional `symbol`/`msg`, and a `data` object. Records go to
//! stdout and, when `LOG_DIR` is set, to `<LOG_DIR>/<run_id>/events.jsonl`.
//!
//! Filtering:
//! - `LOG_LEVEL` (trace|debug|info|warn|error, default info)
//! - `LOG_DOMAINS` (comma-separated list or "all")

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::error::SentinelError;
use crate::ledger::LedgerSnapshot;
use crate::model::{Action, DetectedEvent, SystemStatus};

// =============================================================================
// Log Levels
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
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
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

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Clock,  // Tick start/stop
    Cycle,  // Status transitions, busy ticks
    Detect, // Candidates from the signal source
    Exec,   // Auto and manual actions
    Ledger, // Aggregate updates
    Watch,  // Watch list edits
    System, // Startup, shutdown, summaries
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Clock => "clock",
            Domain::Cycle => "cycle",
            Domain::Detect => "detect",
            Domain::Exec => "exec",
            Domain::Ledger => "ledger",
            Domain::Watch => "watch",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

/// Append-only JSONL file for one run.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn open(base: &Path, run_id: &str) -> std::io::Result<Self> {
        let dir = base.join(run_id);
        create_dir_all(&dir)?;
        let path = dir.join("events.jsonl");
        let file = File::create(&path)?;
        Ok(Self { path, writer: Mutex::new(BufWriter::new(file)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_line(&self, line: &str) {
        if let Ok(mut w) = self.writer.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    sink: Option<FileSink>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let sink = std::env::var("LOG_DIR").ok().and_then(|base| {
            FileSink::open(Path::new(&base), &run_id)
                .map_err(|err| eprintln!("[log] failed to open run log: {}", err))
                .ok()
        });
        RunContext { run_id, sink }
    })
}

pub fn run_id() -> &'static str {
    &ensure_run_context().run_id
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let ctx = ensure_run_context();
    let line = format_record(&ctx.run_id, level, domain, event, fields);
    if let Some(sink) = &ctx.sink {
        sink.write_line(&line);
    }
    println!("{}", line);
}

fn format_record(run_id: &str, level: Level, domain: Domain, event: &str, mut fields: Map<String, Value>) -> String {
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let symbol = fields.remove("symbol");

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(run_id));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    if let Some(symbol) = symbol {
        entry.insert("symbol".to_string(), symbol);
    }
    entry.insert("data".to_string(), Value::Object(fields));
    Value::Object(entry).to_string()
}

// =============================================================================
// Domain helpers
// =============================================================================

pub fn log_status(prev: SystemStatus, next: SystemStatus, cycle_id: u64) {
    log(
        Level::Debug,
        Domain::Cycle,
        "status",
        obj(&[
            ("prev", v_str(prev.as_str())),
            ("next", v_str(next.as_str())),
            ("cycle_id", json!(cycle_id)),
        ]),
    );
}

pub fn log_detection(event: &DetectedEvent, escalate: bool) {
    log(
        Level::Info,
        Domain::Detect,
        "candidate",
        obj(&[
            ("symbol", v_str(&event.symbol)),
            ("event_id", v_str(&event.id)),
            ("source", v_str(&event.source_ref)),
            ("confidence", v_num(event.confidence)),
            ("virality", v_num(event.virality)),
            ("trend", v_num(event.trend_strength)),
            ("mentions", json!(event.mention_count)),
            ("escalate", json!(escalate)),
        ]),
    );
}

pub fn log_action(action: &Action, trigger: &str, ledger: &LedgerSnapshot) {
    log(
        Level::Info,
        Domain::Exec,
        "action",
        obj(&[
            ("symbol", v_str(&action.symbol)),
            ("action_id", v_str(&action.id)),
            ("trigger", v_str(trigger)),
            ("side", v_str(action.side.as_str())),
            ("qty", json!(action.quantity)),
            ("price", v_num(action.price)),
            ("notional", v_num(action.notional())),
            ("delta", action.performance_delta.map(v_num).unwrap_or(Value::Null)),
            ("cumulative", v_num(ledger.cumulative_performance)),
            ("count", json!(ledger.action_count)),
        ]),
    );
}

pub fn log_ledger(action_id: &str, ledger: &LedgerSnapshot) {
    log(
        Level::Debug,
        Domain::Ledger,
        "fold",
        obj(&[
            ("action_id", v_str(action_id)),
            ("cumulative", v_num(ledger.cumulative_performance)),
            ("count", json!(ledger.action_count)),
            ("wins", json!(ledger.wins)),
        ]),
    );
}

pub fn log_failure(err: &SentinelError, cycle_id: u64) {
    log(
        Level::Warn,
        Domain::Cycle,
        "cycle_failed",
        obj(&[
            ("msg", v_str(&err.to_string())),
            ("kind", v_str(err.kind())),
            ("cycle_id", json!(cycle_id)),
        ]),
    );
}

/// Hex SHA-256 of a serialized snapshot, for replay/audit comparison.
pub fn state_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
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
// Tests
// =============================================================================
