//! Structured JSON-lines logging for the dashboard engine.
//!
//! Every record carries a run id, a sequence number, a level and a domain so a
//! session can be replayed from its log: which request went out, what came
//! back (by digest), and which store state it produced (by hash).
//!
//! Records are written to stderr. When `LOG_DIR` is set they are also appended
//! to `{LOG_DIR}/{run_id}/events.jsonl`, with trace/debug going to
//! `trace.jsonl`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

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
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
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
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Graph,    // Layout derivation
    Context,  // Active context / snapshot transitions
    Dispatch, // Requests to the analytics service
    Risk,     // Risk panel inputs and results
    System,   // Startup, shutdown, session restore
    Profile,  // Request timing
    Audit,    // Payload digests and state hashes
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Graph => "graph",
            Domain::Context => "context",
            Domain::Dispatch => "dispatch",
            Domain::Risk => "risk",
            Domain::System => "system",
            Domain::Profile => "profile",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS: comma-separated list or "all"
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

#[derive(Debug)]
struct FileSinks {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    sinks: Option<FileSinks>,
}

fn open_sinks(base: &str, run_id: &str) -> std::io::Result<FileSinks> {
    let mut run_dir = PathBuf::from(base);
    run_dir.push(run_id);
    create_dir_all(&run_dir)?;
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
    Ok(FileSinks {
        events: Mutex::new(BufWriter::new(File::create(run_dir.join("events.jsonl"))?)),
        trace: Mutex::new(BufWriter::new(File::create(run_dir.join("trace.jsonl"))?)),
    })
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let sinks = match std::env::var("LOG_DIR") {
            Ok(base) => match open_sinks(&base, &run_id) {
                Ok(sinks) => Some(sinks),
                Err(err) => {
                    eprintln!("[log] file sinks disabled: {}", err);
                    None
                }
            },
            Err(_) => None,
        };
        RunContext { run_id, sinks }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["mode", "ticket", "symbol", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
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

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    emit_record(level, domain, event, fields);
}

fn emit_record(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if let Some(sinks) = &ctx.sinks {
        match level {
            Level::Trace | Level::Debug => write_line(&sinks.trace, &line),
            _ => write_line(&sinks.events, &line),
        }
    }
    eprintln!("{}", line);
}

// =============================================================================
// Dispatch logs
// =============================================================================

pub fn log_request(mode: &str, ticket: u64) {
    log(
        Level::Debug,
        Domain::Dispatch,
        "request",
        obj(&[("mode", v_str(mode)), ("ticket", json!(ticket))]),
    );
}

/// Transport or parse failure at the service boundary
pub fn log_transport_failure(mode: &str, ticket: u64, err: &anyhow::Error) {
    log(
        Level::Warn,
        Domain::Dispatch,
        "transport_failure",
        obj(&[
            ("mode", v_str(mode)),
            ("ticket", json!(ticket)),
            ("msg", v_str(&format!("{:#}", err))),
        ]),
    );
}

/// A response that arrived but did not carry what the mode requires
pub fn log_malformed(mode: &str, ticket: u64, reason: &str) {
    log(
        Level::Debug,
        Domain::Dispatch,
        "malformed_response",
        obj(&[
            ("mode", v_str(mode)),
            ("ticket", json!(ticket)),
            ("reason", v_str(reason)),
        ]),
    );
}

// =============================================================================
// Store transition logs
// =============================================================================

pub fn log_layout(focal: usize, resources: usize, edges: usize) {
    log(
        Level::Trace,
        Domain::Graph,
        "layout",
        obj(&[
            ("focal", json!(focal)),
            ("resources", json!(resources)),
            ("edges", json!(edges)),
        ]),
    );
}

pub fn log_context_change(previous: Option<&str>, next: &str, store_seq: u64) {
    log(
        Level::Info,
        Domain::Context,
        "context_change",
        obj(&[
            ("symbol", v_str(next)),
            ("previous", previous.map(v_str).unwrap_or(Value::Null)),
            ("store_seq", json!(store_seq)),
        ]),
    );
}

pub fn log_stale_response(mode: &str, ticket: u64, latest: u64) {
    log(
        Level::Info,
        Domain::Context,
        "stale_response",
        obj(&[
            ("mode", v_str(mode)),
            ("ticket", json!(ticket)),
            ("latest_applied", json!(latest)),
        ]),
    );
}

pub fn log_risk_result(result: &Value) {
    log(
        Level::Info,
        Domain::Risk,
        "risk_result",
        obj(&[("result", result.clone())]),
    );
}

// =============================================================================
// Audit trail
// =============================================================================

/// Tie a service payload to the store state it produced
pub fn log_audit(event_type: &str, ticket: u64, input_digest: &str, state_hash: u64, outcome: &str) {
    log(
        Level::Info,
        Domain::Audit,
        event_type,
        obj(&[
            ("ticket", json!(ticket)),
            ("input_digest", v_str(input_digest)),
            ("state_hash", v_str(&format!("{:016x}", state_hash))),
            ("outcome", v_str(outcome)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

/// SHA-256 hex digest of a JSON payload
pub fn payload_digest(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
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
// Profiling Scope
// =============================================================================

/// Emits elapsed time for the enclosing scope on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Map<String, Value>,
    started: Instant,
}

impl ProfileScope {
    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        Self {
            label,
            context: obj(fields),
            started: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = std::mem::take(&mut self.context);
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}
