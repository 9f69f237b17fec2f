//! Decode raw service responses into typed outcomes.
//!
//! Nothing downstream probes JSON for field presence: a response is either a
//! well-formed value for its mode, malformed (with a reason), or never arrived.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::model::{
    AnomalyRecord, ContextReport, Direction, Edge, FocalAttrs, InsightRecord, Intel, NodeDescriptor,
    NodeKind, Price, Quote, ResourceAttrs, Snapshot,
};

#[derive(Debug)]
pub enum Decoded<T> {
    Ok(T),
    /// Response arrived but lacks what the mode requires
    Malformed(String),
    /// No response; the failure was logged where the request was made
    Transport,
}

impl<T> Decoded<T> {
    /// `None` is a response that never arrived (see [`crate::service::dispatch`]).
    pub fn from_response(resp: Option<Value>, decode: impl FnOnce(&Value) -> Decoded<T>) -> Self {
        match resp {
            Some(value) => decode(&value),
            None => Decoded::Transport,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decoded::Ok(_) => "ok",
            Decoded::Malformed(_) => "malformed",
            Decoded::Transport => "transport",
        }
    }
}

#[derive(Deserialize)]
struct WireNode {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: WireNodeData,
}

#[derive(Deserialize, Default)]
struct WireNodeData {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    price: Value,
    #[serde(default)]
    change: Value,
    #[serde(default, rename = "isUp")]
    is_up: Option<bool>,
    #[serde(default)]
    whale: Option<AnomalyRecord>,
}

#[derive(Deserialize)]
struct WireInsight {
    score: Value,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

fn display_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn node(raw: &Value) -> Result<NodeDescriptor, String> {
    let wire = WireNode::deserialize(raw).map_err(|e| e.to_string())?;
    let label = wire
        .data
        .label
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| wire.id.clone());
    let quote = Quote {
        price: Price::from_wire(&wire.data.price),
        percent_change: display_text(&wire.data.change),
        direction: Direction::from_is_up(wire.data.is_up.unwrap_or(false)),
    };
    let kind = match wire.kind.as_str() {
        "stock" | "focal" => {
            if quote.price.value.is_none() {
                return Err(format!("focal price {:?} is not numeric", quote.price.display));
            }
            NodeKind::Focal(FocalAttrs { quote, anomaly: wire.data.whale })
        }
        "resource" => NodeKind::Resource(ResourceAttrs { quote }),
        other => return Err(format!("unknown node type {:?}", other)),
    };
    Ok(NodeDescriptor { id: wire.id, label, kind })
}

/// Numeric score, or a numeric string such as `"85"`
fn score(raw: &Value) -> Option<f64> {
    let n = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then(|| n.round().clamp(0.0, 100.0))
}

fn insight(raw: &Value) -> Result<InsightRecord, String> {
    let wire = WireInsight::deserialize(raw).map_err(|e| e.to_string())?;
    let score = score(&wire.score).ok_or_else(|| format!("score {} is not a number", wire.score))?;
    Ok(InsightRecord {
        score: score as u8,
        status: wire.status,
        message: wire.message,
    })
}

/// Edges are passed through as sent; only ones that cannot name both ends are dropped.
fn edges(raw: Option<&Value>) -> Vec<Edge> {
    let items = match raw {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => return Vec::new(),
        Some(other) => {
            dropped("edges", &format!("expected a list, got {}", other));
            return Vec::new();
        }
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match Edge::deserialize(item) {
            Ok(edge) => Some(edge),
            Err(e) => {
                dropped("edge", &format!("edge {}: {}", i, e));
                None
            }
        })
        .collect()
}

fn dropped(part: &str, reason: &str) {
    log(
        Level::Debug,
        Domain::Dispatch,
        "snapshot_part_dropped",
        obj(&[("part", v_str(part)), ("reason", json!(reason))]),
    );
}

fn decode_snapshot(value: &Value) -> Result<Snapshot, String> {
    let raw_nodes = match value.get("nodes") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err("nodes is not an array".to_string()),
        None => return Err("missing nodes".to_string()),
    };

    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for (i, raw) in raw_nodes.iter().enumerate() {
        nodes.push(node(raw).map_err(|reason| format!("node {}: {}", i, reason))?);
    }
    let focal = nodes.iter().filter(|n| n.is_focal()).count();
    if focal > 1 {
        return Err(format!("{} focal nodes, at most one allowed", focal));
    }

    let edges = edges(value.get("edges"));
    let insight = match value.get("insight") {
        None | Some(Value::Null) => None,
        Some(raw) => match insight(raw) {
            Ok(record) => Some(record),
            Err(reason) => {
                dropped("insight", &reason);
                None
            }
        },
    };

    Ok(Snapshot { nodes, edges, insight })
}

/// SEARCH response, or the `intel` of a CONTEXT response
pub fn snapshot(value: &Value) -> Decoded<Snapshot> {
    match decode_snapshot(value) {
        Ok(snap) => Decoded::Ok(snap),
        Err(reason) => Decoded::Malformed(reason),
    }
}

pub fn context(value: &Value) -> Decoded<ContextReport> {
    match value.get("status").and_then(Value::as_str) {
        Some("ACTIVE") => {}
        Some(other) => return Decoded::Malformed(format!("context status {:?}", other)),
        None => return Decoded::Malformed("missing status".to_string()),
    }
    let ticker = match value.get("ticker").and_then(Value::as_str) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => return Decoded::Malformed("ACTIVE without ticker".to_string()),
    };
    let intel = match value.get("intel") {
        None | Some(Value::Null) => Intel::Absent,
        Some(raw) => match decode_snapshot(raw) {
            Ok(snap) => Intel::Snapshot(snap),
            Err(reason) => Intel::Malformed(reason),
        },
    };
    Decoded::Ok(ContextReport { ticker, intel })
}

/// RISK results are displayed verbatim, whatever their shape.
pub fn risk(value: &Value) -> Decoded<Value> {
    Decoded::Ok(value.clone())
}
