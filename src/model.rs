//! Typed records carried between the analytics service and the dashboard store.
//!
//! Wire names follow the service (`is_whale`, `vol_str`, `risk_pct`, ...); the
//! Rust names follow what the fields mean on the dashboard.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn from_is_up(is_up: bool) -> Self {
        if is_up {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Direction::Up)
    }
}

/// Price text as the service formatted it, plus its numeric value when it parses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub display: String,
    pub value: Option<f64>,
}

impl Price {
    pub fn from_wire(raw: &Value) -> Self {
        match raw {
            Value::String(s) => Price {
                display: s.clone(),
                value: s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            },
            Value::Number(n) => Price {
                display: n.to_string(),
                value: n.as_f64().filter(|v| v.is_finite()),
            },
            Value::Null => Price {
                display: String::new(),
                value: None,
            },
            other => Price {
                display: other.to_string(),
                value: None,
            },
        }
    }
}

/// Market fields shared by both node kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Price,
    /// Percent change as display text, e.g. `"-1.25"`
    pub percent_change: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalAttrs {
    pub quote: Quote,
    pub anomaly: Option<AnomalyRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAttrs {
    pub quote: Quote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// The instrument under analysis
    Focal(FocalAttrs),
    /// A factor explaining the focal instrument
    Resource(ResourceAttrs),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
}

impl NodeDescriptor {
    pub fn is_focal(&self) -> bool {
        matches!(self.kind, NodeKind::Focal(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self.kind, NodeKind::Resource(_))
    }

    pub fn quote(&self) -> &Quote {
        match &self.kind {
            NodeKind::Focal(attrs) => &attrs.quote,
            NodeKind::Resource(attrs) => &attrs.quote,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            NodeKind::Focal(_) => "focal",
            NodeKind::Resource(_) => "resource",
        }
    }
}

// =============================================================================
// Edges
// =============================================================================

/// Graph edge, passed through from the service untouched.
///
/// Fields the dashboard does not read (`style`, `animated`, ...) are kept in
/// `extra` so the edge serializes back exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Analytics records
// =============================================================================

fn zero_display() -> String {
    "0".to_string()
}

fn unit_ratio() -> String {
    "1x".to_string()
}

/// Unusual-volume ("whale") record attached to the focal node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(rename = "is_whale", default)]
    pub detected: bool,
    #[serde(rename = "vol_str", default = "zero_display")]
    pub volume_display: String,
    #[serde(rename = "avg_str", default = "zero_display")]
    pub average_volume_display: String,
    #[serde(rename = "ratio", default = "unit_ratio")]
    pub ratio_display: String,
    #[serde(default)]
    pub narrative: String,
}

impl Default for AnomalyRecord {
    fn default() -> Self {
        Self {
            detected: false,
            volume_display: zero_display(),
            average_volume_display: zero_display(),
            ratio_display: unit_ratio(),
            narrative: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InsightRecord {
    /// Confluence score, 0..=100
    pub score: u8,
    pub status: String,
    pub message: String,
}

impl InsightRecord {
    pub fn band(&self) -> InsightBand {
        InsightBand::of(self.score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsightBand {
    Favorable,
    Neutral,
    Unfavorable,
}

impl InsightBand {
    pub fn of(score: u8) -> Self {
        if score >= 75 {
            InsightBand::Favorable
        } else if score <= 30 {
            InsightBand::Unfavorable
        } else {
            InsightBand::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightBand::Favorable => "favorable",
            InsightBand::Neutral => "neutral",
            InsightBand::Unfavorable => "unfavorable",
        }
    }
}

/// Everything one successful SEARCH (or CONTEXT intel) response carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub nodes: Vec<NodeDescriptor>,
    pub edges: Vec<Edge>,
    pub insight: Option<InsightRecord>,
}

impl Snapshot {
    pub fn focal(&self) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|n| n.is_focal())
    }
}

/// Intel carried by a CONTEXT response
#[derive(Debug, Clone, PartialEq)]
pub enum Intel {
    Absent,
    Malformed(String),
    Snapshot(Snapshot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextReport {
    pub ticker: String,
    pub intel: Intel,
}

// =============================================================================
// Risk panel
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    pub capital: f64,
    pub entry: f64,
    #[serde(rename = "risk_pct")]
    pub risk_percent: f64,
}

impl Default for RiskInputs {
    fn default() -> Self {
        Self {
            capital: 10_000.0,
            entry: 150.0,
            risk_percent: 1.0,
        }
    }
}

/// A single user edit to the risk inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskEdit {
    Capital(f64),
    Entry(f64),
    RiskPercent(f64),
}
