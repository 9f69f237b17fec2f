//! Dashboard state with deterministic hashing for replay validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::layout::PositionedNode;
use crate::model::{AnomalyRecord, Edge, InsightRecord, RiskInputs};

/// Laid-out graph, replaced wholesale on every applied snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn focal(&self) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.node.is_focal())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Complete dashboard state - hashable for replay validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardState {
    /// Focal symbol shown in the sidebar header; no sidebar while unset
    pub active_context: Option<String>,
    pub active_insight: Option<InsightRecord>,
    /// Unset until the first snapshot lands
    pub active_anomaly: Option<AnomalyRecord>,
    pub graph: GraphSnapshot,

    /// Risk panel
    pub risk_inputs: RiskInputs,
    pub risk_result: Option<Value>,

    /// Correlation-matrix view visibility
    pub graph_open: bool,

    /// Applied transitions
    pub seq: u64,
    /// Newest ticket whose response was applied
    pub latest_ticket: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(RiskInputs::default())
    }
}

impl DashboardState {
    pub fn new(risk_inputs: RiskInputs) -> Self {
        Self {
            active_context: None,
            active_insight: None,
            active_anomaly: None,
            graph: GraphSnapshot::default(),
            risk_inputs,
            risk_result: None,
            graph_open: false,
            seq: 0,
            latest_ticket: 0,
        }
    }

    /// Compute deterministic state hash for replay validation
    pub fn hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut h = DefaultHasher::new();

        self.seq.hash(&mut h);
        self.latest_ticket.hash(&mut h);
        self.graph_open.hash(&mut h);
        self.active_context.hash(&mut h);
        self.active_insight.hash(&mut h);
        self.active_anomaly.hash(&mut h);

        // Floats quantized to avoid comparison noise
        for n in &self.graph.nodes {
            n.node.id.hash(&mut h);
            n.node.label.hash(&mut h);
            n.node.kind_str().hash(&mut h);
            n.node.quote().price.display.hash(&mut h);
            n.node.quote().percent_change.hash(&mut h);
            n.node.quote().direction.hash(&mut h);
            ((n.x * 1e6) as i64).hash(&mut h);
            ((n.y * 1e6) as i64).hash(&mut h);
            n.focused.hash(&mut h);
            n.hidden.hash(&mut h);
        }
        for e in &self.graph.edges {
            serde_json::to_string(e).unwrap_or_default().hash(&mut h);
        }

        ((self.risk_inputs.capital * 1e8) as i64).hash(&mut h);
        ((self.risk_inputs.entry * 1e8) as i64).hash(&mut h);
        ((self.risk_inputs.risk_percent * 1e8) as i64).hash(&mut h);
        self.risk_result
            .as_ref()
            .map(|v| v.to_string())
            .hash(&mut h);

        h.finish()
    }
}
