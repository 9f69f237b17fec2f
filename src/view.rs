//! Read-only panel projections derived from the dashboard state.
//!
//! Nothing here is cached: every call re-derives from the store, so a band or
//! a badge can never outlive the data it was computed from.

use serde_json::Value;
use std::fmt;

use crate::engine::state::{DashboardState, GraphSnapshot};
use crate::model::{Direction, InsightBand, NodeKind, RiskInputs};

#[derive(Debug, Clone, PartialEq)]
pub struct InsightCard {
    pub score: u8,
    pub status: String,
    pub message: String,
    pub band: InsightBand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhaleCard {
    pub narrative: String,
}

/// Risk result fields exactly as the service sent them
#[derive(Debug, Clone, PartialEq)]
pub struct RiskResultView {
    pub stop_loss: String,
    pub take_profit: String,
    pub shares: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskPanel {
    pub inputs: RiskInputs,
    pub result: Option<RiskResultView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sidebar {
    pub context: String,
    pub insight: Option<InsightCard>,
    pub whale: Option<WhaleCard>,
    pub risk: RiskPanel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeStats {
    pub volume: String,
    pub average: String,
    pub ratio_line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeCard {
    pub id: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub price: String,
    pub change: String,
    pub direction: Direction,
    pub focused: bool,
    pub focal: bool,
    pub whale_badge: bool,
    /// Volume stats on the focal card; hidden while a whale is detected
    pub stats: Option<VolumeStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphModal {
    pub title: String,
    pub nodes: Vec<NodeCard>,
    pub edges: Vec<(String, String)>,
}

fn verbatim(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub fn insight_card(state: &DashboardState) -> Option<InsightCard> {
    state.active_insight.as_ref().map(|i| InsightCard {
        score: i.score,
        status: i.status.clone(),
        message: i.message.clone(),
        band: i.band(),
    })
}

pub fn whale_card(state: &DashboardState) -> Option<WhaleCard> {
    state
        .active_anomaly
        .as_ref()
        .filter(|a| a.detected)
        .map(|a| WhaleCard { narrative: a.narrative.clone() })
}

pub fn risk_panel(state: &DashboardState) -> RiskPanel {
    RiskPanel {
        inputs: state.risk_inputs,
        result: state.risk_result.as_ref().map(|r| RiskResultView {
            stop_loss: verbatim(r.get("stop_loss")),
            take_profit: verbatim(r.get("take_profit")),
            shares: verbatim(r.get("shares")),
        }),
    }
}

/// The sidebar exists only while there is an active context.
pub fn sidebar(state: &DashboardState) -> Option<Sidebar> {
    let context = state.active_context.as_deref().filter(|c| !c.is_empty())?;
    Some(Sidebar {
        context: context.to_string(),
        insight: insight_card(state),
        whale: whale_card(state),
        risk: risk_panel(state),
    })
}

pub fn node_cards(graph: &GraphSnapshot) -> Vec<NodeCard> {
    graph
        .nodes
        .iter()
        .filter(|n| !n.hidden)
        .map(|n| {
            let quote = n.node.quote();
            let (whale_badge, stats) = match &n.node.kind {
                NodeKind::Focal(attrs) => {
                    let whale = attrs.anomaly.clone().unwrap_or_default();
                    let stats = (!whale.detected).then(|| VolumeStats {
                        volume: whale.volume_display.clone(),
                        average: whale.average_volume_display.clone(),
                        ratio_line: format!("{} Normal", whale.ratio_display),
                    });
                    (whale.detected, stats)
                }
                NodeKind::Resource(_) => (false, None),
            };
            NodeCard {
                id: n.node.id.clone(),
                label: n.node.label.clone(),
                x: n.x,
                y: n.y,
                price: quote.price.display.clone(),
                change: quote.percent_change.clone(),
                direction: quote.direction,
                focused: n.focused,
                focal: n.node.is_focal(),
                whale_badge,
                stats,
            }
        })
        .collect()
}

/// The correlation-matrix view, while it is open.
pub fn graph_modal(state: &DashboardState) -> Option<GraphModal> {
    if !state.graph_open {
        return None;
    }
    Some(GraphModal {
        title: format!(
            "CORRELATION MATRIX: {}",
            state.active_context.as_deref().unwrap_or_default()
        ),
        nodes: node_cards(&state.graph),
        edges: state
            .graph
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect(),
    })
}

// =============================================================================
// Text rendering
// =============================================================================

fn arrow(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "▲",
        Direction::Down => "▼",
    }
}

impl fmt::Display for Sidebar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ACTIVE CONTEXT  {}", self.context)?;
        if let Some(i) = &self.insight {
            writeln!(f, "  confluence {}/100  {} [{}]", i.score, i.status, i.band.as_str())?;
            writeln!(f, "  {}", i.message)?;
        }
        if let Some(w) = &self.whale {
            writeln!(f, "  WHALE RADAR  \"{}\"", w.narrative)?;
        }
        let r = &self.risk;
        writeln!(
            f,
            "  risk  capital={} entry={} risk%={}",
            r.inputs.capital, r.inputs.entry, r.inputs.risk_percent
        )?;
        if let Some(res) = &r.result {
            writeln!(
                f,
                "  stop loss ${}  take profit ${}  size {} shares",
                res.stop_loss, res.take_profit, res.shares
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for NodeCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:>7.1},{:>6.1}) {:<12} ${} {}{}%",
            self.x,
            self.y,
            self.label,
            self.price,
            arrow(self.direction),
            self.change
        )?;
        if self.whale_badge {
            write!(f, "  WHALE DETECTED")?;
        }
        if let Some(s) = &self.stats {
            write!(f, "  vol {} avg {} {}", s.volume, s.average, s.ratio_line)?;
        }
        Ok(())
    }
}

impl fmt::Display for GraphModal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "❖ {}", self.title)?;
        for n in &self.nodes {
            writeln!(f, "  {}", n)?;
        }
        for (source, target) in &self.edges {
            writeln!(f, "  {} -> {}", source, target)?;
        }
        Ok(())
    }
}
