//! Transition function: (State, Event) -> State
//!
//! All store mutations happen here. Each event kind has one handler and each
//! handler is all-or-nothing: everything it needs (layout, focal lookup,
//! anomaly normalization) is computed before the first field is written, and
//! an outcome other than `Applied` leaves the state exactly as it was.

use serde_json::Value;

use super::events::{Event, Ticket};
use super::state::{DashboardState, GraphSnapshot};
use crate::layout::{layout, LayoutConfig};
use crate::model::{ContextReport, Intel, NodeKind, RiskEdit, Snapshot};
use crate::service::Decoded;

/// Which of two overlapping responses wins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingPolicy {
    /// The response that resolves last is applied last
    ResolutionOrder,
    /// Responses to requests older than the newest applied one are dropped
    IssueOrder,
}

#[derive(Debug, Clone)]
pub struct ReducerConfig {
    pub layout: LayoutConfig,
    pub ordering: OrderingPolicy,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            ordering: OrderingPolicy::ResolutionOrder,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Transport,
    Malformed,
    /// Fenced out by a newer applied response
    Stale,
    /// User edit with a non-finite value
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(IgnoreReason),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Ignored(IgnoreReason::Transport) => "ignored_transport",
            Outcome::Ignored(IgnoreReason::Malformed) => "ignored_malformed",
            Outcome::Ignored(IgnoreReason::Stale) => "ignored_stale",
            Outcome::Ignored(IgnoreReason::Invalid) => "ignored_invalid",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Result of processing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducerOutput {
    pub outcome: Outcome,
    pub state_hash: u64,
}

pub fn reduce(state: &mut DashboardState, event: Event, cfg: &ReducerConfig) -> ReducerOutput {
    let outcome = match event {
        Event::SearchResult { ticket, query, outcome } => on_search_result(state, ticket, &query, outcome, cfg),
        Event::ContextResult { ticket, outcome } => on_context_result(state, ticket, outcome, cfg),
        Event::RiskResult { outcome } => on_risk_result(state, outcome),
        Event::OpenGraph => {
            state.graph_open = true;
            Outcome::Applied
        }
        Event::CloseGraph => {
            state.graph_open = false;
            Outcome::Applied
        }
        Event::EditRiskInputs(edit) => on_risk_edit(state, edit),
    };

    if outcome.is_applied() {
        state.seq += 1;
    }

    ReducerOutput {
        outcome,
        state_hash: state.hash(),
    }
}

fn admit(state: &DashboardState, ticket: Ticket, cfg: &ReducerConfig) -> bool {
    match cfg.ordering {
        OrderingPolicy::ResolutionOrder => true,
        OrderingPolicy::IssueOrder => ticket > state.latest_ticket,
    }
}

fn rejected<T>(outcome: &Decoded<T>) -> Option<Outcome> {
    match outcome {
        Decoded::Ok(_) => None,
        Decoded::Malformed(_) => Some(Outcome::Ignored(IgnoreReason::Malformed)),
        Decoded::Transport => Some(Outcome::Ignored(IgnoreReason::Transport)),
    }
}

/// Replace graph and insight from one snapshot. Anomaly and entry price come
/// from the focal node, and stay as they were when there is none.
fn apply_snapshot(state: &mut DashboardState, snap: Snapshot, cfg: &ReducerConfig) {
    let nodes = layout(&snap.nodes, &cfg.layout);
    let focal = match snap.focal().map(|n| (&n.kind, n.quote().price.value)) {
        Some((NodeKind::Focal(attrs), price)) => Some((price, attrs.anomaly.clone().unwrap_or_default())),
        _ => None,
    };

    state.graph = GraphSnapshot { nodes, edges: snap.edges };
    state.active_insight = snap.insight;
    if let Some((entry, anomaly)) = focal {
        state.active_anomaly = Some(anomaly);
        if let Some(entry) = entry {
            state.risk_inputs.entry = entry;
        }
    }
}

fn on_search_result(
    state: &mut DashboardState,
    ticket: Ticket,
    query: &str,
    outcome: Decoded<Snapshot>,
    cfg: &ReducerConfig,
) -> Outcome {
    if let Some(ignored) = rejected(&outcome) {
        return ignored;
    }
    if !admit(state, ticket, cfg) {
        return Outcome::Ignored(IgnoreReason::Stale);
    }
    if let Decoded::Ok(snap) = outcome {
        apply_snapshot(state, snap, cfg);
        // The label is the user's query, not whatever symbol the service resolved
        state.active_context = Some(query.trim().to_uppercase());
        state.latest_ticket = state.latest_ticket.max(ticket);
    }
    Outcome::Applied
}

fn on_context_result(
    state: &mut DashboardState,
    ticket: Ticket,
    outcome: Decoded<ContextReport>,
    cfg: &ReducerConfig,
) -> Outcome {
    if let Some(ignored) = rejected(&outcome) {
        return ignored;
    }
    if !admit(state, ticket, cfg) {
        return Outcome::Ignored(IgnoreReason::Stale);
    }
    if let Decoded::Ok(report) = outcome {
        state.active_context = Some(report.ticker);
        // Without usable intel the previous graph stays up under the new label
        if let Intel::Snapshot(snap) = report.intel {
            apply_snapshot(state, snap, cfg);
        }
        state.latest_ticket = state.latest_ticket.max(ticket);
    }
    Outcome::Applied
}

fn on_risk_result(state: &mut DashboardState, outcome: Decoded<Value>) -> Outcome {
    if let Some(ignored) = rejected(&outcome) {
        return ignored;
    }
    if let Decoded::Ok(result) = outcome {
        state.risk_result = Some(result);
    }
    Outcome::Applied
}

fn on_risk_edit(state: &mut DashboardState, edit: RiskEdit) -> Outcome {
    let value = match edit {
        RiskEdit::Capital(v) | RiskEdit::Entry(v) | RiskEdit::RiskPercent(v) => v,
    };
    if !value.is_finite() {
        return Outcome::Ignored(IgnoreReason::Invalid);
    }
    match edit {
        RiskEdit::Capital(v) => state.risk_inputs.capital = v,
        RiskEdit::Entry(v) => state.risk_inputs.entry = v,
        RiskEdit::RiskPercent(v) => state.risk_inputs.risk_percent = v,
    }
    Outcome::Applied
}
