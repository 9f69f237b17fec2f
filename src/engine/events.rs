//! Events the store reacts to.

use serde_json::Value;

use crate::model::{ContextReport, RiskEdit, Snapshot};
use crate::service::Decoded;

/// Issue-order ticket attached to graph-affecting requests
pub type Ticket = u64;

#[derive(Debug)]
pub enum Event {
    /// Response to `SEARCH {query}`
    SearchResult {
        ticket: Ticket,
        query: String,
        outcome: Decoded<Snapshot>,
    },
    /// Response to `CONTEXT {url}`
    ContextResult {
        ticket: Ticket,
        outcome: Decoded<ContextReport>,
    },
    /// Response to `RISK {capital, entry, risk_pct}`
    RiskResult { outcome: Decoded<Value> },
    OpenGraph,
    CloseGraph,
    EditRiskInputs(RiskEdit),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SearchResult { .. } => "search_result",
            Event::ContextResult { .. } => "context_result",
            Event::RiskResult { .. } => "risk_result",
            Event::OpenGraph => "open_graph",
            Event::CloseGraph => "close_graph",
            Event::EditRiskInputs(_) => "edit_risk_inputs",
        }
    }

    pub fn ticket(&self) -> Option<Ticket> {
        match self {
            Event::SearchResult { ticket, .. } | Event::ContextResult { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }
}
