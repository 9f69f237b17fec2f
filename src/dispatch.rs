//! Query dispatcher: one service request per user action, routed into the
//! store through the reducer.
//!
//! Requests are not serialized. Two searches in flight both apply, in the
//! order their responses resolve, unless the reducer is configured with
//! `OrderingPolicy::IssueOrder`. The store lock is taken only for the reducer
//! call and never held across an await.

use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::engine::events::{Event, Ticket};
use crate::engine::reducer::{reduce, IgnoreReason, Outcome, ReducerConfig, ReducerOutput};
use crate::engine::state::DashboardState;
use crate::logging::{
    log_audit, log_context_change, log_layout, log_malformed, log_risk_result, log_stale_response, obj,
    payload_digest, v_str,
};
use crate::model::{Intel, RiskEdit};
use crate::service::{decode, dispatch, AnalyticsService, Decoded, Mode};

pub struct Dashboard<S> {
    service: S,
    state: Mutex<DashboardState>,
    cfg: ReducerConfig,
    tickets: AtomicU64,
}

fn digest_of(resp: &Option<Value>) -> String {
    resp.as_ref().map(payload_digest).unwrap_or_default()
}

impl<S: AnalyticsService> Dashboard<S> {
    pub fn new(service: S, state: DashboardState, cfg: ReducerConfig) -> Self {
        // Continue after a restored session's tickets so fencing stays monotonic
        let issued = state.latest_ticket;
        Self {
            service,
            state: Mutex::new(state),
            cfg,
            tickets: AtomicU64::new(issued),
        }
    }

    fn next_ticket(&self) -> Ticket {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current store state
    pub fn state(&self) -> DashboardState {
        self.lock().clone()
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn read<R>(&self, f: impl FnOnce(&DashboardState) -> R) -> R {
        f(&self.lock())
    }

    async fn request(&self, mode: Mode, ticket: Ticket, payload: Map<String, Value>) -> Option<Value> {
        dispatch(&self.service, mode, ticket, payload).await
    }

    /// SEARCH: on success the active context becomes the upper-cased query.
    pub async fn search(&self, query: &str) -> ReducerOutput {
        let ticket = self.next_ticket();
        let resp = self.request(Mode::Search, ticket, obj(&[("query", v_str(query))])).await;
        let digest = digest_of(&resp);
        let outcome = Decoded::from_response(resp, decode::snapshot);
        if let Decoded::Malformed(reason) = &outcome {
            log_malformed(Mode::Search.as_str(), ticket, reason);
        }
        let event = Event::SearchResult {
            ticket,
            query: query.to_string(),
            outcome,
        };
        self.apply(event, &digest)
    }

    /// CONTEXT: resolve the instrument behind a page URL.
    pub async fn navigate(&self, url: &str) -> ReducerOutput {
        let ticket = self.next_ticket();
        let resp = self.request(Mode::Context, ticket, obj(&[("url", v_str(url))])).await;
        let digest = digest_of(&resp);
        let outcome = Decoded::from_response(resp, decode::context);
        match &outcome {
            Decoded::Malformed(reason) => log_malformed(Mode::Context.as_str(), ticket, reason),
            Decoded::Ok(report) => {
                if let Intel::Malformed(reason) = &report.intel {
                    log_malformed("CONTEXT.intel", ticket, reason);
                }
            }
            Decoded::Transport => {}
        }
        self.apply(Event::ContextResult { ticket, outcome }, &digest)
    }

    /// RISK: send the current inputs verbatim and keep whatever comes back.
    pub async fn calculate_risk(&self) -> ReducerOutput {
        let ticket = self.next_ticket();
        let inputs = self.read(|s| s.risk_inputs);
        let payload = match serde_json::to_value(inputs) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        let resp = self.request(Mode::Risk, ticket, payload).await;
        let digest = digest_of(&resp);
        let outcome = Decoded::from_response(resp, decode::risk);
        self.apply(Event::RiskResult { outcome }, &digest)
    }

    pub fn open_graph(&self) -> ReducerOutput {
        self.apply(Event::OpenGraph, "")
    }

    pub fn close_graph(&self) -> ReducerOutput {
        self.apply(Event::CloseGraph, "")
    }

    pub fn edit_risk(&self, edit: RiskEdit) -> ReducerOutput {
        self.apply(Event::EditRiskInputs(edit), "")
    }

    fn apply(&self, event: Event, digest: &str) -> ReducerOutput {
        let name = event.name();
        let ticket = event.ticket().unwrap_or(0);
        let carries_snapshot = match &event {
            Event::SearchResult { outcome: Decoded::Ok(_), .. } => true,
            Event::ContextResult { outcome: Decoded::Ok(report), .. } => {
                matches!(report.intel, Intel::Snapshot(_))
            }
            _ => false,
        };
        let is_risk = matches!(event, Event::RiskResult { .. });

        let mut state = self.lock();
        let previous = state.active_context.clone();
        let out = reduce(&mut state, event, &self.cfg);

        match out.outcome {
            Outcome::Applied => {
                if carries_snapshot {
                    let focal = state.graph.nodes.iter().filter(|n| n.node.is_focal()).count();
                    log_layout(focal, state.graph.nodes.len() - focal, state.graph.edges.len());
                }
                if state.active_context != previous {
                    if let Some(next) = &state.active_context {
                        log_context_change(previous.as_deref(), next, state.seq);
                    }
                }
                if is_risk {
                    if let Some(result) = &state.risk_result {
                        log_risk_result(result);
                    }
                }
            }
            Outcome::Ignored(IgnoreReason::Stale) => {
                log_stale_response(name, ticket, state.latest_ticket);
            }
            Outcome::Ignored(_) => {}
        }
        drop(state);

        log_audit(name, ticket, digest, out.state_hash, out.outcome.as_str());
        out
    }
}
