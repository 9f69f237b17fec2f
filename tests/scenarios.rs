//! End-to-end dashboard flows against a scripted analytics service.
//!
//! The service is an in-process mock, so these run without a network. Timing
//! sensitive flows use a paused tokio clock and scripted per-query delays.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use butterfly::dispatch::Dashboard;
use butterfly::engine::reducer::{IgnoreReason, OrderingPolicy, Outcome, ReducerConfig};
use butterfly::engine::state::DashboardState;
use butterfly::model::{AnomalyRecord, RiskEdit};
use butterfly::service::{envelope, AnalyticsService, Mode};
use butterfly::storage::SessionStore;
use butterfly::view;

/// One scripted answer: matched on a payload field, optionally delayed.
struct Reply {
    key: &'static str,
    value: &'static str,
    delay_ms: u64,
    body: Option<Value>,
}

struct Scripted {
    replies: Vec<Reply>,
    seen: Mutex<Vec<Value>>,
}

impl Scripted {
    fn new(replies: Vec<Reply>) -> Self {
        Self { replies, seen: Mutex::new(Vec::new()) }
    }

    fn sent(&self) -> Vec<Value> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalyticsService for Scripted {
    async fn call(&self, mode: Mode, payload: Map<String, Value>) -> Result<Value> {
        let env = envelope(mode, payload);
        self.seen.lock().unwrap().push(env.clone());
        let reply = self
            .replies
            .iter()
            .find(|r| env.get(r.key).and_then(Value::as_str) == Some(r.value))
            .ok_or_else(|| anyhow!("no scripted reply for {}", env))?;
        if reply.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(reply.delay_ms)).await;
        }
        reply.body.clone().ok_or_else(|| anyhow!("connection reset"))
    }
}

fn reply(key: &'static str, value: &'static str, body: Value) -> Reply {
    Reply { key, value, delay_ms: 0, body: Some(body) }
}

fn graph_body(focal: &str, price: &str, resources: &[&str], whale: Option<Value>) -> Value {
    let mut data = json!({"label": focal, "price": price, "change": "1.20", "isUp": true, "isFocused": true});
    if let Some(w) = whale {
        data["whale"] = w;
    }
    let mut nodes = vec![json!({"id": focal, "type": "stock", "data": data})];
    let mut edges = Vec::new();
    for r in resources {
        nodes.push(json!({
            "id": r, "type": "resource",
            "data": {"label": r, "price": "100.00", "change": "0.40", "isUp": false}
        }));
        edges.push(json!({"id": format!("e-{}-{}", r, focal), "source": r, "target": focal, "animated": true}));
    }
    json!({
        "nodes": nodes,
        "edges": edges,
        "insight": {"score": 82, "status": "High Conviction Setup", "message": "Sector tailwind."}
    })
}

fn dashboard(replies: Vec<Reply>, ordering: OrderingPolicy) -> Dashboard<Scripted> {
    let cfg = ReducerConfig { ordering, ..ReducerConfig::default() };
    Dashboard::new(Scripted::new(replies), DashboardState::default(), cfg)
}

#[tokio::test]
async fn search_lays_out_graph_around_focal() {
    let dash = dashboard(
        vec![reply("query", "nvda", graph_body("NVDA", "450.2", &["SMH", "TSM"], None))],
        OrderingPolicy::ResolutionOrder,
    );
    assert!(dash.search("nvda").await.outcome.is_applied());

    let state = dash.state();
    assert_eq!(state.active_context.as_deref(), Some("NVDA"));
    assert_eq!(state.risk_inputs.entry, 450.2);

    let focal = state.graph.focal().unwrap();
    assert_eq!((focal.x, focal.y), (0.0, 300.0));
    let xs: Vec<f64> = state.graph.nodes.iter().filter(|n| n.node.is_resource()).map(|n| n.x).collect();
    assert_eq!(xs, vec![-175.0, 175.0]);
    assert_eq!(state.graph.edges.len(), 2);
}

#[tokio::test]
async fn context_without_intel_only_relabels() {
    let dash = dashboard(
        vec![
            reply("query", "nvda", graph_body("NVDA", "450.2", &["SMH"], None)),
            reply("url", "https://www.tradingview.com/symbols/TSLA/", json!({"status": "ACTIVE", "ticker": "TSLA"})),
        ],
        OrderingPolicy::ResolutionOrder,
    );
    dash.search("nvda").await;
    let before = dash.state();

    let out = dash.navigate("https://www.tradingview.com/symbols/TSLA/").await;
    assert!(out.outcome.is_applied());

    let after = dash.state();
    assert_eq!(after.active_context.as_deref(), Some("TSLA"));
    assert_eq!(after.graph, before.graph);
    assert_eq!(after.active_insight, before.active_insight);
    assert_eq!(after.active_anomaly, before.active_anomaly);
    assert_eq!(after.risk_inputs, before.risk_inputs);
}

#[tokio::test]
async fn context_with_intel_replaces_snapshot() {
    let dash = dashboard(
        vec![reply(
            "url",
            "https://www.tradingview.com/symbols/AMD/",
            json!({"status": "ACTIVE", "ticker": "AMD", "intel": graph_body("AMD", "160.5", &["NVDA", "SMH", "TSM"], None)}),
        )],
        OrderingPolicy::ResolutionOrder,
    );
    dash.navigate("https://www.tradingview.com/symbols/AMD/").await;

    let state = dash.state();
    assert_eq!(state.active_context.as_deref(), Some("AMD"));
    assert_eq!(state.risk_inputs.entry, 160.5);
    let xs: Vec<f64> = state.graph.nodes.iter().filter(|n| n.node.is_resource()).map(|n| n.x).collect();
    assert_eq!(xs, vec![-350.0, 0.0, 350.0]);
}

#[tokio::test]
async fn context_error_body_is_ignored() {
    let dash = dashboard(
        vec![
            reply("query", "nvda", graph_body("NVDA", "450.2", &[], None)),
            reply("url", "https://example.com/", json!({"error": "no ticker in url"})),
        ],
        OrderingPolicy::ResolutionOrder,
    );
    dash.search("nvda").await;
    let before = dash.state();

    let out = dash.navigate("https://example.com/").await;
    assert_eq!(out.outcome, Outcome::Ignored(IgnoreReason::Malformed));
    assert_eq!(dash.state(), before);
}

#[tokio::test]
async fn risk_result_is_shown_verbatim() {
    let dash = dashboard(
        vec![
            reply("query", "aapl", graph_body("AAPL", "190.0", &[], None)),
            reply("mode", "RISK", json!({"stop_loss": 148.5, "take_profit": 153, "shares": 66})),
        ],
        OrderingPolicy::ResolutionOrder,
    );
    dash.search("aapl").await;
    dash.edit_risk(RiskEdit::Entry(150.0));
    dash.calculate_risk().await;

    let sent = dash.service().sent();
    assert_eq!(
        sent.last().unwrap(),
        &json!({"mode": "RISK", "capital": 10000.0, "entry": 150.0, "risk_pct": 1.0})
    );

    let panel = view::risk_panel(&dash.state());
    let result = panel.result.unwrap();
    assert_eq!(result.stop_loss, "148.5");
    assert_eq!(result.take_profit, "153");
    assert_eq!(result.shares, "66");
}

#[tokio::test]
async fn focal_only_search_yields_single_node() {
    let dash = dashboard(
        vec![reply("query", "spy", graph_body("SPY", "500.0", &[], None))],
        OrderingPolicy::ResolutionOrder,
    );
    dash.search("spy").await;

    let state = dash.state();
    assert_eq!(state.graph.nodes.len(), 1);
    let node = &state.graph.nodes[0];
    assert!(node.x.is_finite() && node.y.is_finite());
    assert_eq!((node.x, node.y), (0.0, 300.0));
}

#[tokio::test(start_paused = true)]
async fn overlapping_searches_apply_in_resolution_order() {
    let dash = dashboard(
        vec![
            Reply { key: "query", value: "nvda", delay_ms: 100, body: Some(graph_body("NVDA", "450.2", &["SMH"], None)) },
            Reply { key: "query", value: "tsla", delay_ms: 10, body: Some(graph_body("TSLA", "250.0", &["LIT"], None)) },
        ],
        OrderingPolicy::ResolutionOrder,
    );
    let (first, second) = tokio::join!(dash.search("nvda"), dash.search("tsla"));
    assert!(first.outcome.is_applied());
    assert!(second.outcome.is_applied());

    // tsla resolved first, so nvda's later response is what remains
    let state = dash.state();
    assert_eq!(state.active_context.as_deref(), Some("NVDA"));
    assert_eq!(state.risk_inputs.entry, 450.2);
}

#[tokio::test(start_paused = true)]
async fn issue_order_drops_superseded_search() {
    let dash = dashboard(
        vec![
            Reply { key: "query", value: "nvda", delay_ms: 100, body: Some(graph_body("NVDA", "450.2", &["SMH"], None)) },
            Reply { key: "query", value: "tsla", delay_ms: 10, body: Some(graph_body("TSLA", "250.0", &["LIT"], None)) },
        ],
        OrderingPolicy::IssueOrder,
    );
    let (first, second) = tokio::join!(dash.search("nvda"), dash.search("tsla"));
    assert_eq!(first.outcome, Outcome::Ignored(IgnoreReason::Stale));
    assert!(second.outcome.is_applied());

    let state = dash.state();
    assert_eq!(state.active_context.as_deref(), Some("TSLA"));
    assert_eq!(state.risk_inputs.entry, 250.0);
    assert_eq!(state.latest_ticket, 2);
}

#[tokio::test]
async fn missing_whale_resets_anomaly() {
    let whale = json!({"is_whale": true, "ratio": "3.1x", "vol_str": "80M", "avg_str": "25M", "narrative": "Block buying."});
    let dash = dashboard(
        vec![
            reply("query", "nvda", graph_body("NVDA", "450.2", &["SMH"], Some(whale))),
            reply("query", "msft", graph_body("MSFT", "410.0", &["QQQ"], None)),
        ],
        OrderingPolicy::ResolutionOrder,
    );

    dash.search("nvda").await;
    let state = dash.state();
    assert_eq!(view::whale_card(&state).unwrap().narrative, "Block buying.");
    let cards = view::node_cards(&state.graph);
    let focal = cards.iter().find(|c| c.focal).unwrap();
    assert!(focal.whale_badge);
    assert!(focal.stats.is_none());

    dash.search("msft").await;
    let state = dash.state();
    assert_eq!(state.active_anomaly, Some(AnomalyRecord::default()));
    assert!(view::whale_card(&state).is_none());
    let cards = view::node_cards(&state.graph);
    let stats = cards.iter().find(|c| c.focal).unwrap().stats.clone().unwrap();
    assert_eq!(stats.ratio_line, "1x Normal");
}

#[tokio::test]
async fn loose_edges_and_insight_do_not_block_a_search() {
    let mut body = graph_body("NVDA", "450.2", &["SMH"], None);
    body["edges"].as_array_mut().unwrap().push(json!({"id": "e-dangling", "source": "TSM"}));
    body["insight"] = json!({"score": "85", "status": "High Conviction Setup", "message": "m"});
    body["nodes"][1]["data"]["isUp"] = Value::Null;

    let dash = dashboard(vec![reply("query", "nvda", body)], OrderingPolicy::ResolutionOrder);
    assert!(dash.search("nvda").await.outcome.is_applied());

    let state = dash.state();
    assert_eq!(state.active_context.as_deref(), Some("NVDA"));
    assert_eq!(state.graph.nodes.len(), 2);
    assert_eq!(state.graph.edges.len(), 1);
    assert_eq!(state.active_insight.as_ref().unwrap().score, 85);
}

#[tokio::test]
async fn focal_less_snapshot_keeps_whale_and_entry() {
    let whale = json!({"is_whale": true, "ratio": "3.1x", "vol_str": "80M", "avg_str": "25M", "narrative": "Block buying."});
    let dash = dashboard(
        vec![
            reply("query", "nvda", graph_body("NVDA", "450.2", &["SMH"], Some(whale))),
            reply("query", "sector", json!({"nodes": [{"id": "SMH", "type": "resource", "data": {"price": "250.00"}}]})),
        ],
        OrderingPolicy::ResolutionOrder,
    );
    dash.search("nvda").await;
    assert!(dash.search("sector").await.outcome.is_applied());

    let state = dash.state();
    assert_eq!(state.active_context.as_deref(), Some("SECTOR"));
    assert_eq!(state.risk_inputs.entry, 450.2);
    assert_eq!(view::whale_card(&state).unwrap().narrative, "Block buying.");
    assert_eq!(state.graph.nodes.len(), 1);
}

#[tokio::test]
async fn failed_search_leaves_everything_in_place() {
    let dash = dashboard(
        vec![
            reply("query", "nvda", graph_body("NVDA", "450.2", &["SMH", "TSM"], None)),
            Reply { key: "query", value: "down", delay_ms: 0, body: None },
            reply("query", "junk", json!({"nodes": "not a list"})),
        ],
        OrderingPolicy::ResolutionOrder,
    );
    dash.search("nvda").await;
    dash.open_graph();
    let before = dash.state();

    assert_eq!(dash.search("down").await.outcome, Outcome::Ignored(IgnoreReason::Transport));
    assert_eq!(dash.search("junk").await.outcome, Outcome::Ignored(IgnoreReason::Malformed));
    assert_eq!(dash.state(), before);
    assert_eq!(dash.state().hash(), before.hash());
}

#[tokio::test]
async fn graph_modal_follows_new_search() {
    let dash = dashboard(
        vec![
            reply("query", "nvda", graph_body("NVDA", "450.2", &["SMH"], None)),
            reply("query", "tsla", graph_body("TSLA", "250.0", &["LIT", "RIVN"], None)),
        ],
        OrderingPolicy::ResolutionOrder,
    );
    dash.search("nvda").await;
    assert!(view::graph_modal(&dash.state()).is_none());
    dash.open_graph();
    dash.search("tsla").await;

    let modal = view::graph_modal(&dash.state()).unwrap();
    assert_eq!(modal.title, "CORRELATION MATRIX: TSLA");
    assert_eq!(modal.nodes.len(), 3);
    assert_eq!(modal.edges, vec![("LIT".to_string(), "TSLA".to_string()), ("RIVN".to_string(), "TSLA".to_string())]);

    dash.close_graph();
    assert!(view::graph_modal(&dash.state()).is_none());
}

#[tokio::test]
async fn session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.sqlite");
    let path = path.to_str().unwrap();

    let dash = dashboard(
        vec![reply("query", "nvda", graph_body("NVDA", "450.2", &["SMH", "TSM"], None))],
        OrderingPolicy::IssueOrder,
    );
    dash.search("nvda").await;
    let saved = dash.state();

    {
        let mut store = SessionStore::new(path).unwrap();
        store.init().unwrap();
        store.persist(1, &saved).unwrap();
    }

    let mut store = SessionStore::new(path).unwrap();
    store.init().unwrap();
    let restored = store.load_latest().unwrap().unwrap();
    assert_eq!(restored, saved);

    let cfg = ReducerConfig { ordering: OrderingPolicy::IssueOrder, ..ReducerConfig::default() };
    let resumed = Dashboard::new(
        Scripted::new(vec![reply("query", "amd", graph_body("AMD", "160.5", &[], None))]),
        restored,
        cfg,
    );
    assert!(resumed.search("amd").await.outcome.is_applied());
    assert_eq!(resumed.state().latest_ticket, saved.latest_ticket + 1);
}
