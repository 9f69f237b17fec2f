use anyhow::Result;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use butterfly::config::{now_ts, Config};
use butterfly::dispatch::Dashboard;
use butterfly::engine::reducer::ReducerOutput;
use butterfly::engine::state::DashboardState;
use butterfly::logging::{log, obj, v_str, Domain, Level};
use butterfly::model::RiskEdit;
use butterfly::service::{AnalyticsService, HttpService};
use butterfly::storage::SessionStore;
use butterfly::view;

const SESSION_ROWS_KEPT: u64 = 100;

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Search(String),
    SetUrl(String),
    Navigate(Option<String>),
    Edit(RiskEdit),
    Calculate,
    Open,
    Close,
    Show,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((h, r)) => (h, r.trim()),
            None => (line, ""),
        };
        let number = |name: &str| -> Result<f64, String> {
            rest.parse::<f64>()
                .map_err(|_| format!("{} expects a number, got {:?}", name, rest))
        };
        let cmd = match head.to_lowercase().as_str() {
            "search" | "s" if !rest.is_empty() => Command::Search(rest.to_string()),
            "search" | "s" => return Err("search expects a ticker".to_string()),
            "url" if !rest.is_empty() => Command::SetUrl(rest.to_string()),
            "url" => return Err("url expects an address".to_string()),
            "navigate" | "nav" => Command::Navigate((!rest.is_empty()).then(|| rest.to_string())),
            "capital" => Command::Edit(RiskEdit::Capital(number("capital")?)),
            "entry" => Command::Edit(RiskEdit::Entry(number("entry")?)),
            "risk" | "riskpct" => Command::Edit(RiskEdit::RiskPercent(number("risk")?)),
            "calc" | "calculate" => Command::Calculate,
            "open" | "graph" => Command::Open,
            "close" => Command::Close,
            "show" => Command::Show,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => return Err(format!("unknown command {:?}, try help", other)),
        };
        Ok(Some(cmd))
    }
}

fn print_help() {
    println!("commands:");
    println!("  search <ticker>      SEARCH the analytics service");
    println!("  url <address>        set the simulated page URL");
    println!("  navigate [address]   CONTEXT for the simulated (or given) URL");
    println!("  capital|entry|risk <n>  edit risk inputs");
    println!("  calc                 RISK for the current inputs");
    println!("  open | close         toggle the correlation matrix");
    println!("  show | help | quit");
}

fn render(state: &DashboardState) {
    match view::sidebar(state) {
        Some(sidebar) => print!("{}", sidebar),
        None => println!("(no active context)"),
    }
    if let Some(modal) = view::graph_modal(state) {
        print!("{}", modal);
    }
}

fn restore(session: Option<&SessionStore>, cfg: &Config) -> DashboardState {
    match session.map(|s| s.load_latest()) {
        Some(Ok(Some(state))) => state,
        Some(Err(err)) => {
            log(
                Level::Warn,
                Domain::System,
                "session_restore_failed",
                obj(&[("msg", v_str(&format!("{:#}", err)))]),
            );
            DashboardState::new(cfg.risk_defaults())
        }
        _ => DashboardState::new(cfg.risk_defaults()),
    }
}

fn persist<S: AnalyticsService>(session: Option<&mut SessionStore>, dashboard: &Dashboard<S>, out: &ReducerOutput) {
    let Some(store) = session else { return };
    if !out.outcome.is_applied() {
        return;
    }
    let result = store
        .persist(now_ts(), &dashboard.state())
        .and_then(|_| store.prune(SESSION_ROWS_KEPT).map(|_| ()));
    if let Err(err) = result {
        log(
            Level::Warn,
            Domain::System,
            "session_persist_failed",
            obj(&[("msg", v_str(&format!("{:#}", err)))]),
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    cfg.validate()?;

    let service = HttpService::new(&cfg)?;
    let mut session = match &cfg.session_db {
        Some(path) => {
            let mut store = SessionStore::new(path)?;
            store.init()?;
            Some(store)
        }
        None => None,
    };
    let initial = restore(session.as_ref(), &cfg);

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("endpoint", v_str(service.endpoint())),
            ("fence_requests", json!(cfg.fence_requests)),
            ("restored_seq", json!(initial.seq)),
        ]),
    );

    let dashboard = Dashboard::new(service, initial, cfg.reducer_config());
    let mut simulated_url = cfg.default_url.clone();

    print_help();
    render(&dashboard.state());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let cmd = match Command::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                println!("{}", msg);
                continue;
            }
        };

        let out = match cmd {
            Command::Search(query) => Some(dashboard.search(&query).await),
            Command::SetUrl(url) => {
                simulated_url = url;
                println!("url: {}", simulated_url);
                None
            }
            Command::Navigate(url) => {
                if let Some(url) = url {
                    simulated_url = url;
                }
                Some(dashboard.navigate(&simulated_url).await)
            }
            Command::Edit(edit) => Some(dashboard.edit_risk(edit)),
            Command::Calculate => Some(dashboard.calculate_risk().await),
            Command::Open => Some(dashboard.open_graph()),
            Command::Close => Some(dashboard.close_graph()),
            Command::Show => None,
            Command::Help => {
                print_help();
                continue;
            }
            Command::Quit => break,
        };

        if let Some(out) = &out {
            if !out.outcome.is_applied() {
                println!("({})", out.outcome.as_str());
            }
            persist(session.as_mut(), &dashboard, out);
        }
        render(&dashboard.state());
    }

    log(Level::Info, Domain::System, "shutdown", obj(&[("seq", json!(dashboard.state().seq))]));
    Ok(())
}
