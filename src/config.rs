use anyhow::{anyhow, Result};
use url::Url;

use crate::engine::reducer::{OrderingPolicy, ReducerConfig};
use crate::layout::LayoutConfig;
use crate::model::RiskInputs;

#[derive(Clone, Debug)]
pub struct Config {
    /// Endpoint of the analytics service (`POST`, JSON envelope)
    pub brain_url: String,
    /// Client-side timeout; unset means a hung request just leaves prior state up
    pub request_timeout_secs: Option<u64>,
    pub default_capital: f64,
    pub default_entry: f64,
    pub default_risk_pct: f64,
    /// Page URL the navigate command uses when none is given
    pub default_url: String,
    pub fence_requests: bool,
    pub session_db: Option<String>,
    pub layout_pitch: f64,
    pub focal_anchor_y: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brain_url: "http://localhost:3000/api".to_string(),
            request_timeout_secs: None,
            default_capital: 10_000.0,
            default_entry: 150.0,
            default_risk_pct: 1.0,
            default_url: "https://www.tradingview.com/symbols/NVDA/".to_string(),
            fence_requests: false,
            session_db: None,
            layout_pitch: 350.0,
            focal_anchor_y: 300.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            brain_url: std::env::var("BRAIN_URL").unwrap_or(d.brain_url),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()),
            default_capital: std::env::var("DEFAULT_CAPITAL").ok().and_then(|v| v.parse().ok()).unwrap_or(d.default_capital),
            default_entry: std::env::var("DEFAULT_ENTRY").ok().and_then(|v| v.parse().ok()).unwrap_or(d.default_entry),
            default_risk_pct: std::env::var("DEFAULT_RISK_PCT").ok().and_then(|v| v.parse().ok()).unwrap_or(d.default_risk_pct),
            default_url: std::env::var("DEFAULT_URL").unwrap_or(d.default_url),
            fence_requests: std::env::var("FENCE_REQUESTS").map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")).unwrap_or(false),
            session_db: std::env::var("SESSION_DB").ok().filter(|v| !v.is_empty()),
            layout_pitch: std::env::var("LAYOUT_PITCH").ok().and_then(|v| v.parse().ok()).unwrap_or(d.layout_pitch),
            focal_anchor_y: std::env::var("FOCAL_ANCHOR_Y").ok().and_then(|v| v.parse().ok()).unwrap_or(d.focal_anchor_y),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.brain_url).map_err(|e| anyhow!("BRAIN_URL {:?}: {}", self.brain_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("BRAIN_URL must be http(s), got {}", url.scheme()));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(anyhow!("REQUEST_TIMEOUT_SECS must be at least 1, or unset for no timeout"));
        }
        if !self.layout_pitch.is_finite() || self.layout_pitch <= 0.0 {
            return Err(anyhow!("LAYOUT_PITCH must be a positive number, got {}", self.layout_pitch));
        }
        if !self.focal_anchor_y.is_finite() {
            return Err(anyhow!("FOCAL_ANCHOR_Y must be finite"));
        }
        for (name, v) in [
            ("DEFAULT_CAPITAL", self.default_capital),
            ("DEFAULT_ENTRY", self.default_entry),
            ("DEFAULT_RISK_PCT", self.default_risk_pct),
        ] {
            if !v.is_finite() {
                return Err(anyhow!("{} must be finite", name));
            }
        }
        Ok(())
    }

    pub fn risk_defaults(&self) -> RiskInputs {
        RiskInputs {
            capital: self.default_capital,
            entry: self.default_entry,
            risk_percent: self.default_risk_pct,
        }
    }

    pub fn reducer_config(&self) -> ReducerConfig {
        ReducerConfig {
            layout: LayoutConfig {
                pitch: self.layout_pitch,
                focal_anchor: (0.0, self.focal_anchor_y),
                ..Default::default()
            },
            ordering: if self.fence_requests {
                OrderingPolicy::IssueOrder
            } else {
                OrderingPolicy::ResolutionOrder
            },
        }
    }
}

pub fn now_ts() -> u64 {
    chrono::Utc::now().timestamp() as u64
}
