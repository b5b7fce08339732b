//! `ecosystem_tool`: cross-ticker comparison with export-control context.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use super::stats::{annualized_vol_pct, correlation, covariance, cumulative_return_pct, pct_returns, round_to};
use super::{
    DEFAULT_BENCHMARK, MarketData, PriceFrame, bool_arg, data_error, date_arg, default_start_date, ticker_arg,
    tickers_arg,
};
use crate::agent::executor::{Tool, ToolArgs};
use crate::agent::tool::ToolDefinition;
use crate::error::ToolError;

/// Ecosystem groups.
pub const ECOSYSTEM: &[(&str, &[&str])] = &[
    ("gpu_leaders", &["NVDA", "AMD"]),
    ("legacy_semi", &["INTC"]),
    ("foundry_equipment", &["TSM", "ASML"]),
    ("networking_broadband", &["AVGO"]),
    ("hyperscalers", &["GOOGL", "AMZN", "MSFT"]),
    ("benchmark", &["SPY", "SMH"]),
];

/// Display names.
pub const TICKER_NAMES: &[(&str, &str)] = &[
    ("NVDA", "Nvidia"),
    ("AMD", "Advanced Micro Devices"),
    ("INTC", "Intel"),
    ("TSM", "Taiwan Semiconductor (TSMC)"),
    ("ASML", "ASML Holdings"),
    ("AVGO", "Broadcom"),
    ("GOOGL", "Alphabet (Google TPU)"),
    ("AMZN", "Amazon (Trainium/Inferentia)"),
    ("MSFT", "Microsoft (Maia/Cobalt)"),
    ("SPY", "S&P 500 ETF"),
    ("SMH", "VanEck Semiconductor ETF"),
];

/// Qualitative export-control exposure.
pub const EXPORT_EXPOSURE: &[(&str, &str)] = &[
    ("NVDA", "Direct: primary target of BIS controls on AI accelerators"),
    ("AMD", "Direct: MI series GPUs restricted alongside Nvidia"),
    ("INTC", "Moderate: Gaudi accelerators and foundry services exposure"),
    ("TSM", "Indirect: manufactures restricted chips, caught in entity lists"),
    ("ASML", "Indirect: EUV lithography equipment export restrictions"),
    ("AVGO", "Low: networking and custom silicon, limited China AI exposure"),
    ("GOOGL", "Indirect: TPU not exported, but cloud AI services affected"),
    ("AMZN", "Indirect: Trainium internal, but AWS China operations affected"),
    ("MSFT", "Indirect: Azure AI services in restricted regions"),
];

/// Event window used for per-event impacts, in trading days.
const IMPACT_WINDOW: (i64, i64) = (-1, 5);

fn lookup<'a>(table: &'a [(&str, &'a str)], ticker: &str) -> Option<&'a str> {
    table.iter().find(|(t, _)| *t == ticker).map(|(_, v)| *v)
}

/// Ecosystem group containing `ticker`.
#[must_use]
pub fn group_of(ticker: &str) -> Option<&'static str> {
    ECOSYSTEM
        .iter()
        .find(|(_, members)| members.contains(&ticker))
        .map(|(group, _)| *group)
}

/// Percentage return of `closes` between rows `from` and `to`.
fn window_return_pct(closes: &[f64], from: usize, to: usize) -> Option<f64> {
    let (start, end) = (closes.get(from)?, closes.get(to)?);
    (*start != 0.0).then(|| (end / start - 1.0) * 100.0)
}

/// Compares tickers against a benchmark.
#[derive(Debug, Clone)]
pub struct EcosystemTool {
    data: Arc<MarketData>,
}

impl EcosystemTool {
    /// Creates the tool over `data`.
    #[must_use]
    pub const fn new(data: Arc<MarketData>) -> Self {
        Self { data }
    }

    fn event_impacts(&self, frame: &PriceFrame, tickers: &[String]) -> Vec<Value> {
        let Some(last) = frame.len().checked_sub(1).and_then(|l| i64::try_from(l).ok()) else {
            return Vec::new();
        };
        self.data
            .events()
            .iter()
            .filter(|e| frame.covers(e.date))
            .filter_map(|event| {
                let idx = i64::try_from(frame.nearest_index(event.date)?).ok()?;
                let from = usize::try_from((idx + IMPACT_WINDOW.0).clamp(0, last)).ok()?;
                let to = usize::try_from((idx + IMPACT_WINDOW.1).clamp(0, last)).ok()?;

                let mut row = Map::new();
                row.insert("event_date".to_string(), json!(event.date.to_string()));
                row.insert("event".to_string(), json!(event.name));
                row.insert("severity".to_string(), json!(event.severity));
                for ticker in tickers {
                    if let Some(ret) = frame.column(ticker).and_then(|c| window_return_pct(c, from, to)) {
                        row.insert(ticker.clone(), json!(round_to(ret, 2)));
                    }
                }
                Some(Value::Object(row))
            })
            .collect()
    }
}

impl Tool for EcosystemTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "ecosystem_tool".to_string(),
            description: "Compare semiconductor ecosystem tickers. Computes cumulative returns, volatility, beta, correlations, and event-window impacts across any set of tickers including TSMC, ASML, Broadcom, and hyperscalers.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "tickers": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Tickers to compare (e.g. ['NVDA','TSM','ASML','GOOGL'])"
                    },
                    "benchmark": {"type": "string", "description": "Benchmark ticker (default: SPY)"},
                    "start_date": {"type": "string", "description": "Start date YYYY-MM-DD (default: 2022-01-01)"},
                    "include_event_impact": {
                        "type": "boolean",
                        "description": "Include event-window returns for each ticker (default: true)"
                    }
                },
                "required": ["tickers"]
            }),
        }
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let tickers = tickers_arg(args, "tickers")?;
        let benchmark = ticker_arg(args, "benchmark", DEFAULT_BENCHMARK)?;
        let start = date_arg(args, "start_date")?.unwrap_or_else(default_start_date);
        let include_event_impact = bool_arg(args, "include_event_impact")?.unwrap_or(true);

        let mut all = tickers.clone();
        if !all.contains(&benchmark) {
            all.push(benchmark.clone());
        }
        let frame = self.data.frame(&all, Some(start), None);
        let Some(bench_closes) = frame.column(&benchmark).filter(|c| c.len() > 1) else {
            return Ok(data_error("Could not load price data."));
        };
        let bench_returns = pct_returns(bench_closes);
        let bench_var = covariance(&bench_returns, &bench_returns);

        let mut metrics = Map::new();
        let mut exposure = Map::new();
        let mut groups = Map::new();
        let mut missing = Vec::new();
        for ticker in &tickers {
            exposure.insert(
                ticker.clone(),
                json!({
                    "name": lookup(TICKER_NAMES, ticker).unwrap_or(ticker),
                    "export_exposure": lookup(EXPORT_EXPOSURE, ticker).unwrap_or("Unknown"),
                }),
            );
            if let Some(group) = group_of(ticker) {
                groups.insert(ticker.clone(), json!(group));
            }
            let Some(closes) = frame.column(ticker) else {
                missing.push(ticker.clone());
                continue;
            };
            let returns = pct_returns(closes);
            let beta = if bench_var == 0.0 { 0.0 } else { covariance(&returns, &bench_returns) / bench_var };
            metrics.insert(
                ticker.clone(),
                json!({
                    "cumulative_return_pct": round_to(cumulative_return_pct(closes), 2),
                    "annualized_vol_pct": round_to(annualized_vol_pct(&returns), 2),
                    "beta": round_to(beta, 3),
                    "correlation_to_benchmark": round_to(correlation(&returns, &bench_returns), 3),
                }),
            );
        }

        let mut result = json!({
            "benchmark": benchmark,
            "period": frame.date_range(),
            "trading_days": frame.len(),
            "benchmark_return_pct": round_to(cumulative_return_pct(bench_closes), 2),
            "metrics": metrics,
            "export_control_context": exposure,
            "ecosystem_groups": groups,
        });
        if !missing.is_empty() {
            result["missing_tickers"] = json!(missing);
        }
        if include_event_impact {
            let impacts = self.event_impacts(&frame, &tickers);
            if !impacts.is_empty() {
                result["event_impacts"] = Value::Array(impacts);
            }
        }
        Ok(result)
    }
}
