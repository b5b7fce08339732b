//! `volatility_tool`: options-implied and historical realized volatility.
//!
//! No options-chain source is wired in, so implied metrics always come
//! back as an `options_error` note. Realized volatility is computed from
//! the last two years of closes whenever they exist.

use std::sync::Arc;

use chrono::Months;
use serde_json::{Map, Value, json};

use super::stats::{mean, pct_returns, rolling_vol_pct, round_to};
use super::{DEFAULT_TICKER, MarketData, int_arg, string_arg, ticker_arg};
use crate::agent::executor::{Tool, ToolArgs};
use crate::agent::tool::ToolDefinition;
use crate::error::ToolError;

/// Months of history used for realized volatility.
const HISTORY_MONTHS: u32 = 24;

/// Volatility metrics for a single ticker.
#[derive(Debug, Clone)]
pub struct VolatilityTool {
    data: Arc<MarketData>,
}

impl VolatilityTool {
    /// Creates the tool over `data`.
    #[must_use]
    pub const fn new(data: Arc<MarketData>) -> Self {
        Self { data }
    }

    fn historical_vol(&self, ticker: &str) -> Option<Value> {
        let series = self.data.series(ticker)?;
        let last = series.last()?.date;
        let cutoff = last.checked_sub_months(Months::new(HISTORY_MONTHS)).unwrap_or(last);
        let closes: Vec<f64> = series.iter().filter(|p| p.date >= cutoff).map(|p| p.close).collect();

        let returns = pct_returns(&closes);
        let rv20 = rolling_vol_pct(&returns, 20);
        let rv60 = rolling_vol_pct(&returns, 60);
        let current_rv20 = rv20.last()?;

        let mut hist = Map::new();
        hist.insert("current_rv20".to_string(), json!(round_to(*current_rv20, 1)));
        hist.insert(
            "current_rv60".to_string(),
            rv60.last().map_or(Value::Null, |v| json!(round_to(*v, 1))),
        );
        hist.insert("average_rv20".to_string(), json!(round_to(mean(&rv20), 1)));
        Some(Value::Object(hist))
    }
}

impl Tool for VolatilityTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "volatility_tool".to_string(),
            description: "Get implied volatility surface data, skew metrics, term structure, and historical realized volatility for a semiconductor ticker.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "ticker": {"type": "string", "description": "Stock ticker (default: NVDA)"},
                    "option_type": {
                        "type": "string",
                        "enum": ["put", "call"],
                        "description": "Option type for surface (default: put)"
                    },
                    "skew_days": {
                        "type": "array",
                        "items": {"type": "integer"},
                        "description": "Days-to-expiry for skew calc (default: [30, 60])"
                    }
                },
                "required": []
            }),
        }
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let ticker = ticker_arg(args, "ticker", DEFAULT_TICKER)?;
        let option_type = string_arg(args, "option_type")?
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| "put".to_string());
        if option_type != "put" && option_type != "call" {
            return Err(ToolError::InvalidArguments(format!(
                "option_type must be 'put' or 'call', got '{option_type}'"
            )));
        }
        let skew_days = skew_days_arg(args)?;

        let mut result = json!({
            "ticker": ticker,
            "option_type": option_type,
            "skew_days": skew_days,
            "options_error": "Live options unavailable: no options chain source is configured",
        });
        if let Some(hist) = self.historical_vol(&ticker) {
            result["historical_vol"] = hist;
        }
        Ok(result)
    }
}

fn skew_days_arg(args: &ToolArgs) -> Result<Vec<i64>, ToolError> {
    match args.get("skew_days").filter(|v| !v.is_null()) {
        None => Ok(vec![30, 60]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_i64()
                    .filter(|d| *d > 0)
                    .ok_or_else(|| ToolError::InvalidArguments("skew_days must contain positive integers".to_string()))
            })
            .collect(),
        Some(_) => int_arg(args, "skew_days")?
            .filter(|d| *d > 0)
            .map(|d| vec![d])
            .ok_or_else(|| ToolError::InvalidArguments("skew_days must be a list of integers".to_string())),
    }
}
