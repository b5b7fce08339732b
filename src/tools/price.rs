//! `price_tool`: latest prices, return summaries and correlations.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use super::stats::{annualized_vol_pct, correlation, cumulative_return_pct, max_drawdown_pct, pct_returns, round_to};
use super::{MarketData, data_error, date_arg, default_start_date, tickers_arg};
use crate::agent::executor::{Tool, ToolArgs};
use crate::agent::tool::ToolDefinition;
use crate::error::ToolError;

/// Price and return summary over a date range.
#[derive(Debug, Clone)]
pub struct PriceTool {
    data: Arc<MarketData>,
}

impl PriceTool {
    /// Creates the tool over `data`.
    #[must_use]
    pub const fn new(data: Arc<MarketData>) -> Self {
        Self { data }
    }
}

impl Tool for PriceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "price_tool".to_string(),
            description: "Get stock price data, return summaries, and correlation matrices for semiconductor ecosystem tickers.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "tickers": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "List of ticker symbols (e.g. ['NVDA', 'AMD', 'TSM'])"
                    },
                    "start_date": {
                        "type": "string",
                        "description": "Start date in YYYY-MM-DD format (default: 2022-01-01)"
                    },
                    "end_date": {
                        "type": "string",
                        "description": "End date in YYYY-MM-DD format (default: latest available)"
                    }
                },
                "required": ["tickers"]
            }),
        }
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let tickers = tickers_arg(args, "tickers")?;
        let start = date_arg(args, "start_date")?.unwrap_or_else(default_start_date);
        let end = date_arg(args, "end_date")?;

        let frame = self.data.frame(&tickers, Some(start), end);
        if frame.is_empty() {
            return Ok(data_error("No price data available for the requested tickers."));
        }

        let available: Vec<&String> = tickers.iter().filter(|t| frame.columns.contains_key(*t)).collect();
        let returns: Vec<(&String, Vec<f64>)> = available
            .iter()
            .filter_map(|t| frame.column(t).map(|closes| (*t, pct_returns(closes))))
            .collect();

        let mut latest = Map::new();
        let mut summary = Map::new();
        for ticker in &available {
            let Some(closes) = frame.column(ticker) else {
                continue;
            };
            let daily = pct_returns(closes);
            latest.insert((*ticker).clone(), json!(round_to(closes.last().copied().unwrap_or_default(), 2)));
            summary.insert(
                (*ticker).clone(),
                json!({
                    "cumulative_return_pct": round_to(cumulative_return_pct(closes), 2),
                    "annualized_vol_pct": round_to(annualized_vol_pct(&daily), 2),
                    "max_drawdown_pct": round_to(max_drawdown_pct(closes), 2),
                }),
            );
        }

        let mut matrix = Map::new();
        for (a, ra) in &returns {
            let row: Map<String, Value> = returns
                .iter()
                .map(|(b, rb)| ((*b).clone(), json!(round_to(correlation(ra, rb), 3))))
                .collect();
            matrix.insert((*a).clone(), Value::Object(row));
        }

        let missing: Vec<&String> = tickers.iter().filter(|t| !frame.columns.contains_key(*t)).collect();
        let mut result = json!({
            "latest_prices": latest,
            "return_summary": summary,
            "correlation_matrix": matrix,
            "data_range": frame.date_range(),
            "trading_days": frame.len(),
        });
        if !missing.is_empty() {
            result["missing_tickers"] = json!(missing);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::market::fixtures::sample_market;

    fn run(args: Value) -> Result<Value, ToolError> {
        let tool = PriceTool::new(Arc::new(sample_market()));
        let Value::Object(map) = args else {
            return tool.run(&ToolArgs::new());
        };
        tool.run(&map)
    }

    #[test]
    fn test_summary_shape() {
        let result = run(json!({"tickers": ["NVDA", "AMD"]})).unwrap_or_default();
        assert!(result["latest_prices"]["NVDA"].is_f64());
        assert!(result["return_summary"]["AMD"]["max_drawdown_pct"].as_f64().unwrap_or(1.0) <= 0.0);
        assert_eq!(result["correlation_matrix"]["NVDA"]["NVDA"], json!(1.0));
        assert_eq!(result["trading_days"], json!(300));
        assert!(result.get("missing_tickers").is_none());
    }

    #[test]
    fn test_reports_missing_tickers() {
        let result = run(json!({"tickers": ["NVDA", "XYZ"]})).unwrap_or_default();
        assert_eq!(result["missing_tickers"], json!(["XYZ"]));
    }

    #[test]
    fn test_no_data_is_error_payload() {
        let result = run(json!({"tickers": ["XYZ"]})).unwrap_or_default();
        assert!(result["error"].is_string());
    }

    #[test]
    fn test_end_date_limits_range() {
        let result = run(json!({"tickers": ["NVDA"], "end_date": "2022-01-31"})).unwrap_or_default();
        assert_eq!(result["trading_days"], json!(31));
        assert_eq!(result["data_range"], json!("2022-01-01 to 2022-01-31"));
    }

    #[test]
    fn test_missing_tickers_argument_is_error() {
        assert!(matches!(run(json!({})), Err(ToolError::InvalidArguments(_))));
    }
}
