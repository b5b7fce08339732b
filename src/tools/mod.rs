//! Analysis tools callable by the agent.
//!
//! Each tool reads from a shared [`MarketData`] and returns a JSON object.
//! Missing data is reported inside the result as `{"error": ...}`; only
//! invalid arguments surface as [`ToolError`].

pub mod ecosystem;
pub mod event_study;
pub mod market;
pub mod price;
pub mod stats;
pub mod volatility;

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{Value, json};

pub use ecosystem::EcosystemTool;
pub use event_study::EventStudyTool;
pub use market::{MarketData, MarketEvent, PriceFrame, PricePoint};
pub use price::PriceTool;
pub use volatility::VolatilityTool;

use crate::agent::executor::{ToolArgs, ToolRegistry};
use crate::error::ToolError;

/// Default analysis start date.
pub const DEFAULT_START_DATE: &str = "2022-01-01";
/// Default benchmark ticker.
pub const DEFAULT_BENCHMARK: &str = "SPY";
/// Default single-ticker subject.
pub const DEFAULT_TICKER: &str = "NVDA";

/// Registry holding the four analysis tools over `data`.
#[must_use]
pub fn default_registry(data: &Arc<MarketData>) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(EventStudyTool::new(Arc::clone(data))))
        .with_tool(Arc::new(VolatilityTool::new(Arc::clone(data))))
        .with_tool(Arc::new(EcosystemTool::new(Arc::clone(data))))
        .with_tool(Arc::new(PriceTool::new(Arc::clone(data))))
}

/// `{"error": message}`.
pub(crate) fn data_error(message: &str) -> Value {
    json!({ "error": message })
}

fn present<'a>(args: &'a ToolArgs, key: &str) -> Option<&'a Value> {
    args.get(key).filter(|v| !v.is_null())
}

/// Optional string argument.
pub(crate) fn string_arg(args: &ToolArgs, key: &str) -> Result<Option<String>, ToolError> {
    match present(args, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "{key} must be a string, got {other}"
        ))),
    }
}

/// Optional ticker argument, upper-cased.
pub(crate) fn ticker_arg(args: &ToolArgs, key: &str, default: &str) -> Result<String, ToolError> {
    Ok(string_arg(args, key)?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
        .to_ascii_uppercase())
}

/// List of strings; a bare string is accepted as a one-element list.
pub(crate) fn string_list_arg(args: &ToolArgs, key: &str) -> Result<Option<Vec<String>>, ToolError> {
    match present(args, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(vec![s.trim().to_string()])),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(|s| s.trim().to_string()).ok_or_else(|| {
                    ToolError::InvalidArguments(format!("{key} must contain only strings"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "{key} must be a list of strings, got {other}"
        ))),
    }
}

/// Required, non-empty ticker list, upper-cased and de-duplicated in order.
pub(crate) fn tickers_arg(args: &ToolArgs, key: &str) -> Result<Vec<String>, ToolError> {
    let raw = string_list_arg(args, key)?
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing required argument: {key}")))?;
    let mut tickers: Vec<String> = Vec::with_capacity(raw.len());
    for ticker in raw.into_iter().filter(|t| !t.is_empty()) {
        let ticker = ticker.to_ascii_uppercase();
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    if tickers.is_empty() {
        return Err(ToolError::InvalidArguments(format!("{key} must not be empty")));
    }
    Ok(tickers)
}

/// Optional integer argument; integral floats are accepted.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn int_arg(args: &ToolArgs, key: &str) -> Result<Option<i64>, ToolError> {
    match present(args, key) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| ToolError::InvalidArguments(format!("{key} must be an integer, got {value}"))),
    }
}

/// Optional boolean argument.
pub(crate) fn bool_arg(args: &ToolArgs, key: &str) -> Result<Option<bool>, ToolError> {
    match present(args, key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "{key} must be a boolean, got {other}"
        ))),
    }
}

/// Optional `YYYY-MM-DD` date argument.
pub(crate) fn date_arg(args: &ToolArgs, key: &str) -> Result<Option<NaiveDate>, ToolError> {
    string_arg(args, key)?
        .filter(|s| !s.is_empty())
        .map(|s| parse_date(&s, key))
        .transpose()
}

pub(crate) fn parse_date(text: &str, key: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|_| ToolError::InvalidArguments(format!("{key} must be YYYY-MM-DD, got '{text}'")))
}

/// [`DEFAULT_START_DATE`] as a date.
pub(crate) fn default_start_date() -> NaiveDate {
    parse_date(DEFAULT_START_DATE, "start_date").unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> ToolArgs {
        match value {
            Value::Object(map) => map,
            _ => ToolArgs::new(),
        }
    }

    #[test]
    fn test_default_registry_names() {
        let registry = default_registry(&Arc::new(MarketData::default()));
        assert_eq!(
            registry.names(),
            vec!["ecosystem_tool", "event_study_tool", "price_tool", "volatility_tool"]
        );
    }

    #[test]
    fn test_tickers_arg_normalises() {
        let a = args(json!({"tickers": ["nvda", " AMD", "NVDA"]}));
        assert_eq!(tickers_arg(&a, "tickers").ok(), Some(vec!["NVDA".to_string(), "AMD".to_string()]));
        let a = args(json!({"tickers": "tsm"}));
        assert_eq!(tickers_arg(&a, "tickers").ok(), Some(vec!["TSM".to_string()]));
    }

    #[test]
    fn test_tickers_arg_missing_or_wrong_type() {
        assert!(tickers_arg(&ToolArgs::new(), "tickers").is_err());
        assert!(tickers_arg(&args(json!({"tickers": [1, 2]})), "tickers").is_err());
        assert!(tickers_arg(&args(json!({"tickers": []})), "tickers").is_err());
    }

    #[test]
    fn test_int_arg_accepts_integral_float() {
        assert_eq!(int_arg(&args(json!({"n": 5.0})), "n").ok(), Some(Some(5)));
        assert!(int_arg(&args(json!({"n": 5.5})), "n").is_err());
        assert_eq!(int_arg(&args(json!({"n": null})), "n").ok(), Some(None));
    }

    #[test]
    fn test_date_arg() {
        let a = args(json!({"start_date": "2023-03-01"}));
        assert_eq!(date_arg(&a, "start_date").ok().flatten(), NaiveDate::from_ymd_opt(2023, 3, 1));
        assert!(date_arg(&args(json!({"start_date": "03/01/2023"})), "start_date").is_err());
    }
}
