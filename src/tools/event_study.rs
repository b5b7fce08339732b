//! `event_study_tool`: cumulative abnormal returns around export-control events.
//!
//! Market model: daily returns of the subject are regressed on the
//! benchmark over a 120-day estimation window ending the day before the
//! event window. Abnormal returns are summed over the event window and
//! tested against the estimation-window residual volatility.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use super::market::nearest_date_index;
use super::stats::{linear_fit, mean, pct_returns, round_to, std_dev, two_sided_p_value};
use super::{
    DEFAULT_BENCHMARK, DEFAULT_TICKER, MarketData, MarketEvent, data_error, default_start_date,
    int_arg, string_list_arg, ticker_arg,
};
use crate::agent::executor::{Tool, ToolArgs};
use crate::agent::tool::ToolDefinition;
use crate::error::ToolError;

/// Trading days in the estimation window.
pub const ESTIMATION_WINDOW: usize = 120;
/// Minimum estimation observations for the regression; fewer uses alpha 0, beta 1.
const MIN_ESTIMATION_OBSERVATIONS: usize = 20;
/// Significance threshold for the two-sided test.
const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Per-event result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventStudyResult {
    /// Event date.
    pub event_date: String,
    /// Event title.
    pub event: String,
    /// Cumulative abnormal return, percent.
    pub car_pct: f64,
    /// Raw subject return over the window, percent.
    pub raw_return_pct: f64,
    /// Benchmark return over the window, percent.
    pub benchmark_return_pct: f64,
    /// CAR t-statistic.
    pub t_stat: f64,
    /// Two-sided p-value (normal approximation).
    pub p_value: f64,
    /// `p_value < 0.05`.
    pub significant: bool,
    /// Window dates as `start to end`.
    pub window: String,
}

/// Runs the market-model event study for one event.
///
/// `returns` and `market` are daily percentage returns aligned with
/// `dates`. Returns `None` when the series are empty.
#[must_use]
pub fn study_event(
    dates: &[chrono::NaiveDate],
    returns: &[f64],
    market: &[f64],
    event: &MarketEvent,
    window: (i64, i64),
) -> Option<EventStudyResult> {
    let n = returns.len().min(market.len()).min(dates.len());
    if n == 0 {
        return None;
    }
    let event_idx = i64::try_from(nearest_date_index(&dates[..n], event.date)?).ok()?;
    let last = i64::try_from(n - 1).ok()?;

    let start = usize::try_from((event_idx + window.0).clamp(0, last)).ok()?;
    let end = usize::try_from((event_idx + window.1).clamp(0, last)).ok()?;
    let est_end = start.saturating_sub(1);
    let est_start = est_end.saturating_sub(ESTIMATION_WINDOW);

    let est_stock = &returns[est_start..est_end];
    let est_market = &market[est_start..est_end];
    let (alpha, beta) = if est_stock.len() < MIN_ESTIMATION_OBSERVATIONS {
        (0.0, 1.0)
    } else {
        linear_fit(est_market, est_stock).unwrap_or((0.0, 1.0))
    };

    let abnormal: Vec<f64> = returns[..n]
        .iter()
        .zip(&market[..n])
        .map(|(r, m)| r - (alpha + beta * m))
        .collect();

    let car: f64 = abnormal[start..=end].iter().sum();
    let raw: f64 = returns[start..=end].iter().sum();
    let bench: f64 = market[start..=end].iter().sum();

    let est_abnormal = &abnormal[est_start..est_end];
    let sigma = std_dev(est_abnormal);
    let (t_stat, p_value) = if sigma > 0.0 && est_abnormal.len() > 2 {
        #[allow(clippy::cast_precision_loss)]
        let window_len = (end - start + 1) as f64;
        let t = car / (sigma * window_len.sqrt());
        (t, two_sided_p_value(t))
    } else {
        (0.0, 1.0)
    };

    Some(EventStudyResult {
        event_date: event.date.to_string(),
        event: event.name.clone(),
        car_pct: round_to(car, 2),
        raw_return_pct: round_to(raw, 2),
        benchmark_return_pct: round_to(bench, 2),
        t_stat: round_to(t_stat, 3),
        p_value: round_to(p_value, 4),
        significant: p_value < SIGNIFICANCE_LEVEL,
        window: format!("{} to {}", dates[start], dates[end]),
    })
}

/// CAR analysis of a ticker against a benchmark across the event timeline.
#[derive(Debug, Clone)]
pub struct EventStudyTool {
    data: Arc<MarketData>,
}

impl EventStudyTool {
    /// Creates the tool over `data`.
    #[must_use]
    pub const fn new(data: Arc<MarketData>) -> Self {
        Self { data }
    }
}

impl Tool for EventStudyTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "event_study_tool".to_string(),
            description: "Run Cumulative Abnormal Return (CAR) event study analysis on BIS export control events. Uses market model with configurable event windows.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "ticker": {"type": "string", "description": "Stock ticker to analyze (default: NVDA)"},
                    "benchmark": {"type": "string", "description": "Benchmark ticker (default: SPY)"},
                    "event_window_start": {
                        "type": "integer",
                        "description": "Event window start relative to event date (default: -1)"
                    },
                    "event_window_end": {
                        "type": "integer",
                        "description": "Event window end relative to event date (default: 5)"
                    },
                    "severity_filter": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Filter events by severity: Critical, High, Medium, Low"
                    }
                },
                "required": []
            }),
        }
    }

    fn run(&self, args: &ToolArgs) -> Result<Value, ToolError> {
        let ticker = ticker_arg(args, "ticker", DEFAULT_TICKER)?;
        let benchmark = ticker_arg(args, "benchmark", DEFAULT_BENCHMARK)?;
        let window_start = int_arg(args, "event_window_start")?.unwrap_or(-1);
        let window_end = int_arg(args, "event_window_end")?.unwrap_or(5);
        let severities = string_list_arg(args, "severity_filter")?.unwrap_or_default();

        if window_start > window_end {
            return Err(ToolError::InvalidArguments(format!(
                "event_window_start ({window_start}) must not exceed event_window_end ({window_end})"
            )));
        }

        let frame = self
            .data
            .frame(&[ticker.clone(), benchmark.clone()], Some(default_start_date()), None);
        let (Some(stock), Some(market)) = (frame.column(&ticker), frame.column(&benchmark)) else {
            return Ok(data_error("Could not load price data."));
        };
        if frame.len() < 2 {
            return Ok(data_error("Could not load price data."));
        }

        let events: Vec<&MarketEvent> = self
            .data
            .events()
            .iter()
            .filter(|e| severities.is_empty() || severities.iter().any(|s| s.eq_ignore_ascii_case(&e.severity)))
            .collect();
        if events.is_empty() {
            return Ok(data_error("No events match the filter criteria."));
        }

        let to_pct = |closes: &[f64]| pct_returns(closes).into_iter().map(|r| r * 100.0).collect::<Vec<_>>();
        let returns = to_pct(stock);
        let market_returns = to_pct(market);
        let return_dates = &frame.dates[1..];

        let results: Vec<EventStudyResult> = events
            .iter()
            .filter(|e| frame.covers(e.date))
            .filter_map(|e| study_event(return_dates, &returns, &market_returns, e, (window_start, window_end)))
            .collect();
        if results.is_empty() {
            return Ok(data_error(
                "No event studies could be computed (events may be outside price data range).",
            ));
        }
        debug!(ticker = ticker.as_str(), events = results.len(), "event study complete");

        let cars: Vec<f64> = results.iter().map(|r| r.car_pct).collect();
        let significant = results.iter().filter(|r| r.significant).count();

        Ok(json!({
            "ticker": ticker,
            "benchmark": benchmark,
            "event_window": format!("({window_start}, {window_end})"),
            "events_analyzed": results.len(),
            "results": results,
            "summary": {
                "average_car_pct": round_to(mean(&cars), 2),
                "significant_events": format!("{significant}/{}", results.len()),
                "worst_car": cars.iter().copied().fold(f64::INFINITY, f64::min),
                "best_car": cars.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            },
            "methodology": "Market model (OLS, 120-day estimation window). Significance at p<0.05 (two-tailed, normal approximation).",
        }))
    }
}
