//! JSON-backed market data source for the analysis tools.
//!
//! `prices.json` holds daily closes keyed by ticker:
//!
//! ```json
//! {"series": {"NVDA": [{"date": "2022-10-07", "close": 120.76}]}}
//! ```
//!
//! `events.json` holds the export-control event timeline:
//!
//! ```json
//! [{"date": "2022-10-07", "name": "October 7 rules", "severity": "Critical", "event_type": "New Restriction"}]
//! ```
//!
//! Missing files load as empty data; the tools then answer with error
//! payloads instead of failing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ToolError;

/// Price file name inside the data directory.
pub const PRICES_FILE: &str = "prices.json";
/// Event file name inside the data directory.
pub const EVENTS_FILE: &str = "events.json";

/// One daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Trading date.
    pub date: NaiveDate,
    /// Closing price.
    pub close: f64,
}

/// One dated market event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Announcement date.
    pub date: NaiveDate,
    /// Short event title.
    #[serde(alias = "title")]
    pub name: String,
    /// Severity label: `Critical`, `High`, `Medium` or `Low`.
    pub severity: String,
    /// Event category.
    #[serde(default)]
    pub event_type: String,
}

#[derive(Debug, Default, Deserialize)]
struct PriceFile {
    #[serde(default)]
    series: BTreeMap<String, Vec<PricePoint>>,
}

/// Daily closes for several tickers on their common trading dates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceFrame {
    /// Dates present in every column, ascending.
    pub dates: Vec<NaiveDate>,
    /// Closes per ticker, aligned with `dates`.
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl PriceFrame {
    /// Returns `true` when there are no rows or no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Closes for `ticker`.
    #[must_use]
    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.columns.get(ticker).map(Vec::as_slice)
    }

    /// `"YYYY-MM-DD to YYYY-MM-DD"` over the frame's dates.
    #[must_use]
    pub fn date_range(&self) -> String {
        match (self.dates.first(), self.dates.last()) {
            (Some(first), Some(last)) => format!("{first} to {last}"),
            _ => String::new(),
        }
    }

    /// Index of the row nearest `date`; ties resolve to the earlier row.
    #[must_use]
    pub fn nearest_index(&self, date: NaiveDate) -> Option<usize> {
        nearest_date_index(&self.dates, date)
    }

    /// Returns `true` when `date` lies within the frame's first and last dates.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        matches!((self.dates.first(), self.dates.last()), (Some(first), Some(last)) if *first <= date && date <= *last)
    }
}

/// Index of the entry in ascending `dates` nearest `date`; ties resolve
/// to the earlier entry.
#[must_use]
pub fn nearest_date_index(dates: &[NaiveDate], date: NaiveDate) -> Option<usize> {
    if dates.is_empty() {
        return None;
    }
    let idx = dates.partition_point(|d| *d < date);
    if idx == 0 {
        return Some(0);
    }
    if idx == dates.len() {
        return Some(idx - 1);
    }
    let before = (date - dates[idx - 1]).num_days();
    let after = (dates[idx] - date).num_days();
    Some(if before <= after { idx - 1 } else { idx })
}

/// In-memory price series and event timeline.
#[derive(Debug, Clone, Default)]
pub struct MarketData {
    series: BTreeMap<String, Vec<PricePoint>>,
    events: Vec<MarketEvent>,
}

impl MarketData {
    /// Creates market data, sorting every series and the event list by date.
    #[must_use]
    pub fn new(series: BTreeMap<String, Vec<PricePoint>>, mut events: Vec<MarketEvent>) -> Self {
        let series = series
            .into_iter()
            .map(|(ticker, mut points)| {
                points.sort_by_key(|p| p.date);
                points.dedup_by_key(|p| p.date);
                (ticker.to_ascii_uppercase(), points)
            })
            .collect();
        events.sort_by_key(|e| e.date);
        Self { series, events }
    }

    /// Loads `prices.json` and `events.json` from `dir`.
    ///
    /// A missing file contributes no data.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Data`] if a file exists but cannot be read or parsed.
    pub fn load(dir: &Path) -> Result<Self, ToolError> {
        let prices: PriceFile = read_json(&dir.join(PRICES_FILE))?.unwrap_or_default();
        let events: Vec<MarketEvent> = read_json(&dir.join(EVENTS_FILE))?.unwrap_or_default();
        let data = Self::new(prices.series, events);
        debug!(
            dir = %dir.display(),
            tickers = data.series.len(),
            events = data.events.len(),
            "loaded market data"
        );
        Ok(data)
    }

    /// Returns `true` when no price series are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Tickers with price data, sorted.
    #[must_use]
    pub fn tickers(&self) -> Vec<&str> {
        self.series.keys().map(String::as_str).collect()
    }

    /// Price series for `ticker`.
    #[must_use]
    pub fn series(&self, ticker: &str) -> Option<&[PricePoint]> {
        self.series.get(ticker).map(Vec::as_slice)
    }

    /// Events in date order.
    #[must_use]
    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    /// Aligns closes of `tickers` between `start` and `end` (inclusive) on
    /// the dates every available ticker traded.
    ///
    /// Tickers without data in the range are left out of the frame.
    #[must_use]
    pub fn frame(&self, tickers: &[String], start: Option<NaiveDate>, end: Option<NaiveDate>) -> PriceFrame {
        let in_range = |d: NaiveDate| start.is_none_or(|s| d >= s) && end.is_none_or(|e| d <= e);

        let mut by_ticker: BTreeMap<String, HashMap<NaiveDate, f64>> = BTreeMap::new();
        for ticker in tickers {
            let Some(points) = self.series.get(ticker) else {
                continue;
            };
            let closes: HashMap<NaiveDate, f64> = points
                .iter()
                .filter(|p| in_range(p.date))
                .map(|p| (p.date, p.close))
                .collect();
            if !closes.is_empty() {
                by_ticker.insert(ticker.clone(), closes);
            }
        }

        let mut common: Option<BTreeSet<NaiveDate>> = None;
        for closes in by_ticker.values() {
            let dates: BTreeSet<NaiveDate> = closes.keys().copied().collect();
            common = Some(match common {
                Some(acc) => acc.intersection(&dates).copied().collect(),
                None => dates,
            });
        }
        let dates: Vec<NaiveDate> = common.unwrap_or_default().into_iter().collect();
        if dates.is_empty() {
            return PriceFrame::default();
        }

        let columns = by_ticker
            .into_iter()
            .map(|(ticker, closes)| {
                let column = dates.iter().filter_map(|d| closes.get(d).copied()).collect();
                (ticker, column)
            })
            .collect();

        PriceFrame { dates, columns }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, ToolError> {
    if !path.exists() {
        warn!(path = %path.display(), "market data file not found");
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| ToolError::Data(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| ToolError::Data(format!("{}: {e}", path.display())))
}
