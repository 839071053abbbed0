//! Historical price adapter: loads closing prices from CSV into a replayable
//! [`MarketScenario`].
//!
//! The file must have a header row. The price column is the first header named
//! `close` or `adj_close` (case-insensitive); a single-column file is read as-is.

use std::path::Path;

use crate::scenario::{MarketScenario, ScenarioError};

/// Read a closing-price column from CSV text.
pub fn read_closes<R: std::io::Read>(reader: R) -> Result<Vec<f64>, ScenarioError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("close"))
        .or_else(|| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case("adj_close"))
        })
        .unwrap_or(0);

    let mut closes = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let raw = record.get(column).unwrap_or("");
        let value = raw.parse::<f64>().unwrap_or(f64::NAN);
        if !value.is_finite() || value <= 0.0 {
            return Err(ScenarioError::InvalidPrice { row, value });
        }
        closes.push(value);
    }
    Ok(closes)
}

/// Load a CSV file of prices and turn it into a historical scenario.
///
/// The scenario is named after the file stem.
pub fn load_price_csv(path: &Path) -> Result<MarketScenario, ScenarioError> {
    let file = std::fs::File::open(path)?;
    let closes = read_closes(file)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "historical".to_string());
    MarketScenario::from_prices(name, &closes)
}
