use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, Result};

/// One line of the renewables CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    #[serde(rename = "name")]
    pub country: String,
    #[serde(rename = "isoCode")]
    pub country_code: String,
    pub year: i32,
    pub percentage: f64,
}

impl DatasetRow {
    pub fn new(country: &str, country_code: &str, year: i32, percentage: f64) -> Self {
        Self {
            country: country.to_string(),
            country_code: country_code.to_string(),
            year,
            percentage,
        }
    }
}

pub fn load(path: &Path) -> Result<Vec<DatasetRow>> {
    let file = std::fs::File::open(path)
        .map_err(|e| AppError::DataLoad(format!("{}: {}", path.display(), e)))?;
    let rows = from_reader(file)?;
    info!(path = %path.display(), rows = rows.len(), "dataset loaded");
    Ok(rows)
}

/// Parses `[country, code, year, percentage]` records after a header line.
/// Rows that cannot be decoded, are short, or whose numeric columns do not
/// parse are skipped. Only I/O failures abort the load.
pub fn from_reader<R: Read>(reader: R) -> Result<Vec<DatasetRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    if reader.headers()?.is_empty() {
        return Err(AppError::DataLoad("missing header row".to_string()));
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        // +2: one for the header, one for 1-based numbering
        let line = line + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!(line, "skipping unreadable row: {}", e);
                continue;
            }
        };

        if record.len() < 4 {
            warn!(line, columns = record.len(), "skipping short row");
            continue;
        }

        let year = match record[2].trim().parse::<i32>() {
            Ok(year) => year,
            Err(e) => {
                warn!(line, value = &record[2], "skipping row, bad year: {}", e);
                continue;
            }
        };
        let percentage = match record[3].trim().parse::<f64>() {
            Ok(p) => p,
            Err(e) => {
                warn!(line, value = &record[3], "skipping row, bad percentage: {}", e);
                continue;
            }
        };

        rows.push(DatasetRow {
            country: record[0].to_string(),
            country_code: record[1].to_string(),
            year,
            percentage,
        });
    }

    Ok(rows)
}
