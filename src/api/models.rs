use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Default, Deserialize)]
pub struct CurrentParams {
    pub neighbours: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub begin: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "sortByValue")]
    pub sort_by_value: Option<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub countries_api: u16,
    pub notification_db: u16,
    pub webhooks: usize,
    pub cache_entries: usize,
    pub version: String,
    pub uptime: f64,
}

#[derive(Serialize)]
pub struct DeletedWebhook {
    pub webhook_id: String,
}

/// `1`, `t`, `true` (any of the usual casings) and their false
/// counterparts. A missing or blank value is false.
pub fn parse_flag(name: &str, raw: Option<&str>) -> Result<bool> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(false);
    };
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(AppError::BadRequest(format!("Invalid {} value '{}', expected a boolean", name, other))),
    }
}

pub fn parse_year(name: &str, raw: Option<&str>) -> Result<Option<i32>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i32>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid {} year '{}'", name, raw))),
    }
}
