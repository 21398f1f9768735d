use axum::{
    routing::get,
    Router,
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    response::IntoResponse,
};
use tower_http::cors::{CorsLayer, Any};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, AppError};
use crate::api::models::{
    parse_flag, parse_year, CurrentParams, DeletedWebhook, HistoryParams, StatusResponse,
};
use crate::api::response;
use crate::dataset::DatasetRow;
use crate::filter::YearFilter;
use crate::registry::Webhook;
use crate::service::Query as LookupQuery;
use crate::{AppState, STARTED_AT};

pub const CURRENT_PATH: &str = "/energy/v1/renewables/current";
pub const HISTORY_PATH: &str = "/energy/v1/renewables/history";
pub const NOTIFICATIONS_PATH: &str = "/energy/v1/notifications";
pub const STATUS_PATH: &str = "/energy/v1/status";

const API_VERSION: &str = "v1";
const NO_RESULTS: &str = "No return for the given search found";

// Whole-request budget, in multiples of the outbound HTTP timeout.
const REQUEST_TIMEOUT_FACTOR: u32 = 3;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route(CURRENT_PATH, get(current_all))
        .route(&format!("{}/", CURRENT_PATH), get(current_all))
        .route(&format!("{}/:country", CURRENT_PATH), get(current_country))
        .route(HISTORY_PATH, get(history_all))
        .route(&format!("{}/", HISTORY_PATH), get(history_all))
        .route(&format!("{}/:country", HISTORY_PATH), get(history_country))
        .route(NOTIFICATIONS_PATH, get(list_webhooks).post(register_webhook))
        .route(&format!("{}/", NOTIFICATIONS_PATH), get(list_webhooks).post(register_webhook))
        .route(
            &format!("{}/:id", NOTIFICATIONS_PATH),
            get(get_webhook).delete(delete_webhook),
        )
        .route(STATUS_PATH, get(status_handler))
        .route(&format!("{}/", STATUS_PATH), get(status_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

/// Counts the lookup in the background so a slow webhook never holds up
/// the response.
fn spawn_record_call(state: &AppState, country: &str) {
    if country.trim().is_empty() {
        return;
    }
    let dispatcher = state.dispatcher.clone();
    let country = country.to_string();
    tokio::spawn(async move {
        if let Err(e) = dispatcher.record_call(&country).await {
            warn!(country = %country, "call dispatch failed: {}", e);
        }
    });
}

async fn resolve(state: &AppState, query: &LookupQuery) -> Result<Vec<DatasetRow>> {
    match state.service.resolve(query).await {
        Ok(rows) if rows.is_empty() => Err(AppError::NotFound(NO_RESULTS.to_string())),
        Ok(rows) => Ok(rows),
        Err(AppError::IndexUnavailable) => {
            warn!(token = %query.token, "lookup against an unloaded index");
            Err(AppError::IndexUnavailable)
        }
        Err(e) => Err(e),
    }
}

fn request_budget(state: &AppState) -> Duration {
    state.config.http_timeout * REQUEST_TIMEOUT_FACTOR
}

fn timed_out(limit: Duration) -> AppError {
    AppError::Timeout(format!("Request processing timed out after {:?}", limit))
}

async fn with_timeout<T>(state: &AppState, work: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    let limit = request_budget(state);
    tokio::time::timeout(limit, work).await.map_err(|_| timed_out(limit))?
}

async fn current_all(
    State(state): State<AppState>,
    Query(params): Query<CurrentParams>,
) -> Result<impl IntoResponse> {
    current(state, String::new(), params).await
}

async fn current_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(params): Query<CurrentParams>,
) -> Result<impl IntoResponse> {
    current(state, country, params).await
}

async fn current(state: AppState, country: String, params: CurrentParams) -> Result<impl IntoResponse> {
    let neighbours = parse_flag("neighbours", params.neighbours.as_deref())?;
    info!(country = %country, neighbours, "current renewables lookup");
    spawn_record_call(&state, &country);

    // One deadline for the lookup and the expansion together.
    let limit = request_budget(&state);
    let deadline = tokio::time::Instant::now() + limit;

    let query = LookupQuery::new(&country, YearFilter::current());
    let mut rows = tokio::time::timeout_at(deadline, resolve(&state, &query))
        .await
        .map_err(|_| timed_out(limit))??;

    if neighbours && !query.token.is_empty() {
        let base = rows.len();
        let expanded = tokio::time::timeout_at(deadline, expand_neighbours(&state, &mut rows)).await;
        if expanded.is_err() {
            warn!(
                country = %country,
                added = rows.len() - base,
                "neighbour expansion ran out of time, answering with what was gathered"
            );
        }
    }

    Ok(response::listing(rows))
}

/// Appends to `rows`, for every distinct country already in it, the first
/// current row of each of its neighbours. Neighbours missing from the
/// dataset are skipped, and so is a country whose neighbours cannot be
/// fetched.
async fn expand_neighbours(state: &AppState, rows: &mut Vec<DatasetRow>) {
    let mut seen = HashSet::new();
    let countries: Vec<String> = rows
        .iter()
        .filter(|row| seen.insert(row.country.to_lowercase()))
        .map(|row| row.country.clone())
        .collect();

    for country in countries {
        let names = match state.countries.neighbours(&country).await {
            Ok(names) => names,
            Err(e) => {
                warn!(country = %country, "neighbour lookup failed, skipping: {}", e);
                continue;
            }
        };
        for name in names {
            spawn_record_call(state, &name);
            let query = LookupQuery::new(&name, YearFilter::current());
            match state.service.resolve(&query).await {
                Ok(found) => rows.extend(found.into_iter().next()),
                Err(e) => warn!(neighbour = %name, "neighbour lookup failed: {}", e),
            }
        }
    }
}

async fn history_all(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse> {
    history(state, String::new(), params).await
}

async fn history_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse> {
    history(state, country, params).await
}

async fn history(state: AppState, country: String, params: HistoryParams) -> Result<impl IntoResponse> {
    let begin = parse_year("begin", params.begin.as_deref())?;
    let end = parse_year("end", params.end.as_deref())?;
    let sort_by_value = parse_flag("sortByValue", params.sort_by_value.as_deref())?;
    if let (Some(b), Some(e)) = (begin, end) {
        if b > e {
            return Err(AppError::BadRequest(format!("begin ({}) is after end ({})", b, e)));
        }
    }
    info!(country = %country, ?begin, ?end, sort_by_value, "history renewables lookup");
    spawn_record_call(&state, &country);

    let query = LookupQuery::new(&country, YearFilter::range(begin, end));
    let mut rows = with_timeout(&state, resolve(&state, &query)).await?;
    if sort_by_value {
        sort_by_percentage(&mut rows);
    }

    Ok(response::listing(rows))
}

/// Ascending by percentage; ties keep dataset order.
pub fn sort_by_percentage(rows: &mut [DatasetRow]) {
    rows.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));
}

async fn register_webhook(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Webhook>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(webhook) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let subscription = state.registry.create(webhook).await?;
    info!(id = %subscription.id, country = %subscription.webhook.country, "webhook registered");
    Ok(response::created(subscription))
}

async fn list_webhooks(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(response::listing(state.registry.list().await?))
}

async fn get_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(response::success(state.registry.get(&id).await?))
}

async fn delete_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.registry.delete(&id).await?;
    info!(id = %id, "webhook removed");
    Ok(response::success(DeletedWebhook { webhook_id: id }))
}

async fn status_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let countries_api = state.countries.probe().await;

    let (notification_db, webhooks) = match state.registry.count().await {
        Ok(count) => (200, count),
        Err(e) => {
            warn!("webhook registry unreachable: {}", e);
            (503, 0)
        }
    };
    let cache_entries = state.service.cache().len().await.unwrap_or_else(|e| {
        warn!("cache store unreachable: {}", e);
        0
    });

    Ok(response::success(StatusResponse {
        countries_api,
        notification_db,
        webhooks,
        cache_entries,
        version: API_VERSION.to_string(),
        uptime: STARTED_AT.elapsed().as_secs_f64(),
    }))
}
