//! Public JSON API.

use axum::extract::{Path, Query, State};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::client_ip::ClientIp;
use super::form::FormOrJson;
use super::state::AppState;
use crate::catalog::{Entry, EntryKind};
use crate::error::{Error, Result};
use crate::moderation::{NewFeedback, NewSubmission};
use crate::month::YearMonth;
use crate::storage::{self, HistoryRow};

/// An entry with its download counters.
#[derive(Debug, Clone, Serialize)]
pub struct EntryWithCounts {
    /// The entry itself.
    #[serde(flatten)]
    pub entry: Entry,
    /// Distinct clients that ever downloaded it.
    pub downloads: i64,
    /// Distinct clients that downloaded it this month.
    pub monthly_downloads: i64,
}

/// Filters for `GET /api/entries`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EntryQuery {
    /// `romhack` or `port`.
    pub kind: Option<String>,
    /// Console token.
    pub console: Option<String>,
    /// Series name, matched case-insensitively.
    pub series: Option<String>,
    /// Free text search.
    pub q: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl EntryQuery {
    fn kind(&self) -> Result<Option<EntryKind>> {
        non_empty(self.kind.as_deref()).map(str::parse).transpose()
    }

    fn matches(&self, entry: &Entry) -> bool {
        let console_ok = non_empty(self.console.as_deref()).map_or(true, |c| entry.has_console(c));
        let series_ok = non_empty(self.series.as_deref()).map_or(true, |wanted| {
            entry
                .effective_series()
                .is_some_and(|series| series.eq_ignore_ascii_case(wanted))
        });
        let query_ok = non_empty(self.q.as_deref()).map_or(true, |q| entry.matches_query(q));
        console_ok && series_ok && query_ok
    }
}

/// `GET /api/entries`
pub async fn list_entries(
    State(state): State<AppState>,
    Query(filters): Query<EntryQuery>,
) -> Result<Json<Vec<EntryWithCounts>>> {
    let kind = filters.kind()?;

    let (entries, downloads, monthly) = storage::blocking(&state.storage, move |storage| {
        let entries: Vec<Entry> = storage
            .list_entries(kind)?
            .into_iter()
            .filter(|entry| filters.matches(entry))
            .collect();
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        let downloads = storage.download_counts(&ids)?;
        let monthly = storage.monthly_download_counts_for(&ids, YearMonth::current())?;
        Ok((entries, downloads, monthly))
    })
    .await?;

    let entries = entries
        .into_iter()
        .map(|entry| EntryWithCounts {
            downloads: downloads.get(&entry.id).copied().unwrap_or(0),
            monthly_downloads: monthly.get(&entry.id).copied().unwrap_or(0),
            entry,
        })
        .collect();
    Ok(Json(entries))
}

/// `GET /api/entries/{id}`
pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EntryWithCounts>> {
    let storage = state.storage.lock().await;
    let entry = storage
        .get_entry(&id)?
        .ok_or_else(|| Error::not_found("entry", &id))?;
    let downloads = storage.download_count(&id)?;
    let monthly_downloads = storage
        .monthly_download_counts_for(std::slice::from_ref(&entry.id), YearMonth::current())?
        .get(&entry.id)
        .copied()
        .unwrap_or(0);

    Ok(Json(EntryWithCounts {
        entry,
        downloads,
        monthly_downloads,
    }))
}

/// `POST /api/track-download/{id}`
///
/// `success` is true when this client had not downloaded the entry before.
pub async fn track_download(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let ip_hash = state.anonymizer.hash(&ip);

    let storage = state.storage.lock().await;
    if !storage.entry_exists(&id)? {
        return Err(Error::not_found("entry", id));
    }
    let recorded = storage.track_download(&id, &ip_hash, Utc::now())?;
    drop(storage);

    debug!(entry = %id, new = recorded, "Tracked download");
    Ok(Json(json!({ "success": recorded })))
}

/// Hash of the request's user agent, if it sent one.
fn user_agent_hash(state: &AppState, headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(|value| state.anonymizer.hash(value))
}

/// `POST /api/submit`
pub async fn submit(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    FormOrJson(submission): FormOrJson<NewSubmission>,
) -> Result<Json<Value>> {
    let ip_hash = state.anonymizer.hash(&ip);
    if !state.limiter.allow(&ip_hash).await {
        return Err(Error::RateLimited);
    }
    state.validator.validate_submission(&submission)?;

    let ua_hash = user_agent_hash(&state, &headers);
    let id = state
        .storage
        .lock()
        .await
        .submit(&submission, Some(&ip_hash), ua_hash.as_deref())?;

    info!(id, kind = %submission.kind, "New submission received");
    Ok(Json(json!({ "success": true, "id": id })))
}

/// `POST /api/feedback`
pub async fn feedback(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    FormOrJson(feedback): FormOrJson<NewFeedback>,
) -> Result<Json<Value>> {
    let ip_hash = state.anonymizer.hash(&ip);
    if !state.limiter.allow(&ip_hash).await {
        return Err(Error::RateLimited);
    }
    state.validator.validate_feedback(&feedback)?;

    let id = state
        .storage
        .lock()
        .await
        .submit_feedback(&feedback, Some(&ip_hash))?;

    info!(id, kind = %feedback.kind, "New feedback received");
    Ok(Json(json!({ "success": true, "id": id })))
}

/// `GET /api/popular`
pub async fn popular_months(State(state): State<AppState>) -> Result<Json<Value>> {
    let months = state.storage.lock().await.archived_months()?;
    Ok(Json(json!({ "months": months })))
}

/// Filter for an archived month.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct KindQuery {
    /// `romhack` or `port`.
    pub kind: Option<String>,
}

/// Archived ranking of one month.
#[derive(Debug, Serialize)]
pub struct PopularMonth {
    /// The month.
    pub month: YearMonth,
    /// Ranked rows, by kind then rank.
    pub entries: Vec<HistoryRow>,
}

/// `GET /api/popular/{month}`
pub async fn popular_month(
    State(state): State<AppState>,
    Path(month): Path<String>,
    Query(query): Query<KindQuery>,
) -> Result<Json<PopularMonth>> {
    let month: YearMonth = month.parse()?;
    let kind = non_empty(query.kind.as_deref())
        .map(str::parse::<EntryKind>)
        .transpose()?;

    let entries = state.storage.lock().await.popular_history(month, kind)?;
    Ok(Json(PopularMonth { month, entries }))
}

/// `GET /healthz`
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>> {
    // Touch the database so a broken connection shows up here
    state.storage.lock().await.entry_exists("")?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
