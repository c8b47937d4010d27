//! Admin JSON API.
//!
//! Every handler takes an [`AdminSession`], so requests without a valid
//! session cookie are turned away before the handler runs.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::auth::AdminSession;
use super::form::FormOrJson;
use super::state::AppState;
use crate::catalog::{slugify, Entry, EntryPatch, Platform};
use crate::error::{Error, Result};
use crate::moderation::{
    Feedback, FeedbackKind, FeedbackStatus, Submission, SubmissionCounts, SubmissionStatus,
};
use crate::month::YearMonth;
use crate::storage::{self, ArchiveSummary, Storage, StorageStats};

fn parse_filter<T: std::str::FromStr<Err = Error>>(value: Option<&str>) -> Result<Option<T>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::parse)
        .transpose()
}

fn submission_not_found(id: i64) -> Error {
    Error::not_found("submission", id.to_string())
}

/// Filter for the submission queue.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmissionQuery {
    /// `new`, `approved` or `rejected`.
    pub status: Option<String>,
}

/// `GET /api/admin/submissions`
pub async fn list_submissions(
    _: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<SubmissionQuery>,
) -> Result<Json<Vec<Submission>>> {
    let status = parse_filter::<SubmissionStatus>(query.status.as_deref())?;
    let submissions = state.storage.lock().await.list_submissions(status)?;
    Ok(Json(submissions))
}

/// `GET /api/admin/submissions/counts`
pub async fn submission_counts(
    _: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<SubmissionCounts>> {
    Ok(Json(state.storage.lock().await.submission_counts()?))
}

/// `GET /api/admin/submission/{id}`
pub async fn get_submission(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Submission>> {
    state
        .storage
        .lock()
        .await
        .get_submission(id)?
        .map(Json)
        .ok_or_else(|| submission_not_found(id))
}

/// Body of an approval.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApproveRequest {
    /// Also copy the submission into the catalog.
    #[serde(deserialize_with = "crate::moderation::de_flag")]
    pub publish: bool,
}

/// `POST /api/admin/submission/{id}/approve`
pub async fn approve_submission(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    FormOrJson(request): FormOrJson<ApproveRequest>,
) -> Result<Json<Value>> {
    let storage = state.storage.lock().await;
    let entry_id = if request.publish {
        Some(storage.approve_and_publish(id)?)
    } else if storage.approve_submission(id)? {
        None
    } else {
        return Err(submission_not_found(id));
    };
    drop(storage);

    info!(id, published = ?entry_id, "Submission approved");
    Ok(Json(json!({ "success": true, "entry_id": entry_id })))
}

/// Body of a rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RejectRequest {
    /// Why the submission was turned down.
    pub reason: Option<String>,
}

/// `POST /api/admin/submission/{id}/reject`
pub async fn reject_submission(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    FormOrJson(request): FormOrJson<RejectRequest>,
) -> Result<Json<Value>> {
    let reason = request.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());

    if !state.storage.lock().await.reject_submission(id, reason)? {
        return Err(submission_not_found(id));
    }
    info!(id, "Submission rejected");
    Ok(Json(json!({ "success": true })))
}

/// Filters for the feedback queue.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackQuery {
    /// Feedback status.
    pub status: Option<String>,
    /// Feedback type.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// `GET /api/admin/feedback`
pub async fn list_feedback(
    _: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<FeedbackQuery>,
) -> Result<Json<Vec<Feedback>>> {
    let status = parse_filter::<FeedbackStatus>(query.status.as_deref())?;
    let kind = parse_filter::<FeedbackKind>(query.kind.as_deref())?;
    let feedback = state.storage.lock().await.list_feedback(status, kind)?;
    Ok(Json(feedback))
}

/// New status for a feedback report.
#[derive(Debug, Deserialize)]
pub struct FeedbackUpdate {
    /// The new status.
    pub status: String,
    /// Replaces the stored notes when given.
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// `POST /api/admin/feedback/{id}`
pub async fn update_feedback(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    FormOrJson(update): FormOrJson<FeedbackUpdate>,
) -> Result<Json<Value>> {
    let status: FeedbackStatus = update.status.parse()?;
    let updated = state.storage.lock().await.update_feedback_status(
        id,
        status,
        update.admin_notes.as_deref(),
    )?;
    if !updated {
        return Err(Error::not_found("feedback", id.to_string()));
    }
    Ok(Json(json!({ "success": true })))
}

/// `DELETE /api/admin/feedback/{id}`
pub async fn delete_feedback(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    if !state.storage.lock().await.delete_feedback(id)? {
        return Err(Error::not_found("feedback", id.to_string()));
    }
    info!(id, "Feedback deleted");
    Ok(Json(json!({ "success": true })))
}

/// `POST /api/admin/entry`
///
/// An empty id is derived from the title. Existing ids are refused.
pub async fn create_entry(
    _: AdminSession,
    State(state): State<AppState>,
    FormOrJson(mut entry): FormOrJson<Entry>,
) -> Result<Json<Value>> {
    entry.title = entry.title.trim().to_string();
    if entry.title.is_empty() {
        return Err(Error::invalid_field("title", "is required"));
    }
    entry.id = entry.id.trim().to_string();
    if entry.id.is_empty() {
        entry.id = slugify(&entry.title);
    }

    let storage = state.storage.lock().await;
    if storage.entry_exists(&entry.id)? {
        return Err(Error::bad_request(format!(
            "an entry with id '{}' already exists",
            entry.id
        )));
    }
    let id = storage.insert_entry(&entry)?;
    drop(storage);

    info!(id = %id, kind = %entry.kind, "Entry created");
    Ok(Json(json!({ "success": true, "id": id })))
}

/// `PATCH /api/admin/entry/{id}`
pub async fn update_entry(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    FormOrJson(patch): FormOrJson<EntryPatch>,
) -> Result<Json<Value>> {
    if patch.is_empty() {
        return Err(Error::bad_request("nothing to update"));
    }
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(Error::invalid_field("title", "cannot be empty"));
    }
    if !state.storage.lock().await.update_entry(&id, &patch)? {
        return Err(Error::not_found("entry", id));
    }
    Ok(Json(json!({ "success": true })))
}

/// `DELETE /api/admin/entry/{id}`
pub async fn delete_entry(
    _: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    if !state.storage.lock().await.delete_entry(&id)? {
        return Err(Error::not_found("entry", id));
    }
    Ok(Json(json!({ "success": true })))
}

/// Instructions for one platform. Blank text removes them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InstructionsRequest {
    /// The instructions.
    pub text: String,
}

/// `PUT /api/admin/entry/{id}/instructions/{platform}`
pub async fn set_instructions(
    _: AdminSession,
    State(state): State<AppState>,
    Path((id, platform)): Path<(String, String)>,
    FormOrJson(request): FormOrJson<InstructionsRequest>,
) -> Result<Json<Value>> {
    let platform: Platform = platform.parse()?;
    let updated = state
        .storage
        .lock()
        .await
        .set_platform_instructions(&id, platform, &request.text)?;
    if !updated {
        return Err(Error::not_found("entry", id));
    }
    Ok(Json(json!({ "success": true })))
}

/// Body of a manual archive run.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ArchiveRequest {
    /// Month to archive, the previous month when absent.
    pub month: Option<YearMonth>,
    /// Entries per kind, the configured number when absent.
    pub top_n: Option<usize>,
}

/// `POST /api/admin/archive`
pub async fn archive(
    _: AdminSession,
    State(state): State<AppState>,
    FormOrJson(request): FormOrJson<ArchiveRequest>,
) -> Result<Json<Value>> {
    let month = request
        .month
        .unwrap_or_else(|| YearMonth::current().previous());
    let top_n = request.top_n.unwrap_or(state.config.archive.top_n);
    if top_n == 0 {
        return Err(Error::invalid_field("top_n", "must be at least 1"));
    }

    let summary: ArchiveSummary =
        storage::blocking(&state.storage, move |storage| storage.archive_month(month, top_n))
            .await?;
    info!(month = %month, total = summary.total(), "Archived month on request");
    Ok(Json(json!({ "success": true, "month": month, "summary": summary })))
}

/// `GET /api/admin/stats`
pub async fn stats(_: AdminSession, State(state): State<AppState>) -> Result<Json<StorageStats>> {
    Ok(Json(storage::blocking(&state.storage, Storage::stats).await?))
}
