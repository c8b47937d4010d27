//! Public HTML pages.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

use super::render;
use super::state::AppState;
use crate::catalog::{Entry, EntryKind};
use crate::error::Result;
use crate::month::YearMonth;
use crate::storage;

/// Entries in the "top this month" list on the index page.
const INDEX_MONTHLY_LIMIT: usize = 10;

/// Filters accepted by the list pages.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    /// Only entries for this console.
    pub console: Option<String>,
    /// Free text search.
    pub q: Option<String>,
}

impl ListQuery {
    fn console(&self) -> Option<&str> {
        self.console.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    fn query(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// Whether `entry` passes both filters.
    pub fn matches(&self, entry: &Entry) -> bool {
        self.console().map_or(true, |c| entry.has_console(c))
            && self.query().map_or(true, |q| entry.matches_query(q))
    }
}

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Result<Html<String>> {
    let (romhacks, ports, monthly) = storage::blocking(&state.storage, |storage| {
        Ok((
            storage.popular_entries(Some(EntryKind::Romhack))?,
            storage.popular_entries(Some(EntryKind::Port))?,
            storage.top_monthly(YearMonth::current(), None, INDEX_MONTHLY_LIMIT)?,
        ))
    })
    .await?;

    let body = format!(
        r#"<section><h2>Popular ROM hacks</h2>{}</section>
<section><h2>Popular ports</h2>{}</section>
<section><h2>Most downloaded this month</h2>{}</section>"#,
        render::entry_grid(romhacks.iter().map(|e| (e, None)), "No popular ROM hacks yet."),
        render::entry_grid(ports.iter().map(|e| (e, None)), "No popular ports yet."),
        render::monthly_ranking(&monthly),
    );
    Ok(render::layout("Home", &body))
}

async fn list_page(state: &AppState, kind: EntryKind, filters: ListQuery) -> Result<Html<String>> {
    let (entries, counts, filters) = storage::blocking(&state.storage, move |storage| {
        let entries: Vec<Entry> = storage
            .list_entries(Some(kind))?
            .into_iter()
            .filter(|entry| filters.matches(entry))
            .collect();
        let ids: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        let counts = storage.download_counts(&ids)?;
        Ok((entries, counts, filters))
    })
    .await?;

    let (title, action) = match kind {
        EntryKind::Romhack => ("ROM Hacks", "/romhacks"),
        EntryKind::Port => ("Ports", "/ports"),
    };
    let body = format!(
        "<h1>{title}</h1>{}{}",
        render::filter_form(action, filters.console(), filters.query()),
        render::entry_grid(
            entries
                .iter()
                .map(|e| (e, Some(counts.get(&e.id).copied().unwrap_or(0)))),
            "Nothing matches these filters.",
        ),
    );
    Ok(render::layout(title, &body))
}

/// `GET /romhacks`
pub async fn romhacks(
    State(state): State<AppState>,
    Query(filters): Query<ListQuery>,
) -> Result<Html<String>> {
    list_page(&state, EntryKind::Romhack, filters).await
}

/// `GET /ports`
pub async fn ports(
    State(state): State<AppState>,
    Query(filters): Query<ListQuery>,
) -> Result<Html<String>> {
    list_page(&state, EntryKind::Port, filters).await
}

/// `GET /game/{id}`
pub async fn detail(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let storage = state.storage.lock().await;
    let Some(entry) = storage.get_entry(&id)? else {
        drop(storage);
        let page = render::layout("Not found", &render::not_found(&id));
        return Ok((StatusCode::NOT_FOUND, page).into_response());
    };
    let downloads = storage.download_count(&id)?;
    let monthly = storage
        .monthly_download_counts_for(std::slice::from_ref(&entry.id), YearMonth::current())?
        .get(&entry.id)
        .copied()
        .unwrap_or(0);
    drop(storage);

    let body = render::entry_detail(&entry, downloads, monthly);
    Ok(render::layout(&entry.title, &body).into_response())
}
