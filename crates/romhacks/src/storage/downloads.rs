//! Download tracking and the monthly popularity archive.
//!
//! Every download is recorded twice: once in the all-time table, which keeps
//! one row per entry and hashed client IP, and once in the monthly table,
//! which keeps one row per entry, hashed client IP and calendar month. The
//! monthly rows feed the "top this month" lists and, once a month is over,
//! are ranked into `monthly_popular_history`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{format_timestamp, parse_timestamp, Storage};
use crate::catalog::EntryKind;
use crate::error::Result;
use crate::month::YearMonth;

/// Download count of one entry in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    /// Entry id.
    pub entry_id: String,
    /// Entry title.
    pub title: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Distinct clients that downloaded the entry this month.
    pub downloads: i64,
}

/// Result of archiving one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    /// Ranked ROM hacks.
    pub games_archived: usize,
    /// Ranked ports.
    pub ports_archived: usize,
}

impl ArchiveSummary {
    /// Total ranked entries.
    #[must_use]
    pub fn total(&self) -> usize {
        self.games_archived + self.ports_archived
    }
}

/// One archived ranking row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    /// The archived month.
    pub year_month: YearMonth,
    /// Entry id.
    pub entry_id: String,
    /// Title of the entry, if it still exists.
    pub title: Option<String>,
    /// Entry kind.
    pub kind: EntryKind,
    /// Downloads in that month.
    pub download_count: i64,
    /// Rank within the kind, starting at 1.
    pub rank: i64,
    /// When the row was archived.
    pub archived_at: Option<DateTime<Utc>>,
}

impl Storage {
    /// Record a download of `entry_id` by the client with `ip_hash`.
    ///
    /// The monthly row is always attempted. Returns `true` if this client had
    /// never downloaded the entry before.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn track_download(&self, entry_id: &str, ip_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        let month = YearMonth::of(now).to_string();
        let timestamp = format_timestamp(now);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            INSERT OR IGNORE INTO monthly_downloads (entry_id, ip_hash, year_month, downloaded_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            (entry_id, ip_hash, &month, &timestamp),
        )?;
        let inserted = tx.execute(
            r"
            INSERT OR IGNORE INTO downloads (entry_id, ip_hash, downloaded_at)
            VALUES (?1, ?2, ?3)
            ",
            (entry_id, ip_hash, &timestamp),
        )?;
        tx.commit()?;

        debug!(
            "Download of {} in {} ({})",
            entry_id,
            month,
            if inserted > 0 { "new client" } else { "repeat" }
        );
        Ok(inserted > 0)
    }

    /// All-time distinct clients that downloaded an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn download_count(&self, entry_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(DISTINCT ip_hash) FROM downloads WHERE entry_id = ?1",
            [entry_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// All-time download counts for several entries.
    ///
    /// Entries without downloads are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn download_counts(&self, entry_ids: &[String]) -> Result<HashMap<String, i64>> {
        if entry_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            r"
            SELECT entry_id, COUNT(DISTINCT ip_hash) FROM downloads
            WHERE entry_id IN ({})
            GROUP BY entry_id
            ",
            placeholders(1, entry_ids.len())
        );
        self.count_map(&sql, entry_ids.iter().map(|id| Value::Text(id.clone())))
    }

    /// Download counts of every entry downloaded in `month`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn monthly_download_counts(&self, month: YearMonth) -> Result<HashMap<String, i64>> {
        self.count_map(
            r"
            SELECT entry_id, COUNT(*) FROM monthly_downloads
            WHERE year_month = ?1
            GROUP BY entry_id
            ",
            std::iter::once(Value::Text(month.to_string())),
        )
    }

    /// Download counts in `month` for the given entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn monthly_download_counts_for(
        &self,
        entry_ids: &[String],
        month: YearMonth,
    ) -> Result<HashMap<String, i64>> {
        if entry_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            r"
            SELECT entry_id, COUNT(*) FROM monthly_downloads
            WHERE year_month = ?1 AND entry_id IN ({})
            GROUP BY entry_id
            ",
            placeholders(2, entry_ids.len())
        );
        let values = std::iter::once(Value::Text(month.to_string()))
            .chain(entry_ids.iter().map(|id| Value::Text(id.clone())));
        self.count_map(&sql, values)
    }

    fn count_map(
        &self,
        sql: &str,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<HashMap<String, i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let counts = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    /// Most downloaded existing entries in `month`, optionally of one kind.
    ///
    /// Ties are broken by entry id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn top_monthly(
        &self,
        month: YearMonth,
        kind: Option<EntryKind>,
        limit: usize,
    ) -> Result<Vec<MonthlyCount>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            r"
            SELECT md.entry_id, e.title, e.kind, COUNT(*) AS downloads
            FROM monthly_downloads md
            INNER JOIN entries e ON e.id = md.entry_id
            WHERE md.year_month = ?1 AND (?2 IS NULL OR e.kind = ?2)
            GROUP BY md.entry_id
            ORDER BY downloads DESC, md.entry_id ASC
            LIMIT ?3
            ",
        )?;
        let rows = stmt
            .query_map(
                (month.to_string(), kind.map(EntryKind::as_str), limit),
                |row| {
                    let kind: String = row.get(2)?;
                    Ok(MonthlyCount {
                        entry_id: row.get(0)?,
                        title: row.get(1)?,
                        kind: kind.parse().unwrap_or_default(),
                        downloads: row.get(3)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Rank the top `top_n` entries of each kind for `month` into the archive.
    ///
    /// Only entries that still exist are ranked. Rows archived earlier are
    /// left as they are. The summary counts the ranked entries per kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn archive_month(&self, month: YearMonth, top_n: usize) -> Result<ArchiveSummary> {
        self.archive_month_at(month, top_n, Utc::now())
    }

    fn archive_month_at(
        &self,
        month: YearMonth,
        top_n: usize,
        now: DateTime<Utc>,
    ) -> Result<ArchiveSummary> {
        let archived_at = format_timestamp(now);
        let tx = self.conn.unchecked_transaction()?;

        let mut summary = ArchiveSummary::default();
        for kind in EntryKind::ALL {
            let top = self.top_monthly(month, Some(kind), top_n)?;
            for (rank, row) in (1_i64..).zip(&top) {
                tx.execute(
                    r"
                    INSERT OR IGNORE INTO monthly_popular_history
                        (year_month, entry_id, kind, download_count, rank, archived_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ",
                    (
                        month.to_string(),
                        &row.entry_id,
                        kind.as_str(),
                        row.downloads,
                        rank,
                        &archived_at,
                    ),
                )?;
            }
            match kind {
                EntryKind::Romhack => summary.games_archived = top.len(),
                EntryKind::Port => summary.ports_archived = top.len(),
            }
        }
        tx.commit()?;

        info!(
            "Archived {}: {} ROM hacks, {} ports",
            month, summary.games_archived, summary.ports_archived
        );
        Ok(summary)
    }

    /// Archived ranking for `month`, ordered by kind then rank.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn popular_history(
        &self,
        month: YearMonth,
        kind: Option<EntryKind>,
    ) -> Result<Vec<HistoryRow>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT h.entry_id, e.title, h.kind, h.download_count, h.rank, h.archived_at
            FROM monthly_popular_history h
            LEFT JOIN entries e ON e.id = h.entry_id
            WHERE h.year_month = ?1 AND (?2 IS NULL OR h.kind = ?2)
            ORDER BY h.kind, h.rank
            ",
        )?;
        let rows = stmt
            .query_map((month.to_string(), kind.map(EntryKind::as_str)), |row| {
                let kind: String = row.get(2)?;
                let archived_at: Option<String> = row.get(5)?;
                Ok(HistoryRow {
                    year_month: month,
                    entry_id: row.get(0)?,
                    title: row.get(1)?,
                    kind: kind.parse().unwrap_or_default(),
                    download_count: row.get(3)?,
                    rank: row.get(4)?,
                    archived_at: archived_at.as_deref().and_then(parse_timestamp),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Months present in the archive, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn archived_months(&self) -> Result<Vec<YearMonth>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT year_month FROM monthly_popular_history ORDER BY year_month DESC",
        )?;
        let raw = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(raw
            .into_iter()
            .filter_map(|value| match value.parse() {
                Ok(month) => Some(month),
                Err(_) => {
                    warn!("Skipping archived month with bad key: {}", value);
                    None
                }
            })
            .collect())
    }

    /// Archive the month before `now` unless it is archived already or has no
    /// downloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn archive_previous_month_if_needed(
        &self,
        now: DateTime<Utc>,
        top_n: usize,
    ) -> Result<Option<ArchiveSummary>> {
        let previous = YearMonth::of(now).previous();

        let archived: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM monthly_popular_history WHERE year_month = ?1",
            [previous.to_string()],
            |row| row.get(0),
        )?;
        if archived > 0 {
            debug!("{} is already archived", previous);
            return Ok(None);
        }

        let has_data: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM monthly_downloads WHERE year_month = ?1",
            [previous.to_string()],
            |row| row.get(0),
        )?;
        if has_data == 0 {
            debug!("No downloads recorded for {}", previous);
            return Ok(None);
        }

        self.archive_month_at(previous, top_n, now).map(Some)
    }
}

/// `?start, ?start+1, ...` for an `IN` list of `count` values.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Entry;
    use chrono::TimeZone;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).unwrap()
    }

    fn seed(storage: &Storage) {
        for (id, kind) in [
            ("hack_a", EntryKind::Romhack),
            ("hack_b", EntryKind::Romhack),
            ("hack_c", EntryKind::Romhack),
            ("port_a", EntryKind::Port),
        ] {
            storage
                .insert_entry(&Entry::new(id, kind, id.to_uppercase()))
                .unwrap();
        }
    }

    fn download(storage: &Storage, id: &str, clients: usize, now: DateTime<Utc>) {
        for client in 0..clients {
            storage
                .track_download(id, &format!("client{client}"), now)
                .unwrap();
        }
    }

    #[test]
    fn test_track_download_dedupes_per_client() {
        let storage = create_test_storage();
        let now = at(2025, 1, 10);

        assert!(storage.track_download("x", "ip1", now).unwrap());
        assert!(!storage.track_download("x", "ip1", now).unwrap());
        assert!(storage.track_download("x", "ip2", now).unwrap());

        assert_eq!(storage.download_count("x").unwrap(), 2);
        assert_eq!(storage.download_count("y").unwrap(), 0);
    }

    #[test]
    fn test_monthly_row_recorded_for_repeat_client() {
        let storage = create_test_storage();

        assert!(storage.track_download("x", "ip1", at(2025, 1, 10)).unwrap());
        // Same client next month: not new all-time, but counted for February
        assert!(!storage.track_download("x", "ip1", at(2025, 2, 3)).unwrap());

        let jan = storage.monthly_download_counts(ym(2025, 1)).unwrap();
        let feb = storage.monthly_download_counts(ym(2025, 2)).unwrap();
        assert_eq!(jan.get("x"), Some(&1));
        assert_eq!(feb.get("x"), Some(&1));
        assert_eq!(storage.download_count("x").unwrap(), 1);
    }

    #[test]
    fn test_download_counts_batch() {
        let storage = create_test_storage();
        let now = at(2025, 3, 1);
        download(&storage, "a", 3, now);
        download(&storage, "b", 1, now);

        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let counts = storage.download_counts(&ids).unwrap();
        assert_eq!(counts.get("a"), Some(&3));
        assert_eq!(counts.get("b"), Some(&1));
        assert!(!counts.contains_key("c"));

        assert!(storage.download_counts(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_monthly_counts_for_ids() {
        let storage = create_test_storage();
        download(&storage, "a", 2, at(2025, 3, 1));
        download(&storage, "b", 4, at(2025, 3, 2));
        download(&storage, "a", 5, at(2025, 4, 1));

        let ids = vec!["a".to_string()];
        let counts = storage.monthly_download_counts_for(&ids, ym(2025, 3)).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts.get("a"), Some(&2));
        assert!(storage
            .monthly_download_counts_for(&[], ym(2025, 3))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_top_monthly_orders_and_filters() {
        let storage = create_test_storage();
        seed(&storage);
        let now = at(2025, 5, 5);
        download(&storage, "hack_b", 3, now);
        download(&storage, "hack_a", 3, now);
        download(&storage, "hack_c", 1, now);
        download(&storage, "port_a", 2, now);
        download(&storage, "deleted", 9, now);

        let top = storage
            .top_monthly(ym(2025, 5), Some(EntryKind::Romhack), 2)
            .unwrap();
        let ids: Vec<_> = top.iter().map(|r| r.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["hack_a", "hack_b"]);
        assert_eq!(top[0].title, "HACK_A");

        let all = storage.top_monthly(ym(2025, 5), None, 10).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|r| r.entry_id != "deleted"));
    }

    #[test]
    fn test_archive_month() {
        let storage = create_test_storage();
        seed(&storage);
        let now = at(2025, 5, 5);
        download(&storage, "hack_a", 1, now);
        download(&storage, "hack_b", 4, now);
        download(&storage, "hack_c", 2, now);
        download(&storage, "port_a", 3, now);

        let summary = storage.archive_month(ym(2025, 5), 2).unwrap();
        assert_eq!(
            summary,
            ArchiveSummary {
                games_archived: 2,
                ports_archived: 1
            }
        );
        assert_eq!(summary.total(), 3);

        let history = storage.popular_history(ym(2025, 5), None).unwrap();
        let ranked: Vec<_> = history
            .iter()
            .map(|r| (r.kind, r.entry_id.as_str(), r.rank, r.download_count))
            .collect();
        assert_eq!(
            ranked,
            vec![
                (EntryKind::Port, "port_a", 1, 3),
                (EntryKind::Romhack, "hack_b", 1, 4),
                (EntryKind::Romhack, "hack_c", 2, 2),
            ]
        );

        let ports = storage
            .popular_history(ym(2025, 5), Some(EntryKind::Port))
            .unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].title.as_deref(), Some("PORT_A"));
    }

    #[test]
    fn test_archive_month_leaves_existing_rows() {
        let storage = create_test_storage();
        seed(&storage);
        let now = at(2025, 5, 5);
        download(&storage, "hack_a", 2, now);

        storage.archive_month(ym(2025, 5), 5).unwrap();
        // More downloads arrive after the first archive run
        download(&storage, "hack_a", 6, now);
        storage.archive_month(ym(2025, 5), 5).unwrap();

        let history = storage.popular_history(ym(2025, 5), None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].download_count, 2);
    }

    #[test]
    fn test_archived_months_newest_first() {
        let storage = create_test_storage();
        seed(&storage);
        download(&storage, "hack_a", 1, at(2024, 12, 1));
        download(&storage, "hack_a", 1, at(2025, 2, 1));
        storage.archive_month(ym(2024, 12), 5).unwrap();
        storage.archive_month(ym(2025, 2), 5).unwrap();
        // A month without downloads adds nothing
        storage.archive_month(ym(2025, 1), 5).unwrap();

        assert_eq!(
            storage.archived_months().unwrap(),
            vec![ym(2025, 2), ym(2024, 12)]
        );
    }

    #[test]
    fn test_archive_previous_month_if_needed() {
        let storage = create_test_storage();
        seed(&storage);
        download(&storage, "port_a", 2, at(2024, 12, 20));

        // Nothing recorded for November
        assert!(storage
            .archive_previous_month_if_needed(at(2024, 12, 25), 10)
            .unwrap()
            .is_none());

        // January looks back across the year boundary
        let summary = storage
            .archive_previous_month_if_needed(at(2025, 1, 2), 10)
            .unwrap()
            .unwrap();
        assert_eq!(summary.ports_archived, 1);
        assert_eq!(summary.games_archived, 0);

        // Second run is a no-op
        assert!(storage
            .archive_previous_month_if_needed(at(2025, 1, 3), 10)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(2, 1), "?2");
    }
}
