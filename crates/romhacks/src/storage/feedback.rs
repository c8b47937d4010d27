//! Feedback queue persistence.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::{format_timestamp, non_blank, parse_timestamp, Storage};
use crate::error::Result;
use crate::moderation::{Feedback, FeedbackKind, FeedbackStatus, NewFeedback};

impl Storage {
    /// Store a feedback report with status `new`.
    ///
    /// Returns the report id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn submit_feedback(&self, feedback: &NewFeedback, ip_hash: Option<&str>) -> Result<i64> {
        self.submit_feedback_at(feedback, ip_hash, Utc::now())
    }

    pub(crate) fn submit_feedback_at(
        &self,
        feedback: &NewFeedback,
        ip_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            r"
            INSERT INTO feedback (type, title, url, description, email, submitted_at, status, ip_hash)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'new', ?7)
            ",
            params![
                feedback.kind.as_str(),
                non_blank(feedback.title.as_deref()).map(str::trim),
                non_blank(feedback.url.as_deref()).map(str::trim),
                feedback.description.trim(),
                non_blank(feedback.email.as_deref()).map(str::trim),
                format_timestamp(now),
                ip_hash,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        info!("Received {} feedback {}", feedback.kind, id);
        Ok(id)
    }

    /// Get a feedback report by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_feedback(&self, id: i64) -> Result<Option<Feedback>> {
        let feedback = self
            .conn
            .query_row(
                "SELECT * FROM feedback WHERE id = ?1",
                [id],
                Self::row_to_feedback,
            )
            .optional()?;
        Ok(feedback)
    }

    /// List feedback, newest first, optionally filtered by status and type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_feedback(
        &self,
        status: Option<FeedbackStatus>,
        kind: Option<FeedbackKind>,
    ) -> Result<Vec<Feedback>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT * FROM feedback
            WHERE (?1 IS NULL OR COALESCE(NULLIF(status, ''), 'new') = ?1)
              AND (?2 IS NULL OR type = ?2)
            ORDER BY submitted_at DESC, id DESC
            ",
        )?;
        let feedback = stmt
            .query_map(
                [status.map(FeedbackStatus::as_str), kind.map(FeedbackKind::as_str)],
                Self::row_to_feedback,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(feedback)
    }

    /// Set the status of a feedback report.
    ///
    /// Notes are replaced when given and kept otherwise. Returns `false` if
    /// no report has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_feedback_status(
        &self,
        id: i64,
        status: FeedbackStatus,
        admin_notes: Option<&str>,
    ) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE feedback SET status = ?1, admin_notes = COALESCE(?2, admin_notes) WHERE id = ?3",
            params![status.as_str(), admin_notes, id],
        )?;
        if affected > 0 {
            info!("Feedback {} is now {}", id, status);
        }
        Ok(affected > 0)
    }

    /// Delete a feedback report.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_feedback(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM feedback WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    fn row_to_feedback(row: &rusqlite::Row) -> rusqlite::Result<Feedback> {
        let kind: String = row.get("type")?;
        let status: Option<String> = row.get("status")?;
        let submitted_at: Option<String> = row.get("submitted_at")?;

        Ok(Feedback {
            id: row.get("id")?,
            status: status
                .as_deref()
                .unwrap_or_default()
                .parse()
                .unwrap_or_else(|_| {
                    warn!("Unknown feedback status: {:?}, treating as new", status);
                    FeedbackStatus::New
                }),
            admin_notes: row.get("admin_notes")?,
            submitted_at: submitted_at.as_deref().and_then(parse_timestamp),
            ip_hash: row.get("ip_hash")?,
            data: NewFeedback {
                kind: kind.parse().unwrap_or_default(),
                title: row.get("title")?,
                url: row.get("url")?,
                description: row.get("description")?,
                email: row.get("email")?,
            },
        })
    }
}
