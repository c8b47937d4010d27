//! Submission queue persistence.

use chrono::{DateTime, Utc};
use rusqlite::{named_params, params, OptionalExtension};
use tracing::{info, warn};

use super::{decode_list, encode_list, format_timestamp, non_blank, parse_timestamp, Storage};
use crate::catalog::{encode_consoles, normalize_consoles, slugify, Entry};
use crate::error::{Error, Result};
use crate::moderation::{NewSubmission, Submission, SubmissionCounts, SubmissionStatus};

impl Storage {
    /// Store a new submission with status `new`.
    ///
    /// Returns the submission id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn submit(
        &self,
        submission: &NewSubmission,
        ip_hash: Option<&str>,
        user_agent_hash: Option<&str>,
    ) -> Result<i64> {
        self.submit_at(submission, ip_hash, user_agent_hash, Utc::now())
    }

    pub(crate) fn submit_at(
        &self,
        s: &NewSubmission,
        ip_hash: Option<&str>,
        user_agent_hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        fn text(value: &Option<String>) -> Option<&str> {
            non_blank(value.as_deref()).map(str::trim)
        }

        let platform_instructions = if s.platform_instructions.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&s.platform_instructions)?)
        };

        self.conn.execute(
            r"
            INSERT INTO submissions (
                kind, title, base_game, console, author, release_date, version,
                description, features, download_link, patch_format, patch_page_url,
                project_link, base_region, base_revision, base_checksum_crc32,
                base_checksum_md5, base_checksum_sha1, image_url, screenshots,
                dev_stage, online_play, email, notes, platform_instructions,
                submitted_at, status, ip_hash, user_agent_hash
            ) VALUES (
                :kind, :title, :base_game, :console, :author, :release_date, :version,
                :description, :features, :download_link, :patch_format, :patch_page_url,
                :project_link, :base_region, :base_revision, :base_checksum_crc32,
                :base_checksum_md5, :base_checksum_sha1, :image_url, :screenshots,
                :dev_stage, :online_play, :email, :notes, :platform_instructions,
                :submitted_at, 'new', :ip_hash, :user_agent_hash
            )
            ",
            named_params! {
                ":kind": s.kind.as_str(),
                ":title": s.title.trim(),
                ":base_game": text(&s.base_game),
                ":console": encode_consoles(&s.consoles),
                ":author": text(&s.author),
                ":release_date": text(&s.release_date),
                ":version": text(&s.version),
                ":description": text(&s.description),
                ":features": encode_list(&s.features)?,
                ":download_link": text(&s.download_link),
                ":patch_format": text(&s.patch_format),
                ":patch_page_url": text(&s.patch_page_url),
                ":project_link": text(&s.project_link),
                ":base_region": text(&s.base_region),
                ":base_revision": text(&s.base_revision),
                ":base_checksum_crc32": text(&s.base_checksum_crc32),
                ":base_checksum_md5": text(&s.base_checksum_md5),
                ":base_checksum_sha1": text(&s.base_checksum_sha1),
                ":image_url": text(&s.image_url),
                ":screenshots": encode_list(&s.screenshots)?,
                ":dev_stage": text(&s.dev_stage),
                ":online_play": s.online_play,
                ":email": text(&s.email),
                ":notes": text(&s.notes),
                ":platform_instructions": platform_instructions,
                ":submitted_at": format_timestamp(now),
                ":ip_hash": ip_hash,
                ":user_agent_hash": user_agent_hash,
            },
        )?;

        let id = self.conn.last_insert_rowid();
        info!("Received {} submission {}: {}", s.kind, id, s.title.trim());
        Ok(id)
    }

    /// Get a submission by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_submission(&self, id: i64) -> Result<Option<Submission>> {
        let submission = self
            .conn
            .query_row(
                "SELECT * FROM submissions WHERE id = ?1",
                [id],
                Self::row_to_submission,
            )
            .optional()?;
        Ok(submission)
    }

    /// List submissions, newest first, optionally filtered by status.
    ///
    /// Rows without a status count as `new`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_submissions(&self, status: Option<SubmissionStatus>) -> Result<Vec<Submission>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT * FROM submissions
            WHERE (?1 IS NULL OR COALESCE(NULLIF(status, ''), 'new') = ?1)
            ORDER BY submitted_at DESC, id DESC
            ",
        )?;
        let submissions = stmt
            .query_map([status.map(SubmissionStatus::as_str)], Self::row_to_submission)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(submissions)
    }

    /// Count submissions per status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn submission_counts(&self) -> Result<SubmissionCounts> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT COALESCE(NULLIF(status, ''), 'new') AS s, COUNT(*)
            FROM submissions GROUP BY s
            ",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut counts = SubmissionCounts::default();
        for (status, count) in rows {
            match status.parse() {
                Ok(SubmissionStatus::New) => counts.new += count,
                Ok(SubmissionStatus::Approved) => counts.approved += count,
                Ok(SubmissionStatus::Rejected) => counts.rejected += count,
                Err(_) => warn!("Ignoring {} submissions with status {}", count, status),
            }
        }
        Ok(counts)
    }

    /// Set the status of a submission.
    ///
    /// Notes are replaced when given and kept otherwise. Returns `false` if
    /// no submission has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_submission_status(
        &self,
        id: i64,
        status: SubmissionStatus,
        admin_notes: Option<&str>,
    ) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE submissions SET status = ?1, admin_notes = COALESCE(?2, admin_notes) WHERE id = ?3",
            params![status.as_str(), admin_notes, id],
        )?;
        if affected > 0 {
            info!("Submission {} is now {}", id, status);
        }
        Ok(affected > 0)
    }

    /// Mark a submission approved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn approve_submission(&self, id: i64) -> Result<bool> {
        self.update_submission_status(id, SubmissionStatus::Approved, None)
    }

    /// Mark a submission rejected with an optional reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn reject_submission(&self, id: i64, reason: Option<&str>) -> Result<bool> {
        self.update_submission_status(id, SubmissionStatus::Rejected, reason)
    }

    /// Copy an approved submission into the catalog.
    ///
    /// The entry id is derived from the title and made unique with a numeric
    /// suffix. Publishing again returns the entry created the first time,
    /// unless that entry has since been deleted. Returns the entry id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown submission,
    /// [`Error::BadRequest`] if it is not approved, or a database error.
    pub fn publish_submission(&self, id: i64) -> Result<String> {
        let tx = self.conn.unchecked_transaction()?;
        let entry_id = self.publish_within(id)?;
        tx.commit()?;
        Ok(entry_id)
    }

    /// Approve a submission and publish it in one transaction.
    ///
    /// Nothing changes if publishing fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown submission or a database
    /// error.
    pub fn approve_and_publish(&self, id: i64) -> Result<String> {
        let tx = self.conn.unchecked_transaction()?;
        if !self.approve_submission(id)? {
            return Err(Error::not_found("submission", id.to_string()));
        }
        let entry_id = self.publish_within(id)?;
        tx.commit()?;
        Ok(entry_id)
    }

    /// Publish inside a transaction the caller owns.
    fn publish_within(&self, id: i64) -> Result<String> {
        let submission = self
            .get_submission(id)?
            .ok_or_else(|| Error::not_found("submission", id.to_string()))?;
        if submission.status != SubmissionStatus::Approved {
            return Err(Error::bad_request(format!(
                "submission {id} is {}, only approved submissions can be published",
                submission.status
            )));
        }

        if let Some(existing) = submission.published_entry_id.as_deref() {
            if self.entry_exists(existing)? {
                info!("Submission {} was already published as {}", id, existing);
                return Ok(existing.to_string());
            }
        }

        let entry_id = self.unique_entry_id(&slugify(&submission.data.title))?;
        let entry = entry_from_submission(&entry_id, &submission);
        self.insert_entry(&entry)?;
        self.conn.execute(
            "UPDATE submissions SET published_entry_id = ?1 WHERE id = ?2",
            params![entry_id, id],
        )?;

        info!("Published submission {} as {}", id, entry_id);
        Ok(entry_id)
    }

    fn unique_entry_id(&self, base: &str) -> Result<String> {
        if !self.entry_exists(base)? {
            return Ok(base.to_string());
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.entry_exists(&candidate)? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Delete a submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_submission(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM submissions WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    fn row_to_submission(row: &rusqlite::Row) -> rusqlite::Result<Submission> {
        let status: Option<String> = row.get("status")?;
        let status = status
            .as_deref()
            .unwrap_or_default()
            .parse()
            .unwrap_or_else(|_| {
                warn!("Unknown submission status: {:?}, treating as new", status);
                SubmissionStatus::New
            });
        let kind: String = row.get("kind")?;
        let console: Option<String> = row.get("console")?;
        let features: Option<String> = row.get("features")?;
        let screenshots: Option<String> = row.get("screenshots")?;
        let instructions: Option<String> = row.get("platform_instructions")?;
        let submitted_at: Option<String> = row.get("submitted_at")?;

        Ok(Submission {
            id: row.get("id")?,
            status,
            admin_notes: row.get("admin_notes")?,
            submitted_at: submitted_at.as_deref().and_then(parse_timestamp),
            ip_hash: row.get("ip_hash")?,
            user_agent_hash: row.get("user_agent_hash")?,
            published_entry_id: row.get("published_entry_id")?,
            data: NewSubmission {
                kind: kind.parse().unwrap_or_default(),
                title: row.get("title")?,
                base_game: row.get("base_game")?,
                consoles: normalize_consoles(console.as_deref().unwrap_or_default()),
                author: row.get("author")?,
                release_date: row.get("release_date")?,
                version: row.get("version")?,
                description: row.get("description")?,
                features: decode_list(features.as_deref()),
                download_link: row.get("download_link")?,
                patch_format: row.get("patch_format")?,
                patch_page_url: row.get("patch_page_url")?,
                project_link: row.get("project_link")?,
                base_region: row.get("base_region")?,
                base_revision: row.get("base_revision")?,
                base_checksum_crc32: row.get("base_checksum_crc32")?,
                base_checksum_md5: row.get("base_checksum_md5")?,
                base_checksum_sha1: row.get("base_checksum_sha1")?,
                image_url: row.get("image_url")?,
                screenshots: decode_list(screenshots.as_deref()),
                dev_stage: row.get("dev_stage")?,
                online_play: row.get("online_play")?,
                email: row.get("email")?,
                notes: row.get("notes")?,
                platform_instructions: non_blank(instructions.as_deref())
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_default(),
            },
        })
    }
}

/// Build the catalog entry for a published submission.
fn entry_from_submission(id: &str, submission: &Submission) -> Entry {
    let s = &submission.data;
    let mut entry = Entry::new(id, s.kind, s.title.trim());

    entry.consoles.clone_from(&s.consoles);
    entry.version.clone_from(&s.version);
    entry.release_date.clone_from(&s.release_date);
    entry.author.clone_from(&s.author);
    entry.description.clone_from(&s.description);
    entry.features.clone_from(&s.features);
    entry.image_url.clone_from(&s.image_url);
    entry.screenshots.clone_from(&s.screenshots);
    entry.download_link = [&s.download_link, &s.patch_page_url, &s.project_link]
        .into_iter()
        .find_map(|link| non_blank(link.as_deref()).map(str::to_string));
    entry.base_game.clone_from(&s.base_game);
    entry.base_rom.region.clone_from(&s.base_region);
    entry.base_rom.revision.clone_from(&s.base_revision);
    entry.base_rom.checksum_crc32.clone_from(&s.base_checksum_crc32);
    entry.base_rom.checksum_md5.clone_from(&s.base_checksum_md5);
    entry.base_rom.checksum_sha1.clone_from(&s.base_checksum_sha1);
    entry.patch_format.clone_from(&s.patch_format);
    entry.dev_stage.clone_from(&s.dev_stage);
    entry.online_play = s.online_play;
    entry.instruction = !s.platform_instructions.is_empty();
    entry.platform_instructions.clone_from(&s.platform_instructions);
    entry.created_at = Some(Utc::now());
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntryKind, Platform};
    use chrono::{Duration, TimeZone};

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn submission(title: &str) -> NewSubmission {
        NewSubmission {
            title: title.to_string(),
            consoles: vec!["gba".to_string()],
            ..NewSubmission::default()
        }
    }

    #[test]
    fn test_submit_and_get() {
        let storage = create_test_storage();
        let mut new = submission("Pokemon Unbound");
        new.features = vec!["Open world".to_string()];
        new.platform_instructions
            .insert(Platform::Android, "Use a GBA emulator".to_string());

        let id = storage.submit(&new, Some("iphash"), Some("uahash")).unwrap();
        let stored = storage.get_submission(id).unwrap().unwrap();

        assert_eq!(stored.status, SubmissionStatus::New);
        assert_eq!(stored.ip_hash.as_deref(), Some("iphash"));
        assert_eq!(stored.user_agent_hash.as_deref(), Some("uahash"));
        assert_eq!(stored.data.title, "Pokemon Unbound");
        assert_eq!(stored.data.consoles, vec!["gba"]);
        assert_eq!(stored.data.features, vec!["Open world"]);
        assert_eq!(stored.data.platform_instructions.len(), 1);
        assert!(stored.submitted_at.is_some());
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        assert!(storage.get_submission(42).unwrap().is_none());
    }

    #[test]
    fn test_list_newest_first_and_filter() {
        let storage = create_test_storage();
        let t0 = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let first = storage
            .submit_at(&submission("First"), None, None, t0)
            .unwrap();
        let second = storage
            .submit_at(&submission("Second"), None, None, t0 + Duration::hours(1))
            .unwrap();
        storage.approve_submission(first).unwrap();

        let all = storage.list_submissions(None).unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second, first]);

        let new = storage.list_submissions(Some(SubmissionStatus::New)).unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].id, second);

        let approved = storage
            .list_submissions(Some(SubmissionStatus::Approved))
            .unwrap();
        assert_eq!(approved[0].id, first);
    }

    #[test]
    fn test_null_status_counts_as_new() {
        let storage = create_test_storage();
        let id = storage.submit(&submission("Legacy"), None, None).unwrap();
        storage
            .conn
            .execute("UPDATE submissions SET status = NULL WHERE id = ?1", [id])
            .unwrap();

        let listed = storage.list_submissions(Some(SubmissionStatus::New)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, SubmissionStatus::New);
        assert_eq!(storage.submission_counts().unwrap().new, 1);
    }

    #[test]
    fn test_counts() {
        let storage = create_test_storage();
        let a = storage.submit(&submission("A"), None, None).unwrap();
        let b = storage.submit(&submission("B"), None, None).unwrap();
        storage.submit(&submission("C"), None, None).unwrap();
        storage.approve_submission(a).unwrap();
        storage.reject_submission(b, Some("duplicate")).unwrap();

        let counts = storage.submission_counts().unwrap();
        assert_eq!(
            counts,
            SubmissionCounts {
                new: 1,
                approved: 1,
                rejected: 1
            }
        );
    }

    #[test]
    fn test_reject_keeps_reason_and_unknown_id() {
        let storage = create_test_storage();
        let id = storage.submit(&submission("Dupe"), None, None).unwrap();

        assert!(storage.reject_submission(id, Some("already listed")).unwrap());
        // A later status change without notes keeps the reason
        assert!(storage
            .update_submission_status(id, SubmissionStatus::Rejected, None)
            .unwrap());
        let stored = storage.get_submission(id).unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::Rejected);
        assert_eq!(stored.admin_notes.as_deref(), Some("already listed"));

        assert!(!storage.approve_submission(999).unwrap());
    }

    #[test]
    fn test_publish_requires_approval() {
        let storage = create_test_storage();
        let id = storage.submit(&submission("Pending"), None, None).unwrap();

        let err = storage.publish_submission(id).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let err = storage.publish_submission(999).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_publish_creates_entry() {
        let storage = create_test_storage();
        let mut new = submission("Ship of Harkinian");
        new.kind = EntryKind::Port;
        new.consoles = vec!["pc".to_string()];
        new.base_game = Some("The Legend of Zelda: Ocarina of Time".to_string());
        new.patch_page_url = Some("https://example.com/soh".to_string());
        new.platform_instructions
            .insert(Platform::Pc, "Supply your own ROM".to_string());

        let id = storage.submit(&new, None, None).unwrap();
        storage.approve_submission(id).unwrap();
        let entry_id = storage.publish_submission(id).unwrap();
        assert_eq!(entry_id, "ship_of_harkinian");

        let entry = storage.get_entry(&entry_id).unwrap().unwrap();
        assert_eq!(entry.kind, EntryKind::Port);
        assert_eq!(entry.download_link.as_deref(), Some("https://example.com/soh"));
        assert!(entry.instruction);
        assert_eq!(entry.game_series.as_deref(), Some("Zelda"));
    }

    #[test]
    fn test_publish_makes_ids_unique() {
        let storage = create_test_storage();
        storage
            .insert_entry(&Entry::new("hack", EntryKind::Romhack, "Hack"))
            .unwrap();

        let mut published = Vec::new();
        for _ in 0..2 {
            let id = storage.submit(&submission("Hack"), None, None).unwrap();
            storage.approve_submission(id).unwrap();
            published.push(storage.publish_submission(id).unwrap());
        }
        assert_eq!(published, vec!["hack_2", "hack_3"]);
    }

    #[test]
    fn test_publish_twice_keeps_one_entry() {
        let storage = create_test_storage();
        let id = storage.submit(&submission("Dup Hack"), None, None).unwrap();

        let first = storage.approve_and_publish(id).unwrap();
        let second = storage.approve_and_publish(id).unwrap();
        assert_eq!(first, "dup_hack");
        assert_eq!(second, first);
        assert_eq!(storage.publish_submission(id).unwrap(), first);

        let stored = storage.get_submission(id).unwrap().unwrap();
        assert_eq!(stored.published_entry_id.as_deref(), Some("dup_hack"));
        let count: i64 = storage
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_republish_after_entry_deleted() {
        let storage = create_test_storage();
        let id = storage.submit(&submission("Comeback"), None, None).unwrap();
        let first = storage.approve_and_publish(id).unwrap();
        assert!(storage.delete_entry(&first).unwrap());

        let again = storage.publish_submission(id).unwrap();
        assert_eq!(again, "comeback");
        assert!(storage.get_entry(&again).unwrap().is_some());
    }

    #[test]
    fn test_failed_publish_rolls_back_approval() {
        let storage = create_test_storage();
        let id = storage.submit(&submission("Fragile"), None, None).unwrap();
        storage
            .conn
            .execute_batch(
                "CREATE TRIGGER no_entries BEFORE INSERT ON entries
                 BEGIN SELECT RAISE(ABORT, 'catalog is read-only'); END;",
            )
            .unwrap();

        assert!(storage.approve_and_publish(id).is_err());
        let stored = storage.get_submission(id).unwrap().unwrap();
        assert_eq!(stored.status, SubmissionStatus::New);
        assert!(stored.published_entry_id.is_none());
    }

    #[test]
    fn test_approve_and_publish_unknown() {
        let storage = create_test_storage();
        assert!(storage.approve_and_publish(404).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_submission() {
        let storage = create_test_storage();
        let id = storage.submit(&submission("Gone"), None, None).unwrap();
        assert!(storage.delete_submission(id).unwrap());
        assert!(!storage.delete_submission(id).unwrap());
    }
}
