//! Catalog entry persistence.

use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{named_params, params, params_from_iter, OptionalExtension};
use tracing::{debug, info, warn};

use super::{
    decode_list, encode_list, format_timestamp, non_blank, parse_timestamp, Storage,
};
use crate::catalog::{
    detect_series, encode_consoles, normalize_console_list, normalize_consoles, BaseRom, Entry,
    EntryKind, EntryPatch, Platform, SupportLinks,
};
use crate::error::Result;

const INSERT_ENTRY: &str = r"
INSERT OR REPLACE INTO entries (
    id, kind, title, console, version, release_date, author, description,
    features, image_url, screenshots, download_link, base_game, version_region,
    original_platform, base_region, base_revision, base_header,
    base_checksum_crc32, base_checksum_md5, base_checksum_sha1, patch_format,
    patch_output_ext, dev_stage, popular, online_play, instruction,
    instruction_text, platform_instructions, social_links, support_forum_url,
    discord_url, reddit_url, troubleshooting_url, rom_checker_url, wiki_url,
    game_series, mod_links, mod_instructions, created_at
) VALUES (
    :id, :kind, :title, :console, :version, :release_date, :author, :description,
    :features, :image_url, :screenshots, :download_link, :base_game, :version_region,
    :original_platform, :base_region, :base_revision, :base_header,
    :base_checksum_crc32, :base_checksum_md5, :base_checksum_sha1, :patch_format,
    :patch_output_ext, :dev_stage, :popular, :online_play, :instruction,
    :instruction_text, :platform_instructions, :social_links, :support_forum_url,
    :discord_url, :reddit_url, :troubleshooting_url, :rom_checker_url, :wiki_url,
    :game_series, :mod_links, :mod_instructions, :created_at
)
";

/// Seed import: refresh the listing fields but keep optional details that the
/// incoming record leaves out.
const UPSERT_ENTRY: &str = r"
INSERT INTO entries (
    id, kind, title, console, version, release_date, author, description,
    features, image_url, screenshots, download_link, base_game, version_region,
    original_platform, base_region, base_revision, base_header,
    base_checksum_crc32, base_checksum_md5, base_checksum_sha1, patch_format,
    patch_output_ext, dev_stage, popular, online_play, instruction,
    instruction_text, platform_instructions, social_links, support_forum_url,
    discord_url, reddit_url, troubleshooting_url, rom_checker_url, wiki_url,
    game_series, mod_links, mod_instructions, created_at
) VALUES (
    :id, :kind, :title, :console, :version, :release_date, :author, :description,
    :features, :image_url, :screenshots, :download_link, :base_game, :version_region,
    :original_platform, :base_region, :base_revision, :base_header,
    :base_checksum_crc32, :base_checksum_md5, :base_checksum_sha1, :patch_format,
    :patch_output_ext, :dev_stage, :popular, :online_play, :instruction,
    :instruction_text, :platform_instructions, :social_links, :support_forum_url,
    :discord_url, :reddit_url, :troubleshooting_url, :rom_checker_url, :wiki_url,
    :game_series, :mod_links, :mod_instructions, :created_at
)
ON CONFLICT(id) DO UPDATE SET
    kind = excluded.kind,
    title = excluded.title,
    console = excluded.console,
    version = excluded.version,
    release_date = excluded.release_date,
    author = excluded.author,
    description = excluded.description,
    features = excluded.features,
    image_url = excluded.image_url,
    screenshots = excluded.screenshots,
    download_link = excluded.download_link,
    base_game = excluded.base_game,
    version_region = excluded.version_region,
    original_platform = COALESCE(excluded.original_platform, entries.original_platform),
    popular = excluded.popular,
    online_play = excluded.online_play,
    instruction = MAX(excluded.instruction, entries.instruction),
    instruction_text = COALESCE(excluded.instruction_text, entries.instruction_text),
    base_region = COALESCE(excluded.base_region, entries.base_region),
    base_revision = COALESCE(excluded.base_revision, entries.base_revision),
    base_header = COALESCE(excluded.base_header, entries.base_header),
    base_checksum_crc32 = COALESCE(excluded.base_checksum_crc32, entries.base_checksum_crc32),
    base_checksum_md5 = COALESCE(excluded.base_checksum_md5, entries.base_checksum_md5),
    base_checksum_sha1 = COALESCE(excluded.base_checksum_sha1, entries.base_checksum_sha1),
    patch_format = COALESCE(excluded.patch_format, entries.patch_format),
    patch_output_ext = COALESCE(excluded.patch_output_ext, entries.patch_output_ext),
    dev_stage = COALESCE(excluded.dev_stage, entries.dev_stage),
    platform_instructions = COALESCE(excluded.platform_instructions, entries.platform_instructions),
    social_links = COALESCE(excluded.social_links, entries.social_links),
    support_forum_url = COALESCE(excluded.support_forum_url, entries.support_forum_url),
    discord_url = COALESCE(excluded.discord_url, entries.discord_url),
    reddit_url = COALESCE(excluded.reddit_url, entries.reddit_url),
    troubleshooting_url = COALESCE(excluded.troubleshooting_url, entries.troubleshooting_url),
    rom_checker_url = COALESCE(excluded.rom_checker_url, entries.rom_checker_url),
    wiki_url = COALESCE(excluded.wiki_url, entries.wiki_url),
    game_series = COALESCE(entries.game_series, excluded.game_series),
    mod_links = COALESCE(excluded.mod_links, entries.mod_links),
    mod_instructions = COALESCE(excluded.mod_instructions, entries.mod_instructions)
";

impl Storage {
    /// Insert an entry, replacing any entry with the same id.
    ///
    /// The series is detected from the base game or title when not given.
    /// Returns the entry id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_entry(&self, entry: &Entry) -> Result<String> {
        self.write_entry(INSERT_ENTRY, entry)?;
        debug!("Inserted {} entry {}", entry.kind, entry.id);
        Ok(entry.id.clone())
    }

    /// Insert an entry or refresh an existing one from seed data.
    ///
    /// Optional base ROM, patch, instruction and link columns keep their
    /// stored value when the incoming entry leaves them empty. A stored
    /// series is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn upsert_entry(&self, entry: &Entry) -> Result<()> {
        self.write_entry(UPSERT_ENTRY, entry)?;
        debug!("Upserted {} entry {}", entry.kind, entry.id);
        Ok(())
    }

    fn write_entry(&self, sql: &str, entry: &Entry) -> Result<usize> {
        let console = encode_consoles(&normalize_console_list(&entry.consoles));
        let features = encode_list(&entry.features)?;
        let screenshots = encode_list(&entry.screenshots)?;
        let platform_instructions = encode_instructions(&entry.platform_instructions)?;
        let mod_links = if entry.mod_links.is_empty() {
            None
        } else {
            Some(encode_list(&entry.mod_links)?)
        };
        let game_series = entry.effective_series();
        let created_at = format_timestamp(entry.created_at.unwrap_or_else(Utc::now));
        let text = |value: &Option<String>| non_blank(value.as_deref()).map(str::to_string);

        let affected = self.conn.execute(
            sql,
            named_params! {
                ":id": entry.id,
                ":kind": entry.kind.as_str(),
                ":title": entry.title,
                ":console": console,
                ":version": text(&entry.version),
                ":release_date": text(&entry.release_date),
                ":author": text(&entry.author),
                ":description": text(&entry.description),
                ":features": features,
                ":image_url": text(&entry.image_url),
                ":screenshots": screenshots,
                ":download_link": text(&entry.download_link),
                ":base_game": text(&entry.base_game),
                ":version_region": text(&entry.version_region),
                ":original_platform": text(&entry.original_platform),
                ":base_region": text(&entry.base_rom.region),
                ":base_revision": text(&entry.base_rom.revision),
                ":base_header": text(&entry.base_rom.header),
                ":base_checksum_crc32": text(&entry.base_rom.checksum_crc32),
                ":base_checksum_md5": text(&entry.base_rom.checksum_md5),
                ":base_checksum_sha1": text(&entry.base_rom.checksum_sha1),
                ":patch_format": text(&entry.patch_format),
                ":patch_output_ext": text(&entry.patch_output_ext),
                ":dev_stage": text(&entry.dev_stage),
                ":popular": entry.popular,
                ":online_play": entry.online_play,
                ":instruction": entry.instruction,
                ":instruction_text": text(&entry.instruction_text),
                ":platform_instructions": platform_instructions,
                ":social_links": text(&entry.social_links),
                ":support_forum_url": text(&entry.links.support_forum_url),
                ":discord_url": text(&entry.links.discord_url),
                ":reddit_url": text(&entry.links.reddit_url),
                ":troubleshooting_url": text(&entry.links.troubleshooting_url),
                ":rom_checker_url": text(&entry.links.rom_checker_url),
                ":wiki_url": text(&entry.links.wiki_url),
                ":game_series": game_series,
                ":mod_links": mod_links,
                ":mod_instructions": text(&entry.mod_instructions),
                ":created_at": created_at,
            },
        )?;
        Ok(affected)
    }

    /// Check whether an entry with this id exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn entry_exists(&self, id: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Get an entry by id, whatever its kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_entry(&self, id: &str) -> Result<Option<Entry>> {
        let entry = self
            .conn
            .query_row("SELECT * FROM entries WHERE id = ?1", [id], Self::row_to_entry)
            .optional()?;
        Ok(entry)
    }

    /// List entries, optionally of one kind, ordered by title.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_entries(&self, kind: Option<EntryKind>) -> Result<Vec<Entry>> {
        self.query_entries(
            r"
            SELECT * FROM entries WHERE (?1 IS NULL OR kind = ?1)
            ORDER BY title COLLATE NOCASE, id
            ",
            kind,
        )
    }

    /// List entries flagged as popular, optionally of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn popular_entries(&self, kind: Option<EntryKind>) -> Result<Vec<Entry>> {
        self.query_entries(
            r"
            SELECT * FROM entries WHERE popular = 1 AND (?1 IS NULL OR kind = ?1)
            ORDER BY title COLLATE NOCASE, id
            ",
            kind,
        )
    }

    fn query_entries(&self, sql: &str, kind: Option<EntryKind>) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map([kind.map(EntryKind::as_str)], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Apply a partial update to an entry.
    ///
    /// Returns `false` if the patch is empty or no entry has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<bool> {
        let assignments = patch_assignments(patch)?;
        if assignments.is_empty() {
            return Ok(false);
        }

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE entries SET {set_clause} WHERE id = ?{}",
            assignments.len() + 1
        );

        let values = assignments
            .into_iter()
            .map(|(_, value)| value)
            .chain(std::iter::once(Value::Text(id.to_string())));
        let affected = self.conn.execute(&sql, params_from_iter(values))?;

        if affected > 0 {
            info!("Updated entry {}", id);
        }
        Ok(affected > 0)
    }

    /// Delete an entry by id.
    ///
    /// Download history for the entry is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_entry(&self, id: &str) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM entries WHERE id = ?1", [id])?;
        if affected > 0 {
            info!("Deleted entry {}", id);
        }
        Ok(affected > 0)
    }

    /// Set or clear the instructions for one platform.
    ///
    /// Blank text removes the platform. Returns `false` if no entry has this id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_platform_instructions(
        &self,
        id: &str,
        platform: Platform,
        text: &str,
    ) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;

        let current: Option<Option<String>> = tx
            .query_row(
                "SELECT platform_instructions FROM entries WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(false);
        };

        let mut instructions = decode_instructions(id, current.as_deref());
        if text.trim().is_empty() {
            instructions.remove(&platform);
        } else {
            instructions.insert(platform, text.trim().to_string());
        }

        tx.execute(
            "UPDATE entries SET platform_instructions = ?1 WHERE id = ?2",
            params![encode_instructions(&instructions)?, id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Fill in the series of every entry that has none and can be detected.
    ///
    /// Returns the number of entries updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn populate_series(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT id, base_game, title FROM entries WHERE game_series IS NULL OR TRIM(game_series) = ''",
        )?;
        let missing = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        for (id, base_game, title) in missing {
            if let Some(series) = detect_series(base_game.as_deref(), &title) {
                updated += tx.execute(
                    "UPDATE entries SET game_series = ?1 WHERE id = ?2",
                    params![series, id],
                )?;
            }
        }
        tx.commit()?;

        if updated > 0 {
            info!("Detected series for {} entries", updated);
        }
        Ok(updated)
    }

    /// Convert a database row to an Entry.
    pub(super) fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
        let id: String = row.get("id")?;
        let kind_str: String = row.get("kind")?;
        let kind = kind_str.parse().unwrap_or_else(|_| {
            warn!("Unknown entry kind: {}, defaulting to romhack", kind_str);
            EntryKind::Romhack
        });
        let console: Option<String> = row.get("console")?;
        let features: Option<String> = row.get("features")?;
        let screenshots: Option<String> = row.get("screenshots")?;
        let mod_links: Option<String> = row.get("mod_links")?;
        let instructions: Option<String> = row.get("platform_instructions")?;
        let created_at: Option<String> = row.get("created_at")?;

        Ok(Entry {
            kind,
            title: row.get("title")?,
            consoles: normalize_consoles(console.as_deref().unwrap_or_default()),
            version: row.get("version")?,
            release_date: row.get("release_date")?,
            author: row.get("author")?,
            description: row.get("description")?,
            features: decode_list(features.as_deref()),
            image_url: row.get("image_url")?,
            screenshots: decode_list(screenshots.as_deref()),
            download_link: row.get("download_link")?,
            base_game: row.get("base_game")?,
            version_region: row.get("version_region")?,
            original_platform: row.get("original_platform")?,
            base_rom: BaseRom {
                region: row.get("base_region")?,
                revision: row.get("base_revision")?,
                header: row.get("base_header")?,
                checksum_crc32: row.get("base_checksum_crc32")?,
                checksum_md5: row.get("base_checksum_md5")?,
                checksum_sha1: row.get("base_checksum_sha1")?,
            },
            patch_format: row.get("patch_format")?,
            patch_output_ext: row.get("patch_output_ext")?,
            dev_stage: row.get("dev_stage")?,
            popular: row.get("popular")?,
            online_play: row.get("online_play")?,
            instruction: row.get("instruction")?,
            instruction_text: row.get("instruction_text")?,
            platform_instructions: decode_instructions(&id, instructions.as_deref()),
            links: SupportLinks {
                support_forum_url: row.get("support_forum_url")?,
                discord_url: row.get("discord_url")?,
                reddit_url: row.get("reddit_url")?,
                troubleshooting_url: row.get("troubleshooting_url")?,
                rom_checker_url: row.get("rom_checker_url")?,
                wiki_url: row.get("wiki_url")?,
            },
            social_links: row.get("social_links")?,
            game_series: row.get("game_series")?,
            mod_links: decode_list(mod_links.as_deref()),
            mod_instructions: row.get("mod_instructions")?,
            created_at: created_at.as_deref().and_then(parse_timestamp),
            id,
        })
    }
}

/// Encode per-platform instructions; an empty map is stored as NULL.
fn encode_instructions(instructions: &BTreeMap<Platform, String>) -> Result<Option<String>> {
    if instructions.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(instructions)?))
    }
}

fn decode_instructions(id: &str, raw: Option<&str>) -> BTreeMap<Platform, String> {
    let Some(raw) = non_blank(raw) else {
        return BTreeMap::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Ignoring unreadable platform instructions on {}: {}", id, e);
        BTreeMap::new()
    })
}

/// Column assignments for a patch, in a stable order.
fn patch_assignments(patch: &EntryPatch) -> Result<Vec<(&'static str, Value)>> {
    fn text(value: &str) -> Value {
        if value.trim().is_empty() {
            Value::Null
        } else {
            Value::Text(value.to_string())
        }
    }

    let mut out: Vec<(&'static str, Value)> = Vec::new();

    if let Some(title) = &patch.title {
        out.push(("title", Value::Text(title.trim().to_string())));
    }
    if let Some(consoles) = &patch.consoles {
        out.push((
            "console",
            Value::Text(encode_consoles(&normalize_console_list(consoles))),
        ));
    }
    if let Some(features) = &patch.features {
        out.push(("features", Value::Text(encode_list(features)?)));
    }
    if let Some(screenshots) = &patch.screenshots {
        out.push(("screenshots", Value::Text(encode_list(screenshots)?)));
    }
    if let Some(mod_links) = &patch.mod_links {
        let value = if mod_links.is_empty() {
            Value::Null
        } else {
            Value::Text(encode_list(mod_links)?)
        };
        out.push(("mod_links", value));
    }

    for (column, value) in [
        ("popular", patch.popular),
        ("online_play", patch.online_play),
        ("instruction", patch.instruction),
    ] {
        if let Some(flag) = value {
            out.push((column, Value::Integer(i64::from(flag))));
        }
    }

    let text_fields = [
        ("version", &patch.version),
        ("release_date", &patch.release_date),
        ("author", &patch.author),
        ("description", &patch.description),
        ("image_url", &patch.image_url),
        ("download_link", &patch.download_link),
        ("base_game", &patch.base_game),
        ("version_region", &patch.version_region),
        ("original_platform", &patch.original_platform),
        ("base_region", &patch.base_region),
        ("base_revision", &patch.base_revision),
        ("base_header", &patch.base_header),
        ("base_checksum_crc32", &patch.base_checksum_crc32),
        ("base_checksum_md5", &patch.base_checksum_md5),
        ("base_checksum_sha1", &patch.base_checksum_sha1),
        ("patch_format", &patch.patch_format),
        ("patch_output_ext", &patch.patch_output_ext),
        ("dev_stage", &patch.dev_stage),
        ("instruction_text", &patch.instruction_text),
        ("social_links", &patch.social_links),
        ("support_forum_url", &patch.support_forum_url),
        ("discord_url", &patch.discord_url),
        ("reddit_url", &patch.reddit_url),
        ("troubleshooting_url", &patch.troubleshooting_url),
        ("rom_checker_url", &patch.rom_checker_url),
        ("wiki_url", &patch.wiki_url),
        ("game_series", &patch.game_series),
        ("mod_instructions", &patch.mod_instructions),
    ];
    for (column, value) in text_fields {
        if let Some(value) = value {
            out.push((column, text(value)));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn romhack(id: &str, title: &str) -> Entry {
        let mut entry = Entry::new(id, EntryKind::Romhack, title);
        entry.consoles = vec!["gba".to_string()];
        entry
    }

    fn port(id: &str, title: &str) -> Entry {
        let mut entry = Entry::new(id, EntryKind::Port, title);
        entry.consoles = vec!["pc".to_string(), "android".to_string()];
        entry
    }

    #[test]
    fn test_insert_and_get() {
        let storage = create_test_storage();
        let mut entry = romhack("unbound", "Pokemon Unbound");
        entry.features = vec!["Physical/Special split".to_string()];
        entry.base_rom.checksum_crc32 = Some("DD88761C".to_string());
        entry.created_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());

        let id = storage.insert_entry(&entry).unwrap();
        assert_eq!(id, "unbound");

        let stored = storage.get_entry("unbound").unwrap().unwrap();
        assert_eq!(stored.title, "Pokemon Unbound");
        assert_eq!(stored.consoles, vec!["gba"]);
        assert_eq!(stored.features, entry.features);
        assert_eq!(stored.base_rom.checksum_crc32.as_deref(), Some("DD88761C"));
        assert_eq!(stored.game_series.as_deref(), Some("Pokemon"));
        assert_eq!(stored.created_at, entry.created_at);
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        assert!(storage.get_entry("missing").unwrap().is_none());
        assert!(!storage.entry_exists("missing").unwrap());
    }

    #[test]
    fn test_multiple_consoles_round_trip() {
        let storage = create_test_storage();
        storage.insert_entry(&port("soh", "Ship of Harkinian")).unwrap();

        let stored = storage.get_entry("soh").unwrap().unwrap();
        assert_eq!(stored.kind, EntryKind::Port);
        assert_eq!(stored.consoles, vec!["pc", "android"]);
    }

    #[test]
    fn test_list_entries_by_kind() {
        let storage = create_test_storage();
        storage.insert_entry(&romhack("b", "Beta Hack")).unwrap();
        storage.insert_entry(&romhack("a", "alpha hack")).unwrap();
        storage.insert_entry(&port("p", "Some Port")).unwrap();

        let hacks = storage.list_entries(Some(EntryKind::Romhack)).unwrap();
        let ids: Vec<_> = hacks.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert_eq!(storage.list_entries(Some(EntryKind::Port)).unwrap().len(), 1);
        assert_eq!(storage.list_entries(None).unwrap().len(), 3);
    }

    #[test]
    fn test_popular_entries() {
        let storage = create_test_storage();
        let mut popular = romhack("pop", "Popular Hack");
        popular.popular = true;
        storage.insert_entry(&popular).unwrap();
        storage.insert_entry(&romhack("meh", "Other Hack")).unwrap();

        let entries = storage.popular_entries(Some(EntryKind::Romhack)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "pop");
        assert!(storage.popular_entries(Some(EntryKind::Port)).unwrap().is_empty());
    }

    #[test]
    fn test_insert_replaces() {
        let storage = create_test_storage();
        storage.insert_entry(&romhack("x", "Old")).unwrap();
        storage.insert_entry(&romhack("x", "New")).unwrap();

        assert_eq!(storage.list_entries(None).unwrap().len(), 1);
        assert_eq!(storage.get_entry("x").unwrap().unwrap().title, "New");
    }

    #[test]
    fn test_upsert_keeps_optional_details() {
        let storage = create_test_storage();
        let mut original = romhack("x", "Hack");
        original.base_rom.checksum_md5 = Some("e26ee0d44e809351c8ce2d73c7400cdd".to_string());
        original.instruction = true;
        original.instruction_text = Some("Apply to a clean ROM".to_string());
        original.game_series = Some("Custom".to_string());
        storage.insert_entry(&original).unwrap();

        let mut refreshed = romhack("x", "Hack v2");
        refreshed.version = Some("2.0".to_string());
        storage.upsert_entry(&refreshed).unwrap();

        let stored = storage.get_entry("x").unwrap().unwrap();
        assert_eq!(stored.title, "Hack v2");
        assert_eq!(stored.version.as_deref(), Some("2.0"));
        assert_eq!(
            stored.base_rom.checksum_md5.as_deref(),
            Some("e26ee0d44e809351c8ce2d73c7400cdd")
        );
        assert!(stored.instruction);
        assert_eq!(stored.instruction_text.as_deref(), Some("Apply to a clean ROM"));
        assert_eq!(stored.game_series.as_deref(), Some("Custom"));
    }

    #[test]
    fn test_upsert_inserts_new() {
        let storage = create_test_storage();
        storage.upsert_entry(&port("new", "Brand New Port")).unwrap();
        assert!(storage.entry_exists("new").unwrap());
    }

    #[test]
    fn test_update_entry() {
        let storage = create_test_storage();
        let mut entry = romhack("x", "Hack");
        entry.author = Some("someone".to_string());
        storage.insert_entry(&entry).unwrap();

        let patch = EntryPatch {
            title: Some("Renamed".to_string()),
            popular: Some(true),
            author: Some(String::new()),
            consoles: Some(vec!["SNES".to_string(), "snes".to_string()]),
            ..EntryPatch::default()
        };
        assert!(storage.update_entry("x", &patch).unwrap());

        let stored = storage.get_entry("x").unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert!(stored.popular);
        assert_eq!(stored.author, None);
        assert_eq!(stored.consoles, vec!["snes"]);
    }

    #[test]
    fn test_update_entry_empty_patch_or_unknown_id() {
        let storage = create_test_storage();
        storage.insert_entry(&romhack("x", "Hack")).unwrap();

        assert!(!storage.update_entry("x", &EntryPatch::default()).unwrap());

        let patch = EntryPatch {
            popular: Some(true),
            ..EntryPatch::default()
        };
        assert!(!storage.update_entry("missing", &patch).unwrap());
    }

    #[test]
    fn test_delete_entry() {
        let storage = create_test_storage();
        storage.insert_entry(&romhack("x", "Hack")).unwrap();

        assert!(storage.delete_entry("x").unwrap());
        assert!(storage.get_entry("x").unwrap().is_none());
        assert!(!storage.delete_entry("x").unwrap());
    }

    #[test]
    fn test_set_platform_instructions() {
        let storage = create_test_storage();
        storage.insert_entry(&port("soh", "Ship of Harkinian")).unwrap();

        assert!(storage
            .set_platform_instructions("soh", Platform::Linux, "chmod +x soh.appimage")
            .unwrap());
        assert!(storage
            .set_platform_instructions("soh", Platform::Pc, "Run soh.exe")
            .unwrap());

        let stored = storage.get_entry("soh").unwrap().unwrap();
        assert_eq!(stored.platform_instructions.len(), 2);
        assert_eq!(
            stored.platform_instructions.get(&Platform::Linux).map(String::as_str),
            Some("chmod +x soh.appimage")
        );

        // Blank text removes the platform
        storage
            .set_platform_instructions("soh", Platform::Pc, "  ")
            .unwrap();
        let stored = storage.get_entry("soh").unwrap().unwrap();
        assert!(!stored.platform_instructions.contains_key(&Platform::Pc));

        assert!(!storage
            .set_platform_instructions("missing", Platform::Pc, "x")
            .unwrap());
    }

    #[test]
    fn test_populate_series() {
        let storage = create_test_storage();
        storage
            .conn
            .execute(
                "INSERT INTO entries (id, kind, title, base_game, created_at) VALUES (?1, 'romhack', ?2, ?3, '2024-01-01 00:00:00')",
                params!["fusion", "Fusion Redux", "Metroid Fusion"],
            )
            .unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO entries (id, kind, title, created_at) VALUES ('ct', 'romhack', 'Chrono Flames', '2024-01-01 00:00:00')",
                [],
            )
            .unwrap();

        assert_eq!(storage.populate_series().unwrap(), 1);
        let stored = storage.get_entry("fusion").unwrap().unwrap();
        assert_eq!(stored.game_series.as_deref(), Some("Metroid"));
        assert!(stored.created_at.is_some());

        // Nothing left to detect
        assert_eq!(storage.populate_series().unwrap(), 0);
    }

    #[test]
    fn test_unreadable_instructions_are_ignored() {
        let storage = create_test_storage();
        storage.insert_entry(&port("p", "Port")).unwrap();
        storage
            .conn
            .execute(
                "UPDATE entries SET platform_instructions = 'not json' WHERE id = 'p'",
                [],
            )
            .unwrap();

        let stored = storage.get_entry("p").unwrap().unwrap();
        assert!(stored.platform_instructions.is_empty());
    }
}
