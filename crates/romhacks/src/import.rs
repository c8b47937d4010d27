//! Importing catalog entries from JSON seed files.
//!
//! A seed file holds one entry object or an array of them. Seed data is
//! written by hand, so the loader is forgiving: consoles may be a string or a
//! list, flags may be numbers or strings, instruction notes go by several
//! names, and per-platform instructions are keyed by any spelling of the
//! platform name.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::catalog::{normalize_console_list, normalize_consoles, slugify, Entry, EntryKind, Platform};
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Other names seed files use for `instruction_text`.
const INSTRUCTION_ALIASES: &[&str] = &["special_instructions", "instructions", "instruction_notes"];

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Entries that did not exist before.
    pub created: Vec<String>,
    /// Entries that were refreshed.
    pub updated: Vec<String>,
}

impl ImportReport {
    /// Number of entries written.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Load entries from a JSON seed file.
///
/// Records without a `kind` get `default_kind`.
///
/// # Errors
///
/// Returns [`Error::Import`] if the file cannot be read, is not JSON, or a
/// record has neither an id nor a title.
pub fn load_entries(path: impl AsRef<Path>, default_kind: EntryKind) -> Result<Vec<Entry>> {
    let path = path.as_ref();
    let import_error = |message: String| Error::Import {
        path: path.to_path_buf(),
        message,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| import_error(e.to_string()))?;
    let value: Value =
        serde_json::from_str(&raw).map_err(|e| import_error(format!("invalid JSON: {e}")))?;

    let entries = parse_entries(value, default_kind).map_err(import_error)?;
    debug!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Parse already decoded seed JSON.
fn parse_entries(value: Value, default_kind: EntryKind) -> std::result::Result<Vec<Entry>, String> {
    let records = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        _ => return Err("expected an object or an array of objects".to_string()),
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| match record {
            Value::Object(map) => {
                parse_record(map, default_kind).map_err(|e| format!("record {index}: {e}"))
            }
            _ => Err(format!("record {index}: expected an object")),
        })
        .collect()
}

fn parse_record(mut map: Map<String, Value>, default_kind: EntryKind) -> std::result::Result<Entry, String> {
    map.retain(|_, value| !value.is_null());

    let kind = match take_str(&mut map, &["kind", "game_type"]) {
        Some(raw) => raw.parse::<EntryKind>().map_err(|e| e.to_string())?,
        None => default_kind,
    };
    map.insert("kind".to_string(), Value::from(kind.as_str()));

    let title = take_str(&mut map, &["title"]);
    let id = take_str(&mut map, &["id"]);
    let (id, title) = match (id, title) {
        (Some(id), Some(title)) => (id, title),
        (None, Some(title)) => (slugify(&title), title),
        (Some(id), None) => (id.clone(), id),
        (None, None) => return Err("an id or a title is required".to_string()),
    };
    map.insert("id".to_string(), Value::from(id));
    map.insert("title".to_string(), Value::from(title));

    let consoles = match map.remove("console").or_else(|| map.remove("consoles")) {
        Some(Value::String(raw)) => normalize_consoles(&raw),
        Some(Value::Array(items)) => normalize_console_list(items.iter().filter_map(Value::as_str)),
        Some(other) => return Err(format!("console must be a string or a list, got {other}")),
        None => Vec::new(),
    };
    map.insert("consoles".to_string(), Value::from(consoles));

    if !map.contains_key("instruction_text") {
        if let Some(text) = take_str(&mut map, INSTRUCTION_ALIASES) {
            map.insert("instruction_text".to_string(), Value::from(text));
        }
    }
    for alias in INSTRUCTION_ALIASES {
        map.remove(*alias);
    }

    for key in ["features", "screenshots", "mod_links"] {
        if let Some(Value::String(raw)) = map.get(key) {
            let lines: Vec<Value> = raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(Value::from)
                .collect();
            map.insert(key.to_string(), Value::Array(lines));
        }
    }

    for key in ["popular", "online_play", "instruction"] {
        if let Some(flag) = map.get(key).and_then(as_flag) {
            map.insert(key.to_string(), Value::Bool(flag));
        }
    }

    let instructions = match map.remove("platform_instructions") {
        Some(Value::Object(raw)) => platform_instructions(raw),
        Some(_) => return Err("platform_instructions must be an object".to_string()),
        None => BTreeMap::new(),
    };
    let has_instructions = !instructions.is_empty() || map.contains_key("instruction_text");

    let mut entry: Entry =
        serde_json::from_value(Value::Object(map)).map_err(|e| e.to_string())?;
    entry.platform_instructions = instructions;
    if has_instructions {
        entry.instruction = true;
    }
    Ok(entry)
}

/// Remove the first of `keys` that holds a non-blank string.
fn take_str(map: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        let value = match map.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => continue,
        };
        map.remove(*key);
        return Some(value);
    }
    None
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_i64().is_some_and(|n| n != 0)),
        Value::String(s) => Some(matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )),
        _ => None,
    }
}

fn platform_instructions(raw: Map<String, Value>) -> BTreeMap<Platform, String> {
    raw.into_iter()
        .filter_map(|(name, text)| {
            let text = text.as_str()?.trim().to_string();
            if text.is_empty() {
                return None;
            }
            match name.parse::<Platform>() {
                Ok(platform) => Some((platform, text)),
                Err(_) => {
                    warn!("Skipping instructions for unknown platform '{}'", name);
                    None
                }
            }
        })
        .collect()
}

/// Write entries into storage, keeping optional details already stored.
///
/// # Errors
///
/// Returns an error if a database operation fails. Entries written before
/// the failure stay written.
pub fn import_entries(storage: &Storage, entries: &[Entry]) -> Result<ImportReport> {
    let mut report = ImportReport::default();

    for entry in entries {
        let existed = storage.entry_exists(&entry.id)?;
        storage.upsert_entry(entry)?;
        if existed {
            report.updated.push(entry.id.clone());
        } else {
            report.created.push(entry.id.clone());
        }
    }

    info!(
        "Imported {} entries ({} new, {} updated)",
        report.total(),
        report.created.len(),
        report.updated.len()
    );
    Ok(report)
}

/// Load a seed file and import it in one go.
///
/// # Errors
///
/// Returns an error if loading or importing fails.
pub fn import_file(
    storage: &Storage,
    path: impl AsRef<Path>,
    default_kind: EntryKind,
) -> Result<ImportReport> {
    let entries = load_entries(path, default_kind)?;
    import_entries(storage, &entries)
}
