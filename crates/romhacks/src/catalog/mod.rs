//! Catalog types for romhacks.
//!
//! This module defines the entries listed on the site: ROM hacks, which are
//! patches applied to a base ROM, and ports, which re-implement a game on new
//! platforms. Both kinds share one record type and one id space.

mod consoles;
mod series;

pub use consoles::{encode_consoles, normalize_console_list, normalize_consoles};
pub use series::{detect_series, known_series};

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The kind of catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// A binary patch applied to a base ROM.
    #[default]
    Romhack,
    /// A platform re-implementation of a game.
    Port,
}

impl EntryKind {
    /// Both kinds, ROM hacks first.
    pub const ALL: [Self; 2] = [Self::Romhack, Self::Port];

    /// The lowercase name stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Romhack => "romhack",
            Self::Port => "port",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "romhack" | "romhacks" | "game" | "games" => Ok(Self::Romhack),
            "port" | "ports" => Ok(Self::Port),
            other => Err(Error::bad_request(format!(
                "unknown entry kind '{other}', expected romhack or port"
            ))),
        }
    }
}

/// A platform that can carry its own install instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Windows and other desktop builds.
    Pc,
    /// Android.
    Android,
    /// Linux.
    Linux,
    /// Browser builds.
    Web,
    /// iOS.
    Ios,
    /// macOS.
    Mac,
    /// Nintendo Switch.
    Switch,
    /// PlayStation 4.
    Ps4,
    /// Xbox.
    Xbox,
}

impl Platform {
    /// Every platform, in display order.
    pub const ALL: [Self; 9] = [
        Self::Pc,
        Self::Android,
        Self::Linux,
        Self::Web,
        Self::Ios,
        Self::Mac,
        Self::Switch,
        Self::Ps4,
        Self::Xbox,
    ];

    /// The lowercase key used in JSON and URLs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pc => "pc",
            Self::Android => "android",
            Self::Linux => "linux",
            Self::Web => "web",
            Self::Ios => "ios",
            Self::Mac => "mac",
            Self::Switch => "switch",
            Self::Ps4 => "ps4",
            Self::Xbox => "xbox",
        }
    }

    /// Human readable label for pages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Pc => "PC",
            Self::Android => "Android",
            Self::Linux => "Linux",
            Self::Web => "Web",
            Self::Ios => "iOS",
            Self::Mac => "macOS",
            Self::Switch => "Switch",
            Self::Ps4 => "PS4",
            Self::Xbox => "Xbox",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(' ', "_");
        let key = key.strip_prefix("instructions_").unwrap_or(&key);
        match key {
            "pc" | "windows" => Ok(Self::Pc),
            "android" => Ok(Self::Android),
            "linux" => Ok(Self::Linux),
            "web" | "browser" => Ok(Self::Web),
            "ios" => Ok(Self::Ios),
            "mac" | "macos" => Ok(Self::Mac),
            "switch" => Ok(Self::Switch),
            "ps4" => Ok(Self::Ps4),
            "xbox" => Ok(Self::Xbox),
            _ => Err(Error::bad_request(format!("unknown platform '{s}'"))),
        }
    }
}

/// The ROM a patch must be applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseRom {
    /// Region of the base ROM, e.g. `USA`.
    #[serde(rename = "base_region")]
    pub region: Option<String>,
    /// Revision of the base ROM, e.g. `Rev 1`.
    #[serde(rename = "base_revision")]
    pub revision: Option<String>,
    /// Whether the ROM is headered.
    #[serde(rename = "base_header")]
    pub header: Option<String>,
    /// Expected CRC32 of the unpatched ROM.
    #[serde(rename = "base_checksum_crc32")]
    pub checksum_crc32: Option<String>,
    /// Expected MD5 of the unpatched ROM.
    #[serde(rename = "base_checksum_md5")]
    pub checksum_md5: Option<String>,
    /// Expected SHA-1 of the unpatched ROM.
    #[serde(rename = "base_checksum_sha1")]
    pub checksum_sha1: Option<String>,
}

impl BaseRom {
    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Help and community links shown on the detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportLinks {
    /// Project forum thread.
    pub support_forum_url: Option<String>,
    /// Discord invite.
    pub discord_url: Option<String>,
    /// Subreddit or thread.
    pub reddit_url: Option<String>,
    /// Troubleshooting guide.
    pub troubleshooting_url: Option<String>,
    /// Tool for checking a base ROM dump.
    pub rom_checker_url: Option<String>,
    /// Project wiki.
    pub wiki_url: Option<String>,
}

impl SupportLinks {
    /// Labelled links that are set, in display order.
    #[must_use]
    pub fn labelled(&self) -> Vec<(&'static str, &str)> {
        [
            ("Support forum", &self.support_forum_url),
            ("Discord", &self.discord_url),
            ("Reddit", &self.reddit_url),
            ("Troubleshooting", &self.troubleshooting_url),
            ("ROM checker", &self.rom_checker_url),
            ("Wiki", &self.wiki_url),
        ]
        .into_iter()
        .filter_map(|(label, url)| {
            url.as_deref()
                .filter(|u| !u.trim().is_empty())
                .map(|u| (label, u))
        })
        .collect()
    }
}

/// A catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    /// Unique id, shared across kinds. Used in `/game/{id}`.
    pub id: String,
    /// ROM hack or port.
    pub kind: EntryKind,
    /// Display title.
    pub title: String,
    /// Lowercase console or platform tokens.
    pub consoles: Vec<String>,
    /// Latest release version.
    pub version: Option<String>,
    /// Release date as entered, `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
    pub release_date: Option<String>,
    /// Author or team.
    pub author: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Feature bullet points.
    pub features: Vec<String>,
    /// Cover image.
    pub image_url: Option<String>,
    /// Screenshot image URLs.
    pub screenshots: Vec<String>,
    /// Where the patch or build is downloaded from.
    pub download_link: Option<String>,
    /// The game a hack or port is based on.
    pub base_game: Option<String>,
    /// Region of the release, for hacks that target one.
    pub version_region: Option<String>,
    /// Platform a port was originally released on.
    pub original_platform: Option<String>,
    /// Base ROM requirements.
    #[serde(flatten)]
    pub base_rom: BaseRom,
    /// Patch format such as `ips`, `bps` or `ups`.
    pub patch_format: Option<String>,
    /// File extension of the patched ROM.
    pub patch_output_ext: Option<String>,
    /// Development stage, e.g. `beta`.
    pub dev_stage: Option<String>,
    /// Shown on the index page.
    pub popular: bool,
    /// Supports online multiplayer.
    pub online_play: bool,
    /// The entry needs extra setup steps.
    pub instruction: bool,
    /// General setup notes.
    pub instruction_text: Option<String>,
    /// Setup notes per platform.
    pub platform_instructions: BTreeMap<Platform, String>,
    /// Help and community links.
    #[serde(flatten)]
    pub links: SupportLinks,
    /// Social links as entered, usually JSON.
    pub social_links: Option<String>,
    /// Franchise name, detected when left empty.
    pub game_series: Option<String>,
    /// Links to mods for a port.
    pub mod_links: Vec<String>,
    /// How to install mods.
    pub mod_instructions: Option<String>,
    /// When the entry was added.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// Create an entry with only the required fields set.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: EntryKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            ..Self::default()
        }
    }

    /// The stored series, or a detected one when none is stored.
    #[must_use]
    pub fn effective_series(&self) -> Option<String> {
        self.game_series
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| detect_series(self.base_game.as_deref(), &self.title).map(str::to_string))
    }

    /// Whether any of the entry's consoles matches `console`, ignoring case.
    #[must_use]
    pub fn has_console(&self, console: &str) -> bool {
        let wanted = console.trim().to_lowercase();
        self.consoles.iter().any(|c| *c == wanted)
    }

    /// Case-insensitive match against title, base game, author and description.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        std::iter::once(Some(self.title.as_str()))
            .chain([
                self.base_game.as_deref(),
                self.author.as_deref(),
                self.description.as_deref(),
            ])
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// A partial update to an entry.
///
/// Only fields that are `Some` are written. For optional text fields an empty
/// string clears the stored value. Field names match the flattened JSON form
/// of [`Entry`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub consoles: Option<Vec<String>>,
    pub version: Option<String>,
    pub release_date: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub features: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub screenshots: Option<Vec<String>>,
    pub download_link: Option<String>,
    pub base_game: Option<String>,
    pub version_region: Option<String>,
    pub original_platform: Option<String>,
    pub base_region: Option<String>,
    pub base_revision: Option<String>,
    pub base_header: Option<String>,
    pub base_checksum_crc32: Option<String>,
    pub base_checksum_md5: Option<String>,
    pub base_checksum_sha1: Option<String>,
    pub patch_format: Option<String>,
    pub patch_output_ext: Option<String>,
    pub dev_stage: Option<String>,
    pub popular: Option<bool>,
    pub online_play: Option<bool>,
    pub instruction: Option<bool>,
    pub instruction_text: Option<String>,
    pub social_links: Option<String>,
    /// Project forum thread.
    pub support_forum_url: Option<String>,
    /// Discord invite.
    pub discord_url: Option<String>,
    pub reddit_url: Option<String>,
    pub troubleshooting_url: Option<String>,
    pub rom_checker_url: Option<String>,
    pub wiki_url: Option<String>,
    pub game_series: Option<String>,
    pub mod_links: Option<Vec<String>>,
    pub mod_instructions: Option<String>,
}

impl EntryPatch {
    /// True when the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Turn a title into an entry id.
///
/// Lowercases, replaces spaces with `_`, drops apostrophes and anything that
/// is not ASCII alphanumeric, `_` or `-`.
#[must_use]
pub fn slugify(title: &str) -> String {
    let slug: String = title
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
            _ => None,
        })
        .collect();

    if slug.is_empty() {
        "entry".to_string()
    } else {
        slug
    }
}

/// Tailwind classes for a console badge.
const DEFAULT_BADGE: &str = "bg-gray-800 text-gray-300 border-gray-600";

/// Badge classes for a console token, depending on the entry kind.
#[must_use]
pub fn badge_style(kind: EntryKind, console: &str) -> &'static str {
    let console = console.trim().to_lowercase();
    let style = match kind {
        EntryKind::Romhack => match console.as_str() {
            "gb" => Some("bg-emerald-900/70 text-emerald-200 border-emerald-500/50"),
            "gbc" => Some("bg-lime-900/80 text-lime-300 border-lime-500/50"),
            "gba" => Some("bg-purple-900/80 text-purple-300 border-purple-500/50"),
            "snes" => Some("bg-indigo-900/80 text-indigo-300 border-indigo-500/50"),
            "n64" => Some("bg-red-900/80 text-red-300 border-red-500/50"),
            "nds" => Some("bg-pink-900/80 text-pink-300 border-pink-500/50"),
            "wii" => Some("bg-cyan-900/80 text-cyan-300 border-cyan-500/50"),
            _ => None,
        },
        EntryKind::Port => match console.as_str() {
            "android" => Some("bg-green-900/70 text-green-200 border-green-500/50"),
            "pc" => Some("bg-sky-900/70 text-sky-200 border-sky-500/50"),
            _ => None,
        },
    };
    style.unwrap_or(DEFAULT_BADGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_display_and_parse() {
        assert_eq!(EntryKind::Romhack.to_string(), "romhack");
        assert_eq!(EntryKind::Port.to_string(), "port");
        assert_eq!("Ports".parse::<EntryKind>().unwrap(), EntryKind::Port);
        assert_eq!("game".parse::<EntryKind>().unwrap(), EntryKind::Romhack);
        assert!("mod".parse::<EntryKind>().is_err());
    }

    #[test]
    fn test_entry_kind_serde() {
        assert_eq!(serde_json::to_string(&EntryKind::Port).unwrap(), "\"port\"");
        let kind: EntryKind = serde_json::from_str("\"romhack\"").unwrap();
        assert_eq!(kind, EntryKind::Romhack);
    }

    #[test]
    fn test_platform_parse() {
        assert_eq!("PC".parse::<Platform>().unwrap(), Platform::Pc);
        assert_eq!("instructions_linux".parse::<Platform>().unwrap(), Platform::Linux);
        assert_eq!("macOS".parse::<Platform>().unwrap(), Platform::Mac);
        assert!("dreamcast".parse::<Platform>().is_err());

        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[test]
    fn test_entry_serializes_flat() {
        let mut entry = Entry::new("unbound", EntryKind::Romhack, "Pokemon Unbound");
        entry.base_rom.checksum_crc32 = Some("1f1c08fb".to_string());
        entry.links.discord_url = Some("https://discord.gg/x".to_string());
        entry
            .platform_instructions
            .insert(Platform::Android, "Use a GBA emulator".to_string());

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["base_checksum_crc32"], "1f1c08fb");
        assert_eq!(value["discord_url"], "https://discord.gg/x");
        assert_eq!(value["platform_instructions"]["android"], "Use a GBA emulator");
        assert_eq!(value["kind"], "romhack");

        let back: Entry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_effective_series() {
        let mut entry = Entry::new("x", EntryKind::Port, "Ship of Harkinian");
        entry.base_game = Some("The Legend of Zelda: Ocarina of Time".to_string());
        assert_eq!(entry.effective_series().as_deref(), Some("Zelda"));

        entry.game_series = Some("Custom".to_string());
        assert_eq!(entry.effective_series().as_deref(), Some("Custom"));

        entry.game_series = Some("  ".to_string());
        assert_eq!(entry.effective_series().as_deref(), Some("Zelda"));
    }

    #[test]
    fn test_matches_query_and_console() {
        let mut entry = Entry::new("sm64", EntryKind::Port, "SM64 PC Port");
        entry.base_game = Some("Super Mario 64".to_string());
        entry.consoles = vec!["pc".to_string(), "android".to_string()];

        assert!(entry.matches_query("mario"));
        assert!(entry.matches_query(""));
        assert!(!entry.matches_query("zelda"));
        assert!(entry.has_console("Android"));
        assert!(!entry.has_console("switch"));
    }

    #[test]
    fn test_support_links_labelled_skips_blank() {
        let links = SupportLinks {
            wiki_url: Some("https://wiki.example".to_string()),
            reddit_url: Some(" ".to_string()),
            ..SupportLinks::default()
        };
        assert_eq!(links.labelled(), vec![("Wiki", "https://wiki.example")]);
    }

    #[test]
    fn test_entry_patch_is_empty() {
        assert!(EntryPatch::default().is_empty());
        let patch = EntryPatch {
            popular: Some(true),
            ..EntryPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_entry_patch_rejects_unknown_fields() {
        let result: Result<EntryPatch, _> = serde_json::from_str(r#"{"id": "new"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Pokémon Unbound"), "pokmon_unbound");
        assert_eq!(slugify("Link's Awakening DX"), "links_awakening_dx");
        assert_eq!(slugify("Super Mario Bros. - Remastered"), "super_mario_bros_-_remastered");
        assert_eq!(slugify("!!!"), "entry");
    }

    #[test]
    fn test_badge_style() {
        assert!(badge_style(EntryKind::Romhack, "GBA").contains("purple"));
        assert!(badge_style(EntryKind::Port, "pc").contains("sky"));
        assert_eq!(badge_style(EntryKind::Port, "gba"), DEFAULT_BADGE);
        assert_eq!(badge_style(EntryKind::Romhack, "psx"), DEFAULT_BADGE);
    }
}
