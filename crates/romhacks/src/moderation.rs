//! Submission and feedback records.
//!
//! Visitors propose new entries and report problems with existing ones. Both
//! land in a moderation queue with a status that admins move along.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::{normalize_console_list, normalize_consoles, EntryKind, Platform};
use crate::error::Error;

/// Where a submission is in the moderation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Waiting for review. Rows without a status are treated as new.
    #[default]
    New,
    /// Accepted by an admin.
    Approved,
    /// Turned down by an admin.
    Rejected,
}

impl SubmissionStatus {
    /// The lowercase name stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" | "" => Ok(Self::New),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(Error::bad_request(format!(
                "unknown submission status '{other}'"
            ))),
        }
    }
}

/// A proposed catalog entry, as sent by a visitor.
///
/// List fields accept either a JSON array or a single string. Consoles are
/// split on commas, features and screenshots on new lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewSubmission {
    /// Which kind of entry is proposed.
    #[serde(alias = "game_type")]
    pub kind: EntryKind,
    /// Title of the hack or port.
    pub title: String,
    /// Game it is based on.
    pub base_game: Option<String>,
    /// Consoles or platforms.
    #[serde(alias = "console", deserialize_with = "de_consoles")]
    pub consoles: Vec<String>,
    /// Author or team.
    pub author: Option<String>,
    /// Release date, `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
    pub release_date: Option<String>,
    /// Release version.
    pub version: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Feature bullet points.
    #[serde(deserialize_with = "de_lines")]
    pub features: Vec<String>,
    /// Direct download link.
    pub download_link: Option<String>,
    /// Patch format such as `bps`.
    pub patch_format: Option<String>,
    /// Page hosting the patch, e.g. on romhacking.net.
    pub patch_page_url: Option<String>,
    /// Project home page or repository.
    pub project_link: Option<String>,
    /// Base ROM region.
    pub base_region: Option<String>,
    /// Base ROM revision.
    pub base_revision: Option<String>,
    /// Base ROM CRC32.
    pub base_checksum_crc32: Option<String>,
    /// Base ROM MD5.
    pub base_checksum_md5: Option<String>,
    /// Base ROM SHA-1.
    pub base_checksum_sha1: Option<String>,
    /// Cover image URL.
    pub image_url: Option<String>,
    /// Screenshot URLs.
    #[serde(deserialize_with = "de_lines")]
    pub screenshots: Vec<String>,
    /// Development stage.
    pub dev_stage: Option<String>,
    /// Supports online multiplayer.
    #[serde(deserialize_with = "de_flag")]
    pub online_play: bool,
    /// Contact address of the submitter.
    pub email: Option<String>,
    /// Free-form notes for the moderators.
    pub notes: Option<String>,
    /// Setup notes per platform.
    pub platform_instructions: BTreeMap<Platform, String>,
}

impl NewSubmission {
    /// Every optional text field with its name, for length checks.
    #[must_use]
    pub fn text_fields(&self) -> Vec<(&'static str, &str)> {
        let optional = [
            ("base_game", &self.base_game),
            ("author", &self.author),
            ("release_date", &self.release_date),
            ("version", &self.version),
            ("description", &self.description),
            ("download_link", &self.download_link),
            ("patch_format", &self.patch_format),
            ("patch_page_url", &self.patch_page_url),
            ("project_link", &self.project_link),
            ("base_region", &self.base_region),
            ("base_revision", &self.base_revision),
            ("base_checksum_crc32", &self.base_checksum_crc32),
            ("base_checksum_md5", &self.base_checksum_md5),
            ("base_checksum_sha1", &self.base_checksum_sha1),
            ("image_url", &self.image_url),
            ("dev_stage", &self.dev_stage),
            ("email", &self.email),
            ("notes", &self.notes),
        ];

        std::iter::once(("title", self.title.as_str()))
            .chain(
                optional
                    .into_iter()
                    .filter_map(|(name, value)| value.as_deref().map(|v| (name, v))),
            )
            .chain(self.features.iter().map(|f| ("features", f.as_str())))
            .chain(
                self.platform_instructions
                    .values()
                    .map(|text| ("platform_instructions", text.as_str())),
            )
            .collect()
    }
}

/// A stored submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// Row id.
    pub id: i64,
    /// Moderation status.
    pub status: SubmissionStatus,
    /// Reason for rejection or other moderator notes.
    pub admin_notes: Option<String>,
    /// When the submission arrived.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Hashed client IP of the submitter.
    pub ip_hash: Option<String>,
    /// Hashed user agent of the submitter.
    pub user_agent_hash: Option<String>,
    /// Catalog entry created from this submission, once published.
    pub published_entry_id: Option<String>,
    /// The submitted fields.
    #[serde(flatten)]
    pub data: NewSubmission,
}

/// Number of submissions per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionCounts {
    /// Waiting for review.
    pub new: i64,
    /// Approved.
    pub approved: i64,
    /// Rejected.
    pub rejected: i64,
}

impl SubmissionCounts {
    /// All submissions.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.new + self.approved + self.rejected
    }
}

/// What a feedback report is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    /// A download or page link no longer works.
    BrokenLink,
    /// Some entry data is wrong.
    Correction,
    /// Anything else.
    #[default]
    Other,
}

impl FeedbackKind {
    /// The name stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrokenLink => "broken_link",
            Self::Correction => "correction",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "broken_link" => Ok(Self::BrokenLink),
            "correction" => Ok(Self::Correction),
            "other" => Ok(Self::Other),
            other => Err(Error::bad_request(format!("unknown feedback type '{other}'"))),
        }
    }
}

/// Where a feedback report is in the moderation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    /// Not looked at yet.
    #[default]
    New,
    /// Being handled.
    InProgress,
    /// Fixed or otherwise dealt with.
    Resolved,
    /// Not actionable.
    Dismissed,
}

impl FeedbackStatus {
    /// The name stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }
}

impl std::fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "new" | "" => Ok(Self::New),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(Error::bad_request(format!(
                "unknown feedback status '{other}'"
            ))),
        }
    }
}

/// A feedback report, as sent by a visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewFeedback {
    /// What the report is about.
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    /// Title of the affected entry.
    pub title: Option<String>,
    /// The affected link or page.
    pub url: Option<String>,
    /// What is wrong.
    pub description: String,
    /// Contact address of the reporter.
    pub email: Option<String>,
}

/// A stored feedback report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    /// Row id.
    pub id: i64,
    /// Moderation status.
    pub status: FeedbackStatus,
    /// Moderator notes.
    pub admin_notes: Option<String>,
    /// When the report arrived.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Hashed client IP of the reporter.
    pub ip_hash: Option<String>,
    /// The reported fields.
    #[serde(flatten)]
    pub data: NewFeedback,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

fn de_consoles<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(raw)) => normalize_consoles(&raw),
        Some(OneOrMany::Many(items)) => normalize_console_list(items),
    })
}

fn de_lines<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let items = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(raw)) => raw.lines().map(str::to_string).collect(),
        Some(OneOrMany::Many(items)) => items,
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

pub(crate) fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => false,
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        Some(Flag::Text(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_status_parse() {
        assert_eq!("".parse::<SubmissionStatus>().unwrap(), SubmissionStatus::New);
        assert_eq!(
            "Approved".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Approved
        );
        assert!("pending".parse::<SubmissionStatus>().is_err());
    }

    #[test]
    fn test_new_submission_accepts_loose_json() {
        let json = r#"{
            "game_type": "port",
            "title": "Ship of Harkinian",
            "console": "PC, Linux, pc",
            "features": "60fps\n\nWidescreen\n",
            "screenshots": ["https://img.example/1.png", " "],
            "online_play": "on",
            "platform_instructions": {"linux": "Install the AppImage"}
        }"#;
        let submission: NewSubmission = serde_json::from_str(json).unwrap();

        assert_eq!(submission.kind, EntryKind::Port);
        assert_eq!(submission.consoles, vec!["pc", "linux"]);
        assert_eq!(submission.features, vec!["60fps", "Widescreen"]);
        assert_eq!(submission.screenshots, vec!["https://img.example/1.png"]);
        assert!(submission.online_play);
        assert_eq!(
            submission.platform_instructions.get(&Platform::Linux).map(String::as_str),
            Some("Install the AppImage")
        );
    }

    #[test]
    fn test_new_submission_defaults() {
        let submission: NewSubmission = serde_json::from_str(r#"{"title": "X"}"#).unwrap();
        assert_eq!(submission.kind, EntryKind::Romhack);
        assert!(submission.consoles.is_empty());
        assert!(!submission.online_play);
    }

    #[test]
    fn test_online_play_from_int_and_null() {
        let on: NewSubmission = serde_json::from_str(r#"{"online_play": 1}"#).unwrap();
        assert!(on.online_play);
        let off: NewSubmission = serde_json::from_str(r#"{"online_play": null}"#).unwrap();
        assert!(!off.online_play);
    }

    #[test]
    fn test_text_fields_skip_unset() {
        let submission = NewSubmission {
            title: "T".to_string(),
            email: Some("a@b.co".to_string()),
            features: vec!["one".to_string()],
            ..NewSubmission::default()
        };
        let fields = submission.text_fields();
        assert_eq!(
            fields,
            vec![("title", "T"), ("email", "a@b.co"), ("features", "one")]
        );
    }

    #[test]
    fn test_counts_total() {
        let counts = SubmissionCounts {
            new: 2,
            approved: 3,
            rejected: 1,
        };
        assert_eq!(counts.total(), 6);
    }

    #[test]
    fn test_feedback_kind_parse_and_serde() {
        assert_eq!(
            "broken-link".parse::<FeedbackKind>().unwrap(),
            FeedbackKind::BrokenLink
        );
        let feedback: NewFeedback =
            serde_json::from_str(r#"{"type": "correction", "description": "typo"}"#).unwrap();
        assert_eq!(feedback.kind, FeedbackKind::Correction);
        assert_eq!(serde_json::to_value(&feedback).unwrap()["type"], "correction");
    }

    #[test]
    fn test_feedback_status_round_trip() {
        for status in [
            FeedbackStatus::New,
            FeedbackStatus::InProgress,
            FeedbackStatus::Resolved,
            FeedbackStatus::Dismissed,
        ] {
            assert_eq!(status.as_str().parse::<FeedbackStatus>().unwrap(), status);
        }
    }
}
