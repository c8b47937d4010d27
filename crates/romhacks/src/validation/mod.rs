//! Validation of visitor input.
//!
//! Submissions and feedback are checked field by field. Every problem is
//! collected so the form can show them all at once instead of one per round
//! trip.
//!
//! # Example
//!
//! ```
//! use romhacks::config::SubmissionConfig;
//! use romhacks::moderation::NewFeedback;
//! use romhacks::validation::Validator;
//!
//! let validator = Validator::new(&SubmissionConfig::default());
//! let feedback = NewFeedback {
//!     description: "The download link 404s".to_string(),
//!     url: Some("https://example.com/patch.bps".to_string()),
//!     ..NewFeedback::default()
//! };
//! assert!(validator.validate_feedback(&feedback).is_ok());
//! ```

mod rules;

pub use rules::{builtin_rules, FieldRule};

use url::Url;

use crate::config::SubmissionConfig;
use crate::error::{Error, FieldIssue, Result};
use crate::moderation::{NewFeedback, NewSubmission};

/// Checks submissions and feedback against the field rules and size limits.
#[derive(Debug, Clone)]
pub struct Validator {
    crc32: FieldRule,
    md5: FieldRule,
    sha1: FieldRule,
    email: FieldRule,
    release_date: FieldRule,
    max_field_length: usize,
    max_screenshots: usize,
}

impl Validator {
    /// Create a validator with the configured limits.
    #[must_use]
    pub fn new(config: &SubmissionConfig) -> Self {
        Self {
            crc32: rules::crc32(),
            md5: rules::md5(),
            sha1: rules::sha1(),
            email: rules::email(),
            release_date: rules::release_date(),
            max_field_length: config.max_field_length,
            max_screenshots: config.max_screenshots,
        }
    }

    /// Validate a proposed entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every problem found.
    pub fn validate_submission(&self, submission: &NewSubmission) -> Result<()> {
        let mut issues = Vec::new();

        if submission.title.trim().is_empty() {
            issues.push(FieldIssue::new("title", "is required"));
        }

        for (field, value) in submission.text_fields() {
            self.check_length(field, value, &mut issues);
        }

        for (field, value) in [
            ("download_link", &submission.download_link),
            ("project_link", &submission.project_link),
            ("patch_page_url", &submission.patch_page_url),
            ("image_url", &submission.image_url),
        ] {
            if let Some(value) = present(value) {
                check_url(field, value, &mut issues);
            }
        }

        if submission.screenshots.len() > self.max_screenshots {
            issues.push(FieldIssue::new(
                "screenshots",
                format!("at most {} screenshots are allowed", self.max_screenshots),
            ));
        }
        for screenshot in &submission.screenshots {
            self.check_length("screenshots", screenshot, &mut issues);
            check_url("screenshots", screenshot, &mut issues);
        }

        for (field, value, rule) in [
            ("base_checksum_crc32", &submission.base_checksum_crc32, &self.crc32),
            ("base_checksum_md5", &submission.base_checksum_md5, &self.md5),
            ("base_checksum_sha1", &submission.base_checksum_sha1, &self.sha1),
            ("email", &submission.email, &self.email),
            ("release_date", &submission.release_date, &self.release_date),
        ] {
            if let Some(value) = present(value) {
                check_rule(field, value, rule, &mut issues);
            }
        }

        finish(issues)
    }

    /// Validate a feedback report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every problem found.
    pub fn validate_feedback(&self, feedback: &NewFeedback) -> Result<()> {
        let mut issues = Vec::new();

        if feedback.description.trim().is_empty() {
            issues.push(FieldIssue::new("description", "is required"));
        }
        self.check_length("description", &feedback.description, &mut issues);

        if let Some(title) = present(&feedback.title) {
            self.check_length("title", title, &mut issues);
        }
        if let Some(url) = present(&feedback.url) {
            self.check_length("url", url, &mut issues);
            check_url("url", url, &mut issues);
        }
        if let Some(email) = present(&feedback.email) {
            check_rule("email", email, &self.email, &mut issues);
        }

        finish(issues)
    }

    fn check_length(&self, field: &str, value: &str, issues: &mut Vec<FieldIssue>) {
        if value.chars().count() > self.max_field_length {
            issues.push(FieldIssue::new(
                field,
                format!("must be at most {} characters", self.max_field_length),
            ));
        }
    }
}

/// The trimmed value if it is set and not blank.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn check_rule(field: &str, value: &str, rule: &FieldRule, issues: &mut Vec<FieldIssue>) {
    if !rule.matches(value) {
        issues.push(FieldIssue::new(
            field,
            format!("must be {}", rule.description),
        ));
    }
}

fn check_url(field: &str, value: &str, issues: &mut Vec<FieldIssue>) {
    match Url::parse(value.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        Ok(_) => issues.push(FieldIssue::new(field, "must be an http or https URL")),
        Err(e) => issues.push(FieldIssue::new(field, format!("is not a valid URL: {e}"))),
    }
}

fn finish(issues: Vec<FieldIssue>) -> Result<()> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { issues })
    }
}
