//! Payload rules for the event and user endpoints.
//!
//! Every rule runs before the first store call. Failures are collected per
//! field so a client sees all of them in one response.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::utils::error::{AppError, AppResult};

pub mod event;
pub mod user;

pub use event::{validate_create, validate_update, CreateEventPayload, UpdateEventPayload};
pub use user::{
    validate_change_password, validate_login, ChangePasswordPayload, Credentials, LoginPayload,
    PasswordChange,
};

pub const MIN_PASSWORD_LENGTH: usize = 6;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug regex"));

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collects field failures and turns them into one validation error.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn finish(self) -> AppResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::invalid_fields(self.0))
        }
    }

    /// Returns the trimmed value, or records `message` when it is missing or blank.
    pub fn required(&mut self, field: &str, value: Option<&str>, message: &str) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                self.push(field, message);
                None
            }
        }
    }

    pub fn instant(
        &mut self,
        field: &str,
        value: Option<&str>,
        tz: Tz,
        missing: &str,
    ) -> Option<DateTime<Utc>> {
        let raw = self.required(field, value, missing)?;
        match parse_instant(&raw, tz) {
            Some(instant) => Some(instant),
            None => {
                self.push(field, format!("{missing}: '{raw}' is not a valid date"));
                None
            }
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub fn is_valid_slug(value: &str) -> bool {
    SLUG_RE.is_match(value)
}

/// Parses an RFC 3339 instant. Values without an offset are read as wall-clock
/// time in the site's timezone.
pub fn parse_instant(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .and_then(|naive| local_to_utc(naive, tz))
}

/// Resolves a wall-clock time in `tz`. Ambiguous times take the earlier
/// reading; times skipped by a DST jump do not exist and yield `None`.
pub fn local_to_utc(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Blank strings clear an optional text field.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offsets_and_site_local_times() {
        let utc = parse_instant("2025-10-04T14:00:00Z", Tz::UTC).unwrap();
        assert_eq!(utc.to_rfc3339(), "2025-10-04T14:00:00+00:00");

        let eastern = parse_instant("2025-10-04T10:00", chrono_tz::America::New_York).unwrap();
        assert_eq!(eastern, utc);

        assert!(parse_instant("next saturday", Tz::UTC).is_none());
    }

    #[test]
    fn slugs_are_lowercase_hyphenated() {
        assert!(is_valid_slug("corn-maze-2025"));
        assert!(!is_valid_slug("Corn Maze"));
        assert!(!is_valid_slug("-maze"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn emails_need_a_domain() {
        assert!(is_valid_email("staff@farm.example"));
        assert!(!is_valid_email("staff@farm"));
        assert!(!is_valid_email("staff farm@x.io"));
    }

    #[test]
    fn violations_report_every_field() {
        let mut violations = Violations::default();
        assert_eq!(violations.required("name", Some("  "), "Name is required"), None);
        assert_eq!(violations.required("slug", None, "URL slug is required"), None);
        assert!(violations.has("name"));

        match violations.finish() {
            Err(AppError::ValidationError { fields, .. }) => assert_eq!(fields.len(), 2),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
