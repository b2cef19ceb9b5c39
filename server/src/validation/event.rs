use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use super::{is_valid_slug, optional_text, parse_instant, Violations};
use crate::events::recurrence::{Frequency, RecurrenceEnd, RecurrenceOptions};
use crate::events::{EventChanges, Scope};
use crate::models::EventDraft;
use crate::utils::error::{AppError, AppResult};

const END_BEFORE_START: &str = "End date must be after or equal to start date";
const SLUG_FORMAT: &str = "URL slug may only contain lowercase letters, numbers and hyphens";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventPayload {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub description: Option<String>,
    pub haunted_by: Option<String>,
    pub is_all_day: Option<bool>,
    pub is_has_ends_at: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    pub is_recurring: Option<bool>,
    pub recurrence_rule: Option<String>,
    pub recurrence_ends: Option<String>,
    pub recurring_frequency: Option<String>,
    pub recurring_interval: Option<i64>,
    pub recurring_count: Option<i64>,
    pub recurring_end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventPayload {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub description: Option<String>,
    pub haunted_by: Option<String>,
    pub is_all_day: Option<bool>,
    pub is_has_ends_at: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub scope: Scope,
}

/// Checks a create payload and returns the draft to persist. The draft's
/// `recurrence_rule` is set when the event repeats, either from the rule
/// text or compiled from the structured recurrence fields.
pub fn validate_create(payload: CreateEventPayload, tz: Tz) -> AppResult<EventDraft> {
    let mut violations = Violations::default();

    let name = violations.required("name", payload.name.as_deref(), "Name is required");
    let slug = violations.required("slug", payload.slug.as_deref(), "URL slug is required");
    if let Some(slug) = &slug {
        if !is_valid_slug(slug) {
            violations.push("slug", SLUG_FORMAT);
        }
    }

    let starts_at = violations.instant(
        "startsAt",
        payload.starts_at.as_deref(),
        tz,
        "Start date is required",
    );
    let ends_at = violations.instant(
        "endsAt",
        payload.ends_at.as_deref(),
        tz,
        "End date is required",
    );
    if let (Some(start), Some(end)) = (starts_at, ends_at) {
        if end < start {
            violations.push("endsAt", END_BEFORE_START);
        }
    }

    let recurrence_rule = recurrence(&payload, starts_at, tz, &mut violations);

    violations.finish()?;

    // Every field checked above is present once `finish` passes.
    match (name, slug, starts_at, ends_at) {
        (Some(name), Some(slug), Some(starts_at), Some(ends_at)) => Ok(EventDraft {
            name,
            slug,
            description: optional_text(payload.description),
            starts_at,
            ends_at,
            is_all_day: payload.is_all_day.unwrap_or(false),
            is_has_ends_at: payload.is_has_ends_at.unwrap_or(false),
            is_featured: payload.is_featured.unwrap_or(false),
            is_active: payload.is_active.unwrap_or(true),
            haunted_by: optional_text(payload.haunted_by),
            recurrence_rule,
        }),
        _ => Err(AppError::validation("Validation failed")),
    }
}

fn recurrence(
    payload: &CreateEventPayload,
    starts_at: Option<DateTime<Utc>>,
    tz: Tz,
    violations: &mut Violations,
) -> Option<String> {
    let rule = optional_text(payload.recurrence_rule.clone());
    let is_recurring = payload.is_recurring.unwrap_or(false);

    if let Some(count) = payload.recurring_count {
        if count < 1 {
            violations.push("recurringCount", "Count must be at least 1");
        }
    }
    let end_date = payload
        .recurring_end_date
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(|raw| {
            let parsed = parse_instant(raw.trim(), tz);
            if parsed.is_none() {
                violations.push("recurringEndDate", "End date must be a valid date");
            }
            parsed
        });
    if let (Some(end_date), Some(start)) = (end_date, starts_at) {
        if end_date < start {
            violations.push("recurringEndDate", "End date must be after start date");
        }
    }

    if !is_recurring {
        return rule;
    }
    if rule.is_some() {
        return rule;
    }

    let frequency = match payload.recurring_frequency.as_deref() {
        None => {
            violations.push(
                "recurringFrequency",
                "Frequency is required for recurring events",
            );
            None
        }
        Some(raw) => {
            let parsed = Frequency::parse(raw);
            if parsed.is_none() {
                violations.push("recurringFrequency", "Please select a valid frequency");
            }
            parsed
        }
    };

    let interval = match payload.recurring_interval {
        None => {
            violations.push(
                "recurringInterval",
                "Interval is required for recurring events",
            );
            None
        }
        Some(n) if n < 1 => {
            violations.push("recurringInterval", "Interval must be at least 1");
            None
        }
        Some(n) => u32::try_from(n).ok(),
    };

    let count = payload
        .recurring_count
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok());
    let end = match payload.recurrence_ends.as_deref().map(str::to_ascii_uppercase) {
        Some(ends) if ends == "COUNT" => match count {
            Some(count) => Some(RecurrenceEnd::Count(count)),
            None => {
                if !violations.has("recurringCount") {
                    violations.push("recurringCount", "Count is required when ending after a count");
                }
                None
            }
        },
        Some(ends) if ends == "UNTIL" => match end_date {
            Some(until) => Some(RecurrenceEnd::Until(until)),
            None => {
                if !violations.has("recurringEndDate") {
                    violations.push("recurringEndDate", "End date is required when ending on a date");
                }
                None
            }
        },
        Some(ends) if ends != "NEVER" => {
            violations.push("recurrenceEnds", "Recurrence end must be NEVER, COUNT or UNTIL");
            None
        }
        _ => Some(match (count, end_date) {
            (Some(count), _) => RecurrenceEnd::Count(count),
            (None, Some(until)) => RecurrenceEnd::Until(until),
            (None, None) => RecurrenceEnd::Never,
        }),
    };

    match (frequency, interval, end) {
        (Some(frequency), Some(interval), Some(end)) => Some(
            RecurrenceOptions {
                frequency,
                interval,
                end,
            }
            .to_rule(),
        ),
        _ => {
            if !violations.has("recurrenceRule") && frequency.is_none() && interval.is_none() {
                violations.push(
                    "recurrenceRule",
                    "Recurrence rule is required for recurring events",
                );
            }
            None
        }
    }
}

/// Checks an update payload. Only fields present in the body change.
pub fn validate_update(payload: UpdateEventPayload, tz: Tz) -> AppResult<(EventChanges, Scope)> {
    let mut violations = Violations::default();

    let name = payload.name.as_deref().and_then(|raw| {
        violations.required("name", Some(raw), "Name is required")
    });
    let slug = payload.slug.as_deref().and_then(|raw| {
        let slug = violations.required("slug", Some(raw), "URL slug is required")?;
        if !is_valid_slug(&slug) {
            violations.push("slug", SLUG_FORMAT);
        }
        Some(slug)
    });
    let starts_at = payload
        .starts_at
        .as_deref()
        .and_then(|raw| violations.instant("startsAt", Some(raw), tz, "Start date is required"));
    let ends_at = payload
        .ends_at
        .as_deref()
        .and_then(|raw| violations.instant("endsAt", Some(raw), tz, "End date is required"));
    if let (Some(start), Some(end)) = (starts_at, ends_at) {
        if end < start {
            violations.push("endsAt", END_BEFORE_START);
        }
    }

    violations.finish()?;

    let changes = EventChanges {
        name,
        slug,
        description: payload.description.map(|d| optional_text(Some(d))),
        haunted_by: payload.haunted_by.map(|h| optional_text(Some(h))),
        starts_at,
        ends_at,
        is_all_day: payload.is_all_day,
        is_has_ends_at: payload.is_has_ends_at,
        is_featured: payload.is_featured,
        is_active: payload.is_active,
        recurrence_rule: payload.recurrence_rule.map(|r| optional_text(Some(r))),
    };
    Ok((changes, payload.scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload() -> CreateEventPayload {
        CreateEventPayload {
            name: Some("Corn Maze".into()),
            slug: Some("corn-maze".into()),
            starts_at: Some("2025-10-04T14:00:00Z".into()),
            ends_at: Some("2025-10-04T22:00:00Z".into()),
            ..Default::default()
        }
    }

    fn fields(err: AppError) -> Vec<String> {
        match err {
            AppError::ValidationError { fields, .. } => {
                fields.into_iter().map(|f| f.field).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn minimal_payload_gets_defaults() {
        let draft = validate_create(payload(), Tz::UTC).unwrap();
        assert_eq!(draft.name, "Corn Maze");
        assert!(draft.is_active);
        assert!(!draft.is_featured);
        assert!(draft.recurrence_rule.is_none());
        assert_eq!(
            draft.starts_at,
            Utc.with_ymd_and_hms(2025, 10, 4, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let err = validate_create(CreateEventPayload::default(), Tz::UTC).unwrap_err();
        assert_eq!(fields(err), vec!["name", "slug", "startsAt", "endsAt"]);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut body = payload();
        body.ends_at = Some("2025-10-04T13:00:00Z".into());
        assert_eq!(fields(validate_create(body, Tz::UTC).unwrap_err()), vec!["endsAt"]);
    }

    #[test]
    fn equal_start_and_end_are_allowed() {
        let mut body = payload();
        body.ends_at = body.starts_at.clone();
        assert!(validate_create(body, Tz::UTC).is_ok());
    }

    #[test]
    fn recurring_flag_requires_a_rule_or_frequency() {
        let mut body = payload();
        body.is_recurring = Some(true);
        let err = validate_create(body, Tz::UTC).unwrap_err();
        let fields = fields(err);
        assert!(fields.contains(&"recurringFrequency".to_string()));
        assert!(fields.contains(&"recurrenceRule".to_string()));
    }

    #[test]
    fn explicit_rule_is_kept_verbatim() {
        let mut body = payload();
        body.recurrence_rule = Some("FREQ=WEEKLY;COUNT=6".into());
        let draft = validate_create(body, Tz::UTC).unwrap();
        assert_eq!(draft.recurrence_rule.as_deref(), Some("FREQ=WEEKLY;COUNT=6"));
    }

    #[test]
    fn structured_fields_compile_into_a_rule() {
        let mut body = payload();
        body.is_recurring = Some(true);
        body.recurring_frequency = Some("weekly".into());
        body.recurring_interval = Some(1);
        body.recurrence_ends = Some("COUNT".into());
        body.recurring_count = Some(6);
        let draft = validate_create(body, Tz::UTC).unwrap();
        assert_eq!(
            draft.recurrence_rule.as_deref(),
            Some("FREQ=WEEKLY;INTERVAL=1;COUNT=6")
        );
    }

    #[test]
    fn structured_until_must_follow_the_start() {
        let mut body = payload();
        body.is_recurring = Some(true);
        body.recurring_frequency = Some("DAILY".into());
        body.recurring_interval = Some(1);
        body.recurrence_ends = Some("UNTIL".into());
        body.recurring_end_date = Some("2025-10-01T00:00:00Z".into());
        assert!(fields(validate_create(body, Tz::UTC).unwrap_err())
            .contains(&"recurringEndDate".to_string()));
    }

    #[test]
    fn update_accepts_partial_bodies() {
        let body = UpdateEventPayload {
            is_featured: Some(true),
            description: Some(String::new()),
            scope: Scope::Future,
            ..Default::default()
        };
        let (changes, scope) = validate_update(body, Tz::UTC).unwrap();
        assert_eq!(scope, Scope::Future);
        assert_eq!(changes.is_featured, Some(true));
        assert_eq!(changes.description, Some(None));
        assert!(changes.name.is_none());
        assert!(changes.starts_at.is_none());
    }

    #[test]
    fn update_rejects_blank_name_and_inverted_dates() {
        let body = UpdateEventPayload {
            name: Some("   ".into()),
            starts_at: Some("2025-10-04T14:00:00Z".into()),
            ends_at: Some("2025-10-04T12:00:00Z".into()),
            ..Default::default()
        };
        assert_eq!(
            fields(validate_update(body, Tz::UTC).unwrap_err()),
            vec!["name", "endsAt"]
        );
    }

    #[test]
    fn scope_deserializes_from_lowercase() {
        let body: UpdateEventPayload =
            serde_json::from_str(r#"{"scope":"all","name":"Maze"}"#).unwrap();
        assert_eq!(body.scope, Scope::All);
        let body: UpdateEventPayload = serde_json::from_str(r#"{"name":"Maze"}"#).unwrap();
        assert_eq!(body.scope, Scope::Single);
    }
}
