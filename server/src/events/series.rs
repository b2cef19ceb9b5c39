//! Series planning: which rows a scoped mutation touches and what they look
//! like afterwards. Nothing here talks to the database; the store loads the
//! series, asks for a plan, and writes it back inside one transaction.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Event, EventDraft};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Single,
    Future,
    All,
}

/// Field-level changes from an update request. `None` leaves a field alone;
/// for nullable text fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<Option<String>>,
    pub haunted_by: Option<Option<String>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_all_day: Option<bool>,
    pub is_has_ends_at: Option<bool>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
    pub recurrence_rule: Option<Option<String>>,
}

/// Rows of the first occurrence's series: the parent first, then one child
/// per remaining date, each shifted by the draft's duration.
pub fn plan_series(
    draft: EventDraft,
    dates: &[DateTime<Utc>],
    now: DateTime<Utc>,
) -> Vec<Event> {
    let duration = draft.duration();
    let Some((first, rest)) = dates.split_first() else {
        return Vec::new();
    };

    let parent_id = Uuid::new_v4();
    let mut parent_draft = draft.clone();
    parent_draft.starts_at = *first;
    parent_draft.ends_at = *first + duration;
    // A rule producing one date is an ordinary single event.
    if rest.is_empty() {
        parent_draft.recurrence_rule = None;
    }

    let mut rows = Vec::with_capacity(dates.len());
    rows.push(parent_draft.into_event(parent_id, None, now));

    for start in rest {
        let mut child = draft.clone();
        child.starts_at = *start;
        child.ends_at = *start + duration;
        rows.push(child.into_event(Uuid::new_v4(), Some(parent_id), now));
    }

    rows
}

/// Selects the rows of `series` affected by `scope`. A target outside any
/// series (or alone in it) is always treated as `single`.
pub fn select(target: &Event, series: Vec<Event>, scope: Scope) -> Vec<Event> {
    if series.len() <= 1 {
        return vec![target.clone()];
    }

    match scope {
        Scope::Single => vec![target.clone()],
        Scope::All => series,
        Scope::Future => series
            .into_iter()
            .filter(|event| event.starts_at >= target.starts_at)
            .collect(),
    }
}

/// Applies `changes` to every affected row. New start/end instants are
/// taken as an offset from the target's current values and added to each
/// row's own dates, so the series keeps its cadence.
pub fn plan_update(
    target: &Event,
    rows: Vec<Event>,
    changes: &EventChanges,
    now: DateTime<Utc>,
) -> AppResult<Vec<Event>> {
    let start_delta = changes
        .starts_at
        .map(|starts_at| starts_at - target.starts_at)
        .unwrap_or_else(Duration::zero);
    let end_delta = changes
        .ends_at
        .map(|ends_at| ends_at - target.ends_at)
        .unwrap_or_else(Duration::zero);

    rows.into_iter()
        .map(|mut row| {
            if let Some(name) = &changes.name {
                row.name = name.clone();
            }
            if let Some(slug) = &changes.slug {
                row.slug = slug.clone();
            }
            if let Some(description) = &changes.description {
                row.description = description.clone();
            }
            if let Some(haunted_by) = &changes.haunted_by {
                row.haunted_by = haunted_by.clone();
            }
            if let Some(flag) = changes.is_all_day {
                row.is_all_day = flag;
            }
            if let Some(flag) = changes.is_has_ends_at {
                row.is_has_ends_at = flag;
            }
            if let Some(flag) = changes.is_featured {
                row.is_featured = flag;
            }
            if let Some(flag) = changes.is_active {
                row.is_active = flag;
            }
            // The rule lives on the series parent only.
            if let Some(rule) = &changes.recurrence_rule {
                if row.recurring_event_id.is_none() {
                    row.recurrence_rule = rule.clone();
                }
            }

            row.starts_at += start_delta;
            row.ends_at += end_delta;
            if row.ends_at < row.starts_at {
                return Err(AppError::invalid_field(
                    "endsAt",
                    format!(
                        "End date must be after or equal to start date (occurrence {})",
                        row.starts_at.to_rfc3339()
                    ),
                ));
            }

            row.updated_at = now;
            Ok(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, d, h, 0, 0).unwrap()
    }

    fn draft() -> EventDraft {
        EventDraft {
            name: "Hayride".into(),
            slug: "hayride".into(),
            description: Some("Around the pumpkin patch".into()),
            starts_at: at(4, 10),
            ends_at: at(4, 12),
            is_all_day: false,
            is_has_ends_at: true,
            is_featured: false,
            is_active: true,
            haunted_by: None,
            recurrence_rule: Some("FREQ=DAILY;COUNT=5".into()),
        }
    }

    fn five_day_series() -> Vec<Event> {
        let dates: Vec<_> = (4..9).map(|d| at(d, 10)).collect();
        plan_series(draft(), &dates, at(1, 0))
    }

    #[test]
    fn series_has_one_parent_and_linked_children() {
        let rows = five_day_series();
        assert_eq!(rows.len(), 5);

        let parent = &rows[0];
        assert!(parent.recurring_event_id.is_none());
        assert_eq!(parent.recurrence_rule.as_deref(), Some("FREQ=DAILY;COUNT=5"));

        for child in &rows[1..] {
            assert_eq!(child.recurring_event_id, Some(parent.id));
            assert!(child.recurrence_rule.is_none());
            assert_eq!(child.name, parent.name);
            assert_eq!(child.slug, parent.slug);
            assert_eq!(child.description, parent.description);
            assert_eq!(child.ends_at - child.starts_at, Duration::hours(2));
        }
    }

    #[test]
    fn single_date_is_not_a_series() {
        let rows = plan_series(draft(), &[at(4, 10)], at(1, 0));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].recurring_event_id.is_none());
        assert!(rows[0].recurrence_rule.is_none());
    }

    #[test]
    fn no_dates_plan_nothing() {
        assert!(plan_series(draft(), &[], at(1, 0)).is_empty());
    }

    #[test]
    fn all_scope_covers_parent_and_children() {
        let rows = five_day_series();
        let target = rows[2].clone();
        assert_eq!(select(&target, rows.clone(), Scope::All).len(), 5);
    }

    #[test]
    fn future_scope_includes_target_and_later() {
        let rows = five_day_series();
        let target = rows[1].clone();
        let selected = select(&target, rows.clone(), Scope::Future);

        let ids: Vec<_> = selected.iter().map(|e| e.id).collect();
        assert_eq!(ids, rows[1..].iter().map(|e| e.id).collect::<Vec<_>>());
    }

    #[test]
    fn lone_event_is_single_whatever_the_scope() {
        let rows = plan_series(draft(), &[at(4, 10)], at(1, 0));
        let target = rows[0].clone();
        assert_eq!(select(&target, rows, Scope::All), vec![target]);
    }

    #[test]
    fn future_update_shifts_each_occurrence_by_the_target_delta() {
        let rows = five_day_series();
        let target = rows[1].clone();
        let selected = select(&target, rows.clone(), Scope::Future);

        let changes = EventChanges {
            name: Some("Night Hayride".into()),
            starts_at: Some(target.starts_at + Duration::hours(8)),
            ends_at: Some(target.ends_at + Duration::hours(9)),
            ..Default::default()
        };
        let updated = plan_update(&target, selected, &changes, at(2, 0)).unwrap();

        assert_eq!(updated.len(), 4);
        for (before, after) in rows[1..].iter().zip(&updated) {
            assert_eq!(after.id, before.id);
            assert_eq!(after.name, "Night Hayride");
            assert_eq!(after.starts_at, before.starts_at + Duration::hours(8));
            assert_eq!(after.ends_at, before.ends_at + Duration::hours(9));
        }
        // Distinct days survive the shift.
        assert!(updated.windows(2).all(|w| w[1].starts_at - w[0].starts_at == Duration::days(1)));
    }

    #[test]
    fn all_update_applies_identical_fields_everywhere() {
        let rows = five_day_series();
        let target = rows[3].clone();
        let changes = EventChanges {
            is_featured: Some(true),
            description: Some(None),
            ..Default::default()
        };
        let updated =
            plan_update(&target, select(&target, rows.clone(), Scope::All), &changes, at(2, 0))
                .unwrap();

        assert_eq!(updated.len(), 5);
        for (before, after) in rows.iter().zip(&updated) {
            assert!(after.is_featured);
            assert!(after.description.is_none());
            assert_eq!(after.starts_at, before.starts_at);
        }
    }

    #[test]
    fn rule_changes_stay_on_the_parent() {
        let rows = five_day_series();
        let target = rows[0].clone();
        let changes = EventChanges {
            recurrence_rule: Some(Some("FREQ=DAILY;COUNT=9".into())),
            ..Default::default()
        };
        let updated =
            plan_update(&target, select(&target, rows, Scope::All), &changes, at(2, 0)).unwrap();

        assert_eq!(updated[0].recurrence_rule.as_deref(), Some("FREQ=DAILY;COUNT=9"));
        assert!(updated[1..].iter().all(|e| e.recurrence_rule.is_none()));
    }

    #[test]
    fn shift_that_inverts_an_occurrence_is_rejected() {
        let rows = five_day_series();
        let target = rows[0].clone();
        let changes = EventChanges {
            starts_at: Some(target.ends_at + Duration::hours(1)),
            ..Default::default()
        };
        let err = plan_update(&target, vec![target.clone()], &changes, at(2, 0)).unwrap_err();
        assert!(matches!(err, AppError::ValidationError { .. }));
    }
}
