use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_all_day: bool,
    pub is_has_ends_at: bool,
    pub is_featured: bool,
    pub is_active: bool,
    pub haunted_by: Option<String>,
    pub recurrence_rule: Option<String>,
    pub recurring_event_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Id shared by every member of this event's series: the parent's id.
    pub fn series_id(&self) -> Uuid {
        self.recurring_event_id.unwrap_or(self.id)
    }
}

/// Field values for an event row that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_all_day: bool,
    pub is_has_ends_at: bool,
    pub is_featured: bool,
    pub is_active: bool,
    pub haunted_by: Option<String>,
    pub recurrence_rule: Option<String>,
}

impl EventDraft {
    pub fn duration(&self) -> Duration {
        self.ends_at - self.starts_at
    }

    /// Materialises the draft as a row. `recurring_event_id` links a child to
    /// its parent; children never carry the rule themselves.
    pub fn into_event(
        self,
        id: Uuid,
        recurring_event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Event {
        let recurrence_rule = match recurring_event_id {
            Some(_) => None,
            None => self.recurrence_rule,
        };
        Event {
            id,
            name: self.name,
            slug: self.slug,
            description: self.description,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            is_all_day: self.is_all_day,
            is_has_ends_at: self.is_has_ends_at,
            is_featured: self.is_featured,
            is_active: self.is_active,
            haunted_by: self.haunted_by,
            recurrence_rule,
            recurring_event_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDay {
    pub day: String,
    pub day_of_month: u32,
    pub events: Vec<Event>,
}
