use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::events::{calendar, import, recurrence, EventFilter, Scope};
use crate::models::Event;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::success;
use crate::validation::{
    parse_instant, validate_create, validate_update, CreateEventPayload, UpdateEventPayload,
    Violations,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub show_past_events: Option<bool>,
    pub with_total: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub scope: Scope,
}

/// One event, or every row a series operation produced.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EventsBody {
    One(Event),
    Many { events: Vec<Event> },
}

impl EventsBody {
    fn from_rows(mut rows: Vec<Event>, many: bool) -> Self {
        if !many && rows.len() == 1 {
            if let Some(event) = rows.pop() {
                return EventsBody::One(event);
            }
        }
        EventsBody::Many { events: rows }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatedBody {
    #[serde(flatten)]
    body: EventsBody,
    created_by: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdatedBody {
    #[serde(flatten)]
    body: EventsBody,
    updated_by: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedBody {
    success: bool,
    message: String,
    deleted_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
}

impl DeletedBody {
    /// Single deletes report only the message; series deletes add the count.
    fn new(scope: Scope, count: u64, deleted_by: String) -> Self {
        let (message, count) = match scope {
            Scope::Single => ("Event deleted successfully".to_string(), None),
            _ => (format!("{count} event(s) deleted successfully"), Some(count)),
        };
        Self {
            success: true,
            message,
            deleted_by,
            count,
        }
    }
}

#[derive(Serialize)]
struct EventPage {
    events: Vec<Event>,
    total: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportBody {
    message: String,
    results: Vec<String>,
    imported_by: String,
}

fn event_id(path: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|_| AppError::NotFound("Event not found".to_string()))
}

/// Unless past events are requested, or an explicit start bound is given,
/// events that already finished are hidden.
pub fn list_filter(query: &ListQuery, tz: Tz, now: DateTime<Utc>) -> AppResult<EventFilter> {
    let mut violations = Violations::default();

    let mut instant = |field: &str, raw: &Option<String>| {
        raw.as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .and_then(|raw| {
                let parsed = parse_instant(raw, tz);
                if parsed.is_none() {
                    violations.push(field, format!("'{raw}' is not a valid date"));
                }
                parsed
            })
    };
    let starts_at = instant("startsAt", &query.starts_at);
    let ends_at = instant("endsAt", &query.ends_at);

    if query.limit.is_some_and(|limit| limit < 0) {
        violations.push("limit", "Limit must not be negative");
    }
    if query.offset.is_some_and(|offset| offset < 0) {
        violations.push("offset", "Offset must not be negative");
    }
    violations.finish()?;

    let show_past = query.show_past_events.unwrap_or(false) || starts_at.is_some();
    Ok(EventFilter {
        starts_at,
        ends_at,
        ended_after: (!show_past).then_some(now),
        limit: query.limit,
        offset: query.offset,
    })
}

pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let filter = list_filter(&query, state.config.timezone, Utc::now())?;

    let events = state.events.list(&filter).await?;
    if query.with_total.unwrap_or(false) {
        let total = state.events.count(&filter).await?;
        return Ok(success(EventPage { events, total }));
    }
    Ok(success(events))
}

pub async fn events_by_day(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query?;
    let filter = list_filter(&query, state.config.timezone, Utc::now())?;

    let events = state.events.list(&filter).await?;
    Ok(success(calendar::group_by_day(events, state.config.timezone)))
}

pub async fn get_event(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    caller: Option<AuthUser>,
) -> AppResult<Response> {
    let id = event_id(path)?;
    let event = state
        .events
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if !event.is_active && caller.is_none() {
        return Err(AppError::unauthorized(
            "Unauthorized: Cannot access inactive events",
        ));
    }

    Ok(success(event))
}

pub async fn create_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateEventPayload>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload?;
    let draft = validate_create(payload, state.config.timezone)?;

    let dates = match &draft.recurrence_rule {
        Some(rule) => recurrence::expand(draft.starts_at, rule, state.config.recurrence_limit)?,
        None => vec![draft.starts_at],
    };
    let created = state.events.create(draft, &dates).await?;

    Ok(success(CreatedBody {
        body: EventsBody::from_rows(created, false),
        created_by: user.email,
    }))
}

pub async fn update_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateEventPayload>, JsonRejection>,
) -> AppResult<Response> {
    let id = event_id(path)?;
    let Json(payload) = payload?;
    let (changes, scope) = validate_update(payload, state.config.timezone)?;

    let updated = state.events.update(id, &changes, scope).await?;

    Ok(success(UpdatedBody {
        body: EventsBody::from_rows(updated, scope != Scope::Single),
        updated_by: user.email,
    }))
}

pub async fn delete_event(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<DeleteQuery>, QueryRejection>,
) -> AppResult<Response> {
    let id = event_id(path)?;
    let Query(DeleteQuery { scope }) = query?;

    let count = state.events.delete(id, scope).await?;
    Ok(success(DeletedBody::new(scope, count, user.email)))
}

pub async fn import_events(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            upload = Some(field.bytes().await?);
            break;
        }
    }
    let data = upload.ok_or_else(|| AppError::validation("No file uploaded"))?;

    let rows = import::parse_csv(&data, state.config.timezone)?;
    let report = import::run(&state.events, rows).await?;

    Ok(success(ImportBody {
        message: format!("Imported {} events", report.total),
        results: report.results,
        imported_by: user.email,
    }))
}
