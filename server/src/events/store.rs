use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::series::{self, EventChanges, Scope};
use crate::models::{Event, EventDraft};
use crate::utils::error::{AppError, AppResult};

const EVENT_COLUMNS: &str = "id, name, slug, description, starts_at, ends_at, is_all_day, \
     is_has_ends_at, is_featured, is_active, haunted_by, recurrence_rule, recurring_event_id, \
     created_at, updated_at";

/// Listing filters. Only active events are ever listed.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Earliest start instant (inclusive).
    pub starts_at: Option<DateTime<Utc>>,
    /// Latest end instant (inclusive).
    pub ends_at: Option<DateTime<Utc>>,
    /// Hides events that finished before this instant.
    pub ended_after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Created,
    Updated,
}

#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list(&self, filter: &EventFilter) -> Result<Vec<Event>, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {EVENT_COLUMNS} FROM events"));
        push_filters(&mut query, filter);
        query.push(" ORDER BY starts_at ASC, id ASC");
        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = filter.offset {
            query.push(" OFFSET ").push_bind(offset);
        }

        query.build_query_as::<Event>().fetch_all(&self.pool).await
    }

    pub async fn count(&self, filter: &EventFilter) -> Result<i64, sqlx::Error> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events");
        push_filters(&mut query, filter);
        query.build_query_scalar::<i64>().fetch_one(&self.pool).await
    }

    /// Persists a single event or a whole series in one transaction. `dates`
    /// are the occurrence starts; pass just the draft's own start for a
    /// non-recurring event.
    pub async fn create(&self, draft: EventDraft, dates: &[DateTime<Utc>]) -> AppResult<Vec<Event>> {
        let rows = series::plan_series(draft, dates, Utc::now());
        if rows.is_empty() {
            return Err(AppError::invalid_field(
                "recurrenceRule",
                "Recurrence rule produced no occurrences",
            ));
        }

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(rows.len());
        for row in &rows {
            created.push(insert(&mut tx, row).await?);
        }
        tx.commit().await?;

        tracing::info!(
            parent = %created[0].id,
            occurrences = created.len(),
            "Created event"
        );
        Ok(created)
    }

    /// Applies `changes` to the target and, depending on `scope`, to the
    /// rest of its series. All affected rows change or none do.
    pub async fn update(
        &self,
        id: Uuid,
        changes: &EventChanges,
        scope: Scope,
    ) -> AppResult<Vec<Event>> {
        let mut tx = self.pool.begin().await?;

        let target = lock_event(&mut tx, id).await?;
        let affected = affected_rows(&mut tx, &target, scope).await?;
        let planned = series::plan_update(&target, affected, changes, Utc::now())?;

        let mut updated = Vec::with_capacity(planned.len());
        for row in &planned {
            updated.push(write(&mut tx, row).await?);
        }
        tx.commit().await?;

        tracing::info!(%id, ?scope, rows = updated.len(), "Updated event");
        Ok(updated)
    }

    /// Deletes the target and, depending on `scope`, the rest of its series.
    /// Returns the number of rows removed.
    pub async fn delete(&self, id: Uuid, scope: Scope) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        let target = lock_event(&mut tx, id).await?;
        let ids: Vec<Uuid> = affected_rows(&mut tx, &target, scope)
            .await?
            .into_iter()
            .map(|event| event.id)
            .collect();

        let deleted = sqlx::query("DELETE FROM events WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        tracing::info!(%id, ?scope, deleted, "Deleted event");
        Ok(deleted)
    }

    pub async fn find_by_slug_and_start(
        &self,
        slug: &str,
        starts_at: DateTime<Utc>,
    ) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE slug = $1 AND starts_at = $2 \
             ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(slug)
        .bind(starts_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// Writes an imported row keyed on `(slug, starts_at)`. An existing row
    /// keeps its id, rule and series link; only its content is replaced.
    pub async fn upsert_imported(&self, draft: EventDraft) -> Result<ImportOutcome, sqlx::Error> {
        match self
            .find_by_slug_and_start(&draft.slug, draft.starts_at)
            .await?
        {
            Some(existing) => {
                sqlx::query(
                    "UPDATE events SET name = $2, ends_at = $3, description = $4, \
                     is_featured = $5, is_has_ends_at = $6, is_all_day = $7, is_active = $8, \
                     haunted_by = $9, updated_at = NOW() WHERE id = $1",
                )
                .bind(existing.id)
                .bind(&draft.name)
                .bind(draft.ends_at)
                .bind(&draft.description)
                .bind(draft.is_featured)
                .bind(draft.is_has_ends_at)
                .bind(draft.is_all_day)
                .bind(draft.is_active)
                .bind(&draft.haunted_by)
                .execute(&self.pool)
                .await?;
                Ok(ImportOutcome::Updated)
            }
            None => {
                let row = draft.into_event(Uuid::new_v4(), None, Utc::now());
                let mut tx = self.pool.begin().await?;
                insert(&mut tx, &row).await?;
                tx.commit().await?;
                Ok(ImportOutcome::Created)
            }
        }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    query.push(" WHERE is_active = TRUE");
    if let Some(starts_at) = filter.starts_at {
        query.push(" AND starts_at >= ").push_bind(starts_at);
    }
    if let Some(ends_at) = filter.ends_at {
        query.push(" AND ends_at <= ").push_bind(ends_at);
    }
    if let Some(ended_after) = filter.ended_after {
        query.push(" AND ends_at >= ").push_bind(ended_after);
    }
}

async fn lock_event(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<Event> {
    sqlx::query_as::<_, Event>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

async fn affected_rows(
    tx: &mut Transaction<'_, Postgres>,
    target: &Event,
    scope: Scope,
) -> AppResult<Vec<Event>> {
    if scope == Scope::Single {
        return Ok(vec![target.clone()]);
    }

    let series_rows = sqlx::query_as::<_, Event>(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1 OR recurring_event_id = $1 \
         ORDER BY starts_at ASC, id ASC FOR UPDATE"
    ))
    .bind(target.series_id())
    .fetch_all(&mut **tx)
    .await?;

    Ok(series::select(target, series_rows, scope))
}

async fn insert(tx: &mut Transaction<'_, Postgres>, event: &Event) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(&format!(
        "INSERT INTO events ({EVENT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         RETURNING {EVENT_COLUMNS}"
    ))
    .bind(event.id)
    .bind(&event.name)
    .bind(&event.slug)
    .bind(&event.description)
    .bind(event.starts_at)
    .bind(event.ends_at)
    .bind(event.is_all_day)
    .bind(event.is_has_ends_at)
    .bind(event.is_featured)
    .bind(event.is_active)
    .bind(&event.haunted_by)
    .bind(&event.recurrence_rule)
    .bind(event.recurring_event_id)
    .bind(event.created_at)
    .bind(event.updated_at)
    .fetch_one(&mut **tx)
    .await
}

async fn write(tx: &mut Transaction<'_, Postgres>, event: &Event) -> Result<Event, sqlx::Error> {
    sqlx::query_as::<_, Event>(&format!(
        "UPDATE events SET name = $2, slug = $3, description = $4, starts_at = $5, \
         ends_at = $6, is_all_day = $7, is_has_ends_at = $8, is_featured = $9, \
         is_active = $10, haunted_by = $11, recurrence_rule = $12, updated_at = $13 \
         WHERE id = $1 RETURNING {EVENT_COLUMNS}"
    ))
    .bind(event.id)
    .bind(&event.name)
    .bind(&event.slug)
    .bind(&event.description)
    .bind(event.starts_at)
    .bind(event.ends_at)
    .bind(event.is_all_day)
    .bind(event.is_has_ends_at)
    .bind(event.is_featured)
    .bind(event.is_active)
    .bind(&event.haunted_by)
    .bind(&event.recurrence_rule)
    .bind(event.updated_at)
    .fetch_one(&mut **tx)
    .await
}
