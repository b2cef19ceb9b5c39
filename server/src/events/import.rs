//! Bulk event import from CSV exports of the legacy calendar.
//!
//! Rows are keyed on `(slug, starts_at)`: a matching row is updated in place,
//! anything else is inserted. The whole file is parsed before the first write.
//! Rows are written one at a time and a store failure stops the import,
//! leaving earlier rows committed.

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};

use super::store::{EventStore, ImportOutcome};
use crate::models::EventDraft;
use crate::utils::error::{AppError, AppResult};
use crate::validation::{local_to_utc, optional_text};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    slug: String,
    starts_at: String,
    ends_at: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    is_featured: Option<String>,
    #[serde(default)]
    is_has_ends_at: Option<String>,
    #[serde(default)]
    is_all_day: Option<String>,
    #[serde(default)]
    is_active: Option<String>,
    #[serde(default)]
    haunted_by: Option<String>,
}

/// A parsed row plus the timestamp text used in the result lines.
#[derive(Debug, Clone)]
pub struct ImportRow {
    pub label: String,
    pub draft: EventDraft,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub results: Vec<String>,
    pub total: usize,
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim) == Some("1")
}

fn timestamp(value: &str, tz: Tz, line: u64, column: &str) -> AppResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .ok()
        .and_then(|naive| local_to_utc(naive, tz))
        .ok_or_else(|| {
            AppError::validation(format!(
                "Error processing CSV file: line {line}: {column} '{value}' is not a valid \
                 yyyy-MM-dd HH:mm:ss timestamp"
            ))
        })
}

/// Parses every row of `data`. Timestamps are wall-clock times in `tz`.
pub fn parse_csv(data: &[u8], tz: Tz) -> AppResult<Vec<ImportRow>> {
    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(data);
    let mut rows = Vec::new();

    for record in reader.deserialize::<CsvRow>() {
        let row = record
            .map_err(|e| AppError::validation(format!("Error processing CSV file: {e}")))?;
        let line = rows.len() as u64 + 2;

        let starts_at = timestamp(&row.starts_at, tz, line, "starts_at")?;
        let ends_at = timestamp(&row.ends_at, tz, line, "ends_at")?;
        if row.name.trim().is_empty() || row.slug.trim().is_empty() {
            return Err(AppError::validation(format!(
                "Error processing CSV file: line {line}: name and slug are required"
            )));
        }
        if ends_at < starts_at {
            return Err(AppError::validation(format!(
                "Error processing CSV file: line {line}: ends_at is before starts_at"
            )));
        }

        rows.push(ImportRow {
            label: row.starts_at.trim().to_string(),
            draft: EventDraft {
                name: row.name.trim().to_string(),
                slug: row.slug.trim().to_string(),
                description: optional_text(row.description),
                starts_at,
                ends_at,
                is_all_day: flag(&row.is_all_day),
                is_has_ends_at: flag(&row.is_has_ends_at),
                is_featured: flag(&row.is_featured),
                is_active: flag(&row.is_active),
                haunted_by: optional_text(row.haunted_by),
                recurrence_rule: None,
            },
        });
    }

    Ok(rows)
}

pub async fn run(store: &EventStore, rows: Vec<ImportRow>) -> AppResult<ImportReport> {
    let mut results = Vec::with_capacity(rows.len());

    for ImportRow { label, draft } in rows {
        let name = draft.name.clone();
        let outcome = store.upsert_imported(draft).await?;
        results.push(result_line(outcome, &name, &label));
    }

    let total = results.len();
    tracing::info!(total, "Imported events");
    Ok(ImportReport { results, total })
}

fn result_line(outcome: ImportOutcome, name: &str, label: &str) -> String {
    match outcome {
        ImportOutcome::Created => format!("Created {name} @ {label}"),
        ImportOutcome::Updated => format!("Updated {name} @ {label}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CSV: &str = "\
name,slug,starts_at,ends_at,description,is_featured,is_has_ends_at,is_all_day,is_active,haunted_by
Corn Maze,corn-maze,2025-10-04 10:00:00,2025-10-04 18:00:00,Get lost,1,1,0,1,
Haunted Hayride,haunted-hayride,2025-10-31 19:00:00,2025-10-31 22:00:00,,0,1,0,1,The Headless Farmer
";

    #[test]
    fn parses_rows_and_flags() {
        let rows = parse_csv(CSV.as_bytes(), Tz::UTC).unwrap();
        assert_eq!(rows.len(), 2);

        let maze = &rows[0];
        assert_eq!(maze.label, "2025-10-04 10:00:00");
        assert_eq!(maze.draft.slug, "corn-maze");
        assert_eq!(
            maze.draft.starts_at,
            Utc.with_ymd_and_hms(2025, 10, 4, 10, 0, 0).unwrap()
        );
        assert!(maze.draft.is_featured);
        assert!(maze.draft.is_has_ends_at);
        assert!(!maze.draft.is_all_day);
        assert!(maze.draft.is_active);
        assert_eq!(maze.draft.description.as_deref(), Some("Get lost"));
        assert!(maze.draft.haunted_by.is_none());

        let hayride = &rows[1];
        assert!(hayride.draft.description.is_none());
        assert_eq!(hayride.draft.haunted_by.as_deref(), Some("The Headless Farmer"));
    }

    #[test]
    fn timestamps_are_site_local() {
        let rows = parse_csv(CSV.as_bytes(), chrono_tz::America::New_York).unwrap();
        assert_eq!(
            rows[0].draft.starts_at,
            Utc.with_ymd_and_hms(2025, 10, 4, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn bad_timestamp_aborts_the_whole_file() {
        let csv = "name,slug,starts_at,ends_at\nMaze,maze,2025-10-04,2025-10-04 18:00:00\n";
        let err = parse_csv(csv.as_bytes(), Tz::UTC).unwrap_err();
        match err {
            AppError::ValidationError { message, .. } => assert!(message.contains("line 2")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_optional_columns_default_to_off() {
        let csv = "name,slug,starts_at,ends_at\nMaze,maze,2025-10-04 10:00:00,2025-10-04 18:00:00\n";
        let rows = parse_csv(csv.as_bytes(), Tz::UTC).unwrap();
        assert!(!rows[0].draft.is_active);
        assert!(!rows[0].draft.is_featured);
    }

    #[test]
    fn result_lines_name_the_outcome() {
        assert_eq!(
            result_line(ImportOutcome::Created, "Maze", "2025-10-04 10:00:00"),
            "Created Maze @ 2025-10-04 10:00:00"
        );
        assert_eq!(
            result_line(ImportOutcome::Updated, "Maze", "2025-10-04 10:00:00"),
            "Updated Maze @ 2025-10-04 10:00:00"
        );
    }
}
