//! Recurrence rule expansion.
//!
//! Rules use the iCalendar RRULE grammar (`FREQ=WEEKLY;INTERVAL=1;COUNT=6`).
//! The series is always anchored at the event's own start instant: any
//! `DTSTART` carried in the rule text is replaced by it.

use std::fmt;

use chrono::{DateTime, Utc};
use rrule::RRuleSet;

use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceEnd {
    Never,
    Count(u32),
    Until(DateTime<Utc>),
}

/// Structured recurrence inputs from the admin form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceOptions {
    pub frequency: Frequency,
    pub interval: u32,
    pub end: RecurrenceEnd,
}

impl RecurrenceOptions {
    pub fn to_rule(&self) -> String {
        let mut rule = format!("FREQ={};INTERVAL={}", self.frequency, self.interval);
        match self.end {
            RecurrenceEnd::Never => {}
            RecurrenceEnd::Count(count) => rule.push_str(&format!(";COUNT={count}")),
            RecurrenceEnd::Until(until) => {
                rule.push_str(&format!(";UNTIL={}", until.format("%Y%m%dT%H%M%SZ")))
            }
        }
        rule
    }
}

/// Builds the text the rrule parser expects: our DTSTART followed by the
/// rule's RRULE/RDATE/EXDATE lines.
fn rule_set_source(starts_at: DateTime<Utc>, rule: &str) -> String {
    let mut lines = vec![format!("DTSTART:{}", starts_at.format("%Y%m%dT%H%M%SZ"))];

    for line in rule.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let upper = line.to_ascii_uppercase();
        if upper.starts_with("DTSTART") {
            continue;
        }
        if upper.starts_with("RRULE:") || upper.starts_with("RDATE") || upper.starts_with("EXDATE")
        {
            lines.push(line.to_string());
        } else {
            lines.push(format!("RRULE:{line}"));
        }
    }

    lines.join("\n")
}

fn is_bounded(rule: &str) -> bool {
    rule.lines()
        .map(|line| line.trim().to_ascii_uppercase())
        .filter(|line| !line.starts_with("DTSTART"))
        .any(|line| line.contains("COUNT=") || line.contains("UNTIL="))
}

/// Produces the ordered, de-duplicated occurrence starts of `rule` anchored
/// at `starts_at`. Rules without COUNT or UNTIL stop after `limit` dates;
/// a bounded rule that would produce more than `limit` dates is rejected.
pub fn expand(starts_at: DateTime<Utc>, rule: &str, limit: u16) -> AppResult<Vec<DateTime<Utc>>> {
    let source = rule_set_source(starts_at, rule);

    let rule_set: RRuleSet = source.parse().map_err(|e| {
        AppError::invalid_field("recurrenceRule", format!("Invalid recurrence rule: {e}"))
    })?;

    let result = if is_bounded(rule) {
        // One extra date tells an exact fit apart from an overflow.
        let result = rule_set.all(limit.saturating_add(1));
        if result.dates.len() > usize::from(limit) {
            return Err(AppError::invalid_field(
                "recurrenceRule",
                format!(
                    "Recurrence rule produces more than {limit} occurrences \
                     (RECURRENCE_MAX_OCCURRENCES)"
                ),
            ));
        }
        result
    } else {
        let result = rule_set.all(limit);
        if result.limited {
            tracing::warn!(rule, limit, "Recurrence rule truncated at the occurrence limit");
        }
        result
    };

    let mut dates: Vec<DateTime<Utc>> = result
        .dates
        .iter()
        .map(|date| date.with_timezone(&Utc))
        .collect();
    dates.sort();
    dates.dedup();

    if dates.is_empty() {
        return Err(AppError::invalid_field(
            "recurrenceRule",
            "Recurrence rule produced no occurrences",
        ));
    }

    Ok(dates)
}
