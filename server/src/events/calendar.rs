use chrono::Datelike;
use chrono_tz::Tz;

use crate::models::{Event, EventDay};

const DAY_LABEL_FORMAT: &str = "%A, %B %-d, %Y";

/// Groups events under labels such as "Saturday, October 25, 2025", using
/// the calendar day in `tz`. Groups are ordered by their first event.
pub fn group_by_day(events: Vec<Event>, tz: Tz) -> Vec<EventDay> {
    let mut days: Vec<EventDay> = Vec::new();

    for event in events {
        let local = event.starts_at.with_timezone(&tz);
        let label = local.format(DAY_LABEL_FORMAT).to_string();

        match days.iter_mut().find(|day| day.day == label) {
            Some(day) => day.events.push(event),
            None => days.push(EventDay {
                day: label,
                day_of_month: local.day(),
                events: vec![event],
            }),
        }
    }

    days.sort_by_key(|day| day.events.first().map(|event| event.starts_at));
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventDraft;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    fn event(name: &str, starts_at: DateTime<Utc>) -> Event {
        EventDraft {
            name: name.into(),
            slug: name.to_lowercase(),
            description: None,
            starts_at,
            ends_at: starts_at,
            is_all_day: false,
            is_has_ends_at: false,
            is_featured: false,
            is_active: true,
            haunted_by: None,
            recurrence_rule: None,
        }
        .into_event(Uuid::new_v4(), None, starts_at)
    }

    #[test]
    fn groups_by_local_calendar_day() {
        let tz = chrono_tz::America::New_York;
        let events = vec![
            event("Maze", Utc.with_ymd_and_hms(2025, 10, 25, 14, 0, 0).unwrap()),
            event("Bonfire", Utc.with_ymd_and_hms(2025, 10, 25, 23, 0, 0).unwrap()),
            // 01:00 UTC on the 26th is still the evening of the 25th in New York.
            event("Hayride", Utc.with_ymd_and_hms(2025, 10, 26, 1, 0, 0).unwrap()),
            event("Pumpkins", Utc.with_ymd_and_hms(2025, 10, 26, 15, 0, 0).unwrap()),
        ];

        let days = group_by_day(events, tz);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].day, "Saturday, October 25, 2025");
        assert_eq!(days[0].day_of_month, 25);
        assert_eq!(days[0].events.len(), 3);
        assert_eq!(days[1].day, "Sunday, October 26, 2025");
        assert_eq!(days[1].events[0].name, "Pumpkins");
    }

    #[test]
    fn empty_input_has_no_days() {
        assert!(group_by_day(Vec::new(), Tz::UTC).is_empty());
    }
}
