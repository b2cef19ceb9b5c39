//! Event calendar: recurrence expansion, series planning, persistence,
//! CSV import and the day-grouped public listing.

pub mod calendar;
pub mod import;
pub mod recurrence;
pub mod series;
pub mod store;

pub use series::{EventChanges, Scope};
pub use store::{EventFilter, EventStore, ImportOutcome};
