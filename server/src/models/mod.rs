pub mod event;
pub mod user;

pub use event::{Event, EventDay, EventDraft};
pub use user::User;
