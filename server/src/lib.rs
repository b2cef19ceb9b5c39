//! HTTP API for the farm's event calendar: public listings, staff-only event
//! management with recurring series, CSV import, and staff login.

pub mod auth;
pub mod config;
pub mod events;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod seed;
pub mod state;
pub mod utils;
pub mod validation;
