use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod events;
pub mod users;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    success(HealthPayload {
        status: "ok",
        service: "farm-events-api",
    })
}
