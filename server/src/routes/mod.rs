use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, security_headers, LegacyEventsRedirectLayer};
use crate::handlers::{events, health_check, users};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let cors = create_cors_layer(&state.config.cors_allowed_origins);
    let include_hsts = state.config.production;

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/by-day", get(events::events_by_day))
        .route("/events/import", post(events::import_events))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/users/login", post(users::login))
        .route("/users/change-password", post(users::change_password))
        .with_state(state)
        .layer(LegacyEventsRedirectLayer);

    security_headers(api, include_hsts)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
