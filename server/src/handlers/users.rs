use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;

use crate::auth::{service, AuthUser, ClientIp};
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::response::{status_message, success};
use crate::validation::{
    validate_change_password, validate_login, ChangePasswordPayload, LoginPayload,
};

pub async fn login(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload?;
    let credentials = validate_login(payload, state.bot_check.is_some())?;

    let response = service::login(&state, credentials, client_ip.as_deref()).await?;
    Ok(success(response))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ChangePasswordPayload>, JsonRejection>,
) -> AppResult<Response> {
    let Json(payload) = payload?;
    let change = validate_change_password(payload)?;

    service::change_password(&state.pool, &user, change).await?;
    Ok(status_message("Password changed successfully"))
}
