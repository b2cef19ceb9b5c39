use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::password::{hash_password, verify_password};
use super::token::Claims;
use crate::models::User;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::validation::{Credentials, PasswordChange};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub token: String,
}

// Unknown email and wrong password must be indistinguishable.
fn invalid_credentials() -> AppError {
    AppError::unauthorized("Invalid email or password")
}

pub async fn login(
    state: &AppState,
    credentials: Credentials,
    client_ip: Option<&str>,
) -> AppResult<LoginResponse> {
    if let Some(bot_check) = &state.bot_check {
        let challenge = credentials.challenge.as_deref().unwrap_or_default();
        if !bot_check.verify(challenge, client_ip).await? {
            return Err(AppError::validation("Invalid security token"));
        }
    }

    let user = User::find_by_email(&state.pool, &credentials.email)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !verify_password(user.password.clone(), credentials.password).await? {
        tracing::info!(user = %user.id, "Login rejected: password mismatch");
        return Err(invalid_credentials());
    }

    let token = state.tokens.issue(&user)?;
    tracing::info!(user = %user.id, "Staff login");

    Ok(LoginResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        token,
    })
}

/// Replaces the caller's password after re-checking the current one.
pub async fn change_password(pool: &PgPool, caller: &Claims, change: PasswordChange) -> AppResult<()> {
    let user = User::find_by_id(pool, caller.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(user.password.clone(), change.current_password.clone()).await? {
        return Err(AppError::invalid_field(
            "currentPassword",
            "Current password is incorrect",
        ));
    }

    if change.new_password == change.current_password
        || verify_password(user.password.clone(), change.new_password.clone()).await?
    {
        return Err(AppError::invalid_field(
            "newPassword",
            "New password must be different from current password",
        ));
    }

    let hash = hash_password(change.new_password).await?;
    User::update_password(pool, user.id, &hash).await?;
    tracing::info!(user = %user.id, "Password changed");

    Ok(())
}
