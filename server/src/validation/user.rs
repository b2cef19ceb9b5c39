use serde::Deserialize;

use super::{is_valid_email, Violations, MIN_PASSWORD_LENGTH};
use crate::utils::error::AppResult;

#[derive(Debug, Default, Deserialize)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
    /// Bot-check challenge token from the login form.
    pub token: Option<String>,
}

/// Login credentials after validation. The password is kept exactly as typed.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub challenge: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordPayload {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

fn password(
    violations: &mut Violations,
    field: &str,
    value: Option<&str>,
    missing: &str,
    too_short: &str,
) -> Option<String> {
    violations.required(field, value, missing)?;
    let raw = value.unwrap_or_default();
    if raw.trim().chars().count() < MIN_PASSWORD_LENGTH {
        violations.push(field, too_short);
        return None;
    }
    Some(raw.to_string())
}

pub fn validate_login(payload: LoginPayload, require_challenge: bool) -> AppResult<Credentials> {
    let mut violations = Violations::default();

    let email = violations.required("email", payload.email.as_deref(), "Please enter your email.");
    if let Some(email) = &email {
        if !is_valid_email(email) {
            violations.push("email", "Please enter a valid email.");
        }
    }
    let password = password(
        &mut violations,
        "password",
        payload.password.as_deref(),
        "Please enter your password.",
        "Password must be at least 6 characters.",
    );
    let challenge = payload
        .token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if require_challenge && challenge.is_none() {
        violations.push("token", "Invalid security token");
    }

    violations.finish()?;

    Ok(Credentials {
        email: email.unwrap_or_default(),
        password: password.unwrap_or_default(),
        challenge,
    })
}

pub fn validate_change_password(payload: ChangePasswordPayload) -> AppResult<PasswordChange> {
    let mut violations = Violations::default();

    let current_password = password(
        &mut violations,
        "currentPassword",
        payload.current_password.as_deref(),
        "Please enter your current password.",
        "Current password must be at least 6 characters.",
    );
    let new_password = password(
        &mut violations,
        "newPassword",
        payload.new_password.as_deref(),
        "Please enter a new password.",
        "New password must be at least 6 characters.",
    );
    let confirm = violations.required(
        "confirmPassword",
        payload.confirm_password.as_deref(),
        "Please confirm your new password.",
    );
    if let (Some(confirm), Some(new_password)) = (&confirm, &new_password) {
        if confirm != new_password.trim() {
            violations.push("confirmPassword", "Passwords do not match.");
        }
    }

    violations.finish()?;

    Ok(PasswordChange {
        current_password: current_password.unwrap_or_default(),
        new_password: new_password.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::AppError;

    fn fields(err: AppError) -> Vec<String> {
        match err {
            AppError::ValidationError { fields, .. } => {
                fields.into_iter().map(|f| f.field).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn login_requires_email_and_long_enough_password() {
        let err = validate_login(
            LoginPayload {
                email: Some("not-an-email".into()),
                password: Some("abc".into()),
                token: None,
            },
            false,
        )
        .unwrap_err();
        assert_eq!(fields(err), vec!["email", "password"]);
    }

    #[test]
    fn login_challenge_only_required_when_enabled() {
        let payload = || LoginPayload {
            email: Some("staff@farm.example".into()),
            password: Some("hayride!".into()),
            token: None,
        };
        assert!(validate_login(payload(), false).is_ok());
        assert_eq!(
            fields(validate_login(payload(), true).unwrap_err()),
            vec!["token"]
        );
    }

    #[test]
    fn change_password_confirmation_must_match() {
        let err = validate_change_password(ChangePasswordPayload {
            current_password: Some("hayride!".into()),
            new_password: Some("cornmaze!".into()),
            confirm_password: Some("cornmaze?".into()),
        })
        .unwrap_err();
        assert_eq!(fields(err), vec!["confirmPassword"]);
    }

    #[test]
    fn change_password_reports_each_missing_field() {
        let err = validate_change_password(ChangePasswordPayload::default()).unwrap_err();
        assert_eq!(
            fields(err),
            vec!["currentPassword", "newPassword", "confirmPassword"]
        );
    }

    #[test]
    fn change_password_keeps_raw_values() {
        let change = validate_change_password(ChangePasswordPayload {
            current_password: Some("hayride!".into()),
            new_password: Some("cornmaze!".into()),
            confirm_password: Some("cornmaze!".into()),
        })
        .unwrap();
        assert_eq!(change.current_password, "hayride!");
        assert_eq!(change.new_password, "cornmaze!");
    }
}
