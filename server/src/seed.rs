//! Start-up seeding of staff accounts. Accounts are never created through
//! the API.

use std::env;

use sqlx::PgPool;

use crate::auth::password::hash_password;
use crate::models::User;
use crate::utils::error::AppResult;

const DEFAULT_PASSWORD: &str = "changeme";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
}

/// Parses `Name <email>` entries separated by `;`. Malformed entries are
/// skipped with a warning.
pub fn parse_seed_users(value: &str) -> Vec<SeedUser> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let parsed = entry.split_once('<').and_then(|(name, rest)| {
                let email = rest.strip_suffix('>')?.trim();
                let name = name.trim();
                (!name.is_empty() && email.contains('@')).then(|| SeedUser {
                    name: name.to_string(),
                    email: email.to_string(),
                })
            });
            if parsed.is_none() {
                tracing::warn!(entry, "Skipping malformed SEED_USERS entry");
            }
            parsed
        })
        .collect()
}

/// Seeds staff users when `FORCE_SEED=true`. Existing accounts are kept.
pub async fn run_from_env(pool: &PgPool) -> AppResult<()> {
    if env::var("FORCE_SEED").map(|v| v == "true").unwrap_or(false) {
        let users = parse_seed_users(&env::var("SEED_USERS").unwrap_or_default());
        let password =
            env::var("DEFAULT_USER_PASSWORD").unwrap_or_else(|_| DEFAULT_PASSWORD.to_string());
        seed_users(pool, &users, password).await
    } else {
        tracing::debug!("Skipping seed - FORCE_SEED not set to true");
        Ok(())
    }
}

pub async fn seed_users(pool: &PgPool, users: &[SeedUser], password: String) -> AppResult<()> {
    if users.is_empty() {
        tracing::warn!("FORCE_SEED set but SEED_USERS is empty");
        return Ok(());
    }

    let hash = hash_password(password).await?;
    for user in users {
        if User::insert_if_absent(pool, &user.name, &user.email, &hash).await? {
            tracing::info!(email = %user.email, "Seeded staff user");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_addresses() {
        let users = parse_seed_users("Farm Office <office@farm.example>; Gate Crew <gate@farm.example>");
        assert_eq!(
            users,
            vec![
                SeedUser {
                    name: "Farm Office".into(),
                    email: "office@farm.example".into(),
                },
                SeedUser {
                    name: "Gate Crew".into(),
                    email: "gate@farm.example".into(),
                },
            ]
        );
    }

    #[test]
    fn skips_malformed_entries() {
        let users = parse_seed_users("nobody;Farm Office <office@farm.example>;<x@y.z>");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "office@farm.example");
    }
}
