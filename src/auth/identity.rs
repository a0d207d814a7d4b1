// Email + password identity provider
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;

use crate::auth::profile::{load_session_user, SessionUser};
use crate::config::AuthConfig;
use crate::db::models::Role;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::store::{Change, ChangeFeed};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct IdentityProvider {
    pool: DbPool,
    feed: ChangeFeed,
    auth: AuthConfig,
}

impl IdentityProvider {
    pub fn new(pool: DbPool, feed: ChangeFeed, auth: AuthConfig) -> Self {
        Self { pool, feed, auth }
    }

    fn is_campus_email(&self, email: &str) -> bool {
        let domain = self.auth.email_domain.to_ascii_lowercase();
        let email = email.to_ascii_lowercase();
        email.ends_with(&domain) && email.len() > domain.len()
    }

    pub fn register(&self, registration: Registration) -> AppResult<SessionUser> {
        let email = registration.email.trim().to_string();
        if !self.is_campus_email(&email) {
            return Err(AppError::Auth(
                "You must use a campus email to sign up.".into(),
            ));
        }
        if registration.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Auth(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password_hash = bcrypt::hash(&registration.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
        let role = if self.auth.is_admin_email(&email) {
            Role::Admin
        } else {
            Role::User
        };
        let name = registration
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let id = uuid::Uuid::now_v7().to_string();
        let conn = self.pool.get()?;
        let inserted = conn.execute(
            "INSERT INTO users (id, email, password_hash, name, role, reputation_score)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)
             ON CONFLICT(email) DO NOTHING",
            params![id, email, password_hash, name, role],
        )?;
        if inserted == 0 {
            return Err(AppError::Auth(
                "The email address is already in use by another account.".into(),
            ));
        }

        tracing::info!(user_id = %id, %role, "Account registered");
        self.feed.publish(Change::Users);
        load_session_user(&conn, &id)
    }

    pub fn sign_in(&self, credentials: &Credentials) -> AppResult<SessionUser> {
        let conn = self.pool.get()?;
        let account: Option<(String, String)> = conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE email = ?1",
                params![credentials.email.trim()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let verified = account.filter(|(_, hash)| {
            bcrypt::verify(&credentials.password, hash).unwrap_or(false)
        });
        let Some((user_id, _)) = verified else {
            tracing::warn!("Failed sign-in attempt");
            return Err(AppError::Auth("Invalid email or password".into()));
        };

        tracing::info!(%user_id, "Signed in");
        load_session_user(&conn, &user_id)
    }

    /// Promote every allow-listed account to admin. Returns the number changed.
    pub fn sync_admin_roles(&self) -> AppResult<usize> {
        let conn = self.pool.get()?;
        let mut promoted = 0;
        for email in &self.auth.admin_emails {
            promoted += conn.execute(
                "UPDATE users SET role = 'admin' WHERE email = ?1 AND role <> 'admin'",
                params![email],
            )?;
        }
        if promoted > 0 {
            tracing::info!(promoted, "Admin roles synchronised");
            self.feed.publish(Change::Users);
        }
        Ok(promoted)
    }
}
