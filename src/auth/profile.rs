// Session principal: the account joined with its campus profile
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::models::{Role, UserProfile};
use crate::error::{AppError, AppResult};

/// The signed-in user as every handler sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    pub is_admin: bool,
}

impl SessionUser {
    /// Profile name, else the local part of the e-mail address.
    pub fn display_name(&self) -> String {
        let name = self.profile.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.email
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

const USER_COLUMNS: &str = "id, email, name, department, section, register_number,
    photo_url, role, reputation_score";

fn row_to_session_user(row: &Row<'_>) -> rusqlite::Result<SessionUser> {
    let role: Role = row.get(7)?;
    Ok(SessionUser {
        id: row.get(0)?,
        email: row.get(1)?,
        // Missing profile fields read as empty
        profile: UserProfile {
            name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            department: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            section: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            register_number: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            photo_url: row.get(6)?,
            role,
            reputation_score: row.get(8)?,
        },
        is_admin: role == Role::Admin,
    })
}

/// Re-run the account/profile merge for one user.
pub fn load_session_user(conn: &Connection, user_id: &str) -> AppResult<SessionUser> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        row_to_session_user,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

/// Resolve a live session token to its user.
pub fn load_by_session_token(conn: &Connection, token: &str) -> AppResult<Option<SessionUser>> {
    let user = conn
        .query_row(
            &format!(
                "SELECT {} FROM users WHERE id = (
                    SELECT user_id FROM sessions
                    WHERE token = ?1 AND expires_at > datetime('now')
                 )",
                USER_COLUMNS
            ),
            params![token],
            row_to_session_user,
        )
        .optional()?;
    Ok(user)
}

/// Owner edits to their own profile. Role and reputation are not editable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub department: Option<String>,
    pub section: Option<String>,
    pub register_number: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl ProfilePatch {
    fn trimmed(value: Option<String>) -> Option<String> {
        value.map(|v| v.trim().to_string())
    }
}

pub fn update_profile(
    conn: &Connection,
    user_id: &str,
    patch: ProfilePatch,
) -> AppResult<SessionUser> {
    if patch == ProfilePatch::default() {
        return Err(AppError::Validation("Nothing to update".into()));
    }

    let updated = conn.execute(
        "UPDATE users SET
            name = COALESCE(?2, name),
            department = COALESCE(?3, department),
            section = COALESCE(?4, section),
            register_number = COALESCE(?5, register_number),
            photo_url = COALESCE(?6, photo_url)
         WHERE id = ?1",
        params![
            user_id,
            ProfilePatch::trimmed(patch.name),
            ProfilePatch::trimmed(patch.department),
            ProfilePatch::trimmed(patch.section),
            ProfilePatch::trimmed(patch.register_number),
            ProfilePatch::trimmed(patch.photo_url),
        ],
    )?;
    if updated == 0 {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    tracing::info!(user_id, "Profile updated");
    load_session_user(conn, user_id)
}
