// Chat Channel: append-only message lists, global or scoped to one claim
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use crate::auth::SessionUser;
use crate::chat::domain::{ChatScope, MessagePayload};
use crate::claims::workflow::load_claim;
use crate::db::models::ChatMessage;
use crate::db::{self, immediate_transaction};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;
use crate::store::{Change, ChangeFeed, LiveQuery};

#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Append a message; the server assigns timestamp and order
    async fn send(
        &self,
        scope: &ChatScope,
        sender: &SessionUser,
        payload: MessagePayload,
    ) -> AppResult<ChatMessage>;

    /// Messages in ascending order; the global channel keeps only the tail
    async fn history(&self, scope: &ChatScope, viewer_id: &str) -> AppResult<Vec<ChatMessage>>;

    /// Live history. Access is checked once, up front.
    async fn subscribe(
        &self,
        scope: &ChatScope,
        viewer_id: &str,
    ) -> AppResult<LiveQuery<ChatMessage>>;

    /// Fails unless `user_id` may read `scope`
    async fn authorize(&self, scope: &ChatScope, user_id: &str) -> AppResult<()>;

    /// Fails unless `user_id` may post to `scope` right now
    async fn ensure_writable(&self, scope: &ChatScope, user_id: &str) -> AppResult<()>;
}

pub struct SqliteChatChannel {
    pool: DbPool,
    feed: ChangeFeed,
    global_limit: usize,
}

impl SqliteChatChannel {
    pub fn new(pool: DbPool, feed: ChangeFeed, global_limit: usize) -> Self {
        Self {
            pool,
            feed,
            global_limit,
        }
    }
}

const MESSAGE_COLUMNS: &str =
    "seq, id, claim_id, text, image_url, audio_url, uid, user_name, photo_url, created_at";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let payload = MessagePayload::from_columns(row.get(3)?, row.get(4)?, row.get(5)?).ok_or_else(
        || {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Null,
                "message must carry exactly one payload".into(),
            )
        },
    )?;
    let claim_id: Option<String> = row.get(2)?;

    Ok(ChatMessage {
        seq: row.get(0)?,
        id: row.get(1)?,
        scope: claim_id.map(ChatScope::Claim).unwrap_or_default(),
        payload,
        uid: row.get(6)?,
        user_name: row.get(7)?,
        photo_url: row.get(8)?,
        timestamp: db::read_timestamp(row, 9)?,
    })
}

fn read_history(
    conn: &Connection,
    scope: &ChatScope,
    global_limit: usize,
) -> AppResult<Vec<ChatMessage>> {
    let messages = match scope {
        ChatScope::Global => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {cols} FROM (
                    SELECT {cols} FROM messages WHERE claim_id IS NULL
                    ORDER BY seq DESC LIMIT ?1
                 ) ORDER BY seq ASC",
                cols = MESSAGE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![global_limit as i64], row_to_message)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        ChatScope::Claim(claim_id) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages WHERE claim_id = ?1 ORDER BY seq ASC",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![claim_id], row_to_message)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(messages)
}

fn frozen() -> AppError {
    AppError::InvalidState("This claim is closed; its chat is read-only".into())
}

/// Claim chats are for the claimer and finder only. Returns whether the
/// claim is frozen (terminal).
fn check_access(conn: &Connection, scope: &ChatScope, user_id: &str) -> AppResult<bool> {
    let Some(claim_id) = scope.claim_id() else {
        return Ok(false);
    };
    let claim = load_claim(conn, claim_id)?;
    if !claim.is_participant(user_id) {
        tracing::warn!(claim_id, user_id, "Rejected access to claim chat");
        return Err(AppError::Authorization(
            "Only the claimer and finder can use this chat".into(),
        ));
    }
    Ok(claim.status.is_terminal())
}

fn load_message(conn: &Connection, seq: i64) -> AppResult<ChatMessage> {
    conn.query_row(
        &format!("SELECT {} FROM messages WHERE seq = ?1", MESSAGE_COLUMNS),
        params![seq],
        row_to_message,
    )
    .optional()?
    .ok_or_else(|| AppError::Internal(format!("message {} vanished after insert", seq)))
}

#[async_trait]
impl ChatChannel for SqliteChatChannel {
    async fn send(
        &self,
        scope: &ChatScope,
        sender: &SessionUser,
        payload: MessagePayload,
    ) -> AppResult<ChatMessage> {
        let message = {
            let conn = self.pool.get()?;
            immediate_transaction(&conn, |conn| {
                if check_access(conn, scope, &sender.id)? {
                    return Err(frozen());
                }

                conn.execute(
                    "INSERT INTO messages (id, claim_id, text, image_url, audio_url,
                        uid, user_name, photo_url, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        uuid::Uuid::now_v7().to_string(),
                        scope.claim_id(),
                        payload.text(),
                        payload.image_url(),
                        payload.audio_url(),
                        sender.id,
                        sender.display_name(),
                        sender.profile.photo_url,
                        db::now_timestamp(),
                    ],
                )?;
                load_message(conn, conn.last_insert_rowid())
            })?
        };

        tracing::debug!(scope = %scope, seq = message.seq, "Message sent");
        self.feed.publish(Change::Messages(scope.clone()));
        Ok(message)
    }

    async fn history(&self, scope: &ChatScope, viewer_id: &str) -> AppResult<Vec<ChatMessage>> {
        let conn = self.pool.get()?;
        check_access(&conn, scope, viewer_id)?;
        read_history(&conn, scope, self.global_limit)
    }

    async fn subscribe(
        &self,
        scope: &ChatScope,
        viewer_id: &str,
    ) -> AppResult<LiveQuery<ChatMessage>> {
        self.authorize(scope, viewer_id).await?;

        let pool = self.pool.clone();
        let limit = self.global_limit;
        let watched = scope.clone();
        Ok(LiveQuery::new(
            self.feed.watch(),
            vec![Change::Messages(scope.clone())],
            move || {
                let conn = pool.get()?;
                read_history(&conn, &watched, limit)
            },
        ))
    }

    async fn authorize(&self, scope: &ChatScope, user_id: &str) -> AppResult<()> {
        let conn = self.pool.get()?;
        check_access(&conn, scope, user_id).map(|_| ())
    }

    async fn ensure_writable(&self, scope: &ChatScope, user_id: &str) -> AppResult<()> {
        let conn = self.pool.get()?;
        if check_access(&conn, scope, user_id)? {
            return Err(frozen());
        }
        Ok(())
    }
}

/// Type alias for Arc-wrapped channel (for AppState)
pub type DynChatChannel = Arc<dyn ChatChannel>;
