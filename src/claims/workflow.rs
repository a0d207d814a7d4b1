// Claim Workflow - every transition is one immediate transaction covering
// both the claim row and its item's status
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;

use crate::claims::book::{self, ClaimBook};
use crate::claims::domain::{ClaimDetail, ClaimRole, Decision};
use crate::db::models::{Claim, ItemStatus, ItemType};
use crate::db::{self, immediate_transaction};
use crate::error::{AppError, AppResult};
use crate::items::repository::load_item;
use crate::state::DbPool;
use crate::store::{Change, ChangeFeed, LiveQuery};

#[async_trait]
pub trait ClaimWorkflow: Send + Sync {
    /// Open a claim on someone else's active found item; returns the claim id
    async fn create_claim(&self, item_id: &str, claimer_id: &str) -> AppResult<String>;

    async fn submit_answer(&self, claim_id: &str, actor_id: &str, answer: &str)
        -> AppResult<Claim>;

    async fn resolve_claim(
        &self,
        claim_id: &str,
        actor_id: &str,
        decision: Decision,
    ) -> AppResult<Claim>;

    async fn get(&self, claim_id: &str) -> AppResult<Claim>;

    /// The claim as `viewer_id` may see it
    async fn detail(&self, claim_id: &str, viewer_id: &str) -> AppResult<ClaimDetail>;

    /// Live single-claim view; each snapshot holds exactly one detail
    fn watch_detail(&self, claim_id: &str, viewer_id: &str) -> LiveQuery<ClaimDetail>;

    /// Claims where the user is claimer or finder, merged by id
    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Claim>>;

    fn subscribe_as(&self, user_id: &str, role: ClaimRole) -> LiveQuery<Claim>;
}

pub struct SqliteClaimWorkflow {
    pool: DbPool,
    feed: ChangeFeed,
}

impl SqliteClaimWorkflow {
    pub fn new(pool: DbPool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }
}

const CLAIM_COLUMNS: &str = "id, item_id, claimer_id, finder_id, item_title, item_image_url,
    status, answer_attempt, created_at, updated_at";

fn row_to_claim(row: &Row<'_>) -> rusqlite::Result<Claim> {
    Ok(Claim {
        id: row.get(0)?,
        item_id: row.get(1)?,
        claimer_id: row.get(2)?,
        finder_id: row.get(3)?,
        item_title: row.get(4)?,
        item_image_url: row.get(5)?,
        status: row.get(6)?,
        answer_attempt: row.get(7)?,
        created_at: db::read_timestamp(row, 8)?,
        updated_at: db::read_timestamp(row, 9)?,
    })
}

pub(crate) fn load_claim(conn: &Connection, id: &str) -> AppResult<Claim> {
    conn.query_row(
        &format!("SELECT {} FROM claims WHERE id = ?1", CLAIM_COLUMNS),
        params![id],
        row_to_claim,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("Claim {} not found", id)))
}

fn claims_as(conn: &Connection, user_id: &str, role: ClaimRole) -> AppResult<Vec<Claim>> {
    let column = match role {
        ClaimRole::Claimer => "claimer_id",
        ClaimRole::Finder => "finder_id",
    };
    let sql = format!(
        "SELECT {} FROM claims WHERE {} = ?1 ORDER BY updated_at DESC, id DESC",
        CLAIM_COLUMNS, column
    );
    let mut stmt = conn.prepare(&sql)?;
    let claims = stmt
        .query_map(params![user_id], row_to_claim)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(claims)
}

fn load_detail(conn: &Connection, claim_id: &str, viewer_id: &str) -> AppResult<ClaimDetail> {
    let claim = load_claim(conn, claim_id)?;
    let item = match claim.item_id.as_deref() {
        Some(item_id) => match load_item(conn, item_id) {
            Ok(item) => Some(item),
            Err(AppError::NotFound(_)) => None,
            Err(e) => return Err(e),
        },
        None => None,
    };
    Ok(ClaimDetail::for_viewer(claim, item.as_ref(), viewer_id)?)
}

fn store_transition(conn: &Connection, claim: &Claim) -> AppResult<()> {
    conn.execute(
        "UPDATE claims SET status = ?2, answer_attempt = ?3, updated_at = ?4 WHERE id = ?1",
        params![
            claim.id,
            claim.status,
            claim.answer_attempt,
            db::format_timestamp(claim.updated_at),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl ClaimWorkflow for SqliteClaimWorkflow {
    async fn create_claim(&self, item_id: &str, claimer_id: &str) -> AppResult<String> {
        let id = uuid::Uuid::now_v7().to_string();
        {
            let conn = self.pool.get()?;
            immediate_transaction(&conn, |conn| {
                let item = load_item(conn, item_id)?;
                if item.item_type != ItemType::Found {
                    return Err(AppError::InvalidState(
                        "Only found items can be claimed".into(),
                    ));
                }
                if item.reporter_id == claimer_id {
                    return Err(AppError::Authorization(
                        "You cannot claim an item you reported".into(),
                    ));
                }

                // Compare-and-swap: a second claimer loses here
                let swapped = conn.execute(
                    "UPDATE items SET status = ?2 WHERE id = ?1 AND status = ?3",
                    params![item_id, ItemStatus::PendingClaim, ItemStatus::Active],
                )?;
                if swapped == 0 {
                    return Err(AppError::InvalidState(format!(
                        "Item is {} and cannot be claimed",
                        item.status
                    )));
                }

                let now = db::now_timestamp();
                conn.execute(
                    "INSERT INTO claims (id, item_id, claimer_id, finder_id, item_title,
                        item_image_url, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?7)",
                    params![
                        id,
                        item_id,
                        claimer_id,
                        item.reporter_id,
                        item.title,
                        item.image_url,
                        now,
                    ],
                )?;
                Ok(())
            })?;
        }

        tracing::info!(claim_id = %id, item_id, claimer_id, "Claim opened");
        self.feed.publish(Change::Claims);
        self.feed.publish(Change::Items);
        Ok(id)
    }

    async fn submit_answer(
        &self,
        claim_id: &str,
        actor_id: &str,
        answer: &str,
    ) -> AppResult<Claim> {
        let claim = {
            let conn = self.pool.get()?;
            immediate_transaction(&conn, |conn| {
                let claim = load_claim(conn, claim_id)?.submit_answer(actor_id, answer, Utc::now())?;
                store_transition(conn, &claim)?;
                if let Some(item_id) = &claim.item_id {
                    conn.execute(
                        "UPDATE items SET status = ?2 WHERE id = ?1 AND status = ?3",
                        params![item_id, ItemStatus::PendingApproval, ItemStatus::PendingClaim],
                    )?;
                }
                Ok(claim)
            })
        };
        let claim = claim.inspect_err(|e| {
            if matches!(e, AppError::Authorization(_)) {
                tracing::warn!(claim_id, actor_id, "Rejected answer from non-claimer");
            }
        })?;

        tracing::info!(claim_id, "Answer submitted, awaiting finder");
        self.feed.publish(Change::Claims);
        self.feed.publish(Change::Items);
        Ok(claim)
    }

    async fn resolve_claim(
        &self,
        claim_id: &str,
        actor_id: &str,
        decision: Decision,
    ) -> AppResult<Claim> {
        let claim = {
            let conn = self.pool.get()?;
            immediate_transaction(&conn, |conn| {
                let claim = load_claim(conn, claim_id)?.resolve(actor_id, decision, Utc::now())?;
                store_transition(conn, &claim)?;
                if let Some(item_id) = &claim.item_id {
                    conn.execute(
                        "UPDATE items SET status = ?2 WHERE id = ?1",
                        params![item_id, decision.item_status()],
                    )?;
                }
                Ok(claim)
            })
        };
        let claim = claim.inspect_err(|e| {
            if matches!(e, AppError::Authorization(_)) {
                tracing::warn!(claim_id, actor_id, "Rejected resolution from non-finder");
            }
        })?;

        tracing::info!(claim_id, status = %claim.status, "Claim resolved");
        self.feed.publish(Change::Claims);
        self.feed.publish(Change::Items);
        Ok(claim)
    }

    async fn get(&self, claim_id: &str) -> AppResult<Claim> {
        let conn = self.pool.get()?;
        load_claim(&conn, claim_id)
    }

    async fn detail(&self, claim_id: &str, viewer_id: &str) -> AppResult<ClaimDetail> {
        let conn = self.pool.get()?;
        load_detail(&conn, claim_id, viewer_id)
    }

    fn watch_detail(&self, claim_id: &str, viewer_id: &str) -> LiveQuery<ClaimDetail> {
        let pool = self.pool.clone();
        let claim_id = claim_id.to_string();
        let viewer_id = viewer_id.to_string();
        LiveQuery::new(
            self.feed.watch(),
            vec![Change::Claims, Change::Items],
            move || {
                let conn = pool.get()?;
                Ok(vec![load_detail(&conn, &claim_id, &viewer_id)?])
            },
        )
    }

    async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<Claim>> {
        let conn = self.pool.get()?;
        let mut book = ClaimBook::new();
        book.apply(ClaimRole::Claimer, claims_as(&conn, user_id, ClaimRole::Claimer)?);
        book.apply(ClaimRole::Finder, claims_as(&conn, user_id, ClaimRole::Finder)?);
        Ok(book.claims())
    }

    fn subscribe_as(&self, user_id: &str, role: ClaimRole) -> LiveQuery<Claim> {
        let pool = self.pool.clone();
        let user_id = user_id.to_string();
        LiveQuery::new(self.feed.watch(), vec![Change::Claims], move || {
            let conn = pool.get()?;
            claims_as(&conn, &user_id, role)
        })
    }
}

/// Both "My Claims" subscriptions folded into one stream.
pub fn watch_my_claims(
    workflow: &dyn ClaimWorkflow,
    user_id: &str,
) -> impl futures::Stream<Item = AppResult<Vec<Claim>>> + Send {
    book::merged(
        workflow.subscribe_as(user_id, ClaimRole::Claimer),
        workflow.subscribe_as(user_id, ClaimRole::Finder),
    )
}

/// Type alias for Arc-wrapped workflow (for AppState)
pub type DynClaimWorkflow = Arc<dyn ClaimWorkflow>;
