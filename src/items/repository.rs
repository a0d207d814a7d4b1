// Item Repository - all item reads and reporter-side writes
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::Arc;

use crate::db::models::{GeoPoint, Item, ItemType};
use crate::db::{self, immediate_transaction};
use crate::error::{AppError, AppResult};
use crate::items::domain::{ItemFilter, ItemPatch, NewItem, PotentialMatch};
use crate::state::DbPool;
use crate::store::{Change, ChangeFeed, LiveQuery};

#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// One-off read of a filtered listing, newest first
    async fn list(&self, filter: &ItemFilter) -> AppResult<Vec<Item>>;

    /// Live listing: full snapshot now and after every item change
    fn subscribe(&self, filter: ItemFilter) -> LiveQuery<Item>;

    async fn get(&self, id: &str) -> AppResult<Item>;

    /// Store a validated report as `active`; returns the new id
    async fn create(&self, item: NewItem, reporter_id: &str, reporter_name: &str)
        -> AppResult<String>;

    /// Reporter-only edit of title/description/category
    async fn update(&self, id: &str, actor_id: &str, patch: ItemPatch) -> AppResult<Item>;

    /// Reporter-only delete
    async fn delete(&self, id: &str, actor_id: &str) -> AppResult<()>;

    /// Link the actor's lost item to a found item that may be theirs
    async fn set_potential_match(
        &self,
        lost_item_id: &str,
        actor_id: &str,
        found_item_id: &str,
    ) -> AppResult<Item>;

    /// First of the user's lost items with a linked found item
    async fn find_match_for(&self, user_id: &str) -> AppResult<Option<PotentialMatch>>;
}

pub struct SqliteItemRepository {
    pool: DbPool,
    feed: ChangeFeed,
}

impl SqliteItemRepository {
    pub fn new(pool: DbPool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }
}

const ITEM_COLUMNS: &str = "id, title, description, category, item_type, image_url,
    secret_question, secret_answer, status, reporter_id, reporter_name,
    latitude, longitude, potential_match_id, created_at";

pub(crate) fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    let latitude: Option<f64> = row.get(11)?;
    let longitude: Option<f64> = row.get(12)?;
    Ok(Item {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        item_type: row.get(4)?,
        image_url: row.get(5)?,
        secret_question: row.get(6)?,
        secret_answer: row.get(7)?,
        status: row.get(8)?,
        reporter_id: row.get(9)?,
        reporter_name: row.get(10)?,
        location: latitude
            .zip(longitude)
            .map(|(lat, lng)| GeoPoint { lat, lng }),
        potential_match_id: row.get(13)?,
        timestamp: db::read_timestamp(row, 14)?,
    })
}

pub(crate) fn load_item(conn: &Connection, id: &str) -> AppResult<Item> {
    conn.query_row(
        &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
        params![id],
        row_to_item,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))
}

fn query_items(conn: &Connection, filter: &ItemFilter) -> AppResult<Vec<Item>> {
    let (clause, args) = filter.to_sql();
    let sql = format!(
        "SELECT {} FROM items {} ORDER BY created_at DESC, id DESC",
        ITEM_COLUMNS, clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params_from_iter(args.iter()), row_to_item)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Load an item and check the actor reported it.
fn load_owned(conn: &Connection, id: &str, actor_id: &str) -> AppResult<Item> {
    let item = load_item(conn, id)?;
    if item.reporter_id != actor_id {
        tracing::warn!(item_id = id, actor_id, "Rejected edit by non-reporter");
        return Err(AppError::Authorization(
            "Only the reporter can change this item".into(),
        ));
    }
    Ok(item)
}

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn list(&self, filter: &ItemFilter) -> AppResult<Vec<Item>> {
        let conn = self.pool.get()?;
        query_items(&conn, filter)
    }

    fn subscribe(&self, filter: ItemFilter) -> LiveQuery<Item> {
        let pool = self.pool.clone();
        LiveQuery::new(self.feed.watch(), vec![Change::Items], move || {
            let conn = pool.get()?;
            query_items(&conn, &filter)
        })
    }

    async fn get(&self, id: &str) -> AppResult<Item> {
        let conn = self.pool.get()?;
        load_item(&conn, id)
    }

    async fn create(
        &self,
        item: NewItem,
        reporter_id: &str,
        reporter_name: &str,
    ) -> AppResult<String> {
        let id = uuid::Uuid::now_v7().to_string();
        {
            let conn = self.pool.get()?;
            conn.execute(
                "INSERT INTO items (id, title, description, category, item_type, image_url,
                    secret_question, secret_answer, status, reporter_id, reporter_name,
                    latitude, longitude, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', ?9, ?10, ?11, ?12, ?13)",
                params![
                    id,
                    item.title,
                    item.description,
                    item.category,
                    item.item_type,
                    item.image_url,
                    item.secret_question,
                    item.secret_answer,
                    reporter_id,
                    reporter_name,
                    item.location.map(|l| l.lat),
                    item.location.map(|l| l.lng),
                    db::now_timestamp(),
                ],
            )?;
        }

        tracing::info!(item_id = %id, reporter_id, item_type = %item.item_type, "Item reported");
        self.feed.publish(Change::Items);
        Ok(id)
    }

    async fn update(&self, id: &str, actor_id: &str, patch: ItemPatch) -> AppResult<Item> {
        let updated = {
            let conn = self.pool.get()?;
            immediate_transaction(&conn, |conn| {
                load_owned(conn, id, actor_id)?;
                conn.execute(
                    "UPDATE items SET
                        title = COALESCE(?2, title),
                        description = COALESCE(?3, description),
                        category = COALESCE(?4, category)
                     WHERE id = ?1",
                    params![id, patch.title, patch.description, patch.category],
                )?;
                load_item(conn, id)
            })?
        };

        tracing::info!(item_id = id, "Item edited");
        self.feed.publish(Change::Items);
        Ok(updated)
    }

    async fn delete(&self, id: &str, actor_id: &str) -> AppResult<()> {
        {
            let conn = self.pool.get()?;
            immediate_transaction(&conn, |conn| {
                load_owned(conn, id, actor_id)?;
                conn.execute("DELETE FROM items WHERE id = ?1", params![id])?;
                Ok(())
            })?;
        }

        tracing::info!(item_id = id, "Item deleted");
        self.feed.publish(Change::Items);
        // Claims referencing the item lose their link
        self.feed.publish(Change::Claims);
        Ok(())
    }

    async fn set_potential_match(
        &self,
        lost_item_id: &str,
        actor_id: &str,
        found_item_id: &str,
    ) -> AppResult<Item> {
        let updated = {
            let conn = self.pool.get()?;
            immediate_transaction(&conn, |conn| {
                let lost = load_owned(conn, lost_item_id, actor_id)?;
                if lost.item_type != ItemType::Lost {
                    return Err(AppError::Validation(
                        "Only lost items can be linked to a match".into(),
                    ));
                }
                let found = load_item(conn, found_item_id)?;
                if found.item_type != ItemType::Found {
                    return Err(AppError::Validation(
                        "A match must be a found item".into(),
                    ));
                }
                conn.execute(
                    "UPDATE items SET potential_match_id = ?2 WHERE id = ?1",
                    params![lost_item_id, found_item_id],
                )?;
                load_item(conn, lost_item_id)
            })?
        };

        tracing::info!(lost_item_id, found_item_id, "Potential match linked");
        self.feed.publish(Change::Items);
        Ok(updated)
    }

    async fn find_match_for(&self, user_id: &str) -> AppResult<Option<PotentialMatch>> {
        let conn = self.pool.get()?;
        let link: Option<(String, String)> = conn
            .query_row(
                "SELECT id, potential_match_id FROM items
                 WHERE reporter_id = ?1 AND item_type = 'lost' AND potential_match_id IS NOT NULL
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((lost_item_id, found_item_id)) = link else {
            return Ok(None);
        };

        match load_item(&conn, &found_item_id) {
            Ok(found_item) => Ok(Some(PotentialMatch {
                lost_item_id,
                found_item: found_item.visible_to(user_id),
            })),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynItemRepository = Arc<dyn ItemRepository>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{ItemCategory, ItemStatus};
    use crate::db::testing::{migrated_pool, seed_user};
    use tempfile::TempDir;

    struct Fixture {
        repo: SqliteItemRepository,
        pool: DbPool,
        feed: ChangeFeed,
        alice: String,
        bob: String,
        _tmp: TempDir,
    }

    fn fixture() -> Fixture {
        let (pool, tmp) = migrated_pool();
        let feed = ChangeFeed::new(16);
        let alice = seed_user(&pool, "alice@klu.ac.in", "Alice");
        let bob = seed_user(&pool, "bob@klu.ac.in", "Bob");
        Fixture {
            repo: SqliteItemRepository::new(pool.clone(), feed.clone()),
            pool,
            feed,
            alice,
            bob,
            _tmp: tmp,
        }
    }

    fn new_item(title: &str, item_type: ItemType) -> NewItem {
        let found = item_type == ItemType::Found;
        NewItem {
            title: title.into(),
            description: "desc".into(),
            category: ItemCategory::Keys,
            item_type,
            image_url: None,
            secret_question: found.then(|| "What colour is the tag?".to_string()),
            secret_answer: found.then(|| "Blue".to_string()),
            location: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_active_status_and_timestamp() {
        let f = fixture();
        let id = f
            .repo
            .create(new_item("Keys", ItemType::Found), &f.alice, "Alice")
            .await
            .unwrap();

        let item = f.repo.get(&id).await.unwrap();
        assert_eq!(item.status, ItemStatus::Active);
        assert_eq!(item.reporter_id, f.alice);
        assert_eq!(item.reporter_name, "Alice");
        assert_eq!(item.secret_answer.as_deref(), Some("Blue"));
    }

    #[tokio::test]
    async fn list_is_newest_first_and_filtered() {
        let f = fixture();
        let first = f
            .repo
            .create(new_item("first", ItemType::Lost), &f.alice, "Alice")
            .await
            .unwrap();
        let second = f
            .repo
            .create(new_item("second", ItemType::Found), &f.bob, "Bob")
            .await
            .unwrap();

        let all = f.repo.list(&ItemFilter::All).await.unwrap();
        let ids: Vec<_> = all.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);

        let found = f.repo.list(&ItemFilter::Type(ItemType::Found)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, second);

        let mine = f
            .repo
            .list(&ItemFilter::Reporter(f.alice.clone()))
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, first);

        let claimed = f.repo.list(&ItemFilter::claimed()).await.unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn get_missing_item_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.repo.get("nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_by_reporter_changes_only_patched_fields() {
        let f = fixture();
        let id = f
            .repo
            .create(new_item("Keys", ItemType::Found), &f.alice, "Alice")
            .await
            .unwrap();

        let patch = ItemPatch {
            title: Some("Car keys".into()),
            ..Default::default()
        };
        let item = f.repo.update(&id, &f.alice, patch).await.unwrap();
        assert_eq!(item.title, "Car keys");
        assert_eq!(item.description, "desc");
        assert_eq!(item.category, ItemCategory::Keys);
    }

    #[tokio::test]
    async fn update_by_other_user_is_forbidden() {
        let f = fixture();
        let id = f
            .repo
            .create(new_item("Keys", ItemType::Found), &f.alice, "Alice")
            .await
            .unwrap();

        let patch = ItemPatch {
            title: Some("Mine now".into()),
            ..Default::default()
        };
        let result = f.repo.update(&id, &f.bob, patch).await;
        assert!(matches!(result, Err(AppError::Authorization(_))));
        assert_eq!(f.repo.get(&id).await.unwrap().title, "Keys");
    }

    #[tokio::test]
    async fn update_missing_item_is_not_found() {
        let f = fixture();
        let patch = ItemPatch {
            title: Some("x".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.repo.update("nope", &f.alice, patch).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_reporter_only() {
        let f = fixture();
        let id = f
            .repo
            .create(new_item("Keys", ItemType::Lost), &f.alice, "Alice")
            .await
            .unwrap();

        assert!(matches!(
            f.repo.delete(&id, &f.bob).await,
            Err(AppError::Authorization(_))
        ));
        f.repo.delete(&id, &f.alice).await.unwrap();
        assert!(matches!(f.repo.get(&id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            f.repo.delete(&id, &f.alice).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn subscription_redelivers_full_snapshot_on_change() {
        let f = fixture();
        let mut live = f.repo.subscribe(ItemFilter::Type(ItemType::Found));

        assert!(live.next().await.unwrap().unwrap().is_empty());

        f.repo
            .create(new_item("lost thing", ItemType::Lost), &f.alice, "Alice")
            .await
            .unwrap();
        // Snapshot after an unrelated-type write is still a full snapshot
        assert!(live.next().await.unwrap().unwrap().is_empty());

        f.repo
            .create(new_item("found thing", ItemType::Found), &f.bob, "Bob")
            .await
            .unwrap();
        let snapshot = live.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].title, "found thing");

        live.unsubscribe();
        live.unsubscribe();
        assert_eq!(f.feed.watcher_count(), 0);
    }

    #[tokio::test]
    async fn potential_match_round_trip() {
        let f = fixture();
        let lost = f
            .repo
            .create(new_item("my umbrella", ItemType::Lost), &f.alice, "Alice")
            .await
            .unwrap();
        let found = f
            .repo
            .create(new_item("an umbrella", ItemType::Found), &f.bob, "Bob")
            .await
            .unwrap();

        assert!(f.repo.find_match_for(&f.alice).await.unwrap().is_none());

        // Bob cannot link Alice's item
        assert!(matches!(
            f.repo.set_potential_match(&lost, &f.bob, &found).await,
            Err(AppError::Authorization(_))
        ));
        // A lost item cannot be the match
        assert!(matches!(
            f.repo.set_potential_match(&lost, &f.alice, &lost).await,
            Err(AppError::Validation(_))
        ));

        f.repo
            .set_potential_match(&lost, &f.alice, &found)
            .await
            .unwrap();
        let found_match = f.repo.find_match_for(&f.alice).await.unwrap().unwrap();
        assert_eq!(found_match.lost_item_id, lost);
        assert_eq!(found_match.found_item.id, found);
        // Alice is not the finder, so the secret answer stays hidden
        assert_eq!(found_match.found_item.secret_answer, None);

        // Deleting the found item clears the link
        f.repo.delete(&found, &f.bob).await.unwrap();
        assert!(f.repo.find_match_for(&f.alice).await.unwrap().is_none());
        let conn = f.pool.get().unwrap();
        let link: Option<String> = conn
            .query_row(
                "SELECT potential_match_id FROM items WHERE id = ?1",
                params![lost],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(link, None);
    }
}
