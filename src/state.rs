use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::auth::IdentityProvider;
use crate::chat::{DynChatChannel, RecordingStore, SqliteChatChannel};
use crate::claims::{DynClaimWorkflow, SqliteClaimWorkflow};
use crate::config::Config;
use crate::graphql::LostFoundSchema;
use crate::items::{DynItemRepository, SqliteItemRepository};
use crate::media::{DynMediaStore, LocalMediaStore};
use crate::store::ChangeFeed;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub feed: ChangeFeed,
    pub identity: IdentityProvider,
    pub items: DynItemRepository,
    pub claims: DynClaimWorkflow,
    pub chat: DynChatChannel,
    pub media: DynMediaStore,
    pub recordings: Arc<Mutex<RecordingStore>>,
    pub graphql_schema: LostFoundSchema,
}

impl AppState {
    /// Wire every service over one pool and one change feed.
    pub fn new(db: DbPool, config: Config) -> Result<Self, url::ParseError> {
        let feed = ChangeFeed::default();
        let media_base_url = config.media_base_url()?;

        let identity = IdentityProvider::new(db.clone(), feed.clone(), config.auth.clone());
        let items: DynItemRepository =
            Arc::new(SqliteItemRepository::new(db.clone(), feed.clone()));
        let claims: DynClaimWorkflow =
            Arc::new(SqliteClaimWorkflow::new(db.clone(), feed.clone()));
        let chat: DynChatChannel = Arc::new(SqliteChatChannel::new(
            db.clone(),
            feed.clone(),
            config.chat.global_history_limit,
        ));
        let media: DynMediaStore = Arc::new(LocalMediaStore::new(
            config.media_path(),
            media_base_url,
        ));

        let recordings = Arc::new(Mutex::new(
            RecordingStore::new().with_max_bytes(config.media.max_upload_bytes),
        ));

        let graphql_schema =
            crate::graphql::build_schema(items.clone(), claims.clone(), chat.clone());

        Ok(Self {
            db,
            config,
            feed,
            identity,
            items,
            claims,
            chat,
            media,
            recordings,
            graphql_schema,
        })
    }
}
