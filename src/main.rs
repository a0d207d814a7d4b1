use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use lostfound::auth;
use lostfound::config::{Cli, Config};
use lostfound::db;
use lostfound::routes;
use lostfound::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure media directory exists
    std::fs::create_dir_all(config.media_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState::new(pool, config.clone())?;

    let promoted = state.identity.sync_admin_roles()?;
    if promoted > 0 {
        tracing::info!("Promoted {} allow-listed account(s) to admin", promoted);
    }
    let pruned = auth::session::prune_expired_sessions(&state.db)?;
    if pruned > 0 {
        tracing::info!("Removed {} expired session(s)", pruned);
    }

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
