//! A small standalone game session server.
//!
//! Persists sessions in a sqlite file and accepts any numeric token as a
//! user id, so two browser tabs with tokens "1" and "2" can play each
//! other. Users 1-4 come pre-matched in pairs.
//!
//! Environment:
//! - `ARCADE_ADDR`: bind address (default `0.0.0.0:8080`)
//! - `ARCADE_DB`  : sqlite path (default `arcade.db`)
//! - `RUST_LOG`   : log filter (default `info`)

use gamelink::{
    GamelinkServerBuilder, MemoryDirectory, SqliteStore, TokenIsUserId,
    UserId,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("ARCADE_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let db_path = std::env::var("ARCADE_DB")
        .unwrap_or_else(|_| "arcade.db".to_string());

    let store = SqliteStore::open(&db_path)?;

    let directory = MemoryDirectory::new();
    for (id, name) in [
        (1, "Alice"),
        (2, "Bob"),
        (3, "Chandra"),
        (4, "Devi"),
    ] {
        directory.add_user(UserId(id), name);
    }
    directory.pair(UserId(1), UserId(2));
    directory.pair(UserId(3), UserId(4));

    tracing::info!(%addr, db = %db_path, "starting arcade server");

    let server = GamelinkServerBuilder::new()
        .bind(&addr)
        .build(store, directory, TokenIsUserId)
        .await?;
    server.run().await?;
    Ok(())
}
