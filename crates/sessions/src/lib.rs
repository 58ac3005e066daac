//! Per-conversation navigation state.
//!
//! A conversation's session state is the route path it currently sits on.
//! Storage is pluggable behind [`SessionStorage`]; an in-memory map and a
//! SQLite table are provided. [`ConversationLocks`] serializes the
//! read-modify-write cycle the router performs for a single conversation.

pub mod error;
pub mod locks;
pub mod sqlite;
pub mod storage;

pub use {
    error::{Error, Result},
    locks::ConversationLocks,
    sqlite::SqliteStorage,
    storage::{InMemoryStorage, SessionStorage},
};

/// Run database migrations for the sessions crate.
///
/// Creates the `route_sessions` table used by [`SqliteStorage`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
