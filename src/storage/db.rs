//! Database connection management.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::Result;
use crate::storage::changefeed::ChangeFeedHub;

/// DatabaseManager handles SQLite connection pooling, migrations, and the
/// change-feed hub shared by every repository bound to this database.
#[derive(Clone)]
pub struct DatabaseManager {
    pool: Pool<Sqlite>,
    db_path: Arc<str>,
    changes: Arc<ChangeFeedHub>,
}

impl DatabaseManager {
    /// Creates a new DatabaseManager with a connection pool to the specified database
    #[instrument(err)]
    pub async fn new(db_path: &str) -> Result<Self> {
        info!("Initializing database at: {}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(
                SqliteConnectOptions::from_str(db_path)?
                    .foreign_keys(!cfg!(test)) // Disable foreign keys in tests to avoid errors
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal),
            )
            .await?;

        Ok(Self {
            pool,
            db_path: db_path.into(),
            changes: Arc::new(ChangeFeedHub::new()),
        })
    }

    /// Get the database connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Get database path
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// The change-feed hub for this database
    pub fn changes(&self) -> &ChangeFeedHub {
        &self.changes
    }

    /// Apply all pending schema migrations
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Initialize an in-memory database for testing. A single connection
    /// is used so every operation sees the same in-memory schema.
    pub async fn setup_test_db() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                SqliteConnectOptions::from_str("sqlite::memory:")
                    .expect("in-memory connect options")
                    .foreign_keys(false),
            )
            .await
            .expect("in-memory database");

        let db = Self {
            pool,
            db_path: "sqlite::memory:".into(),
            changes: Arc::new(ChangeFeedHub::new()),
        };
        db.run_migrations().await.expect("test migrations");
        db
    }
}
