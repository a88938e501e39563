use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Open the inquiry database named by `database_url` (`sqlite:<path>`, path
/// relative to the working directory) and bring its schema up to date.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let path = std::env::current_dir()?.join(
        database_url
            .strip_prefix("sqlite:")
            .unwrap_or(database_url),
    );
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    migrated(SqlitePool::connect_with(options).await?).await
}

/// Single-connection in-memory database. `:memory:` is per connection, so the
/// pool must never open a second one or recycle the first.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(SqliteConnectOptions::new().in_memory(true))
        .await?;
    migrated(pool).await
}

async fn migrated(pool: SqlitePool) -> anyhow::Result<SqlitePool> {
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
