//! Database access layer: pools, migrations, models, and repositories.

pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Convenience alias used by the binaries and tests.
pub type DbPool = PgPool;

/// Embedded migrations, applied at startup by the API binary.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Default pool size per connection string.
const MAX_CONNECTIONS: u32 = 10;

/// The two pools the application runs on.
///
/// The root pool connects as a privileged role and owns sessions, secrets,
/// and identity linking. The authenticator pool is used for request-scoped
/// reads on behalf of the logged-in user; deployments that do not split
/// roles point both at the same database.
#[derive(Clone)]
pub struct DbPools {
    pub root: PgPool,
    pub auth: PgPool,
}

impl DbPools {
    pub async fn connect(root_url: &str, auth_url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self {
            root: create_pool(root_url).await?,
            auth: create_pool(auth_url).await?,
        })
    }
}

/// Create a connection pool for the given database URL.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply any pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
