use anyhow::Result;
use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub mod memory;
pub mod postgres;
pub mod repository;

pub use memory::InMemoryDatabase;
pub use postgres::PgDatabase;
pub use repository::{
    OrderRepository, PagedResult, Pagination, PricingRepository, StoreError, StoreResult,
    UserRepository,
};

pub type DatabasePool = Pool<Postgres>;

/// Repository handles shared by the services
#[derive(Clone)]
pub struct Storage {
    pub orders: Arc<dyn OrderRepository>,
    pub users: Arc<dyn UserRepository>,
    pub pricing: Arc<dyn PricingRepository>,
}

impl Storage {
    pub fn postgres(pool: DatabasePool) -> Self {
        let db = Arc::new(PgDatabase::new(pool));
        Self {
            orders: db.clone(),
            users: db.clone(),
            pricing: db,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_memory(Arc::new(InMemoryDatabase::new()))
    }

    pub fn from_memory(db: Arc<InMemoryDatabase>) -> Self {
        Self {
            orders: db.clone(),
            users: db.clone(),
            pricing: db,
        }
    }
}

pub async fn setup_database(database_url: &str, max_connections: u32) -> Result<DatabasePool> {
    info!("Connecting to database");

    if !(database_url.contains("sslmode=require")
        || database_url.contains("sslmode=verify-ca")
        || database_url.contains("sslmode=verify-full"))
    {
        warn!(
            "Database connection does not enforce SSL. Consider adding sslmode=require to connection string"
        );
    }

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(3))
        .idle_timeout(Duration::from_secs(180))
        .max_lifetime(Duration::from_secs(900))
        .test_before_acquire(true)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("SET timezone = 'UTC'").execute(&mut *conn).await?;
                sqlx::query("SET statement_timeout = '15s'")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;

    let start_time = std::time::Instant::now();
    sqlx::query("SELECT 1").execute(&pool).await?;
    info!(
        "✅ Database connection established in {:?} (max connections: {})",
        start_time.elapsed(),
        max_connections
    );

    Ok(pool)
}

pub async fn run_migrations(pool: &DatabasePool) -> Result<()> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations").run(pool).await?;

    info!("Database migrations completed successfully");
    Ok(())
}
