//! # pocket-db
//!
//! PostgreSQL database layer for Pocket Universe.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for users, sessions, galaxies, planets,
//!   images and categorization records
//! - Transactional folder reconciliation (move, delete, empty-folder cleanup)
//! - Object storage backends for uploaded images
//!
//! ## Example
//!
//! ```rust,no_run
//! use pocket_db::{Database, GalaxyRepository, PlanetRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/pocket").await?;
//!     let user_id = pocket_db::new_v7();
//!
//!     let galaxy = db.galaxies.find_or_create(user_id, "Groceries").await?;
//!     let planet = db.planets.create(user_id, "buy milk", Some(galaxy.id)).await?;
//!
//!     println!("Created planet: {}", planet.id);
//!     Ok(())
//! }
//! ```

pub mod categorizations;
pub mod galaxies;
pub mod images;
pub mod object_storage;
pub mod planets;
pub mod pool;
pub mod sessions;
pub mod users;

// Always compiled so integration tests (in tests/) can share the helpers.
pub mod test_fixtures;

// Re-export core types
pub use pocket_core::*;

pub use categorizations::{
    build_adaptive_insert, AdaptiveInsert, ColumnInfo, PgCategorizationRepository, SqlParam,
};
pub use galaxies::PgGalaxyRepository;
pub use images::PgImageRepository;
pub use object_storage::{validate_object_key, FilesystemBackend, HttpObjectStore, StorageBackend};
pub use planets::PgPlanetRepository;
pub use pool::{create_lazy_pool, create_pool, create_pool_with_config, PoolConfig};
pub use sessions::PgSessionRepository;
pub use users::PgUserRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub users: PgUserRepository,
    pub sessions: PgSessionRepository,
    pub galaxies: PgGalaxyRepository,
    pub planets: PgPlanetRepository,
    pub images: PgImageRepository,
    /// Categorization audit records.
    pub categorizations: PgCategorizationRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            sessions: PgSessionRepository::new(pool.clone()),
            galaxies: PgGalaxyRepository::new(pool.clone()),
            planets: PgPlanetRepository::new(pool.clone()),
            images: PgImageRepository::new(pool.clone()),
            categorizations: PgCategorizationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
