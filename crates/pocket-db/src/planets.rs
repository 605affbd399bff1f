//! Planet (note) repository implementation.
//!
//! Moves and deletes run in one transaction: disconnect from every galaxy,
//! connect to the target, then drop the galaxies the planet left empty.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use pocket_core::{new_v7, Error, Galaxy, Planet, PlanetRepository, PlanetSummary, Result};

use crate::galaxies::PgGalaxyRepository;

const PLANET_COLUMNS: &str = "id, user_id, content, created_at_utc, updated_at_utc";

/// PostgreSQL implementation of PlanetRepository.
pub struct PgPlanetRepository {
    pool: Pool<Postgres>,
    galaxies: PgGalaxyRepository,
}

impl PgPlanetRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            galaxies: PgGalaxyRepository::new(pool.clone()),
            pool,
        }
    }
}

fn map_planet(row: PgRow) -> Planet {
    Planet {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
    }
}

#[async_trait]
impl PlanetRepository for PgPlanetRepository {
    async fn create(
        &self,
        user_id: Uuid,
        content: &str,
        galaxy_id: Option<Uuid>,
    ) -> Result<Planet> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let planet = self.create_tx(&mut tx, user_id, content, galaxy_id).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "planets",
            op = "create",
            user_id = %user_id,
            planet_id = %planet.id,
            "Planet created"
        );
        Ok(planet)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Planet>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM planet WHERE user_id = $1 AND id = $2",
            PLANET_COLUMNS
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(map_planet))
    }

    async fn update_content(&self, user_id: Uuid, id: Uuid, content: &str) -> Result<Planet> {
        let row = sqlx::query(&format!(
            "UPDATE planet SET content = $1, updated_at_utc = $2
             WHERE user_id = $3 AND id = $4
             RETURNING {}",
            PLANET_COLUMNS
        ))
        .bind(content)
        .bind(Utc::now())
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(map_planet)
            .ok_or_else(|| Error::NotFound(format!("Planet {} not found", id)))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let previous = self.galaxy_ids_tx(&mut tx, id).await?;

        let result = sqlx::query("DELETE FROM planet WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Planet {} not found", id)));
        }

        let removed = self
            .galaxies
            .delete_if_empty_tx(&mut tx, user_id, &previous)
            .await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "planets",
            op = "delete",
            user_id = %user_id,
            planet_id = %id,
            galaxies_removed = removed,
            "Planet deleted"
        );
        Ok(())
    }

    async fn attach_to_galaxy(
        &self,
        user_id: Uuid,
        id: Uuid,
        galaxy_name: &str,
    ) -> Result<Galaxy> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM planet WHERE user_id = $1 AND id = $2)",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if !owned {
            return Err(Error::NotFound(format!("Planet {} not found", id)));
        }

        let previous = self.galaxy_ids_tx(&mut tx, id).await?;

        sqlx::query("DELETE FROM galaxy_planet WHERE planet_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let target = self
            .galaxies
            .find_or_create_tx(&mut tx, user_id, galaxy_name)
            .await?;

        sqlx::query("INSERT INTO galaxy_planet (galaxy_id, planet_id) VALUES ($1, $2)")
            .bind(target.id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let stale: Vec<Uuid> = previous.into_iter().filter(|g| *g != target.id).collect();
        let removed = self
            .galaxies
            .delete_if_empty_tx(&mut tx, user_id, &stale)
            .await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "planets",
            op = "attach_to_galaxy",
            user_id = %user_id,
            planet_id = %id,
            galaxy_id = %target.id,
            galaxies_removed = removed,
            "Planet moved"
        );
        Ok(target)
    }

    async fn list_orphans(&self, user_id: Uuid) -> Result<Vec<PlanetSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.content, p.created_at_utc
            FROM planet p
            WHERE p.user_id = $1
              AND NOT EXISTS (SELECT 1 FROM galaxy_planet gp WHERE gp.planet_id = p.id)
            ORDER BY p.created_at_utc DESC, p.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| PlanetSummary {
                id: r.get("id"),
                content: r.get("content"),
                created_at_utc: r.get("created_at_utc"),
            })
            .collect())
    }
}

// =============================================================================
// Transaction-aware variants
// =============================================================================

impl PgPlanetRepository {
    /// Insert a planet and its optional galaxy link within a transaction.
    pub async fn create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        content: &str,
        galaxy_id: Option<Uuid>,
    ) -> Result<Planet> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO planet (id, user_id, content, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING {}",
            PLANET_COLUMNS
        ))
        .bind(new_v7())
        .bind(user_id)
        .bind(content)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        let planet = map_planet(row);

        if let Some(galaxy_id) = galaxy_id {
            sqlx::query("INSERT INTO galaxy_planet (galaxy_id, planet_id) VALUES ($1, $2)")
                .bind(galaxy_id)
                .bind(planet.id)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
        }

        Ok(planet)
    }

    async fn galaxy_ids_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        planet_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT galaxy_id FROM galaxy_planet WHERE planet_id = $1")
            .bind(planet_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)
    }
}
