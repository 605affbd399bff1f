//! Galaxy (folder) repository implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use pocket_core::{
    new_v7, validate_galaxy_name, Error, Galaxy, GalaxyContents, GalaxyRepository, ImageSummary,
    PlanetSummary, Result,
};

const GALAXY_COLUMNS: &str = "id, user_id, name, shareable, created_at_utc";

/// PostgreSQL implementation of GalaxyRepository.
#[derive(Clone)]
pub struct PgGalaxyRepository {
    pool: Pool<Postgres>,
}

impl PgGalaxyRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn map_galaxy(row: PgRow) -> Galaxy {
    Galaxy {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        shareable: row.get("shareable"),
        created_at_utc: row.get("created_at_utc"),
    }
}

#[async_trait]
impl GalaxyRepository for PgGalaxyRepository {
    async fn find_or_create(&self, user_id: Uuid, name: &str) -> Result<Galaxy> {
        let name = validate_galaxy_name(name)?;

        if let Some(existing) = self.find_by_name(user_id, name).await? {
            return Ok(existing);
        }

        let id = new_v7();
        let inserted = sqlx::query(&format!(
            "INSERT INTO galaxy (id, user_id, name, shareable, created_at_utc)
             VALUES ($1, $2, $3, FALSE, $4)
             RETURNING {}",
            GALAXY_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database);

        match inserted {
            Ok(row) => {
                debug!(
                    subsystem = "db",
                    component = "galaxies",
                    op = "find_or_create",
                    user_id = %user_id,
                    galaxy_id = %id,
                    "Galaxy created"
                );
                Ok(map_galaxy(row))
            }
            Err(e) if e.is_unique_violation() => {
                // Another request created it between our read and insert.
                debug!(
                    subsystem = "db",
                    component = "galaxies",
                    op = "find_or_create",
                    user_id = %user_id,
                    "Unique race on galaxy name, re-reading"
                );
                self.find_by_name(user_id, name)
                    .await?
                    .ok_or_else(|| Error::Internal("Folder resolution failed".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn find_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Galaxy>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM galaxy WHERE user_id = $1 AND name = $2",
            GALAXY_COLUMNS
        ))
        .bind(user_id)
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(map_galaxy))
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Galaxy>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM galaxy WHERE user_id = $1 AND id = $2",
            GALAXY_COLUMNS
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(map_galaxy))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<Galaxy>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM galaxy WHERE user_id = $1 ORDER BY created_at_utc, id",
            GALAXY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(map_galaxy).collect())
    }

    async fn list_names(&self, user_id: Uuid, limit: i64) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM galaxy WHERE user_id = $1 ORDER BY created_at_utc, id LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn list_with_contents(&self, user_id: Uuid) -> Result<Vec<GalaxyContents>> {
        // Three flat queries grouped in memory; no per-galaxy round trips.
        let galaxies = sqlx::query(&format!(
            "SELECT {} FROM galaxy WHERE user_id = $1 ORDER BY created_at_utc DESC, id DESC",
            GALAXY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let planet_rows = sqlx::query(
            r#"
            SELECT p.id, p.content, p.created_at_utc, gp.galaxy_id
            FROM planet p
            LEFT JOIN galaxy_planet gp ON gp.planet_id = p.id
            WHERE p.user_id = $1
            ORDER BY p.created_at_utc DESC, p.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let image_rows = sqlx::query(
            r#"
            SELECT i.id, i.object_key, i.content_type, i.size_bytes, i.created_at_utc,
                   gi.galaxy_id
            FROM image i
            LEFT JOIN galaxy_image gi ON gi.image_id = i.id
            WHERE i.user_id = $1
            ORDER BY i.created_at_utc DESC, i.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut planets_by_galaxy: HashMap<Option<Uuid>, Vec<PlanetSummary>> = HashMap::new();
        for row in planet_rows {
            planets_by_galaxy
                .entry(row.get("galaxy_id"))
                .or_default()
                .push(PlanetSummary {
                    id: row.get("id"),
                    content: row.get("content"),
                    created_at_utc: row.get("created_at_utc"),
                });
        }

        let mut images_by_galaxy: HashMap<Option<Uuid>, Vec<ImageSummary>> = HashMap::new();
        for row in image_rows {
            images_by_galaxy
                .entry(row.get("galaxy_id"))
                .or_default()
                .push(ImageSummary {
                    id: row.get("id"),
                    object_key: row.get("object_key"),
                    content_type: row.get("content_type"),
                    size_bytes: row.get("size_bytes"),
                    created_at_utc: row.get("created_at_utc"),
                    signed_url: None,
                });
        }

        let mut folders: Vec<GalaxyContents> = galaxies
            .into_iter()
            .map(map_galaxy)
            .map(|g| {
                let planets = planets_by_galaxy.remove(&Some(g.id)).unwrap_or_default();
                let images = images_by_galaxy.remove(&Some(g.id)).unwrap_or_default();
                GalaxyContents {
                    id: Some(g.id),
                    name: g.name,
                    shareable: g.shareable,
                    is_virtual: false,
                    created_at_utc: Some(g.created_at_utc),
                    planet_count: planets.len() as i64,
                    image_count: images.len() as i64,
                    planets,
                    images,
                }
            })
            .collect();

        let orphan_planets = planets_by_galaxy.remove(&None).unwrap_or_default();
        let orphan_images = images_by_galaxy.remove(&None).unwrap_or_default();
        if !orphan_planets.is_empty() || !orphan_images.is_empty() {
            folders.push(GalaxyContents::orphaned(orphan_planets, orphan_images));
        }

        Ok(folders)
    }

    async fn rename(&self, user_id: Uuid, id: Uuid, name: &str) -> Result<Galaxy> {
        let name = validate_galaxy_name(name)?;

        let row = sqlx::query(&format!(
            "UPDATE galaxy SET name = $1 WHERE user_id = $2 AND id = $3 RETURNING {}",
            GALAXY_COLUMNS
        ))
        .bind(name)
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database);

        match row {
            Ok(Some(row)) => Ok(map_galaxy(row)),
            Ok(None) => Err(Error::NotFound(format!("Galaxy {} not found", id))),
            Err(e) if e.is_unique_violation() => Err(Error::Conflict(format!(
                "A galaxy named \"{}\" already exists",
                name
            ))),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        // Link rows cascade; planets and images are kept.
        let result = sqlx::query("DELETE FROM galaxy WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Galaxy {} not found", id)));
        }

        info!(
            subsystem = "db",
            component = "galaxies",
            op = "delete",
            user_id = %user_id,
            galaxy_id = %id,
            "Galaxy deleted"
        );
        Ok(())
    }

    async fn delete_if_empty(&self, user_id: Uuid, ids: &[Uuid]) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let deleted = self.delete_if_empty_tx(&mut tx, user_id, ids).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(deleted)
    }
}

// =============================================================================
// Transaction-aware variants
// =============================================================================

impl PgGalaxyRepository {
    /// Find or create a galaxy within an existing transaction.
    ///
    /// Uses `ON CONFLICT DO NOTHING` so a concurrent insert does not abort the
    /// surrounding transaction; the row is then re-read.
    pub async fn find_or_create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        name: &str,
    ) -> Result<Galaxy> {
        let name = validate_galaxy_name(name)?;

        let existing = sqlx::query(&format!(
            "SELECT {} FROM galaxy WHERE user_id = $1 AND name = $2",
            GALAXY_COLUMNS
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = existing {
            return Ok(map_galaxy(row));
        }

        let inserted = sqlx::query(&format!(
            "INSERT INTO galaxy (id, user_id, name, shareable, created_at_utc)
             VALUES ($1, $2, $3, FALSE, $4)
             ON CONFLICT (user_id, name) DO NOTHING
             RETURNING {}",
            GALAXY_COLUMNS
        ))
        .bind(new_v7())
        .bind(user_id)
        .bind(name)
        .bind(Utc::now())
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = inserted {
            return Ok(map_galaxy(row));
        }

        let row = sqlx::query(&format!(
            "SELECT {} FROM galaxy WHERE user_id = $1 AND name = $2",
            GALAXY_COLUMNS
        ))
        .bind(user_id)
        .bind(name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.map(map_galaxy)
            .ok_or_else(|| Error::Internal("Folder resolution failed".to_string()))
    }

    /// Delete those of `ids` owned by the user that have no planets and no
    /// images left.
    pub async fn delete_if_empty_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM galaxy g
            WHERE g.user_id = $1
              AND g.id = ANY($2)
              AND NOT EXISTS (SELECT 1 FROM galaxy_planet gp WHERE gp.galaxy_id = g.id)
              AND NOT EXISTS (SELECT 1 FROM galaxy_image gi WHERE gi.galaxy_id = g.id)
            "#,
        )
        .bind(user_id)
        .bind(ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            debug!(
                subsystem = "db",
                component = "galaxies",
                op = "delete_if_empty",
                user_id = %user_id,
                rows_affected = deleted,
                "Removed empty galaxies"
            );
        }
        Ok(deleted)
    }
}
