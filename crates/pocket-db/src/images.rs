//! Image metadata repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use pocket_core::{new_v7, Error, Galaxy, Image, ImageRepository, NewImage, Result};

use crate::galaxies::PgGalaxyRepository;

const IMAGE_COLUMNS: &str = "id, user_id, bucket, object_key, content_type, size_bytes, \
                             checksum_sha256, is_public, created_at_utc";

/// PostgreSQL implementation of ImageRepository.
pub struct PgImageRepository {
    pool: Pool<Postgres>,
    galaxies: PgGalaxyRepository,
}

impl PgImageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            galaxies: PgGalaxyRepository::new(pool.clone()),
            pool,
        }
    }

    async fn galaxy_ids_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        image_id: Uuid,
    ) -> Result<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("SELECT galaxy_id FROM galaxy_image WHERE image_id = $1")
            .bind(image_id)
            .fetch_all(&mut **tx)
            .await
            .map_err(Error::Database)
    }
}

fn map_image(row: PgRow) -> Image {
    Image {
        id: row.get("id"),
        user_id: row.get("user_id"),
        bucket: row.get("bucket"),
        object_key: row.get("object_key"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        checksum_sha256: row.get("checksum_sha256"),
        is_public: row.get("is_public"),
        created_at_utc: row.get("created_at_utc"),
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn create(&self, image: NewImage, galaxy_id: Option<Uuid>) -> Result<Image> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(&format!(
            "INSERT INTO image (id, user_id, bucket, object_key, content_type, size_bytes,
                                checksum_sha256, is_public, created_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(new_v7())
        .bind(image.user_id)
        .bind(&image.bucket)
        .bind(&image.object_key)
        .bind(&image.content_type)
        .bind(image.size_bytes)
        .bind(&image.checksum_sha256)
        .bind(image.is_public)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let created = map_image(row);

        if let Some(galaxy_id) = galaxy_id {
            sqlx::query("INSERT INTO galaxy_image (galaxy_id, image_id) VALUES ($1, $2)")
                .bind(galaxy_id)
                .bind(created.id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "images",
            op = "create",
            user_id = %created.user_id,
            image_id = %created.id,
            object_key = %created.object_key,
            "Image metadata stored"
        );
        Ok(created)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Image>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM image WHERE user_id = $1 AND id = $2",
            IMAGE_COLUMNS
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(map_image))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Image> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let previous = self.galaxy_ids_tx(&mut tx, id).await?;

        let row = sqlx::query(&format!(
            "DELETE FROM image WHERE user_id = $1 AND id = $2 RETURNING {}",
            IMAGE_COLUMNS
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let deleted = row
            .map(map_image)
            .ok_or_else(|| Error::NotFound(format!("Image {} not found", id)))?;

        let removed = self
            .galaxies
            .delete_if_empty_tx(&mut tx, user_id, &previous)
            .await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "images",
            op = "delete",
            user_id = %user_id,
            image_id = %id,
            galaxies_removed = removed,
            "Image metadata deleted"
        );
        Ok(deleted)
    }

    async fn attach_to_galaxy(
        &self,
        user_id: Uuid,
        id: Uuid,
        galaxy_name: &str,
    ) -> Result<Galaxy> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM image WHERE user_id = $1 AND id = $2)",
        )
        .bind(user_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if !owned {
            return Err(Error::NotFound(format!("Image {} not found", id)));
        }

        let previous = self.galaxy_ids_tx(&mut tx, id).await?;

        sqlx::query("DELETE FROM galaxy_image WHERE image_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        let target = self
            .galaxies
            .find_or_create_tx(&mut tx, user_id, galaxy_name)
            .await?;

        sqlx::query("INSERT INTO galaxy_image (galaxy_id, image_id) VALUES ($1, $2)")
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
            component = "images",
            op = "attach_to_galaxy",
            user_id = %user_id,
            image_id = %id,
            galaxy_id = %target.id,
            galaxies_removed = removed,
            "Image moved"
        );
        Ok(target)
    }
}
