//! Categorization audit repository.
//!
//! Writes go through three strategies of decreasing fidelity:
//!
//! 1. **Typed**: full insert against the migrated `ai_categorization` table.
//! 2. **Minimal**: insert of only the columns every schema revision has had.
//! 3. **Adaptive**: insert assembled from the live column set reported by
//!    `information_schema.columns`, synthesizing values for required columns
//!    it does not recognize.
//!
//! The fallbacks only matter for deployments whose schema is managed outside
//! this workspace. Every fallback use is logged at WARN.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use pocket_core::{
    new_v7, normalize_preview, CategorizationRepository, CategorizationWrite, Error,
    NewCategorization, Result, UserCorrection, WriteTier,
};

/// Table holding categorization records.
pub const CATEGORIZATION_TABLE: &str = "ai_categorization";

/// PostgreSQL implementation of CategorizationRepository.
pub struct PgCategorizationRepository {
    pool: Pool<Postgres>,
}

impl PgCategorizationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn insert_typed(&self, id: Uuid, record: &NewCategorization) -> Result<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO ai_categorization
                (id, user_id, planet_id, folder_id, content_preview, suggested_folder,
                 accepted_folder, confidence, reasoning, alternatives, created_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(record.user_id)
        .bind(record.planet_id)
        .bind(record.folder_id)
        .bind(&record.content_preview)
        .bind(&record.suggested_folder)
        .bind(&record.accepted_folder)
        .bind(record.confidence)
        .bind(&record.reasoning)
        .bind(&record.alternatives)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn insert_minimal(&self, id: Uuid, record: &NewCategorization) -> Result<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO ai_categorization
                (id, user_id, folder_id, content_preview, suggested_folder, accepted_folder,
                 created_at_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(record.user_id)
        .bind(record.folder_id)
        .bind(&record.content_preview)
        .bind(&record.suggested_folder)
        .bind(&record.accepted_folder)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn live_columns(&self) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query(
            r#"
            SELECT column_name, is_nullable, data_type, column_default IS NOT NULL AS has_default
            FROM information_schema.columns
            WHERE table_schema = current_schema() AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(CATEGORIZATION_TABLE)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let nullable: String = r.get("is_nullable");
                ColumnInfo {
                    name: r.get("column_name"),
                    is_nullable: nullable == "YES",
                    data_type: r.get("data_type"),
                    has_default: r.get("has_default"),
                }
            })
            .collect())
    }

    async fn insert_adaptive(&self, id: Uuid, record: &NewCategorization) -> Result<Option<Uuid>> {
        let columns = self.live_columns().await?;
        let insert = build_adaptive_insert(CATEGORIZATION_TABLE, &columns, id, record)
            .ok_or_else(|| Error::Internal(format!("{} has no columns", CATEGORIZATION_TABLE)))?;

        debug!(
            subsystem = "db",
            component = "categorizations",
            op = "insert_adaptive",
            columns = %insert.columns.join(","),
            "Built adaptive insert"
        );

        let mut query = sqlx::query(&insert.sql);
        for param in insert.params {
            query = match param {
                SqlParam::Uuid(v) => query.bind(v),
                SqlParam::OptUuid(v) => query.bind(v),
                SqlParam::Text(v) => query.bind(v),
                SqlParam::Float(v) => query.bind(v),
                SqlParam::TextArray(v) => query.bind(v),
            };
        }

        let result = query.execute(&self.pool).await.map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::Internal("Adaptive insert affected no rows".to_string()));
        }

        Ok(insert.has_id.then_some(id))
    }
}

#[async_trait]
impl CategorizationRepository for PgCategorizationRepository {
    async fn recent_corrections(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<UserCorrection>> {
        let rows = sqlx::query(
            r#"
            SELECT content_preview, suggested_folder, accepted_folder
            FROM ai_categorization
            WHERE user_id = $1 AND accepted_folder IS NOT NULL
            ORDER BY created_at_utc DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let preview: Option<String> = r.get("content_preview");
                let suggested: Option<String> = r.get("suggested_folder");
                let accepted: Option<String> = r.get("accepted_folder");
                match (preview, suggested, accepted) {
                    (Some(preview), Some(suggested), Some(accepted)) if accepted != suggested => {
                        Some(UserCorrection {
                            original_content: normalize_preview(&preview),
                            suggested_folder: suggested,
                            accepted_folder: accepted,
                        })
                    }
                    _ => None,
                }
            })
            .collect())
    }

    async fn record(&self, record: NewCategorization) -> CategorizationWrite {
        let id = new_v7();

        let typed_err = match self.insert_typed(id, &record).await {
            Ok(review_id) => {
                debug!(
                    subsystem = "db",
                    component = "categorizations",
                    op = "record",
                    write_tier = %WriteTier::Typed,
                    "Categorization recorded"
                );
                return CategorizationWrite {
                    review_id: Some(review_id),
                    tier: Some(WriteTier::Typed),
                };
            }
            Err(e) => e,
        };

        let minimal_err = match self.insert_minimal(id, &record).await {
            Ok(review_id) => {
                warn!(
                    subsystem = "db",
                    component = "categorizations",
                    op = "record",
                    write_tier = %WriteTier::Minimal,
                    error = %typed_err,
                    "Categorization recorded with minimal fields"
                );
                return CategorizationWrite {
                    review_id: Some(review_id),
                    tier: Some(WriteTier::Minimal),
                };
            }
            Err(e) => e,
        };

        match self.insert_adaptive(id, &record).await {
            Ok(review_id) => {
                warn!(
                    subsystem = "db",
                    component = "categorizations",
                    op = "record",
                    write_tier = %WriteTier::Adaptive,
                    error = %minimal_err,
                    "Categorization recorded via adaptive insert"
                );
                CategorizationWrite {
                    review_id,
                    tier: Some(WriteTier::Adaptive),
                }
            }
            Err(e) => {
                warn!(
                    subsystem = "db",
                    component = "categorizations",
                    op = "record",
                    success = false,
                    error = %e,
                    "Failed to persist categorization (all strategies)"
                );
                CategorizationWrite::default()
            }
        }
    }

    async fn mark_accepted(
        &self,
        user_id: Uuid,
        planet_id: Uuid,
        folder_name: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE ai_categorization SET accepted_folder = $1
            WHERE id = (
                SELECT id FROM ai_categorization
                WHERE user_id = $2 AND planet_id = $3
                ORDER BY created_at_utc DESC
                LIMIT 1
            )
            "#,
        )
        .bind(folder_name)
        .bind(user_id)
        .bind(planet_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Adaptive insert builder
// =============================================================================

/// One row of `information_schema.columns`.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub is_nullable: bool,
    pub data_type: String,
    pub has_default: bool,
}

/// A bound parameter of an adaptive insert.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Uuid(Uuid),
    OptUuid(Option<Uuid>),
    Text(String),
    Float(f64),
    TextArray(Vec<String>),
}

/// An insert statement built against a live column set.
#[derive(Debug, Clone)]
pub struct AdaptiveInsert {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub columns: Vec<String>,
    /// Whether the generated id was written (so it can be reported back).
    pub has_id: bool,
}

enum Slot {
    Param(SqlParam),
    CastParam(SqlParam, &'static str),
    Literal(&'static str),
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Value for a column this crate knows about, by snake_case or camelCase name.
fn known_value(column: &ColumnInfo, id: Uuid, record: &NewCategorization) -> Option<Slot> {
    let slot = match column.name.as_str() {
        "id" => Slot::Param(SqlParam::Uuid(id)),
        "user_id" | "userId" => Slot::Param(SqlParam::Uuid(record.user_id)),
        "planet_id" | "planetId" => Slot::Param(SqlParam::OptUuid(record.planet_id)),
        "folder_id" | "folderId" => Slot::Param(SqlParam::Uuid(record.folder_id)),
        "content_preview" | "contentPreview" => {
            Slot::Param(SqlParam::Text(record.content_preview.clone()))
        }
        "suggested_folder" | "suggestedFolder" => {
            Slot::Param(SqlParam::Text(record.suggested_folder.clone()))
        }
        "accepted_folder" | "acceptedFolder" => {
            Slot::Param(SqlParam::Text(record.accepted_folder.clone()))
        }
        "confidence" => Slot::Param(SqlParam::Float(record.confidence)),
        "reasoning" => Slot::Param(SqlParam::Text(record.reasoning.clone())),
        "alternatives" => {
            let json = || serde_json::to_string(&record.alternatives).unwrap_or_default();
            match column.data_type.as_str() {
                "ARRAY" => {
                    Slot::CastParam(SqlParam::TextArray(record.alternatives.clone()), "text[]")
                }
                "json" => Slot::CastParam(SqlParam::Text(json()), "json"),
                "jsonb" => Slot::CastParam(SqlParam::Text(json()), "jsonb"),
                _ => Slot::Param(SqlParam::Text(json())),
            }
        }
        "created_at_utc" | "created_at" | "createdAt" => Slot::Literal("NOW()"),
        _ => return None,
    };
    Some(slot)
}

/// Placeholder value for a required column this crate does not know.
fn synthesized_value(column: &ColumnInfo) -> Slot {
    match column.data_type.as_str() {
        "boolean" => Slot::Literal("false"),
        "smallint" | "integer" | "bigint" | "numeric" | "real" | "double precision" => {
            Slot::Literal("0")
        }
        "ARRAY" => Slot::Literal("'{}'"),
        "json" | "jsonb" => Slot::Literal("'{}'"),
        "timestamp without time zone" | "timestamp with time zone" | "date" => {
            Slot::Literal("NOW()")
        }
        "uuid" => Slot::Param(SqlParam::Uuid(Uuid::new_v4())),
        _ => Slot::Param(SqlParam::Text(String::new())),
    }
}

/// Build an insert for `table` from its live columns.
///
/// Known columns receive the record's values; unknown columns that are
/// `NOT NULL` without a default receive a type-appropriate placeholder;
/// everything else is left to the database. Returns `None` when no column
/// would be written.
pub fn build_adaptive_insert(
    table: &str,
    columns: &[ColumnInfo],
    id: Uuid,
    record: &NewCategorization,
) -> Option<AdaptiveInsert> {
    let mut names = Vec::new();
    let mut placeholders = Vec::new();
    let mut params = Vec::new();
    let mut has_id = false;

    for column in columns {
        let slot = match known_value(column, id, record) {
            Some(slot) => slot,
            None if column.is_nullable || column.has_default => continue,
            None => synthesized_value(column),
        };

        if column.name == "id" {
            has_id = true;
        }
        names.push(column.name.clone());

        match slot {
            Slot::Param(param) => {
                params.push(param);
                placeholders.push(format!("${}", params.len()));
            }
            Slot::CastParam(param, cast) => {
                params.push(param);
                placeholders.push(format!("${}::{}", params.len(), cast));
            }
            Slot::Literal(literal) => placeholders.push(literal.to_string()),
        }
    }

    if names.is_empty() {
        return None;
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names
            .iter()
            .map(|n| quote_ident(n))
            .collect::<Vec<_>>()
            .join(", "),
        placeholders.join(", ")
    );

    Some(AdaptiveInsert {
        sql,
        params,
        columns: names,
        has_id,
    })
}
