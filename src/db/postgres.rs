use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};

use crate::{
    db::store::{ContentStore, PoolStats},
    error::AppResult,
    models::{ContentItem, InteractionType, Tag, UserInteraction, UserInterest},
    services::scoring::EngagementFormula,
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

// Tags are aggregated into a JSON array so content and tags arrive in one round trip.
const RANKED_CONTENTS_SQL: &str = r#"
    SELECT c.id::text AS id, c.title, c.engagement_score, c.created_at,
           COALESCE(
               json_agg(json_build_object('id', t.id::text, 'name', t.name)
                        ORDER BY ct.position, t.name)
                   FILTER (WHERE t.id IS NOT NULL),
               '[]'::json
           ) AS tags
    FROM contents c
    LEFT JOIN content_tags ct ON ct.content_id = c.id
    LEFT JOIN tags t ON t.id = ct.tag_id
    GROUP BY c.id
    ORDER BY c.engagement_score DESC NULLS LAST, c.created_at DESC
    LIMIT $1
"#;

const CONTENT_BY_ID_SQL: &str = r#"
    SELECT c.id::text AS id, c.title, c.engagement_score, c.created_at,
           COALESCE(
               json_agg(json_build_object('id', t.id::text, 'name', t.name)
                        ORDER BY ct.position, t.name)
                   FILTER (WHERE t.id IS NOT NULL),
               '[]'::json
           ) AS tags
    FROM contents c
    LEFT JOIN content_tags ct ON ct.content_id = c.id
    LEFT JOIN tags t ON t.id = ct.tag_id
    WHERE c.id = $1::uuid
    GROUP BY c.id
"#;

// $1 = normalizer, $2 = half-life in hours. Mirrors EngagementFormula::score.
const RECOMPUTE_ENGAGEMENT_SQL: &str = r#"
    UPDATE contents
    SET engagement_score = LEAST(1.0, GREATEST(0.0,
        (view_count + like_count * 5 + share_count * 10)::double precision
        / ($1 * POWER(2.0,
            GREATEST(0.0, EXTRACT(EPOCH FROM (NOW() - created_at)) / 3600.0) / $2))
    ))
"#;

#[derive(Debug, FromRow)]
struct ContentRow {
    id: String,
    title: String,
    engagement_score: Option<f64>,
    created_at: DateTime<Utc>,
    tags: Json<Vec<Tag>>,
}

impl From<ContentRow> for ContentItem {
    fn from(row: ContentRow) -> Self {
        ContentItem {
            id: row.id,
            title: row.title,
            tags: row.tags.0,
            engagement_score: row.engagement_score,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct InterestRow {
    user_id: String,
    tag_id: String,
    interest_score: f64,
}

#[derive(Debug, FromRow)]
struct InteractionRow {
    id: String,
    user_id: String,
    content_id: String,
    interaction_type: String,
    weight: f64,
    created_at: DateTime<Utc>,
}

/// [`ContentStore`] backed by PostgreSQL
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn fetch_ranked_contents(&self, limit: u32) -> AppResult<Vec<ContentItem>> {
        let rows: Vec<ContentRow> = sqlx::query_as(RANKED_CONTENTS_SQL)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn fetch_content(&self, content_id: &str) -> AppResult<Option<ContentItem>> {
        // Content ids are UUIDs; anything else cannot exist and must not reach the
        // database as a cast error, which would count against the breaker.
        if uuid::Uuid::parse_str(content_id).is_err() {
            return Ok(None);
        }

        let row: Option<ContentRow> = sqlx::query_as(CONTENT_BY_ID_SQL)
            .bind(content_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ContentItem::from))
    }

    async fn fetch_user_interests(&self, user_id: &str) -> AppResult<Vec<UserInterest>> {
        let rows: Vec<InterestRow> = sqlx::query_as(
            r#"
            SELECT user_id, tag_id::text AS tag_id, interest_score
            FROM user_interests
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| UserInterest {
                user_id: row.user_id,
                tag_id: row.tag_id,
                interest_score: row.interest_score,
            })
            .collect())
    }

    async fn fetch_interaction_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> AppResult<Vec<UserInteraction>> {
        let rows: Vec<InteractionRow> = sqlx::query_as(
            r#"
            SELECT id::text AS id, user_id, content_id::text AS content_id,
                   interaction_type, weight, created_at
            FROM user_interactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let interactions = rows
            .into_iter()
            .filter_map(|row| match row.interaction_type.parse::<InteractionType>() {
                Ok(interaction_type) => Some(UserInteraction {
                    id: row.id,
                    user_id: row.user_id,
                    content_id: row.content_id,
                    interaction_type,
                    weight: row.weight,
                    created_at: row.created_at,
                }),
                Err(e) => {
                    tracing::warn!(interaction_id = %row.id, error = %e, "Skipping interaction row");
                    None
                }
            })
            .collect();

        Ok(interactions)
    }

    async fn recompute_engagement_scores(&self, formula: &EngagementFormula) -> AppResult<u64> {
        let result = sqlx::query(RECOMPUTE_ENGAGEMENT_SQL)
            .bind(formula.normalizer)
            .bind(formula.half_life_hours)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
        }
    }
}
