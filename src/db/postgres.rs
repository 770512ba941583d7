use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;

use crate::{
    db::ContentStore,
    error::AppResult,
    models::{ContentRecord, FeedbackEvent, SimilarityEdge},
    services::similarity::{
        adjust_score,
        feedback::{FEEDBACK_STEP, MAX_FEEDBACK_SCORE, MIN_FEEDBACK_SCORE},
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Content store backed by Postgres
///
/// Expects three tables:
/// - `content (id TEXT PRIMARY KEY, title, kind, year, genres TEXT[], directors TEXT[], cast_members TEXT[], plot)`
/// - `content_similarities (source_id, target_id, score DOUBLE PRECISION, updated_at TIMESTAMPTZ, UNIQUE (source_id, target_id))`
/// - `user_feedback (user_id, content_id, source_content_id, is_positive, created_at)`
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: String,
    title: String,
    kind: String,
    year: Option<String>,
    genres: Vec<String>,
    directors: Vec<String>,
    cast_members: Vec<String>,
    plot: Option<String>,
}

impl From<ContentRow> for ContentRecord {
    fn from(row: ContentRow) -> Self {
        ContentRecord {
            id: row.id,
            title: row.title,
            kind: row.kind.parse().unwrap_or_default(),
            year: row.year,
            genres: row.genres,
            directors: row.directors,
            cast: row.cast_members,
            plot: row.plot.unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct EdgeRow {
    source_id: String,
    target_id: String,
    score: f64,
    updated_at: DateTime<Utc>,
}

impl From<EdgeRow> for SimilarityEdge {
    fn from(row: EdgeRow) -> Self {
        SimilarityEdge {
            source_id: row.source_id,
            target_id: row.target_id,
            score: row.score,
            updated_at: row.updated_at,
        }
    }
}

const CONTENT_COLUMNS: &str =
    "SELECT id, title, kind, year, genres, directors, cast_members, plot FROM content";

/// Keeps the last edge for each pair; Postgres rejects an upsert that touches a row twice
fn dedupe_edges(edges: &[SimilarityEdge]) -> Vec<&SimilarityEdge> {
    let mut positions: HashMap<(&str, &str), usize> = HashMap::new();
    let mut unique: Vec<&SimilarityEdge> = Vec::with_capacity(edges.len());

    for edge in edges {
        let key = (edge.source_id.as_str(), edge.target_id.as_str());
        match positions.get(&key) {
            Some(&idx) => unique[idx] = edge,
            None => {
                positions.insert(key, unique.len());
                unique.push(edge);
            }
        }
    }
    unique
}

fn feedback_delta(is_positive: bool) -> f64 {
    if is_positive {
        FEEDBACK_STEP
    } else {
        -FEEDBACK_STEP
    }
}

#[async_trait::async_trait]
impl ContentStore for PgContentStore {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<ContentRecord>> {
        let row = sqlx::query_as::<_, ContentRow>(&format!("{} WHERE id = $1", CONTENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ContentRecord::from))
    }

    async fn get_by_ids(&self, ids: &[String]) -> AppResult<Vec<ContentRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows =
            sqlx::query_as::<_, ContentRow>(&format!("{} WHERE id = ANY($1)", CONTENT_COLUMNS))
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(ContentRecord::from).collect())
    }

    async fn get_all(&self) -> AppResult<Vec<ContentRecord>> {
        let rows = sqlx::query_as::<_, ContentRow>(&format!("{} ORDER BY id", CONTENT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ContentRecord::from).collect())
    }

    async fn get_all_except(&self, id: &str) -> AppResult<Vec<ContentRecord>> {
        let rows = sqlx::query_as::<_, ContentRow>(&format!(
            "{} WHERE id <> $1 ORDER BY id",
            CONTENT_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ContentRecord::from).collect())
    }

    async fn upsert_content(&self, record: &ContentRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO content (id, title, kind, year, genres, directors, cast_members, plot)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                kind = EXCLUDED.kind,
                year = EXCLUDED.year,
                genres = EXCLUDED.genres,
                directors = EXCLUDED.directors,
                cast_members = EXCLUDED.cast_members,
                plot = EXCLUDED.plot
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(record.kind.to_string())
        .bind(&record.year)
        .bind(&record.genres)
        .bind(&record.directors)
        .bind(&record.cast)
        .bind(&record.plot)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_edge(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> AppResult<Option<SimilarityEdge>> {
        let row = sqlx::query_as::<_, EdgeRow>(
            r#"
            SELECT source_id, target_id, score, updated_at
            FROM content_similarities
            WHERE source_id = $1 AND target_id = $2
            "#,
        )
        .bind(source_id)
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SimilarityEdge::from))
    }

    async fn upsert_edges(&self, edges: &[SimilarityEdge]) -> AppResult<()> {
        let edges = dedupe_edges(edges);
        if edges.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO content_similarities (source_id, target_id, score, updated_at) ",
        );
        builder.push_values(edges, |mut row, edge| {
            row.push_bind(edge.source_id.clone())
                .push_bind(edge.target_id.clone())
                .push_bind(edge.score)
                .push_bind(edge.updated_at);
        });
        builder.push(
            " ON CONFLICT (source_id, target_id) DO UPDATE SET \
             score = EXCLUDED.score, updated_at = EXCLUDED.updated_at",
        );

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn adjust_edge(
        &self,
        source_id: &str,
        target_id: &str,
        is_positive: bool,
    ) -> AppResult<f64> {
        // One statement: the row lock taken by ON CONFLICT serializes concurrent feedback
        let score: f64 = sqlx::query_scalar(
            r#"
            INSERT INTO content_similarities (source_id, target_id, score, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (source_id, target_id) DO UPDATE SET
                score = LEAST(GREATEST(content_similarities.score + $4, $5), $6),
                updated_at = NOW()
            RETURNING score
            "#,
        )
        .bind(source_id)
        .bind(target_id)
        .bind(adjust_score(None, is_positive))
        .bind(feedback_delta(is_positive))
        .bind(MIN_FEEDBACK_SCORE)
        .bind(MAX_FEEDBACK_SCORE)
        .fetch_one(&self.pool)
        .await?;

        Ok(score)
    }

    async fn edges_from(&self, source_id: &str, limit: usize) -> AppResult<Vec<SimilarityEdge>> {
        let rows = sqlx::query_as::<_, EdgeRow>(
            r#"
            SELECT source_id, target_id, score, updated_at
            FROM content_similarities
            WHERE source_id = $1
            ORDER BY score DESC, target_id
            LIMIT $2
            "#,
        )
        .bind(source_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SimilarityEdge::from).collect())
    }

    async fn record_feedback(&self, event: &FeedbackEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_feedback (user_id, content_id, source_content_id, is_positive, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&event.user_id)
        .bind(&event.content_id)
        .bind(&event.source_content_id)
        .bind(event.is_positive)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
