//! Storage contract consumed by the ingestion pipeline, with the PostgreSQL
//! implementation used in production.

use crate::data::models::{AggregateResult, Course, RawReview};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

/// The three operations the pipeline needs from durable storage.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// All known courses, in a stable order.
    async fn list_courses(&self) -> Result<Vec<Course>>;

    /// Replace a course's stored reviews (and drop its stale aggregate)
    /// with the freshly scraped set. All-or-nothing per course: a failure
    /// must never leave a mixed old/new review set.
    async fn replace_reviews(&self, course_id: i32, reviews: &[RawReview]) -> Result<()>;

    /// Store a course's aggregate, overwriting any prior one.
    async fn upsert_aggregate(&self, course_id: i32, aggregate: &AggregateResult) -> Result<()>;
}

/// PostgreSQL-backed [`ReviewStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for PgStore {
    async fn list_courses(&self) -> Result<Vec<Course>> {
        let courses = sqlx::query_as::<_, Course>(
            "SELECT course_id, name, professor FROM courses ORDER BY course_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(courses)
    }

    async fn replace_reviews(&self, course_id: i32, reviews: &[RawReview]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Delete-and-reinsert inside one transaction: scraped reviews carry
        // no stable identity, so replacement is the only dedupe-safe shape.
        sqlx::query("DELETE FROM course_aggregates WHERE course_id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM reviews WHERE course_id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await?;

        for review in reviews {
            sqlx::query("INSERT INTO reviews (course_id, content, rating) VALUES ($1, $2, $3)")
                .bind(course_id)
                .bind(&review.content)
                .bind(review.rating)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn upsert_aggregate(&self, course_id: i32, aggregate: &AggregateResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO course_aggregates (
                course_id, material, sentiment, confidence, average_rating, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (course_id)
            DO UPDATE SET
                material = EXCLUDED.material,
                sentiment = EXCLUDED.sentiment,
                confidence = EXCLUDED.confidence,
                average_rating = EXCLUDED.average_rating,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(course_id)
        .bind(&aggregate.material)
        .bind(&aggregate.sentiment)
        .bind(aggregate.confidence)
        .bind(aggregate.average_rating)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
