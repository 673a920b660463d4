//! Core data types flowing through the ingestion pipeline.

use serde::Serialize;

/// A course offering whose reviews are refreshed each cycle. Owned by the
/// persistence layer; the pipeline only reads it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Course {
    pub course_id: i32,
    pub name: String,
    pub professor: String,
}

/// One scraped review: a 0–5 star rating and the verbatim body text.
/// Ephemeral — lives only within one course's processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReview {
    pub rating: i32,
    pub content: String,
}

/// Per-course derived result, overwriting any prior aggregate each cycle.
///
/// `sentiment`/`confidence` are absent when the remote sentiment response
/// was malformed (the rest of the aggregate is still stored).
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    /// Ordered concatenation of all summarizer-call outputs.
    pub material: String,
    pub sentiment: Option<String>,
    pub confidence: Option<f64>,
    pub average_rating: f32,
}
