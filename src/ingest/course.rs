//! Per-course ingestion pipeline.
//!
//! Scrape → replace stored reviews → chunk → summarize → sentiment →
//! aggregate. Each stage is named so a failure reports exactly where the
//! course died; failures here never propagate past the course boundary.

use crate::chunk::{self, CHUNK_BUDGET};
use crate::data::models::{AggregateResult, Course};
use crate::data::ReviewStore;
use crate::nlp::{Nlp, NlpError, Sentiment};
use crate::site::{CourseScraper, PageDriver, Session};
use crate::utils::log_if_slow;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Pipeline stage, used in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scrape,
    ReplaceReviews,
    Summarize,
    Sentiment,
    StoreAggregate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scrape => "scrape",
            Stage::ReplaceReviews => "replace-reviews",
            Stage::Summarize => "summarize",
            Stage::Sentiment => "sentiment",
            Stage::StoreAggregate => "store-aggregate",
        };
        f.write_str(name)
    }
}

/// A course-level failure: the stage it happened in plus the cause.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed")]
pub struct CourseError {
    pub stage: Stage,
    #[source]
    pub source: anyhow::Error,
}

fn fail(stage: Stage, source: anyhow::Error) -> CourseError {
    CourseError { stage, source }
}

/// Terminal state of one course's pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseOutcome {
    Completed { reviews: usize, chunks: usize },
    /// Nothing was extracted this cycle: no writes, no remote calls, prior
    /// stored data left untouched.
    SkippedEmpty,
}

const SLOW_WRITE_THRESHOLD: Duration = Duration::from_millis(500);

/// Run the full pipeline for one course.
#[allow(clippy::too_many_arguments)]
pub async fn ingest_course(
    driver: &dyn PageDriver,
    session: &Session,
    nlp: &dyn Nlp,
    store: &dyn ReviewStore,
    site_base_url: &str,
    course: &Course,
    sentiment_max_chars: usize,
) -> Result<CourseOutcome, CourseError> {
    let scraper = CourseScraper::new(driver, site_base_url);
    let reviews = scraper
        .scrape(session, course)
        .await
        .map_err(|e| fail(Stage::Scrape, e.into()))?;

    if reviews.is_empty() {
        return Ok(CourseOutcome::SkippedEmpty);
    }

    let started = Instant::now();
    store
        .replace_reviews(course.course_id, &reviews)
        .await
        .map_err(|e| fail(Stage::ReplaceReviews, e))?;
    log_if_slow(started, SLOW_WRITE_THRESHOLD, "replace_reviews");

    // Running totals for the remaining stages: rating sum, the full text
    // for sentiment, and the ordered texts fed to the chunker.
    let rating_sum: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
    let all_text: String = reviews.iter().map(|r| r.content.as_str()).collect();

    let chunks = chunk::pack(reviews.iter().map(|r| r.content.as_str()), CHUNK_BUDGET);
    let mut material = String::new();
    for piece in &chunks {
        let summary = nlp
            .summarize(piece)
            .await
            .map_err(|e| fail(Stage::Summarize, e.into()))?;
        material.push_str(&summary);
    }

    let sentiment = course_sentiment(nlp, &all_text, sentiment_max_chars, course).await?;

    let aggregate = AggregateResult {
        material,
        sentiment: sentiment.as_ref().map(|s| s.label.clone()),
        confidence: sentiment.as_ref().map(|s| s.confidence),
        average_rating: average_rating(rating_sum, reviews.len()),
    };
    store
        .upsert_aggregate(course.course_id, &aggregate)
        .await
        .map_err(|e| fail(Stage::StoreAggregate, e))?;

    Ok(CourseOutcome::Completed {
        reviews: reviews.len(),
        chunks: chunks.len(),
    })
}

/// Classify the course's concatenated review text.
///
/// A malformed response degrades to an absent classification (the aggregate
/// is still stored); a failed request fails the course.
async fn course_sentiment(
    nlp: &dyn Nlp,
    all_text: &str,
    max_chars: usize,
    course: &Course,
) -> Result<Option<Sentiment>, CourseError> {
    let input = truncate_chars(all_text, max_chars);
    if input.len() < all_text.len() {
        debug!(
            course = %course.name,
            max_chars,
            total_chars = all_text.chars().count(),
            "sentiment input truncated to endpoint limit"
        );
    }

    match nlp.analyze_sentiment(input).await {
        Ok(sentiment) => Ok(Some(sentiment)),
        Err(err @ NlpError::MalformedResponse { .. }) => {
            warn!(
                course = %course.name,
                error = %err,
                "malformed sentiment response, storing aggregate without sentiment"
            );
            Ok(None)
        }
        Err(e) => Err(fail(Stage::Sentiment, e.into())),
    }
}

fn average_rating(rating_sum: i64, count: usize) -> f32 {
    rating_sum as f32 / count as f32
}

/// Truncate to at most `max` chars without breaking a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
