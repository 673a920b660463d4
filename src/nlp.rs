//! Client for the remote summarization and sentiment functions.
//!
//! Both are opaque remote calls: `summarize` is invoked once per chunk, and
//! `analyze_sentiment` once per course on the full concatenated review text.
//! A malformed response body is reported distinctly from a failed request so
//! the pipeline can degrade instead of failing the course.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const CLIENT_ID_HEADER: &str = "X-NCP-APIGW-API-KEY-ID";
const CLIENT_SECRET_HEADER: &str = "X-NCP-APIGW-API-KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum NlpError {
    /// The endpoint answered with a non-success status.
    #[error("NLP request failed ({status}): {body}")]
    BadStatus { status: u16, body: String },
    /// The response body didn't have the expected shape. Carries the serde
    /// path so the drifted field is identifiable from the log alone.
    #[error("malformed NLP response at '{path}': {message}")]
    MalformedResponse { path: String, message: String },
    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

/// Sentiment classification extracted from the remote response.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentiment {
    pub label: String,
    pub confidence: f64,
}

/// Contract for the remote NLP functions.
#[async_trait]
pub trait Nlp: Send + Sync {
    /// Summarize one chunk of review text.
    async fn summarize(&self, text: &str) -> Result<String, NlpError>;

    /// Classify the sentiment of a course's concatenated review text.
    async fn analyze_sentiment(&self, text: &str) -> Result<Sentiment, NlpError>;
}

/// HTTP-backed [`Nlp`] implementation.
pub struct NlpClient {
    http: reqwest::Client,
    summarize_url: String,
    sentiment_url: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    summary: String,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    document: SentimentDocument,
}

#[derive(Debug, Deserialize)]
struct SentimentDocument {
    sentiment: String,
    confidence: f64,
}

impl NlpClient {
    pub fn new(
        summarize_url: String,
        sentiment_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build reqwest client"),
            summarize_url,
            sentiment_url,
            client_id,
            client_secret,
        }
    }

    async fn post(&self, url: &str, body: serde_json::Value) -> Result<String, NlpError> {
        let resp = self
            .http
            .post(url)
            .header(CLIENT_ID_HEADER, &self.client_id)
            .header(CLIENT_SECRET_HEADER, &self.client_secret)
            .json(&body)
            .send()
            .await
            .map_err(|e| NlpError::Request(anyhow::anyhow!("Failed to POST {url}: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| NlpError::Request(anyhow::anyhow!("Failed to read NLP response: {e}")))?;

        if !status.is_success() {
            return Err(NlpError::BadStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

/// Parse a response body, mapping failures to [`NlpError::MalformedResponse`]
/// with the serde path of the offending field.
fn parse_response<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, NlpError> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| NlpError::MalformedResponse {
        path: err.path().to_string(),
        message: err.inner().to_string(),
    })
}

#[async_trait]
impl Nlp for NlpClient {
    async fn summarize(&self, text: &str) -> Result<String, NlpError> {
        let body = self
            .post(&self.summarize_url, serde_json::json!({ "text": text }))
            .await?;
        let parsed: SummarizeResponse = parse_response(&body)?;
        Ok(parsed.summary)
    }

    async fn analyze_sentiment(&self, text: &str) -> Result<Sentiment, NlpError> {
        let body = self
            .post(&self.sentiment_url, serde_json::json!({ "content": text }))
            .await?;
        let parsed: SentimentResponse = parse_response(&body)?;
        Ok(Sentiment {
            label: parsed.document.sentiment,
            confidence: parsed.document.confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sentiment_response() {
        let body = r#"{
            "document": {
                "sentiment": "positive",
                "confidence": 99.32,
                "sentences": []
            }
        }"#;
        let parsed: SentimentResponse = parse_response(body).unwrap();
        assert_eq!(parsed.document.sentiment, "positive");
        assert_eq!(parsed.document.confidence, 99.32);
    }

    #[test]
    fn test_parse_sentiment_response_missing_field() {
        let body = r#"{"document": {"sentiment": "negative"}}"#;
        let err = parse_response::<SentimentResponse>(body).unwrap_err();
        match err {
            NlpError::MalformedResponse { path, .. } => assert_eq!(path, "document"),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_sentiment_response_mistyped_field() {
        let body = r#"{"document": {"sentiment": "neutral", "confidence": "high"}}"#;
        let err = parse_response::<SentimentResponse>(body).unwrap_err();
        match err {
            NlpError::MalformedResponse { path, .. } => {
                assert_eq!(path, "document.confidence");
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_summarize_response() {
        let parsed: SummarizeResponse =
            parse_response(r#"{"summary": "condensed text"}"#).unwrap();
        assert_eq!(parsed.summary, "condensed text");
    }

    #[test]
    fn test_parse_summarize_response_not_json() {
        let err = parse_response::<SummarizeResponse>("<html>oops</html>").unwrap_err();
        assert!(matches!(err, NlpError::MalformedResponse { .. }));
    }
}
