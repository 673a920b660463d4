use figment::{providers::Env, Figment};
use serde::Deserialize;

/// Application configuration, loaded from environment variables.
///
/// Credentials (site login, NLP client id/secret) are never hard-coded;
/// they must be supplied via the environment or a local `.env` file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    /// Base URL of the review site being scraped.
    #[serde(default = "default_site_base_url")]
    pub site_base_url: String,
    /// Login id for the review site.
    pub site_id: String,
    /// Login password for the review site.
    pub site_password: String,

    /// Endpoint of the remote summarization function.
    pub summarize_url: String,
    /// Endpoint of the remote sentiment function.
    pub sentiment_url: String,
    /// NLP API client id.
    pub client_id: String,
    /// NLP API client secret.
    pub client_secret: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Hours between ingestion cycles.
    #[serde(default = "default_ingest_interval_hours")]
    pub ingest_interval_hours: u64,

    /// Maximum characters submitted to the sentiment endpoint. Longer input
    /// is truncated at a char boundary before the call.
    #[serde(default = "default_sentiment_max_chars")]
    pub sentiment_max_chars: usize,
}

fn default_site_base_url() -> String {
    "https://everytime.kr".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ingest_interval_hours() -> u64 {
    24
}

fn default_sentiment_max_chars() -> usize {
    2000
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new().merge(Env::raw()).extract()
    }
}
