//! Error types for the review site client.

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    /// Login form absent or submission yielded no session cookies.
    /// Fatal for the whole cycle: nothing can be scraped without a session.
    #[error("site login failed: {0}")]
    LoginFailed(String),
    /// The parallel rating/text extractions disagree on length. The two
    /// lists must stay order-aligned, so this is never silently truncated.
    #[error("review extraction mismatch: {ratings} ratings vs {texts} texts")]
    ExtractionMismatch { ratings: usize, texts: usize },
    /// A page element was present but didn't have the expected shape.
    #[error("unexpected page structure: {0}")]
    UnexpectedStructure(String),
    #[error(transparent)]
    RequestFailed(#[from] anyhow::Error),
}
