//! Client for the review site being scraped.
//!
//! The concrete page transport lives behind the [`PageDriver`] trait so the
//! scraping logic can be exercised against canned pages in tests. Session
//! state is an explicit [`Session`] value threaded through each call rather
//! than a shared cookie jar.

mod driver;
mod errors;
mod scrape;
mod session;

pub use driver::{HttpDriver, Page, PageDriver, SessionCookie};
pub use errors::SiteError;
pub use scrape::CourseScraper;
pub use session::{Session, SessionManager};

/// Resolve a possibly-relative href against the site base URL.
pub(crate) fn resolve_url(base: &str, href: &str) -> Result<String, SiteError> {
    let base = url::Url::parse(base)
        .map_err(|e| SiteError::UnexpectedStructure(format!("invalid base URL {base:?}: {e}")))?;
    let resolved = base
        .join(href)
        .map_err(|e| SiteError::UnexpectedStructure(format!("unresolvable href {href:?}: {e}")))?;
    Ok(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url_relative() {
        assert_eq!(
            resolve_url("https://example.kr", "/lecture/view/42").unwrap(),
            "https://example.kr/lecture/view/42"
        );
    }

    #[test]
    fn test_resolve_url_absolute() {
        assert_eq!(
            resolve_url("https://example.kr", "https://other.kr/x").unwrap(),
            "https://other.kr/x"
        );
    }

    #[test]
    fn test_resolve_url_bad_base() {
        assert!(resolve_url("not a url", "/x").is_err());
    }
}
