//! Narrow page-transport capability used by the scraping logic.
//!
//! Production uses [`HttpDriver`] (plain HTTP with explicit cookies); tests
//! substitute a canned-page implementation. Keeping the seam this small is
//! what makes the scraper testable without a real site.

use crate::site::SiteError;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use std::time::Duration;
use tracing::trace;

/// A single named session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

/// A fetched page: its body plus any cookies the response set.
#[derive(Debug, Default)]
pub struct Page {
    pub body: String,
    pub cookies: Vec<SessionCookie>,
}

/// Capability interface over the scrape target's transport.
///
/// Cookies are always passed in explicitly; the driver holds no session
/// state of its own. `close` releases whatever the implementation holds and
/// must be called on every cycle exit path.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// GET a page with the given cookies attached.
    async fn navigate(&self, url: &str, cookies: &[SessionCookie]) -> Result<Page, SiteError>;

    /// POST a form with the given cookies attached.
    async fn submit_form(
        &self,
        url: &str,
        fields: &[(&str, String)],
        cookies: &[SessionCookie],
    ) -> Result<Page, SiteError>;

    /// Release the driver's resources.
    async fn close(&self);
}

/// Per-request timeout against the scrape target. A timed-out element fetch
/// surfaces as "not found" at the scraping layer, not a distinct error class.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between page loads so the target isn't hammered.
const PAGE_DELAY: Duration = Duration::from_millis(500);

/// HTTP-backed [`PageDriver`].
pub struct HttpDriver {
    http: reqwest::Client,
    delay: Duration,
}

impl Default for HttpDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDriver {
    pub fn new() -> Self {
        Self {
            // Redirects are not followed: the login submission answers with a
            // redirect carrying Set-Cookie headers that must stay observable.
            http: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build reqwest client"),
            delay: PAGE_DELAY,
        }
    }

    async fn read_page(resp: reqwest::Response) -> Result<Page, SiteError> {
        let status = resp.status();
        if !status.is_success() && !status.is_redirection() {
            return Err(SiteError::RequestFailed(anyhow::anyhow!(
                "page request failed with status {status}"
            )));
        }

        let cookies = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|raw| cookie::Cookie::parse(raw.to_owned()).ok())
            .map(|c| SessionCookie {
                name: c.name().to_string(),
                value: c.value().to_string(),
            })
            .collect();

        let body = resp
            .text()
            .await
            .context("Failed to read page body")
            .map_err(SiteError::RequestFailed)?;

        Ok(Page { body, cookies })
    }
}

fn cookie_header(cookies: &[SessionCookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[async_trait]
impl PageDriver for HttpDriver {
    async fn navigate(&self, url: &str, cookies: &[SessionCookie]) -> Result<Page, SiteError> {
        tokio::time::sleep(self.delay).await;

        let mut request = self.http.get(url);
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookie_header(cookies));
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("Failed to GET {url}"))
            .map_err(SiteError::RequestFailed)?;
        Self::read_page(resp).await
    }

    async fn submit_form(
        &self,
        url: &str,
        fields: &[(&str, String)],
        cookies: &[SessionCookie],
    ) -> Result<Page, SiteError> {
        tokio::time::sleep(self.delay).await;

        let mut request = self.http.post(url).form(fields);
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookie_header(cookies));
        }

        let resp = request
            .send()
            .await
            .with_context(|| format!("Failed to POST {url}"))
            .map_err(SiteError::RequestFailed)?;
        Self::read_page(resp).await
    }

    async fn close(&self) {
        // Nothing held beyond the connection pool; the seam exists so
        // drivers with real teardown release it on every cycle exit path.
        trace!("http driver closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header_joins_pairs() {
        let cookies = vec![
            SessionCookie {
                name: "sid".into(),
                value: "abc".into(),
            },
            SessionCookie {
                name: "tok".into(),
                value: "xyz".into(),
            },
        ];
        assert_eq!(cookie_header(&cookies), "sid=abc; tok=xyz");
    }

    #[test]
    fn test_cookie_header_empty() {
        assert_eq!(cookie_header(&[]), "");
    }
}
