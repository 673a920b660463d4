//! Authenticated session management for the review site.
//!
//! A [`Session`] is an explicit cookie set acquired once per cycle and
//! threaded through every scrape call. The manager caches it in memory for
//! the remainder of the cycle; sessions are never persisted across cycles.

use crate::site::driver::{Page, PageDriver, SessionCookie};
use crate::site::{resolve_url, SiteError};
use html_scraper::{Html, Selector};
use tracing::{debug, info};

// Login form locators, versioned to the target's current page structure.
const LOGIN_PATH: &str = "/login";
const LOGIN_FORM_SELECTOR: &str = "body > div:nth-child(2) > div > form";
const LOGIN_ID_SELECTOR: &str = "div.input > input[type=text]:nth-child(1)";
const LOGIN_PASSWORD_SELECTOR: &str = "div.input > input[type=password]:nth-child(2)";
const LOGIN_SUBMIT_SELECTOR: &str = "input[type=submit]";

/// Authenticated state against the scrape target, reused across courses
/// within one cycle.
#[derive(Debug, Clone, Default)]
pub struct Session {
    cookies: Vec<SessionCookie>,
}

impl Session {
    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }
}

/// The login form's action and field names, extracted from the login page.
#[derive(Debug, PartialEq, Eq)]
struct LoginForm {
    action: Option<String>,
    id_field: String,
    password_field: String,
}

/// Owns the per-cycle session cache and the login sequence.
pub struct SessionManager {
    base_url: String,
    user_id: String,
    password: String,
    cached: Option<Session>,
}

impl SessionManager {
    pub fn new(base_url: &str, user_id: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            password: password.to_string(),
            cached: None,
        }
    }

    /// Return the cached session, or perform the login sequence and cache
    /// the resulting cookie set.
    ///
    /// A missing login form or a submission that yields no cookies is
    /// [`SiteError::LoginFailed`], which aborts the entire cycle.
    pub async fn ensure_session(&mut self, driver: &dyn PageDriver) -> Result<Session, SiteError> {
        if let Some(session) = &self.cached {
            debug!("reusing cached site session");
            return Ok(session.clone());
        }

        let login_url = format!("{}{}", self.base_url, LOGIN_PATH);
        let login_page = driver.navigate(&login_url, &[]).await?;

        let form = parse_login_form(&login_page.body).map_err(SiteError::LoginFailed)?;
        let submit_url = match &form.action {
            Some(action) => resolve_url(&self.base_url, action)?,
            None => login_url,
        };

        let fields = [
            (form.id_field.as_str(), self.user_id.clone()),
            (form.password_field.as_str(), self.password.clone()),
        ];
        let response = driver
            .submit_form(&submit_url, &fields, &login_page.cookies)
            .await?;

        if response.cookies.is_empty() {
            return Err(SiteError::LoginFailed(
                "login submission yielded no session cookies".to_string(),
            ));
        }

        let session = Session {
            cookies: merge_cookies(login_page, response),
        };
        info!(cookies = session.cookies.len(), "site session established");
        self.cached = Some(session.clone());
        Ok(session)
    }
}

/// Combine pre-login and post-login cookies, later responses winning on name
/// collisions.
fn merge_cookies(login_page: Page, response: Page) -> Vec<SessionCookie> {
    let mut cookies = login_page.cookies;
    for cookie in response.cookies {
        if let Some(existing) = cookies.iter_mut().find(|c| c.name == cookie.name) {
            existing.value = cookie.value;
        } else {
            cookies.push(cookie);
        }
    }
    cookies
}

/// Locate the login form and its credential field names.
fn parse_login_form(body: &str) -> Result<LoginForm, String> {
    let html = Html::parse_document(body);
    let form_sel = Selector::parse(LOGIN_FORM_SELECTOR).unwrap();
    let id_sel = Selector::parse(LOGIN_ID_SELECTOR).unwrap();
    let password_sel = Selector::parse(LOGIN_PASSWORD_SELECTOR).unwrap();
    let submit_sel = Selector::parse(LOGIN_SUBMIT_SELECTOR).unwrap();

    let form = html
        .select(&form_sel)
        .next()
        .ok_or_else(|| "login form not present on page".to_string())?;

    let id_input = form
        .select(&id_sel)
        .next()
        .ok_or_else(|| "login id input not found".to_string())?;
    let password_input = form
        .select(&password_sel)
        .next()
        .ok_or_else(|| "login password input not found".to_string())?;
    if form.select(&submit_sel).next().is_none() {
        return Err("login submit control not found".to_string());
    }

    let id_field = id_input
        .attr("name")
        .ok_or_else(|| "login id input has no name attribute".to_string())?;
    let password_field = password_input
        .attr("name")
        .ok_or_else(|| "login password input has no name attribute".to_string())?;

    Ok(LoginForm {
        action: form.attr("action").map(|a| a.to_string()),
        id_field: id_field.to_string(),
        password_field: password_field.to_string(),
    })
}
