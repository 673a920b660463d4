//! Shared fixtures and mock collaborators for ingestion pipeline tests.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use evalsync::data::models::{AggregateResult, Course, RawReview};
use evalsync::data::ReviewStore;
use evalsync::nlp::{Nlp, NlpError, Sentiment};
use evalsync::site::{Page, PageDriver, SessionCookie, SiteError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const BASE_URL: &str = "https://site.test";

pub fn make_course(course_id: i32, name: &str, professor: &str) -> Course {
    Course {
        course_id,
        name: name.to_string(),
        professor: professor.to_string(),
    }
}

// --- page fixtures ---

pub fn login_page() -> String {
    r#"<html><body>
        <div class="header"></div>
        <div><div><form action="/user/login">
            <div class="input">
                <input type="text" name="id">
                <input type="password" name="password">
            </div>
            <input type="submit" value="로그인">
        </form></div></div>
    </body></html>"#
        .to_string()
}

pub fn search_page(entries: &[(&str, &str, &str)]) -> String {
    let entries: String = entries
        .iter()
        .map(|(href, name, professor)| {
            format!(
                r#"<a class="lecture" href="{href}">
                    <div class="name"><span class="highlight">{name}</span></div>
                    <div class="professor">{professor}</div>
                </a>"#
            )
        })
        .collect();
    format!(r#"<html><body><div class="lectures">{entries}</div></body></html>"#)
}

pub fn detail_page(more_href: &str) -> String {
    format!(
        r#"<html><body><div><div><div class="pane"><div>
            <section class="review"><div class="articles">
                <a href="{more_href}">더 보기</a>
            </div></section>
        </div></div></div></div></body></html>"#
    )
}

pub fn detail_page_without_reviews() -> String {
    r#"<html><body><div><div><div class="pane"><div>
        <section class="review"></section>
    </div></div></div></div></body></html>"#
        .to_string()
}

pub fn listing_page(reviews: &[(i32, &str)]) -> String {
    let articles: String = reviews
        .iter()
        .map(|(percent, text)| {
            format!(
                r#"<div class="article">
                    <div class="article_header"><div class="title"><div class="rate">
                        <span class="star"><span class="on" style="width: {percent}%"></span></span>
                    </div></div></div>
                    <div class="text">{text}</div>
                </div>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><div><div><div class="pane"><div>
            <div class="articles">{articles}</div>
        </div></div></div></div></body></html>"#
    )
}

pub fn search_url(course_name: &str) -> String {
    format!(
        "{BASE_URL}/lecture/search?keyword={}",
        urlencoding::encode(course_name)
    )
}

// --- mock driver ---

/// Serves canned pages by URL. Unknown URLs yield an empty page, which the
/// scraper treats as "not found". Form submissions answer with the
/// configured login cookies.
pub struct MockDriver {
    pages: Mutex<HashMap<String, String>>,
    login_cookies: Vec<SessionCookie>,
    pub closed: AtomicBool,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::from([(
                format!("{BASE_URL}/login"),
                login_page(),
            )])),
            login_cookies: vec![SessionCookie {
                name: "etsid".to_string(),
                value: "session-token".to_string(),
            }],
            closed: AtomicBool::new(false),
        }
    }

    /// A driver whose login submission yields no cookies.
    pub fn without_login_cookies() -> Self {
        let mut driver = Self::new();
        driver.login_cookies = Vec::new();
        driver
    }

    pub fn with_page(self, url: impl Into<String>, body: String) -> Self {
        self.pages.lock().unwrap().insert(url.into(), body);
        self
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str, _cookies: &[SessionCookie]) -> Result<Page, SiteError> {
        let body = self
            .pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string());
        Ok(Page {
            body,
            cookies: Vec::new(),
        })
    }

    async fn submit_form(
        &self,
        _url: &str,
        _fields: &[(&str, String)],
        _cookies: &[SessionCookie],
    ) -> Result<Page, SiteError> {
        Ok(Page {
            body: String::new(),
            cookies: self.login_cookies.clone(),
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Register the usual three pages (search, detail, listing) for one course.
pub fn register_course_pages(
    driver: MockDriver,
    course: &Course,
    reviews: &[(i32, &str)],
) -> MockDriver {
    let detail_href = format!("/lecture/view/{}", course.course_id);
    let listing_href = format!("{detail_href}/articles");
    driver
        .with_page(
            search_url(&course.name),
            search_page(&[(detail_href.as_str(), &course.name, &course.professor)]),
        )
        .with_page(
            format!("{BASE_URL}{detail_href}"),
            detail_page(&listing_href),
        )
        .with_page(format!("{BASE_URL}{listing_href}"), listing_page(reviews))
}

// --- mock NLP ---

/// Deterministic NLP stand-in. Summaries are the input's first characters
/// wrapped in brackets so material content and ordering stay assertable.
pub struct MockNlp {
    pub fail_summarize_containing: Option<String>,
    pub malformed_sentiment: bool,
    pub summarize_calls: Mutex<Vec<String>>,
    pub sentiment_calls: Mutex<Vec<String>>,
}

impl MockNlp {
    pub fn new() -> Self {
        Self {
            fail_summarize_containing: None,
            malformed_sentiment: false,
            summarize_calls: Mutex::new(Vec::new()),
            sentiment_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn summary_of(text: &str) -> String {
        let head: String = text.chars().take(12).collect();
        format!("[{head}]")
    }
}

#[async_trait]
impl Nlp for MockNlp {
    async fn summarize(&self, text: &str) -> Result<String, NlpError> {
        self.summarize_calls.lock().unwrap().push(text.to_string());
        if let Some(marker) = &self.fail_summarize_containing
            && text.contains(marker)
        {
            return Err(NlpError::BadStatus {
                status: 500,
                body: "summarizer exploded".to_string(),
            });
        }
        Ok(Self::summary_of(text))
    }

    async fn analyze_sentiment(&self, text: &str) -> Result<Sentiment, NlpError> {
        self.sentiment_calls.lock().unwrap().push(text.to_string());
        if self.malformed_sentiment {
            return Err(NlpError::MalformedResponse {
                path: "document".to_string(),
                message: "missing field `confidence`".to_string(),
            });
        }
        Ok(Sentiment {
            label: "positive".to_string(),
            confidence: 99.32,
        })
    }
}

// --- mock store ---

/// In-memory [`ReviewStore`] mirroring the production replace semantics.
#[derive(Default)]
pub struct MockStore {
    pub courses: Vec<Course>,
    pub reviews: Mutex<HashMap<i32, Vec<RawReview>>>,
    pub aggregates: Mutex<HashMap<i32, AggregateResult>>,
}

impl MockStore {
    pub fn with_courses(courses: Vec<Course>) -> Self {
        Self {
            courses,
            ..Self::default()
        }
    }

    pub fn reviews_for(&self, course_id: i32) -> Vec<RawReview> {
        self.reviews
            .lock()
            .unwrap()
            .get(&course_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn aggregate_for(&self, course_id: i32) -> Option<AggregateResult> {
        self.aggregates.lock().unwrap().get(&course_id).cloned()
    }
}

#[async_trait]
impl ReviewStore for MockStore {
    async fn list_courses(&self) -> Result<Vec<Course>> {
        Ok(self.courses.clone())
    }

    async fn replace_reviews(&self, course_id: i32, reviews: &[RawReview]) -> Result<()> {
        self.aggregates.lock().unwrap().remove(&course_id);
        self.reviews
            .lock()
            .unwrap()
            .insert(course_id, reviews.to_vec());
        Ok(())
    }

    async fn upsert_aggregate(&self, course_id: i32, aggregate: &AggregateResult) -> Result<()> {
        self.aggregates
            .lock()
            .unwrap()
            .insert(course_id, aggregate.clone());
        Ok(())
    }
}
