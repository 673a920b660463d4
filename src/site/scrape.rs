//! Per-course review scraping.
//!
//! Drives one authenticated browsing session to a course's review listing
//! and extracts raw (rating, text) pairs. "Not found" conditions (no
//! matching lecture, no reviews) return an empty list rather than an error;
//! only structural defects surface as [`SiteError`]s.

use crate::data::models::{Course, RawReview};
use crate::site::driver::PageDriver;
use crate::site::session::Session;
use crate::site::{resolve_url, SiteError};
use html_scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::info;

// Locators, versioned to the target's current page structure.
const LECTURE_SEARCH_PATH: &str = "/lecture/search";
const SEARCH_QUERY_PARAM: &str = "keyword";
const LECTURE_ENTRY_SELECTOR: &str = "div.lectures a.lecture";
const LECTURE_NAME_SELECTOR: &str = "div.name";
const LECTURE_HIGHLIGHT_SELECTOR: &str = "span.highlight";
const LECTURE_PROFESSOR_SELECTOR: &str = "div.professor";
const MORE_REVIEWS_SELECTOR: &str =
    "body > div > div > div.pane > div > section.review > div.articles > a";
const STAR_FILL_SELECTOR: &str = "body > div > div > div.pane > div > div.articles > div.article > div.article_header > div.title > div.rate > span.star > span.on";
const REVIEW_TEXT_SELECTOR: &str =
    "body > div > div > div.pane > div > div.articles > div.article > div.text";

/// Scrapes one course's reviews through a [`PageDriver`].
pub struct CourseScraper<'a> {
    driver: &'a dyn PageDriver,
    base_url: &'a str,
}

/// Outcome of locating a course's lecture entry in the search results.
#[derive(Debug, PartialEq, Eq)]
enum LectureMatch {
    /// Exactly one entry matched; carries its detail-page href.
    One(String),
    NotFound,
    /// More than one entry matched; the course can't be identified safely.
    Ambiguous(usize),
}

impl<'a> CourseScraper<'a> {
    pub fn new(driver: &'a dyn PageDriver, base_url: &'a str) -> Self {
        Self {
            driver,
            base_url: base_url.trim_end_matches('/'),
        }
    }

    /// Extract all reviews for `course`, or an empty list when the lecture
    /// is missing or has no reviews.
    pub async fn scrape(
        &self,
        session: &Session,
        course: &Course,
    ) -> Result<Vec<RawReview>, SiteError> {
        let search_url = format!(
            "{}{}?{}={}",
            self.base_url,
            LECTURE_SEARCH_PATH,
            SEARCH_QUERY_PARAM,
            urlencoding::encode(&course.name)
        );
        let results = self.driver.navigate(&search_url, session.cookies()).await?;

        let detail_href = match find_lecture(&results.body, &course.name, &course.professor) {
            LectureMatch::One(href) => href,
            LectureMatch::NotFound => {
                info!(
                    course = %course.name,
                    professor = %course.professor,
                    "no matching lecture found"
                );
                return Ok(Vec::new());
            }
            LectureMatch::Ambiguous(count) => {
                info!(
                    course = %course.name,
                    professor = %course.professor,
                    count,
                    "ambiguous lecture match, skipping"
                );
                return Ok(Vec::new());
            }
        };

        let detail_url = resolve_url(self.base_url, &detail_href)?;
        let detail = self.driver.navigate(&detail_url, session.cookies()).await?;

        let Some(more_href) = find_more_link(&detail.body) else {
            info!(course = %course.name, "lecture has no reviews");
            return Ok(Vec::new());
        };

        let listing_url = resolve_url(self.base_url, &more_href)?;
        let listing = self.driver.navigate(&listing_url, session.cookies()).await?;

        parse_reviews(&listing.body)
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Locate the lecture entry for (`name`, `professor`) in a search results
/// page. Zero and multiple matches are both reported, never guessed at.
fn find_lecture(body: &str, name: &str, professor: &str) -> LectureMatch {
    let html = Html::parse_document(body);
    let entry_sel = Selector::parse(LECTURE_ENTRY_SELECTOR).unwrap();

    let mut hrefs: Vec<String> = html
        .select(&entry_sel)
        .filter(|entry| lecture_matches(*entry, name, professor))
        .filter_map(|entry| entry.attr("href").map(str::to_string))
        .collect();

    match hrefs.len() {
        0 => LectureMatch::NotFound,
        1 => LectureMatch::One(hrefs.remove(0)),
        n => LectureMatch::Ambiguous(n),
    }
}

/// Whether a search-result entry is the exact lecture being looked for.
///
/// The professor field must contain the professor's name, and the name
/// field's highlighted span must equal the course name with nothing but
/// whitespace after it: "Calculus" must not match "Calculus II", where the
/// highlight wraps "Calculus" and " II" trails it as a text node.
fn lecture_matches(entry: ElementRef<'_>, name: &str, professor: &str) -> bool {
    let professor_sel = Selector::parse(LECTURE_PROFESSOR_SELECTOR).unwrap();
    let name_sel = Selector::parse(LECTURE_NAME_SELECTOR).unwrap();
    let highlight_sel = Selector::parse(LECTURE_HIGHLIGHT_SELECTOR).unwrap();

    let Some(professor_div) = entry.select(&professor_sel).next() else {
        return false;
    };
    if !element_text(professor_div).contains(professor) {
        return false;
    }

    let Some(name_div) = entry.select(&name_sel).next() else {
        return false;
    };
    let Some(highlight) = name_div.select(&highlight_sel).next() else {
        return false;
    };
    if element_text(highlight) != name {
        return false;
    }

    let trailing: String = highlight
        .next_siblings()
        .filter_map(|node| node.value().as_text())
        .map(|text| &*text.text)
        .collect();
    trailing.trim().is_empty()
}

/// Find the review-expansion anchor on a lecture detail page. Absent means
/// the lecture has no reviews.
fn find_more_link(body: &str) -> Option<String> {
    let html = Html::parse_document(body);
    let more_sel = Selector::parse(MORE_REVIEWS_SELECTOR).unwrap();
    html.select(&more_sel)
        .next()
        .and_then(|a| a.attr("href"))
        .map(str::to_string)
}

/// Extract (rating, text) pairs from the expanded review listing.
///
/// Star ratings and text bodies come from two parallel extractions paired
/// by position; a length mismatch means the page shifted under us and is a
/// defect, not something to truncate away.
fn parse_reviews(body: &str) -> Result<Vec<RawReview>, SiteError> {
    let html = Html::parse_document(body);
    let star_sel = Selector::parse(STAR_FILL_SELECTOR).unwrap();
    let text_sel = Selector::parse(REVIEW_TEXT_SELECTOR).unwrap();

    let mut ratings = Vec::new();
    for star in html.select(&star_sel) {
        let style = star.attr("style").unwrap_or_default();
        let percent = parse_fill_percent(style).ok_or_else(|| {
            SiteError::UnexpectedStructure(format!("unparseable star fill style {style:?}"))
        })?;
        ratings.push(rating_from_fill(percent));
    }

    let texts: Vec<String> = html.select(&text_sel).map(element_text).collect();

    if ratings.len() != texts.len() {
        return Err(SiteError::ExtractionMismatch {
            ratings: ratings.len(),
            texts: texts.len(),
        });
    }

    Ok(ratings
        .into_iter()
        .zip(texts)
        .map(|(rating, content)| RawReview { rating, content })
        .collect())
}

/// Parse the fill percentage out of a star indicator's inline style,
/// e.g. `"width: 80%"` → `80`.
fn parse_fill_percent(style: &str) -> Option<i32> {
    static FILL_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"width:\s*(\d+)\s*%").unwrap());

    FILL_RE
        .captures(style)
        .and_then(|caps| caps[1].parse().ok())
}

/// Convert a 0–100 fill percentage (steps of 20) to a 0–5 star rating.
fn rating_from_fill(percent: i32) -> i32 {
    percent / 20
}
