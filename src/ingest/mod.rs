//! Ingestion cycle orchestration.
//!
//! One cycle walks every known course strictly sequentially, sharing one
//! authenticated session. Cycles are non-reentrant: a trigger that arrives
//! while one is running is rejected, never run concurrently.

mod course;

pub use course::{ingest_course, CourseError, CourseOutcome, Stage};

use crate::config::Config;
use crate::data::ReviewStore;
use crate::nlp::Nlp;
use crate::site::{HttpDriver, PageDriver, SessionManager};
use crate::utils::fmt_duration;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Notify};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// How long to wait before re-checking when a cycle is still running at its
/// scheduled start.
const BUSY_RECHECK_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for an in-flight cycle to stop at a course
/// boundary before abandoning it.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings the ingestion service needs from [`Config`].
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub site_base_url: String,
    pub site_id: String,
    pub site_password: String,
    pub interval: Duration,
    pub sentiment_max_chars: usize,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            site_base_url: config.site_base_url.clone(),
            site_id: config.site_id.clone(),
            site_password: config.site_password.clone(),
            interval: Duration::from_secs(config.ingest_interval_hours * 3600),
            sentiment_max_chars: config.sentiment_max_chars,
        }
    }
}

/// Counts for one finished cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Drives periodic ingestion cycles.
#[derive(Clone)]
pub struct IngestService {
    store: Arc<dyn ReviewStore>,
    nlp: Arc<dyn Nlp>,
    settings: Arc<IngestSettings>,
    refresh_notify: Arc<Notify>,
    in_flight: Arc<AtomicBool>,
}

impl IngestService {
    pub fn new(store: Arc<dyn ReviewStore>, nlp: Arc<dyn Nlp>, settings: IngestSettings) -> Self {
        Self {
            store,
            nlp,
            settings: Arc::new(settings),
            refresh_notify: Arc::new(Notify::new()),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for triggering an immediate cycle (admin/manual refresh).
    pub fn refresh_notify(&self) -> Arc<Notify> {
        self.refresh_notify.clone()
    }

    /// Main loop: run a cycle every `interval`, or immediately on notify,
    /// until a shutdown signal arrives.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            interval = fmt_duration(self.settings.interval),
            "Ingestion service started"
        );

        let mut next_run = time::Instant::now();
        let mut current_work: Option<(tokio::task::JoinHandle<()>, CancellationToken)> = None;

        loop {
            tokio::select! {
                _ = self.refresh_notify.notified() => {
                    info!("Ingestion cycle triggered manually via notify");
                    next_run = time::Instant::now();
                }
                _ = time::sleep_until(next_run) => {
                    if let Some((handle, _)) = &current_work
                        && !handle.is_finished()
                    {
                        trace!("Previous cycle still running, skipping");
                        next_run = time::Instant::now() + BUSY_RECHECK_INTERVAL;
                        continue;
                    }

                    let cancel_token = CancellationToken::new();
                    let handle = tokio::spawn({
                        let service = self.clone();
                        let token = cancel_token.clone();
                        async move {
                            // Outcomes are logged inside run_cycle.
                            let _ = service.run_cycle(&token).await;
                        }
                    });

                    current_work = Some((handle, cancel_token));
                    next_run = time::Instant::now() + self.settings.interval;
                }
                _ = shutdown_rx.recv() => {
                    info!("Ingestion service received shutdown signal");

                    if let Some((handle, cancel_token)) = current_work.take() {
                        cancel_token.cancel();
                        if time::timeout(SHUTDOWN_DRAIN_TIMEOUT, handle).await.is_err() {
                            warn!(
                                timeout = fmt_duration(SHUTDOWN_DRAIN_TIMEOUT),
                                "Cycle did not stop at a course boundary in time, abandoning"
                            );
                        }
                    }

                    info!("Ingestion service exiting gracefully");
                    break;
                }
            }
        }
    }

    /// Run one cycle against the real site.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport> {
        let driver = HttpDriver::new();
        self.run_cycle_with(&driver, cancel).await
    }

    /// Run one cycle through the given driver.
    ///
    /// Non-reentrant: if a cycle is already in flight the trigger is
    /// rejected. The driver is released on every exit path, fatal
    /// session-failure aborts included.
    pub async fn run_cycle_with(
        &self,
        driver: &dyn PageDriver,
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let Some(_guard) = CycleGuard::acquire(&self.in_flight) else {
            anyhow::bail!("ingestion cycle already in flight, trigger rejected");
        };

        let started = Instant::now();
        let result = self.cycle_body(driver, cancel).await;
        driver.close().await;

        match &result {
            Ok(report) => info!(
                completed = report.completed,
                skipped = report.skipped,
                failed = report.failed,
                duration = fmt_duration(started.elapsed()),
                "Ingestion cycle finished"
            ),
            Err(e) => error!(
                duration = fmt_duration(started.elapsed()),
                error = ?e,
                "Ingestion cycle aborted"
            ),
        }

        result
    }

    async fn cycle_body(
        &self,
        driver: &dyn PageDriver,
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let courses = self
            .store
            .list_courses()
            .await
            .context("Failed to list courses")?;

        let mut report = CycleReport::default();
        if courses.is_empty() {
            debug!("No courses to ingest");
            return Ok(report);
        }
        info!(count = courses.len(), "Starting ingestion cycle");

        let mut sessions = SessionManager::new(
            &self.settings.site_base_url,
            &self.settings.site_id,
            &self.settings.site_password,
        );
        // Login failure is fatal for the cycle: no per-course retries.
        let session = sessions
            .ensure_session(driver)
            .await
            .context("Failed to establish site session")?;

        for (index, course) in courses.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    remaining = courses.len() - index,
                    "Shutdown requested, stopping cycle at course boundary"
                );
                break;
            }

            match ingest_course(
                driver,
                &session,
                self.nlp.as_ref(),
                self.store.as_ref(),
                &self.settings.site_base_url,
                course,
                self.settings.sentiment_max_chars,
            )
            .await
            {
                Ok(CourseOutcome::Completed { reviews, chunks }) => {
                    report.completed += 1;
                    info!(course = %course.name, reviews, chunks, "Course ingested");
                }
                Ok(CourseOutcome::SkippedEmpty) => {
                    report.skipped += 1;
                    debug!(course = %course.name, "Course skipped, no reviews extracted");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        course = %course.name,
                        stage = %e.stage,
                        error = ?e.source,
                        "Course ingestion failed, continuing with next course"
                    );
                }
            }
        }

        Ok(report)
    }
}

/// RAII guard enforcing cycle non-reentrancy.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_guard_rejects_second_acquire() {
        let flag = AtomicBool::new(false);
        let first = CycleGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(CycleGuard::acquire(&flag).is_none());

        drop(first);
        assert!(CycleGuard::acquire(&flag).is_some());
    }
}
