//! Document-level orchestration.
//!
//! # Scheduling
//! Every page is an independent unit of work. Pages are handed to a bounded pool of
//! blocking workers (`worker_concurrency` permits); each worker drives one page through
//! `run_page`. A page that fails, panics or outlives `page_timeout_ms` is returned exactly
//! as extracted and flagged in the report; the other pages are unaffected.
//!
//! # Job outcome
//! The job itself only fails when every page fails, or when strict mode is on and the
//! report carries unresolved conflicts.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::collaborators::{FormatWriter, TranslationProvider};
use crate::config::EngineConfig;
use crate::errors::{CollaboratorError, ConfigError, JobError, ReconstructionError};
use crate::layout::config::FittingConfig;
use crate::models::{DocumentStructure, PageStructure, TextRegion, TranslationMap};
use crate::reconstruction::pipeline::{run_page, FinalizedPage, PageFailure, PipelineStage};
use crate::reconstruction::report::{LayoutReport, PageReport};

/// A reconstructed document and the report describing how it was laid out.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub document: DocumentStructure,
    pub report: LayoutReport,
}

#[derive(Debug, Clone)]
pub struct ReconstructionEngine {
    config: EngineConfig,
}

/// A page handed to the worker pool, with what is needed to fall back if it fails.
struct PageJob {
    original: PageStructure,
    deadline: Instant,
    handle: JoinHandle<Result<FinalizedPage, PageFailure>>,
}

enum Slot {
    Running(PageJob),
    Refused(PageStructure, PageFailure),
}

impl ReconstructionEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Entry points
    // ────────────────────────────────────────────────────────────────────────────

    /// Fits `translations` into `document` and returns the finalized document.
    ///
    /// Page order is preserved. Regions without a translation pass through unchanged.
    pub async fn reconstruct(
        &self,
        document: DocumentStructure,
        translations: TranslationMap,
    ) -> Result<Reconstruction, JobError> {
        let started = Instant::now();
        let DocumentStructure {
            format,
            pages,
            metadata,
        } = document;
        let page_count = pages.len();

        info!(
            pages = page_count,
            translations = translations.len(),
            workers = self.config.worker_concurrency,
            "reconstruction started"
        );

        let translations = Arc::new(translations);
        let fitting = Arc::new(self.config.fitting.clone());
        let semaphore = Arc::new(Semaphore::new(self.config.worker_concurrency));
        let timeout = Duration::from_millis(self.config.page_timeout_ms);

        let mut slots = Vec::with_capacity(page_count);
        for page in pages {
            // Waits for a free worker; the permit moves into the blocking task.
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let failure = PageFailure::new(
                        page.page_number,
                        PipelineStage::Scheduling,
                        ReconstructionError::WorkerUnavailable(e.to_string()),
                    );
                    slots.push(Slot::Refused(page, failure));
                    continue;
                }
            };

            let deadline = Instant::now() + timeout;
            let original = page.clone();
            let translations = Arc::clone(&translations);
            let fitting = Arc::clone(&fitting);
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                run_page(page, &translations, &fitting, Some(deadline.into_std()))
            });
            slots.push(Slot::Running(PageJob {
                original,
                deadline,
                handle,
            }));
        }

        let mut outcomes: Vec<(PageStructure, PageReport)> = Vec::with_capacity(page_count);
        for slot in slots {
            let outcome = match slot {
                Slot::Running(job) => collect_page(job, self.config.page_timeout_ms).await,
                Slot::Refused(page, failure) => fallback(page, &failure),
            };
            outcomes.push(outcome);
        }

        let (pages, page_reports): (Vec<_>, Vec<_>) = outcomes.into_iter().unzip();
        let report = LayoutReport::new(page_reports);

        info!(
            job_id = %report.job_id,
            pages = page_count,
            failed_pages = report.failed_pages(),
            unresolved = report.unresolved_conflicts(),
            preservation = report.score.preservation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "reconstruction finished"
        );

        if page_count > 0 && report.failed_pages() == page_count {
            return Err(JobError::AllPagesFailed { pages: page_count });
        }
        if self.config.strict && report.unresolved_conflicts() > 0 {
            warn!(
                job_id = %report.job_id,
                unresolved = report.unresolved_conflicts(),
                "strict mode rejected reconstruction"
            );
            return Err(JobError::StrictModeViolation {
                unresolved: report.unresolved_conflicts(),
                report: Box::new(report),
            });
        }

        Ok(Reconstruction {
            document: DocumentStructure {
                format,
                pages,
                metadata,
            },
            report,
        })
    }

    /// Requests translations for every text region, then reconstructs.
    pub async fn translate_and_reconstruct(
        &self,
        document: DocumentStructure,
        provider: &dyn TranslationProvider,
        target_language: &str,
    ) -> Result<Reconstruction, JobError> {
        let regions: Vec<TextRegion> = document.text_regions().cloned().collect();
        let translations = provider.translate(&regions, target_language).await?;
        info!(
            requested = regions.len(),
            received = translations.len(),
            target_language,
            "translations received"
        );
        self.reconstruct(document, translations).await
    }

    /// Serializes each finalized page with `writer`, in page order.
    pub fn render(
        &self,
        document: &DocumentStructure,
        writer: &dyn FormatWriter,
    ) -> Result<Vec<Bytes>, CollaboratorError> {
        if writer.format() != document.format {
            return Err(CollaboratorError::Write(format!(
                "writer produces {:?}, document is {:?}",
                writer.format(),
                document.format
            )));
        }
        document
            .pages
            .iter()
            .map(|page| writer.write_page(page))
            .collect()
    }

    /// The fitting parameters pages are reconstructed with.
    pub fn fitting(&self) -> &FittingConfig {
        &self.config.fitting
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Worker results
// ────────────────────────────────────────────────────────────────────────────

async fn collect_page(job: PageJob, timeout_ms: u64) -> (PageStructure, PageReport) {
    let PageJob {
        original,
        deadline,
        handle,
    } = job;
    let page_number = original.page_number;

    let failure = match tokio::time::timeout_at(deadline, handle).await {
        Ok(Ok(Ok(finalized))) => {
            let report = PageReport::finalized(&finalized);
            return (finalized.page, report);
        }
        Ok(Ok(Err(failure))) => failure,
        Ok(Err(join_error)) => PageFailure::new(
            page_number,
            PipelineStage::Scheduling,
            ReconstructionError::WorkerPanicked(join_error.to_string()),
        ),
        // The worker notices the same deadline at its next resolver pass and exits.
        Err(_) => PageFailure::new(
            page_number,
            PipelineStage::Scheduling,
            ReconstructionError::Timeout { millis: timeout_ms },
        ),
    };
    fallback(original, &failure)
}

/// A failed page goes out as extracted.
fn fallback(original: PageStructure, failure: &PageFailure) -> (PageStructure, PageReport) {
    error!(
        page = failure.page_number,
        stage = ?failure.stage,
        error = %failure.error,
        "page reconstruction failed, keeping original layout"
    );
    (original, PageReport::failed(failure))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
