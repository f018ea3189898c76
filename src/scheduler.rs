//! Petition scheduler.
//!
//! Drives the outer load-generation loop. One petition is one
//! compose → select → submit cycle; petitions run strictly one after another with
//! `petition_period` of idle time between consecutive petitions. No sleep follows the
//! last petition.
//!
//! Failures are fail-fast: an error in petition `i` ends the run and is returned as
//! [`LoadTestError::PetitionFailed`] carrying `i`.
//!
//! Cancellation (optional) is honored only at petition boundaries and between artifact
//! submissions, never in the middle of a remote call, so the agent is never left
//! half-configured by us.
//!
//! # Example
//!
//! ```rust,ignore
//! let scheduler = PetitionScheduler::new("MIRADAS").with_cancellation(cancel_rx);
//! let report = scheduler.run(&session, &config).await?;
//! println!("{} frames in {:?}", report.frames_submitted, report.elapsed);
//! ```

use crate::artifact;
use crate::command;
use crate::config::LoadTestConfig;
use crate::error::{AppResult, LoadTestError};
use crate::session::SessionHandle;
use crate::submission::SubmissionPipeline;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{info, info_span, Instrument};

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Petitions that went through compose, select and submit
    pub petitions_completed: u32,
    /// Frames accepted by the agent over the whole run
    pub frames_submitted: u64,
    /// Wall time from first compose to last submission
    pub elapsed: Duration,
}

/// Repeats petitions against one session.
#[derive(Debug, Clone)]
pub struct PetitionScheduler {
    pipeline: SubmissionPipeline,
}

impl PetitionScheduler {
    /// Scheduler whose frames carry `source_id`.
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            pipeline: SubmissionPipeline::new(source_id),
        }
    }

    /// Stop at the next petition or artifact boundary once the flag turns `true`.
    pub fn with_cancellation(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.pipeline = self.pipeline.with_cancellation(cancel_rx);
        self
    }

    /// Run `config.number_petitions()` petitions.
    pub async fn run(
        &self,
        session: &SessionHandle,
        config: &LoadTestConfig,
    ) -> AppResult<RunReport> {
        let start = Instant::now();
        let petitions = config.number_petitions();
        let mut frames_submitted = 0u64;

        info!(
            "Generating {} petitions with {} images",
            petitions,
            config.number_images()
        );

        for index in 0..petitions {
            if self.pipeline.is_cancelled() {
                info!(petition = index, "run cancelled at petition boundary");
                return Err(LoadTestError::Cancelled);
            }

            let submitted = self
                .petition(session, config)
                .instrument(info_span!("petition", index))
                .await
                .map_err(|source| LoadTestError::PetitionFailed {
                    index,
                    source: Box::new(source),
                })?;
            frames_submitted += submitted as u64;

            if index + 1 < petitions && !config.petition_period().is_zero() {
                info!(period = ?config.petition_period(), "waiting for next petition");
                sleep(config.petition_period()).await;
            }
        }

        let report = RunReport {
            petitions_completed: petitions,
            frames_submitted,
            elapsed: start.elapsed(),
        };
        info!(
            petitions = report.petitions_completed,
            frames = report.frames_submitted,
            elapsed = ?report.elapsed,
            "run complete"
        );
        Ok(report)
    }

    async fn petition(&self, session: &SessionHandle, config: &LoadTestConfig) -> AppResult<usize> {
        command::compose(session, config).await?;

        let count = usize::try_from(config.number_images()).unwrap_or(usize::MAX);
        let paths = artifact::select(config.image_path(), count).await?;
        if paths.len() < count {
            info!(
                requested = count,
                found = paths.len(),
                directory = %config.image_path().display(),
                "fewer source artifacts than requested"
            );
        }

        self.pipeline.submit(session, &paths).await
    }
}
