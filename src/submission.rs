//! Submission pipeline.
//!
//! Feeds the selected artifacts to the agent strictly one at a time, in the order
//! given. After each accepted frame the pipeline sleeps for that artifact's own
//! frame-cycle duration, reproducing the cadence of the source detector instead of
//! saturating the agent.
//!
//! A failure on artifact `k` aborts the rest of the petition with
//! [`LoadTestError::SubmissionAborted`]. Artifacts before `k` stay submitted.
//!
//! The optional cancellation signal is only looked at before an artifact is loaded.
//! Calls in flight and pacing sleeps always run to completion.

use crate::artifact;
use crate::error::{AppResult, LoadTestError};
use crate::session::SessionHandle;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info};

/// Streams artifacts to the agent.
#[derive(Debug, Clone)]
pub struct SubmissionPipeline {
    source_id: String,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl SubmissionPipeline {
    /// Pipeline stamping frames with `source_id`.
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            cancel_rx: None,
        }
    }

    /// Observe a cancellation flag between submissions.
    pub fn with_cancellation(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Source identifier stamped on every frame.
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Submit `paths` in order, pacing by frame cycle. Returns the number submitted.
    ///
    /// An empty slice issues no calls and succeeds.
    pub async fn submit(&self, session: &SessionHandle, paths: &[PathBuf]) -> AppResult<usize> {
        for (index, path) in paths.iter().enumerate() {
            if self.is_cancelled() {
                debug!(index, "cancellation requested, stopping submissions");
                return Err(LoadTestError::Cancelled);
            }

            let abort = |source: LoadTestError| LoadTestError::SubmissionAborted {
                index,
                path: path.clone(),
                source: Box::new(source),
            };

            let artifact = artifact::load(path).await.map_err(abort)?;
            let frame_cycle = artifact.metadata.frame_cycle;
            let submission = artifact.into_submission(&self.source_id);

            info!(artifact = %path.display(), index, "sending image to agent");
            session
                .agent()
                .receive_frame(&submission)
                .await
                .map_err(|e| {
                    abort(LoadTestError::FrameRejected {
                        reason: format!("{e:#}"),
                    })
                })?;

            debug!(sleep = ?frame_cycle, "pacing by frame cycle");
            sleep(frame_cycle).await;
        }

        Ok(paths.len())
    }
}
