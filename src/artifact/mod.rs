//! Source artifacts: selection on disk and metadata extraction.
//!
//! An artifact is a raw FITS detector image. For each submission the pipeline needs:
//!
//! - pixel extents (`NAXIS1`, `NAXIS2`)
//! - an ingestion timestamp, always *now*: the load generator models a live detector
//!   feed, not a replay of the file's own acquisition time
//! - exposure duration (`EXPTIME`, seconds, default 0)
//! - frame-cycle duration (`FRMTIME`, milliseconds, default 1000), used to pace the
//!   next submission
//!
//! Durations are normalized to whole microseconds.

pub mod fits;
pub mod selection;

pub use selection::{is_source_artifact, select, ARTIFACT_EXTENSION, RAW_MARKER};

use crate::agent::{Frame, FrameSubmission, TimeValue};
use crate::error::{AppResult, LoadTestError};
use bytes::Bytes;
use fits::FitsHeader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Frame-cycle duration assumed when `FRMTIME` is absent.
pub const DEFAULT_FRAME_CYCLE: Duration = Duration::from_millis(1000);

/// Metadata derived from one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub width: u32,
    pub height: u32,
    /// Wall-clock instant of extraction
    pub timestamp: TimeValue,
    pub exposure: TimeValue,
    pub frame_cycle: Duration,
}

/// A loaded artifact: metadata plus its frame payload.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub metadata: ArtifactMetadata,
    pub frame: Frame,
}

impl Artifact {
    /// Decode an artifact from its file contents.
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Bytes) -> AppResult<Self> {
        let path = path.into();
        let unreadable = |reason: String| LoadTestError::UnreadableArtifact {
            path: path.clone(),
            reason,
        };

        let header = FitsHeader::parse(&bytes).map_err(|e| unreadable(e.to_string()))?;
        let axes = header.axes().map_err(|e| unreadable(e.to_string()))?;
        if axes.len() < 2 {
            return Err(unreadable(format!(
                "expected a 2-D image, header declares NAXIS = {}",
                axes.len()
            )));
        }
        let width = u32::try_from(axes[0]).map_err(|_| unreadable("NAXIS1 out of range".into()))?;
        let height = u32::try_from(axes[1]).map_err(|_| unreadable("NAXIS2 out of range".into()))?;

        let exposure_secs = header.real("EXPTIME").unwrap_or(0.0);
        let frame_cycle_ms = header
            .real("FRMTIME")
            .unwrap_or(DEFAULT_FRAME_CYCLE.as_millis() as f64);
        let exposure_micros = exposure_secs * 1e6;
        if !exposure_micros.is_finite()
            || exposure_secs < 0.0
            || exposure_micros >= i64::MAX as f64
        {
            return Err(unreadable(format!(
                "EXPTIME = {exposure_secs} is not a valid exposure"
            )));
        }
        let frame_cycle = (frame_cycle_ms >= 0.0)
            .then(|| Duration::try_from_secs_f64(frame_cycle_ms / 1e3).ok())
            .flatten()
            .ok_or_else(|| {
                unreadable(format!(
                    "FRMTIME = {frame_cycle_ms} is not a valid frame time"
                ))
            })?;

        let data_len = header.data_len().map_err(|e| unreadable(e.to_string()))?;
        let offset = header.data_offset();
        let available = bytes.len().saturating_sub(offset);
        if available < data_len {
            return Err(unreadable(
                fits::FitsError::ShortDataUnit {
                    expected: data_len,
                    available,
                }
                .to_string(),
            ));
        }
        let bitpix = header.require_integer("BITPIX").map_err(|e| unreadable(e.to_string()))?;

        Ok(Self {
            metadata: ArtifactMetadata {
                width,
                height,
                timestamp: TimeValue::now(),
                exposure: TimeValue::from_micros(exposure_micros as i64),
                frame_cycle,
            },
            frame: Frame {
                width,
                height,
                bitpix: bitpix as i32,
                data: bytes.slice(offset..offset + data_len),
            },
            path,
        })
    }

    /// Build the single-window `receiveFrame` message for this artifact.
    pub fn into_submission(self, source_id: &str) -> FrameSubmission {
        FrameSubmission {
            current_window: 1,
            total_windows: 1,
            top_left: (0, 0),
            bottom_right: (self.metadata.width, self.metadata.height),
            timestamp: self.metadata.timestamp,
            exposure: self.metadata.exposure,
            source_id: source_id.to_string(),
            frame: self.frame,
        }
    }
}

/// Read and decode an artifact.
pub async fn load(path: &Path) -> AppResult<Artifact> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LoadTestError::UnreadableArtifact {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Artifact::from_bytes(path, Bytes::from(bytes))
}

/// Derive the metadata record of one artifact.
///
/// Re-running this on an unmodified file yields the same extents, exposure and frame
/// cycle; only the timestamp moves.
pub async fn extract(path: &Path) -> AppResult<ArtifactMetadata> {
    Ok(load(path).await?.metadata)
}
