//! Data Factory Agent capability
//!
//! The agent is a remote, stateful actor that ingests detector frames. The load
//! generator never talks to it directly: it only holds a [`DataFactoryAgent`]
//! capability obtained from a [`NameService`](directory::NameService) through the
//! session establisher.
//!
//! # Contract
//!
//! - Every method is a blocking request/response call (async here, but never
//!   fire-and-forget).
//! - No client-side timeout is applied except for the liveness probe during session
//!   establishment. The agent's own per-frame timeout governs everything else.
//! - Errors are reported as `anyhow::Error`; the core attaches field, artifact and
//!   petition context.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn arm(agent: &dyn DataFactoryAgent) -> Result<()> {
//!     agent.configure(&ConfigField::NumberOfFramesToCollect(4)).await?;
//!     for position in Mechanism::demonstration_positions() {
//!         agent.set_mechanism_position(&position).await?;
//!     }
//!     agent.collect_frames().await
//! }
//! ```

pub mod directory;
pub mod mock;

use crate::config::{ObservationClass, ObservationType};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// Microsecond-resolution time value, as carried on the wire.
///
/// Used both for instants (microseconds since the Unix epoch) and for durations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeValue(i64);

impl TimeValue {
    /// Build from a raw microsecond count.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Build from a duration, saturating at `i64::MAX` microseconds.
    pub fn from_duration(duration: Duration) -> Self {
        Self(i64::try_from(duration.as_micros()).unwrap_or(i64::MAX))
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_micros())
    }

    /// Raw microsecond count.
    pub const fn as_micros(self) -> i64 {
        self.0
    }
}

/// One configurable field of the agent, with the value to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigField {
    PrincipalInvestigatorName(String),
    ObserverName(String),
    EsoProgramId(String),
    ProgramId(String),
    ObservationBlockId(String),
    InstrumentMode(String),
    ObservationClass(ObservationClass),
    ObservationType(ObservationType),
    ImageTitle(String),
    ObservationComment(String),
    ObjectName(String),
    ObservationMode(String),
    NumberOfFramesToCollect(u32),
    TimeoutByFrame(TimeValue),
}

impl ConfigField {
    /// Field name as exposed by the agent's configuration protocol.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PrincipalInvestigatorName(_) => "principal_investigator_name",
            Self::ObserverName(_) => "observer_name",
            Self::EsoProgramId(_) => "eso_program_id",
            Self::ProgramId(_) => "program_id",
            Self::ObservationBlockId(_) => "observation_block_id",
            Self::InstrumentMode(_) => "instrument_mode",
            Self::ObservationClass(_) => "observation_class",
            Self::ObservationType(_) => "observation_type",
            Self::ImageTitle(_) => "image_title",
            Self::ObservationComment(_) => "observation_comment",
            Self::ObjectName(_) => "object_name",
            Self::ObservationMode(_) => "observation_mode",
            Self::NumberOfFramesToCollect(_) => "number_of_frames_to_collect",
            Self::TimeoutByFrame(_) => "timeout_by_frame",
        }
    }
}

/// Instrument mechanisms driven before every collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    Cover,
    HalfWavePlate,
    QuarterWavePlate,
    Mxs,
    Wollaston,
    Decker,
    Filter,
    Dispersion,
    Focus,
    Stage,
}

impl Mechanism {
    /// All mechanisms in protocol enumeration order.
    pub const ALL: [Mechanism; 10] = [
        Self::Cover,
        Self::HalfWavePlate,
        Self::QuarterWavePlate,
        Self::Mxs,
        Self::Wollaston,
        Self::Decker,
        Self::Filter,
        Self::Dispersion,
        Self::Focus,
        Self::Stage,
    ];

    /// Protocol identifier of the mechanism.
    pub fn id(self) -> &'static str {
        match self {
            Self::Cover => "COVER",
            Self::HalfWavePlate => "HWPLATE",
            Self::QuarterWavePlate => "QWPLATE",
            Self::Mxs => "MXS",
            Self::Wollaston => "WOLLASTON",
            Self::Decker => "DECKER",
            Self::Filter => "FILTER",
            Self::Dispersion => "DISPERSION",
            Self::Focus => "FOCUS",
            Self::Stage => "STAGE",
        }
    }

    /// Fixed position label used by load-test petitions.
    pub fn demonstration_label(self) -> &'static str {
        match self {
            Self::Cover => "C",
            Self::HalfWavePlate => "HWP",
            Self::QuarterWavePlate => "QWP",
            Self::Mxs => "MXS",
            Self::Wollaston => "W",
            Self::Decker => "D",
            Self::Filter => "F",
            Self::Dispersion => "DSP",
            Self::Focus => "FCS",
            Self::Stage => "SGE",
        }
    }

    /// Fresh demonstration positions for every mechanism, in enumeration order.
    pub fn demonstration_positions() -> Vec<MechanismPosition> {
        Self::ALL
            .into_iter()
            .map(|mechanism| MechanismPosition::new(mechanism, mechanism.demonstration_label()))
            .collect()
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Target position for one mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MechanismPosition {
    pub mechanism: Mechanism,
    pub position: String,
}

impl MechanismPosition {
    pub fn new(mechanism: Mechanism, position: impl Into<String>) -> Self {
        Self {
            mechanism,
            position: position.into(),
        }
    }
}

/// Raw detector frame payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// FITS BITPIX of the samples (8, 16, 32, 64, -32, -64)
    pub bitpix: i32,
    /// Big-endian sample bytes, row-major
    pub data: Bytes,
}

/// Pixel coordinate (x, y).
pub type PixelCoord = (u32, u32);

/// One `receiveFrame` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSubmission {
    pub frame: Frame,
    /// 1-based window index
    pub current_window: u32,
    pub total_windows: u32,
    pub top_left: PixelCoord,
    pub bottom_right: PixelCoord,
    /// Ingestion instant
    pub timestamp: TimeValue,
    pub exposure: TimeValue,
    pub source_id: String,
}

/// Capability: remote Data Factory Agent.
///
/// All methods take `&self`; implementations use interior mutability for state.
#[async_trait]
pub trait DataFactoryAgent: Send + Sync {
    /// Apply one configuration field.
    async fn configure(&self, field: &ConfigField) -> Result<()>;

    /// Move one mechanism to a labelled position.
    async fn set_mechanism_position(&self, position: &MechanismPosition) -> Result<()>;

    /// Arm the agent to start collecting the configured number of frames.
    async fn collect_frames(&self) -> Result<()>;

    /// Hand one frame to the agent.
    async fn receive_frame(&self, submission: &FrameSubmission) -> Result<()>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;
}
