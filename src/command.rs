//! Command composition.
//!
//! Arms the agent for one collection cycle. The agent validates and applies fields
//! incrementally, so the order below is the agent's configuration protocol:
//!
//! 1. program/observer identity (fixed values)
//! 2. instrument mode, observation class, observation type
//! 3. descriptive fields: title, comment, object name (fixed values)
//! 4. observation mode, number of frames, per-frame timeout
//! 5. every mechanism, in enumeration order, to its demonstration position
//! 6. `collectFrames`
//!
//! Any failed call aborts composition on the spot with
//! [`LoadTestError::ConfigurationRejected`]. Nothing already applied is rolled back.

use crate::agent::{ConfigField, Mechanism, TimeValue};
use crate::config::LoadTestConfig;
use crate::error::{AppResult, LoadTestError};
use crate::session::SessionHandle;
use std::time::Duration;
use tracing::{debug, info};

/// Timeout the agent applies to each expected frame.
pub const PER_FRAME_TIMEOUT: Duration = Duration::from_secs(30);

pub const PRINCIPAL_INVESTIGATOR: &str = "Pepito";
pub const OBSERVER: &str = "Juanito";
pub const ESO_PROGRAM_ID: &str = "ESO1";
pub const PROGRAM_ID: &str = "P01";
pub const OBSERVATION_BLOCK_ID: &str = "OB01";
pub const IMAGE_TITLE: &str = "Load test";
pub const OBSERVATION_COMMENT: &str = "Comment";
pub const OBJECT_NAME: &str = "M3";

/// Field name reported when the final trigger is refused.
pub const TRIGGER_FIELD: &str = "collect_frames";

/// Configuration fields of one petition, in protocol order.
pub fn configuration_fields(config: &LoadTestConfig) -> Vec<ConfigField> {
    vec![
        ConfigField::PrincipalInvestigatorName(PRINCIPAL_INVESTIGATOR.to_string()),
        ConfigField::ObserverName(OBSERVER.to_string()),
        ConfigField::EsoProgramId(ESO_PROGRAM_ID.to_string()),
        ConfigField::ProgramId(PROGRAM_ID.to_string()),
        ConfigField::ObservationBlockId(OBSERVATION_BLOCK_ID.to_string()),
        ConfigField::InstrumentMode(config.instrument_mode().to_string()),
        ConfigField::ObservationClass(config.observation_class()),
        ConfigField::ObservationType(config.observation_type()),
        ConfigField::ImageTitle(IMAGE_TITLE.to_string()),
        ConfigField::ObservationComment(OBSERVATION_COMMENT.to_string()),
        ConfigField::ObjectName(OBJECT_NAME.to_string()),
        ConfigField::ObservationMode(config.observation_mode().to_string()),
        ConfigField::NumberOfFramesToCollect(config.number_images()),
        ConfigField::TimeoutByFrame(TimeValue::from_duration(PER_FRAME_TIMEOUT)),
    ]
}

/// Configure the agent for one petition and trigger collection.
pub async fn compose(session: &SessionHandle, config: &LoadTestConfig) -> AppResult<()> {
    let agent = session.agent();

    for field in configuration_fields(config) {
        debug!(field = field.name(), value = ?field, "configuring");
        agent
            .configure(&field)
            .await
            .map_err(|e| LoadTestError::ConfigurationRejected {
                field: field.name().to_string(),
                reason: format!("{e:#}"),
            })?;
    }

    for position in Mechanism::demonstration_positions() {
        debug!(
            mechanism = %position.mechanism,
            position = %position.position,
            "setting mechanism position"
        );
        agent
            .set_mechanism_position(&position)
            .await
            .map_err(|e| LoadTestError::ConfigurationRejected {
                field: format!("mechanism_position.{}", position.mechanism),
                reason: format!("{e:#}"),
            })?;
    }

    agent
        .collect_frames()
        .await
        .map_err(|e| LoadTestError::ConfigurationRejected {
            field: TRIGGER_FIELD.to_string(),
            reason: format!("{e:#}"),
        })?;

    info!(
        frames = config.number_images(),
        instrument_mode = config.instrument_mode(),
        observation_type = %config.observation_type(),
        "agent armed for collection"
    );
    Ok(())
}
