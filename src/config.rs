//! Load-test configuration record.
//!
//! A [`LoadTestConfig`] is built once per run, either field by field (the `command`
//! sub-command) or from a YAML document holding a single top-level `configuration`
//! mapping (the `file` sub-command). Both paths go through [`ConfigBuilder`], which
//! validates the record before handing it out. The record is immutable afterwards.
//!
//! Document keys are matched against an explicit schema ([`ConfigBuilder::apply_entry`]).
//! Keys outside the schema are ignored, so older or richer documents keep working.

use crate::error::{AppResult, LoadTestError};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Top-level key of a configuration document.
pub const DOCUMENT_ROOT_KEY: &str = "configuration";

/// Observation class reported to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ObservationClass {
    #[serde(rename = "SCIENCE")]
    #[value(name = "SCIENCE")]
    Science,
    #[serde(rename = "CALIB")]
    #[value(name = "CALIB")]
    Calib,
}

impl ObservationClass {
    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Science => "SCIENCE",
            Self::Calib => "CALIB",
        }
    }
}

impl fmt::Display for ObservationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObservationClass {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCIENCE" => Ok(Self::Science),
            "CALIB" => Ok(Self::Calib),
            other => Err(LoadTestError::InvalidConfig(format!(
                "unknown observation class '{other}' (expected SCIENCE or CALIB)"
            ))),
        }
    }
}

/// Observation type reported to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObservationType {
    #[value(name = "BIAS")]
    Bias,
    #[value(name = "DARK")]
    Dark,
    #[value(name = "SKY_FLAT")]
    SkyFlat,
    #[value(name = "DOME_FLAT")]
    DomeFlat,
    #[value(name = "SPECTRAL_FLAT")]
    SpectralFlat,
    #[value(name = "ARC")]
    Arc,
    #[value(name = "SKY")]
    Sky,
    #[value(name = "OBJECTS")]
    Objects,
}

impl ObservationType {
    /// Every observation type, in protocol order.
    pub const ALL: [ObservationType; 8] = [
        Self::Bias,
        Self::Dark,
        Self::SkyFlat,
        Self::DomeFlat,
        Self::SpectralFlat,
        Self::Arc,
        Self::Sky,
        Self::Objects,
    ];

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bias => "BIAS",
            Self::Dark => "DARK",
            Self::SkyFlat => "SKY_FLAT",
            Self::DomeFlat => "DOME_FLAT",
            Self::SpectralFlat => "SPECTRAL_FLAT",
            Self::Arc => "ARC",
            Self::Sky => "SKY",
            Self::Objects => "OBJECTS",
        }
    }
}

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObservationType {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LoadTestError::InvalidConfig(format!("unknown observation type '{s}'")))
    }
}

/// Fully validated configuration of one load-test run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTestConfig {
    instrument_mode: String,
    observation_class: ObservationClass,
    observation_type: ObservationType,
    observation_mode: String,
    image_path: PathBuf,
    number_images: u32,
    number_petitions: u32,
    petition_period: Duration,
}

impl LoadTestConfig {
    /// Start building a configuration field by field.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Parse a configuration document.
    pub fn from_document_str(document: &str) -> AppResult<Self> {
        let root: Value = serde_yaml::from_str(document)?;
        let entries = root
            .get(DOCUMENT_ROOT_KEY)
            .and_then(Value::as_mapping)
            .ok_or_else(|| {
                LoadTestError::InvalidConfig(format!(
                    "document has no top-level '{DOCUMENT_ROOT_KEY}' mapping"
                ))
            })?;

        let mut builder = Self::builder();
        for (key, value) in entries {
            let key = key.as_str().ok_or_else(|| {
                LoadTestError::InvalidConfig(format!("non-string configuration key {key:?}"))
            })?;
            if !builder.apply_entry(key, value)? {
                debug!(key, "ignoring unrecognized configuration key");
            }
        }
        builder.build()
    }

    /// Read and parse a configuration document from disk.
    pub fn from_document_file(path: &Path) -> AppResult<Self> {
        let document = std::fs::read_to_string(path).map_err(|e| {
            LoadTestError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_document_str(&document)
    }

    pub fn instrument_mode(&self) -> &str {
        &self.instrument_mode
    }

    pub fn observation_class(&self) -> ObservationClass {
        self.observation_class
    }

    pub fn observation_type(&self) -> ObservationType {
        self.observation_type
    }

    pub fn observation_mode(&self) -> &str {
        &self.observation_mode
    }

    /// Directory scanned for source artifacts.
    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Artifacts submitted per petition (>= 1).
    pub fn number_images(&self) -> u32 {
        self.number_images
    }

    /// Petitions issued per run (>= 1).
    pub fn number_petitions(&self) -> u32 {
        self.number_petitions
    }

    /// Pause between consecutive petitions.
    pub fn petition_period(&self) -> Duration {
        self.petition_period
    }
}

/// Builder enforcing the [`LoadTestConfig`] invariants.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    instrument_mode: Option<String>,
    observation_class: Option<ObservationClass>,
    observation_type: Option<ObservationType>,
    observation_mode: Option<String>,
    image_path: Option<PathBuf>,
    number_images: Option<u32>,
    number_petitions: Option<u32>,
    petition_period_secs: Option<f64>,
}

impl ConfigBuilder {
    pub fn instrument_mode(mut self, mode: impl Into<String>) -> Self {
        self.instrument_mode = Some(mode.into());
        self
    }

    pub fn observation_class(mut self, class: ObservationClass) -> Self {
        self.observation_class = Some(class);
        self
    }

    pub fn observation_type(mut self, kind: ObservationType) -> Self {
        self.observation_type = Some(kind);
        self
    }

    pub fn observation_mode(mut self, mode: impl Into<String>) -> Self {
        self.observation_mode = Some(mode.into());
        self
    }

    pub fn image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    pub fn number_images(mut self, count: u32) -> Self {
        self.number_images = Some(count);
        self
    }

    pub fn number_petitions(mut self, count: u32) -> Self {
        self.number_petitions = Some(count);
        self
    }

    /// Inter-petition period in (possibly fractional) seconds.
    pub fn petition_period_secs(mut self, seconds: f64) -> Self {
        self.petition_period_secs = Some(seconds);
        self
    }

    /// Apply one document entry through the field schema.
    ///
    /// Returns `Ok(false)` when `key` is not part of the schema; the entry is left
    /// untouched and the caller decides whether to log it.
    pub fn apply_entry(&mut self, key: &str, value: &Value) -> AppResult<bool> {
        match key {
            "instrument_mode" => self.instrument_mode = Some(scalar_text(key, value)?),
            "observation_mode" => self.observation_mode = Some(scalar_text(key, value)?),
            "observation_class" => {
                self.observation_class = Some(scalar_text(key, value)?.parse()?)
            }
            "observation_type" => self.observation_type = Some(scalar_text(key, value)?.parse()?),
            "image_path" => self.image_path = Some(PathBuf::from(scalar_text(key, value)?)),
            "number_images" => self.number_images = Some(count(key, value)?),
            "number_petitions" => self.number_petitions = Some(count(key, value)?),
            "petition_period" => {
                self.petition_period_secs = Some(value.as_f64().ok_or_else(|| {
                    LoadTestError::InvalidConfig(format!("'{key}' must be a number of seconds"))
                })?)
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Validate and freeze the record.
    pub fn build(self) -> AppResult<LoadTestConfig> {
        let number_images = require(self.number_images, "number_images")?;
        if number_images == 0 {
            return Err(LoadTestError::InvalidConfig(
                "number_images must be at least 1".into(),
            ));
        }
        let number_petitions = require(self.number_petitions, "number_petitions")?;
        if number_petitions == 0 {
            return Err(LoadTestError::InvalidConfig(
                "number_petitions must be at least 1".into(),
            ));
        }
        let period = require(self.petition_period_secs, "petition_period")?;
        if !period.is_finite() || period < 0.0 {
            return Err(LoadTestError::InvalidConfig(format!(
                "petition_period must be a non-negative number of seconds, got {period}"
            )));
        }
        let petition_period = Duration::try_from_secs_f64(period).map_err(|e| {
            LoadTestError::InvalidConfig(format!("petition_period {period} s is out of range: {e}"))
        })?;

        Ok(LoadTestConfig {
            instrument_mode: require(self.instrument_mode, "instrument_mode")?,
            observation_class: require(self.observation_class, "observation_class")?,
            observation_type: require(self.observation_type, "observation_type")?,
            observation_mode: require(self.observation_mode, "observation_mode")?,
            image_path: self.image_path.unwrap_or_else(|| PathBuf::from(".")),
            number_images,
            number_petitions,
            petition_period,
        })
    }
}

fn require<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| LoadTestError::InvalidConfig(format!("missing field '{field}'")))
}

fn scalar_text(key: &str, value: &Value) -> AppResult<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(LoadTestError::InvalidConfig(format!(
            "'{key}' must be a scalar value"
        ))),
    }
}

fn count(key: &str, value: &Value) -> AppResult<u32> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| LoadTestError::InvalidConfig(format!("'{key}' must be a positive integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ConfigBuilder {
        LoadTestConfig::builder()
            .instrument_mode("IMAGING")
            .observation_class(ObservationClass::Science)
            .observation_type(ObservationType::Objects)
            .observation_mode("STARE")
            .image_path("/data/raw")
            .number_images(3)
            .number_petitions(2)
            .petition_period_secs(0.5)
    }

    #[test]
    fn builds_complete_record() {
        let config = complete().build().unwrap();
        assert_eq!(config.number_images(), 3);
        assert_eq!(config.number_petitions(), 2);
        assert_eq!(config.petition_period(), Duration::from_millis(500));
        assert_eq!(config.image_path(), Path::new("/data/raw"));
    }

    #[test]
    fn rejects_zero_counts_and_negative_period() {
        assert!(complete().number_images(0).build().is_err());
        assert!(complete().number_petitions(0).build().is_err());
        assert!(complete().petition_period_secs(-0.1).build().is_err());
        assert!(complete().petition_period_secs(f64::NAN).build().is_err());
        assert!(complete().petition_period_secs(0.0).build().is_ok());
    }

    #[test]
    fn oversized_period_is_a_configuration_error() {
        let err = complete().petition_period_secs(1.0e20).build().unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_CONFIG);
        assert!(err.to_string().contains("petition_period"), "{err}");

        let err = complete().petition_period_secs(f64::MAX).build().unwrap_err();
        assert!(matches!(err, LoadTestError::InvalidConfig(_)));
        assert!(complete().petition_period_secs(f64::INFINITY).build().is_err());
    }

    #[test]
    fn largest_representable_period_and_counts_are_accepted() {
        let config = complete()
            .number_images(u32::MAX)
            .number_petitions(u32::MAX)
            .petition_period_secs(1.0e15)
            .build()
            .unwrap();
        assert_eq!(config.number_images(), u32::MAX);
        assert_eq!(config.number_petitions(), u32::MAX);
        assert_eq!(config.petition_period().as_secs(), 1_000_000_000_000_000);
    }

    #[test]
    fn document_counts_beyond_u32_are_rejected() {
        let document = |images: &str, period: &str| {
            format!(
                "configuration:\n  instrument_mode: IMAGING\n  observation_class: SCIENCE\n  \
                 observation_type: OBJECTS\n  observation_mode: STARE\n  \
                 number_images: {images}\n  number_petitions: 1\n  petition_period: {period}\n"
            )
        };
        assert!(LoadTestConfig::from_document_str(&document("4294967295", "0")).is_ok());
        let err = LoadTestConfig::from_document_str(&document("4294967296", "0")).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_CONFIG);
        let err = LoadTestConfig::from_document_str(&document("1", "1.0e20")).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_CONFIG);
    }

    #[test]
    fn missing_field_is_named() {
        let err = LoadTestConfig::builder()
            .number_images(1)
            .number_petitions(1)
            .petition_period_secs(0.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("instrument_mode"), "{err}");
    }

    #[test]
    fn document_ignores_unknown_keys() {
        let document = r#"
configuration:
  instrument_mode: IMAGING
  observation_class: CALIB
  observation_type: SPECTRAL_FLAT
  observation_mode: STARE
  image_path: /data/raw
  number_images: 4
  number_petitions: 10
  petition_period: 1
  operator: somebody
  extra:
    nested: true
"#;
        let config = LoadTestConfig::from_document_str(document).unwrap();
        assert_eq!(config.observation_class(), ObservationClass::Calib);
        assert_eq!(config.observation_type(), ObservationType::SpectralFlat);
        assert_eq!(config.petition_period(), Duration::from_secs(1));
    }

    #[test]
    fn document_without_root_mapping_is_rejected() {
        let err = LoadTestConfig::from_document_str("number_images: 1\n").unwrap_err();
        assert!(matches!(err, LoadTestError::InvalidConfig(_)));
    }

    #[test]
    fn document_with_bad_enum_is_rejected() {
        let document = "configuration:\n  observation_type: FLAT\n";
        assert!(LoadTestConfig::from_document_str(document).is_err());
    }

    #[test]
    fn observation_names_round_trip() {
        for kind in ObservationType::ALL {
            assert_eq!(kind.as_str().parse::<ObservationType>().unwrap(), kind);
        }
        assert_eq!("CALIB".parse::<ObservationClass>().unwrap(), ObservationClass::Calib);
        assert!("science".parse::<ObservationClass>().is_err());
    }
}
