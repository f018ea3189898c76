//! Shared fixtures for integration tests.
#![allow(dead_code)]

use dfagent_loadtest::agent::directory::InMemoryNameService;
use dfagent_loadtest::agent::mock::SimulatedAgent;
use dfagent_loadtest::{
    LoadTestConfig, ObservationClass, ObservationType, SessionEstablisher, SessionHandle,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const INSTANCE: &str = "DF/MIRADASDFAgent";

const BLOCK: usize = 2880;

/// Write a 2-D 8-bit FITS image into `dir` and return its path.
pub fn write_fits(
    dir: &Path,
    name: &str,
    width: usize,
    height: usize,
    frmtime_ms: &str,
) -> PathBuf {
    let cards = [
        ("SIMPLE", "T".to_string()),
        ("BITPIX", "8".to_string()),
        ("NAXIS", "2".to_string()),
        ("NAXIS1", width.to_string()),
        ("NAXIS2", height.to_string()),
        ("EXPTIME", "0.25".to_string()),
        ("FRMTIME", frmtime_ms.to_string()),
    ];

    let mut header = String::new();
    for (key, value) in cards {
        header.push_str(&format!("{:<80}", format!("{key:<8}= {value:>20}")));
    }
    header.push_str(&format!("{:<80}", "END"));

    let mut bytes = header.into_bytes();
    bytes.resize(bytes.len().div_ceil(BLOCK) * BLOCK, b' ');
    bytes.extend((0..width * height).map(|i| (i % 256) as u8));
    bytes.resize(bytes.len().div_ceil(BLOCK) * BLOCK, 0);

    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fits fixture");
    path
}

/// Directory with `agent` registered under [`INSTANCE`].
pub async fn directory_with(agent: Arc<SimulatedAgent>) -> Arc<InMemoryNameService> {
    let directory = Arc::new(InMemoryNameService::new());
    directory.register(INSTANCE, agent).await;
    directory
}

pub async fn session_for(agent: Arc<SimulatedAgent>) -> SessionHandle {
    SessionEstablisher::new(directory_with(agent).await)
        .establish(INSTANCE, Duration::from_secs(30))
        .await
        .expect("session against simulated agent")
}

pub fn config(dir: &Path, images: u32, petitions: u32, period_secs: f64) -> LoadTestConfig {
    LoadTestConfig::builder()
        .instrument_mode("IMAGING")
        .observation_class(ObservationClass::Science)
        .observation_type(ObservationType::Objects)
        .observation_mode("STARE")
        .image_path(dir)
        .number_images(images)
        .number_petitions(petitions)
        .petition_period_secs(period_secs)
        .build()
        .expect("valid test configuration")
}
