//! # Data Factory Agent load generator
//!
//! This crate drives a remote Data Factory Agent through repeated configure/submit
//! cycles ("petitions") at a controlled rate, to validate its behavior under sustained
//! request pressure. The binary (`main.rs`) is a thin CLI over this library.
//!
//! ## Crate Structure
//!
//! Leaf to root:
//!
//! - **`artifact`**: Selects raw FITS artifacts from a directory and extracts the
//!   metadata record (extents, timestamp, exposure, frame cycle) plus frame payload.
//! - **`agent`**: The `DataFactoryAgent` and `NameService` capability traits, wire-level
//!   value types, and a simulated agent for dry runs and tests.
//! - **`session`**: Resolves an agent by name, probes it, and owns the process-wide
//!   middleware state. The only place a `SessionHandle` is created.
//! - **`command`**: Composes the ordered configuration protocol that arms the agent.
//! - **`submission`**: Streams artifacts to the agent, paced by their frame cycle.
//! - **`scheduler`**: Repeats petitions with a fixed period between them.
//! - **`config`**: The validated per-run configuration record and its document schema.
//! - **`settings`**: Figment-layered application settings (agent name, timeouts, logging).
//! - **`logging`**: `tracing` subscriber setup.
//! - **`error`**: `LoadTestError` and exit-code mapping.

pub mod agent;
pub mod artifact;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod submission;

pub use config::{LoadTestConfig, ObservationClass, ObservationType};
pub use error::{AppResult, LoadTestError};
pub use scheduler::{PetitionScheduler, RunReport};
pub use session::{SessionEstablisher, SessionHandle};
