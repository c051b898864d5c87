//! Fog-to-cloud IoT telemetry pipeline.
//!
//! Two binaries share this library:
//! - `fogflow-cloud` — the central ingestion service: authenticated HTTP
//!   API over bounded in-memory state with an online temperature trend
//!   model.
//! - `fogflow-fog` — the aggregation node: subscribes to the sensor topic,
//!   buffers and analyzes readings, and periodically forwards one
//!   aggregated record upstream.
//!
//! Modules follow the Explicit Module Boundary Pattern (EMBP): each
//! directory exposes a gateway (`mod.rs`) and the binaries only consume
//! what is re-exported here.

pub mod auth;
pub mod config;
pub mod error;
pub mod fog;
pub mod logging;
pub mod models;
pub mod predictor;
pub mod ring;
pub mod routes;
pub mod state;

// ---

pub use config::{CloudConfig, FogConfig};
pub use error::ApiError;
pub use logging::init_tracing;
pub use state::CloudState;
