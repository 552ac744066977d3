#![deny(rust_2018_idioms)]

pub mod orchestrator;
pub mod setup;
pub mod transform;

pub use orchestrator::{DeviceOrchestrator, OrchestratorConfig, WireFormat};
