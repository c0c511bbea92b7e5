//! Surplus Diverter Library
//!
//! This library implements a real-time energy-surplus router for a single-phase
//! AC supply: it integrates net power flow at the grid connection point into an
//! energy bucket and drives a triac trigger so that surplus generation is
//! diverted into a dump load instead of being exported.

pub mod config;
pub mod diagnostics;
pub mod diverter;
pub mod energy_bucket;
pub mod filters;
pub mod integrator;
pub mod sample_source;
pub mod trigger;

// Re-export commonly used types for easier access
pub use config::DiverterConfig;
pub use diagnostics::{CycleReport, SettlementObserver};
pub use diverter::Diverter;
pub use energy_bucket::EnergyBucket;
pub use sample_source::{ChannelSource, SamplePair, SampleSource, SyntheticSource};
pub use trigger::{ActuatorOutput, ActuatorState, LineLevel, RecordingActuator};
