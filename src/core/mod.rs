//! Core functionality for the gateway sensor bridge
//! This module contains the device lifecycle engine and the sensor payload decoders.

pub mod bluetooth;
pub mod codec;

// Re-export commonly used types
pub use bluetooth::{Orchestrator, SessionSettings};
pub use codec::{Measurement, Quantity, SensorModel};
