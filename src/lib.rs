//! Gateway sensor bridge library
//! Drives BLE sensors attached to a remote gateway: scan, select, connect, configure and
//! stream their readings to the log and a data file.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod simulator;
pub mod sink;
pub mod state;
pub mod utils;
