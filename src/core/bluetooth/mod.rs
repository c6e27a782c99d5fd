//! Gateway-facing orchestration
//! This module handles everything done through the BLE gateway: scanning, connecting,
//! resolving GATT handles, configuring sensors, dispatching notifications and teardown.

pub mod commands;
pub mod connection;
pub mod constants;
pub mod device;
pub mod dispatcher;
pub mod gateway;
pub mod handles;
pub mod manager;
pub mod notification;
pub mod profile;
pub mod scanner;
pub mod selection;
pub mod shutdown;
pub mod types;

// Re-export types that should be publicly accessible
pub use commands::{CommandExecutor, CommandSender, GatewayCommandSender, SensorCommand};
pub use connection::ConnectionManager;
pub use dispatcher::{Dispatched, Dispatcher};
pub use gateway::{Credentials, Gateway, GatewayError, GatewayEvent, GatewayMessage, GatewayReport};
pub use handles::GattHandleTable;
pub use manager::{ExitReason, Orchestrator, SessionSettings};
pub use notification::NotificationHandler;
pub use profile::{DeviceFamily, Sensor, SensorSettings};
pub use scanner::AdvertisementScanner;
pub use selection::{AutoSelector, DeviceSelector};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use types::{AdvertisedDevice, DeviceId, OrchestratorState, ScanMode, Selection, TelemetryRecord};
