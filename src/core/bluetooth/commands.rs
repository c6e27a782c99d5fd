//! Sensor configuration commands
//! This module contains the commands that instrument a connected sensor and the executor
//! that sends them in order.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};

use crate::core::bluetooth::gateway::{Gateway, GatewayError};
use crate::core::bluetooth::types::DeviceId;

/// One configuration step for a connected device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorCommand {
    /// Write `value` to a characteristic
    Write { handle: u16, value: Vec<u8> },
    /// Enable notifications on a characteristic
    Subscribe { handle: u16 },
}

/// Command sender trait
#[async_trait]
pub trait CommandSender {
    /// Send a command to the device
    async fn send_command(&self, command: &SensorCommand) -> Result<(), GatewayError>;
}

/// Sends commands to one device through the gateway
pub struct GatewayCommandSender<G: Gateway + ?Sized> {
    gateway: Arc<G>,
    device: DeviceId,
}

impl<G: Gateway + ?Sized> GatewayCommandSender<G> {
    pub fn new(gateway: Arc<G>, device: DeviceId) -> Self {
        Self { gateway, device }
    }
}

#[async_trait]
impl<G: Gateway + ?Sized> CommandSender for GatewayCommandSender<G> {
    async fn send_command(&self, command: &SensorCommand) -> Result<(), GatewayError> {
        match command {
            SensorCommand::Write { handle, value } => {
                debug!("Writing {:02X?} to handle {} on {}", value, handle, self.device);
                self.gateway.write(&self.device, *handle, value).await
            }
            SensorCommand::Subscribe { handle } => {
                debug!("Enabling notifications on handle {} of {}", handle, self.device);
                self.gateway.subscribe(&self.device, *handle, true).await
            }
        }
    }
}

/// Command executor for a device
pub struct CommandExecutor<T: CommandSender> {
    command_sender: T,
}

impl<T: CommandSender> CommandExecutor<T> {
    pub fn new(command_sender: T) -> Self {
        Self { command_sender }
    }

    /// Sends `commands` in order, stopping at the first failure
    pub async fn configure(&self, commands: &[SensorCommand]) -> Result<(), GatewayError> {
        for command in commands {
            info!("Sending command: {:?}", command);
            self.command_sender.send_command(command).await?;
        }
        Ok(())
    }
}
