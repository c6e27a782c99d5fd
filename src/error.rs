//! Error kinds of the orchestration engine

use thiserror::Error;

use crate::core::bluetooth::gateway::GatewayError;
use crate::core::bluetooth::types::DeviceId;
use crate::core::codec::CodecError;
use crate::sink::SinkError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Login, session open or version check failed
    #[error("gateway unreachable: {0}")]
    TransportUnreachable(String),

    #[error("connect to {device} failed: {source}")]
    ConnectFailure {
        device: DeviceId,
        #[source]
        source: GatewayError,
    },

    #[error("GATT resolution on {device} failed: {source}")]
    ResolutionFailure {
        device: DeviceId,
        #[source]
        source: GatewayError,
    },

    #[error("configuration of {device} failed: {reason}")]
    ConfigurationFailure { device: DeviceId, reason: String },

    #[error(transparent)]
    MalformedPayload(#[from] CodecError),

    #[error("shutdown retries exhausted after {attempts} attempts: {last}")]
    ShutdownRetryExhausted { attempts: u32, last: GatewayError },

    #[error("data file error: {0}")]
    Sink(#[from] SinkError),

    /// The gateway stopped pushing events and reports
    #[error("gateway event channel closed")]
    ChannelClosed,

    #[error("gateway request failed: {0}")]
    Gateway(#[from] GatewayError),
}

impl OrchestratorError {
    pub fn configuration(device: &DeviceId, reason: impl ToString) -> Self {
        Self::ConfigurationFailure {
            device: device.clone(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error ends the session
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ConnectFailure { .. }
                | Self::ConfigurationFailure { .. }
                | Self::MalformedPayload(_)
                | Self::ShutdownRetryExhausted { .. }
        )
    }
}

