//! Event and report dispatch
//! Everything the gateway pushes goes through [`Dispatcher::dispatch`], one message at a time.

use log::{debug, info};

use crate::core::bluetooth::gateway::{GatewayEvent, GatewayMessage, GatewayReport};
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::merge_advertisements;
use crate::error::OrchestratorError;
use crate::state::SharedState;

/// What the orchestrator has to do after a message was dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Handled,
    /// The scan period ended and discovered devices can be offered for selection
    ScanComplete,
}

#[derive(Clone)]
pub struct Dispatcher {
    state: SharedState,
    notifications: NotificationHandler,
}

impl Dispatcher {
    pub fn new(state: SharedState, notifications: NotificationHandler) -> Self {
        Self { state, notifications }
    }

    pub fn notifications(&self) -> &NotificationHandler {
        &self.notifications
    }

    pub async fn dispatch(&self, message: GatewayMessage) -> Result<Dispatched, OrchestratorError> {
        match message {
            GatewayMessage::Event(event) => Ok(self.on_event(event).await),
            GatewayMessage::Report(report) => self.on_report(report).await,
        }
    }

    async fn on_event(&self, event: GatewayEvent) -> Dispatched {
        match event {
            GatewayEvent::Disconnect { device, reason } => {
                match self.state.lock().await.remove_connected(&device) {
                    Some(_) => info!("Device {} disconnected (reason 0x{:02X})", device.display_address(), reason),
                    None => debug!("Disconnect for unknown device {}", device.display_address()),
                }
                Dispatched::Handled
            }
            GatewayEvent::ScanComplete => {
                let state = self.state.lock().await;
                if state.is_exiting() {
                    debug!("Scan complete during shutdown, ignored");
                    return Dispatched::Handled;
                }
                info!("Scan complete, {} device(s) found", state.discovered_count());
                Dispatched::ScanComplete
            }
            GatewayEvent::Other { code } => {
                info!("Other unhandled event [{}]", code);
                Dispatched::Handled
            }
        }
    }

    async fn on_report(&self, report: GatewayReport) -> Result<Dispatched, OrchestratorError> {
        match report {
            GatewayReport::Advertisement(items) => {
                let merged = merge_advertisements(&mut *self.state.lock().await, &items);
                debug!("Advertisement report: {} item(s), {} matched", items.len(), merged);
            }
            GatewayReport::Notification { device, notifications } => {
                self.notifications.handle(&self.state, &device, &notifications).await?;
            }
            GatewayReport::Other { code } => info!("(Other report) [{}]", code),
        }
        Ok(Dispatched::Handled)
    }
}
