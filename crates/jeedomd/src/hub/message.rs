//! Messages flowing from integrations into the hub.

use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// A full eqLogic record arrived on the discovery topic.
    EqLogicUpdated { payload: serde_json::Value },
    /// A command value event arrived for one cmd id.
    CmdValue {
        cmd_id: i64,
        value: serde_json::Value,
    },
}

pub type FromIntegrationSender = mpsc::Sender<FromIntegrationMessage>;
pub type FromIntegrationReceiver = mpsc::Receiver<FromIntegrationMessage>;
