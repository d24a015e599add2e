use std::error::Error;

use async_trait::async_trait;

use crate::hub::FromIntegrationSender;

pub mod mqtt;

/// Integration trait that all integrations must implement
#[async_trait]
pub trait Integration: Send + Sync {
    /// Get the name/identifier of this integration
    fn name(&self) -> &str;

    /// Set up the integration - connect, subscribe, initialize state, etc.
    ///
    /// The integration receives a sender to report events back to the hub
    /// (discovery payloads, command value events).
    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>>;

    /// Shut down the integration gracefully
    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>>;
}
