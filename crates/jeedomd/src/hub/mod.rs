//! The hub: entity index, state routing, action dispatch, persistence.

pub mod actions;
#[allow(clippy::module_inception)]
pub mod hub;
pub mod message;
pub mod store;

pub use actions::{ActionError, ActionRunner, CommandSink};
pub use hub::{EntityActions, EntityConfig, EntityRecord, Hub, HubEvent, StateRole, StateValue};
pub use message::{FromIntegrationMessage, FromIntegrationReceiver, FromIntegrationSender};
pub use store::{SaveDebouncer, SnapshotStore, StoreError};
