pub mod api;
pub mod config;
pub mod discovery;
pub mod hub;
pub mod integrations;

pub use api::ApiError;
pub use api::JeedomApi;
pub use config::Config;
pub use config::LogLevel;
pub use discovery::DiscoveryEngine;
pub use discovery::DiscoveryRules;
pub use hub::ActionRunner;
pub use hub::Hub;
pub use hub::HubEvent;
