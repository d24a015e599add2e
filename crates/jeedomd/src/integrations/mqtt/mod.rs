pub mod client;
pub mod config;
pub mod jeedom;

pub use config::Config as MqttConfig;
pub use jeedom::JeedomMqttIntegration;
