use serde::Deserialize;

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "jeedomd".to_string()
}

fn default_discovery_topic() -> String {
    "jeedom/discovery/eqLogic/#".to_string()
}

fn default_event_topic() -> String {
    "jeedom/cmd/event/#".to_string()
}

/// Configuration for the MQTT integration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// MQTT broker hostname or IP address
    pub broker: String,

    /// MQTT broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// MQTT client ID
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Topic filter the Jeedom bridge publishes eqLogic records on
    #[serde(default = "default_discovery_topic")]
    pub discovery_topic: String,

    /// Topic filter for per-command value events
    #[serde(default = "default_event_topic")]
    pub event_topic: String,

    /// Optional username for authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for authentication
    #[serde(default)]
    pub password: Option<String>,
}
