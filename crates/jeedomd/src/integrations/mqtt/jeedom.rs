use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::MqttConfig;
use super::client::MqttClient;
use super::client::MqttMessage;
use crate::hub::FromIntegrationMessage;
use crate::hub::FromIntegrationSender;
use crate::integrations::Integration;

/// MQTT Integration for the Jeedom bridge
///
/// Consumes eqLogic discovery payloads and per-command value events
/// published by the Jeedom MQTT plugin and forwards them to the hub.
pub struct JeedomMqttIntegration<C: MqttClient> {
    client: Arc<Mutex<C>>,
    config: MqttConfig,
    to_hub: Option<FromIntegrationSender>,
    /// Handle to the background message processing task
    message_task: Option<JoinHandle<()>>,
}

impl<C: MqttClient> JeedomMqttIntegration<C> {
    /// Create a new Jeedom MQTT integration
    pub fn new(client: C, config: &MqttConfig) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            config: config.clone(),
            to_hub: None,
            message_task: None,
        }
    }

    /// Process incoming MQTT messages in a background task
    async fn process_messages_task(
        client: Arc<Mutex<C>>,
        config: MqttConfig,
        to_hub: FromIntegrationSender,
    ) {
        loop {
            let msg = {
                let mut client_guard = client.lock().await;
                // Bound the lock hold time so shutdown is not blocked forever
                tokio::time::timeout(
                    std::time::Duration::from_millis(100),
                    client_guard.poll_message(),
                )
                .await
                .unwrap_or_default()
            };

            match msg {
                Some(msg) => {
                    if let Some(routed) = route_message(&msg, &config) {
                        if let Err(e) = to_hub.send(routed).await {
                            warn!("Failed to forward MQTT message to hub: {}", e);
                        }
                    }
                }
                None => {
                    // No message available, yield to allow other tasks
                    tokio::task::yield_now().await;
                }
            }
        }
    }
}

/// Turn an incoming MQTT message into a hub message, if it is one we care
/// about.
fn route_message(msg: &MqttMessage, config: &MqttConfig) -> Option<FromIntegrationMessage> {
    if topic_matches(&config.discovery_topic, &msg.topic) {
        let payload: serde_json::Value = match serde_json::from_slice(&msg.payload) {
            Ok(v) => v,
            Err(e) => {
                debug!(topic = %msg.topic, "unparseable discovery payload: {}", e);
                return None;
            }
        };
        debug!(topic = %msg.topic, "eqLogic discovery payload");
        return Some(FromIntegrationMessage::EqLogicUpdated { payload });
    }

    if topic_matches(&config.event_topic, &msg.topic) {
        let cmd_id = match parse_event_cmd_id(&config.event_topic, &msg.topic) {
            Some(id) => id,
            None => {
                debug!(topic = %msg.topic, "cmd event topic without a numeric id");
                return None;
            }
        };
        let payload: serde_json::Value = match serde_json::from_slice(&msg.payload) {
            Ok(v) => v,
            Err(e) => {
                debug!(topic = %msg.topic, "unparseable cmd event payload: {}", e);
                return None;
            }
        };
        // The plugin wraps the value: {"value": ...}. A bare payload is
        // taken as the value itself.
        let value = match &payload {
            serde_json::Value::Object(map) => map.get("value").cloned(),
            other => Some(other.clone()),
        };
        let value = match value {
            Some(serde_json::Value::Null) | None => {
                debug!(topic = %msg.topic, "cmd event without a value");
                return None;
            }
            Some(v) => v,
        };
        return Some(FromIntegrationMessage::CmdValue { cmd_id, value });
    }

    debug!(topic = %msg.topic, "ignoring message on unrelated topic");
    None
}

/// Match a topic against a `<prefix>/#` filter (or an exact topic).
fn topic_matches(filter: &str, topic: &str) -> bool {
    match filter.strip_suffix("/#") {
        Some(prefix) => {
            topic == prefix || topic.strip_prefix(prefix).is_some_and(|r| r.starts_with('/'))
        }
        None => filter == topic,
    }
}

/// Extract the cmd id from an event topic like `jeedom/cmd/event/123`.
fn parse_event_cmd_id(filter: &str, topic: &str) -> Option<i64> {
    let prefix = filter.strip_suffix("/#").unwrap_or(filter);
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let id_part = rest.split('/').next()?;
    id_part.parse().ok()
}

#[async_trait]
impl<C: MqttClient + 'static> Integration for JeedomMqttIntegration<C> {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        self.to_hub = Some(tx.clone());

        info!(
            "Connecting to MQTT broker at {}:{}",
            self.config.broker, self.config.port
        );
        {
            let mut client = self.client.lock().await;
            client.connect().await?;
        }
        info!("Connected to MQTT broker");

        info!(
            "Subscribing to Jeedom topics: {}, {}",
            self.config.discovery_topic, self.config.event_topic
        );
        {
            let mut client = self.client.lock().await;
            client.subscribe(&self.config.discovery_topic).await?;
            client.subscribe(&self.config.event_topic).await?;
        }

        let client = self.client.clone();
        let config = self.config.clone();
        let task = tokio::spawn(async move {
            Self::process_messages_task(client, config, tx).await;
        });
        self.message_task = Some(task);

        info!("MQTT integration ready");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("MQTT integration shutting down");
        if let Some(task) = self.message_task.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::mqtt::client::MockMqttClient;
    use serde_json::json;

    fn test_config() -> MqttConfig {
        MqttConfig {
            broker: "localhost".to_string(),
            port: 1883,
            client_id: "test".to_string(),
            discovery_topic: "jeedom/discovery/eqLogic/#".to_string(),
            event_topic: "jeedom/cmd/event/#".to_string(),
            username: None,
            password: None,
        }
    }

    fn mqtt_msg(topic: &str, payload: serde_json::Value) -> MqttMessage {
        MqttMessage {
            topic: topic.to_string(),
            payload: payload.to_string().into_bytes(),
            retain: false,
        }
    }

    #[test]
    fn discovery_topic_routes_to_eqlogic_update() {
        let msg = mqtt_msg("jeedom/discovery/eqLogic/12", json!({"id": 12, "cmds": {}}));
        match route_message(&msg, &test_config()) {
            Some(FromIntegrationMessage::EqLogicUpdated { payload }) => {
                assert_eq!(payload["id"], json!(12));
            }
            other => panic!("unexpected routing {other:?}"),
        }
    }

    #[test]
    fn event_topic_routes_to_cmd_value() {
        let msg = mqtt_msg("jeedom/cmd/event/123", json!({"value": "20.5"}));
        match route_message(&msg, &test_config()) {
            Some(FromIntegrationMessage::CmdValue { cmd_id, value }) => {
                assert_eq!(cmd_id, 123);
                assert_eq!(value, json!("20.5"));
            }
            other => panic!("unexpected routing {other:?}"),
        }
    }

    #[test]
    fn bare_event_payload_is_the_value() {
        let msg = mqtt_msg("jeedom/cmd/event/123", json!(42));
        match route_message(&msg, &test_config()) {
            Some(FromIntegrationMessage::CmdValue { cmd_id, value }) => {
                assert_eq!(cmd_id, 123);
                assert_eq!(value, json!(42));
            }
            other => panic!("unexpected routing {other:?}"),
        }
    }

    #[test]
    fn event_without_value_is_dropped() {
        let msg = mqtt_msg("jeedom/cmd/event/123", json!({"value": null}));
        assert!(route_message(&msg, &test_config()).is_none());
        let msg = mqtt_msg("jeedom/cmd/event/123", json!({"other": 1}));
        assert!(route_message(&msg, &test_config()).is_none());
    }

    #[test]
    fn garbage_payloads_are_dropped() {
        let msg = MqttMessage {
            topic: "jeedom/cmd/event/123".to_string(),
            payload: b"{not json".to_vec(),
            retain: false,
        };
        assert!(route_message(&msg, &test_config()).is_none());
    }

    #[test]
    fn unrelated_topics_are_ignored() {
        let msg = mqtt_msg("zigbee2mqtt/bridge/state", json!("online"));
        assert!(route_message(&msg, &test_config()).is_none());
        // A prefix match must stop at a topic separator.
        let msg = mqtt_msg("jeedom/cmd/eventual/1", json!(1));
        assert!(route_message(&msg, &test_config()).is_none());
    }

    #[test]
    fn event_cmd_id_parsing() {
        assert_eq!(
            parse_event_cmd_id("jeedom/cmd/event/#", "jeedom/cmd/event/77"),
            Some(77)
        );
        assert_eq!(
            parse_event_cmd_id("jeedom/cmd/event/#", "jeedom/cmd/event/77/extra"),
            Some(77)
        );
        assert_eq!(
            parse_event_cmd_id("jeedom/cmd/event/#", "jeedom/cmd/event/abc"),
            None
        );
    }

    #[tokio::test]
    async fn setup_subscribes_to_both_topics() {
        let client = MockMqttClient::new();
        let config = test_config();
        let mut integration = JeedomMqttIntegration::new(client, &config);
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        integration.setup(tx).await.unwrap();
        {
            let client = integration.client.lock().await;
            assert!(client.is_connected);
            assert_eq!(
                client.subscriptions,
                vec![
                    "jeedom/discovery/eqLogic/#".to_string(),
                    "jeedom/cmd/event/#".to_string()
                ]
            );
        }
        integration.shutdown().await.unwrap();
    }
}
