use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use rumqttc::QoS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing;

/// A message delivered on a subscribed topic.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    #[allow(dead_code)]
    pub retain: bool,
}

/// Broker seam, mockable in tests.
///
/// The Jeedom bridge is consume-only: commands go out over the HTTP API,
/// so there is no publish here.
#[async_trait]
pub trait MqttClient: Send + Sync {
    async fn connect(&mut self) -> Result<(), Box<dyn Error + Send>>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn Error + Send>>;

    /// Next message from any subscribed topic, or `None` when the client
    /// has nothing queued and should stop.
    async fn poll_message(&mut self) -> Option<MqttMessage>;
}

/// In-memory stand-in for the broker.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockMqttClient {
    pub messages: Vec<MqttMessage>,
    pub subscriptions: Vec<String>,
    pub is_connected: bool,
}

#[cfg(test)]
#[async_trait]
impl MqttClient for MockMqttClient {
    async fn connect(&mut self) -> Result<(), Box<dyn Error + Send>> {
        self.is_connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn Error + Send>> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn poll_message(&mut self) -> Option<MqttMessage> {
        self.messages.pop()
    }
}

#[cfg(test)]
impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for the next poll.
    pub fn add_message(&mut self, topic: String, payload: Vec<u8>) {
        self.messages.push(MqttMessage {
            topic,
            payload,
            retain: false,
        });
    }
}

/// rumqttc-backed client. Construction only records the options; the
/// connection and its event-loop task come up in `connect`.
pub struct RumqttcClient {
    mqtt_options: MqttOptions,
    client: Option<AsyncClient>,
    message_rx: Option<mpsc::UnboundedReceiver<MqttMessage>>,
    event_loop_task: Option<JoinHandle<()>>,
}

impl RumqttcClient {
    pub fn new(config: &super::MqttConfig) -> anyhow::Result<Self> {
        let mut mqtt_options =
            MqttOptions::new(config.client_id.clone(), config.broker.clone(), config.port);

        mqtt_options.set_keep_alive(Duration::from_secs(30));

        // Allow large MQTT packets (2 MiB): a Z-Wave controller eqLogic can
        // carry hundreds of cmds in one discovery payload
        mqtt_options.set_max_packet_size(2 * 1024 * 1024, 2 * 1024 * 1024);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mqtt_options.set_credentials(username, password);
        }

        Ok(Self {
            mqtt_options,
            client: None,
            message_rx: None,
            event_loop_task: None,
        })
    }
}

#[async_trait]
impl MqttClient for RumqttcClient {
    async fn connect(&mut self) -> Result<(), Box<dyn Error + Send>> {
        let (client, mut event_loop) = AsyncClient::new(self.mqtt_options.clone(), 10);

        let (message_tx, message_rx) = mpsc::unbounded_channel();

        // Drive the rumqttc event loop in the background, forwarding publishes
        // into the channel until the receiver side goes away.
        let task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let msg = MqttMessage {
                            topic: publish.topic.to_string(),
                            payload: publish.payload.to_vec(),
                            retain: publish.retain,
                        };

                        if message_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {
                        // connack, suback and friends carry nothing we route
                    }
                    Err(e) => {
                        tracing::warn!("MQTT event loop error: {}", e);
                        // Back off; rumqttc reconnects on the next poll
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            tracing::info!("MQTT event loop task exiting");
        });

        self.client = Some(client);
        self.message_rx = Some(message_rx);
        self.event_loop_task = Some(task);

        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn Error + Send>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "subscribe before connect",
                ))
            })?;

        client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| Box::new(e) as Box<dyn Error + Send>)?;

        Ok(())
    }

    async fn poll_message(&mut self) -> Option<MqttMessage> {
        match &mut self.message_rx {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl Drop for RumqttcClient {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop_task.take() {
            task.abort();
        }
    }
}
