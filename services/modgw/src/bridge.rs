//! MQTT ingestion bridge.
//!
//! Subscribes to the configured topic filter and funnels `(key, value)`
//! updates into the meter store through an unbounded queue. The event loop
//! runs for the process lifetime: broker errors back off and reconnect,
//! malformed updates are dropped and logged without ever reaching the store.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::MqttConfig;
use crate::error::{ModGwError, Result};
use crate::store::MeterStore;

/// One ingestion update heading for the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeterUpdate {
    /// Store key, `nodeID/topic`
    pub key: String,
    /// Raw textual value
    pub value: String,
}

/// Bridge between the MQTT feed and the meter store
pub struct IngestBridge {
    config: MqttConfig,
    store: Arc<MeterStore>,
}

impl IngestBridge {
    pub fn new(config: MqttConfig, store: Arc<MeterStore>) -> Self {
        Self { config, store }
    }

    fn qos(&self) -> QoS {
        match self.config.qos {
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtMostOnce,
        }
    }

    /// Connect, subscribe and pump updates until shutdown is requested.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut options = MqttOptions::new(
            &self.config.client_id,
            &self.config.broker,
            self.config.port,
        );
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        client
            .subscribe(&self.config.topic, self.qos())
            .await
            .map_err(|e| ModGwError::ConnectionError(format!("MQTT subscribe failed: {}", e)))?;
        info!(
            "Subscribed to {} at {}:{}",
            self.config.topic, self.config.broker, self.config.port
        );

        // Writer half of the bridge: a queue decouples broker polling from
        // store writes and serializes them in arrival order.
        let (tx, mut rx) = mpsc::unbounded_channel::<MeterUpdate>();
        let store = Arc::clone(&self.store);
        let writer_shutdown = shutdown.clone();
        let writer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.cancelled() => break,
                    update = rx.recv() => match update {
                        Some(update) => store.put(update.key, update.value),
                        None => break,
                    },
                }
            }
        });

        let node_prefix = self.config.node_prefix.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        match parse_update(&publish.topic, &publish.payload, &node_prefix) {
                            Ok(update) => {
                                debug!("Received {} = {:?}", update.key, update.value);
                                // The writer only stops at shutdown, so a send
                                // failure means we are shutting down too
                                if tx.send(update).is_err() {
                                    break;
                                }
                            },
                            Err(e) => warn!("Dropping ingestion message: {}", e),
                        }
                    },
                    Ok(event) => trace!("MQTT event: {:?}", event),
                    Err(e) => {
                        error!("MQTT connection error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    },
                },
            }
        }

        drop(tx);
        let _ = writer.await;
        info!("Ingestion bridge stopped");
        Ok(())
    }
}

/// Derive a store update from a hierarchical topic path and raw payload.
///
/// The node id and topic are the last two non-empty path segments, so
/// `/modbus/Node1/volt1` stores under `Node1/volt1`. Topics with fewer than
/// two segments, node segments without the configured prefix, and non-UTF-8
/// payloads are rejected.
pub fn parse_update(topic: &str, payload: &[u8], node_prefix: &str) -> Result<MeterUpdate> {
    let value = std::str::from_utf8(payload)
        .map_err(|_| ModGwError::DataError(format!("non-UTF-8 payload on topic {}", topic)))?;

    let segments: Vec<&str> = topic.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return Err(ModGwError::DataError(format!(
            "topic {} lacks a node/topic hierarchy",
            topic
        )));
    }

    let node_id = segments[segments.len() - 2];
    let leaf = segments[segments.len() - 1];
    if !node_prefix.is_empty() && !node_id.starts_with(node_prefix) {
        return Err(ModGwError::DataError(format!(
            "node segment {} in topic {} does not start with {}",
            node_id, topic, node_prefix
        )));
    }

    Ok(MeterUpdate {
        key: format!("{}/{}", node_id, leaf),
        value: value.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_topic_path() {
        let update = parse_update("/modbus/Node1/volt1", b"230.5", "Node").unwrap();
        assert_eq!(update.key, "Node1/volt1");
        assert_eq!(update.value, "230.5");
    }

    #[test]
    fn test_parse_uses_last_two_segments() {
        let update = parse_update("site/7/meters/Node42/current", b"-3", "Node").unwrap();
        assert_eq!(update.key, "Node42/current");
    }

    #[test]
    fn test_parse_minimal_hierarchy() {
        let update = parse_update("Node1/volt1", b"1", "Node").unwrap();
        assert_eq!(update.key, "Node1/volt1");
    }

    #[test]
    fn test_reject_shallow_topic() {
        let result = parse_update("volt1", b"1", "Node");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("hierarchy"));

        // Empty segments do not count towards the hierarchy
        assert!(parse_update("//volt1", b"1", "Node").is_err());
    }

    #[test]
    fn test_reject_nonconforming_node_prefix() {
        let result = parse_update("/modbus/Meter1/volt1", b"1", "Node");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Meter1"));

        // An empty prefix accepts any node segment
        assert!(parse_update("/modbus/Meter1/volt1", b"1", "").is_ok());
    }

    #[test]
    fn test_reject_non_utf8_payload() {
        let result = parse_update("/modbus/Node1/volt1", &[0xFF, 0xFE], "Node");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("non-UTF-8"));
    }

    #[test]
    fn test_qos_mapping() {
        let bridge_with_qos = |qos: u8| {
            let config = MqttConfig {
                qos,
                ..MqttConfig::default()
            };
            IngestBridge::new(config, Arc::new(MeterStore::new()))
        };

        assert_eq!(bridge_with_qos(0).qos(), QoS::AtMostOnce);
        assert_eq!(bridge_with_qos(1).qos(), QoS::AtLeastOnce);
        assert_eq!(bridge_with_qos(2).qos(), QoS::ExactlyOnce);
        // Out-of-range values fall back to at-most-once
        assert_eq!(bridge_with_qos(9).qos(), QoS::AtMostOnce);
    }
}
