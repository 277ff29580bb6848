//! Gateway configuration model and loading.
//!
//! Configuration is read from a single YAML/JSON/TOML file chosen by file
//! extension, with `MODGW_`-prefixed environment variables merged on top.
//! The mapping section keeps the parallel-array shape of the deployed
//! configuration files; `RegisterMap::from_config` validates it at startup.

use std::path::Path;

use figment::providers::{Env, Format, Json, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{ModGwError, Result};
use crate::protocols::modbus::codec::ValueType;

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub mqtt: MqttConfig,
    pub mapping: MappingConfig,
}

/// Modbus/TCP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Idle-read deadline per connection in seconds; a client that stops
    /// sending is disconnected after this long
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// MQTT ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host
    #[serde(default = "default_broker")]
    pub broker: String,
    /// Broker port
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Subscription topic filter, e.g. `modbus/#`
    #[serde(default = "default_topic_filter")]
    pub topic: String,
    /// Quality of service: 0, 1 or 2
    #[serde(default)]
    pub qos: u8,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Accepted prefix for the node segment of incoming topics; empty accepts
    /// any node segment
    #[serde(default = "default_node_prefix")]
    pub node_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            topic: default_topic_filter(),
            qos: 0,
            username: None,
            password: None,
            node_prefix: default_node_prefix(),
        }
    }
}

/// Parallel-array mapping tables, one entry per served unit id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Modbus unit ids served by the gateway
    pub unit_ids: Vec<u8>,
    /// Ingestion-side node id per unit
    pub node_ids: Vec<String>,
    /// Index into `register_tables` per unit
    pub device_types: Vec<usize>,
    /// Register tables, one per device type
    pub register_tables: Vec<RegisterTableConfig>,
}

/// Registers of one device type, as parallel arrays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTableConfig {
    pub addresses: Vec<u16>,
    pub topics: Vec<String>,
    pub value_types: Vec<ValueType>,
}

impl GatewayConfig {
    /// Load configuration from a file, with environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ModGwError::config("Config file must have an extension"))?;

        let figment = match extension {
            "yaml" | "yml" => Figment::new().merge(Yaml::file(path)),
            "json" => Figment::new().merge(Json::file(path)),
            "toml" => Figment::new().merge(Toml::file(path)),
            _ => {
                return Err(ModGwError::ConfigError(format!(
                    "Unsupported config format: {}",
                    extension
                )))
            },
        };

        figment
            .merge(Env::prefixed("MODGW_"))
            .extract()
            .map_err(|e| ModGwError::ConfigError(format!("Failed to load configuration: {}", e)))
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1502
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_broker() -> String {
    "127.0.0.1".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "modgw".to_string()
}

fn default_topic_filter() -> String {
    "modbus/#".to_string()
}

fn default_node_prefix() -> String {
    "Node".to_string()
}
