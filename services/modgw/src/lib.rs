//! Modbus Gateway Service (`modgw`)
//!
//! Exposes live telemetry ingested from an MQTT feed as Modbus/TCP holding
//! registers, so industrial Modbus masters can poll smart-meter readings
//! that originate from a pub/sub stream.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌──────────────┐    ┌─────────────┐
//! │ MQTT broker │───►│ IngestBridge │───►│ MeterStore  │
//! └─────────────┘    └──────────────┘    └─────────────┘
//!                                               ▲ get
//! ┌─────────────┐    ┌──────────────────┐       │
//! │   masters   │◄──►│ ModbusTcpServer  │───────┤
//! └─────────────┘    │  (dispatcher)    │       │ lookup
//!                    └──────────────────┘  ┌────┴───────┐
//!                                          │ RegisterMap│
//!                                          └────────────┘
//! ```
//!
//! - [`bridge::IngestBridge`] subscribes to the broker and writes the latest
//!   raw value per `nodeID/topic` key
//! - [`store::MeterStore`] is the concurrent latest-value map shared between
//!   ingestion and serving
//! - [`mapping::RegisterMap`] is the immutable (unit id, register address) to
//!   (topic, value type) table built from configuration
//! - [`protocols::modbus`] holds the ADU codec, the request dispatcher and
//!   the TCP serving loop

pub mod bridge;
pub mod config;
pub mod error;
pub mod mapping;
pub mod protocols;
pub mod store;

pub use config::GatewayConfig;
pub use error::{ModGwError, Result};
pub use mapping::RegisterMap;
pub use store::MeterStore;
