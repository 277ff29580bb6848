//! Protocol implementations
//!
//! This module contains the gateway's protocol engines.

pub mod modbus;
