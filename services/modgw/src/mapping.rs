//! Register mapping table.
//!
//! Immutable two-level lookup built once from configuration: a unit id
//! resolves to a node and a device type, and the device type resolves each
//! register address to an ingestion topic and value type. The table is never
//! mutated after construction, so concurrent reads need no locking.

use std::collections::HashMap;

use tracing::debug;

use crate::config::MappingConfig;
use crate::error::{ModGwError, Result};
use crate::protocols::modbus::codec::ValueType;
use crate::protocols::modbus::constants::ExceptionCode;

/// Mapping entry for one unit id
#[derive(Debug, Clone)]
pub struct UnitEntry {
    /// Node identifier on the ingestion side
    pub node_id: String,
    /// Index into the device-type register tables
    pub device_type: usize,
}

/// Mapping entry for one register address within a device type
#[derive(Debug, Clone)]
pub struct RegisterEntry {
    /// Topic leaf on the ingestion side
    pub topic: String,
    pub value_type: ValueType,
}

/// Immutable unit/register lookup table
#[derive(Debug)]
pub struct RegisterMap {
    units: HashMap<u8, UnitEntry>,
    device_types: Vec<HashMap<u16, RegisterEntry>>,
}

impl RegisterMap {
    /// Build the table from configuration.
    ///
    /// Fails when the parallel unit arrays disagree in length, when a register
    /// table's parallel arrays disagree, or when a device type indexes past
    /// the register tables. Configuration errors are fatal at startup.
    pub fn from_config(config: &MappingConfig) -> Result<Self> {
        if config.unit_ids.len() != config.node_ids.len()
            || config.unit_ids.len() != config.device_types.len()
        {
            return Err(ModGwError::ConfigError(format!(
                "mapping arrays disagree: {} unit_ids, {} node_ids, {} device_types",
                config.unit_ids.len(),
                config.node_ids.len(),
                config.device_types.len()
            )));
        }

        let mut device_types = Vec::with_capacity(config.register_tables.len());
        for (index, table) in config.register_tables.iter().enumerate() {
            if table.addresses.len() != table.topics.len()
                || table.addresses.len() != table.value_types.len()
            {
                return Err(ModGwError::ConfigError(format!(
                    "register table {}: {} addresses, {} topics, {} value_types",
                    index,
                    table.addresses.len(),
                    table.topics.len(),
                    table.value_types.len()
                )));
            }

            let mut registers = HashMap::with_capacity(table.addresses.len());
            for i in 0..table.addresses.len() {
                registers.insert(
                    table.addresses[i],
                    RegisterEntry {
                        topic: table.topics[i].clone(),
                        value_type: table.value_types[i],
                    },
                );
            }
            device_types.push(registers);
        }

        let mut units = HashMap::with_capacity(config.unit_ids.len());
        for i in 0..config.unit_ids.len() {
            let device_type = config.device_types[i];
            if device_type >= device_types.len() {
                return Err(ModGwError::ConfigError(format!(
                    "unit {} references device type {} but only {} register tables exist",
                    config.unit_ids[i],
                    device_type,
                    device_types.len()
                )));
            }
            units.insert(
                config.unit_ids[i],
                UnitEntry {
                    node_id: config.node_ids[i].clone(),
                    device_type,
                },
            );
        }

        debug!(
            "Register map built: {} units, {} device types",
            units.len(),
            device_types.len()
        );

        Ok(Self {
            units,
            device_types,
        })
    }

    /// Resolve a unit id to its node and device type.
    pub fn lookup_unit(&self, unit_id: u8) -> std::result::Result<&UnitEntry, ExceptionCode> {
        self.units.get(&unit_id).ok_or(ExceptionCode::BadUnitId)
    }

    /// Resolve a register address within a unit.
    ///
    /// The unit must resolve before the register is checked, so an unmapped
    /// unit id always reports BadUnitId even for addresses valid elsewhere.
    pub fn lookup_register(
        &self,
        unit_id: u8,
        address: u16,
    ) -> std::result::Result<(&UnitEntry, &RegisterEntry), ExceptionCode> {
        let unit = self.lookup_unit(unit_id)?;
        let register = self.device_types[unit.device_type]
            .get(&address)
            .ok_or(ExceptionCode::IllegalDataAddress)?;
        Ok((unit, register))
    }

    /// Check a requested register quantity against the value type's contract.
    pub fn validate_quantity(
        value_type: ValueType,
        quantity: u16,
    ) -> std::result::Result<(), ExceptionCode> {
        if quantity != value_type.required_quantity() {
            return Err(ExceptionCode::IllegalDataValue);
        }
        Ok(())
    }

    /// Value store key for a resolved register: `nodeID/topic`.
    pub fn store_key(unit: &UnitEntry, register: &RegisterEntry) -> String {
        format!("{}/{}", unit.node_id, register.topic)
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn device_type_count(&self) -> usize {
        self.device_types.len()
    }
}
