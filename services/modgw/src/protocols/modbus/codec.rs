//! Register value encoding.
//!
//! Raw textual values delivered by the ingestion side are parsed per the
//! mapped value type and rendered as a 4-byte big-endian register image.
//! Byte order is big-endian (ABCD) for every type, including the Float32
//! IEEE-754 image, matching the frame header. Modbus register content
//! endianness is a device convention rather than wire framing, so a single
//! convention is applied uniformly and pinned by tests.

use serde::{Deserialize, Serialize};

use super::constants::{REQUIRED_READ_QUANTITY, VALUE_BYTES};
use crate::error::{ModGwError, Result};

/// Value type of a mapped register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// IEEE-754 32-bit floating point
    Float32,
    /// 32-bit two's-complement integer
    Signed,
    /// 32-bit unsigned integer
    Unsigned,
}

impl ValueType {
    /// Registers occupied by one value of this type
    #[inline]
    pub fn register_span(self) -> u16 {
        (VALUE_BYTES / 2) as u16
    }

    /// Register quantity a read request must carry for this type
    #[inline]
    pub fn required_quantity(self) -> u16 {
        REQUIRED_READ_QUANTITY
    }
}

/// Parse a raw textual value and encode it as big-endian register bytes.
///
/// Fails with a data error when the text does not parse as the mapped type;
/// the dispatcher answers such failures as CreationError.
pub fn encode_value(raw: &str, value_type: ValueType) -> Result<[u8; VALUE_BYTES]> {
    let raw = raw.trim();
    match value_type {
        ValueType::Float32 => raw
            .parse::<f32>()
            .map(f32::to_be_bytes)
            .map_err(|e| ModGwError::DataError(format!("invalid float32 {:?}: {}", raw, e))),
        ValueType::Signed => raw
            .parse::<i32>()
            .map(i32::to_be_bytes)
            .map_err(|e| ModGwError::DataError(format!("invalid signed value {:?}: {}", raw, e))),
        ValueType::Unsigned => raw
            .parse::<u32>()
            .map(u32::to_be_bytes)
            .map_err(|e| ModGwError::DataError(format!("invalid unsigned value {:?}: {}", raw, e))),
    }
}

/// Split a value image into big-endian 16-bit registers.
pub fn value_to_registers(bytes: &[u8; VALUE_BYTES]) -> [u16; 2] {
    [
        u16::from_be_bytes([bytes[0], bytes[1]]),
        u16::from_be_bytes([bytes[2], bytes[3]]),
    ]
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_encode_float32() {
        let bytes = encode_value("230.5", ValueType::Float32).unwrap();
        assert_eq!(bytes, [0x43, 0x66, 0x80, 0x00]);

        // Round-trip through the IEEE-754 image
        assert_eq!(f32::from_be_bytes(bytes), 230.5);
    }

    #[test]
    fn test_encode_float32_precision() {
        let bytes = encode_value("3.14", ValueType::Float32).unwrap();
        let value = f32::from_be_bytes(bytes);
        assert!((value - 3.14).abs() < f32::EPSILON * 4.0);
    }

    #[test]
    fn test_encode_float32_negative_and_zero() {
        let bytes = encode_value("0", ValueType::Float32).unwrap();
        assert_eq!(bytes, [0x00, 0x00, 0x00, 0x00]);

        let bytes = encode_value("-10.5", ValueType::Float32).unwrap();
        assert_eq!(f32::from_be_bytes(bytes), -10.5);
    }

    #[test]
    fn test_encode_signed() {
        let bytes = encode_value("-100", ValueType::Signed).unwrap();
        // -100 as i32 = 0xFFFFFF9C
        assert_eq!(bytes, [0xFF, 0xFF, 0xFF, 0x9C]);
        assert_eq!(i32::from_be_bytes(bytes), -100);

        let bytes = encode_value("2147483647", ValueType::Signed).unwrap();
        assert_eq!(bytes, [0x7F, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_unsigned() {
        let bytes = encode_value("305419896", ValueType::Unsigned).unwrap();
        assert_eq!(bytes, [0x12, 0x34, 0x56, 0x78]);

        let bytes = encode_value("4294967295", ValueType::Unsigned).unwrap();
        assert_eq!(bytes, [0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_trims_whitespace() {
        let bytes = encode_value(" 230.5\n", ValueType::Float32).unwrap();
        assert_eq!(f32::from_be_bytes(bytes), 230.5);
    }

    #[test]
    fn test_encode_parse_failures() {
        assert!(encode_value("not-a-number", ValueType::Float32).is_err());
        assert!(encode_value("1.5", ValueType::Signed).is_err());
        assert!(encode_value("-1", ValueType::Unsigned).is_err());
        assert!(encode_value("", ValueType::Float32).is_err());
    }

    #[test]
    fn test_value_to_registers() {
        let registers = value_to_registers(&[0x43, 0x66, 0x80, 0x00]);
        assert_eq!(registers, [0x4366, 0x8000]);
    }

    #[test]
    fn test_register_contract() {
        for value_type in [ValueType::Float32, ValueType::Signed, ValueType::Unsigned] {
            assert_eq!(value_type.register_span(), 2);
            assert_eq!(value_type.required_quantity(), 4);
        }
    }

    #[test]
    fn test_value_type_config_names() {
        let parsed: ValueType = serde_yaml::from_str("float32").unwrap();
        assert_eq!(parsed, ValueType::Float32);
        let parsed: ValueType = serde_yaml::from_str("signed").unwrap();
        assert_eq!(parsed, ValueType::Signed);
        let parsed: ValueType = serde_yaml::from_str("unsigned").unwrap();
        assert_eq!(parsed, ValueType::Unsigned);
    }
}
