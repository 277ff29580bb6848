//! Modbus protocol constants based on the official specification.
//!
//! Frame limits follow Modbus/TCP: the MBAP header plus a maximum 254-byte
//! body (unit id + PDU) caps the ADU at 260 bytes.

// ============================================================================
// Function Codes
// ============================================================================

/// Read Coils (bit access)
pub const FUNC_READ_COILS: u8 = 0x01;
/// Read Discrete Inputs (bit access)
pub const FUNC_READ_DISCRETE_INPUTS: u8 = 0x02;
/// Read Holding Registers (16-bit access) - the operation this gateway serves
pub const FUNC_READ_HOLDING_REGISTERS: u8 = 0x03;
/// Read Input Registers (16-bit access)
pub const FUNC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Highest function code in the public Modbus range; codes above this are
/// rejected outright as IllegalFunction
pub const MAX_FUNCTION_CODE: u8 = 43;

// ============================================================================
// Frame Size Constants
// ============================================================================

/// MBAP header length excluding the unit identifier
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) = 6 bytes
pub const MBAP_HEADER_LEN: usize = 6;

/// Minimum parseable request: MBAP header + unit id + function code
pub const ADU_HEADER_LEN: usize = 8;

/// Maximum ADU length for Modbus/TCP (6-byte MBAP + 254-byte body)
pub const MAX_ADU_LENGTH: usize = 260;

/// Maximum register quantity for FC03 per the Modbus specification
///
/// Response PDU: function code (1) + byte count (1) + N x 2 bytes <= 253,
/// therefore N <= 125.
pub const MAX_READ_REGISTERS: u16 = 125;

// ============================================================================
// Value Layout
// ============================================================================

/// Bytes occupied by one mapped value (two 16-bit registers)
pub const VALUE_BYTES: usize = 4;

/// Register quantity a read request must carry for every current value type
pub const REQUIRED_READ_QUANTITY: u16 = 4;

// ============================================================================
// Exception Codes
// ============================================================================

/// Modbus exception codes, wire values per the specification plus the
/// gateway-local codes 0xE1/0xE2 outside the reserved range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    /// The upstream source has not produced a value for the polled register
    GatewayTargetFailedToRespond = 0x0B,
    /// Gateway-local: a stored value could not be rendered as register data
    CreationError = 0xE1,
    /// Gateway-local: the unit id is not present in the mapping table
    BadUnitId = 0xE2,
}

impl ExceptionCode {
    /// Wire value of the exception code
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable description for logging
    pub fn description(self) -> &'static str {
        match self {
            ExceptionCode::IllegalFunction => "Illegal Function",
            ExceptionCode::IllegalDataAddress => "Illegal Data Address",
            ExceptionCode::IllegalDataValue => "Illegal Data Value",
            ExceptionCode::ServerDeviceFailure => "Server Device Failure",
            ExceptionCode::Acknowledge => "Acknowledge",
            ExceptionCode::ServerDeviceBusy => "Server Device Busy",
            ExceptionCode::MemoryParityError => "Memory Parity Error",
            ExceptionCode::GatewayPathUnavailable => "Gateway Path Unavailable",
            ExceptionCode::GatewayTargetFailedToRespond => {
                "Gateway Target Device Failed to Respond"
            },
            ExceptionCode::CreationError => "Response Creation Error",
            ExceptionCode::BadUnitId => "Bad Unit ID",
        }
    }
}

/// Human-readable function code description for request logging
pub fn function_code_description(fc: u8) -> &'static str {
    match fc & 0x7F {
        // Remove exception bit for lookup
        FUNC_READ_COILS => "Read Coils",
        FUNC_READ_DISCRETE_INPUTS => "Read Discrete Inputs",
        FUNC_READ_HOLDING_REGISTERS => "Read Holding Registers",
        FUNC_READ_INPUT_REGISTERS => "Read Input Registers",
        _ => "Unknown Function",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_wire_values() {
        // Wire values must match the Modbus specification exactly
        assert_eq!(ExceptionCode::IllegalFunction.as_u8(), 1);
        assert_eq!(ExceptionCode::IllegalDataAddress.as_u8(), 2);
        assert_eq!(ExceptionCode::IllegalDataValue.as_u8(), 3);
        assert_eq!(ExceptionCode::ServerDeviceFailure.as_u8(), 4);
        assert_eq!(ExceptionCode::Acknowledge.as_u8(), 5);
        assert_eq!(ExceptionCode::ServerDeviceBusy.as_u8(), 6);
        assert_eq!(ExceptionCode::MemoryParityError.as_u8(), 8);
        assert_eq!(ExceptionCode::GatewayPathUnavailable.as_u8(), 10);
        assert_eq!(ExceptionCode::GatewayTargetFailedToRespond.as_u8(), 11);

        // Gateway-local codes
        assert_eq!(ExceptionCode::CreationError.as_u8(), 0xE1);
        assert_eq!(ExceptionCode::BadUnitId.as_u8(), 0xE2);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            ExceptionCode::IllegalDataAddress.description(),
            "Illegal Data Address"
        );
        assert_eq!(
            ExceptionCode::GatewayTargetFailedToRespond.description(),
            "Gateway Target Device Failed to Respond"
        );
        assert_eq!(function_code_description(0x03), "Read Holding Registers");
        // Exception bit is stripped for lookup
        assert_eq!(function_code_description(0x83), "Read Holding Registers");
        assert_eq!(function_code_description(0x2B), "Unknown Function");
    }
}
