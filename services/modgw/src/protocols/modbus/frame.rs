//! Modbus/TCP ADU codec.
//!
//! Decodes raw frames into [`AduRequest`] and renders success and exception
//! responses. All MBAP header fields are big-endian. A buffer too short to
//! carry the 8-byte header cannot yield a reply envelope and is reported as a
//! framing error; once the header is available, invalid requests are answered
//! as Modbus exceptions instead.

use tracing::trace;

use super::constants::{self, ExceptionCode};
use crate::error::{ModGwError, Result};

/// Parsed Modbus/TCP request, one per incoming frame
#[derive(Debug, Clone)]
pub struct AduRequest {
    /// Transaction identifier, echoed verbatim in the response
    pub transaction_id: u16,
    /// Protocol identifier, echoed verbatim (0 for Modbus)
    pub protocol_id: u16,
    /// Unit identifier selecting the mapping table entry
    pub unit_id: u8,
    /// Function code
    pub function_code: u8,
    /// Opaque payload after the 8-byte header
    pub payload: Vec<u8>,
}

/// Per-request failure answered as a Modbus exception frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModbusException {
    /// Function code the exception refers to (offending code for
    /// IllegalFunction, request code otherwise)
    pub function_code: u8,
    pub code: ExceptionCode,
}

impl ModbusException {
    pub fn new(function_code: u8, code: ExceptionCode) -> Self {
        Self {
            function_code,
            code,
        }
    }
}

/// Outcome of decoding a raw buffer that carried a full header
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Well-formed request, ready for dispatch
    Request(AduRequest),
    /// Header parsed, but the request can only be answered as an exception
    Exception {
        request: AduRequest,
        exception: ModbusException,
    },
}

/// Decode one raw ADU buffer.
///
/// Returns a framing error when the buffer is shorter than the 8-byte header;
/// such frames are unanswerable and the caller drops the connection. With a
/// full header, a function code outside [1, 43] yields an IllegalFunction
/// exception carrying the offending code, and an MBAP length field that
/// disagrees with the buffer (`declared + 6 != len`) yields IllegalDataValue.
pub fn decode_request(buf: &[u8]) -> Result<DecodeOutcome> {
    if buf.len() < constants::ADU_HEADER_LEN {
        return Err(ModGwError::ProtocolError(format!(
            "ADU too short: {} bytes (minimum {})",
            buf.len(),
            constants::ADU_HEADER_LEN
        )));
    }

    let transaction_id = u16::from_be_bytes([buf[0], buf[1]]);
    let protocol_id = u16::from_be_bytes([buf[2], buf[3]]);
    let declared_length = u16::from_be_bytes([buf[4], buf[5]]);
    let unit_id = buf[6];
    let function_code = buf[7];

    let request = AduRequest {
        transaction_id,
        protocol_id,
        unit_id,
        function_code,
        payload: buf[constants::ADU_HEADER_LEN..].to_vec(),
    };

    trace!(
        "Decoded ADU: trans_id={:04X}, unit_id={}, FC={:02X} ({}), payload_len={}",
        transaction_id,
        unit_id,
        function_code,
        constants::function_code_description(function_code),
        request.payload.len()
    );

    if function_code < 1 || function_code > constants::MAX_FUNCTION_CODE {
        let exception = ModbusException::new(function_code, ExceptionCode::IllegalFunction);
        return Ok(DecodeOutcome::Exception { request, exception });
    }

    // The length field covers unit id + function code + payload, so the full
    // frame must measure declared + 6 bytes
    if declared_length as usize + constants::MBAP_HEADER_LEN != buf.len() {
        let exception = ModbusException::new(function_code, ExceptionCode::IllegalDataValue);
        return Ok(DecodeOutcome::Exception { request, exception });
    }

    Ok(DecodeOutcome::Request(request))
}

/// Encode a successful read response carrying `registers`.
///
/// The MBAP length field is the body length (function code + byte count +
/// register data) plus the unit id byte. Register data is big-endian.
pub fn encode_read_response(request: &AduRequest, registers: &[u16]) -> Vec<u8> {
    let byte_count = registers.len() * 2;
    let length = byte_count + 3; // unit id + function code + byte count

    let mut frame = Vec::with_capacity(constants::MBAP_HEADER_LEN + length);
    frame.extend_from_slice(&request.transaction_id.to_be_bytes());
    frame.extend_from_slice(&request.protocol_id.to_be_bytes());
    frame.extend_from_slice(&(length as u16).to_be_bytes());
    frame.push(request.unit_id);
    frame.push(request.function_code);
    frame.push(byte_count as u8);
    for register in registers {
        frame.extend_from_slice(&register.to_be_bytes());
    }

    frame
}

/// Encode a Modbus exception frame: original function code with the high bit
/// set, one exception-code byte, MBAP length 3.
pub fn encode_exception(request: &AduRequest, exception: &ModbusException) -> Vec<u8> {
    let mut frame = Vec::with_capacity(constants::MBAP_HEADER_LEN + 3);
    frame.extend_from_slice(&request.transaction_id.to_be_bytes());
    frame.extend_from_slice(&request.protocol_id.to_be_bytes());
    frame.extend_from_slice(&3u16.to_be_bytes());
    frame.push(request.unit_id);
    frame.push(exception.function_code | 0x80);
    frame.push(exception.code.as_u8());

    frame
}
