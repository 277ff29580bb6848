//! Modbus/TCP protocol engine.
//!
//! Frame parsing (MBAP), request dispatch, value encoding and the TCP
//! serving loop. Only the server side of the protocol is implemented and the
//! supported operation is Read Holding Registers (FC 03); every other
//! function code is answered with an exception response.

pub mod codec;
pub mod constants;
pub mod frame;
pub mod server;

pub use constants::ExceptionCode;
pub use frame::{AduRequest, ModbusException};
pub use server::{ModbusTcpServer, RequestDispatcher, ServerStats};
