//! Modbus/TCP server: connection handling and request dispatch.
//!
//! One task per accepted connection drives read -> decode -> dispatch ->
//! write until the peer closes, an I/O error occurs, the idle deadline
//! passes, or shutdown is requested. One connection's failure never affects
//! another. The dispatcher resolves read-holding-registers requests against
//! the register map and the live meter store; every per-request failure is
//! answered as a Modbus exception frame on the same connection, in request
//! order.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::codec;
use super::constants::{self, ExceptionCode};
use super::frame::{self, AduRequest, DecodeOutcome, ModbusException};
use crate::config::ServerConfig;
use crate::error::{ModGwError, Result};
use crate::mapping::RegisterMap;
use crate::store::MeterStore;

/// Server statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Frames received that reached the dispatcher
    pub total_requests: u64,
    /// Data responses sent
    pub successful_responses: u64,
    /// Exception responses sent
    pub exception_responses: u64,
    /// Frames dropped as unanswerable (framing errors)
    pub dropped_frames: u64,
    /// Currently connected clients
    pub connected_clients: u32,
}

/// Resolves parsed requests against the mapping table and the value store.
///
/// Stateless across requests: each request runs the full
/// parse -> validate -> resolve -> encode pipeline on its own.
pub struct RequestDispatcher {
    map: Arc<RegisterMap>,
    store: Arc<MeterStore>,
}

impl RequestDispatcher {
    pub fn new(map: Arc<RegisterMap>, store: Arc<MeterStore>) -> Self {
        Self { map, store }
    }

    /// Resolve a request to the registers of its data response.
    pub fn resolve(&self, request: &AduRequest) -> std::result::Result<Vec<u16>, ModbusException> {
        match request.function_code {
            constants::FUNC_READ_HOLDING_REGISTERS => self.read_holding_registers(request),
            fc => Err(ModbusException::new(fc, ExceptionCode::IllegalFunction)),
        }
    }

    fn read_holding_registers(
        &self,
        request: &AduRequest,
    ) -> std::result::Result<Vec<u16>, ModbusException> {
        let fail = |code| ModbusException::new(request.function_code, code);

        // Payload carries start address and register quantity
        if request.payload.len() != 4 {
            debug!(
                "Bad FC03 payload length {} from unit {}",
                request.payload.len(),
                request.unit_id
            );
            return Err(fail(ExceptionCode::IllegalDataValue));
        }
        let address = u16::from_be_bytes([request.payload[0], request.payload[1]]);
        let quantity = u16::from_be_bytes([request.payload[2], request.payload[3]]);

        // Protocol ceiling, checked before any table or store access
        if quantity < 1 || quantity > constants::MAX_READ_REGISTERS {
            debug!("Register quantity {} out of range", quantity);
            return Err(fail(ExceptionCode::IllegalDataValue));
        }

        let (unit, register) = self
            .map
            .lookup_register(request.unit_id, address)
            .map_err(fail)?;
        RegisterMap::validate_quantity(register.value_type, quantity).map_err(fail)?;

        let key = RegisterMap::store_key(unit, register);
        let sample = self.store.get(&key).ok_or_else(|| {
            debug!("No value ingested yet for {}", key);
            fail(ExceptionCode::GatewayTargetFailedToRespond)
        })?;

        let value = codec::encode_value(&sample.raw, register.value_type).map_err(|e| {
            warn!("Cannot encode stored value for {}: {}", key, e);
            fail(ExceptionCode::CreationError)
        })?;

        // The response carries `quantity` registers with the value
        // left-aligned and zero fill behind it
        let mut registers = vec![0u16; quantity as usize];
        let value_registers = codec::value_to_registers(&value);
        registers[..value_registers.len()].copy_from_slice(&value_registers);
        Ok(registers)
    }
}

/// Modbus/TCP server fed by the meter store
pub struct ModbusTcpServer {
    bind_addr: String,
    idle_timeout: Duration,
    dispatcher: Arc<RequestDispatcher>,
    stats: Arc<RwLock<ServerStats>>,
}

impl ModbusTcpServer {
    pub fn new(config: &ServerConfig, map: Arc<RegisterMap>, store: Arc<MeterStore>) -> Self {
        Self {
            bind_addr: config.bind_addr(),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            dispatcher: Arc::new(RequestDispatcher::new(map, store)),
            stats: Arc::new(RwLock::new(ServerStats::default())),
        }
    }

    /// Current server statistics
    pub async fn stats(&self) -> ServerStats {
        self.stats.read().await.clone()
    }

    /// Bind the configured address and serve until cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(&self.bind_addr).await.map_err(|e| {
            ModGwError::ConnectionError(format!("Failed to bind {}: {}", self.bind_addr, e))
        })?;
        info!("Modbus/TCP server listening on {}", self.bind_addr);
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Accept error: {}", e);
                    continue;
                },
            };
            debug!("Client connected: {}", peer);
            self.stats.write().await.connected_clients += 1;

            let dispatcher = Arc::clone(&self.dispatcher);
            let stats = Arc::clone(&self.stats);
            let idle_timeout = self.idle_timeout;
            let conn_shutdown = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::handle_client(
                    stream,
                    peer,
                    dispatcher,
                    Arc::clone(&stats),
                    idle_timeout,
                    conn_shutdown,
                )
                .await
                {
                    debug!("Connection {} closed: {}", peer, e);
                }
                let mut stats = stats.write().await;
                stats.connected_clients = stats.connected_clients.saturating_sub(1);
            });
        }

        info!("Modbus/TCP server stopped");
        Ok(())
    }

    /// Serve one connection until close, error, idle timeout or shutdown.
    ///
    /// One read per ADU: masters send one frame per poll and the ADU is
    /// capped at 260 bytes, so a frame split across TCP segments shows up as
    /// a short or mismatched frame and drops the connection.
    async fn handle_client(
        mut stream: TcpStream,
        peer: SocketAddr,
        dispatcher: Arc<RequestDispatcher>,
        stats: Arc<RwLock<ServerStats>>,
        idle_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut buf = [0u8; constants::MAX_ADU_LENGTH];

        loop {
            let read = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                read = timeout(idle_timeout, stream.read(&mut buf)) => read,
            };

            let n = match read {
                Ok(Ok(0)) => {
                    debug!("Client {} disconnected", peer);
                    return Ok(());
                },
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    return Err(ModGwError::IoError(format!("read from {}: {}", peer, e)))
                },
                Err(_) => {
                    info!("Closing idle connection {}", peer);
                    return Ok(());
                },
            };
            trace!("Received {} bytes from {}: {:02X?}", n, peer, &buf[..n]);

            let (response, success) = match frame::decode_request(&buf[..n]) {
                Ok(DecodeOutcome::Request(request)) => match dispatcher.resolve(&request) {
                    Ok(registers) => (frame::encode_read_response(&request, &registers), true),
                    Err(exception) => {
                        debug!(
                            "Answering {} with {} ({:#04X})",
                            peer,
                            exception.code.description(),
                            exception.code.as_u8()
                        );
                        (frame::encode_exception(&request, &exception), false)
                    },
                },
                Ok(DecodeOutcome::Exception { request, exception }) => {
                    debug!(
                        "Rejecting frame from {}: {}",
                        peer,
                        exception.code.description()
                    );
                    (frame::encode_exception(&request, &exception), false)
                },
                Err(e) => {
                    // No reply envelope could be recovered; the frame is
                    // unanswerable and the connection is dropped
                    warn!("Dropping connection {}: {}", peer, e);
                    stats.write().await.dropped_frames += 1;
                    return Ok(());
                },
            };

            {
                let mut stats = stats.write().await;
                stats.total_requests += 1;
                if success {
                    stats.successful_responses += 1;
                } else {
                    stats.exception_responses += 1;
                }
            }

            trace!("Sending {} bytes to {}: {:02X?}", response.len(), peer, response);
            stream
                .write_all(&response)
                .await
                .map_err(|e| ModGwError::IoError(format!("write to {}: {}", peer, e)))?;
        }
    }
}
