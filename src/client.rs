use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::counters::Counters;
use crate::errors::ErrorKind;
use crate::framer::{AsciiFramer, Framer, RtuFramer, TcpFramer};
use crate::message::{ModbusMessage, BROADCAST_TOKEN_MARKER};
use crate::queue::RequestQueue;
use crate::request::{Dispatch, ErrorHandler, RequestEntry, ResponseHandler};
use crate::sync_map::SyncResponseMap;
use crate::transport::{ByteStream, SerialStream, TcpClientStream};
use crate::utils::generate_token;
use crate::worker::Worker;

/// Which wire transport a client instance talks over — fixed for the
/// lifetime of the client (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Rtu,
    Tcp,
}

/// Lower bound Modbus standard places on a single coil/register request.
const MIN_QUANTITY: u16 = 1;
const MAX_COIL_QUANTITY: u16 = 2000;
const MAX_WRITE_COIL_QUANTITY: u16 = 1968;
const MAX_REGISTER_READ_QUANTITY: u16 = 125;
const MAX_REGISTER_WRITE_QUANTITY: u16 = 123;
/// FC 0x17's write side has a tighter ceiling than a plain write-multiple,
/// since the PDU also carries the read side's address/quantity fields.
const MAX_RW_WRITE_QUANTITY: u16 = 121;

/// Clamp bounds for a `sync_request` caller-supplied patience (spec §4.4).
const MIN_SYNC_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

/// The queue + worker + dispatch facade an application holds. One instance
/// owns exactly one transport; RTU and TCP-only operations are gated behind
/// `self.transport` at the call site rather than split into separate types,
/// matching the teacher's single `ModbusRelay` handling both sides of a
/// conversion rather than two parallel relay types.
pub struct ModbusClient {
    transport: TransportKind,
    queue: Arc<RequestQueue>,
    sync_map: Arc<SyncResponseMap>,
    counters: Arc<Counters>,
    dispatch: Arc<Mutex<Dispatch>>,
    framer: Arc<RwLock<Arc<dyn Framer>>>,
    response_timeout_ms: Arc<AtomicU64>,
    min_interval_ms: Arc<AtomicU64>,
    default_sync_timeout: Duration,
    stop_requested: Arc<AtomicBool>,
    clear_requested: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    tcp_target: Option<Arc<RwLock<crate::config::TcpConfig>>>,
    ascii_mode: Option<Arc<AtomicBool>>,
    skip_leading_zero: Option<Arc<AtomicBool>>,
}

impl ModbusClient {
    /// Opens a serial port and starts its worker immediately. RTU links are
    /// opened synchronously since `serialport::open` itself is blocking, as
    /// in the teacher's `RtuTransport::new`.
    pub fn connect_rtu(config: &ClientConfig) -> Result<Self, crate::errors::TransportError> {
        let skip_leading_zero = Arc::new(AtomicBool::new(config.rtu.skip_leading_zero));
        let stream = SerialStream::open(&config.rtu, skip_leading_zero.clone())?;

        let initial_framer: Arc<dyn Framer> = if config.rtu.use_ascii {
            Arc::new(AsciiFramer::new())
        } else {
            Arc::new(RtuFramer::new())
        };
        let ascii_mode = Arc::new(AtomicBool::new(config.rtu.use_ascii));

        Ok(Self::spawn(
            TransportKind::Rtu,
            config,
            Box::new(stream),
            initial_framer,
            None,
            Some(ascii_mode),
            Some(skip_leading_zero),
        ))
    }

    /// Constructs a TCP client. The socket connects lazily on first
    /// transaction, so this never blocks or fails on unreachable hosts.
    pub fn connect_tcp(config: &ClientConfig) -> Self {
        let tcp_target = Arc::new(RwLock::new(config.tcp.clone()));
        let stream = TcpClientStream::new(tcp_target.clone());

        Self::spawn(
            TransportKind::Tcp,
            config,
            Box::new(stream),
            Arc::new(TcpFramer::new()),
            Some(tcp_target),
            None,
            None,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn(
        transport: TransportKind,
        config: &ClientConfig,
        stream: Box<dyn ByteStream>,
        framer: Arc<dyn Framer>,
        tcp_target: Option<Arc<RwLock<crate::config::TcpConfig>>>,
        ascii_mode: Option<Arc<AtomicBool>>,
        skip_leading_zero: Option<Arc<AtomicBool>>,
    ) -> Self {
        let queue = Arc::new(RequestQueue::new(config.queue_capacity));
        let sync_map = Arc::new(SyncResponseMap::new());
        let counters = Arc::new(Counters::new());
        let dispatch = Arc::new(Mutex::new(Dispatch::None));
        let framer = Arc::new(RwLock::new(framer));
        let (response_timeout, min_interval) = match transport {
            TransportKind::Rtu => (config.rtu.transaction_timeout, Duration::ZERO),
            TransportKind::Tcp => (config.tcp.response_timeout, config.tcp.min_interval),
        };
        let response_timeout_ms = Arc::new(AtomicU64::new(response_timeout.as_millis() as u64));
        let min_interval_ms = Arc::new(AtomicU64::new(min_interval.as_millis() as u64));
        let stop_requested = Arc::new(AtomicBool::new(false));
        let clear_requested = Arc::new(AtomicBool::new(false));
        let stop_notify = Arc::new(Notify::new());

        let worker = Worker::new(
            queue.clone(),
            sync_map.clone(),
            counters.clone(),
            framer.clone(),
            stream,
            dispatch.clone(),
            response_timeout_ms.clone(),
            min_interval_ms.clone(),
            matches!(transport, TransportKind::Tcp),
            stop_requested.clone(),
            clear_requested.clone(),
            stop_notify.clone(),
        );
        let handle = tokio::spawn(worker.run());

        Self {
            transport,
            queue,
            sync_map,
            counters,
            dispatch,
            framer,
            response_timeout_ms,
            min_interval_ms,
            default_sync_timeout: config.default_sync_timeout,
            stop_requested,
            clear_requested,
            stop_notify,
            worker_handle: Mutex::new(Some(handle)),
            tcp_target,
            ascii_mode,
            skip_leading_zero,
        }
    }

    /// Stops the worker loop and waits for it to exit. Any request still in
    /// the queue is synthesized as `QueueCleared` and delivered to its
    /// handler/waiter, same as `clear_queue`.
    pub async fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
        if let Some(handle) = self.worker_handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Drops every queued request, delivering `QueueCleared` to each one's
    /// handler or sync waiter (spec §4.3).
    pub fn clear_queue(&self) {
        self.clear_requested.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
    }

    pub async fn pending_requests(&self) -> u32 {
        self.queue.size().await as u32
    }

    pub fn get_message_count(&self) -> u32 {
        self.counters.message_count()
    }

    pub fn get_error_count(&self) -> u32 {
        self.counters.error_count()
    }

    pub async fn reset_counts(&self) {
        self.counters.reset().await;
    }

    /// Overrides the per-transaction wire timeout (silence + write + read)
    /// and, optionally, the minimum spacing enforced between consecutive
    /// transmissions (on top of RTU's own T3.5 silence).
    pub fn set_timeout(&self, timeout: Duration, min_interval: Option<Duration>) {
        self.response_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::SeqCst);
        if let Some(min_interval) = min_interval {
            self.min_interval_ms
                .store(min_interval.as_millis() as u64, Ordering::SeqCst);
        }
    }

    /// Replaces the TCP target. Takes effect on the next transaction; an
    /// in-flight one still completes against the old target. TCP-only.
    pub async fn set_target(&self, addr: impl Into<String>, port: u16) -> Result<(), ErrorKind> {
        let Some(tcp_target) = &self.tcp_target else {
            return Err(ErrorKind::IllegalIpOrPort);
        };
        let mut target = tcp_target.write().await;
        target.target_addr = addr.into();
        target.target_port = port;
        Ok(())
    }

    /// Switches an RTU client to Modbus ASCII framing. RTU-only.
    pub async fn use_modbus_ascii(&self) -> Result<(), ErrorKind> {
        let Some(ascii_mode) = &self.ascii_mode else {
            return Err(ErrorKind::InvalidServer);
        };
        ascii_mode.store(true, Ordering::SeqCst);
        *self.framer.write().await = Arc::new(AsciiFramer::new());
        Ok(())
    }

    /// Switches an RTU client back to binary RTU framing. RTU-only.
    pub async fn use_modbus_rtu(&self) -> Result<(), ErrorKind> {
        let Some(ascii_mode) = &self.ascii_mode else {
            return Err(ErrorKind::InvalidServer);
        };
        ascii_mode.store(false, Ordering::SeqCst);
        *self.framer.write().await = Arc::new(RtuFramer::new());
        Ok(())
    }

    pub fn is_modbus_ascii(&self) -> bool {
        self.ascii_mode
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Strips one leading `0x00` byte some RS-485 adapters prepend to every
    /// response, before framing sees it. RTU-only.
    pub fn skip_leading_0x00(&self, enabled: bool) -> Result<(), ErrorKind> {
        let Some(flag) = &self.skip_leading_zero else {
            return Err(ErrorKind::InvalidServer);
        };
        flag.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    /// Installs the unified response handler. Rejected (returns `false`)
    /// if either leg of the legacy `on_data`/`on_error` split is already
    /// set (spec §4.7's handler mutual exclusion).
    pub async fn on_response_handler(&self, handler: ResponseHandler) -> bool {
        let mut dispatch = self.dispatch.lock().await;
        if matches!(&*dispatch, Dispatch::Legacy { on_data, on_error } if on_data.is_some() || on_error.is_some())
        {
            return false;
        }
        *dispatch = Dispatch::Unified { on_response: handler };
        true
    }

    /// Installs the success-path legacy handler. Rejected if `onResponse`
    /// is already set; replacing an existing `on_data` handler is allowed
    /// but logged, per spec §4.7.
    pub async fn on_data_handler(&self, handler: ResponseHandler) -> bool {
        let mut dispatch = self.dispatch.lock().await;
        match &mut *dispatch {
            Dispatch::Unified { .. } => false,
            Dispatch::Legacy { on_data, .. } => {
                if on_data.is_some() {
                    tracing::warn!("replacing existing on_data handler");
                }
                *on_data = Some(handler);
                true
            }
            Dispatch::None => {
                *dispatch = Dispatch::Legacy { on_data: Some(handler), on_error: None };
                true
            }
        }
    }

    /// Installs the error-path legacy handler. Rejected if `onResponse` is
    /// already set; replacing an existing `on_error` handler is allowed but
    /// logged, per spec §4.7.
    pub async fn on_error_handler(&self, handler: ErrorHandler) -> bool {
        let mut dispatch = self.dispatch.lock().await;
        match &mut *dispatch {
            Dispatch::Unified { .. } => false,
            Dispatch::Legacy { on_error, .. } => {
                if on_error.is_some() {
                    tracing::warn!("replacing existing on_error handler");
                }
                *on_error = Some(handler);
                true
            }
            Dispatch::None => {
                *dispatch = Dispatch::Legacy { on_data: None, on_error: Some(handler) };
                true
            }
        }
    }

    /// Enqueues a raw request under the caller-supplied correlation `token`
    /// (spec §4.7: `add_request(token, server_id, fc, …)`).
    pub async fn add_request(
        &self,
        token: u32,
        msg: ModbusMessage,
        handler: Option<ResponseHandler>,
    ) -> Result<(), ErrorKind> {
        let mut entry = RequestEntry::new(token, msg);
        if let Some(handler) = handler {
            entry = entry.with_handler(handler);
        }
        self.queue.try_push(entry).await?;
        self.counters.record_admission();
        Ok(())
    }

    /// RTU-only fire-and-forget broadcast (server id 0): no response is
    /// ever expected, per the Modbus RTU spec. `data` is the PDU (function
    /// code plus its payload) that follows the synthesized `0x00` address
    /// byte; must be non-empty and fit in a single ADU.
    pub async fn add_broadcast_message(&self, data: &[u8]) -> Result<u32, ErrorKind> {
        if self.transport != TransportKind::Rtu {
            return Err(ErrorKind::BroadcastError);
        }
        if data.is_empty() || data.len() > crate::message::MAX_PDU_LEN {
            return Err(ErrorKind::ParameterCountError);
        }

        let mut msg = ModbusMessage::empty();
        msg.push_u8(0x00);
        msg.push_bytes(data);

        let token = generate_token() | BROADCAST_TOKEN_MARKER;
        self.queue.try_push(RequestEntry::new(token, msg)).await?;
        self.counters.record_admission();
        Ok(token)
    }

    /// Enqueues `msg` under `token` and blocks until its response arrives or
    /// `timeout` (clamped to 10s-60s) elapses (spec §4.7:
    /// `sync_request(token, …)`).
    pub async fn sync_request(
        &self,
        token: u32,
        msg: ModbusMessage,
        timeout: Option<Duration>,
    ) -> Result<ModbusMessage, ErrorKind> {
        let patience = timeout
            .unwrap_or(self.default_sync_timeout)
            .clamp(MIN_SYNC_TIMEOUT, MAX_SYNC_TIMEOUT);

        let rx = self.sync_map.register(token).await;
        self.queue.try_push(RequestEntry::new(token, msg).sync()).await?;
        self.counters.record_admission();

        match tokio::time::timeout(patience, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ErrorKind::Undefined),
            Err(_) => {
                self.sync_map.cancel(token).await;
                Err(ErrorKind::Timeout)
            }
        }
    }

    pub async fn read_coils(&self, token: u32, server_id: u8, address: u16, quantity: u16, handler: Option<ResponseHandler>) -> Result<(), ErrorKind> {
        Self::check_quantity(quantity, MIN_QUANTITY, MAX_COIL_QUANTITY)?;
        self.add_request(token, Self::read_request(server_id, 0x01, address, quantity), handler).await
    }

    pub async fn read_discrete_inputs(&self, token: u32, server_id: u8, address: u16, quantity: u16, handler: Option<ResponseHandler>) -> Result<(), ErrorKind> {
        Self::check_quantity(quantity, MIN_QUANTITY, MAX_COIL_QUANTITY)?;
        self.add_request(token, Self::read_request(server_id, 0x02, address, quantity), handler).await
    }

    pub async fn read_holding_registers(&self, token: u32, server_id: u8, address: u16, quantity: u16, handler: Option<ResponseHandler>) -> Result<(), ErrorKind> {
        Self::check_quantity(quantity, MIN_QUANTITY, MAX_REGISTER_READ_QUANTITY)?;
        self.add_request(token, Self::read_request(server_id, 0x03, address, quantity), handler).await
    }

    pub async fn read_input_registers(&self, token: u32, server_id: u8, address: u16, quantity: u16, handler: Option<ResponseHandler>) -> Result<(), ErrorKind> {
        Self::check_quantity(quantity, MIN_QUANTITY, MAX_REGISTER_READ_QUANTITY)?;
        self.add_request(token, Self::read_request(server_id, 0x04, address, quantity), handler).await
    }

    pub async fn write_single_coil(&self, token: u32, server_id: u8, address: u16, value: bool, handler: Option<ResponseHandler>) -> Result<(), ErrorKind> {
        let mut msg = ModbusMessage::empty();
        msg.push_u8(server_id);
        msg.push_u8(0x05);
        msg.push_u16(address);
        msg.push_u16(if value { 0xFF00 } else { 0x0000 });
        self.add_request(token, msg, handler).await
    }

    pub async fn write_single_register(&self, token: u32, server_id: u8, address: u16, value: u16, handler: Option<ResponseHandler>) -> Result<(), ErrorKind> {
        let mut msg = ModbusMessage::empty();
        msg.push_u8(server_id);
        msg.push_u8(0x06);
        msg.push_u16(address);
        msg.push_u16(value);
        self.add_request(token, msg, handler).await
    }

    pub async fn write_multiple_coils(&self, token: u32, server_id: u8, address: u16, values: &[bool], handler: Option<ResponseHandler>) -> Result<(), ErrorKind> {
        Self::check_quantity(values.len() as u16, MIN_QUANTITY, MAX_WRITE_COIL_QUANTITY)?;

        let byte_count = (values.len() + 7) / 8;
        let mut packed = vec![0u8; byte_count];
        for (i, &bit) in values.iter().enumerate() {
            if bit {
                packed[i / 8] |= 1 << (i % 8);
            }
        }

        let mut msg = ModbusMessage::empty();
        msg.push_u8(server_id);
        msg.push_u8(0x0F);
        msg.push_u16(address);
        msg.push_u16(values.len() as u16);
        msg.push_u8(byte_count as u8);
        msg.push_bytes(&packed);
        self.add_request(token, msg, handler).await
    }

    pub async fn write_multiple_registers(&self, token: u32, server_id: u8, address: u16, values: &[u16], handler: Option<ResponseHandler>) -> Result<(), ErrorKind> {
        Self::check_quantity(values.len() as u16, MIN_QUANTITY, MAX_REGISTER_WRITE_QUANTITY)?;

        let mut msg = ModbusMessage::empty();
        msg.push_u8(server_id);
        msg.push_u8(0x10);
        msg.push_u16(address);
        msg.push_u16(values.len() as u16);
        msg.push_u8((values.len() * 2) as u8);
        for value in values {
            msg.push_u16(*value);
        }
        self.add_request(token, msg, handler).await
    }

    /// FC 0x16 — mask write register: `result = (current & and_mask) | (or_value & !and_mask)`,
    /// applied server-side to a single holding register.
    pub async fn mask_write_register(
        &self,
        token: u32,
        server_id: u8,
        address: u16,
        and_mask: u16,
        or_mask: u16,
        handler: Option<ResponseHandler>,
    ) -> Result<(), ErrorKind> {
        let mut msg = ModbusMessage::empty();
        msg.push_u8(server_id);
        msg.push_u8(0x16);
        msg.push_u16(address);
        msg.push_u16(and_mask);
        msg.push_u16(or_mask);
        self.add_request(token, msg, handler).await
    }

    /// FC 0x17 — read/write multiple registers in a single transaction: the
    /// write is applied before the read, per the Modbus standard.
    #[allow(clippy::too_many_arguments)]
    pub async fn read_write_multiple_registers(
        &self,
        token: u32,
        server_id: u8,
        read_address: u16,
        read_quantity: u16,
        write_address: u16,
        write_values: &[u16],
        handler: Option<ResponseHandler>,
    ) -> Result<(), ErrorKind> {
        Self::check_quantity(read_quantity, MIN_QUANTITY, MAX_REGISTER_READ_QUANTITY)?;
        Self::check_quantity(write_values.len() as u16, MIN_QUANTITY, MAX_RW_WRITE_QUANTITY)?;

        let mut msg = ModbusMessage::empty();
        msg.push_u8(server_id);
        msg.push_u8(0x17);
        msg.push_u16(read_address);
        msg.push_u16(read_quantity);
        msg.push_u16(write_address);
        msg.push_u16(write_values.len() as u16);
        msg.push_u8((write_values.len() * 2) as u8);
        for value in write_values {
            msg.push_u16(*value);
        }
        self.add_request(token, msg, handler).await
    }

    /// FC 0x2B/0x0E — read device identification (Modbus encapsulated
    /// interface, MEI type 14). `category` selects basic/regular/extended
    /// device-id objects; `object_id` is the first object requested.
    pub async fn read_device_identification(
        &self,
        token: u32,
        server_id: u8,
        category: u8,
        object_id: u8,
        handler: Option<ResponseHandler>,
    ) -> Result<(), ErrorKind> {
        let mut msg = ModbusMessage::empty();
        msg.push_u8(server_id);
        msg.push_u8(0x2B);
        msg.push_u8(0x0E);
        msg.push_u8(category);
        msg.push_u8(object_id);
        self.add_request(token, msg, handler).await
    }

    fn read_request(server_id: u8, function_code: u8, address: u16, quantity: u16) -> ModbusMessage {
        let mut msg = ModbusMessage::empty();
        msg.push_u8(server_id);
        msg.push_u8(function_code);
        msg.push_u16(address);
        msg.push_u16(quantity);
        msg
    }

    fn check_quantity(quantity: u16, min: u16, max: u16) -> Result<(), ErrorKind> {
        if quantity == 0 {
            return Err(ErrorKind::ParameterCountError);
        }
        if quantity < min || quantity > max {
            return Err(ErrorKind::ParameterLimitError);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::transport::InMemoryStream;

    fn rtu_client(stream: InMemoryStream) -> ModbusClient {
        let client = ModbusClient::spawn(
            TransportKind::Rtu,
            &ClientConfig::default(),
            Box::new(stream),
            Arc::new(RtuFramer::new()),
            None,
            Some(Arc::new(AtomicBool::new(false))),
            Some(Arc::new(AtomicBool::new(false))),
        );
        // Keep unanswered requests in boundary/rejection tests from dragging
        // the suite out to the 2s production default.
        client.set_timeout(Duration::from_millis(100), None);
        client
    }

    fn read_holding_registers_request() -> ModbusMessage {
        let mut msg = ModbusMessage::empty();
        msg.push_u8(0x01);
        msg.push_u8(0x03);
        msg.push_u16(0x0000);
        msg.push_u16(0x0002);
        msg
    }

    fn tcp_client(stream: InMemoryStream) -> ModbusClient {
        let client = ModbusClient::spawn(
            TransportKind::Tcp,
            &ClientConfig::default(),
            Box::new(stream),
            Arc::new(TcpFramer::new()),
            None,
            None,
            None,
        );
        client.set_timeout(Duration::from_millis(100), Some(Duration::ZERO));
        client
    }

    #[tokio::test]
    async fn s1_rtu_read_holding_registers_happy_path() {
        let (client_io, mut server_io) = tokio::io::duplex(256);
        let client = rtu_client(InMemoryStream::new(client_io));

        let server = tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let n = server_io.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], &[0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B]);
            server_io
                .write_all(&[0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x14, 0x5A, 0x3D])
                .await
                .unwrap();
        });

        let response = client
            .sync_request(0x11, read_holding_registers_request(), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        server.await.unwrap();
        assert_eq!(response.size(), 7);
        assert_eq!(response.get_error(), ErrorKind::Success);
        assert_eq!(&response.data()[3..], &[0x00, 0x0A, 0x00, 0x14]);
        assert_eq!(client.get_error_count(), 0);

        client.stop().await;
    }

    #[tokio::test]
    async fn s2_rtu_exception_response_increments_error_count() {
        let (client_io, mut server_io) = tokio::io::duplex(256);
        let client = rtu_client(InMemoryStream::new(client_io));

        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let _ = server_io.read(&mut buf).await.unwrap();
            server_io.write_all(&[0x01, 0x83, 0x02, 0xC0, 0xF1]).await.unwrap();
        });

        let response = client
            .sync_request(0x12, read_holding_registers_request(), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        assert_eq!(response.get_error(), ErrorKind::Exception(0x02));
        assert_eq!(client.get_error_count(), 1);

        client.stop().await;
    }

    #[tokio::test]
    async fn s3_rtu_crc_error_surfaces_as_crc_error() {
        let (client_io, mut server_io) = tokio::io::duplex(256);
        let client = rtu_client(InMemoryStream::new(client_io));

        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let _ = server_io.read(&mut buf).await.unwrap();
            server_io
                .write_all(&[0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x14, 0x00, 0x00])
                .await
                .unwrap();
        });

        let response = client
            .sync_request(0x13, read_holding_registers_request(), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        assert_eq!(response.get_error(), ErrorKind::CrcError);
        assert_eq!(client.get_error_count(), 1);

        client.stop().await;
    }

    #[tokio::test]
    async fn s4_tcp_transaction_id_mismatch() {
        let (client_io, mut server_io) = tokio::io::duplex(256);
        let client = tcp_client(InMemoryStream::new(client_io));

        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let _ = server_io.read(&mut buf).await.unwrap();
            // Client assigned tid=0x0001; reply with tid=0x0002 instead.
            server_io
                .write_all(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x09, 0x01, 0x03, 0x04, 0x00, 0x0A, 0x00, 0x14, 0x5A, 0x3D])
                .await
                .unwrap();
        });

        let response = client
            .sync_request(0x01, read_holding_registers_request(), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        assert_eq!(response.get_error(), ErrorKind::TcpHeadMismatch);
        assert_eq!(client.get_error_count(), 1);

        client.stop().await;
    }

    #[tokio::test]
    async fn s6_broadcast_transmits_without_waiting_for_a_reply() {
        let (client_io, mut server_io) = tokio::io::duplex(256);
        let client = rtu_client(InMemoryStream::new(client_io));

        let server = tokio::spawn(async move {
            let mut buf = [0u8; 256];
            let n = server_io.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], &[0x00, 0x06, 0x00, 0x01, 0x00, 0x2A, 0x58, 0x04]);
        });

        let result = client.add_broadcast_message(&[0x06, 0x00, 0x01, 0x00, 0x2A]).await;
        assert!(result.is_ok());

        server.await.unwrap();
        assert_eq!(client.get_message_count(), 1);
        assert_eq!(client.get_error_count(), 0);

        client.stop().await;
    }

    #[tokio::test]
    async fn s5_queue_overflow_admits_to_capacity_then_rejects() {
        let (client_io, _server_io) = tokio::io::duplex(256);
        let mut config = ClientConfig::default();
        config.queue_capacity = 2;

        let client = ModbusClient::spawn(
            TransportKind::Tcp,
            &config,
            Box::new(InMemoryStream::new(client_io)),
            Arc::new(TcpFramer::new()),
            None,
            None,
            None,
        );

        assert!(client.add_request(1, read_holding_registers_request(), None).await.is_ok());
        assert!(client.add_request(2, read_holding_registers_request(), None).await.is_ok());
        assert_eq!(
            client.add_request(3, read_holding_registers_request(), None).await,
            Err(ErrorKind::RequestQueueFull)
        );
        assert_eq!(client.get_message_count(), 2);

        client.stop().await;
    }

    #[tokio::test]
    async fn read_quantity_zero_is_parameter_count_error() {
        let (client_io, _server_io) = tokio::io::duplex(256);
        let client = rtu_client(InMemoryStream::new(client_io));

        assert_eq!(
            client.read_holding_registers(1, 0x01, 0, 0, None).await,
            Err(ErrorKind::ParameterCountError)
        );

        client.stop().await;
    }

    #[tokio::test]
    async fn read_register_quantity_at_and_over_the_ceiling() {
        let (client_io, _server_io) = tokio::io::duplex(256);
        let client = rtu_client(InMemoryStream::new(client_io));

        assert!(client
            .read_holding_registers(1, 0x01, 0, MAX_REGISTER_READ_QUANTITY, None)
            .await
            .is_ok());
        assert_eq!(
            client
                .read_holding_registers(2, 0x01, 0, MAX_REGISTER_READ_QUANTITY + 1, None)
                .await,
            Err(ErrorKind::ParameterLimitError)
        );

        client.stop().await;
    }

    #[tokio::test]
    async fn coil_quantity_at_and_over_the_ceiling() {
        let (client_io, _server_io) = tokio::io::duplex(256);
        let client = rtu_client(InMemoryStream::new(client_io));

        assert!(client.read_coils(1, 0x01, 0, MAX_COIL_QUANTITY, None).await.is_ok());
        assert_eq!(
            client.read_coils(2, 0x01, 0, MAX_COIL_QUANTITY + 1, None).await,
            Err(ErrorKind::ParameterLimitError)
        );

        client.stop().await;
    }

    #[tokio::test]
    async fn broadcast_data_boundary_at_max_pdu_len() {
        let (client_io, _server_io) = tokio::io::duplex(256);
        let client = rtu_client(InMemoryStream::new(client_io));

        let max_data = vec![0x10u8; crate::message::MAX_PDU_LEN];
        assert!(client.add_broadcast_message(&max_data).await.is_ok());

        let too_long = vec![0x10u8; crate::message::MAX_PDU_LEN + 1];
        assert_eq!(
            client.add_broadcast_message(&too_long).await,
            Err(ErrorKind::ParameterCountError)
        );

        assert_eq!(
            client.add_broadcast_message(&[]).await,
            Err(ErrorKind::ParameterCountError)
        );

        client.stop().await;
    }

    #[tokio::test]
    async fn broadcast_rejected_on_a_tcp_client() {
        let (client_io, _server_io) = tokio::io::duplex(256);
        let client = ModbusClient::spawn(
            TransportKind::Tcp,
            &ClientConfig::default(),
            Box::new(InMemoryStream::new(client_io)),
            Arc::new(TcpFramer::new()),
            None,
            None,
            None,
        );

        assert_eq!(
            client.add_broadcast_message(&[0x06, 0x00, 0x01, 0x00, 0x2A]).await,
            Err(ErrorKind::BroadcastError)
        );

        client.stop().await;
    }
}
