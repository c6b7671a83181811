use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, trace, warn};

use crate::counters::Counters;
use crate::dispatcher::Dispatcher;
use crate::errors::ErrorKind;
use crate::framer::Framer;
use crate::message::ModbusMessage;
use crate::queue::RequestQueue;
use crate::request::{Dispatch, RequestEntry};
use crate::sync_map::SyncResponseMap;
use crate::transport::ByteStream;

/// How long the worker sleeps between empty queue polls before checking
/// again (spec §4.5 step 1's "nothing to do" branch).
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Single-consumer worker loop: dequeue, transmit, wait for a correlated
/// reply, dispatch. One worker owns exactly one transport and runs on its
/// own `tokio::task`, mirroring the teacher's per-connection task model in
/// `ModbusRelay::run` (there: one task per TCP client; here: one task per
/// `ModbusClient`).
pub struct Worker {
    queue: Arc<RequestQueue>,
    sync_map: Arc<SyncResponseMap>,
    counters: Arc<Counters>,
    framer: Arc<RwLock<Arc<dyn Framer>>>,
    stream: Box<dyn ByteStream>,
    dispatch: Arc<Mutex<Dispatch>>,
    response_timeout_ms: Arc<AtomicU64>,
    min_interval_ms: Arc<AtomicU64>,
    last_tx: Instant,
    is_tcp: bool,
    next_transaction_id: AtomicU16,
    stop_requested: Arc<AtomicBool>,
    clear_requested: Arc<AtomicBool>,
    stop_notify: Arc<Notify>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<RequestQueue>,
        sync_map: Arc<SyncResponseMap>,
        counters: Arc<Counters>,
        framer: Arc<RwLock<Arc<dyn Framer>>>,
        stream: Box<dyn ByteStream>,
        dispatch: Arc<Mutex<Dispatch>>,
        response_timeout_ms: Arc<AtomicU64>,
        min_interval_ms: Arc<AtomicU64>,
        is_tcp: bool,
        stop_requested: Arc<AtomicBool>,
        clear_requested: Arc<AtomicBool>,
        stop_notify: Arc<Notify>,
    ) -> Self {
        Self {
            queue,
            sync_map,
            counters,
            framer,
            stream,
            dispatch,
            response_timeout_ms,
            min_interval_ms,
            last_tx: Instant::now() - Duration::from_secs(3600),
            is_tcp,
            next_transaction_id: AtomicU16::new(1),
            stop_requested,
            clear_requested,
            stop_notify,
        }
    }

    /// Drives the loop until `stop()` is called on the owning client. Meant
    /// to be spawned with `tokio::spawn`.
    pub async fn run(mut self) {
        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                debug!("worker stopping");
                self.queue.clear_all(ErrorKind::QueueCleared, &self.sync_map).await;
                return;
            }

            if self.clear_requested.swap(false, Ordering::SeqCst) {
                self.queue.clear_all(ErrorKind::QueueCleared, &self.sync_map).await;
            }

            let Some(entry) = self.queue.pop_front().await else {
                tokio::select! {
                    _ = tokio::time::sleep(IDLE_POLL_INTERVAL) => {}
                    _ = self.stop_notify.notified() => {}
                }
                continue;
            };

            self.process(entry).await;
        }
    }

    async fn process(&mut self, entry: RequestEntry) {
        let token = entry.token;
        let is_broadcast = entry.is_broadcast();
        let server_id = entry.msg.get_server_id();
        let function_code = entry.msg.get_function_code();

        let framer = self.framer.read().await.clone();
        let transaction_id = self.is_tcp.then(|| self.next_transaction_id.fetch_add(1, Ordering::SeqCst));
        let wire = framer.encode(&entry.msg, transaction_id);

        let min_interval = Duration::from_millis(self.min_interval_ms.load(Ordering::SeqCst));
        let since_last_tx = self.last_tx.elapsed();
        if since_last_tx < min_interval {
            tokio::time::sleep(min_interval - since_last_tx).await;
        }
        self.last_tx = Instant::now();

        if let Err(err) = self.stream.write_frame(&wire).await {
            warn!(token, %err, "transmit failed");
            self.complete_with_error(entry, server_id, function_code, ErrorKind::IpConnectionFailed)
                .await;
            return;
        }

        if is_broadcast {
            trace!(token, "broadcast request sent, not waiting for a reply");
            self.complete_with_success(entry, ModbusMessage::empty()).await;
            return;
        }

        let response_timeout = Duration::from_millis(self.response_timeout_ms.load(Ordering::SeqCst));
        let raw = match self.stream.read_frame(response_timeout).await {
            Ok(raw) if raw.is_empty() => {
                self.complete_with_error(entry, server_id, function_code, ErrorKind::Timeout)
                    .await;
                return;
            }
            Ok(raw) => raw,
            Err(err) => {
                warn!(token, %err, "receive failed");
                self.complete_with_error(entry, server_id, function_code, ErrorKind::IpConnectionFailed)
                    .await;
                return;
            }
        };

        let decoded = match framer.decode(&raw) {
            Ok(decoded) => decoded,
            Err(kind) => {
                self.complete_with_error(entry, server_id, function_code, kind).await;
                return;
            }
        };

        if let Some(expected) = transaction_id {
            if decoded.transaction_id != Some(expected) {
                self.complete_with_error(entry, server_id, function_code, ErrorKind::TcpHeadMismatch)
                    .await;
                return;
            }
        }

        let response = decoded.message;
        if response.get_server_id() != server_id {
            self.complete_with_error(entry, server_id, function_code, ErrorKind::ServerIdMismatch)
                .await;
            return;
        }
        if response.get_function_code() & 0x7F != function_code & 0x7F {
            self.complete_with_error(entry, server_id, function_code, ErrorKind::FcMismatch)
                .await;
            return;
        }

        self.complete_with_success(entry, response).await;
    }

    async fn complete_with_success(&self, entry: RequestEntry, response: ModbusMessage) {
        Dispatcher::dispatch(
            &self.sync_map,
            &self.dispatch,
            entry.token,
            entry.is_sync,
            entry.response_handler,
            response,
        )
        .await;
    }

    async fn complete_with_error(
        &self,
        entry: RequestEntry,
        server_id: u8,
        function_code: u8,
        kind: ErrorKind,
    ) {
        self.counters.record_error();
        let mut response = ModbusMessage::empty();
        response.set_error(server_id, function_code, kind);
        Dispatcher::dispatch(
            &self.sync_map,
            &self.dispatch,
            entry.token,
            entry.is_sync,
            entry.response_handler,
            response,
        )
        .await;
    }
}
