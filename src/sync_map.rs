use std::collections::HashMap;

use tokio::sync::{oneshot, Mutex};

use crate::message::ModbusMessage;

/// Token → response rendezvous for blocking callers.
///
/// Realized with one [`oneshot`] channel per in-flight sync request rather
/// than the source's shared map polled every ~10ms: `register` hands the
/// caller a receiver before the request is admitted, `publish` (called by
/// the worker) fires the matching sender. This is the idiomatic Tokio
/// realization of the "condition-variable/notify" mechanism the spec calls
/// for in §9 — no response is lost (a send into a channel no one is
/// listening to yet is impossible, since the receiver is created first) and
/// no waiter blocks indefinitely once paired with `tokio::time::timeout`.
pub struct SyncResponseMap {
    pending: Mutex<HashMap<u32, oneshot::Sender<ModbusMessage>>>,
}

impl SyncResponseMap {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `token` for a future response and returns the receiving
    /// end. Must be called before the request is admitted to the queue so
    /// the worker can never publish before anyone is listening.
    pub async fn register(&self, token: u32) -> oneshot::Receiver<ModbusMessage> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(token, tx);
        rx
    }

    /// Delivers `msg` to the waiter registered for `token`, if still
    /// present. A missing or already-fired entry is silently ignored — the
    /// waiter gave up (timed out) or was never registered, and either way
    /// there is nothing left to notify.
    pub async fn publish(&self, token: u32, msg: ModbusMessage) {
        if let Some(tx) = self.pending.lock().await.remove(&token) {
            let _ = tx.send(msg);
        }
    }

    /// Drops the registration for `token` without publishing, used when a
    /// sync waiter times out so the map doesn't accumulate stale senders.
    pub async fn cancel(&self, token: u32) {
        self.pending.lock().await.remove(&token);
    }
}

impl Default for SyncResponseMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[tokio::test]
    async fn publish_after_register_delivers_to_waiter() {
        let map = SyncResponseMap::new();
        let rx = map.register(42).await;

        let mut msg = ModbusMessage::empty();
        msg.set_error(0x01, 0x03, ErrorKind::Timeout);
        map.publish(42, msg.clone()).await;

        assert_eq!(rx.await.unwrap(), msg);
    }

    #[tokio::test]
    async fn publish_with_no_waiter_is_a_no_op() {
        let map = SyncResponseMap::new();
        map.publish(7, ModbusMessage::empty()).await;
    }

    #[tokio::test]
    async fn cancel_drops_registration_without_firing_receiver() {
        let map = SyncResponseMap::new();
        let rx = map.register(1).await;
        map.cancel(1).await;
        map.publish(1, ModbusMessage::empty()).await;
        assert!(rx.await.is_err());
    }
}
