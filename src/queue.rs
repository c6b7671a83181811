use std::collections::VecDeque;

use tokio::sync::Mutex;
use tracing::warn;

use crate::errors::ErrorKind;
use crate::request::RequestEntry;

/// Default bound on outstanding requests (spec §4.3/§6).
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded FIFO of outstanding requests, mutex-guarded so push/pop/front/
/// clear_all are mutually exclusive, matching the teacher's pattern of a
/// single `tokio::sync::Mutex` around a `HashMap`/`VecDeque` of shared state
/// (`ConnectionManager::stats`, `response_times`).
pub struct RequestQueue {
    capacity: usize,
    entries: Mutex<VecDeque<RequestEntry>>,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Admits `entry` unless the queue is already at capacity.
    pub async fn try_push(&self, entry: RequestEntry) -> Result<(), ErrorKind> {
        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity {
            return Err(ErrorKind::RequestQueueFull);
        }
        entries.push_back(entry);
        Ok(())
    }

    pub async fn pop_front(&self) -> Option<RequestEntry> {
        self.entries.lock().await.pop_front()
    }

    pub async fn size(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drains every queued entry, synthesizing `reason` as each one's
    /// outcome and invoking its handler (if any) before discarding it — so
    /// that no awaiting caller or blocked sync waiter is left hanging after
    /// a teardown or `clear_queue()` (spec §4.3/§4.5/§5).
    ///
    /// Unlike the source this is modeled on, a missing `response_handler`
    /// is simply skipped rather than invoked: the spec's open question in
    /// §9 calls this out as a bug to fix, not behavior to preserve.
    pub async fn clear_all(&self, reason: ErrorKind, sync_map: &crate::sync_map::SyncResponseMap) {
        let mut drained: VecDeque<RequestEntry> = {
            let mut entries = self.entries.lock().await;
            std::mem::take(&mut *entries)
        };

        while let Some(entry) = drained.pop_front() {
            let mut response = entry.msg.clone();
            response.set_error(entry.msg.get_server_id(), entry.msg.get_function_code(), reason);

            if entry.is_sync {
                sync_map.publish(entry.token, response).await;
            } else if let Some(handler) = entry.response_handler {
                handler(response, entry.token);
            } else {
                warn!(token = entry.token, %reason, "dropping cleared request with no handler");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ModbusMessage;

    #[tokio::test]
    async fn admits_up_to_capacity_then_rejects() {
        let queue = RequestQueue::new(2);
        let msg = ModbusMessage::from_bytes(vec![0x01, 0x03]);

        assert!(queue
            .try_push(RequestEntry::new(1, msg.clone()))
            .await
            .is_ok());
        assert!(queue
            .try_push(RequestEntry::new(2, msg.clone()))
            .await
            .is_ok());
        assert_eq!(
            queue.try_push(RequestEntry::new(3, msg)).await,
            Err(ErrorKind::RequestQueueFull)
        );
        assert_eq!(queue.size().await, 2);
    }

    #[tokio::test]
    async fn pop_front_is_fifo() {
        let queue = RequestQueue::new(10);
        let msg = ModbusMessage::from_bytes(vec![0x01, 0x03]);
        queue.try_push(RequestEntry::new(1, msg.clone())).await.unwrap();
        queue.try_push(RequestEntry::new(2, msg)).await.unwrap();

        assert_eq!(queue.pop_front().await.unwrap().token, 1);
        assert_eq!(queue.pop_front().await.unwrap().token, 2);
        assert!(queue.pop_front().await.is_none());
    }

    #[tokio::test]
    async fn clear_all_delivers_reason_to_every_pending_entry() {
        let queue = RequestQueue::new(10);
        let sync_map = crate::sync_map::SyncResponseMap::new();
        let msg = ModbusMessage::from_bytes(vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02]);

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let handler: crate::request::ResponseHandler = std::sync::Arc::new(move |resp, token| {
            seen2.lock().unwrap().push((token, resp.get_error()));
        });

        queue
            .try_push(RequestEntry::new(1, msg.clone()).with_handler(handler))
            .await
            .unwrap();

        let rx = sync_map.register(2).await;
        queue
            .try_push(RequestEntry::new(2, msg).sync())
            .await
            .unwrap();

        queue.clear_all(ErrorKind::QueueCleared, &sync_map).await;

        assert_eq!(queue.size().await, 0);
        assert_eq!(seen.lock().unwrap()[0], (1, ErrorKind::QueueCleared));
        let response = rx.await.unwrap();
        assert_eq!(response.get_error(), ErrorKind::QueueCleared);
    }
}
