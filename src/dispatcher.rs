use tokio::sync::Mutex;

use crate::message::ModbusMessage;
use crate::request::Dispatch;
use crate::sync_map::SyncResponseMap;

/// Routes a completed response to whichever of the request's or client's
/// handler shapes applies, per spec §4.6:
///
/// 1. a sync waiter registered for this token always wins — the blocking
///    caller is the only consumer of the result.
/// 2. otherwise, a per-request handler attached via `with_handler`.
/// 3. otherwise, the client-wide handler: the unified `onResponse` if set,
///    or the legacy `onData`/`onError` split routed by `get_error()`.
/// 4. if nothing is registered at all, the response is logged and dropped.
pub struct Dispatcher;

impl Dispatcher {
    pub async fn dispatch(
        sync_map: &SyncResponseMap,
        dispatch: &Mutex<Dispatch>,
        token: u32,
        is_sync: bool,
        per_request_handler: Option<crate::request::ResponseHandler>,
        response: ModbusMessage,
    ) {
        if is_sync {
            sync_map.publish(token, response).await;
            return;
        }

        if let Some(handler) = per_request_handler {
            handler(response, token);
            return;
        }

        match &*dispatch.lock().await {
            Dispatch::Unified { on_response } => on_response(response, token),
            Dispatch::Legacy { on_data, on_error } => {
                let error = response.get_error();
                if error.is_success() {
                    if let Some(on_data) = on_data {
                        on_data(response, token);
                    }
                } else if let Some(on_error) = on_error {
                    on_error(error, token);
                }
            }
            Dispatch::None => {
                tracing::warn!(token, "dropping response with no handler registered");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;
    use crate::errors::ErrorKind;

    #[tokio::test]
    async fn sync_waiter_takes_priority_over_everything_else() {
        let sync_map = SyncResponseMap::new();
        let rx = sync_map.register(1).await;
        let dispatch = Mutex::new(Dispatch::None);

        let mut msg = ModbusMessage::empty();
        msg.set_error(0x01, 0x03, ErrorKind::Timeout);

        Dispatcher::dispatch(&sync_map, &dispatch, 1, true, None, msg.clone()).await;
        assert_eq!(rx.await.unwrap(), msg);
    }

    #[tokio::test]
    async fn legacy_split_routes_success_to_on_data_and_error_to_on_error() {
        let sync_map = SyncResponseMap::new();
        let data_seen = Arc::new(StdMutex::new(Vec::new()));
        let error_seen = Arc::new(StdMutex::new(Vec::new()));

        let data_seen2 = data_seen.clone();
        let error_seen2 = error_seen.clone();
        let dispatch = Mutex::new(Dispatch::Legacy {
            on_data: Some(Arc::new(move |msg, token| data_seen2.lock().unwrap().push((token, msg)))),
            on_error: Some(Arc::new(move |kind, token| error_seen2.lock().unwrap().push((token, kind)))),
        });

        let ok = ModbusMessage::from_bytes(vec![0x01, 0x03, 0x02, 0x00, 0x01]);
        Dispatcher::dispatch(&sync_map, &dispatch, 1, false, None, ok.clone()).await;
        assert_eq!(data_seen.lock().unwrap()[0], (1, ok));

        let mut failed = ModbusMessage::empty();
        failed.set_error(0x01, 0x03, ErrorKind::Timeout);
        Dispatcher::dispatch(&sync_map, &dispatch, 2, false, None, failed).await;
        assert_eq!(error_seen.lock().unwrap()[0], (2, ErrorKind::Timeout));
    }
}
