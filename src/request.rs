use std::sync::Arc;

use crate::message::ModbusMessage;

/// Application callback invoked with the completed response and its token.
///
/// Handlers run on the worker task (see [`crate::worker::Worker`]); a
/// blocking handler stalls the whole queue, so callers are expected to keep
/// them non-blocking, exactly as the teacher's `spawn_task` expects futures
/// that don't hog the runtime.
pub type ResponseHandler = Arc<dyn Fn(ModbusMessage, u32) + Send + Sync + 'static>;

/// Error-only callback for the legacy `onData`/`onError` split.
pub type ErrorHandler = Arc<dyn Fn(crate::errors::ErrorKind, u32) + Send + Sync + 'static>;

/// The handler configuration a client holds — at most one of these shapes
/// is active at a time (spec §3's "Handlers" mutual exclusion).
#[derive(Clone, Default)]
pub enum Dispatch {
    #[default]
    None,
    Legacy {
        on_data: Option<ResponseHandler>,
        on_error: Option<ErrorHandler>,
    },
    Unified {
        on_response: ResponseHandler,
    },
}

/// One outstanding request, owned by the queue until the worker pops and
/// completes it.
pub struct RequestEntry {
    pub token: u32,
    pub msg: ModbusMessage,
    pub response_handler: Option<ResponseHandler>,
    pub is_sync: bool,
}

impl RequestEntry {
    pub fn new(token: u32, msg: ModbusMessage) -> Self {
        Self {
            token,
            msg,
            response_handler: None,
            is_sync: false,
        }
    }

    pub fn with_handler(mut self, handler: ResponseHandler) -> Self {
        self.response_handler = Some(handler);
        self
    }

    pub fn sync(mut self) -> Self {
        self.is_sync = true;
        self
    }

    /// `true` for an RTU broadcast: server id 0 and the broadcast token
    /// marker both present (spec §3/§4.5).
    pub fn is_broadcast(&self) -> bool {
        self.msg.get_server_id() == 0
            && self.token & crate::message::BROADCAST_TOKEN_MARKER
                == crate::message::BROADCAST_TOKEN_MARKER
    }
}
