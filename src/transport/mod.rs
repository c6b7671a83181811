mod memory;
mod serial;
mod tcp;

#[cfg(test)]
pub use memory::InMemoryStream;
pub use serial::SerialStream;
pub use tcp::TcpClientStream;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::TransportError;

/// Called before/after transmitting a frame on an RS-485 link so the caller
/// can toggle a transceiver's driver-enable line. `true` means "asserted"
/// (driving the bus); the callback receives `false` once the frame (and its
/// RTS hold time) has been sent, per spec §4.8.
pub type RtsCallback = Box<dyn Fn(bool) + Send + Sync>;

/// A duplex byte channel carrying already-framed Modbus ADUs: a serial
/// link, a TCP socket, or an in-memory pipe for tests. The worker owns one
/// of these per client and never talks to `serialport`/`tokio::net`
/// directly (spec §4.8's collaborator boundary).
#[async_trait]
pub trait ByteStream: Send {
    /// Writes `frame` in full, enforcing whatever inter-frame silence or
    /// RTS timing this link requires before the bytes go out.
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Reads until no more bytes arrive within `timeout`, returning
    /// whatever was accumulated. A zero-length result means the deadline
    /// elapsed with nothing received.
    async fn read_frame(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// Additional capability TCP transports expose: the worker opens a fresh
/// connection (or reuses one already open) per the spec's "connect before
/// each TCP transaction unless already connected" rule (spec §4.5 step 4).
#[async_trait]
pub trait TcpByteStream: ByteStream {
    async fn ensure_connected(&mut self) -> Result<(), TransportError>;
    fn is_connected(&self) -> bool;
}
