mod ascii;
mod rtu;
mod tcp;

pub use ascii::AsciiFramer;
pub use rtu::{calc_crc16, guess_response_size, RtuFramer};
pub use tcp::TcpFramer;

use crate::errors::ErrorKind;
use crate::message::ModbusMessage;

/// Result of decoding a byte frame back into an ADU: the message itself,
/// plus the TCP transaction id when the underlying transport carries one.
/// RTU and ASCII frames have no transaction id of their own — correlation
/// on those transports happens purely through server id/function code
/// matching in the worker (spec §4.5).
pub struct DecodedFrame {
    pub message: ModbusMessage,
    pub transaction_id: Option<u16>,
}

/// Wire-level encode/decode for one of the three transport framings (spec
/// §4.2). A framer never talks to a socket or a serial port itself — that's
/// the [`crate::transport`] layer's job.
pub trait Framer: Send + Sync {
    /// Wraps `msg` in this framing's delimiters/checksum, assigning
    /// `transaction_id` where applicable (TCP only).
    fn encode(&self, msg: &ModbusMessage, transaction_id: Option<u16>) -> Vec<u8>;

    /// Unwraps a complete frame already extracted from the transport's byte
    /// stream, verifying its checksum/header along the way.
    fn decode(&self, frame: &[u8]) -> Result<DecodedFrame, ErrorKind>;
}
