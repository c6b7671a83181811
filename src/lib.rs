pub mod client;
pub mod config;
pub mod counters;
pub mod dispatcher;
pub mod errors;
pub mod framer;
pub mod logging;
pub mod message;
pub mod queue;
pub mod request;
pub mod sync_map;
pub mod transport;
mod utils;
pub mod worker;

pub use client::{ModbusClient, TransportKind};
pub use config::{ClientConfig, DataBits, LoggingConfig, Parity, RtsType, RtuConfig, StopBits, TcpConfig};
pub use errors::{ConfigValidationError, ErrorKind, InitializationError, IoOperation, RtsError, TransportError};
pub use framer::{AsciiFramer, Framer, RtuFramer, TcpFramer};
pub use logging::setup_logging;
pub use message::ModbusMessage;
pub use request::{Dispatch, ErrorHandler, ResponseHandler};
