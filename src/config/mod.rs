mod client;
mod logging;
mod rtu;
mod tcp;
mod types;

pub use client::Config as ClientConfig;
pub use logging::Config as LoggingConfig;
pub use rtu::Config as RtuConfig;
pub use tcp::Config as TcpConfig;
pub use types::{DataBits, Parity, RtsType, StopBits};
