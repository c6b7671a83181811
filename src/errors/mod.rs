mod config;
mod init;
mod io_operation;
mod kind;
mod rts;
mod transport;

pub use config::ConfigValidationError;
pub use init::InitializationError;
pub use io_operation::IoOperation;
pub use kind::ErrorKind;
pub use rts::RtsError;
pub use transport::TransportError;
