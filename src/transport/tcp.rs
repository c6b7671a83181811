use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::TcpConfig;
use crate::errors::{IoOperation, TransportError};

use super::{ByteStream, TcpByteStream};

/// Modbus TCP byte stream over `tokio::net::TcpStream`, connecting lazily
/// on first use and reconnecting whenever the target is changed via
/// `ModbusClient::set_target` or the socket drops — grounded on the
/// teacher's TCP accept/handle_client loop in `modbus_relay.rs`, inverted
/// from server to client role.
pub struct TcpClientStream {
    config: Arc<RwLock<TcpConfig>>,
    connected_target: Option<String>,
    socket: Option<TcpStream>,
}

impl TcpClientStream {
    pub fn new(config: Arc<RwLock<TcpConfig>>) -> Self {
        Self {
            config,
            connected_target: None,
            socket: None,
        }
    }
}

#[async_trait]
impl TcpByteStream for TcpClientStream {
    async fn ensure_connected(&mut self) -> Result<(), TransportError> {
        let config = self.config.read().await.clone();
        let target = config.target_description();

        if self.socket.is_some() && self.connected_target.as_deref() == Some(target.as_str()) {
            return Ok(());
        }

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| TransportError::Connect {
                addr: target.clone(),
                details: "connect timed out".to_string(),
            })?
            .map_err(|source| TransportError::Io {
                operation: IoOperation::Configure,
                details: format!("connecting to {target}"),
                source,
            })?;

        debug!(target = %target, "connected to Modbus TCP target");
        self.socket = Some(stream);
        self.connected_target = Some(target);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}

#[async_trait]
impl ByteStream for TcpClientStream {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.ensure_connected().await?;
        let socket = self.socket.as_mut().expect("just ensured connected");

        if let Err(source) = socket.write_all(frame).await {
            self.socket = None;
            return Err(TransportError::Io {
                operation: IoOperation::Write,
                details: "writing MBAP frame".to_string(),
                source,
            });
        }
        Ok(())
    }

    async fn read_frame(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let Some(socket) = self.socket.as_mut() else {
            return Ok(Vec::new());
        };

        let mut header = [0u8; 6];
        match tokio::time::timeout(timeout, socket.read_exact(&mut header)).await {
            Ok(Ok(_)) => {}
            Ok(Err(source)) => {
                self.socket = None;
                return Err(TransportError::Io {
                    operation: IoOperation::Read,
                    details: "reading MBAP header".to_string(),
                    source,
                });
            }
            Err(_) => return Ok(Vec::new()),
        }

        let length = u16::from_be_bytes([header[4], header[5]]) as usize;
        let mut body = vec![0u8; length];
        match tokio::time::timeout(timeout, socket.read_exact(&mut body)).await {
            Ok(Ok(_)) => {}
            Ok(Err(source)) => {
                self.socket = None;
                return Err(TransportError::Io {
                    operation: IoOperation::Read,
                    details: "reading MBAP body".to_string(),
                    source,
                });
            }
            Err(_) => return Ok(Vec::new()),
        }

        let mut frame = Vec::with_capacity(6 + length);
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}
