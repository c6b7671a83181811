use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use crate::errors::{IoOperation, TransportError};

use super::ByteStream;

/// In-memory byte stream over a [`tokio::io::duplex`] pipe, standing in for
/// a real serial port or socket in tests — grounded on the teacher's own
/// `handle_client` tests, which drive the relay's TCP side the same way.
pub struct InMemoryStream {
    io: DuplexStream,
}

impl InMemoryStream {
    pub fn new(io: DuplexStream) -> Self {
        Self { io }
    }
}

#[async_trait]
impl ByteStream for InMemoryStream {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.io.write_all(frame).await.map_err(|source| TransportError::Io {
            operation: IoOperation::Write,
            details: "writing to in-memory stream".to_string(),
            source,
        })
    }

    async fn read_frame(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut buf = [0u8; 256];
        match tokio::time::timeout(timeout, self.io.read(&mut buf)).await {
            Ok(Ok(0)) => Ok(Vec::new()),
            Ok(Ok(n)) => Ok(buf[..n].to_vec()),
            Ok(Err(source)) => Err(TransportError::Io {
                operation: IoOperation::Read,
                details: "reading from in-memory stream".to_string(),
                source,
            }),
            Err(_) => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_on_one_end_are_read_on_the_other() {
        let (a, b) = tokio::io::duplex(64);
        let mut left = InMemoryStream::new(a);
        let mut right = InMemoryStream::new(b);

        left.write_frame(&[0x01, 0x03, 0x00, 0x00]).await.unwrap();
        let received = right.read_frame(Duration::from_millis(200)).await.unwrap();
        assert_eq!(received, vec![0x01, 0x03, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn read_frame_times_out_with_nothing_written() {
        let (_a, b) = tokio::io::duplex(64);
        let mut right = InMemoryStream::new(b);
        let received = right.read_frame(Duration::from_millis(20)).await.unwrap();
        assert!(received.is_empty());
    }
}
