use crate::errors::ErrorKind;
use crate::message::ModbusMessage;

use super::{DecodedFrame, Framer};

/// MBAP header framing for Modbus TCP: transaction id, protocol id (always
/// 0), length (unit id + PDU byte count), unit id, then the PDU — grounded
/// on the teacher's TCP-request handling in `modbus_relay.rs`, which builds
/// and parses this same header around an RTU-style ADU.
#[derive(Default)]
pub struct TcpFramer;

impl TcpFramer {
    pub fn new() -> Self {
        Self
    }
}

impl Framer for TcpFramer {
    fn encode(&self, msg: &ModbusMessage, transaction_id: Option<u16>) -> Vec<u8> {
        let tid = transaction_id.unwrap_or(0);
        let mut frame = Vec::with_capacity(6 + msg.size());
        frame.extend_from_slice(&tid.to_be_bytes());
        frame.extend_from_slice(&0u16.to_be_bytes());
        frame.extend_from_slice(&(msg.size() as u16).to_be_bytes());
        frame.extend_from_slice(msg.data());
        frame
    }

    fn decode(&self, frame: &[u8]) -> Result<DecodedFrame, ErrorKind> {
        if frame.len() < 8 {
            return Err(ErrorKind::PacketLengthError);
        }
        let transaction_id = u16::from_be_bytes([frame[0], frame[1]]);
        let protocol_id = u16::from_be_bytes([frame[2], frame[3]]);
        if protocol_id != 0 {
            return Err(ErrorKind::TcpHeadMismatch);
        }
        let length = u16::from_be_bytes([frame[4], frame[5]]) as usize;
        if frame.len() < 6 + length || length < 2 {
            return Err(ErrorKind::PacketLengthError);
        }
        let adu = &frame[6..6 + length];
        Ok(DecodedFrame {
            message: ModbusMessage::from_bytes(adu.to_vec()),
            transaction_id: Some(transaction_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_recovers_adu_and_transaction_id() {
        let framer = TcpFramer::new();
        let msg = ModbusMessage::from_bytes(vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]);

        let wire = framer.encode(&msg, Some(42));
        let decoded = framer.decode(&wire).unwrap();
        assert_eq!(decoded.message, msg);
        assert_eq!(decoded.transaction_id, Some(42));
    }

    #[test]
    fn decode_rejects_nonzero_protocol_id() {
        let framer = TcpFramer::new();
        let mut wire = framer.encode(&ModbusMessage::from_bytes(vec![0x01, 0x03]), Some(1));
        wire[3] = 0x01;
        assert_eq!(framer.decode(&wire), Err(ErrorKind::TcpHeadMismatch));
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let framer = TcpFramer::new();
        let wire = framer.encode(&ModbusMessage::from_bytes(vec![0x01, 0x03, 0x00, 0x00]), Some(1));
        assert_eq!(
            framer.decode(&wire[..wire.len() - 1]),
            Err(ErrorKind::PacketLengthError)
        );
    }
}
