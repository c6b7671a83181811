use crate::errors::ErrorKind;

/// Broadcast requests (RTU only) tag their token with this marker in the
/// high byte so the worker can short-circuit the receive step (spec §3).
pub const BROADCAST_TOKEN_MARKER: u32 = 0xBC00_0000;

/// Maximum PDU length per the Modbus spec (ADU header occupies the rest of
/// the 256-byte RTU frame budget).
pub const MAX_PDU_LEN: usize = 253;

/// A Modbus ADU payload, minus any transport framing (no CRC, no MBAP).
///
/// Byte 0 is the unit/server address, byte 1 is the function code (with the
/// top bit set on an exception response), the rest is the PDU body. A
/// message shorter than two bytes is considered "empty" / absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModbusMessage {
    bytes: Vec<u8>,
}

impl ModbusMessage {
    pub fn empty() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn push_u8(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Appends a big-endian `u16` — the wire mandates big-endian for every
    /// multi-byte quantity (spec §4.1).
    pub fn push_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn push_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() < 2
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn get_server_id(&self) -> u8 {
        self.bytes.first().copied().unwrap_or(0)
    }

    pub fn get_function_code(&self) -> u8 {
        self.bytes.get(1).copied().unwrap_or(0)
    }

    /// `true` when the top bit of the function code is set, i.e. this is a
    /// genuine Modbus exception response from the server.
    pub fn is_exception(&self) -> bool {
        self.get_function_code() & 0x80 != 0
    }

    /// Overwrites the message with a synthetic 3-byte error response
    /// `(server_id, fc | 0x80, code)`. Normalizing the exception bit on
    /// every synthetic error, library or genuine, is the resolution of the
    /// open question in spec §9: `get_error` then uniformly recovers `code`
    /// by checking bit 7 rather than guessing at the origin of the message.
    pub fn set_error(&mut self, server_id: u8, function_code: u8, kind: ErrorKind) {
        self.bytes.clear();
        self.bytes.push(server_id);
        self.bytes.push(function_code | 0x80);
        self.bytes.push(kind.to_u8());
    }

    /// Recovers the error kind carried by this message: `Success` unless
    /// this is a 3-byte exception-shaped frame (either a genuine Modbus
    /// exception or a synthetic transport failure — they're indistinguishable
    /// on the wire by design, see [`Self::set_error`]).
    pub fn get_error(&self) -> ErrorKind {
        if self.bytes.len() == 3 && self.bytes[1] & 0x80 != 0 {
            ErrorKind::from_u8(self.bytes[2])
        } else {
            ErrorKind::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_has_zero_length_and_is_empty() {
        let msg = ModbusMessage::empty();
        assert_eq!(msg.size(), 0);
        assert!(msg.is_empty());
    }

    #[test]
    fn present_message_exposes_address_and_function_code() {
        let msg = ModbusMessage::from_bytes(vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x02]);
        assert!(!msg.is_empty());
        assert_eq!(msg.get_server_id(), 0x01);
        assert_eq!(msg.get_function_code(), 0x03);
        assert_eq!(msg.get_error(), ErrorKind::Success);
    }

    #[test]
    fn set_error_normalizes_exception_bit_and_round_trips() {
        let mut msg = ModbusMessage::empty();
        msg.set_error(0x01, 0x03, ErrorKind::Timeout);
        assert_eq!(msg.size(), 3);
        assert!(msg.is_exception());
        assert_eq!(msg.get_error(), ErrorKind::Timeout);
    }

    #[test]
    fn genuine_exception_response_recovers_exception_code() {
        let msg = ModbusMessage::from_bytes(vec![0x01, 0x83, 0x02]);
        assert_eq!(msg.get_error(), ErrorKind::Exception(0x02));
    }

    #[test]
    fn push_helpers_are_big_endian() {
        let mut msg = ModbusMessage::empty();
        msg.push_u8(0x01);
        msg.push_u8(0x03);
        msg.push_u16(0x0000);
        msg.push_u16(0x0002);
        assert_eq!(msg.data(), &[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]);
    }
}
