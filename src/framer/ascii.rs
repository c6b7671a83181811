use crate::errors::ErrorKind;
use crate::message::ModbusMessage;

use super::{DecodedFrame, Framer};

/// `:` start delimiter (0x3A) and CR LF end delimiter, per the Modbus ASCII
/// wire format.
const START: u8 = b':';
const CR: u8 = 0x0D;
const LF: u8 = 0x0A;

fn chr_to_hex(c: u8) -> Result<u8, ErrorKind> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(ErrorKind::AsciiInvalidChar),
    }
}

fn hex_to_chr(h: u8) -> u8 {
    if h < 10 {
        h + b'0'
    } else {
        h - 10 + b'A'
    }
}

/// Two's-complement LRC: the sum of all bytes, negated, truncated to a byte.
fn calc_lrc(data: &[u8]) -> u8 {
    let sum: i32 = data.iter().fold(0, |acc, &b| acc - i32::from(b));
    sum as u8
}

#[derive(Default)]
pub struct AsciiFramer;

impl AsciiFramer {
    pub fn new() -> Self {
        Self
    }
}

impl Framer for AsciiFramer {
    fn encode(&self, msg: &ModbusMessage, _transaction_id: Option<u16>) -> Vec<u8> {
        let data = msg.data();
        let lrc = calc_lrc(data);

        let mut frame = Vec::with_capacity(1 + data.len() * 2 + 2 + 2);
        frame.push(START);
        for &byte in data {
            frame.push(hex_to_chr(byte >> 4));
            frame.push(hex_to_chr(byte & 0x0F));
        }
        frame.push(hex_to_chr(lrc >> 4));
        frame.push(hex_to_chr(lrc & 0x0F));
        frame.push(CR);
        frame.push(LF);
        frame
    }

    fn decode(&self, frame: &[u8]) -> Result<DecodedFrame, ErrorKind> {
        if frame.len() < 1 + 2 + 2 + 2 || frame[0] != START {
            return Err(ErrorKind::AsciiFrameErr);
        }
        let end = frame.len();
        if frame[end - 2] != CR || frame[end - 1] != LF {
            return Err(ErrorKind::AsciiFrameErr);
        }

        let hex_chars = &frame[1..end - 2];
        if hex_chars.len() % 2 != 0 {
            return Err(ErrorKind::AsciiFrameErr);
        }

        let mut decoded = Vec::with_capacity(hex_chars.len() / 2);
        for pair in hex_chars.chunks_exact(2) {
            let hi = chr_to_hex(pair[0])?;
            let lo = chr_to_hex(pair[1])?;
            decoded.push(hi * 0x10 + lo);
        }

        let (adu, lrc_byte) = decoded
            .split_last()
            .ok_or(ErrorKind::AsciiFrameErr)
            .map(|(last, rest)| (rest, *last))?;

        if calc_lrc(adu) != lrc_byte {
            return Err(ErrorKind::AsciiCrcErr);
        }

        Ok(DecodedFrame {
            message: ModbusMessage::from_bytes(adu.to_vec()),
            transaction_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_recovers_the_adu() {
        let framer = AsciiFramer::new();
        let msg = ModbusMessage::from_bytes(vec![0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]);

        let wire = framer.encode(&msg, None);
        assert_eq!(wire[0], b':');
        assert_eq!(&wire[wire.len() - 2..], &[CR, LF]);

        let decoded = framer.decode(&wire).unwrap();
        assert_eq!(decoded.message, msg);
    }

    #[test]
    fn decode_rejects_missing_start_delimiter() {
        let framer = AsciiFramer::new();
        assert_eq!(
            framer.decode(b"0103\r\n"),
            Err(ErrorKind::AsciiFrameErr)
        );
    }

    #[test]
    fn decode_rejects_corrupted_lrc() {
        let framer = AsciiFramer::new();
        let mut wire = framer.encode(&ModbusMessage::from_bytes(vec![0x01, 0x03]), None);
        let lrc_hi = wire.len() - 4;
        wire[lrc_hi] = b'F';
        assert_eq!(framer.decode(&wire), Err(ErrorKind::AsciiCrcErr));
    }

    #[test]
    fn decode_rejects_non_hex_characters() {
        let framer = AsciiFramer::new();
        assert_eq!(
            framer.decode(b":ZZ00\r\n"),
            Err(ErrorKind::AsciiInvalidChar)
        );
    }
}
