/// Closed taxonomy of outcomes a completed request can carry.
///
/// `Success` and `Exception` come from the wire (genuine Modbus replies);
/// everything else is synthesized by the queue/worker/framer when the
/// transport or correlation layer fails before a real reply — or never
/// produces one. A [`crate::ModbusMessage`] always carries exactly one of
/// these via [`crate::ModbusMessage::get_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No error; the response is a genuine, correlated reply.
    Success,
    /// Modbus exception response from the server, exception code 0x01-0x0B verbatim.
    Exception(u8),
    Timeout,
    InvalidServer,
    CrcError,
    FcMismatch,
    ServerIdMismatch,
    PacketLengthError,
    ParameterCountError,
    ParameterLimitError,
    RequestQueueFull,
    IllegalIpOrPort,
    IpConnectionFailed,
    TcpHeadMismatch,
    EmptyMessage,
    AsciiFrameErr,
    AsciiCrcErr,
    AsciiInvalidChar,
    BroadcastError,
    QueueCleared,
    Undefined,
}

impl ErrorKind {
    /// Encodes this kind as the single byte stored in a synthetic error
    /// response's payload (spec §7's code table).
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::Exception(code) => code,
            Self::Timeout => 0xE0,
            Self::InvalidServer => 0xE1,
            Self::CrcError => 0xE2,
            Self::FcMismatch => 0xE3,
            Self::ServerIdMismatch => 0xE4,
            Self::PacketLengthError => 0xE5,
            Self::ParameterCountError => 0xE6,
            Self::ParameterLimitError => 0xE7,
            Self::RequestQueueFull => 0xE8,
            Self::IllegalIpOrPort => 0xE9,
            Self::IpConnectionFailed => 0xEA,
            Self::TcpHeadMismatch => 0xEB,
            Self::EmptyMessage => 0xEC,
            Self::AsciiFrameErr => 0xED,
            Self::AsciiCrcErr => 0xEE,
            Self::AsciiInvalidChar => 0xEF,
            Self::BroadcastError => 0xF0,
            Self::QueueCleared => 0xF1,
            Self::Undefined => 0xFF,
        }
    }

    /// Inverse of [`Self::to_u8`]. Codes 0x01-0x0B map to `Exception`;
    /// anything not named in the table maps to `Undefined`.
    pub fn from_u8(code: u8) -> Self {
        match code {
            0x00 => Self::Success,
            0x01..=0x0B => Self::Exception(code),
            0xE0 => Self::Timeout,
            0xE1 => Self::InvalidServer,
            0xE2 => Self::CrcError,
            0xE3 => Self::FcMismatch,
            0xE4 => Self::ServerIdMismatch,
            0xE5 => Self::PacketLengthError,
            0xE6 => Self::ParameterCountError,
            0xE7 => Self::ParameterLimitError,
            0xE8 => Self::RequestQueueFull,
            0xE9 => Self::IllegalIpOrPort,
            0xEA => Self::IpConnectionFailed,
            0xEB => Self::TcpHeadMismatch,
            0xEC => Self::EmptyMessage,
            0xED => Self::AsciiFrameErr,
            0xEE => Self::AsciiCrcErr,
            0xEF => Self::AsciiInvalidChar,
            0xF0 => Self::BroadcastError,
            0xF1 => Self::QueueCleared,
            _ => Self::Undefined,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Exception(code) => write!(f, "Modbus exception 0x{code:02X}"),
            Self::Timeout => write!(f, "timeout waiting for response"),
            Self::InvalidServer => write!(f, "invalid server id"),
            Self::CrcError => write!(f, "CRC check failed"),
            Self::FcMismatch => write!(f, "function code mismatch"),
            Self::ServerIdMismatch => write!(f, "server id mismatch"),
            Self::PacketLengthError => write!(f, "packet length error"),
            Self::ParameterCountError => write!(f, "wrong parameter count"),
            Self::ParameterLimitError => write!(f, "parameter out of range"),
            Self::RequestQueueFull => write!(f, "request queue full"),
            Self::IllegalIpOrPort => write!(f, "illegal IP address or port"),
            Self::IpConnectionFailed => write!(f, "TCP connection failed"),
            Self::TcpHeadMismatch => write!(f, "MBAP header mismatch"),
            Self::EmptyMessage => write!(f, "empty message"),
            Self::AsciiFrameErr => write!(f, "ASCII frame error"),
            Self::AsciiCrcErr => write!(f, "ASCII LRC mismatch"),
            Self::AsciiInvalidChar => write!(f, "invalid ASCII character"),
            Self::BroadcastError => write!(f, "broadcast error"),
            Self::QueueCleared => write!(f, "queue cleared"),
            Self::Undefined => write!(f, "undefined error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_named_code() {
        let codes = [
            0x00, 0x01, 0x02, 0x0B, 0xE0, 0xE1, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9,
            0xEA, 0xEB, 0xEC, 0xED, 0xEE, 0xEF, 0xF0, 0xF1, 0xFF,
        ];
        for code in codes {
            assert_eq!(ErrorKind::from_u8(code).to_u8(), code);
        }
    }

    #[test]
    fn unknown_code_is_undefined() {
        assert_eq!(ErrorKind::from_u8(0xD0), ErrorKind::Undefined);
    }
}
