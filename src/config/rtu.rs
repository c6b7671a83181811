use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::types::{DataBits, Parity, RtsType, StopBits};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub device: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,

    /// Flow control settings for the serial port.
    #[cfg(feature = "rts")]
    pub rts_type: RtsType,
    #[cfg(feature = "rts")]
    pub rts_delay_us: u64,

    /// Whether to flush the serial port after writing.
    pub flush_after_write: bool,

    /// Per-transaction timeout, covering silence wait, write, and read.
    #[serde(with = "humantime_serde")]
    pub transaction_timeout: Duration,

    /// Use Modbus ASCII framing instead of RTU on this link (spec §4.2).
    pub use_ascii: bool,

    /// Skip one leading `0x00` byte on every response before framing —
    /// some adapters prepend a stray null (spec §4.5 edge cases).
    pub skip_leading_zero: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: "/dev/ttyAMA0".to_string(),
            baud_rate: 9600,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            #[cfg(feature = "rts")]
            rts_type: RtsType::default(),
            #[cfg(feature = "rts")]
            rts_delay_us: 3500,
            flush_after_write: true,
            transaction_timeout: Duration::from_secs(2),
            use_ascii: false,
            skip_leading_zero: false,
        }
    }
}

impl Config {
    pub fn serial_port_info(&self) -> String {
        format!(
            "{} ({} baud, {} data bits, {} parity, {} stop bits)",
            self.device, self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }
}
