//! Bluetooth HID report decoding
//!
//! Every message on the interrupt channel starts with a one-byte transaction
//! header: the high nibble is the transaction type, the low nibble the report
//! type. Only `DATA | INPUT` (0xA1) carries key state; for those the next
//! three bytes form a 24-bit big-endian key bitmask.
//!
//! ```text
//! byte 0     byte 1    byte 2    byte 3
//! [A | 1]    [23..16]  [15..8]   [7..0]
//! ```

use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Header byte plus three bitmask bytes
pub const MIN_REPORT_LEN: usize = 4;

/// Decode failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed report: {len} bytes, need at least {MIN_REPORT_LEN}")]
    Malformed { len: usize },
}

/// HID transaction type (header high nibble)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Handshake,
    HidControl,
    GetReport,
    SetReport,
    GetProtocol,
    SetProtocol,
    Data,
    Unknown(u8),
}

impl TransactionType {
    pub fn from_nibble(n: u8) -> Self {
        match n & 0x0F {
            0x0 => Self::Handshake,
            0x1 => Self::HidControl,
            0x4 => Self::GetReport,
            0x5 => Self::SetReport,
            0x6 => Self::GetProtocol,
            0x7 => Self::SetProtocol,
            0xA => Self::Data,
            other => Self::Unknown(other),
        }
    }

    pub fn nibble(self) -> u8 {
        match self {
            Self::Handshake => 0x0,
            Self::HidControl => 0x1,
            Self::GetReport => 0x4,
            Self::SetReport => 0x5,
            Self::GetProtocol => 0x6,
            Self::SetProtocol => 0x7,
            Self::Data => 0xA,
            Self::Unknown(n) => n,
        }
    }
}

/// HID report type (header low nibble)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    Other,
    Input,
    Output,
    Feature,
    Unknown(u8),
}

impl ReportType {
    pub fn from_nibble(n: u8) -> Self {
        match n & 0x0F {
            0 => Self::Other,
            1 => Self::Input,
            2 => Self::Output,
            3 => Self::Feature,
            other => Self::Unknown(other),
        }
    }

    pub fn nibble(self) -> u8 {
        match self {
            Self::Other => 0,
            Self::Input => 1,
            Self::Output => 2,
            Self::Feature => 3,
            Self::Unknown(n) => n,
        }
    }
}

/// Parsed transaction header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportHeader {
    pub transaction: TransactionType,
    pub report: ReportType,
}

impl ReportHeader {
    /// Header of an input report carrying key state
    pub const INPUT_DATA: Self = Self {
        transaction: TransactionType::Data,
        report: ReportType::Input,
    };

    pub fn from_byte(b: u8) -> Self {
        Self {
            transaction: TransactionType::from_nibble(b >> 4),
            report: ReportType::from_nibble(b),
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.transaction.nibble() << 4) | self.report.nibble()
    }

    pub fn is_input_data(self) -> bool {
        self == Self::INPUT_DATA
    }
}

impl fmt::Display for ReportHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:02X} ({:?}/{:?})",
            self.to_byte(),
            self.transaction,
            self.report
        )
    }
}

/// A decoded report; `bitmask` is only present for input data reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedReport {
    pub header: ReportHeader,
    pub bitmask: Option<u32>,
}

/// Decode one raw message from the interrupt channel
///
/// Messages shorter than [`MIN_REPORT_LEN`] are rejected regardless of their
/// header. Anything that is not an input data report decodes with no bitmask.
pub fn decode(raw: &[u8]) -> Result<DecodedReport, DecodeError> {
    if raw.len() < MIN_REPORT_LEN {
        return Err(DecodeError::Malformed { len: raw.len() });
    }

    let header = ReportHeader::from_byte(raw[0]);
    if !header.is_input_data() {
        debug!("Ignoring report with header {}", header);
        return Ok(DecodedReport {
            header,
            bitmask: None,
        });
    }

    let bitmask = u32::from_be_bytes([0, raw[1], raw[2], raw[3]]);
    Ok(DecodedReport {
        header,
        bitmask: Some(bitmask),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_input_report() {
        let report = decode(&[0xA1, 0x00, 0x02, 0x00]).unwrap();
        assert_eq!(report.header, ReportHeader::INPUT_DATA);
        assert_eq!(report.bitmask, Some(0x000200));
    }

    #[test]
    fn test_decode_bitmask_byte_order() {
        for (b1, b2, b3) in [(0x12, 0x34, 0x56), (0xFF, 0x00, 0x01), (0x80, 0x80, 0x80)] {
            let report = decode(&[0xA1, b1, b2, b3]).unwrap();
            let expected = ((b1 as u32) << 16) | ((b2 as u32) << 8) | b3 as u32;
            assert_eq!(report.bitmask, Some(expected));
        }
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let report = decode(&[0xA1, 0x40, 0x00, 0x00, 0xDE, 0xAD]).unwrap();
        assert_eq!(report.bitmask, Some(0x400000));
    }

    #[test]
    fn test_decode_short_messages_are_malformed() {
        for len in 0..MIN_REPORT_LEN {
            let raw = vec![0xA1; len];
            assert_eq!(decode(&raw), Err(DecodeError::Malformed { len }));
        }
        // Short non-input messages are rejected too
        assert_eq!(
            decode(&[0x00, 0x01]),
            Err(DecodeError::Malformed { len: 2 })
        );
    }

    #[test]
    fn test_decode_other_headers_have_no_bitmask() {
        for header in 0u8..=0xFF {
            if header == 0xA1 {
                continue;
            }
            let report = decode(&[header, 0xFF, 0xFF, 0xFF]).unwrap();
            assert_eq!(report.bitmask, None, "header 0x{header:02X}");
            assert_eq!(report.header.to_byte(), header);
        }
    }

    #[test]
    fn test_header_nibbles() {
        let h = ReportHeader::from_byte(0xA2);
        assert_eq!(h.transaction, TransactionType::Data);
        assert_eq!(h.report, ReportType::Output);

        let h = ReportHeader::from_byte(0x00);
        assert_eq!(h.transaction, TransactionType::Handshake);
        assert_eq!(h.report, ReportType::Other);

        let h = ReportHeader::from_byte(0xF7);
        assert_eq!(h.transaction, TransactionType::Unknown(0xF));
        assert_eq!(h.report, ReportType::Unknown(0x7));
    }

    #[test]
    fn test_header_display() {
        assert_eq!(ReportHeader::INPUT_DATA.to_string(), "0xA1 (Data/Input)");
    }
}
