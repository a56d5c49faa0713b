//! USB packet headers for USBPcap and Linux usbmon captures
//!
//! Only what is needed to locate the transfer payload is decoded: direction,
//! transfer type, endpoint and data length.

use serde::Serialize;

/// Capture link types carrying USB traffic
pub mod linktype {
    /// Linux usbmon, 48-byte header
    pub const USB_LINUX: i32 = 189;
    /// Linux usbmon (mmapped), 64-byte header
    pub const USB_LINUX_MMAPPED: i32 = 220;
    /// USBPcap (Windows)
    pub const USBPCAP: i32 = 249;
}

/// Direction of USB transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Host to device (OUT)
    Out,
    /// Device to host (IN)
    In,
}

impl Direction {
    fn from_endpoint(endpoint: u8) -> Self {
        if endpoint & 0x80 != 0 {
            Self::In
        } else {
            Self::Out
        }
    }
}

/// USB transfer type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Isochronous,
    Interrupt,
    Control,
    Bulk,
}

impl TransferType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Isochronous),
            1 => Some(Self::Interrupt),
            2 => Some(Self::Control),
            3 => Some(Self::Bulk),
            _ => None,
        }
    }
}

/// Parsed USBPcap header
#[derive(Debug, Clone)]
pub struct UsbUrb {
    /// Header length in bytes
    pub header_len: u16,
    pub direction: Direction,
    pub endpoint: u8,
    pub transfer_type: TransferType,
    /// Data length (after header)
    pub data_len: u32,
}

/// Transfer data of one captured packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsbPayload {
    pub direction: Option<Direction>,
    pub data: Vec<u8>,
}

/// Parse USBPcap URB header from raw bytes
///
/// USBPcap header format (27-28 bytes minimum):
/// ```text
/// Offset  Size  Field
/// 0       2     headerLen
/// 2       8     irpId
/// 10      4     status
/// 14      2     function
/// 16      1     info (bit 0 = direction: 0=OUT, 1=IN)
/// 17      2     bus
/// 19      2     device
/// 21      1     endpoint
/// 22      1     transferType (0=iso, 1=int, 2=ctrl, 3=bulk)
/// 23      4     dataLength
/// ```
pub fn parse_urb_header(raw: &[u8]) -> Option<UsbUrb> {
    if raw.len() < 27 {
        return None;
    }

    let header_len = u16::from_le_bytes([raw[0], raw[1]]);
    if header_len < 27 || raw.len() < header_len as usize {
        return None;
    }

    let direction = if raw[16] & 0x01 != 0 {
        Direction::In
    } else {
        Direction::Out
    };

    Some(UsbUrb {
        header_len,
        direction,
        endpoint: raw[21],
        transfer_type: TransferType::from_byte(raw[22])?,
        data_len: u32::from_le_bytes([raw[23], raw[24], raw[25], raw[26]]),
    })
}

/// Payload of a USBPcap packet
///
/// Control transfers carry the 8-byte setup packet first; it is skipped.
pub fn parse_usbpcap(raw: &[u8]) -> Option<UsbPayload> {
    let urb = parse_urb_header(raw)?;
    let mut start = urb.header_len as usize;
    let mut len = urb.data_len as usize;

    match urb.transfer_type {
        TransferType::Control => {
            // USBPcap data_len includes the setup packet
            if len >= 8 && raw.len() >= start + 8 {
                start += 8;
                len -= 8;
            }
        }
        TransferType::Interrupt | TransferType::Bulk => {}
        TransferType::Isochronous => {
            return Some(UsbPayload {
                direction: Some(urb.direction),
                data: Vec::new(),
            })
        }
    }

    let data = raw
        .get(start..start + len)
        .map(<[u8]>::to_vec)
        .unwrap_or_default();
    Some(UsbPayload {
        direction: Some(urb.direction),
        data,
    })
}

/// Payload of a Linux usbmon packet
///
/// usbmon header format (48 bytes, 64 when mmapped):
/// ```text
/// Offset  Size  Field
/// 0       8     id
/// 8       1     type ('S', 'C', 'E')
/// 9       1     xfer_type (0=iso, 1=int, 2=ctrl, 3=bulk)
/// 10      1     epnum (bit 7 = IN)
/// 11      1     devnum
/// 12      2     busnum
/// 36      4     len_cap
/// ```
pub fn parse_usbmon(raw: &[u8], header_len: usize) -> Option<UsbPayload> {
    if raw.len() < header_len || header_len < 40 {
        return None;
    }

    TransferType::from_byte(raw[9])?;
    let direction = Direction::from_endpoint(raw[10]);
    let len_cap = u32::from_le_bytes([raw[36], raw[37], raw[38], raw[39]]) as usize;

    let end = (header_len + len_cap).min(raw.len());
    Some(UsbPayload {
        direction: Some(direction),
        data: raw[header_len..end].to_vec(),
    })
}

/// Extract the transfer payload of a packet according to its link type
///
/// Unknown link types yield the whole packet. A USB header that does not
/// parse yields an empty payload.
pub fn extract_payload(link: i32, raw: &[u8]) -> UsbPayload {
    let parsed = match link {
        linktype::USBPCAP => parse_usbpcap(raw),
        linktype::USB_LINUX => parse_usbmon(raw, 48),
        linktype::USB_LINUX_MMAPPED => parse_usbmon(raw, 64),
        _ => {
            return UsbPayload {
                direction: None,
                data: raw.to_vec(),
            }
        }
    };
    parsed.unwrap_or(UsbPayload {
        direction: None,
        data: Vec::new(),
    })
}
