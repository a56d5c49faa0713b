//! Protocol constants and framing for the G6 vendor HID interface

/// Payload size of every report (excluding the report ID)
pub const REPORT_SIZE: usize = 64;

/// Report ID prepended to every write
pub const REPORT_ID: u8 = 0x00;

/// Command-class marker: first payload byte of every vendor command
pub const CLASS_MARKER: u8 = 0x5A;

/// USB identification of the G6 control interface
pub mod device {
    /// Creative Technology Ltd
    pub const VENDOR_ID: u16 = 0x041E;
    /// Sound BlasterX G6
    pub const PRODUCT_ID: u16 = 0x3256;
    /// The G6 exposes audio and HID interfaces; only this one accepts commands
    pub const INTERFACE: i32 = 4;
}

/// Transport timing defaults
pub mod timing {
    /// Read timeout used when the caller does not supply one (ms)
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;
}

/// Known opcodes (byte 1 after the class marker)
pub mod opcode {
    pub const ACK: u8 = 0x02;
    pub const IDENTIFY: u8 = 0x05;
    pub const PING: u8 = 0x06;
    pub const FIRMWARE: u8 = 0x07;
    pub const QUERY_10: u8 = 0x10;
    pub const COMMIT: u8 = 0x11;
    pub const DATA: u8 = 0x12;
    pub const QUERY_15: u8 = 0x15;
    pub const QUERY_20: u8 = 0x20;
    pub const EFFECT_MODE: u8 = 0x26;
    pub const OUTPUT_CONFIG: u8 = 0x2C;
    pub const QUERY_30: u8 = 0x30;
    pub const QUERY_39: u8 = 0x39;
    pub const QUERY_3A: u8 = 0x3A;

    /// Human-readable opcode name for reports and monitor output
    pub fn name(op: u8) -> &'static str {
        match op {
            ACK => "ACK",
            IDENTIFY => "IDENTIFY",
            PING => "PING",
            FIRMWARE => "FIRMWARE",
            QUERY_10 => "QUERY_10",
            COMMIT => "COMMIT",
            DATA => "DATA",
            QUERY_15 => "QUERY_15",
            QUERY_20 => "QUERY_20",
            EFFECT_MODE => "EFFECT_MODE",
            OUTPUT_CONFIG => "OUTPUT_CONFIG",
            QUERY_30 => "QUERY_30",
            QUERY_39 => "QUERY_39",
            QUERY_3A => "QUERY_3A",
            _ => "UNKNOWN",
        }
    }
}

/// Build a write buffer: `[report_id] [payload; 64]`
pub fn frame_report(payload: &[u8; REPORT_SIZE]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(REPORT_SIZE + 1);
    buf.push(REPORT_ID);
    buf.extend_from_slice(payload);
    buf
}

/// Format bytes as space-separated lowercase hex
pub fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_report_prefixes_report_id() {
        let mut payload = [0u8; REPORT_SIZE];
        payload[0] = CLASS_MARKER;
        payload[1] = opcode::IDENTIFY;

        let buf = frame_report(&payload);
        assert_eq!(buf.len(), REPORT_SIZE + 1);
        assert_eq!(buf[0], REPORT_ID);
        assert_eq!(&buf[1..3], &[0x5A, 0x05]);
    }

    #[test]
    fn test_opcode_names() {
        assert_eq!(opcode::name(0x2C), "OUTPUT_CONFIG");
        assert_eq!(opcode::name(0x12), "DATA");
        assert_eq!(opcode::name(0xEE), "UNKNOWN");
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x5a, 0x05, 0x00]), "5a 05 00");
        assert_eq!(hex(&[]), "");
    }
}
