//! BER size arithmetic.
//!
//! The processor never serializes PDUs itself, but the response-size rules
//! and GETBULK expansion need the exact length a PDU will occupy once the
//! transport layer encodes it. These helpers compute that length from
//! X.690 rules without building a buffer.

/// BER tag definitions used for length accounting.
pub mod tag {
    /// Universal tags.
    pub mod universal {
        pub const INTEGER: u8 = 0x02;
        pub const OCTET_STRING: u8 = 0x04;
        pub const NULL: u8 = 0x05;
        pub const OBJECT_IDENTIFIER: u8 = 0x06;
        pub const SEQUENCE: u8 = 0x30;
    }

    /// Application tags (SNMP-specific types).
    pub mod application {
        pub const IP_ADDRESS: u8 = 0x40;
        pub const COUNTER32: u8 = 0x41;
        pub const GAUGE32: u8 = 0x42;
        pub const TIMETICKS: u8 = 0x43;
        pub const OPAQUE: u8 = 0x44;
        pub const COUNTER64: u8 = 0x46;
    }

    /// Context-specific tags for exception values.
    pub mod context {
        pub const NO_SUCH_OBJECT: u8 = 0x80;
        pub const NO_SUCH_INSTANCE: u8 = 0x81;
        pub const END_OF_MIB_VIEW: u8 = 0x82;
    }
}

/// Octets needed to encode a definite length (short or long form).
pub fn length_len(len: usize) -> usize {
    if len <= 127 {
        1
    } else if len <= 0xFF {
        2
    } else if len <= 0xFFFF {
        3
    } else if len <= 0xFF_FFFF {
        4
    } else {
        5
    }
}

/// Total TLV size for content of the given length (single-octet tag).
pub fn tlv_len(content_len: usize) -> usize {
    1 + length_len(content_len) + content_len
}

/// Content octets of a two's-complement INTEGER.
pub fn integer_len(value: i32) -> usize {
    let mut len = 4;
    let bytes = value.to_be_bytes();
    // Drop leading octets that only repeat the sign.
    while len > 1 {
        let first = bytes[4 - len];
        let next = bytes[4 - len + 1];
        let redundant = (first == 0x00 && next & 0x80 == 0) || (first == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        len -= 1;
    }
    len
}

/// Content octets of an unsigned value (Counter32, Gauge32, TimeTicks, Counter64).
///
/// A leading zero octet is required when the high bit would otherwise be set.
pub fn unsigned_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    // +1 for the sign bit
    (bits + 1).div_ceil(8)
}
