//! Arbitrary width bit field extraction.
//!
//! Fields may start at any bit offset and span byte boundaries. Values are at
//! most 32 bits wide and are returned as `i64` so both the full unsigned and
//! the sign extended range of a 32 bit field fit without loss.
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Maximum supported field width in bits.
pub const MAX_WIDTH: u32 = 32;

/// Order in which bits are consumed from the packet bytes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitOrder {
    /// Bit 0 is the most significant bit of byte 0 and the first bit read is
    /// the most significant bit of the value.
    #[default]
    #[serde(alias = "msb0")]
    Msb,
    /// Bit 0 is the least significant bit of byte 0 and the first bit read is
    /// the least significant bit of the value.
    #[serde(alias = "lsb0")]
    Lsb,
}

impl std::str::FromStr for BitOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "msb" | "msb0" => Ok(BitOrder::Msb),
            "lsb" | "lsb0" => Ok(BitOrder::Lsb),
            _ => Err(format!("bit order must be msb or lsb; got {s}")),
        }
    }
}

/// Sign extend the low `width` bits of `raw` using two's complement.
///
/// `width` must be in `1..=64`.
#[must_use]
pub fn sign_extend(raw: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((raw << shift) as i64) >> shift
}

fn mask(width: u32) -> u64 {
    (1u64 << width) - 1
}

/// Extract `width` bits starting at `offset` bits into `buf` using
/// [BitOrder::Msb].
///
/// # Errors
/// [Error::InvalidWidth] if `width` is not in `1..=32`, or [Error::OutOfRange] if the span
/// runs past the end of `buf`.
pub fn extract(buf: &[u8], offset: usize, width: u32, signed: bool) -> Result<i64> {
    extract_ordered(buf, offset, width, signed, BitOrder::Msb)
}

/// Extract `width` bits starting at `offset` bits into `buf` in the given bit order.
///
/// # Errors
/// See [extract].
pub fn extract_ordered(
    buf: &[u8],
    offset: usize,
    width: u32,
    signed: bool,
    order: BitOrder,
) -> Result<i64> {
    if !(1..=MAX_WIDTH).contains(&width) {
        return Err(Error::InvalidWidth { width });
    }
    let available = buf.len() * 8;
    let end = offset
        .checked_add(width as usize)
        .ok_or(Error::OutOfRange {
            offset,
            width,
            available,
        })?;
    if end > available {
        return Err(Error::OutOfRange {
            offset,
            width,
            available,
        });
    }

    // At most 5 bytes: 7 leading bits + 32 bits of field.
    let bytes = &buf[offset / 8..(end - 1) / 8 + 1];
    let lead = (offset % 8) as u32;
    let raw = match order {
        BitOrder::Msb => {
            let acc = bytes
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
            let trailing = bytes.len() as u32 * 8 - lead - width;
            (acc >> trailing) & mask(width)
        }
        BitOrder::Lsb => {
            let acc = bytes
                .iter()
                .rev()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
            (acc >> lead) & mask(width)
        }
    };

    if signed {
        Ok(sign_extend(raw, width))
    } else {
        Ok(raw as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn all_ones_signed_is_minus_one() {
        let buf = [0xffu8; 8];
        for width in 1..=MAX_WIDTH {
            for offset in [0, 3, 7, 13] {
                let v = extract(&buf, offset, width, true).unwrap();
                assert_eq!(v, -1, "width={width} offset={offset}");
            }
        }
    }

    #[test]
    fn all_ones_unsigned_is_max() {
        let buf = [0xffu8; 8];
        for width in 1..=MAX_WIDTH {
            let v = extract(&buf, 5, width, false).unwrap();
            assert_eq!(v, (1i64 << width) - 1, "width={width}");
        }
    }

    #[test]
    fn spans_byte_boundary() {
        let buf = [0x12, 0x34, 0x56, 0x78];
        // bits 4..28 of 0x12345678
        assert_eq!(extract(&buf, 4, 24, false).unwrap(), 0x23_4567);
        assert_eq!(extract(&buf, 12, 8, false).unwrap(), 0x45);
        assert_eq!(extract(&buf, 0, 32, false).unwrap(), 0x1234_5678);
    }

    #[test]
    fn signed_negative_across_boundary() {
        // 14 bit field at offset 6 holding -2 (0x3ffe)
        let raw: u32 = 0x3ffe << (32 - 6 - 14);
        let buf = raw.to_be_bytes();
        assert_eq!(extract(&buf, 6, 14, true).unwrap(), -2);
        assert_eq!(extract(&buf, 6, 14, false).unwrap(), 0x3ffe);
    }

    #[test]
    fn lsb_order() {
        let buf = [0x12, 0x34, 0x56, 0x78];
        // little endian word 0x78563412, bits 4..28
        assert_eq!(
            extract_ordered(&buf, 4, 24, false, BitOrder::Lsb).unwrap(),
            0x85_6341
        );
        assert_eq!(
            extract_ordered(&buf, 0, 8, false, BitOrder::Lsb).unwrap(),
            0x12
        );
        assert_eq!(
            extract_ordered(&buf, 0, 32, false, BitOrder::Lsb).unwrap(),
            0x7856_3412
        );
    }

    #[test_case(0; "zero")]
    #[test_case(33; "too wide")]
    fn invalid_width(width: u32) {
        let zult = extract(&[0u8; 8], 0, width, false);
        assert!(
            matches!(zult, Err(Error::InvalidWidth { width: w }) if w == width),
            "got {zult:?}"
        );
    }

    #[test_case(0, 17; "past end from start")]
    #[test_case(9, 8; "past end unaligned")]
    #[test_case(16, 1; "at end")]
    fn out_of_range(offset: usize, width: u32) {
        let zult = extract(&[0u8; 2], offset, width, false);
        assert!(
            matches!(zult, Err(Error::OutOfRange { available: 16, .. })),
            "got {zult:?}"
        );
    }

    #[test]
    fn exact_fit() {
        assert_eq!(extract(&[0x80, 0x01], 15, 1, false).unwrap(), 1);
        assert_eq!(extract(&[0x80, 0x01], 0, 1, true).unwrap(), -1);
    }

    #[test]
    fn sign_extend_widths() {
        assert_eq!(sign_extend(0b1, 1), -1);
        assert_eq!(sign_extend(0b01, 2), 1);
        assert_eq!(sign_extend(0x2000, 14), -8192);
        assert_eq!(sign_extend(0x1fff, 14), 8191);
        assert_eq!(sign_extend(0x2000_0000, 30), -(1 << 29));
    }
}
