#![allow(dead_code)]

use loratlm::bits::BitOrder;
use loratlm::packet::{Channel, FIELDS, PACKET_LEN};
use rand::Rng;

/// Test-only packet packer mirroring the transmitter's bit writer.
#[derive(Debug, Clone)]
pub struct PacketBuilder {
    buf: [u8; PACKET_LEN],
    order: BitOrder,
}

impl PacketBuilder {
    pub fn new(order: BitOrder) -> Self {
        PacketBuilder {
            buf: [0u8; PACKET_LEN],
            order,
        }
    }

    /// Write the low `width` bits of `value` at `offset`, replacing whatever was there.
    pub fn put(mut self, offset: usize, width: u32, value: i64) -> Self {
        let value = value as u64 & ((1u64 << width) - 1);
        for i in 0..width as usize {
            let pos = offset + i;
            let bit = match self.order {
                // first bit written is the value's most significant bit
                BitOrder::Msb => (value >> (width as usize - 1 - i)) & 1,
                BitOrder::Lsb => (value >> i) & 1,
            };
            let shift = match self.order {
                BitOrder::Msb => 7 - pos % 8,
                BitOrder::Lsb => pos % 8,
            };
            let byte = &mut self.buf[pos / 8];
            *byte = (*byte & !(1 << shift)) | ((bit as u8) << shift);
        }
        self
    }

    pub fn set(self, channel: Channel, raw: i64) -> Self {
        let spec = channel.spec();
        self.put(spec.offset, spec.width, raw)
    }

    pub fn build(self) -> [u8; PACKET_LEN] {
        self.buf
    }
}

pub fn msb() -> PacketBuilder {
    PacketBuilder::new(BitOrder::Msb)
}

/// Packet with every field set from `raw`, indexed by channel.
pub fn packet_from_raw(order: BitOrder, raw: &[i64]) -> [u8; PACKET_LEN] {
    FIELDS
        .iter()
        .zip(raw)
        .fold(PacketBuilder::new(order), |b, (spec, v)| {
            b.set(spec.channel, *v)
        })
        .build()
}

/// Random in-range raw values for every field.
pub fn random_raw<R: Rng>(rng: &mut R) -> Vec<i64> {
    FIELDS
        .iter()
        .map(|spec| {
            if spec.signed {
                let half = 1i64 << (spec.width - 1);
                rng.gen_range(-half..half)
            } else {
                rng.gen_range(0..(1i64 << spec.width))
            }
        })
        .collect()
}

/// A plausible packet at `time_ms` with nominal sensor values.
pub fn nominal(time_ms: u32) -> PacketBuilder {
    msb()
        .set(Channel::TimeMs, i64::from(time_ms))
        .set(Channel::TempCc, 2150)
        .set(Channel::PressPa, 101_325)
        .set(Channel::AccelZ, 1000)
        .set(Channel::Lat, 523_456_789)
        .set(Channel::Lon, -12_345_678)
        .set(Channel::RadData0, 1500)
}
