//! Fixed 42 byte telemetry packet layout and decoding.
mod flags;

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bits::{extract_ordered, BitOrder};
use crate::prelude::*;

pub use flags::{SystemFlags, FLAG_NAMES};

/// Size of a packet in bytes.
pub const PACKET_LEN: usize = 42;
/// Size of a packet in bits.
pub const PACKET_BITS: usize = PACKET_LEN * 8;
/// Offset of the unused bits that pad the field table out to [PACKET_BITS].
pub const RESERVED_OFFSET: usize = 334;
pub const RESERVED_BITS: usize = 2;

/// Identifies one field of a packet.
///
/// Variants are in packet order, so `channel as usize` indexes [FIELDS].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "time_ms")]
    TimeMs,
    #[serde(rename = "temp_cC")]
    TempCc,
    #[serde(rename = "pressPa")]
    PressPa,
    #[serde(rename = "magX")]
    MagX,
    #[serde(rename = "magY")]
    MagY,
    #[serde(rename = "magZ")]
    MagZ,
    #[serde(rename = "accelX")]
    AccelX,
    #[serde(rename = "accelY")]
    AccelY,
    #[serde(rename = "accelZ")]
    AccelZ,
    #[serde(rename = "gyroX")]
    GyroX,
    #[serde(rename = "gyroY")]
    GyroY,
    #[serde(rename = "gyroZ")]
    GyroZ,
    #[serde(rename = "lat_1e7")]
    Lat,
    #[serde(rename = "lon_1e7")]
    Lon,
    #[serde(rename = "flags")]
    Flags,
    #[serde(rename = "radData0")]
    RadData0,
    #[serde(rename = "radData1")]
    RadData1,
    #[serde(rename = "radData2")]
    RadData2,
    #[serde(rename = "radData3")]
    RadData3,
}

impl Channel {
    pub const COUNT: usize = 19;

    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::TimeMs,
        Channel::TempCc,
        Channel::PressPa,
        Channel::MagX,
        Channel::MagY,
        Channel::MagZ,
        Channel::AccelX,
        Channel::AccelY,
        Channel::AccelZ,
        Channel::GyroX,
        Channel::GyroY,
        Channel::GyroZ,
        Channel::Lat,
        Channel::Lon,
        Channel::Flags,
        Channel::RadData0,
        Channel::RadData1,
        Channel::RadData2,
        Channel::RadData3,
    ];

    /// Channel identifier as used in configs and CSV headers.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Layout entry for this channel.
    #[must_use]
    pub fn spec(self) -> &'static FieldSpec {
        &FIELDS[self as usize]
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Channel::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownChannel(s.to_string()))
    }
}

/// Exact rational conversion from a raw field integer to its physical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    pub num: i64,
    pub den: i64,
}

impl Scale {
    pub const UNIT: Scale = Scale::new(1, 1);

    #[must_use]
    pub const fn new(num: i64, den: i64) -> Self {
        Scale { num, den }
    }

    /// Convert a raw value to physical units.
    #[must_use]
    pub fn apply(self, raw: i64) -> f64 {
        let scaled = raw * self.num;
        if self.den == 1 {
            scaled as f64
        } else {
            scaled as f64 / self.den as f64
        }
    }

    /// Convert a physical value back to the nearest raw integer.
    #[must_use]
    pub fn invert(self, value: f64) -> i64 {
        (value * self.den as f64 / self.num as f64).round() as i64
    }
}

/// Position, encoding and scaling of one packet field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub channel: Channel,
    pub name: &'static str,
    /// Bit offset from the start of the packet.
    pub offset: usize,
    pub width: u32,
    pub signed: bool,
    pub scale: Scale,
    /// Unit of the scaled value.
    pub unit: &'static str,
}

const fn field(
    channel: Channel,
    name: &'static str,
    offset: usize,
    width: u32,
    signed: bool,
    scale: Scale,
    unit: &'static str,
) -> FieldSpec {
    FieldSpec {
        channel,
        name,
        offset,
        width,
        signed,
        scale,
        unit,
    }
}

const CENTI: Scale = Scale::new(1, 100);
const DECI: Scale = Scale::new(1, 10);
const E7: Scale = Scale::new(1, 10_000_000);

/// The packet layout, in transmission order.
#[rustfmt::skip]
pub static FIELDS: [FieldSpec; Channel::COUNT] = [
    field(Channel::TimeMs,   "time_ms",  0,   24, false, Scale::UNIT, "ms"),
    field(Channel::TempCc,   "temp_cC",  24,  14, true,  CENTI,       "°C"),
    field(Channel::PressPa,  "pressPa",  38,  20, false, Scale::UNIT, "Pa"),
    field(Channel::MagX,     "magX",     58,  16, true,  Scale::UNIT, "mG"),
    field(Channel::MagY,     "magY",     74,  16, true,  Scale::UNIT, "mG"),
    field(Channel::MagZ,     "magZ",     90,  16, true,  Scale::UNIT, "mG"),
    field(Channel::AccelX,   "accelX",   106, 16, true,  Scale::UNIT, "mG"),
    field(Channel::AccelY,   "accelY",   122, 16, true,  Scale::UNIT, "mG"),
    field(Channel::AccelZ,   "accelZ",   138, 16, true,  Scale::UNIT, "mG"),
    field(Channel::GyroX,    "gyroX",    154, 16, true,  DECI,        "dps"),
    field(Channel::GyroY,    "gyroY",    170, 16, true,  DECI,        "dps"),
    field(Channel::GyroZ,    "gyroZ",    186, 16, true,  DECI,        "dps"),
    field(Channel::Lat,      "lat_1e7",  202, 30, true,  E7,          "deg"),
    field(Channel::Lon,      "lon_1e7",  232, 30, true,  E7,          "deg"),
    field(Channel::Flags,    "flags",    262, 8,  false, Scale::UNIT, ""),
    field(Channel::RadData0, "radData0", 270, 16, false, Scale::UNIT, "counts"),
    field(Channel::RadData1, "radData1", 286, 16, false, Scale::UNIT, "counts"),
    field(Channel::RadData2, "radData2", 302, 16, false, Scale::UNIT, "counts"),
    field(Channel::RadData3, "radData3", 318, 16, false, Scale::UNIT, "counts"),
];

/// One decoded packet.
///
/// Holds the raw field integers; physical values are derived on access so the
/// transmitted integers are always available unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    raw: [i64; Channel::COUNT],
    flags: SystemFlags,
    index: usize,
}

impl Record {
    /// Raw field integer, after sign extension.
    #[must_use]
    pub fn raw(&self, channel: Channel) -> i64 {
        self.raw[channel as usize]
    }

    /// Physical value, i.e., the raw value scaled per [FIELDS].
    #[must_use]
    pub fn value(&self, channel: Channel) -> f64 {
        channel.spec().scale.apply(self.raw(channel))
    }

    /// All channels and their physical values in packet order.
    pub fn values(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        Channel::ALL.into_iter().map(|c| (c, self.value(c)))
    }

    #[must_use]
    pub fn time_ms(&self) -> u32 {
        // 24 bit unsigned field
        self.raw(Channel::TimeMs) as u32
    }

    #[must_use]
    pub fn flags(&self) -> SystemFlags {
        self.flags
    }

    /// Zero-based position of the source packet in the input stream.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Channel::*;
        let g = |c: Channel| self.value(c) / 1000.0;
        writeln!(f, "-- Dataframe BGN --")?;
        writeln!(f, "Time: {} ms", self.time_ms())?;
        writeln!(f, "Temp: {:.2} C", self.value(TempCc))?;
        writeln!(f, "Press: {} Pa", self.raw(PressPa))?;
        writeln!(
            f,
            "Mag:  X:{:.3}  Y:{:.3}  Z:{:.3} G",
            g(MagX),
            g(MagY),
            g(MagZ)
        )?;
        writeln!(
            f,
            "Accel:  X:{:.3}  Y:{:.3}  Z:{:.3} G",
            g(AccelX),
            g(AccelY),
            g(AccelZ)
        )?;
        writeln!(
            f,
            "Gyro:  X:{:.1}  Y:{:.1}  Z:{:.1} dps",
            self.value(GyroX),
            self.value(GyroY),
            self.value(GyroZ)
        )?;
        writeln!(
            f,
            "lat: {:.7}  lon: {:.7}",
            self.value(Lat),
            self.value(Lon)
        )?;
        writeln!(
            f,
            "rad: {}  {}  {}  {}",
            self.raw(RadData0),
            self.raw(RadData1),
            self.raw(RadData2),
            self.raw(RadData3)
        )?;
        writeln!(f, "{}", self.flags.labels())?;
        write!(f, "-- Dataframe END --")
    }
}

/// Decodes packet buffers into [Record]s using [FIELDS].
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketDecoder {
    order: BitOrder,
}

impl PacketDecoder {
    #[must_use]
    pub fn new(order: BitOrder) -> Self {
        PacketDecoder { order }
    }

    #[must_use]
    pub fn bit_order(&self) -> BitOrder {
        self.order
    }

    /// Decode exactly one packet.
    ///
    /// # Errors
    /// [Error::TruncatedPacket] if `buf` is not exactly [PACKET_LEN] bytes.
    pub fn decode(&self, buf: &[u8]) -> Result<Record> {
        if buf.len() != PACKET_LEN {
            return Err(Error::TruncatedPacket {
                actual: buf.len(),
                expected: PACKET_LEN,
            });
        }

        let mut raw = [0i64; Channel::COUNT];
        for spec in &FIELDS {
            raw[spec.channel as usize] =
                extract_ordered(buf, spec.offset, spec.width, spec.signed, self.order)?;
        }

        Ok(Record {
            raw,
            // 8 bit unsigned field
            flags: SystemFlags::from_bits(raw[Channel::Flags as usize] as u8),
            index: 0,
        })
    }

    pub(crate) fn decode_at(&self, buf: &[u8], index: usize) -> Result<Record> {
        let mut record = self.decode(buf)?;
        record.index = index;
        Ok(record)
    }
}

/// Decode a packet using the default [BitOrder::Msb] layout.
///
/// # Errors
/// See [PacketDecoder::decode].
pub fn decode(buf: &[u8]) -> Result<Record> {
    PacketDecoder::default().decode(buf)
}
