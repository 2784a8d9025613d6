#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Requested bit width is outside 1..=32.
    #[error("invalid bit width {width}; must be 1 to 32")]
    InvalidWidth { width: u32 },

    /// Requested bit span runs past the end of the buffer.
    #[error("bit span {offset}+{width} exceeds buffer of {available} bits")]
    OutOfRange {
        offset: usize,
        width: u32,
        /// Number of bits available in the buffer
        available: usize,
    },

    /// Packet buffer is not exactly one packet long.
    #[error("expected {expected} packet bytes, got {actual}")]
    TruncatedPacket { actual: usize, expected: usize },

    #[error("invalid filter config: {0}")]
    InvalidConfig(String),

    #[error("invalid manual drop item {item:?}")]
    InvalidDropSet { item: String },

    #[error("unknown channel {0:?}")]
    UnknownChannel(String),

    #[error("unknown system flag {0:?}")]
    UnknownFlag(String),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
