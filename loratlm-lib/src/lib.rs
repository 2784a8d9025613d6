#![doc = include_str!("../README.md")]

mod error;

pub mod bits;
pub mod config;
pub mod filter;
pub mod packet;
pub mod stream;

pub use error::{Error, Result};
pub use stream::{decode_records, read_packets, RecordStream};

pub(crate) mod prelude {
    pub use crate::error::{Error, Result};
}
