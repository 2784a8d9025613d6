//! Filter configuration files.
//!
//! Filter files are TOML:
//! ```toml
//! [time]
//! max_jump_ms = 2000
//! allow_wrap = true
//!
//! [channels]
//! temp_cC = { min = -40.0, max = 85.0 }
//! pressPa = { min = 30000 }
//!
//! [manual]
//! drop_packets = "17,42,153-160"
//! ```
//! Channel bounds are in the physical units of [crate::packet::FIELDS].
use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;
use tracing::debug;

use crate::filter::{Bounds, DropSet, FilterConfig, TimeRules};
use crate::packet::Channel;
use crate::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterFile {
    #[serde(default)]
    time: Option<TimeRules>,
    #[serde(default)]
    channels: BTreeMap<Channel, Bounds>,
    #[serde(default)]
    manual: ManualSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManualSection {
    #[serde(default)]
    drop_packets: DropSet,
}

impl From<FilterFile> for FilterConfig {
    fn from(file: FilterFile) -> Self {
        FilterConfig {
            time: file.time,
            channels: file.channels,
            drops: file.manual.drop_packets,
        }
    }
}

impl FilterConfig {
    /// Parse and validate a TOML filter config.
    ///
    /// # Errors
    /// [Error::Toml] for syntax errors, unknown sections, unknown channels or malformed
    /// drop lists, or any error from [FilterConfig::validate].
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: FilterFile = toml::from_str(s)?;
        let config = FilterConfig::from(file);
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML filter config from `path`.
    ///
    /// # Errors
    /// [Error::Io] if the file cannot be read, otherwise see [FilterConfig::from_toml_str].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&s)?;
        debug!(
            path = %path.display(),
            time = config.time.is_some(),
            channels = config.channels.len(),
            manual = !config.drops.is_empty(),
            "loaded filters"
        );
        Ok(config)
    }
}
