//! Named settings profiles.
//!
//! A settings file is TOML where every top-level table is a profile:
//! ```toml
//! [default]
//! input = "flight.bin"
//! to_csv = "flight.csv"
//! filter_file = "filters.toml"
//!
//! [bench]
//! input = "bench.bin"
//! bit_order = "lsb"
//! time_gap_ms = 500
//! drop_packets = "0-3"
//! channels = { temp_cC = { min = 0, max = 40 } }
//! ```
//! Values given on the command line take precedence over the profile, which in turn
//! takes precedence over the filter file.
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};

use anyhow::{bail, Context, Result};
use loratlm::{
    bits::BitOrder,
    filter::{Bounds, DropSet, FilterConfig, TimeRules},
    packet::Channel,
};
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_SECTION: &str = "default";

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub input: Option<PathBuf>,
    pub to_csv: Option<PathBuf>,
    pub filter_file: Option<PathBuf>,
    pub bit_order: Option<BitOrder>,
    #[serde(alias = "time_gap_ms")]
    pub max_jump_ms: Option<u32>,
    pub allow_wrap: Option<bool>,
    pub drop_packets: Option<DropSet>,
    #[serde(default)]
    pub channels: BTreeMap<Channel, Bounds>,
}

impl Profile {
    /// Layer `top` over this profile; any value set in `top` wins.
    #[must_use]
    pub fn overlay(mut self, top: Profile) -> Profile {
        self.channels.extend(top.channels);
        Profile {
            input: top.input.or(self.input),
            to_csv: top.to_csv.or(self.to_csv),
            filter_file: top.filter_file.or(self.filter_file),
            bit_order: top.bit_order.or(self.bit_order),
            max_jump_ms: top.max_jump_ms.or(self.max_jump_ms),
            allow_wrap: top.allow_wrap.or(self.allow_wrap),
            drop_packets: top.drop_packets.or(self.drop_packets),
            channels: self.channels,
        }
    }

    /// Resolve the filter config: the filter file, if any, with this profile's overrides
    /// applied on top.
    pub fn filter_config(&self) -> Result<FilterConfig> {
        let mut config = match &self.filter_file {
            Some(path) => FilterConfig::load(path)
                .with_context(|| format!("loading filter file {path:?}"))?,
            None => FilterConfig::default(),
        };

        if self.max_jump_ms.is_some() || self.allow_wrap.is_some() {
            let time = config.time.get_or_insert_with(TimeRules::default);
            if let Some(max) = self.max_jump_ms {
                time.max_jump_ms = Some(max);
            }
            if let Some(wrap) = self.allow_wrap {
                time.allow_wrap = wrap;
            }
        }
        config
            .channels
            .extend(self.channels.iter().map(|(c, b)| (*c, *b)));
        if let Some(drops) = &self.drop_packets {
            config.drops = drops.clone();
        }

        config.validate().context("invalid filter settings")?;
        Ok(config)
    }
}

/// Parse the named profile from settings file contents.
pub fn profile_from_str(s: &str, section: &str) -> Result<Profile> {
    let mut profiles: BTreeMap<String, Profile> =
        toml::from_str(s).context("parsing settings")?;
    match profiles.remove(section) {
        Some(profile) => Ok(profile),
        None => {
            let available: Vec<&str> = profiles.keys().map(String::as_str).collect();
            bail!(
                "settings section {section:?} not found; available: {}",
                available.join(", ")
            )
        }
    }
}

pub fn load_profile(path: &Path, section: &str) -> Result<Profile> {
    let s = fs::read_to_string(path).with_context(|| format!("reading settings {path:?}"))?;
    let profile = profile_from_str(&s, section).with_context(|| format!("settings {path:?}"))?;
    debug!(path = %path.display(), section, "loaded settings profile");
    Ok(profile)
}
