//! Record acceptance rules.
//!
//! A [FilterPipeline] evaluates records in arrival order against three rule
//! families, in this order of precedence:
//!
//! 1. Manual exclusion by raw packet position ([DropSet]).
//! 2. Time continuity of the 24 bit millisecond counter ([TimeRules]).
//! 3. Per-channel physical bounds ([Bounds]).
//!
//! Rejections are ordinary outcomes, not errors. The only errors are
//! configuration errors, reported when the pipeline is constructed.
mod drops;
mod summary;

use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};
use tracing::trace;
use typed_builder::TypedBuilder;

use crate::packet::{Channel, Record};
use crate::prelude::*;

pub use drops::DropSet;
pub use summary::Summary;

/// Modulus of the packet millisecond counter.
pub const TIME_COUNTER_MODULUS: i64 = 1 << 24;

/// Time continuity settings.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, TypedBuilder)]
#[serde(deny_unknown_fields)]
pub struct TimeRules {
    /// Largest accepted forward step between consecutive accepted records. `None` disables
    /// the gap check.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub max_jump_ms: Option<u32>,
    /// Treat a backwards step as a rollover of the 24 bit counter.
    #[builder(default)]
    #[serde(default)]
    pub allow_wrap: bool,
}

/// Inclusive physical limits for one channel. Either side may be open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bounds {
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Bounds {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    fn validate(&self, channel: Channel) -> Result<()> {
        for v in [self.min, self.max].into_iter().flatten() {
            if !v.is_finite() {
                return Err(Error::InvalidConfig(format!(
                    "{channel} bound {v} is not finite"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(Error::InvalidConfig(format!(
                    "{channel} min {min} is greater than max {max}"
                )));
            }
        }
        Ok(())
    }
}

/// Filter settings for one run.
///
/// # Example
/// ```
/// use loratlm::filter::{Bounds, DropSet, FilterConfig, TimeRules};
/// use loratlm::packet::Channel;
///
/// let config = FilterConfig::builder()
///     .time(TimeRules::builder().max_jump_ms(2000).allow_wrap(true).build())
///     .channels([(Channel::TempCc, Bounds::new(-40.0, 85.0))].into())
///     .drops("5,10-12".parse::<DropSet>().unwrap())
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Default, Clone, PartialEq, TypedBuilder)]
pub struct FilterConfig {
    /// Time continuity rules. `None` disables time checks entirely.
    #[builder(default, setter(strip_option))]
    pub time: Option<TimeRules>,
    #[builder(default)]
    pub channels: BTreeMap<Channel, Bounds>,
    #[builder(default)]
    pub drops: DropSet,
}

impl FilterConfig {
    /// # Errors
    /// [Error::InvalidConfig] if any channel bounds are not finite or have `min > max`.
    pub fn validate(&self) -> Result<()> {
        for (channel, bounds) in &self.channels {
            bounds.validate(*channel)?;
        }
        Ok(())
    }
}

/// Name of a rule that can reject a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Rule {
    ManuallyExcluded,
    TimeWentBackward,
    TimeGapTooLarge,
    OutOfPhysicalRange,
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Rule::ManuallyExcluded => "ManuallyExcluded",
            Rule::TimeWentBackward => "TimeWentBackward",
            Rule::TimeGapTooLarge => "TimeGapTooLarge",
            Rule::OutOfPhysicalRange => "OutOfPhysicalRange",
        };
        f.write_str(s)
    }
}

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    ManuallyExcluded { index: usize },
    TimeWentBackward { previous: u32, current: u32 },
    /// `delta` is after any wrap correction.
    TimeGapTooLarge { delta: u32, max: u32 },
    OutOfPhysicalRange { channel: Channel, value: f64 },
}

impl Rejection {
    #[must_use]
    pub fn rule(&self) -> Rule {
        match self {
            Rejection::ManuallyExcluded { .. } => Rule::ManuallyExcluded,
            Rejection::TimeWentBackward { .. } => Rule::TimeWentBackward,
            Rejection::TimeGapTooLarge { .. } => Rule::TimeGapTooLarge,
            Rejection::OutOfPhysicalRange { .. } => Rule::OutOfPhysicalRange,
        }
    }
}

impl Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::ManuallyExcluded { index } => {
                write!(f, "{}: packet {index}", self.rule())
            }
            Rejection::TimeWentBackward { previous, current } => {
                write!(f, "{}: {previous}ms -> {current}ms", self.rule())
            }
            Rejection::TimeGapTooLarge { delta, max } => {
                write!(f, "{}: {delta}ms > {max}ms", self.rule())
            }
            Rejection::OutOfPhysicalRange { channel, value } => {
                write!(f, "{}: {channel}={value}", self.rule())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    Accept,
    Reject(Rejection),
}

impl FilterDecision {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }

    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            FilterDecision::Accept => None,
            FilterDecision::Reject(r) => Some(r),
        }
    }
}

/// Stateful record filter for a single run.
///
/// Each run should use its own pipeline; state is never shared between instances.
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    config: FilterConfig,
    previous_time_ms: Option<u32>,
    sequence_index: usize,
}

impl FilterPipeline {
    /// # Errors
    /// Any error from [FilterConfig::validate].
    pub fn new(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(FilterPipeline {
            config,
            previous_time_ms: None,
            sequence_index: 0,
        })
    }

    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Raw position of the next record to be evaluated.
    #[must_use]
    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    /// Time of the most recently accepted record.
    #[must_use]
    pub fn previous_time_ms(&self) -> Option<u32> {
        self.previous_time_ms
    }

    /// Evaluate the next record in arrival order.
    pub fn evaluate(&mut self, record: &Record) -> FilterDecision {
        let index = self.sequence_index;
        self.sequence_index += 1;

        match self.check(index, record) {
            None => {
                self.previous_time_ms = Some(record.time_ms());
                FilterDecision::Accept
            }
            Some(rejection) => {
                trace!(index, time_ms = record.time_ms(), %rejection, "rejected");
                FilterDecision::Reject(rejection)
            }
        }
    }

    /// Account for a raw packet that never produced a record so later manual
    /// exclusion indices stay aligned with raw input positions.
    pub fn skip(&mut self) {
        self.sequence_index += 1;
    }

    fn check(&self, index: usize, record: &Record) -> Option<Rejection> {
        if self.config.drops.contains(index) {
            return Some(Rejection::ManuallyExcluded { index });
        }
        if let Some(rules) = &self.config.time {
            if let Some(rejection) = self.check_time(rules, record.time_ms()) {
                return Some(rejection);
            }
        }
        self.config
            .channels
            .iter()
            .map(|(channel, bounds)| (*channel, bounds, record.value(*channel)))
            .find(|(_, bounds, value)| !bounds.contains(*value))
            .map(|(channel, _, value)| Rejection::OutOfPhysicalRange { channel, value })
    }

    fn check_time(&self, rules: &TimeRules, current: u32) -> Option<Rejection> {
        let previous = self.previous_time_ms?;
        let mut delta = i64::from(current) - i64::from(previous);
        if delta < 0 {
            if !rules.allow_wrap {
                return Some(Rejection::TimeWentBackward { previous, current });
            }
            delta += TIME_COUNTER_MODULUS;
        }
        match rules.max_jump_ms {
            Some(max) if delta > i64::from(max) => Some(Rejection::TimeGapTooLarge {
                // within 0..2^24 after wrap correction
                delta: delta as u32,
                max,
            }),
            _ => None,
        }
    }
}
