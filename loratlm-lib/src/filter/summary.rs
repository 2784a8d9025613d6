use std::collections::BTreeMap;

use serde::Serialize;

use super::{FilterDecision, Rejection, Rule};
use crate::packet::Channel;

/// Per-run diagnostic counts.
///
/// # Example
/// ```
/// use loratlm::filter::{FilterConfig, FilterPipeline, Summary};
/// use loratlm::packet::decode;
///
/// let mut pipeline = FilterPipeline::new(FilterConfig::default()).unwrap();
/// let mut summary = Summary::default();
/// let record = decode(&[0u8; 42]).unwrap();
/// summary.add(&pipeline.evaluate(&record));
/// assert_eq!(summary.accepted, 1);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Raw packets seen, including ones that failed to decode.
    pub packets: usize,
    pub decode_errors: usize,
    pub decoded: usize,
    pub accepted: usize,
    pub rejected: BTreeMap<Rule, usize>,
    /// Physical range rejections broken out by the offending channel.
    pub out_of_range: BTreeMap<Channel, usize>,
}

impl Summary {
    pub fn add_decode_error(&mut self) {
        self.packets += 1;
        self.decode_errors += 1;
    }

    pub fn add(&mut self, decision: &FilterDecision) {
        self.packets += 1;
        self.decoded += 1;
        match decision {
            FilterDecision::Accept => self.accepted += 1,
            FilterDecision::Reject(rejection) => {
                *self.rejected.entry(rejection.rule()).or_default() += 1;
                if let Rejection::OutOfPhysicalRange { channel, .. } = rejection {
                    *self.out_of_range.entry(*channel).or_default() += 1;
                }
            }
        }
    }

    /// Number of records rejected by `rule`.
    #[must_use]
    pub fn count(&self, rule: Rule) -> usize {
        self.rejected.get(&rule).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary() {
        let mut summary = Summary::default();
        summary.add(&FilterDecision::Accept);
        summary.add_decode_error();
        summary.add(&FilterDecision::Reject(Rejection::ManuallyExcluded {
            index: 2,
        }));
        summary.add(&FilterDecision::Reject(Rejection::OutOfPhysicalRange {
            channel: Channel::TempCc,
            value: 900.0,
        }));
        summary.add(&FilterDecision::Reject(Rejection::OutOfPhysicalRange {
            channel: Channel::TempCc,
            value: -900.0,
        }));

        assert_eq!(summary.packets, 5);
        assert_eq!(summary.decoded, 4);
        assert_eq!(summary.decode_errors, 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected_total(), 3);
        assert_eq!(summary.count(Rule::ManuallyExcluded), 1);
        assert_eq!(summary.count(Rule::OutOfPhysicalRange), 2);
        assert_eq!(summary.count(Rule::TimeGapTooLarge), 0);
        assert_eq!(summary.out_of_range[&Channel::TempCc], 2);
    }
}
