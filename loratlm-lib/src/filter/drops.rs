use std::{ops::RangeInclusive, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::Deserialize;

use crate::prelude::*;

/// A single index or an inclusive `<start>-<end>` range.
static DROP_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)|(\d+)\s*-\s*(\d+))$").expect("regex to compile")
});

/// Raw packet positions an operator has chosen to discard.
///
/// Parsed from a CSV of indices and inclusive ranges, e.g., `17,42,153-160`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct DropSet {
    ranges: Vec<RangeInclusive<usize>>,
}

impl DropSet {
    /// Parse a drop list. Empty items are ignored.
    ///
    /// # Errors
    /// [Error::InvalidDropSet] for any item that is not a number or a `<start>-<end>` range
    /// with `start <= end`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |item: &str| Error::InvalidDropSet {
            item: item.to_string(),
        };
        let number = |item: &str, v: &str| v.parse::<usize>().map_err(|_| invalid(item));

        let mut ranges = Vec::default();
        for item in s.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some(cap) = DROP_ITEM.captures(item) else {
                return Err(invalid(item));
            };
            if let Some(single) = cap.get(1) {
                let x = number(item, single.as_str())?;
                ranges.push(x..=x);
            } else {
                let start = number(item, &cap[2])?;
                let end = number(item, &cap[3])?;
                if start > end {
                    return Err(invalid(item));
                }
                ranges.push(start..=end);
            }
        }

        Ok(DropSet { ranges })
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.ranges.iter().any(|r| r.contains(&index))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> impl Iterator<Item = &RangeInclusive<usize>> {
        self.ranges.iter()
    }
}

impl FromStr for DropSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DropSet::parse(s)
    }
}

impl TryFrom<String> for DropSet {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        DropSet::parse(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn indices_and_ranges() {
        let drops = DropSet::parse("5,10-12").unwrap();
        let dropped: Vec<usize> = (0..20).filter(|i| drops.contains(*i)).collect();
        assert_eq!(dropped, vec![5, 10, 11, 12]);
    }

    #[test]
    fn whitespace_and_empty_items() {
        let drops = DropSet::parse(" 5 , 10 - 12 ,,").unwrap();
        assert_eq!(drops.ranges().count(), 2);
        assert!(drops.contains(11));
        assert!(DropSet::parse("").unwrap().is_empty());
    }

    #[test]
    fn single_element_range() {
        let drops = DropSet::parse("7-7").unwrap();
        assert!(drops.contains(7));
        assert!(!drops.contains(8));
    }

    #[test]
    fn large_range_is_not_expanded() {
        let drops = DropSet::parse("0-4000000000").unwrap();
        assert_eq!(drops.ranges().count(), 1);
        assert!(drops.contains(3_000_000_000));
    }

    #[test]
    fn parse_shared_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|i| std::thread::spawn(move || DropSet::parse(&format!("{i},10-12")).unwrap()))
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let drops = handle.join().unwrap();
            assert!(drops.contains(i));
            assert!(drops.contains(11));
        }
    }

    #[test_case("5-"; "open range")]
    #[test_case("a"; "not a number")]
    #[test_case("7-3"; "reversed range")]
    #[test_case("-4"; "negative")]
    #[test_case("1,2;3"; "bad delimiter")]
    #[test_case("99999999999999999999999"; "overflow")]
    fn invalid(s: &str) {
        let zult = DropSet::parse(s);
        assert!(
            matches!(zult, Err(Error::InvalidDropSet { .. })),
            "{s:?} gave {zult:?}"
        );
    }
}
