use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Flag names indexed by bit number (bit 0 is the least significant bit).
pub const FLAG_NAMES: [&str; 8] = [
    "err", "wait", "ok", "ping", "command", "land", "eject", "start",
];

/// Display label order and labels used by [SystemFlags::labels].
const LABELS: [(usize, &str); 8] = [
    (SystemFlags::START, "START"),
    (SystemFlags::EJECT, "DROP"),
    (SystemFlags::PING, "PING"),
    (SystemFlags::OK, "OK"),
    (SystemFlags::ERR, "ERR"),
    (SystemFlags::WAIT, "WAIT"),
    (SystemFlags::COMMAND, "CMD"),
    (SystemFlags::LAND, "LAND"),
];

/// The 8 independent status bits carried in the packet flags byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemFlags(u8);

impl SystemFlags {
    pub const ERR: usize = 0;
    pub const WAIT: usize = 1;
    pub const OK: usize = 2;
    pub const PING: usize = 3;
    pub const COMMAND: usize = 4;
    pub const LAND: usize = 5;
    pub const EJECT: usize = 6;
    pub const START: usize = 7;

    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        SystemFlags(bits)
    }

    #[must_use]
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// State of bit `n`. Bits past 7 are always unset.
    #[must_use]
    pub fn get(&self, n: usize) -> bool {
        n < 8 && (self.0 >> n) & 0x1 == 1
    }

    #[must_use]
    pub fn err(&self) -> bool {
        self.get(Self::ERR)
    }

    #[must_use]
    pub fn wait(&self) -> bool {
        self.get(Self::WAIT)
    }

    #[must_use]
    pub fn ok(&self) -> bool {
        self.get(Self::OK)
    }

    #[must_use]
    pub fn ping(&self) -> bool {
        self.get(Self::PING)
    }

    #[must_use]
    pub fn command(&self) -> bool {
        self.get(Self::COMMAND)
    }

    #[must_use]
    pub fn land(&self) -> bool {
        self.get(Self::LAND)
    }

    #[must_use]
    pub fn eject(&self) -> bool {
        self.get(Self::EJECT)
    }

    #[must_use]
    pub fn start(&self) -> bool {
        self.get(Self::START)
    }

    /// Names of the set flags, lowest bit first.
    pub fn active(&self) -> impl Iterator<Item = &'static str> + '_ {
        FLAG_NAMES
            .iter()
            .enumerate()
            .filter(|(n, _)| self.get(*n))
            .map(|(_, name)| *name)
    }

    /// Bit string with bit 0 first, e.g., `00100001` for `ok` and `start`.
    #[must_use]
    pub fn to_bit_string(&self) -> String {
        (0..8).map(|n| if self.get(n) { '1' } else { '0' }).collect()
    }

    /// Operator display form such as `|START||PING|`, or `|NONE|` when no bit is set.
    #[must_use]
    pub fn labels(&self) -> String {
        let s: String = LABELS
            .iter()
            .filter(|(bit, _)| self.get(*bit))
            .map(|(_, label)| format!("|{label}|"))
            .collect();
        if s.is_empty() {
            "|NONE|".to_string()
        } else {
            s
        }
    }

    /// Bit number for a flag name, case-insensitive.
    ///
    /// # Errors
    /// [Error::UnknownFlag] if `name` is not one of [FLAG_NAMES].
    pub fn bit_for_name(name: &str) -> Result<usize> {
        let name = name.trim();
        FLAG_NAMES
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownFlag(name.to_string()))
    }
}

impl From<u8> for SystemFlags {
    fn from(bits: u8) -> Self {
        SystemFlags(bits)
    }
}

impl Display for SystemFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_bit_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_bits() {
        let flags = SystemFlags::from_bits(0x80 | 0x04);
        assert!(flags.start());
        assert!(flags.ok());
        assert!(!flags.err());
        assert!(!flags.land());
        assert!(!flags.get(8));
        assert_eq!(flags.active().collect::<Vec<_>>(), vec!["ok", "start"]);
    }

    #[test]
    fn bit_string_is_lowest_bit_first() {
        assert_eq!(SystemFlags::from_bits(0x01).to_bit_string(), "10000000");
        assert_eq!(SystemFlags::from_bits(0x84).to_string(), "00100001");
    }

    #[test]
    fn labels() {
        assert_eq!(SystemFlags::default().labels(), "|NONE|");
        assert_eq!(
            SystemFlags::from_bits(0x80 | 0x40 | 0x08 | 0x04).labels(),
            "|START||DROP||PING||OK|"
        );
    }

    #[test]
    fn names() {
        assert_eq!(SystemFlags::bit_for_name("Land").unwrap(), SystemFlags::LAND);
        assert_eq!(SystemFlags::bit_for_name(" eject ").unwrap(), 6);
        assert!(matches!(
            SystemFlags::bit_for_name("drop"),
            Err(Error::UnknownFlag(_))
        ));
    }
}
