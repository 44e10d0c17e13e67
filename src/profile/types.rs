// Profile data types shared by builtin and table-defined profiles

use thiserror::Error;

/// Highest bit a key mask may use (reports carry a 24-bit bitmask)
pub const MAX_MASK: u32 = 0x00FF_FFFF;

/// One row of a profile table: a logical key name and its bitmask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMapping {
    pub name: String,
    pub mask: u32,
}

impl KeyMapping {
    pub fn new(name: impl Into<String>, mask: u32) -> Self {
        Self {
            name: name.into(),
            mask,
        }
    }

    /// True when every bit of this key's mask is set in `bitmask`
    pub fn is_held(&self, bitmask: u32) -> bool {
        bitmask & self.mask == self.mask
    }
}

/// Profile construction and lookup errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("key table is empty")]
    Empty,

    #[error("key {0} has a zero mask")]
    ZeroMask(String),

    #[error("key {name} mask 0x{mask:08X} exceeds 24 bits")]
    MaskTooWide { name: String, mask: u32 },

    #[error("keys {first} and {second} have overlapping masks")]
    Overlap { first: String, second: String },

    #[error("key {0} is defined twice")]
    DuplicateName(String),

    #[error("unknown profile: {0}")]
    UnknownProfile(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_held_requires_all_bits() {
        let key = KeyMapping::new("KEY_COMBO", 0x0003);
        assert!(key.is_held(0x0003));
        assert!(key.is_held(0xFFFF));
        assert!(!key.is_held(0x0001));
        assert!(!key.is_held(0x0000));
    }
}
