// Table-defined profiles
// Key tables supplied at config time, validated before use

use super::traits::DeviceProfile;
use super::types::{KeyMapping, ProfileError, MAX_MASK};
use std::collections::HashSet;

/// Check a key table: non-empty, non-zero 24-bit masks, disjoint masks,
/// unique names
pub fn validate(keys: &[KeyMapping]) -> Result<(), ProfileError> {
    if keys.is_empty() {
        return Err(ProfileError::Empty);
    }

    let mut names = HashSet::new();
    for (i, key) in keys.iter().enumerate() {
        if key.mask == 0 {
            return Err(ProfileError::ZeroMask(key.name.clone()));
        }
        if key.mask & !MAX_MASK != 0 {
            return Err(ProfileError::MaskTooWide {
                name: key.name.clone(),
                mask: key.mask,
            });
        }
        if !names.insert(key.name.as_str()) {
            return Err(ProfileError::DuplicateName(key.name.clone()));
        }
        if let Some(other) = keys[..i].iter().find(|k| k.mask & key.mask != 0) {
            return Err(ProfileError::Overlap {
                first: other.name.clone(),
                second: key.name.clone(),
            });
        }
    }
    Ok(())
}

/// A profile built from a validated (name, mask) table
#[derive(Debug, Clone)]
pub struct KeyTable {
    name: String,
    display_name: String,
    keys: Vec<KeyMapping>,
}

impl KeyTable {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        keys: Vec<KeyMapping>,
    ) -> Result<Self, ProfileError> {
        validate(&keys)?;
        Ok(Self {
            name: name.into(),
            display_name: display_name.into(),
            keys,
        })
    }

    /// Build from plain (name, mask) pairs
    pub fn from_pairs<'a, I>(name: &str, pairs: I) -> Result<Self, ProfileError>
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        let keys = pairs
            .into_iter()
            .map(|(key, mask)| KeyMapping::new(key, mask))
            .collect();
        Self::new(name, name, keys)
    }
}

impl DeviceProfile for KeyTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn keys(&self) -> &[KeyMapping] {
        &self.keys
    }
}
