// Builtin device profiles
// Hardcoded tables for known remotes (no config needed)

use super::traits::DeviceProfile;
use super::types::KeyMapping;

/// Amazon Fire TV remote key table, in firing order
pub const FIRE_TV_KEYS: &[(&str, u32)] = &[
    ("KEY_SEARCH", 0x000001),
    ("KEY_UP", 0x000200),
    ("KEY_HOMEPAGE", 0x002000),
    ("KEY_BACK", 0x200000),
    ("KEY_RIGHT", 0x000400),
    ("KEY_DOWN", 0x004000),
    ("KEY_LEFT", 0x040000),
    ("KEY_KPENTER", 0x400000),
    ("KEY_FASTFORWARD", 0x000800),
    ("KEY_MENU", 0x008000),
    ("KEY_REWIND", 0x080000),
    ("KEY_PLAYPAUSE", 0x800000),
];

/// Amazon Fire TV remote builtin profile
pub struct FireTvRemote {
    keys: Vec<KeyMapping>,
}

impl FireTvRemote {
    pub const NAME: &'static str = "fire-tv";

    pub fn new() -> Self {
        Self {
            keys: FIRE_TV_KEYS
                .iter()
                .map(|&(name, mask)| KeyMapping::new(name, mask))
                .collect(),
        }
    }
}

impl Default for FireTvRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceProfile for FireTvRemote {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn display_name(&self) -> &str {
        "Amazon Fire TV Remote"
    }

    fn keys(&self) -> &[KeyMapping] {
        &self.keys
    }
}
