// Device profile trait definition
// Provides abstraction over per-remote key tables

use super::types::KeyMapping;

/// Device profile trait - a fixed, ordered table of (key name, mask) pairs
///
/// This trait is object-safe for dynamic dispatch (Arc<dyn DeviceProfile>).
/// Implementations can be builtin Rust structs or tables built from config.
/// Table order is significant: key lookups and event firing follow it.
pub trait DeviceProfile: Send + Sync {
    /// Internal name (e.g., "fire-tv")
    fn name(&self) -> &str;

    /// User-facing display name (e.g., "Amazon Fire TV Remote")
    fn display_name(&self) -> &str;

    /// The ordered key table
    fn keys(&self) -> &[KeyMapping];

    /// Table positions of all keys held in `bitmask`, in table order
    fn held(&self, bitmask: u32) -> Vec<usize> {
        self.keys()
            .iter()
            .enumerate()
            .filter(|(_, k)| k.is_held(bitmask))
            .map(|(i, _)| i)
            .collect()
    }
}
