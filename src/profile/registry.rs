// Profile registry
// Central registry for looking up device profiles by name

use super::builtin::FireTvRemote;
use super::traits::DeviceProfile;
use super::types::ProfileError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry for device profiles, indexed by internal name
pub struct ProfileRegistry {
    by_name: BTreeMap<String, Arc<dyn DeviceProfile>>,
}

impl ProfileRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            by_name: BTreeMap::new(),
        }
    }

    /// Create a registry with builtin profiles pre-loaded
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.load_builtins();
        registry
    }

    /// Load all builtin profiles
    pub fn load_builtins(&mut self) {
        self.register(Arc::new(FireTvRemote::new()));
    }

    /// Register a profile, replacing any profile with the same name
    pub fn register(&mut self, profile: Arc<dyn DeviceProfile>) {
        self.by_name.insert(profile.name().to_string(), profile);
    }

    /// Find profile by name
    pub fn find(&self, name: &str) -> Option<Arc<dyn DeviceProfile>> {
        self.by_name.get(name).cloned()
    }

    /// Find profile by name, failing with `UnknownProfile`
    pub fn get(&self, name: &str) -> Result<Arc<dyn DeviceProfile>, ProfileError> {
        self.find(name)
            .ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.by_name.keys().map(String::as_str).collect()
    }

    /// Get the number of registered profiles
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::table::KeyTable;

    #[test]
    fn test_registry_with_builtins() {
        let registry = ProfileRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["fire-tv"]);

        let profile = registry.get("fire-tv").unwrap();
        assert_eq!(profile.display_name(), "Amazon Fire TV Remote");
    }

    #[test]
    fn test_unknown_profile() {
        let registry = ProfileRegistry::with_builtins();
        assert_eq!(
            registry.get("nope").err(),
            Some(ProfileError::UnknownProfile("nope".into()))
        );
    }

    #[test]
    fn test_register_table() {
        let mut registry = ProfileRegistry::with_builtins();
        let table = KeyTable::from_pairs("custom", [("KEY_OK", 0x10)]).unwrap();
        registry.register(Arc::new(table));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["custom", "fire-tv"]);
        assert_eq!(registry.get("custom").unwrap().keys()[0].mask, 0x10);
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut registry = ProfileRegistry::with_builtins();
        let table = KeyTable::from_pairs(FireTvRemote::NAME, [("KEY_OK", 0x10)]).unwrap();
        registry.register(Arc::new(table));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find(FireTvRemote::NAME).unwrap().keys().len(), 1);
        assert!(registry.get("missing").is_err());
    }
}
