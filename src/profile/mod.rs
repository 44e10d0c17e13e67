// Device profile module
// Maps key bitmasks to logical key names for each supported remote

pub mod builtin;
pub mod registry;
pub mod table;
pub mod traits;
pub mod types;

pub use builtin::{FireTvRemote, FIRE_TV_KEYS};
pub use registry::ProfileRegistry;
pub use table::KeyTable;
pub use traits::DeviceProfile;
pub use types::{KeyMapping, ProfileError, MAX_MASK};
