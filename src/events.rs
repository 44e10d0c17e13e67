//! Key-transition engine
//!
//! Turns successive key bitmasks into edge-triggered press/release
//! notifications. Only the net change between two consecutive reports is
//! observable: a key released and pressed again between reports produces
//! nothing.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::profile::DeviceProfile;

/// Transition direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Key went from released to held
    Down,
    /// Key went from held to released
    Up,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up => "up",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "down" | "press" | "pressed" => Ok(Direction::Down),
            "up" | "release" | "released" => Ok(Direction::Up),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// Callback receiving the key name
pub type KeyCallback = Box<dyn FnMut(&str) + Send>;

/// Diffs key sets between reports and fires callbacks per changed key
///
/// Key sets are kept as positions in the profile table, so every walk over
/// them follows table order. On each report all releases fire first, then
/// all presses; callbacks for one direction run in registration order.
pub struct KeyEvents {
    profile: Arc<dyn DeviceProfile>,
    current: Vec<usize>,
    previous: Vec<usize>,
    listeners: HashMap<Direction, Vec<KeyCallback>>,
}

impl KeyEvents {
    pub fn new(profile: Arc<dyn DeviceProfile>) -> Self {
        Self {
            profile,
            current: Vec::new(),
            previous: Vec::new(),
            listeners: HashMap::new(),
        }
    }

    pub fn profile(&self) -> &Arc<dyn DeviceProfile> {
        &self.profile
    }

    /// Register a callback for one direction
    pub fn listen<F>(&mut self, direction: Direction, callback: F)
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.listeners
            .entry(direction)
            .or_default()
            .push(Box::new(callback));
    }

    /// Number of callbacks registered for a direction
    pub fn listener_count(&self, direction: Direction) -> usize {
        self.listeners.get(&direction).map_or(0, Vec::len)
    }

    /// Feed one key bitmask
    pub fn report(&mut self, bitmask: u32) {
        self.current = self.profile.held(bitmask);

        let released: Vec<usize> = self
            .previous
            .iter()
            .copied()
            .filter(|i| !self.current.contains(i))
            .collect();
        let pressed: Vec<usize> = self
            .current
            .iter()
            .copied()
            .filter(|i| !self.previous.contains(i))
            .collect();

        for i in released {
            self.fire(Direction::Up, i);
        }
        for i in pressed {
            self.fire(Direction::Down, i);
        }

        self.previous = self.current.clone();
    }

    fn fire(&mut self, direction: Direction, index: usize) {
        let profile = Arc::clone(&self.profile);
        let name = profile.keys()[index].name.as_str();
        match direction {
            Direction::Down => debug!("Pressed {}", name),
            Direction::Up => debug!("Released {}", name),
        }
        if let Some(callbacks) = self.listeners.get_mut(&direction) {
            for callback in callbacks.iter_mut() {
                callback(name);
            }
        }
    }

    /// Keys held according to the latest report, in table order
    pub fn current(&self) -> Vec<&str> {
        self.names(&self.current)
    }

    /// Keys the next report is diffed against, in table order
    pub fn previous(&self) -> Vec<&str> {
        self.names(&self.previous)
    }

    fn names(&self, set: &[usize]) -> Vec<&str> {
        let keys = self.profile.keys();
        set.iter().map(|&i| keys[i].name.as_str()).collect()
    }
}
