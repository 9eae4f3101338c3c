//! Registry Module
//!
//! Client to frame mapping with stable insertion order. The order index
//! drives focus cycling; the map answers framing lookups during event
//! dispatch.

use std::collections::HashMap;

use x11rb::protocol::xproto::Window;

use crate::error::FatalError;

/// Managed client windows and their frames
#[derive(Debug, Default)]
pub struct ClientRegistry {
    frames: HashMap<Window, Window>,
    order: Vec<Window>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client with its frame. Double registration means the
    /// manager's bookkeeping diverged from the server and is fatal.
    pub fn insert(&mut self, client: Window, frame: Window) -> Result<(), FatalError> {
        if self.frames.contains_key(&client) {
            return Err(FatalError::Invariant(format!(
                "window {client} is already framed"
            )));
        }
        self.frames.insert(client, frame);
        self.order.push(client);
        Ok(())
    }

    /// Remove a client, returning its frame. Unknown clients are fatal.
    pub fn remove(&mut self, client: Window) -> Result<Window, FatalError> {
        let frame = self.frames.remove(&client).ok_or_else(|| {
            FatalError::Invariant(format!("window {client} is not framed"))
        })?;
        self.order.retain(|&w| w != client);
        Ok(frame)
    }

    pub fn contains(&self, client: Window) -> bool {
        self.frames.contains_key(&client)
    }

    pub fn frame_of(&self, client: Window) -> Option<Window> {
        self.frames.get(&client).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Clients in insertion order
    pub fn clients(&self) -> impl Iterator<Item = Window> + '_ {
        self.order.iter().copied()
    }

    /// Cyclic successor of a client in insertion order
    pub fn next_after(&self, client: Window) -> Option<Window> {
        let pos = self.order.iter().position(|&w| w == client)?;
        Some(self.order[(pos + 1) % self.order.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut registry = ClientRegistry::new();
        registry.insert(10, 100).unwrap();
        registry.insert(20, 200).unwrap();

        assert_eq!(registry.frame_of(10), Some(100));
        assert_eq!(registry.frame_of(20), Some(200));
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
    }

    #[test]
    fn duplicate_insert_is_an_error() {
        let mut registry = ClientRegistry::new();
        registry.insert(10, 100).unwrap();
        assert!(registry.insert(10, 101).is_err());
        assert_eq!(registry.frame_of(10), Some(100));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_unknown_is_an_error() {
        let mut registry = ClientRegistry::new();
        assert!(registry.remove(10).is_err());
    }

    #[test]
    fn remove_affects_exactly_one_entry() {
        let mut registry = ClientRegistry::new();
        registry.insert(10, 100).unwrap();
        registry.insert(20, 200).unwrap();
        registry.insert(30, 300).unwrap();

        let frame = registry.remove(20).unwrap();
        assert_eq!(frame, 200);
        assert!(!registry.contains(20));
        assert_eq!(registry.frame_of(10), Some(100));
        assert_eq!(registry.frame_of(30), Some(300));
        assert_eq!(registry.clients().collect::<Vec<_>>(), vec![10, 30]);
    }

    #[test]
    fn cycle_visits_every_client_once_per_lap() {
        let mut registry = ClientRegistry::new();
        registry.insert(10, 100).unwrap();
        registry.insert(20, 200).unwrap();
        registry.insert(30, 300).unwrap();

        let mut visited = Vec::new();
        let mut current = 10;
        for _ in 0..registry.len() {
            current = registry.next_after(current).unwrap();
            visited.push(current);
        }
        assert_eq!(visited, vec![20, 30, 10]);
    }

    #[test]
    fn single_client_cycles_to_itself() {
        let mut registry = ClientRegistry::new();
        registry.insert(10, 100).unwrap();
        assert_eq!(registry.next_after(10), Some(10));
    }
}
