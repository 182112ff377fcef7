//! In-memory catalog of configured entities.
//!
//! Mirrors the teacher's `Server` in `relay/server/src/server.rs`: entities are indexed by id in
//! `HashMap`s (never by raw file descriptor), and lookups that sit in the per-packet hot path
//! (`find_transmitter`, `find_target`) are amortized O(1).

use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::error::ConfigurationError;
use crate::model::{is_valid_nonzero_port, Listener, Map, Target, Transmitter};

/// Owns every Listener, Transmitter, Target, and Map record for the process lifetime.
///
/// Entities are created during configuration and are immutable once the event loop starts;
/// this type enforces the former but relies on the caller not mutating it after that point
/// (see SPEC_FULL.md §5).
#[derive(Debug, Default)]
pub struct Registry {
    listeners: HashMap<u32, Listener>,
    transmitters: HashMap<u32, Transmitter>,
    targets: HashMap<u32, Target>,
    maps: Vec<Map>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and records a listener. Does not open any socket; that is the caller's job
    /// once every entity has been accepted (so all configuration errors can be reported before
    /// any socket is opened).
    pub fn create_listener(
        &mut self,
        id: u32,
        address: Ipv4Addr,
        port: u16,
    ) -> Result<(), ConfigurationError> {
        if id == 0 {
            return Err(ConfigurationError::NonPositiveListenerId(0));
        }
        if port == 0 {
            return Err(ConfigurationError::ZeroListenerPort);
        }
        if !is_valid_nonzero_port(port) {
            return Err(ConfigurationError::PortOutOfRange(port as u32));
        }
        if self.listeners.contains_key(&id) {
            return Err(ConfigurationError::DuplicateListenerId(id));
        }

        self.listeners.insert(id, Listener { id, address, port });
        Ok(())
    }

    /// Validates and records a transmitter. `port == 0` means ephemeral and is accepted.
    pub fn create_transmitter(
        &mut self,
        id: u32,
        address: Ipv4Addr,
        port: u16,
    ) -> Result<(), ConfigurationError> {
        if id == 0 {
            return Err(ConfigurationError::NonPositiveTransmitterId(0));
        }
        if port != 0 && !is_valid_nonzero_port(port) {
            return Err(ConfigurationError::PortOutOfRange(port as u32));
        }
        if self.transmitters.contains_key(&id) {
            return Err(ConfigurationError::DuplicateTransmitterId(id));
        }

        self.transmitters
            .insert(id, Transmitter { id, address, port });
        Ok(())
    }

    pub fn create_target(
        &mut self,
        id: u32,
        address: Ipv4Addr,
        port: u16,
        transmitter_id: u32,
    ) -> Result<(), ConfigurationError> {
        if id == 0 {
            return Err(ConfigurationError::NonPositiveTargetId(0));
        }
        if transmitter_id == 0 {
            return Err(ConfigurationError::NonPositiveTransmitterReference(0));
        }
        if address == Ipv4Addr::UNSPECIFIED {
            return Err(ConfigurationError::ZeroTargetAddress);
        }
        if port == 0 {
            return Err(ConfigurationError::ZeroTargetPort);
        }
        if !is_valid_nonzero_port(port) {
            return Err(ConfigurationError::PortOutOfRange(port as u32));
        }
        if self.targets.contains_key(&id) {
            return Err(ConfigurationError::DuplicateTargetId(id));
        }

        self.targets.insert(
            id,
            Target {
                id,
                address,
                port,
                transmitter_id,
            },
        );
        Ok(())
    }

    /// Appends a map record. No duplicate detection: identical maps are intentionally allowed
    /// and produce duplicate forwards (see SPEC_FULL.md §8 scenario 6).
    pub fn create_map(
        &mut self,
        listener_id: u32,
        src_address: Ipv4Addr,
        src_port: u16,
        target_id: u32,
    ) {
        self.maps.push(Map {
            listener_id,
            src_address,
            src_port,
            target_id,
        });
    }

    pub fn find_listener(&self, id: u32) -> Option<&Listener> {
        self.listeners.get(&id)
    }

    pub fn find_transmitter(&self, id: u32) -> Option<&Transmitter> {
        self.transmitters.get(&id)
    }

    pub fn find_target(&self, id: u32) -> Option<&Target> {
        self.targets.get(&id)
    }

    pub fn listeners(&self) -> impl Iterator<Item = &Listener> {
        self.listeners.values()
    }

    pub fn transmitters(&self) -> impl Iterator<Item = &Transmitter> {
        self.transmitters.values()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Maps in insertion order; matching semantics and fan-out ordering depend on this.
    pub fn maps(&self) -> &[Map] {
        &self.maps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_listener_id_is_rejected() {
        let mut registry = Registry::new();
        registry
            .create_listener(1, Ipv4Addr::UNSPECIFIED, 8001)
            .unwrap();

        let err = registry
            .create_listener(1, Ipv4Addr::UNSPECIFIED, 8002)
            .unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateListenerId(1));
    }

    #[test]
    fn listener_port_must_be_nonzero_and_in_range() {
        let mut registry = Registry::new();
        assert_eq!(
            registry
                .create_listener(1, Ipv4Addr::UNSPECIFIED, 0)
                .unwrap_err(),
            ConfigurationError::ZeroListenerPort
        );

        let mut registry = Registry::new();
        assert_eq!(
            registry
                .create_listener(1, Ipv4Addr::UNSPECIFIED, 1024)
                .unwrap_err(),
            ConfigurationError::PortOutOfRange(1024)
        );
    }

    #[test]
    fn transmitter_accepts_ephemeral_port() {
        let mut registry = Registry::new();
        registry
            .create_transmitter(1, Ipv4Addr::UNSPECIFIED, 0)
            .unwrap();

        assert!(registry.find_transmitter(1).is_some());
    }

    #[test]
    fn target_rejects_wildcard_address_and_port() {
        let mut registry = Registry::new();
        assert_eq!(
            registry
                .create_target(1, Ipv4Addr::UNSPECIFIED, 9000, 1)
                .unwrap_err(),
            ConfigurationError::ZeroTargetAddress
        );

        let mut registry = Registry::new();
        assert_eq!(
            registry
                .create_target(1, Ipv4Addr::new(127, 0, 0, 1), 0, 1)
                .unwrap_err(),
            ConfigurationError::ZeroTargetPort
        );
    }

    #[test]
    fn maps_preserve_insertion_order_including_duplicates() {
        let mut registry = Registry::new();
        registry.create_map(1, Ipv4Addr::UNSPECIFIED, 0, 1);
        registry.create_map(1, Ipv4Addr::UNSPECIFIED, 0, 1);
        registry.create_map(1, Ipv4Addr::UNSPECIFIED, 0, 2);

        let target_ids: Vec<u32> = registry.maps().iter().map(|m| m.target_id).collect();
        assert_eq!(target_ids, vec![1, 1, 2]);
    }
}
