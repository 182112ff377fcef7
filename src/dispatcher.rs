//! Match-and-fan-out dispatch for a single received datagram.
//!
//! Kept sans-IO in the spirit of the teacher's `Server` (`relay/server/src/server.rs`): given a
//! received datagram and the Registry, this module only decides *which* (transmitter,
//! destination) pairs should receive it. Actually performing the sends, and turning per-send
//! failures into logged-and-continue diagnostics, is the caller's job (`event_loop.rs`), same
//! split as the teacher's `Command::SendMessage` effects vs. the IO layer that executes them.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::registry::Registry;

/// One planned send: which transmitter to send through, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedSend {
    pub transmitter_id: u32,
    pub destination: SocketAddrV4,
}

/// Computes the fan-out for a datagram that arrived on `listener_id` from `(src_address,
/// src_port)`, in map-insertion order (duplicates included, per SPEC_FULL.md §8 scenario 6).
///
/// Maps whose target or transmitter reference is dangling are silently skipped: the Validator
/// guarantees this never happens for a registry that has passed validation, but `plan` itself
/// makes no such assumption so it stays correct even if called against an unvalidated registry
/// (as the test suite does, to exercise matching logic in isolation).
pub fn plan(
    registry: &Registry,
    listener_id: u32,
    src_address: Ipv4Addr,
    src_port: u16,
) -> Vec<PlannedSend> {
    registry
        .maps()
        .iter()
        .filter(|map| map.matches(listener_id, src_address, src_port))
        .filter_map(|map| registry.find_target(map.target_id))
        .map(|target| PlannedSend {
            transmitter_id: target.transmitter_id,
            destination: SocketAddrV4::new(target.address, target.port),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_fanout() -> Registry {
        let mut registry = Registry::new();
        registry
            .create_listener(2, Ipv4Addr::UNSPECIFIED, 8002)
            .unwrap();
        registry
            .create_transmitter(1, Ipv4Addr::UNSPECIFIED, 0)
            .unwrap();
        registry
            .create_transmitter(2, Ipv4Addr::new(127, 0, 0, 1), 6000)
            .unwrap();
        registry
            .create_target(2, Ipv4Addr::new(127, 0, 0, 1), 9000, 1)
            .unwrap();
        registry
            .create_target(3, Ipv4Addr::new(127, 0, 0, 1), 9001, 2)
            .unwrap();
        registry.create_map(2, Ipv4Addr::UNSPECIFIED, 0, 2);
        registry.create_map(2, Ipv4Addr::UNSPECIFIED, 0, 3);
        registry
    }

    #[test]
    fn fan_out_to_two_targets_in_map_order() {
        let registry = registry_with_fanout();
        let sends = plan(&registry, 2, Ipv4Addr::new(127, 0, 0, 1), 2001);

        assert_eq!(
            sends,
            vec![
                PlannedSend {
                    transmitter_id: 1,
                    destination: SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 9000),
                },
                PlannedSend {
                    transmitter_id: 2,
                    destination: SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 9001),
                },
            ]
        );
    }

    #[test]
    fn non_matching_listener_produces_no_sends() {
        let registry = registry_with_fanout();
        assert!(plan(&registry, 99, Ipv4Addr::new(127, 0, 0, 1), 2001).is_empty());
    }

    #[test]
    fn source_port_filter_only_admits_exact_match() {
        let mut registry = Registry::new();
        registry
            .create_listener(1, Ipv4Addr::UNSPECIFIED, 8003)
            .unwrap();
        registry
            .create_transmitter(1, Ipv4Addr::UNSPECIFIED, 0)
            .unwrap();
        registry
            .create_target(1, Ipv4Addr::new(127, 0, 0, 1), 9000, 1)
            .unwrap();
        registry.create_map(1, Ipv4Addr::UNSPECIFIED, 4000, 1);

        let matching = plan(&registry, 1, Ipv4Addr::new(127, 0, 0, 1), 4000);
        let non_matching = plan(&registry, 1, Ipv4Addr::new(127, 0, 0, 1), 4001);

        assert_eq!(matching.len(), 1);
        assert!(non_matching.is_empty());
    }

    #[test]
    fn duplicate_maps_each_produce_a_send() {
        let mut registry = Registry::new();
        registry
            .create_listener(1, Ipv4Addr::UNSPECIFIED, 8001)
            .unwrap();
        registry
            .create_transmitter(1, Ipv4Addr::UNSPECIFIED, 0)
            .unwrap();
        registry
            .create_target(1, Ipv4Addr::new(127, 0, 0, 1), 9000, 1)
            .unwrap();
        registry.create_map(1, Ipv4Addr::UNSPECIFIED, 0, 1);
        registry.create_map(1, Ipv4Addr::UNSPECIFIED, 0, 1);

        assert_eq!(plan(&registry, 1, Ipv4Addr::new(10, 0, 0, 1), 1).len(), 2);
    }
}
