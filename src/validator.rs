//! Cross-reference validation, run once after configuration and before the event loop.
//!
//! All violations are collected before returning, so an operator sees every error in one run
//! (SPEC_FULL.md §4.3); this is also what makes the check idempotent: running it twice against
//! an unchanged `Registry` always produces the same set of `ValidationError`s.

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::registry::Registry;

/// Runs every cross-reference and usage check against `registry`, returning every violation
/// found. An empty result means the registry is safe to hand to the event loop.
pub fn validate(registry: &Registry) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut referenced_targets = HashSet::new();
    for map in registry.maps() {
        if registry.find_target(map.target_id).is_none() {
            errors.push(ValidationError::UndefinedTarget(map.target_id));
        } else {
            referenced_targets.insert(map.target_id);
        }

        if registry.find_listener(map.listener_id).is_none() {
            errors.push(ValidationError::UndefinedListener(map.listener_id));
        }
    }

    let mut referenced_transmitters = HashSet::new();
    for target in registry.targets() {
        if registry.find_transmitter(target.transmitter_id).is_none() {
            errors.push(ValidationError::UndefinedTransmitter(
                target.transmitter_id,
                target.id,
            ));
        } else {
            referenced_transmitters.insert(target.transmitter_id);
        }

        if !referenced_targets.contains(&target.id) {
            errors.push(ValidationError::UnusedTarget(target.id));
        }
    }

    for transmitter in registry.transmitters() {
        if !referenced_transmitters.contains(&transmitter.id) {
            errors.push(ValidationError::UnusedTransmitter(transmitter.id));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn valid_registry() -> Registry {
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
        registry
    }

    #[test]
    fn fully_wired_registry_passes() {
        assert_eq!(validate(&valid_registry()), Vec::new());
    }

    #[test]
    fn dangling_map_target_is_reported() {
        let mut registry = valid_registry();
        registry.create_map(1, Ipv4Addr::UNSPECIFIED, 0, 99);

        let errors = validate(&registry);
        assert!(errors.contains(&ValidationError::UndefinedTarget(99)));
    }

    #[test]
    fn unused_target_is_reported() {
        let mut registry = valid_registry();
        registry
            .create_target(2, Ipv4Addr::new(127, 0, 0, 1), 9001, 1)
            .unwrap();

        let errors = validate(&registry);
        assert!(errors.contains(&ValidationError::UnusedTarget(2)));
    }

    #[test]
    fn unused_transmitter_is_reported() {
        let mut registry = valid_registry();
        registry
            .create_transmitter(7, Ipv4Addr::UNSPECIFIED, 0)
            .unwrap();

        let errors = validate(&registry);
        assert!(errors.contains(&ValidationError::UnusedTransmitter(7)));
    }

    #[test]
    fn dangling_target_transmitter_is_reported() {
        let mut registry = Registry::new();
        registry
            .create_listener(1, Ipv4Addr::UNSPECIFIED, 8001)
            .unwrap();
        registry
            .create_target(1, Ipv4Addr::new(127, 0, 0, 1), 9000, 42)
            .unwrap();
        registry.create_map(1, Ipv4Addr::UNSPECIFIED, 0, 1);

        let errors = validate(&registry);
        assert!(errors.contains(&ValidationError::UndefinedTransmitter(42, 1)));
    }

    #[test]
    fn validation_is_idempotent() {
        let registry = valid_registry();
        assert_eq!(validate(&registry), validate(&registry));
    }
}
