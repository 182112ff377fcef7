//! The concrete JSON configuration parser (SPEC_FULL.md §6 / §4.7).
//!
//! This is the one component the distilled spec names as "deliberately out of scope... treated
//! as an external collaborator". It is implemented here anyway so the crate is runnable
//! end-to-end; it produces nothing the core didn't already define `create_*` calls for, and the
//! core (`Registry`, `Validator`) has no idea this module exists.

use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::registry::Registry;

const WILDCARD: &str = "*";

#[derive(Debug, Deserialize, Default)]
struct Document {
    #[serde(default)]
    listen: Vec<RawListen>,
    #[serde(default)]
    transmit: Vec<RawTransmit>,
    #[serde(default)]
    target: Vec<RawTarget>,
    #[serde(default)]
    map: Vec<RawMap>,
}

#[derive(Debug, Deserialize)]
struct RawListen {
    id: i64,
    address: String,
    port: String,
}

#[derive(Debug, Deserialize)]
struct RawTransmit {
    id: i64,
    address: String,
    port: String,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    id: i64,
    address: String,
    port: String,
    transmitter: i64,
}

#[derive(Debug, Deserialize)]
struct RawMap {
    source: i64,
    target: Vec<i64>,
    address: String,
    port: String,
}

/// Parses `source` as the canonical JSON configuration document and replays it as `create_*`
/// calls against a fresh `Registry`.
///
/// Every malformed field is collected rather than reported one at a time; the returned `Err`
/// holds every `ConfigurationError` found. A successful parse does not imply the resulting
/// registry passes validation — that is `validator::validate`'s job.
pub fn parse(source: &str) -> Result<Registry, Vec<ConfigurationError>> {
    let document: Document = serde_json::from_str(source)
        .map_err(|e| vec![ConfigurationError::MalformedDocument(e.to_string())])?;

    let mut registry = Registry::new();
    let mut errors = Vec::new();

    for listen in &document.listen {
        match build_listener(listen) {
            Ok((id, address, port)) => {
                if let Err(e) = registry.create_listener(id, address, port) {
                    errors.push(e);
                }
            }
            Err(e) => errors.push(e),
        }
    }

    for transmit in &document.transmit {
        match build_transmitter(transmit) {
            Ok((id, address, port)) => {
                if let Err(e) = registry.create_transmitter(id, address, port) {
                    errors.push(e);
                }
            }
            Err(e) => errors.push(e),
        }
    }

    for target in &document.target {
        match build_target(target) {
            Ok((id, address, port, transmitter_id)) => {
                if let Err(e) = registry.create_target(id, address, port, transmitter_id) {
                    errors.push(e);
                }
            }
            Err(e) => errors.push(e),
        }
    }

    for map in &document.map {
        match build_maps(map) {
            Ok(entries) => {
                for (listener_id, src_address, src_port, target_id) in entries {
                    registry.create_map(listener_id, src_address, src_port, target_id);
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(registry)
    } else {
        Err(errors)
    }
}

fn build_listener(raw: &RawListen) -> Result<(u32, Ipv4Addr, u16), ConfigurationError> {
    let id = parse_id(raw.id, ConfigurationError::NonPositiveListenerId)?;
    let address = parse_address(&raw.address)?;
    let port = parse_port(&raw.port)?;
    Ok((id, address, port))
}

fn build_transmitter(raw: &RawTransmit) -> Result<(u32, Ipv4Addr, u16), ConfigurationError> {
    let id = parse_id(raw.id, ConfigurationError::NonPositiveTransmitterId)?;
    let address = parse_address(&raw.address)?;
    let port = parse_port(&raw.port)?;
    Ok((id, address, port))
}

fn build_target(raw: &RawTarget) -> Result<(u32, Ipv4Addr, u16, u32), ConfigurationError> {
    let id = parse_id(raw.id, ConfigurationError::NonPositiveTargetId)?;
    let address = parse_address(&raw.address)?;
    let port = parse_port(&raw.port)?;
    let transmitter_id = parse_id(
        raw.transmitter,
        ConfigurationError::NonPositiveTransmitterReference,
    )?;
    Ok((id, address, port, transmitter_id))
}

/// Expands a `map` object listing multiple target ids into one `(listener_id, src_address,
/// src_port, target_id)` tuple per target id, all sharing the other fields, preserving the
/// order the target ids were listed in (SPEC_FULL.md §4.7).
fn build_maps(raw: &RawMap) -> Result<Vec<(u32, Ipv4Addr, u16, u32)>, ConfigurationError> {
    let listener_id = parse_id(raw.source, ConfigurationError::NonPositiveListenerId)?;
    let src_address = parse_address(&raw.address)?;
    let src_port = parse_port(&raw.port)?;

    raw.target
        .iter()
        .map(|&target_id| {
            let target_id = parse_id(target_id, ConfigurationError::NonPositiveTargetId)?;
            Ok((listener_id, src_address, src_port, target_id))
        })
        .collect()
}

fn parse_id(raw: i64, err: fn(i64) -> ConfigurationError) -> Result<u32, ConfigurationError> {
    u32::try_from(raw).map_err(|_| err(raw))
}

/// `"*"` maps to the wildcard address `0.0.0.0`; anything else must be an IPv4 dotted-quad
/// literal. Whether the wildcard is actually *allowed* for a given field (e.g. target address
/// must be non-wildcard) is enforced downstream by the `Registry`, which keeps this parser
/// field-agnostic.
fn parse_address(raw: &str) -> Result<Ipv4Addr, ConfigurationError> {
    if raw == WILDCARD {
        return Ok(Ipv4Addr::UNSPECIFIED);
    }

    Ipv4Addr::from_str(raw)
        .map_err(|e| ConfigurationError::InvalidAddress(raw.to_string(), e.to_string()))
}

/// `"*"` maps to the wildcard/ephemeral port `0`; anything else must parse as `1025..=65535`.
/// Whether `0` is actually allowed for a given field (listener port never is) is enforced
/// downstream by the `Registry`.
fn parse_port(raw: &str) -> Result<u16, ConfigurationError> {
    if raw == WILDCARD {
        return Ok(0);
    }

    let port: u16 = raw
        .parse()
        .map_err(|e: std::num::ParseIntError| {
            ConfigurationError::InvalidPort(raw.to_string(), e.to_string())
        })?;

    if !crate::model::is_valid_nonzero_port(port) {
        return Err(ConfigurationError::PortOutOfRange(port as u32));
    }

    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_FORWARD: &str = r#"{
        "listen": [{"id": 1, "address": "*", "port": "8001"}],
        "transmit": [{"id": 1, "address": "*", "port": "*"}],
        "target": [{"id": 1, "address": "127.0.0.1", "port": "9000", "transmitter": 1}],
        "map": [{"source": 1, "target": [1], "address": "*", "port": "*"}]
    }"#;

    #[test]
    fn parses_single_forward_scenario_and_passes_validation() {
        let registry = parse(SINGLE_FORWARD).unwrap();
        assert!(crate::validator::validate(&registry).is_empty());
    }

    #[test]
    fn map_with_multiple_targets_expands_to_one_map_per_target() {
        let document = r#"{
            "listen": [{"id": 2, "address": "*", "port": "8002"}],
            "transmit": [
                {"id": 1, "address": "*", "port": "*"},
                {"id": 2, "address": "127.0.0.1", "port": "6000"}
            ],
            "target": [
                {"id": 2, "address": "127.0.0.1", "port": "9000", "transmitter": 1},
                {"id": 3, "address": "127.0.0.1", "port": "9001", "transmitter": 2}
            ],
            "map": [{"source": 2, "target": [2, 3], "address": "*", "port": "*"}]
        }"#;

        let registry = parse(document).unwrap();
        let target_ids: Vec<u32> = registry.maps().iter().map(|m| m.target_id).collect();
        assert_eq!(target_ids, vec![2, 3]);
    }

    #[test]
    fn malformed_json_is_reported() {
        let errors = parse("{ not json").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ConfigurationError::MalformedDocument(_)));
    }

    #[test]
    fn invalid_address_literal_is_reported() {
        let document = r#"{
            "listen": [{"id": 1, "address": "not-an-ip", "port": "8001"}]
        }"#;

        let errors = parse(document).unwrap_err();
        assert!(matches!(errors[0], ConfigurationError::InvalidAddress(_, _)));
    }

    #[test]
    fn out_of_range_port_is_reported() {
        let document = r#"{
            "listen": [{"id": 1, "address": "*", "port": "80"}]
        }"#;

        let errors = parse(document).unwrap_err();
        assert_eq!(errors[0], ConfigurationError::PortOutOfRange(80));
    }

    #[test]
    fn negative_id_is_reported() {
        let document = r#"{
            "listen": [{"id": -1, "address": "*", "port": "8001"}]
        }"#;

        let errors = parse(document).unwrap_err();
        assert_eq!(errors[0], ConfigurationError::NonPositiveListenerId(-1));
    }

    #[test]
    fn every_error_in_the_document_is_collected_in_one_pass() {
        let document = r#"{
            "listen": [
                {"id": -1, "address": "*", "port": "8001"},
                {"id": 2, "address": "bad", "port": "8002"}
            ]
        }"#;

        let errors = parse(document).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
