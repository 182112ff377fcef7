//! Error kinds per component, following the fatal-setup vs. log-and-continue split.

use std::net::Ipv4Addr;

/// A malformed or out-of-range configuration value. Fatal: all detected errors are collected
/// during a single configuration pass, then reported together.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ConfigurationError {
    #[error("listener id must be a positive integer, got {0}")]
    NonPositiveListenerId(i64),
    #[error("transmitter id must be a positive integer, got {0}")]
    NonPositiveTransmitterId(i64),
    #[error("target id must be a positive integer, got {0}")]
    NonPositiveTargetId(i64),
    #[error("transmitter_id referenced by target must be a positive integer, got {0}")]
    NonPositiveTransmitterReference(i64),

    #[error("duplicate listener id {0}")]
    DuplicateListenerId(u32),
    #[error("duplicate transmitter id {0}")]
    DuplicateTransmitterId(u32),
    #[error("duplicate target id {0}")]
    DuplicateTargetId(u32),

    #[error("port {0} is out of range; must be 0 (wildcard/ephemeral, where allowed) or 1025-65535")]
    PortOutOfRange(u32),
    #[error("listener port must be non-zero")]
    ZeroListenerPort,
    #[error("target address must not be the wildcard 0.0.0.0")]
    ZeroTargetAddress,
    #[error("target port must be non-zero")]
    ZeroTargetPort,

    #[error("invalid IPv4 literal {0:?}: {1}")]
    InvalidAddress(String, String),
    #[error("invalid port literal {0:?}: {1}")]
    InvalidPort(String, String),
    #[error("missing required field {0:?} on {1}")]
    MissingField(&'static str, &'static str),
    #[error("malformed configuration document: {0}")]
    MalformedDocument(String),
}

/// A dangling cross-reference or unused defined entity, caught by the Validator.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ValidationError {
    #[error("Target {0} referenced in map but not defined")]
    UndefinedTarget(u32),
    #[error("Transmitter {0} referenced by target {1} but not defined")]
    UndefinedTransmitter(u32, u32),
    #[error("Listener {0} referenced in map but not defined")]
    UndefinedListener(u32),
    #[error("Target {0} is defined but not used by any map")]
    UnusedTarget(u32),
    #[error("Transmitter {0} is defined but not used by any target")]
    UnusedTransmitter(u32),
}

/// Socket creation, binding, or option-setting failure. Fatal during setup.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("failed to create UDP socket: {0}")]
    Create(#[source] std::io::Error),
    #[error("failed to set socket option on socket bound to {address}:{port}: {source}")]
    SetOption {
        address: Ipv4Addr,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind socket to {address}:{port}: {source}")]
    Bind {
        address: Ipv4Addr,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to register socket with poller: {0}")]
    Register(#[source] std::io::Error),
}

/// Exceeding an implementation-defined socket cap. Fatal during setup. Not raised by this
/// implementation's own logic (it imposes no socket cap beyond OS file-descriptor limits), but
/// modeled so a deployment can wire a limit in without changing call sites.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
#[error("socket limit exceeded: {attempted} sockets requested, limit is {limit}")]
pub struct ResourceExhaustion {
    pub attempted: usize,
    pub limit: usize,
}

/// Per-packet receive failure. Logged and the datagram is dropped; never retried.
#[derive(Debug, thiserror::Error)]
#[error("failed to receive datagram on listener {listener_id}: {source}")]
pub struct RuntimeRecvError {
    pub listener_id: u32,
    #[source]
    pub source: std::io::Error,
}

/// Per-packet send failure. Logged and the datagram is dropped for that one target; never
/// retried, and does not abort fan-out to other matching targets.
#[derive(Debug, thiserror::Error)]
#[error("failed to send datagram via transmitter {transmitter_id} to {destination}: {source}")]
pub struct RuntimeSendError {
    pub transmitter_id: u32,
    pub destination: std::net::SocketAddrV4,
    #[source]
    pub source: std::io::Error,
}

/// Poll failure other than a benign interruption. Fatal: terminate the process.
#[derive(Debug, thiserror::Error)]
#[error("poll failed: {0}")]
pub struct PollError(#[source] pub std::io::Error);
