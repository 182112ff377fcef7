//! Owns every UDP socket the daemon holds and multiplexes them with a single `mio::Poll`.
//!
//! Adapted from the teacher's `relay/server/src/sockets.rs` (`make_wildcard_socket`, the
//! `Token` encode/decode helpers, and the `mio::Poll`-based worker loop). The teacher runs its
//! `mio::Poll` on a background thread and bridges readiness back to an async task over
//! channels, because its `Server` is driven from a `tokio` event loop; this daemon's event loop
//! is itself single-threaded and synchronous (SPEC_FULL.md §5), so the `mio::Poll` is driven
//! directly, with no worker thread or channel in between.

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use mio::net::UdpSocket as MioUdpSocket;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::SocketError;

/// Maximum size of a UDP/IPv4 payload (65,535 - 8-byte UDP header - 20-byte minimal IP header).
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Size (in bytes) to request for `SO_RCVBUF` on ingress sockets and `SO_SNDBUF` on egress
/// sockets: set high to absorb bursts when user-space falls behind (SPEC_FULL.md §5).
const SOCKET_BUFFER_BYTES: usize = 5 * 1024 * 1024;

/// Which logical entity a registered socket belongs to. Fixed at creation; never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Listener(u32),
    Transmitter(u32),
}

/// The single owner of every socket file descriptor in the process.
pub struct SocketManager {
    poll: Poll,
    roles: HashMap<Token, Role>,
    listener_sockets: HashMap<u32, MioUdpSocket>,
    transmitter_sockets: HashMap<u32, MioUdpSocket>,
    next_token: usize,
}

impl SocketManager {
    pub fn new() -> Result<Self, SocketError> {
        Ok(Self {
            poll: Poll::new().map_err(SocketError::Register)?,
            roles: HashMap::new(),
            listener_sockets: HashMap::new(),
            transmitter_sockets: HashMap::new(),
            next_token: 0,
        })
    }

    /// Opens and registers the ingress socket for `listener_id`, bound to `(address, port)`.
    pub fn open_listener(
        &mut self,
        listener_id: u32,
        address: Ipv4Addr,
        port: u16,
    ) -> Result<(), SocketError> {
        let socket = bind_socket(address, port, SocketKind::Ingress)?;
        let mut socket = MioUdpSocket::from_std(socket);

        let token = self.register(&mut socket)?;
        self.roles.insert(token, Role::Listener(listener_id));
        self.listener_sockets.insert(listener_id, socket);
        Ok(())
    }

    /// Opens and registers the egress socket for `transmitter_id`. `address == 0 && port == 0`
    /// leaves the socket unbound; the kernel assigns an address/port on first send.
    pub fn open_transmitter(
        &mut self,
        transmitter_id: u32,
        address: Ipv4Addr,
        port: u16,
    ) -> Result<(), SocketError> {
        let socket = if address == Ipv4Addr::UNSPECIFIED && port == 0 {
            unbound_socket(SocketKind::Egress)?
        } else {
            bind_socket(address, port, SocketKind::Egress)?
        };
        let mut socket = MioUdpSocket::from_std(socket);

        let token = self.register(&mut socket)?;
        self.roles.insert(token, Role::Transmitter(transmitter_id));
        self.transmitter_sockets.insert(transmitter_id, socket);
        Ok(())
    }

    fn register(&mut self, socket: &mut MioUdpSocket) -> Result<Token, SocketError> {
        let token = Token(self.next_token);
        self.next_token += 1;

        self.poll
            .registry()
            .register(socket, token, Interest::READABLE)
            .map_err(SocketError::Register)?;

        Ok(token)
    }

    /// Blocks until at least one registered socket is readable, or a signal interrupts the
    /// wait (benign; the wait is simply retried). No timeout: this is the event loop's only
    /// suspension point.
    pub fn poll(&mut self, events: &mut Events) -> io::Result<()> {
        loop {
            match self.poll.poll(events, None) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn role(&self, token: Token) -> Option<Role> {
        self.roles.get(&token).copied()
    }

    pub fn recv_from(&self, role: Role, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket_for(role)
            .ok_or_else(not_registered)?
            .recv_from(buf)
    }

    pub fn send_to(
        &self,
        transmitter_id: u32,
        buf: &[u8],
        dest: SocketAddrV4,
    ) -> io::Result<usize> {
        self.transmitter_sockets
            .get(&transmitter_id)
            .ok_or_else(not_registered)?
            .send_to(buf, SocketAddr::V4(dest))
    }

    fn socket_for(&self, role: Role) -> Option<&MioUdpSocket> {
        match role {
            Role::Listener(id) => self.listener_sockets.get(&id),
            Role::Transmitter(id) => self.transmitter_sockets.get(&id),
        }
    }
}

fn not_registered() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "no socket registered for id")
}

enum SocketKind {
    Ingress,
    Egress,
}

/// Creates a non-blocking UDP socket, sets `SO_REUSEADDR` and the receive/send buffer size
/// appropriate for `kind`, and binds it to `(address, port)` (`address == 0` binds "any
/// interface"; `port == 0` picks an ephemeral port).
fn bind_socket(
    address: Ipv4Addr,
    port: u16,
    kind: SocketKind,
) -> Result<std::net::UdpSocket, SocketError> {
    let socket = new_socket(kind)?;

    socket
        .bind(&SockAddr::from(SocketAddr::V4(SocketAddrV4::new(address, port))))
        .map_err(|source| SocketError::Bind {
            address,
            port,
            source,
        })?;

    Ok(socket.into())
}

/// Creates a non-blocking UDP socket without binding it at all (used for ephemeral
/// transmitters: the very first `send_to` implicitly binds an ephemeral local address/port).
fn unbound_socket(kind: SocketKind) -> Result<std::net::UdpSocket, SocketError> {
    Ok(new_socket(kind)?.into())
}

fn new_socket(kind: SocketKind) -> Result<Socket, SocketError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(SocketError::Create)?;

    socket.set_nonblocking(true).map_err(|source| SocketError::SetOption {
        address: Ipv4Addr::UNSPECIFIED,
        port: 0,
        source,
    })?;
    socket
        .set_reuse_address(true)
        .map_err(|source| SocketError::SetOption {
            address: Ipv4Addr::UNSPECIFIED,
            port: 0,
            source,
        })?;

    match kind {
        SocketKind::Ingress => socket
            .set_recv_buffer_size(SOCKET_BUFFER_BYTES)
            .map_err(|source| SocketError::SetOption {
                address: Ipv4Addr::UNSPECIFIED,
                port: 0,
                source,
            })?,
        SocketKind::Egress => socket
            .set_send_buffer_size(SOCKET_BUFFER_BYTES)
            .map_err(|source| SocketError::SetOption {
                address: Ipv4Addr::UNSPECIFIED,
                port: 0,
                source,
            })?,
    }

    Ok(socket)
}

/// A receive-timeout variant used only by tests and the foreground-mode dispatcher loop's
/// `recv_from`-after-readable path is intentionally not exposed here: the event loop always
/// reads only sockets the poller has told it are readable.
#[cfg(test)]
pub(crate) fn set_test_timeout(socket: &std::net::UdpSocket, timeout: Duration) {
    socket.set_read_timeout(Some(timeout)).ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_two_listeners_to_distinct_ephemeral_ports_succeeds() {
        // Port-range enforcement is the Registry's job; SocketManager itself just binds
        // whatever it is given, including port 0 (kernel picks a port).
        let mut manager = SocketManager::new().unwrap();
        manager.open_listener(1, Ipv4Addr::LOCALHOST, 0).unwrap();
        manager.open_listener(2, Ipv4Addr::LOCALHOST, 0).unwrap();
    }

    #[test]
    fn ephemeral_transmitter_can_send_without_prior_bind() {
        let mut manager = SocketManager::new().unwrap();
        manager
            .open_transmitter(1, Ipv4Addr::UNSPECIFIED, 0)
            .unwrap();

        let echo = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        set_test_timeout(&echo, Duration::from_secs(1));
        let dest = match echo.local_addr().unwrap() {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!(),
        };

        manager.send_to(1, b"hello", dest).unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = echo.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn unknown_transmitter_id_is_not_connected_error() {
        let manager = SocketManager::new().unwrap();
        let err = manager
            .send_to(42, b"x", SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9000))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
