//! The blocking, single-threaded event loop: poll → read one datagram → dispatch → send.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use mio::Events;

use crate::dispatcher;
use crate::error::{PollError, RuntimeRecvError, RuntimeSendError};
use crate::registry::Registry;
use crate::sockets::{Role, SocketManager, MAX_DATAGRAM_SIZE};

/// Capacity of the `mio::Events` buffer drained per `poll()` call. Matches the teacher's
/// `relay/server/src/sockets.rs::mio_worker_task`.
const EVENTS_CAPACITY: usize = 1024;

/// Runs the event loop forever. Only returns on a fatal `PollError`; every other failure is
/// logged and the loop continues (SPEC_FULL.md §4.4, §7).
pub fn run(registry: &Registry, sockets: &mut SocketManager) -> Result<Infallible, PollError> {
    let mut events = Events::with_capacity(EVENTS_CAPACITY);
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    loop {
        sockets.poll(&mut events).map_err(PollError)?;

        for event in events.iter() {
            let Some(role) = sockets.role(event.token()) else {
                continue;
            };

            dispatch_one(registry, sockets, role, &mut buf);
        }
    }
}

/// Handles a single readable fd: for a transmitter, drains and discards the datagram; for a
/// listener, receives one datagram and forwards it to every matching target.
fn dispatch_one(registry: &Registry, sockets: &SocketManager, role: Role, buf: &mut [u8]) {
    let listener_id = match role {
        Role::Transmitter(_) => {
            // Egress sockets are polled too (Design Notes §9); unsolicited data is drained and
            // dropped rather than left queued in the kernel.
            let _ = sockets.recv_from(role, buf);
            return;
        }
        Role::Listener(id) => id,
    };

    let (len, from) = match sockets.recv_from(role, buf) {
        Ok(received) => received,
        Err(source) => {
            tracing::debug!(
                error = %RuntimeRecvError { listener_id, source },
                "dropping datagram"
            );
            return;
        }
    };

    let IpAddr::V4(src_address) = from.ip() else {
        unreachable!("only IPv4 sockets are ever opened");
    };
    let src_port = from.port();
    let payload = &buf[..len];

    for send in dispatcher::plan(registry, listener_id, src_address, src_port) {
        match sockets.send_to(send.transmitter_id, payload, send.destination) {
            Ok(sent) => debug_assert_eq!(sent, payload.len()),
            Err(source) => {
                tracing::warn!(
                    error = %RuntimeSendError {
                        transmitter_id: send.transmitter_id,
                        destination: send.destination,
                        source,
                    },
                    "dropping datagram for one target"
                );
            }
        }
    }

    tracing::trace!(
        %listener_id,
        from = %SocketAddr::V4(std::net::SocketAddrV4::new(src_address, src_port)),
        bytes = len,
        "forwarded datagram"
    );
}
