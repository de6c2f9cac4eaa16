//! The single-threaded request dispatcher

use std::io;

use crate::clock::Clock;
use crate::engine::Engine;
use crate::transport::{FatalError, Transport};
use crate::wire::{self, EventListing, Request, Response};

/// Receives datagrams one at a time, sweeps expirations, routes by message
/// id and writes back at most one response per request
///
/// There is no per-client state; requests are processed to completion in
/// strict arrival order.
pub struct Dispatcher<C> {
    engine: Engine,
    clock: C,
}

impl<C: Clock> Dispatcher<C> {
    /// Create a dispatcher over an engine and a clock
    pub fn new(engine: Engine, clock: C) -> Self {
        Self { engine, clock }
    }

    /// The engine, for inspection
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Receive and answer one datagram
    ///
    /// Interrupted receives are retried; any other transport failure is
    /// fatal. Malformed datagrams are dropped without a response.
    pub fn poll_once<T: Transport>(&mut self, transport: &mut T) -> Result<(), FatalError> {
        let mut buf = [0; wire::MAX_REQUEST];
        let (len, peer) = loop {
            match transport.receive(&mut buf) {
                Ok(received) => break received,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FatalError::Receive(e)),
            }
        };

        if let Some(response) = self.handle_datagram(&buf[..len]) {
            transport.send(&response, peer).map_err(FatalError::Send)?;
        }
        Ok(())
    }

    /// Process one datagram and produce the response to send, if any
    ///
    /// Stamps the request with the current clock, runs the expiration sweep,
    /// then dispatches. `None` means the datagram was not a recognised
    /// request and is dropped silently.
    pub fn handle_datagram(&mut self, datagram: &[u8]) -> Option<Vec<u8>> {
        let now = self.clock.now();
        self.engine.sweep(now);

        let Some(request) = wire::decode_request(datagram) else {
            log::warn!("dropping malformed datagram of {} bytes", datagram.len());
            return None;
        };

        let response = match request {
            Request::GetEvents => {
                let (events, size) = self.engine.list_events();
                let listings = events
                    .iter()
                    .enumerate()
                    .map(|(event_id, event)| EventListing {
                        event_id: event_id as u32,
                        remaining: event.remaining,
                        description: event.description.clone().into_bytes(),
                    })
                    .collect();
                log::debug!("listing {} events in {size} bytes", events.len());
                let encoded = wire::encode_response(&Response::Events(listings));
                debug_assert_eq!(encoded.len(), size);
                return Some(encoded);
            }
            Request::GetReservation {
                event_id,
                ticket_count,
            } => match self.engine.reserve(event_id, ticket_count, now) {
                Ok(reservation) => Response::Reservation {
                    reservation_id: reservation.reservation_id,
                    event_id: reservation.event_id,
                    ticket_count: reservation.ticket_count,
                    cookie: reservation.cookie,
                    expiration_time: reservation.expiration_time,
                },
                Err(reason) => {
                    log::debug!("rejecting reservation request: {reason}");
                    Response::BadRequest { id: event_id }
                }
            },
            Request::GetTickets {
                reservation_id,
                cookie,
            } => match self.engine.redeem(reservation_id, &cookie, now) {
                Ok(codes) => Response::Tickets {
                    reservation_id,
                    codes,
                },
                Err(reason) => {
                    log::debug!("rejecting ticket request: {reason}");
                    Response::BadRequest { id: reservation_id }
                }
            },
        };
        Some(wire::encode_response(&response))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::net::{Ipv4Addr, SocketAddr};

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::catalogue::{Catalogue, Event};

    /// Clock that always reads the same second
    struct FrozenClock(u64);

    impl Clock for FrozenClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    /// Transport fed from a script of incoming datagrams
    struct ScriptedTransport {
        incoming: VecDeque<io::Result<Vec<u8>>>,
        sent: Vec<Vec<u8>>,
    }

    impl ScriptedTransport {
        fn new(datagrams: impl IntoIterator<Item = io::Result<Vec<u8>>>) -> Self {
            Self {
                incoming: datagrams.into_iter().collect(),
                sent: Vec::new(),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn receive(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
            let peer = SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000));
            let datagram = self.incoming.pop_front().expect("script exhausted")?;
            buf[..datagram.len()].copy_from_slice(&datagram);
            Ok((datagram.len(), peer))
        }

        fn send(&mut self, buf: &[u8], _peer: SocketAddr) -> io::Result<()> {
            self.sent.push(buf.to_vec());
            Ok(())
        }
    }

    fn dispatcher() -> Dispatcher<FrozenClock> {
        let catalogue = Catalogue::new(vec![Event {
            description: "Concert".to_string(),
            remaining: 10,
        }]);
        let engine = Engine::with_rng(catalogue, 5, StdRng::seed_from_u64(1));
        Dispatcher::new(engine, FrozenClock(1_000))
    }

    #[test]
    fn poll_once_answers_a_request() {
        let mut dispatcher = dispatcher();
        let mut transport = ScriptedTransport::new([Ok(vec![1])]);

        dispatcher.poll_once(&mut transport).unwrap();
        assert_eq!(transport.sent.len(), 1);
        assert_eq!(transport.sent[0][0], 2);
    }

    #[test]
    fn poll_once_retries_interrupted_receives() {
        let mut dispatcher = dispatcher();
        let mut transport = ScriptedTransport::new([
            Err(io::Error::from(io::ErrorKind::Interrupted)),
            Ok(vec![1]),
        ]);

        dispatcher.poll_once(&mut transport).unwrap();
        assert_eq!(transport.sent.len(), 1);
    }

    #[test]
    fn poll_once_reports_other_receive_errors_as_fatal() {
        let mut dispatcher = dispatcher();
        let mut transport =
            ScriptedTransport::new([Err(io::Error::from(io::ErrorKind::ConnectionReset))]);

        assert!(matches!(
            dispatcher.poll_once(&mut transport),
            Err(FatalError::Receive(_))
        ));
    }

    #[test]
    fn malformed_datagrams_get_no_response() {
        let mut dispatcher = dispatcher();
        for datagram in [vec![], vec![0], vec![7, 7, 7], vec![1, 0], vec![3, 0, 0]] {
            assert_eq!(dispatcher.handle_datagram(&datagram), None);
        }
    }

    #[test]
    fn a_reservation_request_updates_the_engine() {
        let mut dispatcher = dispatcher();
        let response = dispatcher.handle_datagram(&[3, 0, 0, 0, 0, 0, 2]).unwrap();
        assert_eq!(response[0], 4);
        assert_eq!(
            dispatcher.engine().catalogue().get(0).unwrap().remaining,
            8
        );
        assert!(dispatcher.engine().reservation(1_000_000).is_some());
    }

    #[test]
    fn bad_request_echoes_the_raw_event_id() {
        let mut dispatcher = dispatcher();
        // Event 0xdeadbeef does not exist.
        let response = dispatcher
            .handle_datagram(&[3, 0xde, 0xad, 0xbe, 0xef, 0, 1])
            .unwrap();
        assert_eq!(response, vec![255, 0xde, 0xad, 0xbe, 0xef]);
    }
}
