//! 🏗 Infrastructure for driving a ticket office server over real UDP
//!
//! [`TestServer::start`] spins up the full dispatcher on an ephemeral port
//! with a manually driven clock; [`Client`] speaks the wire protocol at it
//! from the outside, exactly like a real client would.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eyre::{eyre, Result};
use ticket_office_core::codes::Cookie;
use ticket_office_core::wire::{self, EventListing, Request, Response};
use ticket_office_core::{Catalogue, Clock, Dispatcher, Engine, Event, UdpTransport};

/// A clock a test advances by hand
///
/// Cloning shares the underlying time, so the test keeps one handle and the
/// server thread another.
#[derive(Clone, Default)]
pub struct FakeClock(Arc<AtomicU64>);

impl FakeClock {
    /// Create a clock reading the given second
    pub fn at(seconds: u64) -> Self {
        Self(Arc::new(AtomicU64::new(seconds)))
    }

    /// Jump to the given second
    pub fn set(&self, seconds: u64) {
        self.0.store(seconds, Ordering::SeqCst);
    }

    /// Move forward by the given number of seconds
    pub fn advance(&self, seconds: u64) {
        self.0.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A ticket office server running on its own thread
///
/// The thread blocks in the socket receive and dies with the test process;
/// there is nothing to shut down.
pub struct TestServer {
    port: u16,
    /// Handle for driving the server's clock
    pub clock: FakeClock,
}

impl TestServer {
    /// Start a server with the given catalogue, timeout and start time
    pub fn start(events: &[(&str, u16)], timeout: u32, start_time: u64) -> Result<Self> {
        let catalogue = Catalogue::new(
            events
                .iter()
                .map(|&(description, remaining)| Event {
                    description: description.to_string(),
                    remaining,
                })
                .collect(),
        );

        let mut transport = UdpTransport::bind(0)?;
        let port = transport.local_addr()?.port();
        let clock = FakeClock::at(start_time);

        let engine = Engine::new(catalogue, timeout);
        let mut dispatcher = Dispatcher::new(engine, clock.clone());
        thread::spawn(move || loop {
            if dispatcher.poll_once(&mut transport).is_err() {
                break;
            }
        });

        Ok(Self { port, clock })
    }

    /// Open a client socket talking to this server
    pub fn client(&self) -> Result<Client> {
        Client::connect(self.port)
    }
}

/// The result of a successful reservation
pub struct Reserved {
    /// Allocated reservation id
    pub reservation_id: u32,
    /// Event the tickets were taken from
    pub event_id: u32,
    /// Number of tickets held
    pub ticket_count: u16,
    /// Secret for collecting the tickets
    pub cookie: Cookie,
    /// Second at which the hold lapses
    pub expiration_time: u64,
}

/// A protocol client bound to one local UDP socket
pub struct Client {
    socket: UdpSocket,
}

impl Client {
    fn connect(port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0))?;
        socket.connect(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))?;
        socket.set_read_timeout(Some(Duration::from_secs(2)))?;
        Ok(Self { socket })
    }

    /// Send raw bytes as one datagram
    pub fn send_raw(&self, datagram: &[u8]) -> Result<()> {
        self.socket.send(datagram)?;
        Ok(())
    }

    /// Receive one datagram
    pub fn recv_raw(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0; wire::MAX_DATAGRAM];
        let len = self.socket.recv(&mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    /// Send a request and decode the response
    pub fn request(&self, request: &Request) -> Result<Response> {
        self.send_raw(&wire::encode_request(request))?;
        let raw = self.recv_raw()?;
        wire::decode_response(&raw).ok_or_else(|| eyre!("server sent an undecodable response"))
    }

    /// Fetch the event listing
    pub fn get_events(&self) -> Result<Vec<EventListing>> {
        match self.request(&Request::GetEvents)? {
            Response::Events(listings) => Ok(listings),
            other => Err(eyre!("expected EVENTS, got {other:?}")),
        }
    }

    /// Remaining tickets of one event, per the server's own listing
    pub fn remaining(&self, event_id: u32) -> Result<u16> {
        self.get_events()?
            .into_iter()
            .find(|listing| listing.event_id == event_id)
            .map(|listing| listing.remaining)
            .ok_or_else(|| eyre!("event {event_id} is not listed"))
    }

    /// Request a reservation
    pub fn reserve(&self, event_id: u32, ticket_count: u16) -> Result<Response> {
        self.request(&Request::GetReservation {
            event_id,
            ticket_count,
        })
    }

    /// Request a reservation that must succeed
    pub fn reserve_ok(&self, event_id: u32, ticket_count: u16) -> Result<Reserved> {
        match self.reserve(event_id, ticket_count)? {
            Response::Reservation {
                reservation_id,
                event_id,
                ticket_count,
                cookie,
                expiration_time,
            } => Ok(Reserved {
                reservation_id,
                event_id,
                ticket_count,
                cookie,
                expiration_time,
            }),
            other => Err(eyre!("expected RESERVATION, got {other:?}")),
        }
    }

    /// Request the ticket codes of a reservation
    pub fn get_tickets(&self, reservation_id: u32, cookie: &Cookie) -> Result<Response> {
        self.request(&Request::GetTickets {
            reservation_id,
            cookie: *cookie,
        })
    }

    /// Assert that the server stays silent for a moment
    ///
    /// Used after datagrams the server must drop without a response.
    pub fn expect_silence(&self) -> Result<()> {
        self.socket
            .set_read_timeout(Some(Duration::from_millis(300)))?;
        let mut buf = [0; 16];
        let outcome = match self.socket.recv(&mut buf) {
            Ok(len) => Err(eyre!("expected no response, got {len} bytes")),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(())
            }
            Err(e) => Err(e.into()),
        };
        self.socket.set_read_timeout(Some(Duration::from_secs(2)))?;
        outcome
    }
}
