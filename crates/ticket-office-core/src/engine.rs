//! The reservation engine
//!
//! Owns the catalogue, the reservation store and the three counters, and
//! applies the reservation, redemption and expiration rules. All operations
//! take the current time as an argument; the engine never reads a clock.

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::catalogue::{Catalogue, Event};
use crate::codes::{self, Cookie, TicketCode};
use crate::store::{Redemption, Reservation, ReservationStore};
use crate::wire;

/// First reservation id ever handed out
///
/// Event ids occupy `0..catalogue.len()`, so starting reservation ids at one
/// million keeps the two id spaces disjoint and lets a single BAD_REQUEST
/// echo field carry either.
const FIRST_RESERVATION_ID: u32 = 1_000_000;

/// First ticket number ever issued; `0` is reserved as "never issued"
const FIRST_TICKET_NUMBER: u64 = 1;

/// Why a request was rejected
///
/// Every variant reaches the client as the same BAD_REQUEST message; the
/// distinction only feeds the log.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum RejectReason {
    /// A reservation must hold at least one ticket
    #[error("ticket count must be at least 1")]
    ZeroTickets,
    /// The TICKETS response for this many tickets would not fit a datagram
    #[error("{0} ticket codes do not fit in a single datagram")]
    TooManyTickets(u16),
    /// No event with the requested id
    #[error("unknown event {0}")]
    UnknownEvent(u32),
    /// The event has fewer tickets left than requested
    #[error("event {0} has too few tickets remaining")]
    SoldOut(u32),
    /// No reservation with the requested id, or it already expired
    #[error("unknown reservation {0}")]
    UnknownReservation(u32),
    /// The supplied cookie does not match the reservation
    #[error("wrong cookie for reservation {0}")]
    CookieMismatch(u32),
    /// The reservation's deadline has passed
    #[error("reservation {0} has expired")]
    Expired(u32),
}

/// The reservation engine
pub struct Engine {
    catalogue: Catalogue,
    store: ReservationStore,
    /// Reservation lifetime in seconds
    timeout: u32,
    next_reservation_id: u32,
    next_ticket_number: u64,
    rng: StdRng,
}

impl Engine {
    /// Create an engine over a loaded catalogue
    pub fn new(catalogue: Catalogue, timeout: u32) -> Self {
        Self::with_rng(catalogue, timeout, StdRng::from_entropy())
    }

    /// Create an engine with a caller-provided cookie RNG
    pub fn with_rng(catalogue: Catalogue, timeout: u32, rng: StdRng) -> Self {
        Self {
            catalogue,
            store: ReservationStore::new(),
            timeout,
            next_reservation_id: FIRST_RESERVATION_ID,
            next_ticket_number: FIRST_TICKET_NUMBER,
            rng,
        }
    }

    /// The event catalogue
    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Look up a live reservation
    pub fn reservation(&self, reservation_id: u32) -> Option<&Reservation> {
        self.store.get(reservation_id)
    }

    /// Iterate over all live reservations
    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.store.iter()
    }

    /// The catalogue prefix that fits in one EVENTS datagram, with the size
    /// of its encoding
    ///
    /// Walks the catalogue in id order and stops before the first event that
    /// would push the response past the datagram ceiling.
    pub fn list_events(&self) -> (&[Event], usize) {
        let mut size = 1;
        let mut count = 0;
        for event in self.catalogue.events() {
            let entry = wire::event_entry_len(event.description.len());
            if size + entry > wire::MAX_DATAGRAM {
                break;
            }
            size += entry;
            count += 1;
        }
        (&self.catalogue.events()[..count], size)
    }

    /// Hold `ticket_count` tickets of an event until `now + timeout`
    pub fn reserve(
        &mut self,
        event_id: u32,
        ticket_count: u16,
        now: u64,
    ) -> Result<&Reservation, RejectReason> {
        if ticket_count == 0 {
            return Err(RejectReason::ZeroTickets);
        }
        if wire::tickets_len(ticket_count) > wire::MAX_DATAGRAM {
            return Err(RejectReason::TooManyTickets(ticket_count));
        }
        let event = self
            .catalogue
            .get_mut(event_id)
            .ok_or(RejectReason::UnknownEvent(event_id))?;
        if event.remaining < ticket_count {
            return Err(RejectReason::SoldOut(event_id));
        }

        event.remaining -= ticket_count;
        let reservation_id = self.next_reservation_id;
        self.next_reservation_id += 1;

        let reservation = Reservation {
            reservation_id,
            event_id,
            ticket_count,
            cookie: codes::generate_cookie(&mut self.rng),
            expiration_time: now + u64::from(self.timeout),
            redemption: Redemption::Pending,
        };
        log::debug!(
            "reservation {reservation_id}: {ticket_count} tickets of event {event_id}, \
             expires at {}",
            reservation.expiration_time
        );
        Ok(self.store.insert(reservation))
    }

    /// Issue the ticket codes of a reservation
    ///
    /// The first successful call fixes the codes; every later call with the
    /// right cookie returns the same sequence.
    pub fn redeem(
        &mut self,
        reservation_id: u32,
        cookie: &Cookie,
        now: u64,
    ) -> Result<Vec<TicketCode>, RejectReason> {
        let reservation = self
            .store
            .get_mut(reservation_id)
            .ok_or(RejectReason::UnknownReservation(reservation_id))?;
        if reservation.cookie != *cookie {
            return Err(RejectReason::CookieMismatch(reservation_id));
        }
        if reservation.expiration_time <= now {
            return Err(RejectReason::Expired(reservation_id));
        }

        let first_ticket = match reservation.redemption {
            Redemption::Collected { first_ticket } => first_ticket,
            Redemption::Pending => {
                let first_ticket = self.next_ticket_number;
                self.next_ticket_number += u64::from(reservation.ticket_count);
                reservation.redemption = Redemption::Collected { first_ticket };
                log::debug!(
                    "reservation {reservation_id}: issued tickets {first_ticket}..={}",
                    first_ticket + u64::from(reservation.ticket_count) - 1
                );
                first_ticket
            }
        };

        Ok((0..u64::from(reservation.ticket_count))
            .map(|offset| codes::ticket_code(first_ticket + offset))
            .collect())
    }

    /// Reclaim reservations whose deadline has passed
    ///
    /// Pops queue entries up to the first unexpired one. Uncollected
    /// reservations return their tickets to the event and leave the store;
    /// collected ones stay in the store for good.
    pub fn sweep(&mut self, now: u64) {
        while let Some(reservation_id) = self.store.pop_expired(now) {
            let Some(reservation) = self.store.get(reservation_id) else {
                continue;
            };
            if let Redemption::Collected { .. } = reservation.redemption {
                continue;
            }

            let event_id = reservation.event_id;
            let ticket_count = reservation.ticket_count;
            self.store.remove(reservation_id);
            if let Some(event) = self.catalogue.get_mut(event_id) {
                event.remaining += ticket_count;
            }
            log::debug!(
                "reservation {reservation_id}: expired, {ticket_count} tickets back to \
                 event {event_id}"
            );
        }
    }
}
