//! Wire codec for the datagram protocol
//!
//! Every message starts with a one-byte message id. All integers are
//! big-endian and all bodies are byte-packed with no padding:
//!
//! ```text
//! 1   GET_EVENTS       C→S  (empty)
//! 2   EVENTS           S→C  repeated { u32 event_id, u16 remaining,
//!                                      u8 desc_len, desc_len bytes }
//! 3   GET_RESERVATION  C→S  u32 event_id, u16 ticket_count
//! 4   RESERVATION      S→C  u32 reservation_id, u32 event_id,
//!                           u16 ticket_count, 48 bytes cookie,
//!                           u64 expiration_time
//! 5   GET_TICKETS      C→S  u32 reservation_id, 48 bytes cookie
//! 6   TICKETS          S→C  u32 reservation_id, u16 ticket_count,
//!                           7 * ticket_count bytes ticket_codes
//! 255 BAD_REQUEST      S→C  u32 id
//! ```
//!
//! The codec does no I/O. Decoding never yields a partial result: any
//! datagram whose length does not match its message id exactly comes back as
//! `None` and is dropped by the dispatcher without a response.

use bytes::{Buf, BufMut};

use crate::codes::{Cookie, TicketCode, COOKIE_LEN, TICKET_CODE_LEN};

/// Largest payload of a single UDP datagram
pub const MAX_DATAGRAM: usize = 65_507;

/// Size of the largest client request (GET_TICKETS), and thus of the
/// dispatcher's receive buffer
pub const MAX_REQUEST: usize = 1 + 4 + COOKIE_LEN;

/// Per-event overhead in an EVENTS body (id, remaining, description length)
pub const EVENT_ENTRY_HEADER: usize = 4 + 2 + 1;

/// Fixed part of a TICKETS message (id, reservation id, ticket count)
pub const TICKETS_HEADER: usize = 1 + 4 + 2;

const MSG_GET_EVENTS: u8 = 1;
const MSG_EVENTS: u8 = 2;
const MSG_GET_RESERVATION: u8 = 3;
const MSG_RESERVATION: u8 = 4;
const MSG_GET_TICKETS: u8 = 5;
const MSG_TICKETS: u8 = 6;
const MSG_BAD_REQUEST: u8 = 255;

const GET_RESERVATION_LEN: usize = 1 + 4 + 2;
const RESERVATION_LEN: usize = 1 + 4 + 4 + 2 + COOKIE_LEN + 8;
const BAD_REQUEST_LEN: usize = 1 + 4;

/// Encoded size of an EVENTS entry for a description of the given length
pub fn event_entry_len(description_len: usize) -> usize {
    EVENT_ENTRY_HEADER + description_len
}

/// Encoded size of a TICKETS message carrying `ticket_count` codes
pub fn tickets_len(ticket_count: u16) -> usize {
    TICKETS_HEADER + TICKET_CODE_LEN * ticket_count as usize
}

/// A request sent by a client
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Request {
    /// Ask for the event catalogue
    GetEvents,
    /// Reserve `ticket_count` tickets of one event
    GetReservation {
        /// Requested event
        event_id: u32,
        /// Number of tickets to hold
        ticket_count: u16,
    },
    /// Collect the ticket codes of a reservation
    GetTickets {
        /// Reservation to redeem
        reservation_id: u32,
        /// Secret returned with the RESERVATION message
        cookie: Cookie,
    },
}

/// One event as listed in an EVENTS response
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EventListing {
    /// Position of the event in the catalogue
    pub event_id: u32,
    /// Tickets still available
    pub remaining: u16,
    /// Description bytes, at most 255
    pub description: Vec<u8>,
}

/// A response sent by the server
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Response {
    /// The catalogue prefix that fits in one datagram
    Events(Vec<EventListing>),
    /// A successful reservation
    Reservation {
        /// Newly allocated reservation id
        reservation_id: u32,
        /// Event the tickets were taken from
        event_id: u32,
        /// Number of tickets held
        ticket_count: u16,
        /// Secret required to collect the tickets
        cookie: Cookie,
        /// Absolute second at which the hold lapses
        expiration_time: u64,
    },
    /// The ticket codes of a redeemed reservation
    Tickets {
        /// Reservation the codes belong to
        reservation_id: u32,
        /// One 7-byte code per ticket
        codes: Vec<TicketCode>,
    },
    /// Rejection, echoing the id the client asked about
    BadRequest {
        /// The event id or reservation id from the request, verbatim
        id: u32,
    },
}

/// Decode a client request
///
/// Returns `None` for unknown message ids and for any length that does not
/// exactly match the id.
pub fn decode_request(datagram: &[u8]) -> Option<Request> {
    let (&id, mut body) = datagram.split_first()?;
    match (id, datagram.len()) {
        (MSG_GET_EVENTS, 1) => Some(Request::GetEvents),
        (MSG_GET_RESERVATION, GET_RESERVATION_LEN) => Some(Request::GetReservation {
            event_id: body.get_u32(),
            ticket_count: body.get_u16(),
        }),
        (MSG_GET_TICKETS, MAX_REQUEST) => {
            let reservation_id = body.get_u32();
            let mut cookie = [0; COOKIE_LEN];
            body.copy_to_slice(&mut cookie);
            Some(Request::GetTickets {
                reservation_id,
                cookie,
            })
        }
        _ => None,
    }
}

/// Encode a client request
pub fn encode_request(request: &Request) -> Vec<u8> {
    match request {
        Request::GetEvents => vec![MSG_GET_EVENTS],
        Request::GetReservation {
            event_id,
            ticket_count,
        } => {
            let mut buf = Vec::with_capacity(GET_RESERVATION_LEN);
            buf.put_u8(MSG_GET_RESERVATION);
            buf.put_u32(*event_id);
            buf.put_u16(*ticket_count);
            buf
        }
        Request::GetTickets {
            reservation_id,
            cookie,
        } => {
            let mut buf = Vec::with_capacity(MAX_REQUEST);
            buf.put_u8(MSG_GET_TICKETS);
            buf.put_u32(*reservation_id);
            buf.put_slice(cookie);
            buf
        }
    }
}

/// Encode a server response into a single datagram
pub fn encode_response(response: &Response) -> Vec<u8> {
    match response {
        Response::Events(listings) => {
            let body: usize = listings
                .iter()
                .map(|listing| event_entry_len(listing.description.len()))
                .sum();
            let mut buf = Vec::with_capacity(1 + body);
            buf.put_u8(MSG_EVENTS);
            for listing in listings {
                buf.put_u32(listing.event_id);
                buf.put_u16(listing.remaining);
                buf.put_u8(listing.description.len() as u8);
                buf.put_slice(&listing.description);
            }
            buf
        }
        Response::Reservation {
            reservation_id,
            event_id,
            ticket_count,
            cookie,
            expiration_time,
        } => {
            let mut buf = Vec::with_capacity(RESERVATION_LEN);
            buf.put_u8(MSG_RESERVATION);
            buf.put_u32(*reservation_id);
            buf.put_u32(*event_id);
            buf.put_u16(*ticket_count);
            buf.put_slice(cookie);
            buf.put_u64(*expiration_time);
            buf
        }
        Response::Tickets {
            reservation_id,
            codes,
        } => {
            let mut buf = Vec::with_capacity(TICKETS_HEADER + TICKET_CODE_LEN * codes.len());
            buf.put_u8(MSG_TICKETS);
            buf.put_u32(*reservation_id);
            buf.put_u16(codes.len() as u16);
            for code in codes {
                buf.put_slice(code);
            }
            buf
        }
        Response::BadRequest { id } => {
            let mut buf = Vec::with_capacity(BAD_REQUEST_LEN);
            buf.put_u8(MSG_BAD_REQUEST);
            buf.put_u32(*id);
            buf
        }
    }
}

/// Decode a server response
///
/// The inverse of [`encode_response`], used by clients and tests. Malformed
/// input comes back as `None`, never as a partial message.
pub fn decode_response(datagram: &[u8]) -> Option<Response> {
    let (&id, mut body) = datagram.split_first()?;
    match id {
        MSG_EVENTS => {
            let mut listings = Vec::new();
            while body.has_remaining() {
                if body.remaining() < EVENT_ENTRY_HEADER {
                    return None;
                }
                let event_id = body.get_u32();
                let remaining = body.get_u16();
                let len = body.get_u8() as usize;
                if body.remaining() < len {
                    return None;
                }
                let mut description = vec![0; len];
                body.copy_to_slice(&mut description);
                listings.push(EventListing {
                    event_id,
                    remaining,
                    description,
                });
            }
            Some(Response::Events(listings))
        }
        MSG_RESERVATION if datagram.len() == RESERVATION_LEN => {
            let reservation_id = body.get_u32();
            let event_id = body.get_u32();
            let ticket_count = body.get_u16();
            let mut cookie = [0; COOKIE_LEN];
            body.copy_to_slice(&mut cookie);
            Some(Response::Reservation {
                reservation_id,
                event_id,
                ticket_count,
                cookie,
                expiration_time: body.get_u64(),
            })
        }
        MSG_TICKETS => {
            if body.remaining() < TICKETS_HEADER - 1 {
                return None;
            }
            let reservation_id = body.get_u32();
            let ticket_count = body.get_u16();
            if body.remaining() != TICKET_CODE_LEN * ticket_count as usize {
                return None;
            }
            let mut codes = Vec::with_capacity(ticket_count as usize);
            for _ in 0..ticket_count {
                let mut code = [0; TICKET_CODE_LEN];
                body.copy_to_slice(&mut code);
                codes.push(code);
            }
            Some(Response::Tickets {
                reservation_id,
                codes,
            })
        }
        MSG_BAD_REQUEST if datagram.len() == BAD_REQUEST_LEN => Some(Response::BadRequest {
            id: body.get_u32(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_lengths_are_exact() {
        assert_eq!(decode_request(&[1]), Some(Request::GetEvents));
        assert_eq!(decode_request(&[1, 0]), None);
        assert_eq!(decode_request(&[]), None);

        assert_eq!(
            decode_request(&[3, 0, 0, 0, 2, 0, 9]),
            Some(Request::GetReservation {
                event_id: 2,
                ticket_count: 9,
            })
        );
        assert_eq!(decode_request(&[3, 0, 0, 0, 2, 0]), None);
        assert_eq!(decode_request(&[3, 0, 0, 0, 2, 0, 9, 0]), None);

        let mut get_tickets = vec![5, 0, 0x0f, 0x42, 0x40];
        get_tickets.extend_from_slice(&[b'!'; COOKIE_LEN]);
        assert_eq!(
            decode_request(&get_tickets),
            Some(Request::GetTickets {
                reservation_id: 1_000_000,
                cookie: [b'!'; COOKIE_LEN],
            })
        );
        get_tickets.pop();
        assert_eq!(decode_request(&get_tickets), None);
    }

    #[test]
    fn unknown_message_ids_are_rejected() {
        for id in [0u8, 2, 4, 6, 7, 254] {
            assert_eq!(decode_request(&[id]), None);
        }
    }

    #[test]
    fn requests_round_trip() {
        let requests = [
            Request::GetEvents,
            Request::GetReservation {
                event_id: u32::MAX,
                ticket_count: 1,
            },
            Request::GetTickets {
                reservation_id: 1_000_042,
                cookie: [b'~'; COOKIE_LEN],
            },
        ];
        for request in requests {
            assert_eq!(decode_request(&encode_request(&request)), Some(request));
        }
    }

    #[test]
    fn responses_round_trip() {
        let responses = [
            Response::Events(vec![]),
            Response::Events(vec![
                EventListing {
                    event_id: 0,
                    remaining: 10,
                    description: b"Concert".to_vec(),
                },
                EventListing {
                    event_id: 1,
                    remaining: 0,
                    description: vec![0xff; 255],
                },
            ]),
            Response::Reservation {
                reservation_id: 1_000_000,
                event_id: 3,
                ticket_count: 2,
                cookie: [b'?'; COOKIE_LEN],
                expiration_time: 1_005,
            },
            Response::Tickets {
                reservation_id: 1_000_000,
                codes: vec![*b"1000000", *b"2000000"],
            },
            Response::BadRequest { id: 7 },
        ];
        for response in responses {
            let encoded = encode_response(&response);
            assert_eq!(decode_response(&encoded), Some(response));
        }
    }

    #[test]
    fn events_encoding_matches_the_wire_layout() {
        let response = Response::Events(vec![
            EventListing {
                event_id: 0,
                remaining: 10,
                description: b"Concert".to_vec(),
            },
            EventListing {
                event_id: 1,
                remaining: 5,
                description: b"Play".to_vec(),
            },
        ]);
        let mut expected = vec![2];
        expected.extend_from_slice(&[0, 0, 0, 0, 0, 10, 7]);
        expected.extend_from_slice(b"Concert");
        expected.extend_from_slice(&[0, 0, 0, 1, 0, 5, 4]);
        expected.extend_from_slice(b"Play");
        assert_eq!(encode_response(&response), expected);
    }

    #[test]
    fn truncated_responses_do_not_decode() {
        let tickets = encode_response(&Response::Tickets {
            reservation_id: 1,
            codes: vec![*b"1000000"],
        });
        assert_eq!(decode_response(&tickets[..tickets.len() - 1]), None);

        let events = encode_response(&Response::Events(vec![EventListing {
            event_id: 0,
            remaining: 1,
            description: b"X".to_vec(),
        }]));
        assert_eq!(decode_response(&events[..events.len() - 1]), None);
    }
}
