//! Ticket code and cookie generation

use rand::Rng;

/// Length of a ticket code in bytes
pub const TICKET_CODE_LEN: usize = 7;
/// Length of a reservation cookie in bytes
pub const COOKIE_LEN: usize = 48;

/// A 7-character `[0-9A-Z]` code identifying one issued ticket
pub type TicketCode = [u8; TICKET_CODE_LEN];
/// The 48-byte shared secret guarding a reservation
pub type Cookie = [u8; COOKIE_LEN];

const CODE_BASE: u64 = 36;

/// First and last printable ASCII byte drawn for cookies
const COOKIE_MIN: u8 = 0x21;
const COOKIE_MAX: u8 = 0x7e;

/// Format a ticket number as a ticket code
///
/// The number is written in base 36 with digits `0-9A-Z`, least-significant
/// digit first, padded with `'0'` up to [`TICKET_CODE_LEN`] characters.
pub fn ticket_code(mut number: u64) -> TicketCode {
    let mut code = [b'0'; TICKET_CODE_LEN];
    for digit in code.iter_mut() {
        let rem = (number % CODE_BASE) as u8;
        *digit = if rem < 10 { b'0' + rem } else { b'A' + rem - 10 };
        number /= CODE_BASE;
    }
    code
}

/// Draw a fresh cookie, each byte uniform over printable ASCII
pub fn generate_cookie(rng: &mut impl Rng) -> Cookie {
    let mut cookie = [0; COOKIE_LEN];
    for byte in cookie.iter_mut() {
        *byte = rng.gen_range(COOKIE_MIN..=COOKIE_MAX);
    }
    cookie
}
