use eyre::Result;
use ticket_office_core::wire::Response;
use ticket_office_tests::TestServer;

#[test]
#[ntest::timeout(10_000)]
fn a_reservation_holds_tickets_until_its_deadline() -> Result<()> {
    let server = TestServer::start(&[("Concert", 10), ("Play", 5)], 5, 1_000)?;
    let client = server.client()?;

    let reserved = client.reserve_ok(0, 3)?;
    assert_eq!(reserved.reservation_id, 1_000_000);
    assert_eq!(reserved.event_id, 0);
    assert_eq!(reserved.ticket_count, 3);
    assert_eq!(reserved.expiration_time, 1_005);

    assert_eq!(client.remaining(0)?, 7);
    Ok(())
}

#[test]
#[ntest::timeout(10_000)]
fn reservation_ids_increase_and_are_never_reused() -> Result<()> {
    let server = TestServer::start(&[("Concert", 10)], 5, 1_000)?;
    let client = server.client()?;

    assert_eq!(client.reserve_ok(0, 1)?.reservation_id, 1_000_000);
    assert_eq!(client.reserve_ok(0, 1)?.reservation_id, 1_000_001);

    // Expire both, then reserve again: the counter keeps climbing.
    server.clock.set(1_010);
    assert_eq!(client.reserve_ok(0, 1)?.reservation_id, 1_000_002);
    Ok(())
}

#[test]
#[ntest::timeout(10_000)]
fn asking_for_more_tickets_than_remain_is_rejected() -> Result<()> {
    let server = TestServer::start(&[("Concert", 10), ("Play", 5)], 5, 1_000)?;
    let client = server.client()?;

    assert_eq!(client.reserve(0, 20)?, Response::BadRequest { id: 0 });
    assert_eq!(client.remaining(0)?, 10);
    Ok(())
}

#[test]
#[ntest::timeout(10_000)]
fn a_zero_ticket_reservation_is_rejected() -> Result<()> {
    let server = TestServer::start(&[("Concert", 10)], 5, 1_000)?;
    let client = server.client()?;

    assert_eq!(client.reserve(0, 0)?, Response::BadRequest { id: 0 });
    Ok(())
}

#[test]
#[ntest::timeout(10_000)]
fn unknown_events_echo_the_requested_id() -> Result<()> {
    let server = TestServer::start(&[("Concert", 10)], 5, 1_000)?;
    let client = server.client()?;

    assert_eq!(client.reserve(7, 1)?, Response::BadRequest { id: 7 });
    Ok(())
}

#[test]
#[ntest::timeout(10_000)]
fn reservations_too_large_for_one_tickets_datagram_are_rejected() -> Result<()> {
    let server = TestServer::start(&[("Stadium", u16::MAX)], 5, 1_000)?;
    let client = server.client()?;

    // 9357 codes fill 65506 bytes; 9358 would overflow the datagram.
    assert_eq!(client.reserve(0, 9_358)?, Response::BadRequest { id: 0 });
    assert_eq!(client.reserve_ok(0, 9_357)?.ticket_count, 9_357);
    Ok(())
}
