//! UDP ticket-reservation server
//!
//! Binds one datagram socket and answers catalogue, reservation and ticket
//! requests until killed. All protocol logic lives in `ticket-office-core`;
//! this binary only wires the engine to the real clock, the real socket and
//! the events file.

#![warn(missing_docs)]

mod events;
mod opts;

use std::process;

use ticket_office_core::{Dispatcher, Engine, SystemClock, UdpTransport};

use crate::opts::Opts;

fn main() {
    let opts = Opts::from_args();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("events file: {}", opts.file);
    log::info!("port: {}", opts.config.port);
    log::info!("timeout: {}s", opts.config.timeout);

    let catalogue = match events::load(&opts.file) {
        Ok(catalogue) => catalogue,
        Err(e) => {
            log::error!("{e}");
            process::exit(1);
        }
    };
    for (event_id, event) in catalogue.events().iter().enumerate() {
        log::info!(
            "event {event_id}: {}, tickets: {}",
            event.description,
            event.remaining
        );
    }

    let mut transport = match UdpTransport::bind(opts.config.port) {
        Ok(transport) => transport,
        Err(e) => {
            log::error!("could not bind UDP port {}: {e}", opts.config.port);
            process::exit(1);
        }
    };

    let engine = Engine::new(catalogue, opts.config.timeout);
    let mut dispatcher = Dispatcher::new(engine, SystemClock);

    log::info!("listening on UDP port {}", opts.config.port);
    loop {
        if let Err(e) = dispatcher.poll_once(&mut transport) {
            log::error!("{e}");
            process::exit(1);
        }
    }
}
