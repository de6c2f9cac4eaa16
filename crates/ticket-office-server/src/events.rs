//! Loader for the flat-file event catalogue
//!
//! The file holds UTF-8 lines in pairs: an event description followed by its
//! initial ticket count. Events are numbered from 0 in file order. A blank
//! line ends the catalogue.

use std::fs;
use std::io;

use thiserror::Error;
use ticket_office_core::{Catalogue, Event};

/// Failure to load the events file at startup
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// The file could not be read at all
    #[error("could not read events file: {0}")]
    Io(#[from] io::Error),
    /// A description line is longer than the wire format allows
    #[error("line {0}: event description must be 1-255 bytes")]
    BadDescription(usize),
    /// A description line has no ticket count line after it
    #[error("line {0}: event description has no ticket count")]
    MissingTicketCount(usize),
    /// A ticket count line is not a decimal integer in range
    #[error("line {0}: ticket count is not a number in 0-65535")]
    BadTicketCount(usize),
}

/// Load the catalogue from the events file
pub fn load(path: &str) -> Result<Catalogue, CatalogueError> {
    let contents = fs::read_to_string(path)?;
    let mut events = Vec::new();
    let mut lines = contents.lines().enumerate();

    while let Some((line, description)) = lines.next() {
        if description.is_empty() {
            break;
        }
        if description.len() > 255 {
            return Err(CatalogueError::BadDescription(line + 1));
        }
        let Some((count_line, count)) = lines.next() else {
            return Err(CatalogueError::MissingTicketCount(line + 1));
        };
        let remaining = count
            .parse()
            .map_err(|_| CatalogueError::BadTicketCount(count_line + 1))?;
        events.push(Event {
            description: description.to_string(),
            remaining,
        });
    }

    Ok(Catalogue::new(events))
}
