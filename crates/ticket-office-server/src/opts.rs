//! Command line options

use std::num::IntErrorKind;
use std::path::Path;

use ticket_office_core::Config;

const MIN_PORT: u64 = 0;
const MAX_PORT: u64 = 65_535;

const MIN_TIMEOUT: u64 = 1;
const MAX_TIMEOUT: u64 = 86_400;

/// Command line options
#[derive(Debug)]
pub struct Opts {
    /// Path to the events file
    pub file: String,
    /// Configuration of the ticket office server
    pub config: Config,
}

impl Opts {
    /// Parse the process arguments, or print the problem and the usage line
    /// and exit with status 1
    pub fn from_args() -> Self {
        match Self::parse(std::env::args().skip(1)) {
            Ok(opts) => opts,
            Err(message) => {
                eprintln!("{message}");
                eprintln!("Usage: ticket-office-server -f <events file> [-p <port>] [-t <timeout>]");
                std::process::exit(1);
            }
        }
    }

    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut file = None;
        let mut port = None;
        let mut timeout = None;

        while let Some(flag) = args.next() {
            let slot = match flag.as_str() {
                "-f" => &mut file,
                "-p" => &mut port,
                "-t" => &mut timeout,
                _ => return Err(String::from("Unrecognized flag.")),
            };
            match args.next() {
                Some(value) => *slot = Some(value),
                None => {
                    return Err(String::from(
                        "Numbers of used flags and arguments do not match",
                    ))
                }
            }
        }

        let Some(file) = file else {
            return Err(String::from("file argument is required."));
        };
        if !Path::new(&file).exists() {
            return Err(String::from("file does not exist."));
        }

        let mut config = Config::default();
        if let Some(port) = port {
            config.port = parse_numeric(&port, "port", MIN_PORT, MAX_PORT)? as u16;
        }
        if let Some(timeout) = timeout {
            config.timeout = parse_numeric(&timeout, "timeout", MIN_TIMEOUT, MAX_TIMEOUT)? as u32;
        }

        Ok(Opts { file, config })
    }
}

fn parse_numeric(arg: &str, name: &str, min: u64, max: u64) -> Result<u64, String> {
    let value = match arg.parse::<u64>() {
        Ok(value) => value,
        Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow) => {
            return Err(out_of_range(name, min, max))
        }
        Err(_) => return Err(format!("{name} value is not a number.")),
    };
    if value < min || value > max {
        return Err(out_of_range(name, min, max));
    }
    Ok(value)
}

fn out_of_range(name: &str, min: u64, max: u64) -> String {
    format!("{name} value is out of range. Acceptable range: {min}-{max}")
}
