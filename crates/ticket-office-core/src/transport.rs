//! Boundary over the datagram socket

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

use thiserror::Error;

/// An error the server cannot recover from
///
/// Anything that reaches this type terminates the process; client mistakes
/// never do.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The socket receive failed for a reason other than an interrupt
    #[error("datagram receive failed: {0}")]
    Receive(#[source] io::Error),
    /// The socket refused to take a whole response datagram
    #[error("datagram send failed: {0}")]
    Send(#[source] io::Error),
}

/// One datagram in, one datagram out
///
/// The dispatcher only ever talks to this trait, so tests can drive it
/// without a real socket and the server binary plugs in [`UdpTransport`].
pub trait Transport {
    /// Block until a datagram arrives; return its length and sender
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Send `buf` as a single datagram to `peer`
    ///
    /// Implementations must report a short send as an error.
    fn send(&mut self, buf: &[u8], peer: SocketAddr) -> io::Result<()>;
}

/// The production transport over a bound UDP socket
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind a UDP socket on all interfaces
    ///
    /// Port `0` picks an ephemeral port, which the tests use.
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        Ok(Self { socket })
    }

    /// The address the socket is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }

    fn send(&mut self, buf: &[u8], peer: SocketAddr) -> io::Result<()> {
        let sent = self.socket.send_to(buf, peer)?;
        if sent != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {sent} of {} bytes", buf.len()),
            ));
        }
        Ok(())
    }
}
