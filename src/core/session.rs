//! Telnet session
//!
//! Owns one client connection: sends the handshake, reads filtered input
//! and closes the socket exactly once.

use std::io::{self, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::events::{PeerOptions, TelnetEvent, TelnetListener};
use super::filter::{self, FilterOptions, IacFilter, ReadStatus};
use super::handshake::{write_handshake, HandshakeOptions};
use super::telnet::protocol::IAC;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to set up connection: {0}")]
    Socket(#[source] io::Error),

    #[error("Failed to send telnet handshake: {0}")]
    Handshake(#[source] io::Error),

    #[error("Failed to write to client: {0}")]
    Write(#[source] io::Error),
}

/// Per-session settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub filter: FilterOptions,
    pub handshake: HandshakeOptions,
}

/// Closes a session's socket, possibly from another thread.
///
/// A read blocked on the socket returns end-of-stream once this fires.
#[derive(Clone)]
pub struct ShutdownHandle {
    stream: Arc<TcpStream>,
    closed: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Shut the socket down. Only the first call does anything.
    pub fn shutdown(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.stream.shutdown(Shutdown::Both) {
            // Peer already gone
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A connected telnet client.
///
/// The session owns the socket's blocking mode: reads expect a blocking
/// socket and the non-blocking paths (`read`, `available_hint`) restore
/// blocking mode after each peek. Callers must not switch the stream to
/// non-blocking themselves.
pub struct TelnetSession {
    /// Session ID
    pub id: u64,
    peer: Option<SocketAddr>,
    writer: TcpStream,
    filter: IacFilter<TcpStream>,
    handle: ShutdownHandle,
}

impl TelnetSession {
    /// Take over an accepted connection and send the handshake
    pub fn start(id: u64, stream: TcpStream, options: &SessionOptions) -> Result<Self, SessionError> {
        let peer = stream.peer_addr().ok();
        let mut writer = stream.try_clone().map_err(SessionError::Socket)?;
        let control = stream.try_clone().map_err(SessionError::Socket)?;

        write_handshake(&mut writer, &options.handshake).map_err(SessionError::Handshake)?;
        info!("Session {} started for {:?}", id, peer);

        Ok(Self {
            id,
            peer,
            writer,
            filter: IacFilter::with_options(stream, options.filter),
            handle: ShutdownHandle {
                stream: Arc::new(control),
                closed: Arc::new(AtomicBool::new(false)),
            },
        })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.handle.clone()
    }

    /// Drops filter state if the socket was closed through a handle
    fn sync_closed(&mut self) {
        if self.handle.is_closed() && !self.filter.is_closed() {
            self.filter.close();
        }
    }

    /// Non-blocking read of clean input bytes
    pub fn read(&mut self, buf: &mut [u8]) -> filter::Result<ReadStatus> {
        self.sync_closed();
        self.filter.read(buf)
    }

    /// Blocking read; `Ok(0)` is end-of-stream
    pub fn read_blocking(&mut self, buf: &mut [u8]) -> filter::Result<usize> {
        self.sync_closed();
        let n = self.filter.read_blocking(buf)?;
        if n == 0 {
            debug!("Session {} input ended", self.id);
        }
        Ok(n)
    }

    pub fn available_hint(&mut self) -> filter::Result<usize> {
        self.sync_closed();
        self.filter.available_hint()
    }

    pub fn take_events(&mut self) -> Vec<TelnetEvent> {
        self.filter.take_events()
    }

    pub fn dispatch_events<L: TelnetListener + ?Sized>(&mut self, listener: &mut L) -> usize {
        self.filter.dispatch_events(listener)
    }

    pub fn peer_options(&self) -> PeerOptions {
        self.filter.peer_options()
    }

    /// Send output to the client, doubling any IAC bytes
    pub fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let escaped = escape_iac(data);
        self.writer.write_all(&escaped).map_err(SessionError::Write)?;
        self.writer.flush().map_err(SessionError::Write)
    }

    /// Close the connection. Safe to call more than once.
    pub fn close(&mut self) -> io::Result<()> {
        let result = self.handle.shutdown();
        self.filter.close();
        result
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

impl Drop for TelnetSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Double every IAC so it reaches the peer as data
pub fn escape_iac(data: &[u8]) -> std::borrow::Cow<'_, [u8]> {
    if !data.contains(&IAC) {
        return std::borrow::Cow::Borrowed(data);
    }
    let mut out = Vec::with_capacity(data.len() + 4);
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    std::borrow::Cow::Owned(out)
}
