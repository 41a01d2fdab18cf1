//! Session-start option requests
//!
//! Sent once, before the first read: server-side echo (so the client stops
//! echoing locally), character-at-a-time LINEMODE, and window size
//! reporting. Replies are not awaited.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::telnet::protocol::{DO, IAC, LINEMODE_MODE, SB, SE, WILL};
use super::telnet::TelnetOption;

/// Which requests the handshake includes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeOptions {
    /// `IAC WILL ECHO`
    pub echo_off: bool,
    /// `IAC DO LINEMODE` + `IAC SB LINEMODE MODE 0 IAC SE`
    pub line_mode: bool,
    /// `IAC DO NAWS`
    pub window_size: bool,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            echo_off: true,
            line_mode: true,
            window_size: true,
        }
    }
}

/// Bytes for the enabled requests, in wire order
pub fn handshake_bytes(options: &HandshakeOptions) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    if options.echo_off {
        out.extend_from_slice(&[IAC, WILL, TelnetOption::ECHO]);
    }
    if options.line_mode {
        out.extend_from_slice(&[
            IAC,
            DO,
            TelnetOption::LINEMODE,
            IAC,
            SB,
            TelnetOption::LINEMODE,
            LINEMODE_MODE,
            0,
            IAC,
            SE,
        ]);
    }
    if options.window_size {
        out.extend_from_slice(&[IAC, DO, TelnetOption::NAWS]);
    }
    out
}

/// Write the handshake and flush once
pub fn write_handshake<W: Write + ?Sized>(writer: &mut W, options: &HandshakeOptions) -> io::Result<()> {
    let bytes = handshake_bytes(options);
    if bytes.is_empty() {
        return Ok(());
    }
    writer.write_all(&bytes)?;
    writer.flush()?;
    debug!("Sent telnet handshake ({} bytes)", bytes.len());
    Ok(())
}
