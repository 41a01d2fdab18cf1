//! Core telnet input components.
//!
//! - **telnet**: wire constants and the IAC command decoder
//! - **queue**: fixed-capacity ring buffer for filtered bytes
//! - **events**: resize/command events, listeners and diagnostics
//! - **source**: raw byte sources (TCP, scripted)
//! - **filter**: the demultiplexer tying the above together
//! - **handshake**: option requests sent at session start
//! - **session**: one client connection
//!
//! # Architecture
//!
//! ```text
//! TelnetSession
//! ├── handshake (written once on start)
//! └── IacFilter
//!     ├── RawSource (TcpStream)
//!     ├── CommandDecoder (persisted parser state)
//!     ├── ByteRing (filtered data)
//!     └── event queue ──► TelnetListener
//! ```

pub mod events;
pub mod filter;
pub mod handshake;
pub mod queue;
pub mod session;
pub mod source;
pub mod telnet;
