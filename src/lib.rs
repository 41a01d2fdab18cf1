//! # tnfilter
//!
//! Clean keystroke bytes from a raw telnet connection.
//!
//! Telnet interleaves ordinary data with IAC command sequences: option
//! negotiation (`IAC DO/DONT/WILL/WONT <opt>`) and subnegotiation blocks
//! (`IAC SB <opt> ... IAC SE`). [`IacFilter`](core::filter::IacFilter)
//! strips them, un-doubles escaped `IAC IAC` data, and turns NAWS window
//! size reports into [`ResizeEvent`](core::events::ResizeEvent)s.
//!
//! ```no_run
//! use std::net::TcpListener;
//! use tnfilter::core::session::{SessionOptions, TelnetSession};
//!
//! # fn main() -> anyhow::Result<()> {
//! let listener = TcpListener::bind("127.0.0.1:2323")?;
//! let (stream, _) = listener.accept()?;
//! let mut session = TelnetSession::start(1, stream, &SessionOptions::default())?;
//!
//! let mut buf = [0u8; 256];
//! loop {
//!     let n = session.read_blocking(&mut buf)?;
//!     session.dispatch_events(&mut |cols: u16, rows: u16| {
//!         println!("resized to {}x{}", cols, rows);
//!     });
//!     if n == 0 {
//!         break;
//!     }
//!     println!("{:?}", &buf[..n]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
