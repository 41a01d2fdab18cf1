//! Telnet protocol decoding.
//!
//! - **protocol**: command/option codes and their names
//! - **parser**: byte-at-a-time IAC state machine

pub mod parser;
pub mod protocol;

pub use parser::{CommandDecoder, Decoded, ParserState, MAX_SUBNEGOTIATION_LEN};
pub use protocol::{TelnetOption, Verb};
