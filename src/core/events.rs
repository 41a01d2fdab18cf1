//! Out-of-band telnet events
//!
//! Commands and subnegotiations stripped from the data stream are turned
//! into typed events here. The filter queues them; callers drain the queue
//! after a read and hand each event to a [`TelnetListener`].

use bitflags::bitflags;
use tracing::{debug, warn};

use super::telnet::{TelnetOption, Verb};

/// `IAC <verb> <option>` as received from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEvent {
    pub verb: Verb,
    pub option: TelnetOption,
}

/// Peer window size from a NAWS subnegotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    pub columns: u16,
    pub rows: u16,
}

impl ResizeEvent {
    /// Decode a NAWS payload: columns then rows, each big-endian u16.
    /// Anything other than exactly four bytes is rejected.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        match *payload {
            [c_hi, c_lo, r_hi, r_lo] => Some(Self {
                columns: u16::from_be_bytes([c_hi, c_lo]),
                rows: u16::from_be_bytes([r_hi, r_lo]),
            }),
            _ => None,
        }
    }
}

/// Event raised while filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    Command(CommandEvent),
    Resize(ResizeEvent),
    /// Subnegotiation for an option without special handling
    Subnegotiation {
        option: TelnetOption,
        payload: Vec<u8>,
    },
}

impl TelnetEvent {
    /// Hand this event to the matching listener callback
    pub fn deliver<L: TelnetListener + ?Sized>(&self, listener: &mut L) {
        match self {
            TelnetEvent::Command(event) => listener.on_command(event),
            TelnetEvent::Resize(event) => listener.on_resize(event.columns, event.rows),
            TelnetEvent::Subnegotiation { option, payload } => {
                listener.on_subnegotiation(*option, payload)
            }
        }
    }
}

/// Turn a completed subnegotiation into an event.
///
/// Returns `None` for a NAWS block whose payload is not four bytes.
pub fn interpret_subnegotiation(option: TelnetOption, payload: Vec<u8>) -> Option<TelnetEvent> {
    match option {
        TelnetOption::WindowSize => ResizeEvent::from_payload(&payload).map(TelnetEvent::Resize),
        _ => Some(TelnetEvent::Subnegotiation { option, payload }),
    }
}

/// Receiver for filtered telnet events
pub trait TelnetListener {
    fn on_resize(&mut self, columns: u16, rows: u16);

    fn on_command(&mut self, _event: &CommandEvent) {}

    fn on_subnegotiation(&mut self, _option: TelnetOption, _payload: &[u8]) {}
}

impl<F> TelnetListener for F
where
    F: FnMut(u16, u16),
{
    fn on_resize(&mut self, columns: u16, rows: u16) {
        self(columns, rows)
    }
}

bitflags! {
    /// Options tracked from the peer's negotiation traffic
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct OptionFlags: u8 {
        const ECHO        = 0b001;
        const LINEMODE    = 0b010;
        const WINDOW_SIZE = 0b100;
    }
}

impl OptionFlags {
    pub fn for_option(option: TelnetOption) -> Self {
        match option {
            TelnetOption::Echo => OptionFlags::ECHO,
            TelnetOption::LineMode => OptionFlags::LINEMODE,
            TelnetOption::WindowSize => OptionFlags::WINDOW_SIZE,
            _ => OptionFlags::empty(),
        }
    }
}

/// What the peer has said about each tracked option.
///
/// `remote` follows the peer's WILL/WONT (options it runs on its side),
/// `local` follows DO/DONT (options it asks us to run). Nothing is ever
/// answered; this is bookkeeping only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerOptions {
    pub remote: OptionFlags,
    pub local: OptionFlags,
}

impl PeerOptions {
    pub fn record(&mut self, event: &CommandEvent) {
        let flag = OptionFlags::for_option(event.option);
        match event.verb {
            Verb::Offer => self.remote.insert(flag),
            Verb::Decline => self.remote.remove(flag),
            Verb::Request => self.local.insert(flag),
            Verb::Refuse => self.local.remove(flag),
        }
    }
}

/// Something worth reporting that does not reach the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic<'a> {
    Command(&'a CommandEvent),
    Subnegotiation {
        option: TelnetOption,
        payload: &'a [u8],
    },
    UnrecognizedCommand(u8),
    EmptySubnegotiation,
    TruncatedSubnegotiation {
        option: TelnetOption,
        kept: usize,
    },
    MalformedWindowSize {
        len: usize,
    },
}

/// Destination for filter diagnostics
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic<'_>);
}

/// Default sink: forwards everything to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic<'_>) {
        match diagnostic {
            Diagnostic::Command(event) => {
                debug!("Got IAC {} {}", event.verb, event.option);
            }
            Diagnostic::Subnegotiation { option, payload } => {
                debug!("Got IAC SB {} {:?} IAC SE", option, payload);
            }
            Diagnostic::UnrecognizedCommand(byte) => {
                match super::telnet::protocol::command_name(byte) {
                    Some(name) => debug!("Ignoring telnet command {}", name),
                    None => warn!("Unknown telnet command: 0x{:02X}", byte),
                }
            }
            Diagnostic::EmptySubnegotiation => {
                warn!("Empty telnet subnegotiation discarded");
            }
            Diagnostic::TruncatedSubnegotiation { option, kept } => {
                warn!("Subnegotiation for {} truncated to {} bytes", option, kept);
            }
            Diagnostic::MalformedWindowSize { len } => {
                warn!("NAWS payload of {} bytes ignored (expected 4)", len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_payload() {
        let event = ResizeEvent::from_payload(&[0x00, 0x50, 0x00, 0x18]).unwrap();
        assert_eq!(event, ResizeEvent { columns: 80, rows: 24 });

        let wide = ResizeEvent::from_payload(&[0x01, 0x2C, 0x00, 0xFF]).unwrap();
        assert_eq!(wide, ResizeEvent { columns: 300, rows: 255 });
    }

    #[test]
    fn test_resize_payload_wrong_length() {
        assert_eq!(ResizeEvent::from_payload(&[0x00, 0x50, 0x00]), None);
        assert_eq!(ResizeEvent::from_payload(&[0, 80, 0, 24, 0]), None);
        assert_eq!(
            interpret_subnegotiation(TelnetOption::WindowSize, vec![0, 80]),
            None
        );
    }

    #[test]
    fn test_other_subnegotiation_passes_through() {
        let event = interpret_subnegotiation(TelnetOption::TerminalType, vec![0, b'x']);
        assert_eq!(
            event,
            Some(TelnetEvent::Subnegotiation {
                option: TelnetOption::TerminalType,
                payload: vec![0, b'x'],
            })
        );
    }

    #[test]
    fn test_closure_listener_gets_resize() {
        let mut seen = Vec::new();
        let mut listener = |c: u16, r: u16| seen.push((c, r));
        TelnetEvent::Resize(ResizeEvent { columns: 132, rows: 43 }).deliver(&mut listener);
        TelnetEvent::Command(CommandEvent {
            verb: Verb::Offer,
            option: TelnetOption::WindowSize,
        })
        .deliver(&mut listener);
        assert_eq!(seen, vec![(132, 43)]);
    }

    #[test]
    fn test_peer_options_bookkeeping() {
        let mut opts = PeerOptions::default();
        opts.record(&CommandEvent { verb: Verb::Offer, option: TelnetOption::WindowSize });
        opts.record(&CommandEvent { verb: Verb::Request, option: TelnetOption::Echo });
        opts.record(&CommandEvent { verb: Verb::Offer, option: TelnetOption::Other(99) });
        assert_eq!(opts.remote, OptionFlags::WINDOW_SIZE);
        assert_eq!(opts.local, OptionFlags::ECHO);

        opts.record(&CommandEvent { verb: Verb::Decline, option: TelnetOption::WindowSize });
        assert!(opts.remote.is_empty());
    }
}
