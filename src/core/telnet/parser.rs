//! Telnet command decoder
//!
//! Classifies a raw telnet byte stream one byte at a time into data bytes,
//! negotiation commands and subnegotiation blocks. All partial state lives
//! in the decoder, so a sequence may be split at any byte boundary.

use super::protocol::{TelnetOption, Verb, IAC, SB, SE};

/// Upper bound on buffered subnegotiation bytes (option code included)
pub const MAX_SUBNEGOTIATION_LEN: usize = 512;

/// Result of feeding one byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Byte consumed as part of an unfinished command
    Pending,
    /// Payload byte for the consumer
    Data(u8),
    /// `IAC <verb> <option>`
    Command(Verb, TelnetOption),
    /// `IAC SB <option> <payload> IAC SE`
    Subnegotiation {
        option: TelnetOption,
        payload: Vec<u8>,
        /// Payload exceeded `MAX_SUBNEGOTIATION_LEN` and was cut short
        truncated: bool,
    },
    /// `IAC SB IAC SE` with no option byte
    EmptySubnegotiation,
    /// A byte after IAC that is not a verb, SB or an escaped IAC
    Unrecognized(u8),
}

/// Decoder mode, persisted across reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParserState {
    #[default]
    Normal,
    SawEscape,
    AwaitingOption(Verb),
    InSubnegotiation,
    /// IAC received inside a subnegotiation, waiting for SE or a second IAC
    SubnegotiationEscape,
}

/// IAC sequence state machine
#[derive(Debug, Default)]
pub struct CommandDecoder {
    state: ParserState,
    subneg: Vec<u8>,
    truncated: bool,
}

impl CommandDecoder {
    pub fn new() -> Self {
        Self {
            state: ParserState::Normal,
            subneg: Vec::with_capacity(16),
            truncated: false,
        }
    }

    /// Current mode
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// True when no command is partially decoded
    pub fn is_idle(&self) -> bool {
        self.state == ParserState::Normal
    }

    /// Forget any partial sequence. Only meant for stream close.
    pub fn reset(&mut self) {
        self.state = ParserState::Normal;
        self.subneg.clear();
        self.truncated = false;
    }

    /// Feed a single byte to the decoder
    pub fn feed(&mut self, byte: u8) -> Decoded {
        match self.state {
            ParserState::Normal => self.normal(byte),
            ParserState::SawEscape => self.escape(byte),
            ParserState::AwaitingOption(verb) => {
                self.state = ParserState::Normal;
                Decoded::Command(verb, TelnetOption::from_byte(byte))
            }
            ParserState::InSubnegotiation => self.subnegotiation(byte),
            ParserState::SubnegotiationEscape => self.subnegotiation_escape(byte),
        }
    }

    fn normal(&mut self, byte: u8) -> Decoded {
        if byte == IAC {
            self.state = ParserState::SawEscape;
            Decoded::Pending
        } else {
            Decoded::Data(byte)
        }
    }

    fn escape(&mut self, byte: u8) -> Decoded {
        if byte == IAC {
            // IAC IAC is a literal 0xFF
            self.state = ParserState::Normal;
            return Decoded::Data(IAC);
        }
        if let Some(verb) = Verb::from_byte(byte) {
            self.state = ParserState::AwaitingOption(verb);
            return Decoded::Pending;
        }
        if byte == SB {
            self.subneg.clear();
            self.truncated = false;
            self.state = ParserState::InSubnegotiation;
            return Decoded::Pending;
        }
        self.state = ParserState::Normal;
        Decoded::Unrecognized(byte)
    }

    fn subnegotiation(&mut self, byte: u8) -> Decoded {
        if byte == IAC {
            self.state = ParserState::SubnegotiationEscape;
        } else {
            self.accumulate(byte);
        }
        Decoded::Pending
    }

    fn subnegotiation_escape(&mut self, byte: u8) -> Decoded {
        match byte {
            SE => {
                self.state = ParserState::Normal;
                self.finish_subnegotiation()
            }
            IAC => {
                self.accumulate(IAC);
                self.state = ParserState::InSubnegotiation;
                Decoded::Pending
            }
            other => {
                // Stray command inside SB; the block stays open
                self.state = ParserState::InSubnegotiation;
                Decoded::Unrecognized(other)
            }
        }
    }

    fn accumulate(&mut self, byte: u8) {
        if self.subneg.len() < MAX_SUBNEGOTIATION_LEN {
            self.subneg.push(byte);
        } else {
            self.truncated = true;
        }
    }

    fn finish_subnegotiation(&mut self) -> Decoded {
        let truncated = std::mem::replace(&mut self.truncated, false);
        if self.subneg.is_empty() {
            return Decoded::EmptySubnegotiation;
        }
        let option = TelnetOption::from_byte(self.subneg[0]);
        let payload = self.subneg[1..].to_vec();
        self.subneg.clear();
        Decoded::Subnegotiation {
            option,
            payload,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::telnet::protocol::{DO, NOP, WILL};

    fn decode_all(decoder: &mut CommandDecoder, bytes: &[u8]) -> Vec<Decoded> {
        bytes
            .iter()
            .map(|b| decoder.feed(*b))
            .filter(|d| *d != Decoded::Pending)
            .collect()
    }

    #[test]
    fn test_plain_bytes_pass_through() {
        let mut decoder = CommandDecoder::new();
        let out = decode_all(&mut decoder, b"ls -la\r\n");
        let data: Vec<u8> = out
            .into_iter()
            .map(|d| match d {
                Decoded::Data(b) => b,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(data, b"ls -la\r\n");
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_escaped_iac() {
        let mut decoder = CommandDecoder::new();
        assert_eq!(decode_all(&mut decoder, &[IAC, IAC]), vec![Decoded::Data(IAC)]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_negotiation_command() {
        let mut decoder = CommandDecoder::new();
        let out = decode_all(&mut decoder, &[IAC, DO, 0x1F]);
        assert_eq!(out, vec![Decoded::Command(Verb::Request, TelnetOption::WindowSize)]);
    }

    #[test]
    fn test_state_persists_between_feeds() {
        let mut decoder = CommandDecoder::new();
        assert_eq!(decoder.feed(IAC), Decoded::Pending);
        assert_eq!(decoder.state(), ParserState::SawEscape);
        assert_eq!(decoder.feed(WILL), Decoded::Pending);
        assert_eq!(decoder.state(), ParserState::AwaitingOption(Verb::Offer));
        assert_eq!(
            decoder.feed(0x01),
            Decoded::Command(Verb::Offer, TelnetOption::Echo)
        );
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_window_size_subnegotiation() {
        let mut decoder = CommandDecoder::new();
        let out = decode_all(&mut decoder, &[IAC, SB, 0x1F, 0x00, 0x50, 0x00, 0x18, IAC, SE]);
        assert_eq!(
            out,
            vec![Decoded::Subnegotiation {
                option: TelnetOption::WindowSize,
                payload: vec![0x00, 0x50, 0x00, 0x18],
                truncated: false,
            }]
        );
    }

    #[test]
    fn test_doubled_iac_inside_subnegotiation() {
        let mut decoder = CommandDecoder::new();
        // 255 columns must be sent as IAC IAC
        let out = decode_all(
            &mut decoder,
            &[IAC, SB, 0x1F, 0x00, IAC, IAC, 0x00, 0x18, IAC, SE],
        );
        assert_eq!(
            out,
            vec![Decoded::Subnegotiation {
                option: TelnetOption::WindowSize,
                payload: vec![0x00, 0xFF, 0x00, 0x18],
                truncated: false,
            }]
        );
    }

    #[test]
    fn test_unrecognized_command_is_dropped() {
        let mut decoder = CommandDecoder::new();
        let out = decode_all(&mut decoder, &[b'a', IAC, NOP, b'b']);
        assert_eq!(
            out,
            vec![Decoded::Data(b'a'), Decoded::Unrecognized(NOP), Decoded::Data(b'b')]
        );
    }

    #[test]
    fn test_stray_command_inside_subnegotiation() {
        let mut decoder = CommandDecoder::new();
        let out = decode_all(&mut decoder, &[IAC, SB, 0x18, 0x00, IAC, NOP, b'x', IAC, SE]);
        assert_eq!(
            out,
            vec![
                Decoded::Unrecognized(NOP),
                Decoded::Subnegotiation {
                    option: TelnetOption::TerminalType,
                    payload: vec![0x00, b'x'],
                    truncated: false,
                },
            ]
        );
    }

    #[test]
    fn test_empty_subnegotiation() {
        let mut decoder = CommandDecoder::new();
        let out = decode_all(&mut decoder, &[IAC, SB, IAC, SE, b'z']);
        assert_eq!(out, vec![Decoded::EmptySubnegotiation, Decoded::Data(b'z')]);
    }

    #[test]
    fn test_oversized_subnegotiation_is_truncated() {
        let mut decoder = CommandDecoder::new();
        let mut input = vec![IAC, SB, 0x18];
        input.extend(std::iter::repeat(b'x').take(MAX_SUBNEGOTIATION_LEN + 10));
        input.extend_from_slice(&[IAC, SE]);
        let out = decode_all(&mut decoder, &input);
        match &out[..] {
            [Decoded::Subnegotiation { payload, truncated, .. }] => {
                assert!(*truncated);
                assert_eq!(payload.len(), MAX_SUBNEGOTIATION_LEN - 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_reset_discards_partial_sequence() {
        let mut decoder = CommandDecoder::new();
        decode_all(&mut decoder, &[IAC, SB, 0x1F, 0x00]);
        assert_eq!(decoder.state(), ParserState::InSubnegotiation);
        decoder.reset();
        assert!(decoder.is_idle());
        assert_eq!(decode_all(&mut decoder, b"q"), vec![Decoded::Data(b'q')]);
    }
}
