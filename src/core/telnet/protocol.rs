//! Telnet wire constants
//!
//! Command and option codes from RFC 854 / RFC 855, plus the options this
//! crate cares about: ECHO (RFC 857), NAWS (RFC 1073) and LINEMODE (RFC 1184).

use std::fmt;

/// Interpret As Command
pub const IAC: u8 = 0xFF;
pub const DONT: u8 = 0xFE;
pub const DO: u8 = 0xFD;
pub const WONT: u8 = 0xFC;
pub const WILL: u8 = 0xFB;
/// Subnegotiation begin
pub const SB: u8 = 0xFA;
pub const GA: u8 = 0xF9;
pub const EL: u8 = 0xF8;
pub const EC: u8 = 0xF7;
pub const AYT: u8 = 0xF6;
pub const AO: u8 = 0xF5;
pub const IP: u8 = 0xF4;
pub const BRK: u8 = 0xF3;
pub const DM: u8 = 0xF2;
pub const NOP: u8 = 0xF1;
/// Subnegotiation end
pub const SE: u8 = 0xF0;
pub const EOR: u8 = 0xEF;

/// LINEMODE subnegotiation: MODE
pub const LINEMODE_MODE: u8 = 0x01;

/// Negotiation verb carried by a three-byte `IAC <verb> <option>` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// `DO`: request that the peer enable an option
    Request,
    /// `DONT`: refuse (or demand the peer disable) an option
    Refuse,
    /// `WILL`: offer to enable an option locally
    Offer,
    /// `WONT`: decline to enable an option locally
    Decline,
}

impl Verb {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            DO => Some(Verb::Request),
            DONT => Some(Verb::Refuse),
            WILL => Some(Verb::Offer),
            WONT => Some(Verb::Decline),
            _ => None,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Verb::Request => DO,
            Verb::Refuse => DONT,
            Verb::Offer => WILL,
            Verb::Decline => WONT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Verb::Request => "DO",
            Verb::Refuse => "DONT",
            Verb::Offer => "WILL",
            Verb::Decline => "WONT",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Telnet option identifier.
///
/// Only the options the handshake asks for get their own variant; every
/// other code is carried through untouched as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelnetOption {
    Echo,
    SuppressGoAhead,
    TerminalType,
    WindowSize,
    TerminalSpeed,
    LineMode,
    Other(u8),
}

impl TelnetOption {
    pub const ECHO: u8 = 0x01;
    pub const SUPPRESS_GO_AHEAD: u8 = 0x03;
    pub const TERMINAL_TYPE: u8 = 0x18;
    pub const NAWS: u8 = 0x1F;
    pub const TERMINAL_SPEED: u8 = 0x20;
    pub const LINEMODE: u8 = 0x22;

    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::ECHO => TelnetOption::Echo,
            Self::SUPPRESS_GO_AHEAD => TelnetOption::SuppressGoAhead,
            Self::TERMINAL_TYPE => TelnetOption::TerminalType,
            Self::NAWS => TelnetOption::WindowSize,
            Self::TERMINAL_SPEED => TelnetOption::TerminalSpeed,
            Self::LINEMODE => TelnetOption::LineMode,
            other => TelnetOption::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            TelnetOption::Echo => Self::ECHO,
            TelnetOption::SuppressGoAhead => Self::SUPPRESS_GO_AHEAD,
            TelnetOption::TerminalType => Self::TERMINAL_TYPE,
            TelnetOption::WindowSize => Self::NAWS,
            TelnetOption::TerminalSpeed => Self::TERMINAL_SPEED,
            TelnetOption::LineMode => Self::LINEMODE,
            TelnetOption::Other(code) => code,
        }
    }
}

impl fmt::Display for TelnetOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelnetOption::Echo => f.write_str("ECHO"),
            TelnetOption::SuppressGoAhead => f.write_str("SUPPRESS-GO-AHEAD"),
            TelnetOption::TerminalType => f.write_str("TERMINAL-TYPE"),
            TelnetOption::WindowSize => f.write_str("NAWS"),
            TelnetOption::TerminalSpeed => f.write_str("TERMINAL-SPEED"),
            TelnetOption::LineMode => f.write_str("LINEMODE"),
            TelnetOption::Other(code) => write!(f, "OPTION-{}", code),
        }
    }
}

/// Name of a two-byte command code, for diagnostics.
pub fn command_name(byte: u8) -> Option<&'static str> {
    let name = match byte {
        SE => "SE",
        NOP => "NOP",
        DM => "DM",
        BRK => "BRK",
        IP => "IP",
        AO => "AO",
        AYT => "AYT",
        EC => "EC",
        EL => "EL",
        GA => "GA",
        EOR => "EOR",
        SB => "SB",
        _ => return None,
    };
    Some(name)
}
