//! Telnet stream demultiplexer
//!
//! [`IacFilter`] sits between a raw telnet connection and whatever turns
//! bytes into keystrokes. It pulls raw bytes, runs them through the
//! [`CommandDecoder`], keeps the data bytes in a bounded FIFO and queues
//! everything out-of-band as [`TelnetEvent`]s.
//!
//! ```text
//! RawSource ──read_raw──► chunk ──CommandDecoder──┬─► ByteRing ──read──► consumer
//!                                                  └─► events ──take_events / dispatch_events
//! ```
//!
//! Decoder state survives between fills, so commands and subnegotiations
//! may straddle any number of reads.

use std::collections::VecDeque;
use std::io;

use thiserror::Error;
use tracing::debug;

use super::events::{
    interpret_subnegotiation, CommandEvent, Diagnostic, DiagnosticSink, PeerOptions,
    TelnetEvent, TelnetListener, TracingDiagnostics,
};
use super::queue::ByteRing;
use super::source::RawSource;
use super::telnet::{CommandDecoder, Decoded, ParserState};

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Failed to read from telnet source: {0}")]
    Io(#[from] io::Error),

    #[error("Single-byte read is not supported by the telnet filter, read into a buffer")]
    SingleByteRead,
}

pub type Result<T> = std::result::Result<T, FilterError>;

impl From<FilterError> for io::Error {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Unsupported, other),
        }
    }
}

/// Outcome of a non-blocking [`IacFilter::read`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// Bytes copied; zero when nothing is ready yet
    Data(usize),
    /// Source exhausted (or filter closed) and nothing left queued
    Eof,
}

/// Buffer sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    /// Largest single read from the raw source
    pub raw_chunk_size: usize,
    /// Filtered bytes held before back-pressure kicks in
    pub queue_capacity: usize,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            raw_chunk_size: 1024,
            queue_capacity: 64 * 1024,
        }
    }
}

/// Splits a raw telnet stream into data bytes and events
pub struct IacFilter<S, D = TracingDiagnostics> {
    source: S,
    diagnostics: D,
    /// Scratch space for one raw read
    chunk: Box<[u8]>,
    queue: ByteRing,
    decoder: CommandDecoder,
    /// Undelivered events; held until the caller drains them
    events: VecDeque<TelnetEvent>,
    peer: PeerOptions,
    eof: bool,
    closed: bool,
}

impl<S: RawSource> IacFilter<S> {
    pub fn new(source: S) -> Self {
        Self::with_options(source, FilterOptions::default())
    }

    pub fn with_options(source: S, options: FilterOptions) -> Self {
        IacFilter::with_diagnostics(source, options, TracingDiagnostics)
    }
}

impl<S: RawSource, D: DiagnosticSink> IacFilter<S, D> {
    pub fn with_diagnostics(source: S, options: FilterOptions, diagnostics: D) -> Self {
        Self {
            source,
            diagnostics,
            chunk: vec![0u8; options.raw_chunk_size.max(1)].into_boxed_slice(),
            queue: ByteRing::with_capacity(options.queue_capacity),
            decoder: CommandDecoder::new(),
            events: VecDeque::new(),
            peer: PeerOptions::default(),
            eof: false,
            closed: false,
        }
    }

    /// Pull one raw read from the source and filter it.
    ///
    /// Reads at most as many raw bytes as the queue has room for, so a
    /// full queue reads nothing. Returns the raw byte count; zero means
    /// end-of-stream, a full queue, or a closed filter.
    pub fn fill(&mut self) -> Result<usize> {
        if self.closed || self.eof {
            return Ok(0);
        }
        let room = self.queue.remaining().min(self.chunk.len());
        if room == 0 {
            return Ok(0);
        }

        let n = self.source.read_raw(&mut self.chunk[..room])?;
        if n == 0 {
            debug!("Telnet source reached end-of-stream");
            self.eof = true;
            return Ok(0);
        }

        for i in 0..n {
            let byte = self.chunk[i];
            self.process(byte);
        }
        Ok(n)
    }

    fn process(&mut self, byte: u8) {
        match self.decoder.feed(byte) {
            Decoded::Pending => {}
            Decoded::Data(b) => {
                // One raw byte yields at most one data byte and fill()
                // never reads more than the free space
                let stored = self.queue.push(b);
                debug_assert!(stored, "filtered queue overflow");
            }
            Decoded::Command(verb, option) => {
                let event = CommandEvent { verb, option };
                self.diagnostics.report(Diagnostic::Command(&event));
                self.peer.record(&event);
                self.emit(TelnetEvent::Command(event));
            }
            Decoded::Subnegotiation {
                option,
                payload,
                truncated,
            } => {
                if truncated {
                    self.diagnostics.report(Diagnostic::TruncatedSubnegotiation {
                        option,
                        kept: payload.len(),
                    });
                    return;
                }
                self.diagnostics.report(Diagnostic::Subnegotiation {
                    option,
                    payload: &payload,
                });
                let len = payload.len();
                match interpret_subnegotiation(option, payload) {
                    Some(event) => self.emit(event),
                    None => self.diagnostics.report(Diagnostic::MalformedWindowSize { len }),
                }
            }
            Decoded::EmptySubnegotiation => {
                self.diagnostics.report(Diagnostic::EmptySubnegotiation);
            }
            Decoded::Unrecognized(b) => {
                self.diagnostics.report(Diagnostic::UnrecognizedCommand(b));
            }
        }
    }

    fn emit(&mut self, event: TelnetEvent) {
        self.events.push_back(event);
    }

    /// Non-blocking read of filtered bytes.
    ///
    /// With an empty queue the source is only touched if it reports data
    /// ready. `Data(0)` means try again later.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<ReadStatus> {
        if self.closed {
            return Ok(ReadStatus::Eof);
        }
        if self.queue.is_empty() && !self.eof && self.source.ready_hint()? > 0 {
            self.fill()?;
        }
        if self.queue.is_empty() {
            return Ok(if self.eof {
                ReadStatus::Eof
            } else {
                ReadStatus::Data(0)
            });
        }
        Ok(ReadStatus::Data(self.queue.pop_into(buf)))
    }

    /// Blocking read: fills until at least one data byte is queued.
    /// `Ok(0)` means end-of-stream.
    pub fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.closed {
                return Ok(0);
            }
            if !self.queue.is_empty() {
                return Ok(self.queue.pop_into(buf));
            }
            if self.eof {
                return Ok(0);
            }
            self.fill()?;
        }
    }

    /// Single-byte reads are not supported; always a usage error
    pub fn read_byte(&mut self) -> Result<u8> {
        Err(FilterError::SingleByteRead)
    }

    /// Filtered bytes ready to read, filling once first if the source
    /// has data and the queue has room
    pub fn available_hint(&mut self) -> Result<usize> {
        if self.closed {
            return Ok(0);
        }
        if self.eof || self.queue.is_full() {
            return Ok(self.queue.len());
        }
        if self.source.ready_hint()? == 0 {
            return Ok(self.queue.len());
        }
        self.fill()?;
        Ok(self.queue.len())
    }

    /// Remove and return all queued events, oldest first
    pub fn take_events(&mut self) -> Vec<TelnetEvent> {
        self.events.drain(..).collect()
    }

    /// Deliver all queued events to `listener`; returns how many
    pub fn dispatch_events<L: TelnetListener + ?Sized>(&mut self, listener: &mut L) -> usize {
        let mut count = 0;
        while let Some(event) = self.events.pop_front() {
            event.deliver(listener);
            count += 1;
        }
        count
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn peer_options(&self) -> PeerOptions {
        self.peer
    }

    pub fn parser_state(&self) -> ParserState {
        self.decoder.state()
    }

    /// Filtered bytes currently queued
    pub fn buffered(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn is_eof(&self) -> bool {
        self.closed || (self.eof && self.queue.is_empty())
    }

    /// Stop filtering. Queued data, events and partial commands are
    /// dropped; every later read reports end-of-stream.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.queue.clear();
        self.events.clear();
        self.decoder.reset();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get_ref(&self) -> &S {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: RawSource, D: DiagnosticSink> io::Read for IacFilter<S, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_blocking(buf).map_err(io::Error::from)
    }
}
