//! Raw byte sources
//!
//! The filter pulls unfiltered telnet bytes through [`RawSource`]. A TCP
//! stream is the real thing; [`ScriptedSource`] replays canned chunks.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::net::TcpStream;

/// Byte producer underneath the filter
pub trait RawSource {
    /// Blocking read. `Ok(0)` means end-of-stream.
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Non-blocking hint: non-zero when `read_raw` would return without
    /// blocking. A pending end-of-stream counts as readable.
    fn ready_hint(&mut self) -> io::Result<usize>;
}

/// The readiness hint flips the socket to non-blocking for one peek and
/// then back to blocking. The mode is shared by every clone of the
/// stream, so the socket must stay in blocking mode while a filter owns it.
impl RawSource for TcpStream {
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn ready_hint(&mut self) -> io::Result<usize> {
        let mut scratch = [0u8; 1024];
        self.set_nonblocking(true)?;
        let peeked = self.peek(&mut scratch);
        self.set_nonblocking(false)?;

        match peeked {
            Ok(0) => Ok(1),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }
}

enum Step {
    Data(Vec<u8>),
    Fail(io::ErrorKind),
}

/// In-memory source that hands out pre-arranged chunks.
///
/// Each chunk is delivered by its own read (split further only if the
/// caller's buffer is smaller). With nothing queued, reads fail with
/// `WouldBlock` until [`finish`](Self::finish) marks end-of-stream.
#[derive(Default)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    finished: bool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// One chunk per element, then end-of-stream
    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        let mut source = Self::new();
        for chunk in chunks {
            source.push(chunk);
        }
        source.finish();
        source
    }

    pub fn push(&mut self, chunk: impl Into<Vec<u8>>) {
        let chunk = chunk.into();
        if !chunk.is_empty() {
            self.steps.push_back(Step::Data(chunk));
        }
    }

    /// Queue a read failure
    pub fn push_error(&mut self, kind: io::ErrorKind) {
        self.steps.push_back(Step::Fail(kind));
    }

    /// No more data after the queued chunks
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Bytes still queued
    pub fn pending(&self) -> usize {
        self.steps
            .iter()
            .map(|s| match s {
                Step::Data(d) => d.len(),
                Step::Fail(_) => 0,
            })
            .sum()
    }
}

impl RawSource for ScriptedSource {
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            Some(Step::Data(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.steps.push_front(Step::Data(chunk.split_off(n)));
                }
                Ok(n)
            }
            Some(Step::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            None if self.finished => Ok(0),
            None => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "scripted source has no data",
            )),
        }
    }

    fn ready_hint(&mut self) -> io::Result<usize> {
        match self.steps.front() {
            Some(Step::Data(chunk)) => Ok(chunk.len()),
            Some(Step::Fail(_)) => Ok(1),
            None if self.finished => Ok(1),
            None => Ok(0),
        }
    }
}
