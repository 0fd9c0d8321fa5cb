//! Incremental record splitting
//!
//! Both splitters keep a carry-over buffer with cursors into it. Consumed
//! bytes are compacted away at the start of each `push`, so each input byte is
//! scanned once and the buffer only ever holds the partial record in progress.
//!
//! Long-poll bodies are split on top-level array elements by bracket depth.
//! Bracket bytes inside JSON string literals do not count towards depth.
//! Continuous bodies are split on `\n`.

use super::envelope::{EnvelopeMatcher, EnvelopeProgress, RESULTS_PREFIX};
use super::types::FeedMode;
use crate::config::FeedConfig;
use crate::error::FeedError;
use serde_json::Value;

/// What a splitter knows once the writer has finished
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitOutcome {
    /// The long-poll envelope was closed; always true for continuous feeds
    pub complete: bool,
    /// `last_seq` read from the long-poll trailer
    pub last_seq: Option<Value>,
    /// Blank lines skipped in continuous mode
    pub heartbeats: u64,
    /// Buffered bytes that never formed a record
    pub discarded: usize,
}

/// Tracks whether the scanner is inside a JSON string literal
#[derive(Debug, Clone, Copy, Default)]
struct StringScan {
    in_string: bool,
    escaped: bool,
}

impl StringScan {
    /// Returns true when `byte` is part of a string literal, quotes included
    fn consume(&mut self, byte: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            true
        } else if byte == b'"' {
            self.in_string = true;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayState {
    BetweenRecords,
    InRecord,
    /// Past the closing `]` of the results array
    Done,
}

/// Splits the elements of a long-poll `results` array
#[derive(Debug)]
pub struct ArraySplitter {
    envelope: EnvelopeMatcher,
    buf: Vec<u8>,
    /// Next byte to scan
    pos: usize,
    /// First byte of the record in progress
    start: usize,
    /// Absolute stream offset of `buf[0]`
    base: u64,
    state: ArrayState,
    depth: usize,
    strings: StringScan,
    /// Depth of the trailer relative to the envelope object
    trailer_depth: usize,
    envelope_closed: bool,
    trailer: Vec<u8>,
    trailer_limit: usize,
    trailer_overflow: bool,
}

impl ArraySplitter {
    pub fn new(trailer_limit: usize) -> Self {
        Self {
            envelope: EnvelopeMatcher::new(),
            buf: Vec::new(),
            pos: 0,
            start: 0,
            base: 0,
            state: ArrayState::BetweenRecords,
            depth: 0,
            strings: StringScan::default(),
            trailer_depth: 1,
            envelope_closed: false,
            trailer: Vec::new(),
            trailer_limit,
            trailer_overflow: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), FeedError> {
        let body = if self.envelope.is_open() {
            chunk
        } else {
            match self.envelope.feed(chunk)? {
                EnvelopeProgress::Pending => return Ok(()),
                EnvelopeProgress::Open { consumed } => {
                    self.base = RESULTS_PREFIX.len() as u64;
                    &chunk[consumed..]
                }
            }
        };

        self.compact();
        self.buf.extend_from_slice(body);
        Ok(())
    }

    fn compact(&mut self) {
        let keep_from = if self.state == ArrayState::InRecord {
            self.start
        } else {
            self.pos
        };
        if keep_from == 0 {
            return;
        }
        self.buf.drain(..keep_from);
        self.base += keep_from as u64;
        self.pos -= keep_from;
        self.start = self.start.saturating_sub(keep_from);
    }

    fn offset(&self, index: usize) -> u64 {
        self.base + index as u64
    }

    pub fn next_record(&mut self) -> Result<Option<String>, FeedError> {
        while self.pos < self.buf.len() {
            let index = self.pos;
            let byte = self.buf[index];
            self.pos += 1;

            match self.state {
                ArrayState::BetweenRecords => match byte {
                    b',' => {}
                    b if b.is_ascii_whitespace() => {}
                    b'{' | b'[' => {
                        self.state = ArrayState::InRecord;
                        self.start = index;
                        self.depth = 1;
                    }
                    b']' => {
                        tracing::trace!(offset = self.offset(index), "Results array closed");
                        self.state = ArrayState::Done;
                    }
                    b'}' => return Err(FeedError::unbalanced(self.offset(index))),
                    other => return Err(FeedError::unexpected_byte(self.offset(index), other)),
                },
                ArrayState::InRecord => {
                    if self.strings.consume(byte) {
                        continue;
                    }
                    match byte {
                        b'{' | b'[' => self.depth += 1,
                        b'}' | b']' => {
                            self.depth -= 1;
                            if self.depth == 0 {
                                self.state = ArrayState::BetweenRecords;
                                return self.take_record(self.start, self.pos).map(Some);
                            }
                        }
                        _ => {}
                    }
                }
                ArrayState::Done => self.scan_trailer(index, byte)?,
            }
        }

        Ok(None)
    }

    fn take_record(&self, start: usize, end: usize) -> Result<String, FeedError> {
        String::from_utf8(self.buf[start..end].to_vec())
            .map_err(|_| FeedError::invalid_utf8(self.offset(start)))
    }

    fn scan_trailer(&mut self, index: usize, byte: u8) -> Result<(), FeedError> {
        if !self.envelope_closed {
            if self.trailer.len() < self.trailer_limit {
                self.trailer.push(byte);
            } else {
                self.trailer_overflow = true;
            }
        }

        if self.strings.consume(byte) {
            return Ok(());
        }
        match byte {
            b'{' | b'[' => self.trailer_depth += 1,
            b'}' | b']' => {
                if self.trailer_depth == 0 {
                    return Err(FeedError::unbalanced(self.offset(index)));
                }
                if self.trailer_depth == 1 && !self.envelope_closed && byte == b']' {
                    return Err(FeedError::mismatched_close(self.offset(index)));
                }
                self.trailer_depth -= 1;
                if self.trailer_depth == 0 && !self.envelope_closed {
                    tracing::trace!(offset = self.offset(index), "Envelope object closed");
                    self.envelope_closed = true;
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn finish(&mut self) -> SplitOutcome {
        let discarded = if !self.envelope.is_open() {
            self.envelope.cursor()
        } else if self.state == ArrayState::InRecord {
            self.buf.len() - self.start
        } else {
            self.buf.len() - self.pos
        };

        let last_seq = if !self.envelope_closed {
            None
        } else if self.trailer_overflow {
            tracing::debug!(
                limit = self.trailer_limit,
                "Trailer exceeded retention limit; last_seq not extracted"
            );
            None
        } else {
            parse_last_seq(&self.trailer)
        };

        SplitOutcome {
            complete: self.envelope_closed,
            last_seq,
            heartbeats: 0,
            discarded,
        }
    }

    pub fn buffered(&self) -> usize {
        if self.state == ArrayState::InRecord {
            self.buf.len() - self.start
        } else {
            self.buf.len() - self.pos
        }
    }
}

/// Read `last_seq` from the text following the results array
///
/// The trailer looks like `,"last_seq":3}`; reopening it as an object makes
/// it parseable on its own.
fn parse_last_seq(trailer: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(trailer).ok()?.trim_start();
    let body = text.strip_prefix(',').unwrap_or(text);
    match serde_json::from_str::<Value>(&format!("{{{body}")) {
        Ok(doc) => doc.get("last_seq").cloned(),
        Err(e) => {
            tracing::debug!("Ignoring unparseable long-poll trailer: {}", e);
            None
        }
    }
}

/// Splits a continuous feed into lines
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
    /// Next byte to search for a terminator
    pos: usize,
    line_start: usize,
    base: u64,
    heartbeats: u64,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.line_start > 0 {
            self.buf.drain(..self.line_start);
            self.base += self.line_start as u64;
            self.pos -= self.line_start;
            self.line_start = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    pub fn next_record(&mut self) -> Result<Option<String>, FeedError> {
        while let Some(found) = self.buf[self.pos..].iter().position(|&b| b == b'\n') {
            let terminator = self.pos + found;
            let start = self.line_start;
            let mut end = terminator;
            if end > start && self.buf[end - 1] == b'\r' {
                end -= 1;
            }
            self.line_start = terminator + 1;
            self.pos = terminator + 1;

            let line = &self.buf[start..end];
            if line.is_empty() {
                self.heartbeats += 1;
                tracing::trace!("Heartbeat line");
                continue;
            }
            return String::from_utf8(line.to_vec())
                .map(Some)
                .map_err(|_| FeedError::invalid_utf8(self.base + start as u64));
        }

        self.pos = self.buf.len();
        Ok(None)
    }

    pub fn finish(&mut self) -> SplitOutcome {
        SplitOutcome {
            complete: true,
            last_seq: None,
            heartbeats: self.heartbeats,
            discarded: self.buf.len() - self.line_start,
        }
    }

    pub fn buffered(&self) -> usize {
        self.buf.len() - self.line_start
    }
}

/// Mode-specific splitter behind one interface
#[derive(Debug)]
pub enum RecordSplitter {
    LongPoll(ArraySplitter),
    Continuous(LineSplitter),
}

impl RecordSplitter {
    pub fn new(mode: FeedMode, config: &FeedConfig) -> Self {
        match mode {
            FeedMode::LongPoll => Self::LongPoll(ArraySplitter::new(config.trailer_limit)),
            FeedMode::Continuous => Self::Continuous(LineSplitter::new()),
        }
    }

    pub fn mode(&self) -> FeedMode {
        match self {
            Self::LongPoll(_) => FeedMode::LongPoll,
            Self::Continuous(_) => FeedMode::Continuous,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), FeedError> {
        match self {
            Self::LongPoll(splitter) => splitter.push(chunk),
            Self::Continuous(splitter) => {
                splitter.push(chunk);
                Ok(())
            }
        }
    }

    pub fn next_record(&mut self) -> Result<Option<String>, FeedError> {
        match self {
            Self::LongPoll(splitter) => splitter.next_record(),
            Self::Continuous(splitter) => splitter.next_record(),
        }
    }

    pub fn finish(&mut self) -> SplitOutcome {
        match self {
            Self::LongPoll(splitter) => splitter.finish(),
            Self::Continuous(splitter) => splitter.finish(),
        }
    }

    /// Bytes held that are not yet part of an emitted record
    pub fn buffered(&self) -> usize {
        match self {
            Self::LongPoll(splitter) => splitter.buffered(),
            Self::Continuous(splitter) => splitter.buffered(),
        }
    }
}

/// Split a complete sequence of chunks without a stream around it
pub fn split_chunks<I, C>(
    mode: FeedMode,
    config: &FeedConfig,
    chunks: I,
) -> Result<(Vec<String>, SplitOutcome), FeedError>
where
    I: IntoIterator<Item = C>,
    C: AsRef<[u8]>,
{
    let mut splitter = RecordSplitter::new(mode, config);
    let mut records = Vec::new();
    for chunk in chunks {
        splitter.push(chunk.as_ref())?;
        while let Some(record) = splitter.next_record()? {
            records.push(record);
        }
    }
    Ok((records, splitter.finish()))
}
