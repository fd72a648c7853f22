//! Expect-style pattern matching over a live output stream.
//!
//! The matcher is an explicit state machine over a growing read buffer: each
//! chunk received from the transport is appended, then the buffer is scanned
//! for every registered pattern. The first pattern *to appear in the stream*
//! wins, not the first one in the caller's list, mirroring interactive
//! terminal matching semantics. The matcher owns no I/O of its own, so it can
//! be driven by any byte source in tests.

use std::fmt;
use std::time::Duration;

use log::trace;
use regex::Regex;

use crate::error::BackupError;
use crate::transport::SessionHandle;

/// A textual pattern awaited in device output.
#[derive(Debug, Clone)]
pub enum ExpectPattern {
    /// Match an exact substring.
    Literal(String),
    /// Match a compiled regular expression.
    Regex(Regex),
}

impl ExpectPattern {
    /// Creates a literal pattern.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Compiles a regex pattern.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    /// Finds the earliest occurrence in `text`, as a byte span.
    fn find(&self, text: &str) -> Option<(usize, usize)> {
        match self {
            Self::Literal(s) => text.find(s.as_str()).map(|pos| (pos, pos + s.len())),
            Self::Regex(re) => re.find(text).map(|m| (m.start(), m.end())),
        }
    }
}

impl fmt::Display for ExpectPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "'{s}'"),
            Self::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// A successful expect: which pattern appeared and what was read to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectMatch {
    /// Index of the winning pattern in the caller's list.
    pub pattern_index: usize,
    /// Everything read before the match.
    pub before: String,
    /// The matched text itself.
    pub matched: String,
}

impl ExpectMatch {
    /// Every byte consumed by this expect, up to and including the match.
    pub fn consumed(&self) -> String {
        format!("{}{}", self.before, self.matched)
    }
}

/// Growing, bounded read buffer with pattern scanning.
///
/// One matcher lives for the duration of one session: text left over after a
/// match (device output that arrived past the matched pattern) stays buffered
/// and is considered by the next expect, exactly like a terminal stream.
pub struct Matcher {
    buffer: String,
    capacity: usize,
}

impl Matcher {
    /// Creates a matcher with the given buffer capacity in bytes.
    pub fn new(capacity: u64) -> Self {
        Self {
            buffer: String::new(),
            capacity: capacity as usize,
        }
    }

    /// Appends a chunk of device output to the buffer.
    ///
    /// Exceeding the configured capacity is an explicit error: a
    /// configuration dump must never be silently truncated.
    pub fn feed(&mut self, chunk: &str) -> Result<(), BackupError> {
        if self.buffer.len() + chunk.len() > self.capacity {
            return Err(BackupError::CaptureOverflow(self.capacity as u64));
        }
        self.buffer.push_str(chunk);
        Ok(())
    }

    /// Text currently buffered but not yet consumed by a match.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Drains and returns the unconsumed buffer.
    pub fn take_pending(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    /// Scans the buffer for the pattern that appears earliest in the stream.
    ///
    /// On a match, the consumed prefix (through the end of the match) is
    /// drained from the buffer; the remainder stays for later calls. Ties at
    /// the same offset are broken by list order.
    pub fn match_in_buffer(&mut self, patterns: &[ExpectPattern]) -> Option<ExpectMatch> {
        let mut winner: Option<(usize, usize, usize)> = None;
        for (index, pattern) in patterns.iter().enumerate() {
            if let Some((start, end)) = pattern.find(&self.buffer) {
                let better = match winner {
                    Some((best_start, _, _)) => start < best_start,
                    None => true,
                };
                if better {
                    winner = Some((start, end, index));
                }
            }
        }

        let (start, end, pattern_index) = winner?;
        let consumed: String = self.buffer.drain(..end).collect();
        let before = consumed[..start].to_string();
        let matched = consumed[start..].to_string();
        trace!("Matched pattern {} at offset {}", patterns[pattern_index], start);

        Some(ExpectMatch {
            pattern_index,
            before,
            matched,
        })
    }

    /// Blocks until one of `patterns` appears in the output stream or the
    /// timeout elapses.
    ///
    /// A timeout is a hard stop for the session: the accumulated partial text
    /// is drained into the error so the caller can persist it.
    pub async fn expect(
        &mut self,
        handle: &mut SessionHandle,
        patterns: &[ExpectPattern],
        timeout: Duration,
    ) -> Result<ExpectMatch, BackupError> {
        // Output that arrived during a previous step may already contain the
        // pattern; check before waiting on the channel.
        if let Some(found) = self.match_in_buffer(patterns) {
            return Ok(found);
        }

        let result = tokio::time::timeout(timeout, async {
            loop {
                match handle.recv().await {
                    Some(chunk) => {
                        trace!("{:?}", chunk);
                        self.feed(&chunk)?;
                        if let Some(found) = self.match_in_buffer(patterns) {
                            return Ok(found);
                        }
                    }
                    None => return Err(BackupError::SessionClosed),
                }
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(BackupError::ExpectTimeout {
                pattern: patterns
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
                pending: self.take_pending(),
            }),
        }
    }
}
