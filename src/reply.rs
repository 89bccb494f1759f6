//! Tokenizer for command replies
//!
//! Replies are split into lines before any interpretation. Markers are matched against
//! whole lines only, so e.g. a `>` inside an echoed command is never taken as send-ready prompt.
use crate::error::{Diagnostic, Error};
use heapless::Vec;

/// Final result line of a reply
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Terminator {
    Ok,
    Error,
    Fail,
    SendOk,
    SendFail,
    /// Connect command for an already established connection
    AlreadyConnected,
}

impl Terminator {
    fn from_line(line: &[u8]) -> Option<Self> {
        match line {
            b"OK" => Some(Self::Ok),
            b"ERROR" => Some(Self::Error),
            b"FAIL" => Some(Self::Fail),
            b"SEND OK" => Some(Self::SendOk),
            b"SEND FAIL" => Some(Self::SendFail),
            b"ALREADY CONNECTED" => Some(Self::AlreadyConnected),
            _ => None,
        }
    }

    /// True for ERROR, FAIL and SEND FAIL
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Error | Self::Fail | Self::SendFail)
    }
}

/// True if the segment is a complete terminator line, including its line break
pub(crate) fn is_terminator_line(segment: &[u8]) -> bool {
    segment
        .strip_suffix(b"\n")
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .and_then(Terminator::from_line)
        .is_some()
}

/// Single classified line of a reply
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Line<'a> {
    /// Echo of the issued command, e.g. `AT+CIPMUX?`
    Echo(&'a [u8]),

    /// Information line, e.g. `+CIPMUX:1` => tag `+CIPMUX`, payload `1`
    Info { tag: &'a [u8], payload: &'a [u8] },

    /// Send-ready prompt, may be the last line without CRLF
    Prompt,

    Terminator(Terminator),

    /// Any other text, e.g. `CONNECT`, `CLOSED` or `Recv 5 bytes`
    Text(&'a [u8]),

    /// Trailing bytes without line terminator
    Incomplete(&'a [u8]),
}

impl<'a> Line<'a> {
    fn classify(line: &'a [u8]) -> Self {
        if let Some(terminator) = Terminator::from_line(line) {
            return Self::Terminator(terminator);
        }

        if line.starts_with(b"AT") {
            return Self::Echo(line);
        }

        if line.starts_with(b">") {
            return Self::Prompt;
        }

        if let Some(position) = line.iter().position(|byte| *byte == b':') {
            return Self::Info {
                tag: &line[..position],
                payload: &line[position + 1..],
            };
        }

        Self::Text(line)
    }
}

/// Iterator over the non-empty lines of a reply
pub struct Lines<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for Lines<'a> {
    type Item = Line<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining.is_empty() {
                return None;
            }

            let Some(end) = self.remaining.iter().position(|byte| *byte == b'\n') else {
                let rest = self.remaining;
                self.remaining = &[];

                if rest.starts_with(b">") {
                    return Some(Line::Prompt);
                }

                return Some(Line::Incomplete(rest));
            };

            let mut line = &self.remaining[..end];
            self.remaining = &self.remaining[end + 1..];

            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }

            if !line.is_empty() {
                return Some(Line::classify(line));
            }
        }
    }
}

/// Tokenized view on raw reply bytes
#[derive(Copy, Clone, Debug)]
pub struct Reply<'a> {
    bytes: &'a [u8],
}

impl<'a> Reply<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn lines(&self) -> Lines<'a> {
        Lines { remaining: self.bytes }
    }

    /// First terminator line, if any
    pub fn terminator(&self) -> Option<Terminator> {
        self.lines().find_map(|line| match line {
            Line::Terminator(terminator) => Some(terminator),
            _ => None,
        })
    }

    /// True if a send-ready prompt line is part of the reply
    pub fn has_prompt(&self) -> bool {
        self.lines().any(|line| line == Line::Prompt)
    }

    /// Payload of the first information line with the given tag
    pub fn info(&self, tag: &[u8]) -> Option<&'a [u8]> {
        self.lines().find_map(|line| match line {
            Line::Info { tag: found, payload } if found == tag => Some(payload),
            _ => None,
        })
    }

    /// True if the reply contains the given text line, e.g. `CLOSED`
    pub fn has_text(&self, text: &[u8]) -> bool {
        self.lines().any(|line| line == Line::Text(text))
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Reply condition the response reader waits for
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Any terminator
    Final,

    /// Send-ready prompt, or a failure
    Prompt,

    /// SEND OK, or a failure
    SendResult,
}

impl Completion {
    pub fn is_reached(&self, reply: &Reply<'_>) -> bool {
        match self {
            Completion::Final => reply.terminator().is_some(),
            Completion::Prompt => {
                reply.has_prompt() || reply.terminator().map(|terminator| terminator.is_failure()).unwrap_or(false)
            }
            Completion::SendResult => matches!(
                reply.terminator(),
                Some(Terminator::SendOk | Terminator::SendFail | Terminator::Error)
            ),
        }
    }
}

/// Bytes returned by one command/response round-trip
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse<const N: usize> {
    pub(crate) bytes: Vec<u8, N>,

    /// True if the deadline elapsed before the awaited reply was complete
    pub(crate) timed_out: bool,
}

impl<const N: usize> RawResponse<N> {
    pub(crate) fn new() -> Self {
        Self {
            bytes: Vec::new(),
            timed_out: false,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True if the reply arrived before the deadline
    pub fn in_time(&self) -> bool {
        !self.timed_out
    }

    pub fn reply(&self) -> Reply<'_> {
        Reply::new(&self.bytes)
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic::capture(&self.bytes)
    }

    /// Turns a timed out response into [Error::Timeout]
    pub fn complete(self) -> Result<Self, Error> {
        if self.timed_out {
            return Err(Error::Timeout(self.diagnostic()));
        }

        Ok(self)
    }

    /// Succeeds if the reply was terminated by OK
    pub fn expect_ok(&self) -> Result<(), Error> {
        match self.reply().terminator() {
            Some(Terminator::Ok) => Ok(()),
            Some(terminator) if terminator.is_failure() => Err(Error::CommandFailed(self.diagnostic())),
            _ => Err(Error::MalformedReply(self.diagnostic())),
        }
    }
}
