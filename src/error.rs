use core::fmt::{Display, Formatter};
use embedded_io::ErrorKind;
use heapless::Vec;

/// Max. number of reply bytes kept for diagnostics
pub const DIAGNOSTIC_SIZE: usize = 64;

/// Bounded copy of a raw reply, attached to errors for troubleshooting only
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Diagnostic {
    bytes: Vec<u8, DIAGNOSTIC_SIZE>,
}

impl Diagnostic {
    /// Copies the first [DIAGNOSTIC_SIZE] bytes of the given reply
    pub fn capture(reply: &[u8]) -> Self {
        let length = reply.len().min(DIAGNOSTIC_SIZE);

        // Length is bounded by capacity
        let bytes = Vec::from_slice(&reply[..length]).unwrap_or_default();
        Self { bytes }
    }

    /// Empty diagnostic, used when no reply bytes were seen at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Captured reply bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl core::fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "\"{:?}\"", crate::fmt::Printable(&self.bytes))
    }
}

/// Driver errors
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Dial was requested with a network other then TCP, UDP or SSL
    UnsupportedNetwork,

    /// Dial attempted while a connection is already open
    TooManyConnections,

    /// No terminating reply arrived within the deadline. Contains the partial reply.
    Timeout(Diagnostic),

    /// Reply was received but did not have the expected structure
    MalformedReply(Diagnostic),

    /// Underlying serial transport failed
    Transport(ErrorKind),

    /// Send-ready prompt was missing in the reply to the prepare-send command
    HandshakeRejected(Diagnostic),

    /// Command was explicitly answered by ERROR or FAIL
    CommandFailed(Diagnostic),

    /// Peer confirmed the data transmission as failed (SEND FAIL or ERROR)
    SendFailed(Diagnostic),

    /// Host name or address is not usable as command argument
    InvalidAddress,

    /// Encoded command does not fit in the command buffer
    CommandOverflow,

    /// Reply exceeded the reply buffer (RX_SIZE)
    ResponseOverflow,

    /// Received socket data exceeded the pending buffer (RX_SIZE), the excess bytes were dropped
    ReceiveOverflow,

    /// Socket operation on a connection which is not open
    NotConnected,

    /// Upstream timer error
    TimerError,
}

impl Error {
    pub(crate) fn transport<E: embedded_io::Error>(error: E) -> Self {
        Self::Transport(error.kind())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::UnsupportedNetwork => f.write_str("unsupported network"),
            Error::TooManyConnections => f.write_str("too many open connections"),
            Error::Timeout(reply) => write!(f, "timeout, partial reply {:?}", reply),
            Error::MalformedReply(reply) => write!(f, "malformed reply {:?}", reply),
            Error::Transport(kind) => write!(f, "transport failure: {:?}", kind),
            Error::HandshakeRejected(reply) => write!(f, "send-ready handshake rejected: {:?}", reply),
            Error::CommandFailed(reply) => write!(f, "command failed: {:?}", reply),
            Error::SendFailed(reply) => write!(f, "send failed: {:?}", reply),
            Error::InvalidAddress => f.write_str("invalid address"),
            Error::CommandOverflow => f.write_str("command exceeds buffer"),
            Error::ResponseOverflow => f.write_str("reply exceeds buffer"),
            Error::ReceiveOverflow => f.write_str("received data exceeds buffer"),
            Error::NotConnected => f.write_str("socket not connected"),
            Error::TimerError => f.write_str("timer error"),
        }
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout(_) => ErrorKind::TimedOut,
            Error::NotConnected => ErrorKind::NotConnected,
            Error::InvalidAddress => ErrorKind::InvalidInput,
            Error::Transport(kind) => *kind,
            _ => ErrorKind::Other,
        }
    }
}
