use crate::error::Error;
use heapless::Vec;

const FRAME_PREFIX: &[u8; 5] = b"+IPD,";

/// Decoder state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    /// Regular reply bytes
    Reply,
    /// Bytes matching a prefix of `+IPD,`
    Prefix(usize),
    /// Reading the decimal length until `:`
    Length(usize),
    /// Remaining payload bytes of the current frame
    Payload(usize),
}

/// Separates `+IPD,<len>:<data>` socket data frames from the reply stream.
///
/// In normal transfer mode received socket data may arrive at any time, also in between a
/// command and its reply. Frame payload is appended to the pending data buffer, all other
/// bytes to the reply. Payload exceeding the data buffer is dropped and flagged, the frame
/// is still consumed, so the reply stays intact.
#[derive(Debug)]
pub(crate) struct FrameDecoder {
    state: State,
    overflowed: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Reply,
            overflowed: false,
        }
    }

    /// Returns and clears the flag of dropped payload bytes
    pub fn take_overflow(&mut self) -> bool {
        core::mem::replace(&mut self.overflowed, false)
    }

    /// Resets a partially decoded frame
    pub fn reset(&mut self) {
        self.state = State::Reply;
    }

    pub fn push<const REPLY_SIZE: usize, const DATA_SIZE: usize>(
        &mut self,
        byte: u8,
        reply: &mut Vec<u8, REPLY_SIZE>,
        data: &mut Vec<u8, DATA_SIZE>,
    ) -> Result<(), Error> {
        self.state = match self.state {
            State::Reply if byte == FRAME_PREFIX[0] => State::Prefix(1),
            State::Reply => {
                Self::push_reply(reply, &[byte])?;
                State::Reply
            }
            State::Prefix(matched) if FRAME_PREFIX[matched] == byte => match matched + 1 {
                length if length == FRAME_PREFIX.len() => State::Length(0),
                length => State::Prefix(length),
            },
            State::Prefix(matched) => {
                // Not a frame, so the held back bytes belong to the reply
                Self::push_reply(reply, &FRAME_PREFIX[..matched])?;

                if byte == FRAME_PREFIX[0] {
                    State::Prefix(1)
                } else {
                    Self::push_reply(reply, &[byte])?;
                    State::Reply
                }
            }
            State::Length(length) => match byte {
                b'0'..=b'9' => State::Length(length.saturating_mul(10).saturating_add((byte - b'0') as usize)),
                // Link ID in multiple connection mode precedes the length
                b',' => State::Length(0),
                b':' if length == 0 => State::Reply,
                b':' => State::Payload(length),
                _ => State::Reply,
            },
            State::Payload(remaining) => {
                if data.push(byte).is_err() {
                    self.overflowed = true;
                }

                match remaining - 1 {
                    0 => State::Reply,
                    remaining => State::Payload(remaining),
                }
            }
        };

        Ok(())
    }

    fn push_reply<const REPLY_SIZE: usize>(reply: &mut Vec<u8, REPLY_SIZE>, bytes: &[u8]) -> Result<(), Error> {
        reply.extend_from_slice(bytes).map_err(|_| Error::ResponseOverflow)
    }
}
