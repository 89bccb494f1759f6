//! # Device and response reader
//!
//! [Device] is the sole owner of the serial transport, the deadline timer and the session state.
//! The protocol is half-duplex without request identifiers, so every command/response
//! round-trip runs inside one critical section of the device mutex. Connections and other
//! callers only hold a shared reference to the device.
//!
//! The lock is held for the full round-trip, up to the longest deadline (6 s for SSL). The raw
//! mutex therefore must not mask interrupts while the transport depends on them:
//! `CriticalSectionRawMutex` disables interrupts on single-core targets, so an interrupt driven
//! UART never becomes ready and every command times out. Use `NoopRawMutex` when the device is
//! accessed from a single execution context, or `ThreadModeRawMutex` for thread mode access
//! with UART interrupts.
//!
//! ## Example
//!
//! ````
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use esp_at_socket::device::Device;
//! use esp_at_socket::example::{ExampleTimer, ExampleTransport};
//!
//! let device: Device<_, _, NoopRawMutex, 1_000_000, 256, 256> =
//!     Device::new(ExampleTransport::default(), ExampleTimer::default());
//!
//! device.ping().unwrap();
//! device.set_echo(false).unwrap();
//! ````
use crate::commands::{AtCommand, EchoCommand, PingCommand, COMMAND_SIZE};
use crate::config::{Config, Deadline};
use crate::connection::ConnectionState;
use crate::error::Error;
use crate::fmt::Printable;
use crate::frames::FrameDecoder;
use crate::modes::{MuxMode, TransferMode};
use crate::reply::{is_terminator_line, Completion, RawResponse, Reply};
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_io::{Read, ReadReady, Write};
use fugit_timer::Timer;
use heapless::Vec;

/// Serial channel to the co-processor
pub trait Transport: Read + Write + ReadReady {}

impl<T: Read + Write + ReadReady> Transport for T {}

/// Number of bytes fetched from the transport at once
const READ_CHUNK_SIZE: usize = 32;

/// Length of `+IPD,`
const FRAME_PREFIX_LEN: usize = 5;

/// Central client for the co-processor
///
/// TX_SIZE: Max. payload size per send-ready handshake. Larger writes are split into chunks.
///
/// RX_SIZE: Size of the reply buffer and of the buffer for received but not yet consumed socket data.
///
/// R: Raw mutex serializing the round-trips. Must not mask interrupts the transport relies on,
/// s. [module documentation](self).
///
/// TX_SIZE must not be zero:
///
/// ````compile_fail
/// use embassy_sync::blocking_mutex::raw::NoopRawMutex;
/// use esp_at_socket::device::Device;
/// use esp_at_socket::example::{ExampleTimer, ExampleTransport};
///
/// let device: Device<_, _, NoopRawMutex, 1_000_000, 0, 256> =
///     Device::new(ExampleTransport::default(), ExampleTimer::default());
/// ````
pub struct Device<
    T: Transport,
    TM: Timer<TIMER_HZ>,
    R: RawMutex,
    const TIMER_HZ: u32,
    const TX_SIZE: usize,
    const RX_SIZE: usize,
> {
    session: Mutex<R, RefCell<Session<T, TM, TIMER_HZ, RX_SIZE>>>,
}

/// Mutable state, only accessible while holding the device lock
pub(crate) struct Session<T: Transport, TM: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> {
    pub(crate) transport: T,

    /// Timer used for deadline measurement
    pub(crate) timer: TM,

    pub(crate) config: Config,

    /// State of the single connection
    pub(crate) state: ConnectionState,

    /// Last multiplexing mode confirmed by the co-processor
    pub(crate) mux_mode: MuxMode,

    /// Last transfer mode confirmed by the co-processor
    pub(crate) transfer_mode: TransferMode,

    /// True if unvarnished data was sent and the escape sequence is still outstanding
    pub(crate) raw_session: bool,

    /// Connection was closed by the remote side
    pub(crate) peer_closed: bool,

    /// Raw socket data was dropped, as the pending buffer was full
    pub(crate) receive_overflow: bool,

    /// Separates socket data frames from replies
    pub(crate) frames: FrameDecoder,

    /// Received socket data not yet consumed by a read
    pub(crate) pending: Vec<u8, RX_SIZE>,
}

impl<T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    Device<T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    const TX_SIZE_CHECK: () = assert!(TX_SIZE > 0, "TX_SIZE must not be zero");

    /// Creates a new device with default deadlines
    pub fn new(transport: T, timer: TM) -> Self {
        Self::with_config(transport, timer, Config::default())
    }

    pub fn with_config(transport: T, timer: TM, config: Config) -> Self {
        let () = Self::TX_SIZE_CHECK;

        Self {
            session: Mutex::new(RefCell::new(Session {
                transport,
                timer,
                config,
                state: ConnectionState::Idle,
                mux_mode: MuxMode::Single,
                transfer_mode: TransferMode::Normal,
                raw_session: false,
                peer_closed: false,
                receive_overflow: false,
                frames: FrameDecoder::new(),
                pending: Vec::new(),
            })),
        }
    }

    /// Runs the given closure with exclusive access to the session
    pub(crate) fn lock<U>(&self, f: impl FnOnce(&mut Session<T, TM, TIMER_HZ, RX_SIZE>) -> U) -> U {
        self.session.lock(|session| f(&mut session.borrow_mut()))
    }

    /// Checks if the co-processor responds to commands
    pub fn ping(&self) -> Result<(), Error> {
        self.lock(|session| session.acknowledge(&PingCommand))
    }

    /// Enables or disables the command echo
    pub fn set_echo(&self, enabled: bool) -> Result<(), Error> {
        self.lock(|session| session.acknowledge(&EchoCommand::new(enabled)))
    }

    /// Current state of the single connection
    pub fn state(&self) -> ConnectionState {
        self.lock(|session| session.state)
    }

    pub fn config(&self) -> Config {
        self.lock(|session| session.config)
    }

    /// Releases transport and timer
    pub fn release(self) -> (T, TM) {
        let session = self.session.into_inner().into_inner();
        (session.transport, session.timer)
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> Session<T, TM, TIMER_HZ, RX_SIZE> {
    /// Encodes and writes a single command line
    pub(crate) fn send_command<C: AtCommand>(&mut self, command: &C) -> Result<(), Error> {
        let line: Vec<u8, COMMAND_SIZE> = command.encode()?;
        self.collect_input()?;

        debug!("Sending command {:?}", Printable(&line));
        self.write_raw(&line)
    }

    /// Writes bytes to the transport without any framing
    pub(crate) fn write_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        self.transport.write_all(data).map_err(Error::transport)?;
        self.transport.flush().map_err(Error::transport)
    }

    /// Sends the command and awaits its reply. A missed deadline results in [Error::Timeout].
    pub(crate) fn round_trip<C: AtCommand>(
        &mut self,
        command: &C,
        deadline: Deadline,
        completion: Completion,
    ) -> Result<RawResponse<RX_SIZE>, Error> {
        self.send_command(command)?;
        self.wait(deadline, completion)?.complete()
    }

    /// Sends an acknowledgment-only command using the generic pause
    pub(crate) fn acknowledge<C: AtCommand>(&mut self, command: &C) -> Result<(), Error> {
        let pause = self.config.pause;
        self.round_trip(command, pause, Completion::Final)?.expect_ok()
    }

    /// Reads from the transport until the reply reaches the given completion or the deadline elapses.
    ///
    /// Never blocks past the deadline, as the transport is just read if data is ready. The deadline
    /// is checked after every chunk, also while data keeps arriving.
    /// An elapsed deadline is not an error here, but is flagged on the returned response.
    pub(crate) fn wait(&mut self, deadline: Deadline, completion: Completion) -> Result<RawResponse<RX_SIZE>, Error> {
        let mut response = RawResponse::new();
        let mut chunk = [0x0; READ_CHUNK_SIZE];
        self.timer.start(deadline.duration()).map_err(|_| Error::TimerError)?;

        loop {
            if self.transport.read_ready().map_err(Error::transport)? {
                let length = self.transport.read(&mut chunk).map_err(Error::transport)?;

                for byte in &chunk[..length] {
                    self.intake(*byte, &mut response.bytes)?;
                }

                if length > 0 && completion.is_reached(&response.reply()) {
                    trace!("Received reply {:?}", Printable(response.bytes()));
                    return Ok(self.finish_reply(response));
                }
            }

            match self.timer.wait() {
                Ok(_) => {
                    warn!("Deadline of {} ms elapsed, partial reply {:?}", deadline.as_millis(), Printable(response.bytes()));
                    response.timed_out = true;
                    return Ok(self.finish_reply(response));
                }
                Err(nb::Error::Other(_)) => return Err(Error::TimerError),
                Err(nb::Error::WouldBlock) => {}
            }
        }
    }

    /// Evaluates unsolicited messages. During a raw transmission socket data is moved out of the reply.
    fn finish_reply(&mut self, mut response: RawResponse<RX_SIZE>) -> RawResponse<RX_SIZE> {
        if self.raw_session {
            self.extract_raw_data(&mut response);
        }

        self.observe_notifications(&response.reply());
        response
    }

    /// Only complete terminator lines stay in the reply, all other bytes are socket data.
    /// The line break right before a terminator is part of its framing.
    fn extract_raw_data(&mut self, response: &mut RawResponse<RX_SIZE>) {
        let received = core::mem::take(&mut response.bytes);
        let mut segments = received.split_inclusive(|byte| *byte == b'\n').peekable();

        while let Some(segment) = segments.next() {
            if is_terminator_line(segment) {
                // Segment originates from a buffer of the same capacity
                let _ = response.bytes.extend_from_slice(segment);
                continue;
            }

            let framing = segments.peek().map(|next| is_terminator_line(next)).unwrap_or(false);
            let data = match framing {
                true => segment.strip_suffix(b"\r\n").unwrap_or(segment),
                false => segment,
            };

            self.store_received(data);
        }
    }

    /// Appends raw socket data to the pending buffer. Bytes exceeding the capacity are dropped
    /// and reported by the next receive.
    fn store_received(&mut self, data: &[u8]) {
        for byte in data {
            if self.pending.push(*byte).is_err() {
                self.receive_overflow = true;
            }
        }
    }

    /// Returns and clears the flag of dropped socket data
    pub(crate) fn take_receive_overflow(&mut self) -> bool {
        let overflowed = self.frames.take_overflow() || self.receive_overflow;
        self.receive_overflow = false;
        overflowed
    }

    /// Routes a single received byte either to the reply or, if part of a socket data frame, to the pending data
    fn intake(&mut self, byte: u8, reply: &mut Vec<u8, RX_SIZE>) -> Result<(), Error> {
        match self.transfer_mode {
            TransferMode::Normal => self.frames.push(byte, reply, &mut self.pending),
            TransferMode::Unvarnished => reply.push(byte).map_err(|_| Error::ResponseOverflow),
        }
    }

    /// Consumes all bytes which are currently ready without waiting.
    ///
    /// Socket data is appended to the pending buffer. Unsolicited messages are evaluated and dropped.
    pub(crate) fn collect_input(&mut self) -> Result<(), Error> {
        let mut chunk = [0x0; READ_CHUNK_SIZE];
        let mut messages: Vec<u8, RX_SIZE> = Vec::new();

        loop {
            let capacity = self.pending.capacity() - self.pending.len();
            let length = capacity.min(READ_CHUNK_SIZE);

            if length == 0 || !self.transport.read_ready().map_err(Error::transport)? {
                break;
            }

            let length = self.transport.read(&mut chunk[..length]).map_err(Error::transport)?;
            if length == 0 {
                break;
            }

            for byte in &chunk[..length] {
                if self.raw_session {
                    self.store_received(&[*byte]);
                    continue;
                }

                // Held back frame prefix bytes may get flushed at once
                if messages.capacity() - messages.len() <= FRAME_PREFIX_LEN {
                    self.observe_notifications(&Reply::new(&messages));
                    messages.clear();
                }

                self.intake(*byte, &mut messages)?;
            }

            self.observe_notifications(&Reply::new(&messages));
            if messages.ends_with(b"\n") {
                messages.clear();
            }
        }

        Ok(())
    }

    /// Evaluates unsolicited messages contained in a reply
    fn observe_notifications(&mut self, reply: &Reply<'_>) {
        if self.state.is_open() && reply.has_text(b"CLOSED") {
            debug!("Connection closed by remote side");
            self.peer_closed = true;
        }
    }

    /// Switches the connection state
    pub(crate) fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            trace!("Connection state {:?} => {:?}", self.state, next);
        }

        self.state = next;
    }
}
