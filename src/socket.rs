//! # Socket I/O
//!
//! Every write is preceded by the send-ready handshake: the payload length is announced and the
//! payload is only written after the `>` prompt was received. Writes larger than TX_SIZE are
//! split into multiple handshakes.
//!
//! Reading never amplifies: [Connection::receive] returns the data which is currently available.
//! The [embedded_io::Read] implementation waits up to the configured read timeout for the first byte.
//!
//! ## Example
//!
//! ````
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use embedded_io::{Read, Write};
//! use esp_at_socket::device::Device;
//! use esp_at_socket::example::{ExampleTimer, ExampleTransport};
//!
//! let device: Device<_, _, NoopRawMutex, 1_000_000, 256, 256> =
//!     Device::new(ExampleTransport::default(), ExampleTimer::default());
//!
//! let mut connection = device.dial("tcp", "10.0.0.1:21").unwrap();
//! connection.write_all(b"hallo!").unwrap();
//!
//! let mut buffer = [0x0; 64];
//! let length = connection.read(&mut buffer).unwrap();
//! assert_eq!(b"nice to see you!", &buffer[..length]);
//!
//! connection.close().unwrap();
//! ````
use crate::commands::{PrepareSendCommand, ESCAPE_SEQUENCE};
use crate::connection::{Connection, ConnectionState};
use crate::device::{Device, Session, Transport};
use crate::error::{Diagnostic, Error};
use crate::modes::TransferMode;
use crate::reply::{Completion, Terminator};
use embassy_sync::blocking_mutex::raw::RawMutex;
use fugit_timer::Timer;

impl<'d, T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    Connection<'d, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    /// Sends the given data and returns the number of bytes sent
    pub fn send(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.device.lock(|session| {
            for chunk in data.chunks(TX_SIZE) {
                session.send_chunk(chunk)?;
            }

            Ok(data.len())
        })
    }

    /// Returns the received data which is currently available, 0 if there is none.
    /// Does not wait for further data.
    ///
    /// Returns [Error::ReceiveOverflow] once if data was dropped, as the receive buffer was full.
    /// Data stored before stays available for the next call.
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        self.device.lock(|session| session.receive(buffer))
    }

    /// Leaves the unvarnished transfer mode, s. [Device::end_send]
    pub fn end_send(&mut self) -> Result<(), Error> {
        self.device.end_send()
    }

    /// True if the remote side closed the connection
    pub fn is_closed_by_peer(&self) -> bool {
        self.device.lock(|session| session.peer_closed)
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    Device<T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    /// Announces the transmission of `length` bytes and awaits the send-ready prompt.
    ///
    /// Returns [Error::HandshakeRejected] if the reply does not contain the prompt.
    pub fn prepare_send(&self, length: usize) -> Result<(), Error> {
        self.lock(|session| session.prepare_send(length))
    }

    /// Writes the escape sequence for returning from unvarnished transfer mode to command mode
    /// and waits once for the generic acknowledgment.
    ///
    /// Returns [Error::Timeout] if the acknowledgment is missing after the pause and
    /// [Error::CommandFailed] on an explicit ERROR reply.
    pub fn end_send(&self) -> Result<(), Error> {
        self.lock(|session| session.end_send())
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> Session<T, TM, TIMER_HZ, RX_SIZE> {
    /// Handshake + payload + acknowledgment of a single chunk
    fn send_chunk(&mut self, data: &[u8]) -> Result<(), Error> {
        self.prepare_send(data.len())?;
        self.transmit(data)
    }

    pub(crate) fn prepare_send(&mut self, length: usize) -> Result<(), Error> {
        if !matches!(self.state, ConnectionState::Connected | ConnectionState::SendReady(_)) {
            return Err(Error::NotConnected);
        }

        let deadline = self.config.prepare_send_timeout;
        let response = match self.round_trip(&PrepareSendCommand::new(length), deadline, Completion::Prompt) {
            Ok(response) => response,
            Err(error) => {
                self.transition(ConnectionState::Connected);
                return Err(error);
            }
        };

        if !response.reply().has_prompt() {
            warn!("Send-ready prompt missing for {} bytes", length);
            self.transition(ConnectionState::Connected);
            return Err(Error::HandshakeRejected(response.diagnostic()));
        }

        self.transition(ConnectionState::SendReady(length));
        Ok(())
    }

    /// Writes the payload after a successful handshake and awaits the acknowledgment
    fn transmit(&mut self, data: &[u8]) -> Result<(), Error> {
        if self.state != ConnectionState::SendReady(data.len()) {
            return Err(Error::HandshakeRejected(Diagnostic::empty()));
        }

        self.transition(ConnectionState::Transferring);
        let result = self.transmit_payload(data);
        self.transition(ConnectionState::Connected);
        result
    }

    fn transmit_payload(&mut self, data: &[u8]) -> Result<(), Error> {
        trace!("Sending {} payload bytes", data.len());
        self.write_raw(data)?;

        if self.transfer_mode == TransferMode::Unvarnished {
            self.raw_session = true;
        }

        let deadline = self.config.send_ack_timeout;
        let response = self.wait(deadline, Completion::SendResult)?;
        let terminator = response.reply().terminator();

        match terminator {
            Some(Terminator::SendOk) => Ok(()),
            Some(Terminator::SendFail | Terminator::Error) => Err(Error::SendFailed(response.diagnostic())),
            _ => {
                response.complete()?;
                Ok(())
            }
        }
    }

    pub(crate) fn end_send(&mut self) -> Result<(), Error> {
        trace!("Sending escape sequence");
        self.write_raw(ESCAPE_SEQUENCE)?;

        // Socket data may still arrive until the acknowledgment
        let pause = self.config.pause;
        let response = self.wait(pause, Completion::Final);
        self.raw_session = false;

        let response = response?.complete()?;
        let terminator = response.reply().terminator();

        match terminator {
            Some(terminator) if terminator.is_failure() => Err(Error::CommandFailed(response.diagnostic())),
            _ => Ok(()),
        }
    }

    pub(crate) fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        if !self.state.is_open() && self.pending.is_empty() {
            return Err(Error::NotConnected);
        }

        self.collect_input()?;

        if self.take_receive_overflow() {
            warn!("Received data dropped, receive buffer full");
            return Err(Error::ReceiveOverflow);
        }

        let length = buffer.len().min(self.pending.len());
        buffer[..length].copy_from_slice(&self.pending[..length]);

        let remaining = self.pending.len() - length;
        self.pending.copy_within(length.., 0);
        self.pending.truncate(remaining);

        Ok(length)
    }

    /// Waits up to the read timeout for the first received byte. Returns 0 if the connection
    /// was closed by the remote side and no more data is pending.
    pub(crate) fn read_blocking(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let deadline = self.config.read_timeout;
        self.timer.start(deadline.duration()).map_err(|_| Error::TimerError)?;

        loop {
            let length = self.receive(buffer)?;
            if length > 0 || self.peer_closed {
                return Ok(length);
            }

            match self.timer.wait() {
                Ok(_) => return Err(Error::Timeout(Diagnostic::empty())),
                Err(nb::Error::Other(_)) => return Err(Error::TimerError),
                Err(nb::Error::WouldBlock) => {}
            }
        }
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    embedded_io::ErrorType for Connection<'_, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    type Error = Error;
}

impl<T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    embedded_io::Read for Connection<'_, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.device.lock(|session| session.read_blocking(buf))
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    embedded_io::Write for Connection<'_, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.send(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
