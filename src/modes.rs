//! # Multiplexing and transfer mode
//!
//! Both settings are plain get/set pairs. The confirmed value is stored in the session, the
//! transfer mode selects between framed and unvarnished writes.
//!
//! ## Example
//!
//! ````
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use esp_at_socket::device::Device;
//! use esp_at_socket::example::{ExampleTimer, ExampleTransport};
//! use esp_at_socket::modes::MuxMode;
//!
//! let device: Device<_, _, NoopRawMutex, 1_000_000, 256, 256> =
//!     Device::new(ExampleTransport::default(), ExampleTimer::default());
//!
//! device.set_mux_mode(MuxMode::Multiple).unwrap();
//! assert_eq!(MuxMode::Multiple, device.get_mux_mode().unwrap());
//! ````
use crate::commands::{AtCommand, MuxCommand, TransferModeCommand};
use crate::device::{Device, Session, Transport};
use crate::error::Error;
use crate::reply::{Completion, RawResponse};
use embassy_sync::blocking_mutex::raw::RawMutex;
use fugit_timer::Timer;

/// Number of simultaneous connections permitted by the co-processor
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MuxMode {
    /// Single connection
    Single,
    /// Up to four connections. Not supported for dialing.
    Multiple,
}

impl MuxMode {
    pub fn value(&self) -> u32 {
        match self {
            MuxMode::Single => 0,
            MuxMode::Multiple => 1,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Single),
            1 => Some(Self::Multiple),
            _ => None,
        }
    }
}

/// Socket transfer mode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferMode {
    /// Every transmission is confirmed, received data is framed (`+IPD`)
    Normal,
    /// Raw passthrough, left by the escape sequence
    Unvarnished,
}

impl TransferMode {
    pub fn value(&self) -> u32 {
        match self {
            TransferMode::Normal => 0,
            TransferMode::Unvarnished => 1,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::Unvarnished),
            _ => None,
        }
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    Device<T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    /// Last multiplexing mode confirmed by the co-processor, without querying it
    pub fn mux_mode(&self) -> MuxMode {
        self.lock(|session| session.mux_mode)
    }

    /// Last transfer mode confirmed by the co-processor, without querying it
    pub fn transfer_mode(&self) -> TransferMode {
        self.lock(|session| session.transfer_mode)
    }

    pub fn set_mux_mode(&self, mode: MuxMode) -> Result<(), Error> {
        self.lock(|session| {
            session.acknowledge(&MuxCommand::set(mode))?;
            session.mux_mode = mode;
            Ok(())
        })
    }

    /// Queries the current mode from the co-processor
    pub fn get_mux_mode(&self) -> Result<MuxMode, Error> {
        self.lock(|session| {
            let command = MuxCommand::query();
            let value = session.query_setting(&command)?;
            let mode = MuxMode::from_value(value).ok_or(Error::MalformedReply(Default::default()))?;

            session.mux_mode = mode;
            Ok(mode)
        })
    }

    pub fn set_transfer_mode(&self, mode: TransferMode) -> Result<(), Error> {
        self.lock(|session| {
            session.acknowledge(&TransferModeCommand::set(mode))?;
            session.transfer_mode = mode;
            session.frames.reset();
            Ok(())
        })
    }

    /// Queries the current mode from the co-processor
    pub fn get_transfer_mode(&self) -> Result<TransferMode, Error> {
        self.lock(|session| {
            let command = TransferModeCommand::query();
            let value = session.query_setting(&command)?;
            let mode = TransferMode::from_value(value).ok_or(Error::MalformedReply(Default::default()))?;

            session.transfer_mode = mode;
            Ok(mode)
        })
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> Session<T, TM, TIMER_HZ, RX_SIZE> {
    /// Sends a query command and parses the integer value of the `<name>:<value>` line
    fn query_setting<C: AtCommand>(&mut self, command: &C) -> Result<u32, Error> {
        let pause = self.config.pause;
        let response = self.round_trip(command, pause, Completion::Final)?;
        response.expect_ok()?;

        parse_setting(&response, command.name().as_bytes())
    }
}

/// Parses the value of a single integer setting, e.g. `+CIPMUX:1`
pub(crate) fn parse_setting<const N: usize>(response: &RawResponse<N>, tag: &[u8]) -> Result<u32, Error> {
    let payload = response
        .reply()
        .info(tag)
        .ok_or_else(|| Error::MalformedReply(response.diagnostic()))?;

    core::str::from_utf8(payload)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .ok_or_else(|| Error::MalformedReply(response.diagnostic()))
}
