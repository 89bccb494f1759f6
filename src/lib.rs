//! # ESP-AT socket client
//!
//! Turns the serial link to an ESP8266/ESP32 co-processor running the ESP-AT firmware into a
//! socket-like API. Supports a single TCP, UDP or SSL connection, DNS lookups and the
//! multiplexing/transfer mode settings.
//!
//! The serial link needs to implement [embedded_io::Read], [embedded_io::Write] and
//! [embedded_io::ReadReady]. Deadlines are measured by a [fugit_timer::Timer].
//!
//! The device mutex is locked for each full command round-trip. On single-core targets with an
//! interrupt driven UART, pick a raw mutex which does not disable interrupts, e.g. `NoopRawMutex`
//! or `ThreadModeRawMutex` instead of `CriticalSectionRawMutex`.
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
//! let address = device.lookup("example.com").unwrap();
//!
//! let received = device
//!     .with_connection("tcp", "93.184.216.34:80", |connection| {
//!         connection.send(b"hallo!")?;
//!
//!         let mut buffer = [0x0; 32];
//!         let length = connection.receive(&mut buffer)?;
//!         Ok(length)
//!     })
//!     .unwrap();
//!
//! assert_eq!("93.184.216.34", address.to_string());
//! assert_eq!(16, received);
//! ````
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

#[macro_use]
pub(crate) mod fmt;

pub(crate) mod commands;
pub mod config;
pub mod connection;
pub mod device;
pub mod dns;
pub mod error;
pub(crate) mod frames;
pub mod modes;
pub mod reply;
pub mod socket;

#[cfg(feature = "examples")]
pub mod example;

#[cfg(test)]
mod tests;
