//! # DNS lookup
//!
//! Lookups are independent of the connection state. Neither retries nor caching take place.
//!
//! ## Example
//!
//! ````
//! use core::net::{IpAddr, Ipv4Addr};
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use esp_at_socket::device::Device;
//! use esp_at_socket::example::{ExampleTimer, ExampleTransport};
//!
//! let device: Device<_, _, NoopRawMutex, 1_000_000, 256, 256> =
//!     Device::new(ExampleTransport::default(), ExampleTimer::default());
//!
//! let address = device.lookup("example.com").unwrap();
//! assert_eq!(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)), address);
//! ````
use crate::commands::DnsLookupCommand;
use crate::connection::validate_host;
use crate::device::{Device, Session, Transport};
use crate::error::{Diagnostic, Error};
use crate::reply::{Completion, Line, Reply};
use core::net::IpAddr;
use core::str::FromStr;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_nal::{AddrType, Dns};
use fugit_timer::Timer;

impl<T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    Device<T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    /// Resolves the given domain name
    ///
    /// Returns [Error::MalformedReply] if the reply could not be parsed and [Error::Timeout] if
    /// no reply arrived in time.
    pub fn lookup(&self, domain: &str) -> Result<IpAddr, Error> {
        self.lock(|session| session.lookup(domain))
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> Session<T, TM, TIMER_HZ, RX_SIZE> {
    fn lookup(&mut self, domain: &str) -> Result<IpAddr, Error> {
        validate_host(domain)?;

        // Colon is the tag separator of the reply
        if domain.contains(':') {
            return Err(Error::InvalidAddress);
        }

        let deadline = self.config.dns_timeout;
        let response = self.round_trip(&DnsLookupCommand::new(domain), deadline, Completion::Final)?;

        let address = parse_lookup_reply(response.bytes());
        debug!("Resolved {} => {:?}", domain, address);
        address
    }
}

/// Parses a lookup reply like `+CIPDOMAIN:93.184.216.34\r\n\r\nOK\r\n`.
///
/// The reply must contain exactly one colon, separating the tag from the address. The address
/// is the remainder of that line, which must be terminated.
pub(crate) fn parse_lookup_reply(bytes: &[u8]) -> Result<IpAddr, Error> {
    let malformed = || Error::MalformedReply(Diagnostic::capture(bytes));

    if bytes.iter().filter(|byte| **byte == b':').count() != 1 {
        return Err(malformed());
    }

    let payload = Reply::new(bytes)
        .lines()
        .find_map(|line| match line {
            Line::Info { payload, .. } => Some(payload),
            _ => None,
        })
        .ok_or_else(malformed)?;

    let address = core::str::from_utf8(payload).map_err(|_| malformed())?;
    let address = address.trim().trim_matches('"');

    IpAddr::from_str(address).map_err(|_| malformed())
}

impl<T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize> Dns
    for Device<T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    type Error = Error;

    /// Resolves IPv4 addresses only
    fn get_host_by_name(&mut self, hostname: &str, addr_type: AddrType) -> nb::Result<IpAddr, Self::Error> {
        if matches!(addr_type, AddrType::IPv6) {
            return Err(nb::Error::Other(Error::UnsupportedNetwork));
        }

        Ok(self.lookup(hostname)?)
    }

    /// Reverse lookups are not supported by the co-processor
    fn get_host_by_address(&mut self, _addr: IpAddr, _result: &mut [u8]) -> nb::Result<usize, Self::Error> {
        Err(nb::Error::Other(Error::UnsupportedNetwork))
    }
}
