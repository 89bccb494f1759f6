//! # Connection state machine
//!
//! A single connection is supported: `Idle → Connecting → Connected → (SendReady → Transferring →
//! Connected)* → Closing → Idle`. Dialing while a connection is open fails with
//! [Error::TooManyConnections] without sending any command.
//!
//! Closing is explicit. [Device::with_connection] guarantees the close on every exit path.
//!
//! ## Example
//!
//! ````
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use esp_at_socket::connection::ConnectionState;
//! use esp_at_socket::device::Device;
//! use esp_at_socket::error::Error;
//! use esp_at_socket::example::{ExampleTimer, ExampleTransport};
//!
//! let device: Device<_, _, NoopRawMutex, 1_000_000, 256, 256> =
//!     Device::new(ExampleTransport::default(), ExampleTimer::default());
//!
//! let connection = device.dial("tcp", "10.0.0.1:21").unwrap();
//! assert_eq!(ConnectionState::Connected, device.state());
//!
//! // Just a single connection at once
//! assert_eq!(Some(Error::TooManyConnections), device.dial("tcp", "10.0.0.2:21").err());
//!
//! connection.close().unwrap();
//! assert_eq!(ConnectionState::Idle, device.state());
//! ````
use crate::commands::{CloseCommand, ConnectCommand};
use crate::device::{Device, Session, Transport};
use crate::error::Error;
use crate::reply::{Completion, Terminator};
use embassy_sync::blocking_mutex::raw::RawMutex;
use fugit_timer::Timer;

/// Max. length of a remote host name or address
pub const MAX_HOST_LENGTH: usize = 64;

/// Default TCP/SSL keepalive in seconds
pub const DEFAULT_KEEPALIVE: u16 = 120;

/// State of the single connection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection open, dial is possible
    Idle,
    /// Connect command was sent, awaiting confirmation
    Connecting,
    /// Connection is fully open
    Connected,
    /// Send-ready prompt was received for exactly this number of bytes
    SendReady(usize),
    /// Payload bytes are written, awaiting the acknowledgment
    Transferring,
    /// Close command was sent
    Closing,
}

impl ConnectionState {
    /// True if a connection is established (incl. ongoing transmissions)
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Connected | Self::SendReady(_) | Self::Transferring)
    }
}

/// Supported network protocols
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
    Ssl,
}

impl Protocol {
    /// Maps a network name (`tcp`, `udp` or `ssl`, case insensitive) to the protocol
    pub fn from_network(network: &str) -> Result<Self, Error> {
        if network.eq_ignore_ascii_case("tcp") {
            return Ok(Self::Tcp);
        }

        if network.eq_ignore_ascii_case("udp") {
            return Ok(Self::Udp);
        }

        if network.eq_ignore_ascii_case("ssl") {
            return Ok(Self::Ssl);
        }

        Err(Error::UnsupportedNetwork)
    }

    /// Protocol tag of the connect command
    pub fn tag(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Ssl => "SSL",
        }
    }
}

/// Parameters of a connect command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SocketParameters<'a> {
    pub protocol: Protocol,

    /// Remote host name or IP address
    pub host: &'a str,

    /// Remote port (UDP: send port)
    pub remote_port: u16,

    /// UDP listen port. Defaults to the remote port.
    pub local_port: Option<u16>,

    /// TCP/SSL keepalive in seconds, ignored for UDP
    pub keepalive: u16,
}

impl<'a> SocketParameters<'a> {
    pub fn tcp(host: &'a str, port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            host,
            remote_port: port,
            local_port: None,
            keepalive: DEFAULT_KEEPALIVE,
        }
    }

    pub fn udp(host: &'a str, send_port: u16, listen_port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            host,
            remote_port: send_port,
            local_port: Some(listen_port),
            keepalive: DEFAULT_KEEPALIVE,
        }
    }

    pub fn ssl(host: &'a str, port: u16) -> Self {
        Self {
            protocol: Protocol::Ssl,
            ..Self::tcp(host, port)
        }
    }

    /// Parses `host:port` for the given network name
    pub fn from_network(network: &str, address: &'a str) -> Result<Self, Error> {
        let protocol = Protocol::from_network(network)?;
        let (host, port) = address.rsplit_once(':').ok_or(Error::InvalidAddress)?;
        let port = port.parse::<u16>().map_err(|_| Error::InvalidAddress)?;

        Ok(match protocol {
            Protocol::Tcp => Self::tcp(host, port),
            Protocol::Udp => Self::udp(host, port, port),
            Protocol::Ssl => Self::ssl(host, port),
        })
    }

    /// Structural validation before the parameters are turned into a command
    pub fn validate(&self) -> Result<(), Error> {
        validate_host(self.host)?;

        if self.remote_port == 0 || self.local_port == Some(0) {
            return Err(Error::InvalidAddress);
        }

        Ok(())
    }
}

/// Host names must be non-empty, limited in length and usable inside a quoted argument
pub(crate) fn validate_host(host: &str) -> Result<(), Error> {
    if host.is_empty() || host.len() > MAX_HOST_LENGTH {
        return Err(Error::InvalidAddress);
    }

    let invalid = |byte: u8| byte == b'"' || byte == b'\\' || byte == b',' || byte.is_ascii_whitespace() || byte.is_ascii_control();
    if host.bytes().any(invalid) {
        return Err(Error::InvalidAddress);
    }

    Ok(())
}

/// Handle of the open connection
///
/// Must be closed explicitly by calling [Connection::close].
#[must_use = "connection stays open until close() is called"]
pub struct Connection<
    'd,
    T: Transport,
    TM: Timer<TIMER_HZ>,
    R: RawMutex,
    const TIMER_HZ: u32,
    const TX_SIZE: usize,
    const RX_SIZE: usize,
> {
    pub(crate) device: &'d Device<T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>,
    pub(crate) protocol: Protocol,
}

impl<'d, T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    Connection<'d, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Closes the connection. The device returns to idle state even if the close command fails.
    pub fn close(self) -> Result<(), Error> {
        self.device.lock(|session| session.close())
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, R: RawMutex, const TIMER_HZ: u32, const TX_SIZE: usize, const RX_SIZE: usize>
    Device<T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>
{
    /// Connects to `host:port` on the named network (`tcp`, `udp` or `ssl`).
    ///
    /// For UDP the remote port is used as listen port as well. TCP/SSL use the configured keepalive.
    pub fn dial(&self, network: &str, address: &str) -> Result<Connection<'_, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>, Error> {
        let mut parameters = SocketParameters::from_network(network, address)?;
        parameters.keepalive = self.config().keepalive;

        self.connect(&parameters)
    }

    /// Establishes a TCP connection
    pub fn connect_tcp(&self, host: &str, port: u16) -> Result<Connection<'_, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>, Error> {
        self.connect(&SocketParameters::tcp(host, port))
    }

    /// Establishes a UDP transmission
    pub fn connect_udp(
        &self,
        host: &str,
        send_port: u16,
        listen_port: u16,
    ) -> Result<Connection<'_, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>, Error> {
        self.connect(&SocketParameters::udp(host, send_port, listen_port))
    }

    /// Establishes a SSL connection
    pub fn connect_ssl(&self, host: &str, port: u16) -> Result<Connection<'_, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>, Error> {
        self.connect(&SocketParameters::ssl(host, port))
    }

    /// Establishes a connection with the given parameters
    pub fn connect(
        &self,
        parameters: &SocketParameters<'_>,
    ) -> Result<Connection<'_, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>, Error> {
        self.lock(|session| session.connect(parameters))?;

        Ok(Connection {
            device: self,
            protocol: parameters.protocol,
        })
    }

    /// Closes the connection without a [Connection] handle, e.g. after a connect timeout left the
    /// co-processor in an unknown state. The close command is sent in any state.
    pub fn close(&self) -> Result<(), Error> {
        self.lock(|session| session.close())
    }

    /// Dials, runs the given closure with the connection and closes the connection afterwards,
    /// also if the closure failed. Errors of the closure take precedence over close errors.
    pub fn with_connection<U>(
        &self,
        network: &str,
        address: &str,
        f: impl FnOnce(&mut Connection<'_, T, TM, R, TIMER_HZ, TX_SIZE, RX_SIZE>) -> Result<U, Error>,
    ) -> Result<U, Error> {
        let mut connection = self.dial(network, address)?;
        let result = f(&mut connection);
        let closed = connection.close();

        let value = result?;
        closed?;
        Ok(value)
    }
}

impl<T: Transport, TM: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> Session<T, TM, TIMER_HZ, RX_SIZE> {
    fn connect(&mut self, parameters: &SocketParameters<'_>) -> Result<(), Error> {
        if self.state != ConnectionState::Idle {
            return Err(Error::TooManyConnections);
        }

        parameters.validate()?;

        let deadline = match parameters.protocol {
            Protocol::Tcp => self.config.tcp_connect_timeout,
            Protocol::Udp => self.config.udp_connect_timeout,
            Protocol::Ssl => self.config.ssl_connect_timeout,
        };

        self.transition(ConnectionState::Connecting);
        let command = ConnectCommand::new(parameters, &self.config);

        let result = self.round_trip(&command, deadline, Completion::Final).and_then(|response| {
            match response.reply().terminator() {
                Some(Terminator::Ok | Terminator::AlreadyConnected) => Ok(()),
                _ => response.expect_ok(),
            }
        });

        if let Err(error) = result {
            warn!("Connecting to {}:{} failed: {:?}", parameters.host, parameters.remote_port, error);
            self.transition(ConnectionState::Idle);
            return Err(error);
        }

        self.peer_closed = false;
        self.raw_session = false;
        self.transition(ConnectionState::Connected);
        Ok(())
    }

    /// Close command is sent in any state, the session always ends in idle state
    pub(crate) fn close(&mut self) -> Result<(), Error> {
        let escaped = match self.raw_session {
            true => self.end_send(),
            false => Ok(()),
        };

        self.transition(ConnectionState::Closing);
        let pause = self.config.pause;
        let result = self
            .round_trip(&CloseCommand, pause, Completion::Final)
            .and_then(|response| response.expect_ok());

        self.transition(ConnectionState::Idle);
        self.peer_closed = false;
        self.raw_session = false;
        self.frames.reset();
        self.pending.clear();
        self.take_receive_overflow();

        if let Err(error) = &result {
            warn!("Close command failed: {:?}", error);
        }

        escaped.and(result)
    }
}
