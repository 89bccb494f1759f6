//! # Deadlines and fixed command parameters
//!
//! Every command/response round-trip is bounded by its own deadline. The defaults match the
//! timing behaviour of the ESP-AT firmware:
//!
//! | Exchange                       | Default   |
//! |--------------------------------|-----------|
//! | DNS lookup                     | 1000 ms   |
//! | TCP/UDP connect                | 3000 ms   |
//! | SSL connect                    | 6000 ms   |
//! | Prepare send (`>` prompt)      | 2000 ms   |
//! | Send acknowledgment            | 1000 ms   |
//! | Acknowledgment-only exchanges  | 300 ms    |
//!
//! ## Example
//!
//! ````
//! use esp_at_socket::config::Config;
//!
//! let mut config = Config::default();
//! config.set_ssl_connect_timeout_ms(10_000);
//!
//! assert_eq!(10_000, config.ssl_connect_timeout.as_millis());
//! assert_eq!(300, config.pause.as_millis());
//! ````
use fugit::TimerDurationU32;

/// Timeout of a single command/response round-trip
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Deadline {
    millis: u32,
}

impl Deadline {
    pub const fn millis(millis: u32) -> Self {
        Self { millis }
    }

    /// Deadline in timer ticks of the given frequency
    pub fn duration<const TIMER_HZ: u32>(&self) -> TimerDurationU32<TIMER_HZ> {
        TimerDurationU32::millis(self.millis)
    }

    /// Milliseconds of this deadline
    pub fn as_millis(&self) -> u32 {
        self.millis
    }
}

/// Driver configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Deadline for DNS lookups
    pub dns_timeout: Deadline,

    /// Deadline for establishing TCP connections
    pub tcp_connect_timeout: Deadline,

    /// Deadline for establishing UDP transmissions
    pub udp_connect_timeout: Deadline,

    /// Deadline for SSL connections, longer due to the handshake
    pub ssl_connect_timeout: Deadline,

    /// Deadline for receiving the send-ready prompt
    pub prepare_send_timeout: Deadline,

    /// Deadline for the acknowledgment of transmitted data
    pub send_ack_timeout: Deadline,

    /// Generic pause for acknowledgment-only exchanges
    pub pause: Deadline,

    /// Max. time a blocking read waits for the first byte
    pub read_timeout: Deadline,

    /// TCP/SSL keepalive in seconds
    pub keepalive: u16,

    /// UDP mode: 0 = fixed remote, 1 = remote may change once, 2 = remote may change any time
    pub udp_mode: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dns_timeout: Deadline::millis(1_000),
            tcp_connect_timeout: Deadline::millis(3_000),
            udp_connect_timeout: Deadline::millis(3_000),
            ssl_connect_timeout: Deadline::millis(6_000),
            prepare_send_timeout: Deadline::millis(2_000),
            send_ack_timeout: Deadline::millis(1_000),
            pause: Deadline::millis(300),
            read_timeout: Deadline::millis(1_000),
            keepalive: 120,
            udp_mode: 2,
        }
    }
}

impl Config {
    /// Sets the DNS lookup timeout in ms
    pub fn set_dns_timeout_ms(&mut self, timeout: u32) {
        self.dns_timeout = Deadline::millis(timeout);
    }

    /// Sets the TCP connect timeout in ms
    pub fn set_tcp_connect_timeout_ms(&mut self, timeout: u32) {
        self.tcp_connect_timeout = Deadline::millis(timeout);
    }

    /// Sets the UDP connect timeout in ms
    pub fn set_udp_connect_timeout_ms(&mut self, timeout: u32) {
        self.udp_connect_timeout = Deadline::millis(timeout);
    }

    /// Sets the SSL connect timeout in ms
    pub fn set_ssl_connect_timeout_ms(&mut self, timeout: u32) {
        self.ssl_connect_timeout = Deadline::millis(timeout);
    }

    /// Sets the timeout for the send-ready prompt in ms
    pub fn set_prepare_send_timeout_ms(&mut self, timeout: u32) {
        self.prepare_send_timeout = Deadline::millis(timeout);
    }

    /// Sets the timeout for the send acknowledgment in ms
    pub fn set_send_ack_timeout_ms(&mut self, timeout: u32) {
        self.send_ack_timeout = Deadline::millis(timeout);
    }

    /// Sets the generic pause in ms
    pub fn set_pause_ms(&mut self, timeout: u32) {
        self.pause = Deadline::millis(timeout);
    }

    /// Sets the blocking read timeout in ms
    pub fn set_read_timeout_ms(&mut self, timeout: u32) {
        self.read_timeout = Deadline::millis(timeout);
    }
}
