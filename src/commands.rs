use crate::config::Config;
use crate::connection::{Protocol, SocketParameters};
use crate::error::Error;
use crate::modes::{MuxMode, TransferMode};
use heapless::Vec;
use numtoa::NumToA;

/// Max. length of an encoded command line
pub(crate) const COMMAND_SIZE: usize = 128;

/// Exits the unvarnished transfer mode. Must not be followed by CRLF.
pub(crate) const ESCAPE_SEQUENCE: &[u8; 3] = b"+++";

/// Shape of an AT command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandForm {
    /// Requests the current value of a setting, e.g. `AT+CIPMUX?`
    Query,
    /// Assigns a value to a setting, e.g. `AT+CIPMUX=1`
    Set,
    /// Action without arguments, e.g. `AT+CIPCLOSE`
    Execute,
}

/// Builds a single command line
pub struct Encoder<const LEN: usize> {
    buffer: Vec<u8, LEN>,

    /// Number of values written so far, used for comma separation
    values: usize,
}

impl<const LEN: usize> Encoder<LEN> {
    /// Starts a new command line, e.g. `AT+CIPSTART=`
    pub fn new(name: &str, form: CommandForm) -> Result<Self, Error> {
        let mut encoder = Self {
            buffer: Vec::new(),
            values: 0,
        };

        encoder.push(b"AT")?;
        encoder.push(name.as_bytes())?;

        match form {
            CommandForm::Query => encoder.push(b"?")?,
            CommandForm::Set => encoder.push(b"=")?,
            CommandForm::Execute => {}
        }

        Ok(encoder)
    }

    /// Appends a quoted string value
    pub fn text(&mut self, value: &str) -> Result<&mut Self, Error> {
        if value.bytes().any(|byte| byte == b'"' || byte == b'\\' || byte.is_ascii_control()) {
            return Err(Error::InvalidAddress);
        }

        self.separate()?;
        self.push(b"\"")?;
        self.push(value.as_bytes())?;
        self.push(b"\"")?;
        Ok(self)
    }

    /// Appends a decimal integer value
    pub fn int(&mut self, value: u32) -> Result<&mut Self, Error> {
        let mut digits = [0x0; 20];

        self.separate()?;
        self.push(value.numtoa(10, &mut digits))?;
        Ok(self)
    }

    /// Terminates the command line by CRLF
    pub fn finish(mut self) -> Result<Vec<u8, LEN>, Error> {
        self.push(b"\r\n")?;
        Ok(self.buffer)
    }

    fn separate(&mut self) -> Result<(), Error> {
        if self.values > 0 {
            self.push(b",")?;
        }

        self.values += 1;
        Ok(())
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.buffer.extend_from_slice(bytes).map_err(|_| Error::CommandOverflow)
    }
}

/// Command which may be encoded to a single line
pub trait AtCommand {
    /// Name without the `AT` prefix, e.g. `+CIPSEND`
    fn name(&self) -> &str;

    fn form(&self) -> CommandForm;

    /// Writes the values of set commands
    fn values<const LEN: usize>(&self, _encoder: &mut Encoder<LEN>) -> Result<(), Error> {
        Ok(())
    }

    /// Encodes the full command line including CRLF
    fn encode<const LEN: usize>(&self) -> Result<Vec<u8, LEN>, Error> {
        let mut encoder = Encoder::new(self.name(), self.form())?;
        self.values(&mut encoder)?;
        encoder.finish()
    }
}

/// Resolves a domain name
pub struct DnsLookupCommand<'a> {
    domain: &'a str,
}

impl<'a> DnsLookupCommand<'a> {
    pub fn new(domain: &'a str) -> Self {
        Self { domain }
    }
}

impl AtCommand for DnsLookupCommand<'_> {
    fn name(&self) -> &str {
        "+CIPDOMAIN"
    }

    fn form(&self) -> CommandForm {
        CommandForm::Set
    }

    fn values<const LEN: usize>(&self, encoder: &mut Encoder<LEN>) -> Result<(), Error> {
        encoder.text(self.domain)?;
        Ok(())
    }
}

/// Establishes a TCP connection, UDP transmission or SSL connection
pub struct ConnectCommand<'a> {
    parameters: &'a SocketParameters<'a>,

    /// UDP mode selector
    udp_mode: u8,
}

impl<'a> ConnectCommand<'a> {
    pub fn new(parameters: &'a SocketParameters<'a>, config: &Config) -> Self {
        Self {
            parameters,
            udp_mode: config.udp_mode,
        }
    }
}

impl AtCommand for ConnectCommand<'_> {
    fn name(&self) -> &str {
        "+CIPSTART"
    }

    fn form(&self) -> CommandForm {
        CommandForm::Set
    }

    fn values<const LEN: usize>(&self, encoder: &mut Encoder<LEN>) -> Result<(), Error> {
        let parameters = self.parameters;
        encoder
            .text(parameters.protocol.tag())?
            .text(parameters.host)?
            .int(parameters.remote_port as u32)?;

        match parameters.protocol {
            Protocol::Tcp | Protocol::Ssl => {
                encoder.int(parameters.keepalive as u32)?;
            }
            Protocol::Udp => {
                encoder
                    .int(parameters.local_port.unwrap_or(parameters.remote_port) as u32)?
                    .int(self.udp_mode as u32)?;
            }
        }

        Ok(())
    }
}

/// Closes the single connection
pub struct CloseCommand;

impl AtCommand for CloseCommand {
    fn name(&self) -> &str {
        "+CIPCLOSE"
    }

    fn form(&self) -> CommandForm {
        CommandForm::Execute
    }
}

/// Queries or sets the multiple connections mode
pub struct MuxCommand {
    /// None => Query
    mode: Option<MuxMode>,
}

impl MuxCommand {
    pub fn query() -> Self {
        Self { mode: None }
    }

    pub fn set(mode: MuxMode) -> Self {
        Self { mode: Some(mode) }
    }
}

impl AtCommand for MuxCommand {
    fn name(&self) -> &str {
        "+CIPMUX"
    }

    fn form(&self) -> CommandForm {
        match self.mode {
            Some(_) => CommandForm::Set,
            None => CommandForm::Query,
        }
    }

    fn values<const LEN: usize>(&self, encoder: &mut Encoder<LEN>) -> Result<(), Error> {
        if let Some(mode) = self.mode {
            encoder.int(mode.value())?;
        }

        Ok(())
    }
}

/// Queries or sets the transfer mode
pub struct TransferModeCommand {
    /// None => Query
    mode: Option<TransferMode>,
}

impl TransferModeCommand {
    pub fn query() -> Self {
        Self { mode: None }
    }

    pub fn set(mode: TransferMode) -> Self {
        Self { mode: Some(mode) }
    }
}

impl AtCommand for TransferModeCommand {
    fn name(&self) -> &str {
        "+CIPMODE"
    }

    fn form(&self) -> CommandForm {
        match self.mode {
            Some(_) => CommandForm::Set,
            None => CommandForm::Query,
        }
    }

    fn values<const LEN: usize>(&self, encoder: &mut Encoder<LEN>) -> Result<(), Error> {
        if let Some(mode) = self.mode {
            encoder.int(mode.value())?;
        }

        Ok(())
    }
}

/// Announces the length of the following data transmission
pub struct PrepareSendCommand {
    length: usize,
}

impl PrepareSendCommand {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl AtCommand for PrepareSendCommand {
    fn name(&self) -> &str {
        "+CIPSEND"
    }

    fn form(&self) -> CommandForm {
        CommandForm::Set
    }

    fn values<const LEN: usize>(&self, encoder: &mut Encoder<LEN>) -> Result<(), Error> {
        let length = u32::try_from(self.length).map_err(|_| Error::CommandOverflow)?;
        encoder.int(length)?;
        Ok(())
    }
}

/// Plain `AT`, answered by OK if the modem is responsive
pub struct PingCommand;

impl AtCommand for PingCommand {
    fn name(&self) -> &str {
        ""
    }

    fn form(&self) -> CommandForm {
        CommandForm::Execute
    }
}

/// Enables (`ATE1`) or disables (`ATE0`) the command echo
pub struct EchoCommand {
    enabled: bool,
}

impl EchoCommand {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl AtCommand for EchoCommand {
    fn name(&self) -> &str {
        match self.enabled {
            true => "E1",
            false => "E0",
        }
    }

    fn form(&self) -> CommandForm {
        CommandForm::Execute
    }
}
