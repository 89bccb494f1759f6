//! Mocks for doc examples
use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::{Deque, Vec};

/// Simulated co-processor, answering commands with canned replies
#[derive(Default)]
pub struct ExampleTransport {
    /// Bytes to be read by the driver
    rx: Deque<u8, 512>,

    /// Command line written so far
    line: Vec<u8, 256>,

    /// Remaining payload bytes announced by the prepare-send command
    payload: usize,

    /// Mux mode register
    mux: u8,

    /// Transfer mode register
    transfer_mode: u8,
}

impl ExampleTransport {
    fn reply(&mut self, reply: &[u8]) {
        for byte in reply {
            // Capacity is sufficient for all canned replies
            let _ = self.rx.push_back(*byte);
        }
    }

    fn handle_line(&mut self) {
        let line = self.line.clone();
        let command = line.strip_suffix(b"\r\n").unwrap_or(&line[..]);

        match command {
            b"AT" | b"ATE0" | b"ATE1" => self.reply(b"\r\nOK\r\n"),
            b"AT+CIPCLOSE" => self.reply(b"CLOSED\r\n\r\nOK\r\n"),
            b"AT+CIPMUX?" => self.reply_register(b"+CIPMUX:", self.mux),
            b"AT+CIPMODE?" => self.reply_register(b"+CIPMODE:", self.transfer_mode),
            _ if command.starts_with(b"AT+CIPDOMAIN=") => self.reply(b"+CIPDOMAIN:93.184.216.34\r\n\r\nOK\r\n"),
            _ if command.starts_with(b"AT+CIPSTART=") => self.reply(b"CONNECT\r\n\r\nOK\r\n"),
            _ if command.starts_with(b"AT+CIPSEND=") => {
                self.payload = command[11..]
                    .iter()
                    .fold(0, |length, digit| length * 10 + (digit - b'0') as usize);
                self.reply(b"\r\nOK\r\n> ");
            }
            _ if command.starts_with(b"AT+CIPMUX=") => {
                self.mux = command[10] - b'0';
                self.reply(b"\r\nOK\r\n");
            }
            _ if command.starts_with(b"AT+CIPMODE=") => {
                self.transfer_mode = command[11] - b'0';
                self.reply(b"\r\nOK\r\n");
            }
            _ => self.reply(b"\r\nERROR\r\n"),
        }
    }

    fn reply_register(&mut self, tag: &[u8], value: u8) {
        self.reply(tag);
        self.reply(&[b'0' + value]);
        self.reply(b"\r\n\r\nOK\r\n");
    }
}

impl ErrorType for ExampleTransport {
    type Error = ErrorKind;
}

impl Write for ExampleTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for byte in buf {
            if self.payload > 0 {
                self.payload -= 1;

                if self.payload == 0 {
                    self.reply(b"\r\nSEND OK\r\n");
                    self.reply(b"\r\n+IPD,16:nice to see you!");
                }
                continue;
            }

            self.line.push(*byte).map_err(|_| ErrorKind::OutOfMemory)?;

            if self.line.ends_with(b"\r\n") {
                self.handle_line();
                self.line.clear();
            }

            // Escape sequence has no line break
            if self.line.as_slice() == b"+++" {
                self.line.clear();
                self.reply(b"\r\nOK\r\n");
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Read for ExampleTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut length = 0;

        while length < buf.len() {
            match self.rx.pop_front() {
                Some(byte) => buf[length] = byte,
                None => break,
            }

            length += 1;
        }

        Ok(length)
    }
}

impl ReadReady for ExampleTransport {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

/// Timer mock, expiring after a fixed number of polls
#[derive(Default)]
pub struct ExampleTimer {
    polls: u32,
}

impl Timer<1_000_000> for ExampleTimer {
    type Error = u32;

    fn now(&mut self) -> TimerInstantU32<1000000> {
        TimerInstantU32::from_ticks(self.polls)
    }

    fn start(&mut self, _duration: TimerDurationU32<1000000>) -> Result<(), Self::Error> {
        self.polls = 0;
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        self.polls += 1;

        if self.polls > 1_000 {
            return nb::Result::Ok(());
        }

        nb::Result::Err(nb::Error::WouldBlock)
    }
}
