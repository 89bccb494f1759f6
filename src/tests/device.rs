use crate::connection::ConnectionState;
use crate::device::Device;
use crate::error::{Diagnostic, Error};
use crate::tests::mock::{MockTimer, MockTransport};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_io::ErrorKind;

type DeviceType = Device<MockTransport, MockTimer, CriticalSectionRawMutex, 1_000_000, 16, 128>;

fn assert_sync<T: Sync>(_value: &T) {}

#[test]
fn test_ping() {
    let transport = MockTransport::new();
    transport.expect_ok(b"AT\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    device.ping().unwrap();

    transport.assert_all_exchanged();
}

#[test]
fn test_ping_with_echo() {
    let transport = MockTransport::new();
    transport.expect(b"AT\r\n", b"AT\r\n\r\nOK\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    device.ping().unwrap();
}

#[test]
fn test_ping_unanswered() {
    let transport = MockTransport::new();
    transport.expect_silence(b"AT\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::single_deadline(300));
    assert_eq!(Error::Timeout(Diagnostic::empty()), device.ping().unwrap_err());
}

#[test]
fn test_set_echo() {
    let transport = MockTransport::new();
    transport.expect_ok(b"ATE0\r\n");
    transport.expect_ok(b"ATE1\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    device.set_echo(false).unwrap();
    device.set_echo(true).unwrap();

    transport.assert_all_exchanged();
}

#[test]
fn test_set_echo_error() {
    let transport = MockTransport::new();
    transport.expect_error(b"ATE0\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    assert_eq!(
        Error::CommandFailed(Diagnostic::capture(b"\r\nERROR\r\n")),
        device.set_echo(false).unwrap_err()
    );
}

#[test]
fn test_transport_error() {
    let transport = MockTransport::new();
    transport.fail_writes();

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    assert_eq!(Error::Transport(ErrorKind::BrokenPipe), device.ping().unwrap_err());
}

#[test]
fn test_stale_input_not_taken_as_reply() {
    let transport = MockTransport::new();
    transport.add_incoming(b"\r\nERROR\r\n");
    transport.expect_ok(b"AT\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    device.ping().unwrap();
    assert_eq!(0, transport.unread());
}

#[test]
fn test_deadline_checked_while_data_arrives() {
    let transport = MockTransport::new();
    transport.expect(b"AT\r\n", &[b'x'; 100]);

    let device = DeviceType::new(transport.clone(), MockTimer::expired());
    assert_eq!(Error::Timeout(Diagnostic::capture(&[b'x'; 32])), device.ping().unwrap_err());
    assert_eq!(68, transport.unread());
}

#[test]
fn test_receive_overflow_during_command() {
    let transport = MockTransport::new();
    transport.expect(b"AT+CIPSTART=\"TCP\",\"10.0.0.1\",21,120\r\n", b"CONNECT\r\n\r\nOK\r\n");
    transport.expect_ok(b"AT\r\n");

    let device: Device<_, _, CriticalSectionRawMutex, 1_000_000, 16, 16> =
        Device::new(transport.clone(), MockTimer::running());
    let mut connection = device.dial("tcp", "10.0.0.1:21").unwrap();
    transport.add_incoming(b"+IPD,20:01234567890123456789");

    device.ping().unwrap();
    assert_eq!(0, transport.unread());

    let mut buffer = [0x0; 32];
    assert_eq!(Error::ReceiveOverflow, connection.receive(&mut buffer).unwrap_err());
    assert_eq!(16, connection.receive(&mut buffer).unwrap());
    assert_eq!(b"0123456789012345", &buffer[..16]);
    assert_eq!(0, connection.receive(&mut buffer).unwrap());
}

#[test]
fn test_receive_overflow_in_reply() {
    let transport = MockTransport::new();
    transport.expect(b"AT\r\n", b"+IPD,20:01234567890123456789\r\nOK\r\n");

    let device: Device<_, _, CriticalSectionRawMutex, 1_000_000, 16, 16> =
        Device::new(transport.clone(), MockTimer::running());
    device.ping().unwrap();

    let mut buffer = [0x0; 32];
    let result = device.lock(|session| session.receive(&mut buffer));
    assert_eq!(Error::ReceiveOverflow, result.unwrap_err());
}

#[test]
fn test_initial_state() {
    let device = DeviceType::new(MockTransport::new(), MockTimer::new());

    assert_eq!(ConnectionState::Idle, device.state());
    assert_eq!(300, device.config().pause.as_millis());
}

#[test]
fn test_release() {
    let transport = MockTransport::new();
    transport.expect_ok(b"AT\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    device.ping().unwrap();

    let (released, _timer) = device.release();
    assert_eq!(vec!["AT\r\n".to_string()], released.written_as_strings());
}

#[test]
fn test_device_shareable_between_threads() {
    let device = DeviceType::new(MockTransport::new(), MockTimer::new());
    assert_sync(&device);
}
