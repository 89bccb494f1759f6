use crate::device::Device;
use crate::error::{Diagnostic, Error};
use crate::modes::{MuxMode, TransferMode};
use crate::tests::mock::{MockTimer, MockTransport};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

type DeviceType = Device<MockTransport, MockTimer, CriticalSectionRawMutex, 1_000_000, 16, 128>;

#[test]
fn test_mux_mode_round_trip() {
    let transport = MockTransport::new();
    transport.expect_ok(b"AT+CIPMUX=1\r\n");
    transport.expect(b"AT+CIPMUX?\r\n", b"+CIPMUX:1\r\n\r\nOK\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::deadlines(&[300, 300]));
    device.set_mux_mode(MuxMode::Multiple).unwrap();
    assert_eq!(MuxMode::Multiple, device.mux_mode());

    assert_eq!(MuxMode::Multiple, device.get_mux_mode().unwrap());
    transport.assert_all_exchanged();
}

#[test]
fn test_mux_mode_with_echo() {
    let transport = MockTransport::new();
    transport.expect(b"AT+CIPMUX?\r\n", b"AT+CIPMUX?\r\n+CIPMUX:0\r\n\r\nOK\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    assert_eq!(MuxMode::Single, device.get_mux_mode().unwrap());
    assert_eq!(MuxMode::Single, device.mux_mode());
}

#[test]
fn test_mux_mode_rejected() {
    let transport = MockTransport::new();
    transport.expect(b"AT+CIPMUX=1\r\n", b"link is builded\r\n\r\nERROR\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    assert_eq!(
        Error::CommandFailed(Diagnostic::capture(b"link is builded\r\n\r\nERROR\r\n")),
        device.set_mux_mode(MuxMode::Multiple).unwrap_err()
    );
}

#[test]
fn test_mux_mode_unknown_value() {
    let transport = MockTransport::new();
    transport.expect(b"AT+CIPMUX?\r\n", b"+CIPMUX:7\r\n\r\nOK\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    assert!(matches!(device.get_mux_mode(), Err(Error::MalformedReply(_))));
}

#[test]
fn test_mux_mode_value_missing() {
    let transport = MockTransport::new();
    transport.expect_ok(b"AT+CIPMUX?\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    assert_eq!(
        Error::MalformedReply(Diagnostic::capture(b"\r\nOK\r\n")),
        device.get_mux_mode().unwrap_err()
    );
}

#[test]
fn test_transfer_mode_round_trip() {
    let transport = MockTransport::new();
    transport.expect_ok(b"AT+CIPMODE=1\r\n");
    transport.expect(b"AT+CIPMODE?\r\n", b"+CIPMODE:1\r\n\r\nOK\r\n");
    transport.expect_ok(b"AT+CIPMODE=0\r\n");
    transport.expect(b"AT+CIPMODE?\r\n", b"+CIPMODE:0\r\n\r\nOK\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());

    device.set_transfer_mode(TransferMode::Unvarnished).unwrap();
    assert_eq!(TransferMode::Unvarnished, device.get_transfer_mode().unwrap());

    device.set_transfer_mode(TransferMode::Normal).unwrap();
    assert_eq!(TransferMode::Normal, device.get_transfer_mode().unwrap());

    transport.assert_all_exchanged();
}

#[test]
fn test_transfer_mode_timeout() {
    let transport = MockTransport::new();
    transport.expect_silence(b"AT+CIPMODE=1\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::single_deadline(300));
    assert_eq!(
        Error::Timeout(Diagnostic::empty()),
        device.set_transfer_mode(TransferMode::Unvarnished).unwrap_err()
    );
}

#[test]
fn test_failed_set_keeps_mode() {
    let transport = MockTransport::new();
    transport.expect_error(b"AT+CIPMODE=1\r\n");
    transport.expect(b"AT+CIPSTART=\"TCP\",\"10.0.0.1\",21,120\r\n", b"\r\nOK\r\n");
    transport.expect(b"AT+CIPSEND=2\r\n", b"\r\nOK\r\n> ");
    transport.expect(b"hi", b"\r\nSEND OK\r\n");

    let device = DeviceType::new(transport.clone(), MockTimer::running());
    device.set_transfer_mode(TransferMode::Unvarnished).unwrap_err();
    assert_eq!(TransferMode::Normal, device.transfer_mode());

    // Normal transfer mode still expects the acknowledgment
    let mut connection = device.dial("tcp", "10.0.0.1:21").unwrap();
    connection.send(b"hi").unwrap();
    transport.assert_all_exchanged();
}
