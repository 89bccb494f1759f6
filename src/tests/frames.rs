use crate::error::Error;
use crate::frames::FrameDecoder;
use heapless::Vec;

fn decode<const REPLY_SIZE: usize, const DATA_SIZE: usize>(
    decoder: &mut FrameDecoder,
    input: &[u8],
    reply: &mut Vec<u8, REPLY_SIZE>,
    data: &mut Vec<u8, DATA_SIZE>,
) -> Result<(), Error> {
    for byte in input {
        decoder.push(*byte, reply, data)?;
    }

    Ok(())
}

#[test]
fn test_reply_passed_through() {
    let mut decoder = FrameDecoder::new();
    let mut reply: Vec<u8, 64> = Vec::new();
    let mut data: Vec<u8, 64> = Vec::new();

    decode(&mut decoder, b"+CIPMUX:1\r\n\r\nOK\r\n", &mut reply, &mut data).unwrap();

    assert_eq!(b"+CIPMUX:1\r\n\r\nOK\r\n", reply.as_slice());
    assert!(data.is_empty());
}

#[test]
fn test_frame_payload_separated() {
    let mut decoder = FrameDecoder::new();
    let mut reply: Vec<u8, 64> = Vec::new();
    let mut data: Vec<u8, 64> = Vec::new();

    decode(&mut decoder, b"\r\nSEND OK\r\n\r\n+IPD,5:hallo\r\nOK\r\n", &mut reply, &mut data).unwrap();

    assert_eq!(b"\r\nSEND OK\r\n\r\n\r\nOK\r\n", reply.as_slice());
    assert_eq!(b"hallo", data.as_slice());
}

#[test]
fn test_frame_payload_containing_markers() {
    let mut decoder = FrameDecoder::new();
    let mut reply: Vec<u8, 64> = Vec::new();
    let mut data: Vec<u8, 64> = Vec::new();

    decode(&mut decoder, b"+IPD,8:\r\nOK\r\n> ", &mut reply, &mut data).unwrap();

    assert!(reply.is_empty());
    assert_eq!(b"\r\nOK\r\n> ", data.as_slice());
}

#[test]
fn test_frame_split_across_pushes() {
    let mut decoder = FrameDecoder::new();
    let mut reply: Vec<u8, 64> = Vec::new();
    let mut data: Vec<u8, 64> = Vec::new();

    decode(&mut decoder, b"+IP", &mut reply, &mut data).unwrap();
    decode(&mut decoder, b"D,1", &mut reply, &mut data).unwrap();
    decode(&mut decoder, b"0:0123", &mut reply, &mut data).unwrap();
    decode(&mut decoder, b"456789OK", &mut reply, &mut data).unwrap();

    assert_eq!(b"0123456789", data.as_slice());
    assert_eq!(b"OK", reply.as_slice());
}

#[test]
fn test_multiple_connections_frame() {
    let mut decoder = FrameDecoder::new();
    let mut reply: Vec<u8, 64> = Vec::new();
    let mut data: Vec<u8, 64> = Vec::new();

    decode(&mut decoder, b"+IPD,0,3:abc", &mut reply, &mut data).unwrap();

    assert_eq!(b"abc", data.as_slice());
    assert!(reply.is_empty());
}

#[test]
fn test_partial_prefix_flushed_to_reply() {
    let mut decoder = FrameDecoder::new();
    let mut reply: Vec<u8, 64> = Vec::new();
    let mut data: Vec<u8, 64> = Vec::new();

    decode(&mut decoder, b"+IPX+CIPMUX:0\r\n", &mut reply, &mut data).unwrap();

    assert_eq!(b"+IPX+CIPMUX:0\r\n", reply.as_slice());
    assert!(data.is_empty());
}

#[test]
fn test_reset_drops_partial_frame() {
    let mut decoder = FrameDecoder::new();
    let mut reply: Vec<u8, 64> = Vec::new();
    let mut data: Vec<u8, 64> = Vec::new();

    decode(&mut decoder, b"+IPD,10:abc", &mut reply, &mut data).unwrap();
    decoder.reset();
    decode(&mut decoder, b"\r\nOK\r\n", &mut reply, &mut data).unwrap();

    assert_eq!(b"abc", data.as_slice());
    assert_eq!(b"\r\nOK\r\n", reply.as_slice());
}

#[test]
fn test_data_overflow() {
    let mut decoder = FrameDecoder::new();
    let mut reply: Vec<u8, 64> = Vec::new();
    let mut data: Vec<u8, 4> = Vec::new();

    decode(&mut decoder, b"+IPD,5:hallo\r\nOK\r\n", &mut reply, &mut data).unwrap();

    assert_eq!(b"hall", data.as_slice());
    assert_eq!(b"\r\nOK\r\n", reply.as_slice());
    assert!(decoder.take_overflow());
    assert!(!decoder.take_overflow());
}

#[test]
fn test_reply_overflow() {
    let mut decoder = FrameDecoder::new();
    let mut reply: Vec<u8, 4> = Vec::new();
    let mut data: Vec<u8, 64> = Vec::new();

    let result = decode(&mut decoder, b"\r\nERROR\r\n", &mut reply, &mut data);
    assert_eq!(Error::ResponseOverflow, result.unwrap_err());
}
