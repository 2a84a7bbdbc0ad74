/*++

Licensed under the Apache-2.0 license.

File Name:

    codec.rs

Abstract:

    File contains the wire encoding of register accesses.

--*/

//! The accelerator's bus bridge takes the register address most-significant
//! byte first, while register data keeps the little-endian order of the
//! AXI-Lite register file behind it. Both orders must be kept exactly; a
//! mixed-up order still produces well-formed transactions, just against the
//! wrong register or with the wrong value.

use crate::{RegAddr, RegData};

/// Length of a register write frame: 2 address bytes followed by 4 data bytes.
pub const WRITE_FRAME_LEN: usize = 6;

/// Length of a register read request: the 2 address bytes alone.
pub const READ_REQUEST_LEN: usize = 2;

/// Number of bytes returned for a register read.
pub const READ_RESPONSE_LEN: usize = 4;

/// Encode a register write as `addr` (big-endian) followed by `val`
/// (little-endian).
pub fn encode_write(addr: RegAddr, val: RegData) -> [u8; WRITE_FRAME_LEN] {
    let mut frame = [0u8; WRITE_FRAME_LEN];
    frame[..2].copy_from_slice(&addr.to_be_bytes());
    frame[2..].copy_from_slice(&val.to_le_bytes());
    frame
}

/// Encode the address phase of a register read.
pub fn encode_read_request(addr: RegAddr) -> [u8; READ_REQUEST_LEN] {
    addr.to_be_bytes()
}

/// Decode the data phase of a register read.
pub fn decode_value(bytes: [u8; READ_RESPONSE_LEN]) -> RegData {
    RegData::from_le_bytes(bytes)
}

/// Split a write frame back into its address and value. Returns `None` if
/// `frame` is not exactly [`WRITE_FRAME_LEN`] bytes long.
pub fn decode_write(frame: &[u8]) -> Option<(RegAddr, RegData)> {
    let frame: &[u8; WRITE_FRAME_LEN] = frame.try_into().ok()?;
    let addr = RegAddr::from_be_bytes([frame[0], frame[1]]);
    let val = RegData::from_le_bytes([frame[2], frame[3], frame[4], frame[5]]);
    Some((addr, val))
}

/// Decode the address of a read request. Returns `None` if `request` is not
/// exactly [`READ_REQUEST_LEN`] bytes long.
pub fn decode_read_request(request: &[u8]) -> Option<RegAddr> {
    let request: [u8; READ_REQUEST_LEN] = request.try_into().ok()?;
    Some(RegAddr::from_be_bytes(request))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_write() {
        assert_eq!(
            encode_write(0x0110, 0x1122_3344),
            [0x01, 0x10, 0x44, 0x33, 0x22, 0x11]
        );
        assert_eq!(encode_write(0, 1), [0, 0, 1, 0, 0, 0]);
        assert_eq!(
            encode_write(0xffff, 0xffff_fffe),
            [0xff, 0xff, 0xfe, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn test_encode_write_distinguishes_address_and_value() {
        // Same bytes in different positions must not collide
        assert_ne!(encode_write(0x0001, 0), encode_write(0, 0x0001));
        assert_ne!(encode_write(0x0100, 0), encode_write(0x0001, 0));
        assert_ne!(encode_write(0, 0x0000_0100), encode_write(0, 0x0001_0000));
    }

    #[test]
    fn test_encode_read_request() {
        assert_eq!(encode_read_request(0x0004), [0x00, 0x04]);
        assert_eq!(encode_read_request(0x0090), [0x00, 0x90]);
        assert_eq!(encode_read_request(0x1234), [0x12, 0x34]);
    }

    #[test]
    fn test_decode_value() {
        assert_eq!(decode_value([0x03, 0x00, 0x00, 0x00]), 3);
        assert_eq!(decode_value([0x44, 0x33, 0x22, 0x11]), 0x1122_3344);
    }

    #[test]
    fn test_value_survives_write_frame() {
        for val in [0, 1, 0x8000_0000, 0xdead_beef, u32::MAX] {
            let frame = encode_write(0x0010, val);
            assert_eq!(decode_value(frame[2..6].try_into().unwrap()), val);
            assert_eq!(decode_write(&frame), Some((0x0010, val)));
        }
    }

    #[test]
    fn test_decode_rejects_wrong_lengths() {
        assert_eq!(decode_write(&[0; 5]), None);
        assert_eq!(decode_write(&[0; 7]), None);
        assert_eq!(decode_read_request(&[0x00]), None);
        assert_eq!(decode_read_request(&[0x00, 0x04]), Some(4));
    }
}
