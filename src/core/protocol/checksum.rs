//! Frame checksum
//!
//! CRC-16/Modbus, computed bit-at-a-time so no lookup table is needed.
//! Polynomial: 0x8005 (0xA001 reflected), Init: 0xFFFF, RefIn: true, RefOut: true, XorOut: 0x0000

/// Size of the checksum trailer in bytes
pub const CHECKSUM_LEN: usize = 2;

/// CRC-16/Modbus over `data`
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;

    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Append the little-endian checksum of `frame` to itself
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16_modbus(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Split a frame into body and trailing checksum.
///
/// Returns `None` when the frame is too short to carry one.
pub fn split_crc(frame: &[u8]) -> Option<(&[u8], u16)> {
    if frame.len() < CHECKSUM_LEN {
        return None;
    }
    let (body, trailer) = frame.split_at(frame.len() - CHECKSUM_LEN);
    Some((body, u16::from_le_bytes([trailer[0], trailer[1]])))
}

/// Check the trailing checksum of a complete frame
pub fn verify_frame(frame: &[u8]) -> bool {
    split_crc(frame).is_some_and(|(body, received)| crc16_modbus(body) == received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc16_modbus_check_value() {
        assert_eq!(crc16_modbus(b"123456789"), 0x4B37);
    }

    #[test]
    fn test_crc16_modbus_read_request() {
        // 01 03 00 00 00 01 -> CRC 84 0A on the wire
        assert_eq!(crc16_modbus(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
        assert_eq!(crc16_modbus(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]), 0x0BC4);
    }

    #[test]
    fn test_crc16_modbus_empty() {
        assert_eq!(crc16_modbus(&[]), 0xFFFF);
    }

    #[test]
    fn test_append_and_verify() {
        let mut frame = vec![0x11, 0x01, 0x00, 0x13, 0x00, 0x01];
        append_crc(&mut frame);
        assert_eq!(&frame[6..], &[0x0E, 0x9F]);
        assert!(verify_frame(&frame));

        frame[2] ^= 0x01;
        assert!(!verify_frame(&frame));
    }

    #[test]
    fn test_split_crc_short() {
        assert!(split_crc(&[0x01]).is_none());
        assert_eq!(split_crc(&[0x34, 0x12]), Some((&[][..], 0x1234)));
    }
}
