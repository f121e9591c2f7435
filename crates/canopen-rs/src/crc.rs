//! CRC-16 (CCITT variant, polynomial `0x1021`, initial value `0x0000`)
//! as prescribed for SDO block transfer integrity checks.

const POLYNOMIAL: u16 = 0x1021;

/// Streaming CRC-16 calculator.
///
/// Block transfers feed segment payloads in as they arrive, then compare
/// [`finish`] against the checksum carried in the block-end exchange.
///
/// [`finish`]: Crc16::finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Crc16 {
    state: u16,
}

impl Crc16 {
    pub fn new() -> Self {
        Crc16 { state: 0 }
    }

    /// Folds `data` into the running checksum.
    pub fn feed(&mut self, data: &[u8]) {
        let mut crc = self.state;
        for &byte in data {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                if crc & 0x8000 != 0 {
                    crc = (crc << 1) ^ POLYNOMIAL;
                } else {
                    crc <<= 1;
                }
            }
        }
        self.state = crc;
    }

    /// The checksum over all bytes fed so far.
    pub fn finish(&self) -> u16 {
        self.state
    }
}

/// One-shot CRC-16 over a complete buffer.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.feed(data);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        // Standard check input for CRC-16/XMODEM.
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn empty_input() {
        assert_eq!(crc16(&[]), 0);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let mut crc = Crc16::new();
        crc.feed(b"1234");
        crc.feed(b"56789");
        assert_eq!(crc.finish(), crc16(b"123456789"));
    }
}
