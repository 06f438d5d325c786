//! MT protocol CRC-8 (§4.A).
//!
//! MSB-first bitwise CRC with initial value `0xAA` and polynomial `0xA6`,
//! no reflection, no final XOR. A frame is valid iff `crc8` of the whole
//! byte span — including its own trailing CRC byte — is zero.

/// Initial register value.
pub const IV: u8 = 0xAA;
/// Polynomial.
pub const POLY: u8 = 0xA6;

/// Compute the MT CRC-8 over `bytes`.
pub fn crc8(bytes: &[u8]) -> u8 {
    let mut reg = IV;
    for &byte in bytes {
        for bit_pos in (0..8).rev() {
            let input_bit = (byte >> bit_pos) & 1;
            let old_msb = (reg >> 7) & 1;
            reg = reg.wrapping_shl(1);
            if (old_msb ^ input_bit) == 1 {
                reg ^= POLY;
            }
        }
    }
    reg
}

/// Returns `true` iff `crc8(bytes) == 0`, i.e. `bytes` ends with a valid
/// trailing CRC byte for the content that precedes it.
pub fn verify(bytes: &[u8]) -> bool {
    crc8(bytes) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_own_crc_verifies() {
        let data = b"hello mt protocol";
        let c = crc8(data);
        let mut whole = data.to_vec();
        whole.push(c);
        assert_eq!(crc8(&whole), 0);
    }

    #[test]
    fn empty_input() {
        assert_eq!(crc8(&[]), IV);
    }

    #[test]
    fn single_bit_flip_changes_crc() {
        let data = b"frame payload bytes";
        let c1 = crc8(data);
        let mut flipped = data.to_vec();
        flipped[3] ^= 0x01;
        let c2 = crc8(&flipped);
        assert_ne!(c1, c2);
    }

    #[test]
    fn corrupted_trailing_crc_fails_verify() {
        let data = b"abc";
        let c = crc8(data);
        let mut whole = data.to_vec();
        whole.push(c ^ 0xFF);
        assert!(!verify(&whole));
    }

    proptest::proptest! {
        #[test]
        fn roundtrip_any_bytes(data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..300)) {
            let c = crc8(&data);
            let mut whole = data.clone();
            whole.push(c);
            proptest::prop_assert_eq!(crc8(&whole), 0);
        }
    }
}
