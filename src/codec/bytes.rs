//! Canonical big-endian integer conversion.
//!
//! All integers cross the wire as minimal big-endian byte strings:
//! leading zeros are stripped and zero encodes to the empty string.

use primitive_types::U256;

/// Encodes a u64 as minimal big-endian bytes (zero -> empty).
pub fn u64_to_min_be(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[skip..].to_vec()
}

/// Decodes a big-endian u64. Returns `None` if the input is wider than
/// 8 bytes.
pub fn u64_from_be(bytes: &[u8]) -> Option<u64> {
    if bytes.len() > 8 {
        return None;
    }
    let mut value = 0u64;
    for &b in bytes {
        value = (value << 8) | b as u64;
    }
    Some(value)
}

/// Encodes a U256 as minimal big-endian bytes (zero -> empty).
pub fn u256_to_min_be(value: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let skip = buf.iter().take_while(|&&b| b == 0).count();
    buf[skip..].to_vec()
}

/// Encodes a U256 as a fixed 32-byte big-endian array.
pub fn u256_to_be32(value: U256) -> [u8; 32] {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    buf
}

/// Decodes a big-endian U256. Returns `None` if the input is wider than
/// 32 bytes.
pub fn u256_from_be(bytes: &[u8]) -> Option<U256> {
    if bytes.len() > 32 {
        return None;
    }
    Some(U256::from_big_endian(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64_min_be() {
        assert_eq!(u64_to_min_be(0), Vec::<u8>::new());
        assert_eq!(u64_to_min_be(1), vec![1]);
        assert_eq!(u64_to_min_be(256), vec![1, 0]);
        assert_eq!(u64_to_min_be(u64::MAX), vec![0xff; 8]);
    }

    #[test]
    fn test_u64_roundtrip() {
        for value in [0u64, 1, 127, 128, 255, 256, 65535, u64::MAX] {
            assert_eq!(u64_from_be(&u64_to_min_be(value)), Some(value));
        }
    }

    #[test]
    fn test_u64_too_wide() {
        assert_eq!(u64_from_be(&[1u8; 9]), None);
    }

    #[test]
    fn test_u256_min_be() {
        assert_eq!(u256_to_min_be(U256::zero()), Vec::<u8>::new());
        assert_eq!(u256_to_min_be(U256::from(0x1234)), vec![0x12, 0x34]);
    }

    #[test]
    fn test_u256_roundtrip() {
        for value in [U256::zero(), U256::from(42), U256::MAX] {
            assert_eq!(u256_from_be(&u256_to_min_be(value)), Some(value));
        }
    }

    #[test]
    fn test_u256_be32() {
        let buf = u256_to_be32(U256::from(1));
        assert_eq!(buf[31], 1);
        assert!(buf[..31].iter().all(|&b| b == 0));
    }
}
