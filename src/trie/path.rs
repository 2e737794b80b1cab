//! Key-to-path expansion for both flavors.
//!
//! The classic trie walks keys a nibble at a time, the uni trie a bit
//! at a time. Both expansions keep lexicographic key order.

/// Expands a byte key into nibbles, high nibble first.
pub fn bytes_to_nibbles(bytes: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(bytes.len() * 2);
    for &b in bytes {
        nibbles.push(b >> 4);
        nibbles.push(b & 0x0f);
    }
    nibbles
}

/// Expands a byte key into bits, most significant first. Each output
/// element is 0 or 1.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &b in bytes {
        for shift in (0..8).rev() {
            bits.push((b >> shift) & 1);
        }
    }
    bits
}

/// Length of the longest common prefix of two paths.
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

/// Decodes an HP (Hex-Prefix) encoded nibble path.
///
/// Returns the nibbles and whether the leaf flag was set, or `None` if
/// the input is empty or carries an unknown flag nibble.
pub fn hp_decode(encoded: &[u8]) -> Option<(Vec<u8>, bool)> {
    let (&first, rest) = encoded.split_first()?;
    let flag = first >> 4;
    let is_leaf = match flag {
        0x0 | 0x1 => false,
        0x2 | 0x3 => true,
        _ => return None,
    };
    let odd = flag & 1 == 1;

    let mut nibbles = Vec::with_capacity(rest.len() * 2 + 1);
    if odd {
        nibbles.push(first & 0x0f);
    }
    for &b in rest {
        nibbles.push(b >> 4);
        nibbles.push(b & 0x0f);
    }
    Some((nibbles, is_leaf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::RlpEncoder;

    #[test]
    fn test_bytes_to_nibbles() {
        assert_eq!(bytes_to_nibbles(&[0xab, 0x01]), vec![0xa, 0xb, 0x0, 0x1]);
        assert!(bytes_to_nibbles(&[]).is_empty());
    }

    #[test]
    fn test_bytes_to_bits() {
        assert_eq!(bytes_to_bits(&[0b1010_0001]), vec![1, 0, 1, 0, 0, 0, 0, 1]);
        assert_eq!(bytes_to_bits(&[]).len(), 0);
    }

    #[test]
    fn test_common_prefix_len() {
        assert_eq!(common_prefix_len(&[1, 2, 3], &[1, 2, 4]), 2);
        assert_eq!(common_prefix_len(&[1], &[2]), 0);
        assert_eq!(common_prefix_len(&[1, 2], &[1, 2]), 2);
        assert_eq!(common_prefix_len(&[], &[1]), 0);
    }

    #[test]
    fn test_hp_roundtrip() {
        let cases: &[(&[u8], bool)] = &[
            (&[], true),
            (&[], false),
            (&[1, 2, 3], true),
            (&[1, 2, 3], false),
            (&[0xf, 0x0, 0xa, 0xb], true),
            (&[7], false),
        ];
        for &(nibbles, is_leaf) in cases {
            let mut enc = RlpEncoder::new();
            enc.encode_nibbles(nibbles, is_leaf);
            // Strip the RLP string header to get the raw HP bytes
            let bytes = enc.into_bytes();
            let hp = if bytes.len() == 1 { &bytes[..] } else { &bytes[1..] };
            let (decoded, leaf) = hp_decode(hp).unwrap();
            assert_eq!(decoded, nibbles);
            assert_eq!(leaf, is_leaf);
        }
    }

    #[test]
    fn test_hp_decode_rejects_bad_flag() {
        assert_eq!(hp_decode(&[0x40]), None);
        assert_eq!(hp_decode(&[]), None);
    }
}
