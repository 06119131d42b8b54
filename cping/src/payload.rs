/// Tile `seed` into exactly `length` bytes.
///
/// The cursor advances before each byte is emitted and wraps when it stands on
/// the last index, so the stream starts at `seed[1]` for seeds longer than one
/// byte. Packets on the wire depend on this ordering.
pub fn cycle(seed: &[u8], length: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(length);
    if seed.is_empty() {
        return out;
    }

    let last = seed.len() - 1;
    let mut pos = 0usize;
    for _ in 0..length {
        pos = if pos == last { 0 } else { pos + 1 };
        out.push(seed[pos]);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_exact_length() {
        for seed in [&b"a"[..], &b"ab"[..], &b"hello"[..]] {
            for n in [0usize, 1, 2, 7, 72, 1000] {
                assert_eq!(cycle(seed, n).len(), n);
            }
        }
    }

    #[test]
    fn test_cycle_wrap_boundary() {
        assert_eq!(cycle(b"hello", 7), b"ellohel".to_vec());
        assert_eq!(cycle(&[0xAB, 0xCD], 4), vec![0xCD, 0xAB, 0xCD, 0xAB]);
        assert_eq!(cycle(b"x", 3), b"xxx".to_vec());
    }

    #[test]
    fn test_cycle_empty() {
        assert!(cycle(b"hello", 0).is_empty());
        assert!(cycle(b"", 5).is_empty());
    }
}
