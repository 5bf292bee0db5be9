use hmac::{Hmac, Mac};
use rand::{rng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Fill a slice with random bytes. The handshake only needs "random
/// enough", not cryptographic randomness.
pub fn fill_random(buf: &mut [u8]) {
    rng().fill_bytes(buf);
}

/// HMAC-SHA256 over one or more data segments.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any size");
    for part in parts {
        mac.update(part);
    }

    let mut output = [0u8; 32];
    output.copy_from_slice(&mac.finalize().into_bytes());
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_random() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        fill_random(&mut a);
        fill_random(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hmac_sha256() {
        // RFC-style known vector
        let hmac = hmac_sha256(b"key", &[b"The quick brown fox jumps over the lazy dog"]);
        let expected = [
            0xf7, 0xbc, 0x83, 0xf4, 0x30, 0x53, 0x84, 0x24, 0xb1, 0x32, 0x98,
            0xe6, 0xaa, 0x6f, 0xb1, 0x43, 0xef, 0x4d, 0x59, 0xa1, 0x49, 0x46,
            0x17, 0x59, 0x97, 0x47, 0x9d, 0xbc, 0x2d, 0x1a, 0x3c, 0xd8,
        ];
        assert_eq!(hmac, expected);
    }

    #[test]
    fn test_hmac_sha256_split_input() {
        let whole = hmac_sha256(b"key", &[b"abcdef"]);
        let split = hmac_sha256(b"key", &[b"abc", b"def"]);
        assert_eq!(whole, split);
    }
}
