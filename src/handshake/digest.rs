//! HMAC-SHA256 digest plumbing for the Adobe complex handshake.
//!
//! C1/S1 carry two 764-byte blocks after the 8-byte prefix. Schema 0 puts
//! the key block first, schema 1 the digest block:
//!
//! ```text
//! schema0: |time: 4|version: 4|key: 764|digest: 764|
//! schema1: |time: 4|version: 4|digest: 764|key: 764|
//! ```
//!
//! Each digest block is `|offset: 4|random: offset|digest: 32|random: rest|`
//! where `offset` is the sum of the four leading bytes modulo 728.

use crate::utils::{fill_random, hmac_sha256};
use crate::{Error, Result};

pub(crate) const CLIENT_KEY: &[u8] = &[
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b',
    b'e', b' ', b'F', b'l', b'a', b's', b'h', b' ', b'P', b'l', b'a', b'y',
    b'e', b'r', b' ', b'0', b'0', b'1', // partial key ends here
    0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E, 0x00, 0xD0, 0xD1,
    0x02, 0x9E, 0x7E, 0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB,
    0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB, 0x31, 0xAE,
];

pub(crate) const SERVER_KEY: &[u8] = &[
    b'G', b'e', b'n', b'u', b'i', b'n', b'e', b' ', b'A', b'd', b'o', b'b',
    b'e', b' ', b'F', b'l', b'a', b's', b'h', b' ', b'M', b'e', b'd', b'i',
    b'a', b' ', b'S', b'e', b'r', b'v', b'e', b'r', b' ', b'0', b'0', b'1',
    // partial key ends here
    0xF0, 0xEE, 0xC2, 0x4A, 0x80, 0x68, 0xBE, 0xE8, 0x2E, 0x00, 0xD0, 0xD1,
    0x02, 0x9E, 0x7E, 0x57, 0x6E, 0xEC, 0x5D, 0x2D, 0x29, 0x80, 0x6F, 0xAB,
    0x93, 0xB8, 0xE6, 0x36, 0xCF, 0xEB, 0x31, 0xAE,
];

pub(crate) fn client_partial_key() -> &'static [u8] {
    &CLIENT_KEY[..30]
}

pub(crate) fn server_partial_key() -> &'static [u8] {
    &SERVER_KEY[..36]
}

const SCHEMA0_BASE: usize = 772;
const SCHEMA1_BASE: usize = 8;

/// Where the digest block's 32 bytes start, given the block base.
fn digest_data_pos(c1s1: &[u8], base: usize) -> usize {
    let mut pos = 0usize;
    for i in 0..4 {
        pos += c1s1[base + i] as usize;
    }
    (pos % 728) + base + 4
}

/// HMAC over `src` with the 32 digest bytes at `pos` spliced out; `None`
/// digests the whole slice.
fn make_digest(key: &[u8], src: &[u8], pos: Option<usize>) -> [u8; 32] {
    match pos {
        None => hmac_sha256(key, &[src]),
        Some(pos) => hmac_sha256(key, &[&src[..pos], &src[pos + 32..]]),
    }
}

/// Probe one schema: the candidate position holds a digest only if the
/// HMAC of everything else reproduces it.
fn find_digest_pos(c1s1: &[u8], client_key: &[u8], base: usize) -> Option<usize> {
    let pos = digest_data_pos(c1s1, base);
    let digest = make_digest(client_key, c1s1, Some(pos));

    if c1s1[pos..pos + 32] == digest {
        Some(pos)
    } else {
        None
    }
}

/// Locate the client's C1 digest (schema 0, then schema 1) and fold it
/// through the server key, yielding the key for the S2 signature.
pub(crate) fn get_digest(
    c1s1: &[u8],
    client_key: &[u8],
    server_key: &[u8],
) -> Result<[u8; 32]> {
    let pos = find_digest_pos(c1s1, client_key, SCHEMA0_BASE)
        .or_else(|| find_digest_pos(c1s1, client_key, SCHEMA1_BASE))
        .ok_or_else(|| Error::protocol("no digest found in C1, schema 0 and 1 both failed"))?;

    Ok(make_digest(server_key, &c1s1[pos..pos + 32], None))
}

/// Fill S1 (or a complex C1): time, version, random body, and the
/// schema-1 digest computed with `key`.
pub(crate) fn write_digest_c1s1(c1s1: &mut [u8], time: u32, version: u32, key: &[u8]) {
    fill_random(&mut c1s1[8..]);
    c1s1[0..4].copy_from_slice(&time.to_be_bytes());
    c1s1[4..8].copy_from_slice(&version.to_be_bytes());

    let pos = digest_data_pos(c1s1, SCHEMA1_BASE);
    let digest = make_digest(key, c1s1, Some(pos));
    c1s1[pos..pos + 32].copy_from_slice(&digest);
}

/// Fill S2 (or a complex C2): 1504 random bytes followed by the 32-byte
/// signature over them.
pub(crate) fn write_digest_c2s2(c2s2: &mut [u8], key: &[u8]) {
    fill_random(c2s2);

    let pos = c2s2.len() - 32;
    let digest = make_digest(key, c2s2, Some(pos));
    c2s2[pos..].copy_from_slice(&digest);
}
