//! The 1+1536+1536 byte three-phase handshake. The client side speaks
//! the simple (echo) dialect; the server answers either the simple echo
//! or, when C1 carries a nonzero version, the HMAC-SHA256 digest dialect
//! newer Flash clients expect.

mod digest;

use crate::io::{BufferedReader, BufferedWriter};
use crate::utils::fill_random;
use crate::{Error, Result};
use log::debug;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

pub(crate) use digest::get_digest;
#[cfg(test)]
pub(crate) use digest::{CLIENT_KEY, SERVER_KEY};

pub const RTMP_VERSION: u8 = 3;
pub const HANDSHAKE_SIZE: usize = 1536;
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

const SERVER_VERSION: u32 = 0x0405_0001;

/// Initiate the handshake. Only the simple dialect is spoken from this
/// side: C1 carries a zero time, a zero version and random fill, and C2
/// echoes S1.
pub(crate) async fn handshake_client<R, W>(
    r: &mut BufferedReader<R>,
    w: &mut BufferedWriter<W>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut c0c1 = [0u8; 1 + HANDSHAKE_SIZE];
    c0c1[0] = RTMP_VERSION;
    // c1[0..8] stays zero: zero epoch, zero version selects the simple
    // dialect; the body just has to be filled with something.
    fill_random(&mut c0c1[9..]);

    w.write_all(&c0c1).await?;
    w.flush().await?;

    let mut s0s1s2 = [0u8; 1 + HANDSHAKE_SIZE * 2];
    r.read_exact(&mut s0s1s2).await?;

    if s0s1s2[0] != RTMP_VERSION {
        return Err(Error::protocol(format!(
            "expected rtmp version 3, but got {}",
            s0s1s2[0]
        )));
    }

    // C2 echoes S1.
    let c2 = &s0s1s2[1..1 + HANDSHAKE_SIZE];
    w.write_all(c2).await?;
    w.flush().await?;

    debug!("client handshake is finished");
    Ok(())
}

/// Answer the handshake. A zero C1 version selects the simple echo; any
/// other value selects the digest dialect.
pub(crate) async fn handshake_server<R, W>(
    r: &mut BufferedReader<R>,
    w: &mut BufferedWriter<W>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut c0c1 = [0u8; 1 + HANDSHAKE_SIZE];
    r.read_exact(&mut c0c1).await?;

    if c0c1[0] != RTMP_VERSION {
        return Err(Error::protocol(format!(
            "invalid rtmp version={}",
            c0c1[0]
        )));
    }

    let c1 = &c0c1[1..];
    let c_time = u32::from_be_bytes([c1[0], c1[1], c1[2], c1[3]]);
    let c_version = u32::from_be_bytes([c1[4], c1[5], c1[6], c1[7]]);

    let mut s0s1s2 = [0u8; 1 + HANDSHAKE_SIZE * 2];
    s0s1s2[0] = RTMP_VERSION;

    if c_version != 0 {
        // Digest dialect: recover the C1 digest with the client key,
        // fold it through the server key, sign S1 and S2.
        let c1_digest = get_digest(c1, digest::client_partial_key(), digest::SERVER_KEY)?;

        let (s1, s2) = s0s1s2[1..].split_at_mut(HANDSHAKE_SIZE);
        digest::write_digest_c1s1(s1, c_time, SERVER_VERSION, digest::server_partial_key());
        digest::write_digest_c2s2(s2, &c1_digest);
    } else {
        // Simple dialect: S2 echoes C1; S1 is arbitrary and stays zero.
        s0s1s2[1 + HANDSHAKE_SIZE..].copy_from_slice(c1);
    }

    w.write_all(&s0s1s2).await?;
    w.flush().await?;

    // C2 is read to keep the byte counts aligned; its contents are not
    // verified.
    let mut c2 = [0u8; HANDSHAKE_SIZE];
    r.read_exact(&mut c2).await?;

    debug!("server handshake is finished");
    Ok(())
}
