use crate::{Error, Result};
use std::io::{Error as IoError, ErrorKind};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Buffered reader over the network stream. Besides `read_exact` it
/// offers `peek`/`discard` (the chunk codec needs a 4-byte lookahead for
/// the format-3 extended-timestamp rule) and big-/little-endian integer
/// reads of 1 to 4 bytes.
pub struct BufferedReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    end: usize,
}

impl<R: AsyncRead + Unpin> BufferedReader<R> {
    pub fn new(inner: R, capacity: usize) -> Self {
        BufferedReader {
            inner,
            buf: vec![0u8; capacity.max(16)],
            pos: 0,
            end: 0,
        }
    }

    fn buffered(&self) -> usize {
        self.end - self.pos
    }

    /// Buffer at least `n` bytes, compacting first if the tail is short.
    async fn fill_at_least(&mut self, n: usize) -> Result<()> {
        debug_assert!(n <= self.buf.len());
        if self.buffered() >= n {
            return Ok(());
        }

        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.end, 0);
            self.end -= self.pos;
            self.pos = 0;
        }

        while self.end < n {
            let read = self.inner.read(&mut self.buf[self.end..]).await?;
            if read == 0 {
                return Err(Error::Io(IoError::new(
                    ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
            self.end += read;
        }

        Ok(())
    }

    /// Look at the next `n` bytes without consuming them.
    pub async fn peek(&mut self, n: usize) -> Result<&[u8]> {
        self.fill_at_least(n).await?;
        Ok(&self.buf[self.pos..self.pos + n])
    }

    /// Drop `n` previously peeked bytes.
    pub fn discard(&mut self, n: usize) {
        debug_assert!(n <= self.buffered());
        self.pos += n.min(self.buffered());
    }

    pub async fn read_exact(&mut self, dst: &mut [u8]) -> Result<()> {
        let take = self.buffered().min(dst.len());
        if take > 0 {
            dst[..take].copy_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
        }
        if take < dst.len() {
            self.inner.read_exact(&mut dst[take..]).await?;
        }
        Ok(())
    }

    /// Read an `n`-byte big-endian unsigned integer, `n` in 1..=4.
    pub async fn read_uint_be(&mut self, n: usize) -> Result<u32> {
        debug_assert!((1..=4).contains(&n));
        self.fill_at_least(n).await?;

        let mut value: u32 = 0;
        for i in 0..n {
            value = (value << 8) | u32::from(self.buf[self.pos + i]);
        }
        self.pos += n;
        Ok(value)
    }

    /// Read an `n`-byte little-endian unsigned integer, `n` in 1..=4.
    pub async fn read_uint_le(&mut self, n: usize) -> Result<u32> {
        debug_assert!((1..=4).contains(&n));
        self.fill_at_least(n).await?;

        let mut value: u32 = 0;
        for i in (0..n).rev() {
            value = (value << 8) | u32::from(self.buf[self.pos + i]);
        }
        self.pos += n;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BE_CASES: [(usize, u32, &[u8]); 4] = [
        (1, 0x01, &[0x01]),
        (2, 0x0102, &[0x01, 0x02]),
        (3, 0x0102_03, &[0x01, 0x02, 0x03]),
        (4, 0x0102_0304, &[0x01, 0x02, 0x03, 0x04]),
    ];
    const LE_CASES: [(usize, u32, &[u8]); 4] = [
        (1, 0x01, &[0x01]),
        (2, 0x0102, &[0x02, 0x01]),
        (3, 0x0102_03, &[0x03, 0x02, 0x01]),
        (4, 0x0102_0304, &[0x04, 0x03, 0x02, 0x01]),
    ];

    #[tokio::test]
    async fn test_read_uint_be() {
        for (n, value, bytes) in BE_CASES {
            let mut r = BufferedReader::new(bytes, 1024);
            assert_eq!(r.read_uint_be(n).await.unwrap(), value, "n={}", n);
        }
    }

    #[tokio::test]
    async fn test_read_uint_le() {
        for (n, value, bytes) in LE_CASES {
            let mut r = BufferedReader::new(bytes, 1024);
            assert_eq!(r.read_uint_le(n).await.unwrap(), value, "n={}", n);
        }
    }

    #[tokio::test]
    async fn test_read_exact_then_eof() {
        let data: &[u8] = b"abc";
        let mut r = BufferedReader::new(data, 1024);

        let mut out = [0u8; 3];
        r.read_exact(&mut out).await.unwrap();
        assert_eq!(&out, b"abc");

        let err = r.read_exact(&mut out).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let data: &[u8] = &[0x00, 0x01, 0x02, 0x03, 0xAA];
        let mut r = BufferedReader::new(data, 16);

        assert_eq!(r.peek(4).await.unwrap(), &[0x00, 0x01, 0x02, 0x03]);
        assert_eq!(r.read_uint_be(4).await.unwrap(), 0x0001_0203);
        assert_eq!(r.read_uint_be(1).await.unwrap(), 0xAA);
    }

    #[tokio::test]
    async fn test_peek_then_discard() {
        let data: &[u8] = &[0x01, 0x02, 0x03, 0x04, 0x05];
        let mut r = BufferedReader::new(data, 16);

        r.peek(4).await.unwrap();
        r.discard(4);
        assert_eq!(r.read_uint_be(1).await.unwrap(), 0x05);
    }
}
