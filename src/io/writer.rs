use crate::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Buffered writer over the network stream with big-/little-endian
/// integer writes of 1 to 4 bytes. Nothing reaches the wire before
/// `flush`.
pub struct BufferedWriter<W: AsyncWrite + Unpin> {
    inner: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> BufferedWriter<W> {
    pub fn new(inner: W, capacity: usize) -> Self {
        BufferedWriter {
            inner: BufWriter::with_capacity(capacity.max(16), inner),
        }
    }

    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data).await?;
        Ok(())
    }

    /// Write the low `n` bytes of `value` big-endian, `n` in 1..=4.
    pub async fn write_uint_be(&mut self, value: u32, n: usize) -> Result<()> {
        debug_assert!((1..=4).contains(&n));
        let be = value.to_be_bytes();
        self.inner.write_all(&be[4 - n..]).await?;
        Ok(())
    }

    /// Write the low `n` bytes of `value` little-endian, `n` in 1..=4.
    pub async fn write_uint_le(&mut self, value: u32, n: usize) -> Result<()> {
        debug_assert!((1..=4).contains(&n));
        let le = value.to_le_bytes();
        self.inner.write_all(&le[..n]).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Flush and shut down the underlying stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
