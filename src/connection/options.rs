use crate::protocol::*;

/// Per-connection tunables. The enclosing program owns these; everything
/// else is negotiated on the wire.
#[derive(Debug, Clone)]
pub struct ConnOptions {
    /// Local chunk size the write path splits messages by. Servers
    /// announce it with Set Chunk Size during connect.
    pub chunk_size: u32,
    /// Window advertised to the peer with Window Acknowledgement Size.
    pub window_ack_size: u32,
    /// Upper bound on a single reassembled message.
    pub max_message_bytes: u32,
    /// Socket buffer sizes for the buffered reader/writer.
    pub buffer_size: usize,
    /// Slab arena watermarks.
    pub slab_min: usize,
    pub slab_max: usize,
}

impl Default for ConnOptions {
    fn default() -> Self {
        ConnOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            buffer_size: CONN_BUF_SIZE,
            slab_min: 64 * 1024,
            slab_max: 256 * 1024,
        }
    }
}

impl ConnOptions {
    /// Options with a larger write chunk size, as servers use.
    pub fn with_chunk_size(chunk_size: u32) -> Self {
        assert!(chunk_size >= 128, "chunk size < 128");
        ConnOptions {
            chunk_size,
            ..ConnOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ConnOptions::default();
        assert_eq!(opts.chunk_size, 128);
        assert_eq!(opts.window_ack_size, 2_500_000);
        assert_eq!(opts.max_message_bytes, 100 * 1024 * 1024);
    }

    #[test]
    #[should_panic(expected = "chunk size < 128")]
    fn test_chunk_size_floor() {
        ConnOptions::with_chunk_size(64);
    }
}
