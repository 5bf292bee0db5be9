use crate::chunk::{read_basic_header, ChunkStream};
use crate::connection::ConnOptions;
use crate::handshake::{self, HANDSHAKE_TIMEOUT};
use crate::io::{BufferedReader, BufferedWriter};
use crate::message;
use crate::protocol::*;
use crate::slab::Slab;
use crate::{Error, Result};
use log::{debug, error};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Read-side state: the buffered half, the arena and the per-CSID
/// assembly slots. Owned by whoever holds the read lock.
struct ReadState<S> {
    io: BufferedReader<ReadHalf<S>>,
    slab: Slab,
    chunks: HashMap<u32, ChunkStream>,
}

/// One RTMP peer endpoint over a reliable byte stream. A connection may
/// be read and written concurrently by different tasks; each direction is
/// serialised by its own lock.
pub struct Connection<S: AsyncRead + AsyncWrite + Unpin> {
    read: Mutex<ReadState<S>>,
    write: Mutex<BufferedWriter<WriteHalf<S>>>,
    opts: ConnOptions,

    /// Chunk size the local write path splits by.
    chunk_size: AtomicU32,
    /// Chunk size the peer announced; governs the read path.
    remote_chunk_size: AtomicU32,
    /// Window we advertise to the peer.
    window_ack_size: AtomicU32,
    /// Window the peer advertised; drives our Acknowledgement cadence.
    remote_window_ack_size: AtomicU32,

    /// Total bytes received, wrapping at 0xF0000000.
    received: AtomicU32,
    /// Bytes received since the last Acknowledgement we sent.
    ack_received: AtomicU32,
    /// Total bytes sent, wrapping at 0xF0000000.
    sent: AtomicU32,
    /// Last Acknowledgement value the peer reported back.
    ack_sent: AtomicU32,
    /// Peer bandwidth limit type last applied (0 Hard, 1 Soft).
    bandwidth_limit: AtomicU8,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S, opts: ConnOptions) -> Self {
        let (rd, wr) = tokio::io::split(stream);

        Connection {
            read: Mutex::new(ReadState {
                io: BufferedReader::new(rd, opts.buffer_size),
                slab: Slab::with_marks(opts.slab_min, opts.slab_max),
                chunks: HashMap::new(),
            }),
            write: Mutex::new(BufferedWriter::new(wr, opts.buffer_size)),
            chunk_size: AtomicU32::new(opts.chunk_size),
            remote_chunk_size: AtomicU32::new(DEFAULT_CHUNK_SIZE),
            window_ack_size: AtomicU32::new(opts.window_ack_size),
            remote_window_ack_size: AtomicU32::new(DEFAULT_WINDOW_ACK_SIZE),
            received: AtomicU32::new(0),
            ack_received: AtomicU32::new(0),
            sent: AtomicU32::new(0),
            ack_sent: AtomicU32::new(0),
            bandwidth_limit: AtomicU8::new(0),
            opts,
        }
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size.load(Ordering::Relaxed)
    }

    pub fn remote_chunk_size(&self) -> u32 {
        self.remote_chunk_size.load(Ordering::Relaxed)
    }

    pub fn window_ack_size(&self) -> u32 {
        self.window_ack_size.load(Ordering::Relaxed)
    }

    pub fn remote_window_ack_size(&self) -> u32 {
        self.remote_window_ack_size.load(Ordering::Relaxed)
    }

    /// Bytes received but not yet acknowledged.
    pub fn ack_received(&self) -> u32 {
        self.ack_received.load(Ordering::Relaxed)
    }

    /// The peer's last acknowledged byte count.
    pub fn ack_sent(&self) -> u32 {
        self.ack_sent.load(Ordering::Relaxed)
    }

    /// Initiate the handshake from the client side, bounded by the
    /// 2-second deadline.
    pub async fn handshake_client(&self) -> Result<()> {
        let mut read = self.read.lock().await;
        let mut write = self.write.lock().await;

        timeout(
            HANDSHAKE_TIMEOUT,
            handshake::handshake_client(&mut read.io, &mut write),
        )
        .await
        .map_err(|_| Error::Timeout("handshake"))?
    }

    /// Answer the handshake from the server side, bounded by the
    /// 2-second deadline.
    pub async fn handshake_server(&self) -> Result<()> {
        let mut read = self.read.lock().await;
        let mut write = self.write.lock().await;

        timeout(
            HANDSHAKE_TIMEOUT,
            handshake::handshake_server(&mut read.io, &mut write),
        )
        .await
        .map_err(|_| Error::Timeout("handshake"))?
    }

    /// Read whole messages until one that is not handled internally
    /// arrives. Protocol-control and user-control traffic never reaches
    /// the caller.
    pub async fn read_message(&self) -> Result<ChunkStream> {
        loop {
            let msg = {
                let mut state = self.read.lock().await;
                self.intact_message(&mut state).await?
            };

            // Every received message counts toward the ack window,
            // control traffic included.
            self.ack(msg.length).await;

            if !self.handle_control_message(&msg) {
                return Ok(msg);
            }
        }
    }

    /// Assemble chunks, possibly interleaved across CSIDs, until one
    /// message completes.
    async fn intact_message(&self, state: &mut ReadState<S>) -> Result<ChunkStream> {
        let mut counter: u32 = 0;

        loop {
            // A runaway continuation train means a message bigger than
            // anything we are willing to buffer.
            if counter.saturating_mul(self.chunk_size()) > self.opts.max_message_bytes {
                return Err(Error::OversizedMessage {
                    max: self.opts.max_message_bytes,
                });
            }

            let (format, csid) = read_basic_header(&mut state.io).await?;

            let cs = state
                .chunks
                .entry(csid)
                .or_insert_with(|| ChunkStream::new(csid));
            cs.set_format_tmp(format);

            let remote_chunk_size = self.remote_chunk_size.load(Ordering::Relaxed);
            cs.read_chunk(&mut state.io, remote_chunk_size, &mut state.slab)
                .await?;

            if cs.intact() {
                return Ok(cs.take_message());
            }

            counter += 1;
        }
    }

    /// Write one message as a chunk train. Buffered until `flush`.
    pub async fn write_message(&self, cs: &ChunkStream) -> Result<()> {
        let mut io = self.write.lock().await;

        cs.write_chunk(&mut io, self.chunk_size()).await?;

        let mut sent = self.sent.load(Ordering::Relaxed).wrapping_add(cs.length);
        if sent >= COUNTER_WRAP {
            sent = 0;
        }
        self.sent.store(sent, Ordering::Relaxed);

        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        self.write.lock().await.flush().await
    }

    /// Flush what is buffered and shut the stream down.
    pub async fn close(&self) -> Result<()> {
        {
            let state = self.read.lock().await;
            let stat = state.slab.stat();
            if stat.any() {
                debug!(
                    "connection closed, slab stat large={} medium={} small={}",
                    stat.large, stat.medium, stat.small
                );
            }
        }

        self.write.lock().await.shutdown().await
    }

    /// Account received bytes and emit an Acknowledgement once the
    /// peer's window worth of data has arrived.
    async fn ack(&self, received: u32) {
        let mut total = self.received.load(Ordering::Relaxed).wrapping_add(received);
        if total >= COUNTER_WRAP {
            total = 0;
        }
        self.received.store(total, Ordering::Relaxed);

        let unacked = self
            .ack_received
            .load(Ordering::Relaxed)
            .wrapping_add(received);
        self.ack_received.store(unacked, Ordering::Relaxed);

        if unacked >= self.remote_window_ack_size.load(Ordering::Relaxed) {
            let cs = message::acknowledgement(unacked);
            if let Err(e) = self.write_message(&cs).await {
                error!("send acknowledgement failed: {}", e);
            }
            self.ack_received.store(0, Ordering::Relaxed);
        }
    }

    /// Dispatch protocol-control (1,2,3,5,6) and user-control (4)
    /// messages. Returns true when the message was consumed here.
    pub(crate) fn handle_control_message(&self, cs: &ChunkStream) -> bool {
        match cs.type_id {
            MSG_SET_CHUNK_SIZE => {
                self.set_remote_chunk_size(cs);
                true
            }
            MSG_ABORT => {
                // Pairing abort with a dropped partial message has no
                // caller today; keep the partial message.
                if cs.data.len() >= 4 {
                    let csid = u32::from_be_bytes([cs.data[0], cs.data[1], cs.data[2], cs.data[3]]);
                    error!("ignore unrealized abort message, csid={}", csid);
                }
                true
            }
            MSG_ACK => {
                if cs.data.len() >= 4 {
                    let value =
                        u32::from_be_bytes([cs.data[0], cs.data[1], cs.data[2], cs.data[3]]);
                    self.ack_sent.store(value, Ordering::Relaxed);
                }
                true
            }
            MSG_USER_CONTROL => {
                self.handle_user_message(cs);
                true
            }
            MSG_WINDOW_ACK_SIZE => {
                if cs.data.len() >= 4 {
                    let size =
                        u32::from_be_bytes([cs.data[0], cs.data[1], cs.data[2], cs.data[3]]);
                    self.remote_window_ack_size.store(size, Ordering::Relaxed);
                }
                true
            }
            MSG_SET_PEER_BANDWIDTH => {
                self.set_peer_bandwidth(cs);
                true
            }
            _ => false,
        }
    }

    fn set_remote_chunk_size(&self, cs: &ChunkStream) {
        if cs.data.len() < 4 {
            error!("short set chunk size payload");
            return;
        }
        let mut size = u32::from_be_bytes([cs.data[0], cs.data[1], cs.data[2], cs.data[3]]);

        // The high bit is reserved and must be zero.
        if size >> 31 != 0 {
            error!("incorrect control value when setting chunk size");
            return;
        }

        // Anything below the initial 128 only burns CPU on both ends.
        if size < 128 {
            error!("incorrect chunk size, size={}", size);
            return;
        }

        // No chunk can exceed a whole message.
        if size > MAX_MESSAGE_LENGTH {
            size = MAX_MESSAGE_LENGTH;
        }

        self.remote_chunk_size.store(size, Ordering::Relaxed);
        debug!("remote chunk size is changed to {}", size);
    }

    fn set_peer_bandwidth(&self, cs: &ChunkStream) {
        if cs.data.len() < 5 {
            error!("short set peer bandwidth payload");
            return;
        }
        let bandwidth = u32::from_be_bytes([cs.data[0], cs.data[1], cs.data[2], cs.data[3]]);
        let mut limit_type = cs.data[4];

        // Dynamic counts as Hard when the previous limit was Hard and is
        // dropped otherwise.
        if limit_type == 2 && self.bandwidth_limit.load(Ordering::Relaxed) == 0 {
            limit_type = 0;
        }

        match limit_type {
            0 => {
                self.ack_received.store(bandwidth, Ordering::Relaxed);
                self.bandwidth_limit.store(0, Ordering::Relaxed);
            }
            1 => {
                if bandwidth < self.ack_received.load(Ordering::Relaxed) {
                    self.ack_received.store(bandwidth, Ordering::Relaxed);
                }
                self.bandwidth_limit.store(1, Ordering::Relaxed);
            }
            _ => {}
        }

        debug!("bandwidth is changed to {}", bandwidth);
    }

    fn handle_user_message(&self, cs: &ChunkStream) {
        if cs.data.len() < 2 {
            error!("short user control payload");
            return;
        }
        let event = u16::from_be_bytes([cs.data[0], cs.data[1]]);

        match event {
            EVENT_SET_BUFFER_LENGTH => {
                if cs.data.len() != 10 {
                    debug!("setBufferLen event data != 10, len={}", cs.data.len());
                    return;
                }
                let stream_id =
                    u32::from_be_bytes([cs.data[2], cs.data[3], cs.data[4], cs.data[5]]);
                let buffer_len =
                    u32::from_be_bytes([cs.data[6], cs.data[7], cs.data[8], cs.data[9]]);
                debug!(
                    "unrealized setBufferLen event, stream_id={} buffer_len={}",
                    stream_id, buffer_len
                );
            }
            EVENT_PING_RESPONSE => {
                if cs.data.len() != 6 {
                    error!("pingResponse event data != 6, len={}", cs.data.len());
                    return;
                }
                let timestamp =
                    u32::from_be_bytes([cs.data[2], cs.data[3], cs.data[4], cs.data[5]]);
                debug!("unrealized pingResponse event, timestamp={}", timestamp);
            }
            _ => {}
        }
    }
}
