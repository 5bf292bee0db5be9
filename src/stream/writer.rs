use crate::chunk::ChunkStream;
use crate::connection::Connection;
use crate::funnel::{Funnel, Terminal};
use crate::media::{Packet, PacketKind};
use crate::protocol::*;
use crate::session::Info;
use crate::Result;
use async_trait::async_trait;
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Egress side of a stream: a funnel terminal that writes packets back
/// out as chunks on the subscriber's connection.
pub struct PacketWriter<S: AsyncRead + AsyncWrite + Unpin> {
    info: Info,
    status: Arc<AtomicBool>,
    conn: Arc<Connection<S>>,
}

impl<S> PacketWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap a linked-up subscriber connection in a funnel. A background
    /// task keeps draining the subscriber's own in-band traffic so acks
    /// and control messages keep flowing; the writer stops once it ends.
    pub fn spawn(info: Info, conn: Arc<Connection<S>>) -> Funnel {
        let status = Arc::new(AtomicBool::new(false));

        let drain_conn = conn.clone();
        let drain_status = status.clone();
        let key = info.key.clone();
        tokio::spawn(async move {
            while !drain_status.load(Ordering::Relaxed) {
                if let Err(e) = drain_conn.read_message().await {
                    trace!("[{}] subscriber read loop ends: {}", key, e);
                    break;
                }
            }
            drain_status.store(true, Ordering::Relaxed);
        });

        Funnel::new(Box::new(PacketWriter { info, status, conn }))
    }

    fn stop(&self) {
        self.status.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl<S> Terminal for PacketWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn info(&self) -> &Info {
        &self.info
    }

    fn name(&self) -> &'static str {
        "rtmp"
    }

    async fn write(&mut self, p: &Packet) -> Result<()> {
        let type_id = match p.kind {
            PacketKind::Video => MSG_VIDEO,
            PacketKind::Audio => MSG_AUDIO,
            PacketKind::Metadata => MSG_DATA_AMF0,
        };

        let mut cs = ChunkStream::message(0, type_id, p.stream_id, p.baseline, &p.data);
        cs.unpack()?;

        if let Err(e) = self.conn.write_message(&cs).await {
            self.stop();
            trace!("[{}] rtmp write failed: {}", self.info.key, e);
            return Err(e);
        }

        Ok(())
    }

    async fn after(&mut self) {
        self.stop();

        if let Err(e) = self.conn.flush().await {
            trace!("[{}] flush failed: {}", self.info.key, e);
        }
        if let Err(e) = self.conn.close().await {
            trace!("[{}] close failed: {}", self.info.key, e);
        }
    }
}
