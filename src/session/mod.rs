mod client;
mod info;
mod server;

pub use client::*;
pub use info::*;
pub use server::*;

use crate::chunk::ChunkStream;
use crate::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Common surface of a linked-up session, as the packet reader/writer
/// layer consumes it. Reads and writes each need independent buffers
/// underneath.
#[async_trait]
pub trait SessionIo: Send {
    async fn read(&mut self) -> Result<ChunkStream>;
    async fn write(&mut self, cs: &mut ChunkStream) -> Result<()>;
    async fn flush(&mut self) -> Result<()>;
    async fn close(&mut self) -> Result<()>;

    /// App and stream name of this session.
    fn info(&self) -> (String, String);
    fn publish_info(&self) -> &PublishInfo;
    fn connect_info(&self) -> &ConnectInfo;
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> SessionIo for ServerSession<S> {
    async fn read(&mut self) -> Result<ChunkStream> {
        ServerSession::read(self).await
    }

    async fn write(&mut self, cs: &mut ChunkStream) -> Result<()> {
        ServerSession::write(self, cs).await
    }

    async fn flush(&mut self) -> Result<()> {
        ServerSession::flush(self).await
    }

    async fn close(&mut self) -> Result<()> {
        ServerSession::close(self).await
    }

    fn info(&self) -> (String, String) {
        ServerSession::info(self)
    }

    fn publish_info(&self) -> &PublishInfo {
        ServerSession::publish_info(self)
    }

    fn connect_info(&self) -> &ConnectInfo {
        ServerSession::connect_info(self)
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> SessionIo for ClientSession<S> {
    async fn read(&mut self) -> Result<ChunkStream> {
        ClientSession::read(self).await
    }

    async fn write(&mut self, cs: &mut ChunkStream) -> Result<()> {
        ClientSession::write(self, cs).await
    }

    async fn flush(&mut self) -> Result<()> {
        ClientSession::flush(self).await
    }

    async fn close(&mut self) -> Result<()> {
        ClientSession::close(self).await
    }

    fn info(&self) -> (String, String) {
        ClientSession::info(self)
    }

    fn publish_info(&self) -> &PublishInfo {
        ClientSession::publish_info(self)
    }

    fn connect_info(&self) -> &ConnectInfo {
        ClientSession::connect_info(self)
    }
}
