//! Dynamic relay: a pull client plays a stream from one server and a
//! push client republishes it to another, bridged by a bounded queue.

mod control;

pub use control::*;

use crate::chunk::ChunkStream;
use crate::session::{ClientConfig, ClientSession};
use crate::{Error, Result};
use log::{error, info, trace};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

const MAX_QUEUE: usize = 4096;

pub struct Relay {
    pull_url: String,
    push_url: String,
    config: ClientConfig,
    puller: Option<ClientSession<TcpStream>>,
    pusher: Option<ClientSession<TcpStream>>,
    control: Arc<Control>,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("pull_url", &self.pull_url)
            .field("push_url", &self.push_url)
            .finish()
    }
}

impl Relay {
    /// Dial both endpoints. Nothing flows until `start`.
    pub async fn new(pull_url: &str, push_url: &str, config: ClientConfig) -> Result<Relay> {
        let puller = ClientSession::dial(pull_url, &config).await.map_err(|e| {
            error!("init client connection failed, pull url={}", pull_url);
            e
        })?;
        let pusher = ClientSession::dial(push_url, &config).await.map_err(|e| {
            error!("init client connection failed, push url={}", push_url);
            e
        })?;

        Ok(Relay {
            pull_url: pull_url.to_string(),
            push_url: push_url.to_string(),
            config,
            puller: Some(puller),
            pusher: Some(pusher),
            control: Arc::new(Control::new(true)),
        })
    }

    /// Dial fresh clients for another `start` after a stop or failure.
    pub async fn renew_connection(&mut self) -> Result<()> {
        self.puller = Some(ClientSession::dial(&self.pull_url, &self.config).await?);
        self.pusher = Some(ClientSession::dial(&self.push_url, &self.config).await?);
        Ok(())
    }

    /// Link both ends up and spawn the pump tasks. A second `start`
    /// while running is a no-op.
    pub async fn start(&mut self) -> Result<()> {
        if !self.control.is_done() {
            return Ok(());
        }

        let mut puller = self
            .puller
            .take()
            .ok_or_else(|| Error::command("relay clients consumed, renew the connection first"))?;
        let mut pusher = self
            .pusher
            .take()
            .ok_or_else(|| Error::command("relay clients consumed, renew the connection first"))?;

        puller.start_play().await?;

        if let Err(e) = pusher.start_publish().await {
            if let Err(ce) = puller.close().await {
                trace!("close puller failed: {}", ce);
            }
            return Err(e);
        }

        // A fresh queue drops anything a previous run left behind.
        let (tx, rx) = mpsc::channel(MAX_QUEUE);
        self.control.restart();

        tokio::spawn(pull_loop(
            puller,
            tx,
            self.control.clone(),
            self.pull_url.clone(),
        ));
        tokio::spawn(push_loop(
            pusher,
            rx,
            self.control.clone(),
            self.push_url.clone(),
        ));

        info!("relay ({}) ===> ({}) is turned on", self.pull_url, self.push_url);
        Ok(())
    }

    /// Whether the relay is stopped (or never started).
    pub fn is_done(&self) -> bool {
        self.control.is_done()
    }

    pub fn stop(&self) {
        self.control.cancel();
    }

    /// Wait until the relay has been cancelled.
    pub async fn wait(&self) {
        self.control.cancelled().await;
    }
}

/// Pull task: drain the source into the queue until cancelled.
async fn pull_loop(
    puller: ClientSession<TcpStream>,
    tx: mpsc::Sender<ChunkStream>,
    control: Arc<Control>,
    pull_url: String,
) {
    loop {
        if control.is_done() {
            if let Err(e) = puller.close().await {
                trace!("close puller failed: {}", e);
            }
            return;
        }

        tokio::select! {
            _ = control.cancelled() => {}
            res = puller.read() => match res {
                Err(e) => {
                    control.cancel();
                    trace!("err={}, pull url={}", e, pull_url);
                }
                Ok(cs) => {
                    if tx.capacity() == 0 {
                        control.cancel();
                        error!("packet queue saturated, puller='{}'", pull_url);
                        continue;
                    }

                    let _ = tx.send(cs).await;
                }
            }
        }
    }
}

/// Push task: forward queued messages to the sink until cancelled.
async fn push_loop(
    pusher: ClientSession<TcpStream>,
    mut rx: mpsc::Receiver<ChunkStream>,
    control: Arc<Control>,
    push_url: String,
) {
    loop {
        tokio::select! {
            _ = control.cancelled() => {
                if let Err(e) = pusher.close().await {
                    trace!("err={}, push url={}", e, push_url);
                }
                return;
            }
            item = rx.recv() => match item {
                Some(mut cs) => {
                    if let Err(e) = pusher.write(&mut cs).await {
                        trace!("err={}, push url={}", e, push_url);
                        control.cancel();
                    }
                }
                None => return,
            }
        }
    }
}
