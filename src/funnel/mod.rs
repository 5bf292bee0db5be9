//! The funnel: a bounded single-producer queue in front of one
//! subscriber's write loop. Producers never block; the consumer task
//! owns the terminal and runs its before/after hooks around the drain.

use crate::media::{Active, Packet, Stat};
use crate::session::Info;
use crate::{Error, Result};
use async_trait::async_trait;
use log::{debug, error};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Queue depth; must stay above 1 so the close sentinel always has a
/// reserved slot in the write check.
pub const MAX_QUEUE_LEN: usize = 4096;

/// The downstream end of a funnel. Terminal order per consumer:
/// `before()`, then `write()` per packet, then `after()`.
#[async_trait]
pub trait Terminal: Send {
    fn info(&self) -> &Info;
    fn name(&self) -> &'static str;

    async fn before(&mut self) {}
    async fn after(&mut self) {}

    /// Forward one packet. An error is unrecoverable and ends the drain.
    async fn write(&mut self, pkt: &Packet) -> Result<()>;
}

pub struct Funnel {
    tx: mpsc::Sender<Option<Packet>>,
    closed: Arc<AtomicBool>,
    active: Arc<Active>,
    stat: Arc<Stat>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Funnel {
    pub fn new(terminal: Box<dyn Terminal>) -> Self {
        let (tx, rx) = mpsc::channel(MAX_QUEUE_LEN);
        let closed = Arc::new(AtomicBool::new(false));
        let active = Arc::new(Active::new());
        let stat = Arc::new(Stat::new());

        let handle = tokio::spawn(drain(
            terminal,
            rx,
            closed.clone(),
            active.clone(),
            stat.clone(),
        ));

        Funnel {
            tx,
            closed,
            active,
            stat,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Enqueue one packet without blocking.
    pub fn write(&self, pkt: Packet) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Cancelled);
        }

        // One slot stays reserved for the close sentinel.
        if self.tx.capacity() <= 1 {
            return Err(Error::Saturated);
        }

        self.tx.try_send(Some(pkt)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::Saturated,
            mpsc::error::TrySendError::Closed(_) => Error::Cancelled,
        })
    }

    /// Idempotent. The nil sentinel, rather than closing the channel,
    /// lets packets already enqueued drain before the consumer exits.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if self.tx.try_send(None).is_err() {
            error!("close funnel failed, because queue is saturated");
        }
    }

    /// Block until the consumer has exited.
    pub async fn wait(&self) {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn active(&self) -> &Active {
        &self.active
    }

    pub fn stat(&self) -> &Stat {
        &self.stat
    }
}

async fn drain(
    mut terminal: Box<dyn Terminal>,
    mut rx: mpsc::Receiver<Option<Packet>>,
    closed: Arc<AtomicBool>,
    active: Arc<Active>,
    stat: Arc<Stat>,
) {
    terminal.before().await;

    loop {
        let mut pkt = match rx.recv().await {
            Some(Some(pkt)) => pkt,
            // The sentinel or a dropped producer both end the drain.
            Some(None) | None => break,
        };

        // pts = dts + baseline
        pkt.baseline = pkt.timestamp.wrapping_add(active.base_time());

        if let Err(e) = terminal.write(&pkt).await {
            debug!("funnel terminal write failed: {}", e);
            closed.store(true, Ordering::Release);
            break;
        }

        active.keepalive();
        active.set_media_time(&pkt);
        stat.update(&pkt);
    }

    terminal.after().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PacketKind;
    use bytes::BytesMut;
    use tokio::sync::Semaphore;

    struct TestTerminal {
        info: Info,
        gate: Arc<Semaphore>,
        written: Arc<std::sync::Mutex<Vec<usize>>>,
        before: Arc<AtomicBool>,
        after: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Terminal for TestTerminal {
        fn info(&self) -> &Info {
            &self.info
        }

        fn name(&self) -> &'static str {
            "test"
        }

        async fn before(&mut self) {
            self.before.store(true, Ordering::SeqCst);
        }

        async fn after(&mut self) {
            self.after.store(true, Ordering::SeqCst);
        }

        async fn write(&mut self, pkt: &Packet) -> Result<()> {
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            self.written.lock().unwrap().push(pkt.data.len());
            Ok(())
        }
    }

    fn test_funnel(permits: usize) -> (Funnel, Arc<Semaphore>, Arc<std::sync::Mutex<Vec<usize>>>, Arc<AtomicBool>, Arc<AtomicBool>) {
        let gate = Arc::new(Semaphore::new(permits));
        let written = Arc::new(std::sync::Mutex::new(Vec::new()));
        let before = Arc::new(AtomicBool::new(false));
        let after = Arc::new(AtomicBool::new(false));

        let terminal = TestTerminal {
            info: Info::new("t_app", "t_ins", false),
            gate: gate.clone(),
            written: written.clone(),
            before: before.clone(),
            after: after.clone(),
        };

        (Funnel::new(Box::new(terminal)), gate, written, before, after)
    }

    fn packet(len: usize) -> Packet {
        Packet::new(PacketKind::Video, 0, 1, BytesMut::zeroed(len))
    }

    #[tokio::test]
    async fn test_write_then_drain() {
        let (funnel, _gate, written, before, after) = test_funnel(usize::MAX >> 4);

        funnel.write(packet(1024)).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(before.load(Ordering::SeqCst));
        assert!(!after.load(Ordering::SeqCst));

        funnel.close();
        funnel.wait().await;

        assert_eq!(written.lock().unwrap().as_slice(), &[1024]);
        assert!(after.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_saturation_preserves_queued_packets() {
        // Consumer stuck on the gate: the queue fills up.
        let (funnel, gate, written, _before, _after) = test_funnel(0);

        let mut accepted = 0usize;
        let mut saturated = false;
        for _ in 0..MAX_QUEUE_LEN + 2 {
            match funnel.write(packet(8)) {
                Ok(()) => accepted += 1,
                Err(Error::Saturated) => {
                    saturated = true;
                    break;
                }
                Err(e) => panic!("unexpected error {}", e),
            }
        }

        assert!(saturated);
        // The consumer may have pulled at most one packet off while the
        // queue filled.
        assert!(accepted >= MAX_QUEUE_LEN - 2, "accepted={}", accepted);

        // Unblock the consumer; everything accepted must drain.
        gate.add_permits(accepted);
        funnel.close();
        funnel.wait().await;

        assert_eq!(written.lock().unwrap().len(), accepted);
    }

    #[tokio::test]
    async fn test_write_after_close_is_cancelled() {
        let (funnel, _gate, _written, _before, _after) = test_funnel(16);

        funnel.close();
        let err = funnel.write(packet(8)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        funnel.close(); // idempotent
        funnel.wait().await;
    }

    #[tokio::test]
    async fn test_baseline_rebased_on_drain() {
        let (funnel, _gate, written, _before, _after) = test_funnel(16);

        funnel.active().set_media_time(&Packet::new(
            PacketKind::Video,
            5000,
            1,
            BytesMut::new(),
        ));
        funnel.active().rebase_time();

        funnel.write(packet(3)).unwrap();
        funnel.close();
        funnel.wait().await;

        assert_eq!(written.lock().unwrap().len(), 1);
        assert_eq!(funnel.active().base_time(), 5000);
    }
}
