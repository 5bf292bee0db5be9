//! Keep-alive and byte-rate bookkeeping shared between the packet
//! reader and the funnel consumer.

use crate::media::{Packet, PacketKind};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

/// Liveness and time-base tracking for one direction of a stream.
pub struct Active {
    started: Instant,
    /// Milliseconds since `started` of the last IO activity.
    last_active_ms: AtomicU64,
    /// Offset added to packet timestamps for this subscriber.
    base_time: AtomicU32,
    /// Media timestamp of the newest packet seen.
    media_time: AtomicU32,
}

impl Default for Active {
    fn default() -> Self {
        Active::new()
    }
}

impl Active {
    pub fn new() -> Self {
        Active {
            started: Instant::now(),
            last_active_ms: AtomicU64::new(0),
            base_time: AtomicU32::new(0),
            media_time: AtomicU32::new(0),
        }
    }

    /// Record IO activity now.
    pub fn keepalive(&self) {
        let ms = self.started.elapsed().as_millis() as u64;
        self.last_active_ms.store(ms, Ordering::Relaxed);
    }

    /// True when nothing happened for `timeout_ms`.
    pub fn is_timeout(&self, timeout_ms: u64) -> bool {
        let now = self.started.elapsed().as_millis() as u64;
        now.saturating_sub(self.last_active_ms.load(Ordering::Relaxed)) > timeout_ms
    }

    pub fn base_time(&self) -> u32 {
        self.base_time.load(Ordering::Relaxed)
    }

    /// Re-base the subscriber clock onto the newest media time.
    pub fn rebase_time(&self) {
        self.base_time
            .store(self.media_time.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    pub fn set_media_time(&self, p: &Packet) {
        self.media_time.store(p.timestamp, Ordering::Relaxed);
    }

    pub fn media_time(&self) -> u32 {
        self.media_time.load(Ordering::Relaxed)
    }
}

/// Byte counters per media kind with coarse bits-per-second readouts.
pub struct Stat {
    started: Instant,
    video_bytes: AtomicU64,
    audio_bytes: AtomicU64,
}

impl Default for Stat {
    fn default() -> Self {
        Stat::new()
    }
}

impl Stat {
    pub fn new() -> Self {
        Stat {
            started: Instant::now(),
            video_bytes: AtomicU64::new(0),
            audio_bytes: AtomicU64::new(0),
        }
    }

    pub fn update(&self, p: &Packet) {
        let len = p.data.len() as u64;
        match p.kind {
            PacketKind::Video => {
                self.video_bytes.fetch_add(len, Ordering::Relaxed);
            }
            PacketKind::Audio => {
                self.audio_bytes.fetch_add(len, Ordering::Relaxed);
            }
            PacketKind::Metadata => {}
        }
    }

    pub fn video_bytes(&self) -> u64 {
        self.video_bytes.load(Ordering::Relaxed)
    }

    pub fn audio_bytes(&self) -> u64 {
        self.audio_bytes.load(Ordering::Relaxed)
    }

    pub fn video_bps(&self) -> u64 {
        self.bps(self.video_bytes())
    }

    pub fn audio_bps(&self) -> u64 {
        self.bps(self.audio_bytes())
    }

    fn bps(&self, bytes: u64) -> u64 {
        let secs = self.started.elapsed().as_secs().max(1);
        bytes / secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_stat_counts_by_kind() {
        let stat = Stat::new();

        stat.update(&Packet::new(PacketKind::Video, 0, 1, BytesMut::zeroed(100)));
        stat.update(&Packet::new(PacketKind::Audio, 0, 1, BytesMut::zeroed(40)));
        stat.update(&Packet::new(PacketKind::Metadata, 0, 1, BytesMut::zeroed(7)));

        assert_eq!(stat.video_bytes(), 100);
        assert_eq!(stat.audio_bytes(), 40);
    }

    #[test]
    fn test_active_rebase() {
        let active = Active::new();
        let p = Packet::new(PacketKind::Video, 5000, 1, BytesMut::new());

        active.set_media_time(&p);
        assert_eq!(active.base_time(), 0);

        active.rebase_time();
        assert_eq!(active.base_time(), 5000);
    }

    #[test]
    fn test_keepalive_clears_timeout() {
        let active = Active::new();
        active.keepalive();
        assert!(!active.is_timeout(60_000));
    }
}
