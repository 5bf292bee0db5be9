use crate::media::{Demuxer, Packet, PacketHeader, PacketKind, Active, Stat};
use crate::protocol::*;
use crate::session::{ConnectInfo, Info, PublishInfo, SessionIo};
use crate::{Error, Result};
use log::trace;

/// Ingest side of a stream: turns the session's message flow into media
/// packets, enforcing the AVC/AAC codec whitelist.
pub struct PacketReader {
    active: Active,
    stat: Stat,
    info: Info,
    flv: Demuxer,
    conn: Box<dyn SessionIo>,
}

impl PacketReader {
    pub fn new(conn: Box<dyn SessionIo>) -> Self {
        let (app, instance) = conn.info();

        PacketReader {
            active: Active::new(),
            stat: Stat::new(),
            info: Info::new(&app, &instance, false),
            flv: Demuxer::new(),
            conn,
        }
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn active(&self) -> &Active {
        &self.active
    }

    pub fn stat(&self) -> &Stat {
        &self.stat
    }

    pub fn publish_info(&self) -> &PublishInfo {
        self.conn.publish_info()
    }

    pub fn connect_info(&self) -> &ConnectInfo {
        self.conn.connect_info()
    }

    /// Read the next media packet, skipping everything that is not
    /// audio, video or script data.
    pub async fn read(&mut self) -> Result<Packet> {
        let (kind, cs) = loop {
            let cs = self.conn.read().await?;
            self.active.keepalive();

            match cs.type_id {
                MSG_VIDEO => break (PacketKind::Video, cs),
                MSG_AUDIO => break (PacketKind::Audio, cs),
                MSG_DATA_AMF0 | MSG_DATA_AMF3 => break (PacketKind::Metadata, cs),
                _ => continue,
            }
        };

        let mut p = Packet::new(kind, cs.timestamp, cs.stream_id, cs.data);
        p.baseline = cs.timestamp.wrapping_add(self.active.base_time());

        self.flv.demux(&mut p)?;

        match p.header {
            Some(PacketHeader::Video(vh)) if !vh.is_codec_avc() => {
                return Err(Error::protocol(format!(
                    "incompatible video codec({})",
                    vh.codec_id
                )));
            }
            Some(PacketHeader::Audio(ah)) if !ah.is_sound_aac() => {
                return Err(Error::protocol(format!(
                    "incompatible audio codec({})",
                    ah.sound_format
                )));
            }
            _ => {}
        }

        self.active.set_media_time(&p);
        self.stat.update(&p);

        Ok(p)
    }

    /// Best-effort teardown; failures only get logged.
    pub async fn close(&mut self) {
        if let Err(e) = self.conn.flush().await {
            trace!("[{}] flush failed: {}", self.info.key, e);
            return;
        }

        if let Err(e) = self.conn.close().await {
            trace!("[{}] close failed: {}", self.info.key, e);
        }
    }
}
