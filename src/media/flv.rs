//! The sliver of FLV this crate needs: the tag's first byte names the
//! codec, and the transport only forwards AVC video and AAC audio.

use crate::media::{AudioHeader, Packet, PacketHeader, PacketKind, VideoHeader};
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct Demuxer;

impl Demuxer {
    pub fn new() -> Self {
        Demuxer
    }

    /// Parse the packet's leading byte into its media header. Metadata
    /// packets pass through untouched.
    pub fn demux(&self, p: &mut Packet) -> Result<()> {
        match p.kind {
            PacketKind::Metadata => Ok(()),
            PacketKind::Video => {
                let tag = *p
                    .data
                    .first()
                    .ok_or_else(|| Error::protocol("empty video payload"))?;
                p.header = Some(PacketHeader::Video(VideoHeader {
                    frame_type: tag >> 4,
                    codec_id: tag & 0x0F,
                }));
                Ok(())
            }
            PacketKind::Audio => {
                let tag = *p
                    .data
                    .first()
                    .ok_or_else(|| Error::protocol("empty audio payload"))?;
                p.header = Some(PacketHeader::Audio(AudioHeader {
                    sound_format: tag >> 4,
                    sound_rate: (tag >> 2) & 0x03,
                    sound_size: (tag >> 1) & 0x01,
                    sound_type: tag & 0x01,
                }));
                Ok(())
            }
        }
    }
}
