use bytes::BytesMut;

/// Media message kind, mapped from the RTMP message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Audio,
    Video,
    Metadata,
}

/// Parsed leading byte of a video payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoHeader {
    pub frame_type: u8,
    pub codec_id: u8,
}

impl VideoHeader {
    pub fn is_key_frame(&self) -> bool {
        self.frame_type == 1
    }

    /// AVC / H.264 carries codec id 7 in FLV.
    pub fn is_codec_avc(&self) -> bool {
        self.codec_id == 7
    }
}

/// Parsed leading byte of an audio payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioHeader {
    pub sound_format: u8,
    pub sound_rate: u8,
    pub sound_size: u8,
    pub sound_type: u8,
}

impl AudioHeader {
    /// AAC carries sound format 10 in FLV.
    pub fn is_sound_aac(&self) -> bool {
        self.sound_format == 10
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketHeader {
    Video(VideoHeader),
    Audio(AudioHeader),
}

/// One media unit travelling between sessions, queues and terminals.
#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    /// Timestamp as carried on the wire.
    pub timestamp: u32,
    /// Timestamp re-based for the receiving subscriber.
    pub baseline: u32,
    pub stream_id: u32,
    /// Demuxed header, filled by `flv::Demuxer`.
    pub header: Option<PacketHeader>,
    pub data: BytesMut,
}

impl Packet {
    pub fn new(kind: PacketKind, timestamp: u32, stream_id: u32, data: BytesMut) -> Self {
        Packet {
            kind,
            timestamp,
            baseline: timestamp,
            stream_id,
            header: None,
            data,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == PacketKind::Video
    }

    pub fn is_audio(&self) -> bool {
        self.kind == PacketKind::Audio
    }

    pub fn is_metadata(&self) -> bool {
        self.kind == PacketKind::Metadata
    }
}
