use crate::amf::{self, Amf0Value};
use crate::io::{BufferedReader, BufferedWriter};
use crate::protocol::*;
use crate::slab::Slab;
use crate::{Error, Result};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};

/// One RTMP message, and at the same time the per-CSID assembly slot that
/// carries header state between chunks of the same chunk stream.
#[derive(Debug, Default)]
pub struct ChunkStream {
    /// Format of the last chunk that began a header (0..3).
    pub format: u32,
    /// Format of the chunk currently being read.
    pub(crate) format_tmp: u32,
    /// Chunk stream id, 6..22 bits.
    pub csid: u32,
    /// Absolute timestamp in milliseconds.
    pub timestamp: u32,
    /// Total message length in bytes; at most 0xFFFFFF.
    pub length: u32,
    /// Message type id.
    pub type_id: u8,
    /// Message stream id; little-endian on the wire.
    pub stream_id: u32,
    /// Timestamp delta carried by format 1/2 headers.
    pub(crate) time_delta: u32,
    /// Whether the current header used the extended 32-bit timestamp.
    pub(crate) extended: bool,
    /// Bytes already written into `data`.
    index: usize,
    /// Bytes still expected for the current message.
    remain: usize,
    /// Set once the message is fully assembled.
    got: bool,
    /// Message payload, `length` bytes once complete.
    pub data: BytesMut,
}

/// Read one basic header: format bits plus the 1-, 2- or 3-byte CSID.
pub(crate) async fn read_basic_header<R: AsyncRead + Unpin>(
    r: &mut BufferedReader<R>,
) -> Result<(u32, u32)> {
    let basic = r.read_uint_be(1).await?;
    let format = basic >> 6;

    let csid = match basic & 0x3F {
        0 => r.read_uint_le(1).await? + 64,
        1 => r.read_uint_le(2).await? + 64,
        n => n,
    };

    Ok((format, csid))
}

impl ChunkStream {
    pub(crate) fn new(csid: u32) -> Self {
        ChunkStream {
            csid,
            ..ChunkStream::default()
        }
    }

    /// Build an outbound message. The encoder may still remap the CSID by
    /// message type (§ write path).
    pub fn message(csid: u32, type_id: u8, stream_id: u32, timestamp: u32, data: &[u8]) -> Self {
        ChunkStream {
            format: 0,
            csid,
            timestamp,
            length: data.len() as u32,
            type_id,
            stream_id,
            data: BytesMut::from(data),
            ..ChunkStream::default()
        }
    }

    /// Whether the message has been fully assembled.
    pub fn intact(&self) -> bool {
        self.got
    }

    pub(crate) fn set_format_tmp(&mut self, format: u32) {
        self.format_tmp = format;
    }

    /// Move the assembled message out, leaving the slot's carried header
    /// state in place for the next chunk on this CSID.
    pub(crate) fn take_message(&mut self) -> ChunkStream {
        ChunkStream {
            format: self.format,
            format_tmp: self.format_tmp,
            csid: self.csid,
            timestamp: self.timestamp,
            length: self.length,
            type_id: self.type_id,
            stream_id: self.stream_id,
            time_delta: self.time_delta,
            extended: self.extended,
            index: self.index,
            remain: self.remain,
            got: self.got,
            data: std::mem::take(&mut self.data),
        }
    }

    /// Begin a new message body: reset the assembly cursor and take a
    /// buffer from the arena.
    fn new_chunk_data(&mut self, slab: &mut Slab) -> Result<()> {
        if self.length == 0 {
            return Err(Error::protocol("chunk length=0"));
        }

        self.got = false;
        self.index = 0;
        self.remain = self.length as usize;
        self.data = slab.get(self.remain);

        Ok(())
    }

    async fn handle_fmt0<R: AsyncRead + Unpin>(
        &mut self,
        r: &mut BufferedReader<R>,
        slab: &mut Slab,
    ) -> Result<()> {
        self.format = self.format_tmp;

        self.timestamp = r.read_uint_be(3).await?;
        self.length = r.read_uint_be(3).await?;
        self.type_id = r.read_uint_be(1).await? as u8;
        self.stream_id = r.read_uint_le(4).await?;

        if self.timestamp == 0xFF_FFFF {
            self.timestamp = r.read_uint_be(4).await?;
            self.extended = true;
        } else {
            self.extended = false;
        }

        self.new_chunk_data(slab)
    }

    async fn handle_fmt1<R: AsyncRead + Unpin>(
        &mut self,
        r: &mut BufferedReader<R>,
        slab: &mut Slab,
    ) -> Result<()> {
        self.format = self.format_tmp;

        self.time_delta = r.read_uint_be(3).await?;
        self.length = r.read_uint_be(3).await?;
        self.type_id = r.read_uint_be(1).await? as u8;

        if self.time_delta == 0xFF_FFFF {
            self.time_delta = r.read_uint_be(4).await?;
            self.extended = true;
        } else {
            self.extended = false;
        }
        self.timestamp = self.timestamp.wrapping_add(self.time_delta);

        self.new_chunk_data(slab)
    }

    async fn handle_fmt2<R: AsyncRead + Unpin>(
        &mut self,
        r: &mut BufferedReader<R>,
        slab: &mut Slab,
    ) -> Result<()> {
        self.format = self.format_tmp;

        self.time_delta = r.read_uint_be(3).await?;

        if self.time_delta == 0xFF_FFFF {
            self.time_delta = r.read_uint_be(4).await?;
            self.extended = true;
        } else {
            self.extended = false;
        }
        self.timestamp = self.timestamp.wrapping_add(self.time_delta);

        self.new_chunk_data(slab)
    }

    async fn handle_fmt3<R: AsyncRead + Unpin>(
        &mut self,
        r: &mut BufferedReader<R>,
        slab: &mut Slab,
    ) -> Result<()> {
        if self.remain == 0 {
            // This chunk starts a new message; the header repeats the
            // previous one wholesale.
            match self.format {
                0 => {
                    // After a format-0 header the timestamp repeats; with
                    // the extended form it is sent again in full.
                    if self.extended {
                        self.timestamp = r.read_uint_be(4).await?;
                    }
                }
                1 | 2 => {
                    // After format 1/2 the previous delta applies again.
                    let time_delta = if self.extended {
                        r.read_uint_be(4).await?
                    } else {
                        self.time_delta
                    };
                    self.timestamp = self.timestamp.wrapping_add(time_delta);
                }
                _ => {}
            }

            return self.new_chunk_data(slab);
        }

        // Continuation of a partial message. Peers that sent an extended
        // timestamp repeat it before every continuation; peers that do
        // not just send payload. Peek and compare to tell them apart.
        if self.extended {
            let head = r.peek(4).await?;
            let head = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
            if head == self.timestamp {
                r.discard(4);
            }
        }

        Ok(())
    }

    /// Read one chunk worth of header and payload. A message larger than
    /// the chunk size needs several calls before `intact()` turns true.
    pub(crate) async fn read_chunk<R: AsyncRead + Unpin>(
        &mut self,
        r: &mut BufferedReader<R>,
        chunk_size: u32,
        slab: &mut Slab,
    ) -> Result<()> {
        if chunk_size == 0 {
            return Err(Error::protocol("chunk size=0"));
        }

        // Only format 3 may continue a partial message; formats 0..2
        // always open a new one.
        if self.format_tmp != 3 && self.remain != 0 {
            return Err(Error::protocol(format!(
                "invalid chunk remain={}",
                self.remain
            )));
        }

        match self.format_tmp {
            0 => self.handle_fmt0(r, slab).await?,
            1 => self.handle_fmt1(r, slab).await?,
            2 => self.handle_fmt2(r, slab).await?,
            3 => self.handle_fmt3(r, slab).await?,
            other => return Err(Error::protocol(format!("invalid chunk format={}", other))),
        }

        let size = self.remain.min(chunk_size as usize);
        r.read_exact(&mut self.data[self.index..self.index + size])
            .await?;

        self.index += size;
        self.remain -= size;
        if self.remain == 0 {
            self.got = true;
        }

        Ok(())
    }

    async fn write_basic_header<W: AsyncWrite + Unpin>(
        &self,
        w: &mut BufferedWriter<W>,
        format: u32,
        csid: u32,
    ) -> Result<()> {
        let h = format << 6;

        match csid {
            0..=63 => w.write_uint_be(h | csid, 1).await?,
            64..=319 => {
                w.write_uint_be(h, 1).await?;
                w.write_uint_le(csid - 64, 1).await?;
            }
            _ => {
                w.write_uint_be(h | 0x01, 1).await?;
                w.write_uint_le(csid - 64, 2).await?;
            }
        }

        Ok(())
    }

    /// Write one chunk header of the given format. The extended timestamp
    /// is appended whenever the 24-bit field saturates, on continuations
    /// included.
    async fn write_header<W: AsyncWrite + Unpin>(
        &self,
        w: &mut BufferedWriter<W>,
        format: u32,
        csid: u32,
    ) -> Result<()> {
        self.write_basic_header(w, format, csid).await?;

        let ts = self.timestamp.min(0xFF_FFFF);

        if format < 3 {
            w.write_uint_be(ts, 3).await?;

            if format < 2 {
                if self.length > MAX_MESSAGE_LENGTH {
                    return Err(Error::MessageTooLarge(self.length));
                }
                w.write_uint_be(self.length, 3).await?;
                w.write_uint_be(u32::from(self.type_id), 1).await?;

                if format < 1 {
                    w.write_uint_le(self.stream_id, 4).await?;
                }
            }
        }

        if ts >= 0xFF_FFFF {
            w.write_uint_be(self.timestamp, 4).await?;
        }

        Ok(())
    }

    /// Write the whole message: one format-0 header followed by format-3
    /// continuations, each payload slice at most `chunk_size` bytes.
    /// Audio and script messages are pinned to their conventional CSIDs.
    pub(crate) async fn write_chunk<W: AsyncWrite + Unpin>(
        &self,
        w: &mut BufferedWriter<W>,
        chunk_size: u32,
    ) -> Result<()> {
        if chunk_size == 0 {
            return Err(Error::protocol("chunk size=0"));
        }

        let csid = match self.type_id {
            MSG_AUDIO => CSID_AUDIO,
            MSG_VIDEO | MSG_DATA_AMF0 | MSG_DATA_AMF3 => CSID_VIDEO,
            _ => self.csid,
        };

        let chunk_size = chunk_size as usize;
        let length = self.length as usize;
        let mut written = 0usize;

        for i in 0.. {
            if written >= length {
                break;
            }

            let format = if i == 0 { 0 } else { 3 };
            self.write_header(w, format, csid).await?;

            let start = i * chunk_size;
            if start > self.data.len() {
                return Err(Error::protocol("chunk data shorter than length"));
            }
            let end = (start + chunk_size).min(self.data.len());

            w.write_all(&self.data[start..end]).await?;
            written += end - start;
        }

        if written != length {
            return Err(Error::protocol("incomplete chunk"));
        }

        Ok(())
    }

    /// Strip the `@setDataFrame` envelope from a script-data message so
    /// only `onMetaData` and its object travel on. AMF3 bodies are
    /// normalised to AMF0 in the process.
    pub fn unpack(&mut self) -> Result<()> {
        let is_amf3 = match self.type_id {
            MSG_DATA_AMF0 => false,
            MSG_DATA_AMF3 => true,
            _ => return Ok(()),
        };
        if is_amf3 && self.data.len() <= 1 {
            return Err(Error::protocol("incomplete amf3 data message"));
        }

        let offset = usize::from(is_amf3);
        let values = amf::decode_batch(&self.data[offset..])?;

        let stripped = match values.first() {
            Some(Amf0Value::String(name)) if name == SET_DATA_FRAME => {
                amf::encode_batch(&values[1..])?
            }
            _ if is_amf3 => self.data[offset..].to_vec(),
            _ => return Ok(()),
        };

        self.data = BytesMut::from(&stripped[..]);
        self.length = self.data.len() as u32;
        self.type_id = MSG_DATA_AMF0;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf;
    use std::collections::HashMap;

    /// Drive the read side the way the connection does: basic header,
    /// then chunk, until one message is whole.
    async fn read_message(
        data: &[u8],
        chunk_size: u32,
    ) -> Result<ChunkStream> {
        let mut r = BufferedReader::new(data, 1024);
        let mut slab = Slab::new();
        let mut chunks: HashMap<u32, ChunkStream> = HashMap::new();

        loop {
            let (format, csid) = read_basic_header(&mut r).await?;
            let cs = chunks.entry(csid).or_insert_with(|| ChunkStream::new(csid));
            cs.set_format_tmp(format);
            cs.read_chunk(&mut r, chunk_size, &mut slab).await?;
            if cs.intact() {
                return Ok(cs.take_message());
            }
        }
    }

    async fn write_message(cs: &ChunkStream, chunk_size: u32) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut w = BufferedWriter::new(&mut out, 4096);
            cs.write_chunk(&mut w, chunk_size).await.unwrap();
            w.flush().await.unwrap();
        }
        out
    }

    #[tokio::test]
    async fn test_write_single_chunk_bytes() {
        let cs = ChunkStream {
            csid: 3,
            timestamp: 40,
            length: 3,
            type_id: 8,
            data: BytesMut::from(&[0x01, 0x02, 0x03][..]),
            ..ChunkStream::default()
        };

        // Audio is pinned to CSID 4 regardless of the requested CSID.
        let out = write_message(&cs, 128).await;
        assert_eq!(
            out,
            [
                0x04, 0x00, 0x00, 0x28, 0x00, 0x00, 0x03, 0x08, 0x00, 0x00,
                0x00, 0x00, 0x01, 0x02, 0x03,
            ]
        );
    }

    #[tokio::test]
    async fn test_write_two_chunks_length() {
        // 133 bytes at chunk size 128: a 12-byte format-0 header plus 128
        // bytes, then a 1-byte format-3 header plus the 5 remaining.
        let cs = ChunkStream {
            csid: 4,
            timestamp: 40,
            length: 133,
            type_id: 8,
            stream_id: 1,
            data: BytesMut::zeroed(133),
            ..ChunkStream::default()
        };

        let out = write_message(&cs, 128).await;
        assert_eq!(out.len(), 146);
        assert_eq!(out[140], 0xC4);
    }

    #[tokio::test]
    async fn test_round_trip_across_chunk_sizes() {
        for &chunk_size in &[128u32, 1024, 65535] {
            for &len in &[1usize, 127, 128, 129, 65536, 300_000] {
                let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                let cs = ChunkStream::message(6, MSG_VIDEO, 7, 12345, &payload);

                let wire = write_message(&cs, chunk_size).await;
                let got = read_message(&wire, chunk_size).await.unwrap();

                assert_eq!(got.csid, 6, "len={} cs={}", len, chunk_size);
                assert_eq!(got.type_id, MSG_VIDEO);
                assert_eq!(got.stream_id, 7);
                assert_eq!(got.timestamp, 12345);
                assert_eq!(got.length as usize, len);
                assert_eq!(&got.data[..], &payload[..]);
            }
        }
    }

    #[tokio::test]
    async fn test_round_trip_extended_timestamp() {
        let payload = vec![0xABu8; 300];
        let cs = ChunkStream::message(6, MSG_VIDEO, 1, 0x0100_0000, &payload);

        let wire = write_message(&cs, 128).await;
        let got = read_message(&wire, 128).await.unwrap();

        assert_eq!(got.timestamp, 0x0100_0000);
        assert_eq!(got.length, 300);
        assert_eq!(&got.data[..], &payload[..]);
    }

    #[tokio::test]
    async fn test_write_rejects_oversized_length() {
        let cs = ChunkStream {
            csid: 3,
            length: 0x0100_0000,
            type_id: MSG_COMMAND_AMF0,
            data: BytesMut::zeroed(16),
            ..ChunkStream::default()
        };

        let mut out = Vec::new();
        let mut w = BufferedWriter::new(&mut out, 4096);
        let err = cs.write_chunk(&mut w, 128).await.unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge(_)));
    }

    #[tokio::test]
    async fn test_format1_and_format2_deltas() {
        // Format 0 at t=1000, then format 1 with delta 40 and a new
        // length, then format 2 with delta 40 again.
        let mut wire = vec![
            0x06, 0x00, 0x03, 0xE8, 0x00, 0x00, 0x02, 0x09, 0x01, 0x00, 0x00, 0x00, 0xAA, 0xBB,
        ];
        wire.extend_from_slice(&[0x46, 0x00, 0x00, 0x28, 0x00, 0x00, 0x03, 0x09, 0x01, 0x02, 0x03]);
        wire.extend_from_slice(&[0x86, 0x00, 0x00, 0x28, 0x04, 0x05, 0x06]);

        let mut r = BufferedReader::new(&wire[..], 1024);
        let mut slab = Slab::new();
        let mut chunks: HashMap<u32, ChunkStream> = HashMap::new();
        let mut got = Vec::new();

        for _ in 0..3 {
            loop {
                let (format, csid) = read_basic_header(&mut r).await.unwrap();
                let cs = chunks.entry(csid).or_insert_with(|| ChunkStream::new(csid));
                cs.set_format_tmp(format);
                cs.read_chunk(&mut r, 128, &mut slab).await.unwrap();
                if cs.intact() {
                    got.push(cs.take_message());
                    break;
                }
            }
        }

        assert_eq!(got[0].timestamp, 1000);
        assert_eq!(got[0].length, 2);
        assert_eq!(got[1].timestamp, 1040);
        assert_eq!(got[1].length, 3);
        assert_eq!(got[1].stream_id, 1);
        assert_eq!(got[2].timestamp, 1080);
        assert_eq!(got[2].length, 3);
        assert_eq!(&got[2].data[..], &[0x04, 0x05, 0x06]);
    }

    #[tokio::test]
    async fn test_format_continuation_guard() {
        // A format-0 header promising 200 bytes, 128 delivered, then a
        // format-1 header instead of the required format-3 continuation.
        let mut wire = vec![
            0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC8, 0x09, 0x01, 0x00, 0x00, 0x00,
        ];
        wire.extend_from_slice(&vec![0u8; 128]);
        wire.extend_from_slice(&[0x46, 0x00, 0x00, 0x28, 0x00, 0x00, 0x03, 0x09]);

        let mut r = BufferedReader::new(&wire[..], 1024);
        let mut slab = Slab::new();
        let mut cs = ChunkStream::new(6);

        let (format, _) = read_basic_header(&mut r).await.unwrap();
        cs.set_format_tmp(format);
        cs.read_chunk(&mut r, 128, &mut slab).await.unwrap();
        assert!(!cs.intact());

        let (format, _) = read_basic_header(&mut r).await.unwrap();
        cs.set_format_tmp(format);
        let err = cs.read_chunk(&mut r, 128, &mut slab).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn test_unpack_strips_set_data_frame() {
        let mut meta = HashMap::new();
        meta.insert("duration".to_string(), Amf0Value::Number(0.0));

        let body = amf::encode_batch(&[
            Amf0Value::String(SET_DATA_FRAME.into()),
            Amf0Value::String(ON_METADATA.into()),
            Amf0Value::EcmaArray(meta.clone()),
        ])
        .unwrap();

        let mut cs = ChunkStream::message(6, MSG_DATA_AMF0, 1, 0, &body);
        cs.unpack().unwrap();

        let values = amf::decode_batch(&cs.data).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].as_str(), Some(ON_METADATA));
        assert_eq!(values[1], Amf0Value::EcmaArray(meta));
        assert_eq!(cs.length as usize, cs.data.len());
    }

    #[tokio::test]
    async fn test_unpack_leaves_plain_metadata() {
        let body = amf::encode_batch(&[
            Amf0Value::String(ON_METADATA.into()),
            Amf0Value::Null,
        ])
        .unwrap();

        let mut cs = ChunkStream::message(6, MSG_DATA_AMF0, 1, 0, &body);
        cs.unpack().unwrap();
        assert_eq!(&cs.data[..], &body[..]);
    }
}
