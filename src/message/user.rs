//! User-control (type 4) message constructors. These ride CSID 2 like
//! the protocol controls, but on message stream 1.

use crate::chunk::ChunkStream;
use crate::protocol::*;

/// Event type plus `payload_len` bytes of event data.
fn user_control(event: u16, payload_len: usize) -> ChunkStream {
    let mut data = vec![0u8; payload_len + 2];
    data[..2].copy_from_slice(&event.to_be_bytes());

    ChunkStream::message(CSID_CONTROL, MSG_USER_CONTROL, 1, 0, &data)
}

/// Stream Begin: the named stream is ready for traffic.
pub fn stream_begin(stream_id: u32) -> ChunkStream {
    let mut cs = user_control(EVENT_STREAM_BEGIN, 4);
    cs.data[2..6].copy_from_slice(&stream_id.to_be_bytes());
    cs
}

/// Stream EOF: playback data on the named stream is exhausted.
pub fn stream_eof(stream_id: u32) -> ChunkStream {
    let mut cs = user_control(EVENT_STREAM_EOF, 4);
    cs.data[2..6].copy_from_slice(&stream_id.to_be_bytes());
    cs
}

/// Stream Dry: no more data on the named stream for now.
pub fn stream_dry(stream_id: u32) -> ChunkStream {
    let mut cs = user_control(EVENT_STREAM_DRY, 4);
    cs.data[2..6].copy_from_slice(&stream_id.to_be_bytes());
    cs
}

/// Set Buffer Length: stream id plus the client's buffer in milliseconds.
pub fn set_buffer_length(stream_id: u32, buffer_ms: u32) -> ChunkStream {
    let mut cs = user_control(EVENT_SET_BUFFER_LENGTH, 8);
    cs.data[2..6].copy_from_slice(&stream_id.to_be_bytes());
    cs.data[6..10].copy_from_slice(&buffer_ms.to_be_bytes());
    cs
}

/// Stream Is Recorded: the named stream is a recorded one.
pub fn stream_is_recorded(stream_id: u32) -> ChunkStream {
    let mut cs = user_control(EVENT_STREAM_IS_RECORDED, 4);
    cs.data[2..6].copy_from_slice(&stream_id.to_be_bytes());
    cs
}

/// Ping Request carrying the sender's timestamp.
pub fn ping_request(timestamp: u32) -> ChunkStream {
    let mut cs = user_control(EVENT_PING_REQUEST, 4);
    cs.data[2..6].copy_from_slice(&timestamp.to_be_bytes());
    cs
}

/// Ping Response echoing the request's timestamp.
pub fn ping_response(timestamp: u32) -> ChunkStream {
    let mut cs = user_control(EVENT_PING_RESPONSE, 4);
    cs.data[2..6].copy_from_slice(&timestamp.to_be_bytes());
    cs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_begin_wire() {
        let cs = stream_begin(1);
        assert_eq!(cs.csid, CSID_CONTROL);
        assert_eq!(cs.type_id, MSG_USER_CONTROL);
        assert_eq!(cs.stream_id, 1);
        assert_eq!(cs.length, 6);
        assert_eq!(&cs.data[..], &[0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_set_buffer_length_wire() {
        let cs = set_buffer_length(1, 3000);
        assert_eq!(cs.length, 10);
        assert_eq!(&cs.data[..2], &[0x00, 0x03]);
        assert_eq!(&cs.data[2..6], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&cs.data[6..10], &3000u32.to_be_bytes());
    }

    #[test]
    fn test_ping_events() {
        let req = ping_request(0xDEAD_BEEF);
        assert_eq!(&req.data[..2], &[0x00, 0x06]);
        assert_eq!(&req.data[2..6], &0xDEAD_BEEFu32.to_be_bytes());

        let rsp = ping_response(0xDEAD_BEEF);
        assert_eq!(&rsp.data[..2], &[0x00, 0x07]);
        assert_eq!(&rsp.data[2..6], &0xDEAD_BEEFu32.to_be_bytes());
    }
}
