//! Protocol-control message constructors. All ride CSID 2 on message
//! stream 0 with a format-0 header.

use crate::chunk::ChunkStream;
use crate::protocol::*;

fn control_message(type_id: u8, size: usize, value: u32) -> ChunkStream {
    let mut data = vec![0u8; size];
    data[..4].copy_from_slice(&value.to_be_bytes());

    ChunkStream::message(CSID_CONTROL, type_id, 0, 0, &data)
}

/// Set Chunk Size (1).
pub fn set_chunk_size(size: u32) -> ChunkStream {
    control_message(MSG_SET_CHUNK_SIZE, 4, size)
}

/// Abort Message (2), naming the CSID whose partial message to drop.
pub fn abort(csid: u32) -> ChunkStream {
    control_message(MSG_ABORT, 4, csid)
}

/// Acknowledgement (3), carrying the received byte count.
pub fn acknowledgement(value: u32) -> ChunkStream {
    control_message(MSG_ACK, 4, value)
}

/// Window Acknowledgement Size (5).
pub fn window_ack_size(size: u32) -> ChunkStream {
    control_message(MSG_WINDOW_ACK_SIZE, 4, size)
}

/// Set Peer Bandwidth (6); the limit type defaults to Dynamic.
pub fn set_peer_bandwidth(size: u32) -> ChunkStream {
    let mut cs = control_message(MSG_SET_PEER_BANDWIDTH, 5, size);
    cs.data[4] = 2;
    cs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_message_shape() {
        let cs = set_chunk_size(4096);
        assert_eq!(cs.csid, CSID_CONTROL);
        assert_eq!(cs.stream_id, 0);
        assert_eq!(cs.type_id, MSG_SET_CHUNK_SIZE);
        assert_eq!(cs.length, 4);
        assert_eq!(&cs.data[..], &[0x00, 0x00, 0x10, 0x00]);
    }

    #[test]
    fn test_acknowledgement_value() {
        let cs = acknowledgement(0x0102_0304);
        assert_eq!(cs.type_id, MSG_ACK);
        assert_eq!(&cs.data[..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_set_peer_bandwidth_trailer() {
        let cs = set_peer_bandwidth(2_500_000);
        assert_eq!(cs.length, 5);
        assert_eq!(cs.data[4], 2);
        assert_eq!(&cs.data[..4], &2_500_000u32.to_be_bytes());
    }

    #[test]
    fn test_abort_names_csid() {
        let cs = abort(6);
        assert_eq!(cs.type_id, MSG_ABORT);
        assert_eq!(&cs.data[..], &[0x00, 0x00, 0x00, 0x06]);
    }
}
