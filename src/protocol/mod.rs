//! Protocol magic numbers shared by the codec, the connection layer and
//! the command state machines.

// Message type IDs
pub const MSG_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_ABORT: u8 = 2;
pub const MSG_ACK: u8 = 3;
pub const MSG_USER_CONTROL: u8 = 4;
pub const MSG_WINDOW_ACK_SIZE: u8 = 5;
pub const MSG_SET_PEER_BANDWIDTH: u8 = 6;
pub const MSG_AUDIO: u8 = 8;
pub const MSG_VIDEO: u8 = 9;
pub const MSG_DATA_AMF3: u8 = 15;
pub const MSG_COMMAND_AMF3: u8 = 17;
pub const MSG_DATA_AMF0: u8 = 18;
pub const MSG_COMMAND_AMF0: u8 = 20;

// Chunk stream IDs
pub const CSID_CONTROL: u32 = 2;
pub const CSID_COMMAND: u32 = 3;
pub const CSID_AUDIO: u32 = 4;
pub const CSID_VIDEO: u32 = 6;

// User control event types
pub const EVENT_STREAM_BEGIN: u16 = 0;
pub const EVENT_STREAM_EOF: u16 = 1;
pub const EVENT_STREAM_DRY: u16 = 2;
pub const EVENT_SET_BUFFER_LENGTH: u16 = 3;
pub const EVENT_STREAM_IS_RECORDED: u16 = 4;
pub const EVENT_PING_REQUEST: u16 = 6;
pub const EVENT_PING_RESPONSE: u16 = 7;

// Command names issued by clients
pub const CONNECT: &str = "connect";
pub const CREATE_STREAM: &str = "createStream";
pub const PUBLISH: &str = "publish";
pub const PLAY: &str = "play";
pub const RELEASE_STREAM: &str = "releaseStream";
pub const FC_PUBLISH: &str = "FCPublish";
pub const FC_UNPUBLISH: &str = "FCUnpublish";
pub const GET_STREAM_LENGTH: &str = "getStreamLength";
pub const DELETE_STREAM: &str = "deleteStream";

// Response command names
pub const RESP_RESULT: &str = "_result";
pub const RESP_ERROR: &str = "_error";
pub const ON_STATUS: &str = "onStatus";
pub const ON_BW_DONE: &str = "onBWDone";

// Status levels and codes
pub const LEVEL_STATUS: &str = "status";
pub const LEVEL_WARNING: &str = "warning";
pub const LEVEL_ERROR: &str = "error";
pub const CODE_CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
pub const CODE_PUBLISH_START: &str = "NetStream.Publish.Start";
pub const CODE_PLAY_START: &str = "NetStream.Play.Start";

// Publish types; only "live" is functionally used
pub const PUBLISH_LIVE: &str = "live";
pub const PUBLISH_RECORD: &str = "record";
pub const PUBLISH_APPEND: &str = "append";

// Data message sub-commands
pub const SET_DATA_FRAME: &str = "@setDataFrame";
pub const ON_METADATA: &str = "onMetaData";

pub const FLASH_VER: &str = "FMLE/3.0 (compatible; Lavf58.12.100)";
pub const FMS_VER: &str = "FMS/3,0,1,123";
pub const CAPABILITIES: f64 = 31.0;

// Defaults
pub const DEFAULT_PORT: u16 = 1935;
pub const DEFAULT_CHUNK_SIZE: u32 = 128;
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;
pub const DEFAULT_MAX_MESSAGE_BYTES: u32 = 100 * 1024 * 1024;
pub const CONN_BUF_SIZE: usize = 4 * 1024;

/// Byte counters wrap to zero once they reach this value.
pub const COUNTER_WRAP: u32 = 0xF000_0000;

/// A message length never exceeds the 3-byte header field.
pub const MAX_MESSAGE_LENGTH: u32 = 0xFF_FFFF;
