mod amf;
mod chunk;
mod connection;
mod error;
mod funnel;
mod handshake;
mod io;
mod media;
mod message;
mod protocol;
mod relay;
mod session;
mod slab;
mod stream;
mod utils;

pub use amf::*;
pub use chunk::*;
pub use connection::*;
pub use error::*;
pub use handshake::{HANDSHAKE_SIZE, HANDSHAKE_TIMEOUT, RTMP_VERSION};
pub use io::*;
pub use media::*;
pub use protocol::*;
pub use session::*;
pub use slab::*;
pub use utils::*;

// Message constructors
pub use message::*;

// Outbound plumbing
pub use funnel::{Funnel, Terminal, MAX_QUEUE_LEN};
pub use relay::{Control, Relay};
pub use stream::{PacketReader, PacketWriter};
