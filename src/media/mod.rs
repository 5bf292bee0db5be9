mod flv;
mod packet;
mod stat;

pub use flv::*;
pub use packet::*;
pub use stat::*;
