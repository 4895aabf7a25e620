mod ring_bytes;
mod text;

pub use ring_bytes::RingBytes;
pub use text::{preview, truncate_tail, truncate_to};
