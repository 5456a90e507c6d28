pub mod buffer;
pub mod translate;

pub use buffer::{BufferFull, EventBuffer, EventRef};
