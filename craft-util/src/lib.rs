pub mod buffer;
pub mod iter_retain;
pub mod read_ext;
pub mod transmutable;
pub mod uuid;
pub mod varint;
pub mod worker;

pub use buffer::{Buffer, BufferError};
pub use iter_retain::{retain_returned_hashset, retain_returned_vec};
pub use read_ext::ReadExt;
pub use transmutable::Transmutable;
pub use uuid::Uuid;
pub use worker::WorkerPool;
