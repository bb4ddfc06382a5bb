pub mod error;
pub mod packet;
pub mod packets;
pub mod phase;
pub mod position;
pub mod registry;

pub use error::ProtocolError;
pub use packet::{ClientboundEncode, ServerboundDecode, ServerboundPacket};
pub use phase::{Direction, Phase, GAME_VERSION, PROTOCOL_VERSION};
pub use position::BlockPos;
pub use registry::PacketRegistry;
