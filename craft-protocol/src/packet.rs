use craft_util::Buffer;

use crate::{Phase, ProtocolError};

/// A packet the client sends to the server. Implementors are `enum`
/// variants collected into [`ServerboundPacket`]; the registry dispatches on
/// `(PHASE, ID)` to find the right decoder.
pub trait ServerboundDecode: Sized {
    const PHASE: Phase;
    const ID: i32;

    fn decode(buf: &mut Buffer) -> Result<Self, ProtocolError>;
}

/// A packet the server sends to the client. `encode` writes only the packet
/// body; the connection's writer adds the `VarInt(id)` prefix and the outer
/// length-prefixed frame.
pub trait ClientboundEncode {
    const PHASE: Phase;
    const ID: i32;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError>;
}

/// One decoded serverbound packet, tagged with the phase it was read in.
/// The registry only ever constructs variants matching the (phase, id) under
/// which they were looked up.
#[derive(Debug)]
pub enum ServerboundPacket {
    Handshake(crate::packets::handshake::Handshake),
    StatusRequest(crate::packets::status::StatusRequest),
    PingRequest(crate::packets::status::PingRequest),
    LoginStart(crate::packets::login::LoginStart),
    KeepAlive(crate::packets::play::KeepAliveServerbound),
    PlayerPosition(crate::packets::play::PlayerPosition),
}
