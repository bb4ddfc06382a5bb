use std::collections::HashMap;

use craft_util::Buffer;

use crate::{
    packet::{ServerboundDecode, ServerboundPacket},
    packets::{handshake::Handshake, login::LoginStart, play, status},
    Phase, ProtocolError,
};

type DecodeFn = fn(&mut Buffer) -> Result<ServerboundPacket, ProtocolError>;

struct Entry {
    name: &'static str,
    decode: DecodeFn,
}

/// Mapping `(phase, direction, id) -> decoder`. Populated once at startup
/// with the fixed packet set in the wire contract; lookup afterwards is a
/// pure read. An unmatched `(phase, id)` is reported to the caller as `None`
/// so the connection can silently drop the frame rather than close.
pub struct PacketRegistry {
    serverbound: HashMap<(Phase, i32), Entry>,
}

fn register<P: ServerboundDecode + Into<ServerboundPacket>>(
    map: &mut HashMap<(Phase, i32), Entry>,
    name: &'static str,
) {
    let previous = map.insert(
        (P::PHASE, P::ID),
        Entry {
            name,
            decode: |buf| P::decode(buf).map(Into::into),
        },
    );
    assert!(
        previous.is_none(),
        "duplicate packet registration for {name} ({:?}, {:#x})",
        P::PHASE,
        P::ID
    );
}

impl PacketRegistry {
    pub fn new() -> Self {
        let mut serverbound = HashMap::new();
        register::<Handshake>(&mut serverbound, "Handshake");
        register::<status::StatusRequest>(&mut serverbound, "StatusRequest");
        register::<status::PingRequest>(&mut serverbound, "PingRequest");
        register::<LoginStart>(&mut serverbound, "LoginStart");
        register::<play::KeepAliveServerbound>(&mut serverbound, "KeepAlive");
        register::<play::PlayerPosition>(&mut serverbound, "PlayerPosition");
        Self { serverbound }
    }

    /// Decode a serverbound packet body given the phase it arrived in and
    /// the id read from the frame. `Ok(None)` means the `(phase, id)` pair
    /// has no registered decoder: the caller drops the packet but keeps the
    /// connection open.
    pub fn decode_serverbound(
        &self,
        phase: Phase,
        id: i32,
        buf: &mut Buffer,
    ) -> Result<Option<ServerboundPacket>, ProtocolError> {
        match self.serverbound.get(&(phase, id)) {
            Some(entry) => Ok(Some((entry.decode)(buf)?)),
            None => Ok(None),
        }
    }

    pub fn name_of(&self, phase: Phase, id: i32) -> Option<&'static str> {
        self.serverbound.get(&(phase, id)).map(|e| e.name)
    }
}

impl Default for PacketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_packet_is_none_not_error() {
        let registry = PacketRegistry::new();
        let mut buf = Buffer::new();
        assert!(registry
            .decode_serverbound(Phase::Play, 0x7F, &mut buf)
            .unwrap()
            .is_none());
    }

    #[test]
    fn lookup_is_scoped_to_phase() {
        let registry = PacketRegistry::new();
        assert_eq!(registry.name_of(Phase::Handshaking, 0x00), Some("Handshake"));
        // id 0x00 in STATUS is StatusRequest, a distinct packet from Handshake.
        assert_eq!(registry.name_of(Phase::Status, 0x00), Some("StatusRequest"));
    }
}
