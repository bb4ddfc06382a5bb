use craft_util::Buffer;

use crate::{
    packet::{ClientboundEncode, ServerboundDecode},
    BlockPos, Phase, ProtocolError, ServerboundPacket,
};

/// PL/SB 0x12
#[derive(Debug, Clone, Copy)]
pub struct KeepAliveServerbound {
    pub id: i64,
}

impl ServerboundDecode for KeepAliveServerbound {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x12;

    fn decode(buf: &mut Buffer) -> Result<Self, ProtocolError> {
        Ok(Self { id: buf.read_i64()? })
    }
}

impl From<KeepAliveServerbound> for ServerboundPacket {
    fn from(value: KeepAliveServerbound) -> Self {
        ServerboundPacket::KeepAlive(value)
    }
}

/// PL/CB 0x21
#[derive(Debug, Clone, Copy)]
pub struct KeepAliveClientbound {
    pub id: i64,
}

impl ClientboundEncode for KeepAliveClientbound {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x21;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        buf.write_i64(self.id);
        Ok(())
    }
}

/// PL/SB 0x14
#[derive(Debug, Clone, Copy)]
pub struct PlayerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub on_ground: bool,
}

impl ServerboundDecode for PlayerPosition {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x14;

    fn decode(buf: &mut Buffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            x: buf.read_f64()?,
            y: buf.read_f64()?,
            z: buf.read_f64()?,
            on_ground: buf.read_bool()?,
        })
    }
}

impl From<PlayerPosition> for ServerboundPacket {
    fn from(value: PlayerPosition) -> Self {
        ServerboundPacket::PlayerPosition(value)
    }
}

/// PL/CB 0x26
#[derive(Debug, Clone)]
pub struct JoinGame {
    pub entity_id: i32,
    pub hardcore: bool,
    pub gamemode: u8,
    pub previous_gamemode: u8,
    pub worlds: Vec<String>,
    pub dimension_type: String,
    pub dimension_name: String,
    pub seed: i64,
    pub max_players: i32,
    pub view_distance: i32,
    pub simulation_distance: i32,
    pub reduced_debug_info: bool,
    pub enable_respawn_screen: bool,
    pub is_debug: bool,
    pub is_flat: bool,
    pub has_death_location: bool,
}

impl ClientboundEncode for JoinGame {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x26;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        buf.write_i32(self.entity_id);
        buf.write_bool(self.hardcore);
        buf.write_u8(self.gamemode);
        buf.write_u8(self.previous_gamemode);
        buf.write_varint(self.worlds.len() as i32);
        for world in &self.worlds {
            buf.write_string(world);
        }
        buf.write_string(&self.dimension_type);
        buf.write_string(&self.dimension_name);
        buf.write_i64(self.seed);
        buf.write_varint(self.max_players);
        buf.write_varint(self.view_distance);
        buf.write_varint(self.simulation_distance);
        buf.write_bool(self.reduced_debug_info);
        buf.write_bool(self.enable_respawn_screen);
        buf.write_bool(self.is_debug);
        buf.write_bool(self.is_flat);
        buf.write_bool(self.has_death_location);
        Ok(())
    }
}

/// PL/CB 0x3C
#[derive(Debug, Clone, Copy)]
pub struct PlayerPositionAndLook {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub flags: u8,
    pub teleport_id: i32,
    pub dismount_vehicle: bool,
}

impl ClientboundEncode for PlayerPositionAndLook {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x3C;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        buf.write_f64(self.x);
        buf.write_f64(self.y);
        buf.write_f64(self.z);
        buf.write_f32(self.yaw);
        buf.write_f32(self.pitch);
        buf.write_u8(self.flags);
        buf.write_varint(self.teleport_id);
        buf.write_bool(self.dismount_vehicle);
        Ok(())
    }
}

/// PL/CB 0x24. `data` is the pre-encoded chunk section payload (see
/// `craft-world`'s chunk serializer); `block_entities` are packed positions,
/// empty for the flat generator.
#[derive(Debug, Clone)]
pub struct ChunkData {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub data: Vec<u8>,
    pub block_entities: Vec<u64>,
}

impl ClientboundEncode for ChunkData {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x24;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        buf.write_i32(self.chunk_x);
        buf.write_i32(self.chunk_z);
        buf.write_varint(self.data.len() as i32);
        buf.write_bytes(&self.data);
        buf.write_varint(self.block_entities.len() as i32);
        for packed in &self.block_entities {
            buf.write_u64(*packed);
        }
        Ok(())
    }
}

/// PL/CB 0x1D
#[derive(Debug, Clone, Copy)]
pub struct UnloadChunk {
    pub chunk_x: i32,
    pub chunk_z: i32,
}

impl ClientboundEncode for UnloadChunk {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x1D;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        buf.write_i32(self.chunk_x);
        buf.write_i32(self.chunk_z);
        Ok(())
    }
}

/// PL/CB 0x4E
#[derive(Debug, Clone, Copy)]
pub struct UpdateViewPosition {
    pub chunk_x: i32,
    pub chunk_z: i32,
}

impl ClientboundEncode for UpdateViewPosition {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x4E;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        buf.write_varint(self.chunk_x);
        buf.write_varint(self.chunk_z);
        Ok(())
    }
}

/// PL/CB 0x0C
#[derive(Debug, Clone, Copy)]
pub struct BlockChange {
    pub position: BlockPos,
    pub block_state: i32,
}

impl ClientboundEncode for BlockChange {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x0C;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        self.position.write(buf);
        buf.write_varint(self.block_state);
        Ok(())
    }
}

/// One changed block inside a `MultiBlockChange`, expressed as local section
/// coordinates plus the new block state id.
#[derive(Debug, Clone, Copy)]
pub struct MultiBlockChangeEntry {
    pub local_x: u8,
    pub local_y: u8,
    pub local_z: u8,
    pub block_state: i32,
}

impl MultiBlockChangeEntry {
    fn pack(&self) -> i64 {
        ((self.block_state as i64) << 12)
            | ((self.local_x as i64) << 8)
            | ((self.local_z as i64) << 4)
            | (self.local_y as i64)
    }
}

/// PL/CB 0x10. `section_x/y/z` identify the 16-block-cube chunk section the
/// batched changes fall in.
#[derive(Debug, Clone)]
pub struct MultiBlockChange {
    pub section_x: i32,
    pub section_y: i32,
    pub section_z: i32,
    pub changes: Vec<MultiBlockChangeEntry>,
}

impl ClientboundEncode for MultiBlockChange {
    const PHASE: Phase = Phase::Play;
    const ID: i32 = 0x10;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        let packed_section = (((self.section_x as i64) & 0x3FFFFF) << 42)
            | (((self.section_y as i64) & 0xFFFFF) << 20)
            | ((self.section_z as i64) & 0x3FFFFF);
        buf.write_u64(packed_section as u64);
        buf.write_varint(self.changes.len() as i32);
        for entry in &self.changes {
            buf.write_varlong(entry.pack());
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keep_alive_serverbound_decode() {
        let mut buf = Buffer::new();
        buf.write_i64(1234567890);
        let packet = KeepAliveServerbound::decode(&mut buf).unwrap();
        assert_eq!(packet.id, 1234567890);
    }

    #[test]
    fn keep_alive_clientbound_encode() {
        let mut buf = Buffer::new();
        KeepAliveClientbound { id: 42 }.encode(&mut buf).unwrap();
        assert_eq!(buf.read_i64().unwrap(), 42);
    }

    #[test]
    fn chunk_data_frames_length_prefixed_payload() {
        let chunk = ChunkData {
            chunk_x: 3,
            chunk_z: -1,
            data: vec![1, 2, 3, 4],
            block_entities: vec![],
        };
        let mut buf = Buffer::new();
        chunk.encode(&mut buf).unwrap();
        assert_eq!(buf.read_i32().unwrap(), 3);
        assert_eq!(buf.read_i32().unwrap(), -1);
        assert_eq!(buf.read_varint().unwrap(), 4);
        assert_eq!(buf.read_bytes(4).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(buf.read_varint().unwrap(), 0);
    }

    #[test]
    fn multi_block_change_packs_section_and_entries() {
        let packet = MultiBlockChange {
            section_x: 1,
            section_y: -2,
            section_z: 3,
            changes: vec![MultiBlockChangeEntry {
                local_x: 5,
                local_y: 6,
                local_z: 7,
                block_state: 99,
            }],
        };
        let mut buf = Buffer::new();
        packet.encode(&mut buf).unwrap();
        let section = buf.read_u64().unwrap();
        assert_eq!((section >> 42) & 0x3FFFFF, 1);
        assert_eq!((section >> 20) & 0xFFFFF, (-2i64 as u64) & 0xFFFFF);
        assert_eq!(section & 0x3FFFFF, 3);
        assert_eq!(buf.read_varint().unwrap(), 1);
        assert_eq!(buf.read_varlong().unwrap(), (99i64 << 12) | (5 << 8) | (7 << 4) | 6);
    }
}
