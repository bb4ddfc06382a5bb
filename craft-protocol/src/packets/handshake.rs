use craft_util::Buffer;

use crate::{packet::ServerboundDecode, Phase, ProtocolError, ServerboundPacket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextState {
    Status,
    Login,
}

impl TryFrom<i32> for NextState {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Status),
            2 => Ok(Self::Login),
            other => Err(ProtocolError::InvalidNextState(other)),
        }
    }
}

/// HS/SB 0x00
#[derive(Debug)]
pub struct Handshake {
    pub protocol_version: i32,
    pub host: String,
    pub port: u16,
    pub next_state: NextState,
}

impl ServerboundDecode for Handshake {
    const PHASE: Phase = Phase::Handshaking;
    const ID: i32 = 0x00;

    fn decode(buf: &mut Buffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            protocol_version: buf.read_varint()?,
            host: buf.read_string()?,
            port: buf.read_u16()?,
            next_state: buf.read_varint()?.try_into()?,
        })
    }
}

impl From<Handshake> for ServerboundPacket {
    fn from(value: Handshake) -> Self {
        ServerboundPacket::Handshake(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_spec_example_handshake() {
        // frame body (id already stripped) for protocol=763, host="localhost", port=25565, next=1
        let body: &[u8] = &[
            0xFB, 0x05, 0x09, b'l', b'o', b'c', b'a', b'l', b'h', b'o', b's', b't', 0x63, 0xDD,
            0x01,
        ];
        let mut buf = Buffer::from_vec(body.to_vec());
        let handshake = Handshake::decode(&mut buf).unwrap();
        assert_eq!(handshake.protocol_version, 763);
        assert_eq!(handshake.host, "localhost");
        assert_eq!(handshake.port, 25565);
        assert_eq!(handshake.next_state, NextState::Status);
    }
}
