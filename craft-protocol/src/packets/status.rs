use craft_util::Buffer;
use serde::Serialize;

use crate::{
    packet::{ClientboundEncode, ServerboundDecode},
    Phase, ProtocolError, ServerboundPacket,
};

/// ST/SB 0x00
#[derive(Debug)]
pub struct StatusRequest;

impl ServerboundDecode for StatusRequest {
    const PHASE: Phase = Phase::Status;
    const ID: i32 = 0x00;

    fn decode(_buf: &mut Buffer) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

impl From<StatusRequest> for ServerboundPacket {
    fn from(value: StatusRequest) -> Self {
        ServerboundPacket::StatusRequest(value)
    }
}

#[derive(Serialize)]
struct ResponseVersion {
    name: &'static str,
    protocol: i32,
}

#[derive(Serialize)]
struct ResponsePlayers {
    max: u32,
    online: u32,
}

#[derive(Serialize)]
struct ResponseDescription {
    text: String,
}

/// ST/CB 0x00. Built through `serde_json` rather than string concatenation,
/// so a MOTD containing a `"` can't break the document (spec Open Question).
#[derive(Serialize)]
pub struct StatusResponse {
    version: ResponseVersion,
    players: ResponsePlayers,
    description: ResponseDescription,
    favicon: String,
}

impl StatusResponse {
    pub fn new(motd: impl Into<String>, max_players: u32, online: u32) -> Self {
        Self {
            version: ResponseVersion {
                name: crate::GAME_VERSION,
                protocol: crate::PROTOCOL_VERSION,
            },
            players: ResponsePlayers {
                max: max_players,
                online,
            },
            description: ResponseDescription { text: motd.into() },
            favicon: String::new(),
        }
    }
}

impl ClientboundEncode for StatusResponse {
    const PHASE: Phase = Phase::Status;
    const ID: i32 = 0x00;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        let json = serde_json::to_string(self)
            .expect("StatusResponse fields are all JSON-serializable");
        buf.write_string(&json);
        Ok(())
    }
}

/// ST/SB 0x01 and ST/CB 0x01 share a body shape (an echoed `i64` payload).
#[derive(Debug, Clone, Copy)]
pub struct PingRequest {
    pub payload: i64,
}

impl ServerboundDecode for PingRequest {
    const PHASE: Phase = Phase::Status;
    const ID: i32 = 0x01;

    fn decode(buf: &mut Buffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            payload: buf.read_i64()?,
        })
    }
}

impl From<PingRequest> for ServerboundPacket {
    fn from(value: PingRequest) -> Self {
        ServerboundPacket::PingRequest(value)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PingResponse {
    pub payload: i64,
}

impl ClientboundEncode for PingResponse {
    const PHASE: Phase = Phase::Status;
    const ID: i32 = 0x01;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        buf.write_i64(self.payload);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_response_json_shape() {
        let response = StatusResponse::new("A server", 20, 0);
        let mut buf = Buffer::new();
        response.encode(&mut buf).unwrap();
        let json = buf.read_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"]["name"], "1.20.1");
        assert_eq!(value["version"]["protocol"], 763);
    }

    #[test]
    fn motd_with_quotes_does_not_break_json() {
        let response = StatusResponse::new(r#"a "quoted" motd"#, 20, 0);
        let mut buf = Buffer::new();
        response.encode(&mut buf).unwrap();
        let json = buf.read_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["description"]["text"], r#"a "quoted" motd"#);
    }

    #[test]
    fn ping_echoes_payload() {
        let mut buf = Buffer::new();
        PingResponse { payload: 42 }.encode(&mut buf).unwrap();
        assert_eq!(buf.read_i64().unwrap(), 42);
    }
}
