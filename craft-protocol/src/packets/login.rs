use craft_util::{Buffer, Uuid};

use crate::{
    packet::{ClientboundEncode, ServerboundDecode},
    Phase, ProtocolError, ServerboundPacket,
};

/// LO/SB 0x00
#[derive(Debug, Clone)]
pub struct LoginStart {
    pub name: String,
    pub uuid: Uuid,
}

impl ServerboundDecode for LoginStart {
    const PHASE: Phase = Phase::Login;
    const ID: i32 = 0x00;

    fn decode(buf: &mut Buffer) -> Result<Self, ProtocolError> {
        let name = buf.read_string()?;
        let uuid_bytes: [u8; 16] = buf.read_bytes(16)?.try_into().unwrap();
        Ok(Self {
            name,
            uuid: Uuid::from_bytes(uuid_bytes),
        })
    }
}

impl From<LoginStart> for ServerboundPacket {
    fn from(value: LoginStart) -> Self {
        ServerboundPacket::LoginStart(value)
    }
}

/// LO/CB 0x02
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub uuid: Uuid,
    pub name: String,
}

impl ClientboundEncode for LoginSuccess {
    const PHASE: Phase = Phase::Login;
    const ID: i32 = 0x02;

    fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        buf.write_bytes(self.uuid.as_bytes());
        buf.write_string(&self.name);
        buf.write_varint(0); // number of properties; none sent.
        Ok(())
    }
}

/// A serverbound username is well-formed if it's 3-16 characters drawn from
/// `[A-Za-z0-9_]`.
pub fn is_valid_username(name: &str) -> bool {
    (3..=16).contains(&name.chars().count())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn username_validation() {
        assert!(is_valid_username("Notch"));
        assert!(is_valid_username("a_b"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username(&"a".repeat(17)));
        assert!(!is_valid_username("bad name"));
        assert!(!is_valid_username("bad-name"));
    }

    #[test]
    fn login_success_roundtrip_shape() {
        let mut buf = Buffer::new();
        let success = LoginSuccess {
            uuid: Uuid::offline_player("Notch"),
            name: "Notch".to_owned(),
        };
        success.encode(&mut buf).unwrap();
        assert_eq!(buf.read_bytes(16).unwrap().len(), 16);
        assert_eq!(buf.read_string().unwrap(), "Notch");
        assert_eq!(buf.read_varint().unwrap(), 0);
    }
}
