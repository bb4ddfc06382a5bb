use craft_util::BufferError;

/// Decode/encode and phase-routing failures. A `DecodeError` or a mismatched
/// protocol version is fatal for the connection that produced it; an
/// `UnknownPacket` is not — the registry reports it and the caller drops the
/// single packet, preserving forward compatibility with unrecognised ids.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Decode(#[from] BufferError),
    #[error("unknown packet id {id:#x} for {phase:?}/{direction:?}")]
    UnknownPacket {
        phase: crate::Phase,
        direction: crate::Direction,
        id: i32,
    },
    #[error("protocol version mismatch: server speaks {expected}, client sent {found}")]
    VersionMismatch { expected: i32, found: i32 },
    #[error("invalid value {0} for next_state")]
    InvalidNextState(i32),
    #[error("frame length {0} exceeds the maximum accepted frame size")]
    OversizeFrame(i32),
}
