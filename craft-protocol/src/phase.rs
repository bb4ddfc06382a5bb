/// One of the four connection phases. Phase transitions are monotone:
/// `Handshaking -> (Status | Login) -> Play`, with no back-edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Handshaking,
    Status,
    Login,
    Play,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Serverbound,
    Clientbound,
}

/// Protocol version 763 (Minecraft Java Edition 1.20.1).
pub const PROTOCOL_VERSION: i32 = 763;
pub const GAME_VERSION: &str = "1.20.1";
