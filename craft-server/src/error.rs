use craft_world::RegionError;

/// Per-connection failure. `IoError` and `Protocol` close the connection;
/// callers decide whether to log at `warn` (unexpected) or `debug`
/// (ordinary disconnect). `Policy` rejects a single request (server full,
/// duplicate login, invalid username) without being an I/O or protocol fault.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] craft_protocol::ProtocolError),
    #[error("policy violation: {0}")]
    Policy(String),
    #[error("connection closed")]
    Closed,
}

/// Server-wide error classification. Each variant carries its own recovery
/// policy: `Io`/`Protocol` are scoped to one connection and never bring the
/// process down, `Policy` rejects the offending request, and `Persistence`
/// is logged and retried on the next save pass rather than panicking.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] craft_util::BufferError),
    #[error("protocol error: {0}")]
    Protocol(#[from] craft_protocol::ProtocolError),
    #[error("policy violation: {0}")]
    Policy(String),
    #[error("persistence error: {0}")]
    Persistence(#[from] RegionError),
}
