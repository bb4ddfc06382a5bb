//! Non-blocking per-connection I/O. A [`Connection`] owns the socket and
//! assembles frames from whatever partial reads the kernel hands back;
//! [`ConnectionSender`] clones are handed out to other threads so the tick
//! loop and the player registry can queue writes without touching the
//! socket directly. Only one thread ever has the write half locked at a
//! time, so a frame can never be interleaved with another.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use socket2::{SockRef, TcpKeepalive};

use craft_protocol::{ClientboundEncode, Phase};
use craft_util::{varint, Buffer};

use crate::error::ConnectionError;

const READ_CHUNK: usize = 4096;
const MAX_FRAME_LEN: i32 = 2 * 1024 * 1024;
const KEEP_ALIVE_IDLE: Duration = Duration::from_secs(60);

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);
pub const KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(30);

struct Inner {
    stream: Option<TcpStream>,
    phase: Phase,
    read_buf: VecDeque<u8>,
    write_queue: VecDeque<Vec<u8>>,
    write_offset: usize,
    last_keep_alive_sent: Instant,
    last_keep_alive_seen: Instant,
    pending_keep_alive: Option<i64>,
    frames_sent: u64,
    bytes_sent: u64,
}

/// A cheap handle used to queue outbound packets from any thread. Does not
/// read; only [`Connection::poll`] advances the read side.
#[derive(Clone)]
pub struct ConnectionSender {
    inner: Arc<Mutex<Inner>>,
}

impl ConnectionSender {
    pub fn send<T: ClientboundEncode>(&self, packet: &T) -> Result<(), ConnectionError> {
        let mut body = Buffer::new();
        packet.encode(&mut body)?;

        let mut frame = Buffer::new();
        frame.write_varint(T::ID);
        frame.write_bytes(body.as_slice());
        let frame_bytes = frame.into_vec();

        let mut framed = Vec::with_capacity(frame_bytes.len() + varint::varint_size(frame_bytes.len() as i32));
        varint::write_varint(&mut framed, frame_bytes.len() as i32);
        framed.extend_from_slice(&frame_bytes);

        let mut inner = self.inner.lock().unwrap();
        if inner.stream.is_none() {
            return Ok(());
        }
        inner.write_queue.push_back(framed);
        drop(inner);
        self.try_flush()
    }

    pub fn try_flush(&self) -> Result<(), ConnectionError> {
        let mut inner = self.inner.lock().unwrap();
        flush_locked(&mut inner)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().stream.is_none()
    }

    pub fn close(&self) {
        self.inner.lock().unwrap().stream = None;
    }
}

fn flush_locked(inner: &mut Inner) -> Result<(), ConnectionError> {
    loop {
        let Some(front) = inner.write_queue.front() else {
            return Ok(());
        };
        let Some(stream) = inner.stream.as_mut() else {
            return Ok(());
        };
        match stream.write(&front[inner.write_offset..]) {
            Ok(0) => {
                inner.stream = None;
                return Ok(());
            }
            Ok(n) => {
                inner.write_offset += n;
                if inner.write_offset >= front.len() {
                    inner.frames_sent += 1;
                    inner.bytes_sent += front.len() as u64;
                    inner.write_queue.pop_front();
                    inner.write_offset = 0;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
            Err(err) if is_disconnect(&err) => {
                inner.stream = None;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
    )
}

/// One accepted TCP connection. Lives on the acceptor's connection set;
/// `poll` is called once per tick to pump reads, assemble frames and flush
/// the write queue.
pub struct Connection {
    inner: Arc<Mutex<Inner>>,
    pub peer: std::net::SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream) -> std::io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        SockRef::from(&stream).set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEP_ALIVE_IDLE))?;
        let peer = stream.peer_addr()?;
        let now = Instant::now();
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                stream: Some(stream),
                phase: Phase::Handshaking,
                read_buf: VecDeque::new(),
                write_queue: VecDeque::new(),
                write_offset: 0,
                last_keep_alive_sent: now,
                last_keep_alive_seen: now,
                pending_keep_alive: None,
                frames_sent: 0,
                bytes_sent: 0,
            })),
            peer,
        })
    }

    pub fn sender(&self) -> ConnectionSender {
        ConnectionSender {
            inner: self.inner.clone(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().unwrap().phase
    }

    pub fn set_phase(&self, phase: Phase) {
        let mut inner = self.inner.lock().unwrap();
        assert!(
            phase_is_forward(inner.phase, phase),
            "connection phase must advance monotonically"
        );
        inner.phase = phase;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().stream.is_none()
    }

    pub fn close(&self) {
        self.inner.lock().unwrap().stream = None;
    }

    fn pump_reads(&self, inner: &mut Inner) -> Result<(), ConnectionError> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let Some(stream) = inner.stream.as_mut() else {
                return Ok(());
            };
            match stream.read(&mut buf) {
                Ok(0) => {
                    inner.stream = None;
                    return Ok(());
                }
                Ok(n) => inner.read_buf.extend(&buf[..n]),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(err) if is_disconnect(&err) => {
                    inner.stream = None;
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Pumps pending reads and writes, and returns the next fully-assembled
    /// frame body (id already stripped by the caller via
    /// [`Buffer::read_varint`]) if one is available.
    pub fn poll(&self) -> Result<Option<Buffer>, ConnectionError> {
        let mut inner = self.inner.lock().unwrap();
        self.pump_reads(&mut inner)?;
        flush_locked(&mut inner)?;

        let contiguous: Vec<u8> = inner.read_buf.iter().copied().collect();
        let (prefix_len, frame_len) = match varint::try_read_varint(&contiguous) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return Ok(None),
            Err(err) => {
                return Err(craft_protocol::ProtocolError::Decode(craft_util::BufferError::from(err)).into())
            }
        };
        if frame_len < 0 || frame_len > MAX_FRAME_LEN {
            return Err(craft_protocol::ProtocolError::OversizeFrame(frame_len).into());
        }
        let total = prefix_len + frame_len as usize;
        if contiguous.len() < total {
            return Ok(None);
        }
        inner.read_buf.drain(..total);
        Ok(Some(Buffer::from_vec(contiguous[prefix_len..total].to_vec())))
    }

    pub fn maybe_send_keep_alive(&self, sender: &ConnectionSender) -> Result<bool, ConnectionError> {
        use craft_protocol::packets::play::KeepAliveClientbound;
        let mut inner = self.inner.lock().unwrap();
        if inner.phase != Phase::Play {
            return Ok(false);
        }
        if inner.last_keep_alive_sent.elapsed() < KEEP_ALIVE_INTERVAL {
            return Ok(false);
        }
        let nonce = rand::random::<i64>();
        inner.pending_keep_alive = Some(nonce);
        inner.last_keep_alive_sent = Instant::now();
        drop(inner);
        sender.send(&KeepAliveClientbound { id: nonce })?;
        Ok(true)
    }

    pub fn record_keep_alive_response(&self, id: i64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let matched = inner.pending_keep_alive == Some(id);
        if matched {
            inner.pending_keep_alive = None;
            inner.last_keep_alive_seen = Instant::now();
        }
        matched
    }

    pub fn is_keep_alive_timed_out(&self) -> bool {
        self.inner.lock().unwrap().last_keep_alive_seen.elapsed() > KEEP_ALIVE_TIMEOUT
    }

    /// Drains and returns `(frames, bytes)` written to the socket since the
    /// last call, for the tick loop to fold into [`crate::perf::PerfMonitor`].
    pub fn take_io_stats(&self) -> (u64, u64) {
        let mut inner = self.inner.lock().unwrap();
        let stats = (inner.frames_sent, inner.bytes_sent);
        inner.frames_sent = 0;
        inner.bytes_sent = 0;
        stats
    }
}

fn phase_is_forward(from: Phase, to: Phase) -> bool {
    fn rank(phase: Phase) -> u8 {
        match phase {
            Phase::Handshaking => 0,
            Phase::Status | Phase::Login => 1,
            Phase::Play => 2,
        }
    }
    rank(to) >= rank(from)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (client, server)
    }

    #[test]
    fn phase_advances_monotonically() {
        let (_client, server) = connected_pair();
        let connection = Connection::new(server).unwrap();
        connection.set_phase(Phase::Status);
        assert_eq!(connection.phase(), Phase::Status);
    }

    #[test]
    #[should_panic]
    fn phase_cannot_go_backward() {
        let (_client, server) = connected_pair();
        let connection = Connection::new(server).unwrap();
        connection.set_phase(Phase::Play);
        connection.set_phase(Phase::Handshaking);
    }

    #[test]
    fn poll_assembles_a_complete_frame() {
        let (mut client, server) = connected_pair();
        let connection = Connection::new(server).unwrap();

        let mut frame = Vec::new();
        varint::write_varint(&mut frame, 3);
        client.write_all(&frame).unwrap();
        client.write_all(&[0x00, 0xAA, 0xBB]).unwrap();
        client.flush().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let body = connection.poll().unwrap().unwrap();
        assert_eq!(body.as_slice(), &[0x00, 0xAA, 0xBB]);
    }

    #[test]
    fn poll_waits_for_partial_frames() {
        let (mut client, server) = connected_pair();
        let connection = Connection::new(server).unwrap();

        let mut frame = Vec::new();
        varint::write_varint(&mut frame, 5);
        client.write_all(&frame).unwrap();
        client.write_all(&[0x00, 0x01]).unwrap();
        client.flush().unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert!(connection.poll().unwrap().is_none());
    }
}
