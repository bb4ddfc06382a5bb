//! Listens for inbound TCP connections and keeps the set of connections that
//! haven't yet reached `Play`. Mirrors the accept-then-drain-set loop shape
//! used for the tick loop itself, just scoped to pre-game connections.

use std::net::{TcpListener, ToSocketAddrs};
use std::time::{Duration, Instant};

use socket2::{Domain, Socket, Type};

use craft_util::retain_returned_vec;

use crate::connection::Connection;

const JANITOR_INTERVAL: Duration = Duration::from_secs(30);
const LISTEN_BACKLOG: i32 = 1024;

pub struct Acceptor {
    listener: TcpListener,
    connecting: Vec<Connection>,
    accepted_total: u64,
    rejected_total: u64,
    last_janitor_pass: Instant,
}

impl Acceptor {
    /// Binds with `SO_REUSEADDR` set, so a restart doesn't have to wait out
    /// the previous listener's `TIME_WAIT` state.
    pub fn bind(address: &str) -> std::io::Result<Self> {
        let addr = address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no address found"))?;
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;
        let listener: TcpListener = socket.into();
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            connecting: Vec::new(),
            accepted_total: 0,
            rejected_total: 0,
            last_janitor_pass: Instant::now(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub fn accepted_total(&self) -> u64 {
        self.accepted_total
    }

    /// Accepts every connection the kernel currently has queued and wraps it
    /// in a non-blocking [`Connection`].
    pub fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, _addr)) => match Connection::new(stream) {
                    Ok(connection) => {
                        self.accepted_total += 1;
                        self.connecting.push(connection);
                    }
                    Err(err) => {
                        self.rejected_total += 1;
                        tracing::warn!(%err, "failed to initialize accepted connection");
                    }
                },
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    tracing::warn!(%err, "accept() failed");
                    break;
                }
            }
        }
    }

    /// Drains connections that have closed or been promoted out of the
    /// pre-game set by the caller (via [`Acceptor::take_ready`]).
    pub fn drop_closed(&mut self) {
        retain_returned_vec(&mut self.connecting, |c| !c.is_closed());
    }

    /// Removes and returns connections for which `predicate` holds, letting
    /// the caller promote connections that reached `Play` into the player
    /// registry.
    pub fn take_ready<F: Fn(&Connection) -> bool>(&mut self, predicate: F) -> Vec<Connection> {
        retain_returned_vec(&mut self.connecting, |c| !predicate(c))
    }

    pub fn connecting(&self) -> &[Connection] {
        &self.connecting
    }

    pub fn connecting_mut(&mut self) -> &mut [Connection] {
        &mut self.connecting
    }

    pub fn maybe_run_janitor(&mut self) {
        if self.last_janitor_pass.elapsed() < JANITOR_INTERVAL {
            return;
        }
        self.last_janitor_pass = Instant::now();
        self.drop_closed();
        tracing::debug!(
            pending = self.connecting.len(),
            accepted_total = self.accepted_total,
            rejected_total = self.rejected_total,
            "acceptor janitor pass"
        );
    }

    /// `in_play` is supplied by the caller (the acceptor has no visibility
    /// into the player registry once a connection is promoted out of its set).
    pub fn stats(&self, in_play: usize) -> AcceptorStats {
        AcceptorStats {
            pending: self.connecting.len(),
            accepted_total: self.accepted_total,
            rejected_total: self.rejected_total,
            in_play,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptorStats {
    pub pending: usize,
    pub accepted_total: u64,
    pub rejected_total: u64,
    pub in_play: usize,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::TcpStream;

    #[test]
    fn accept_pending_drains_the_backlog() {
        let mut acceptor = Acceptor::bind("127.0.0.1:0").unwrap();
        let addr = acceptor.local_addr().unwrap();
        let _client = TcpStream::connect(addr).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        acceptor.accept_pending();
        assert_eq!(acceptor.stats(0).pending, 1);
    }
}
