//! Non-blocking listener and client connection
//!
//! The server owns at most one client at a time. Every socket call returns
//! immediately: accept and read report "nothing yet" instead of waiting, and
//! only [`Connection::write_all`] may stall, bounded by the configured write
//! stall.
//!
//! # Handshake
//!
//! | Outcome | Bytes sent | Then |
//! |---------|------------|------|
//! | Host allowed | `Welcome\0` | framed exchange |
//! | Host refused | `Refused\0` | connection closed |

use super::access::{AllowList, HostResolver};
use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

/// Sent to an admitted client
pub const WELCOME: &[u8; 8] = b"Welcome\0";

/// Sent to a refused client before closing
pub const REFUSED: &[u8; 8] = b"Refused\0";

/// Pause between write attempts on a full socket buffer
const WRITE_RETRY_PAUSE: Duration = Duration::from_micros(200);

/// Listening socket in non-blocking mode
pub struct Listener {
    inner: TcpListener,
    write_stall: Duration,
}

impl Listener {
    /// Bind all interfaces on `port` (0 picks a free port)
    pub fn bind(port: u16) -> Result<Self> {
        let inner =
            TcpListener::bind(("0.0.0.0", port)).map_err(|source| Error::Bind { port, source })?;
        inner.set_nonblocking(true).map_err(Error::Listen)?;
        Ok(Self {
            inner,
            write_stall: Duration::from_millis(1000),
        })
    }

    /// Longest stall tolerated by [`Connection::write_all`] on accepted clients
    pub fn with_write_stall(mut self, stall: Duration) -> Self {
        self.write_stall = stall;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept a pending client, if any, and run the handshake.
    ///
    /// Returns `Ok(None)` when nobody is waiting or the peer was refused.
    pub fn accept_if_available(
        &self,
        allow_list: &AllowList,
        resolver: &dyn HostResolver,
    ) -> Result<Option<Connection>> {
        let (mut stream, addr) = match self.inner.accept() {
            Ok(accepted) => accepted,
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let host = resolver.resolve(addr.ip());
        if !allow_list.allows(&host) {
            log::info!("Refused connection from {} ({})", host, addr);
            if let Err(e) = stream.write_all(REFUSED) {
                log::debug!("Cannot send refusal to {}: {}", addr, e);
            }
            let _ = stream.shutdown(Shutdown::Both);
            return Ok(None);
        }

        stream.write_all(WELCOME)?;
        stream.set_nonblocking(true)?;
        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Cannot disable Nagle for {}: {}", addr, e);
        }
        log::info!("Client connected from {} ({})", host, addr);

        Ok(Some(Connection {
            stream,
            peer: addr,
            write_stall: self.write_stall,
        }))
    }
}

/// Outcome of a non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes were read into the buffer
    Data(usize),
    /// Nothing available right now
    Empty,
    /// Peer closed the connection
    Disconnected,
}

/// Accepted client in non-blocking mode
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    write_stall: Duration,
}

impl Connection {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether a read would make progress. EOF counts as readable.
    pub fn poll_readable(&self) -> Result<bool> {
        let mut peeked = [0u8; 1];
        match self.stream.peek(&mut peeked) {
            Ok(_) => Ok(true),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(ref e) if e.kind() == ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read whatever is available into `buf`
    pub fn read_available(&mut self, buf: &mut [u8]) -> Result<ReadOutcome> {
        match self.stream.read(buf) {
            Ok(0) => Ok(ReadOutcome::Disconnected),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(ReadOutcome::Empty),
            Err(ref e) if e.kind() == ErrorKind::Interrupted => Ok(ReadOutcome::Empty),
            Err(e) => Err(e.into()),
        }
    }

    /// Send all of `bytes`, retrying partial writes.
    ///
    /// Returns false if the peer is gone or the socket stayed full for longer
    /// than the write stall.
    pub fn write_all(&mut self, bytes: &[u8]) -> bool {
        let mut sent = 0;
        let mut stalled_since: Option<Instant> = None;

        while sent < bytes.len() {
            match self.stream.write(&bytes[sent..]) {
                Ok(0) => {
                    log::debug!("Peer {} stopped accepting data", self.peer);
                    return false;
                }
                Ok(n) => {
                    sent += n;
                    stalled_since = None;
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    let since = *stalled_since.get_or_insert_with(Instant::now);
                    if since.elapsed() > self.write_stall {
                        log::warn!(
                            "Write to {} stalled for {:?} with {} of {} bytes sent",
                            self.peer,
                            self.write_stall,
                            sent,
                            bytes.len()
                        );
                        return false;
                    }
                    thread::sleep(WRITE_RETRY_PAUSE);
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    log::debug!("Write to {} failed: {}", self.peer, e);
                    return false;
                }
            }
        }
        true
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    struct FixedName(&'static str);

    impl HostResolver for FixedName {
        fn resolve(&self, _addr: IpAddr) -> String {
            self.0.to_string()
        }
    }

    fn accept_within(
        listener: &Listener,
        allow: &AllowList,
        resolver: &dyn HostResolver,
    ) -> Option<Connection> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(conn) = listener.accept_if_available(allow, resolver).unwrap() {
                return Some(conn);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    #[test]
    fn test_accept_without_client() {
        let listener = Listener::bind(0).unwrap();
        let allow = AllowList::new(["trusted"]);
        assert!(
            listener
                .accept_if_available(&allow, &FixedName("trusted"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_refused_client_gets_token_then_eof() {
        let listener = Listener::bind(0).unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let allow = AllowList::new(["trusted"]);
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut received = Vec::new();
        while received.len() < REFUSED.len() && Instant::now() < deadline {
            assert!(
                listener
                    .accept_if_available(&allow, &FixedName("stranger"))
                    .unwrap()
                    .is_none()
            );
            let mut token = [0u8; 8];
            if let Ok(n) = client.read(&mut token) {
                received.extend_from_slice(&token[..n]);
            }
        }
        assert_eq!(received.as_slice(), REFUSED);

        let mut rest = [0u8; 8];
        assert_eq!(client.read(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_welcome_and_nonblocking_io() {
        let listener = Listener::bind(0).unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut client = TcpStream::connect(("127.0.0.1", port)).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let allow = AllowList::new(["trusted"]);
        let mut conn = accept_within(&listener, &allow, &FixedName("trusted")).unwrap();

        let mut token = [0u8; 8];
        client.read_exact(&mut token).unwrap();
        assert_eq!(&token, WELCOME);

        let mut buf = [0u8; 16];
        assert!(!conn.poll_readable().unwrap());
        assert_eq!(conn.read_available(&mut buf).unwrap(), ReadOutcome::Empty);

        client.write_all(b"ping").unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !conn.poll_readable().unwrap() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(conn.read_available(&mut buf).unwrap(), ReadOutcome::Data(4));
        assert_eq!(&buf[..4], b"ping");

        assert!(conn.write_all(b"pong"));
        let mut reply = [0u8; 4];
        client.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"pong");

        drop(client);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !conn.poll_readable().unwrap() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            conn.read_available(&mut buf).unwrap(),
            ReadOutcome::Disconnected
        );
    }
}
