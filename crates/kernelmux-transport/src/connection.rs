use std::io::{Read, Write};

use mio::event::Source;
use mio::{Interest, Registry, Token};

use crate::error::Result;

/// A connected, non-blocking peer stream.
///
/// Reads and writes never block: when the kernel buffer is empty (or full)
/// they fail with `ErrorKind::WouldBlock`. A `Connection` can be registered
/// with a [`mio::Poll`] to learn when to retry.
pub struct Connection {
    inner: ConnectionInner,
}

enum ConnectionInner {
    Tcp(mio::net::TcpStream),
    #[cfg(unix)]
    Unix(mio::net::UnixStream),
}

impl Connection {
    /// Wrap an accepted TCP stream, switching it to non-blocking mode.
    pub fn from_tcp(stream: std::net::TcpStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            inner: ConnectionInner::Tcp(mio::net::TcpStream::from_std(stream)),
        })
    }

    /// Wrap an accepted Unix domain socket stream, switching it to non-blocking mode.
    #[cfg(unix)]
    pub fn from_unix(stream: std::os::unix::net::UnixStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            inner: ConnectionInner::Unix(mio::net::UnixStream::from_std(stream)),
        })
    }

    /// Short transport label for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            ConnectionInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            ConnectionInner::Unix(_) => "unix-domain-socket",
        }
    }

    /// Human-readable peer address, if the platform reports one.
    pub fn peer_description(&self) -> Option<String> {
        match &self.inner {
            ConnectionInner::Tcp(stream) => stream.peer_addr().ok().map(|a| a.to_string()),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream
                .peer_addr()
                .ok()
                .and_then(|a| a.as_pathname().map(|p| p.display().to_string())),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ConnectionInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ConnectionInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            ConnectionInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.flush(),
        }
    }
}

impl Source for Connection {
    fn register(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> std::io::Result<()> {
        match &mut self.inner {
            ConnectionInner::Tcp(stream) => stream.register(registry, token, interests),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.register(registry, token, interests),
        }
    }

    fn reregister(
        &mut self,
        registry: &Registry,
        token: Token,
        interests: Interest,
    ) -> std::io::Result<()> {
        match &mut self.inner {
            ConnectionInner::Tcp(stream) => stream.reregister(registry, token, interests),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.reregister(registry, token, interests),
        }
    }

    fn deregister(&mut self, registry: &Registry) -> std::io::Result<()> {
        match &mut self.inner {
            ConnectionInner::Tcp(stream) => stream.deregister(registry),
            #[cfg(unix)]
            ConnectionInner::Unix(stream) => stream.deregister(registry),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("type", &self.transport_name())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    #[test]
    fn unix_connection_is_non_blocking() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut conn = Connection::from_unix(left).unwrap();
        assert_eq!(conn.transport_name(), "unix-domain-socket");

        let mut buf = [0u8; 4];
        let err = conn.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);

        let mut right = right;
        right.write_all(b"ping").unwrap();

        // Data may take a moment to become visible on some platforms.
        let mut got = 0;
        for _ in 0..100 {
            match conn.read(&mut buf[got..]) {
                Ok(n) => {
                    got += n;
                    if got == 4 {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                Err(err) => panic!("unexpected read error: {err}"),
            }
        }
        assert_eq!(&buf, b"ping");
    }

    #[test]
    fn tcp_connection_reports_peer() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (accepted, _) = listener.accept().unwrap();

        let conn = Connection::from_tcp(accepted).unwrap();
        assert_eq!(conn.transport_name(), "tcp");
        assert_eq!(
            conn.peer_description(),
            Some(client.local_addr().unwrap().to_string())
        );
    }
}
