use std::net::TcpListener;

use tracing::{debug, info};

use crate::address::BindAddress;
use crate::connection::Connection;
use crate::error::{Result, TransportError};
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// A bound endpoint waiting for its frontend peer.
pub struct Listener {
    address: BindAddress,
    inner: ListenerInner,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl Listener {
    /// Bind a listening socket for `address`.
    pub fn bind(address: &BindAddress) -> Result<Self> {
        let inner = match address {
            BindAddress::Tcp(addr) => {
                let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
                    address: address.to_string(),
                    source,
                })?;
                info!(%address, "listening on tcp socket");
                ListenerInner::Tcp(listener)
            }
            #[cfg(unix)]
            BindAddress::Ipc(path) => ListenerInner::Unix(UnixDomainSocket::bind(path)?),
            #[cfg(not(unix))]
            BindAddress::Ipc(_) => return Err(TransportError::Unsupported("ipc")),
        };

        let address = match &inner {
            // Resolve port 0 to the port the OS actually picked.
            ListenerInner::Tcp(listener) => BindAddress::Tcp(listener.local_addr()?),
            #[cfg(unix)]
            ListenerInner::Unix(_) => address.clone(),
        };

        Ok(Self { address, inner })
    }

    /// Block until one peer connects, then return it as a non-blocking [`Connection`].
    pub fn accept(&self) -> Result<Connection> {
        let conn = match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, peer) =
                    listener
                        .accept()
                        .map_err(|source| TransportError::Accept {
                            address: self.address.to_string(),
                            source,
                        })?;
                debug!(address = %self.address, %peer, "accepted tcp connection");
                Connection::from_tcp(stream)?
            }
            #[cfg(unix)]
            ListenerInner::Unix(socket) => Connection::from_unix(socket.accept()?)?,
        };
        Ok(conn)
    }

    /// The address this listener is bound to.
    ///
    /// For TCP listeners bound to port 0 this reports the assigned port.
    pub fn local_address(&self) -> &BindAddress {
        &self.address
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("address", &self.address.to_string())
            .finish()
    }
}
