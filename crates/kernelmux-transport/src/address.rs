use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Where an endpoint listens.
///
/// Displays as, and parses from, the URL form used in connection files:
/// `tcp://127.0.0.1:5555` or `ipc:///run/kernel-5555`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindAddress {
    /// TCP socket address.
    Tcp(SocketAddr),
    /// Filesystem path of a Unix domain socket.
    Ipc(PathBuf),
}

impl BindAddress {
    /// Build an address from the `(transport, host, port)` triple of a
    /// connection file.
    ///
    /// For `tcp`, `host` must be an IP literal, `*` or `localhost`.
    /// For `ipc`, the socket path is `<host>-<port>`.
    pub fn from_parts(transport: &str, host: &str, port: u16) -> Result<Self> {
        match transport {
            "tcp" => {
                let ip = parse_host(host).ok_or_else(|| TransportError::InvalidAddress {
                    address: format!("{transport}://{host}:{port}"),
                    reason: format!("'{host}' is not an IP address"),
                })?;
                Ok(Self::Tcp(SocketAddr::new(ip, port)))
            }
            "ipc" => {
                if host.is_empty() {
                    return Err(TransportError::InvalidAddress {
                        address: format!("{transport}://{host}:{port}"),
                        reason: "empty ipc path prefix".to_string(),
                    });
                }
                Ok(Self::Ipc(PathBuf::from(format!("{host}-{port}"))))
            }
            other => Err(TransportError::InvalidAddress {
                address: format!("{other}://{host}:{port}"),
                reason: format!("unknown transport '{other}' (expected tcp or ipc)"),
            }),
        }
    }

    /// Transport scheme of this address.
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            Self::Ipc(_) => "ipc",
        }
    }
}

fn parse_host(host: &str) -> Option<IpAddr> {
    match host {
        "*" => Some(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        "localhost" => Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        other => other.trim_matches(|c| c == '[' || c == ']').parse().ok(),
    }
}

impl fmt::Display for BindAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

impl FromStr for BindAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| TransportError::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| invalid("missing '://' separator"))?;

        match scheme {
            "tcp" => {
                let (host, port) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| invalid("missing port"))?;
                let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
                Self::from_parts("tcp", host, port)
            }
            "ipc" => {
                if rest.is_empty() {
                    return Err(invalid("empty ipc path"));
                }
                Ok(Self::Ipc(PathBuf::from(rest)))
            }
            _ => Err(invalid("unknown transport (expected tcp or ipc)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_from_parts() {
        let addr = BindAddress::from_parts("tcp", "127.0.0.1", 5555).unwrap();
        assert_eq!(addr, BindAddress::Tcp("127.0.0.1:5555".parse().unwrap()));
        assert_eq!(addr.to_string(), "tcp://127.0.0.1:5555");
        assert_eq!(addr.scheme(), "tcp");
    }

    #[test]
    fn tcp_wildcard_and_localhost() {
        let any = BindAddress::from_parts("tcp", "*", 9000).unwrap();
        assert_eq!(any, BindAddress::Tcp("0.0.0.0:9000".parse().unwrap()));

        let local = BindAddress::from_parts("tcp", "localhost", 9001).unwrap();
        assert_eq!(local, BindAddress::Tcp("127.0.0.1:9001".parse().unwrap()));
    }

    #[test]
    fn tcp_rejects_hostnames() {
        let err = BindAddress::from_parts("tcp", "kernel.example", 1).unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress { .. }));
    }

    #[test]
    fn ipc_path_uses_host_and_port() {
        let addr = BindAddress::from_parts("ipc", "/tmp/kernel", 4001).unwrap();
        assert_eq!(addr, BindAddress::Ipc(PathBuf::from("/tmp/kernel-4001")));
        assert_eq!(addr.to_string(), "ipc:///tmp/kernel-4001");
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let err = BindAddress::from_parts("udp", "127.0.0.1", 1).unwrap_err();
        assert!(err.to_string().contains("unknown transport"));
    }

    #[test]
    fn parse_url_forms() {
        let tcp: BindAddress = "tcp://[::1]:7000".parse().unwrap();
        assert_eq!(tcp, BindAddress::Tcp("[::1]:7000".parse().unwrap()));

        let ipc: BindAddress = "ipc:///run/kernel.sock".parse().unwrap();
        assert_eq!(ipc, BindAddress::Ipc(PathBuf::from("/run/kernel.sock")));
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["127.0.0.1:80", "tcp://127.0.0.1", "tcp://1.2.3.4:99999", "ipc://", "ws://x:1"] {
            assert!(bad.parse::<BindAddress>().is_err(), "{bad} should not parse");
        }
    }
}
