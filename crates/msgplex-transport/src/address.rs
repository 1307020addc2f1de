//! Socket addresses the library can listen on or connect to.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};
use crate::inet;
use crate::listener::IpcListener;
use crate::stream::IpcStream;
use crate::uds::UnixDomainSocket;

/// Internet address family. IPv4 and IPv6 listeners are always separate sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub(crate) fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Self::Ipv4,
            IpAddr::V6(_) => Self::Ipv6,
        }
    }

    pub(crate) fn as_raw(self) -> libc::c_int {
        match self {
            Self::Ipv4 => libc::AF_INET,
            Self::Ipv6 => libc::AF_INET6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => f.write_str("IPv4"),
            Self::Ipv6 => f.write_str("IPv6"),
        }
    }
}

/// Transport domain a socket is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Unix,
    Inet,
    Inet6,
}

impl Domain {
    /// The raw `AF_*` constant.
    pub fn as_raw(self) -> libc::c_int {
        match self {
            Domain::Unix => libc::AF_UNIX,
            Domain::Inet => libc::AF_INET,
            Domain::Inet6 => libc::AF_INET6,
        }
    }
}

/// Where a listener binds or a client connects.
///
/// Both variants expose the same capability set: a printable address, a
/// transport domain, a port (zero for Unix-domain paths), and bind/connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SocketAddress {
    /// A filesystem-path Unix-domain socket.
    Unix(PathBuf),
    /// A TCP endpoint. `host` is an IP literal or a resolvable name.
    Inet {
        host: String,
        port: u16,
        family: AddressFamily,
    },
}

impl SocketAddress {
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix(path.into())
    }

    /// An IPv4 TCP endpoint.
    pub fn inet(host: impl Into<String>, port: u16) -> Self {
        Self::Inet {
            host: host.into(),
            port,
            family: AddressFamily::Ipv4,
        }
    }

    /// An IPv6 TCP endpoint.
    pub fn inet6(host: impl Into<String>, port: u16) -> Self {
        Self::Inet {
            host: host.into(),
            port,
            family: AddressFamily::Ipv6,
        }
    }

    /// The path for Unix-domain sockets, the host for Internet sockets.
    pub fn address(&self) -> String {
        match self {
            Self::Unix(path) => path.display().to_string(),
            Self::Inet { host, .. } => host.clone(),
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            Self::Unix(_) => Domain::Unix,
            Self::Inet {
                family: AddressFamily::Ipv4,
                ..
            } => Domain::Inet,
            Self::Inet {
                family: AddressFamily::Ipv6,
                ..
            } => Domain::Inet6,
        }
    }

    /// TCP port, or zero for Unix-domain sockets.
    pub fn port(&self) -> u16 {
        match self {
            Self::Unix(_) => 0,
            Self::Inet { port, .. } => *port,
        }
    }

    /// The string form accepted by [`FromStr`], e.g. `unix:/run/app.sock`
    /// or `tcp6:[::1]:1616`.
    pub fn to_uri(&self) -> String {
        match self {
            Self::Unix(path) => format!("unix:{}", path.display()),
            Self::Inet {
                family: AddressFamily::Ipv4,
                ..
            } => format!("tcp4:{self}"),
            Self::Inet {
                family: AddressFamily::Ipv6,
                ..
            } => format!("tcp6:{self}"),
        }
    }

    /// Create a socket, bind it to this address and start listening.
    pub fn bind(&self, backlog: i32) -> Result<IpcListener> {
        match self {
            Self::Unix(path) => {
                let socket = UnixDomainSocket::bind_with_backlog(path, backlog)?;
                Ok(IpcListener::from_unix(socket, self.clone()))
            }
            Self::Inet { host, port, family } => {
                let listener = inet::bind(host, *port, *family, backlog)?;
                Ok(IpcListener::from_tcp(listener, self.clone()))
            }
        }
    }

    /// Create a socket and connect it to this address (blocking).
    pub fn connect(&self) -> Result<IpcStream> {
        match self {
            Self::Unix(path) => UnixDomainSocket::connect(path),
            Self::Inet { host, port, family } => inet::connect(host, *port, *family),
        }
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Inet { host, port, .. } if host.contains(':') && !host.starts_with('[') => {
                write!(f, "[{host}]:{port}")
            }
            Self::Inet { host, port, .. } => write!(f, "{host}:{port}"),
        }
    }
}

impl From<std::net::SocketAddr> for SocketAddress {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self::Inet {
            host: addr.ip().to_string(),
            port: addr.port(),
            family: AddressFamily::of(&addr.ip()),
        }
    }
}

/// Parses `unix:PATH`, a bare path starting with `/` or `.`, `tcp:HOST:PORT`,
/// `tcp4:HOST:PORT` and `tcp6:HOST:PORT`. IPv6 hosts may be bracketed.
impl FromStr for SocketAddress {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = |reason| TransportError::InvalidAddress {
            input: input.to_string(),
            reason,
        };

        if let Some(path) = input.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(invalid("empty unix socket path"));
            }
            return Ok(Self::unix(path));
        }
        if input.starts_with('/') || input.starts_with('.') {
            return Ok(Self::unix(input));
        }

        let (scheme, rest) = input
            .split_once(':')
            .ok_or_else(|| invalid("expected unix:PATH or tcp:HOST:PORT"))?;
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        let port: u16 = port.parse().map_err(|_| invalid("invalid port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let family = match scheme {
            "tcp4" => AddressFamily::Ipv4,
            "tcp6" => AddressFamily::Ipv6,
            "tcp" => match host.parse::<IpAddr>() {
                Ok(ip) => AddressFamily::of(&ip),
                Err(_) => AddressFamily::Ipv4,
            },
            _ => return Err(invalid("unknown scheme")),
        };

        Ok(Self::Inet {
            host: host.to_string(),
            port,
            family,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_forms() {
        assert_eq!(
            "unix:/run/app/socket1".parse::<SocketAddress>().unwrap(),
            SocketAddress::unix("/run/app/socket1")
        );
        assert_eq!(
            "/tmp/x.sock".parse::<SocketAddress>().unwrap(),
            SocketAddress::unix("/tmp/x.sock")
        );
        assert_eq!(
            "./x.sock".parse::<SocketAddress>().unwrap(),
            SocketAddress::unix("./x.sock")
        );
    }

    #[test]
    fn uri_form_parses_back() {
        for address in [
            SocketAddress::unix("/run/app/socket1"),
            SocketAddress::inet("127.0.0.1", 1414),
            SocketAddress::inet6("::1", 1616),
        ] {
            assert_eq!(address.to_uri().parse::<SocketAddress>().unwrap(), address);
        }
        assert_eq!(SocketAddress::inet6("::1", 1616).to_uri(), "tcp6:[::1]:1616");
    }

    #[test]
    fn parses_tcp_forms() {
        assert_eq!(
            "tcp:127.0.0.1:1414".parse::<SocketAddress>().unwrap(),
            SocketAddress::inet("127.0.0.1", 1414)
        );
        assert_eq!(
            "tcp:[::1]:1616".parse::<SocketAddress>().unwrap(),
            SocketAddress::inet6("::1", 1616)
        );
        assert_eq!(
            "tcp6:localhost:9000".parse::<SocketAddress>().unwrap(),
            SocketAddress::inet6("localhost", 9000)
        );
        assert_eq!(
            "tcp:localhost:9000".parse::<SocketAddress>().unwrap(),
            SocketAddress::inet("localhost", 9000)
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["unix:", "tcp:127.0.0.1", "tcp:host:notaport", "udp:1.2.3.4:5", "tcp::80"] {
            let err = input.parse::<SocketAddress>().unwrap_err();
            assert!(
                matches!(err, TransportError::InvalidAddress { .. }),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn capability_accessors() {
        let unix = SocketAddress::unix("/tmp/a.sock");
        assert_eq!(unix.address(), "/tmp/a.sock");
        assert_eq!(unix.domain(), Domain::Unix);
        assert_eq!(unix.port(), 0);

        let v6 = SocketAddress::inet6("::1", 1616);
        assert_eq!(v6.address(), "::1");
        assert_eq!(v6.domain(), Domain::Inet6);
        assert_eq!(v6.domain().as_raw(), libc::AF_INET6);
        assert_eq!(v6.port(), 1616);
    }

    #[test]
    fn display_brackets_ipv6_hosts() {
        assert_eq!(SocketAddress::inet("127.0.0.1", 1414).to_string(), "127.0.0.1:1414");
        assert_eq!(SocketAddress::inet6("::1", 1616).to_string(), "[::1]:1616");
        assert_eq!(SocketAddress::unix("/tmp/a.sock").to_string(), "/tmp/a.sock");
    }
}
