use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::address::AddressFamily;
use crate::error::{Result, TransportError};
use crate::stream::IpcStream;
use crate::sys::{self, SockAddr};

/// Resolve `host:port` to a single socket address of the requested family.
///
/// IP literals are taken as-is (and must match `family`); anything else goes
/// through the system resolver, keeping the first result of that family.
pub(crate) fn resolve(host: &str, port: u16, family: AddressFamily) -> Result<SocketAddr> {
    let display = format!("{host}:{port}");
    let literal = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = literal.parse::<IpAddr>() {
        if AddressFamily::of(&ip) != family {
            return Err(TransportError::Resolve {
                address: display,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("{ip} is not an {family} address"),
                ),
            });
        }
        return Ok(SocketAddr::new(ip, port));
    }

    let mut candidates = (literal, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            address: display.clone(),
            source,
        })?;
    candidates
        .find(|addr| AddressFamily::of(&addr.ip()) == family)
        .ok_or_else(|| TransportError::Resolve {
            address: display,
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no {family} address found"),
            ),
        })
}

/// Create, bind and listen on a TCP socket.
///
/// IPv6 sockets are restricted to IPv6 traffic so that an IPv4 listener on
/// the same port can coexist.
pub(crate) fn bind(
    host: &str,
    port: u16,
    family: AddressFamily,
    backlog: i32,
) -> Result<TcpListener> {
    let target = resolve(host, port, family)?;
    let address = target.to_string();

    let fd = sys::socket(family.as_raw()).map_err(|source| TransportError::Create {
        address: address.clone(),
        source,
    })?;

    let bind_err = |source: std::io::Error| TransportError::Bind {
        address: address.clone(),
        source,
    };
    sys::set_int_option(&fd, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1).map_err(bind_err)?;
    if family == AddressFamily::Ipv6 {
        sys::set_int_option(&fd, libc::IPPROTO_IPV6, libc::IPV6_V6ONLY, 1).map_err(bind_err)?;
    }
    sys::bind(&fd, &SockAddr::from_inet(&target)).map_err(bind_err)?;
    sys::listen(&fd, backlog).map_err(|source| TransportError::Listen {
        address: address.clone(),
        source,
    })?;

    info!(%address, backlog, "listening on tcp socket");
    Ok(TcpListener::from(fd))
}

/// Connect to a TCP listener (blocking).
pub(crate) fn connect(host: &str, port: u16, family: AddressFamily) -> Result<IpcStream> {
    let target = resolve(host, port, family)?;
    let address = target.to_string();

    let fd = sys::socket(family.as_raw()).map_err(|source| TransportError::Create {
        address: address.clone(),
        source,
    })?;
    sys::connect(&fd, &SockAddr::from_inet(&target)).map_err(|source| {
        TransportError::Connect {
            address: address.clone(),
            source,
        }
    })?;

    let stream = TcpStream::from(fd);
    stream.set_nodelay(true)?;
    debug!(%address, "connected to tcp socket");
    Ok(IpcStream::from_tcp(stream))
}

/// Accept one connection from a TCP listener.
pub(crate) fn accept(listener: &TcpListener) -> Result<IpcStream> {
    let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    debug!(%peer, "accepted tcp connection");
    Ok(IpcStream::from_tcp(stream))
}
