use std::net::TcpListener;
use std::os::fd::{AsRawFd, RawFd};

use crate::address::SocketAddress;
use crate::error::Result;
use crate::inet;
use crate::stream::IpcStream;
use crate::uds::UnixDomainSocket;

/// A bound, listening socket of either transport.
pub struct IpcListener {
    inner: IpcListenerInner,
    address: SocketAddress,
}

enum IpcListenerInner {
    Unix(UnixDomainSocket),
    Tcp(TcpListener),
}

impl IpcListener {
    /// Bind and listen on `address`. Same as [`SocketAddress::bind`].
    pub fn bind(address: &SocketAddress, backlog: i32) -> Result<Self> {
        address.bind(backlog)
    }

    pub(crate) fn from_unix(socket: UnixDomainSocket, address: SocketAddress) -> Self {
        Self {
            inner: IpcListenerInner::Unix(socket),
            address,
        }
    }

    pub(crate) fn from_tcp(listener: TcpListener, address: SocketAddress) -> Self {
        Self {
            inner: IpcListenerInner::Tcp(listener),
            address,
        }
    }

    /// Accept one pending connection.
    ///
    /// On a non-blocking listener with nothing pending this fails with
    /// [`TransportError::Accept`](crate::TransportError::Accept) wrapping
    /// `ErrorKind::WouldBlock`.
    pub fn accept(&self) -> Result<IpcStream> {
        match &self.inner {
            IpcListenerInner::Unix(socket) => socket.accept(),
            IpcListenerInner::Tcp(listener) => inet::accept(listener),
        }
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            IpcListenerInner::Unix(socket) => socket.set_nonblocking(nonblocking),
            IpcListenerInner::Tcp(listener) => {
                listener.set_nonblocking(nonblocking)?;
                Ok(())
            }
        }
    }

    /// The address this listener was configured with.
    pub fn address(&self) -> &SocketAddress {
        &self.address
    }

    /// The address actually bound. Differs from [`address`](Self::address)
    /// when a TCP listener was bound to port zero.
    pub fn local_address(&self) -> Result<SocketAddress> {
        match &self.inner {
            IpcListenerInner::Unix(socket) => Ok(SocketAddress::unix(socket.path())),
            IpcListenerInner::Tcp(listener) => Ok(listener.local_addr()?.into()),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            IpcListenerInner::Unix(socket) => socket.transport_name(),
            IpcListenerInner::Tcp(_) => "tcp",
        }
    }
}

impl AsRawFd for IpcListener {
    fn as_raw_fd(&self) -> RawFd {
        match &self.inner {
            IpcListenerInner::Unix(socket) => socket.as_raw_fd(),
            IpcListenerInner::Tcp(listener) => listener.as_raw_fd(),
        }
    }
}

impl std::fmt::Debug for IpcListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcListener")
            .field("type", &self.transport_name())
            .field("address", &self.address.to_string())
            .finish()
    }
}
