use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

use crate::error::Result;

/// A connected, bidirectional stream socket; implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations,
/// regardless of whether the peer was reached over a Unix-domain path or
/// an Internet address.
pub struct IpcStream {
    inner: IpcStreamInner,
}

enum IpcStreamInner {
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Read for IpcStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            IpcStreamInner::Unix(stream) => stream.read(buf),
            IpcStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for IpcStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            IpcStreamInner::Unix(stream) => stream.write(buf),
            IpcStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            IpcStreamInner::Unix(stream) => stream.flush(),
            IpcStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl AsRawFd for IpcStream {
    fn as_raw_fd(&self) -> RawFd {
        match &self.inner {
            IpcStreamInner::Unix(stream) => stream.as_raw_fd(),
            IpcStreamInner::Tcp(stream) => stream.as_raw_fd(),
        }
    }
}

impl IpcStream {
    pub(crate) fn from_unix(stream: UnixStream) -> Self {
        Self {
            inner: IpcStreamInner::Unix(stream),
        }
    }

    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: IpcStreamInner::Tcp(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            IpcStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            IpcStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            IpcStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            IpcStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Switch the stream between blocking and non-blocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        match &self.inner {
            IpcStreamInner::Unix(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
            IpcStreamInner::Tcp(stream) => stream.set_nonblocking(nonblocking).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            IpcStreamInner::Unix(stream) => Ok(Self::from_unix(stream.try_clone()?)),
            IpcStreamInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
        }
    }

    /// Close the write half; the peer observes end-of-stream.
    pub fn shutdown_write(&self) -> Result<()> {
        match &self.inner {
            IpcStreamInner::Unix(stream) => stream.shutdown(Shutdown::Write).map_err(Into::into),
            IpcStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Write).map_err(Into::into),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            IpcStreamInner::Unix(_) => "unix",
            IpcStreamInner::Tcp(_) => "tcp",
        }
    }
}

impl std::fmt::Debug for IpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcStream")
            .field("type", &self.transport_name())
            .field("fd", &self.as_raw_fd())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_streams_read_and_write() {
        let (left, right) = UnixStream::pair().unwrap();
        let mut left = IpcStream::from_unix(left);
        let mut right = IpcStream::from_unix(right);

        left.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(left.transport_name(), "unix");
    }

    #[test]
    fn shutdown_write_signals_eof() {
        let (left, right) = UnixStream::pair().unwrap();
        let left = IpcStream::from_unix(left);
        let mut right = IpcStream::from_unix(right);

        left.shutdown_write().unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(right.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn cloned_stream_shares_connection() {
        let (left, right) = UnixStream::pair().unwrap();
        let left = IpcStream::from_unix(left);
        let mut writer = left.try_clone().unwrap();
        let mut right = IpcStream::from_unix(right);

        assert_ne!(writer.as_raw_fd(), left.as_raw_fd());
        writer.write_all(b"x").unwrap();
        let mut buf = [0u8; 1];
        right.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
    }
}
