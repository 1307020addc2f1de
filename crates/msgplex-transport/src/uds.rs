use std::fs::DirBuilder;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::{DirBuilderExt, FileTypeExt, MetadataExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::IpcStream;
use crate::sys::{self, SockAddr, UmaskGuard};
use crate::DEFAULT_BACKLOG;

/// Unix domain socket transport.
///
/// Provides bind/accept/connect over filesystem-path sockets. The socket file
/// is removed again on `Drop`, as long as the path still refers to the inode
/// this listener created.
pub struct UnixDomainSocket {
    listener: UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

impl UnixDomainSocket {
    /// Mode for parent directories created by `bind`.
    pub const PARENT_DIR_MODE: u32 = 0o750;
    /// File-creation mask applied while binding; leaves the socket at 0660.
    pub const BIND_UMASK: u32 = 0o117;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(target_os = "macos")]
    const MAX_PATH_LEN: usize = 104;
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on a filesystem-path Unix domain socket.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_backlog(path, DEFAULT_BACKLOG)
    }

    /// Bind and listen with an explicit backlog.
    ///
    /// The parent directory is created if missing. If the path already exists
    /// and is a socket, it is removed first (stale socket cleanup); any other
    /// kind of file is left alone and the bind fails.
    pub fn bind_with_backlog(path: impl AsRef<Path>, backlog: i32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let address = path.display().to_string();
        let bind_err = |source: std::io::Error| TransportError::Bind {
            address: address.clone(),
            source,
        };

        Self::check_path_len(&path)?;
        ensure_parent_dir(&path).map_err(bind_err)?;

        // Remove stale socket if it exists, but never remove non-socket files.
        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(bind_err)?;
            } else {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
        }

        let fd = sys::socket(libc::AF_UNIX).map_err(|source| TransportError::Create {
            address: address.clone(),
            source,
        })?;
        let sockaddr = SockAddr::from_path(&path).map_err(bind_err)?;
        {
            let _mask = UmaskGuard::set(Self::BIND_UMASK as libc::mode_t);
            sys::bind(&fd, &sockaddr).map_err(bind_err)?;
        }

        let created_inode = std::fs::symlink_metadata(&path)
            .ok()
            .map(|metadata| (metadata.dev(), metadata.ino()));

        if let Err(source) = sys::listen(&fd, backlog) {
            let _ = std::fs::remove_file(&path);
            return Err(TransportError::Listen { address, source });
        }

        info!(?path, backlog, "listening on unix domain socket");

        Ok(Self {
            listener: UnixListener::from(fd),
            path,
            created_inode,
        })
    }

    /// Accept an incoming connection.
    ///
    /// The accepted stream is always in blocking mode, even when the listener
    /// itself is non-blocking.
    pub fn accept(&self) -> Result<IpcStream> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nonblocking(false)?;
        debug!(path = ?self.path, "accepted connection");
        Ok(IpcStream::from_unix(stream))
    }

    /// Connect to a listening Unix domain socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<IpcStream> {
        let path = path.as_ref();
        let address = path.display().to_string();
        Self::check_path_len(path)?;

        let fd = sys::socket(libc::AF_UNIX).map_err(|source| TransportError::Create {
            address: address.clone(),
            source,
        })?;
        SockAddr::from_path(path)
            .and_then(|sockaddr| sys::connect(&fd, &sockaddr))
            .map_err(|source| TransportError::Connect { address, source })?;

        debug!(?path, "connected to unix domain socket");
        Ok(IpcStream::from_unix(UnixStream::from(fd)))
    }

    /// Switch the listening socket between blocking and non-blocking accept.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "unix-domain-socket"
    }

    fn check_path_len(path: &Path) -> Result<()> {
        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path: path.to_path_buf(),
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }
        Ok(())
    }
}

impl AsRawFd for UnixDomainSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            debug!(?dir, "creating socket directory");
            DirBuilder::new()
                .recursive(true)
                .mode(UnixDomainSocket::PARENT_DIR_MODE)
                .create(dir)
        }
        _ => Ok(()),
    }
}

impl Drop for UnixDomainSocket {
    fn drop(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(
                    path = ?self.path,
                    "socket path identity changed; skipping cleanup"
                );
            }
        }
    }
}
