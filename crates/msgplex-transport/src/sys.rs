//! Thin wrappers over the socket syscalls.
//!
//! `std` folds socket creation, binding and listening into one call and hides
//! which step failed. The server needs to report each step separately and to
//! choose its own backlog, so descriptors are built here and handed to the
//! `std` socket types once they are fully set up.

use std::io;
use std::mem;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A socket address in the kernel's representation.
pub(crate) struct SockAddr {
    storage: libc::sockaddr_storage,
    len: libc::socklen_t,
}

impl SockAddr {
    pub(crate) fn from_inet(addr: &SocketAddr) -> Self {
        // SAFETY: sockaddr_storage is plain old data; all-zero is a valid value.
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        let len = match addr {
            SocketAddr::V4(v4) => {
                let sin = libc::sockaddr_in {
                    sin_family: libc::AF_INET as libc::sa_family_t,
                    sin_port: v4.port().to_be(),
                    sin_addr: libc::in_addr {
                        s_addr: u32::from_ne_bytes(v4.ip().octets()),
                    },
                    // SAFETY: remaining fields are padding / lengths where zero is valid.
                    ..unsafe { mem::zeroed() }
                };
                // SAFETY: sockaddr_storage is large and aligned enough for any sockaddr.
                unsafe {
                    std::ptr::write(
                        (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr_in>(),
                        sin,
                    );
                }
                mem::size_of::<libc::sockaddr_in>()
            }
            SocketAddr::V6(v6) => {
                let sin6 = libc::sockaddr_in6 {
                    sin6_family: libc::AF_INET6 as libc::sa_family_t,
                    sin6_port: v6.port().to_be(),
                    sin6_flowinfo: v6.flowinfo(),
                    sin6_addr: libc::in6_addr {
                        s6_addr: v6.ip().octets(),
                    },
                    sin6_scope_id: v6.scope_id(),
                    // SAFETY: remaining fields are padding / lengths where zero is valid.
                    ..unsafe { mem::zeroed() }
                };
                // SAFETY: sockaddr_storage is large and aligned enough for any sockaddr.
                unsafe {
                    std::ptr::write(
                        (&mut storage as *mut libc::sockaddr_storage)
                            .cast::<libc::sockaddr_in6>(),
                        sin6,
                    );
                }
                mem::size_of::<libc::sockaddr_in6>()
            }
        };

        Self {
            storage,
            len: len as libc::socklen_t,
        }
    }

    pub(crate) fn from_path(path: &Path) -> io::Result<Self> {
        // SAFETY: sockaddr_storage is plain old data; all-zero is a valid value.
        let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
        // SAFETY: sockaddr_storage is large and aligned enough for sockaddr_un.
        let sun = unsafe {
            &mut *(&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr_un>()
        };

        let bytes = path.as_os_str().as_bytes();
        // One byte is kept for the NUL terminator.
        if bytes.len() >= sun.sun_path.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path does not fit in sockaddr_un",
            ));
        }
        if bytes.contains(&0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "path contains an interior NUL byte",
            ));
        }

        sun.sun_family = libc::AF_UNIX as libc::sa_family_t;
        for (dst, src) in sun.sun_path.iter_mut().zip(bytes) {
            *dst = *src as libc::c_char;
        }

        let len = mem::offset_of!(libc::sockaddr_un, sun_path) + bytes.len() + 1;
        Ok(Self {
            storage,
            len: len as libc::socklen_t,
        })
    }

    fn as_ptr(&self) -> *const libc::sockaddr {
        (&self.storage as *const libc::sockaddr_storage).cast::<libc::sockaddr>()
    }
}

fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// Create a close-on-exec stream socket in `domain`.
pub(crate) fn socket(domain: libc::c_int) -> io::Result<OwnedFd> {
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    let ty = libc::SOCK_STREAM | libc::SOCK_CLOEXEC;
    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    let ty = libc::SOCK_STREAM;

    // SAFETY: socket() takes no pointers.
    let fd = cvt(unsafe { libc::socket(domain, ty, 0) })?;
    // SAFETY: `fd` was just returned by socket() and has no other owner.
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    {
        // SAFETY: `fd` is an open descriptor owned by this function.
        cvt(unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) })?;
    }

    Ok(fd)
}

pub(crate) fn bind(fd: &OwnedFd, addr: &SockAddr) -> io::Result<()> {
    // SAFETY: `addr` points to `addr.len` initialized bytes of a sockaddr.
    cvt(unsafe { libc::bind(fd.as_raw_fd(), addr.as_ptr(), addr.len) }).map(drop)
}

pub(crate) fn listen(fd: &OwnedFd, backlog: i32) -> io::Result<()> {
    // SAFETY: listen() takes no pointers; `fd` is open.
    cvt(unsafe { libc::listen(fd.as_raw_fd(), backlog) }).map(drop)
}

pub(crate) fn connect(fd: &OwnedFd, addr: &SockAddr) -> io::Result<()> {
    // SAFETY: `addr` points to `addr.len` initialized bytes of a sockaddr.
    cvt(unsafe { libc::connect(fd.as_raw_fd(), addr.as_ptr(), addr.len) }).map(drop)
}

pub(crate) fn set_int_option(
    fd: &OwnedFd,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    // SAFETY: `value` is a valid c_int for the duration of the call.
    cvt(unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            level,
            name,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    })
    .map(drop)
}

static UMASK_LOCK: Mutex<()> = Mutex::new(());

/// Restores the previous process umask when dropped.
///
/// The umask is process-wide, so concurrent guards are serialized.
pub(crate) struct UmaskGuard {
    previous: libc::mode_t,
    _lock: MutexGuard<'static, ()>,
}

impl UmaskGuard {
    pub(crate) fn set(mask: libc::mode_t) -> Self {
        let lock = UMASK_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        // SAFETY: umask() cannot fail and takes no pointers.
        let previous = unsafe { libc::umask(mask) };
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        // SAFETY: see `UmaskGuard::set`.
        unsafe {
            libc::umask(self.previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_sockaddr_rejects_oversized_path() {
        let long = "/tmp/".to_string() + &"x".repeat(300);
        let err = SockAddr::from_path(Path::new(&long))
            .err()
            .expect("oversized path must be rejected");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn path_sockaddr_length_includes_terminator() {
        let addr = SockAddr::from_path(Path::new("/tmp/a.sock")).unwrap();
        let expected = mem::offset_of!(libc::sockaddr_un, sun_path) + "/tmp/a.sock".len() + 1;
        assert_eq!(addr.len as usize, expected);
    }

    #[test]
    fn umask_guard_restores_previous_mask() {
        let first = UmaskGuard::set(0o077);
        let original = first.previous;
        drop(first);

        let second = UmaskGuard::set(0o077);
        assert_eq!(second.previous, original);
    }

    #[test]
    fn inet_sockaddr_lengths_follow_family() {
        let v4 = SockAddr::from_inet(&"127.0.0.1:80".parse().unwrap());
        let v6 = SockAddr::from_inet(&"[::1]:80".parse().unwrap());
        assert_eq!(v4.len as usize, mem::size_of::<libc::sockaddr_in>());
        assert_eq!(v6.len as usize, mem::size_of::<libc::sockaddr_in6>());
    }
}
