//! Readiness wait over a set of descriptors using `poll(2)`.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

const READY_MASK: libc::c_short = libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;

/// Reusable `pollfd` set.
///
/// Descriptors keep the index they were pushed at.
#[derive(Default)]
pub(crate) struct PollSet {
    fds: Vec<libc::pollfd>,
}

impl PollSet {
    pub(crate) fn clear(&mut self) {
        self.fds.clear();
    }

    pub(crate) fn push(&mut self, fd: RawFd) {
        self.fds.push(libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.fds.len()
    }

    /// Block for up to `timeout` (`None` waits indefinitely) and return the
    /// number of ready descriptors.
    ///
    /// An interrupted wait reports zero ready descriptors.
    pub(crate) fn wait(&mut self, timeout: Option<Duration>) -> io::Result<usize> {
        for pollfd in &mut self.fds {
            pollfd.revents = 0;
        }

        let timeout_ms = timeout_to_millis(timeout);
        // SAFETY: `fds` is a valid, exclusively borrowed slice of pollfd
        // structs and its length is passed alongside it.
        let rc = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };

        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(rc as usize)
    }

    /// Whether the descriptor at `index` became readable, hung up or errored.
    pub(crate) fn is_ready(&self, index: usize) -> bool {
        self.fds
            .get(index)
            .is_some_and(|pollfd| pollfd.revents & READY_MASK != 0)
    }
}

fn timeout_to_millis(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(duration) => {
            let mut millis = duration.as_millis();
            // Round sub-millisecond waits up so they don't turn into busy polls.
            if millis == 0 && !duration.is_zero() {
                millis = 1;
            }
            millis.min(libc::c_int::MAX as u128) as libc::c_int
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    extern "C" fn ignore_signal(_: libc::c_int) {}

    /// Run `wait` on the current thread while another thread keeps hitting
    /// it with `SIGUSR1` (handled, no `SA_RESTART`) until it returns.
    pub(crate) fn interrupted_repeatedly<R>(wait: impl FnOnce() -> R) -> R {
        // SAFETY: the action struct is fully initialized before use and the
        // handler does nothing.
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = ignore_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = 0;
            libc::sigemptyset(&mut action.sa_mask);
            assert_eq!(
                libc::sigaction(libc::SIGUSR1, &action, std::ptr::null_mut()),
                0
            );
        }

        // SAFETY: pthread_self has no preconditions.
        let target = unsafe { libc::pthread_self() } as usize;
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        let signaller = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(20));
                // SAFETY: the target thread stays alive until this thread is joined.
                unsafe {
                    libc::pthread_kill(target as libc::pthread_t, libc::SIGUSR1);
                }
            }
        });

        let result = wait();
        done.store(true, Ordering::SeqCst);
        signaller.join().expect("signal thread should finish");
        result
    }

    #[test]
    fn timeout_conversion() {
        assert_eq!(timeout_to_millis(None), -1);
        assert_eq!(timeout_to_millis(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_to_millis(Some(Duration::from_micros(10))), 1);
        assert_eq!(timeout_to_millis(Some(Duration::from_millis(250))), 250);
        assert_eq!(
            timeout_to_millis(Some(Duration::from_secs(u64::MAX))),
            libc::c_int::MAX
        );
    }

    #[test]
    fn nothing_ready_times_out() {
        let (left, _right) = UnixStream::pair().unwrap();
        let mut set = PollSet::default();
        set.push(left.as_raw_fd());
        assert_eq!(set.wait(Some(Duration::from_millis(10))).unwrap(), 0);
        assert!(!set.is_ready(0));
    }

    #[test]
    fn readable_descriptors_reported_by_index() {
        let (a, mut a_peer) = UnixStream::pair().unwrap();
        let (b, _b_peer) = UnixStream::pair().unwrap();
        let (c, mut c_peer) = UnixStream::pair().unwrap();
        a_peer.write_all(b"x").unwrap();
        c_peer.write_all(b"y").unwrap();

        let mut set = PollSet::default();
        set.push(a.as_raw_fd());
        set.push(b.as_raw_fd());
        set.push(c.as_raw_fd());
        assert_eq!(set.len(), 3);

        assert_eq!(set.wait(Some(Duration::ZERO)).unwrap(), 2);
        assert!(set.is_ready(0));
        assert!(!set.is_ready(1));
        assert!(set.is_ready(2));
    }

    #[test]
    fn hangup_counts_as_ready() {
        let (left, right) = UnixStream::pair().unwrap();
        drop(right);
        let mut set = PollSet::default();
        set.push(left.as_raw_fd());
        assert_eq!(set.wait(Some(Duration::ZERO)).unwrap(), 1);
        assert!(set.is_ready(0));
    }

    #[test]
    fn clear_resets_the_set() {
        let (left, _right) = UnixStream::pair().unwrap();
        let mut set = PollSet::default();
        set.push(left.as_raw_fd());
        set.clear();
        assert_eq!(set.len(), 0);
        assert!(!set.is_ready(0));
    }

    #[test]
    fn interrupted_wait_reports_nothing_ready() {
        let (left, _right) = UnixStream::pair().unwrap();
        let mut set = PollSet::default();
        set.push(left.as_raw_fd());

        let started = Instant::now();
        let ready = interrupted_repeatedly(|| set.wait(Some(Duration::from_secs(5))));
        assert_eq!(ready.expect("interruption should not be an error"), 0);
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(!set.is_ready(0));
    }
}
