use std::net::SocketAddr;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{Sender, bounded};
use crossbeam::select;

use crate::addr::Family;
use crate::cancel::CancelSignal;
use crate::error::{SocketError, errno};
use crate::socket::conn::Connection;
use crate::socket::options::{SocketOptions, set_tcp_nodelay};
use crate::socket::raw::{bind_listen_socket, local_addr_of, wait_readable};
use crate::stats::Stats;
use crate::sys::{Native, PlatformOps};

/// Backoff between retries of a transient accept failure.
const ACCEPT_RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// How often a blocked accept re-checks for listener closure. Purely an
/// internal tick; accept still appears to block indefinitely.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// State shared between the listener, its accept callers and the
/// cancellation watcher. The watcher holds a clone, so the descriptor
/// stays alive until it exits.
#[derive(Debug)]
struct ListenerShared {
    fd: OwnedFd,
    closed: AtomicBool,
}

impl ListenerShared {
    /// Shuts the accept queue down exactly once. Idempotent in effect:
    /// later calls are no-ops and pending accepts fail cleanly.
    fn close(&self) -> std::io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(fd = self.fd.as_raw_fd(), "closing listening socket");
        let result = unsafe { libc::shutdown(self.fd.as_raw_fd(), libc::SHUT_RD) };
        // ENOTCONN from shutting down a listening socket is expected on
        // some kernels; the closed flag is what accept keys off either way.
        if result == -1 && errno() != libc::ENOTCONN {
            return Err(SocketError::SetOption { errno: errno(), option: "shutdown" }.into());
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// A listening TCP socket with kernel tuning, accept instrumentation and
/// cooperative cancellation.
///
/// Construction binds and listens (or fails — there is no half-built
/// listener). A background watcher observes the cancellation signal passed
/// to [`bind`](Self::bind) and closes the socket when it fires, which
/// unblocks any in-flight [`accept`](Self::accept) with an error.
#[derive(Debug)]
pub struct Listener {
    shared: Arc<ListenerShared>,
    stats: Arc<Stats>,
    watcher_done: Sender<()>,
}

impl Listener {
    /// Binds a listening socket for `network` (`tcp`, `tcp4` or `tcp6`)
    /// on `addr` (`host:port`) with the given tunables.
    ///
    /// `signal` bounds the listener's lifetime: when it fires, the socket
    /// closes and every pending or future accept fails.
    pub fn bind(
        signal: CancelSignal,
        network: &str,
        addr: &str,
        options: SocketOptions,
    ) -> std::io::Result<Self> {
        let family = Family::parse(network)?;
        let fd = bind_listen_socket(family, addr, &options)?;

        let shared = Arc::new(ListenerShared {
            fd,
            closed: AtomicBool::new(false),
        });

        // The watcher exits either because the signal fired (close the
        // socket) or because the listener itself closed or dropped
        // (nothing left to watch). Without the done channel the thread —
        // and the descriptor it pins — would outlive the listener.
        let (done_tx, done_rx) = bounded::<()>(1);
        let watcher_shared = Arc::clone(&shared);
        std::thread::Builder::new()
            .name("netline-watcher".into())
            .spawn(move || {
                select! {
                    recv(signal.receiver()) -> _ => {
                        if let Err(err) = watcher_shared.close() {
                            tracing::debug!(%err, "close on cancellation failed");
                        }
                    }
                    recv(done_rx) -> _ => {}
                }
            })?;

        Ok(Self {
            shared,
            stats: Arc::new(Stats::new()),
            watcher_done: done_tx,
        })
    }

    /// Accepts the next connection.
    ///
    /// Blocks until a connection arrives, the listener is closed (by
    /// [`close`](Self::close) or the cancellation signal), or a
    /// non-transient error occurs. Transient failures (EINTR, aborted
    /// handshakes, timeout-class errno) are retried internally after a
    /// fixed 10ms backoff and never surface; there is no retry cap, so a
    /// listener stuck in sustained transient failure is terminated by
    /// closing it.
    ///
    /// Every accept attempt bumps `accepts`; successful ones bump
    /// `active_conns`, failing ones `accept_errors`.
    pub fn accept(&self) -> std::io::Result<Connection> {
        loop {
            if self.shared.is_closed() {
                self.stats.accepts_inc();
                self.stats.accept_errors_inc();
                return Err(SocketError::ListenerClosed.into());
            }

            // The listening socket is non-blocking; poll supplies the
            // blocking, with a bounded tick so closure is observed on
            // every platform.
            match wait_readable(&self.shared.fd, ACCEPT_POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(err) => {
                    self.stats.accepts_inc();
                    self.stats.accept_errors_inc();
                    return Err(err);
                }
            }

            match Native::accept_cloexec(&self.shared.fd) {
                Ok(fd) => {
                    self.stats.accepts_inc();
                    // Low-latency by default; callers can re-enable Nagle
                    // per connection.
                    if let Err(err) = set_tcp_nodelay(&fd, true) {
                        self.stats.accept_errors_inc();
                        return Err(err);
                    }
                    self.stats.active_conns_inc();
                    return Ok(Connection::from_fd(fd, Arc::clone(&self.stats)));
                }
                Err(err) if is_transient_accept_error(&err) => {
                    self.stats.accepts_inc();
                    tracing::debug!(%err, "transient accept failure, retrying");
                    std::thread::sleep(ACCEPT_RETRY_BACKOFF);
                }
                Err(err) => {
                    self.stats.accepts_inc();
                    self.stats.accept_errors_inc();
                    return Err(SocketError::Accept {
                        errno: err.raw_os_error().unwrap_or(0),
                    }
                    .into());
                }
            }
        }
    }

    /// The shared counters for this listener and every connection it has
    /// accepted. Read-only; the instance lives as long as any derived
    /// connection does.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The address the socket is actually bound to (resolves ephemeral
    /// ports).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        local_addr_of(&self.shared.fd)
    }

    /// Closes the listener. Idempotent; pending accepts fail with a
    /// closed-listener error.
    pub fn close(&self) -> std::io::Result<()> {
        let _ = self.watcher_done.try_send(());
        self.shared.close()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        // Release the watcher so it does not pin the descriptor forever.
        let _ = self.watcher_done.try_send(());
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.shared.fd.as_raw_fd()
    }
}

/// Transient accept-failure class: retried with backoff, never surfaced.
fn is_transient_accept_error(err: &std::io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EINTR)
            | Some(libc::ECONNABORTED)
            | Some(libc::EAGAIN)
            | Some(libc::ETIMEDOUT)
    )
}
