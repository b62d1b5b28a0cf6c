use std::net::SocketAddr;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::bounded;
use crossbeam::select;

use crate::cancel::CancelSignal;
use crate::error::{IoError, SocketError, errno, is_timeout_errno};
use crate::socket::options::{set_linger, set_read_timeout, set_tcp_nodelay, set_write_timeout};
use crate::socket::raw::{dial_socket, local_addr_of, peer_addr_of};
use crate::stats::Stats;
use crate::sys::{Native, PlatformOps};

/// The state a connection's I/O paths share.
///
/// Reference-counted because an abandoned cancellable-I/O worker keeps
/// using the descriptor after the caller has moved on; the fd is released
/// only when the last holder drops.
struct ConnShared {
	fd: OwnedFd,
	stats: Arc<Stats>,
	closed: AtomicBool,
}

impl ConnShared {
	/// Blocking read with instrumentation: every call bumps `read_calls`,
	/// transferred bytes land in `read_bytes`, failures are classified
	/// into timeout vs other. End of stream (`Ok(0)`) is not an error.
	fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
		let n = unsafe {
			libc::read(
				self.fd.as_raw_fd(),
				buf.as_mut_ptr() as *mut libc::c_void,
				buf.len(),
			)
		};
		if n == -1 {
			let e = errno();
			self.stats.read_bytes_add(0);
			if is_timeout_errno(e) {
				self.stats.read_timeouts_inc();
			} else {
				self.stats.read_errors_inc();
			}
			Err(IoError::Read { errno: e }.into())
		} else {
			self.stats.read_bytes_add(n as u64);
			Ok(n as usize)
		}
	}

	/// Blocking write, mirror of `read`. A failing write still accounts
	/// whatever the kernel accepted before the error (a single syscall
	/// either transfers bytes or fails, so that is 0 here).
	fn write(&self, buf: &[u8]) -> std::io::Result<usize> {
		let n = unsafe {
			libc::write(
				self.fd.as_raw_fd(),
				buf.as_ptr() as *const libc::c_void,
				buf.len(),
			)
		};
		if n == -1 {
			let e = errno();
			self.stats.written_bytes_add(0);
			if is_timeout_errno(e) {
				self.stats.write_timeouts_inc();
			} else {
				self.stats.write_errors_inc();
			}
			Err(IoError::Write { errno: e }.into())
		} else {
			self.stats.written_bytes_add(n as u64);
			Ok(n as usize)
		}
	}
}

/// An instrumented stream connection.
///
/// Wraps one connected socket plus the [`Stats`] it reports into — the
/// listener's shared instance for accepted connections, a private one for
/// dialed connections. Read, write and close update the counters; nothing
/// else does.
pub struct Connection {
	shared: Arc<ConnShared>,
}

impl Connection {
	pub(crate) fn from_fd(fd: OwnedFd, stats: Arc<Stats>) -> Self {
		Self {
			shared: Arc::new(ConnShared {
				fd,
				stats,
				closed: AtomicBool::new(false),
			}),
		}
	}

	/// Dials a blocking outbound connection with Nagle disabled.
	pub fn dial(addr: &str) -> std::io::Result<Self> {
		let fd = dial_socket(addr)?;
		set_tcp_nodelay(&fd, true)?;
		Ok(Self::from_fd(fd, Arc::new(Stats::new())))
	}

	/// Reads into `buf`, blocking until data, end of stream, timeout or
	/// error. `Ok(0)` is end of stream.
	pub fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
		self.shared.read(buf)
	}

	/// Writes `buf`, blocking until the kernel accepts bytes or the write
	/// times out/fails. May write fewer bytes than `buf.len()`.
	pub fn write(&self, buf: &[u8]) -> std::io::Result<usize> {
		self.shared.write(buf)
	}

	/// Like [`read`](Self::read), bounded by a cancellation signal.
	///
	/// The blocking read runs on a worker thread into a buffer private to
	/// this call and reports through a single-slot channel; this caller
	/// races that against the signal. If the signal wins, the call returns
	/// a cancellation error, `buf` is left untouched, and the worker is
	/// abandoned — it keeps running until its read returns (or the socket
	/// closes) and its result is discarded.
	pub fn read_context(&self, signal: &CancelSignal, buf: &mut [u8]) -> std::io::Result<usize> {
		// An already-fired signal cancels before any I/O is attempted.
		if signal.is_cancelled() {
			return Err(IoError::Cancelled.into());
		}
		let (tx, rx) = bounded::<(Vec<u8>, std::io::Result<usize>)>(1);
		let shared = Arc::clone(&self.shared);
		let len = buf.len();
		std::thread::Builder::new()
			.name("netline-read".into())
			.spawn(move || {
				let mut scratch = vec![0u8; len];
				let result = shared.read(&mut scratch);
				let _ = tx.send((scratch, result));
			})?;

		select! {
			recv(rx) -> msg => {
				let (scratch, result) = msg.map_err(|_| IoError::Read { errno: libc::EIO })?;
				let n = result?;
				buf[..n].copy_from_slice(&scratch[..n]);
				Ok(n)
			}
			recv(signal.receiver()) -> _ => Err(IoError::Cancelled.into()),
		}
	}

	/// Like [`write`](Self::write), bounded by a cancellation signal.
	/// Same worker/discard semantics as [`read_context`](Self::read_context).
	pub fn write_context(&self, signal: &CancelSignal, buf: &[u8]) -> std::io::Result<usize> {
		if signal.is_cancelled() {
			return Err(IoError::Cancelled.into());
		}
		let (tx, rx) = bounded::<std::io::Result<usize>>(1);
		let shared = Arc::clone(&self.shared);
		let owned = buf.to_vec();
		std::thread::Builder::new()
			.name("netline-write".into())
			.spawn(move || {
				let _ = tx.send(shared.write(&owned));
			})?;

		select! {
			recv(rx) -> msg => msg.map_err(|_| IoError::Write { errno: libc::EIO })?,
			recv(signal.receiver()) -> _ => Err(IoError::Cancelled.into()),
		}
	}

	/// Closes the connection exactly once.
	///
	/// Races between concurrent callers are settled by an atomic guard:
	/// one caller runs the close and updates `conns`/`close_errors`, the
	/// rest (and any later call) return Ok without re-executing. The
	/// socket is shut down in both directions immediately, which also
	/// unblocks abandoned cancellable-I/O workers; the descriptor itself
	/// is released when the last reference drops. That final `close(2)`
	/// runs inside drop, so an error from it is discarded and does not
	/// reach `close_errors` — only the shutdown here is accounted.
	pub fn close(&self) -> std::io::Result<()> {
		if self.shared.closed.swap(true, Ordering::AcqRel) {
			return Ok(());
		}
		let result = unsafe { libc::shutdown(self.shared.fd.as_raw_fd(), libc::SHUT_RDWR) };
		self.shared.stats.conns_inc();
		if result == -1 {
			self.shared.stats.close_errors_inc();
			return Err(SocketError::SetOption { errno: errno(), option: "shutdown" }.into());
		}
		Ok(())
	}

	/// Re-enable (or disable again) Nagle's algorithm for this connection.
	pub fn set_nodelay(&self, enable: bool) -> std::io::Result<()> {
		set_tcp_nodelay(&self.shared.fd, enable)
	}

	/// Enables keep-alive probing with `secs` as idle threshold and probe
	/// interval.
	pub fn set_keepalive(&self, secs: u32) -> std::io::Result<()> {
		Native::set_keepalive(&self.shared.fd, secs)
	}

	/// Sets SO_LINGER close behavior.
	pub fn set_linger(&self, linger: Option<u32>) -> std::io::Result<()> {
		set_linger(&self.shared.fd, linger)
	}

	/// Bounds blocking reads; a tripped bound counts as a read timeout.
	pub fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
		set_read_timeout(&self.shared.fd, timeout)
	}

	/// Bounds blocking writes; a tripped bound counts as a write timeout.
	pub fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
		set_write_timeout(&self.shared.fd, timeout)
	}

	pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
		local_addr_of(&self.shared.fd)
	}

	pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
		peer_addr_of(&self.shared.fd)
	}
}

impl std::io::Read for Connection {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		Connection::read(self, buf)
	}
}

impl std::io::Write for Connection {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		Connection::write(self, buf)
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())
	}
}

impl AsRawFd for Connection {
	fn as_raw_fd(&self) -> std::os::fd::RawFd {
		self.shared.fd.as_raw_fd()
	}
}

impl std::fmt::Debug for Connection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Connection")
			.field("fd", &self.shared.fd.as_raw_fd())
			.field("closed", &self.shared.closed.load(Ordering::Relaxed))
			.finish()
	}
}
