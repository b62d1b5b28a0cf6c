use std::os::fd::AsRawFd;
use std::time::Duration;

use crate::error::{SocketError, errno};
use crate::sys::setsockopt_int;

/// Default fast-open queue length when the caller leaves it unset.
pub(crate) const DEFAULT_FAST_OPEN_QUEUE_LEN: i32 = 256;

/// Kernel tunables to apply to a listening socket.
///
/// Immutable once handed to [`Listener::bind`](crate::Listener::bind).
/// Everything defaults to off; address reuse (SO_REUSEADDR) is always on
/// and Nagle is always disabled on accepted sockets — those are policy,
/// not options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketOptions {
	/// Enable SO_REUSEPORT so several independent listeners can share one
	/// address, with the kernel distributing incoming connections.
	pub reuse_port: bool,

	/// Enable TCP_DEFER_ACCEPT: accept completes only once data arrived.
	/// Silently skipped on platforms without it.
	pub defer_accept: bool,

	/// Enable TCP_FASTOPEN on the listen queue.
	/// Silently skipped on platforms without it.
	pub fast_open: bool,

	/// Queue length for TCP_FASTOPEN; 0 means the default of 256.
	pub fast_open_queue_len: i32,

	/// Listen backlog; 0 means the OS-wide default limit.
	pub backlog: i32,
}

impl SocketOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn reuse_port(mut self, enable: bool) -> Self {
		self.reuse_port = enable;
		self
	}

	pub fn defer_accept(mut self, enable: bool) -> Self {
		self.defer_accept = enable;
		self
	}

	pub fn fast_open(mut self, enable: bool) -> Self {
		self.fast_open = enable;
		self
	}

	pub fn fast_open_queue_len(mut self, len: i32) -> Self {
		self.fast_open_queue_len = len;
		self
	}

	pub fn backlog(mut self, backlog: i32) -> Self {
		self.backlog = backlog;
		self
	}

	pub(crate) fn effective_fast_open_queue_len(&self) -> i32 {
		if self.fast_open_queue_len > 0 {
			self.fast_open_queue_len
		} else {
			DEFAULT_FAST_OPEN_QUEUE_LEN
		}
	}
}

/// Sets SO_REUSEADDR on a socket.
///
/// Allows binding to an address that's in TIME_WAIT state.
/// Essential for server restarts.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> std::io::Result<()> {
	setsockopt_int(
		socket,
		libc::SOL_SOCKET,
		libc::SO_REUSEADDR,
		enable as libc::c_int,
		"SO_REUSEADDR",
	)
}

/// Sets TCP_NODELAY on a socket.
///
/// Disables Nagle's algorithm — sends data immediately.
/// Accepted connections get this by default; re-enable per connection if
/// throughput batching matters more than latency.
pub fn set_tcp_nodelay<S: AsRawFd>(socket: &S, enable: bool) -> std::io::Result<()> {
	setsockopt_int(
		socket,
		libc::IPPROTO_TCP,
		libc::TCP_NODELAY,
		enable as libc::c_int,
		"TCP_NODELAY",
	)
}

/// Sets socket linger behavior (SO_LINGER).
///
/// - `None` — default close: return immediately, kernel flushes in background
/// - `Some(0)` — hard reset (RST), no TIME_WAIT
/// - `Some(n)` — close blocks up to n seconds draining unsent data
pub fn set_linger<S: AsRawFd>(socket: &S, linger: Option<u32>) -> std::io::Result<()> {
	let val = match linger {
		None => libc::linger { l_onoff: 0, l_linger: 0 },
		Some(seconds) => libc::linger {
			l_onoff: 1,
			l_linger: seconds as libc::c_int,
		},
	};
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			libc::SOL_SOCKET,
			libc::SO_LINGER,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::linger>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option: "SO_LINGER" }.into())
	} else {
		Ok(())
	}
}

/// Bounds blocking reads (SO_RCVTIMEO). `None` clears the bound.
///
/// A read that trips the bound fails with a timeout-class errno, which the
/// instrumentation counts under `read_timeouts`.
pub fn set_read_timeout<S: AsRawFd>(socket: &S, timeout: Option<Duration>) -> std::io::Result<()> {
	set_timeval(socket, libc::SO_RCVTIMEO, timeout, "SO_RCVTIMEO")
}

/// Bounds blocking writes (SO_SNDTIMEO). `None` clears the bound.
pub fn set_write_timeout<S: AsRawFd>(socket: &S, timeout: Option<Duration>) -> std::io::Result<()> {
	set_timeval(socket, libc::SO_SNDTIMEO, timeout, "SO_SNDTIMEO")
}

fn set_timeval<S: AsRawFd>(
	socket: &S,
	option: libc::c_int,
	timeout: Option<Duration>,
	name: &'static str,
) -> std::io::Result<()> {
	let val = match timeout {
		None => libc::timeval { tv_sec: 0, tv_usec: 0 },
		Some(d) => libc::timeval {
			tv_sec: d.as_secs() as libc::time_t,
			tv_usec: d.subsec_micros() as libc::suseconds_t,
		},
	};
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			libc::SOL_SOCKET,
			option,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::timeval>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option: name }.into())
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_all_off() {
		let opts = SocketOptions::new();
		assert!(!opts.reuse_port);
		assert!(!opts.defer_accept);
		assert!(!opts.fast_open);
		assert_eq!(opts.fast_open_queue_len, 0);
		assert_eq!(opts.backlog, 0);
	}

	#[test]
	fn fast_open_queue_len_defaults_to_256() {
		assert_eq!(SocketOptions::new().effective_fast_open_queue_len(), 256);
		assert_eq!(
			SocketOptions::new()
				.fast_open_queue_len(64)
				.effective_fast_open_queue_len(),
			64
		);
	}

	#[test]
	fn builder_chains() {
		let opts = SocketOptions::new().reuse_port(true).backlog(32);
		assert!(opts.reuse_port);
		assert_eq!(opts.backlog, 32);
	}
}
