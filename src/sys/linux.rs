use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use super::{DEFAULT_BACKLOG, PlatformOps, setsockopt_int};
use crate::error::{SocketError, errno};

const SOMAXCONN_FILE: &str = "/proc/sys/net/core/somaxconn";

/// Linux socket provider.
pub(crate) struct Linux;

impl PlatformOps for Linux {
	fn new_stream_socket(domain: libc::c_int, nonblocking: bool) -> std::io::Result<OwnedFd> {
		let mut flags = libc::SOCK_STREAM | libc::SOCK_CLOEXEC;
		if nonblocking {
			flags |= libc::SOCK_NONBLOCK;
		}
		let fd = unsafe { libc::socket(domain, flags, 0) };
		if fd == -1 {
			return Err(SocketError::Create { errno: errno() }.into());
		}
		Ok(unsafe { OwnedFd::from_raw_fd(fd) })
	}

	fn enable_reuse_port<S: AsRawFd>(socket: &S) -> std::io::Result<()> {
		setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_REUSEPORT, 1, "SO_REUSEPORT")
	}

	fn enable_defer_accept<S: AsRawFd>(socket: &S) -> std::io::Result<()> {
		setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_DEFER_ACCEPT, 1, "TCP_DEFER_ACCEPT")
	}

	fn enable_fast_open<S: AsRawFd>(socket: &S, queue_len: libc::c_int) -> std::io::Result<()> {
		setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_FASTOPEN, queue_len, "TCP_FASTOPEN")
	}

	/// Reads the system-wide limit from procfs. Any failure falls back to
	/// the conservative default rather than aborting construction.
	fn somaxconn() -> libc::c_int {
		let raw = match std::fs::read_to_string(SOMAXCONN_FILE) {
			Ok(s) => s,
			Err(err) => {
				tracing::debug!(file = SOMAXCONN_FILE, %err, "cannot read somaxconn");
				return DEFAULT_BACKLOG;
			}
		};
		match raw.trim().parse::<i64>() {
			// The kernel stores the backlog in a u16; larger values would
			// wrap when passed to listen().
			Ok(n) if n > 0 => n.min(i64::from(u16::MAX)) as libc::c_int,
			_ => {
				tracing::debug!(file = SOMAXCONN_FILE, value = raw.trim(), "cannot parse somaxconn");
				DEFAULT_BACKLOG
			}
		}
	}

	fn set_keepalive<S: AsRawFd>(socket: &S, secs: u32) -> std::io::Result<()> {
		let secs = secs as libc::c_int;
		setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1, "SO_KEEPALIVE")?;
		setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, secs, "TCP_KEEPINTVL")?;
		setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, 1, "TCP_KEEPCNT")?;
		setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, secs, "TCP_KEEPIDLE")
	}

	fn accept_cloexec<S: AsRawFd>(socket: &S) -> std::io::Result<OwnedFd> {
		super::accept_cloexec_accept4(socket)
	}
}
