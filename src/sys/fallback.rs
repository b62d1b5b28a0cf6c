use std::os::fd::{AsRawFd, OwnedFd};

use super::{DEFAULT_BACKLOG, PlatformOps, setsockopt_int};

/// Provider for Unix-likes outside the Linux and BSD families.
///
/// Kernel tuning is best-effort here: everything beyond the portable
/// baseline degrades to a no-op.
pub(crate) struct Fallback;

impl PlatformOps for Fallback {
	fn new_stream_socket(domain: libc::c_int, nonblocking: bool) -> std::io::Result<OwnedFd> {
		super::new_stream_socket_fcntl(domain, nonblocking)
	}

	fn enable_reuse_port<S: AsRawFd>(_socket: &S) -> std::io::Result<()> {
		tracing::debug!("SO_REUSEPORT not available on this platform, skipping");
		Ok(())
	}

	fn enable_defer_accept<S: AsRawFd>(_socket: &S) -> std::io::Result<()> {
		Ok(())
	}

	fn enable_fast_open<S: AsRawFd>(_socket: &S, _queue_len: libc::c_int) -> std::io::Result<()> {
		Ok(())
	}

	fn somaxconn() -> libc::c_int {
		DEFAULT_BACKLOG
	}

	fn set_keepalive<S: AsRawFd>(socket: &S, _secs: u32) -> std::io::Result<()> {
		setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1, "SO_KEEPALIVE")
	}

	fn accept_cloexec<S: AsRawFd>(socket: &S) -> std::io::Result<OwnedFd> {
		super::accept_cloexec_fcntl(socket)
	}
}
