use std::os::fd::{AsRawFd, OwnedFd};

use super::{DEFAULT_BACKLOG, PlatformOps, setsockopt_int};

/// BSD-family socket provider (Darwin included).
///
/// Port reuse exists everywhere in this family; defer-accept and fast-open
/// queue tuning do not, and degrade to no-ops per the best-effort contract.
pub(crate) struct Bsd;

impl PlatformOps for Bsd {
	#[cfg(any(target_os = "macos", target_os = "ios"))]
	fn new_stream_socket(domain: libc::c_int, nonblocking: bool) -> std::io::Result<OwnedFd> {
		// Darwin has no SOCK_CLOEXEC/SOCK_NONBLOCK socket() flags; the
		// post-creation fcntl window is unavoidable here.
		super::new_stream_socket_fcntl(domain, nonblocking)
	}

	#[cfg(not(any(target_os = "macos", target_os = "ios")))]
	fn new_stream_socket(domain: libc::c_int, nonblocking: bool) -> std::io::Result<OwnedFd> {
		use std::os::fd::FromRawFd;

		use crate::error::{SocketError, errno};

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

	fn enable_defer_accept<S: AsRawFd>(_socket: &S) -> std::io::Result<()> {
		// No TCP_DEFER_ACCEPT in this family.
		Ok(())
	}

	fn enable_fast_open<S: AsRawFd>(_socket: &S, _queue_len: libc::c_int) -> std::io::Result<()> {
		// No listener-side fast-open queue tuning in this family.
		Ok(())
	}

	fn somaxconn() -> libc::c_int {
		if libc::SOMAXCONN > 0 { libc::SOMAXCONN } else { DEFAULT_BACKLOG }
	}

	#[cfg(any(target_os = "macos", target_os = "ios"))]
	fn set_keepalive<S: AsRawFd>(socket: &S, secs: u32) -> std::io::Result<()> {
		let secs = secs as libc::c_int;
		setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1, "SO_KEEPALIVE")?;
		// Older Darwin releases lack TCP_KEEPINTVL; tolerate and fall
		// through to TCP_KEEPALIVE, which sets the idle threshold.
		match setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, secs, "TCP_KEEPINTVL") {
			Ok(()) => {}
			Err(err) if option_errno(&err) == Some(libc::ENOPROTOOPT) => {}
			Err(err) => return Err(err),
		}
		setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPALIVE, secs, "TCP_KEEPALIVE")
	}

	#[cfg(not(any(target_os = "macos", target_os = "ios")))]
	fn set_keepalive<S: AsRawFd>(socket: &S, secs: u32) -> std::io::Result<()> {
		let secs = secs as libc::c_int;
		setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1, "SO_KEEPALIVE")?;
		setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, secs, "TCP_KEEPINTVL")?;
		setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, 1, "TCP_KEEPCNT")?;
		setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, secs, "TCP_KEEPIDLE")
	}

	#[cfg(any(target_os = "macos", target_os = "ios"))]
	fn accept_cloexec<S: AsRawFd>(socket: &S) -> std::io::Result<OwnedFd> {
		super::accept_cloexec_fcntl(socket)
	}

	#[cfg(not(any(target_os = "macos", target_os = "ios")))]
	fn accept_cloexec<S: AsRawFd>(socket: &S) -> std::io::Result<OwnedFd> {
		super::accept_cloexec_accept4(socket)
	}
}

/// Pulls the errno back out of a wrapped setsockopt error.
#[cfg(any(target_os = "macos", target_os = "ios"))]
fn option_errno(err: &std::io::Error) -> Option<i32> {
	err.get_ref()
		.and_then(|inner| inner.downcast_ref::<crate::error::SocketError>())
		.and_then(|sock| match sock {
			crate::error::SocketError::SetOption { errno, .. } => Some(*errno),
			_ => None,
		})
}
