//! Platform socket providers.
//!
//! Everything platform-variant lives behind [`PlatformOps`]: the numeric
//! identifiers for port reuse and fast-open differ between Linux and the
//! BSD family, defer-accept only exists on Linux, and Darwin cannot ask
//! `socket()` for close-on-exec atomically. One variant is selected per
//! target at build time as [`Native`]; the rest of the crate never touches
//! a platform constant directly.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use crate::error::{SocketError, errno};

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) type Native = linux::Linux;

#[cfg(any(
	target_os = "macos",
	target_os = "ios",
	target_os = "freebsd",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "dragonfly"
))]
mod bsd;
#[cfg(any(
	target_os = "macos",
	target_os = "ios",
	target_os = "freebsd",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "dragonfly"
))]
pub(crate) type Native = bsd::Bsd;

#[cfg(not(any(
	target_os = "linux",
	target_os = "android",
	target_os = "macos",
	target_os = "ios",
	target_os = "freebsd",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "dragonfly"
)))]
mod fallback;
#[cfg(not(any(
	target_os = "linux",
	target_os = "android",
	target_os = "macos",
	target_os = "ios",
	target_os = "freebsd",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "dragonfly"
)))]
pub(crate) type Native = fallback::Fallback;

/// Conservative backlog when the OS-wide limit cannot be read.
pub(crate) const DEFAULT_BACKLOG: libc::c_int = 128;

/// The option-application contract every platform variant implements.
///
/// Methods documented as best-effort must silently no-op where the kernel
/// lacks the tunable; construction never fails on a missing nicety.
pub(crate) trait PlatformOps {
	/// Creates a stream socket that is close-on-exec, and non-blocking when
	/// asked, atomically with creation where the OS can. The atomicity
	/// matters: a fork between `socket()` and `fcntl()` would leak the
	/// descriptor into the child.
	fn new_stream_socket(domain: libc::c_int, nonblocking: bool) -> std::io::Result<OwnedFd>;

	/// Enables port-level reuse (SO_REUSEPORT) so multiple independent
	/// listeners can bind one address. Best-effort on platforms without it.
	fn enable_reuse_port<S: AsRawFd>(socket: &S) -> std::io::Result<()>;

	/// Asks the kernel to withhold accept completion until data arrives
	/// (TCP_DEFER_ACCEPT). Best-effort; Linux only.
	fn enable_defer_accept<S: AsRawFd>(socket: &S) -> std::io::Result<()>;

	/// Enables the fast-open queue with the given length. Best-effort;
	/// Linux only.
	fn enable_fast_open<S: AsRawFd>(socket: &S, queue_len: libc::c_int) -> std::io::Result<()>;

	/// The OS-wide default listen backlog limit.
	fn somaxconn() -> libc::c_int;

	/// Enables keep-alive probing with `secs` as both the idle threshold
	/// and the probe interval.
	fn set_keepalive<S: AsRawFd>(socket: &S, secs: u32) -> std::io::Result<()>;

	/// Accepts one pending connection as a close-on-exec descriptor.
	/// Failures preserve the raw OS error for retry classification.
	fn accept_cloexec<S: AsRawFd>(socket: &S) -> std::io::Result<OwnedFd>;
}

/// Shared `setsockopt` plumbing for integer-valued options.
pub(crate) fn setsockopt_int<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	option: libc::c_int,
	value: libc::c_int,
	name: &'static str,
) -> std::io::Result<()> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			option,
			&value as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option: name }.into())
	} else {
		Ok(())
	}
}

/// Portable socket creation: plain `socket()` followed by `fcntl` flags.
/// Used where the OS cannot apply the flags atomically.
#[allow(dead_code)]
pub(crate) fn new_stream_socket_fcntl(
	domain: libc::c_int,
	nonblocking: bool,
) -> std::io::Result<OwnedFd> {
	let fd = unsafe { libc::socket(domain, libc::SOCK_STREAM, 0) };
	if fd == -1 {
		return Err(SocketError::Create { errno: errno() }.into());
	}
	let fd = unsafe { OwnedFd::from_raw_fd(fd) };

	let result = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
	if result == -1 {
		return Err(SocketError::SetOption { errno: errno(), option: "FD_CLOEXEC" }.into());
	}
	if nonblocking {
		set_nonblocking(&fd, true)?;
	}
	Ok(fd)
}

/// Sets or clears `O_NONBLOCK`.
pub(crate) fn set_nonblocking<S: AsRawFd>(socket: &S, nonblocking: bool) -> std::io::Result<()> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFL) };
	if flags == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" }.into());
	}
	let new_flags = if nonblocking {
		flags | libc::O_NONBLOCK
	} else {
		flags & !libc::O_NONBLOCK
	};
	let result = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_SETFL, new_flags) };
	if result == -1 {
		return Err(SocketError::SetOption { errno: errno(), option: "O_NONBLOCK" }.into());
	}
	Ok(())
}

/// Portable accept for platforms without `accept4`: accept, then mark the
/// new descriptor close-on-exec and blocking.
///
/// BSD-derived kernels make the accepted socket inherit the listener's
/// file-status flags, and the listener runs non-blocking; the connection
/// must not.
#[allow(dead_code)]
pub(crate) fn accept_cloexec_fcntl<S: AsRawFd>(socket: &S) -> std::io::Result<OwnedFd> {
	let fd = unsafe { libc::accept(socket.as_raw_fd(), std::ptr::null_mut(), std::ptr::null_mut()) };
	if fd == -1 {
		return Err(std::io::Error::last_os_error());
	}
	let fd = unsafe { OwnedFd::from_raw_fd(fd) };
	let result = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) };
	if result == -1 {
		return Err(std::io::Error::last_os_error());
	}
	set_nonblocking(&fd, false)?;
	Ok(fd)
}

/// `accept4`-based accept for platforms that have it.
#[allow(dead_code)]
#[cfg(any(
	target_os = "linux",
	target_os = "android",
	target_os = "freebsd",
	target_os = "netbsd",
	target_os = "openbsd",
	target_os = "dragonfly"
))]
pub(crate) fn accept_cloexec_accept4<S: AsRawFd>(socket: &S) -> std::io::Result<OwnedFd> {
	let fd = unsafe {
		libc::accept4(
			socket.as_raw_fd(),
			std::ptr::null_mut(),
			std::ptr::null_mut(),
			libc::SOCK_CLOEXEC,
		)
	};
	if fd == -1 {
		return Err(std::io::Error::last_os_error());
	}
	Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}
