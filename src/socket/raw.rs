//! Raw socket construction.
//!
//! Builds the bound, listening, non-blocking descriptor a [`Listener`]
//! wraps, and the blocking outbound descriptor the pool dials. All
//! platform-variant identifiers stay behind [`crate::sys::Native`]; this
//! module only sequences them.

use std::net::SocketAddr;
use std::os::fd::{AsRawFd, OwnedFd};
use std::time::Duration;

use crate::addr::{Family, from_sockaddr, resolve, with_sockaddr};
use crate::error::{SocketError, errno};
use crate::socket::options::{SocketOptions, set_reuse_addr};
use crate::sys::{Native, PlatformOps};

/// Resolves `addr`, creates a non-blocking close-on-exec socket, applies
/// the requested tunables in order, binds and listens.
///
/// Fails fast: any step other than a best-effort tunable aborts with an
/// error naming the responsible operation. No partially set up descriptor
/// escapes (the fd closes on drop).
pub(crate) fn bind_listen_socket(
	family: Family,
	addr: &str,
	options: &SocketOptions,
) -> std::io::Result<OwnedFd> {
	let resolved = resolve(family, addr)?;
	let socket = Native::new_stream_socket(Family::domain(&resolved), true)?;

	set_reuse_addr(&socket, true)?;
	if options.reuse_port {
		Native::enable_reuse_port(&socket)?;
	}
	if options.defer_accept {
		Native::enable_defer_accept(&socket)?;
	}
	if options.fast_open {
		Native::enable_fast_open(&socket, options.effective_fast_open_queue_len())?;
	}

	let result = with_sockaddr(&resolved, |ptr, len| unsafe {
		libc::bind(socket.as_raw_fd(), ptr, len)
	});
	if result == -1 {
		return Err(SocketError::Bind {
			errno: errno(),
			addr: resolved.to_string(),
		}
		.into());
	}

	let backlog = effective_backlog(options.backlog);
	let result = unsafe { libc::listen(socket.as_raw_fd(), backlog) };
	if result == -1 {
		return Err(SocketError::Listen { errno: errno(), backlog }.into());
	}

	tracing::debug!(
		addr = %resolved,
		backlog,
		reuse_port = options.reuse_port,
		defer_accept = options.defer_accept,
		fast_open = options.fast_open,
		"listening socket ready"
	);
	Ok(socket)
}

/// Caller backlog when given, otherwise the OS-wide default. Either way
/// clamped to the u16 the kernel actually stores.
fn effective_backlog(requested: i32) -> libc::c_int {
	let backlog = if requested > 0 {
		requested
	} else {
		Native::somaxconn()
	};
	backlog.min(i32::from(u16::MAX))
}

/// Dials a blocking outbound connection to `addr` (close-on-exec).
pub(crate) fn dial_socket(addr: &str) -> std::io::Result<OwnedFd> {
	let resolved = resolve(Family::Tcp, addr)?;
	let socket = Native::new_stream_socket(Family::domain(&resolved), false)?;

	let result = with_sockaddr(&resolved, |ptr, len| unsafe {
		libc::connect(socket.as_raw_fd(), ptr, len)
	});
	if result == -1 {
		return Err(SocketError::Connect {
			errno: errno(),
			addr: resolved.to_string(),
		}
		.into());
	}
	Ok(socket)
}

/// Waits up to `timeout` for the descriptor to become readable.
///
/// Returns Ok(false) on the timeout tick (and on EINTR, which the caller's
/// loop absorbs the same way).
pub(crate) fn wait_readable<S: AsRawFd>(socket: &S, timeout: Duration) -> std::io::Result<bool> {
	let mut pfd = libc::pollfd {
		fd: socket.as_raw_fd(),
		events: libc::POLLIN,
		revents: 0,
	};
	let millis = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
	let result = unsafe { libc::poll(&mut pfd, 1, millis) };
	match result {
		-1 if errno() == libc::EINTR => Ok(false),
		-1 => Err(SocketError::Accept { errno: errno() }.into()),
		0 => Ok(false),
		_ => Ok(true),
	}
}

/// The local address of a bound socket (getsockname).
pub(crate) fn local_addr_of<S: AsRawFd>(socket: &S) -> std::io::Result<SocketAddr> {
	let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockname(
			socket.as_raw_fd(),
			&mut storage as *mut _ as *mut libc::sockaddr,
			&mut len,
		)
	};
	if result == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "getsockname" }.into());
	}
	from_sockaddr(&storage, len)
}

/// The remote address of a connected socket (getpeername).
pub(crate) fn peer_addr_of<S: AsRawFd>(socket: &S) -> std::io::Result<SocketAddr> {
	let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
	let result = unsafe {
		libc::getpeername(
			socket.as_raw_fd(),
			&mut storage as *mut _ as *mut libc::sockaddr,
			&mut len,
		)
	};
	if result == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "getpeername" }.into());
	}
	from_sockaddr(&storage, len)
}
