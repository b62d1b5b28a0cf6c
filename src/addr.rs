//! Network family selection and address resolution.
//!
//! Turns the textual `(network, "host:port")` pair accepted by the public
//! constructors into a concrete `SocketAddr`, and converts that into the
//! raw `sockaddr` form the syscalls want.

use std::net::{SocketAddr, ToSocketAddrs};

use crate::error::SocketError;

/// Network family selector accepted by `Listener::bind`.
///
/// `Tcp` resolves to IPv4 when the host offers one, falling back to IPv6;
/// `Tcp4`/`Tcp6` pin the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
	Tcp,
	Tcp4,
	Tcp6,
}

impl Family {
	pub(crate) fn parse(network: &str) -> std::io::Result<Self> {
		match network {
			"tcp" => Ok(Self::Tcp),
			"tcp4" => Ok(Self::Tcp4),
			"tcp6" => Ok(Self::Tcp6),
			other => Err(SocketError::UnsupportedNetwork {
				network: other.to_string(),
			}
			.into()),
		}
	}

	/// The `socket()` domain constant for a resolved address.
	pub(crate) fn domain(addr: &SocketAddr) -> libc::c_int {
		match addr {
			SocketAddr::V4(_) => libc::AF_INET,
			SocketAddr::V6(_) => libc::AF_INET6,
		}
	}
}

/// Resolves `host:port` into one socket address matching `family`.
///
/// Resolution (including IPv6 zone/interface scopes) is delegated to the
/// OS resolver via `ToSocketAddrs`; this layer only filters candidates by
/// family and reports a structured error when nothing fits.
pub(crate) fn resolve(family: Family, addr: &str) -> std::io::Result<SocketAddr> {
	let candidates: Vec<SocketAddr> = addr.to_socket_addrs().map_err(|err| {
		std::io::Error::from(SocketError::Resolve {
			addr: addr.to_string(),
			reason: err.to_string(),
		})
	})?.collect();

	let picked = match family {
		Family::Tcp4 => candidates.iter().find(|a| a.is_ipv4()),
		Family::Tcp6 => candidates.iter().find(|a| a.is_ipv6()),
		Family::Tcp => candidates
			.iter()
			.find(|a| a.is_ipv4())
			.or_else(|| candidates.first()),
	};

	picked.copied().ok_or_else(|| {
		SocketError::Resolve {
			addr: addr.to_string(),
			reason: format!("no {:?} address found", family),
		}
		.into()
	})
}

/// Calls `f` with a pointer to the raw sockaddr for `addr` and its size.
///
/// The raw struct lives on this stack frame; the closure shape keeps it
/// alive across the syscall without heap allocation.
pub(crate) fn with_sockaddr<F, R>(addr: &SocketAddr, f: F) -> R
where
	F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
{
	match addr {
		SocketAddr::V4(v4) => {
			let raw = libc::sockaddr_in {
				sin_family: libc::AF_INET as libc::sa_family_t,
				sin_port: v4.port().to_be(),
				sin_addr: libc::in_addr {
					s_addr: u32::from_ne_bytes(v4.ip().octets()),
				},
				sin_zero: [0; 8],
			};
			f(
				&raw as *const _ as *const libc::sockaddr,
				std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
			)
		}
		SocketAddr::V6(v6) => {
			let raw = libc::sockaddr_in6 {
				sin6_family: libc::AF_INET6 as libc::sa_family_t,
				sin6_port: v6.port().to_be(),
				sin6_flowinfo: v6.flowinfo(),
				sin6_addr: libc::in6_addr {
					s6_addr: v6.ip().octets(),
				},
				sin6_scope_id: v6.scope_id(),
			};
			f(
				&raw as *const _ as *const libc::sockaddr,
				std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
			)
		}
	}
}

/// Reads a `SocketAddr` back out of a raw `sockaddr_storage`.
pub(crate) fn from_sockaddr(
	storage: &libc::sockaddr_storage,
	len: libc::socklen_t,
) -> std::io::Result<SocketAddr> {
	match storage.ss_family as libc::c_int {
		libc::AF_INET if len >= std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t => {
			let raw = unsafe { &*(storage as *const _ as *const libc::sockaddr_in) };
			let ip = std::net::Ipv4Addr::from(raw.sin_addr.s_addr.to_ne_bytes());
			Ok(SocketAddr::from((ip, u16::from_be(raw.sin_port))))
		}
		libc::AF_INET6 if len >= std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t => {
			let raw = unsafe { &*(storage as *const _ as *const libc::sockaddr_in6) };
			let ip = std::net::Ipv6Addr::from(raw.sin6_addr.s6_addr);
			Ok(SocketAddr::V6(std::net::SocketAddrV6::new(
				ip,
				u16::from_be(raw.sin6_port),
				raw.sin6_flowinfo,
				raw.sin6_scope_id,
			)))
		}
		_ => Err(SocketError::InvalidAddress {
			reason: "unexpected address family",
		}
		.into()),
	}
}
