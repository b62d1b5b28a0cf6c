//! Instrumented TCP transport layer.
//!
//! Augments the plain stream-socket API with kernel-level tuning
//! (reuse-port, defer-accept, fast-open, backlog sizing, Nagle control,
//! keep-alive), per-listener/per-connection counters, and cooperative
//! cancellation of blocking I/O.
//!
//! ```no_run
//! use netline::{CancelSignal, Listener, SocketOptions};
//!
//! let ln = Listener::bind(
//! 	CancelSignal::never(),
//! 	"tcp",
//! 	"127.0.0.1:8099",
//! 	SocketOptions::new().reuse_port(true),
//! )?;
//! let conn = ln.accept()?;
//! conn.write(b"hello")?;
//! conn.close()?;
//! println!("accepted so far: {}", ln.stats().accepts());
//! # Ok::<(), std::io::Error>(())
//! ```

mod addr;
mod cancel;
mod error;
mod socket;
mod stats;
mod sys;

pub use self::addr::Family;
pub use self::cancel::{CancelSignal, CancelToken, cancel_pair};
pub use self::error::{IoError, SocketError, errno, is_cancelled};
pub use self::socket::{
	ConnPool, Connection, Listener, SocketOptions, set_linger, set_read_timeout,
	set_reuse_addr, set_tcp_nodelay, set_write_timeout,
};
pub use self::stats::Stats;
