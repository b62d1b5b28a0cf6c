use crossbeam::channel::{Receiver, Sender, bounded};
use crossbeam::select;

use crate::cancel::CancelSignal;
use crate::error::IoError;
use crate::socket::conn::Connection;

/// A fixed-capacity pool of pre-dialed outbound connections.
///
/// All connections are established eagerly at construction; a failed dial
/// fails the whole pool (the already-dialed descriptors drop). The bounded
/// buffer is the only synchronization: acquire blocks on empty, release
/// never blocks because callers return at most what they took out.
#[derive(Debug)]
pub struct ConnPool {
	tx: Sender<Connection>,
	rx: Receiver<Connection>,
	size: usize,
}

impl ConnPool {
	/// Dials `size` connections to `addr` and parks them in the pool.
	pub fn new(addr: &str, size: usize) -> std::io::Result<Self> {
		let (tx, rx) = bounded(size);
		for _ in 0..size {
			let conn = Connection::dial(addr)?;
			// Cannot fail: the channel has exactly `size` slots and we
			// are the only sender so far.
			let _ = tx.send(conn);
		}
		tracing::debug!(addr, size, "connection pool ready");
		Ok(Self { tx, rx, size })
	}

	/// Takes a connection out of the pool, blocking until one is
	/// available or `signal` fires (cancellation error). A connection
	/// handed out is invisible to other acquirers until released.
	pub fn acquire(&self, signal: &CancelSignal) -> std::io::Result<Connection> {
		if signal.is_cancelled() {
			return Err(IoError::Cancelled.into());
		}
		select! {
			recv(self.rx) -> conn => conn.map_err(|_| IoError::Cancelled.into()),
			recv(signal.receiver()) -> _ => Err(IoError::Cancelled.into()),
		}
	}

	/// Returns a connection to the pool. Never blocks for balanced
	/// callers: capacity equals the number of connections that exist, so
	/// a release always has room. Releasing more than was acquired is a
	/// caller error.
	pub fn release(&self, conn: Connection) {
		let _ = self.tx.send(conn);
	}

	/// The pool's fixed capacity.
	pub fn size(&self) -> usize {
		self.size
	}
}
