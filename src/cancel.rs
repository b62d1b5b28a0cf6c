use std::sync::OnceLock;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, TryRecvError, bounded};

/// Creates a linked cancellation pair.
///
/// The token side fires the signal; the signal side is handed to blocking
/// operations (`Listener::bind`, `read_context`, `ConnPool::acquire`) that
/// should stop waiting when it fires.
pub fn cancel_pair() -> (CancelToken, CancelSignal) {
	// Zero-capacity channel that never carries a message. Cancellation is
	// the channel disconnecting, which every cloned receiver observes
	// forever — the same broadcast shape as closing a Go done-channel.
	let (tx, rx) = bounded::<()>(0);
	(CancelToken { _tx: tx }, CancelSignal { rx })
}

/// Fires its linked [`CancelSignal`] when cancelled or dropped.
pub struct CancelToken {
	_tx: Sender<()>,
}

impl CancelToken {
	/// Fires the signal. Dropping the token has the same effect.
	pub fn cancel(self) {
		drop(self);
	}
}

/// An observable notification that a caller no longer wants a pending
/// operation to continue waiting.
///
/// Cheap to clone; all clones fire together, and a fired signal stays
/// fired.
#[derive(Clone)]
pub struct CancelSignal {
	rx: Receiver<()>,
}

impl CancelSignal {
	/// A signal that never fires. Useful when an operation should only be
	/// bounded by its own completion.
	pub fn never() -> Self {
		// One process-wide channel whose sender lives in the static, so
		// it never disconnects and repeated calls allocate nothing new.
		static NEVER: OnceLock<(Sender<()>, Receiver<()>)> = OnceLock::new();
		let (_tx, rx) = NEVER.get_or_init(|| bounded::<()>(0));
		Self { rx: rx.clone() }
	}

	/// A signal that fires after `timeout`. Spawns one timer thread.
	pub fn after(timeout: Duration) -> Self {
		let (token, signal) = cancel_pair();
		std::thread::spawn(move || {
			std::thread::sleep(timeout);
			token.cancel();
		});
		signal
	}

	/// Probes the signal without blocking.
	pub fn is_cancelled(&self) -> bool {
		matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
	}

	/// The raw receiver, for racing against other channels with `select!`.
	pub(crate) fn receiver(&self) -> &Receiver<()> {
		&self.rx
	}
}
