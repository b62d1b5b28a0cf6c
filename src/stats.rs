use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

/// Monotonic counters shared by a listener and every connection it accepts.
///
/// One instance lives for the whole listener lifetime; connections hold it
/// through an `Arc` and bump counters on every read/write/close. Each
/// counter sits on its own cache line so unrelated connections never
/// contend on the same line when incrementing.
///
/// Increments are relaxed atomics: totals are exact, the interleaving
/// between counters is not.
#[derive(Debug, Default)]
pub struct Stats {
	accepts: CachePadded<AtomicU64>,
	accept_errors: CachePadded<AtomicU64>,
	active_conns: CachePadded<AtomicU64>,
	conns: CachePadded<AtomicU64>,
	close_errors: CachePadded<AtomicU64>,

	read_calls: CachePadded<AtomicU64>,
	read_bytes: CachePadded<AtomicU64>,
	read_errors: CachePadded<AtomicU64>,
	read_timeouts: CachePadded<AtomicU64>,

	write_calls: CachePadded<AtomicU64>,
	written_bytes: CachePadded<AtomicU64>,
	write_errors: CachePadded<AtomicU64>,
	write_timeouts: CachePadded<AtomicU64>,
}

impl Stats {
	pub(crate) fn new() -> Self {
		Self::default()
	}

	/// Accept attempts, successful or not.
	pub fn accepts(&self) -> u64 {
		self.accepts.load(Ordering::Relaxed)
	}

	/// Accept attempts that failed with a non-transient error.
	pub fn accept_errors(&self) -> u64 {
		self.accept_errors.load(Ordering::Relaxed)
	}

	/// Connections handed out by `accept`.
	pub fn active_conns(&self) -> u64 {
		self.active_conns.load(Ordering::Relaxed)
	}

	/// Connections that have been closed.
	pub fn conns(&self) -> u64 {
		self.conns.load(Ordering::Relaxed)
	}

	/// Closes that reported an error.
	pub fn close_errors(&self) -> u64 {
		self.close_errors.load(Ordering::Relaxed)
	}

	pub fn read_calls(&self) -> u64 {
		self.read_calls.load(Ordering::Relaxed)
	}

	pub fn read_bytes(&self) -> u64 {
		self.read_bytes.load(Ordering::Relaxed)
	}

	pub fn read_errors(&self) -> u64 {
		self.read_errors.load(Ordering::Relaxed)
	}

	pub fn read_timeouts(&self) -> u64 {
		self.read_timeouts.load(Ordering::Relaxed)
	}

	pub fn write_calls(&self) -> u64 {
		self.write_calls.load(Ordering::Relaxed)
	}

	pub fn written_bytes(&self) -> u64 {
		self.written_bytes.load(Ordering::Relaxed)
	}

	pub fn write_errors(&self) -> u64 {
		self.write_errors.load(Ordering::Relaxed)
	}

	pub fn write_timeouts(&self) -> u64 {
		self.write_timeouts.load(Ordering::Relaxed)
	}

	pub(crate) fn accepts_inc(&self) {
		self.accepts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn accept_errors_inc(&self) {
		self.accept_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn active_conns_inc(&self) {
		self.active_conns.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn conns_inc(&self) {
		self.conns.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn close_errors_inc(&self) {
		self.close_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// One read call transferring `n` bytes.
	pub(crate) fn read_bytes_add(&self, n: u64) {
		self.read_calls.fetch_add(1, Ordering::Relaxed);
		self.read_bytes.fetch_add(n, Ordering::Relaxed);
	}

	pub(crate) fn read_errors_inc(&self) {
		self.read_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn read_timeouts_inc(&self) {
		self.read_timeouts.fetch_add(1, Ordering::Relaxed);
	}

	/// One write call transferring `n` bytes.
	pub(crate) fn written_bytes_add(&self, n: u64) {
		self.write_calls.fetch_add(1, Ordering::Relaxed);
		self.written_bytes.fetch_add(n, Ordering::Relaxed);
	}

	pub(crate) fn write_errors_inc(&self) {
		self.write_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn write_timeouts_inc(&self) {
		self.write_timeouts.fetch_add(1, Ordering::Relaxed);
	}
}
