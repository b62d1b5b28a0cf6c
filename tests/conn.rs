use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::time::{Duration, Instant};

use netline::{CancelSignal, Connection, Listener, SocketOptions, cancel_pair, is_cancelled};

/// One accepted server-side connection plus the client end that produced
/// it. The listener rides along so its stats stay observable.
fn connected_pair() -> (Arc<Listener>, Connection, TcpStream) {
	let ln = Arc::new(
		Listener::bind(
			CancelSignal::never(),
			"tcp4",
			"127.0.0.1:0",
			SocketOptions::new(),
		)
		.expect("cannot create listener"),
	);
	let addr = ln.local_addr().expect("local addr");
	let client = TcpStream::connect(addr).expect("cannot dial");
	let conn = ln.accept().expect("cannot accept");
	(ln, conn, client)
}

#[test]
fn read_accounts_exact_bytes() {
	let (ln, conn, mut client) = connected_pair();

	let payload = [7u8; 32];
	client.write_all(&payload).expect("cannot write");

	let mut buf = [0u8; 64];
	let n = conn.read(&mut buf).expect("cannot read");
	assert_eq!(n, 32);
	assert_eq!(&buf[..n], &payload);

	assert_eq!(ln.stats().read_calls(), 1);
	assert_eq!(ln.stats().read_bytes(), 32);
	assert_eq!(ln.stats().read_errors(), 0);
	assert_eq!(ln.stats().read_timeouts(), 0);
}

#[test]
fn write_accounts_exact_bytes() {
	let (ln, conn, mut client) = connected_pair();

	let n = conn.write(b"exactly seventeen").expect("cannot write");
	assert_eq!(n, 17);
	conn.close().expect("cannot close");

	let mut got = Vec::new();
	client.read_to_end(&mut got).expect("cannot read");
	assert_eq!(got, b"exactly seventeen");

	assert_eq!(ln.stats().write_calls(), 1);
	assert_eq!(ln.stats().written_bytes(), 17);
	assert_eq!(ln.stats().write_errors(), 0);
	assert_eq!(ln.stats().write_timeouts(), 0);
}

#[test]
fn accepted_socket_is_blocking() {
	let (ln, conn, mut client) = connected_pair();

	// The listening socket runs non-blocking; the accepted one must not
	// inherit that (BSD-derived kernels propagate file-status flags
	// through accept).
	let flags = unsafe { libc::fcntl(conn.as_raw_fd(), libc::F_GETFL) };
	assert_ne!(flags, -1);
	assert_eq!(flags & libc::O_NONBLOCK, 0);

	// And behaviorally: a read with no data ready waits for it instead
	// of failing with a spurious timeout.
	let writer = std::thread::spawn(move || {
		std::thread::sleep(Duration::from_millis(100));
		client.write_all(b"late").expect("cannot write");
	});
	let mut buf = [0u8; 8];
	let n = conn.read(&mut buf).expect("cannot read");
	assert_eq!(&buf[..n], b"late");
	writer.join().unwrap();

	assert_eq!(ln.stats().read_timeouts(), 0);
	assert_eq!(ln.stats().read_errors(), 0);
}

#[test]
fn end_of_stream_is_not_an_error() {
	let (ln, conn, client) = connected_pair();

	client.shutdown(Shutdown::Write).expect("cannot close write end");

	let mut buf = [0u8; 16];
	let n = conn.read(&mut buf).expect("cannot read");
	assert_eq!(n, 0);
	assert_eq!(ln.stats().read_calls(), 1);
	assert_eq!(ln.stats().read_errors(), 0);
	assert_eq!(ln.stats().read_timeouts(), 0);
}

#[test]
fn tripped_read_deadline_counts_as_timeout() {
	let (ln, conn, _client) = connected_pair();

	conn.set_read_timeout(Some(Duration::from_millis(50)))
		.expect("cannot set read timeout");

	let mut buf = [0u8; 16];
	let err = conn.read(&mut buf).unwrap_err();
	assert!(
		err.kind() == std::io::ErrorKind::WouldBlock
			|| err.kind() == std::io::ErrorKind::TimedOut,
		"unexpected kind: {:?}",
		err.kind()
	);

	assert_eq!(ln.stats().read_timeouts(), 1);
	assert_eq!(ln.stats().read_errors(), 0);
	assert_eq!(ln.stats().read_calls(), 1);
	assert_eq!(ln.stats().read_bytes(), 0);
}

#[test]
fn concurrent_close_runs_once() {
	let (ln, conn, _client) = connected_pair();
	let conn = Arc::new(conn);

	let closers: Vec<_> = (0..8)
		.map(|_| {
			let conn = Arc::clone(&conn);
			std::thread::spawn(move || conn.close())
		})
		.collect();
	for c in closers {
		c.join().unwrap().expect("close reported an error");
	}

	assert_eq!(ln.stats().conns(), 1);
	assert_eq!(ln.stats().close_errors(), 0);

	// And once more after the dust settles.
	conn.close().expect("late close");
	assert_eq!(ln.stats().conns(), 1);
}

#[test]
fn cancelled_read_leaves_buffer_untouched() {
	let (ln, conn, _client) = connected_pair();

	let signal = CancelSignal::after(Duration::from_millis(50));
	let mut buf = [0xAAu8; 16];
	let start = Instant::now();
	let err = conn.read_context(&signal, &mut buf).unwrap_err();

	assert!(is_cancelled(&err), "expected cancellation, got: {err}");
	assert!(start.elapsed() < Duration::from_secs(2));
	assert_eq!(buf, [0xAAu8; 16]);
	// The abandoned worker is still blocked in read; it has not touched
	// the caller-visible counters' error columns.
	assert_eq!(ln.stats().read_errors(), 0);
}

#[test]
fn read_beats_late_cancellation() {
	let (_ln, conn, mut client) = connected_pair();

	client.write_all(b"ping").expect("cannot write");

	let (token, signal) = cancel_pair();
	let mut buf = [0u8; 16];
	let n = conn.read_context(&signal, &mut buf).expect("cannot read");
	assert_eq!(&buf[..n], b"ping");
	drop(token);
}

#[test]
fn pre_fired_signal_cancels_immediately() {
	let (_ln, conn, mut client) = connected_pair();

	// Data is ready, but the signal already fired; cancellation wins.
	client.write_all(b"ignored").expect("cannot write");
	std::thread::sleep(Duration::from_millis(20));

	let (token, signal) = cancel_pair();
	token.cancel();

	let mut buf = [0u8; 16];
	let err = conn.read_context(&signal, &mut buf).unwrap_err();
	assert!(is_cancelled(&err), "expected cancellation, got: {err}");
}

#[test]
fn cancellable_write_round_trip() {
	let (ln, conn, mut client) = connected_pair();

	let (token, signal) = cancel_pair();
	let n = conn.write_context(&signal, b"pong").expect("cannot write");
	assert_eq!(n, 4);
	drop(token);

	let mut got = [0u8; 4];
	client.read_exact(&mut got).expect("cannot read");
	assert_eq!(&got, b"pong");
	assert_eq!(ln.stats().write_calls(), 1);
	assert_eq!(ln.stats().written_bytes(), 4);
}

#[test]
fn cancelled_write_reports_cancellation() {
	let (_ln, conn, _client) = connected_pair();

	let (token, signal) = cancel_pair();
	token.cancel();

	let err = conn.write_context(&signal, b"never sent").unwrap_err();
	assert!(is_cancelled(&err), "expected cancellation, got: {err}");
}

#[test]
fn dialed_connection_reaches_listener() {
	let (ln, server, _client) = connected_pair();
	drop(server);

	let addr = ln.local_addr().unwrap();
	let conn = Connection::dial(&addr.to_string()).expect("cannot dial");
	let server = ln.accept().expect("cannot accept");

	conn.write(b"from dialer").expect("cannot write");
	let mut buf = [0u8; 32];
	let n = server.read(&mut buf).expect("cannot read");
	assert_eq!(&buf[..n], b"from dialer");

	// A dialed connection carries its own counters, separate from any
	// listener's.
	assert_eq!(ln.stats().write_calls(), 0);
	conn.close().expect("cannot close dialer");
	server.close().expect("cannot close acceptee");
}

#[test]
fn peer_and_local_addrs_line_up() {
	let (ln, conn, client) = connected_pair();

	assert_eq!(conn.local_addr().unwrap(), ln.local_addr().unwrap());
	assert_eq!(conn.peer_addr().unwrap(), client.local_addr().unwrap());
}

#[test]
fn tuning_setters_accept_a_live_socket() {
	let (_ln, conn, _client) = connected_pair();

	conn.set_nodelay(false).expect("nodelay off");
	conn.set_nodelay(true).expect("nodelay on");
	conn.set_keepalive(30).expect("keepalive");
	conn.set_linger(Some(1)).expect("linger on");
	conn.set_linger(None).expect("linger off");
	conn.set_write_timeout(Some(Duration::from_secs(1)))
		.expect("write timeout");
	conn.set_write_timeout(None).expect("clear write timeout");
}
