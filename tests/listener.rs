use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use netline::{CancelSignal, Listener, SocketOptions, cancel_pair};

fn bind_loopback(options: SocketOptions) -> Arc<Listener> {
	Arc::new(
		Listener::bind(CancelSignal::never(), "tcp4", "127.0.0.1:0", options)
			.expect("cannot create listener"),
	)
}

#[test]
fn hello_world_end_to_end() {
	let ln = bind_loopback(SocketOptions::new());
	let addr = ln.local_addr().expect("local addr");

	let server = {
		let ln = Arc::clone(&ln);
		std::thread::spawn(move || {
			let conn = ln.accept().expect("cannot accept");
			conn.write(b"hello world").expect("cannot write");
			conn.close().expect("cannot close");
		})
	};

	let mut client = TcpStream::connect(addr).expect("cannot dial");
	let mut got = Vec::new();
	client.read_to_end(&mut got).expect("cannot read");
	server.join().unwrap();

	assert_eq!(got, b"hello world");
	assert_eq!(ln.stats().accepts(), 1);
	assert_eq!(ln.stats().active_conns(), 1);
	assert_eq!(ln.stats().write_calls(), 1);
	assert_eq!(ln.stats().written_bytes(), 11);
	assert_eq!(ln.stats().accept_errors(), 0);
	assert_eq!(ln.stats().conns(), 1);
}

#[test]
fn sequential_accepts_are_counted() {
	let ln = bind_loopback(SocketOptions::new());
	let addr = ln.local_addr().unwrap();
	let n = 5;

	let server = {
		let ln = Arc::clone(&ln);
		std::thread::spawn(move || {
			for _ in 0..n {
				let conn = ln.accept().expect("cannot accept");
				conn.close().expect("cannot close");
			}
		})
	};

	for _ in 0..n {
		let mut client = TcpStream::connect(addr).expect("cannot dial");
		let mut buf = Vec::new();
		client.read_to_end(&mut buf).expect("cannot read");
	}
	server.join().unwrap();

	assert_eq!(ln.stats().accepts(), n);
	assert_eq!(ln.stats().active_conns(), n);
	assert_eq!(ln.stats().conns(), n);
}

fn serve_echo(ln: Arc<Listener>) {
	loop {
		let conn = match ln.accept() {
			Ok(conn) => conn,
			Err(_) => break,
		};
		let mut req = Vec::new();
		let mut buf = [0u8; 1024];
		loop {
			match conn.read(&mut buf) {
				Ok(0) => break,
				Ok(n) => req.extend_from_slice(&buf[..n]),
				Err(err) => panic!("unexpected error when reading request: {err}"),
			}
		}
		conn.write(&req).expect("unexpected error when writing response");
		conn.close().expect("unexpected error when closing connection");
	}
}

fn echo_round_trip(addr: std::net::SocketAddr, payload: &[u8]) {
	let mut client = TcpStream::connect(addr).expect("unexpected error when dialing");
	client.write_all(payload).expect("cannot write request");
	client
		.shutdown(std::net::Shutdown::Write)
		.expect("cannot close write end");
	client
		.set_read_timeout(Some(Duration::from_secs(2)))
		.unwrap();
	let mut resp = Vec::new();
	client.read_to_end(&mut resp).expect("cannot read response");
	assert_eq!(resp, payload);
}

#[test]
fn reuse_port_shares_one_address() {
	let options = SocketOptions::new().reuse_port(true);
	let first = bind_loopback(options);
	let addr = first.local_addr().unwrap();

	let mut listeners = vec![first];
	for i in 1..10 {
		let ln = Listener::bind(
			CancelSignal::never(),
			"tcp4",
			&addr.to_string(),
			options,
		)
		.unwrap_or_else(|err| panic!("cannot create listener {i}: {err}"));
		listeners.push(Arc::new(ln));
	}

	let handles: Vec<_> = listeners
		.iter()
		.map(|ln| {
			let ln = Arc::clone(ln);
			std::thread::spawn(move || serve_echo(ln))
		})
		.collect();

	for i in 0..1000 {
		echo_round_trip(addr, format!("request number {i}").as_bytes());
	}

	for ln in &listeners {
		ln.close().expect("unexpected error when closing listener");
	}
	for h in handles {
		h.join().unwrap();
	}
}

#[test]
fn tuned_options_still_serve() {
	// defer-accept and fast-open are best-effort tunables; the listener
	// must behave identically for a plain client either way.
	let options = SocketOptions::new()
		.reuse_port(true)
		.defer_accept(true)
		.fast_open(true);
	let ln = bind_loopback(options);
	let addr = ln.local_addr().unwrap();

	let server = {
		let ln = Arc::clone(&ln);
		std::thread::spawn(move || serve_echo(ln))
	};

	for i in 0..50 {
		echo_round_trip(addr, format!("request number {i}").as_bytes());
	}

	ln.close().unwrap();
	server.join().unwrap();
}

#[test]
fn explicit_backlog_survives_connect_burst() {
	let ln = bind_loopback(SocketOptions::new().backlog(32));
	let addr = ln.local_addr().unwrap();

	let server = {
		let ln = Arc::clone(&ln);
		std::thread::spawn(move || loop {
			match ln.accept() {
				Ok(conn) => {
					let _ = conn.close();
				}
				Err(_) => break,
			}
		})
	};

	let clients: Vec<_> = (0..64)
		.map(|i| {
			std::thread::spawn(move || {
				TcpStream::connect(addr)
					.unwrap_or_else(|err| panic!("{i}. unexpected error when dialing: {err}"))
			})
		})
		.collect();
	for c in clients {
		c.join().unwrap();
	}

	ln.close().unwrap();
	server.join().unwrap();
}

#[test]
fn cancellation_signal_closes_listener() {
	let (token, signal) = cancel_pair();
	let ln = Arc::new(
		Listener::bind(signal, "tcp4", "127.0.0.1:0", SocketOptions::new())
			.expect("cannot create listener"),
	);

	let server = {
		let ln = Arc::clone(&ln);
		std::thread::spawn(move || ln.accept())
	};

	// Let the accept call actually block before firing.
	std::thread::sleep(Duration::from_millis(50));
	token.cancel();

	let result = server.join().unwrap();
	assert!(result.is_err());
	assert!(ln.stats().accept_errors() >= 1);

	// The listener stays closed: further accepts fail immediately.
	assert!(ln.accept().is_err());
}

#[test]
fn close_is_idempotent() {
	let ln = bind_loopback(SocketOptions::new());
	ln.close().expect("first close");
	ln.close().expect("second close");
	let err = ln.accept().unwrap_err();
	assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);
}

#[test]
fn rejects_unknown_network() {
	let err = Listener::bind(
		CancelSignal::never(),
		"udp",
		"127.0.0.1:0",
		SocketOptions::new(),
	)
	.unwrap_err();
	assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn rejects_malformed_address() {
	let err = Listener::bind(
		CancelSignal::never(),
		"tcp",
		"not an address",
		SocketOptions::new(),
	)
	.unwrap_err();
	assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn tcp6_loopback_round_trip() {
	// Not every build environment has IPv6 enabled; skip instead of fail.
	let ln = match Listener::bind(
		CancelSignal::never(),
		"tcp6",
		"[::1]:0",
		SocketOptions::new(),
	) {
		Ok(ln) => Arc::new(ln),
		Err(err) => {
			eprintln!("skipping, IPv6 unavailable: {err}");
			return;
		}
	};
	let addr = ln.local_addr().unwrap();
	assert!(addr.is_ipv6());

	let server = {
		let ln = Arc::clone(&ln);
		std::thread::spawn(move || serve_echo(ln))
	};

	echo_round_trip(addr, b"over v6");
	ln.close().unwrap();
	server.join().unwrap();
}
