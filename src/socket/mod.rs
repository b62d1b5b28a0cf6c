mod conn;
mod listener;
mod options;
mod pool;
mod raw;

pub use self::conn::Connection;
pub use self::listener::Listener;
pub use self::options::{
	SocketOptions, set_linger, set_read_timeout, set_reuse_addr, set_tcp_nodelay,
	set_write_timeout,
};
pub use self::pool::ConnPool;
