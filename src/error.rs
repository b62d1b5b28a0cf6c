/// Socket creation/configuration errors.
///
/// Each variant carries the failing syscall and its errno so setup failures
/// name the responsible operation.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket() failed: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    #[error("bind({addr}) failed: {}", errno_to_str(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("listen(backlog={backlog}) failed: {}", errno_to_str(*.errno))]
    Listen { errno: i32, backlog: i32 },

    #[error("connect({addr}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("accept() failed: {}", errno_to_str(*.errno))]
    Accept { errno: i32 },

    #[error("setsockopt({option}) failed: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", errno_to_str(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("unsupported network {network:?}: expected tcp, tcp4 or tcp6")]
    UnsupportedNetwork { network: String },

    #[error("cannot resolve address {addr:?}: {reason}")]
    Resolve { addr: String, reason: String },

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },

    #[error("listener is closed")]
    ListenerClosed,
}

/// I/O operation errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("read() failed: {}", errno_to_str(*.errno))]
    Read { errno: i32 },

    #[error("write() failed: {}", errno_to_str(*.errno))]
    Write { errno: i32 },

    #[error("operation cancelled")]
    Cancelled,
}

/// Returns the errno left behind by the last failed syscall.
#[inline]
pub fn errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// True for errno values the OS flags as a timeout on blocking I/O.
#[inline]
pub(crate) fn is_timeout_errno(errno: i32) -> bool {
    errno == libc::EAGAIN || errno == libc::EWOULDBLOCK || errno == libc::ETIMEDOUT
}

/// True when a returned `std::io::Error` is the cancellation error produced
/// by `read_context`/`write_context`/`acquire` losing the race to a signal.
pub fn is_cancelled(err: &std::io::Error) -> bool {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<IoError>())
        .is_some_and(|io| matches!(io, IoError::Cancelled))
}

/// Converts errno to human-readable string.
fn errno_to_str(errno: i32) -> String {
    match errno {
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNABORTED => "connection aborted".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        _ => format!("errno {}", errno),
    }
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNABORTED => std::io::ErrorKind::ConnectionAborted,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        let kind = match &err {
            SocketError::Create { errno } => errno_to_kind(*errno),
            SocketError::Bind { errno, .. } => errno_to_kind(*errno),
            SocketError::Listen { errno, .. } => errno_to_kind(*errno),
            SocketError::Connect { errno, .. } => errno_to_kind(*errno),
            SocketError::Accept { errno } => errno_to_kind(*errno),
            SocketError::SetOption { errno, .. } => errno_to_kind(*errno),
            SocketError::GetOption { errno, .. } => errno_to_kind(*errno),
            SocketError::UnsupportedNetwork { .. } => std::io::ErrorKind::InvalidInput,
            SocketError::Resolve { .. } => std::io::ErrorKind::InvalidInput,
            SocketError::InvalidAddress { .. } => std::io::ErrorKind::InvalidInput,
            SocketError::ListenerClosed => std::io::ErrorKind::NotConnected,
        };
        std::io::Error::new(kind, err)
    }
}

impl From<IoError> for std::io::Error {
    fn from(err: IoError) -> Self {
        let kind = match &err {
            IoError::Read { errno } => errno_to_kind(*errno),
            IoError::Write { errno } => errno_to_kind(*errno),
            IoError::Cancelled => std::io::ErrorKind::Interrupted,
        };
        std::io::Error::new(kind, err)
    }
}
