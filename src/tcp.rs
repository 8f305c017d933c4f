//! TCP connector and listener.
//!
//! This module implements the TCP half of the socket factory: a
//! [`Connector`] that drives a non-blocking `connect(2)` to completion and
//! reports the outcome via `SO_ERROR`, and a [`Listener`] that accepts at
//! most one connection per call, honouring an optional peer allow-list and
//! an optional accept timeout.
//!
//! Both wrap `std::net` types once the handshake/accept has completed;
//! only the connection-establishment phase touches [`crate::raw`] directly.

use crate::config::{self, NetConfig};
use crate::raw as r;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener as StdTcpListener, TcpStream as StdTcpStream};
use std::time::{Duration, Instant};

/// Drives TCP connection establishment.
#[derive(Debug)]
pub struct Connector;

impl Connector {
    /// Connects to `addr`, binding the local end to `bind_addr` first when
    /// given (the `-s`/source-address case). Blocks at most `timeout`
    /// waiting for the non-blocking connect to complete; `None` means wait
    /// indefinitely.
    ///
    /// Returns `Err(ErrorKind::TimedOut)` if the deadline elapses before
    /// the connection resolves, and the connect's own error (mapped from
    /// `SO_ERROR`) if the peer refuses or the route fails.
    pub fn connect(
        addr: SocketAddrV4,
        bind_addr: Option<SocketAddrV4>,
        timeout: Option<Duration>,
        cfg: &NetConfig,
    ) -> io::Result<StdTcpStream> {
        let os = crate::socket_factory::new_socket(r::Type::Stream)?;
        if let Some(local) = bind_addr {
            r::bind_raw(os, local)?;
        }
        r::set_nonblocking(os, true)?;
        config::apply_tuning(os, r::Type::Stream, cfg)?;

        match r::connect_raw(os, addr) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.raw_os_error() == Some(libc_in_progress()) => {}
            Err(e) => {
                r::close_raw(os);
                return Err(e);
            }
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let remaining = match deadline {
                Some(dl) => {
                    let now = Instant::now();
                    if now >= dl {
                        r::close_raw(os);
                        return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
                    }
                    Some(dl - now)
                }
                None => None,
            };
            match r::wait_writable(os, remaining) {
                Ok(true) => {}
                Ok(false) => {
                    r::close_raw(os);
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
                }
                Err(e) => {
                    r::close_raw(os);
                    return Err(e);
                }
            }
            match r::get_socket_error(os) {
                Ok(0) => break,
                Ok(errno) => {
                    r::close_raw(os);
                    return Err(io::Error::from_raw_os_error(errno));
                }
                Err(e) => {
                    r::close_raw(os);
                    return Err(e);
                }
            }
        }

        log::debug!("connect to {addr} established");
        // Left non-blocking: the relay loop only ever acts on this
        // socket after a readiness event, and a blocking write could
        // stall the whole single-threaded pump on a slow peer.
        let std = unsafe { r::tcp_stream_from_os(os) };
        Ok(std)
    }
}

#[cfg(unix)]
fn libc_in_progress() -> i32 {
    libc::EINPROGRESS
}

#[cfg(windows)]
fn libc_in_progress() -> i32 {
    // WSAEWOULDBLOCK, surfaced through `io::Error::kind() == WouldBlock`
    // on this platform; this numeric fallback is never actually consulted.
    0
}

/// Accepts inbound TCP connections, optionally filtered by a peer
/// allow-list and bounded by a wait timeout.
#[derive(Debug)]
pub struct Listener {
    inner: StdTcpListener,
}

impl Listener {
    /// Binds and starts listening on `addr`. `SO_REUSEADDR` is always set;
    /// `backlog` defaults to `cfg.tcp_backlog` or 1024.
    pub fn bind(addr: SocketAddrV4, cfg: &NetConfig) -> io::Result<Self> {
        let os = crate::socket_factory::create_bound(r::Type::Stream, addr, cfg)?;
        let backlog = cfg.tcp_backlog.unwrap_or(1024);
        r::listen_raw(os, backlog)?;
        r::set_nonblocking(os, true)?;
        let std = unsafe { r::tcp_listener_from_os(os) };
        Ok(Self { inner: std })
    }

    /// The address the kernel assigned (relevant when the caller bound
    /// port 0 and needs to read back the ephemeral port chosen).
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.inner.local_addr()
    }

    /// Waits up to `timeout` (or indefinitely if `None`) for a connection
    /// from a peer whose address matches `allow` (empty allow-list means
    /// accept anyone). Connections from disallowed peers are closed
    /// immediately and the wait continues against whatever time remains.
    ///
    /// Returns `Err(ErrorKind::TimedOut)` if the deadline elapses with no
    /// accepted connection.
    pub fn accept_from(
        &self,
        allow: &[Ipv4Addr],
        timeout: Option<Duration>,
    ) -> io::Result<(StdTcpStream, std::net::SocketAddr)> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match self.inner.accept() {
                Ok((stream, peer)) => {
                    let peer_ok = allow.is_empty()
                        || matches!(peer, std::net::SocketAddr::V4(v4) if allow.contains(v4.ip()));
                    if peer_ok {
                        stream.set_nonblocking(true)?;
                        log::info!("accepted connection from {peer}");
                        return Ok((stream, peer));
                    }
                    log::warn!("refusing connection from {peer}: not in allow-list");
                    let _ = stream.shutdown(std::net::Shutdown::Both);
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if let Some(dl) = deadline {
                        if Instant::now() >= dl {
                            return Err(io::Error::new(io::ErrorKind::TimedOut, "accept timed out"));
                        }
                    }
                    std::thread::sleep(Duration::from_millis(5));
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Zero-I/O listen mode: refuses every inbound connection immediately
    /// and returns only once `timeout` elapses (or never, if `None`).
    /// No connection is ever handed back to the caller.
    pub fn refuse_until_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match self.inner.accept() {
                Ok((stream, peer)) => {
                    log::warn!("refusing connection from {peer} (zero-I/O listen)");
                    let _ = stream.shutdown(std::net::Shutdown::Both);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
            if let Some(dl) = deadline {
                if Instant::now() >= dl {
                    return Ok(());
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_port() {
        let cfg = NetConfig::default();
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0);
        let listener = Listener::bind(addr, &cfg).expect("bind");
        let local = listener.local_addr().expect("local_addr");
        assert_ne!(local.port(), 0);
    }

    #[test]
    fn test_connect_refused() {
        let cfg = NetConfig::default();
        // Port 1 is reserved and almost certainly not listening in test
        // sandboxes; the connect should fail quickly rather than hang.
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1);
        let res = Connector::connect(addr, None, Some(Duration::from_millis(500)), &cfg);
        assert!(res.is_err());
    }

    #[test]
    fn test_accept_rejects_disallowed_peer() {
        let cfg = NetConfig::default();
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0);
        let listener = Listener::bind(addr, &cfg).expect("bind");
        let local = listener.local_addr().expect("local_addr");
        let connect_addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, local.port());

        let handle = std::thread::spawn(move || {
            let _ = StdTcpStream::connect(connect_addr);
        });

        let disallowed = [Ipv4Addr::new(10, 0, 0, 1)];
        let res = listener.accept_from(&disallowed, Some(Duration::from_millis(300)));
        assert!(res.is_err());
        handle.join().unwrap();
    }
}
