//! UDP connector and listener.
//!
//! UDP has no connection handshake, so "connect" here means binding the
//! local endpoint and recording a default peer via `connect(2)` on a
//! datagram socket (the BSD "pseudo-connect" idiom: it filters incoming
//! datagrams to the given peer and lets `send`/`recv` be used instead of
//! `sendto`/`recvfrom`, without implying any reliability).
//!
//! The listener side implements the `UdpListener` capability described in
//! the design notes: receiving the first datagram on a wildcard bind needs
//! to report which local address it arrived on, so that a reply can be
//! sent from the same interface. Two strategies provide this:
//!
//! - [`PktInfoListener`]: Linux-only, uses `IP_PKTINFO` ancillary data on
//!   a single wildcard-bound socket.
//! - [`FanoutListener`]: binds one socket per local interface address and
//!   polls all of them, so the winning socket's own local address is the
//!   answer. Used on platforms without ancillary-data support.
//!
//! Which strategy is active is a build-time decision based on
//! [`raw::pktinfo_supported`].

use crate::config::{self, NetConfig};
use crate::raw as r;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Maximum bytes captured per UDP datagram read. Matches the historical
/// netcat receive-buffer cap; datagrams larger than this are truncated.
pub const MAX_DATAGRAM: usize = 1024;

/// A received datagram together with where it came from and which local
/// address it arrived on.
#[derive(Debug)]
pub struct Received {
    pub data: Vec<u8>,
    pub remote: SocketAddrV4,
    pub local: SocketAddrV4,
}

/// UDP "pseudo-connector": binds locally and records a default peer.
#[derive(Debug)]
pub struct Connector;

impl Connector {
    /// Binds (optionally to `bind_addr`, else an ephemeral port) and
    /// connects the datagram socket to `peer` so that plain `send`/`recv`
    /// can be used thereafter.
    pub fn connect(
        peer: SocketAddrV4,
        bind_addr: Option<SocketAddrV4>,
        cfg: &NetConfig,
    ) -> io::Result<UdpSocket> {
        let os = crate::socket_factory::new_socket(r::Type::Dgram)?;
        config::apply_tuning(os, r::Type::Dgram, cfg)?;
        let local = bind_addr.unwrap_or_else(|| SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        r::bind_raw(os, local)?;
        r::connect_raw(os, peer)?;
        log::debug!("udp pseudo-connected to {peer}");
        let std = unsafe { r::udp_from_os(os) };
        Ok(std)
    }
}

/// Adapts a connected [`UdpSocket`] to `Read`/`Write` so it can be driven
/// by [`crate::multiplex::core_readwrite`] the same way a `TcpStream` is:
/// `read` maps to `recv`, `write` to `send`. A zero-length datagram reads
/// back as `Ok(0)`, which the relay loop treats as the peer's EOF — the
/// same "read == 0 ends the session" rule the original tool applies
/// uniformly to both protocols rather than only to stream sockets.
pub struct UdpStream(pub UdpSocket);

impl io::Read for UdpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.recv(buf)
    }
}

impl io::Write for UdpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRawFd for UdpStream {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

/// Capability every UDP listener strategy implements: wait for the next
/// datagram (or timeout) on a wildcard-bound port and report where it
/// came from and which local address received it.
pub trait UdpListener {
    /// The address the listener is bound to (may be one of several, for
    /// fan-out listeners).
    fn local_addrs(&self) -> Vec<SocketAddrV4>;

    /// Waits up to `timeout` (`None` = indefinitely) for a datagram.
    /// Returns `Err(ErrorKind::TimedOut)` if the deadline elapses first.
    fn listen(&self, timeout: Option<Duration>) -> io::Result<Received>;
}

/// `IP_PKTINFO`-based listener: a single wildcard-bound socket plus
/// ancillary data to recover the destination address per datagram.
#[cfg(any(target_os = "linux", target_os = "android"))]
#[derive(Debug)]
pub struct PktInfoListener {
    os: r::OsSocket,
    bound: SocketAddrV4,
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl PktInfoListener {
    pub fn bind(addr: SocketAddrV4, cfg: &NetConfig) -> io::Result<Self> {
        let os = crate::socket_factory::create_bound(r::Type::Dgram, addr, cfg)?;
        r::enable_pktinfo(os)?;
        r::set_nonblocking(os, true)?;
        Ok(Self { os, bound: addr })
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl Drop for PktInfoListener {
    fn drop(&mut self) {
        r::close_raw(self.os);
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
impl UdpListener for PktInfoListener {
    fn local_addrs(&self) -> Vec<SocketAddrV4> {
        vec![self.bound]
    }

    fn listen(&self, timeout: Option<Duration>) -> io::Result<Received> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match r::recv_with_pktinfo(self.os, &mut buf, false) {
                Ok((n, remote, mut local)) => {
                    local.set_port(self.bound.port());
                    buf.truncate(n);
                    return Ok(Received { data: buf, remote, local });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if let Some(dl) = deadline {
                        if Instant::now() >= dl {
                            return Err(io::Error::new(io::ErrorKind::TimedOut, "udp listen timed out"));
                        }
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Per-interface fan-out listener: binds one non-blocking socket per
/// local IPv4 address passed in and round-robin-polls all of them. The
/// socket that has data is, by construction, bound to the local address
/// that received the packet.
#[derive(Debug)]
pub struct FanoutListener {
    sockets: Vec<UdpSocket>,
}

impl FanoutListener {
    /// Binds one socket per address in `local_addrs` (all sharing `port`).
    /// Passing a single `Ipv4Addr::UNSPECIFIED` degrades to an ordinary
    /// single-socket wildcard bind whose reported local address always
    /// has an unspecified IP.
    ///
    /// When `port == 0`, the kernel picks an ephemeral port for the first
    /// socket bound; every remaining interface socket is then pinned to
    /// that same port rather than getting its own independent ephemeral
    /// port, so all of them answer on the one port the caller reads back
    /// from `local_addrs()`.
    pub fn bind(local_addrs: &[Ipv4Addr], port: u16, cfg: &NetConfig) -> io::Result<Self> {
        let mut sockets = Vec::with_capacity(local_addrs.len());
        let mut bound_port = port;
        for (i, ip) in local_addrs.iter().enumerate() {
            let os = crate::socket_factory::new_socket(r::Type::Dgram)?;
            config::apply_tuning(os, r::Type::Dgram, cfg)?;
            r::bind_raw(os, SocketAddrV4::new(*ip, bound_port))?;
            r::set_nonblocking(os, true)?;
            if i == 0 && port == 0 {
                bound_port = r::get_local_addr(os)?.port();
            }
            sockets.push(unsafe { r::udp_from_os(os) });
        }
        Ok(Self { sockets })
    }
}

impl UdpListener for FanoutListener {
    fn local_addrs(&self) -> Vec<SocketAddrV4> {
        self.sockets
            .iter()
            .filter_map(|s| s.local_addr().ok())
            .filter_map(|a| match a {
                std::net::SocketAddr::V4(v4) => Some(v4),
                _ => None,
            })
            .collect()
    }

    fn listen(&self, timeout: Option<Duration>) -> io::Result<Received> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            for sock in &self.sockets {
                match sock.recv_from(&mut buf) {
                    Ok((n, remote)) => {
                        let remote = match remote {
                            std::net::SocketAddr::V4(v4) => v4,
                            _ => continue,
                        };
                        let local = match sock.local_addr()? {
                            std::net::SocketAddr::V4(v4) => v4,
                            _ => continue,
                        };
                        let mut data = buf.clone();
                        data.truncate(n);
                        return Ok(Received { data, remote, local });
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    Err(e) => return Err(e),
                }
            }
            if let Some(dl) = deadline {
                if Instant::now() >= dl {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "udp listen timed out"));
                }
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Builds whichever [`UdpListener`] is appropriate for the current
/// platform, bound to the wildcard address on `port`.
pub fn bind_listener(port: u16, cfg: &NetConfig) -> io::Result<Box<dyn UdpListener>> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if r::pktinfo_supported() {
            let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
            log::debug!("binding UDP listener on {addr} via IP_PKTINFO");
            return Ok(Box::new(PktInfoListener::bind(addr, cfg)?));
        }
    }
    let interfaces = r::list_ipv4_interfaces();
    let bind_addrs: Vec<Ipv4Addr> = if interfaces.is_empty() { vec![Ipv4Addr::UNSPECIFIED] } else { interfaces };
    log::debug!("binding UDP fan-out listener on {} interface(s)", bind_addrs.len());
    let listener = FanoutListener::bind(&bind_addrs, port, cfg)?;
    Ok(Box::new(listener))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_stream_read_write() {
        use std::io::{Read, Write};
        let cfg = NetConfig::default();
        let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_addr = match server.local_addr().unwrap() {
            std::net::SocketAddr::V4(v4) => v4,
            _ => unreachable!(),
        };
        let client = Connector::connect(server_addr, None, &cfg).expect("connect");
        let mut stream = UdpStream(client);
        stream.write_all(b"via-stream").expect("write");
        let mut buf = [0u8; 16];
        let (n, from) = server.recv_from(&mut buf).expect("recv");
        assert_eq!(&buf[..n], b"via-stream");
        server.send_to(b"reply", from).unwrap();
        let mut got = [0u8; 16];
        let n = stream.read(&mut got).expect("read");
        assert_eq!(&got[..n], b"reply");
    }

    #[test]
    fn test_connector_roundtrip() {
        let cfg = NetConfig::default();
        let server = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_addr = match server.local_addr().unwrap() {
            std::net::SocketAddr::V4(v4) => v4,
            _ => unreachable!(),
        };
        let client = Connector::connect(server_addr, None, &cfg).expect("connect");
        client.send(b"hello").expect("send");
        let mut buf = [0u8; 16];
        let (n, _from) = server.recv_from(&mut buf).expect("recv");
        assert_eq!(&buf[..n], b"hello");
    }

    #[test]
    fn test_fanout_listener_receives() {
        let cfg = NetConfig::default();
        let listener = FanoutListener::bind(&[Ipv4Addr::LOCALHOST], 0, &cfg).expect("bind");
        let local = listener.local_addrs()[0];
        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(b"ping", local).unwrap();
        let received = listener.listen(Some(Duration::from_secs(2))).expect("listen");
        assert_eq!(received.data, b"ping");
        assert_eq!(received.local.ip(), &Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn test_fanout_listener_drains_successive_datagrams() {
        // Zero-I/O UDP listen repeatedly calls `listen()` on the same
        // listener to drain each arriving datagram exactly once (a real
        // recv, never a re-peeked one); two sends must yield two
        // distinct, in-order receives rather than the same packet twice.
        let cfg = NetConfig::default();
        let listener = FanoutListener::bind(&[Ipv4Addr::LOCALHOST], 0, &cfg).expect("bind");
        let local = listener.local_addrs()[0];
        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(b"first", local).unwrap();
        client.send_to(b"second", local).unwrap();

        let r1 = listener.listen(Some(Duration::from_secs(2))).expect("listen 1");
        let r2 = listener.listen(Some(Duration::from_secs(2))).expect("listen 2");
        assert_eq!(r1.data, b"first");
        assert_eq!(r2.data, b"second");
    }

    #[test]
    fn test_fanout_listener_times_out() {
        let cfg = NetConfig::default();
        let listener = FanoutListener::bind(&[Ipv4Addr::LOCALHOST], 0, &cfg).expect("bind");
        let res = listener.listen(Some(Duration::from_millis(100)));
        assert!(res.is_err());
        assert_eq!(res.unwrap_err().kind(), io::ErrorKind::TimedOut);
    }
}
