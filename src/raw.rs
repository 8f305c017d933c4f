//! Low-level IPv4 socket primitives and platform abstractions.
//!
//! This module provides the platform-specific socket plumbing that the rest of
//! the crate builds on: socket creation, binding, non-blocking mode, connect,
//! listen, and the handful of `setsockopt`/`getsockopt` calls the socket
//! factory and UDP listener need (`SO_REUSEADDR`, `SO_LINGER`, `SO_ERROR`, and
//! on Unix, `IP_PKTINFO` ancillary-data reception).
//!
//! Only IPv4 is modelled; there is no `Domain::Ipv6` variant here.
//!
//! # Safety
//!
//! This module contains `unsafe` code for raw socket system calls and
//! ancillary-data buffer manipulation. All `unsafe` operations are
//! encapsulated within safe function interfaces.

use std::io;
use std::net::SocketAddrV4;

/// Socket type for protocol communication.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type {
    /// TCP stream socket
    Stream,
    /// UDP datagram socket
    Dgram,
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use std::os::unix::io::{RawFd, FromRawFd};
        pub type OsSocket = RawFd;

        /// Converts a [`SocketAddrV4`] into a raw `sockaddr_in`.
        pub fn to_sockaddr(addr: SocketAddrV4) -> (libc::sockaddr_in, libc::socklen_t) {
            let mut s: libc::sockaddr_in = unsafe { std::mem::zeroed() };
            s.sin_family = libc::AF_INET as _;
            s.sin_port = addr.port().to_be();
            s.sin_addr = libc::in_addr {
                s_addr: u32::from_ne_bytes(addr.ip().octets()).to_be(),
            };
            (s, std::mem::size_of::<libc::sockaddr_in>() as _)
        }

        /// Converts a raw `sockaddr_in` back into a [`SocketAddrV4`].
        pub fn from_sockaddr(s: &libc::sockaddr_in) -> SocketAddrV4 {
            let ip = std::net::Ipv4Addr::from(u32::from_be(s.sin_addr.s_addr));
            SocketAddrV4::new(ip, u16::from_be(s.sin_port))
        }

        /// Creates a new IPv4 socket of the given type.
        pub fn socket(ty: Type) -> io::Result<OsSocket> {
            let t = match ty { Type::Stream => libc::SOCK_STREAM, Type::Dgram => libc::SOCK_DGRAM };
            let proto = match ty { Type::Stream => libc::IPPROTO_TCP, Type::Dgram => libc::IPPROTO_UDP };
            let fd = unsafe { libc::socket(libc::AF_INET, t | libc::SOCK_CLOEXEC, proto) };
            if fd < 0 { return Err(io::Error::last_os_error()); }
            Ok(fd)
        }

        /// Raw `bind(2)` to an IPv4 address.
        pub fn bind_raw(os: OsSocket, addr: SocketAddrV4) -> io::Result<()> {
            let (sa, len) = to_sockaddr(addr);
            let rc = unsafe { libc::bind(os, &sa as *const _ as *const libc::sockaddr, len) };
            if rc != 0 { return Err(io::Error::last_os_error()); }
            Ok(())
        }

        /// Raw `connect(2)` to an IPv4 address. `EINPROGRESS` is returned as `Ok`
        /// via the caller checking `io::Error::kind() == WouldBlock`; this
        /// function surfaces the raw result unchanged.
        pub fn connect_raw(os: OsSocket, addr: SocketAddrV4) -> io::Result<()> {
            let (sa, len) = to_sockaddr(addr);
            let rc = unsafe { libc::connect(os, &sa as *const _ as *const libc::sockaddr, len) };
            if rc != 0 { return Err(io::Error::last_os_error()); }
            Ok(())
        }

        /// Raw `listen(2)`.
        pub fn listen_raw(os: OsSocket, backlog: i32) -> io::Result<()> {
            if unsafe { libc::listen(os, backlog) } != 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
        }

        /// Sets the socket to non-blocking (or blocking) mode.
        pub fn set_nonblocking(os: OsSocket, on: bool) -> io::Result<()> {
            unsafe {
                let flags = libc::fcntl(os, libc::F_GETFL);
                if flags < 0 { return Err(io::Error::last_os_error()); }
                let nb = if on { flags | libc::O_NONBLOCK } else { flags & !libc::O_NONBLOCK };
                if libc::fcntl(os, libc::F_SETFL, nb) != 0 { return Err(io::Error::last_os_error()); }
                Ok(())
            }
        }

        /// Sets `SO_REUSEADDR`.
        pub fn set_reuseaddr(os: OsSocket, on: bool) -> io::Result<()> {
            setsockopt_int(os, libc::SOL_SOCKET, libc::SO_REUSEADDR, on as i32)
        }

        /// Sets `SO_LINGER`. `onoff=1, linger=0` forces an RST on close instead
        /// of the TIME_WAIT lingering close.
        pub fn set_linger(os: OsSocket, onoff: bool, linger_secs: i32) -> io::Result<()> {
            let l = libc::linger { l_onoff: onoff as i32, l_linger: linger_secs };
            let rc = unsafe {
                libc::setsockopt(
                    os,
                    libc::SOL_SOCKET,
                    libc::SO_LINGER,
                    &l as *const _ as *const _,
                    std::mem::size_of::<libc::linger>() as _,
                )
            };
            if rc != 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
        }

        /// Waits for `os` to become writable (the signal a non-blocking
        /// `connect(2)` uses to report completion), or for `timeout` to
        /// elapse (`None` waits indefinitely). Returns `Ok(true)` once
        /// writable, `Ok(false)` on timeout. `EINTR` is retried against
        /// the same deadline rather than surfaced to the caller.
        pub fn wait_writable(os: OsSocket, timeout: Option<std::time::Duration>) -> io::Result<bool> {
            use std::time::Instant;
            let deadline = timeout.map(|t| Instant::now() + t);
            loop {
                let timeout_ms: i32 = match deadline {
                    Some(dl) => {
                        let remaining = dl.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            return Ok(false);
                        }
                        remaining.as_millis().min(i32::MAX as u128) as i32
                    }
                    None => -1,
                };
                let mut pfd = libc::pollfd { fd: os, events: libc::POLLOUT, revents: 0 };
                let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
                if rc == 0 {
                    return Ok(false);
                }
                if rc > 0 {
                    return Ok(true);
                }
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::Interrupted {
                    return Err(err);
                }
            }
        }

        /// Reads back `SO_ERROR`: `Ok(0)` means no pending error.
        pub fn get_socket_error(os: OsSocket) -> io::Result<i32> {
            let mut val: libc::c_int = 0;
            let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
            let rc = unsafe {
                libc::getsockopt(
                    os,
                    libc::SOL_SOCKET,
                    libc::SO_ERROR,
                    &mut val as *mut _ as *mut _,
                    &mut len,
                )
            };
            if rc != 0 { return Err(io::Error::last_os_error()); }
            Ok(val)
        }

        /// Reads back the local address the kernel assigned the socket.
        pub fn get_local_addr(os: OsSocket) -> io::Result<SocketAddrV4> {
            let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
            let rc = unsafe { libc::getsockname(os, &mut sa as *mut _ as *mut _, &mut len) };
            if rc != 0 { return Err(io::Error::last_os_error()); }
            Ok(from_sockaddr(&sa))
        }

        /// Reads back the peer address of a connected socket.
        pub fn get_peer_addr(os: OsSocket) -> io::Result<SocketAddrV4> {
            let mut sa: libc::sockaddr_in = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
            let rc = unsafe { libc::getpeername(os, &mut sa as *mut _ as *mut _, &mut len) };
            if rc != 0 { return Err(io::Error::last_os_error()); }
            Ok(from_sockaddr(&sa))
        }

        /// Shuts down both directions of the socket. Errors are ignored by
        /// callers performing best-effort cleanup.
        pub fn shutdown_both(os: OsSocket) {
            unsafe { libc::shutdown(os, libc::SHUT_RDWR) };
        }

        /// Closes the raw descriptor.
        pub fn close_raw(os: OsSocket) {
            unsafe { libc::close(os) };
        }

        /// Sets the `SO_RCVBUF` socket receive buffer size.
        pub fn set_recv_buffer(os: OsSocket, bytes: i32) -> io::Result<()> {
            setsockopt_int(os, libc::SOL_SOCKET, libc::SO_RCVBUF, bytes)
        }

        /// Sets the `SO_SNDBUF` socket send buffer size.
        pub fn set_send_buffer(os: OsSocket, bytes: i32) -> io::Result<()> {
            setsockopt_int(os, libc::SOL_SOCKET, libc::SO_SNDBUF, bytes)
        }

        /// Sets the IPv4 `IP_TOS` byte for DSCP/QoS marking.
        pub fn set_tos_v4(os: OsSocket, tos: i32) -> io::Result<()> {
            setsockopt_int(os, libc::IPPROTO_IP, libc::IP_TOS, tos)
        }

        /// Sets `TCP_NODELAY`, disabling Nagle's algorithm.
        pub fn set_tcp_nodelay(os: OsSocket, on: bool) -> io::Result<()> {
            setsockopt_int(os, libc::IPPROTO_TCP, libc::TCP_NODELAY, on as i32)
        }

        /// Sets `SO_REUSEPORT` (Linux/BSD).
        #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd", target_os = "macos"))]
        pub fn set_reuse_port(os: OsSocket, on: bool) -> io::Result<()> {
            setsockopt_int(os, libc::SOL_SOCKET, libc::SO_REUSEPORT, on as i32)
        }

        /// Sets `TCP_QUICKACK` (Linux only). `libc` does not expose the
        /// constant, so the raw option value (12) is used directly.
        #[cfg(any(target_os = "linux", target_os = "android"))]
        pub fn set_tcp_quickack(os: OsSocket, on: bool) -> io::Result<()> {
            const TCP_QUICKACK: i32 = 12;
            setsockopt_int(os, libc::IPPROTO_TCP, TCP_QUICKACK, on as i32)
        }

        /// Sets `SO_BUSY_POLL` (Linux only). `libc` does not expose the
        /// constant, so the raw option value (46) is used directly.
        #[cfg(any(target_os = "linux", target_os = "android"))]
        pub fn set_busy_poll(os: OsSocket, micros: u32) -> io::Result<()> {
            const SO_BUSY_POLL: i32 = 46;
            setsockopt_int(os, libc::SOL_SOCKET, SO_BUSY_POLL, micros as i32)
        }

        fn setsockopt_int(fd: RawFd, level: i32, opt: i32, val: i32) -> io::Result<()> {
            let v = val as libc::c_int;
            let rc = unsafe {
                libc::setsockopt(fd, level, opt, &v as *const _ as _, std::mem::size_of::<libc::c_int>() as _)
            };
            if rc != 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
        }

        /// Enables `IP_PKTINFO` so that `recv_with_pktinfo` can report the
        /// local (destination) address of each inbound datagram. Unix only;
        /// this is the feature-detection seam named in the UDP listener
        /// design (ancillary-capture vs per-interface fan-out).
        #[cfg(any(target_os = "linux", target_os = "android"))]
        pub fn enable_pktinfo(os: OsSocket) -> io::Result<()> {
            setsockopt_int(os, libc::IPPROTO_IP, libc::IP_PKTINFO, 1)
        }

        #[cfg(any(target_os = "linux", target_os = "android"))]
        pub fn pktinfo_supported() -> bool { true }

        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        pub fn pktinfo_supported() -> bool { false }

        /// Receives one datagram along with the `IP_PKTINFO` ancillary data
        /// that reports which local address the packet was delivered to.
        /// Returns `(bytes_read, source_addr, local_addr)`.
        #[cfg(any(target_os = "linux", target_os = "android"))]
        pub fn recv_with_pktinfo(os: OsSocket, buf: &mut [u8], peek: bool) -> io::Result<(usize, SocketAddrV4, SocketAddrV4)> {
            use libc::{cmsghdr, in_pktinfo, iovec, msghdr, sockaddr_in, CMSG_DATA, CMSG_FIRSTHDR, CMSG_NXTHDR};

            let mut src: sockaddr_in = unsafe { std::mem::zeroed() };
            let mut iov = iovec { iov_base: buf.as_mut_ptr() as *mut _, iov_len: buf.len() };
            // Room for one cmsghdr + in_pktinfo, with alignment padding.
            let mut cbuf = [0u8; 128];
            let mut msg: msghdr = unsafe { std::mem::zeroed() };
            msg.msg_name = &mut src as *mut _ as *mut _;
            msg.msg_namelen = std::mem::size_of::<sockaddr_in>() as u32;
            msg.msg_iov = &mut iov;
            msg.msg_iovlen = 1;
            msg.msg_control = cbuf.as_mut_ptr() as *mut _;
            msg.msg_controllen = cbuf.len() as _;

            let flags = if peek { libc::MSG_PEEK } else { 0 };
            let n = unsafe { libc::recvmsg(os, &mut msg, flags) };
            if n < 0 { return Err(io::Error::last_os_error()); }

            let mut local = SocketAddrV4::new(std::net::Ipv4Addr::UNSPECIFIED, 0);
            unsafe {
                let mut cmsg: *mut cmsghdr = CMSG_FIRSTHDR(&msg);
                while !cmsg.is_null() {
                    if (*cmsg).cmsg_level == libc::IPPROTO_IP && (*cmsg).cmsg_type == libc::IP_PKTINFO {
                        let pi = CMSG_DATA(cmsg) as *const in_pktinfo;
                        let ip = std::net::Ipv4Addr::from(u32::from_be((*pi).ipi_addr.s_addr));
                        local = SocketAddrV4::new(ip, 0);
                        break;
                    }
                    cmsg = CMSG_NXTHDR(&msg, cmsg);
                }
            }

            Ok((n as usize, from_sockaddr(&src), local))
        }

        /// Enumerates this host's up, IPv4-bound local addresses via
        /// `getifaddrs`, for the per-interface UDP fan-out listener (the
        /// strategy used wherever `IP_PKTINFO` isn't available). Returns
        /// an empty vector rather than an error if enumeration itself
        /// fails, leaving the caller to fall back to a wildcard bind.
        pub fn list_ipv4_interfaces() -> Vec<std::net::Ipv4Addr> {
            let mut addrs = Vec::new();
            unsafe {
                let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
                if libc::getifaddrs(&mut ifap) != 0 {
                    return addrs;
                }
                let mut cur = ifap;
                while !cur.is_null() {
                    let ifa = &*cur;
                    if !ifa.ifa_addr.is_null() && (ifa.ifa_flags & (libc::IFF_UP as u32)) != 0 {
                        let family = (*ifa.ifa_addr).sa_family as i32;
                        if family == libc::AF_INET {
                            let sin = &*(ifa.ifa_addr as *const libc::sockaddr_in);
                            addrs.push(std::net::Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
                        }
                    }
                    cur = ifa.ifa_next;
                }
                libc::freeifaddrs(ifap);
            }
            addrs
        }

        /// Converts an OS socket into a `std::net::UdpSocket`.
        pub unsafe fn udp_from_os(fd: RawFd) -> std::net::UdpSocket { unsafe { std::net::UdpSocket::from_raw_fd(fd) } }
        /// Converts an OS socket into a `std::net::TcpListener`.
        pub unsafe fn tcp_listener_from_os(fd: RawFd) -> std::net::TcpListener { unsafe { std::net::TcpListener::from_raw_fd(fd) } }
        /// Converts an OS socket into a `std::net::TcpStream`.
        pub unsafe fn tcp_stream_from_os(fd: RawFd) -> std::net::TcpStream { unsafe { std::net::TcpStream::from_raw_fd(fd) } }

    } else {
        // Windows
        use std::sync::Once;
        use windows_sys::Win32::Networking::WinSock::*;
        use std::os::windows::io::{RawSocket, FromRawSocket};
        pub type OsSocket = RawSocket;

        static START: Once = Once::new();
        fn ensure_wsa() {
            START.call_once(|| unsafe {
                let mut data: WSADATA = std::mem::zeroed();
                let rc = WSAStartup(0x202, &mut data);
                if rc != 0 { panic!("WSAStartup failed: {}", rc); }
            });
        }

        /// Converts a [`SocketAddrV4`] into a raw `SOCKADDR_IN`.
        pub fn to_sockaddr(addr: SocketAddrV4) -> (SOCKADDR_IN, i32) {
            let mut s: SOCKADDR_IN = unsafe { std::mem::zeroed() };
            s.sin_family = AF_INET as _;
            s.sin_port = addr.port().to_be();
            s.sin_addr = IN_ADDR { S_un: IN_ADDR_0 { S_addr: u32::from_ne_bytes(addr.ip().octets()).to_be() } };
            (s, std::mem::size_of::<SOCKADDR_IN>() as _)
        }

        /// Converts a raw `SOCKADDR_IN` back into a [`SocketAddrV4`].
        pub fn from_sockaddr(s: &SOCKADDR_IN) -> SocketAddrV4 {
            let ip = std::net::Ipv4Addr::from(u32::from_be(unsafe { s.sin_addr.S_un.S_addr }));
            SocketAddrV4::new(ip, u16::from_be(s.sin_port))
        }

        /// Creates a new IPv4 socket of the given type.
        pub fn socket(ty: Type) -> io::Result<OsSocket> {
            ensure_wsa();
            let t = match ty { Type::Stream => SOCK_STREAM, Type::Dgram => SOCK_DGRAM } as i32;
            let s = unsafe { WSASocketW(AF_INET as i32, t, 0, std::ptr::null_mut(), 0, WSA_FLAG_OVERLAPPED) };
            if s == INVALID_SOCKET { return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() })); }
            Ok(s as _)
        }

        /// Raw `bind` to an IPv4 address.
        pub fn bind_raw(os: OsSocket, addr: SocketAddrV4) -> io::Result<()> {
            let (sa, len) = to_sockaddr(addr);
            let rc = unsafe { bind(os as usize, &sa as *const _ as *const SOCKADDR, len) };
            if rc != 0 { return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() })); }
            Ok(())
        }

        /// Raw `connect` to an IPv4 address.
        pub fn connect_raw(os: OsSocket, addr: SocketAddrV4) -> io::Result<()> {
            let (sa, len) = to_sockaddr(addr);
            let rc = unsafe { connect(os as usize, &sa as *const _ as *const SOCKADDR, len) };
            if rc != 0 { return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() })); }
            Ok(())
        }

        /// Raw `listen`.
        pub fn listen_raw(os: OsSocket, backlog: i32) -> io::Result<()> {
            if unsafe { listen(os as usize, backlog) } != 0 { Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() })) } else { Ok(()) }
        }

        /// Sets the socket to non-blocking (or blocking) mode.
        pub fn set_nonblocking(os: OsSocket, on: bool) -> io::Result<()> {
            ensure_wsa();
            let mut nb: u32 = if on { 1 } else { 0 };
            if unsafe { ioctlsocket(os as usize, FIONBIO, &mut nb) } != 0 {
                return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() }));
            }
            Ok(())
        }

        /// Sets `SO_REUSEADDR`.
        pub fn set_reuseaddr(os: OsSocket, on: bool) -> io::Result<()> {
            setsockopt_int(os, SOL_SOCKET as _, SO_REUSEADDR as _, on as i32)
        }

        /// Sets `SO_LINGER`.
        pub fn set_linger(os: OsSocket, onoff: bool, linger_secs: i32) -> io::Result<()> {
            let l = LINGER { l_onoff: onoff as u16, l_linger: linger_secs as u16 };
            let rc = unsafe {
                setsockopt(os as usize, SOL_SOCKET as _, SO_LINGER as _, &l as *const _ as *const _, std::mem::size_of::<LINGER>() as _)
            };
            if rc != 0 { Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() })) } else { Ok(()) }
        }

        /// Waits for `os` to become writable, or for `timeout` to elapse
        /// (`None` waits indefinitely), via `select`. Returns `Ok(true)`
        /// once writable, `Ok(false)` on timeout.
        pub fn wait_writable(os: OsSocket, timeout: Option<std::time::Duration>) -> io::Result<bool> {
            use std::time::Instant;
            ensure_wsa();
            let deadline = timeout.map(|t| Instant::now() + t);
            let mut wfds: FD_SET = unsafe { std::mem::zeroed() };
            wfds.fd_count = 1;
            wfds.fd_array[0] = os as usize;
            let mut efds: FD_SET = unsafe { std::mem::zeroed() };
            efds.fd_count = 1;
            efds.fd_array[0] = os as usize;
            let tv = deadline.map(|dl| {
                let remaining = dl.saturating_duration_since(Instant::now());
                TIMEVAL { tv_sec: remaining.as_secs() as i32, tv_usec: remaining.subsec_micros() as i32 }
            });
            let tv_ptr = tv.as_ref().map(|t| t as *const TIMEVAL).unwrap_or(std::ptr::null());
            let rc = unsafe { select(0, std::ptr::null_mut(), &mut wfds, &mut efds, tv_ptr) };
            if rc == SOCKET_ERROR {
                return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() }));
            }
            Ok(rc > 0)
        }

        /// Reads back `SO_ERROR`.
        pub fn get_socket_error(os: OsSocket) -> io::Result<i32> {
            let mut val: i32 = 0;
            let mut len = std::mem::size_of::<i32>() as i32;
            let rc = unsafe { getsockopt(os as usize, SOL_SOCKET as _, SO_ERROR as _, &mut val as *mut _ as *mut _, &mut len) };
            if rc != 0 { return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() })); }
            Ok(val)
        }

        /// Reads back the local address the kernel assigned the socket.
        pub fn get_local_addr(os: OsSocket) -> io::Result<SocketAddrV4> {
            let mut sa: SOCKADDR_IN = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<SOCKADDR_IN>() as i32;
            let rc = unsafe { getsockname(os as usize, &mut sa as *mut _ as *mut _, &mut len) };
            if rc != 0 { return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() })); }
            Ok(from_sockaddr(&sa))
        }

        /// Reads back the peer address of a connected socket.
        pub fn get_peer_addr(os: OsSocket) -> io::Result<SocketAddrV4> {
            let mut sa: SOCKADDR_IN = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<SOCKADDR_IN>() as i32;
            let rc = unsafe { getpeername(os as usize, &mut sa as *mut _ as *mut _, &mut len) };
            if rc != 0 { return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() })); }
            Ok(from_sockaddr(&sa))
        }

        /// Shuts down both directions of the socket.
        pub fn shutdown_both(os: OsSocket) {
            unsafe { shutdown(os as usize, SD_BOTH as i32) };
        }

        /// Closes the raw socket handle.
        pub fn close_raw(os: OsSocket) {
            unsafe { closesocket(os as usize) };
        }

        fn setsockopt_int(socket: OsSocket, level: i32, opt: i32, val: i32) -> io::Result<()> {
            unsafe {
                let rc = setsockopt(socket as usize, level, opt, &val as *const _ as _, std::mem::size_of::<i32>() as _);
                if rc != 0 { Err(io::Error::from_raw_os_error(WSAGetLastError())) } else { Ok(()) }
            }
        }

        /// Windows has no portable `IP_PKTINFO` path wired up here; the UDP
        /// listener always uses the per-interface fan-out strategy on this
        /// platform.
        pub fn pktinfo_supported() -> bool { false }

        /// No interface-enumeration path is wired up for Windows here;
        /// the fan-out listener falls back to a single wildcard bind.
        pub fn list_ipv4_interfaces() -> Vec<std::net::Ipv4Addr> { Vec::new() }

        /// Sets the `SO_RCVBUF` socket receive buffer size.
        pub fn set_recv_buffer(os: OsSocket, bytes: i32) -> io::Result<()> {
            setsockopt_int(os, SOL_SOCKET as _, SO_RCVBUF as _, bytes)
        }

        /// Sets the `SO_SNDBUF` socket send buffer size.
        pub fn set_send_buffer(os: OsSocket, bytes: i32) -> io::Result<()> {
            setsockopt_int(os, SOL_SOCKET as _, SO_SNDBUF as _, bytes)
        }

        /// Sets the IPv4 `IP_TOS` byte for DSCP/QoS marking.
        pub fn set_tos_v4(os: OsSocket, tos: i32) -> io::Result<()> {
            setsockopt_int(os, IPPROTO_IP.0 as _, IP_TOS as _, tos)
        }

        /// Sets `TCP_NODELAY`, disabling Nagle's algorithm.
        pub fn set_tcp_nodelay(os: OsSocket, on: bool) -> io::Result<()> {
            setsockopt_int(os, IPPROTO_TCP.0 as _, TCP_NODELAY as _, on as i32)
        }

        /// Converts an OS socket handle into a `std::net::UdpSocket`.
        pub fn udp_from_os(s: OsSocket) -> std::net::UdpSocket { unsafe { std::net::UdpSocket::from_raw_socket(s) } }
        /// Converts an OS socket handle into a `std::net::TcpListener`.
        pub fn tcp_listener_from_os(s: OsSocket) -> std::net::TcpListener { unsafe { std::net::TcpListener::from_raw_socket(s) } }
        /// Converts an OS socket handle into a `std::net::TcpStream`.
        pub fn tcp_stream_from_os(s: OsSocket) -> std::net::TcpStream { unsafe { std::net::TcpStream::from_raw_socket(s) } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_sockaddr_roundtrip() {
        let addr = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 33333);
        let (raw, _len) = to_sockaddr(addr);
        assert_eq!(from_sockaddr(&raw), addr);
    }

    #[test]
    fn test_socket_and_bind() {
        let fd = socket(Type::Dgram).expect("socket");
        let addr = SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 0);
        bind_raw(fd, addr).expect("bind");
        let local = get_local_addr(fd).expect("getsockname");
        assert_eq!(local.ip(), &Ipv4Addr::new(127, 0, 0, 1));
        assert_ne!(local.port(), 0);
        close_raw(fd);
    }

    #[test]
    fn test_reuseaddr_and_linger() {
        let fd = socket(Type::Stream).expect("socket");
        set_reuseaddr(fd, true).expect("reuseaddr");
        set_linger(fd, true, 0).expect("linger");
        close_raw(fd);
    }
}
