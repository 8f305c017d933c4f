//! Host and port resolution.
//!
//! Resolves a host argument to an IPv4 address and a port argument to a
//! `u16`, with an explicit numeric-only mode (`-n`) that skips DNS
//! entirely — useful both for speed and for not leaking lookups for
//! addresses already given numerically.
//!
//! Every successful, non-numeric-only lookup is followed by a
//! best-effort PTR-then-forward verification: if the resolved address has
//! a reverse (PTR) record, that name is forward-resolved again and
//! checked against the address. A mismatch usually means the two
//! directions of DNS are administered independently (or spoofed), so it
//! is logged as a warning rather than treated as a resolution failure.

use crate::sock::Proto;
use std::ffi::CStr;
use std::io;
use std::net::{Ipv4Addr, ToSocketAddrs};

/// The historical netcat bound on how many resolved addresses a single
/// hostname lookup keeps (`MAXINETADDRS` in the original source): enough
/// to cover round-robin DNS without unbounded work on a hostile response.
pub const MAX_INET_ADDRS: usize = 6;

/// Resolves `host` to an IPv4 address.
///
/// When `numeric` is `true`, `host` must already be a dotted-quad address;
/// anything else is an error rather than triggering a DNS lookup. When
/// `false`, a numeric address is still accepted as-is; anything else is
/// resolved via the system resolver, which may return several A records.
/// Up to [`MAX_INET_ADDRS`] of them are collected and each is independently
/// PTR-then-forward verified, but the first is always the one returned as
/// the connect target — the user-supplied spelling is authoritative, not
/// which address among several answers it.
pub fn resolve_host(host: &str, numeric: bool) -> io::Result<Ipv4Addr> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        if !numeric {
            verify_reverse_forward(ip, host);
        }
        return Ok(ip);
    }
    if numeric {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{host:?} is not a numeric IPv4 address and -n was given"),
        ));
    }
    // ToSocketAddrs needs a port to drive getaddrinfo; 0 is a placeholder
    // that is discarded below.
    let addrs = (host, 0u16).to_socket_addrs()?;
    let candidates = take_bounded(addrs.filter_map(|a| match a {
        std::net::SocketAddr::V4(v4) => Some(*v4.ip()),
        _ => None,
    }));
    let Some(&first) = candidates.first() else {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{host:?} has no IPv4 address"),
        ));
    };
    if candidates.len() > 1 {
        log::debug!("{host:?} resolved to {} addresses, verifying each", candidates.len());
    }
    for ip in &candidates {
        verify_reverse_forward(*ip, host);
    }
    Ok(first)
}

/// Caps an address iterator at [`MAX_INET_ADDRS`], split out so the bound
/// itself is testable without a real DNS lookup.
fn take_bounded<I: Iterator<Item = Ipv4Addr>>(iter: I) -> Vec<Ipv4Addr> {
    iter.take(MAX_INET_ADDRS).collect()
}

/// Reverse-resolves `ip` via `getnameinfo`, returning `None` if there is
/// no PTR record or the lookup otherwise fails.
#[cfg(unix)]
fn reverse_lookup(ip: Ipv4Addr) -> Option<String> {
    let (sa, len) = crate::raw::to_sockaddr(std::net::SocketAddrV4::new(ip, 0));
    let mut host = [0i8; 256];
    let rc = unsafe {
        libc::getnameinfo(
            &sa as *const _ as *const libc::sockaddr,
            len,
            host.as_mut_ptr(),
            host.len() as libc::socklen_t,
            std::ptr::null_mut(),
            0,
            0,
        )
    };
    if rc != 0 {
        return None;
    }
    let cstr = unsafe { CStr::from_ptr(host.as_ptr()) };
    cstr.to_str().ok().map(str::to_owned)
}

#[cfg(not(unix))]
fn reverse_lookup(_ip: Ipv4Addr) -> Option<String> {
    None
}

/// Warns when `ip` has a PTR record that doesn't forward-resolve back to
/// the same address. No-ops when there's no PTR record at all, or when
/// the PTR name is (case-insensitively) the same string the caller
/// already gave us, since then there is nothing left to cross-check.
fn verify_reverse_forward(ip: Ipv4Addr, original: &str) {
    let Some(ptr_name) = reverse_lookup(ip) else { return };
    if ptr_name.trim_end_matches('.').eq_ignore_ascii_case(original.trim_end_matches('.')) {
        return;
    }
    match (ptr_name.as_str(), 0u16).to_socket_addrs() {
        Ok(addrs) => {
            let forward_ok = addrs
                .filter_map(|a| match a {
                    std::net::SocketAddr::V4(v4) => Some(*v4.ip()),
                    _ => None,
                })
                .any(|a| a == ip);
            if !forward_ok {
                log::warn!("reverse lookup for {ip} gave {ptr_name:?}, which does not resolve back to {ip}");
            }
        }
        Err(_) => {
            log::warn!("reverse lookup for {ip} gave {ptr_name:?}, which does not resolve forward at all");
        }
    }
}

/// Parses a single port number (1-65535; 0 means "let the kernel choose",
/// only valid for local binds), falling back to a `/etc/services`-style
/// lookup (`getservbyname`) for a non-numeric token such as `"http"` or
/// `"echo"`.
pub fn parse_port(s: &str, proto: Proto) -> io::Result<u16> {
    if let Ok(p) = s.parse::<u16>() {
        return Ok(p);
    }
    service_port(s, proto).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("{s:?} is neither a port number nor a known service name"))
    })
}

#[cfg(unix)]
fn service_port(name: &str, proto: Proto) -> Option<u16> {
    let cname = std::ffi::CString::new(name).ok()?;
    let cproto = std::ffi::CString::new(match proto {
        Proto::Tcp => "tcp",
        Proto::Udp => "udp",
    })
    .ok()?;
    let ent = unsafe { libc::getservbyname(cname.as_ptr(), cproto.as_ptr()) };
    if ent.is_null() {
        return None;
    }
    let port_network_order = unsafe { (*ent).s_port };
    Some(u16::from_be(port_network_order as u16))
}

#[cfg(not(unix))]
fn service_port(_name: &str, _proto: Proto) -> Option<u16> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_bound_caps_at_max_inet_addrs() {
        let many = (0u8..20).map(|i| Ipv4Addr::new(10, 0, 0, i));
        let capped = take_bounded(many);
        assert_eq!(capped.len(), MAX_INET_ADDRS);
        assert_eq!(capped[0], Ipv4Addr::new(10, 0, 0, 0));
    }

    #[test]
    fn test_resolve_numeric_ip() {
        let ip = resolve_host("127.0.0.1", true).unwrap();
        assert_eq!(ip, Ipv4Addr::new(127, 0, 0, 1));
    }

    #[test]
    fn test_resolve_numeric_rejects_name() {
        let err = resolve_host("localhost", true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_port_valid() {
        assert_eq!(parse_port("8080", Proto::Tcp).unwrap(), 8080);
    }

    #[test]
    fn test_parse_port_invalid() {
        assert!(parse_port("not-a-port-or-service", Proto::Tcp).is_err());
        assert!(parse_port("99999", Proto::Tcp).is_err());
    }

    #[test]
    fn test_parse_port_service_name() {
        // "echo" (port 7) is about as universally present in
        // /etc/services as any entry gets; skip gracefully if the test
        // sandbox has no services database instead of failing the build.
        if let Ok(p) = parse_port("echo", Proto::Tcp) {
            assert_eq!(p, 7);
        }
    }
}
