//! Socket factory: the common setup every TCP/UDP socket in this crate
//! goes through before it is handed to [`crate::tcp`] or [`crate::udp`] —
//! creation, `SO_REUSEADDR`, optional `SO_LINGER`, and the [`NetConfig`]
//! tuning pass. [`crate::tcp::Connector`]/[`crate::tcp::Listener`] and
//! their UDP equivalents call through this rather than touching
//! [`crate::raw`] directly, so the option set stays consistent across
//! modes.

use crate::config::{self, NetConfig};
use crate::raw as r;
use std::io;
use std::net::SocketAddrV4;

/// Creates a socket of the given type with `SO_REUSEADDR` and an abortive
/// `SO_LINGER{1,0}` close already applied. Every socket this crate hands
/// out — connector, listener, scan probe — goes through this before
/// bind/connect/listen, so a close always causes an RST rather than
/// leaving the port in TIME_WAIT, which would otherwise accumulate
/// across a scan or a repeated connect.
pub fn new_socket(ty: r::Type) -> io::Result<r::OsSocket> {
    let os = r::socket(ty)?;
    r::set_reuseaddr(os, true)?;
    set_abortive_close(os)?;
    Ok(os)
}

/// Creates a socket of the given type, bound to `addr`, with `cfg`'s
/// tuning applied. Does not listen or connect; callers finish the setup
/// appropriate to their mode.
pub fn create_bound(ty: r::Type, addr: SocketAddrV4, cfg: &NetConfig) -> io::Result<r::OsSocket> {
    let os = new_socket(ty)?;
    config::apply_tuning(os, ty, cfg)?;
    r::bind_raw(os, addr)?;
    Ok(os)
}

/// Sets `SO_LINGER` to force an immediate RST-on-close instead of the
/// usual TIME_WAIT lingering close. Used when a scan probe or zero-I/O
/// connect needs to tear down a TCP socket without leaving it in
/// TIME_WAIT, which would otherwise accumulate across a port range.
pub fn set_abortive_close(os: r::OsSocket) -> io::Result<()> {
    r::set_linger(os, true, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_create_bound_assigns_ephemeral_port() {
        let cfg = NetConfig::default();
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0);
        let os = create_bound(r::Type::Dgram, addr, &cfg).expect("create_bound");
        let local = r::get_local_addr(os).expect("get_local_addr");
        assert_ne!(local.port(), 0);
        r::close_raw(os);
    }

    #[test]
    fn test_abortive_close_does_not_error() {
        let cfg = NetConfig::default();
        let addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0);
        let os = create_bound(r::Type::Stream, addr, &cfg).expect("create_bound");
        set_abortive_close(os).expect("set_abortive_close");
        r::close_raw(os);
    }
}
