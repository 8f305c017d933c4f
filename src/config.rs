//! Network configuration and performance tuning
//!
//! This module provides the low-level socket tuning knobs shared by every
//! connection mode: buffer sizes, TCP latency optimizations, and ToS
//! marking. `NetConfig` is the foundation the netcat-facing [`crate::cli`]
//! layer builds its own configuration on top of; it knows nothing about
//! netcat's modes, ports, or protocols, only about socket-level behaviour.
//!
//! IPv4 only: there is no dual-stack or IPv6-specific knob here.

use std::io;
use crate::raw;

/// Network configuration for performance tuning and optimization.
///
/// All parameters are optional and use sensible defaults when not
/// specified. Platform-specific options are ignored on unsupported
/// platforms.
#[derive(Clone, Debug, PartialEq)]
pub struct NetConfig {
    /// Enable TCP_NODELAY to disable Nagle's algorithm. Ignored for UDP.
    pub tcp_nodelay: bool,

    /// Enable TCP_QUICKACK for faster ACK responses (Linux only).
    pub tcp_quickack: bool,

    /// Enable SO_REUSEPORT (Linux/BSD/macOS only).
    pub reuse_port: bool,

    /// SO_BUSY_POLL timeout in microseconds (Linux only).
    pub busy_poll: Option<u32>,

    /// Socket receive buffer size in bytes (SO_RCVBUF).
    pub recv_buf: Option<usize>,

    /// Socket send buffer size in bytes (SO_SNDBUF).
    pub send_buf: Option<usize>,

    /// IPv4 Type of Service / DSCP marking.
    pub tos: Option<u32>,

    /// TCP listen backlog size.
    pub tcp_backlog: Option<i32>,

    /// Event loop polling timeout in milliseconds.
    pub poll_timeout_ms: Option<u64>,
}

impl Default for NetConfig {
    /// Balanced defaults: TCP optimizations on, 4MB buffers, no busy poll.
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            tcp_quickack: true,
            reuse_port: false,
            busy_poll: None,
            recv_buf: Some(4 << 20),
            send_buf: Some(4 << 20),
            tos: None,
            tcp_backlog: Some(1024),
            poll_timeout_ms: Some(10),
        }
    }
}

impl NetConfig {
    /// Ultra-low latency preset: small buffers, busy polling, aggressive
    /// poll timeout. Suitable for interactive sessions.
    pub fn low_latency() -> Self {
        Self {
            tcp_nodelay: true,
            tcp_quickack: true,
            reuse_port: false,
            busy_poll: Some(50),
            recv_buf: Some(256 * 1024),
            send_buf: Some(256 * 1024),
            tos: Some(0x10),
            tcp_backlog: Some(512),
            poll_timeout_ms: Some(1),
        }
    }

    /// High-throughput preset: large buffers, Nagle enabled, relaxed poll
    /// timeout. Suitable for bulk transfer relaying.
    pub fn high_throughput() -> Self {
        Self {
            tcp_nodelay: false,
            tcp_quickack: false,
            reuse_port: false,
            busy_poll: None,
            recv_buf: Some(16 << 20),
            send_buf: Some(16 << 20),
            tos: Some(0x08),
            tcp_backlog: Some(2048),
            poll_timeout_ms: Some(50),
        }
    }
}

/// Applies the socket-level tuning in `cfg` to a raw socket.
///
/// Must be called before the socket is converted to a standard library
/// type. Unsupported options are silently ignored rather than causing
/// errors, except for the universally-supported buffer and TCP_NODELAY
/// options.
pub fn apply_tuning(os: raw::OsSocket, ty: raw::Type, cfg: &NetConfig) -> io::Result<()> {
    use crate::raw as r;

    if let Some(sz) = cfg.recv_buf { r::set_recv_buffer(os, sz as i32)?; }
    if let Some(sz) = cfg.send_buf { r::set_send_buffer(os, sz as i32)?; }
    if let Some(tos) = cfg.tos { r::set_tos_v4(os, tos as i32)?; }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd", target_os = "macos"))]
    {
        if cfg.reuse_port { r::set_reuse_port(os, true)?; }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        if let Some(us) = cfg.busy_poll { let _ = r::set_busy_poll(os, us); }
        if cfg.tcp_quickack && ty == r::Type::Stream { let _ = r::set_tcp_quickack(os, true); }
    }

    if ty == r::Type::Stream && cfg.tcp_nodelay { r::set_tcp_nodelay(os, true)?; }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NetConfig::default();
        assert_eq!(config.tcp_nodelay, true);
        assert_eq!(config.recv_buf, Some(4 << 20));
        assert_eq!(config.send_buf, Some(4 << 20));
    }

    #[test]
    fn test_low_latency_config() {
        let config = NetConfig::low_latency();
        assert_eq!(config.busy_poll, Some(50));
        assert_eq!(config.recv_buf, Some(256 * 1024));
        assert_eq!(config.poll_timeout_ms, Some(1));
    }

    #[test]
    fn test_high_throughput_config() {
        let config = NetConfig::high_throughput();
        assert_eq!(config.recv_buf, Some(16 << 20));
        assert_eq!(config.tcp_nodelay, false);
        assert_eq!(config.tcp_backlog, Some(2048));
    }

    #[test]
    fn test_config_clone() {
        let config1 = NetConfig::low_latency();
        let config2 = config1.clone();
        assert_eq!(config1, config2);
    }
}
