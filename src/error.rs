//! Error types for configuration validation and socket-stage reporting.

use thiserror::Error;

/// Which phase of socket setup an I/O error occurred in, so the top-level
/// orchestration can print the same kind of "connect to X failed" context
/// netcat itself reports, without every internal function needing to know
/// about process exit codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SocketStage {
    Resolve,
    Bind,
    Listen,
    Connect,
    Accept,
    ReadWrite,
}

impl std::fmt::Display for SocketStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SocketStage::Resolve => "resolving host/port",
            SocketStage::Bind => "binding local socket",
            SocketStage::Listen => "listening",
            SocketStage::Connect => "connecting",
            SocketStage::Accept => "accepting connection",
            SocketStage::ReadWrite => "relaying data",
        };
        f.write_str(s)
    }
}

/// An I/O error tagged with the stage it happened in.
#[derive(Debug, Error)]
#[error("{stage}: {source}")]
pub struct StagedError {
    pub stage: SocketStage,
    #[source]
    pub source: std::io::Error,
}

impl StagedError {
    pub fn new(stage: SocketStage, source: std::io::Error) -> Self {
        Self { stage, source }
    }
}

/// Errors raised while validating and assembling the CLI's configuration,
/// before any socket is ever touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no host/port arguments given")]
    MissingTarget,

    #[error("invalid port or port range {0:?}: {1}")]
    InvalidPortRange(String, String),

    #[error("listen mode requires exactly one local port, got {0}")]
    ListenPortCount(usize),

    #[error("-e/--exec is refused: executing a shell over the network socket is a remote-code-execution primitive this build does not provide")]
    ExecRefused,

    #[error("--ipv6 is not supported; this build is IPv4-only")]
    Ipv6Unsupported,

    #[error("conflicting options: {0}")]
    Conflicting(String),

    #[error("invalid host {0:?}: {1}")]
    InvalidHost(String, #[source] std::io::Error),
}
