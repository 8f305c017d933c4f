//! Shared mode/protocol vocabulary used across the connector, listener,
//! and orchestration layers.

/// Transport protocol in use for this run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Proto {
    Tcp,
    Udp,
}

/// Overall operating mode, mirroring the classic netcat invocation shapes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Connect out to a single remote host/port and relay stdio.
    Connect,
    /// Bind and wait for one inbound connection, then relay stdio
    /// (`-l`, without `-L`).
    Listen,
    /// Bind, wait for one inbound connection, then connect onward to a
    /// second endpoint and relay between the two sockets (`-l` with a
    /// tunnel target).
    Tunnel,
    /// Connect to each port in a range with no I/O, reporting which ones
    /// accepted (`-z`).
    Scan,
}
