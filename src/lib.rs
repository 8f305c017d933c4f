#![deny(unsafe_op_in_unsafe_fn)]

//! `ncrs`: a netcat-style TCP/UDP relay, listener, tunnel and port
//! scanner over IPv4.
//!
//! The crate is organized as one module per component of the original
//! tool: [`resolver`] and [`portset`] turn CLI arguments into concrete
//! addresses and port sets; [`raw`], [`config`], and [`socket_factory`]
//! build sockets; [`tcp`] and [`udp`] drive connection establishment;
//! [`telnet`] and [`hexdump`] transform the bytes crossing the wire;
//! [`multiplex`] is the read/write relay loop; [`signals`] and [`stats`]
//! are the ambient process-level concerns; [`cli`] and [`error`] are the
//! binary's surface.

pub mod buffer;
pub mod cli;
pub mod config;
pub mod error;
pub mod hexdump;
pub mod multiplex;
pub mod portset;
pub mod raw;
pub mod resolver;
pub mod signals;
pub mod sock;
pub mod socket_factory;
pub mod stats;
pub mod tcp;
pub mod telnet;
pub mod udp;

pub use cli::{Cli, NcConfig};
pub use config::NetConfig;
pub use error::{ConfigError, SocketStage, StagedError};
pub use sock::{Mode, Proto};
