//! Command-line surface: argument parsing and validation into a
//! [`NcConfig`] the orchestration layer in `bin/nc.rs` can act on directly.

use crate::error::ConfigError;
use crate::portset::PortSet;
use crate::sock::{Mode, Proto};
use clap::Parser;
use std::net::Ipv4Addr;
use std::time::Duration;

/// A netcat-style TCP/UDP relay, listener, tunnel and port scanner over IPv4.
#[derive(Parser, Debug)]
#[command(name = "nc", version, about)]
pub struct Cli {
    /// Listen for an inbound connection instead of connecting out.
    #[arg(short = 'l', long)]
    pub listen: bool,

    /// End the session as soon as stdin reaches EOF, instead of waiting
    /// for the remote side to also finish.
    #[arg(short = 'c', long = "close")]
    pub close: bool,

    /// Once listening, forward the connection on to HOST:PORT instead of
    /// relaying to stdio (tunnel mode). Implies --listen.
    #[arg(short = 'L', long, value_name = "HOST:PORT")]
    pub tunnel: Option<String>,

    /// Use UDP instead of TCP.
    #[arg(short = 'u', long)]
    pub udp: bool,

    /// Treat HOST as a numeric address only; never resolve names.
    #[arg(short = 'n', long)]
    pub numeric: bool,

    /// Scan only: try to connect to every given port with no I/O, report
    /// which ones accept.
    #[arg(short = 'z', long)]
    pub zero: bool,

    /// Randomize the order ports are tried in during a scan.
    #[arg(short = 'r', long)]
    pub randomize: bool,

    /// Force TCP protocol selection. Inert: TCP is already the default
    /// whenever `-u` is absent. Accepted so that argument lists written
    /// against the historical `-t`/`-u` pairing still parse.
    #[arg(short = 't', long = "tcp")]
    pub tcp: bool,

    /// Strip (and answer) telnet IAC negotiation on the wire.
    #[arg(short = 'T', long = "telnet")]
    pub telnet: bool,

    /// Hex-dump all traffic crossing the relay to stderr (or to the
    /// `-o` file, when given).
    #[arg(short = 'x', long)]
    pub hexdump: bool,

    /// Write the hex dump to this file instead of stderr. Implies `-x`.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<std::path::PathBuf>,

    /// Source-routing pointer/gateway option. Accepted for compatibility;
    /// loose source routing (LSRR) is not implemented by this build.
    #[arg(short = 'g', long = "gateway", value_name = "HOST")]
    pub gateway: Option<String>,

    /// Source-routing pointer offset. Accepted for compatibility, inert
    /// for the same reason as `-g`.
    #[arg(short = 'G', long = "pointer", value_name = "NUM")]
    pub pointer: Option<u32>,

    /// Local port to bind before connecting out, or the port to listen
    /// on in listen/tunnel mode.
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Local source address to bind before connecting out.
    #[arg(short = 's', long, value_name = "ADDR")]
    pub source: Option<Ipv4Addr>,

    /// Seconds to wait for a connect, accept, or idle relay before
    /// giving up.
    #[arg(short = 'w', long, value_name = "SECS")]
    pub wait: Option<u64>,

    /// Seconds to pause between each line/chunk sent from stdin.
    #[arg(short = 'i', long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Increase verbosity; repeatable.
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Refused: executing a shell over the network socket is a
    /// remote-code-execution primitive this build does not provide.
    /// Accepted only so that scripts invoking it fail with a clear
    /// message instead of "unknown flag".
    #[arg(short = 'e', long, value_name = "COMMAND")]
    pub exec: Option<String>,

    /// Target host (omit in pure listen mode).
    pub host: Option<String>,

    /// Port, or a comma/space-separated list of ports and LO-HI/LO:HI
    /// ranges to scan/listen on.
    #[arg(trailing_var_arg = true)]
    pub ports: Vec<String>,
}

/// Fully validated configuration the orchestration layer drives the
/// socket factory with.
#[derive(Debug)]
pub struct NcConfig {
    pub mode: Mode,
    pub proto: Proto,
    pub host: Option<Ipv4Addr>,
    /// Peer allow-list for listen/tunnel mode. The optional positional
    /// HOST argument in those modes names the one peer address accepted;
    /// it is never a bind address (that's `-s`/`source`).
    pub allow_host: Option<Ipv4Addr>,
    pub tunnel_host: Option<Ipv4Addr>,
    pub tunnel_port: Option<u16>,
    pub local_port: Option<u16>,
    pub source: Option<Ipv4Addr>,
    pub ports: PortSet,
    pub numeric: bool,
    pub randomize: bool,
    pub telnet: bool,
    pub hexdump: bool,
    pub hexdump_output: Option<std::path::PathBuf>,
    pub close_on_eof: bool,
    pub zero: bool,
    pub wait: Option<Duration>,
    pub interval: Option<Duration>,
    pub verbosity: u8,
    pub net: crate::config::NetConfig,
}

impl Cli {
    /// Validates and assembles a [`NcConfig`], resolving the host (unless
    /// `-n` forces numeric-only) and parsing every port/port-range token.
    pub fn into_config(self) -> Result<NcConfig, ConfigError> {
        if self.exec.is_some() {
            return Err(ConfigError::ExecRefused);
        }

        if self.tunnel.is_some() && self.zero {
            return Err(ConfigError::Conflicting("-L/--tunnel cannot be combined with -z/--zero".into()));
        }

        let proto = if self.udp { Proto::Udp } else { Proto::Tcp };

        let (mode, tunnel_host, tunnel_port) = if let Some(spec) = &self.tunnel {
            let (h, p) = split_host_port(spec, proto)
                .map_err(|e| ConfigError::InvalidHost(spec.clone(), e))?;
            (Mode::Tunnel, Some(h), Some(p))
        } else if self.listen {
            (Mode::Listen, None, None)
        } else if self.zero {
            (Mode::Scan, None, None)
        } else {
            (Mode::Connect, None, None)
        };

        if matches!(mode, Mode::Listen | Mode::Tunnel) {
            let explicit_ports = count_port_tokens(&self.host, &self.ports);
            if explicit_ports > 1 {
                return Err(ConfigError::ListenPortCount(explicit_ports));
            }
        }

        // In listen/tunnel mode the positional HOST argument (when it
        // isn't actually a bare port number that landed here instead of
        // in `ports`, see below) is the peer allow-filter, not a bind
        // address: matches historical netcat's own `-l [host] port`
        // invocation shape, where the bind address always comes from
        // `-s`.
        let mut allow_host = None;
        let host = match (&mode, &self.host) {
            (Mode::Listen, None) | (Mode::Tunnel, None) => None,
            (Mode::Listen, Some(h)) | (Mode::Tunnel, Some(h)) => {
                if h.parse::<u16>().is_err() {
                    allow_host = Some(
                        crate::resolver::resolve_host(h, self.numeric)
                            .map_err(|e| ConfigError::InvalidHost(h.clone(), e))?,
                    );
                }
                None
            }
            (_, Some(h)) => Some(
                crate::resolver::resolve_host(h, self.numeric)
                    .map_err(|e| ConfigError::InvalidHost(h.clone(), e))?,
            ),
            (_, None) => return Err(ConfigError::MissingTarget),
        };

        let mut ports = PortSet::new();
        if matches!(mode, Mode::Listen | Mode::Tunnel) {
            if let Some(p) = self.port {
                ports.set(p);
            } else if let Some(h) = &self.host {
                if let Ok(p) = h.parse::<u16>() {
                    ports.set(p);
                }
            }
        } else {
            for tok in &self.ports {
                parse_port_token(tok, proto, &mut ports)?;
            }
        }

        Ok(NcConfig {
            mode,
            proto,
            host,
            allow_host,
            tunnel_host,
            tunnel_port,
            local_port: self.port,
            source: self.source,
            ports,
            numeric: self.numeric,
            randomize: self.randomize,
            telnet: self.telnet,
            hexdump: self.hexdump || self.output.is_some(),
            hexdump_output: self.output,
            close_on_eof: self.close,
            zero: self.zero,
            wait: self.wait.map(Duration::from_secs),
            interval: self.interval.map(Duration::from_secs),
            verbosity: self.verbose,
            net: crate::config::NetConfig::default(),
        })
    }
}

fn count_port_tokens(host: &Option<String>, ports: &[String]) -> usize {
    // In listen/tunnel mode a bare port may have been parsed into `host`
    // (no peer to resolve), so count both when deciding "more than one
    // port was given".
    let mut n = ports.len();
    if let Some(h) = host {
        if h.parse::<u16>().is_ok() {
            n += 1;
        }
    }
    n
}

fn split_host_port(spec: &str, proto: Proto) -> io::Result<(Ipv4Addr, u16)> {
    let (h, p) = spec
        .rsplit_once(':')
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "expected HOST:PORT"))?;
    let ip = crate::resolver::resolve_host(h, false)?;
    let port = crate::resolver::parse_port(p, proto)?;
    Ok((ip, port))
}

fn parse_port_token(tok: &str, proto: Proto, ports: &mut PortSet) -> Result<(), ConfigError> {
    let sep = tok.find(['-', ':']);
    match sep {
        Some(idx) => {
            let (lo_s, rest) = tok.split_at(idx);
            let hi_s = &rest[1..];
            // Either bound may be omitted (`-100`, `100-`, `-`), defaulting
            // to the low/high end of the port space respectively.
            let lo: u16 = if lo_s.is_empty() {
                1
            } else {
                lo_s.parse()
                    .map_err(|_| ConfigError::InvalidPortRange(tok.to_string(), "bad lower bound".into()))?
            };
            let hi: u16 = if hi_s.is_empty() {
                65535
            } else {
                hi_s.parse()
                    .map_err(|_| ConfigError::InvalidPortRange(tok.to_string(), "bad upper bound".into()))?
            };
            ports.set_range(lo, hi);
        }
        None => {
            let p = crate::resolver::parse_port(tok, proto)
                .map_err(|_| ConfigError::InvalidPortRange(tok.to_string(), "not a number or known service".into()))?;
            ports.set(p);
        }
    }
    Ok(())
}

use std::io;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_port() {
        let mut ports = PortSet::new();
        parse_port_token("8080", Proto::Tcp, &mut ports).unwrap();
        assert!(ports.get(8080));
        assert_eq!(ports.count(), 1);
    }

    #[test]
    fn test_parse_closed_range_both_separators() {
        let mut dash = PortSet::new();
        parse_port_token("20-25", Proto::Tcp, &mut dash).unwrap();
        assert_eq!(dash.count(), 6);

        let mut colon = PortSet::new();
        parse_port_token("20:25", Proto::Tcp, &mut colon).unwrap();
        assert_eq!(colon.count(), 6);
    }

    #[test]
    fn test_parse_open_lower_bound_defaults_to_one() {
        let mut ports = PortSet::new();
        parse_port_token("-5", Proto::Tcp, &mut ports).unwrap();
        assert!(ports.get(1));
        assert!(ports.get(5));
        assert_eq!(ports.count(), 5);
    }

    #[test]
    fn test_parse_open_upper_bound_defaults_to_max() {
        let mut ports = PortSet::new();
        parse_port_token("65533-", Proto::Tcp, &mut ports).unwrap();
        assert!(ports.get(65533));
        assert!(ports.get(65535));
        assert_eq!(ports.count(), 3);
    }

    #[test]
    fn test_parse_invalid_port_token_rejected() {
        let mut ports = PortSet::new();
        assert!(parse_port_token("not-a-port", Proto::Tcp, &mut ports).is_err());
    }

    #[test]
    fn test_tunnel_and_zero_conflict() {
        let cli = Cli {
            listen: false,
            close: false,
            tunnel: Some("127.0.0.1:9999".into()),
            udp: false,
            numeric: true,
            zero: true,
            randomize: false,
            tcp: false,
            telnet: false,
            hexdump: false,
            output: None,
            gateway: None,
            pointer: None,
            port: Some(1234),
            source: None,
            wait: None,
            interval: None,
            verbose: 0,
            exec: None,
            host: None,
            ports: Vec::new(),
        };
        assert!(matches!(cli.into_config(), Err(ConfigError::Conflicting(_))));
    }

    #[test]
    fn test_exec_is_refused() {
        let cli = Cli {
            listen: false,
            close: false,
            tunnel: None,
            udp: false,
            numeric: true,
            zero: false,
            randomize: false,
            tcp: false,
            telnet: false,
            hexdump: false,
            output: None,
            gateway: None,
            pointer: None,
            port: None,
            source: None,
            wait: None,
            interval: None,
            verbose: 0,
            exec: Some("/bin/sh".into()),
            host: Some("127.0.0.1".into()),
            ports: vec!["1234".into()],
        };
        assert!(matches!(cli.into_config(), Err(ConfigError::ExecRefused)));
    }
}
