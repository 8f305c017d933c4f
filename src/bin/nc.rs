//! `nc`: command-line entry point. Parses arguments, resolves them into
//! an [`ncrs::NcConfig`], and dispatches to the connect/listen/tunnel/scan
//! mode implementations, printing a final byte-count summary on the way
//! out.

use clap::Parser;
use ncrs::cli::{Cli, NcConfig};
use ncrs::error::SocketStage;
use ncrs::sock::{Mode, Proto};
use ncrs::stats::Stats;
use std::io::{self, Write};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::process::ExitCode;
use std::time::Duration;

/// Tags an I/O failure with which stage of socket setup it happened in,
/// so the top-level error print reads "connecting: connection refused"
/// instead of a bare `os error 111`.
fn stage<T>(r: io::Result<T>, which: SocketStage) -> io::Result<T> {
    r.map_err(|e| {
        let kind = e.kind();
        io::Error::new(kind, ncrs::error::StagedError::new(which, e))
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Verbosity is CLI-driven, so the logger can't be set up until the
    // arguments are parsed: -v raises the default filter one notch at a
    // time (warn -> info -> debug), same direction as -v itself.
    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = match cli.into_config() {
        Ok(c) => c,
        Err(e) => {
            log::error!("invalid configuration: {e}");
            eprintln!("nc: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = ncrs::signals::install() {
        log::warn!("failed to install signal handlers: {e}");
    }

    let result = run(config);

    match result {
        Ok(code) => code,
        Err(e) => {
            // Print the full `StagedError -> io::Error` source chain
            // (e.g. "connecting: connection refused") instead of just
            // the outermost message.
            let err = anyhow::Error::new(e);
            log::error!("{err:#}");
            eprintln!("nc: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: NcConfig) -> io::Result<ExitCode> {
    match config.mode {
        Mode::Connect if config.zero => run_scan(&config),
        Mode::Connect => run_connect(&config),
        Mode::Listen => run_listen(&config),
        Mode::Tunnel => run_tunnel(&config),
        Mode::Scan => run_scan(&config),
    }
}

fn run_connect(config: &NcConfig) -> io::Result<ExitCode> {
    let host = config.host.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "connect mode requires a host")
    })?;
    let mut ports = config.ports.clone();
    let port = ports
        .take_next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no port given"))?;
    let addr = SocketAddrV4::new(host, port);
    let bind_addr = config.source.map(|ip| SocketAddrV4::new(ip, config.local_port.unwrap_or(0)));

    let mut stats = Stats::new();
    let exit = match config.proto {
        Proto::Tcp => {
            log::info!("connecting to {addr}");
            let mut stream = stage(ncrs::tcp::Connector::connect(addr, bind_addr, config.wait, &config.net), SocketStage::Connect)?;
            relay_stdio(&mut stream, config, &mut stats)?;
            ExitCode::SUCCESS
        }
        Proto::Udp => {
            log::info!("connecting to {addr} (udp)");
            let socket = stage(ncrs::udp::Connector::connect(addr, bind_addr, &config.net), SocketStage::Connect)?;
            relay_stdio_udp(socket, config, &mut stats)?;
            ExitCode::SUCCESS
        }
    };
    stats.print_final();
    Ok(exit)
}

fn run_listen(config: &NcConfig) -> io::Result<ExitCode> {
    let port = first_port(config)?;
    let bind_ip = config.source.unwrap_or(Ipv4Addr::UNSPECIFIED);
    let addr = SocketAddrV4::new(bind_ip, port);
    let allow: Vec<Ipv4Addr> = config.allow_host.into_iter().collect();

    let mut stats = Stats::new();
    match config.proto {
        Proto::Tcp => {
            log::info!("listening on {addr}");
            let listener = stage(ncrs::tcp::Listener::bind(addr, &config.net), SocketStage::Bind)?;
            if config.zero {
                // Zero-I/O listen: never accept, just occupy the port
                // until the wait timeout (or forever) elapses.
                stage(listener.refuse_until_timeout(config.wait), SocketStage::Accept)?;
                return Ok(ExitCode::SUCCESS);
            }
            let (mut stream, _peer) = stage(listener.accept_from(&allow, config.wait), SocketStage::Accept)?;
            relay_stdio(&mut stream, config, &mut stats)?;
        }
        Proto::Udp => {
            log::info!("listening on {addr} (udp)");
            let udp_listener = stage(ncrs::udp::bind_listener(port, &config.net), SocketStage::Bind)?;
            if config.zero {
                // Zero-I/O UDP listen has no connection to establish: it
                // just drains datagrams as they arrive, writing each
                // payload to stdout, until the wait deadline elapses or a
                // signal asks for shutdown. Every datagram is consumed
                // exactly once (a real recv, never a re-peeked one).
                loop {
                    if ncrs::signals::got_sigint() || ncrs::signals::got_sigterm() {
                        break;
                    }
                    let received = match udp_listener.listen(config.wait) {
                        Ok(r) => r,
                        Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                        Err(e) => return Err(e),
                    };
                    if !allow.is_empty() && !allow.contains(received.remote.ip()) {
                        log::warn!("dropping datagram from {}: not in allow-list", received.remote);
                        continue;
                    }
                    io::stdout().write_all(&received.data)?;
                    stats.add_received(received.data.len());
                }
                stats.print_final();
                return Ok(ExitCode::SUCCESS);
            }
            let received = stage(udp_listener.listen(config.wait), SocketStage::Accept)?;
            if !allow.is_empty() && !allow.contains(received.remote.ip()) {
                log::warn!("dropping datagram from {}: not in allow-list", received.remote);
                return Ok(ExitCode::SUCCESS);
            }
            io::stdout().write_all(&received.data)?;
            let socket = stage(
                ncrs::udp::Connector::connect(received.remote, Some(received.local), &config.net),
                SocketStage::Connect,
            )?;
            stats.add_received(received.data.len());
            relay_stdio_udp(socket, config, &mut stats)?;
        }
    }
    stats.print_final();
    Ok(ExitCode::SUCCESS)
}

fn run_tunnel(config: &NcConfig) -> io::Result<ExitCode> {
    let port = first_port(config)?;
    let bind_ip = config.source.unwrap_or(Ipv4Addr::UNSPECIFIED);
    let addr = SocketAddrV4::new(bind_ip, port);
    let allow: Vec<Ipv4Addr> = config.allow_host.into_iter().collect();
    let tunnel_host = config
        .tunnel_host
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "tunnel mode requires a destination"))?;
    let tunnel_port = config
        .tunnel_port
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "tunnel mode requires a destination port"))?;
    let tunnel_addr = SocketAddrV4::new(tunnel_host, tunnel_port);

    let mut stats = Stats::new();
    match config.proto {
        Proto::Tcp => {
            log::info!("tunneling {addr} to {tunnel_addr}");
            let listener = stage(ncrs::tcp::Listener::bind(addr, &config.net), SocketStage::Bind)?;
            let (mut inbound, _peer) = stage(listener.accept_from(&allow, config.wait), SocketStage::Accept)?;
            let mut outbound = stage(
                ncrs::tcp::Connector::connect(tunnel_addr, None, config.wait, &config.net),
                SocketStage::Connect,
            )?;
            relay_two(&mut inbound, &mut outbound, config, &mut stats)?;
        }
        Proto::Udp => {
            log::info!("tunneling {addr} to {tunnel_addr} (udp)");
            let udp_listener = stage(ncrs::udp::bind_listener(port, &config.net), SocketStage::Bind)?;
            let received = stage(udp_listener.listen(config.wait), SocketStage::Accept)?;
            if !allow.is_empty() && !allow.contains(received.remote.ip()) {
                log::warn!("dropping datagram from {}: not in allow-list", received.remote);
                return Ok(ExitCode::SUCCESS);
            }
            let inbound = stage(
                ncrs::udp::Connector::connect(received.remote, Some(received.local), &config.net),
                SocketStage::Connect,
            )?;
            let outbound =
                stage(ncrs::udp::Connector::connect(tunnel_addr, None, &config.net), SocketStage::Connect)?;
            outbound.send(&received.data)?;
            relay_two_udp(inbound, outbound, config, &mut stats)?;
        }
    }
    stats.print_final();
    Ok(ExitCode::SUCCESS)
}

fn run_scan(config: &NcConfig) -> io::Result<ExitCode> {
    let host = config
        .host
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "scan mode requires a host"))?;
    let mut ports = config.ports.clone();
    let mut any_open = false;
    let timeout = config.wait.unwrap_or(Duration::from_secs(2));

    loop {
        if ncrs::signals::got_sigterm() || ncrs::signals::got_sigint() {
            break;
        }
        let port = if config.randomize { ports.take_random() } else { ports.take_next() };
        let Some(port) = port else { break };
        let addr = SocketAddrV4::new(host, port);

        match config.proto {
            Proto::Tcp => match ncrs::tcp::Connector::connect(addr, None, Some(timeout), &config.net) {
                Ok(_stream) => {
                    println!("{addr} open");
                    any_open = true;
                }
                Err(e) => {
                    log::debug!("scan: {addr} closed ({e})");
                    println!("{addr} closed");
                }
            },
            Proto::Udp => {
                // UDP has no connect handshake to probe with; report
                // reachability optimistically once the local socket is set up.
                match ncrs::udp::Connector::connect(addr, None, &config.net) {
                    Ok(_) => {
                        println!("{addr} open?");
                        any_open = true;
                    }
                    Err(e) => {
                        log::debug!("scan: {addr} closed ({e})");
                        println!("{addr} closed");
                    }
                }
            }
        }
    }

    Ok(if any_open { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn first_port(config: &NcConfig) -> io::Result<u16> {
    let mut ports = config.ports.clone();
    ports
        .take_next()
        .or(config.local_port)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "a local port is required"))
}

fn relay_stdio<S>(socket: &mut S, config: &NcConfig, stats: &mut Stats) -> io::Result<()>
where
    S: io::Read + io::Write + std::os::unix::io::AsRawFd,
{
    let mut opts = build_relay_options(config)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdin_file = unsafe { dup_as_file(&stdin) };
    let mut stdout_file = unsafe { dup_as_file(&stdout) };
    ncrs::multiplex::core_readwrite(&mut stdin_file, &mut stdout_file, socket, &mut opts, stats)
}

fn relay_two(
    inbound: &mut std::net::TcpStream,
    outbound: &mut std::net::TcpStream,
    config: &NcConfig,
    stats: &mut Stats,
) -> io::Result<()> {
    let mut opts = build_relay_options(config)?;
    let mut inbound_read = inbound.try_clone()?;
    ncrs::multiplex::core_readwrite(&mut inbound_read, inbound, outbound, &mut opts, stats)
}

fn build_relay_options(config: &NcConfig) -> io::Result<ncrs::multiplex::RelayOptions> {
    let hexdump: Option<Box<dyn io::Write + Send>> = if let Some(path) = &config.hexdump_output {
        Some(Box::new(std::fs::File::create(path)?))
    } else if config.hexdump {
        Some(Box::new(io::stderr()))
    } else {
        None
    };
    Ok(ncrs::multiplex::RelayOptions {
        telnet: config.telnet,
        hexdump,
        eof_close: config.close_on_eof,
        idle_timeout: config.wait,
        pacing: config.interval,
    })
}

/// Duplicates a standard stream handle into an owned `File` so it can be
/// registered directly with the relay loop's `mio::Poll`.
unsafe fn dup_as_file<T: std::os::unix::io::AsRawFd>(stream: &T) -> std::fs::File {
    use std::os::unix::io::FromRawFd;
    let fd = unsafe { libc::dup(stream.as_raw_fd()) };
    unsafe { std::fs::File::from_raw_fd(fd) }
}

/// Drives a connected UDP socket through the same `mio`-based relay loop
/// the TCP path uses, via [`ncrs::udp::UdpStream`]'s `Read`/`Write`
/// adapter, so `-t`/`-x`/`-i` all apply uniformly across both protocols.
fn relay_stdio_udp(socket: std::net::UdpSocket, config: &NcConfig, stats: &mut Stats) -> io::Result<()> {
    let mut remote = ncrs::udp::UdpStream(socket);
    relay_stdio(&mut remote, config, stats)
}

fn relay_two_udp(
    inbound: std::net::UdpSocket,
    outbound: std::net::UdpSocket,
    config: &NcConfig,
    stats: &mut Stats,
) -> io::Result<()> {
    let mut opts = build_relay_options(config)?;
    let inbound_read = inbound.try_clone()?;
    let mut local_in = ncrs::udp::UdpStream(inbound_read);
    let mut local_out = ncrs::udp::UdpStream(inbound);
    let mut remote = ncrs::udp::UdpStream(outbound);
    ncrs::multiplex::core_readwrite(&mut local_in, &mut local_out, &mut remote, &mut opts, stats)
}
