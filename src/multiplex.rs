//! The core read/write relay loop between two endpoints (stdio and a
//! socket, or two sockets in tunnel mode).
//!
//! This is a readiness-driven pump built on `mio`: both endpoints are
//! registered with a `Poll`, and whichever side becomes readable gets
//! read. Bytes read from `local` (the slave: stdin, or the accepted
//! socket in tunnel mode) are queued and written out to `remote` (the
//! main socket) once any write-rate pacing allows; bytes read from
//! `remote` go straight out to `local` with no pacing, matching the
//! original tool's asymmetry (only the outbound-to-network direction is
//! ever paced).
//!
//! EOF handling follows netcat's historical default: the loop exits once
//! *either* side reaches EOF and the other side's write queue has
//! drained (`-q 0`/eofclose-style graceful shutdown, not needing a
//! dedicated half-close state machine since both directions are pumped
//! independently until their source is exhausted).

use crate::buffer::NcBuffer;
use crate::stats::Stats;
use crate::telnet::TelnetFilter;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::io::{self, ErrorKind, Read, Write};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

const LOCAL: Token = Token(0);
const REMOTE: Token = Token(1);
const READ_CHUNK: usize = 8192;

/// Options that change the relay loop's behaviour without changing its
/// core shape.
#[derive(Default)]
pub struct RelayOptions {
    /// Strip (and answer) telnet IAC sequences on the remote side.
    pub telnet: bool,
    /// Tee all traffic through a hex dump writer.
    pub hexdump: Option<Box<dyn Write + Send>>,
    /// Close as soon as stdin reaches EOF, without waiting for the
    /// remote side to also finish (`-c`/close-on-EOF).
    pub eof_close: bool,
    /// Give up and return a timeout error if no bytes cross the relay
    /// for this long in either direction.
    pub idle_timeout: Option<Duration>,
    /// Per-line pacing (`-i interval`): at most one line (up to and
    /// including the first newline), or the rest of the buffered bytes
    /// if there is no newline, is written to `remote` per interval.
    pub pacing: Option<Duration>,
}

/// Runs the relay loop between `local` (normally stdin/stdout) and
/// `remote` (the socket), until both sides are exhausted, a signal
/// requests shutdown, or the idle timeout elapses.
pub fn core_readwrite<L, R>(
    local_in: &mut L,
    local_out: &mut L,
    remote: &mut R,
    opts: &mut RelayOptions,
    stats: &mut Stats,
) -> io::Result<()>
where
    L: Read + Write + AsRawFd,
    R: Read + Write + AsRawFd,
{
    // A caller may have handed us a socket still in blocking mode (the
    // connector/listener flip back to blocking once the handshake/accept
    // completes); reassert non-blocking here since every read and write
    // below is only ever attempted after a readiness event.
    force_nonblocking(remote.as_raw_fd())?;

    let mut poll = Poll::new()?;
    let mut local_fd = SourceFd(&local_in.as_raw_fd());
    let mut remote_fd = SourceFd(&remote.as_raw_fd());
    poll.registry().register(&mut local_fd, LOCAL, Interest::READABLE)?;
    poll.registry().register(&mut remote_fd, REMOTE, Interest::READABLE | Interest::WRITABLE)?;

    let mut events = Events::with_capacity(16);
    let mut telnet = TelnetFilter::new();
    let mut local_eof = false;
    let mut remote_eof = false;
    let mut buf = vec![0u8; READ_CHUNK];
    let mut last_activity = Instant::now();

    // `main_sendq`: bytes read from `local` waiting to be written to
    // `remote`, gated by `delay_until` when pacing is enabled. This is
    // the one direction the original tool paces; the remote-to-local
    // direction is written as soon as it's read, same as before.
    let mut main_sendq: NcBuffer<'static> = NcBuffer::empty();
    let mut delay_until: Option<Instant> = None;
    // `local_sendq`: bytes read from `remote` waiting to be written to
    // `local` (the slave output: stdout, or the accepted socket in tunnel
    // mode). Mirrors `main_sendq`'s short-write/`WouldBlock` handling, so
    // a slow consumer on this side can't stall the whole loop either.
    let mut local_sendq: NcBuffer<'static> = NcBuffer::empty();

    loop {
        if crate::signals::take_sigint() {
            break;
        }
        if crate::signals::got_sigterm() {
            break;
        }
        if local_eof && remote_eof && main_sendq.is_empty() && local_sendq.is_empty() {
            break;
        }

        let mut poll_timeout = Duration::from_millis(100);
        if let Some(dl) = delay_until {
            let remaining = dl.saturating_duration_since(Instant::now());
            poll_timeout = poll_timeout.min(remaining.max(Duration::from_millis(1)));
        }

        match poll.poll(&mut events, Some(poll_timeout)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }

        if crate::signals::take_sigusr1() {
            stats.print_final();
        }

        if let Some(idle) = opts.idle_timeout {
            if last_activity.elapsed() >= idle {
                return Err(io::Error::new(ErrorKind::TimedOut, "relay idle timeout"));
            }
        }

        for ev in events.iter() {
            match ev.token() {
                LOCAL if !local_eof && main_sendq.is_empty() => {
                    match local_in.read(&mut buf) {
                        Ok(0) => {
                            local_eof = true;
                            let _ = poll.registry().deregister(&mut local_fd);
                            if opts.eof_close {
                                remote_eof = true;
                                let _ = poll.registry().deregister(&mut remote_fd);
                            }
                        }
                        Ok(n) => {
                            last_activity = Instant::now();
                            log::debug!("read {n} bytes from local");
                            main_sendq.append(&buf[..n]);
                        }
                        Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                        Err(e) => return Err(e),
                    }
                }
                REMOTE if !remote_eof && local_sendq.is_empty() => {
                    match remote.read(&mut buf) {
                        Ok(0) => {
                            remote_eof = true;
                            log::debug!("remote reached EOF");
                            let _ = poll.registry().deregister(&mut remote_fd);
                        }
                        Ok(n) => {
                            last_activity = Instant::now();
                            log::debug!("read {n} bytes from remote");
                            let out = if opts.telnet {
                                let (payload, replies) = telnet.process(&buf[..n]);
                                if !replies.is_empty() {
                                    // Best-effort: a telnet negotiation
                                    // reply that fails to write is not
                                    // fatal to the relay.
                                    let _ = remote.write_all(&replies);
                                }
                                payload
                            } else {
                                buf[..n].to_vec()
                            };
                            if let Some(w) = opts.hexdump.as_mut() {
                                let _ = crate::hexdump::write_hexdump(w, &out, 0);
                            }
                            local_sendq.append(&out);
                        }
                        Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                        Err(e) => return Err(e),
                    }
                }
                _ => {}
            }
        }

        // Flush `main_sendq` to `remote`, subject to pacing: at most one
        // line per interval, reloading `delay_until` each time a chunk
        // goes out. With no pacing configured the whole queue drains
        // every time there's something to write. Every write is
        // non-blocking: a `WouldBlock` or short write leaves the
        // remainder queued for the next WRITABLE readiness event instead
        // of stalling the loop (which would starve the read side).
        while !main_sendq.is_empty() {
            if let Some(dl) = delay_until {
                if Instant::now() < dl {
                    break;
                }
            }
            let take = {
                let remaining = main_sendq.remaining();
                match opts.pacing {
                    Some(_) => remaining.iter().position(|&b| b == b'\n').map(|i| i + 1).unwrap_or(remaining.len()),
                    None => remaining.len(),
                }
            };
            let chunk: Vec<u8> = main_sendq.remaining()[..take].to_vec();
            if let Some(w) = opts.hexdump.as_mut() {
                let _ = crate::hexdump::write_hexdump(w, &chunk, 0);
            }
            match remote.write(&chunk) {
                Ok(n) => {
                    main_sendq.advance(n);
                    stats.add_sent(n);
                    if n < chunk.len() {
                        log::debug!("short write to remote: {n}/{} bytes queued for later", chunk.len());
                        break;
                    }
                    if let Some(interval) = opts.pacing {
                        delay_until = Some(Instant::now() + interval);
                    } else {
                        delay_until = None;
                    }
                }
                // Remote isn't ready to accept more yet; leave the chunk
                // queued and wait for the next WRITABLE event.
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                // A peer that has gone away surfaces as a write error;
                // since SIGPIPE is ignored (see crate::signals), this is
                // the only signal the loop gets that it's done.
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    main_sendq.advance(main_sendq.len());
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        // Write `local_sendq` to `local`: a single attempt per iteration,
        // same as the `remote` side above. Slave output isn't polled for
        // writability (stdout/a plain socket aren't registered WRITABLE
        // here), so this relies on the write itself not blocking for long;
        // a short write or `WouldBlock` just leaves the remainder queued
        // for the next pass instead of looping to completion in place,
        // which would stall signal handling and the other direction.
        if !local_sendq.is_empty() {
            let chunk = local_sendq.remaining().to_vec();
            match local_out.write(&chunk) {
                Ok(n) => {
                    local_sendq.advance(n);
                    stats.add_received(n);
                    if n < chunk.len() {
                        log::debug!("short write to local: {n}/{} bytes queued for later", chunk.len());
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
        }

        // Room to read from `local` again now that its queue has
        // drained (mirrors the spec's `main.recvq.len == 0` read-gate).
        if main_sendq.is_empty() && !local_eof {
            let _ = poll.registry().reregister(&mut local_fd, LOCAL, Interest::READABLE);
        }
    }

    Ok(())
}

fn force_nonblocking(fd: std::os::unix::io::RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn pipe_pair() -> (std::fs::File, std::fs::File) {
        let (r, w) = nix_pipe();
        (r, w)
    }

    // A tiny os-pipe helper so the relay loop can be exercised without a
    // real pty/stdin, using plain files backed by pipe(2) fds.
    fn nix_pipe() -> (std::fs::File, std::fs::File) {
        use std::os::unix::io::FromRawFd;
        let mut fds = [0i32; 2];
        unsafe {
            assert_eq!(libc::pipe(fds.as_mut_ptr()), 0);
            (std::fs::File::from_raw_fd(fds[0]), std::fs::File::from_raw_fd(fds[1]))
        }
    }

    #[test]
    fn test_relay_forwards_socket_to_local() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            sock.write_all(b"from-remote").unwrap();
        });

        let mut client = TcpStream::connect(addr).unwrap();
        let (mut stdin_r, _stdin_w) = pipe_pair();
        let (stdout_r, mut stdout_w) = pipe_pair();

        let mut opts = RelayOptions { idle_timeout: Some(Duration::from_millis(500)), ..Default::default() };
        let mut stats = Stats::new();
        let _ = core_readwrite(&mut stdin_r, &mut stdout_w, &mut client, &mut opts, &mut stats);

        server.join().unwrap();
        drop(stdout_w);
        let mut got = Vec::new();
        let mut r = stdout_r;
        let _ = r.read_to_end(&mut got);
        assert_eq!(got, b"from-remote");
        assert!(stats.bytes_received() > 0);
    }

    #[test]
    fn test_relay_forwards_local_to_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut got = Vec::new();
            sock.read_to_end(&mut got).unwrap();
            got
        });

        let mut client = TcpStream::connect(addr).unwrap();
        let (mut stdin_r, mut stdin_w) = pipe_pair();
        let (_stdout_r, mut stdout_w) = pipe_pair();
        stdin_w.write_all(b"hello\n").unwrap();
        drop(stdin_w);

        let mut opts = RelayOptions { eof_close: true, ..Default::default() };
        let mut stats = Stats::new();
        core_readwrite(&mut stdin_r, &mut stdout_w, &mut client, &mut opts, &mut stats).unwrap();
        drop(client);

        let got = server.join().unwrap();
        assert_eq!(got, b"hello\n");
        assert_eq!(stats.bytes_sent(), 6);
    }

    #[test]
    fn test_pacing_spaces_out_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1];
            let mut timestamps = Vec::new();
            let start = Instant::now();
            for _ in 0..3 {
                sock.read_exact(&mut buf).unwrap();
                timestamps.push(start.elapsed());
            }
            timestamps
        });

        let mut client = TcpStream::connect(addr).unwrap();
        let (mut stdin_r, mut stdin_w) = pipe_pair();
        let (_stdout_r, mut stdout_w) = pipe_pair();
        stdin_w.write_all(b"a\nb\nc\n").unwrap();
        drop(stdin_w);

        let mut opts = RelayOptions {
            eof_close: true,
            pacing: Some(Duration::from_millis(150)),
            ..Default::default()
        };
        let mut stats = Stats::new();
        core_readwrite(&mut stdin_r, &mut stdout_w, &mut client, &mut opts, &mut stats).unwrap();
        drop(client);

        let timestamps = server.join().unwrap();
        // Three lines, two intervening delays of ~150ms each.
        assert!(timestamps[2] >= Duration::from_millis(250));
    }
}
