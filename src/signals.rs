//! Signal handling: `SIGINT`/`SIGTERM`/`SIGUSR1` set flags for the
//! relay loop to observe between reads; `SIGPIPE` is ignored so a peer
//! closing its end surfaces as an `EPIPE` write error instead of killing
//! the process outright.
//!
//! The handlers themselves only touch `AtomicBool`s, which is the one
//! async-signal-safe thing to do from a signal handler; all the actual
//! reactions (printing stats, exiting) happen on the main thread once it
//! observes the flag set.

use std::sync::atomic::{AtomicBool, Ordering};

static GOT_SIGINT: AtomicBool = AtomicBool::new(false);
static GOT_SIGTERM: AtomicBool = AtomicBool::new(false);
static GOT_SIGUSR1: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_sig: libc::c_int) {
    GOT_SIGINT.store(true, Ordering::SeqCst);
}

extern "C" fn handle_sigterm(_sig: libc::c_int) {
    GOT_SIGTERM.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
extern "C" fn handle_sigusr1(_sig: libc::c_int) {
    GOT_SIGUSR1.store(true, Ordering::SeqCst);
}

/// Installs the signal handlers. Idempotent; safe to call once at
/// startup. Unix only — on Windows the relay loop relies solely on
/// `Ctrl+C`-triggered process teardown.
#[cfg(unix)]
pub fn install() -> io::Result<()> {
    unsafe {
        install_handler(libc::SIGINT, handle_sigint as usize)?;
        install_handler(libc::SIGTERM, handle_sigterm as usize)?;
        install_handler(libc::SIGUSR1, handle_sigusr1 as usize)?;
        // SIGPIPE: ignored so writes to a closed peer return EPIPE
        // instead of terminating the process. SIGURG: ignored, matching
        // the historical netcat stance that out-of-band data is noise.
        if libc::signal(libc::SIGPIPE, libc::SIG_IGN) == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        if libc::signal(libc::SIGURG, libc::SIG_IGN) == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install() -> io::Result<()> {
    Ok(())
}

use std::io;

#[cfg(unix)]
unsafe fn install_handler(signum: libc::c_int, handler: usize) -> io::Result<()> {
    let mut sa: libc::sigaction = unsafe { std::mem::zeroed() };
    sa.sa_sigaction = handler;
    sa.sa_flags = 0;
    unsafe { libc::sigemptyset(&mut sa.sa_mask) };
    if unsafe { libc::sigaction(signum, &sa, std::ptr::null_mut()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Whether `SIGINT` has been observed since the last [`clear_all`].
pub fn got_sigint() -> bool {
    GOT_SIGINT.load(Ordering::SeqCst)
}

/// Whether `SIGINT` has been observed, clearing the flag as a side effect.
/// The relay loop uses this form (rather than [`got_sigint`]) so a second
/// `Ctrl-C` after the loop has already torn down is observed freshly
/// rather than appearing to still be pending from the first one.
pub fn take_sigint() -> bool {
    GOT_SIGINT.swap(false, Ordering::SeqCst)
}

/// Whether `SIGTERM` has been observed since the last [`clear_all`].
pub fn got_sigterm() -> bool {
    GOT_SIGTERM.load(Ordering::SeqCst)
}

/// Whether `SIGUSR1` (request to print a stats snapshot) has been
/// observed, clearing the flag as a side effect so repeated signals each
/// trigger one snapshot.
pub fn take_sigusr1() -> bool {
    GOT_SIGUSR1.swap(false, Ordering::SeqCst)
}

/// Resets all flags; used by tests and by a fresh run sharing a process.
pub fn clear_all() {
    GOT_SIGINT.store(false, Ordering::SeqCst);
    GOT_SIGTERM.store(false, Ordering::SeqCst);
    GOT_SIGUSR1.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_clear() {
        clear_all();
        assert!(!got_sigint());
        assert!(!got_sigterm());
        assert!(!take_sigusr1());
    }

    #[test]
    fn test_sigusr1_take_clears_flag() {
        clear_all();
        GOT_SIGUSR1.store(true, Ordering::SeqCst);
        assert!(take_sigusr1());
        assert!(!take_sigusr1());
    }

    #[test]
    fn test_sigint_take_clears_flag() {
        clear_all();
        GOT_SIGINT.store(true, Ordering::SeqCst);
        assert!(take_sigint());
        assert!(!take_sigint());
        assert!(!got_sigint());
    }
}
