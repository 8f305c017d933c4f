//! Telnet IAC (RFC 854) stripping for the `-t`/`--telnet` option.
//!
//! Netcat's telnet support is passive: it never actually offers to behave
//! like a telnet client, it just strips the control sequences so the
//! negotiation dance doesn't show up as garbage in the relayed stream, and
//! answers every option offer with a blanket refusal (`WONT`/`DONT`) so a
//! real telnet server on the other end stops asking.
//!
//! Unknown IAC sub-commands are stripped rather than passed through: a
//! byte the parser doesn't recognize is assumed to belong to the telnet
//! control channel, not to the application payload.

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Negotiating(u8),
    Subneg,
    SubnegIac,
}

/// A streaming telnet-IAC filter. Feed it raw bytes off the wire; it
/// returns the application payload with control sequences removed, plus
/// any reply bytes (option refusals) that should be written back to the
/// peer.
pub struct TelnetFilter {
    state: State,
}

impl TelnetFilter {
    pub fn new() -> Self {
        let mut filter = Self { state: State::Data };
        filter.reset();
        filter
    }

    /// Drops any in-progress IAC/negotiation/subnegotiation sequence and
    /// returns to plain-data state, as if freshly constructed. Useful when
    /// the same filter is handed a new underlying connection and stray
    /// bytes from the old one must not bleed into the new stream's parse.
    pub fn reset(&mut self) {
        self.state = State::Data;
    }

    /// Processes `input`, returning `(payload, replies)`.
    pub fn process(&mut self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut payload = Vec::with_capacity(input.len());
        let mut replies = Vec::new();

        for &byte in input {
            match self.state {
                State::Data => {
                    if byte == IAC {
                        self.state = State::Iac;
                    } else {
                        payload.push(byte);
                    }
                }
                State::Iac => {
                    match byte {
                        IAC => {
                            payload.push(IAC);
                            self.state = State::Data;
                        }
                        WILL | WONT | DO | DONT => {
                            self.state = State::Negotiating(byte);
                        }
                        SB => {
                            self.state = State::Subneg;
                        }
                        SE => {
                            // Stray SE with no matching SB: ignore.
                            self.state = State::Data;
                        }
                        _ => {
                            // Unknown IAC command: stripped, not passed through.
                            self.state = State::Data;
                        }
                    }
                }
                State::Negotiating(cmd) => {
                    // `byte` is the option number being negotiated.
                    match cmd {
                        DO => replies.extend_from_slice(&[IAC, WONT, byte]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, byte]),
                        WONT | DONT => {}
                        _ => unreachable!(),
                    }
                    self.state = State::Data;
                }
                State::Subneg => {
                    if byte == IAC {
                        self.state = State::SubnegIac;
                    }
                    // Subnegotiation payload is discarded either way.
                }
                State::SubnegIac => {
                    if byte == SE {
                        self.state = State::Data;
                    } else if byte == IAC {
                        // Escaped 0xFF inside subnegotiation data.
                        self.state = State::Subneg;
                    } else {
                        // Malformed; resynchronize on plain data.
                        self.state = State::Data;
                    }
                }
            }
        }

        (payload, replies)
    }
}

impl Default for TelnetFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_data_passes_through() {
        let mut f = TelnetFilter::new();
        let (payload, replies) = f.process(b"hello world");
        assert_eq!(payload, b"hello world");
        assert!(replies.is_empty());
    }

    #[test]
    fn test_escaped_iac_is_literal() {
        let mut f = TelnetFilter::new();
        let (payload, replies) = f.process(&[b'a', IAC, IAC, b'b']);
        assert_eq!(payload, vec![b'a', IAC, b'b']);
        assert!(replies.is_empty());
    }

    #[test]
    fn test_do_option_generates_wont_reply() {
        let mut f = TelnetFilter::new();
        let (payload, replies) = f.process(&[IAC, DO, 1, b'x']);
        assert_eq!(payload, b"x");
        assert_eq!(replies, vec![IAC, WONT, 1]);
    }

    #[test]
    fn test_will_option_generates_dont_reply() {
        let mut f = TelnetFilter::new();
        let (payload, replies) = f.process(&[IAC, WILL, 24, b'y']);
        assert_eq!(payload, b"y");
        assert_eq!(replies, vec![IAC, DONT, 24]);
    }

    #[test]
    fn test_subnegotiation_is_stripped() {
        let mut f = TelnetFilter::new();
        let (payload, replies) = f.process(&[IAC, SB, 31, 0, 80, 24, IAC, SE, b'z']);
        assert_eq!(payload, b"z");
        assert!(replies.is_empty());
    }

    #[test]
    fn test_sequence_split_across_calls() {
        let mut f = TelnetFilter::new();
        let (p1, r1) = f.process(&[b'a', IAC]);
        let (p2, r2) = f.process(&[DO, 1, b'b']);
        assert_eq!(p1, b"a");
        assert!(r1.is_empty());
        assert_eq!(p2, b"b");
        assert_eq!(r2, vec![IAC, WONT, 1]);
    }

    #[test]
    fn test_reset_drops_in_progress_sequence() {
        let mut f = TelnetFilter::new();
        let (p1, r1) = f.process(&[b'a', IAC]);
        assert_eq!(p1, b"a");
        assert!(r1.is_empty());
        assert_eq!(f.state, State::Iac);

        f.reset();
        assert_eq!(f.state, State::Data);

        // Without the reset, this byte would have been consumed as the
        // command half of the pending IAC sequence instead of data.
        let (p2, r2) = f.process(&[DO, 1, b'b']);
        assert_eq!(p2, &[DO, 1, b'b']);
        assert!(r2.is_empty());
    }

    #[test]
    fn test_unknown_iac_command_is_stripped() {
        let mut f = TelnetFilter::new();
        // 0xF5 (245, IAC_ABORT-ish) is not WILL/WONT/DO/DONT/SB/SE.
        let (payload, replies) = f.process(&[IAC, 245, b'c']);
        assert_eq!(payload, b"c");
        assert!(replies.is_empty());
    }
}
