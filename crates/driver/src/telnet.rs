//! Telnet option negotiation.
//!
//! A per-connection byte-level state machine: IAC commands and
//! subnegotiations are consumed here, everything else flows through as
//! data. Supported options: ECHO, SGA, TTYPE (with MTTS terminal
//! capability probing), NAWS, and MSSP. Responses are appended to the
//! caller's output buffer; the MSSP reply needs the driver's table, so it
//! is surfaced as a flag instead of being written here.

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;

pub const OPT_ECHO: u8 = 1;
pub const OPT_SGA: u8 = 3;
pub const OPT_TTYPE: u8 = 24;
pub const OPT_NAWS: u8 = 31;
pub const OPT_MSSP: u8 = 70;

const TTYPE_IS: u8 = 0;
const TTYPE_SEND: u8 = 1;

pub const MSSP_VAR: u8 = 1;
pub const MSSP_VAL: u8 = 2;

#[derive(Debug)]
enum ParseState {
    Data,
    Iac,
    /// Saw IAC DO/DONT/WILL/WONT; the option byte comes next.
    Verb(u8),
    /// Inside IAC SB <option> ...; collecting until IAC SE.
    Sub {
        option: Option<u8>,
        buf: Vec<u8>,
        iac: bool,
    },
}

#[derive(Debug)]
pub struct Telnet {
    state: ParseState,
    pub echo: bool,
    pub sga: bool,
    pub naws: bool,
    pub ttype: bool,
    pub width: i64,
    pub height: i64,
    /// First MTTS probe: client software name.
    pub term_client: String,
    /// Second probe: terminal type.
    pub term_type: String,
    /// MTTS capability bitmask from the third probe, 0 if never sent.
    pub term_support: i64,
    ttype_round: u8,
    last_ttype: String,
    /// Set when the client sent DO MSSP; the connection layer answers
    /// with the driver's variable table and clears it.
    pub mssp_requested: bool,
}

impl Default for Telnet {
    fn default() -> Telnet {
        Telnet {
            state: ParseState::Data,
            echo: false,
            sga: false,
            naws: false,
            ttype: false,
            width: 0,
            height: 0,
            term_client: String::new(),
            term_type: String::new(),
            term_support: 0,
            ttype_round: 0,
            last_ttype: String::new(),
            mssp_requested: false,
        }
    }
}

impl Telnet {
    pub fn new() -> Telnet {
        Telnet::default()
    }

    /// Initial offer, sent once on connect.
    pub fn greet(out: &mut Vec<u8>) {
        out.extend_from_slice(&[IAC, DO, OPT_TTYPE]);
        out.extend_from_slice(&[IAC, DO, OPT_NAWS]);
        out.extend_from_slice(&[IAC, WILL, OPT_SGA]);
        out.extend_from_slice(&[IAC, WILL, OPT_MSSP]);
    }

    /// Feed one byte. Protocol responses go to `out`; a returned byte is
    /// payload for the line assembler.
    pub fn feed(&mut self, byte: u8, out: &mut Vec<u8>) -> Option<u8> {
        match std::mem::replace(&mut self.state, ParseState::Data) {
            ParseState::Data => {
                if byte == IAC {
                    self.state = ParseState::Iac;
                    None
                } else {
                    Some(byte)
                }
            }
            ParseState::Iac => match byte {
                IAC => Some(IAC),
                DO | DONT | WILL | WONT => {
                    self.state = ParseState::Verb(byte);
                    None
                }
                SB => {
                    self.state = ParseState::Sub {
                        option: None,
                        buf: Vec::new(),
                        iac: false,
                    };
                    None
                }
                // NOP, GA, and anything else: swallow
                _ => None,
            },
            ParseState::Verb(verb) => {
                self.negotiate(verb, byte, out);
                None
            }
            ParseState::Sub { option, mut buf, iac } => {
                let Some(option) = option else {
                    // first byte after SB names the option
                    self.state = ParseState::Sub {
                        option: Some(byte),
                        buf,
                        iac: false,
                    };
                    return None;
                };
                match (iac, byte) {
                    (true, SE) => {
                        self.subnegotiate(option, &buf, out);
                    }
                    (true, IAC) => {
                        buf.push(IAC);
                        self.state = ParseState::Sub {
                            option: Some(option),
                            buf,
                            iac: false,
                        };
                    }
                    (true, _) => {
                        // malformed; drop the subnegotiation
                    }
                    (false, IAC) => {
                        self.state = ParseState::Sub {
                            option: Some(option),
                            buf,
                            iac: true,
                        };
                    }
                    (false, b) => {
                        buf.push(b);
                        self.state = ParseState::Sub {
                            option: Some(option),
                            buf,
                            iac: false,
                        };
                    }
                }
                None
            }
        }
    }

    fn negotiate(&mut self, verb: u8, option: u8, out: &mut Vec<u8>) {
        match (verb, option) {
            (WILL, OPT_TTYPE) => {
                if !self.ttype {
                    self.ttype = true;
                    self.request_ttype(out);
                }
            }
            (WILL, OPT_NAWS) => self.naws = true,
            (WONT, OPT_TTYPE) => self.ttype = false,
            (WONT, OPT_NAWS) => self.naws = false,
            (WILL, other) => out.extend_from_slice(&[IAC, DONT, other]),
            (DO, OPT_SGA) => {
                if !self.sga {
                    self.sga = true;
                    out.extend_from_slice(&[IAC, WILL, OPT_SGA]);
                }
            }
            (DO, OPT_ECHO) => {
                if !self.echo {
                    self.echo = true;
                    out.extend_from_slice(&[IAC, WILL, OPT_ECHO]);
                }
            }
            (DO, OPT_MSSP) => self.mssp_requested = true,
            (DO, other) => out.extend_from_slice(&[IAC, WONT, other]),
            (DONT, OPT_ECHO) => {
                if self.echo {
                    self.echo = false;
                    out.extend_from_slice(&[IAC, WONT, OPT_ECHO]);
                }
            }
            (DONT, OPT_SGA) => self.sga = false,
            (DONT | WONT, _) => {}
            _ => {}
        }
    }

    fn request_ttype(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[IAC, SB, OPT_TTYPE, TTYPE_SEND, IAC, SE]);
    }

    fn subnegotiate(&mut self, option: u8, payload: &[u8], out: &mut Vec<u8>) {
        match option {
            OPT_NAWS => {
                if payload.len() == 4 {
                    self.width = i64::from(u16::from_be_bytes([payload[0], payload[1]]));
                    self.height = i64::from(u16::from_be_bytes([payload[2], payload[3]]));
                }
            }
            OPT_TTYPE => {
                if payload.first() != Some(&TTYPE_IS) {
                    return;
                }
                let name = String::from_utf8_lossy(&payload[1..]).into_owned();
                // repeated answer means the client has cycled through
                if name == self.last_ttype {
                    return;
                }
                self.last_ttype = name.clone();
                match self.ttype_round {
                    0 => self.term_client = name,
                    1 => self.term_type = name.to_uppercase(),
                    _ => {
                        // MTTS round: "MTTS <bitmask>"
                        if let Some(bits) = name.strip_prefix("MTTS ") {
                            self.term_support = bits.trim().parse().unwrap_or(0);
                        }
                    }
                }
                self.ttype_round = self.ttype_round.saturating_add(1);
                if self.ttype_round < 3 {
                    self.request_ttype(out);
                }
            }
            _ => {}
        }
    }
}

/// Build the `IAC SB MSSP ... IAC SE` reply from the driver's table.
pub fn mssp_reply(vars: &[(String, String)]) -> Vec<u8> {
    let mut out = vec![IAC, SB, OPT_MSSP];
    for (name, value) in vars {
        out.push(MSSP_VAR);
        out.extend_from_slice(name.as_bytes());
        out.push(MSSP_VAL);
        out.extend_from_slice(value.as_bytes());
    }
    out.extend_from_slice(&[IAC, SE]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(t: &mut Telnet, bytes: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut out = Vec::new();
        let mut data = Vec::new();
        for &b in bytes {
            if let Some(d) = t.feed(b, &mut out) {
                data.push(d);
            }
        }
        (data, out)
    }

    #[test]
    fn test_plain_data_passes_through() {
        let mut t = Telnet::new();
        let (data, out) = feed_all(&mut t, b"look\r\n");
        assert_eq!(data, b"look\r\n");
        assert!(out.is_empty());
    }

    #[test]
    fn test_escaped_iac_is_data() {
        let mut t = Telnet::new();
        let (data, _) = feed_all(&mut t, &[IAC, IAC, b'x']);
        assert_eq!(data, vec![IAC, b'x']);
    }

    #[test]
    fn test_naws_window_size() {
        let mut t = Telnet::new();
        let (_, _) = feed_all(&mut t, &[IAC, WILL, OPT_NAWS]);
        assert!(t.naws);
        let (_, _) = feed_all(&mut t, &[IAC, SB, OPT_NAWS, 0, 132, 0, 50, IAC, SE]);
        assert_eq!(t.width, 132);
        assert_eq!(t.height, 50);
    }

    #[test]
    fn test_naws_with_escaped_255() {
        let mut t = Telnet::new();
        // width 255 requires IAC doubling inside the subnegotiation
        let (_, _) = feed_all(&mut t, &[IAC, SB, OPT_NAWS, 0, IAC, IAC, 0, 24, IAC, SE]);
        assert_eq!(t.width, 255);
        assert_eq!(t.height, 24);
    }

    #[test]
    fn test_mtts_rounds() {
        let mut t = Telnet::new();
        let (_, out) = feed_all(&mut t, &[IAC, WILL, OPT_TTYPE]);
        // we immediately probe
        assert_eq!(out, vec![IAC, SB, OPT_TTYPE, TTYPE_SEND, IAC, SE]);

        let mut probe1 = vec![IAC, SB, OPT_TTYPE, TTYPE_IS];
        probe1.extend_from_slice(b"MUDLET");
        probe1.extend_from_slice(&[IAC, SE]);
        let (_, out) = feed_all(&mut t, &probe1);
        assert_eq!(t.term_client, "MUDLET");
        assert!(!out.is_empty(), "second probe expected");

        let mut probe2 = vec![IAC, SB, OPT_TTYPE, TTYPE_IS];
        probe2.extend_from_slice(b"xterm-256color");
        probe2.extend_from_slice(&[IAC, SE]);
        feed_all(&mut t, &probe2);
        assert_eq!(t.term_type, "XTERM-256COLOR");

        let mut probe3 = vec![IAC, SB, OPT_TTYPE, TTYPE_IS];
        probe3.extend_from_slice(b"MTTS 2349");
        probe3.extend_from_slice(&[IAC, SE]);
        feed_all(&mut t, &probe3);
        assert_eq!(t.term_support, 2349);
    }

    #[test]
    fn test_unknown_options_refused() {
        let mut t = Telnet::new();
        let (_, out) = feed_all(&mut t, &[IAC, WILL, 200, IAC, DO, 201]);
        assert_eq!(out, vec![IAC, DONT, 200, IAC, WONT, 201]);
    }

    #[test]
    fn test_mssp_request_and_reply_shape() {
        let mut t = Telnet::new();
        feed_all(&mut t, &[IAC, DO, OPT_MSSP]);
        assert!(t.mssp_requested);
        let reply = mssp_reply(&[("NAME".to_string(), "Cinder".to_string())]);
        assert_eq!(reply[..3], [IAC, SB, OPT_MSSP]);
        assert_eq!(reply[reply.len() - 2..], [IAC, SE]);
        assert!(reply.windows(4).any(|w| w == b"NAME"));
    }

    #[test]
    fn test_echo_round_trip() {
        let mut t = Telnet::new();
        let (_, out) = feed_all(&mut t, &[IAC, DO, OPT_ECHO]);
        assert_eq!(out, vec![IAC, WILL, OPT_ECHO]);
        assert!(t.echo);
        let (_, out) = feed_all(&mut t, &[IAC, DONT, OPT_ECHO]);
        assert_eq!(out, vec![IAC, WONT, OPT_ECHO]);
        assert!(!t.echo);
    }
}
