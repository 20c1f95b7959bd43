//! Catch-all DNS responder.
//!
//! Captive-portal detection on phones works by resolving a probe hostname;
//! answering every A query with the AP address funnels the first browser
//! request to the portal. The responder is a non-blocking UDP socket
//! serviced from the portal poll loop, with the packet handling kept in
//! pure functions so it tests without any socket.

use std::io::ErrorKind;
use std::net::UdpSocket;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::ports::DnsPort;

const HEADER_LEN: usize = 12;
const QTYPE_A: u16 = 1;
const QTYPE_ANY: u16 = 255;
const TTL: u32 = 60;

/// Parsed question section of one query packet.
#[derive(Debug, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    /// Byte offset just past the question, where the answer section starts.
    pub end: usize,
}

/// Extracts the first question from a standard query.
///
/// Returns `None` for responses, non-query opcodes, compressed names
/// (queries never need them) and anything truncated.
pub fn parse_question(packet: &[u8]) -> Option<Question> {
    if packet.len() < HEADER_LEN {
        return None;
    }
    let flags = u16::from_be_bytes([packet[2], packet[3]]);
    if flags & 0x8000 != 0 || flags & 0x7800 != 0 {
        return None;
    }
    let qdcount = u16::from_be_bytes([packet[4], packet[5]]);
    if qdcount == 0 {
        return None;
    }
    let mut pos = HEADER_LEN;
    let mut name = String::new();
    loop {
        let len = *packet.get(pos)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        if len & 0xC0 != 0 {
            return None;
        }
        let label = packet.get(pos..pos + len)?;
        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(&String::from_utf8_lossy(label));
        pos += len;
    }
    let qtype = u16::from_be_bytes([*packet.get(pos)?, *packet.get(pos + 1)?]);
    packet.get(pos + 3)?;
    Some(Question {
        name,
        qtype,
        end: pos + 4,
    })
}

/// Builds the A-record answer for a query accepted by [`parse_question`].
///
/// The question section is echoed verbatim and the answer name refers back
/// to it with a compression pointer.
pub fn build_answer(packet: &[u8], question: &Question, ip: [u8; 4]) -> Vec<u8> {
    let mut resp = Vec::with_capacity(question.end + 16);
    resp.extend_from_slice(&packet[..2]);
    // QR + RD/RA, no error; one question, one answer.
    resp.extend_from_slice(&[0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
    resp.extend_from_slice(&packet[HEADER_LEN..question.end]);
    resp.extend_from_slice(&[0xC0, 0x0C]);
    resp.extend_from_slice(&QTYPE_A.to_be_bytes());
    resp.extend_from_slice(&[0x00, 0x01]);
    resp.extend_from_slice(&TTL.to_be_bytes());
    resp.extend_from_slice(&[0x00, 0x04]);
    resp.extend_from_slice(&ip);
    resp
}

fn matches_domain(pattern: &str, name: &str) -> bool {
    pattern == "*" || pattern.eq_ignore_ascii_case(name)
}

/// [`DnsPort`] backend over a non-blocking UDP socket. Works identically on
/// the device and in host tests.
pub struct UdpDnsResponder {
    socket: Option<UdpSocket>,
    domain: String,
    ip: [u8; 4],
}

impl UdpDnsResponder {
    pub fn new() -> Self {
        Self {
            socket: None,
            domain: String::new(),
            ip: [0; 4],
        }
    }

    /// Port the socket actually bound to, for tests binding port 0.
    pub fn local_port(&self) -> Option<u16> {
        self.socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
            .map(|a| a.port())
    }
}

impl Default for UdpDnsResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsPort for UdpDnsResponder {
    fn start(&mut self, port: u16, domain: &str, ip: [u8; 4]) -> Result<()> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).map_err(|_| Error::Io("dns bind"))?;
        socket
            .set_nonblocking(true)
            .map_err(|_| Error::Io("dns nonblocking"))?;
        info!("dns responder on port {port} for '{domain}'");
        self.socket = Some(socket);
        self.domain = domain.to_owned();
        self.ip = ip;
        Ok(())
    }

    fn process_next(&mut self) -> Result<bool> {
        let Some(socket) = &self.socket else {
            return Ok(false);
        };
        let mut buf = [0u8; 512];
        let (len, peer) = match socket.recv_from(&mut buf) {
            Ok(got) => got,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
            Err(_) => return Err(Error::Io("dns recv")),
        };
        let packet = &buf[..len];
        let Some(question) = parse_question(packet) else {
            return Ok(true);
        };
        if (question.qtype == QTYPE_A || question.qtype == QTYPE_ANY)
            && matches_domain(&self.domain, &question.name)
        {
            debug!("dns answer for '{}'", question.name);
            let resp = build_answer(packet, &question, self.ip);
            socket
                .send_to(&resp, peer)
                .map_err(|_| Error::Io("dns send"))?;
        }
        Ok(true)
    }

    fn stop(&mut self) {
        self.socket = None;
    }
}
