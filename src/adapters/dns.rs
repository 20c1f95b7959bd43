//! Name-service backends.
//!
//! The real responder ([`crate::portal::dns::UdpDnsResponder`]) runs over
//! std sockets on every target; the simulation here exists so portal tests
//! do not need to bind the privileged DNS port.

#[cfg(not(target_os = "espidf"))]
use crate::error::{Error, Result};
#[cfg(not(target_os = "espidf"))]
use crate::ports::DnsPort;

#[cfg(not(target_os = "espidf"))]
pub struct SimDns {
    started: Option<(u16, String, [u8; 4])>,
    fail_start: bool,
}

#[cfg(not(target_os = "espidf"))]
impl SimDns {
    pub fn new() -> Self {
        Self {
            started: None,
            fail_start: false,
        }
    }

    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn started(&self) -> Option<&(u16, String, [u8; 4])> {
        self.started.as_ref()
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimDns {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl DnsPort for SimDns {
    fn start(&mut self, port: u16, domain: &str, ip: [u8; 4]) -> Result<()> {
        if self.fail_start {
            return Err(Error::Io("dns bind"));
        }
        self.started = Some((port, domain.to_owned(), ip));
        Ok(())
    }

    fn process_next(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn stop(&mut self) {
        self.started = None;
    }
}
