//! Hardware abstraction ports.
//!
//! Every platform touchpoint goes through one of these traits so the store,
//! form generator and portal orchestrator run identically on device and in
//! host tests. ESP-IDF adapters and simulation backends live in
//! `crate::adapters`.

use std::sync::Arc;

use crate::error::Result;

// ── Persistent storage ─────────────────────────────────────────

/// Byte-addressable persistent region backing the parameter record.
///
/// `begin` sizes the region; until then the data views may be empty.
/// Mutations through `data_mut` touch only the working copy; `commit`
/// flushes it to the physical medium.
pub trait NvsPort {
    fn begin(&mut self, size: usize) -> Result<()>;
    fn data(&self) -> &[u8];
    fn data_mut(&mut self) -> &mut [u8];
    fn commit(&mut self) -> Result<()>;
}

// ── Wireless ───────────────────────────────────────────────────

/// One access point observed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: heapless::String<32>,
    /// 2.4 GHz channel number, 1-based.
    pub channel: u8,
    pub rssi: i8,
}

/// Soft-AP control surface.
pub trait WirelessPort {
    fn scan(&mut self) -> Result<Vec<ScanEntry>>;
    /// Empty `password` means an open network.
    fn ap_start(&mut self, ssid: &str, password: &str, channel: u8) -> Result<()>;
    fn ap_stop(&mut self) -> Result<()>;
    /// Address of the soft-AP interface; valid after `ap_start`.
    fn ap_ip(&self) -> [u8; 4];
    fn station_count(&mut self) -> Result<usize>;
}

// ── Name service ───────────────────────────────────────────────

/// Catch-all DNS responder used to trip captive-portal detection.
pub trait DnsPort {
    /// `domain` of `"*"` answers every query; anything else answers only
    /// exact matches.
    fn start(&mut self, port: u16, domain: &str, ip: [u8; 4]) -> Result<()>;
    /// Services at most one pending query; `Ok(true)` if one was handled.
    fn process_next(&mut self) -> Result<bool>;
    fn stop(&mut self);
}

// ── System ─────────────────────────────────────────────────────

/// Chip-level operations.
pub trait SystemPort {
    fn restart(&mut self);
}

/// Reset-surviving word storage (RTC slow memory on device).
pub trait RtcMemoryPort {
    fn read(&self, slot: usize) -> u32;
    fn write(&mut self, slot: usize, value: u32);
}

// ── HTTP ───────────────────────────────────────────────────────

/// Request method, reduced to what the form handler distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
    Other,
}

/// One in-flight HTTP request/response pair.
///
/// Object-safe on purpose: the routing layer hands `&mut dyn HttpExchange`
/// to whichever page handler matches. A response is sent exactly once, via
/// either `send`, `redirect`, or a `chunked_begin`..`chunked_end` sequence.
pub trait HttpExchange {
    fn method(&self) -> Method;
    /// Path component only, no query string.
    fn uri(&self) -> &str;
    /// Value of the Host header, if the client sent one.
    fn host(&self) -> Option<&str>;

    /// Number of decoded form/query arguments.
    fn arg_count(&self) -> usize;
    /// Name/value of the argument at `index`, in submission order.
    fn arg(&self, index: usize) -> Option<(&str, &str)>;
    /// First argument with the given name.
    fn arg_by_name(&self, name: &str) -> Option<&str> {
        (0..self.arg_count())
            .filter_map(|i| self.arg(i))
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    fn send(&mut self, status: u16, content_type: &str, body: &str) -> Result<()>;
    fn chunked_begin(&mut self, content_type: &str) -> Result<()>;
    fn chunk(&mut self, data: &str) -> Result<()>;
    fn chunked_end(&mut self) -> Result<()>;
    /// 302 with a Location header.
    fn redirect(&mut self, location: &str) -> Result<()>;
}

/// Shared request dispatcher installed into an [`HttpServerPort`].
pub type RequestHandler = Arc<dyn Fn(&mut dyn HttpExchange) + Send + Sync>;

/// Embedded HTTP server lifecycle.
pub trait HttpServerPort {
    fn start(&mut self, handler: RequestHandler) -> Result<()>;
    /// Gives the server a chance to service pending work on callers that
    /// drive it cooperatively; threaded backends make this a no-op.
    fn poll(&mut self) -> Result<()>;
    fn stop(&mut self);
}
