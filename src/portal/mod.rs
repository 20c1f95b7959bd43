//! Captive-portal provisioning orchestrator.
//!
//! Owns the whole provisioning session: soft-AP bring-up on the
//! least-congested channel, the catch-all DNS responder, the HTTP form
//! server and the cooperative poll loop. Lifecycle progress surfaces as
//! [`PortalEvent`]s through a caller callback instead of baked-in policy,
//! so the firmware decides what connecting, idling and restarting mean.

pub mod channel;
pub mod dns;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::error::{Error, Result};
use crate::ports::{
    DnsPort, HttpExchange, HttpServerPort, NvsPort, RequestHandler, SystemPort, WirelessPort,
};
use crate::store::Store;
use crate::web::FormPage;

pub const DNS_PORT: u16 = 53;

const RESTART_PAGE: &str = "<html><body><h2>Restarting&hellip;</h2></body></html>";
const NOT_FOUND_PAGE: &str = "<html><body><h2>Not found</h2></body></html>";

/// Lifecycle of one provisioning session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalState {
    Starting,
    Advertising,
    Stopping,
    Done,
}

/// Progress notifications delivered to the caller callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalEvent {
    /// Session begins, nothing started yet.
    Started,
    /// AP, DNS and HTTP are all up.
    ServerReady,
    ClientConnected,
    ClientDisconnected,
    /// One poll tick completed.
    Idle,
    /// The restart route was hit.
    RestartRequested,
    /// Everything torn down.
    Done,
}

/// Context delivered alongside every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortalStatus {
    pub ap_ip: [u8; 4],
    pub stations: usize,
}

/// Session parameters.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub ssid: heapless::String<32>,
    /// Empty means an open AP.
    pub password: heapless::String<64>,
    pub title: &'static str,
    /// Inactivity timeout, re-armed while any client is connected; zero
    /// runs until a restart request.
    pub duration: Duration,
    pub poll_interval: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            title: "Configuration",
            duration: Duration::ZERO,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Caller hook consulted for unrecognized paths before the 404/redirect
/// fallback; returns whether it produced a response.
pub type FallbackHandler = Arc<dyn Fn(&mut dyn HttpExchange) -> bool + Send + Sync>;

/// State shared with the HTTP handler, which may run on a server thread.
pub struct PortalShared<P: NvsPort> {
    store: Mutex<Store<P>>,
    restart_requested: AtomicBool,
    fallback: Option<FallbackHandler>,
    title: &'static str,
}

impl<P: NvsPort> PortalShared<P> {
    pub fn store(&self) -> &Mutex<Store<P>> {
        &self.store
    }

    /// Asks the poll loop to restart the system on its next tick.
    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }
}

/// Routes one request against the portal's fixed paths.
///
/// `/` and the captive-probe alias serve the form (the alias without the
/// clear confirmation, so probe automation never trips a dialog);
/// `/restart` acknowledges and flags the poll loop. Anything else goes to
/// the fallback handler, then to a redirect-to-AP for foreign hosts, then
/// to a plain 404.
pub fn handle_request<P: NvsPort>(
    shared: &PortalShared<P>,
    ap_ip: [u8; 4],
    exchange: &mut dyn HttpExchange,
) {
    let uri = exchange.uri().to_string();
    match uri.as_str() {
        "/" => serve_form(shared, exchange, true),
        "/generate_204" => serve_form(shared, exchange, false),
        "/restart" => {
            if let Err(e) = exchange.send(200, "text/html", RESTART_PAGE) {
                warn!("restart page send failed: {e}");
            }
            shared.request_restart();
        }
        uri => {
            if let Some(fallback) = &shared.fallback {
                if fallback(exchange) {
                    return;
                }
            }
            let ip_text = format!("{}.{}.{}.{}", ap_ip[0], ap_ip[1], ap_ip[2], ap_ip[3]);
            let host_matches = exchange
                .host()
                .is_some_and(|h| h.split(':').next().unwrap_or("") == ip_text);
            let sent = if host_matches {
                exchange.send(404, "text/html", NOT_FOUND_PAGE)
            } else {
                // A foreign hostname means captive-portal detection is
                // probing; bounce it to the AP address.
                exchange.redirect(&format!("http://{ip_text}/"))
            };
            if let Err(e) = sent {
                warn!("response for '{uri}' failed: {e}");
            }
        }
    }
}

fn serve_form<P: NvsPort>(shared: &PortalShared<P>, exchange: &mut dyn HttpExchange, confirm: bool) {
    let Ok(mut store) = shared.store.lock() else {
        let _ = exchange.send(500, "text/plain", "store unavailable");
        return;
    };
    let mut page = FormPage::new(&mut store)
        .with_title(shared.title)
        .with_restart_path(Some("/restart"));
    if let Err(e) = page.handle(exchange, confirm) {
        warn!("form request failed: {e}");
    }
}

/// The provisioning portal itself.
pub struct Portal<P, W, D, H, S>
where
    P: NvsPort,
    W: WirelessPort,
    D: DnsPort,
    H: HttpServerPort,
    S: SystemPort,
{
    shared: Arc<PortalShared<P>>,
    wifi: W,
    dns: D,
    http: H,
    system: S,
    config: PortalConfig,
    state: PortalState,
    status: PortalStatus,
    deadline: Option<Instant>,
}

impl<P, W, D, H, S> Portal<P, W, D, H, S>
where
    P: NvsPort + Send + 'static,
    W: WirelessPort,
    D: DnsPort,
    H: HttpServerPort,
    S: SystemPort,
{
    pub fn new(store: Store<P>, wifi: W, dns: D, http: H, system: S, config: PortalConfig) -> Self {
        Self {
            shared: Arc::new(PortalShared {
                store: Mutex::new(store),
                restart_requested: AtomicBool::new(false),
                fallback: None,
                title: config.title,
            }),
            wifi,
            dns,
            http,
            system,
            config,
            state: PortalState::Starting,
            status: PortalStatus::default(),
            deadline: None,
        }
    }

    /// Installs the fallback route handler; only possible before the first
    /// request, while the shared state has a single owner.
    pub fn with_fallback(mut self, handler: FallbackHandler) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.fallback = Some(handler);
        }
        self
    }

    pub fn shared(&self) -> Arc<PortalShared<P>> {
        Arc::clone(&self.shared)
    }

    pub fn state(&self) -> PortalState {
        self.state
    }

    /// Recovers the store once the session is over and the HTTP handler has
    /// been dropped.
    pub fn into_store(self) -> Result<Store<P>> {
        let Self { shared, .. } = self;
        Arc::into_inner(shared)
            .ok_or(Error::Io("portal handler still running"))?
            .store
            .into_inner()
            .map_err(|_| Error::Io("store poisoned"))
    }

    /// Runs the full session: bring-up, poll loop, teardown.
    ///
    /// Bring-up failures unwind whatever already started and return without
    /// ever advertising (and without a `Done` event). Once advertising,
    /// every exit path tears down HTTP, DNS and the AP and emits `Done`.
    pub fn run<F>(&mut self, mut emit: F) -> Result<()>
    where
        F: FnMut(PortalEvent, &PortalStatus),
    {
        self.state = PortalState::Starting;
        self.bring_up(&mut emit)?;

        let result = loop {
            match self.poll_once(&mut emit) {
                Ok(true) => std::thread::sleep(self.config.poll_interval),
                Ok(false) => break Ok(()),
                Err(e) => {
                    error!("portal poll failed: {e}");
                    break Err(e);
                }
            }
        };

        self.state = PortalState::Stopping;
        self.http.stop();
        self.dns.stop();
        if let Err(e) = self.wifi.ap_stop() {
            warn!("ap teardown failed: {e}");
        }
        self.state = PortalState::Done;
        emit(PortalEvent::Done, &self.status);
        result
    }

    fn bring_up<F>(&mut self, emit: &mut F) -> Result<()>
    where
        F: FnMut(PortalEvent, &PortalStatus),
    {
        info!("provisioning portal '{}' starting", self.config.ssid);
        emit(PortalEvent::Started, &self.status);

        let scan = self.wifi.scan()?;
        let ch = channel::least_congested(&scan);
        self.wifi
            .ap_start(&self.config.ssid, &self.config.password, ch)?;
        self.status.ap_ip = self.wifi.ap_ip();

        if let Err(e) = self.dns.start(DNS_PORT, "*", self.status.ap_ip) {
            let _ = self.wifi.ap_stop();
            return Err(e);
        }

        let shared = Arc::clone(&self.shared);
        let ap_ip = self.status.ap_ip;
        let handler: RequestHandler = Arc::new(move |ex| handle_request(&shared, ap_ip, ex));
        if let Err(e) = self.http.start(handler) {
            self.dns.stop();
            let _ = self.wifi.ap_stop();
            return Err(e);
        }

        self.state = PortalState::Advertising;
        emit(PortalEvent::ServerReady, &self.status);
        if !self.config.duration.is_zero() {
            self.deadline = Some(Instant::now() + self.config.duration);
        }
        Ok(())
    }

    /// One cooperative tick; `Ok(false)` ends the session.
    fn poll_once<F>(&mut self, emit: &mut F) -> Result<bool>
    where
        F: FnMut(PortalEvent, &PortalStatus),
    {
        if self.shared.restart_requested() {
            emit(PortalEvent::RestartRequested, &self.status);
            self.system.restart();
            // A real restart never returns; simulation falls through to
            // teardown.
            return Ok(false);
        }

        let stations = self.wifi.station_count()?;
        if stations > self.status.stations {
            info!("portal client connected ({stations} total)");
            self.status.stations = stations;
            emit(PortalEvent::ClientConnected, &self.status);
        } else if stations < self.status.stations {
            info!("portal client disconnected ({stations} left)");
            self.status.stations = stations;
            emit(PortalEvent::ClientDisconnected, &self.status);
        }
        if stations > 0 && !self.config.duration.is_zero() {
            // Timeout measures inactivity, not total session time.
            self.deadline = Some(Instant::now() + self.config.duration);
        }

        while self.dns.process_next()? {}
        self.http.poll()?;
        emit(PortalEvent::Idle, &self.status);

        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                info!("portal timed out without activity");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::{BufferedExchange, SimHttpServer};
    use crate::adapters::nvs::MemoryNvs;
    use crate::adapters::system::SimSystem;
    use crate::adapters::wifi::SimWireless;
    use crate::ports::ScanEntry;
    use crate::schema::{ParamInfo, Schema};

    const PARAMS: &[ParamInfo] = &[ParamInfo::string("ssid", "", 33, "")];

    fn store() -> Store<MemoryNvs> {
        let mut store = Store::new(Schema::new(PARAMS), MemoryNvs::new());
        store.begin().unwrap();
        store
    }

    fn quick_config(duration_ms: u64) -> PortalConfig {
        let mut config = PortalConfig::default();
        config.ssid.push_str("portal-test").unwrap();
        config.duration = Duration::from_millis(duration_ms);
        config.poll_interval = Duration::from_millis(1);
        config
    }

    fn shared_only(store: Store<MemoryNvs>) -> PortalShared<MemoryNvs> {
        PortalShared {
            store: Mutex::new(store),
            restart_requested: AtomicBool::new(false),
            fallback: None,
            title: "Configuration",
        }
    }

    #[test]
    fn lifecycle_emits_edges_and_done() {
        let wifi = SimWireless::new()
            .with_scan(vec![ScanEntry {
                ssid: heapless::String::new(),
                channel: 1,
                rssi: -40,
            }])
            .with_station_counts(&[0, 1, 1, 0]);
        let mut portal = Portal::new(
            store(),
            wifi,
            crate::adapters::dns::SimDns::new(),
            SimHttpServer::new(),
            SimSystem::new(),
            quick_config(20),
        );
        let mut events = Vec::new();
        portal.run(|e, _| events.push(e)).unwrap();

        assert_eq!(events.first(), Some(&PortalEvent::Started));
        assert!(events.contains(&PortalEvent::ServerReady));
        assert!(events.contains(&PortalEvent::ClientConnected));
        assert!(events.contains(&PortalEvent::ClientDisconnected));
        assert!(events.contains(&PortalEvent::Idle));
        assert_eq!(events.last(), Some(&PortalEvent::Done));
        assert_eq!(portal.state(), PortalState::Done);
    }

    #[test]
    fn ap_failure_aborts_without_done() {
        let wifi = SimWireless::new().with_ap_failure();
        let mut portal = Portal::new(
            store(),
            wifi,
            crate::adapters::dns::SimDns::new(),
            SimHttpServer::new(),
            SimSystem::new(),
            quick_config(20),
        );
        let mut events = Vec::new();
        let result = portal.run(|e, _| events.push(e));
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(events, vec![PortalEvent::Started]);
        assert_ne!(portal.state(), PortalState::Done);
    }

    #[test]
    fn restart_request_restarts_and_finishes() {
        let wifi = SimWireless::new().with_station_counts(&[0]);
        let system = SimSystem::new();
        let restarts = system.restart_counter();
        let mut portal = Portal::new(
            store(),
            wifi,
            crate::adapters::dns::SimDns::new(),
            SimHttpServer::new(),
            system,
            quick_config(0), // duration zero runs until restart
        );
        let shared = portal.shared();
        let mut events = Vec::new();
        portal
            .run(|e, _| {
                events.push(e);
                if e == PortalEvent::Idle {
                    shared.request_restart();
                }
            })
            .unwrap();
        assert!(events.contains(&PortalEvent::RestartRequested));
        assert_eq!(events.last(), Some(&PortalEvent::Done));
        assert_eq!(restarts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn routes_form_probe_restart_and_strangers() {
        let shared = shared_only(store());
        let ip = [192, 168, 4, 1];

        let mut ex = BufferedExchange::get("/");
        handle_request(&shared, ip, &mut ex);
        assert!(ex.body().contains("</html>"));

        let mut ex = BufferedExchange::get("/generate_204");
        handle_request(&shared, ip, &mut ex);
        assert!(ex.body().contains("</html>"));

        let mut ex = BufferedExchange::get("/restart");
        handle_request(&shared, ip, &mut ex);
        assert_eq!(ex.status(), Some(200));
        assert!(shared.restart_requested());

        // Foreign host: captive redirect.
        let mut ex = BufferedExchange::get("/some/page").with_host("connectivitycheck.gstatic.com");
        handle_request(&shared, ip, &mut ex);
        assert_eq!(ex.redirect_target(), Some("http://192.168.4.1/"));

        // Matching host (with port): plain 404.
        let mut ex = BufferedExchange::get("/some/page").with_host("192.168.4.1:80");
        handle_request(&shared, ip, &mut ex);
        assert_eq!(ex.status(), Some(404));
    }

    #[test]
    fn fallback_handler_runs_before_not_found() {
        let portal = Portal::new(
            store(),
            SimWireless::new(),
            crate::adapters::dns::SimDns::new(),
            SimHttpServer::new(),
            SimSystem::new(),
            quick_config(0),
        )
        .with_fallback(Arc::new(|ex: &mut dyn HttpExchange| {
            if ex.uri() == "/metrics" {
                let _ = ex.send(200, "text/plain", "ok");
                true
            } else {
                false
            }
        }));
        let shared = portal.shared();
        let ip = [192, 168, 4, 1];

        let mut ex = BufferedExchange::get("/metrics").with_host("192.168.4.1");
        handle_request(&shared, ip, &mut ex);
        assert_eq!(ex.status(), Some(200));
        assert_eq!(ex.body(), "ok");

        let mut ex = BufferedExchange::get("/other").with_host("192.168.4.1");
        handle_request(&shared, ip, &mut ex);
        assert_eq!(ex.status(), Some(404));
    }

    #[test]
    fn into_store_returns_after_session() {
        let wifi = SimWireless::new().with_station_counts(&[0]);
        let mut portal = Portal::new(
            store(),
            wifi,
            crate::adapters::dns::SimDns::new(),
            SimHttpServer::new(),
            SimSystem::new(),
            quick_config(5),
        );
        portal.run(|_, _| {}).unwrap();
        let store = portal.into_store().unwrap();
        assert!(store.verify());
    }
}
