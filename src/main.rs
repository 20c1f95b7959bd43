//! Firmware entry point.
//!
//! Opens the parameter store from NVS and decides whether to enter
//! provisioning: always when no network is configured yet (and then the
//! portal runs until told to restart), and for a bounded window after an
//! unexpected reset so a misconfigured device can be recovered in the
//! field.

#[cfg(target_os = "espidf")]
mod firmware {
    use std::time::Duration;

    use anyhow::Result;
    use log::{info, warn};

    use paramportal::adapters::http::EspHttpPortal;
    use paramportal::adapters::nvs::EspNvsStorage;
    use paramportal::adapters::system::{EspRtcMemory, EspSystem};
    use paramportal::adapters::wifi::EspWireless;
    use paramportal::boot_flags::BootFlags;
    use paramportal::portal::dns::UdpDnsResponder;
    use paramportal::{ParamInfo, Portal, PortalConfig, Schema, Store};

    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::EspWifi;

    // ── Device schema ─────────────────────────────────────────
    // Record layout is append-only: new fields go at the end.
    const SCHEMA: &[ParamInfo] = &[
        ParamInfo::string("wifi_ssid", "WiFi SSID", 33, ""),
        ParamInfo::password("wifi_pass", "WiFi password", 64, ""),
        ParamInfo::string("hostname", "Hostname", 32, "paramportal"),
        ParamInfo::string("mqtt_host", "Broker host", 64, ""),
        ParamInfo::uint16("mqtt_port", "Broker port", 1883),
        ParamInfo::string("mqtt_user", "Broker user", 32, ""),
        ParamInfo::password("mqtt_pass", "Broker password", 32, ""),
        ParamInfo::boolean("mqtt_tls", "Broker TLS", false),
    ];

    const PORTAL_SSID: &str = "paramportal-setup";
    /// Boot flag marking a boot that never reached the main loop.
    const FLAG_UNCLEAN_BOOT: u8 = 0;
    const RECOVERY_WINDOW: Duration = Duration::from_secs(60);

    pub fn run() -> Result<()> {
        // ── 1. ESP-IDF bootstrap ──────────────────────────────
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
        info!("paramportal v{}", env!("CARGO_PKG_VERSION"));

        // ── 2. Open the parameter store ───────────────────────
        let partition = EspDefaultNvsPartition::take()?;
        let storage = EspNvsStorage::new(partition.clone(), "params")?;
        let mut store = Store::new(Schema::new(SCHEMA), storage);
        if store.begin()? {
            warn!("parameter record was reset to defaults");
        }

        // ── 3. Decide whether to provision ────────────────────
        let mut flags = BootFlags::new(EspRtcMemory);
        let unclean = flags.flag(FLAG_UNCLEAN_BOOT);
        let mut ssid = [0u8; 33];
        let provisioned = store
            .get_by_name("wifi_ssid", &mut ssid)
            .map(|n| n > 1)
            .unwrap_or(false);

        if !provisioned || unclean {
            let duration = if provisioned {
                info!("unexpected reset, opening recovery portal");
                RECOVERY_WINDOW
            } else {
                info!("no network configured, opening provisioning portal");
                Duration::ZERO
            };
            store = run_portal(store, duration, partition)?;
        }
        flags.set_flag(FLAG_UNCLEAN_BOOT);

        // ── 4. Application ────────────────────────────────────
        // The provisioned credentials are now in `store`; the application
        // proper (station mode, broker session) starts here and clears the
        // boot flag once it is stable.
        let mut hostname = [0u8; 32];
        let n = store.get_by_name("hostname", &mut hostname)?;
        info!(
            "configured as '{}'",
            String::from_utf8_lossy(&hostname[..n.saturating_sub(1)])
        );
        Ok(())
    }

    fn run_portal(
        store: Store<EspNvsStorage>,
        duration: Duration,
        partition: EspDefaultNvsPartition,
    ) -> Result<Store<EspNvsStorage>> {
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let wifi = EspWifi::new(peripherals.modem, sysloop.clone(), Some(partition))?;
        let wireless = EspWireless::new(wifi, sysloop)?;

        let mut config = PortalConfig {
            duration,
            title: "Device setup",
            ..PortalConfig::default()
        };
        let _ = config.ssid.push_str(PORTAL_SSID);

        let mut portal = Portal::new(
            store,
            wireless,
            UdpDnsResponder::new(),
            EspHttpPortal::new(),
            EspSystem,
            config,
        );
        portal.run(|event, status| {
            info!(
                "portal {event:?} (clients {}, ip {}.{}.{}.{})",
                status.stations, status.ap_ip[0], status.ap_ip[1], status.ap_ip[2], status.ap_ip[3]
            );
        })?;
        Ok(portal.into_store()?)
    }
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("this binary only runs on ESP-IDF targets");
}
