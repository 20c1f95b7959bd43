//! Wireless backends.

use crate::error::{Error, Result};
use crate::ports::{ScanEntry, WirelessPort};

// ── ESP-IDF ────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod espidf {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration, EspWifi,
    };

    use super::{Error, Result, ScanEntry, WirelessPort};

    pub struct EspWireless {
        wifi: BlockingWifi<EspWifi<'static>>,
    }

    impl EspWireless {
        pub fn new(wifi: EspWifi<'static>, sysloop: EspSystemEventLoop) -> Result<Self> {
            let wifi = BlockingWifi::wrap(wifi, sysloop).map_err(|_| Error::Io("wifi wrap"))?;
            Ok(Self { wifi })
        }
    }

    impl WirelessPort for EspWireless {
        fn scan(&mut self) -> Result<Vec<ScanEntry>> {
            let found = self.wifi.scan().map_err(|e| {
                log::error!("wifi scan failed: {e}");
                Error::Io("wifi scan")
            })?;
            Ok(found
                .into_iter()
                .map(|ap| ScanEntry {
                    ssid: ap.ssid,
                    channel: ap.channel,
                    rssi: ap.signal_strength,
                })
                .collect())
        }

        fn ap_start(&mut self, ssid: &str, password: &str, channel: u8) -> Result<()> {
            let config = AccessPointConfiguration {
                ssid: ssid.try_into().map_err(|()| Error::Io("ssid too long"))?,
                password: password
                    .try_into()
                    .map_err(|()| Error::Io("password too long"))?,
                auth_method: if password.is_empty() {
                    AuthMethod::None
                } else {
                    AuthMethod::WPA2Personal
                },
                channel,
                ..AccessPointConfiguration::default()
            };
            self.wifi
                .set_configuration(&Configuration::AccessPoint(config))
                .map_err(|_| Error::Io("wifi configure"))?;
            self.wifi.start().map_err(|_| Error::Io("wifi start"))?;
            self.wifi
                .wait_netif_up()
                .map_err(|_| Error::Io("wifi netif"))?;
            Ok(())
        }

        fn ap_stop(&mut self) -> Result<()> {
            self.wifi.stop().map_err(|_| Error::Io("wifi stop"))
        }

        fn ap_ip(&self) -> [u8; 4] {
            self.wifi
                .wifi()
                .ap_netif()
                .get_ip_info()
                .map(|info| info.ip.octets())
                .unwrap_or([0; 4])
        }

        fn station_count(&mut self) -> Result<usize> {
            let mut list = esp_idf_svc::sys::wifi_sta_list_t::default();
            // Safe: the list struct is plain data owned by this frame.
            let err = unsafe { esp_idf_svc::sys::esp_wifi_ap_get_sta_list(&mut list) };
            if err == esp_idf_svc::sys::ESP_OK {
                Ok(list.num as usize)
            } else {
                Err(Error::Io("sta list"))
            }
        }
    }
}

#[cfg(target_os = "espidf")]
pub use espidf::EspWireless;

// ── Simulation ─────────────────────────────────────────────────

/// Scripted wireless backend: fixed scan results, a station-count sequence
/// (last value repeats) and optional forced bring-up failure.
#[cfg(not(target_os = "espidf"))]
pub struct SimWireless {
    scan: Vec<ScanEntry>,
    counts: Vec<usize>,
    tick: usize,
    fail_ap: bool,
    ap_running: bool,
    last_channel: Option<u8>,
}

#[cfg(not(target_os = "espidf"))]
impl SimWireless {
    pub fn new() -> Self {
        Self {
            scan: Vec::new(),
            counts: Vec::new(),
            tick: 0,
            fail_ap: false,
            ap_running: false,
            last_channel: None,
        }
    }

    pub fn with_scan(mut self, scan: Vec<ScanEntry>) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_station_counts(mut self, counts: &[usize]) -> Self {
        self.counts = counts.to_vec();
        self
    }

    pub fn with_ap_failure(mut self) -> Self {
        self.fail_ap = true;
        self
    }

    pub fn ap_running(&self) -> bool {
        self.ap_running
    }

    pub fn last_channel(&self) -> Option<u8> {
        self.last_channel
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimWireless {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WirelessPort for SimWireless {
    fn scan(&mut self) -> Result<Vec<ScanEntry>> {
        Ok(self.scan.clone())
    }

    fn ap_start(&mut self, _ssid: &str, _password: &str, channel: u8) -> Result<()> {
        if self.fail_ap {
            return Err(Error::Io("ap start"));
        }
        self.ap_running = true;
        self.last_channel = Some(channel);
        Ok(())
    }

    fn ap_stop(&mut self) -> Result<()> {
        self.ap_running = false;
        Ok(())
    }

    fn ap_ip(&self) -> [u8; 4] {
        [192, 168, 4, 1]
    }

    fn station_count(&mut self) -> Result<usize> {
        let count = match self.counts.get(self.tick) {
            Some(&c) => c,
            None => self.counts.last().copied().unwrap_or(0),
        };
        self.tick += 1;
        Ok(count)
    }
}
