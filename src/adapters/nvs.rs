//! Storage backends for the parameter record.

use crate::error::{Error, Result};
use crate::ports::NvsPort;

// ── ESP-IDF ────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod espidf {
    use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};

    use super::{Error, NvsPort, Result};

    const BLOB_KEY: &str = "record";

    /// Parameter record as one NVS blob in the default partition.
    pub struct EspNvsStorage {
        nvs: EspNvs<NvsDefault>,
        work: Vec<u8>,
    }

    impl EspNvsStorage {
        pub fn new(partition: EspNvsPartition<NvsDefault>, namespace: &str) -> Result<Self> {
            let nvs = EspNvs::new(partition, namespace, true).map_err(|e| {
                log::error!("nvs open failed: {e}");
                Error::Io("nvs open")
            })?;
            Ok(Self {
                nvs,
                work: Vec::new(),
            })
        }
    }

    impl NvsPort for EspNvsStorage {
        fn begin(&mut self, size: usize) -> Result<()> {
            // Erased-flash fill; a missing or short blob then fails the
            // record check upstream and triggers the defaults reset.
            self.work = vec![0xFF; size];
            match self.nvs.get_blob(BLOB_KEY, &mut self.work) {
                Ok(_) => Ok(()),
                Err(e) => {
                    log::warn!("nvs blob read failed: {e}");
                    Ok(())
                }
            }
        }

        fn data(&self) -> &[u8] {
            &self.work
        }

        fn data_mut(&mut self) -> &mut [u8] {
            &mut self.work
        }

        fn commit(&mut self) -> Result<()> {
            self.nvs
                .set_blob(BLOB_KEY, &self.work)
                .map_err(|_| Error::Io("nvs write"))
        }
    }
}

#[cfg(target_os = "espidf")]
pub use espidf::EspNvsStorage;

// ── Simulation ─────────────────────────────────────────────────

/// In-memory storage with a separate "flash" image, so tests can observe
/// what a commit actually persisted and how often one happened.
#[cfg(not(target_os = "espidf"))]
pub struct MemoryNvs {
    flash: Vec<u8>,
    work: Vec<u8>,
    commits: usize,
}

#[cfg(not(target_os = "espidf"))]
impl MemoryNvs {
    pub fn new() -> Self {
        Self::with_image(Vec::new())
    }

    /// Starts from a pre-existing flash image, as after a reboot.
    pub fn with_image(flash: Vec<u8>) -> Self {
        Self {
            flash,
            work: Vec::new(),
            commits: 0,
        }
    }

    pub fn flash_image(&self) -> &[u8] {
        &self.flash
    }

    /// Number of physical flushes since construction.
    pub fn commit_count(&self) -> usize {
        self.commits
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for MemoryNvs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl NvsPort for MemoryNvs {
    fn begin(&mut self, size: usize) -> Result<()> {
        self.flash.resize(size, 0xFF);
        self.work = self.flash.clone();
        Ok(())
    }

    fn data(&self) -> &[u8] {
        &self.work
    }

    fn data_mut(&mut self) -> &mut [u8] {
        &mut self.work
    }

    fn commit(&mut self) -> Result<()> {
        self.flash.copy_from_slice(&self.work);
        self.commits += 1;
        Ok(())
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn begin_presents_erased_flash() {
        let mut nvs = MemoryNvs::new();
        nvs.begin(8).unwrap();
        assert_eq!(nvs.data(), &[0xFF; 8]);
    }

    #[test]
    fn commit_copies_work_to_flash() {
        let mut nvs = MemoryNvs::new();
        nvs.begin(4).unwrap();
        nvs.data_mut().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(nvs.flash_image(), &[0xFF; 4]);
        nvs.commit().unwrap();
        assert_eq!(nvs.flash_image(), &[1, 2, 3, 4]);
        assert_eq!(nvs.commit_count(), 1);
    }

    #[test]
    fn image_survives_reopen() {
        let mut nvs = MemoryNvs::new();
        nvs.begin(4).unwrap();
        nvs.data_mut().copy_from_slice(&[9, 8, 7, 6]);
        nvs.commit().unwrap();
        let mut nvs = MemoryNvs::with_image(nvs.flash_image().to_vec());
        nvs.begin(4).unwrap();
        assert_eq!(nvs.data(), &[9, 8, 7, 6]);
    }
}
