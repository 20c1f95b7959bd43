//! Chip control and reset-surviving memory backends.

use crate::ports::{RtcMemoryPort, SystemPort};

// ── ESP-IDF ────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod espidf {
    use super::{RtcMemoryPort, SystemPort};

    const RTC_SLOTS: usize = 2;

    // RTC slow memory keeps its contents across a software reset but not a
    // power cycle.
    #[link_section = ".rtc.data"]
    static mut RTC_WORDS: [u32; RTC_SLOTS] = [0; RTC_SLOTS];

    pub struct EspSystem;

    impl SystemPort for EspSystem {
        fn restart(&mut self) {
            log::warn!("restarting");
            esp_idf_hal::reset::restart();
        }
    }

    pub struct EspRtcMemory;

    impl RtcMemoryPort for EspRtcMemory {
        fn read(&self, slot: usize) -> u32 {
            if slot >= RTC_SLOTS {
                return 0;
            }
            unsafe { core::ptr::read_volatile(core::ptr::addr_of!(RTC_WORDS[slot])) }
        }

        fn write(&mut self, slot: usize, value: u32) {
            if slot < RTC_SLOTS {
                unsafe {
                    core::ptr::write_volatile(core::ptr::addr_of_mut!(RTC_WORDS[slot]), value);
                }
            }
        }
    }
}

#[cfg(target_os = "espidf")]
pub use espidf::{EspRtcMemory, EspSystem};

// ── Simulation ─────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::{RtcMemoryPort, SystemPort};

    /// Counts restart requests instead of performing them.
    pub struct SimSystem {
        restarts: Arc<AtomicUsize>,
    }

    impl SimSystem {
        pub fn new() -> Self {
            Self {
                restarts: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Handle that stays readable after the system moves into a portal.
        pub fn restart_counter(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.restarts)
        }
    }

    impl Default for SimSystem {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SystemPort for SimSystem {
        fn restart(&mut self) {
            self.restarts.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Plain word array standing in for RTC slow memory.
    pub struct SimRtcMemory {
        words: [u32; 8],
    }

    impl SimRtcMemory {
        pub fn new() -> Self {
            Self { words: [0; 8] }
        }
    }

    impl Default for SimRtcMemory {
        fn default() -> Self {
            Self::new()
        }
    }

    impl RtcMemoryPort for SimRtcMemory {
        fn read(&self, slot: usize) -> u32 {
            self.words.get(slot).copied().unwrap_or(0)
        }

        fn write(&mut self, slot: usize, value: u32) {
            if let Some(word) = self.words.get_mut(slot) {
                *word = value;
            }
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub use sim::{SimRtcMemory, SimSystem};
