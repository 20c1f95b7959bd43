//! Flag bits that survive a reset but not a power cycle.
//!
//! Two reset-surviving words hold the state: a fixed signature, then the 16
//! flag bits stored alongside their complement so a half-written or decayed
//! word reads back as invalid. Anything invalid is treated as "all flags
//! clear", which after a cold boot is exactly right.

use crate::ports::RtcMemoryPort;

const SIGN_SLOT: usize = 0;
const FLAGS_SLOT: usize = 1;
const SIGNATURE: u32 = 0xA1B2_C3D4;

/// 16 reset-surviving flag bits over an [`RtcMemoryPort`].
pub struct BootFlags<M: RtcMemoryPort> {
    mem: M,
}

impl<M: RtcMemoryPort> BootFlags<M> {
    pub fn new(mem: M) -> Self {
        Self { mem }
    }

    /// All 16 bits; 0 when the backing words are unsigned or inconsistent.
    pub fn flags(&self) -> u16 {
        if self.mem.read(SIGN_SLOT) != SIGNATURE {
            return 0;
        }
        let word = self.mem.read(FLAGS_SLOT);
        let flags = word as u16;
        if (word >> 16) as u16 == !flags { flags } else { 0 }
    }

    pub fn flag(&self, bit: u8) -> bool {
        bit < 16 && self.flags() & (1 << bit) != 0
    }

    pub fn set_flag(&mut self, bit: u8) {
        if bit < 16 {
            self.store(self.flags() | (1 << bit));
        }
    }

    pub fn clear_flag(&mut self, bit: u8) {
        if bit < 16 {
            self.store(self.flags() & !(1 << bit));
        }
    }

    fn store(&mut self, flags: u16) {
        self.mem.write(SIGN_SLOT, SIGNATURE);
        self.mem
            .write(FLAGS_SLOT, (u32::from(!flags) << 16) | u32::from(flags));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::system::SimRtcMemory;

    #[test]
    fn unsigned_memory_reads_clear() {
        let flags = BootFlags::new(SimRtcMemory::new());
        assert_eq!(flags.flags(), 0);
        assert!(!flags.flag(3));
    }

    #[test]
    fn set_and_clear_round_trip() {
        let mut flags = BootFlags::new(SimRtcMemory::new());
        flags.set_flag(0);
        flags.set_flag(7);
        assert!(flags.flag(0));
        assert!(flags.flag(7));
        assert!(!flags.flag(1));
        flags.clear_flag(0);
        assert!(!flags.flag(0));
        assert!(flags.flag(7));
    }

    #[test]
    fn inconsistent_complement_reads_clear() {
        let mut mem = SimRtcMemory::new();
        mem.write(0, SIGNATURE);
        mem.write(1, 0x0000_0001); // complement half missing
        let flags = BootFlags::new(mem);
        assert_eq!(flags.flags(), 0);
    }

    #[test]
    fn out_of_range_bits_are_ignored() {
        let mut flags = BootFlags::new(SimRtcMemory::new());
        flags.set_flag(16);
        assert_eq!(flags.flags(), 0);
        assert!(!flags.flag(200));
    }
}
