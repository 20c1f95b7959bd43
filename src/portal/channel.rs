//! 2.4 GHz channel selection for the provisioning AP.

use log::debug;

use crate::ports::ScanEntry;

const CHANNELS: usize = 13;

/// Picks the least-congested channel from a scan.
///
/// Congestion is judged per channel by its strongest occupant; the channel
/// whose strongest peer is weakest wins, so an empty channel always beats
/// an occupied one. Ties go to the lowest channel number.
pub fn least_congested(entries: &[ScanEntry]) -> u8 {
    let mut strongest = [i16::from(i8::MIN); CHANNELS];
    for entry in entries {
        if (1..=CHANNELS as u8).contains(&entry.channel) {
            let slot = &mut strongest[usize::from(entry.channel) - 1];
            *slot = (*slot).max(i16::from(entry.rssi));
        }
    }
    let mut best = 0;
    for (i, &rssi) in strongest.iter().enumerate() {
        if rssi < strongest[best] {
            best = i;
        }
    }
    debug!("channel scan: {} networks, picked channel {}", entries.len(), best + 1);
    (best + 1) as u8
}
