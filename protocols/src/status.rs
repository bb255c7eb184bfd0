// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Hardware status of the unit; monitor volumes, sampling clock lock, level meters, and
//! the notification messages delivered at the interrupt endpoint.

use {
    super::*,
    crate::transaction::*,
};

/// The offset of the volume status structure in the addressable data region.
pub const VOLUME_STATUS_OFFSET: u32 = 0x31;

const METER_LEVELS_GET_MAGIC: u32 = 1;

/// Acknowledge of a host initiated change; no state to re-read.
pub const NOTIFY_ACK: u32 = 0x00000001;
/// Lock state of the sampling clock changed.
pub const NOTIFY_SYNC: u32 = 0x00000008;
/// A dim or mute button changed.
pub const NOTIFY_DIM_MUTE: u32 = 0x00200000;
/// The master knob or monitor volumes changed.
pub const NOTIFY_MONITOR: u32 = 0x00400000;
/// Conditioning of analogue inputs changed.
pub const NOTIFY_INPUT_OTHER: u32 = 0x00800000;
/// Speaker switching, talkback, or direct monitor changed.
pub const NOTIFY_MONITOR_OTHER: u32 = 0x01000000;

/// Image of the volume status structure; button states, software and actual volumes,
/// per-output mute and control selectors, and the position of the master knob.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct VolumeStatus {
    /// States of the mute and dim buttons.
    pub dim_mute: [bool; DIM_MUTE_COUNT],
    /// Software volume of each analogue output, in dB below the bias.
    pub sw_vols: [i16; ANALOGUE_OUTPUT_MAX],
    /// Actual volume of each analogue output including dim.
    pub hw_vols: [i16; ANALOGUE_OUTPUT_MAX],
    /// Mute state of each analogue output.
    pub mutes: [bool; ANALOGUE_OUTPUT_MAX],
    /// Whether each analogue output follows the hardware master knob.
    pub sw_hw_switches: [bool; ANALOGUE_OUTPUT_MAX],
    /// Position of the master knob.
    pub master_vol: i16,
}

impl VolumeStatus {
    pub(crate) const SIZE: usize = 71;
}

fn deserialize_volume_status(status: &mut VolumeStatus, raw: &[u8]) {
    assert!(raw.len() >= VolumeStatus::SIZE);

    status
        .dim_mute
        .iter_mut()
        .enumerate()
        .for_each(|(i, state)| *state = raw[i] > 0);

    (0..ANALOGUE_OUTPUT_MAX).for_each(|i| {
        status.sw_vols[i] = deserialize_i16(&raw[(3 + i * 2)..(5 + i * 2)]);
        status.hw_vols[i] = deserialize_i16(&raw[(23 + i * 2)..(25 + i * 2)]);
        status.mutes[i] = raw[43 + i] > 0;
        status.sw_hw_switches[i] = raw[53 + i] > 0;
    });

    status.master_vol = deserialize_i16(&raw[69..71]);
}

/// Read the volume status structure.
pub fn cache_volume_status<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    status: &mut VolumeStatus,
    timeout_ms: u32,
) -> Result<(), Error> {
    let mut raw = [0u8; VolumeStatus::SIZE];
    conn.read_data(VOLUME_STATUS_OFFSET, &mut raw, timeout_ms)?;
    deserialize_volume_status(status, &raw);
    Ok(())
}

/// Read the lock state of the sampling clock.
pub fn read_sync_status<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    timeout_ms: u32,
) -> Result<bool, Error> {
    let mut resp = [0u8; 4];
    conn.request(USB_GET_SYNC, &[], &mut resp, timeout_ms)?;
    Ok(deserialize_u32(&resp) > 0)
}

/// Read the given number of level meters.
pub fn read_meter_levels<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    count: usize,
    timeout_ms: u32,
) -> Result<Vec<u16>, Error> {
    let mut req = [0u8; 8];
    serialize_u16(count as u16, &mut req[2..4]);
    serialize_u32(METER_LEVELS_GET_MAGIC, &mut req[4..8]);

    let mut resp = vec![0u8; count * 4];
    conn.request(USB_GET_METER, &req, &mut resp, timeout_ms)?;

    let levels = (0..count)
        .map(|i| deserialize_u32(&resp[(i * 4)..(i * 4 + 4)]) as u16)
        .collect();
    Ok(levels)
}

#[cfg(test)]
mod test {
    use {super::*, crate::testutil::*};

    #[test]
    fn volume_status_deserialization() {
        let mut raw = [0u8; VolumeStatus::SIZE];

        raw[0] = 1;
        // Software volume of output 1 is -6 dB, of output 10 is -127 dB.
        raw[3..5].copy_from_slice(&(-6i16).to_le_bytes());
        raw[21..23].copy_from_slice(&(-127i16).to_le_bytes());
        // Actual volume of output 1.
        raw[23..25].copy_from_slice(&(-24i16).to_le_bytes());
        raw[43] = 1;
        raw[53] = 1;
        raw[63] = 1;
        // Master knob at -18 dB.
        raw[69..71].copy_from_slice(&(-18i16).to_le_bytes());

        let mut status = VolumeStatus::default();
        deserialize_volume_status(&mut status, &raw);

        assert_eq!(status.dim_mute, [true, false]);
        assert_eq!(status.sw_vols[0], -6);
        assert_eq!(status.sw_vols[9], -127);
        assert_eq!(status.hw_vols[0], -24);
        assert!(status.mutes[0]);
        assert!(!status.mutes[1]);
        assert!(status.sw_hw_switches[0]);
        // Padding before the master knob position is ignored.
        assert_eq!(status.master_vol, -18);
    }

    #[test]
    fn volume_status_read() {
        let mut unit = EmulatedUnit::default();
        let mut raw = [0u8; VolumeStatus::SIZE];
        raw[69..71].copy_from_slice(&(-12i16).to_le_bytes());
        unit.preload_data(VOLUME_STATUS_OFFSET as usize, &raw);

        let conn = ScarlettTransaction::new(unit);
        let mut status = VolumeStatus::default();
        cache_volume_status(&conn, &mut status, TIMEOUT_MS).unwrap();

        assert_eq!(status.master_vol, -12);
    }

    #[test]
    fn sync_status_read() {
        let mut unit = EmulatedUnit::default();
        unit.sync = 1;

        let conn = ScarlettTransaction::new(unit);
        assert!(read_sync_status(&conn, TIMEOUT_MS).unwrap());
    }

    #[test]
    fn meter_levels_read() {
        let mut unit = EmulatedUnit::default();
        unit.meter_levels = vec![0, 4095, 0x0001_0200];

        let conn = ScarlettTransaction::new(unit);
        let levels = read_meter_levels(&conn, 3, TIMEOUT_MS).unwrap();

        // Values are truncated to 16 bits.
        assert_eq!(levels, vec![0, 4095, 0x0200]);

        conn.with_io(|unit| {
            let frame = &unit.requests[0];
            assert_eq!(deserialize_u16(&frame[16..18]), 0);
            assert_eq!(deserialize_u16(&frame[18..20]), 3);
            assert_eq!(deserialize_u32(&frame[20..24]), 1);
        });
    }
}
