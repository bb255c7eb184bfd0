// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! The matrix mixer of the unit.
//!
//! Each mix is a row of gains applied to the mixer inputs. Gains are expressed towards
//! userspace as indices between 0 and 172 for -80.0 dB to +6.0 dB in 0.5 dB steps; on
//! the wire each index maps to a 16 bit linear value, and in the persisted software
//! configuration to the upper half of an IEEE 754 binary32 expression of the decibel
//! value.

use {
    super::*,
    crate::{model::*, transaction::*},
};

/// The lower bound of mixer gains in dB.
pub const MIXER_MIN_DB: i32 = -80;
/// The upper bound of mixer gains in dB.
pub const MIXER_MAX_DB: i32 = 6;
/// The maximum gain index.
pub const MIXER_GAIN_MAX: u8 = ((MIXER_MAX_DB - MIXER_MIN_DB) * 2) as u8;

/// The value appended after the last gain of `SET_MIX` in models with the talkback
/// microphone. The meaning of the value is not documented; it is preserved literally.
pub const MIX_TALKBACK_SENTINEL: u16 = 0x2000;

/// Map from gain index ((dB + 80) * 2) to 16 bit linear mixer value;
/// int(8192 * pow(10, ((index - 160) / 2 / 20))).
pub const MIXER_VALUES: [u16; (MIXER_GAIN_MAX as usize) + 1] = [
    0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2,
    2, 2, 3, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 6, 6, 6, 7, 7, 8, 8,
    9, 9, 10, 10, 11, 12, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21,
    23, 24, 25, 27, 29, 30, 32, 34, 36, 38, 41, 43, 46, 48, 51,
    54, 57, 61, 65, 68, 73, 77, 81, 86, 91, 97, 103, 109, 115,
    122, 129, 137, 145, 154, 163, 173, 183, 194, 205, 217, 230,
    244, 259, 274, 290, 307, 326, 345, 365, 387, 410, 434, 460,
    487, 516, 547, 579, 614, 650, 689, 730, 773, 819, 867, 919,
    973, 1031, 1092, 1157, 1225, 1298, 1375, 1456, 1543, 1634,
    1731, 1833, 1942, 2057, 2179, 2308, 2445, 2590, 2744, 2906,
    3078, 3261, 3454, 3659, 3876, 4105, 4349, 4606, 4879, 5168,
    5475, 5799, 6143, 6507, 6892, 7301, 7733, 8192, 8677, 9191,
    9736, 10313, 10924, 11571, 12257, 12983, 13752, 14567, 15430,
    16345,
];

/// The smallest gain index whose linear value covers the given one.
pub fn mixer_value_to_gain(value: u16) -> u8 {
    MIXER_VALUES
        .iter()
        .position(|&v| v >= value)
        .map(|pos| pos as u8)
        .unwrap_or(MIXER_GAIN_MAX)
}

/// The upper 16 bits of the IEEE 754 binary32 expression of the gain in dB, as stored
/// in the software configuration. The lower 16 bits are zero for every expressible
/// half-dB step.
pub fn gain_to_sw_config_level(gain: u8) -> u16 {
    let db = (gain as f32 - 160.0) / 2.0;
    (db.to_bits() >> 16) as u16
}

/// Decode an IEEE 754 binary32 decibel value to half-dB steps, saturated to the range
/// of the mixer.
pub fn mixer_level_from_f32(val: f32) -> i32 {
    if !val.is_finite() || val.abs() < 0.5 {
        return 0;
    }
    let level = (val * 2.0).round() as i32;
    level.max(2 * MIXER_MIN_DB).min(2 * MIXER_MAX_DB)
}

/// Decode an IEEE 754 binary32 decibel value to the gain index.
pub fn gain_from_f32(val: f32) -> u8 {
    (mixer_level_from_f32(val) - 2 * MIXER_MIN_DB) as u8
}

/// Read the gains of all inputs of one mix.
pub fn cache_mix_row<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    info: &ScarlettDeviceInfo,
    mix_num: usize,
    gains: &mut [u8],
    timeout_ms: u32,
) -> Result<(), Error> {
    let count = info.mixer_input_count();
    assert_eq!(gains.len(), count);

    let mut req = [0u8; 4];
    serialize_u16(mix_num as u16, &mut req[..2]);
    serialize_u16(count as u16, &mut req[2..4]);

    let mut resp = vec![0u8; count * 2];
    conn.request(USB_GET_MIX, &req, &mut resp, timeout_ms)?;

    gains.iter_mut().enumerate().for_each(|(i, gain)| {
        let value = deserialize_u16(&resp[(i * 2)..(i * 2 + 2)]);
        *gain = mixer_value_to_gain(value);
    });

    Ok(())
}

/// Write the gains of all inputs of one mix. Muted inputs are written with the smallest
/// linear value; their configured gain is kept by the caller.
pub fn update_mix_row<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    info: &ScarlettDeviceInfo,
    mix_num: usize,
    gains: &[u8],
    mutes: &[bool],
    timeout_ms: u32,
) -> Result<(), Error> {
    let count = info.mixer_input_count();
    assert_eq!(gains.len(), count);
    assert_eq!(mutes.len(), count);

    let mut req = vec![0u8; 2 + count * 2];
    serialize_u16(mix_num as u16, &mut req[..2]);

    gains
        .iter()
        .zip(mutes)
        .enumerate()
        .for_each(|(i, (&gain, &mute))| {
            let index = if mute { 0 } else { gain as usize };
            let pos = 2 + i * 2;
            serialize_u16(MIXER_VALUES[index], &mut req[pos..(pos + 2)]);
        });

    if info.has_talkback {
        let mut raw = [0u8; 2];
        serialize_u16(MIX_TALKBACK_SENTINEL, &mut raw);
        req.extend_from_slice(&raw);
    }

    conn.request(USB_SET_MIX, &req, &mut [], timeout_ms)
}

#[cfg(test)]
mod test {
    use {super::*, crate::model::detect_model, crate::testutil::*};

    #[test]
    fn gain_round_trip() {
        (0..=MIXER_GAIN_MAX as usize).for_each(|g| {
            let k = mixer_value_to_gain(MIXER_VALUES[g]) as usize;
            assert!(k <= g);
            assert_eq!(MIXER_VALUES[k], MIXER_VALUES[g]);
        });

        // The table is strictly increasing from index 49 on, so the round trip is
        // exact there.
        (49..=MIXER_GAIN_MAX as usize).for_each(|g| {
            assert_eq!(mixer_value_to_gain(MIXER_VALUES[g]) as usize, g);
        });

        // Above the largest value the index saturates.
        assert_eq!(mixer_value_to_gain(u16::MAX), MIXER_GAIN_MAX);
    }

    #[test]
    fn known_table_points() {
        assert_eq!(MIXER_VALUES[140], 2590);
        assert_eq!(MIXER_VALUES[160], 8192);
        assert_eq!(MIXER_VALUES[MIXER_GAIN_MAX as usize], 16345);
    }

    #[test]
    fn sw_config_level_encoding() {
        // -10.0 dB.
        assert_eq!(gain_to_sw_config_level(140), 0xc120);
        // 0.0 dB.
        assert_eq!(gain_to_sw_config_level(160), 0x0000);
        // +6.0 dB.
        assert_eq!(gain_to_sw_config_level(172), 0x40c0);
        // -80.0 dB.
        assert_eq!(gain_to_sw_config_level(0), 0xc2a0);
    }

    #[test]
    fn f32_decoding() {
        assert_eq!(mixer_level_from_f32(-10.0), -20);
        assert_eq!(mixer_level_from_f32(0.4), 0);
        assert_eq!(mixer_level_from_f32(-0.49), 0);
        assert_eq!(mixer_level_from_f32(0.5), 1);
        assert_eq!(mixer_level_from_f32(100.0), 12);
        assert_eq!(mixer_level_from_f32(-100.0), -160);
        assert_eq!(mixer_level_from_f32(f32::NAN), 0);

        assert_eq!(gain_from_f32(-10.0), 140);
        assert_eq!(gain_from_f32(0.0), 160);
    }

    #[test]
    fn mix_row_write() {
        let info = detect_model((0x1235, 0x8204)).unwrap();
        let conn = ScarlettTransaction::new(EmulatedUnit::default());

        let mut gains = vec![160u8; info.mixer_input_count()];
        gains[0] = 140;
        let mut mutes = vec![false; info.mixer_input_count()];
        mutes[2] = true;

        update_mix_row(&conn, info, 0, &gains, &mutes, TIMEOUT_MS).unwrap();

        conn.with_io(|unit| {
            let payload = &unit.mix_payloads[0];
            assert_eq!(payload.len(), 2 + info.mixer_input_count() * 2);
            assert_eq!(deserialize_u16(&payload[..2]), 0);
            assert_eq!(deserialize_u16(&payload[2..4]), 2590);
            assert_eq!(deserialize_u16(&payload[4..6]), 8192);
            // The muted input carries the smallest linear value.
            assert_eq!(deserialize_u16(&payload[6..8]), 0);
        });
    }

    #[test]
    fn mix_row_write_with_talkback() {
        let info = detect_model((0x1235, 0x8215)).unwrap();
        let conn = ScarlettTransaction::new(EmulatedUnit::default());

        let gains = vec![160u8; info.mixer_input_count()];
        let mutes = vec![false; info.mixer_input_count()];
        update_mix_row(&conn, info, 3, &gains, &mutes, TIMEOUT_MS).unwrap();

        conn.with_io(|unit| {
            let payload = &unit.mix_payloads[0];
            assert_eq!(payload.len(), 2 + (info.mixer_input_count() + 1) * 2);
            assert_eq!(deserialize_u16(&payload[..2]), 3);
            let tail = payload.len() - 2;
            assert_eq!(deserialize_u16(&payload[tail..]), MIX_TALKBACK_SENTINEL);
        });
    }

    #[test]
    fn mix_row_cache() {
        let info = detect_model((0x1235, 0x8204)).unwrap();
        let mut unit = EmulatedUnit::default();
        unit.mix_values = vec![vec![8192, 2590, 0, 16345]];

        let conn = ScarlettTransaction::new(unit);
        let mut gains = vec![0u8; info.mixer_input_count()];
        cache_mix_row(&conn, info, 0, &mut gains, TIMEOUT_MS).unwrap();

        assert_eq!(gains[0], 160);
        assert_eq!(gains[1], 140);
        assert_eq!(gains[2], 0);
        assert_eq!(gains[3], 172);
        assert!(gains[4..].iter().all(|&g| g == 0));
    }
}
