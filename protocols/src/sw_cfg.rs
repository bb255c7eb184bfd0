// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! The persisted software configuration of the unit.
//!
//! Gen 2/3 units keep a packed configuration image in their addressable data region,
//! restored at power on. The driver mirrors the whole image and writes back only the
//! dirtied bytes plus the trailing checksum word on every edit. The checksum is the
//! two's-complement negation of the 32 bit word sum of the image with the checksum
//! field zeroed, so that the sum over the whole image is zero.

use {
    super::*,
    crate::{mixer::*, transaction::ScarlettTransaction},
};

/// The offset of the configuration image in the addressable data region.
pub const SW_CFG_OFFSET: u32 = 0xec;
/// The size of the configuration image.
pub const SW_CFG_SIZE: usize = 0x1984;

/// The number of output slots described by the image.
pub const SW_CFG_OUTPUT_COUNT: usize = 26;
/// The number of mixer input slots described by the image.
pub const SW_CFG_MIXER_INPUT_COUNT: usize = 30;
/// The number of mixes described by the image.
pub const SW_CFG_MIX_COUNT: usize = 12;
/// The number of input alias slots described by the image.
pub const SW_CFG_INPUT_ALIAS_COUNT: usize = 42;

const ALL_SIZE: u16 = (SW_CFG_SIZE + 0x0c) as u16;
const MAGIC: u16 = 0x3006;
const VERSION: u32 = 1;

const ALIAS_SIZE: usize = 12;

const OFFSET_ALL_SIZE: usize = 0x00;
const OFFSET_MAGIC: usize = 0x02;
const OFFSET_VERSION: usize = 0x04;
const OFFSET_SZOF: usize = 0x08;
const OFFSET_OUT_MUX: usize = 0x0c;
const OFFSET_MIXER_IN_MUX: usize = 0x26;
const OFFSET_MIXER_IN_MAP: usize = 0x44;
const OFFSET_STEREO_SW: usize = 0x62;
const OFFSET_MUTE_SW: usize = 0x66;
const OFFSET_VOLUME: usize = 0x6a;
const OFFSET_IN_ALIAS: usize = 0x92;
const OFFSET_OUT_ALIAS: usize = 0x28a;
const OFFSET_MIXER: usize = 0x3c2;
const OFFSET_MIXER_PAN: usize = 0x962;
const OFFSET_MIXER_MUTE: usize = 0xaca;
const OFFSET_MIXER_SOLO: usize = 0xafa;
const OFFSET_MIXER_BIND: usize = 0xb2a;
const OFFSET_CHECKSUM: usize = SW_CFG_SIZE - 4;

/// Mirror of the configuration image with tracking of the dirtied byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwConfig {
    raw: Vec<u8>,
    dirty: Option<(usize, usize)>,
}

/// The checksum of an image, computed with its checksum field zeroed.
pub fn compute_checksum(raw: &[u8]) -> u32 {
    let sum = (0..OFFSET_CHECKSUM)
        .step_by(4)
        .fold(0u32, |sum, pos| sum.wrapping_add(deserialize_u32(&raw[pos..(pos + 4)])));
    sum.wrapping_neg()
}

impl Default for SwConfig {
    fn default() -> Self {
        let mut raw = vec![0u8; SW_CFG_SIZE];

        serialize_u16(ALL_SIZE, &mut raw[OFFSET_ALL_SIZE..]);
        serialize_u16(MAGIC, &mut raw[OFFSET_MAGIC..]);
        serialize_u32(VERSION, &mut raw[OFFSET_VERSION..]);
        serialize_u16(SW_CFG_SIZE as u16, &mut raw[OFFSET_SZOF..]);

        let checksum = compute_checksum(&raw);
        serialize_u32(checksum, &mut raw[OFFSET_CHECKSUM..]);

        Self {
            raw,
            dirty: Some((0, SW_CFG_SIZE)),
        }
    }
}

impl SwConfig {
    fn from_raw(raw: Vec<u8>) -> Self {
        Self { raw, dirty: None }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn splice(&mut self, pos: usize, bytes: &[u8]) {
        if &self.raw[pos..(pos + bytes.len())] != bytes {
            self.raw[pos..(pos + bytes.len())].copy_from_slice(bytes);

            let span = match self.dirty {
                Some((start, end)) => (start.min(pos), end.max(pos + bytes.len())),
                None => (pos, pos + bytes.len()),
            };
            self.dirty = Some(span);
        }
    }

    /// Recompute the trailing checksum so that the word sum of the image is zero.
    pub fn update_checksum(&mut self) {
        let checksum = compute_checksum(&self.raw);
        serialize_u32(checksum, &mut self.raw[OFFSET_CHECKSUM..]);
    }

    pub fn verify_checksum(&self) -> bool {
        (0..SW_CFG_SIZE)
            .step_by(4)
            .fold(0u32, |sum, pos| {
                sum.wrapping_add(deserialize_u32(&self.raw[pos..(pos + 4)]))
            })
            .eq(&0)
    }

    /// Software routing of one output slot; the 1-based flat source index, zero for no
    /// source.
    pub fn out_mux(&self, index: usize) -> u8 {
        self.raw[OFFSET_OUT_MUX + index]
    }

    pub fn set_out_mux(&mut self, index: usize, source: u8) {
        assert!(index < SW_CFG_OUTPUT_COUNT);
        self.splice(OFFSET_OUT_MUX + index, &[source]);
    }

    /// Software routing of one mixer input slot.
    pub fn mixer_in_mux(&self, index: usize) -> u8 {
        self.raw[OFFSET_MIXER_IN_MUX + index]
    }

    pub fn set_mixer_in_mux(&mut self, index: usize, source: u8) {
        assert!(index < SW_CFG_MIXER_INPUT_COUNT);
        self.splice(OFFSET_MIXER_IN_MUX + index, &[source]);
    }

    /// Stereo pairing of one mixer input slot; the partner slot when paired.
    pub fn mixer_in_partner(&self, index: usize) -> Option<u8> {
        let entry = self.raw[OFFSET_MIXER_IN_MAP + index];
        if entry & 0x80 > 0 {
            Some(entry & 0x7f)
        } else {
            None
        }
    }

    pub fn set_mixer_in_partner(&mut self, index: usize, partner: Option<u8>) {
        assert!(index < SW_CFG_MIXER_INPUT_COUNT);
        let entry = match partner {
            Some(p) => 0x80 | (p & 0x7f),
            None => 0,
        };
        self.splice(OFFSET_MIXER_IN_MAP + index, &[entry]);
    }

    /// Mask of output slots grouped into stereo pairs.
    pub fn stereo_sw(&self) -> u32 {
        deserialize_u32(&self.raw[OFFSET_STEREO_SW..])
    }

    pub fn set_stereo_sw(&mut self, mask: u32) {
        self.splice(OFFSET_STEREO_SW, &mask.to_le_bytes());
    }

    /// Mask of muted output slots.
    pub fn mute_sw(&self) -> u32 {
        deserialize_u32(&self.raw[OFFSET_MUTE_SW..])
    }

    pub fn set_mute_sw(&mut self, mask: u32) {
        self.splice(OFFSET_MUTE_SW, &mask.to_le_bytes());
    }

    /// Persisted software volume of one output, when one has been stored.
    pub fn volume(&self, index: usize) -> Option<i16> {
        let pos = OFFSET_VOLUME + index * 4;
        if self.raw[pos + 2] > 0 {
            Some(deserialize_i16(&self.raw[pos..(pos + 2)]))
        } else {
            None
        }
    }

    pub fn set_volume(&mut self, index: usize, level: i16) {
        assert!(index < ANALOGUE_OUTPUT_MAX);
        let pos = OFFSET_VOLUME + index * 4;
        let flags = self.raw[pos + 3];
        let mut bytes = [0u8; 4];
        bytes[..2].copy_from_slice(&level.to_le_bytes());
        bytes[2] = 1;
        bytes[3] = flags;
        self.splice(pos, &bytes);
    }

    pub fn in_alias(&self, index: usize) -> String {
        alias_at(&self.raw, OFFSET_IN_ALIAS + index * ALIAS_SIZE)
    }

    pub fn set_in_alias(&mut self, index: usize, name: &str) {
        assert!(index < SW_CFG_INPUT_ALIAS_COUNT);
        let bytes = alias_bytes(name);
        self.splice(OFFSET_IN_ALIAS + index * ALIAS_SIZE, &bytes);
    }

    pub fn out_alias(&self, index: usize) -> String {
        alias_at(&self.raw, OFFSET_OUT_ALIAS + index * ALIAS_SIZE)
    }

    pub fn set_out_alias(&mut self, index: usize, name: &str) {
        assert!(index < SW_CFG_OUTPUT_COUNT);
        let bytes = alias_bytes(name);
        self.splice(OFFSET_OUT_ALIAS + index * ALIAS_SIZE, &bytes);
    }

    /// The persisted gain of one mixer crosspoint.
    pub fn mixer_gain(&self, mix: usize, input: usize) -> u8 {
        let pos = OFFSET_MIXER + (mix * SW_CFG_MIXER_INPUT_COUNT + input) * 4;
        let bits = deserialize_u32(&self.raw[pos..(pos + 4)]);
        gain_from_f32(f32::from_bits(bits))
    }

    pub fn set_mixer_gain(&mut self, mix: usize, input: usize, gain: u8) {
        assert!(mix < SW_CFG_MIX_COUNT);
        assert!(input < SW_CFG_MIXER_INPUT_COUNT);
        let pos = OFFSET_MIXER + (mix * SW_CFG_MIXER_INPUT_COUNT + input) * 4;
        let bits = (gain_to_sw_config_level(gain) as u32) << 16;
        self.splice(pos, &bits.to_le_bytes());
    }

    pub fn mixer_pan(&self, mix: usize, input: usize) -> i8 {
        self.raw[OFFSET_MIXER_PAN + mix * SW_CFG_MIXER_INPUT_COUNT + input] as i8
    }

    pub fn set_mixer_pan(&mut self, mix: usize, input: usize, pan: i8) {
        assert!(mix < SW_CFG_MIX_COUNT);
        assert!(input < SW_CFG_MIXER_INPUT_COUNT);
        self.splice(
            OFFSET_MIXER_PAN + mix * SW_CFG_MIXER_INPUT_COUNT + input,
            &[pan as u8],
        );
    }

    /// Mask of muted inputs of one mix.
    pub fn mixer_mute(&self, mix: usize) -> u32 {
        deserialize_u32(&self.raw[(OFFSET_MIXER_MUTE + mix * 4)..])
    }

    pub fn set_mixer_mute(&mut self, mix: usize, mask: u32) {
        assert!(mix < SW_CFG_MIX_COUNT);
        self.splice(OFFSET_MIXER_MUTE + mix * 4, &mask.to_le_bytes());
    }

    /// Mask of soloed inputs of one mix.
    pub fn mixer_solo(&self, mix: usize) -> u32 {
        deserialize_u32(&self.raw[(OFFSET_MIXER_SOLO + mix * 4)..])
    }

    pub fn set_mixer_solo(&mut self, mix: usize, mask: u32) {
        assert!(mix < SW_CFG_MIX_COUNT);
        self.splice(OFFSET_MIXER_SOLO + mix * 4, &mask.to_le_bytes());
    }

    /// Mask of output slots routed directly instead of through the internal mixer.
    pub fn mixer_bind(&self) -> u32 {
        deserialize_u32(&self.raw[OFFSET_MIXER_BIND..])
    }

    pub fn set_mixer_bind(&mut self, mask: u32) {
        self.splice(OFFSET_MIXER_BIND, &mask.to_le_bytes());
    }

    #[cfg(test)]
    pub(crate) fn dirty_span(&self) -> Option<(usize, usize)> {
        self.dirty
    }
}

fn alias_at(raw: &[u8], pos: usize) -> String {
    let bytes = &raw[pos..(pos + ALIAS_SIZE)];
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(ALIAS_SIZE);
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}

fn alias_bytes(name: &str) -> [u8; ALIAS_SIZE] {
    let mut bytes = [0u8; ALIAS_SIZE];
    let data = name.as_bytes();
    let len = std::cmp::min(data.len(), ALIAS_SIZE - 1);
    bytes[..len].copy_from_slice(&data[..len]);
    bytes
}

/// Read the configuration image from the unit at attach.
///
/// A unit reporting size zero has no image yet; a fresh one is synthesized and uploaded
/// once. A unit reporting any other size than the declared one is left alone and the
/// mirror is unusable.
pub fn load_sw_config<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    timeout_ms: u32,
) -> Result<SwConfig, Error> {
    let mut raw = [0u8; 2];
    conn.read_data(SW_CFG_OFFSET + OFFSET_SZOF as u32, &mut raw, timeout_ms)?;
    let szof = deserialize_u16(&raw) as usize;

    if szof == 0 {
        let cfg = SwConfig::default();
        conn.write_data(SW_CFG_OFFSET, &cfg.raw, timeout_ms)?;
        Ok(SwConfig {
            dirty: None,
            ..cfg
        })
    } else if szof == SW_CFG_SIZE {
        let mut raw = vec![0u8; SW_CFG_SIZE];
        conn.read_data(SW_CFG_OFFSET, &mut raw, timeout_ms)?;
        Ok(SwConfig::from_raw(raw))
    } else {
        let msg = format!(
            "configuration image size {} while {} is expected",
            szof, SW_CFG_SIZE
        );
        Err(Error::new(ScarlettProtocolError::Integrity, &msg))
    }
}

/// Upload the dirtied bytes of the mirror plus the refreshed checksum word.
pub fn flush_sw_config<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    cfg: &mut SwConfig,
    timeout_ms: u32,
) -> Result<(), Error> {
    let (start, end) = match cfg.dirty {
        Some(span) => span,
        None => return Ok(()),
    };

    cfg.update_checksum();

    conn.write_data(
        SW_CFG_OFFSET + start as u32,
        &cfg.raw[start..end],
        timeout_ms,
    )?;

    if end <= OFFSET_CHECKSUM {
        conn.write_data(
            SW_CFG_OFFSET + OFFSET_CHECKSUM as u32,
            &cfg.raw[OFFSET_CHECKSUM..],
            timeout_ms,
        )?;
    }

    cfg.dirty = None;

    Ok(())
}

#[cfg(test)]
mod test {
    use {super::*, crate::testutil::*};

    #[test]
    fn blank_image_header() {
        let cfg = SwConfig::default();

        assert_eq!(deserialize_u16(&cfg.raw[OFFSET_ALL_SIZE..]), 0x1990);
        assert_eq!(deserialize_u16(&cfg.raw[OFFSET_MAGIC..]), 0x3006);
        assert_eq!(deserialize_u16(&cfg.raw[OFFSET_SZOF..]), 0x1984);
        assert!(cfg.verify_checksum());
    }

    #[test]
    fn checksum_invariant_over_mutations() {
        let mut cfg = SwConfig::default();

        cfg.set_out_mux(0, 1);
        cfg.set_mixer_in_mux(5, 9);
        cfg.set_mixer_in_partner(5, Some(6));
        cfg.set_stereo_sw(0x0000000f);
        cfg.set_mute_sw(0x00000002);
        cfg.set_volume(3, -30);
        cfg.set_in_alias(0, "Vocal");
        cfg.set_out_alias(25, "Cue 2");
        cfg.set_mixer_gain(11, 29, 100);
        cfg.set_mixer_pan(0, 0, -64);
        cfg.set_mixer_mute(2, 0x55);
        cfg.set_mixer_solo(2, 0x02);
        cfg.set_mixer_bind(0x03);

        assert!(!cfg.verify_checksum());
        cfg.update_checksum();
        assert!(cfg.verify_checksum());
    }

    #[test]
    fn mixer_gain_storage() {
        let mut cfg = SwConfig::default();
        cfg.dirty = None;

        // -10 dB stores the binary32 expression with a zero lower half.
        cfg.set_mixer_gain(0, 0, 140);
        assert_eq!(&cfg.raw[OFFSET_MIXER..(OFFSET_MIXER + 4)], &[0x00, 0x00, 0x20, 0xc1]);
        assert_eq!(cfg.mixer_gain(0, 0), 140);
        assert_eq!(cfg.dirty_span(), Some((OFFSET_MIXER, OFFSET_MIXER + 4)));

        // 0 dB stores zero bits.
        cfg.set_mixer_gain(0, 1, 160);
        assert_eq!(cfg.mixer_gain(0, 1), 160);
        assert_eq!(
            &cfg.raw[(OFFSET_MIXER + 4)..(OFFSET_MIXER + 8)],
            &[0, 0, 0, 0]
        );
    }

    #[test]
    fn idempotent_edits_stay_clean() {
        let mut cfg = SwConfig::default();
        cfg.dirty = None;

        cfg.set_mixer_gain(0, 1, 160);
        cfg.set_out_mux(0, 0);
        cfg.set_stereo_sw(0);

        assert_eq!(cfg.dirty_span(), None);
    }

    #[test]
    fn alias_round_trip() {
        let mut cfg = SwConfig::default();

        cfg.set_in_alias(0, "Vocal");
        assert_eq!(cfg.in_alias(0), "Vocal");

        cfg.set_out_alias(1, "A name much too long to fit");
        assert_eq!(cfg.out_alias(1), "A name much");
    }

    #[test]
    fn volume_presence() {
        let mut cfg = SwConfig::default();

        assert_eq!(cfg.volume(0), None);
        cfg.set_volume(0, -42);
        assert_eq!(cfg.volume(0), Some(-42));
    }

    #[test]
    fn load_synthesizes_fresh_image() {
        let conn = ScarlettTransaction::new(EmulatedUnit::default());

        let cfg = load_sw_config(&conn, TIMEOUT_MS).unwrap();
        assert!(cfg.verify_checksum());

        conn.with_io(|unit| {
            let raw = unit.data_at(SW_CFG_OFFSET as usize, SW_CFG_SIZE);
            assert_eq!(deserialize_u16(&raw[OFFSET_MAGIC..]), 0x3006);
            let sum = (0..SW_CFG_SIZE).step_by(4).fold(0u32, |sum, pos| {
                sum.wrapping_add(deserialize_u32(&raw[pos..(pos + 4)]))
            });
            assert_eq!(sum, 0);
        });
    }

    #[test]
    fn load_reads_existing_image() {
        let mut image = SwConfig::default();
        image.set_out_mux(3, 7);
        image.update_checksum();

        let mut unit = EmulatedUnit::default();
        unit.preload_data(SW_CFG_OFFSET as usize, image.raw());

        let conn = ScarlettTransaction::new(unit);
        let cfg = load_sw_config(&conn, TIMEOUT_MS).unwrap();

        assert_eq!(cfg.out_mux(3), 7);
        assert!(cfg.verify_checksum());
        assert_eq!(cfg.dirty, None);
    }

    #[test]
    fn load_rejects_alien_size() {
        let mut unit = EmulatedUnit::default();
        unit.preload_data(
            SW_CFG_OFFSET as usize + OFFSET_SZOF,
            &0x1000u16.to_le_bytes(),
        );

        let conn = ScarlettTransaction::new(unit);
        let err = load_sw_config(&conn, TIMEOUT_MS).unwrap_err();
        assert_eq!(
            err.kind::<ScarlettProtocolError>(),
            Some(ScarlettProtocolError::Integrity)
        );
    }

    #[test]
    fn flush_uploads_span_and_checksum() {
        let mut unit = EmulatedUnit::default();
        let image = SwConfig::default();
        unit.preload_data(SW_CFG_OFFSET as usize, image.raw());

        let conn = ScarlettTransaction::new(unit);
        let mut cfg = load_sw_config(&conn, TIMEOUT_MS).unwrap();

        cfg.set_mixer_gain(0, 0, 140);
        flush_sw_config(&conn, &mut cfg, TIMEOUT_MS).unwrap();

        conn.with_io(|unit| {
            let base = SW_CFG_OFFSET as usize;
            assert_eq!(
                unit.data_at(base + OFFSET_MIXER, 4),
                &[0x00, 0x00, 0x20, 0xc1]
            );

            // The image held by the unit keeps the zero word sum.
            let raw = unit.data_at(base, SW_CFG_SIZE);
            let sum = (0..SW_CFG_SIZE).step_by(4).fold(0u32, |sum, pos| {
                sum.wrapping_add(deserialize_u32(&raw[pos..(pos + 4)]))
            });
            assert_eq!(sum, 0);
        });

        // Flushing again moves nothing.
        let before = conn.with_io(|unit| unit.requests.len());
        flush_sw_config(&conn, &mut cfg, TIMEOUT_MS).unwrap();
        let after = conn.with_io(|unit| unit.requests.len());
        assert_eq!(before, after);
    }
}
