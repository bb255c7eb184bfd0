// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Control elements for the matrix mixer; per-crosspoint gains, per-mix mute and solo
//! masks, and injection of the talkback microphone into mixes.

use {super::*, alsa_ctl_tlv_codec::DbInterval};

fn mix_letter(mix: usize) -> char {
    (b'A' + mix as u8) as char
}

fn gain_elem_name(mix: usize, input: usize) -> String {
    format!("Mix {} Input {:02} Playback Volume", mix_letter(mix), input + 1)
}

fn mute_elem_name(mix: usize) -> String {
    format!("Mix {} Mute Playback Switch", mix_letter(mix))
}

fn solo_elem_name(mix: usize) -> String {
    format!("Mix {} Solo Playback Switch", mix_letter(mix))
}

fn talkback_elem_name(mix: usize) -> String {
    format!("Talkback Mix {} Playback Switch", mix_letter(mix))
}

/// Mute states applied on the wire; a raised solo anywhere in the row mutes every input
/// left out of it.
fn effective_mutes(mute_mask: u32, solo_mask: u32, count: usize) -> Vec<bool> {
    (0..count)
        .map(|i| {
            let bit = 1u32 << i;
            if solo_mask != 0 {
                solo_mask & bit == 0 || mute_mask & bit > 0
            } else {
                mute_mask & bit > 0
            }
        })
        .collect()
}

#[derive(Default, Debug)]
pub struct MixerCtl {
    pub(crate) gain_elem_ids: Vec<ElemId>,
    mute_elem_ids: Vec<ElemId>,
    solo_elem_ids: Vec<ElemId>,
    talkback_elem_ids: Vec<ElemId>,

    pub(crate) gains: Vec<u8>,
    talkback_map: u32,
}

impl MixerCtl {
    const GAIN_TLV: DbInterval = DbInterval {
        min: 100 * MIXER_MIN_DB,
        max: 100 * MIXER_MAX_DB,
        linear: false,
        mute_avail: false,
    };

    fn row_mutes(&self, shared: &ModelShared, mix: usize, count: usize) -> Vec<bool> {
        match shared.sw_cfg.as_ref() {
            Some(cfg) => effective_mutes(cfg.mixer_mute(mix), cfg.mixer_solo(mix), count),
            None => vec![false; count],
        }
    }

    fn emit_row<T: ScarlettUsbIo>(
        &self,
        conn: &ScarlettTransaction<T>,
        shared: &ModelShared,
        mix: usize,
    ) -> Result<(), Error> {
        let count = shared.info.mixer_input_count();
        let mutes = self.row_mutes(shared, mix, count);
        let row = &self.gains[(mix * count)..((mix + 1) * count)];
        update_mix_row(conn, shared.info, mix, row, &mutes, TIMEOUT_MS)
    }

    pub fn cache<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        let count = info.mixer_input_count();

        self.gains = vec![0; info.mixer_output_count() * count];

        (0..info.mixer_output_count()).try_for_each(|mix| {
            let row = &mut self.gains[(mix * count)..((mix + 1) * count)];
            cache_mix_row(conn, info, mix, row, TIMEOUT_MS)
        })?;

        if info.has_talkback {
            let mut raw = [0u8; 2];
            read_config(
                conn,
                info.config_set,
                ConfigItem::TalkbackMap,
                &mut raw,
                TIMEOUT_MS,
            )?;
            self.talkback_map = u16::from_le_bytes(raw) as u32;
        }

        Ok(())
    }

    pub fn load(
        &mut self,
        card_cntr: &mut CardCntr,
        shared: &ModelShared,
    ) -> Result<(), Error> {
        let info = shared.info;
        let count = info.mixer_input_count();
        let tlv = Vec::<u32>::from(&Self::GAIN_TLV);

        (0..info.mixer_output_count()).try_for_each(|mix| {
            (0..count).try_for_each(|input| {
                let name = gain_elem_name(mix, input);
                let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
                let mut elem_id_list = card_cntr.add_int_elems(
                    &elem_id,
                    1,
                    0,
                    MIXER_GAIN_MAX as i32,
                    1,
                    1,
                    Some(&tlv),
                    true,
                )?;
                self.gain_elem_ids.push(elem_id_list.remove(0));
                Ok::<(), Error>(())
            })
        })?;

        // Mute and solo masks live in the persisted configuration image.
        if shared.sw_cfg.is_some() {
            (0..info.mixer_output_count()).try_for_each(|mix| {
                let name = mute_elem_name(mix);
                let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
                let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, count, true)?;
                self.mute_elem_ids.push(elem_id_list.remove(0));

                let name = solo_elem_name(mix);
                let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
                let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, count, true)?;
                self.solo_elem_ids.push(elem_id_list.remove(0));
                Ok::<(), Error>(())
            })?;
        }

        if info.has_talkback {
            (0..info.mixer_output_count()).try_for_each(|mix| {
                let name = talkback_elem_name(mix);
                let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
                let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
                self.talkback_elem_ids.push(elem_id_list.remove(0));
                Ok::<(), Error>(())
            })?;
        }

        Ok(())
    }

    pub fn read(
        &mut self,
        shared: &ModelShared,
        elem_id: &ElemId,
        elem_value: &mut ElemValue,
    ) -> Result<bool, Error> {
        let count = shared.info.mixer_input_count();

        if let Some(i) = self.gain_elem_ids.iter().position(|e| e.eq(elem_id)) {
            elem_value.set_int(&[self.gains[i] as i32]);
            Ok(true)
        } else if let Some(mix) = self.mute_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let mask = shared
                .sw_cfg
                .as_ref()
                .map(|cfg| cfg.mixer_mute(mix))
                .unwrap_or(0);
            let states: Vec<bool> = (0..count).map(|i| mask & (1 << i) > 0).collect();
            elem_value.set_bool(&states);
            Ok(true)
        } else if let Some(mix) = self.solo_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let mask = shared
                .sw_cfg
                .as_ref()
                .map(|cfg| cfg.mixer_solo(mix))
                .unwrap_or(0);
            let states: Vec<bool> = (0..count).map(|i| mask & (1 << i) > 0).collect();
            elem_value.set_bool(&states);
            Ok(true)
        } else if let Some(mix) = self.talkback_elem_ids.iter().position(|e| e.eq(elem_id)) {
            elem_value.set_bool(&[self.talkback_map & (1 << mix) > 0]);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn write<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        shared: &mut ModelShared,
        elem_id: &ElemId,
        elem_value: &ElemValue,
    ) -> Result<bool, Error> {
        let count = shared.info.mixer_input_count();

        if let Some(i) = self.gain_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.int()[0].max(0).min(MIXER_GAIN_MAX as i32) as u8;
            if self.gains[i] == val {
                return Ok(false);
            }

            let (mix, input) = (i / count, i % count);
            self.gains[i] = val;
            self.emit_row(conn, shared, mix)?;

            if let Some(cfg) = shared.sw_cfg.as_mut() {
                cfg.set_mixer_gain(mix, input, val);
            }
            shared.flush_sw_cfg(conn)?;

            Ok(true)
        } else if let Some(mix) = self.mute_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let mask = elem_value.boolean()[..count]
                .iter()
                .enumerate()
                .filter(|(_, &state)| state)
                .fold(0u32, |mask, (i, _)| mask | (1 << i));

            let changed = shared
                .sw_cfg
                .as_mut()
                .map(|cfg| {
                    if cfg.mixer_mute(mix) != mask {
                        cfg.set_mixer_mute(mix, mask);
                        true
                    } else {
                        false
                    }
                })
                .unwrap_or(false);
            if !changed {
                return Ok(false);
            }

            self.emit_row(conn, shared, mix)?;
            shared.flush_sw_cfg(conn)?;

            Ok(true)
        } else if let Some(mix) = self.solo_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let mask = elem_value.boolean()[..count]
                .iter()
                .enumerate()
                .filter(|(_, &state)| state)
                .fold(0u32, |mask, (i, _)| mask | (1 << i));

            let changed = shared
                .sw_cfg
                .as_mut()
                .map(|cfg| {
                    if cfg.mixer_solo(mix) != mask {
                        cfg.set_mixer_solo(mix, mask);
                        true
                    } else {
                        false
                    }
                })
                .unwrap_or(false);
            if !changed {
                return Ok(false);
            }

            self.emit_row(conn, shared, mix)?;
            shared.flush_sw_cfg(conn)?;

            Ok(true)
        } else if let Some(mix) = self.talkback_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let bit = 1u32 << mix;
            let state = elem_value.boolean()[0];
            let map = if state {
                self.talkback_map | bit
            } else {
                self.talkback_map & !bit
            };
            if map == self.talkback_map {
                return Ok(false);
            }

            self.talkback_map = map;
            shared.set_config(conn, ConfigItem::TalkbackMap, 0, map as i32)?;

            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn solo_overrides_mutes() {
        let mutes = effective_mutes(0b0001, 0, 4);
        assert_eq!(mutes, vec![true, false, false, false]);

        let mutes = effective_mutes(0b0001, 0b0010, 4);
        assert_eq!(mutes, vec![true, false, true, true]);

        // A soloed input muted at the same time stays silent.
        let mutes = effective_mutes(0b0010, 0b0010, 4);
        assert_eq!(mutes, vec![true, true, true, true]);
    }
}
