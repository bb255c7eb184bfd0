// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Control elements for analogue outputs; per-output volume, mute, and the selector
//! between software and hardware volume control, plus the dim/mute buttons and the
//! read-only expression of the master knob.

use {super::*, alsa_ctl_tlv_codec::DbInterval};

const MASTER_VOL_NAME: &str = "Master HW Playback Volume";

const DIM_MUTE_NAMES: [&str; DIM_MUTE_COUNT] = ["Mute", "Dim"];
const BUTTON_MUTE: usize = 0;

fn vol_elem_name(index: usize, descr: Option<&str>) -> String {
    match descr {
        Some(descr) => format!("Line {:02} ({}) Playback Volume", index + 1, descr),
        None => format!("Line {:02} Playback Volume", index + 1),
    }
}

fn mute_elem_name(index: usize) -> String {
    format!("Line {:02} Mute Playback Switch", index + 1)
}

fn sw_hw_elem_name(index: usize) -> String {
    format!("Line Out {:02} Volume Control Playback Enum", index + 1)
}

#[derive(Default, Debug)]
pub struct MonitorCtl {
    pub notified_elem_id_list: Vec<ElemId>,
    pub changed_elem_id_list: Vec<ElemId>,
    pub pending_access_list: Vec<(ElemId, bool)>,
    pub vol_updated: bool,

    pub(crate) master_vol_elem_id: Option<ElemId>,
    pub(crate) vol_elem_ids: Vec<ElemId>,
    pub(crate) mute_elem_ids: Vec<ElemId>,
    pub(crate) sw_hw_elem_ids: Vec<ElemId>,
    pub(crate) dim_mute_elem_ids: Vec<ElemId>,

    pub(crate) master_vol: i32,
    pub(crate) vols: Vec<i32>,
    pub(crate) mutes: Vec<bool>,
    pub(crate) sw_hw: Vec<bool>,
    pub(crate) dim_mute: [bool; DIM_MUTE_COUNT],
}

fn biased_volume(level: i16) -> i32 {
    (level as i32 + VOLUME_BIAS).max(0).min(VOLUME_BIAS)
}

impl MonitorCtl {
    const VOL_TLV: DbInterval = DbInterval {
        min: -100 * VOLUME_BIAS,
        max: 0,
        linear: false,
        mute_avail: false,
    };

    pub fn cache<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        let count = info.line_out_count();

        let mut status = VolumeStatus::default();
        cache_volume_status(conn, &mut status, TIMEOUT_MS)?;

        self.master_vol = biased_volume(status.master_vol);

        if info.line_out_hw_vol {
            self.dim_mute = status.dim_mute;
        }

        self.vols = (0..count)
            .map(|i| {
                if info.line_out_hw_vol && status.sw_hw_switches[i] {
                    self.master_vol
                } else {
                    biased_volume(status.sw_vols[i])
                }
            })
            .collect();
        self.sw_hw = (0..count)
            .map(|i| info.line_out_hw_vol && status.sw_hw_switches[i])
            .collect();
        self.mutes = (0..count)
            .map(|i| {
                if self.sw_hw[i] {
                    self.dim_mute[BUTTON_MUTE]
                } else {
                    status.mutes[i]
                }
            })
            .collect();

        self.vol_updated = false;

        debug!(master_vol = self.master_vol, vols = ?self.vols, sw_hw = ?self.sw_hw);

        Ok(())
    }

    pub fn load(
        &mut self,
        card_cntr: &mut CardCntr,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        let tlv = Vec::<u32>::from(&Self::VOL_TLV);

        if info.line_out_hw_vol {
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, MASTER_VOL_NAME, 0);
            let mut elem_id_list =
                card_cntr.add_int_elems(&elem_id, 1, 0, VOLUME_BIAS, 1, 1, Some(&tlv), true)?;
            let elem_id = elem_id_list.remove(0);
            card_cntr.set_elem_writable(&elem_id, false);
            self.notified_elem_id_list.push(elem_id.clone());
            self.master_vol_elem_id = Some(elem_id);
        }

        (0..info.line_out_count()).try_for_each(|i| {
            let descr = info.line_out_descrs.get(i).copied().flatten();
            let name = vol_elem_name(i, descr);
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
            let mut elem_id_list =
                card_cntr.add_int_elems(&elem_id, 1, 0, VOLUME_BIAS, 1, 1, Some(&tlv), true)?;
            self.vol_elem_ids.push(elem_id_list.remove(0));

            let name = mute_elem_name(i);
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
            let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
            self.mute_elem_ids.push(elem_id_list.remove(0));

            // Outputs following the hardware master knob stay read-only.
            if self.sw_hw[i] {
                card_cntr.set_elem_writable(&self.vol_elem_ids[i], false);
                card_cntr.set_elem_writable(&self.mute_elem_ids[i], false);
            }

            if info.line_out_hw_vol {
                let name = sw_hw_elem_name(i);
                let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
                let mut elem_id_list =
                    card_cntr.add_enum_elems(&elem_id, 1, 1, &["SW", "HW"], true)?;
                self.sw_hw_elem_ids.push(elem_id_list.remove(0));
            }

            Ok(())
        })?;

        if info.line_out_hw_vol {
            DIM_MUTE_NAMES.iter().try_for_each(|&name| {
                let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, name, 0);
                let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
                self.dim_mute_elem_ids.push(elem_id_list.remove(0));
                Ok(())
            })?;
        }

        self.notified_elem_id_list
            .extend(self.vol_elem_ids.iter().cloned());
        self.notified_elem_id_list
            .extend(self.mute_elem_ids.iter().cloned());
        self.notified_elem_id_list
            .extend(self.dim_mute_elem_ids.iter().cloned());

        Ok(())
    }

    fn update_volumes<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        let mut status = VolumeStatus::default();
        cache_volume_status(conn, &mut status, TIMEOUT_MS)?;
        self.vol_updated = false;

        self.master_vol = biased_volume(status.master_vol);

        if info.line_out_hw_vol {
            self.dim_mute = status.dim_mute;
        }

        let mute = self.dim_mute[BUTTON_MUTE];
        (0..self.vols.len()).for_each(|i| {
            if self.sw_hw[i] {
                self.vols[i] = self.master_vol;
                self.mutes[i] = mute;
            }
        });

        Ok(())
    }

    pub fn read<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
        elem_id: &ElemId,
        elem_value: &mut ElemValue,
    ) -> Result<bool, Error> {
        if self.master_vol_elem_id.as_ref() == Some(elem_id) {
            if self.vol_updated {
                self.update_volumes(conn, info)?;
            }
            elem_value.set_int(&[self.master_vol]);
            Ok(true)
        } else if let Some(i) = self.vol_elem_ids.iter().position(|e| e.eq(elem_id)) {
            if self.vol_updated {
                self.update_volumes(conn, info)?;
            }
            elem_value.set_int(&[self.vols[i]]);
            Ok(true)
        } else if let Some(i) = self.mute_elem_ids.iter().position(|e| e.eq(elem_id)) {
            elem_value.set_bool(&[self.mutes[i]]);
            Ok(true)
        } else if let Some(i) = self.sw_hw_elem_ids.iter().position(|e| e.eq(elem_id)) {
            elem_value.set_enum(&[self.sw_hw[i] as u32]);
            Ok(true)
        } else if let Some(i) = self.dim_mute_elem_ids.iter().position(|e| e.eq(elem_id)) {
            if self.vol_updated {
                self.update_volumes(conn, info)?;
            }
            elem_value.set_bool(&[self.dim_mute[i]]);
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
        if let Some(i) = self.vol_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.int()[0].max(0).min(VOLUME_BIAS);
            if self.vols[i] == val {
                return Ok(false);
            }

            self.vols[i] = val;
            shared.set_config(conn, ConfigItem::LineOutVolume, i, val - VOLUME_BIAS)?;

            // The persisted volume follows the software setting only.
            if !self.sw_hw[i] {
                if let Some(cfg) = shared.sw_cfg.as_mut() {
                    cfg.set_volume(i, (val - VOLUME_BIAS) as i16);
                }
                shared.flush_sw_cfg(conn)?;
            }

            Ok(true)
        } else if let Some(i) = self.mute_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.boolean()[0];
            if self.mutes[i] == val {
                return Ok(false);
            }

            self.mutes[i] = val;
            shared.set_config(conn, ConfigItem::MuteSwitch, i, val as i32)?;

            if !self.sw_hw[i] {
                if let Some(cfg) = shared.sw_cfg.as_mut() {
                    let mask = cfg.mute_sw();
                    let bit = 1u32 << i;
                    cfg.set_mute_sw(if val { mask | bit } else { mask & !bit });
                }
                shared.flush_sw_cfg(conn)?;
            }

            Ok(true)
        } else if let Some(i) = self.sw_hw_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.enumerated()[0] > 0;
            if self.sw_hw[i] == val {
                return Ok(false);
            }

            self.sw_hw[i] = val;

            // The fader and mute of the output are operable by the host while under
            // software control only.
            self.pending_access_list.push((self.vol_elem_ids[i].clone(), !val));
            self.pending_access_list.push((self.mute_elem_ids[i].clone(), !val));

            if val {
                // The live volume and mute follow the master at hand-over to the knob.
                self.vols[i] = self.master_vol;
                self.mutes[i] = self.dim_mute[BUTTON_MUTE];
            } else {
                let persisted = shared
                    .sw_cfg
                    .as_ref()
                    .and_then(|cfg| cfg.volume(i))
                    .map(biased_volume);
                if let Some(vol) = persisted {
                    self.vols[i] = vol;
                }
            }

            shared.set_config(
                conn,
                ConfigItem::LineOutVolume,
                i,
                self.vols[i] - VOLUME_BIAS,
            )?;
            shared.set_config(conn, ConfigItem::MuteSwitch, i, self.mutes[i] as i32)?;
            shared.set_config(conn, ConfigItem::SwHwSwitch, i, val as i32)?;

            self.changed_elem_id_list.push(self.vol_elem_ids[i].clone());
            self.changed_elem_id_list.push(self.mute_elem_ids[i].clone());

            Ok(true)
        } else if let Some(i) = self.dim_mute_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.boolean()[0];
            if self.dim_mute[i] == val {
                return Ok(false);
            }

            self.dim_mute[i] = val;
            shared.set_config(conn, ConfigItem::DimMute, i, val as i32)?;

            if i == BUTTON_MUTE {
                (0..self.mutes.len()).for_each(|j| {
                    if self.sw_hw[j] {
                        self.mutes[j] = val;
                        self.changed_elem_id_list.push(self.mute_elem_ids[j].clone());
                    }
                });
            }

            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Mark state behind the monitor elements as stale and return the elements to
    /// refresh.
    pub fn parse_notification(&mut self, msg: u32) -> &[ElemId] {
        if msg & (NOTIFY_MONITOR | NOTIFY_DIM_MUTE | NOTIFY_MONITOR_OTHER) > 0 {
            self.vol_updated = true;
            &self.notified_elem_id_list
        } else {
            &[]
        }
    }
}
