// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Control elements for conditioning of analogue inputs; line/instrument level, pad,
//! Air, phantom power and its persistence, and the color of gain halos.

use super::*;

const LEVEL_LABELS: [&str; 2] = ["Line", "Inst"];

const HALO_COLOR_LABELS: [&str; 8] = [
    "Off",
    "Red",
    "Green",
    "Amber",
    "Blue",
    "Pink",
    "Light Blue",
    "Light Pink",
];

const PERSISTENCE_NAME: &str = "48V Persistence Capture Switch";

fn level_elem_name(index: usize) -> String {
    format!("Line In {} Level Capture Enum", index + 1)
}

fn pad_elem_name(index: usize) -> String {
    format!("Line In {} Pad Capture Switch", index + 1)
}

fn air_elem_name(index: usize) -> String {
    format!("Line In {} Air Capture Switch", index + 1)
}

fn phantom_elem_name(group: usize, inputs_per_group: usize) -> String {
    let first = group * inputs_per_group + 1;
    let last = (group + 1) * inputs_per_group;
    if first == last {
        format!("Line In {} 48V Capture Switch", first)
    } else {
        format!("Line In {}-{} 48V Capture Switch", first, last)
    }
}

fn halo_elem_name(index: usize) -> String {
    format!("Line In {} Gain Halo Capture Enum", index + 1)
}

#[derive(Default, Debug)]
pub struct InputCtl {
    pub notified_elem_id_list: Vec<ElemId>,
    pub line_ctl_updated: bool,

    level_elem_ids: Vec<ElemId>,
    pad_elem_ids: Vec<ElemId>,
    air_elem_ids: Vec<ElemId>,
    phantom_elem_ids: Vec<ElemId>,
    persistence_elem_id: Option<ElemId>,
    halo_elem_ids: Vec<ElemId>,

    levels: Vec<u32>,
    pads: Vec<bool>,
    airs: Vec<bool>,
    phantoms: Vec<bool>,
    persistence: bool,
    halos: Vec<u32>,
}

fn read_switches<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    set: ConfigSet,
    item: ConfigItem,
    count: usize,
) -> Result<Vec<bool>, Error> {
    let mut raw = vec![0u8; count];
    read_config(conn, set, item, &mut raw, TIMEOUT_MS)?;
    Ok(raw.iter().map(|&b| b > 0).collect())
}

impl InputCtl {
    pub fn cache<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        let set = info.config_set;

        if info.level_input_count > 0 {
            let mut raw = vec![0u8; info.level_input_count as usize];
            read_config(conn, set, ConfigItem::LevelSwitch, &mut raw, TIMEOUT_MS)?;
            self.levels = raw.iter().map(|&b| (b > 0) as u32).collect();
        }

        if info.pad_input_count > 0 {
            self.pads = read_switches(
                conn,
                set,
                ConfigItem::PadSwitch,
                info.pad_input_count as usize,
            )?;
        }

        if info.air_input_count > 0 {
            self.airs = read_switches(
                conn,
                set,
                ConfigItem::AirSwitch,
                info.air_input_count as usize,
            )?;
        }

        if info.phantom_count > 0 {
            self.phantoms = read_switches(
                conn,
                set,
                ConfigItem::PhantomSwitch,
                info.phantom_count as usize,
            )?;

            let mut raw = [0u8; 1];
            read_config(
                conn,
                set,
                ConfigItem::PhantomPersistence,
                &mut raw,
                TIMEOUT_MS,
            )?;
            self.persistence = raw[0] > 0;
        }

        if info.gain_halo_count > 0 {
            let mut raw = vec![0u8; info.gain_halo_count as usize];
            read_config(conn, set, ConfigItem::GainHaloColor, &mut raw, TIMEOUT_MS)?;
            self.halos = raw
                .iter()
                .map(|&b| (b as u32).min(HALO_COLOR_LABELS.len() as u32 - 1))
                .collect();
        }

        self.line_ctl_updated = false;

        Ok(())
    }

    pub fn load(
        &mut self,
        card_cntr: &mut CardCntr,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        (0..info.level_input_count as usize).try_for_each(|i| {
            let name = level_elem_name(i + info.level_input_first as usize);
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
            let mut elem_id_list = card_cntr.add_enum_elems(&elem_id, 1, 1, &LEVEL_LABELS, true)?;
            self.level_elem_ids.push(elem_id_list.remove(0));
            Ok(())
        })?;

        (0..info.pad_input_count as usize).try_for_each(|i| {
            let name = pad_elem_name(i);
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
            let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
            self.pad_elem_ids.push(elem_id_list.remove(0));
            Ok(())
        })?;

        (0..info.air_input_count as usize).try_for_each(|i| {
            let name = air_elem_name(i);
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
            let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
            self.air_elem_ids.push(elem_id_list.remove(0));
            Ok(())
        })?;

        (0..info.phantom_count as usize).try_for_each(|i| {
            let name = phantom_elem_name(i, info.inputs_per_phantom as usize);
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
            let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
            self.phantom_elem_ids.push(elem_id_list.remove(0));
            Ok(())
        })?;

        if info.phantom_count > 0 {
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, PERSISTENCE_NAME, 0);
            let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
            self.persistence_elem_id = Some(elem_id_list.remove(0));
        }

        (0..info.gain_halo_count as usize).try_for_each(|i| {
            let name = halo_elem_name(i);
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
            let mut elem_id_list =
                card_cntr.add_enum_elems(&elem_id, 1, 1, &HALO_COLOR_LABELS, true)?;
            self.halo_elem_ids.push(elem_id_list.remove(0));
            Ok(())
        })?;

        self.notified_elem_id_list
            .extend(self.level_elem_ids.iter().cloned());
        self.notified_elem_id_list
            .extend(self.pad_elem_ids.iter().cloned());
        self.notified_elem_id_list
            .extend(self.air_elem_ids.iter().cloned());
        self.notified_elem_id_list
            .extend(self.phantom_elem_ids.iter().cloned());

        Ok(())
    }

    fn maybe_update<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        if self.line_ctl_updated {
            self.cache(conn, info)?;
        }
        Ok(())
    }

    pub fn read<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
        elem_id: &ElemId,
        elem_value: &mut ElemValue,
    ) -> Result<bool, Error> {
        if let Some(i) = self.level_elem_ids.iter().position(|e| e.eq(elem_id)) {
            self.maybe_update(conn, info)?;
            elem_value.set_enum(&[self.levels[i]]);
            Ok(true)
        } else if let Some(i) = self.pad_elem_ids.iter().position(|e| e.eq(elem_id)) {
            self.maybe_update(conn, info)?;
            elem_value.set_bool(&[self.pads[i]]);
            Ok(true)
        } else if let Some(i) = self.air_elem_ids.iter().position(|e| e.eq(elem_id)) {
            self.maybe_update(conn, info)?;
            elem_value.set_bool(&[self.airs[i]]);
            Ok(true)
        } else if let Some(i) = self.phantom_elem_ids.iter().position(|e| e.eq(elem_id)) {
            self.maybe_update(conn, info)?;
            elem_value.set_bool(&[self.phantoms[i]]);
            Ok(true)
        } else if self.persistence_elem_id.as_ref() == Some(elem_id) {
            elem_value.set_bool(&[self.persistence]);
            Ok(true)
        } else if let Some(i) = self.halo_elem_ids.iter().position(|e| e.eq(elem_id)) {
            elem_value.set_enum(&[self.halos[i]]);
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
        if let Some(i) = self.level_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.enumerated()[0].min(1);
            if self.levels[i] == val {
                return Ok(false);
            }
            self.levels[i] = val;
            shared.set_config(conn, ConfigItem::LevelSwitch, i, val as i32)?;
            Ok(true)
        } else if let Some(i) = self.pad_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.boolean()[0];
            if self.pads[i] == val {
                return Ok(false);
            }
            self.pads[i] = val;
            shared.set_config(conn, ConfigItem::PadSwitch, i, val as i32)?;
            Ok(true)
        } else if let Some(i) = self.air_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.boolean()[0];
            if self.airs[i] == val {
                return Ok(false);
            }
            self.airs[i] = val;
            shared.set_config(conn, ConfigItem::AirSwitch, i, val as i32)?;
            Ok(true)
        } else if let Some(i) = self.phantom_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.boolean()[0];
            if self.phantoms[i] == val {
                return Ok(false);
            }
            self.phantoms[i] = val;
            shared.set_config(conn, ConfigItem::PhantomSwitch, i, val as i32)?;
            Ok(true)
        } else if self.persistence_elem_id.as_ref() == Some(elem_id) {
            let val = elem_value.boolean()[0];
            if self.persistence == val {
                return Ok(false);
            }
            self.persistence = val;
            shared.set_config(conn, ConfigItem::PhantomPersistence, 0, val as i32)?;
            Ok(true)
        } else if let Some(i) = self.halo_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.enumerated()[0].min(HALO_COLOR_LABELS.len() as u32 - 1);
            if self.halos[i] == val {
                return Ok(false);
            }
            self.halos[i] = val;
            shared.set_config(conn, ConfigItem::GainHaloColor, i, val as i32)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Mark conditioning state as stale and return the elements to refresh.
    pub fn parse_notification(&mut self, msg: u32) -> &[ElemId] {
        if msg & NOTIFY_INPUT_OTHER > 0 {
            self.line_ctl_updated = true;
            &self.notified_elem_id_list
        } else {
            &[]
        }
    }
}
