// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Control elements for hardware status and the remaining switches; sampling clock
//! lock, level meters, speaker switching, direct monitor, and mass-storage mode.

use super::*;

const SYNC_NAME: &str = "Sync Status";
const METER_NAME: &str = "Level Meter";
const SPEAKER_NAME: &str = "Speaker Switching Playback Enum";
const DIRECT_MONITOR_SWITCH_NAME: &str = "Direct Monitor Playback Switch";
const DIRECT_MONITOR_ENUM_NAME: &str = "Direct Monitor Playback Enum";
const MSD_NAME: &str = "MSD Mode Switch";

const SYNC_LABELS: [&str; 2] = ["Unlocked", "Locked"];
const SPEAKER_LABELS: [&str; 3] = ["Off", "Main", "Alt"];
const DIRECT_MONITOR_LABELS: [&str; 3] = ["Off", "Mono", "Stereo"];

const METER_LEVEL_MAX: i32 = 4095;

#[derive(Default, Debug)]
pub struct StatusCtl {
    pub notified_elem_id_list: Vec<ElemId>,
    pub sync_updated: bool,
    pub speaker_updated: bool,
    direct_monitor_updated: bool,

    sync_elem_id: Option<ElemId>,
    meter_elem_id: Option<ElemId>,
    speaker_elem_id: Option<ElemId>,
    direct_monitor_elem_id: Option<ElemId>,
    msd_elem_id: Option<ElemId>,

    sync: bool,
    /// 0 = off, 1 = main, 2 = alt.
    speaker_switching: u32,
    direct_monitor: u32,
    msd: bool,
}

impl StatusCtl {
    fn cache_speaker_switching<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        let mut enabled = [0u8; 1];
        read_config(
            conn,
            info.config_set,
            ConfigItem::SpeakerSwitchingEnable,
            &mut enabled,
            TIMEOUT_MS,
        )?;

        let mut selection = [0u8; 1];
        read_config(
            conn,
            info.config_set,
            ConfigItem::SpeakerSwitching,
            &mut selection,
            TIMEOUT_MS,
        )?;

        self.speaker_switching = if enabled[0] == 0 {
            0
        } else {
            1 + (selection[0] > 0) as u32
        };

        Ok(())
    }

    pub fn cache<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        self.sync = read_sync_status(conn, TIMEOUT_MS)?;
        self.sync_updated = false;

        if info.has_speaker_switching {
            self.cache_speaker_switching(conn, info)?;
        }

        if info.direct_monitor > 0 {
            let mut raw = [0u8; 1];
            read_config(
                conn,
                info.config_set,
                ConfigItem::DirectMonitor,
                &mut raw,
                TIMEOUT_MS,
            )?;
            self.direct_monitor = (raw[0] as u32).min(info.direct_monitor as u32);
        }

        if info.has_msd_mode {
            let mut raw = [0u8; 1];
            read_config(conn, info.config_set, ConfigItem::MsdSwitch, &mut raw, TIMEOUT_MS)?;
            self.msd = raw[0] > 0;
        }

        self.speaker_updated = false;
        self.direct_monitor_updated = false;

        Ok(())
    }

    pub fn load(
        &mut self,
        card_cntr: &mut CardCntr,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, SYNC_NAME, 0);
        let mut elem_id_list = card_cntr.add_enum_elems(&elem_id, 1, 1, &SYNC_LABELS, false)?;
        let elem_id = elem_id_list.remove(0);
        card_cntr.set_elem_writable(&elem_id, false);
        self.notified_elem_id_list.push(elem_id.clone());
        self.sync_elem_id = Some(elem_id);

        if info.meter_count() > 0 {
            let elem_id = ElemId::new_by_name(ElemIfaceType::Pcm, 0, 0, METER_NAME, 0);
            let mut elem_id_list = card_cntr.add_int_elems(
                &elem_id,
                1,
                0,
                METER_LEVEL_MAX,
                1,
                info.meter_count(),
                None,
                false,
            )?;
            let elem_id = elem_id_list.remove(0);
            card_cntr.set_elem_writable(&elem_id, false);
            self.meter_elem_id = Some(elem_id);
        }

        if info.has_speaker_switching {
            let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, SPEAKER_NAME, 0);
            let mut elem_id_list =
                card_cntr.add_enum_elems(&elem_id, 1, 1, &SPEAKER_LABELS, true)?;
            let elem_id = elem_id_list.remove(0);
            self.notified_elem_id_list.push(elem_id.clone());
            self.speaker_elem_id = Some(elem_id);
        }

        if info.direct_monitor == 1 {
            let elem_id =
                ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, DIRECT_MONITOR_SWITCH_NAME, 0);
            let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
            let elem_id = elem_id_list.remove(0);
            self.notified_elem_id_list.push(elem_id.clone());
            self.direct_monitor_elem_id = Some(elem_id);
        } else if info.direct_monitor == 2 {
            let elem_id =
                ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, DIRECT_MONITOR_ENUM_NAME, 0);
            let mut elem_id_list =
                card_cntr.add_enum_elems(&elem_id, 1, 1, &DIRECT_MONITOR_LABELS, true)?;
            let elem_id = elem_id_list.remove(0);
            self.notified_elem_id_list.push(elem_id.clone());
            self.direct_monitor_elem_id = Some(elem_id);
        }

        if info.has_msd_mode {
            let elem_id = ElemId::new_by_name(ElemIfaceType::Card, 0, 0, MSD_NAME, 0);
            let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
            self.msd_elem_id = Some(elem_id_list.remove(0));
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
        if self.sync_elem_id.as_ref() == Some(elem_id) {
            if self.sync_updated {
                self.sync = read_sync_status(conn, TIMEOUT_MS)?;
                self.sync_updated = false;
            }
            elem_value.set_enum(&[self.sync as u32]);
            Ok(true)
        } else if self.meter_elem_id.as_ref() == Some(elem_id) {
            let levels = read_meter_levels(conn, info.meter_count(), TIMEOUT_MS)?;
            let vals: Vec<i32> = levels
                .iter()
                .map(|&level| (level as i32).min(METER_LEVEL_MAX))
                .collect();
            elem_value.set_int(&vals);
            Ok(true)
        } else if self.speaker_elem_id.as_ref() == Some(elem_id) {
            if self.speaker_updated {
                self.cache_speaker_switching(conn, info)?;
                self.speaker_updated = false;
            }
            elem_value.set_enum(&[self.speaker_switching]);
            Ok(true)
        } else if self.direct_monitor_elem_id.as_ref() == Some(elem_id) {
            if self.direct_monitor_updated {
                let mut raw = [0u8; 1];
                read_config(
                    conn,
                    info.config_set,
                    ConfigItem::DirectMonitor,
                    &mut raw,
                    TIMEOUT_MS,
                )?;
                self.direct_monitor = (raw[0] as u32).min(info.direct_monitor as u32);
                self.direct_monitor_updated = false;
            }
            if info.direct_monitor == 1 {
                elem_value.set_bool(&[self.direct_monitor > 0]);
            } else {
                elem_value.set_enum(&[self.direct_monitor]);
            }
            Ok(true)
        } else if self.msd_elem_id.as_ref() == Some(elem_id) {
            elem_value.set_bool(&[self.msd]);
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
        if self.speaker_elem_id.as_ref() == Some(elem_id) {
            let val = elem_value.enumerated()[0].min(2);
            if self.speaker_switching == val {
                return Ok(false);
            }

            self.speaker_switching = val;
            shared.set_config(
                conn,
                ConfigItem::SpeakerSwitchingEnable,
                0,
                (val > 0) as i32,
            )?;
            if val > 0 {
                shared.set_config(conn, ConfigItem::SpeakerSwitching, 0, (val - 1) as i32)?;
            }

            Ok(true)
        } else if self.direct_monitor_elem_id.as_ref() == Some(elem_id) {
            let val = if shared.info.direct_monitor == 1 {
                elem_value.boolean()[0] as u32
            } else {
                elem_value.enumerated()[0].min(2)
            };
            if self.direct_monitor == val {
                return Ok(false);
            }

            self.direct_monitor = val;
            shared.set_config(conn, ConfigItem::DirectMonitor, 0, val as i32)?;

            Ok(true)
        } else if self.msd_elem_id.as_ref() == Some(elem_id) {
            let val = elem_value.boolean()[0];
            if self.msd == val {
                return Ok(false);
            }

            self.msd = val;
            shared.set_config(conn, ConfigItem::MsdSwitch, 0, val as i32)?;

            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Mark status behind the elements as stale and return the elements to refresh.
    pub fn parse_notification(&mut self, msg: u32) -> Vec<ElemId> {
        let mut elem_id_list = Vec::new();

        if msg & NOTIFY_SYNC > 0 {
            self.sync_updated = true;
            elem_id_list.extend(self.sync_elem_id.iter().cloned());
        }

        if msg & NOTIFY_MONITOR_OTHER > 0 {
            self.speaker_updated = true;
            self.direct_monitor_updated = true;
            elem_id_list.extend(self.speaker_elem_id.iter().cloned());
            elem_id_list.extend(self.direct_monitor_elem_id.iter().cloned());
        }

        elem_id_list
    }
}
