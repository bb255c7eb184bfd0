// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Aggregation of the control areas of one unit into a single model, with the state
//! shared between them; the model description, the mirror of the persisted
//! configuration image, and the request for a delayed NVRAM save.

use super::*;

pub struct ModelShared {
    pub info: &'static ScarlettDeviceInfo,
    pub sw_cfg: Option<SwConfig>,
    /// Raised when an edit should be persisted to NVRAM; drained by the runtime to arm
    /// the delayed save.
    pub config_touched: bool,
}

impl ModelShared {
    /// Write one configuration item, promote it to live state, and request a delayed
    /// NVRAM save.
    pub fn set_config<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        item: ConfigItem,
        index: usize,
        value: i32,
    ) -> Result<(), Error> {
        write_config(conn, self.info.config_set, item, index, value, TIMEOUT_MS)?;
        self.config_touched = true;
        Ok(())
    }

    /// Upload dirtied bytes of the configuration image, when the mirror is usable.
    pub fn flush_sw_cfg<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
    ) -> Result<(), Error> {
        if let Some(cfg) = self.sw_cfg.as_mut() {
            flush_sw_config(conn, cfg, TIMEOUT_MS)?;
            self.config_touched = true;
        }
        Ok(())
    }
}

pub struct ScarlettModel {
    pub shared: ModelShared,
    pub monitor: MonitorCtl,
    pub input: InputCtl,
    pub mixer: MixerCtl,
    pub mux: MuxCtl,
    pub status: StatusCtl,
}

impl ScarlettModel {
    pub fn new(info: &'static ScarlettDeviceInfo) -> Self {
        Self {
            shared: ModelShared {
                info,
                sw_cfg: None,
                config_touched: false,
            },
            monitor: Default::default(),
            input: Default::default(),
            mixer: Default::default(),
            mux: Default::default(),
            status: Default::default(),
        }
    }

    pub fn cache_state<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
    ) -> Result<(), Error> {
        let info = self.shared.info;

        if info.mux_dst_count() > 0 {
            self.shared.sw_cfg = match load_sw_config(conn, TIMEOUT_MS) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    if e.kind::<ScarlettProtocolError>()
                        == Some(ScarlettProtocolError::Integrity)
                    {
                        warn!("configuration image unusable, continuing without it: {}", e);
                        None
                    } else {
                        Err(e)?
                    }
                }
            };
        }

        self.input.cache(conn, info)?;
        self.status.cache(conn, info)?;

        if info.line_out_count() > 0 {
            self.monitor.cache(conn, info)?;
        }

        self.mixer.cache(conn, info)?;
        self.mux.cache(conn, info)?;

        Ok(())
    }

    pub fn load_elems(&mut self, card_cntr: &mut CardCntr) -> Result<(), Error> {
        let info = self.shared.info;

        self.monitor.load(card_cntr, info)?;
        self.input.load(card_cntr, info)?;
        self.mux.load(card_cntr, &self.shared)?;
        self.mixer.load(card_cntr, &self.shared)?;
        self.status.load(card_cntr, info)?;

        Ok(())
    }

    pub fn read_elem<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        elem_id: &ElemId,
        elem_value: &mut ElemValue,
    ) -> Result<bool, Error> {
        let info = self.shared.info;

        if self.monitor.read(conn, info, elem_id, elem_value)? {
            Ok(true)
        } else if self.input.read(conn, info, elem_id, elem_value)? {
            Ok(true)
        } else if self.mixer.read(&self.shared, elem_id, elem_value)? {
            Ok(true)
        } else if self.mux.read(&self.shared, elem_id, elem_value)? {
            Ok(true)
        } else if self.status.read(conn, info, elem_id, elem_value)? {
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn write_elem<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        elem_id: &ElemId,
        elem_value: &ElemValue,
    ) -> Result<bool, Error> {
        if self
            .monitor
            .write(conn, &mut self.shared, elem_id, elem_value)?
        {
            Ok(true)
        } else if self
            .input
            .write(conn, &mut self.shared, elem_id, elem_value)?
        {
            Ok(true)
        } else if self
            .mixer
            .write(conn, &mut self.shared, elem_id, elem_value)?
        {
            Ok(true)
        } else if self
            .mux
            .write(conn, &mut self.shared, elem_id, elem_value)?
        {
            Ok(true)
        } else if self
            .status
            .write(conn, &mut self.shared, elem_id, elem_value)?
        {
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Mark state behind the notified bits as stale and return the elements whose
    /// values should be re-read and propagated. No USB traffic happens here.
    pub fn parse_notification(&mut self, msg: u32) -> Vec<ElemId> {
        let mut elem_id_list = Vec::new();

        // The acknowledge bit alone reports no state change.
        let msg = msg & !NOTIFY_ACK;
        if msg == 0 {
            return elem_id_list;
        }

        elem_id_list.extend(self.monitor.parse_notification(msg).iter().cloned());
        elem_id_list.extend(self.input.parse_notification(msg).iter().cloned());
        elem_id_list.extend(self.status.parse_notification(msg));

        elem_id_list
    }

    /// Elements whose write access changed with the last operation.
    pub fn take_access_changes(&mut self) -> Vec<(ElemId, bool)> {
        self.monitor.pending_access_list.drain(..).collect()
    }

    /// Elements whose values changed as side effects of the last operation.
    pub fn take_changed_elems(&mut self) -> Vec<ElemId> {
        let mut elem_id_list: Vec<ElemId> =
            self.monitor.changed_elem_id_list.drain(..).collect();
        elem_id_list.extend(self.mux.changed_elem_id_list.drain(..));
        elem_id_list
    }

    /// Whether an edit since the last call should be persisted to NVRAM.
    pub fn take_config_touched(&mut self) -> bool {
        let touched = self.shared.config_touched;
        self.shared.config_touched = false;
        touched
    }
}

impl CtlModel<ScarlettTransaction<ScarlettUsbDevice>> for ScarlettModel {
    fn cache(&mut self, unit: &mut ScarlettTransaction<ScarlettUsbDevice>) -> Result<(), Error> {
        self.cache_state(unit)
    }

    fn load(&mut self, card_cntr: &mut CardCntr) -> Result<(), Error> {
        self.load_elems(card_cntr)
    }

    fn read(
        &mut self,
        unit: &mut ScarlettTransaction<ScarlettUsbDevice>,
        elem_id: &ElemId,
        elem_value: &mut ElemValue,
    ) -> Result<bool, Error> {
        self.read_elem(unit, elem_id, elem_value)
    }

    fn write(
        &mut self,
        unit: &mut ScarlettTransaction<ScarlettUsbDevice>,
        elem_id: &ElemId,
        _: &ElemValue,
        new: &ElemValue,
    ) -> Result<bool, Error> {
        self.write_elem(unit, elem_id, new)
    }
}

#[cfg(test)]
mod test {
    use {super::*, scarlett_usb_protocols::testutil::*};

    const VOLUME_STATUS_SIZE: usize = 71;

    fn volume_status_image(master_vol: i16, hw_controlled: &[usize]) -> [u8; VOLUME_STATUS_SIZE] {
        let mut raw = [0u8; VOLUME_STATUS_SIZE];
        raw[69..71].copy_from_slice(&master_vol.to_le_bytes());
        hw_controlled.iter().for_each(|&i| raw[53 + i] = 1);
        raw
    }

    fn elem_id(name: &str) -> ElemId {
        ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, name, 0)
    }

    fn prepared_model(
        usb_id: (u16, u16),
        status: &[u8],
    ) -> (ScarlettModel, ScarlettTransaction<EmulatedUnit>) {
        let info = detect_model(usb_id).unwrap();

        let mut unit = EmulatedUnit::default();
        unit.preload_data(0x31, status);

        let conn = ScarlettTransaction::new(unit);
        let mut model = ScarlettModel::new(info);
        model.cache_state(&conn).unwrap();

        (model, conn)
    }

    #[test]
    fn attach_emits_three_canonical_tables() {
        let status = volume_status_image(-10, &[]);
        let (model, conn) = prepared_model((0x1235, 0x8215), &status);

        assert!(model.shared.sw_cfg.is_some());
        assert_eq!(model.monitor.master_vol, 117);

        conn.with_io(|unit| {
            assert_eq!(unit.mux_payloads.len(), 3);
            [77usize, 73, 46].iter().enumerate().for_each(|(band, &size)| {
                assert_eq!(unit.mux_payloads[band].len(), 4 + size * 4);
            });
            // Nothing on this path touches NVRAM.
            assert_eq!(unit.data_cmds, Vec::<u32>::new());
        });
    }

    #[test]
    fn mix_gain_edit_updates_row_and_image() {
        let status = volume_status_image(0, &[]);
        let (mut model, conn) = prepared_model((0x1235, 0x8215), &status);

        model.mixer.gain_elem_ids.push(elem_id("Mix A Input 01 Playback Volume"));
        let target = model.mixer.gain_elem_ids[0].clone();

        let value = ElemValue::new();
        value.set_int(&[140]);
        let res = model.write_elem(&conn, &target, &value).unwrap();
        assert!(res);

        conn.with_io(|unit| {
            let payload = unit.mix_payloads.last().unwrap();
            // Mix 0, first slot at -10 dB, the rest untouched at the bottom.
            assert_eq!(u16::from_le_bytes([payload[0], payload[1]]), 0);
            assert_eq!(u16::from_le_bytes([payload[2], payload[3]]), 2590);
            assert_eq!(u16::from_le_bytes([payload[4], payload[5]]), 0);

            // The image carries the binary32 expression and keeps its zero word sum.
            let base = 0xec;
            assert_eq!(unit.data_at(base + 0x3c2, 4), &[0x00, 0x00, 0x20, 0xc1]);
            let raw = unit.data_at(base, 0x1984);
            let sum = (0..0x1984).step_by(4).fold(0u32, |sum, pos| {
                sum.wrapping_add(u32::from_le_bytes([
                    raw[pos],
                    raw[pos + 1],
                    raw[pos + 2],
                    raw[pos + 3],
                ]))
            });
            assert_eq!(sum, 0);
        });

        assert!(model.take_config_touched());
        assert!(!model.take_config_touched());
    }

    #[test]
    fn volume_write_under_hardware_control() {
        let status = volume_status_image(-10, &[0]);
        let (mut model, conn) = prepared_model((0x1235, 0x8215), &status);

        assert!(model.monitor.sw_hw[0]);
        assert_eq!(model.monitor.vols[0], 117);

        model.monitor.vol_elem_ids.push(elem_id("Line 01 (Monitor 1 L) Playback Volume"));
        let target = model.monitor.vol_elem_ids[0].clone();

        let value = ElemValue::new();
        value.set_int(&[100]);
        let res = model.write_elem(&conn, &target, &value).unwrap();
        assert!(res);

        conn.with_io(|unit| {
            // The live volume went to the unit with the bias removed.
            assert_eq!(unit.data_at(0x34, 2), &(-27i16).to_le_bytes());
            assert_eq!(unit.data_cmds, vec![1]);
        });

        // The persisted volume follows software control only.
        assert_eq!(model.shared.sw_cfg.as_ref().unwrap().volume(0), None);
        assert!(model.take_config_touched());
    }

    #[test]
    fn handover_between_software_and_hardware_volume() {
        let status = volume_status_image(-10, &[]);
        let (mut model, conn) = prepared_model((0x1235, 0x8215), &status);

        model.monitor.vol_elem_ids.push(elem_id("Line 01 (Monitor 1 L) Playback Volume"));
        model.monitor.mute_elem_ids.push(elem_id("Line 01 Mute Playback Switch"));
        model
            .monitor
            .sw_hw_elem_ids
            .push(elem_id("Line Out 01 Volume Control Playback Enum"));

        let target = model.monitor.sw_hw_elem_ids[0].clone();
        let value = ElemValue::new();
        value.set_enum(&[1]);
        let res = model.write_elem(&conn, &target, &value).unwrap();
        assert!(res);

        // The fader and mute become read-only in the same operation.
        let access = model.take_access_changes();
        assert_eq!(access.len(), 2);
        assert!(access.iter().all(|(_, writable)| !writable));

        // Volume and mute follow the master, then the selector itself is written.
        assert_eq!(model.monitor.vols[0], 117);
        conn.with_io(|unit| {
            assert_eq!(unit.data_at(0x34, 2), &(-10i16).to_le_bytes());
            assert_eq!(unit.data_cmds, vec![1, 1, 3]);
            assert_eq!(unit.data_at(0x66, 1), &[1]);
        });

        // The coupled elements are reported for value propagation.
        let changed = model.take_changed_elems();
        assert_eq!(changed.len(), 2);
    }

    #[test]
    fn writing_the_current_value_moves_nothing() {
        let status = volume_status_image(-10, &[]);
        let (mut model, conn) = prepared_model((0x1235, 0x8215), &status);

        model.monitor.vol_elem_ids.push(elem_id("Line 01 (Monitor 1 L) Playback Volume"));

        let target = model.monitor.vol_elem_ids[0].clone();
        let before = conn.with_io(|unit| unit.requests.len());

        let value = ElemValue::new();
        value.set_int(&[model.monitor.vols[0]]);
        let res = model.write_elem(&conn, &target, &value).unwrap();

        assert!(!res);
        let after = conn.with_io(|unit| unit.requests.len());
        assert_eq!(before, after);
        assert!(!model.take_config_touched());
    }

    #[test]
    fn notification_marks_state_stale_without_usb() {
        let status = volume_status_image(-10, &[0]);
        let (mut model, conn) = prepared_model((0x1235, 0x8215), &status);

        model.monitor.vol_elem_ids.push(elem_id("Line 01 (Monitor 1 L) Playback Volume"));
        model
            .monitor
            .notified_elem_id_list
            .push(model.monitor.vol_elem_ids[0].clone());

        let before = conn.with_io(|unit| unit.requests.len());
        let elem_id_list = model.parse_notification(0x01000000);

        assert!(model.monitor.vol_updated);
        assert!(model.status.speaker_updated);
        assert!(!elem_id_list.is_empty());
        assert_eq!(before, conn.with_io(|unit| unit.requests.len()));

        // The next read performs exactly one re-read of the volume status.
        let target = model.monitor.vol_elem_ids[0].clone();
        let value = ElemValue::new();
        model.read_elem(&conn, &target, &mut value.clone()).unwrap();
        assert_eq!(conn.with_io(|unit| unit.requests.len()), before + 1);
        assert!(!model.monitor.vol_updated);

        model.read_elem(&conn, &target, &mut value.clone()).unwrap();
        assert_eq!(conn.with_io(|unit| unit.requests.len()), before + 1);
    }
}
