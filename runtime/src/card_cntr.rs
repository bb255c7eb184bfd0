// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

use {
    super::*,
    alsactl::{prelude::*, *},
    tracing::{debug, debug_span},
};

#[derive(Default)]
pub struct CardCntr {
    pub card: Card,
    entries: Vec<(ElemInfo, ElemValue)>,
}

pub trait CtlModel<O: Sized> {
    fn cache(&mut self, unit: &mut O) -> Result<(), Error>;
    fn load(&mut self, card_cntr: &mut CardCntr) -> Result<(), Error>;
    fn read(
        &mut self,
        unit: &mut O,
        elem_id: &ElemId,
        elem_value: &mut ElemValue,
    ) -> Result<bool, Error>;
    fn write(
        &mut self,
        unit: &mut O,
        elem_id: &ElemId,
        old: &ElemValue,
        new: &ElemValue,
    ) -> Result<bool, Error>;
}

impl Drop for CardCntr {
    fn drop(&mut self) {
        self.entries
            .iter()
            .filter_map(|(elem_info, _)| elem_id_from_elem_info(elem_info))
            .for_each(|elem_id| {
                let _ = self.card.remove_elems(&elem_id);
            });
    }
}

fn elem_id_from_elem_info(elem_info: &ElemInfo) -> Option<ElemId> {
    match elem_info {
        ElemInfo::Boolean(info) => info.elem_id(),
        ElemInfo::Integer(info) => info.elem_id(),
        ElemInfo::Enumerated(info) => info.elem_id(),
        _ => None,
    }
}

fn match_elem_id(elem_info: &ElemInfo, elem_id: &ElemId) -> bool {
    elem_id_from_elem_info(elem_info)
        .map(|e| e.eq(elem_id))
        .unwrap_or_default()
}

impl CardCntr {
    pub fn add_bool_elems(
        &mut self,
        elem_id: &ElemId,
        elem_count: usize,
        value_count: usize,
        unlock: bool,
    ) -> Result<Vec<ElemId>, Error> {
        let _enter = debug_span!("boolean").entered();

        let elem_info = ElemInfoBoolean::new();
        elem_info.set_value_count(value_count as u32);

        let access = ElemAccessFlag::READ | ElemAccessFlag::WRITE | ElemAccessFlag::VOLATILE;
        elem_info.set_access(access);

        let res = self.register_elems(&elem_id, elem_count, &elem_info, None, unlock);
        debug!(name = ?elem_id.name().as_str(), ?elem_count, ?value_count, ?res);
        res
    }

    pub fn add_enum_elems<O>(
        &mut self,
        elem_id: &ElemId,
        elem_count: usize,
        value_count: usize,
        labels: &[O],
        unlock: bool,
    ) -> Result<Vec<ElemId>, Error>
    where
        O: AsRef<str>,
    {
        let _enter = debug_span!("enumerated").entered();

        let entries = labels
            .iter()
            .map(|entry| entry.as_ref())
            .collect::<Vec<&str>>();

        let elem_info = ElemInfoEnumerated::new();
        elem_info.set_value_count(value_count as u32);
        elem_info.set_labels(&entries);

        let access = ElemAccessFlag::READ | ElemAccessFlag::WRITE | ElemAccessFlag::VOLATILE;
        elem_info.set_access(access);

        let res = self.register_elems(&elem_id, elem_count, &elem_info, None, unlock);
        debug!(name = ?elem_id.name().as_str(), ?elem_count, ?entries, ?res);
        res
    }

    pub fn add_int_elems(
        &mut self,
        elem_id: &ElemId,
        elem_count: usize,
        min: i32,
        max: i32,
        step: i32,
        value_count: usize,
        tlv: Option<&[u32]>,
        unlock: bool,
    ) -> Result<Vec<ElemId>, Error> {
        let _enter = debug_span!("integer").entered();

        let elem_info = ElemInfoInteger::new();
        elem_info.set_value_count(value_count as u32);
        elem_info.set_value_min(min);
        elem_info.set_value_max(max);
        elem_info.set_value_step(step);

        let mut access = ElemAccessFlag::READ | ElemAccessFlag::WRITE | ElemAccessFlag::VOLATILE;
        if tlv != None {
            access |= ElemAccessFlag::TLV_READ;
        }
        elem_info.set_access(access);

        let res = self.register_elems(&elem_id, elem_count, &elem_info, tlv, unlock);
        debug!(name = ?elem_id.name().as_str(), ?elem_count, ?min, ?max, ?res);
        res
    }

    fn register_elems<O: AsRef<ElemInfoCommon>>(
        &mut self,
        elem_id: &ElemId,
        elem_count: usize,
        elem_info: &O,
        tlv: Option<&[u32]>,
        unlock: bool,
    ) -> Result<Vec<ElemId>, Error> {
        let elem_id_list = self.card.add_elems(elem_id, elem_count as u32, elem_info)?;

        elem_id_list
            .iter()
            .try_for_each(|elem_id| match self.card.elem_info(&elem_id) {
                Ok(elem_info) => {
                    let mut v = ElemValue::new();
                    self.card.read_elem_value(&elem_id, &mut v)?;
                    self.entries.push((elem_info, v));
                    Ok(())
                }
                Err(err) => {
                    let _ = self.card.remove_elems(&elem_id_list[0]);
                    Err(err)
                }
            })?;

        if let Some(cntr) = tlv {
            elem_id_list
                .iter()
                .try_for_each(|elem_id| self.card.write_elem_tlv(&elem_id, &cntr))?;
        }

        if unlock {
            elem_id_list.iter().for_each(|elem_id| {
                // Ignore any errors.
                let _ = self.card.lock_elem(&elem_id, false);
            });
        }

        Ok(elem_id_list)
    }

    /// Grant or revoke write access of the element towards the other clients. The
    /// element stays operable by the service itself either way.
    pub fn set_elem_writable(&mut self, elem_id: &ElemId, writable: bool) {
        let res = self.card.lock_elem(elem_id, !writable);
        debug!(name = ?elem_id.name().as_str(), ?writable, ?res);
    }

    pub fn dispatch_elem_event<O, T>(
        &mut self,
        unit: &mut O,
        elem_id: &ElemId,
        events: &ElemEventMask,
        ctl_model: &mut T,
    ) -> Result<(), Error>
    where
        O: Sized,
        T: CtlModel<O>,
    {
        if events.contains(ElemEventMask::REMOVE) {
            self.entries
                .retain(|(elem_info, _)| !match_elem_id(elem_info, elem_id));
            return Ok(());
        }

        if events.contains(ElemEventMask::ADD) {
            for (elem_info, v) in &mut self.entries {
                if !match_elem_id(elem_info, elem_id) {
                    continue;
                }

                let mut val = ElemValue::new();
                if let Ok(res) = ctl_model.read(unit, &elem_id, &mut val) {
                    if !res || v.equal(&val) {
                        continue;
                    }
                    if self.card.write_elem_value(&elem_id, &val).is_err() {
                        continue;
                    }
                    *v = val;
                }
            }
        }

        if events.contains(ElemEventMask::VALUE) {
            for (elem_info, v) in &mut self.entries {
                if !match_elem_id(elem_info, elem_id) {
                    continue;
                }

                let mut val = ElemValue::new();
                let res = self.card.read_elem_value(&elem_id, &mut val);
                if res.is_err() || v.equal(&val) {
                    continue;
                }

                let _enter = debug_span!("write").entered();
                let res = ctl_model.write(unit, &elem_id, v, &val);
                debug!(name = ?elem_id.name().as_str(), ?res);

                match res {
                    Ok(changed) => {
                        if changed {
                            *v = val;
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        // Back to old values.
                        self.card.write_elem_value(&elem_id, v)?;
                        return Err(err);
                    }
                }
            }
        }

        Ok(())
    }

    /// Re-read the elements from the model and propagate changed values to the sound
    /// card so that subscribers receive value events.
    pub fn refresh_elems<O, T>(
        &mut self,
        unit: &mut O,
        elem_id_list: &[ElemId],
        ctl_model: &mut T,
    ) -> Result<(), Error>
    where
        O: Sized,
        T: CtlModel<O>,
    {
        let card = &self.card;
        let entries = &mut self.entries;

        elem_id_list.iter().try_for_each(|elem_id| {
            entries
                .iter_mut()
                .filter(|(elem_info, _)| match_elem_id(elem_info, elem_id))
                .try_for_each(|(_, elem_value)| {
                    let mut val = ElemValue::new();
                    if ctl_model.read(unit, elem_id, &mut val)? {
                        if !elem_value.equal(&val) {
                            card.write_elem_value(elem_id, &val)?;
                            *elem_value = val;
                        }
                    }
                    Ok(())
                })
        })
    }
}
