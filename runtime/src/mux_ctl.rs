// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Control elements for the signal multiplexer; one source selector per destination,
//! and stereo pairing of analogue output pairs.

use super::*;

fn src_labels(info: &ScarlettDeviceInfo) -> Vec<String> {
    let mut labels = Vec::new();

    PORT_TYPES.iter().for_each(|&port_type| {
        let count = info.port_count[port_type as usize].input as usize;
        (0..count).for_each(|i| {
            let label = match port_type {
                PortType::None => "Off".to_string(),
                PortType::Analogue => format!("Analogue {}", i + 1),
                PortType::Spdif => format!("S/PDIF {}", i + 1),
                PortType::Adat | PortType::Adat2 => format!("ADAT {}", i + 1),
                PortType::Mix => format!("Mix {}", (b'A' + i as u8) as char),
                PortType::Pcm => format!("PCM {}", i + 1),
                PortType::InternalMic => "Internal Mic".to_string(),
                PortType::Talkback => "Talkback".to_string(),
            };
            labels.push(label);
        });
    });

    labels
}

fn dst_elem_name(port_type: PortType, index: usize) -> String {
    match port_type {
        PortType::Analogue => format!("Analogue Output {:02} Playback Enum", index + 1),
        PortType::Spdif => format!("S/PDIF Output {} Playback Enum", index + 1),
        PortType::Adat | PortType::Adat2 => format!("ADAT Output {} Playback Enum", index + 1),
        PortType::Mix => format!("Mixer Input {:02} Capture Enum", index + 1),
        PortType::Pcm => format!("PCM {:02} Capture Enum", index + 1),
        _ => format!("Output {:02} Playback Enum", index + 1),
    }
}

fn stereo_elem_name(pair: usize) -> String {
    format!(
        "Line Out {:02}-{:02} Stereo Playback Switch",
        pair * 2 + 1,
        pair * 2 + 2
    )
}

/// The index of the destination among the output slots of the persisted configuration
/// image; mixer inputs are kept in their own table there.
fn out_slot_index(info: &ScarlettDeviceInfo, dst_index: usize) -> Option<usize> {
    let mut flat = 0;
    let mut slot = 0;

    for &port_type in PORT_TYPES.iter() {
        let count = info.port_count[port_type as usize].output as usize;
        if dst_index < flat + count {
            return if port_type == PortType::Mix {
                None
            } else {
                Some(slot + dst_index - flat)
            };
        }
        flat += count;
        if port_type != PortType::Mix {
            slot += count;
        }
    }

    None
}

fn mix_input_index(info: &ScarlettDeviceInfo, dst_index: usize) -> Option<usize> {
    let start = info.port_start(PortDirection::Output, PortType::Mix);
    let count = info.port_count[PortType::Mix as usize].output as usize;
    if dst_index >= start && dst_index < start + count {
        Some(dst_index - start)
    } else {
        None
    }
}

#[derive(Default, Debug)]
pub struct MuxCtl {
    pub changed_elem_id_list: Vec<ElemId>,

    pub(crate) elem_ids: Vec<ElemId>,
    stereo_elem_ids: Vec<ElemId>,

    pub(crate) mux: Vec<usize>,
}

impl MuxCtl {
    pub fn cache<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        info: &ScarlettDeviceInfo,
    ) -> Result<(), Error> {
        self.mux = vec![0; info.mux_dst_count()];

        if !self.mux.is_empty() {
            cache_mux(conn, info, &mut self.mux, TIMEOUT_MS)?;
            // The unit expects the three tables back in canonical shape.
            update_mux(conn, info, &self.mux, TIMEOUT_MS)?;
        }

        Ok(())
    }

    pub fn load(
        &mut self,
        card_cntr: &mut CardCntr,
        shared: &ModelShared,
    ) -> Result<(), Error> {
        let info = shared.info;
        let labels = src_labels(info);

        PORT_TYPES.iter().try_for_each(|&port_type| {
            let count = info.port_count[port_type as usize].output as usize;
            (0..count).try_for_each(|i| {
                let name = dst_elem_name(port_type, i);
                let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
                let mut elem_id_list = card_cntr.add_enum_elems(&elem_id, 1, 1, &labels, true)?;
                self.elem_ids.push(elem_id_list.remove(0));
                Ok(())
            })
        })?;

        if shared.sw_cfg.is_some() {
            (0..(info.line_out_count() / 2)).try_for_each(|pair| {
                let name = stereo_elem_name(pair);
                let elem_id = ElemId::new_by_name(ElemIfaceType::Mixer, 0, 0, &name, 0);
                let mut elem_id_list = card_cntr.add_bool_elems(&elem_id, 1, 1, true)?;
                self.stereo_elem_ids.push(elem_id_list.remove(0));
                Ok(())
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
        if let Some(i) = self.elem_ids.iter().position(|e| e.eq(elem_id)) {
            elem_value.set_enum(&[self.mux[i] as u32]);
            Ok(true)
        } else if let Some(pair) = self.stereo_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let mask = shared
                .sw_cfg
                .as_ref()
                .map(|cfg| cfg.stereo_sw())
                .unwrap_or(0);
            elem_value.set_bool(&[mask & (1 << (pair * 2)) > 0]);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn store_slot_routes(&self, shared: &mut ModelShared, routes: &[(usize, usize)]) {
        let info = shared.info;
        if let Some(cfg) = shared.sw_cfg.as_mut() {
            routes.iter().for_each(|&(dst, src)| {
                if let Some(input) = mix_input_index(info, dst) {
                    if input < SW_CFG_MIXER_INPUT_COUNT {
                        cfg.set_mixer_in_mux(input, src as u8);
                    }
                } else if let Some(slot) = out_slot_index(info, dst) {
                    if slot < SW_CFG_OUTPUT_COUNT {
                        cfg.set_out_mux(slot, src as u8);
                    }
                }
            });
        }
    }

    pub fn write<T: ScarlettUsbIo>(
        &mut self,
        conn: &ScarlettTransaction<T>,
        shared: &mut ModelShared,
        elem_id: &ElemId,
        elem_value: &ElemValue,
    ) -> Result<bool, Error> {
        let info = shared.info;

        if let Some(dst) = self.elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = (elem_value.enumerated()[0] as usize).min(info.mux_src_count() - 1);
            if self.mux[dst] == val {
                return Ok(false);
            }

            self.mux[dst] = val;
            let mut routes = vec![(dst, val)];

            // Assignments to a member of an active stereo pair drag the partner along.
            let stereo_sw = shared
                .sw_cfg
                .as_ref()
                .map(|cfg| cfg.stereo_sw())
                .unwrap_or(0);
            if let Some(slot) = out_slot_index(info, dst) {
                if let Some((partner_slot, partner_src)) =
                    stereo_partner_assignment(stereo_sw, slot, val)
                {
                    let partner_dst = if partner_slot > slot { dst + 1 } else { dst - 1 };
                    if partner_dst < self.mux.len() {
                        self.mux[partner_dst] = partner_src;
                        routes.push((partner_dst, partner_src));
                        self.changed_elem_id_list
                            .push(self.elem_ids[partner_dst].clone());
                    }
                }
            }

            update_mux(conn, info, &self.mux, TIMEOUT_MS)?;

            self.store_slot_routes(shared, &routes);
            shared.flush_sw_cfg(conn)?;

            Ok(true)
        } else if let Some(pair) = self.stereo_elem_ids.iter().position(|e| e.eq(elem_id)) {
            let val = elem_value.boolean()[0];
            let even = pair * 2;

            let cfg = match shared.sw_cfg.as_mut() {
                Some(cfg) => cfg,
                None => return Ok(false),
            };

            if (cfg.stereo_sw() & (1 << even) > 0) == val {
                return Ok(false);
            }

            if val {
                let stereo = cfg.stereo_sw() | (0b11 << even);
                cfg.set_stereo_sw(stereo);

                // Couple the pair at once; the odd output follows the even one.
                let even_dst = info.port_start(PortDirection::Output, PortType::Analogue) + even;
                if let Some((_, partner_src)) =
                    stereo_partner_assignment(stereo, even, self.mux[even_dst])
                {
                    self.mux[even_dst + 1] = partner_src;
                    let routes = [(even_dst + 1, partner_src)];
                    update_mux(conn, info, &self.mux, TIMEOUT_MS)?;
                    self.store_slot_routes(shared, &routes);
                    self.changed_elem_id_list
                        .push(self.elem_ids[even_dst + 1].clone());
                }
            } else {
                let mut stereo = cfg.stereo_sw();
                let mut bind = cfg.mixer_bind();
                clear_stereo_pair(&mut stereo, &mut bind, even);
                cfg.set_stereo_sw(stereo);
                cfg.set_mixer_bind(bind);
            }

            shared.flush_sw_cfg(conn)?;

            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod test {
    use {super::*, scarlett_usb_protocols::model::detect_model};

    #[test]
    fn out_slot_skips_mixer_inputs() {
        let info = detect_model((0x1235, 0x8203)).unwrap();

        // Analogue and S/PDIF outputs map one to one.
        assert_eq!(out_slot_index(info, 0), Some(0));
        assert_eq!(out_slot_index(info, 5), Some(5));

        // Mixer inputs have their own table.
        let mix_start = info.port_start(PortDirection::Output, PortType::Mix);
        assert_eq!(out_slot_index(info, mix_start), None);
        assert_eq!(mix_input_index(info, mix_start), Some(0));

        // PCM outputs continue the slot numbering after the mixer inputs.
        let pcm_start = info.port_start(PortDirection::Output, PortType::Pcm);
        assert_eq!(out_slot_index(info, pcm_start), Some(6));
    }

    #[test]
    fn source_labels_cover_every_source() {
        let info = detect_model((0x1235, 0x8215)).unwrap();
        let labels = src_labels(info);
        assert_eq!(labels.len(), info.mux_src_count());
        assert_eq!(labels[0], "Off");
        assert_eq!(labels[1], "Analogue 1");
        assert_eq!(labels[labels.len() - 1], "PCM 20");
    }
}
