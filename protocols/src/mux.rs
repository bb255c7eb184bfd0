// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! The signal multiplexer of the unit.
//!
//! The unit keeps three routing tables, one per band of sampling rates, all rebuilt and
//! transferred whenever any assignment changes. Each slot of a table is 32 bits; the
//! lower 12 bits carry the hardware identifier of the destination and the next 12 bits
//! the identifier of the source, or all zero for an inactive slot. The driver itself
//! keeps a single logical table of flat source indices per flat destination index, with
//! index zero expressing no source.

use {
    super::*,
    crate::{model::*, transaction::*},
};

/// Read the current routing and populate flat assignments. Slots against unknown
/// identifiers are skipped.
pub fn cache_mux<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    info: &ScarlettDeviceInfo,
    mux: &mut [usize],
    timeout_ms: u32,
) -> Result<(), Error> {
    let count = info.mux_dst_count();
    assert_eq!(mux.len(), count);

    let mut req = [0u8; 4];
    serialize_u16(0, &mut req[..2]);
    serialize_u16(count as u16, &mut req[2..4]);

    let mut resp = vec![0u8; count * 4];
    conn.request(USB_GET_MUX, &req, &mut resp, timeout_ms)?;

    (0..count).for_each(|i| {
        let entry = deserialize_u32(&resp[(i * 4)..(i * 4 + 4)]);

        let dst_id = (entry & 0x0fff) as u16;
        let src_id = ((entry >> 12) & 0x0fff) as u16;

        if let Some(dst_index) = info.port_index_from_id(PortDirection::Output, dst_id) {
            if let Some(src_index) = info.port_index_from_id(PortDirection::Input, src_id) {
                mux[dst_index] = src_index;
            }
        }
    });

    Ok(())
}

/// Rebuild and transfer the three routing tables from flat assignments.
///
/// Each table is emitted in the canonical port type order declared by the model, with
/// inactive slots zero-filled up to the declared size of the table.
pub fn update_mux<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    info: &ScarlettDeviceInfo,
    mux: &[usize],
    timeout_ms: u32,
) -> Result<(), Error> {
    assert_eq!(mux.len(), info.mux_dst_count());

    (0..MUX_TABLE_COUNT).try_for_each(|band| {
        let table = info.mux_assignment[band];

        let mut req = vec![0u8; 4];
        serialize_u16(band as u16, &mut req[2..4]);

        table.iter().for_each(|entry| {
            let base_index =
                info.port_start(PortDirection::Output, entry.port_type) + entry.start as usize;

            (0..entry.count as usize).for_each(|i| {
                let mut raw = [0u8; 4];

                if entry.port_type != PortType::None {
                    let dst_id = entry.port_type.id_base() as u32 + (entry.start as usize + i) as u32;
                    let src_id = info.src_index_to_id(mux[base_index + i]) as u32;
                    serialize_u32(dst_id | (src_id << 12), &mut raw);
                }

                req.extend_from_slice(&raw);
            });
        });

        conn.request(USB_SET_MUX, &req, &mut [], timeout_ms)
    })
}

/// The implicit assignment to the other member of an active stereo pair; the odd slot
/// follows the even one with the next source, and the reverse.
pub fn stereo_partner_assignment(
    stereo_sw: u32,
    dst_index: usize,
    src_index: usize,
) -> Option<(usize, usize)> {
    if dst_index >= 32 || stereo_sw & (1 << dst_index) == 0 {
        return None;
    }

    if dst_index % 2 == 0 {
        let src = if src_index == 0 { 0 } else { src_index + 1 };
        Some((dst_index + 1, src))
    } else {
        let src = if src_index <= 1 { 0 } else { src_index - 1 };
        Some((dst_index - 1, src))
    }
}

/// Break the stereo pair containing the destination; both pairing bits clear, and the
/// pair falls back to direct routing.
pub fn clear_stereo_pair(stereo_sw: &mut u32, mixer_bind: &mut u32, dst_index: usize) {
    let even = dst_index & !1;
    let mask = 0b11u32 << even;
    *stereo_sw &= !mask;
    *mixer_bind &= !mask;
}

#[cfg(test)]
mod test {
    use {super::*, crate::model::detect_model, crate::testutil::*};

    #[test]
    fn emission_shape_for_s18i20_gen3() {
        let info = detect_model((0x1235, 0x8215)).unwrap();
        let conn = ScarlettTransaction::new(EmulatedUnit::default());

        let mut mux = vec![0usize; info.mux_dst_count()];
        // Route Analogue 1 to the first PCM capture.
        let pcm0 = info.port_start(PortDirection::Output, PortType::Pcm);
        mux[pcm0] = 1;

        update_mux(&conn, info, &mux, TIMEOUT_MS).unwrap();

        conn.with_io(|unit| {
            assert_eq!(unit.mux_payloads.len(), 3);

            [77usize, 73, 46]
                .iter()
                .enumerate()
                .for_each(|(band, &size)| {
                    let payload = &unit.mux_payloads[band];
                    assert_eq!(payload.len(), 4 + size * 4);
                    assert_eq!(deserialize_u16(&payload[..2]), 0);
                    assert_eq!(deserialize_u16(&payload[2..4]), band as u16);

                    // The first group is PCM; its first slot carries the assignment.
                    let slot = deserialize_u32(&payload[4..8]);
                    assert_eq!(slot & 0x0fff, 0x600);
                    assert_eq!((slot >> 12) & 0x0fff, 0x080);

                    // Slots after the last active group are zero-filled.
                    let none_count: usize = info.mux_assignment[band]
                        .iter()
                        .filter(|entry| entry.port_type == PortType::None)
                        .map(|entry| entry.count as usize)
                        .sum();
                    let tail = &payload[(payload.len() - none_count * 4)..];
                    assert!(tail.iter().all(|&b| b == 0));
                });
        });
    }

    #[test]
    fn unassigned_slots_carry_destination_only() {
        let info = detect_model((0x1235, 0x8203)).unwrap();
        let conn = ScarlettTransaction::new(EmulatedUnit::default());

        let mux = vec![0usize; info.mux_dst_count()];
        update_mux(&conn, info, &mux, TIMEOUT_MS).unwrap();

        conn.with_io(|unit| {
            let payload = &unit.mux_payloads[0];
            // Source field zero expresses no source, destination is still encoded.
            let slot = deserialize_u32(&payload[4..8]);
            assert_eq!(slot, 0x600);
        });
    }

    #[test]
    fn cache_round_trip() {
        let info = detect_model((0x1235, 0x8203)).unwrap();

        let mut unit = EmulatedUnit::default();
        // PCM 1 fed from Analogue 1, Analogue Output 1 fed from Mix A.
        let analogue_out_base = 0x080u32;
        let mix_a = 0x300u32;
        unit.mux_entries = vec![0x600 | (0x080 << 12), analogue_out_base | (mix_a << 12)];

        let conn = ScarlettTransaction::new(unit);
        let mut mux = vec![0usize; info.mux_dst_count()];
        cache_mux(&conn, info, &mut mux, TIMEOUT_MS).unwrap();

        let pcm0 = info.port_start(PortDirection::Output, PortType::Pcm);
        assert_eq!(mux[pcm0], 1);

        let analogue0 = info.port_start(PortDirection::Output, PortType::Analogue);
        let mix_src = info.port_index_from_id(PortDirection::Input, 0x300).unwrap();
        assert_eq!(mux[analogue0], mix_src);
    }

    #[test]
    fn stereo_coupling() {
        let stereo_sw = 0b0011;

        assert_eq!(stereo_partner_assignment(stereo_sw, 0, 5), Some((1, 6)));
        assert_eq!(stereo_partner_assignment(stereo_sw, 1, 6), Some((0, 5)));
        assert_eq!(stereo_partner_assignment(stereo_sw, 0, 0), Some((1, 0)));
        assert_eq!(stereo_partner_assignment(stereo_sw, 2, 5), None);
        assert_eq!(stereo_partner_assignment(0, 0, 5), None);
    }

    #[test]
    fn stereo_pair_breaking() {
        let mut stereo_sw = 0b1111;
        let mut mixer_bind = 0b0110;

        clear_stereo_pair(&mut stereo_sw, &mut mixer_bind, 3);

        assert_eq!(stereo_sw, 0b0011);
        assert_eq!(mixer_bind, 0b0010);
    }
}
