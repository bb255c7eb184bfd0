// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Static description of supported models.
//!
//! Per-model variation of the protocol is data; the number of ports of each type, the
//! layout of the three multiplexer tables, the location of configuration items, and a
//! handful of feature flags. Everything else is driven from these descriptions.

use super::{config::ConfigSet, *};

/// One run of destinations in the layout of a `SET_MUX` message. Runs of `None` express
/// inactive slots filled with zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MuxEntry {
    pub port_type: PortType,
    pub start: u8,
    pub count: u8,
}

const fn mux_entry(port_type: PortType, start: u8, count: u8) -> MuxEntry {
    MuxEntry {
        port_type,
        start,
        count,
    }
}

/// The number of multiplexer tables, one per band of sampling rates (44.1/48 kHz,
/// 88.2/96 kHz, and 176.4/192 kHz).
pub const MUX_TABLE_COUNT: usize = 3;

/// Static description of one model.
#[derive(Debug)]
pub struct ScarlettDeviceInfo {
    /// USB vendor and product identifiers.
    pub usb_id: (u16, u16),
    pub name: &'static str,
    /// The set of configuration items of the model.
    pub config_set: ConfigSet,
    /// Whether volume of analogue outputs can be assigned to the hardware master knob.
    pub line_out_hw_vol: bool,
    /// Whether the model can be switched to mass-storage mode.
    pub has_msd_mode: bool,
    /// Whether main/alternate speaker switching is available.
    pub has_speaker_switching: bool,
    /// Whether the talkback microphone can be mixed into monitor mixes.
    pub has_talkback: bool,
    /// Shape of the direct monitor function; 0 = none, 1 = switch, 2 = off/mono/stereo.
    pub direct_monitor: u8,
    /// The number of analogue inputs with software switchable line/instrument level.
    pub level_input_count: u8,
    /// The first analogue input with the level switch.
    pub level_input_first: u8,
    /// The number of analogue inputs with a software switchable 10 dB pad.
    pub pad_input_count: u8,
    /// The number of analogue inputs with the Air switch.
    pub air_input_count: u8,
    /// The number of phantom power groups and the inputs covered by each.
    pub phantom_count: u8,
    pub inputs_per_phantom: u8,
    /// The number of gain halos with configurable color.
    pub gain_halo_count: u8,
    /// Additional description for analogue output volume controls.
    pub line_out_descrs: &'static [Option<&'static str>],
    /// The number of sources and destinations of each port type, in flat index order.
    pub port_count: [PortCounts; PORT_TYPE_COUNT],
    /// The layout of each multiplexer table.
    pub mux_assignment: [&'static [MuxEntry]; MUX_TABLE_COUNT],
}

const fn port_counts(
    none: (u8, u8),
    analogue: (u8, u8),
    spdif: (u8, u8),
    adat: (u8, u8),
    mix: (u8, u8),
    pcm: (u8, u8),
) -> [PortCounts; PORT_TYPE_COUNT] {
    [
        PortCounts::new(none.0, none.1),
        PortCounts::new(analogue.0, analogue.1),
        PortCounts::new(spdif.0, spdif.1),
        PortCounts::new(adat.0, adat.1),
        // Adat2 is an alias and declares no port of its own.
        PortCounts::new(0, 0),
        PortCounts::new(mix.0, mix.1),
        PortCounts::new(pcm.0, pcm.1),
        PortCounts::new(0, 0),
        PortCounts::new(0, 0),
    ]
}

impl ScarlettDeviceInfo {
    /// The flat index of the first port of the type in the direction.
    pub fn port_start(&self, direction: PortDirection, port_type: PortType) -> usize {
        PORT_TYPES
            .iter()
            .take_while(|&&t| !t.eq(&port_type))
            .fold(0, |total, &t| total + self.port_dirn_count(direction, t))
    }

    fn port_dirn_count(&self, direction: PortDirection, port_type: PortType) -> usize {
        let counts = &self.port_count[port_type as usize];
        match direction {
            PortDirection::Input => counts.input as usize,
            PortDirection::Output => counts.output as usize,
        }
    }

    /// The total number of multiplexer sources.
    pub fn mux_src_count(&self) -> usize {
        PORT_TYPES.iter().fold(0, |total, &t| {
            total + self.port_dirn_count(PortDirection::Input, t)
        })
    }

    /// The total number of multiplexer destinations.
    pub fn mux_dst_count(&self) -> usize {
        PORT_TYPES.iter().fold(0, |total, &t| {
            total + self.port_dirn_count(PortDirection::Output, t)
        })
    }

    /// Convert a flat source index to the hardware identifier. Index zero is the `None`
    /// port and encodes as zero.
    pub fn src_index_to_id(&self, index: usize) -> u16 {
        let mut num = index;
        for &t in PORT_TYPES.iter() {
            let count = self.port_dirn_count(PortDirection::Input, t);
            if num < count {
                return t.id_base() + num as u16;
            }
            num -= count;
        }
        0
    }

    /// Convert a hardware identifier to a flat index in the direction.
    pub fn port_index_from_id(&self, direction: PortDirection, id: u16) -> Option<usize> {
        let mut num = 0;
        for &t in PORT_TYPES.iter() {
            let base = t.id_base();
            let count = self.port_dirn_count(direction, t);
            if id >= base && (id as usize) < base as usize + count {
                return Some(num + (id - base) as usize);
            }
            num += count;
        }
        None
    }

    /// The number of slots in the multiplexer table of the band.
    pub fn mux_table_size(&self, band: usize) -> usize {
        self.mux_assignment[band]
            .iter()
            .fold(0, |total, entry| total + entry.count as usize)
    }

    /// The number of mixer outputs (mix A, B, ...).
    pub fn mixer_output_count(&self) -> usize {
        self.port_count[PortType::Mix as usize].input as usize
    }

    /// The number of inputs to each mix, excluding the talkback slot.
    pub fn mixer_input_count(&self) -> usize {
        let count = self.port_count[PortType::Mix as usize].output as usize;
        if self.has_talkback {
            count - 1
        } else {
            count
        }
    }

    /// The number of analogue outputs.
    pub fn line_out_count(&self) -> usize {
        self.port_count[PortType::Analogue as usize].output as usize
    }

    /// The number of level meters, one per multiplexer destination.
    pub fn meter_count(&self) -> usize {
        self.mux_dst_count()
    }
}

const S6I6_GEN2_MUX: &[MuxEntry] = &[
    mux_entry(PortType::Pcm, 0, 6),
    mux_entry(PortType::Analogue, 0, 4),
    mux_entry(PortType::Spdif, 0, 2),
    mux_entry(PortType::Mix, 0, 18),
    mux_entry(PortType::None, 0, 8),
];

static S6I6_GEN2_INFO: ScarlettDeviceInfo = ScarlettDeviceInfo {
    usb_id: (0x1235, 0x8203),
    name: "Scarlett 6i6 Gen 2",
    config_set: ConfigSet::Gen2,
    line_out_hw_vol: false,
    has_msd_mode: false,
    has_speaker_switching: false,
    has_talkback: false,
    direct_monitor: 0,
    level_input_count: 2,
    level_input_first: 0,
    pad_input_count: 2,
    air_input_count: 0,
    phantom_count: 0,
    inputs_per_phantom: 0,
    gain_halo_count: 0,
    line_out_descrs: &[
        Some("Headphones 1 L"),
        Some("Headphones 1 R"),
        Some("Headphones 2 L"),
        Some("Headphones 2 R"),
    ],
    port_count: port_counts((1, 0), (4, 4), (2, 2), (0, 0), (10, 18), (6, 6)),
    mux_assignment: [S6I6_GEN2_MUX, S6I6_GEN2_MUX, S6I6_GEN2_MUX],
};

static S18I8_GEN2_INFO: ScarlettDeviceInfo = ScarlettDeviceInfo {
    usb_id: (0x1235, 0x8204),
    name: "Scarlett 18i8 Gen 2",
    config_set: ConfigSet::Gen2,
    line_out_hw_vol: false,
    has_msd_mode: false,
    has_speaker_switching: false,
    has_talkback: false,
    direct_monitor: 0,
    level_input_count: 2,
    level_input_first: 0,
    pad_input_count: 4,
    air_input_count: 0,
    phantom_count: 0,
    inputs_per_phantom: 0,
    gain_halo_count: 0,
    line_out_descrs: &[
        Some("Monitor L"),
        Some("Monitor R"),
        Some("Headphones 1 L"),
        Some("Headphones 1 R"),
        Some("Headphones 2 L"),
        Some("Headphones 2 R"),
    ],
    port_count: port_counts((1, 0), (8, 6), (2, 2), (8, 0), (10, 18), (8, 18)),
    mux_assignment: [
        &[
            mux_entry(PortType::Pcm, 0, 18),
            mux_entry(PortType::Analogue, 0, 6),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Mix, 0, 18),
            mux_entry(PortType::None, 0, 8),
        ],
        &[
            mux_entry(PortType::Pcm, 0, 14),
            mux_entry(PortType::Analogue, 0, 6),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Mix, 0, 18),
            mux_entry(PortType::None, 0, 8),
        ],
        &[
            mux_entry(PortType::Pcm, 0, 10),
            mux_entry(PortType::Analogue, 0, 6),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Mix, 0, 18),
            mux_entry(PortType::None, 0, 4),
        ],
    ],
};

static S18I20_GEN2_INFO: ScarlettDeviceInfo = ScarlettDeviceInfo {
    usb_id: (0x1235, 0x8201),
    name: "Scarlett 18i20 Gen 2",
    config_set: ConfigSet::Gen2,
    line_out_hw_vol: true,
    has_msd_mode: false,
    has_speaker_switching: false,
    has_talkback: false,
    direct_monitor: 0,
    level_input_count: 0,
    level_input_first: 0,
    pad_input_count: 0,
    air_input_count: 0,
    phantom_count: 0,
    inputs_per_phantom: 0,
    gain_halo_count: 0,
    line_out_descrs: &[
        Some("Monitor L"),
        Some("Monitor R"),
        None,
        None,
        None,
        None,
        Some("Headphones 1 L"),
        Some("Headphones 1 R"),
        Some("Headphones 2 L"),
        Some("Headphones 2 R"),
    ],
    port_count: port_counts((1, 0), (8, 10), (2, 2), (8, 8), (10, 18), (20, 18)),
    mux_assignment: [
        &[
            mux_entry(PortType::Pcm, 0, 18),
            mux_entry(PortType::Analogue, 0, 10),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Adat, 0, 8),
            mux_entry(PortType::Mix, 0, 18),
            mux_entry(PortType::None, 0, 8),
        ],
        &[
            mux_entry(PortType::Pcm, 0, 14),
            mux_entry(PortType::Analogue, 0, 10),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Adat, 0, 4),
            mux_entry(PortType::Mix, 0, 18),
            mux_entry(PortType::None, 0, 8),
        ],
        &[
            mux_entry(PortType::Pcm, 0, 10),
            mux_entry(PortType::Analogue, 0, 10),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Mix, 0, 18),
            mux_entry(PortType::None, 0, 6),
        ],
    ],
};

static SOLO_GEN3_INFO: ScarlettDeviceInfo = ScarlettDeviceInfo {
    usb_id: (0x1235, 0x8211),
    name: "Scarlett Solo Gen 3",
    config_set: ConfigSet::Gen3Small,
    line_out_hw_vol: false,
    // Unverified on this code path; left disabled.
    has_msd_mode: false,
    has_speaker_switching: false,
    has_talkback: false,
    direct_monitor: 1,
    level_input_count: 1,
    level_input_first: 1,
    pad_input_count: 0,
    air_input_count: 1,
    phantom_count: 1,
    inputs_per_phantom: 1,
    gain_halo_count: 1,
    line_out_descrs: &[],
    port_count: port_counts((0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)),
    mux_assignment: [&[], &[], &[]],
};

static S2I2_GEN3_INFO: ScarlettDeviceInfo = ScarlettDeviceInfo {
    usb_id: (0x1235, 0x8210),
    name: "Scarlett 2i2 Gen 3",
    config_set: ConfigSet::Gen3Small,
    line_out_hw_vol: false,
    // Unverified on this code path; left disabled.
    has_msd_mode: false,
    has_speaker_switching: false,
    has_talkback: false,
    direct_monitor: 2,
    level_input_count: 2,
    level_input_first: 0,
    pad_input_count: 0,
    air_input_count: 2,
    phantom_count: 1,
    inputs_per_phantom: 2,
    gain_halo_count: 2,
    line_out_descrs: &[],
    port_count: port_counts((0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0)),
    mux_assignment: [&[], &[], &[]],
};

const S4I4_GEN3_MUX: &[MuxEntry] = &[
    mux_entry(PortType::Pcm, 0, 6),
    mux_entry(PortType::Analogue, 0, 4),
    mux_entry(PortType::Mix, 0, 8),
    mux_entry(PortType::None, 0, 16),
];

static S4I4_GEN3_INFO: ScarlettDeviceInfo = ScarlettDeviceInfo {
    usb_id: (0x1235, 0x8212),
    name: "Scarlett 4i4 Gen 3",
    config_set: ConfigSet::Gen3Large,
    line_out_hw_vol: false,
    has_msd_mode: true,
    has_speaker_switching: false,
    has_talkback: false,
    direct_monitor: 0,
    level_input_count: 2,
    level_input_first: 0,
    pad_input_count: 2,
    air_input_count: 2,
    phantom_count: 1,
    inputs_per_phantom: 2,
    gain_halo_count: 2,
    line_out_descrs: &[
        Some("Monitor L"),
        Some("Monitor R"),
        Some("Headphones L"),
        Some("Headphones R"),
    ],
    port_count: port_counts((1, 0), (4, 4), (0, 0), (0, 0), (6, 8), (4, 6)),
    mux_assignment: [S4I4_GEN3_MUX, S4I4_GEN3_MUX, S4I4_GEN3_MUX],
};

const S8I6_GEN3_MUX: &[MuxEntry] = &[
    mux_entry(PortType::Pcm, 0, 10),
    mux_entry(PortType::Analogue, 0, 4),
    mux_entry(PortType::Spdif, 0, 2),
    mux_entry(PortType::Mix, 0, 8),
    mux_entry(PortType::None, 0, 18),
];

static S8I6_GEN3_INFO: ScarlettDeviceInfo = ScarlettDeviceInfo {
    usb_id: (0x1235, 0x8213),
    name: "Scarlett 8i6 Gen 3",
    config_set: ConfigSet::Gen3Large,
    line_out_hw_vol: false,
    has_msd_mode: true,
    has_speaker_switching: false,
    has_talkback: false,
    direct_monitor: 0,
    level_input_count: 2,
    level_input_first: 0,
    pad_input_count: 2,
    air_input_count: 2,
    phantom_count: 1,
    inputs_per_phantom: 2,
    gain_halo_count: 2,
    line_out_descrs: &[
        Some("Headphones 1 L"),
        Some("Headphones 1 R"),
        Some("Headphones 2 L"),
        Some("Headphones 2 R"),
    ],
    port_count: port_counts((1, 0), (6, 4), (2, 2), (0, 0), (8, 8), (6, 10)),
    mux_assignment: [S8I6_GEN3_MUX, S8I6_GEN3_MUX, S8I6_GEN3_MUX],
};

static S18I8_GEN3_INFO: ScarlettDeviceInfo = ScarlettDeviceInfo {
    usb_id: (0x1235, 0x8214),
    name: "Scarlett 18i8 Gen 3",
    config_set: ConfigSet::Gen3Large,
    line_out_hw_vol: true,
    has_msd_mode: true,
    has_speaker_switching: true,
    has_talkback: false,
    direct_monitor: 0,
    level_input_count: 2,
    level_input_first: 0,
    pad_input_count: 4,
    air_input_count: 4,
    phantom_count: 2,
    inputs_per_phantom: 2,
    gain_halo_count: 0,
    line_out_descrs: &[
        Some("Monitor L"),
        Some("Monitor R"),
        Some("Headphones 1 L"),
        Some("Headphones 1 R"),
        Some("Headphones 2 L"),
        Some("Headphones 2 R"),
        Some("Alt Monitor L"),
        Some("Alt Monitor R"),
    ],
    port_count: port_counts((1, 0), (8, 8), (2, 2), (8, 0), (10, 20), (8, 20)),
    mux_assignment: [
        &[
            mux_entry(PortType::Pcm, 0, 20),
            mux_entry(PortType::Analogue, 0, 8),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Mix, 0, 20),
            mux_entry(PortType::None, 0, 10),
        ],
        &[
            mux_entry(PortType::Pcm, 0, 16),
            mux_entry(PortType::Analogue, 0, 8),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Mix, 0, 20),
            mux_entry(PortType::None, 0, 10),
        ],
        &[
            mux_entry(PortType::Pcm, 0, 10),
            mux_entry(PortType::Analogue, 0, 8),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Mix, 0, 20),
            mux_entry(PortType::None, 0, 10),
        ],
    ],
};

static S18I20_GEN3_INFO: ScarlettDeviceInfo = ScarlettDeviceInfo {
    usb_id: (0x1235, 0x8215),
    name: "Scarlett 18i20 Gen 3",
    config_set: ConfigSet::Gen3Large,
    line_out_hw_vol: true,
    has_msd_mode: true,
    has_speaker_switching: true,
    has_talkback: true,
    direct_monitor: 0,
    level_input_count: 2,
    level_input_first: 0,
    pad_input_count: 8,
    air_input_count: 8,
    phantom_count: 2,
    inputs_per_phantom: 4,
    gain_halo_count: 0,
    line_out_descrs: &[
        Some("Monitor 1 L"),
        Some("Monitor 1 R"),
        Some("Monitor 2 L"),
        Some("Monitor 2 R"),
        None,
        None,
        Some("Headphones 1 L"),
        Some("Headphones 1 R"),
        Some("Headphones 2 L"),
        Some("Headphones 2 R"),
    ],
    // The ninth analogue input is the talkback microphone.
    port_count: port_counts((1, 0), (9, 10), (2, 2), (8, 8), (12, 25), (20, 20)),
    mux_assignment: [
        &[
            mux_entry(PortType::Pcm, 0, 20),
            mux_entry(PortType::Analogue, 0, 10),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Adat, 0, 8),
            mux_entry(PortType::Mix, 0, 25),
            mux_entry(PortType::None, 0, 12),
        ],
        &[
            mux_entry(PortType::Pcm, 0, 18),
            mux_entry(PortType::Analogue, 0, 10),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::Adat, 0, 8),
            mux_entry(PortType::Mix, 0, 25),
            mux_entry(PortType::None, 0, 10),
        ],
        &[
            mux_entry(PortType::Pcm, 0, 10),
            mux_entry(PortType::Analogue, 0, 10),
            mux_entry(PortType::Spdif, 0, 2),
            mux_entry(PortType::None, 0, 24),
        ],
    ],
};

/// Descriptions of all supported models.
pub static SCARLETT_DEVICES: &[&ScarlettDeviceInfo] = &[
    // Gen 2 models.
    &S6I6_GEN2_INFO,
    &S18I8_GEN2_INFO,
    &S18I20_GEN2_INFO,
    // Gen 3 models.
    &SOLO_GEN3_INFO,
    &S2I2_GEN3_INFO,
    &S4I4_GEN3_INFO,
    &S8I6_GEN3_INFO,
    &S18I8_GEN3_INFO,
    &S18I20_GEN3_INFO,
];

/// Look up the description of a model by USB vendor and product identifiers.
pub fn detect_model(usb_id: (u16, u16)) -> Option<&'static ScarlettDeviceInfo> {
    SCARLETT_DEVICES
        .iter()
        .find(|info| info.usb_id.eq(&usb_id))
        .copied()
}

#[cfg(test)]
mod test {
    use super::*;

    fn canonical_rank(port_type: PortType) -> usize {
        match port_type {
            PortType::Pcm => 0,
            PortType::Analogue => 1,
            PortType::Spdif => 2,
            PortType::Adat => 3,
            PortType::Mix => 4,
            PortType::Talkback => 5,
            _ => usize::MAX,
        }
    }

    #[test]
    fn mux_tables_in_canonical_order() {
        SCARLETT_DEVICES.iter().for_each(|info| {
            info.mux_assignment.iter().for_each(|table| {
                let mut prev = None;
                let mut seen_none = false;
                table.iter().for_each(|entry| {
                    if entry.port_type == PortType::None {
                        seen_none = true;
                        return;
                    }
                    // Inactive slots appear at the tail only.
                    assert!(!seen_none, "{}: active slots after padding", info.name);

                    let rank = canonical_rank(entry.port_type);
                    assert!(rank < usize::MAX, "{}: unexpected port type", info.name);
                    if let Some(p) = prev {
                        assert!(rank > p, "{}: out of canonical order", info.name);
                    }
                    prev = Some(rank);
                });
            });
        });
    }

    #[test]
    fn mux_tables_cover_every_destination() {
        SCARLETT_DEVICES.iter().for_each(|info| {
            info.mux_assignment.iter().enumerate().for_each(|(band, table)| {
                let active: usize = table
                    .iter()
                    .filter(|entry| entry.port_type != PortType::None)
                    .map(|entry| entry.count as usize)
                    .sum();
                assert!(
                    active <= info.mux_dst_count(),
                    "{} band {}: more slots than destinations",
                    info.name,
                    band
                );
            });
        });
    }

    #[test]
    fn s18i20_gen3_table_sizes() {
        let info = detect_model((0x1235, 0x8215)).unwrap();
        assert_eq!(info.mux_table_size(0), 77);
        assert_eq!(info.mux_table_size(1), 73);
        assert_eq!(info.mux_table_size(2), 46);
    }

    #[test]
    fn no_model_declares_alias_types() {
        SCARLETT_DEVICES.iter().for_each(|info| {
            assert_eq!(info.port_count[PortType::Adat2 as usize], PortCounts::new(0, 0));
            info.mux_assignment.iter().for_each(|table| {
                assert!(table.iter().all(|entry| entry.port_type != PortType::Adat2));
            });
        });
    }

    #[test]
    fn port_id_conversions() {
        SCARLETT_DEVICES.iter().for_each(|info| {
            (0..info.mux_src_count()).for_each(|index| {
                let id = info.src_index_to_id(index);
                assert_eq!(
                    info.port_index_from_id(PortDirection::Input, id),
                    Some(index),
                    "{}: source {}",
                    info.name,
                    index
                );
            });
        });

        let info = detect_model((0x1235, 0x8201)).unwrap();
        // Flat index 0 is the None port.
        assert_eq!(info.src_index_to_id(0), 0x000);
        // The first analogue input follows it.
        assert_eq!(info.src_index_to_id(1), 0x080);
        // The first PCM output of the 18i20 Gen 2 comes after 10 analogue, 2 S/PDIF,
        // 8 ADAT, and 18 mixer destinations.
        assert_eq!(
            info.port_start(PortDirection::Output, PortType::Pcm),
            10 + 2 + 8 + 18
        );
    }

    #[test]
    fn every_model_resolvable() {
        [
            (0x1235, 0x8203),
            (0x1235, 0x8204),
            (0x1235, 0x8201),
            (0x1235, 0x8211),
            (0x1235, 0x8210),
            (0x1235, 0x8212),
            (0x1235, 0x8213),
            (0x1235, 0x8214),
            (0x1235, 0x8215),
        ]
        .iter()
        .for_each(|&usb_id| {
            assert!(detect_model(usb_id).is_some());
        });

        assert!(detect_model((0x1235, 0x8200)).is_none());
    }

    #[test]
    fn talkback_narrows_mix_rows() {
        let info = detect_model((0x1235, 0x8215)).unwrap();
        assert_eq!(info.mixer_output_count(), 12);
        assert_eq!(info.mixer_input_count(), 24);

        let info = detect_model((0x1235, 0x8204)).unwrap();
        assert_eq!(info.mixer_input_count(), 18);
    }
}
