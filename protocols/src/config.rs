// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Named configuration items of the unit.
//!
//! Each item is a run of bytes at a fixed offset of the addressable data region,
//! written by `SET_DATA` and promoted to live state by `DATA_CMD` with the activation
//! code of the item. The location table differs per generation; the model description
//! selects one of three sets.

use {super::*, crate::transaction::ScarlettTransaction};

/// Configuration items addressable by name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfigItem {
    /// States of dim and mute buttons.
    DimMute,
    /// Software volume of each analogue output.
    LineOutVolume,
    /// Mute of each analogue output.
    MuteSwitch,
    /// Whether volume of each analogue output follows the hardware master knob.
    SwHwSwitch,
    /// Line/instrument level of switchable analogue inputs.
    LevelSwitch,
    /// 10 dB pad of switchable analogue inputs.
    PadSwitch,
    /// Air of switchable analogue inputs.
    AirSwitch,
    /// Phantom power groups.
    PhantomSwitch,
    /// Whether phantom power state is kept over power cycles.
    PhantomPersistence,
    /// Mass-storage mode at next power on.
    MsdSwitch,
    /// Direct monitor of small desktop models.
    DirectMonitor,
    /// Whether main/alternate speaker switching is in use.
    SpeakerSwitchingEnable,
    /// Selection of main or alternate speakers.
    SpeakerSwitching,
    /// The set of mixes the talkback microphone is injected into.
    TalkbackMap,
    /// Color of gain halos.
    GainHaloColor,
}

/// Location, size, and activation code of one configuration item.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub offset: u16,
    pub size: u8,
    pub activate: u8,
}

const fn location(offset: u16, size: u8, activate: u8) -> ConfigLocation {
    ConfigLocation {
        offset,
        size,
        activate,
    }
}

/// The set of configuration items of one generation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfigSet {
    /// Gen 2 models.
    Gen2,
    /// Gen 3 desktop models without the mixer (Solo, 2i2).
    Gen3Small,
    /// The remaining Gen 3 models.
    Gen3Large,
}

const GEN2_ITEMS: &[(ConfigItem, ConfigLocation)] = &[
    (ConfigItem::DimMute, location(0x31, 1, 2)),
    (ConfigItem::LineOutVolume, location(0x34, 2, 1)),
    (ConfigItem::MuteSwitch, location(0x5c, 1, 1)),
    (ConfigItem::SwHwSwitch, location(0x66, 1, 3)),
    (ConfigItem::LevelSwitch, location(0x7c, 1, 7)),
    (ConfigItem::PadSwitch, location(0x84, 1, 8)),
];

const GEN3_SMALL_ITEMS: &[(ConfigItem, ConfigLocation)] = &[
    (ConfigItem::MsdSwitch, location(0x04, 1, 6)),
    (ConfigItem::PhantomPersistence, location(0x05, 1, 6)),
    (ConfigItem::PhantomSwitch, location(0x06, 1, 3)),
    (ConfigItem::DirectMonitor, location(0x07, 1, 4)),
    (ConfigItem::LevelSwitch, location(0x08, 1, 7)),
    (ConfigItem::AirSwitch, location(0x09, 1, 8)),
    (ConfigItem::GainHaloColor, location(0x0a, 1, 9)),
];

const GEN3_LARGE_ITEMS: &[(ConfigItem, ConfigLocation)] = &[
    (ConfigItem::DimMute, location(0x31, 1, 2)),
    (ConfigItem::LineOutVolume, location(0x34, 2, 1)),
    (ConfigItem::MuteSwitch, location(0x5c, 1, 1)),
    (ConfigItem::SwHwSwitch, location(0x66, 1, 3)),
    (ConfigItem::LevelSwitch, location(0x7c, 1, 7)),
    (ConfigItem::PadSwitch, location(0x84, 1, 8)),
    (ConfigItem::AirSwitch, location(0x8c, 1, 8)),
    (ConfigItem::PhantomSwitch, location(0x9a, 1, 8)),
    (ConfigItem::MsdSwitch, location(0x9d, 1, 6)),
    (ConfigItem::PhantomPersistence, location(0x9e, 1, 6)),
    (ConfigItem::SpeakerSwitchingEnable, location(0x9f, 1, 10)),
    (ConfigItem::SpeakerSwitching, location(0xa0, 1, 11)),
    (ConfigItem::GainHaloColor, location(0xa8, 1, 9)),
    (ConfigItem::TalkbackMap, location(0xb0, 2, 10)),
];

impl ConfigSet {
    fn items(&self) -> &'static [(ConfigItem, ConfigLocation)] {
        match self {
            Self::Gen2 => GEN2_ITEMS,
            Self::Gen3Small => GEN3_SMALL_ITEMS,
            Self::Gen3Large => GEN3_LARGE_ITEMS,
        }
    }

    /// The location of the item, when the set has it.
    pub fn find(&self, item: ConfigItem) -> Option<&'static ConfigLocation> {
        self.items()
            .iter()
            .find(|(i, _)| i.eq(&item))
            .map(|(_, location)| location)
    }
}

fn config_location(set: ConfigSet, item: ConfigItem) -> Result<&'static ConfigLocation, Error> {
    set.find(item).ok_or_else(|| {
        let msg = format!("configuration item {:?} not in {:?}", item, set);
        Error::new(ScarlettProtocolError::Unsupported, &msg)
    })
}

/// Write one indexed value of the configuration item and promote it to live state.
///
/// Callers are expected to cancel any pending NVRAM save beforehand and to schedule one
/// afterwards.
pub fn write_config<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    set: ConfigSet,
    item: ConfigItem,
    index: usize,
    value: i32,
    timeout_ms: u32,
) -> Result<(), Error> {
    let location = config_location(set, item)?;

    let offset = location.offset as u32 + (index * location.size as usize) as u32;
    let raw = value.to_le_bytes();
    conn.write_data(offset, &raw[..location.size as usize], timeout_ms)?;

    if location.activate > 0 {
        conn.data_cmd(location.activate as u32, timeout_ms)?;
    }

    Ok(())
}

/// Read contiguous values of the configuration item into the buffer.
pub fn read_config<T: ScarlettUsbIo>(
    conn: &ScarlettTransaction<T>,
    set: ConfigSet,
    item: ConfigItem,
    buf: &mut [u8],
    timeout_ms: u32,
) -> Result<(), Error> {
    let location = config_location(set, item)?;
    conn.read_data(location.offset as u32, buf, timeout_ms)
}

#[cfg(test)]
mod test {
    use {super::*, crate::testutil::*};

    #[test]
    fn item_lookup_per_set() {
        assert!(ConfigSet::Gen2.find(ConfigItem::PadSwitch).is_some());
        assert!(ConfigSet::Gen2.find(ConfigItem::AirSwitch).is_none());
        assert!(ConfigSet::Gen3Small.find(ConfigItem::DirectMonitor).is_some());
        assert!(ConfigSet::Gen3Small.find(ConfigItem::LineOutVolume).is_none());
        assert!(ConfigSet::Gen3Large.find(ConfigItem::TalkbackMap).is_some());
    }

    #[test]
    fn locations_do_not_overlap() {
        [ConfigSet::Gen2, ConfigSet::Gen3Small, ConfigSet::Gen3Large]
            .iter()
            .for_each(|set| {
                let items = set.items();
                items.iter().enumerate().for_each(|(i, (_, a))| {
                    items.iter().skip(i + 1).for_each(|(_, b)| {
                        let (first, second) = if a.offset < b.offset { (a, b) } else { (b, a) };
                        assert!(
                            first.offset + first.size as u16 <= second.offset,
                            "{:?}: {:?} overlaps {:?}",
                            set,
                            first,
                            second
                        );
                    });
                });
            });
    }

    #[test]
    fn write_with_activation() {
        let conn = ScarlettTransaction::new(EmulatedUnit::default());

        write_config(
            &conn,
            ConfigSet::Gen2,
            ConfigItem::LineOutVolume,
            3,
            -10,
            TIMEOUT_MS,
        )
        .unwrap();

        conn.with_io(|unit| {
            // Offset 0x34 + 3 * 2, two bytes of the value in little endian.
            assert_eq!(unit.data_at(0x3a, 2), &(-10i16).to_le_bytes());
            assert_eq!(unit.data_cmds, vec![1]);
        });
    }

    #[test]
    fn unsupported_item_reported() {
        let conn = ScarlettTransaction::new(EmulatedUnit::default());

        let err = write_config(
            &conn,
            ConfigSet::Gen3Small,
            ConfigItem::PadSwitch,
            0,
            1,
            TIMEOUT_MS,
        )
        .unwrap_err();
        assert_eq!(
            err.kind::<ScarlettProtocolError>(),
            Some(ScarlettProtocolError::Unsupported)
        );
    }

    #[test]
    fn bulk_read() {
        let conn = ScarlettTransaction::new(EmulatedUnit::default());
        conn.with_io(|unit| unit.preload_data(0x7c, &[1, 0]));

        let mut buf = [0u8; 2];
        read_config(
            &conn,
            ConfigSet::Gen2,
            ConfigItem::LevelSwitch,
            &mut buf,
            TIMEOUT_MS,
        )
        .unwrap();
        assert_eq!(buf, [1, 0]);
    }
}
