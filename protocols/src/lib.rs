// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

#![doc = include_str!("../README.md")]

pub mod config;
pub mod mixer;
pub mod model;
pub mod mux;
pub mod status;
pub mod sw_cfg;
pub mod transaction;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

use glib::{error::ErrorDomain, Error, Quark};

/// Bias applied to analogue output volumes so that the maximum of the scale expresses 0 dB.
pub const VOLUME_BIAS: i32 = 127;

/// The maximum number of analogue outputs in supported models.
pub const ANALOGUE_OUTPUT_MAX: usize = 10;

/// The number of dim/mute buttons in models with hardware-controlled monitor volume.
pub const DIM_MUTE_COUNT: usize = 2;

/// The type of hardware port addressable by the signal multiplexer.
///
/// The declaration order decides how ports are concatenated into flat per-direction
/// indices. `Adat2` is an alias of `Adat` kept for old firmware descriptions; no
/// supported model declares ports of it and no multiplexer table emits it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PortType {
    None,
    Analogue,
    Spdif,
    Adat,
    Adat2,
    Mix,
    Pcm,
    InternalMic,
    Talkback,
}

impl PortType {
    /// The base of hardware identifiers for ports of the type. The identifier of the
    /// n-th port is the base plus n, and fits in the 12 bit field of multiplexer slots.
    pub fn id_base(&self) -> u16 {
        match self {
            Self::None => 0x000,
            Self::Analogue => 0x080,
            Self::Spdif => 0x180,
            Self::Adat | Self::Adat2 => 0x200,
            Self::Mix => 0x300,
            Self::Pcm => 0x600,
            Self::InternalMic => 0x900,
            Self::Talkback => 0xb00,
        }
    }
}

/// The number of port types.
pub const PORT_TYPE_COUNT: usize = 9;

/// All port types, in the order deciding flat per-direction indices.
pub const PORT_TYPES: [PortType; PORT_TYPE_COUNT] = [
    PortType::None,
    PortType::Analogue,
    PortType::Spdif,
    PortType::Adat,
    PortType::Adat2,
    PortType::Mix,
    PortType::Pcm,
    PortType::InternalMic,
    PortType::Talkback,
];

/// The direction of signal against the signal multiplexer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PortDirection {
    /// Sources of the multiplexer.
    Input,
    /// Destinations of the multiplexer.
    Output,
}

/// The number of sources and destinations of one port type in a model.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct PortCounts {
    pub input: u8,
    pub output: u8,
}

impl PortCounts {
    pub(crate) const fn new(input: u8, output: u8) -> Self {
        Self { input, output }
    }
}

/// Any error of the vendor-specific control protocol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScarlettProtocolError {
    /// Mismatch of framing, echo, size, or error field in a response message.
    Protocol,
    /// Failure of USB transfer itself.
    Transport,
    /// A value out of the permitted range.
    Range,
    /// A configuration item absent in the model.
    Unsupported,
    /// Mismatch against the persisted software configuration image.
    Integrity,
    /// Failure of the initialization sequence.
    Fatal,
    Invalid(i32),
}

impl std::fmt::Display for ScarlettProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let msg = match self {
            Self::Protocol => "protocol",
            Self::Transport => "transport",
            Self::Range => "range",
            Self::Unsupported => "unsupported",
            Self::Integrity => "integrity",
            Self::Fatal => "fatal",
            Self::Invalid(_) => "invalid",
        };

        write!(f, "ScarlettProtocolError::{}", msg)
    }
}

impl ErrorDomain for ScarlettProtocolError {
    fn domain() -> Quark {
        Quark::from_str("scarlett-usb-protocol-error-quark")
    }

    fn code(self) -> i32 {
        match self {
            Self::Protocol => 0,
            Self::Transport => 1,
            Self::Range => 2,
            Self::Unsupported => 3,
            Self::Integrity => 4,
            Self::Fatal => 5,
            Self::Invalid(v) => v,
        }
    }

    fn from(code: i32) -> Option<Self> {
        let enumeration = match code {
            0 => Self::Protocol,
            1 => Self::Transport,
            2 => Self::Range,
            3 => Self::Unsupported,
            4 => Self::Integrity,
            5 => Self::Fatal,
            _ => Self::Invalid(code),
        };
        Some(enumeration)
    }
}

/// Narrow interface to the vendor-specific interface of the unit.
///
/// One logical exchange of the protocol is a pair of class-specific control transfers;
/// an OUT transfer carrying the request frame, then an IN transfer receiving the
/// response frame. Asynchronous notification messages arrive at an interrupt endpoint
/// of the same interface.
pub trait ScarlettUsbIo {
    /// Transfer request frame to the unit by OUT control transfer.
    fn write_request(&mut self, frame: &[u8], timeout_ms: u32) -> Result<(), Error>;

    /// Transfer response frame from the unit by IN control transfer with the given
    /// request code.
    fn read_response(&mut self, request: u32, frame: &mut [u8], timeout_ms: u32)
        -> Result<(), Error>;

    /// Read one message from the notification endpoint, returning its length.
    fn read_notification(&mut self, frame: &mut [u8], timeout_ms: u32) -> Result<usize, Error>;
}

pub(crate) fn serialize_u16(val: u16, raw: &mut [u8]) {
    raw[..2].copy_from_slice(&val.to_le_bytes());
}

pub(crate) fn deserialize_u16(raw: &[u8]) -> u16 {
    u16::from_le_bytes([raw[0], raw[1]])
}

pub(crate) fn serialize_u32(val: u32, raw: &mut [u8]) {
    raw[..4].copy_from_slice(&val.to_le_bytes());
}

pub(crate) fn deserialize_u32(raw: &[u8]) -> u32 {
    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
}

pub(crate) fn deserialize_i16(raw: &[u8]) -> i16 {
    i16::from_le_bytes([raw[0], raw[1]])
}
