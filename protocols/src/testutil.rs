// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Emulation of the vendor-specific interface for tests.

use {super::*, std::collections::VecDeque};

pub const TIMEOUT_MS: u32 = 100;

/// Scripted stand-in for one unit. Request frames are recorded verbatim, and response
/// frames are synthesized from the emulated state with the command code and sequence
/// number echoed the way real units do.
#[derive(Default)]
pub struct EmulatedUnit {
    /// Raw request frames in transmission order.
    pub requests: Vec<Vec<u8>>,
    /// The addressable data region, grown on demand.
    pub data: Vec<u8>,
    /// Activation codes received by `DATA_CMD`.
    pub data_cmds: Vec<u32>,
    /// Payloads of `SET_MIX` requests in transmission order.
    pub mix_payloads: Vec<Vec<u8>>,
    /// Payloads of `SET_MUX` requests in transmission order.
    pub mux_payloads: Vec<Vec<u8>>,
    /// Per-mix rows of linear values served to `GET_MIX`.
    pub mix_values: Vec<Vec<u16>>,
    /// Slots served to `GET_MUX`.
    pub mux_entries: Vec<u32>,
    /// Value served to `GET_SYNC`.
    pub sync: u32,
    /// Values served to `GET_METER`, cycled when short.
    pub meter_levels: Vec<u32>,
    /// Pending notification messages.
    pub notifications: VecDeque<Vec<u8>>,

    /// Respond with sequence number zero to the next request carrying one.
    pub respond_seq_zero_once: bool,
    /// Mangle the echoed sequence number.
    pub corrupt_seq: bool,
    /// Report the value in the error field of every response.
    pub respond_error: u32,

    pending_resp: VecDeque<Vec<u8>>,
}

impl EmulatedUnit {
    /// Place bytes in the emulated data region.
    pub fn preload_data(&mut self, offset: usize, bytes: &[u8]) {
        if self.data.len() < offset + bytes.len() {
            self.data.resize(offset + bytes.len(), 0);
        }
        self.data[offset..(offset + bytes.len())].copy_from_slice(bytes);
    }

    pub fn data_at(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..(offset + len)]
    }

    fn response_payload(&mut self, cmd: u32, req: &[u8]) -> Vec<u8> {
        match cmd {
            // INIT_1
            0x00000000 => vec![],
            // INIT_2
            0x00000002 => vec![0; 84],
            // GET_METER
            0x00001001 => {
                let count = deserialize_u16(&req[2..4]) as usize;
                let mut resp = vec![0u8; count * 4];
                (0..count).for_each(|i| {
                    let level = if self.meter_levels.is_empty() {
                        0
                    } else {
                        self.meter_levels[i % self.meter_levels.len()]
                    };
                    serialize_u32(level, &mut resp[(i * 4)..(i * 4 + 4)]);
                });
                resp
            }
            // GET_MIX
            0x00002001 => {
                let mix_num = deserialize_u16(&req[..2]) as usize;
                let count = deserialize_u16(&req[2..4]) as usize;
                let mut resp = vec![0u8; count * 2];
                (0..count).for_each(|i| {
                    let val = self
                        .mix_values
                        .get(mix_num)
                        .and_then(|row| row.get(i).copied())
                        .unwrap_or(0);
                    serialize_u16(val, &mut resp[(i * 2)..(i * 2 + 2)]);
                });
                resp
            }
            // SET_MIX
            0x00002002 => {
                self.mix_payloads.push(req.to_vec());
                vec![]
            }
            // GET_MUX
            0x00003001 => {
                let count = deserialize_u16(&req[2..4]) as usize;
                let mut resp = vec![0u8; count * 4];
                (0..count).for_each(|i| {
                    let entry = self.mux_entries.get(i).copied().unwrap_or(0);
                    serialize_u32(entry, &mut resp[(i * 4)..(i * 4 + 4)]);
                });
                resp
            }
            // SET_MUX
            0x00003002 => {
                self.mux_payloads.push(req.to_vec());
                vec![]
            }
            // GET_SYNC
            0x00006004 => self.sync.to_le_bytes().to_vec(),
            // GET_DATA
            0x00800000 => {
                let offset = deserialize_u32(&req[..4]) as usize;
                let size = deserialize_u32(&req[4..8]) as usize;
                if self.data.len() < offset + size {
                    self.data.resize(offset + size, 0);
                }
                self.data[offset..(offset + size)].to_vec()
            }
            // SET_DATA
            0x00800001 => {
                let offset = deserialize_u32(&req[..4]) as usize;
                let size = deserialize_u32(&req[4..8]) as usize;
                self.preload_data(offset, &req[8..(8 + size)]);
                vec![]
            }
            // DATA_CMD
            0x00800002 => {
                self.data_cmds.push(deserialize_u32(&req[..4]));
                vec![]
            }
            _ => vec![],
        }
    }
}

impl ScarlettUsbIo for EmulatedUnit {
    fn write_request(&mut self, frame: &[u8], _: u32) -> Result<(), Error> {
        let cmd = deserialize_u32(&frame[..4]);
        let req_seq = deserialize_u16(&frame[6..8]);

        self.requests.push(frame.to_vec());

        let payload = self.response_payload(cmd, &frame[16..]);

        let seq = if self.corrupt_seq {
            req_seq.wrapping_add(100)
        } else if self.respond_seq_zero_once && req_seq == 1 {
            self.respond_seq_zero_once = false;
            0
        } else {
            req_seq
        };

        let mut resp = vec![0u8; 16 + payload.len()];
        serialize_u32(cmd, &mut resp[..4]);
        serialize_u16(payload.len() as u16, &mut resp[4..6]);
        serialize_u16(seq, &mut resp[6..8]);
        serialize_u32(self.respond_error, &mut resp[8..12]);
        resp[16..].copy_from_slice(&payload);

        self.pending_resp.push_back(resp);

        Ok(())
    }

    fn read_response(&mut self, request: u32, frame: &mut [u8], _: u32) -> Result<(), Error> {
        if request == transaction::USB_CMD_INIT {
            frame.fill(0);
            return Ok(());
        }

        let resp = self
            .pending_resp
            .pop_front()
            .ok_or_else(|| Error::new(ScarlettProtocolError::Transport, "no request in flight"))?;

        let len = std::cmp::min(frame.len(), resp.len());
        frame[..len].copy_from_slice(&resp[..len]);

        Ok(())
    }

    fn read_notification(&mut self, frame: &mut [u8], _: u32) -> Result<usize, Error> {
        match self.notifications.pop_front() {
            Some(msg) => {
                let len = std::cmp::min(frame.len(), msg.len());
                frame[..len].copy_from_slice(&msg[..len]);
                Ok(len)
            }
            None => Ok(0),
        }
    }
}
