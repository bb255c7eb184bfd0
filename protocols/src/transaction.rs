// SPDX-License-Identifier: LGPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Framing and sequencing of the vendor-specific request/response protocol.
//!
//! Every exchange is a pair of control transfers; an OUT transfer carrying a 16 byte
//! header followed by the request payload, then an IN transfer receiving a frame of the
//! same shape. The unit echoes command code and sequence number, and reports failure in
//! the error field of the header. Bulk data is moved by `GET_DATA`/`SET_DATA` commands
//! split into chunks, and staged changes are promoted by `DATA_CMD` with an activation
//! code.

use {super::*, std::sync::Mutex};

/// Control request code for the raw initialization read.
pub const USB_CMD_INIT: u32 = 0x00000000;
/// Control request code for OUT transfers carrying request frames.
pub const USB_CMD_REQ: u32 = 0x00000002;
/// Control request code for IN transfers receiving response frames.
pub const USB_CMD_RESP: u32 = 0x00000003;

const USB_INIT_1: u32 = 0x00000000;
const USB_INIT_2: u32 = 0x00000002;
pub(crate) const USB_GET_METER: u32 = 0x00001001;
pub(crate) const USB_GET_MIX: u32 = 0x00002001;
pub(crate) const USB_SET_MIX: u32 = 0x00002002;
pub(crate) const USB_GET_MUX: u32 = 0x00003001;
pub(crate) const USB_SET_MUX: u32 = 0x00003002;
pub(crate) const USB_GET_SYNC: u32 = 0x00006004;
const USB_GET_DATA: u32 = 0x00800000;
const USB_SET_DATA: u32 = 0x00800001;
const USB_DATA_CMD: u32 = 0x00800002;

/// Argument to `DATA_CMD` requesting the unit to persist its RAM state to NVRAM.
const USB_CONFIG_SAVE: u32 = 0x00000006;

const INIT_READ_SIZE: usize = 24;
const INIT_2_RESP_SIZE: usize = 84;

/// The maximum size of payload moved by one `GET_DATA`/`SET_DATA` exchange.
const DATA_CHUNK_MAX: usize = 1024;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
struct PacketHeader {
    cmd: u32,
    size: u16,
    seq: u16,
    error: u32,
    pad: u32,
}

impl PacketHeader {
    const SIZE: usize = 16;
}

fn serialize_packet_header(header: &PacketHeader, raw: &mut [u8]) {
    serialize_u32(header.cmd, &mut raw[..4]);
    serialize_u16(header.size, &mut raw[4..6]);
    serialize_u16(header.seq, &mut raw[6..8]);
    serialize_u32(header.error, &mut raw[8..12]);
    serialize_u32(header.pad, &mut raw[12..16]);
}

fn deserialize_packet_header(header: &mut PacketHeader, raw: &[u8]) {
    header.cmd = deserialize_u32(&raw[..4]);
    header.size = deserialize_u16(&raw[4..6]);
    header.seq = deserialize_u16(&raw[6..8]);
    header.error = deserialize_u32(&raw[8..12]);
    header.pad = deserialize_u32(&raw[12..16]);
}

struct Wire<T: ScarlettUsbIo> {
    io: T,
    seq: u16,
}

/// Serialized access to the request/response exchange of one unit.
///
/// The structure owns the I/O handle behind a mutex so that at most one exchange is in
/// flight, and allocates one sequence number per request.
pub struct ScarlettTransaction<T: ScarlettUsbIo> {
    wire: Mutex<Wire<T>>,
}

fn transaction<T: ScarlettUsbIo>(
    wire: &mut Wire<T>,
    cmd: u32,
    req_data: &[u8],
    resp_data: &mut [u8],
    timeout_ms: u32,
) -> Result<(), Error> {
    let seq = wire.seq;
    wire.seq = wire.seq.wrapping_add(1);

    let req_header = PacketHeader {
        cmd,
        size: req_data.len() as u16,
        seq,
        error: 0,
        pad: 0,
    };

    let mut req = vec![0u8; PacketHeader::SIZE + req_data.len()];
    serialize_packet_header(&req_header, &mut req);
    req[PacketHeader::SIZE..].copy_from_slice(req_data);

    wire.io.write_request(&req, timeout_ms)?;

    let mut resp = vec![0u8; PacketHeader::SIZE + resp_data.len()];
    wire.io.read_response(USB_CMD_RESP, &mut resp, timeout_ms)?;

    let mut resp_header = PacketHeader::default();
    deserialize_packet_header(&mut resp_header, &resp);

    // The command code, sequence number, and payload size should be echoed, except that
    // the response to the first request of a session may carry sequence number zero.
    if resp_header.cmd != req_header.cmd
        || (resp_header.seq != req_header.seq && !(req_header.seq == 1 && resp_header.seq == 0))
        || resp_header.size as usize != resp_data.len()
        || resp_header.error != 0
        || resp_header.pad != 0
    {
        let msg = format!(
            "invalid response; cmd tx/rx {:08x}/{:08x} seq {}/{} size {}/{} error {} pad {}",
            req_header.cmd,
            resp_header.cmd,
            req_header.seq,
            resp_header.seq,
            resp_data.len(),
            resp_header.size,
            resp_header.error,
            resp_header.pad,
        );
        return Err(Error::new(ScarlettProtocolError::Protocol, &msg));
    }

    resp_data.copy_from_slice(&resp[PacketHeader::SIZE..]);

    Ok(())
}

impl<T: ScarlettUsbIo> ScarlettTransaction<T> {
    pub fn new(io: T) -> Self {
        Self {
            wire: Mutex::new(Wire { io, seq: 0 }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Wire<T>>, Error> {
        self.wire
            .lock()
            .map_err(|_| Error::new(ScarlettProtocolError::Fatal, "wire lock poisoned"))
    }

    /// Issue one request and receive the validated response payload.
    pub(crate) fn request(
        &self,
        cmd: u32,
        req_data: &[u8],
        resp_data: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), Error> {
        let mut wire = self.lock()?;
        transaction(&mut wire, cmd, req_data, resp_data, timeout_ms)
    }

    /// Perform the initialization sequence of the unit. Any failure leaves the unit in
    /// unusable state and should abort attach.
    pub fn init(&self, timeout_ms: u32) -> Result<(), Error> {
        let mut wire = self.lock()?;

        // The first read uses its own request code and its content is discarded.
        let mut raw = [0u8; INIT_READ_SIZE];
        wire.io
            .read_response(USB_CMD_INIT, &mut raw, timeout_ms)
            .map_err(|e| Error::new(ScarlettProtocolError::Fatal, &e.to_string()))?;

        wire.seq = 1;
        transaction(&mut wire, USB_INIT_1, &[], &mut [], timeout_ms)?;

        wire.seq = 1;
        let mut resp = [0u8; INIT_2_RESP_SIZE];
        transaction(&mut wire, USB_INIT_2, &[], &mut resp, timeout_ms)?;

        Ok(())
    }

    /// Read data at the offset of the addressable region of the unit, split into chunks
    /// when needed.
    pub fn read_data(&self, offset: u32, buf: &mut [u8], timeout_ms: u32) -> Result<(), Error> {
        let mut pos = 0;

        while pos < buf.len() {
            let len = std::cmp::min(buf.len() - pos, DATA_CHUNK_MAX);

            let mut req = [0u8; 8];
            serialize_u32(offset + pos as u32, &mut req[..4]);
            serialize_u32(len as u32, &mut req[4..8]);

            self.request(USB_GET_DATA, &req, &mut buf[pos..(pos + len)], timeout_ms)?;

            pos += len;
        }

        Ok(())
    }

    /// Write data at the offset of the addressable region of the unit, split into
    /// chunks when needed.
    pub fn write_data(&self, offset: u32, data: &[u8], timeout_ms: u32) -> Result<(), Error> {
        let mut pos = 0;

        while pos < data.len() {
            let len = std::cmp::min(data.len() - pos, DATA_CHUNK_MAX);

            let mut req = vec![0u8; 8 + len];
            serialize_u32(offset + pos as u32, &mut req[..4]);
            serialize_u32(len as u32, &mut req[4..8]);
            req[8..].copy_from_slice(&data[pos..(pos + len)]);

            self.request(USB_SET_DATA, &req, &mut [], timeout_ms)?;

            pos += len;
        }

        Ok(())
    }

    /// Promote staged changes in the unit by the activation code.
    pub fn data_cmd(&self, code: u32, timeout_ms: u32) -> Result<(), Error> {
        let mut req = [0u8; 4];
        serialize_u32(code, &mut req);
        self.request(USB_DATA_CMD, &req, &mut [], timeout_ms)
    }

    /// Request the unit to persist its RAM state to NVRAM. This is the only operation
    /// which writes to NVRAM.
    pub fn save_config(&self, timeout_ms: u32) -> Result<(), Error> {
        self.data_cmd(USB_CONFIG_SAVE, timeout_ms)
    }

    /// Run a closure against the I/O handle; for tests against emulated units.
    #[cfg(any(test, feature = "testutil"))]
    pub fn with_io<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut wire = self.wire.lock().unwrap();
        f(&mut wire.io)
    }
}

#[cfg(test)]
mod test {
    use {super::*, crate::testutil::*};

    #[test]
    fn header_serdes() {
        let header = PacketHeader {
            cmd: USB_GET_MUX,
            size: 0x1234,
            seq: 0x00ff,
            error: 0,
            pad: 0,
        };

        let mut raw = [0u8; PacketHeader::SIZE];
        serialize_packet_header(&header, &mut raw);

        assert_eq!(
            raw,
            [0x01, 0x30, 0x00, 0x00, 0x34, 0x12, 0xff, 0x00, 0, 0, 0, 0, 0, 0, 0, 0]
        );

        let mut h = PacketHeader::default();
        deserialize_packet_header(&mut h, &raw);

        assert_eq!(header, h);
    }

    #[test]
    fn sequence_allocation() {
        let conn = ScarlettTransaction::new(EmulatedUnit::default());

        conn.init(TIMEOUT_MS).unwrap();

        // The two initialization exchanges both carry sequence number 1, then the
        // counter continues from there.
        (0..4).for_each(|_| conn.data_cmd(99, TIMEOUT_MS).unwrap());

        let wire = conn.wire.lock().unwrap();
        let seqs: Vec<u16> = wire
            .io
            .requests
            .iter()
            .map(|frame| deserialize_u16(&frame[6..8]))
            .collect();
        assert_eq!(seqs, vec![1, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn seq_zero_accepted_for_first_exchange() {
        let mut unit = EmulatedUnit::default();
        unit.respond_seq_zero_once = true;

        let conn = ScarlettTransaction::new(unit);
        conn.init(TIMEOUT_MS).unwrap();
    }

    #[test]
    fn stale_response_detected() {
        let mut unit = EmulatedUnit::default();
        unit.corrupt_seq = true;

        let conn = ScarlettTransaction::new(unit);
        conn.init(TIMEOUT_MS).unwrap_err();
    }

    #[test]
    fn error_field_detected() {
        let mut unit = EmulatedUnit::default();
        unit.respond_error = 0x80000001;

        let conn = ScarlettTransaction::new(unit);
        let err = conn.data_cmd(2, TIMEOUT_MS).unwrap_err();
        assert_eq!(
            err.kind::<ScarlettProtocolError>(),
            Some(ScarlettProtocolError::Protocol)
        );
    }

    #[test]
    fn data_chunking() {
        let conn = ScarlettTransaction::new(EmulatedUnit::default());

        let image: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
        conn.write_data(0x100, &image, TIMEOUT_MS).unwrap();

        {
            let wire = conn.wire.lock().unwrap();
            // 2500 bytes split into 1024 + 1024 + 452.
            assert_eq!(wire.io.requests.len(), 3);
            assert_eq!(deserialize_u32(&wire.io.requests[0][16..20]), 0x100);
            assert_eq!(deserialize_u32(&wire.io.requests[0][20..24]), 1024);
            assert_eq!(deserialize_u32(&wire.io.requests[1][16..20]), 0x500);
            assert_eq!(deserialize_u32(&wire.io.requests[2][16..20]), 0x900);
            assert_eq!(deserialize_u32(&wire.io.requests[2][20..24]), 452);
        }

        let mut buf = vec![0u8; image.len()];
        conn.read_data(0x100, &mut buf, TIMEOUT_MS).unwrap();
        assert_eq!(buf, image);
    }
}
