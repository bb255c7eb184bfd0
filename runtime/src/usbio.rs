// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2024 Takashi Sakamoto

//! Access to the vendor-specific interface of the unit by the character device of Linux
//! USB subsystem.
//!
//! The unit is already enumerated and bound to the class-compliant audio function; the
//! service claims the additional vendor-specific interface (class 0xff) and moves the
//! control protocol over it, with notification messages read from its IN interrupt
//! endpoint.

use {
    super::*,
    scarlett_usb_protocols::transaction::{USB_CMD_INIT, USB_CMD_REQ, USB_CMD_RESP},
    std::{
        fs::{File, OpenOptions},
        io::Read,
        os::unix::io::AsRawFd,
        sync::Arc,
    },
    tracing::debug,
};

const USB_DIR_IN: u8 = 0x80;
const USB_TYPE_CLASS: u8 = 0x20;
const USB_RECIP_INTERFACE: u8 = 0x01;

const USB_DT_INTERFACE: u8 = 0x04;
const USB_DT_ENDPOINT: u8 = 0x05;
const USB_CLASS_VENDOR_SPEC: u8 = 0xff;
const USB_ENDPOINT_XFER_INT: u8 = 0x03;

#[repr(C)]
struct UsbDevfsCtrlTransfer {
    request_type: u8,
    request: u8,
    value: u16,
    index: u16,
    length: u16,
    timeout: u32,
    data: *mut libc::c_void,
}

#[repr(C)]
struct UsbDevfsBulkTransfer {
    ep: libc::c_uint,
    len: libc::c_uint,
    timeout: libc::c_uint,
    data: *mut libc::c_void,
}

nix::ioctl_readwrite!(usbdevfs_control, b'U', 0, UsbDevfsCtrlTransfer);
nix::ioctl_readwrite!(usbdevfs_bulk, b'U', 2, UsbDevfsBulkTransfer);
nix::ioctl_read!(usbdevfs_claiminterface, b'U', 15, libc::c_uint);

fn transport_err(ctx: &str, errno: nix::errno::Errno) -> Error {
    let msg = format!("{}: {}", ctx, errno);
    Error::new(ScarlettProtocolError::Transport, &msg)
}

struct UsbDeviceInner {
    file: File,
    usb_id: (u16, u16),
    iface: u8,
    ep_address: u8,
    max_packet_size: u16,
    interval: u8,
}

/// Handle to the vendor-specific interface of one unit, sharable between the exchange
/// path and the notification reader.
#[derive(Clone)]
pub struct ScarlettUsbDevice {
    inner: Arc<UsbDeviceInner>,
}

impl ScarlettUsbDevice {
    /// Open the character device, locate the vendor-specific interface in the raw
    /// descriptors, and claim it.
    pub fn open(path: &str) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                let msg = format!("{}: {}", path, e);
                Error::new(ScarlettProtocolError::Transport, &msg)
            })?;

        let mut descriptors = Vec::new();
        (&file)
            .read_to_end(&mut descriptors)
            .map_err(|e| Error::new(ScarlettProtocolError::Transport, &e.to_string()))?;

        if descriptors.len() < 18 {
            return Err(Error::new(
                ScarlettProtocolError::Transport,
                "short device descriptor",
            ));
        }

        let usb_id = (
            u16::from_le_bytes([descriptors[8], descriptors[9]]),
            u16::from_le_bytes([descriptors[10], descriptors[11]]),
        );

        let (iface, ep_address, max_packet_size, interval) =
            find_vendor_interface(&descriptors).ok_or_else(|| {
                Error::new(
                    ScarlettProtocolError::Transport,
                    "no vendor-specific interface with interrupt endpoint",
                )
            })?;

        let mut num = iface as libc::c_uint;
        unsafe { usbdevfs_claiminterface(file.as_raw_fd(), &mut num) }
            .map_err(|errno| transport_err("claim interface", errno))?;

        debug!(?usb_id, iface, ep_address, max_packet_size, interval);

        let inner = UsbDeviceInner {
            file,
            usb_id,
            iface,
            ep_address,
            max_packet_size,
            interval,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn usb_id(&self) -> (u16, u16) {
        self.inner.usb_id
    }

    pub fn notification_packet_size(&self) -> usize {
        self.inner.max_packet_size as usize
    }

    fn control_msg(
        &self,
        request_type: u8,
        request: u8,
        frame: *mut libc::c_void,
        length: u16,
        timeout_ms: u32,
    ) -> Result<usize, Error> {
        let mut transfer = UsbDevfsCtrlTransfer {
            request_type,
            request,
            value: 0,
            index: self.inner.iface as u16,
            length,
            timeout: timeout_ms,
            data: frame,
        };

        unsafe { usbdevfs_control(self.inner.file.as_raw_fd(), &mut transfer) }
            .map(|len| len as usize)
            .map_err(|errno| transport_err("control transfer", errno))
    }
}

/// Walk the raw descriptors for the first vendor-specific interface and its IN
/// interrupt endpoint.
fn find_vendor_interface(descriptors: &[u8]) -> Option<(u8, u8, u16, u8)> {
    let mut pos = 0;
    let mut in_vendor_iface = None;

    while pos + 2 <= descriptors.len() {
        let length = descriptors[pos] as usize;
        if length < 2 || pos + length > descriptors.len() {
            break;
        }
        let desc = &descriptors[pos..(pos + length)];

        match desc[1] {
            USB_DT_INTERFACE if length >= 9 => {
                in_vendor_iface = if desc[5] == USB_CLASS_VENDOR_SPEC {
                    Some(desc[2])
                } else {
                    None
                };
            }
            USB_DT_ENDPOINT if length >= 7 => {
                if let Some(iface) = in_vendor_iface {
                    let address = desc[2];
                    let attributes = desc[3];
                    if address & USB_DIR_IN > 0
                        && attributes & 0x03 == USB_ENDPOINT_XFER_INT
                    {
                        let max_packet_size = u16::from_le_bytes([desc[4], desc[5]]);
                        let interval = desc[6];
                        return Some((iface, address, max_packet_size, interval));
                    }
                }
            }
            _ => (),
        }

        pos += length;
    }

    None
}

impl ScarlettUsbIo for ScarlettUsbDevice {
    fn write_request(&mut self, frame: &[u8], timeout_ms: u32) -> Result<(), Error> {
        let request_type = USB_TYPE_CLASS | USB_RECIP_INTERFACE;
        let len = self.control_msg(
            request_type,
            USB_CMD_REQ as u8,
            frame.as_ptr() as *mut libc::c_void,
            frame.len() as u16,
            timeout_ms,
        )?;

        if len != frame.len() {
            let msg = format!("request result was {} while {} is expected", len, frame.len());
            return Err(Error::new(ScarlettProtocolError::Transport, &msg));
        }

        Ok(())
    }

    fn read_response(&mut self, request: u32, frame: &mut [u8], timeout_ms: u32)
        -> Result<(), Error> {
        let request_type = USB_DIR_IN | USB_TYPE_CLASS | USB_RECIP_INTERFACE;
        let request = match request {
            USB_CMD_INIT => USB_CMD_INIT as u8,
            _ => USB_CMD_RESP as u8,
        };
        let len = self.control_msg(
            request_type,
            request,
            frame.as_mut_ptr() as *mut libc::c_void,
            frame.len() as u16,
            timeout_ms,
        )?;

        if len != frame.len() {
            let msg = format!(
                "response result was {} while {} is expected",
                len,
                frame.len()
            );
            return Err(Error::new(ScarlettProtocolError::Transport, &msg));
        }

        Ok(())
    }

    fn read_notification(&mut self, frame: &mut [u8], timeout_ms: u32) -> Result<usize, Error> {
        let mut transfer = UsbDevfsBulkTransfer {
            ep: self.inner.ep_address as libc::c_uint,
            len: frame.len() as libc::c_uint,
            timeout: timeout_ms as libc::c_uint,
            data: frame.as_mut_ptr() as *mut libc::c_void,
        };

        match unsafe { usbdevfs_bulk(self.inner.file.as_raw_fd(), &mut transfer) } {
            Ok(len) => Ok(len as usize),
            Err(nix::errno::Errno::ETIMEDOUT) => Ok(0),
            Err(errno) => Err(transport_err("interrupt transfer", errno)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vendor_interface_discovery() {
        let mut descriptors = vec![0u8; 18];
        descriptors[0] = 18;
        descriptors[1] = 0x01;

        // Configuration descriptor header.
        descriptors.extend_from_slice(&[9, 0x02, 60, 0, 2, 1, 0, 0x80, 50]);
        // An audio interface to skip, with an endpoint of its own.
        descriptors.extend_from_slice(&[9, USB_DT_INTERFACE, 0, 0, 1, 0x01, 0x02, 0x00, 0]);
        descriptors.extend_from_slice(&[7, USB_DT_ENDPOINT, 0x01, 0x02, 0x00, 0x02, 0]);
        // The vendor-specific interface with the notification endpoint.
        descriptors.extend_from_slice(&[9, USB_DT_INTERFACE, 5, 0, 1, 0xff, 0x00, 0x00, 0]);
        descriptors.extend_from_slice(&[7, USB_DT_ENDPOINT, 0x83, 0x03, 0x40, 0x00, 4]);

        let (iface, address, max_packet_size, interval) =
            find_vendor_interface(&descriptors).unwrap();
        assert_eq!(iface, 5);
        assert_eq!(address, 0x83);
        assert_eq!(max_packet_size, 0x40);
        assert_eq!(interval, 4);
    }

    #[test]
    fn no_vendor_interface() {
        let mut descriptors = vec![0u8; 18];
        descriptors[0] = 18;
        descriptors[1] = 0x01;
        descriptors.extend_from_slice(&[9, USB_DT_INTERFACE, 0, 0, 1, 0x01, 0x02, 0x00, 0]);
        descriptors.extend_from_slice(&[7, USB_DT_ENDPOINT, 0x81, 0x03, 0x40, 0x00, 4]);

        assert!(find_vendor_interface(&descriptors).is_none());
    }
}
