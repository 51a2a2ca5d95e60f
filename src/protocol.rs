//! USB/IP wire records and protocol constants.
//!
//! Field order inside each record is the wire order; every multi-byte
//! integer travels big-endian. See `Documentation/usb/usbip_protocol.rst`
//! in the Linux tree for the on-wire reference.

use crate::codec::wire_struct;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Protocol version reported in every reply header.
pub const USBIP_VERSION: u16 = 0x0111;

/// Operation codes carried in [`OpHeader::command`].
///
/// The enumeration is closed: any other value on the wire maps to `None`
/// via [`OpCode::from_u16`] and is handled as an unknown command, never as
/// a session-fatal error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum OpCode {
    RepImport = 0x0003,
    RepDevlist = 0x0005,
    ReqImport = 0x8003,
    ReqDevlist = 0x8005,
}

/// Linux usbip speed codes used in [`DeviceDescriptor::speed`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum UsbSpeed {
    Low = 1,
    Full = 2,
    High = 3,
    Super = 5,
}

wire_struct! {
    /// First 8 bytes of every operation message.
    pub struct OpHeader {
        pub version: u16,
        pub command: u16,
        pub status: u32,
    }
}

impl OpHeader {
    /// Reply header: current version, zero status.
    pub fn reply(command: OpCode) -> Self {
        Self {
            version: USBIP_VERSION,
            command: command as u16,
            status: 0,
        }
    }

    /// The typed command code, or `None` for an unrecognized value.
    pub fn code(&self) -> Option<OpCode> {
        OpCode::from_u16(self.command)
    }
}

wire_struct! {
    /// Exported-device block sent in devlist and import replies.
    ///
    /// `path` and `bus_id` are fixed-width, zero-padded, never
    /// length-prefixed.
    pub struct DeviceDescriptor {
        pub path: [u8; 256],
        pub bus_id: [u8; 32],
        pub bus_num: u32,
        pub dev_num: u32,
        pub speed: u32,
        pub vendor_id: u16,
        pub product_id: u16,
        pub bcd_device: u16,
        pub device_class: u8,
        pub device_subclass: u8,
        pub device_protocol: u8,
        pub configuration_value: u8,
        pub num_configurations: u8,
        pub num_interfaces: u8,
    }
}

wire_struct! {
    /// Per-interface block following a [`DeviceDescriptor`] in devlist
    /// replies. The padding byte is semantically unused but must be on the
    /// wire.
    pub struct InterfaceDescriptor {
        pub interface_class: u8,
        pub interface_subclass: u8,
        pub interface_protocol: u8,
        pub padding: u8,
    }
}

impl InterfaceDescriptor {
    pub fn new(class: u8, subclass: u8, protocol: u8) -> Self {
        Self {
            interface_class: class,
            interface_subclass: subclass,
            interface_protocol: protocol,
            padding: 0,
        }
    }
}

wire_struct! {
    /// Standard USB configuration descriptor.
    ///
    /// Part of the data model but not emitted by any reply path; whether
    /// the import reply should carry it after the device block is an open
    /// protocol question, so it stays an extension point.
    pub struct ConfigurationDescriptor {
        pub length: u8,
        pub descriptor_type: u8,
        pub total_length: u16,
        pub num_interfaces: u8,
        pub configuration_value: u8,
        pub configuration_index: u8,
        pub attributes: u8,
        pub max_power: u8,
    }
}

wire_struct! {
    /// Fixed 48-byte prefix of a USBIP_CMD_SUBMIT message.
    ///
    /// A variable trailer (OUT transfer buffer, isochronous packet
    /// descriptors) may follow; its presence depends on `direction` and
    /// `number_of_packets` and it is not self-describing, so the session
    /// layer drains it opportunistically instead of parsing it.
    pub struct SubmitHeader {
        pub command: u32,
        pub seqnum: u32,
        pub devid: u32,
        pub direction: u32,
        pub ep: u32,
        pub transfer_flags: u32,
        pub transfer_buffer_length: u32,
        pub start_frame: u32,
        pub number_of_packets: u32,
        pub interval: u32,
        pub setup: u64,
    }
}

/// Size of one isochronous packet descriptor in a submit trailer.
pub const ISO_PACKET_DESCRIPTOR_SIZE: usize = 16;

/// Truncate or zero-pad `s` into an `N`-byte wire string field.
pub fn fixed_str<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let len = s.len().min(N);
    out[..len].copy_from_slice(&s.as_bytes()[..len]);
    out
}

/// The logical string inside a fixed-width field (everything before the
/// first NUL), lossily decoded for log output.
pub fn fixed_str_lossy(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
