//! In-memory registry of exported devices.
//!
//! The registry is built once at startup and never mutated, so connection
//! tasks share it behind an `Arc` with no locking.

use crate::protocol::{DeviceDescriptor, InterfaceDescriptor, UsbSpeed, fixed_str, fixed_str_lossy};
use log::*;

/// One exported device: its wire descriptor plus its interfaces in the
/// order they are serialized in devlist replies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedDevice {
    pub descriptor: DeviceDescriptor,
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl ExportedDevice {
    /// A synthesized device under a fake sysfs path, with no interfaces yet.
    pub fn new(index: u32) -> Self {
        Self {
            descriptor: DeviceDescriptor {
                path: fixed_str(&format!("/sys/devices/usbip-emu/{index}")),
                bus_id: fixed_str(&format!("{index}-1")),
                bus_num: index,
                dev_num: index,
                speed: UsbSpeed::High as u32,
                vendor_id: 0,
                product_id: 0,
                bcd_device: 0x0100,
                device_class: 0,
                device_subclass: 0,
                device_protocol: 0,
                configuration_value: 1,
                num_configurations: 1,
                num_interfaces: 0,
            },
            interfaces: vec![],
        }
    }

    pub fn with_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.descriptor.vendor_id = vendor_id;
        self.descriptor.product_id = product_id;
        self
    }

    pub fn with_device_class(mut self, class: u8, subclass: u8, protocol: u8) -> Self {
        self.descriptor.device_class = class;
        self.descriptor.device_subclass = subclass;
        self.descriptor.device_protocol = protocol;
        self
    }

    /// Append an interface, keeping `num_interfaces` in step with the list.
    pub fn with_interface(mut self, class: u8, subclass: u8, protocol: u8) -> Self {
        self.interfaces
            .push(InterfaceDescriptor::new(class, subclass, protocol));
        self.descriptor.num_interfaces = self.interfaces.len() as u8;
        self
    }

    pub fn bus_id(&self) -> String {
        fixed_str_lossy(&self.descriptor.bus_id)
    }
}

/// Read-only list of devices the server exports, in reply order.
#[derive(Clone, Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<ExportedDevice>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<ExportedDevice>) -> Self {
        Self { devices }
    }

    pub fn devices(&self) -> &[ExportedDevice] {
        &self.devices
    }

    /// Answer an import request.
    ///
    /// Bus-id matching is not implemented: the requested id is logged and
    /// the first configured device answers every import. A registry with
    /// more than one device would need real matching here.
    pub fn describe_for_import(&self, requested: &[u8; 32]) -> Option<&ExportedDevice> {
        let requested = fixed_str_lossy(requested);
        match self.devices.first() {
            Some(device) => {
                info!(
                    "import requested for bus id {requested:?}, exporting {:?}",
                    device.bus_id()
                );
                Some(device)
            }
            None => {
                warn!("import requested for bus id {requested:?} but no device is exported");
                None
            }
        }
    }
}
