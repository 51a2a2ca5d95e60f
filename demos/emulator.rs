//! Minimal bootstrap: export one synthesized device over USB/IP.
//!
//! Run with `cargo run --example emulator [listen-addr]`, then attach from a
//! client with `usbip attach -r <host> -b 0-1`.

use std::{net::SocketAddr, sync::Arc};

use usbip_emu::{DeviceRegistry, ExportedDevice, server};

#[tokio::main]
async fn main() {
    env_logger::init();

    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:3240".to_string())
        .parse()
        .expect("listen address");

    let registry = DeviceRegistry::new(vec![
        ExportedDevice::new(0)
            .with_ids(0x1d6b, 0x0104)
            .with_device_class(0x02, 0x00, 0x00)
            .with_interface(0x02, 0x02, 0x00),
    ]);

    server(addr, Arc::new(registry)).await;
}
