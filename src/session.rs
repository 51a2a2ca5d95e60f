//! Per-connection protocol state machine and the TCP accept loop.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use crate::{
    DeviceRegistry,
    codec::{WireEncode, WireError, read_struct},
    protocol::{
        ISO_PACKET_DESCRIPTOR_SIZE, OpCode, OpHeader, SubmitHeader, fixed_str_lossy,
    },
    util::hexdump,
};
use log::*;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    time::timeout,
};

/// Cap on one opportunistic read of a submit trailer. The trailer is not
/// self-describing, so an unbounded read would be a resource-exhaustion
/// hole.
const TRAILER_SCRATCH_BYTES: usize = 4096;

/// How long to wait for trailer bytes that may never come.
const TRAILER_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Drive one client connection until it closes or fails.
///
/// Messages are handled strictly in sequence. Every reply is fully buffered
/// before a single write, so the client never observes a partially-formed
/// message. Errors terminate this connection only.
pub async fn handler<T: AsyncReadExt + AsyncWriteExt + Unpin>(
    socket: &mut T,
    registry: Arc<DeviceRegistry>,
) -> Result<(), WireError> {
    loop {
        let header: OpHeader = match read_struct(socket).await {
            Ok(header) => header,
            Err(err) if err.is_disconnect() => {
                info!("Remote closed the connection");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        match header.code() {
            Some(OpCode::ReqDevlist) => {
                trace!("Got OP_REQ_DEVLIST");
                let devices = registry.devices();

                let mut reply = OpHeader::reply(OpCode::RepDevlist).to_bytes();
                (devices.len() as u32).encode(&mut reply);
                for device in devices {
                    device.descriptor.encode(&mut reply);
                    // No interface count on the wire here; the consumer
                    // derives it from num_interfaces in the descriptor.
                    device.interfaces.encode(&mut reply);
                }
                send(socket, &reply).await?;
                trace!("Sent OP_REP_DEVLIST with {} device(s)", devices.len());
            }
            Some(OpCode::ReqImport) => {
                trace!("Got OP_REQ_IMPORT");
                let bus_id: [u8; 32] = read_struct(socket).await?;

                let device = registry.describe_for_import(&bus_id);
                let reply = match device {
                    Some(device) => {
                        let mut reply = OpHeader::reply(OpCode::RepImport).to_bytes();
                        device.descriptor.encode(&mut reply);
                        reply
                    }
                    None => {
                        let mut header = OpHeader::reply(OpCode::RepImport);
                        header.status = 1;
                        header.to_bytes()
                    }
                };
                send(socket, &reply).await?;
                trace!("Sent OP_REP_IMPORT");

                if device.is_none() {
                    continue;
                }

                // An accepted import is immediately followed by a transfer
                // submission on the same connection.
                let submit: SubmitHeader = match read_struct(socket).await {
                    Ok(submit) => submit,
                    Err(err) if err.is_disconnect() => {
                        info!("Remote closed the connection before submitting");
                        return Ok(());
                    }
                    Err(err) => return Err(err),
                };
                debug!(
                    "Got USBIP_CMD_SUBMIT seqnum {} ep {} direction {} length {}",
                    submit.seqnum, submit.ep, submit.direction, submit.transfer_buffer_length
                );
                drain_submit_trailer(socket, &submit).await;
            }
            _ => {
                warn!("Unhandled command 0x{:04x}, ignoring", header.command);
            }
        }
    }
}

/// One fully-buffered write, with a trace-level hexdump for the operator.
async fn send<T: AsyncWriteExt + Unpin>(socket: &mut T, buf: &[u8]) -> Result<(), WireError> {
    if log_enabled!(Level::Trace) {
        trace!("-> {} bytes\n{}", buf.len(), hexdump(buf));
    }
    socket.write_all(buf).await?;
    Ok(())
}

/// Best-effort drain of the variable payload behind a submit header: the
/// OUT transfer buffer and any isochronous packet descriptors. One bounded
/// read under a timeout; short reads and timeouts are logged, never fatal.
async fn drain_submit_trailer<T: AsyncReadExt + Unpin>(socket: &mut T, submit: &SubmitHeader) {
    let mut expected = 0usize;
    if submit.direction == 0 {
        expected += submit.transfer_buffer_length as usize;
    }
    expected += submit.number_of_packets as usize * ISO_PACKET_DESCRIPTOR_SIZE;

    let want = expected.min(TRAILER_SCRATCH_BYTES);
    if want == 0 {
        return;
    }

    let mut scratch = vec![0u8; want];
    match timeout(TRAILER_READ_TIMEOUT, socket.read(&mut scratch)).await {
        Ok(Ok(n)) if n < want => debug!("Short trailer read: {n} of {want} bytes"),
        Ok(Ok(n)) => {
            if log_enabled!(Level::Trace) {
                trace!("<- {n} trailer bytes\n{}", hexdump(&scratch[..n]));
            }
        }
        Ok(Err(err)) => debug!("Trailer read failed: {err}"),
        Err(_) => debug!("No trailer within {TRAILER_READ_TIMEOUT:?}"),
    }
}

/// Run a USB/IP server at `addr` using [TcpListener], one task per
/// connection. A failing connection never affects another.
pub async fn server(addr: SocketAddr, registry: Arc<DeviceRegistry>) {
    let listener = TcpListener::bind(addr).await.expect("bind to addr");

    info!(
        "Exporting {} device(s): {:?}",
        registry.devices().len(),
        registry
            .devices()
            .iter()
            .map(|d| fixed_str_lossy(&d.descriptor.bus_id))
            .collect::<Vec<_>>()
    );

    loop {
        match listener.accept().await {
            Ok((mut socket, _addr)) => {
                info!("Got connection from {:?}", socket.peer_addr());
                let registry = registry.clone();
                tokio::spawn(async move {
                    let res = handler(&mut socket, registry).await;
                    info!("Handler ended with {res:?}");
                });
            }
            Err(err) => {
                warn!("Got error {err:?}");
            }
        }
    }
}
