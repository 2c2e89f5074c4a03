//! Byte-level device channels carrying fixed-size HID reports.

use std::io;

use async_trait::async_trait;

/// A bidirectional, packet-oriented link to a device.
///
/// Each `write` sends exactly one packet and each `read` returns at most
/// one. Implementations do not need internal locking: the frame transport
/// holds a channel behind its own session lock.
#[async_trait]
pub trait ByteChannel: Send {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    async fn write(&mut self, packet: &[u8]) -> io::Result<usize>;
}

#[async_trait]
impl<C: ByteChannel + ?Sized> ByteChannel for Box<C> {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf).await
    }

    async fn write(&mut self, packet: &[u8]) -> io::Result<usize> {
        (**self).write(packet).await
    }
}

#[cfg(feature = "hid")]
pub use hid::HidChannel;

#[cfg(feature = "hid")]
mod hid {
    use std::io;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use hidapi::{HidApi, HidDevice};
    use log::debug;

    use super::ByteChannel;

    const LEDGER_VENDOR_ID: u16 = 0x2c97;
    const LEDGER_USAGE_PAGE: u16 = 0xffa0;
    const READ_POLL_MS: i32 = 100;

    /// USB HID channel to a Ledger device, via hidapi.
    pub struct HidChannel {
        device: Arc<Mutex<HidDevice>>,
    }

    fn to_io(err: impl std::fmt::Display) -> io::Error {
        io::Error::new(io::ErrorKind::Other, err.to_string())
    }

    impl HidChannel {
        pub fn new(device: HidDevice) -> Self {
            HidChannel {
                device: Arc::new(Mutex::new(device)),
            }
        }

        /// Opens the first connected Ledger exposing the APDU interface.
        pub fn open_first() -> io::Result<Self> {
            let api = HidApi::new().map_err(to_io)?;
            let info = api
                .device_list()
                .find(|d| {
                    d.vendor_id() == LEDGER_VENDOR_ID
                        && (d.usage_page() == LEDGER_USAGE_PAGE || d.interface_number() == 0)
                })
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no Ledger device found"))?;
            debug!(
                "opening Ledger device {:04x}:{:04x} at {:?}",
                info.vendor_id(),
                info.product_id(),
                info.path()
            );
            let device = info.open_device(&api).map_err(to_io)?;
            Ok(Self::new(device))
        }
    }

    #[async_trait]
    impl ByteChannel for HidChannel {
        async fn write(&mut self, packet: &[u8]) -> io::Result<usize> {
            // hidapi expects a leading report id
            let mut report = Vec::with_capacity(packet.len() + 1);
            report.push(0x00);
            report.extend_from_slice(packet);
            let device = self.device.clone();
            let written = tokio::task::spawn_blocking(move || {
                let device = device.lock().map_err(to_io)?;
                device.write(&report).map_err(to_io)
            })
            .await
            .map_err(to_io)??;
            Ok(written.saturating_sub(1))
        }

        async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len();
            loop {
                let device = self.device.clone();
                let (n, data) = tokio::task::spawn_blocking(move || {
                    let mut data = vec![0u8; len];
                    let device = device.lock().map_err(to_io)?;
                    let n = device.read_timeout(&mut data, READ_POLL_MS).map_err(to_io)?;
                    Ok::<_, io::Error>((n, data))
                })
                .await
                .map_err(to_io)??;
                // a zero-length read is a poll timeout; yield so callers can cancel
                if n > 0 {
                    buf[..n].copy_from_slice(&data[..n]);
                    return Ok(n);
                }
            }
        }
    }
}
