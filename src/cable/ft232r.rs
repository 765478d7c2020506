//! USB bit-bang backend over an FTDI FT232R-class chip (`libftd2xx`/D2XX),
//! the cable C1 actually targets: raw TCK/TMS/TDI/TDO/LED bit-bang, no
//! MPSSE command queue.
use std::time::Duration;

use libftd2xx::{BitMode, Ftdi, FtdiCommon};

use crate::buffer::{PIN_CBUS_LED, PIN_TCK, PIN_TDI, PIN_TMS};
use crate::cable::{Cable, PortMode, USB_PID, USB_PRODUCT_DESCRIPTORS, USB_VID};
use crate::error::{ProgError, Result};

fn io_err(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

pub struct Ft232r {
    ft: Ftdi,
    mode: PortMode,
    led: bool,
    name: String,
}

impl Ft232r {
    /// Probe for one of the accepted FER product descriptors (ujprog.c's
    /// `cable_hw_map`), falling back to VID:PID match.
    pub fn open(baud: u32) -> Result<Self> {
        let _ = libftd2xx::set_vid_pid(USB_VID, USB_PID);

        let mut found = None;
        for desc in USB_PRODUCT_DESCRIPTORS {
            if let Ok(ft) = Ftdi::with_description(desc) {
                found = Some((ft, desc.to_string()));
                break;
            }
        }
        let (mut ft, name) = found.ok_or(ProgError::NoCable)?;

        ft.set_baud_rate(baud).map_err(|e| ProgError::CableIo(e.to_string()))?;
        ft.set_latency_timer(Duration::from_millis(2)).map_err(|e| ProgError::CableIo(e.to_string()))?;

        let mut cable = Ft232r {
            ft,
            mode: PortMode::Uart,
            led: false,
            name,
        };
        cable
            .set_mode(PortMode::Async, false)
            .map_err(|e| ProgError::CableIo(e.to_string()))?;
        Ok(cable)
    }
}

impl Cable for Ft232r {
    fn set_mode(&mut self, mode: PortMode, led: bool) -> std::io::Result<()> {
        if mode == self.mode && led == self.led {
            return Ok(());
        }

        let mut pins = PIN_TCK | PIN_TMS | PIN_TDI;
        if led {
            pins |= PIN_CBUS_LED;
        }
        match mode {
            PortMode::Sync => {
                self.ft
                    .set_bit_mode(pins, BitMode::SyncBitbang)
                    .map_err(io_err)?;
                // Purge whatever stale bytes were already queued in the
                // chip's RX FIFO before the mode switch, as ujprog.c's
                // `set_port_mode` does on entry to SYNC.
                self.ft.purge_rx().map_err(io_err)?;
                let mut scratch = [0u8; 64];
                loop {
                    let n = self.ft.read(&mut scratch).unwrap_or(0);
                    if n < scratch.len() {
                        break;
                    }
                }
            }
            PortMode::Async => {
                self.ft
                    .set_bit_mode(pins, BitMode::AsyncBitbang)
                    .map_err(io_err)?;
            }
            PortMode::Uart => {
                let reset_pins = if led { PIN_CBUS_LED } else { 0 };
                self.ft
                    .set_bit_mode(reset_pins, BitMode::Reset)
                    .map_err(io_err)?;
            }
        }
        self.mode = mode;
        self.led = led;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.ft.write_all(data).map_err(io_err)
    }

    fn read(&mut self, max: usize) -> std::io::Result<Vec<u8>> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let avail = self.ft.queue_status().map_err(io_err)? as usize;
        let want = avail.min(max);
        if want == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; want];
        let n = self.ft.read(&mut buf).map_err(io_err)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn set_baud(&mut self, baud: u32) -> std::io::Result<()> {
        self.ft.set_baud_rate(baud).map_err(io_err)
    }

    fn set_latency_ms(&mut self, ms: u8) -> std::io::Result<()> {
        self.ft.set_latency_timer(Duration::from_millis(ms as u64)).map_err(io_err)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    // `Ft232r::open` needs real hardware; the USB backend is exercised only
    // through the `Cable` trait boundary in the integration tests, against
    // a stub implementation.
}
