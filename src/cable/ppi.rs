//! Parallel-port (PPI) bit-bang backend — ujprog.c's `#ifdef USE_PPI`
//! fallback path for hosts with no FTDI USB cable attached. Linux-only;
//! talks to `/dev/parport0` via the `ppdev` ioctls.
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;

use crate::buffer::{PIN_TCK, PIN_TDI, PIN_TDO, PIN_TMS};
use crate::cable::{Cable, PortMode};
use crate::error::{ProgError, Result};

pub const PPI_TCK: u8 = 0x02;
pub const PPI_TMS: u8 = 0x04;
pub const PPI_TDI: u8 = 0x01;
pub const PPI_TDO: u8 = 0x40;

const PPDEV_PATH: &str = "/dev/parport0";

// ppdev ioctl numbers, from linux/ppdev.h.
const PPCLAIM: u64 = 0x7000_008b;
const PPRELEASE: u64 = 0x7000_008c;
const PPRSTATUS: u64 = 0x8001_7081;
const PPWDATA: u64 = 0x4001_7082;

pub struct Ppi {
    dev: File,
    mode: PortMode,
}

impl Ppi {
    pub fn open() -> Result<Self> {
        let dev = OpenOptions::new()
            .read(true)
            .write(true)
            .open(PPDEV_PATH)
            .map_err(|_| ProgError::NoCable)?;

        let fd = dev.as_raw_fd();
        let zero: libc::c_int = 0;
        let rc = unsafe { libc::ioctl(fd, PPCLAIM as libc::c_ulong, &zero as *const libc::c_int) };
        if rc != 0 {
            return Err(ProgError::NoCable);
        }

        Ok(Ppi {
            dev,
            mode: PortMode::Async,
        })
    }

    fn write_data_byte(&mut self, byte: u8) -> io::Result<()> {
        let fd = self.dev.as_raw_fd();
        let rc = unsafe { libc::ioctl(fd, PPWDATA as libc::c_ulong, &byte as *const u8) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn read_status_byte(&mut self) -> io::Result<u8> {
        let fd = self.dev.as_raw_fd();
        let mut status: u8 = 0;
        let rc = unsafe { libc::ioctl(fd, PPRSTATUS as libc::c_ulong, &mut status as *mut u8) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(status)
    }
}

impl Drop for Ppi {
    fn drop(&mut self) {
        let fd = self.dev.as_raw_fd();
        unsafe {
            libc::ioctl(fd, PPRELEASE as libc::c_ulong);
        }
    }
}

impl Cable for Ppi {
    fn set_mode(&mut self, mode: PortMode, _led: bool) -> io::Result<()> {
        // The parallel port has no bitmode register and no LED pin of its
        // own; ASYNC/SYNC/UART are all driven by the same byte-wide data
        // register, so this just records which readback discipline
        // `buffer.rs` should use.
        self.mode = mode;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        // `data` arrives encoded with `buffer.rs`'s FTDI bit-bang pin
        // positions; translate each edge byte into this port's own pinout
        // before writing it to the data register.
        for &b in data {
            let mut out = 0u8;
            if b & PIN_TCK != 0 {
                out |= PPI_TCK;
            }
            if b & PIN_TMS != 0 {
                out |= PPI_TMS;
            }
            if b & PIN_TDI != 0 {
                out |= PPI_TDI;
            }
            self.write_data_byte(out)?;
        }
        Ok(())
    }

    fn read(&mut self, max: usize) -> io::Result<Vec<u8>> {
        // Translate the status register's TDO bit back into the byte
        // shape `buffer.rs`'s `tdo_bit` expects.
        let mut out = Vec::with_capacity(max);
        for _ in 0..max {
            let status = self.read_status_byte()?;
            out.push(if status & PPI_TDO != 0 { PIN_TDO } else { 0 });
        }
        Ok(out)
    }

    fn set_baud(&mut self, _baud: u32) -> io::Result<()> {
        // No serial clock on a parallel port; RUNTEST delay pacing is done
        // by the caller instead.
        Ok(())
    }

    fn set_latency_ms(&mut self, _ms: u8) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "ppi"
    }
}
