//! Implementations for different JTAG hardware adapters live here. Hardware
//! adapters implement the `Cable` trait; `buffer.rs` drives them with raw
//! TMS/TDI/TCK edge bytes and, in SYNC mode, reads TDO back from the same
//! transfer.
#[cfg(feature = "usb")]
pub mod ft232r;
#[cfg(feature = "ppi")]
pub mod ppi;

/// The three port modes ujprog.c toggles between. ASYNC writes without
/// reading back (fast path, used for TMS-only transitions where TDO isn't
/// needed); SYNC writes and reads back every byte (used whenever a shift
/// result is consumed); UART disables bit-bang mode entirely for terminal
/// passthrough.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortMode {
    Async,
    Sync,
    Uart,
}

/// A bit-bang JTAG cable. `write`/`read` move raw bytes; `set_mode` handles
/// the FTDI bitmode switch (and the stale-RX purge ujprog.c does when
/// entering SYNC), `set_baud`/`set_latency` configure the underlying USB
/// link, and `name()` identifies the opened device for log output.
pub trait Cable {
    /// Switch the cable's bit-bang mode and assert the LED/blink side
    /// channel. `led` carries the blink state from
    /// [`crate::buffer::TxRxBuffer`] — the only place this bit is allowed
    /// to reach the cable, since the JTAG data stream itself must stay
    /// free of it.
    fn set_mode(&mut self, mode: PortMode, led: bool) -> std::io::Result<()>;
    fn write(&mut self, data: &[u8]) -> std::io::Result<()>;
    fn read(&mut self, max: usize) -> std::io::Result<Vec<u8>>;
    fn set_baud(&mut self, baud: u32) -> std::io::Result<()>;
    fn set_latency_ms(&mut self, ms: u8) -> std::io::Result<()>;
    fn name(&self) -> &str;
}

/// Accepted USB product descriptors, from ujprog.c's `cable_hw_map`.
pub const USB_PRODUCT_DESCRIPTORS: &[&str] = &[
    "FER ULXP2 board JTAG / UART",
    "FER ULX2S board JTAG / UART",
];

pub const USB_VID: u16 = 0x0403;
pub const USB_PID: u16 = 0x6001;

/// Open a cable backend by name (`"usb"` or `"ppi"`), trying USB first and
/// falling back to the parallel port where compiled in, matching ujprog.c's
/// `main()` probe order.
pub fn open(which: &str, baud: u32) -> crate::error::Result<Box<dyn Cable>> {
    match which {
        #[cfg(feature = "usb")]
        "usb" => Ok(Box::new(ft232r::Ft232r::open(baud)?)),
        #[cfg(feature = "ppi")]
        "ppi" => Ok(Box::new(ppi::Ppi::open()?)),
        _ => Err(crate::error::ProgError::NoCable),
    }
}
