//! TX/RX staging buffer (C2) plus the LED/activity blink scheduler (C7).
//! `TxRxBuffer` accumulates TMS/TDI edges as byte pairs (level, then
//! level|TCK) exactly as ujprog.c's `txbuf` does, and knows how to commit
//! them to a [`crate::cable::Cable`] either eagerly (ASYNC) or with
//! read-back verification (SYNC). The LED/blink side channel is tracked
//! here but never folded into the TX bytes themselves — per spec.md's
//! "blinking is purely cosmetic and must not affect the JTAG data
//! stream", it only ever reaches the cable through `Cable::set_mode`'s
//! `led` argument.
use std::time::{Duration, Instant};

use crate::cable::{Cable, PortMode};
use crate::error::{ProgError, Result};

pub const PIN_TCK: u8 = 0x20;
pub const PIN_TMS: u8 = 0x80;
pub const PIN_TDI: u8 = 0x08;
pub const PIN_TDO: u8 = 0x40;
pub const PIN_CBUS_LED: u8 = 0x02;

/// Non-Windows default from ujprog.c's `USB_BUFLEN_SYNC`.
#[cfg(not(windows))]
pub const SYNC_CHUNK: usize = 384;
#[cfg(windows)]
pub const SYNC_CHUNK: usize = 4096;

const BUFLEN_MAX: usize = 8192;
const READ_RETRIES: usize = 8;
const LED_INTERVAL: Duration = Duration::from_millis(250);

/// Edge buffer plus LED-blink bookkeeping. One instance lives for the
/// duration of a run; it is handed to the shift/TAP engines by mutable
/// reference so they can push edges without owning the cable.
pub struct TxRxBuffer {
    tx: Vec<u8>,
    rx: Vec<u8>,
    last_blink: Option<Instant>,
    led_on: bool,
    spinner_pos: usize,
}

const SPINNER: &[u8] = b"-\\|/";

impl Default for TxRxBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TxRxBuffer {
    pub fn new() -> Self {
        TxRxBuffer {
            tx: Vec::with_capacity(BUFLEN_MAX),
            rx: Vec::new(),
            last_blink: None,
            led_on: false,
            spinner_pos: 0,
        }
    }

    pub fn tx(&self) -> &[u8] {
        &self.tx
    }

    pub fn rx(&self) -> &[u8] {
        &self.rx
    }

    pub fn clear_tx(&mut self) {
        self.tx.clear();
    }

    /// Push one TCK edge: first the settled level, then the same level
    /// with TCK asserted. TDO is sampled by the cable on the high half
    /// in SYNC mode. Carries only TMS/TDI/TCK — the LED bit is asserted
    /// solely through `Cable::set_mode`, never in the data stream.
    pub fn push_edge(&mut self, tms: bool, tdi: bool) {
        let mut level = 0u8;
        if tms {
            level |= PIN_TMS;
        }
        if tdi {
            level |= PIN_TDI;
        }
        if self.tx.len() + 2 > BUFLEN_MAX {
            panic!("txbuf overflow");
        }
        self.tx.push(level);
        self.tx.push(level | PIN_TCK);
    }

    /// Extract the TDO bit sampled on the Nth edge's high half (the
    /// second byte of each pushed pair), reading back from `rx`.
    pub fn tdo_bit(&self, edge_index: usize) -> bool {
        self.rx[edge_index * 2 + 1] & PIN_TDO != 0
    }

    /// Pad the buffer by duplicating the most recently pushed edge, as
    /// ujprog.c's RUNTEST clock-padding loop does to burn extra TCK cycles
    /// without changing TMS/TDI.
    pub fn repeat_last_edge(&mut self, times: usize) {
        if self.tx.len() < 2 {
            return;
        }
        let a = self.tx[self.tx.len() - 2];
        let b = self.tx[self.tx.len() - 1];
        for _ in 0..times {
            if self.tx.len() + 2 > BUFLEN_MAX {
                panic!("txbuf overflow");
            }
            self.tx.push(a);
            self.tx.push(b);
        }
    }

    /// Current LED state, preserved across mode changes so callers can
    /// re-assert it without a blink being due (spec.md C1: "preserve the
    /// current LED bit across mode changes").
    pub fn led_on(&self) -> bool {
        self.led_on
    }

    /// If at least `LED_INTERVAL` has passed since the last blink, flip
    /// the LED bit, advance the spinner, and return the new LED state for
    /// the caller to hand to `Cable::set_mode`. Otherwise returns `None`
    /// and leaves everything unchanged. Calling this is what "consumes"
    /// the pending blink (spec.md C2/C7).
    pub fn poll_blink(&mut self) -> Option<bool> {
        let due = match self.last_blink {
            None => true,
            Some(t) => t.elapsed() >= LED_INTERVAL,
        };
        if !due {
            return None;
        }
        self.led_on = !self.led_on;
        self.spinner_pos = (self.spinner_pos + 1) % SPINNER.len();
        self.last_blink = Some(Instant::now());
        Some(self.led_on)
    }

    /// Commit buffered edges to the cable. In ASYNC mode this is a no-op
    /// unless `force` is set or the buffer is at least half full; in SYNC
    /// mode every call writes and reads back, retrying short reads.
    pub fn commit(&mut self, cable: &mut dyn Cable, mode: PortMode, force: bool) -> Result<()> {
        if self.tx.is_empty() {
            return Ok(());
        }
        if !force && mode == PortMode::Async && self.tx.len() < BUFLEN_MAX / 2 {
            return Ok(());
        }

        match mode {
            PortMode::Sync => self.commit_sync(cable),
            PortMode::Async | PortMode::Uart => self.commit_async(cable),
        }
    }

    fn commit_async(&mut self, cable: &mut dyn Cable) -> Result<()> {
        cable
            .write(&self.tx)
            .map_err(|e| ProgError::CableIo(e.to_string()))?;
        self.tx.clear();
        Ok(())
    }

    fn commit_sync(&mut self, cable: &mut dyn Cable) -> Result<()> {
        self.rx.clear();
        let mut off = 0;
        while off < self.tx.len() {
            let chunk_len = SYNC_CHUNK.min(self.tx.len() - off);
            let chunk = &self.tx[off..off + chunk_len];
            cable
                .write(chunk)
                .map_err(|e| ProgError::CableIo(e.to_string()))?;

            let mut got = 0;
            let mut retries = 0;
            let mut chunk_rx = vec![0u8; chunk_len];
            while got < chunk_len {
                let read = cable
                    .read(chunk_len - got)
                    .map_err(|e| ProgError::CableIo(e.to_string()))?;
                if read.is_empty() {
                    retries += 1;
                    if retries > READ_RETRIES {
                        return Err(ProgError::CableIo(
                            "short read from cable during SYNC commit".into(),
                        ));
                    }
                    continue;
                }
                chunk_rx[got..got + read.len()].copy_from_slice(&read);
                got += read.len();
            }
            self.rx.extend_from_slice(&chunk_rx);
            off += chunk_len;
        }
        self.tx.clear();
        Ok(())
    }

    pub fn spinner_char(&self) -> char {
        SPINNER[self.spinner_pos] as char
    }
}
