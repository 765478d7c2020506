//! A software-only loopback `Cable` for integration tests: every TDO bit
//! mirrors the TDI bit clocked out on the same edge, regardless of how the
//! SYNC commit happens to chunk reads and writes.
use std::collections::VecDeque;
use std::io;

use ulx_prog::buffer::{PIN_TDI, PIN_TDO};
use ulx_prog::cable::{Cable, PortMode};

pub struct LoopbackCable {
    pending: VecDeque<u8>,
    pub mode: PortMode,
}

impl LoopbackCable {
    pub fn new() -> Self {
        LoopbackCable {
            pending: VecDeque::new(),
            mode: PortMode::Uart,
        }
    }
}

impl Cable for LoopbackCable {
    fn set_mode(&mut self, mode: PortMode, _led: bool) -> io::Result<()> {
        self.mode = mode;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.pending.extend(data.iter().copied());
        Ok(())
    }

    fn read(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(max);
        for _ in 0..max {
            match self.pending.pop_front() {
                Some(b) => out.push(if b & PIN_TDI != 0 { PIN_TDO } else { 0 }),
                None => break,
            }
        }
        Ok(out)
    }

    fn set_baud(&mut self, _baud: u32) -> io::Result<()> {
        Ok(())
    }

    fn set_latency_ms(&mut self, _ms: u8) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}
