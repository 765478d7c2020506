//! Host-side JTAG programmer for ULX2S/ULXP2-class FPGA boards: translates
//! a `.jed` fuse map (or runs a raw `.svf` program) over a bit-bang USB or
//! parallel-port cable.
//!
//! The lowest level is the [`cable::Cable`] trait, implemented by the USB
//! (`ft232r`, feature `usb`) and parallel-port (`ppi`, feature `ppi`)
//! backends. [`buffer::TxRxBuffer`] stages TMS/TDI edges and commits them
//! either eagerly or with TDO read-back. [`statemachine::TapEngine`] tracks
//! the 16-state TAP graph and [`shift`] drives SDR/SIR bit shifts on top of
//! it. [`svf::Interpreter`] executes a tokenised SVF program; [`jed`]
//! translates a JEDEC fuse map into one.
//!
//! # Example
//! ```no_run
//! use ulx_prog::cable;
//! use ulx_prog::cable::PortMode;
//! use ulx_prog::svf::Interpreter;
//!
//! let mut cable = cable::open("usb", 1_000_000).expect("no cable");
//! cable.set_mode(PortMode::Async, false).unwrap();
//! let mut interp = Interpreter::new(&mut *cable, false);
//! interp.run("STATE RESET; STATE IDLE;").unwrap();
//! ```

pub mod buffer;
pub mod cable;
pub mod cli;
pub mod error;
pub mod jed;
pub mod shift;
pub mod statemachine;
pub mod svf;
