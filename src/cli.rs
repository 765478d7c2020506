//! Command-line surface and top-level run loop. Grounded on ujprog.c's
//! `main()`/`prog()`/`term_emul()`: probe a cable, translate or load the
//! input file, run it through the SVF interpreter, then optionally drop
//! into a UART terminal.
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use crate::cable::{self, PortMode};
use crate::error::{ProgError, Result};
use crate::jed;
use crate::svf::Interpreter;

#[derive(Parser, Debug)]
#[command(name = "ulx-prog", about = "JTAG programmer for ULX2S/ULXP2-class FPGA boards")]
pub struct Args {
    /// Bitstream or SVF file to program.
    pub file: PathBuf,

    /// Drop into a UART terminal after programming.
    #[arg(short = 't', long)]
    pub terminal: bool,

    /// Echo every executed SVF statement to stderr.
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Force SYNC-mode transfers even where ASYNC would suffice.
    #[arg(short = 's', long)]
    pub slow: bool,

    /// Cable backend to use.
    #[arg(short = 'c', long, default_value = "usb")]
    pub cable: String,

    /// JED programming target.
    #[arg(short = 'j', long, default_value = "sram")]
    pub jed_target: String,

    /// UART baud rate, used only with `--terminal`.
    #[arg(short = 'b', long, default_value_t = 115_200)]
    pub baud: u32,
}

pub fn run(args: &Args) -> Result<()> {
    let mut cable = cable::open(&args.cable, args.baud)?;

    let contents = std::fs::read_to_string(&args.file)
        .map_err(|e| ProgError::CableIo(format!("cannot read {}: {e}", args.file.display())))?;

    let is_jed = args
        .file
        .extension()
        .map(|e| e.eq_ignore_ascii_case("jed"))
        .unwrap_or(false);

    let svf_text = if is_jed {
        let target = match args.jed_target.as_str() {
            "sram" => jed::Target::Sram,
            "flash" => jed::Target::Flash,
            other => {
                return Err(ProgError::Invalid(format!(
                    "unknown JED target '{other}', expected sram or flash"
                )))
            }
        };
        jed::translate(&contents, target)?
    } else {
        contents
    };

    cable
        .set_mode(PortMode::Async, false)
        .map_err(|e| ProgError::CableIo(e.to_string()))?;

    let start = Instant::now();
    let result = {
        let mut interp = Interpreter::with_mode(&mut *cable, args.debug, args.slow);
        interp.run(&svf_text)
    };

    cable
        .set_mode(PortMode::Async, false)
        .map_err(|e| ProgError::CableIo(e.to_string()))?;

    match result {
        Ok(()) => {
            println!("Completed in {:.2} seconds.", start.elapsed().as_secs_f64());
        }
        Err(e) => {
            println!("Failed.");
            return Err(e);
        }
    }

    if args.terminal {
        cable
            .set_baud(args.baud)
            .map_err(|e| ProgError::CableIo(e.to_string()))?;
        cable
            .set_mode(PortMode::Uart, false)
            .map_err(|e| ProgError::CableIo(e.to_string()))?;
        term_emul(&mut *cable)?;
    }

    Ok(())
}

/// Minimal serial terminal passthrough, entered with `-t`. Supports the
/// `~.` escape to quit; every other byte is forwarded verbatim in both
/// directions. Kept as a thin collaborator, separate from the C1-C7 JTAG
/// pipeline it never touches.
fn term_emul(cable: &mut dyn cable::Cable) -> Result<()> {
    eprintln!("Entering terminal mode. Type '~.' to exit.");
    let mut stdin = std::io::stdin();
    let mut saw_tilde = false;
    loop {
        let rx = cable.read(256).map_err(|e| ProgError::CableIo(e.to_string()))?;
        if !rx.is_empty() {
            std::io::stdout().write_all(&rx).ok();
            std::io::stdout().flush().ok();
        }

        let mut input = [0u8; 1];
        match stdin.read(&mut input) {
            Ok(0) => break,
            Ok(_) => {
                if saw_tilde && input[0] == b'.' {
                    break;
                }
                saw_tilde = input[0] == b'~';
                cable
                    .write(&input)
                    .map_err(|e| ProgError::CableIo(e.to_string()))?;
            }
            Err(_) => break,
        }
    }
    Ok(())
}
