//! Smoke test: open a USB cable and run a tiny hand-written SVF program
//! that walks the TAP through RESET/IDLE and reads back the IDCODE.
use ulx_prog::cable;
use ulx_prog::cable::PortMode;
use ulx_prog::svf::Interpreter;

fn main() {
    let mut cable = cable::open("usb", 1 << 20).expect("cable");
    cable.set_mode(PortMode::Async, false).expect("set mode");

    let program = "\
        STATE RESET;
        STATE IDLE;
        SIR 8 TDI (16);
        SDR 32 TDI (FFFFFFFF) TDO (01299043) MASK (FFFFFFFF);
        STATE RESET;
    ";

    let mut interp = Interpreter::new(&mut *cable, true);
    match interp.run(program) {
        Ok(()) => println!("IDCODE matched."),
        Err(e) => println!("failed: {e}"),
    }
}
