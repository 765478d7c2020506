mod common;

use common::LoopbackCable;
use ulx_prog::cable::{Cable, PortMode};
use ulx_prog::error::ProgError;
use ulx_prog::svf::Interpreter;

#[test]
fn state_only_program_runs_to_completion() {
    let mut cable = LoopbackCable::new();
    cable.set_mode(PortMode::Async, false).unwrap();
    let mut interp = Interpreter::new(&mut cable, false);
    interp
        .run("STATE RESET; STATE IDLE; STATE DRPAUSE; STATE IDLE;")
        .unwrap();
}

#[test]
fn sdr_with_matching_readback_succeeds() {
    let mut cable = LoopbackCable::new();
    let mut interp = Interpreter::new(&mut cable, false);
    // All-ones TDI mirrors back as all-ones TDO on the loopback cable.
    interp
        .run("STATE RESET; STATE IDLE; STATE DRPAUSE; SDR 32 TDI (FFFFFFFF) TDO (FFFFFFFF) MASK (FFFFFFFF);")
        .unwrap();
}

#[test]
fn sdr_with_mismatched_readback_is_compare_fail() {
    let mut cable = LoopbackCable::new();
    let mut interp = Interpreter::new(&mut cable, false);
    let err = interp
        .run("STATE RESET; STATE IDLE; STATE DRPAUSE; SDR 8 TDI (00) TDO (FF) MASK (FF);")
        .unwrap_err();
    assert!(matches!(err, ProgError::CompareFail { .. }));
}

#[test]
fn sir_from_undefined_state_cannot_be_routed() {
    let mut cable = LoopbackCable::new();
    let mut interp = Interpreter::new(&mut cable, false);
    // No RESET/IDLE dance has happened yet, so the TAP engine has no known
    // path from UNDEFINED straight to IRPAUSE.
    let err = interp.run("SIR 8 TDI (FF);").unwrap_err();
    assert!(matches!(err, ProgError::TapStuck { .. }));
}

#[test]
fn unknown_command_is_unsupported() {
    let mut cable = LoopbackCable::new();
    let mut interp = Interpreter::new(&mut cable, false);
    let err = interp.run("TRST ON;").unwrap_err();
    assert!(matches!(err, ProgError::Unsupported(_)));
}

#[test]
fn runtest_out_of_range_clock_count_is_invalid() {
    let mut cable = LoopbackCable::new();
    let mut interp = Interpreter::new(&mut cable, false);
    let err = interp
        .run("STATE RESET; STATE IDLE; RUNTEST IDLE 5000 TCK;")
        .unwrap_err();
    assert!(matches!(err, ProgError::Invalid(_)));
}

#[test]
fn enddr_rejects_non_drpause_target() {
    let mut cable = LoopbackCable::new();
    let mut interp = Interpreter::new(&mut cable, false);
    let err = interp.run("ENDDR IDLE;").unwrap_err();
    assert!(matches!(err, ProgError::Invalid(_)));
}
