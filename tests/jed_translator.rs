use ulx_prog::jed::{self, Device, Target, DEVICE_TABLE};
use ulx_prog::svf;

fn device(name: &str) -> &'static Device {
    DEVICE_TABLE.iter().find(|d| d.name == name).unwrap()
}

fn sample_jed(device: &Device) -> String {
    let main_len = (device.row_width * device.addr_len) as usize;
    let mut bits = String::with_capacity(main_len);
    for i in 0..main_len {
        bits.push(if i % 5 == 0 { '1' } else { '0' });
    }
    let sed_crc = "10".repeat(16);
    format!(
        "\u{2}NOTE DEVICE NAME:{}*\nQP{}*\nQF{}*\nF*\nL0 {}*\nL{} {}*\nUHDEADBEEF*\n\u{3}",
        device.name, device.pincount, device.fuses, bits, main_len, sed_crc
    )
}

#[test]
fn sram_program_begins_with_idcode_check_and_has_no_flash_only_polls() {
    let jed = sample_jed(device("LFXP2-5E-5TQFP144"));
    let svf_text = jed::translate(&jed, Target::Sram).unwrap();
    let stmts = svf::tokenize(&svf_text);

    assert_eq!(stmts[0].tokens, vec!["STATE", "RESET"]);
    assert_eq!(stmts[1].tokens, vec!["STATE", "IDLE"]);
    assert_eq!(stmts[2].tokens, vec!["SIR", "8", "TDI", "16"]);
    assert_eq!(
        stmts[3].tokens,
        vec!["SDR", "32", "TDI", "FFFFFFFF", "TDO", "01299043", "MASK", "FFFFFFFF"]
    );
    assert!(!svf_text.contains("MASK (10)"));
}

#[test]
fn flash_program_includes_key_protection_polls_and_done_bit_reverify() {
    let jed = sample_jed(device("LFXP2-5E-5TQFP144"));
    let svf_text = jed::translate(&jed, Target::Flash).unwrap();
    assert!(svf_text.contains("SIR 8 TDI (35)"));
    assert!(svf_text.contains("MASK (10)"));
    assert!(svf_text.contains("SIR 8 TDI (B2) TDO (FF) MASK (04)"));
}

#[test]
fn unknown_device_name_is_unsupported_target() {
    let jed = "\u{2}NOTE DEVICE NAME:NOT-A-REAL-DEVICE*\n\u{3}";
    let err = jed::translate(jed, Target::Sram).unwrap_err();
    assert!(matches!(err, ulx_prog::error::ProgError::UnsupportedTarget(_)));
}

#[test]
fn qf_not_matching_device_name_is_bad_bitstream() {
    let device = device("LFXP2-5E-5TQFP144");
    let jed = format!(
        "\u{2}NOTE DEVICE NAME:{}*\nQP{}*\nQF16*\n\u{3}",
        device.name, device.pincount
    );
    let err = jed::translate(&jed, Target::Sram).unwrap_err();
    assert!(matches!(err, ulx_prog::error::ProgError::BadBitstream(_)));
}

#[test]
fn translated_program_is_well_formed_svf() {
    let jed = sample_jed(device("LFXP2-5E-5TQFP144"));
    let svf_text = jed::translate(&jed, Target::Sram).unwrap();
    let stmts = svf::tokenize(&svf_text);
    assert!(stmts.iter().all(|s| !s.tokens.is_empty()));
    // one SDR per fuse row, plus a handful in the fixed preamble/epilogue.
    assert!(stmts.iter().filter(|s| s.tokens[0] == "SDR").count() > 1938);
}
