//! JEDEC fuse-map to SVF translator (C6). Parses a `.jed` file's fuse
//! array and emits the exact SVF program ujprog.c's `exec_jedec_file()`
//! would produce for a Lattice XP2 part, as an in-memory SVF-text program
//! fed straight into [`crate::svf::Interpreter`].
use crate::error::{ProgError, Result};
use crate::shift::encode_nibbles;

pub struct Device {
    pub name: &'static str,
    pub idcode: u32,
    pub pincount: u32,
    pub fuses: u32,
    pub row_width: u32,
    pub addr_len: u32,
}

/// Bit-for-bit from ujprog.c's `jed_devices[]`.
pub const DEVICE_TABLE: &[Device] = &[
    Device {
        name: "LFXP2-5E-5TQFP144",
        idcode: 0x0129_9043,
        pincount: 144,
        fuses: 1_236_476,
        row_width: 638,
        addr_len: 1938,
    },
    Device {
        name: "LFXP2-5E-6TQFP144",
        idcode: 0x0129_9043,
        pincount: 144,
        fuses: 1_236_476,
        row_width: 638,
        addr_len: 1938,
    },
    Device {
        name: "LFXP2-5E-7TQFP144",
        idcode: 0x0129_9043,
        pincount: 144,
        fuses: 1_236_476,
        row_width: 638,
        addr_len: 1938,
    },
    Device {
        name: "LFXP2-8E-5TQFP144",
        idcode: 0x0129_A043,
        pincount: 144,
        fuses: 1_954_736,
        row_width: 772,
        addr_len: 2532,
    },
    Device {
        name: "LFXP2-8E-6TQFP144",
        idcode: 0x0129_A043,
        pincount: 144,
        fuses: 1_954_736,
        row_width: 772,
        addr_len: 2532,
    },
    Device {
        name: "LFXP2-8E-7TQFP144",
        idcode: 0x0129_A043,
        pincount: 144,
        fuses: 1_954_736,
        row_width: 772,
        addr_len: 2532,
    },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Sram,
    Flash,
}

/// The linear state a JED parse moves through as fields are encountered.
/// `QP`/`QF` each advance one step once cross-validated against the device
/// selected by `NOTE DEVICE NAME:`; the first `L` block (the main fuse map)
/// and the second (the 32-bit SED_CRC) are distinct states so a third `L`
/// is rejected rather than silently folded into the first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    Init,
    PackKnown,
    SizeKnown,
    ProgInitiated,
    Fuses,
    FusesDone,
    SedCrc,
    HaveSedCrc,
    UserSig,
}

struct ParsedJed {
    device: &'static Device,
    main_bits: Vec<bool>,
    sed_crc_bits: Vec<bool>,
    user_code: Option<String>,
}

/// Parse an `L<addr> <bits>*` field's data half into exactly `want` bits.
fn parse_l_bits(rest: &str, want: usize) -> Result<Vec<bool>> {
    let rest = rest.trim_start();
    let mut parts = rest.splitn(2, char::is_whitespace);
    let _addr: usize = parts.next().unwrap_or("").trim().parse().unwrap_or(0);
    let data = parts.next().unwrap_or("");
    let bits: Vec<bool> = data
        .chars()
        .filter(|c| *c == '0' || *c == '1')
        .map(|c| c == '1')
        .collect();
    if bits.len() != want {
        return Err(ProgError::BadBitstream(format!(
            "L field has {} bits, expected {want}",
            bits.len()
        )));
    }
    Ok(bits)
}

fn parse_jed(text: &str) -> Result<ParsedJed> {
    let body = text.trim_matches(|c| c == '\u{2}' || c == '\u{3}');
    let mut state = ParseState::Init;
    let mut device: Option<&'static Device> = None;
    let mut main_bits: Vec<bool> = Vec::new();
    let mut sed_crc_bits: Vec<bool> = Vec::new();
    let mut user_code = None;

    for field in body.split('*') {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }

        if let Some(name) = field.strip_prefix("NOTE DEVICE NAME:") {
            let name = name.trim();
            device = Some(
                DEVICE_TABLE
                    .iter()
                    .find(|d| d.name == name)
                    .ok_or_else(|| ProgError::UnsupportedTarget(name.to_string()))?,
            );
            continue;
        }
        if field.starts_with('N') {
            continue;
        }

        let mut chars = field.chars();
        let tag = chars.next().unwrap();
        let rest = chars.as_str();

        match tag {
            'Q' if rest.starts_with('P') => {
                if state != ParseState::Init {
                    return Err(ProgError::BadBitstream("QP field out of order".into()));
                }
                let dev = device
                    .ok_or_else(|| ProgError::BadBitstream("QP field before device name".into()))?;
                let n: usize = rest[1..]
                    .trim()
                    .parse()
                    .map_err(|_| ProgError::BadBitstream("malformed QP field".into()))?;
                if n != dev.pincount as usize {
                    return Err(ProgError::BadBitstream(format!(
                        "QP {n} does not match {}'s pin count {}",
                        dev.name, dev.pincount
                    )));
                }
                state = ParseState::PackKnown;
            }
            'Q' if rest.starts_with('F') => {
                if state != ParseState::PackKnown {
                    return Err(ProgError::BadBitstream("QF field out of order".into()));
                }
                let dev = device.expect("QP already validated device presence");
                let n: usize = rest[1..]
                    .trim()
                    .parse()
                    .map_err(|_| ProgError::BadBitstream("malformed QF field".into()))?;
                if n != dev.fuses as usize {
                    return Err(ProgError::BadBitstream(format!(
                        "QF {n} does not match {}'s fuse count {}",
                        dev.name, dev.fuses
                    )));
                }
                state = ParseState::SizeKnown;
            }
            'F' => {
                if state != ParseState::SizeKnown {
                    return Err(ProgError::BadBitstream("F field out of order".into()));
                }
                state = ParseState::ProgInitiated;
            }
            'L' => match state {
                ParseState::ProgInitiated => {
                    state = ParseState::Fuses;
                    let dev = device.expect("device selected before F field");
                    let want = (dev.row_width * dev.addr_len) as usize;
                    main_bits = parse_l_bits(rest, want)?;
                    state = ParseState::FusesDone;
                }
                ParseState::FusesDone => {
                    state = ParseState::SedCrc;
                    sed_crc_bits = parse_l_bits(rest, 32)?;
                    state = ParseState::HaveSedCrc;
                }
                _ => return Err(ProgError::BadBitstream("L field out of order".into())),
            },
            'U' if rest.starts_with('H') => {
                if state != ParseState::HaveSedCrc {
                    return Err(ProgError::BadBitstream("UH field out of order".into()));
                }
                user_code = Some(rest[1..].trim().to_string());
                state = ParseState::UserSig;
            }
            _ => {}
        }
    }

    let device = device.ok_or_else(|| ProgError::BadBitstream("missing device name".into()))?;
    if state != ParseState::UserSig {
        return Err(ProgError::BadBitstream("incomplete bitstream file".into()));
    }

    Ok(ParsedJed {
        device,
        main_bits,
        sed_crc_bits,
        user_code,
    })
}

fn row_hex(bits: &[bool], start: usize, width: usize) -> String {
    encode_nibbles(&bits[start..start + width])
}

/// Translate a parsed `.jed` bitstream into a complete SVF program for
/// `target`. Returns the SVF text ready for [`crate::svf::tokenize`].
pub fn translate(jed_text: &str, target: Target) -> Result<String> {
    let parsed = parse_jed(jed_text)?;
    let device = parsed.device;

    let sed_crc = encode_nibbles(&parsed.sed_crc_bits);
    let user_code = parsed
        .user_code
        .clone()
        .unwrap_or_else(|| "00000000".to_string());

    let mut svf = String::new();

    svf.push_str("STATE RESET;\nSTATE IDLE;\n");
    svf.push_str("SIR 8 TDI (16);\n");
    svf.push_str(&format!(
        "SDR 32 TDI (FFFFFFFF) TDO ({:08X}) MASK (FFFFFFFF);\n",
        device.idcode
    ));

    match target {
        Target::Sram => {
            svf.push_str("SIR 8 TDI (1C);\nSTATE DRPAUSE;\nSTATE IDLE;\n");
            svf.push_str("SIR 8 TDI (55);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
            svf.push_str("SIR 8 TDI (03);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
        }
        Target::Flash => {
            svf.push_str("SIR 8 TDI (35);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
            for mask in ["10", "40", "04"] {
                svf.push_str("SIR 8 TDI (B2);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
                svf.push_str(&format!(
                    "SDR 8 TDI (00) TDO (00) MASK ({mask});\n"
                ));
            }
            svf.push_str("SIR 8 TDI (03);\nRUNTEST IDLE 3 TCK 120 SEC;\n");
            svf.push_str("SIR 8 TDI (52);\nSDR 1 TDI (0) TDO (1);\n");
            svf.push_str("SIR 8 TDI (B2);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
            svf.push_str("SDR 8 TDI (00) TDO (00) MASK (01);\n");
        }
    }

    for k in 0..device.addr_len as usize {
        if target == Target::Flash {
            svf.push_str("SIR 8 TDI (67);\n");
        }
        svf.push_str(&format!("! Shift in Data Row = {k}\n"));
        let hex = row_hex(&parsed.main_bits, k * device.row_width as usize, device.row_width as usize);
        svf.push_str(&format!("SDR {} TDI ({hex});\n", device.row_width));
        if target == Target::Flash {
            svf.push_str("RUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
            svf.push_str("SIR 8 TDI (52);\nSDR 1 TDI (0) TDO (1);\n");
        } else {
            svf.push_str("RUNTEST IDLE 3 TCK;\n");
        }
    }

    svf.push_str("SIR 8 TDI (1A);\n");
    svf.push_str(&format!("SDR 32 TDI ({user_code});\n"));
    svf.push_str("RUNTEST IDLE 3 TCK 1.0E-2 SEC;\n");
    if target == Target::Flash {
        svf.push_str("SIR 8 TDI (B2);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
        svf.push_str("SDR 8 TDI (00) TDO (00) MASK (01);\n");
    }
    svf.push_str("SIR 8 TDI (45);\n");
    svf.push_str(&format!("SDR 32 TDI ({sed_crc});\n"));
    svf.push_str("RUNTEST IDLE 3 TCK 1.0E-2 SEC;\n");
    svf.push_str("SIR 8 TDI (44);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
    svf.push_str(&format!("SDR 32 TDI (00000000) TDO ({sed_crc});\n"));
    svf.push_str("SIR 8 TDI (B2);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
    svf.push_str("SDR 8 TDI (00) TDO (00) MASK (01);\n");

    svf.push_str("SIR 8 TDI (2F);\n");
    if target == Target::Flash {
        svf.push_str("RUNTEST IDLE 3 TCK 2.0E-1 SEC;\n");
    } else {
        svf.push_str("RUNTEST IDLE 3 TCK;\n");
    }
    svf.push_str("SIR 8 TDI (B2);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
    svf.push_str("SDR 8 TDI (00) TDO (02) MASK (03);\n");
    if target == Target::Flash {
        svf.push_str("SIR 8 TDI (B2) TDO (FF) MASK (04);\n");
    }

    svf.push_str("SIR 8 TDI (1E);\nRUNTEST IDLE 3 TCK 2.0E-3 SEC;\n");
    svf.push_str("SIR 8 TDI (FF);\nRUNTEST IDLE 3 TCK 1.0E-3 SEC;\n");
    svf.push_str("STATE RESET;\n");

    Ok(svf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_NAME: &str = "LFXP2-5E-5TQFP144";

    fn sample_jed() -> String {
        let device = DEVICE_TABLE.iter().find(|d| d.name == DEVICE_NAME).unwrap();
        let main_len = (device.row_width * device.addr_len) as usize;
        let mut bits = String::with_capacity(main_len);
        for i in 0..main_len {
            bits.push(if i % 7 == 0 { '1' } else { '0' });
        }
        let sed_crc = "01".repeat(16);
        format!(
            "\u{2}NOTE DEVICE NAME:{}*\nQP{}*\nQF{}*\nF*\nL0 {}*\nL{} {}*\nUH1234ABCD*\n\u{3}",
            device.name, device.pincount, device.fuses, bits, main_len, sed_crc
        )
    }

    #[test]
    fn translate_rejects_unknown_device_name() {
        let jed = "\u{2}NOTE DEVICE NAME:NOT-A-REAL-DEVICE*\n\u{3}";
        let err = translate(jed, Target::Sram).unwrap_err();
        assert!(matches!(err, ProgError::UnsupportedTarget(_)));
    }

    #[test]
    fn translate_rejects_qf_not_matching_selected_device() {
        let device = DEVICE_TABLE.iter().find(|d| d.name == DEVICE_NAME).unwrap();
        let jed = format!(
            "\u{2}NOTE DEVICE NAME:{}*\nQP{}*\nQF16*\n\u{3}",
            device.name, device.pincount
        );
        let err = translate(&jed, Target::Sram).unwrap_err();
        assert!(matches!(err, ProgError::BadBitstream(_)));
    }

    #[test]
    fn translate_rejects_third_l_block() {
        let device = DEVICE_TABLE.iter().find(|d| d.name == DEVICE_NAME).unwrap();
        let main_len = (device.row_width * device.addr_len) as usize;
        let bits = "0".repeat(main_len);
        let sed_crc = "0".repeat(32);
        let jed = format!(
            "\u{2}NOTE DEVICE NAME:{}*\nQP{}*\nQF{}*\nF*\nL0 {}*\nL{} {}*\nL0 {}*\n\u{3}",
            device.name, device.pincount, device.fuses, bits, main_len, sed_crc, sed_crc
        );
        let err = translate(&jed, Target::Sram).unwrap_err();
        assert!(matches!(err, ProgError::BadBitstream(_)));
    }

    #[test]
    fn translate_sram_program_starts_with_idcode_check() {
        let jed = sample_jed();
        let svf = translate(&jed, Target::Sram).unwrap();
        assert!(svf.starts_with("STATE RESET;\nSTATE IDLE;\nSIR 8 TDI (16);\n"));
        assert!(svf.contains("TDO (01299043)"));
        assert!(!svf.contains("SIR 8 TDI (21)"));
    }

    #[test]
    fn translate_flash_program_includes_key_protection_polls() {
        let jed = sample_jed();
        let svf = translate(&jed, Target::Flash).unwrap();
        assert!(svf.contains("MASK (10);"));
        assert!(svf.contains("MASK (40);"));
        assert!(svf.contains("MASK (04);"));
    }

    #[test]
    fn translate_emits_one_data_row_comment_per_row() {
        let jed = sample_jed();
        let svf = translate(&jed, Target::Sram).unwrap();
        assert_eq!(svf.matches("! Shift in Data Row").count(), 1938);
    }
}
