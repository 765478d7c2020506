//! Bit-level SDR/SIR execution (C4): the PAUSE→EXIT2→SHIFT→bits→EXIT1→PAUSE
//! dance, the hex/nibble codec SVF fields are written in, and the masked
//! TDO compare. Grounded on ujprog.c's `send_generic()`/`send_dr()`/
//! `send_ir()`, redesigned to hand back an owned `Vec<bool>` result instead
//! of overwriting the caller's TDI buffer in place.
use crate::buffer::TxRxBuffer;
use crate::error::{ProgError, Result};
use crate::statemachine::{TapEngine, TapState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    Data,
    Instruction,
}

/// Where in the edge stream a queued shift's result bits land, so the
/// caller can read them back from [`TxRxBuffer`] after a commit.
#[derive(Debug)]
pub struct ShiftRequest {
    first_edge: usize,
    n: usize,
}

/// Queue a PAUSE→EXIT2→SHIFT→(n bits)→EXIT1→PAUSE sequence. The TAP must
/// already be in the matching PAUSE state (DRPAUSE for `Data`, IRPAUSE for
/// `Instruction`) on entry, matching ujprog.c's `send_dr`/`send_ir`
/// preconditions.
pub fn queue_shift(
    engine: &mut TapEngine,
    buf: &mut TxRxBuffer,
    reg: Register,
    tdi: &[bool],
) -> Result<ShiftRequest> {
    let pause = match reg {
        Register::Data => TapState::DrPause,
        Register::Instruction => TapState::IrPause,
    };

    if engine.current() != pause {
        return Err(ProgError::Invalid(format!(
            "shift requires {} state, TAP is in {}",
            pause.name(),
            engine.current().name()
        )));
    }
    if tdi.is_empty() {
        return Err(ProgError::BadSvf("cannot shift zero bits".into()));
    }

    buf.push_edge(true, false); // PAUSE -> EXIT2
    buf.push_edge(false, false); // EXIT2 -> SHIFT

    let first_edge = buf.tx().len() / 2;
    let n = tdi.len();
    for (i, &tdi_bit) in tdi.iter().enumerate() {
        let last = i == n - 1;
        buf.push_edge(last, tdi_bit); // TMS=1 on the final bit exits SHIFT
    }
    buf.push_edge(false, false); // EXIT1 -> PAUSE

    // The sequence always returns to the PAUSE it started from.
    Ok(ShiftRequest { first_edge, n })
}

/// Read back a previously queued shift's TDO bits. Must be called only
/// after the buffer holding those edges has been committed in SYNC mode.
pub fn read_shift_result(buf: &TxRxBuffer, req: &ShiftRequest) -> Vec<bool> {
    (0..req.n).map(|i| buf.tdo_bit(req.first_edge + i)).collect()
}

/// Apply MASK (if any) to both sides and compare, per spec.md's
/// `(r[i] & m[i]) == (e[i] & m[i])` rule.
pub fn compare_masked(received: &[bool], expected: &[bool], mask: Option<&[bool]>) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    match mask {
        Some(m) if m.len() == received.len() => received
            .iter()
            .zip(expected.iter())
            .zip(m.iter())
            .all(|((r, e), m)| (*r && *m) == (*e && *m)),
        _ => received == expected,
    }
}

fn hex_nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(ProgError::BadSvf(format!("invalid hex digit '{}'", c as char))),
    }
}

fn nibble_hex(n: u8) -> u8 {
    match n {
        0..=9 => b'0' + n,
        10..=15 => b'A' + (n - 10),
        _ => unreachable!(),
    }
}

/// Decode an SVF hex field into exactly `bits` boolean values, LSB-first.
/// The rightmost hex character holds the lowest-order nibble, matching
/// spec.md §4.4/§4.6's scan direction.
pub fn decode_nibbles(hex: &str, bits: usize) -> Result<Vec<bool>> {
    let chars: Vec<u8> = hex.bytes().collect();
    let expected_chars = bits.div_ceil(4);
    if chars.len() != expected_chars {
        return Err(ProgError::BadSvf(format!(
            "expected {expected_chars} hex digits for {bits} bits, got {}",
            chars.len()
        )));
    }

    let mut out = Vec::with_capacity(bits);
    for i in 0..bits {
        let nibble_from_end = i / 4;
        let char_pos = chars.len() - 1 - nibble_from_end;
        let nibble = hex_nibble(chars[char_pos])?;
        out.push((nibble >> (i % 4)) & 1 != 0);
    }
    Ok(out)
}

/// Inverse of [`decode_nibbles`]: pack bits back into an uppercase hex
/// string, LSB-nibble-first.
pub fn encode_nibbles(bits: &[bool]) -> String {
    let nchars = bits.len().div_ceil(4);
    let mut chars = vec![b'0'; nchars];
    for (i, &bit) in bits.iter().enumerate() {
        if !bit {
            continue;
        }
        let nibble_from_end = i / 4;
        let char_pos = chars.len() - 1 - nibble_from_end;
        let cur = hex_nibble(chars[char_pos]).unwrap_or(0);
        chars[char_pos] = nibble_hex(cur | (1 << (i % 4)));
    }
    String::from_utf8(chars).expect("hex digits are ASCII")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_nibbles_roundtrips_through_encode() {
        let bits = decode_nibbles("A5", 8).unwrap();
        assert_eq!(encode_nibbles(&bits), "A5");
    }

    #[test]
    fn decode_nibbles_lsb_first_for_partial_top_nibble() {
        // 5 bits -> 2 hex chars; top char only contributes 1 bit.
        let bits = decode_nibbles("15", 5).unwrap();
        assert_eq!(bits, vec![true, false, true, false, true]);
    }

    #[test]
    fn decode_nibbles_rejects_bad_digit() {
        assert!(decode_nibbles("GG", 8).is_err());
    }

    #[test]
    fn compare_masked_ignores_masked_out_bits() {
        let r = vec![true, true, false];
        let e = vec![true, false, false];
        let m = vec![true, false, true];
        assert!(compare_masked(&r, &e, Some(&m)));
    }

    #[test]
    fn compare_masked_without_mask_requires_exact_match() {
        let r = vec![true, false];
        let e = vec![true, true];
        assert!(!compare_masked(&r, &e, None));
    }

    #[test]
    fn queue_shift_requires_matching_pause_state() {
        let mut engine = TapEngine::new();
        let mut buf = TxRxBuffer::new();
        let err = queue_shift(&mut engine, &mut buf, Register::Data, &[true]).unwrap_err();
        assert!(matches!(err, ProgError::Invalid(_)));
    }

    #[test]
    fn queue_shift_emits_pause_exit2_shift_bits_exit1_pause() {
        let mut engine = TapEngine::new();
        let mut buf = TxRxBuffer::new();
        engine.set_state(TapState::Reset, &mut buf).unwrap();
        engine.set_state(TapState::Idle, &mut buf).unwrap();
        engine.set_state(TapState::DrPause, &mut buf).unwrap();
        buf.clear_tx();

        let req = queue_shift(&mut engine, &mut buf, Register::Data, &[true, false, true]).unwrap();
        // EXIT2, SHIFT, 3 bits, EXIT1->PAUSE = 6 edges total.
        assert_eq!(buf.tx().len(), 12);
        assert_eq!(req.n, 3);
    }
}
