//! Child-to-terminal direction: interpret the child's byte stream under
//! the current ISO 2022 state and emit UTF-8.

use crate::charset::CharsetKind;
use crate::registry;
use crate::state::{Iso2022, Parser};

const ESC: u8 = 0x1B;
const SO: u8 = 0x0E;
const SI: u8 = 0x0F;
const SS2: u8 = 0x8E;
const SS3: u8 = 0x8F;

const REPLACEMENT: char = '\u{FFFD}';

fn push_char(out: &mut Vec<u8>, ch: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
}

pub(crate) fn copy_out(state: &mut Iso2022, input: &[u8], out: &mut Vec<u8>) {
    if !state.output.interpret {
        out.extend_from_slice(input);
        return;
    }
    if state.other.is_some() {
        return other_decode(state, input, out);
    }

    for &b in input {
        let mut byte = Some(b);
        // A byte may be handed back once, when it terminates a partial
        // multibyte character without belonging to it.
        while let Some(b) = byte.take() {
            byte = step(state, b, out);
        }
    }
}

fn step(state: &mut Iso2022, b: u8, out: &mut Vec<u8>) -> Option<u8> {
    match state.parser {
        Parser::Ground => {
            ground(state, b, out);
            None
        }
        Parser::Escape => {
            escape(state, b, out);
            None
        }
        Parser::EscapeDollar => {
            escape_dollar(state, b, out);
            None
        }
        Parser::Designate { slot, kind } => {
            designate(state, slot, kind, b, out);
            None
        }
        Parser::Multibyte { bank, first } => multibyte(state, bank, first, b, out),
    }
}

fn ground(state: &mut Iso2022, b: u8, out: &mut Vec<u8>) {
    match b {
        ESC => {
            state.esc.clear();
            state.esc.push(b);
            state.parser = Parser::Escape;
        }
        SO if state.output.locking_shifts => state.set_gl(1),
        SI if state.output.locking_shifts => state.set_gl(0),
        0x00..=0x1F => out.push(b),
        0x20..=0x7F => graphic(state, b, false, out),
        SS2 if state.output.single_shifts => state.single_shift = Some(2),
        SS3 if state.output.single_shifts => state.single_shift = Some(3),
        0x80..=0x9F => push_char(out, char::from(b)),
        0xA0..=0xFF => graphic(state, b, true, out),
    }
}

/// One graphic byte from the left (`right == false`) or right half.
fn graphic(state: &mut Iso2022, b: u8, right: bool, out: &mut Vec<u8>) {
    let bank = state
        .single_shift
        .take()
        .unwrap_or(if right { state.gr() } else { state.gl() });
    let charset = state.bank(bank).clone();

    if charset.kind().is_two_byte() {
        let first = b & 0x7F;
        let lead_ok = match charset.kind() {
            CharsetKind::Set9696 => true,
            _ => (0x21..=0x7E).contains(&first),
        };
        if lead_ok {
            state.parser = Parser::Multibyte { bank, first };
        } else if right {
            push_char(out, REPLACEMENT);
        } else {
            out.push(b);
        }
        return;
    }

    let code = u16::from(b & 0x7F);
    // SP and DEL are not part of a 94-set; on the left half they pass
    // through as themselves.
    if charset.kind() == CharsetKind::Set94 && (code == 0x20 || code == 0x7F) {
        if right {
            push_char(out, REPLACEMENT);
        } else {
            out.push(b);
        }
        return;
    }

    match charset.recode(code) {
        Some(ch) => push_char(out, ch),
        None => push_char(out, REPLACEMENT),
    }
}

fn escape(state: &mut Iso2022, b: u8, out: &mut Vec<u8>) {
    state.esc.push(b);
    let designating = |slot, kind| Parser::Designate { slot, kind };
    match b {
        b'(' => state.parser = designating(0, CharsetKind::Set94),
        b')' => state.parser = designating(1, CharsetKind::Set94),
        b'*' => state.parser = designating(2, CharsetKind::Set94),
        b'+' => state.parser = designating(3, CharsetKind::Set94),
        b'-' => state.parser = designating(1, CharsetKind::Set96),
        b'.' => state.parser = designating(2, CharsetKind::Set96),
        b'/' => state.parser = designating(3, CharsetKind::Set96),
        b'$' => state.parser = Parser::EscapeDollar,
        b'n' if state.output.locking_shifts => locking_shift(state, |s| s.set_gl(2)),
        b'o' if state.output.locking_shifts => locking_shift(state, |s| s.set_gl(3)),
        b'~' if state.output.locking_shifts => locking_shift(state, |s| s.set_gr(1)),
        b'}' if state.output.locking_shifts => locking_shift(state, |s| s.set_gr(2)),
        b'|' if state.output.locking_shifts => locking_shift(state, |s| s.set_gr(3)),
        b'N' if state.output.single_shifts => single_shift(state, 2),
        b'O' if state.output.single_shifts => single_shift(state, 3),
        _ => flush_raw(state, out),
    }
}

fn locking_shift(state: &mut Iso2022, apply: impl FnOnce(&mut Iso2022)) {
    apply(state);
    state.esc.clear();
    state.parser = Parser::Ground;
}

fn single_shift(state: &mut Iso2022, bank: usize) {
    state.single_shift = Some(bank);
    state.esc.clear();
    state.parser = Parser::Ground;
}

fn escape_dollar(state: &mut Iso2022, b: u8, out: &mut Vec<u8>) {
    state.esc.push(b);
    let designating = |slot, kind| Parser::Designate { slot, kind };
    match b {
        b'(' => state.parser = designating(0, CharsetKind::Set9494),
        b')' => state.parser = designating(1, CharsetKind::Set9494),
        b'*' => state.parser = designating(2, CharsetKind::Set9494),
        b'+' => state.parser = designating(3, CharsetKind::Set9494),
        b'-' => state.parser = designating(1, CharsetKind::Set9696),
        b'.' => state.parser = designating(2, CharsetKind::Set9696),
        b'/' => state.parser = designating(3, CharsetKind::Set9696),
        // The original multibyte form had no intermediate byte.
        0x30..=0x7E => finish_designation(state, 0, CharsetKind::Set9494, b, out),
        _ => flush_raw(state, out),
    }
}

fn designate(state: &mut Iso2022, slot: usize, kind: CharsetKind, b: u8, out: &mut Vec<u8>) {
    state.esc.push(b);
    match b {
        0x30..=0x7E => finish_designation(state, slot, kind, b, out),
        _ => flush_raw(state, out),
    }
}

fn finish_designation(
    state: &mut Iso2022,
    slot: usize,
    kind: CharsetKind,
    final_byte: u8,
    out: &mut Vec<u8>,
) {
    if state.output.designations {
        let charset = registry::get_by_designation(kind, final_byte);
        state.set_bank(slot, charset);
        state.esc.clear();
        state.parser = Parser::Ground;
    } else {
        flush_raw(state, out);
    }
}

/// Emit a sequence we do not interpret byte-for-byte and return to
/// ground.
fn flush_raw(state: &mut Iso2022, out: &mut Vec<u8>) {
    out.append(&mut state.esc);
    state.parser = Parser::Ground;
}

fn multibyte(state: &mut Iso2022, bank: usize, first: u8, b: u8, out: &mut Vec<u8>) -> Option<u8> {
    state.parser = Parser::Ground;
    let charset = state.bank(bank).clone();

    let (second, valid) = match charset.kind() {
        CharsetKind::Set9494 => {
            let v = b & 0x7F;
            (u16::from(v), (0x21..=0x7E).contains(&v))
        }
        CharsetKind::Set9696 => {
            let v = b & 0x7F;
            (u16::from(v), v >= 0x20)
        }
        // Big5-style second bytes keep their high bit.
        _ => (u16::from(b), (0x21..=0xFE).contains(&b)),
    };

    if !valid {
        // The partial character is lost; the byte that killed it gets a
        // fresh classification.
        push_char(out, REPLACEMENT);
        return Some(b);
    }

    let code = u16::from(first) << 8 | second;
    match charset.recode(code) {
        Some(ch) => push_char(out, ch),
        None => push_char(out, REPLACEMENT),
    }
    None
}

/// Non-ISO-2022 mode: every byte goes through the stateful codec, no
/// interpretation at all.
fn other_decode(state: &mut Iso2022, input: &[u8], out: &mut Vec<u8>) {
    let codec = state.other.as_mut().expect("checked by caller");
    let mut text = String::new();
    let needed = codec
        .decoder
        .max_utf8_buffer_length(input.len())
        .unwrap_or(input.len() * 3 + 4);
    text.reserve(needed);

    let mut src = input;
    loop {
        let (result, read, _replaced) = codec.decoder.decode_to_string(src, &mut text, false);
        src = &src[read..];
        match result {
            encoding_rs::CoderResult::InputEmpty => break,
            encoding_rs::CoderResult::OutputFull => {
                out.extend_from_slice(text.as_bytes());
                text.clear();
                text.reserve(needed);
            }
        }
    }
    out.extend_from_slice(text.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::locale_state;

    fn state_for(locale: &str) -> Iso2022 {
        Iso2022::from_locale(&locale_state(locale).unwrap())
    }

    fn decode_all(state: &mut Iso2022, bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        state.copy_out(bytes, &mut out);
        out
    }

    #[test]
    fn ascii_is_the_identity() {
        let mut s = state_for("C");
        let all: Vec<u8> = (0x20..=0x7E).collect();
        assert_eq!(decode_all(&mut s, &all), all);
    }

    #[test]
    fn controls_pass_through() {
        let mut s = state_for("C");
        assert_eq!(decode_all(&mut s, b"a\tb\r\nc\x07"), b"a\tb\r\nc\x07");
    }

    #[test]
    fn latin1_right_half_becomes_utf8() {
        let mut s = state_for("ISO8859-1");
        assert_eq!(decode_all(&mut s, b"\xA9"), "\u{A9}".as_bytes());
        assert_eq!(decode_all(&mut s, b"\xE9t\xE9"), "été".as_bytes());
    }

    #[test]
    fn latin9_has_the_euro_sign() {
        let mut s = state_for("ISO8859-15");
        assert_eq!(decode_all(&mut s, b"\xA4"), "\u{20AC}".as_bytes());
    }

    #[test]
    fn legacy_multibyte_designation_installs_g0() {
        let mut s = state_for("eucJP");
        // ESC $ B designates JIS X 0208 into G0, then fullwidth A.
        assert_eq!(
            decode_all(&mut s, b"\x1B\x24\x42\x23\x41"),
            "\u{FF21}".as_bytes()
        );
    }

    #[test]
    fn euc_right_half_decodes_two_byte_characters() {
        let mut s = state_for("eucJP");
        assert_eq!(decode_all(&mut s, b"\xA4\xA2"), "\u{3042}".as_bytes());
        // SS2 reaches the half-width katakana in G2.
        assert_eq!(decode_all(&mut s, b"\x8E\xA1"), "\u{FF61}".as_bytes());
        // SS3 reaches the supplementary kanji in G3.
        assert_eq!(decode_all(&mut s, b"\x8F\xB0\xA1"), "\u{4E02}".as_bytes());
    }

    #[test]
    fn utf8_other_mode_passes_through() {
        let mut s = state_for("UTF-8");
        assert_eq!(decode_all(&mut s, b"\xE2\x98\x83"), "\u{2603}".as_bytes());
        assert_eq!(decode_all(&mut s, b"plain"), b"plain");
        // Invalid input is replaced, not fatal.
        assert_eq!(decode_all(&mut s, b"\xFFa"), "\u{FFFD}a".as_bytes());
    }

    #[test]
    fn gbk_other_mode_is_stateful_across_calls() {
        let mut s = state_for("gbk");
        let mut out = Vec::new();
        s.copy_out(b"\xC4", &mut out);
        assert!(out.is_empty());
        s.copy_out(b"\xE3", &mut out);
        assert_eq!(out, "\u{4F60}".as_bytes());
    }

    #[test]
    fn locking_shifts_move_banks_into_gl() {
        let mut s = state_for("eucJP");
        // SO shifts G1 (JIS X 0208) into GL, SI shifts G0 back.
        assert_eq!(
            decode_all(&mut s, b"\x0E\x24\x22\x0FA"),
            "\u{3042}A".as_bytes()
        );
    }

    #[test]
    fn ls2r_moves_g2_into_gr() {
        let mut s = state_for("eucJP");
        // ESC } is LS2R; GR bytes then decode through G2 (JIS X 0201).
        assert_eq!(decode_all(&mut s, b"\x1B\x7D\xA1"), "\u{FF61}".as_bytes());
    }

    #[test]
    fn designations_switch_96_sets() {
        let mut s = state_for("ISO8859-1");
        // ESC - L designates ISO 8859-5 into G1, ESC ~ shifts it to GR.
        assert_eq!(
            decode_all(&mut s, b"\x1B\x2D\x4C\x1B\x7E\xD0"),
            "\u{0430}".as_bytes()
        );
    }

    #[test]
    fn unknown_designation_installs_a_sentinel() {
        let mut s = state_for("C");
        // No 94-set has final byte 'q'; the slot gets the sentinel and
        // GL bytes decode as themselves.
        let out = decode_all(&mut s, b"\x1B\x28\x71");
        assert!(out.is_empty());
        assert!(s.bank(0).is_unknown());
        assert_eq!(decode_all(&mut s, b"ok"), b"ok");
    }

    #[test]
    fn unknown_escape_sequences_pass_through() {
        let mut s = state_for("C");
        // CSI-style sequences are not designations.
        assert_eq!(decode_all(&mut s, b"\x1B[1;31m"), b"\x1B[1;31m");
        assert_eq!(decode_all(&mut s, b"\x1B="), b"\x1B=");
    }

    #[test]
    fn invalid_second_byte_drops_the_partial_character() {
        let mut s = state_for("eucJP");
        // 0xA4 opens a JIS X 0208 character; a control byte is no valid
        // trailer and gets a fresh classification.
        assert_eq!(decode_all(&mut s, b"\xA4\x0A"), "\u{FFFD}\n".as_bytes());
    }

    #[test]
    fn decode_is_restartable_at_any_boundary() {
        let bytes = b"\x1B\x24\x42\x23\x41\x1B\x28\x42Hi\xA4\xA2";
        let mut whole = state_for("eucJP");
        let expect = decode_all(&mut whole, bytes);
        for cut in 0..bytes.len() {
            let mut s = state_for("eucJP");
            let mut out = Vec::new();
            s.copy_out(&bytes[..cut], &mut out);
            s.copy_out(&bytes[cut..], &mut out);
            assert_eq!(out, expect, "cut at {cut}");
        }
    }

    #[test]
    fn passthrough_mode_interprets_nothing() {
        let mut s = state_for("eucJP");
        s.output.interpret = false;
        let bytes = b"\x1B\x24\x42\x23\x41\xA4\xA2";
        assert_eq!(decode_all(&mut s, bytes), bytes);
    }

    #[test]
    fn disabled_designations_pass_through_raw() {
        let mut s = state_for("eucJP");
        s.output.designations = false;
        assert_eq!(decode_all(&mut s, b"\x1B\x28\x4A"), b"\x1B\x28\x4A");
        // Shifts still work.
        assert_eq!(decode_all(&mut s, b"\x0E\x24\x22"), "\u{3042}".as_bytes());
    }

    #[test]
    fn disabled_single_shifts_pass_through() {
        let mut s = state_for("eucJP");
        s.output.single_shifts = false;
        assert_eq!(decode_all(&mut s, b"\x8E"), "\u{8E}".as_bytes());
    }
}
