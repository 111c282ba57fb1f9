//! Terminal-to-child direction: decode the user's UTF-8 and re-encode
//! each code point in the child's expected form, emitting shifts as
//! needed. Designation sequences are never generated; the bank
//! configuration is fixed at startup.

use crate::charset::CharsetKind;
use crate::state::Iso2022;

const SO: u8 = 0x0E;
const SI: u8 = 0x0F;
const SS2: u8 = 0x8E;
const SS3: u8 = 0x8F;

pub(crate) fn copy_in(state: &mut Iso2022, input: &[u8], out: &mut Vec<u8>) {
    // Reattach the tail of a character cut by the previous read.
    let carried;
    let bytes: &[u8] = if state.utf8_pending_len > 0 {
        let mut v = Vec::with_capacity(state.utf8_pending_len + input.len());
        v.extend_from_slice(&state.utf8_pending[..state.utf8_pending_len]);
        v.extend_from_slice(input);
        state.utf8_pending_len = 0;
        carried = v;
        &carried
    } else {
        input
    };

    let mut text = String::with_capacity(bytes.len() + 4);
    let mut rest = bytes;
    loop {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                text.push_str(s);
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                // SAFETY: the validator reported this prefix as valid UTF-8.
                text.push_str(unsafe { std::str::from_utf8_unchecked(valid) });
                match e.error_len() {
                    Some(n) => {
                        text.push('\u{FFFD}');
                        rest = &after[n..];
                    }
                    None => {
                        // Truncated character at the end of the read; at
                        // most three bytes, kept for the next call.
                        state.utf8_pending[..after.len()].copy_from_slice(after);
                        state.utf8_pending_len = after.len();
                        break;
                    }
                }
            }
        }
    }

    if state.other.is_some() {
        return other_encode(state, &text, out);
    }

    for ch in text.chars() {
        put_char(state, ch, out);
    }
}

fn put_char(state: &mut Iso2022, ch: char, out: &mut Vec<u8>) {
    // ASCII controls go out untouched. SP and DEL are fixed positions
    // under ISO 2022, independent of what is designated.
    if (ch as u32) <= 0x20 || ch == '\u{7F}' {
        out.push(ch as u8);
        return;
    }

    let order = [state.gl(), state.gr(), 0, 1, 2, 3];
    let mut tried = [false; 4];
    for bank in order {
        if tried[bank] {
            continue;
        }
        tried[bank] = true;
        if let Some(code) = state.bank(bank).reverse(ch) {
            emit_code(state, bank, code, out);
            return;
        }
    }
    out.push(b'?');
}

fn emit_code(state: &mut Iso2022, bank: usize, code: u16, out: &mut Vec<u8>) {
    let kind = state.bank(bank).kind();

    if bank == state.gl() {
        push_code(out, code, kind, false);
    } else if bank == state.gr() && state.input.eight_bit {
        push_code(out, code, kind, true);
    } else if (bank == 2 || bank == 3) && state.input.single_shifts {
        if state.input.eight_bit {
            out.push(if bank == 2 { SS2 } else { SS3 });
        } else {
            out.extend_from_slice(if bank == 2 { b"\x1BN" } else { b"\x1BO" });
        }
        let high = state.input.ss_gr && state.input.eight_bit;
        push_code(out, code, kind, high);
    } else if (bank == 0 || bank == 1) && state.input.locking_shifts {
        out.push(if bank == 0 { SI } else { SO });
        state.set_gl(bank);
        push_code(out, code, kind, false);
    } else {
        out.push(b'?');
    }
}

fn push_code(out: &mut Vec<u8>, code: u16, kind: CharsetKind, high: bool) {
    let or = if high { 0x80 } else { 0 };
    if kind.is_two_byte() {
        let hi = (code >> 8) as u8;
        let lo = code as u8;
        out.push(hi | or);
        // Big5-style trailers carry their own high bit.
        if kind == CharsetKind::Set94x192 {
            out.push(lo);
        } else {
            out.push(lo | or);
        }
    } else {
        out.push(code as u8 | or);
    }
}

fn other_encode(state: &mut Iso2022, text: &str, out: &mut Vec<u8>) {
    let codec = state.other.as_mut().expect("checked by caller");
    let mut buf = [0u8; 1024];
    let mut src = text;
    while !src.is_empty() {
        let (result, read, written) =
            codec
                .encoder
                .encode_from_utf8_without_replacement(src, &mut buf, false);
        out.extend_from_slice(&buf[..written]);
        src = &src[read..];
        match result {
            encoding_rs::EncoderResult::InputEmpty => break,
            encoding_rs::EncoderResult::OutputFull => continue,
            encoding_rs::EncoderResult::Unmappable(_) => out.push(b'?'),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::locale_state;

    fn state_for(locale: &str) -> Iso2022 {
        Iso2022::from_locale(&locale_state(locale).unwrap())
    }

    fn encode_all(state: &mut Iso2022, text: &str) -> Vec<u8> {
        let mut out = Vec::new();
        state.copy_in(text.as_bytes(), &mut out);
        out
    }

    #[test]
    fn ascii_and_controls_stay_verbatim() {
        let mut s = state_for("C");
        assert_eq!(encode_all(&mut s, "Hello\r\n\tworld"), b"Hello\r\n\tworld");
    }

    #[test]
    fn latin1_goes_out_through_gr() {
        let mut s = state_for("ISO8859-1");
        assert_eq!(encode_all(&mut s, "\u{A9}"), b"\xA9");
        assert_eq!(encode_all(&mut s, "caf\u{E9}"), b"caf\xE9");
    }

    #[test]
    fn euc_two_byte_characters_get_their_high_bits() {
        let mut s = state_for("eucJP");
        assert_eq!(encode_all(&mut s, "\u{3042}"), b"\xA4\xA2");
        assert_eq!(encode_all(&mut s, "A\u{3042}B"), b"A\xA4\xA2B");
    }

    #[test]
    fn single_shifts_reach_g2() {
        let mut s = state_for("eucJP");
        // Half-width katakana live in G2 only.
        assert_eq!(encode_all(&mut s, "\u{FF61}"), b"\x8E\xA1");
    }

    #[test]
    fn seven_bit_mode_uses_escape_form_single_shifts() {
        let mut s = state_for("eucJP");
        s.input.eight_bit = false;
        s.input.locking_shifts = true;
        assert_eq!(encode_all(&mut s, "\u{FF61}"), b"\x1BN\x21");
        // Two-byte characters need a locking shift in 7-bit mode.
        assert_eq!(encode_all(&mut s, "\u{3042}A"), b"\x0E\x24\x22\x0F\x41");
    }

    #[test]
    fn ssgr_disabled_presents_shifted_bytes_through_gl() {
        let mut s = state_for("eucJP");
        s.input.ss_gr = false;
        assert_eq!(encode_all(&mut s, "\u{FF61}"), b"\x8E\x21");
    }

    #[test]
    fn locking_shifts_update_gl() {
        let mut s = state_for("eucJP");
        s.input.eight_bit = false;
        s.input.locking_shifts = true;
        // SO into JIS X 0208, two characters, SI back for ASCII.
        assert_eq!(
            encode_all(&mut s, "\u{3042}\u{3044}A"),
            b"\x0E\x24\x22\x24\x24\x0F\x41"
        );
    }

    #[test]
    fn unrepresentable_characters_become_question_marks() {
        let mut s = state_for("C");
        assert_eq!(encode_all(&mut s, "a\u{4E00}b"), b"a?b");
        let mut s = state_for("eucJP");
        // No bank of eucJP carries the snowman.
        assert_eq!(encode_all(&mut s, "\u{2603}"), b"?");
    }

    #[test]
    fn invalid_utf8_is_replaced_and_resynced() {
        let mut s = state_for("C");
        let mut out = Vec::new();
        s.copy_in(b"a\xFFb", &mut out);
        assert_eq!(out, b"a?b");
    }

    #[test]
    fn partial_utf8_is_buffered_across_calls() {
        let mut s = state_for("ISO8859-1");
        let mut out = Vec::new();
        let bytes = "\u{E9}".as_bytes();
        s.copy_in(&bytes[..1], &mut out);
        assert!(out.is_empty());
        s.copy_in(&bytes[1..], &mut out);
        assert_eq!(out, b"\xE9");
    }

    #[test]
    fn other_mode_encodes_through_the_codec() {
        let mut s = state_for("gbk");
        assert_eq!(encode_all(&mut s, "\u{4F60}\u{597D}"), b"\xC4\xE3\xBA\xC3");
        // Unmappable characters degrade to '?'.
        assert_eq!(encode_all(&mut s, "a\u{10348}b"), b"a?b");

        let mut s = state_for("UTF-8");
        assert_eq!(encode_all(&mut s, "\u{2603}"), "\u{2603}".as_bytes());
    }

    #[test]
    fn big5_trailer_keeps_its_own_high_bit() {
        let mut s = state_for("Big5");
        assert_eq!(encode_all(&mut s, "\u{4E00}"), b"\xA4\x40");
    }

    #[test]
    fn round_trip_over_the_representable_subset() {
        let text = "plain text, caf\u{E9}? \u{3042}\u{FF61}\u{4E02}";
        let mut encoder = state_for("eucJP");
        let mut decoder = state_for("eucJP");
        let mut encoded = Vec::new();
        encoder.copy_in(text.as_bytes(), &mut encoded);
        let mut decoded = Vec::new();
        decoder.copy_out(&encoded, &mut decoded);
        assert_eq!(decoded, text.as_bytes());
    }
}
