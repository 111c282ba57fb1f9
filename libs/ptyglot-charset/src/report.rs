//! Listings of the built-in tables for the command-line surface.

use crate::locale;
use crate::registry;
use encoding_rs::Encoding;
use std::fmt::Write as _;

// cSpell:ignore fontenc STARTENCODING STARTMAPPING ENDMAPPING ENDENCODING

/// The `-list` report: every locale row with its bank assignments, then
/// every designatable charset.
pub fn report_charsets() -> String {
    let mut out = String::new();
    out.push_str("Known locale encodings:\n\n");
    for row in locale::rows() {
        if let Some(other) = row.other {
            let _ = writeln!(out, "  {other} (non-ISO-2022 encoding)");
            continue;
        }
        let _ = write!(out, "  {}: GL -> G{}, GR -> G{}", row.name, row.gl, row.gr);
        for (i, g) in row.g.iter().enumerate() {
            if let Some(name) = g {
                let _ = write!(out, ", G{i}: {name}");
            }
        }
        out.push('\n');
    }

    out.push_str("\n\nKnown charsets (not all may be available):\n\n");
    for row in registry::fontenc_rows() {
        let _ = writeln!(
            out,
            "  {}{}",
            row.name,
            if row.final_byte != 0 { " (ISO 2022)" } else { "" }
        );
    }
    out
}

/// The `-list-fontenc` report: designatable charsets with availability.
pub fn report_fontenc_charsets() -> String {
    let mut out = String::new();
    out.push_str("Available charset tables:\n\n");
    for row in registry::fontenc_rows() {
        let charset = if row.final_byte != 0 {
            registry::get_by_designation(row.kind, row.final_byte)
        } else {
            registry::get_by_name(row.name)
        };
        let available = !charset.is_unknown() && charset.kind() == row.kind;
        let _ = writeln!(
            out,
            "  {}{}",
            row.name,
            if available { "" } else { " (not available)" }
        );
    }
    out
}

/// The `-list-iconv` report: provider labels the tables draw from.
pub fn report_provider_charsets() -> String {
    let mut out = String::new();
    out.push_str("Known provider encodings:\n\n");
    for label in registry::provider_labels() {
        let available = Encoding::for_label(label.as_bytes()).is_some();
        let _ = writeln!(
            out,
            "  {label}{}",
            if available { "" } else { " (not available)" }
        );
    }
    out
}

fn dump_mapping(name: &str, pairs: &[(u16, char)], fill: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "STARTENCODING {name}");
    let _ = writeln!(out, "STARTMAPPING unicode");
    for &(code, ch) in pairs {
        if !fill && u32::from(code) == ch as u32 {
            continue;
        }
        let _ = writeln!(out, "0x{code:02X} 0x{:04X}", ch as u32);
    }
    out.push_str("ENDMAPPING\n");
    out.push_str("ENDENCODING\n");
    out
}

/// The `-show-fontenc` report: one charset's table in `.enc` form.
/// One-to-one rows are omitted unless `fill` is set.
pub fn show_fontenc_charset(name: &str, fill: bool) -> Option<String> {
    let charset = registry::get_by_name(name);
    if charset.is_unknown() {
        return None;
    }
    Some(dump_mapping(charset.name(), &charset.forward_pairs(), fill))
}

/// The `-show-iconv` report: a provider encoding's single-byte table in
/// `.enc` form.
pub fn show_provider_charset(label: &str, fill: bool) -> Option<String> {
    let encoding = Encoding::for_label(label.as_bytes())?;
    let mut pairs = Vec::new();
    for b in 0u16..=0xFF {
        let bytes = [b as u8];
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes);
        if had_errors {
            continue;
        }
        let mut chars = text.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            pairs.push((b, ch));
        }
    }
    Some(dump_mapping(encoding.name(), &pairs, fill))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charset_report_lists_locales_and_tables() {
        let report = report_charsets();
        assert!(report.contains("eucJP: GL -> G0, GR -> G1"));
        assert!(report.contains("G3: JIS X 0212"));
        assert!(report.contains("UTF-8 (non-ISO-2022 encoding)"));
        assert!(report.contains("ISO 8859-15 (ISO 2022)"));
        // 128-sets take no part in ISO 2022 designation.
        assert!(report.contains("  KOI8-R\n"));
    }

    #[test]
    fn fontenc_dump_skips_identity_rows_by_default() {
        let dump = show_fontenc_charset("ASCII", false).unwrap();
        assert!(dump.starts_with("STARTENCODING ASCII"));
        assert!(!dump.contains("0x41"));
        let filled = show_fontenc_charset("ASCII", true).unwrap();
        assert!(filled.contains("0x41 0x0041"));
    }

    #[test]
    fn fontenc_dump_shows_real_mappings() {
        let dump = show_fontenc_charset("ISO 8859-15", false).unwrap();
        assert!(dump.contains("0xA4 0x20AC"));
    }

    #[test]
    fn unknown_names_dump_nothing() {
        assert!(show_fontenc_charset("no such charset", false).is_none());
        assert!(show_provider_charset("no-such-label", false).is_none());
    }

    #[test]
    fn provider_dump_covers_the_byte_range() {
        let dump = show_provider_charset("koi8-r", false).unwrap();
        assert!(dump.starts_with("STARTENCODING KOI8-R"));
        // 0xC1 is Cyrillic small a in KOI8-R.
        assert!(dump.contains("0xC1 0x0430"));
    }
}
