use crate::charset::{Charset, CharsetKind};
use crate::registry::{self, names_match, strip_name_prefix};
use std::sync::Arc;
use tracing::warn;

// cSpell:ignore eucCN eucJP eucKR HKSCS

/// One row of the built-in locale table: which banks a locale's
/// encoding starts out with, or the name of a non-ISO-2022 codec.
pub(crate) struct LocaleRow {
    pub(crate) name: &'static str,
    pub(crate) gl: usize,
    pub(crate) gr: usize,
    pub(crate) g: [Option<&'static str>; 4],
    pub(crate) other: Option<&'static str>,
}

macro_rules! locale_rows {
    ($( { $name:literal, $gl:literal, $gr:literal,
          $g0:expr, $g1:expr, $g2:expr, $g3:expr, $other:expr }, )*) => {
        &[ $( LocaleRow {
            name: $name,
            gl: $gl,
            gr: $gr,
            g: [$g0, $g1, $g2, $g3],
            other: $other,
        }, )* ]
    };
}

#[rustfmt::skip]
static LOCALE_CHARSETS: &[LocaleRow] = locale_rows![
    { "C",          0, 2, Some("ASCII"), None,                Some("ISO 8859-1"),    None,                None },
    { "POSIX",      0, 2, Some("ASCII"), None,                Some("ISO 8859-1"),    None,                None },
    { "US-ASCII",   0, 2, Some("ASCII"), None,                Some("ISO 8859-1"),    None,                None },

    { "ISO8859-1",  0, 2, Some("ASCII"), None,                Some("ISO 8859-1"),    None,                None },
    { "ISO8859-2",  0, 2, Some("ASCII"), None,                Some("ISO 8859-2"),    None,                None },
    { "ISO8859-3",  0, 2, Some("ASCII"), None,                Some("ISO 8859-3"),    None,                None },
    { "ISO8859-4",  0, 2, Some("ASCII"), None,                Some("ISO 8859-4"),    None,                None },
    { "ISO8859-5",  0, 2, Some("ASCII"), None,                Some("ISO 8859-5"),    None,                None },
    { "ISO8859-6",  0, 2, Some("ASCII"), None,                Some("ISO 8859-6"),    None,                None },
    { "ISO8859-7",  0, 2, Some("ASCII"), None,                Some("ISO 8859-7"),    None,                None },
    { "ISO8859-8",  0, 2, Some("ASCII"), None,                Some("ISO 8859-8"),    None,                None },
    { "ISO8859-9",  0, 2, Some("ASCII"), None,                Some("ISO 8859-9"),    None,                None },
    { "ISO8859-10", 0, 2, Some("ASCII"), None,                Some("ISO 8859-10"),   None,                None },
    { "ISO8859-11", 0, 2, Some("ASCII"), None,                Some("ISO 8859-11"),   None,                None },
    { "TIS620",     0, 2, Some("ASCII"), None,                Some("ISO 8859-11"),   None,                None },
    { "ISO8859-13", 0, 2, Some("ASCII"), None,                Some("ISO 8859-13"),   None,                None },
    { "ISO8859-14", 0, 2, Some("ASCII"), None,                Some("ISO 8859-14"),   None,                None },
    { "ISO8859-15", 0, 2, Some("ASCII"), None,                Some("ISO 8859-15"),   None,                None },
    { "ISO8859-16", 0, 2, Some("ASCII"), None,                Some("ISO 8859-16"),   None,                None },

    { "KOI8-R",     0, 2, Some("ASCII"), None,                Some("KOI8-R"),        None,                None },
    { "KOI8-U",     0, 2, Some("ASCII"), None,                Some("KOI8-U"),        None,                None },
    { "KOI8-RU",    0, 2, Some("ASCII"), None,                Some("KOI8-RU"),       None,                None },
    { "CP1250",     0, 2, Some("ASCII"), None,                Some("CP 1250"),       None,                None },
    { "CP1251",     0, 2, Some("ASCII"), None,                Some("CP 1251"),       None,                None },
    { "CP1252",     0, 2, Some("ASCII"), None,                Some("CP 1252"),       None,                None },
    { "CP437",      0, 2, Some("ASCII"), None,                Some("CP 437"),        None,                None },
    { "CP850",      0, 2, Some("ASCII"), None,                Some("CP 850"),        None,                None },
    { "CP852",      0, 2, Some("ASCII"), None,                Some("CP 852"),        None,                None },
    { "CP866",      0, 2, Some("ASCII"), None,                Some("CP 866"),        None,                None },
    { "TCVN",       0, 2, Some("ASCII"), None,                Some("TCVN"),          None,                None },

    { "eucCN",      0, 1, Some("ASCII"), Some("GB 2312"),     None,                  None,                None },
    { "GB2312",     0, 1, Some("ASCII"), Some("GB 2312"),     None,                  None,                None },
    { "eucJP",      0, 1, Some("ASCII"), Some("JIS X 0208"),  Some("JIS X 0201:GR"), Some("JIS X 0212"),  None },
    { "eucKR",      0, 1, Some("ASCII"), Some("KSC 5601"),    None,                  None,                None },
    { "eucCN",      0, 1, Some("ASCII"), Some("GB 2312"),     None,                  None,                None },
    { "Big5",       0, 1, Some("ASCII"), Some("Big 5"),       None,                  None,                None },

    { "gbk",        0, 1, None,          None,                None,                  None,                Some("GBK") },
    { "UTF-8",      0, 1, None,          None,                None,                  None,                Some("UTF-8") },
    { "SJIS",       0, 1, None,          None,                None,                  None,                Some("SJIS") },
    { "Big5-HKSCS", 0, 1, None,          None,                None,                  None,                Some("BIG5-HKSCS") },
    { "gb18030",    0, 1, None,          None,                None,                  None,                Some("GB18030") },
];

/// Prefix rewrites tried when an encoding label misses the table
/// outright, e.g. Solaris `ANSI1251`.
const PREFIXES: &[(&str, &str)] = &[
    ("ISO-", "ISO "),
    ("IBM", "CP "),
    ("CP-", "CP "),
    ("ANSI", "CP "),
];

/// Initial ISO 2022 configuration resolved from a locale's encoding.
pub struct LocaleState {
    pub gl: usize,
    pub gr: usize,
    pub g: [Arc<Charset>; 4],
    /// Set when the locale uses a non-ISO-2022 encoding; the banks are
    /// unused in that case.
    pub other: Option<Arc<Charset>>,
}

fn find_row(name: &str) -> Option<&'static LocaleRow> {
    LOCALE_CHARSETS.iter().find(|r| names_match(r.name, name))
}

fn match_row(label: &str) -> Option<&'static LocaleRow> {
    if label.is_empty() {
        return None;
    }

    let mut name = label;
    if let Some(stripped) = name.strip_suffix("@euro") {
        warn!("the euro character may not be supported");
        name = stripped;
    }

    if let Some(row) = find_row(name) {
        return Some(row);
    }

    for &(source, target) in PREFIXES {
        if let Some(rest) = strip_name_prefix(name, source) {
            if rest.is_empty() {
                continue;
            }
            if let Some(row) = find_row(&format!("{target}{rest}")) {
                return Some(row);
            }
        }
    }
    None
}

/// The encoding part of a locale label: the portion after the last `.`,
/// or the whole label when there is none.
pub fn encoding_of(label: &str) -> &str {
    label.rsplit_once('.').map_or(label, |(_, enc)| enc)
}

/// Resolve an encoding label to its initial ISO 2022 configuration.
///
/// Bank names are resolved through the registry; a name that fails to
/// resolve leaves a sentinel in the bank (the stream keeps flowing,
/// undecoded). `None` means the label is not in the locale table at all;
/// the caller may then consult a locale alias file and retry.
pub fn locale_state(label: &str) -> Option<LocaleState> {
    let row = match_row(label)?;

    let bank = |name: Option<&'static str>| match name {
        Some(name) => registry::get_by_name(name),
        None => registry::get_unknown(CharsetKind::Set94),
    };

    Some(LocaleState {
        gl: row.gl,
        gr: row.gr,
        g: [bank(row.g[0]), bank(row.g[1]), bank(row.g[2]), bank(row.g[3])],
        other: row.other.map(registry::get_by_name),
    })
}

pub(crate) fn rows() -> impl Iterator<Item = &'static LocaleRow> {
    LOCALE_CHARSETS.iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn encoding_part_is_after_the_last_dot() {
        assert_eq!(encoding_of("ja_JP.eucJP"), "eucJP");
        assert_eq!(encoding_of("en_US.ISO8859-1"), "ISO8859-1");
        assert_eq!(encoding_of("UTF-8"), "UTF-8");
        assert_eq!(encoding_of("a.b.KOI8-R"), "KOI8-R");
    }

    #[test]
    fn known_locales_resolve_with_non_sentinel_banks() {
        let s = locale_state("eucJP").unwrap();
        assert_eq!((s.gl, s.gr), (0, 1));
        assert_eq!(s.g[0].name(), "ASCII");
        assert_eq!(s.g[1].name(), "JIS X 0208");
        assert_eq!(s.g[2].name(), "JIS X 0201:GR");
        assert_eq!(s.g[3].name(), "JIS X 0212");
        assert!(s.other.is_none());

        let s = locale_state("C").unwrap();
        assert_eq!((s.gl, s.gr), (0, 2));
        assert!(!s.g[0].is_unknown());
        assert!(!s.g[2].is_unknown());
        assert!(s.g[1].is_unknown());
    }

    #[test]
    fn every_table_row_resolves_its_named_banks() {
        // Rows pointing at charsets the provider cannot supply are the
        // exception: their banks degrade to sentinels.
        let missing = ["KOI8-RU", "CP437", "CP850", "CP852", "TCVN"];
        for row in rows() {
            let s = locale_state(row.name).unwrap();
            if let Some(other) = &s.other {
                assert!(!other.is_unknown(), "{}", row.name);
                continue;
            }
            if missing.iter().any(|m| names_match(m, row.name)) {
                continue;
            }
            for (i, name) in row.g.iter().enumerate() {
                if name.is_some() {
                    assert!(!s.g[i].is_unknown(), "{}: G{}", row.name, i);
                }
            }
        }
    }

    #[test]
    fn multibyte_locales_use_the_other_codec() {
        let s = locale_state("UTF-8").unwrap();
        assert_eq!(s.other.as_ref().unwrap().name(), "UTF-8");
        let s = locale_state("gb18030").unwrap();
        assert_eq!(s.other.as_ref().unwrap().name(), "GB18030");
    }

    #[test]
    fn prefix_substitutions_are_applied() {
        // Solaris-style names.
        assert_eq!(match_row("IBM866").unwrap().name, "CP866");
        assert_eq!(match_row("ANSI1251").unwrap().name, "CP1251");
        assert_eq!(match_row("CP-1252").unwrap().name, "CP1252");
        // Normalized comparison already absorbs the common cases.
        assert_eq!(match_row("ISO-8859-1").unwrap().name, "ISO8859-1");
        assert_eq!(match_row("iso_8859_15").unwrap().name, "ISO8859-15");
    }

    #[traced_test]
    #[test]
    fn euro_modifier_is_stripped_with_a_warning() {
        assert_eq!(match_row("ISO8859-15@euro").unwrap().name, "ISO8859-15");
        assert!(logs_contain("euro character"));
    }

    #[test]
    fn unknown_labels_do_not_resolve() {
        assert!(locale_state("no-such-encoding").is_none());
        assert!(locale_state("").is_none());
    }
}
