use crate::charset::{Charset, CharsetKind};
use encoding_rs::Encoding;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, OnceLock};
use tracing::{debug, warn};

// cSpell:ignore fontenc dectech jisx tcvn

/// How one charset code is turned into a probe byte sequence for the
/// provider's decoder when the forward map is being derived.
#[derive(Clone, Copy)]
pub(crate) enum Probe {
    /// One byte: the shifted code itself.
    Single,
    /// Two bytes: high and low byte of the shifted code.
    Double,
    /// EUC code set 3: SS3 (0x8F) followed by the two shifted bytes.
    EucSs3,
}

impl Probe {
    fn bytes(self, shifted: u16, buf: &mut [u8; 3]) -> &[u8] {
        match self {
            Probe::Single => {
                buf[0] = shifted as u8;
                &buf[..1]
            }
            Probe::Double => {
                buf[0] = (shifted >> 8) as u8;
                buf[1] = shifted as u8;
                &buf[..2]
            }
            Probe::EucSs3 => {
                buf[0] = 0x8F;
                buf[1] = (shifted >> 8) as u8;
                buf[2] = shifted as u8;
                &buf[..3]
            }
        }
    }
}

/// Where a table charset's forward map comes from.
pub(crate) enum MapSource {
    /// Probe a provider encoding, resolved by label. Resolution failure
    /// marks the row failed and the lookup falls back to a sentinel.
    Provider {
        label: &'static str,
        probe: Probe,
    },
    /// Built-in table function over the shifted code space, for the few
    /// sets the provider does not carry.
    Builtin(fn(u16) -> Option<char>),
}

/// One row of the built-in table of designatable charsets.
pub(crate) struct FontencRow {
    pub(crate) name: &'static str,
    pub(crate) kind: CharsetKind,
    pub(crate) final_byte: u8,
    pub(crate) source: MapSource,
    pub(crate) shift: u16,
    /// Negative-cache marker: set when map derivation failed once, so
    /// later lookups skip the row instead of repeating the work.
    failed: AtomicBool,
}

macro_rules! fontenc_rows {
    ($( { $name:literal, $kind:ident, $final:expr, $source:expr, $shift:literal }, )*) => {
        vec![ $( FontencRow {
            name: $name,
            kind: CharsetKind::$kind,
            final_byte: $final,
            source: $source,
            shift: $shift,
            failed: AtomicBool::new(false),
        }, )* ]
    };
}

use MapSource::{Builtin, Provider};

macro_rules! provider {
    ($label:literal, $probe:ident) => {
        Provider {
            label: $label,
            probe: Probe::$probe,
        }
    };
}

/// The designatable charsets. The `name` is what `-g0 .. -g3` and the
/// locale table use; the provider label names the external table the
/// forward map is derived from. First match wins; names appearing twice
/// (ISO 8859-11 / TIS 620) are intentional aliases.
static FONTENC_CHARSETS: LazyLock<Vec<FontencRow>> = LazyLock::new(|| fontenc_rows![
    { "ISO 646 (1973)", Set94,    b'@', Builtin(iso646_irv),           0x00 },
    { "ASCII",          Set94,    b'B', provider!("iso-8859-1", Single),   0x00 },
    { "JIS X 0201:GL",  Set94,    b'J', Builtin(jisx0201_gl),          0x00 },
    { "JIS X 0201:GR",  Set94,    b'I', provider!("shift_jis", Single),    0x80 },
    { "DEC Special",    Set94,    b'0', Builtin(dec_special),          0x00 },
    { "DEC Technical",  Set94,    b'>', provider!("dec-dectech", Single),  0x00 },

    { "ISO 8859-1",     Set96,    b'A', provider!("iso-8859-1", Single),   0x80 },
    { "ISO 8859-2",     Set96,    b'B', provider!("iso-8859-2", Single),   0x80 },
    { "ISO 8859-3",     Set96,    b'C', provider!("iso-8859-3", Single),   0x80 },
    { "ISO 8859-4",     Set96,    b'D', provider!("iso-8859-4", Single),   0x80 },
    { "ISO 8859-5",     Set96,    b'L', provider!("iso-8859-5", Single),   0x80 },
    { "ISO 8859-6",     Set96,    b'G', provider!("iso-8859-6", Single),   0x80 },
    { "ISO 8859-7",     Set96,    b'F', provider!("iso-8859-7", Single),   0x80 },
    { "ISO 8859-8",     Set96,    b'H', provider!("iso-8859-8", Single),   0x80 },
    { "ISO 8859-9",     Set96,    b'M', provider!("iso-8859-9", Single),   0x80 },
    { "ISO 8859-10",    Set96,    b'V', provider!("iso-8859-10", Single),  0x80 },
    { "ISO 8859-11",    Set96,    b'T', provider!("iso-8859-11", Single),  0x80 },
    { "TIS 620",        Set96,    b'T', provider!("iso-8859-11", Single),  0x80 },
    { "ISO 8859-13",    Set96,    b'Y', provider!("iso-8859-13", Single),  0x80 },
    { "ISO 8859-14",    Set96,    b'_', provider!("iso-8859-14", Single),  0x80 },
    { "ISO 8859-15",    Set96,    b'b', provider!("iso-8859-15", Single),  0x80 },
    { "ISO 8859-16",    Set96,    b'f', provider!("iso-8859-16", Single),  0x80 },
    { "KOI8-E",         Set96,    b'@', provider!("koi8-e", Single),       0x80 },
    { "TCVN",           Set96,    b'Z', provider!("tcvn-0", Single),       0x80 },

    { "GB 2312",        Set9494,  b'A', provider!("gb18030", Double),  0x8080 },
    { "JIS X 0208",     Set9494,  b'B', provider!("euc-jp", Double),   0x8080 },
    { "KSC 5601",       Set9494,  b'C', provider!("euc-kr", Double),   0x8080 },
    { "JIS X 0212",     Set9494,  b'D', provider!("euc-jp", EucSs3),   0x8080 },

    { "GB 2312",        Set9696,  b'A', provider!("gb18030", Double),  0x8080 },
    { "JIS X 0208",     Set9696,  b'B', provider!("euc-jp", Double),   0x8080 },
    { "KSC 5601",       Set9696,  b'C', provider!("euc-kr", Double),   0x8080 },
    { "JIS X 0212",     Set9696,  b'D', provider!("euc-jp", EucSs3),   0x8080 },

    { "KOI8-R",         Set128,   0,    provider!("koi8-r", Single),       0x80 },
    { "KOI8-U",         Set128,   0,    provider!("koi8-u", Single),       0x80 },
    { "KOI8-RU",        Set128,   0,    provider!("koi8-ru", Single),      0x80 },
    { "CP 1252",        Set128,   0,    provider!("windows-1252", Single), 0x80 },
    { "CP 1251",        Set128,   0,    provider!("windows-1251", Single), 0x80 },
    { "CP 1250",        Set128,   0,    provider!("windows-1250", Single), 0x80 },

    { "CP 437",         Set128,   0,    provider!("cp437", Single),        0x80 },
    { "CP 850",         Set128,   0,    provider!("cp850", Single),        0x80 },
    { "CP 852",         Set128,   0,    provider!("cp852", Single),        0x80 },
    { "CP 866",         Set128,   0,    provider!("cp866", Single),        0x80 },

    { "Big 5",          Set94x192, 0,   provider!("big5", Double),     0x8000 },
]);

/// One row of the table of non-ISO-2022 multibyte encodings.
pub(crate) struct OtherRow {
    pub(crate) name: &'static str,
    label: &'static str,
    failed: AtomicBool,
}

macro_rules! other_rows {
    ($( { $name:literal, $label:literal }, )*) => {
        vec![ $( OtherRow {
            name: $name,
            label: $label,
            failed: AtomicBool::new(false),
        }, )* ]
    };
}

static OTHER_CHARSETS: LazyLock<Vec<OtherRow>> = LazyLock::new(|| other_rows![
    { "GBK",        "gbk" },
    { "UTF-8",      "utf-8" },
    { "SJIS",       "shift_jis" },
    { "BIG5-HKSCS", "big5" },
    { "GB18030",    "gb18030" },
]);

fn is_skip(c: u8) -> bool {
    c.is_ascii_whitespace() || c == b'-' || c == b'_'
}

/// Normalized name comparison: whitespace, `-` and `_` are skipped on
/// both sides, the rest compares case-insensitively.
pub fn names_match(s: &str, t: &str) -> bool {
    let s = s
        .bytes()
        .filter(|&c| !is_skip(c))
        .map(|c| c.to_ascii_lowercase());
    let t = t
        .bytes()
        .filter(|&c| !is_skip(c))
        .map(|c| c.to_ascii_lowercase());
    s.eq(t)
}

/// Normalized prefix match: consumes `prefix` from the start of `s`
/// under the same skip rules and returns the unconsumed remainder.
pub(crate) fn strip_name_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = s.as_bytes();
    let mut consumed = 0;
    for p in prefix.bytes().filter(|&c| !is_skip(c)) {
        loop {
            let (&c, tail) = rest.split_first()?;
            rest = tail;
            consumed += 1;
            if is_skip(c) {
                continue;
            }
            if c.eq_ignore_ascii_case(&p) {
                break;
            }
            return None;
        }
    }
    s.get(consumed..)
}

static CACHE: Mutex<Vec<Arc<Charset>>> = Mutex::new(Vec::new());

fn cached_by_designation(kind: CharsetKind, final_byte: u8) -> Option<Arc<Charset>> {
    let cache = CACHE.lock().unwrap();
    cache
        .iter()
        .find(|c| c.kind() == kind && c.final_byte() == final_byte)
        .cloned()
}

fn cached_by_name(name: &str) -> Option<Arc<Charset>> {
    let cache = CACHE.lock().unwrap();
    cache.iter().find(|c| names_match(c.name(), name)).cloned()
}

fn cache_charset(c: &Arc<Charset>) {
    debug!("cached charset '{}'", c.name());
    CACHE.lock().unwrap().push(c.clone());
}

static UNKNOWN_94: OnceLock<Arc<Charset>> = OnceLock::new();
static UNKNOWN_96: OnceLock<Arc<Charset>> = OnceLock::new();
static UNKNOWN_9494: OnceLock<Arc<Charset>> = OnceLock::new();
static UNKNOWN_9696: OnceLock<Arc<Charset>> = OnceLock::new();

/// The immutable `Unknown*` sentinel for a charset kind. Kinds without a
/// sentinel of their own fall back to the 94-set one.
pub fn get_unknown(kind: CharsetKind) -> Arc<Charset> {
    let (slot, kind) = match kind {
        CharsetKind::Set96 => (&UNKNOWN_96, CharsetKind::Set96),
        CharsetKind::Set9494 => (&UNKNOWN_9494, CharsetKind::Set9494),
        CharsetKind::Set9696 => (&UNKNOWN_9696, CharsetKind::Set9696),
        _ => (&UNKNOWN_94, CharsetKind::Set94),
    };
    slot.get_or_init(|| Arc::new(Charset::unknown(kind))).clone()
}

/// Derive the forward and reverse maps for a table row.
///
/// The maps are kept exact mirrors: when two codes decode to the same
/// character, the lower code wins and the higher one stays unmapped, so
/// `reverse . recode` is the identity wherever `recode` is defined.
fn build_maps(row: &FontencRow) -> Option<(HashMap<u16, char>, HashMap<char, u16>)> {
    let mut forward = HashMap::new();
    let mut reverse = HashMap::new();

    let mut insert = |shifted: u16, ch: char| {
        if let std::collections::hash_map::Entry::Vacant(e) = reverse.entry(ch) {
            e.insert(shifted);
            forward.insert(shifted, ch);
        }
    };

    match row.source {
        MapSource::Builtin(table) => {
            for code in row.kind.code_points() {
                let shifted = code + row.shift;
                if let Some(ch) = table(shifted) {
                    insert(shifted, ch);
                }
            }
        }
        MapSource::Provider { label, probe } => {
            let encoding = Encoding::for_label(label.as_bytes())?;
            let mut buf = [0u8; 3];
            for code in row.kind.code_points() {
                let shifted = code + row.shift;
                let bytes = probe.bytes(shifted, &mut buf);
                let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
                if had_errors {
                    continue;
                }
                let mut chars = text.chars();
                if let (Some(ch), None) = (chars.next(), chars.next()) {
                    insert(shifted, ch);
                }
            }
        }
    }

    if forward.is_empty() {
        return None;
    }
    Some((forward, reverse))
}

fn instantiate_fontenc(pred: impl Fn(&FontencRow) -> bool) -> Option<Arc<Charset>> {
    let row = FONTENC_CHARSETS
        .iter()
        .find(|r| !r.failed.load(Ordering::Relaxed) && pred(r))?;

    match build_maps(row) {
        Some((forward, reverse)) => {
            let c = Arc::new(Charset::mapped(
                row.name,
                row.kind,
                row.final_byte,
                row.shift,
                forward,
                reverse,
            ));
            cache_charset(&c);
            Some(c)
        }
        None => {
            warn!("no usable table for charset '{}'", row.name);
            row.failed.store(true, Ordering::Relaxed);
            None
        }
    }
}

fn instantiate_other(name: &str) -> Option<Arc<Charset>> {
    let row = OTHER_CHARSETS
        .iter()
        .find(|r| !r.failed.load(Ordering::Relaxed) && names_match(r.name, name))?;

    match Encoding::for_label(row.label.as_bytes()) {
        Some(encoding) => {
            let c = Arc::new(Charset::stream(row.name, encoding));
            cache_charset(&c);
            Some(c)
        }
        None => {
            warn!("initialization of '{}' failed", row.name);
            row.failed.store(true, Ordering::Relaxed);
            None
        }
    }
}

/// Charset named by an ISO 2022 designation: kind plus final byte.
/// Returns the kind's sentinel when nothing matches.
pub fn get_by_designation(kind: CharsetKind, final_byte: u8) -> Arc<Charset> {
    if let Some(c) = cached_by_designation(kind, final_byte) {
        return c;
    }
    if let Some(c) = instantiate_fontenc(|r| r.kind == kind && r.final_byte == final_byte) {
        return c;
    }
    debug!("no charset for kind {kind:?} final 0x{final_byte:02X}");
    get_unknown(kind)
}

/// Charset by human-readable name, under normalized comparison. Tries
/// the cache, then the designatable table, then the non-ISO-2022 table;
/// returns the 94-set sentinel when nothing matches.
pub fn get_by_name(name: &str) -> Arc<Charset> {
    if let Some(c) = cached_by_name(name) {
        return c;
    }
    if let Some(c) = instantiate_fontenc(|r| names_match(r.name, name)) {
        return c;
    }
    if let Some(c) = instantiate_other(name) {
        return c;
    }
    debug!("no charset matches '{name}'");
    get_unknown(CharsetKind::Set94)
}

pub(crate) fn fontenc_rows() -> impl Iterator<Item = &'static FontencRow> {
    FONTENC_CHARSETS.iter()
}

pub(crate) fn provider_labels() -> Vec<&'static str> {
    let mut labels: Vec<&'static str> = FONTENC_CHARSETS
        .iter()
        .filter_map(|r| match r.source {
            MapSource::Provider { label, .. } => Some(label),
            MapSource::Builtin(_) => None,
        })
        .chain(OTHER_CHARSETS.iter().map(|r| r.label))
        .collect();
    labels.sort_unstable();
    labels.dedup();
    labels
}

// ------------------------- built-in tables -------------------------

/// ISO 646:1973 international reference version: ASCII with the
/// universal currency sign in place of the dollar sign.
fn iso646_irv(code: u16) -> Option<char> {
    match code {
        0x24 => Some('\u{A4}'),
        0x21..=0x7E => char::from_u32(u32::from(code)),
        _ => None,
    }
}

/// JIS X 0201 left half: ASCII with yen sign and overline.
fn jisx0201_gl(code: u16) -> Option<char> {
    match code {
        0x5C => Some('\u{A5}'),
        0x7E => Some('\u{203E}'),
        0x21..=0x7D => char::from_u32(u32::from(code)),
        _ => None,
    }
}

/// DEC special graphics (the VT100 line-drawing set).
fn dec_special(code: u16) -> Option<char> {
    let ch = match code {
        0x5F => '\u{A0}',
        0x60 => '\u{25C6}',
        0x61 => '\u{2592}',
        0x62 => '\u{2409}',
        0x63 => '\u{240C}',
        0x64 => '\u{240D}',
        0x65 => '\u{240A}',
        0x66 => '\u{B0}',
        0x67 => '\u{B1}',
        0x68 => '\u{2424}',
        0x69 => '\u{240B}',
        0x6A => '\u{2518}',
        0x6B => '\u{2510}',
        0x6C => '\u{250C}',
        0x6D => '\u{2514}',
        0x6E => '\u{253C}',
        0x6F => '\u{23BA}',
        0x70 => '\u{23BB}',
        0x71 => '\u{2500}',
        0x72 => '\u{23BC}',
        0x73 => '\u{23BD}',
        0x74 => '\u{251C}',
        0x75 => '\u{2524}',
        0x76 => '\u{2534}',
        0x77 => '\u{252C}',
        0x78 => '\u{2502}',
        0x79 => '\u{2264}',
        0x7A => '\u{2265}',
        0x7B => '\u{3C0}',
        0x7C => '\u{2260}',
        0x7D => '\u{A3}',
        0x7E => '\u{B7}',
        0x21..=0x5E => return char::from_u32(u32::from(code)),
        _ => return None,
    };
    Some(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_skips_separators_and_case() {
        assert!(names_match("ISO 8859-1", "iso8859-1"));
        assert!(names_match("ISO 8859-1", "ISO_8859_1"));
        assert!(names_match("ISO 8859-1", "iso  88591"));
        assert!(!names_match("ISO 8859-1", "ISO 8859-11"));
        assert!(!names_match("KOI8-R", "KOI8-U"));
    }

    #[test]
    fn strip_name_prefix_consumes_skip_characters() {
        assert_eq!(strip_name_prefix("IBM866", "IBM"), Some("866"));
        assert_eq!(strip_name_prefix("ibm-866", "IBM"), Some("-866"));
        assert_eq!(strip_name_prefix("ANSI1251", "ANSI"), Some("1251"));
        assert_eq!(strip_name_prefix("CP1251", "ANSI"), None);
        assert_eq!(strip_name_prefix("IB", "IBM"), None);
    }

    #[test]
    fn repeated_lookups_return_the_same_instance() {
        let a = get_by_name("ISO 8859-5");
        let b = get_by_name("iso8859-5");
        let c = get_by_designation(CharsetKind::Set96, b'L');
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn aliases_resolve_to_the_same_row() {
        let a = get_by_name("ISO 8859-11");
        let b = get_by_name("TIS 620");
        // Both names are table rows; the first one instantiated wins the
        // cache by designation, the other gets its own instance by name.
        assert_eq!(a.kind(), CharsetKind::Set96);
        assert_eq!(b.kind(), CharsetKind::Set96);
        assert!(!a.is_unknown());
        assert!(!b.is_unknown());
    }

    #[test]
    fn unknown_names_fall_back_to_the_sentinel() {
        let c = get_by_name("no such charset");
        assert!(c.is_unknown());
        assert!(Arc::ptr_eq(&c, &get_unknown(CharsetKind::Set94)));
    }

    #[test]
    fn rows_without_a_provider_table_fail_and_stay_failed() {
        let c = get_by_name("DEC Technical");
        assert!(c.is_unknown());
        let row = FONTENC_CHARSETS
            .iter()
            .find(|r| r.name == "DEC Technical")
            .unwrap();
        assert!(row.failed.load(Ordering::Relaxed));
        // A second lookup takes the negative-cache path.
        assert!(get_by_name("DEC Technical").is_unknown());
    }

    #[test]
    fn designation_lookup_distinguishes_kinds() {
        let a = get_by_designation(CharsetKind::Set9494, b'A');
        assert_eq!(a.name(), "GB 2312");
        assert_eq!(a.kind(), CharsetKind::Set9494);
        let b = get_by_designation(CharsetKind::Set96, b'A');
        assert_eq!(b.name(), "ISO 8859-1");
    }

    #[test]
    fn fontenc_maps_round_trip() {
        // Every instantiable table satisfies reverse . recode == id on
        // the mapped part of its code space.
        for row in FONTENC_CHARSETS.iter() {
            let c = get_by_name(row.name);
            if c.is_unknown() || c.kind() != row.kind {
                continue;
            }
            for code in c.kind().code_points() {
                if let Some(ch) = c.recode(code) {
                    assert_eq!(
                        c.reverse(ch),
                        Some(code),
                        "{}: code {code:#X} char {ch:?}",
                        c.name()
                    );
                }
            }
        }
    }

    #[test]
    fn katakana_maps_through_the_right_half() {
        let c = get_by_name("JIS X 0201:GR");
        // 0x21 + shift 0x80 = 0xA1, halfwidth ideographic full stop.
        assert_eq!(c.recode(0x21), Some('\u{FF61}'));
        assert_eq!(c.reverse('\u{FF61}'), Some(0x21));
    }

    #[test]
    fn big5_second_byte_spans_both_halves() {
        let c = get_by_name("Big 5");
        assert_eq!(c.kind(), CharsetKind::Set94x192);
        // 0xA4 0x40 is the first ideograph row; code 0x2440 after shift.
        assert_eq!(c.recode(0x2440), Some('\u{4E00}'));
        assert_eq!(c.reverse('\u{4E00}'), Some(0x2440));
    }
}
