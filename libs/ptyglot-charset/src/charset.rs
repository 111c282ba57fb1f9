use std::collections::HashMap;

// cSpell:ignore fontenc

/// Structural kind of a character set.
///
/// The kind fixes how many bytes one character occupies on the wire and
/// which byte values are valid, as laid out by ISO 2022. `Set128` and
/// `Set94x192` are not ISO 2022 kinds proper but follow the same
/// designate-into-a-bank model; `Other` marks a stateful multibyte codec
/// that bypasses the bank machinery entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharsetKind {
    /// 94-character set, one byte per character in `0x21..=0x7E`.
    Set94,
    /// 96-character set, one byte per character in `0x20..=0x7F`.
    Set96,
    /// 94x94 set, two bytes per character, each byte in `0x21..=0x7E`.
    Set9494,
    /// 96x96 set, two bytes per character, each byte in `0x20..=0x7F`.
    Set9696,
    /// 128-character set covering a full right half: codes `0x00..=0x7F`,
    /// designated into GR (i.e. used with the high bit set).
    Set128,
    /// Big5-style set: first byte `0x21..=0x7E`, second byte `0x21..=0xFE`.
    Set94x192,
    /// Stateful multibyte codec outside the ISO 2022 framework.
    Other,
}

fn is_gl(n: u16) -> bool {
    (0x20..0x80).contains(&n)
}

impl CharsetKind {
    /// Whether one character occupies two bytes on the wire.
    pub fn is_two_byte(self) -> bool {
        matches!(self, Self::Set9494 | Self::Set9696 | Self::Set94x192)
    }

    /// Validity of an unshifted code produced by [Charset::reverse].
    pub(crate) fn contains_code(self, n: u16) -> bool {
        match self {
            Self::Set94 | Self::Set96 => is_gl(n),
            Self::Set128 => n < 0x80,
            Self::Set9494 | Self::Set9696 => is_gl(n >> 8) && is_gl(n & 0xFF),
            Self::Set94x192 => is_gl(n >> 8) && is_gl(n & 0x7F),
            Self::Other => false,
        }
    }

    /// Every unshifted code of the kind's code space, ascending.
    pub(crate) fn code_points(self) -> Vec<u16> {
        fn square(lo: std::ops::RangeInclusive<u16>) -> Vec<u16> {
            let mut v = Vec::with_capacity(lo.clone().count() * lo.clone().count());
            for hi in lo.clone() {
                for b in lo.clone() {
                    v.push(hi << 8 | b);
                }
            }
            v
        }

        match self {
            Self::Set94 => (0x21..=0x7E).collect(),
            Self::Set96 => (0x20..=0x7F).collect(),
            Self::Set128 => (0x00..=0x7F).collect(),
            Self::Set9494 => square(0x21..=0x7E),
            Self::Set9696 => square(0x20..=0x7F),
            Self::Set94x192 => {
                let mut v = Vec::with_capacity(94 * 222);
                for hi in 0x21u16..=0x7E {
                    for lo in 0x21u16..=0xFE {
                        v.push(hi << 8 | lo);
                    }
                }
                v
            }
            Self::Other => Vec::new(),
        }
    }
}

/// Backing behavior of one [Charset].
enum Repr {
    /// Table-backed charset. Both maps are keyed by the *shifted* code
    /// (the index into the provider's table) and are exact mirrors of
    /// each other, so `reverse . recode` is the identity on the mapped
    /// part of the code space.
    Mapped {
        shift: u16,
        forward: HashMap<u16, char>,
        reverse: HashMap<char, u16>,
    },
    /// Stateful multibyte codec. The mutable decoder/encoder state is
    /// owned per direction by [crate::Iso2022], never by the shared
    /// charset instance.
    Stream { encoding: &'static encoding_rs::Encoding },
    /// Placeholder installed when resolution fails: identity recode,
    /// always-failing reverse.
    Unknown,
}

/// One character set: identity plus forward/reverse code mapping.
///
/// Instances come out of [crate::registry] and are shared, immutable and
/// process-lived; see the registry for lookup and caching rules.
pub struct Charset {
    name: &'static str,
    kind: CharsetKind,
    final_byte: u8,
    repr: Repr,
}

impl Charset {
    pub(crate) fn mapped(
        name: &'static str,
        kind: CharsetKind,
        final_byte: u8,
        shift: u16,
        forward: HashMap<u16, char>,
        reverse: HashMap<char, u16>,
    ) -> Self {
        Self {
            name,
            kind,
            final_byte,
            repr: Repr::Mapped {
                shift,
                forward,
                reverse,
            },
        }
    }

    pub(crate) fn stream(name: &'static str, encoding: &'static encoding_rs::Encoding) -> Self {
        Self {
            name,
            kind: CharsetKind::Other,
            final_byte: 0,
            repr: Repr::Stream { encoding },
        }
    }

    pub(crate) fn unknown(kind: CharsetKind) -> Self {
        let name = match kind {
            CharsetKind::Set96 => "Unknown (96)",
            CharsetKind::Set9494 => "Unknown (94x94)",
            CharsetKind::Set9696 => "Unknown (96x96)",
            _ => "Unknown (94)",
        };
        Self {
            name,
            kind,
            final_byte: 0,
            repr: Repr::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> CharsetKind {
        self.kind
    }

    /// Final byte of the ISO 2022 designation naming this charset, or 0.
    pub fn final_byte(&self) -> u8 {
        self.final_byte
    }

    /// `true` for the `Unknown*` placeholders.
    pub fn is_unknown(&self) -> bool {
        matches!(self.repr, Repr::Unknown)
    }

    pub(crate) fn encoding(&self) -> Option<&'static encoding_rs::Encoding> {
        match self.repr {
            Repr::Stream { encoding } => Some(encoding),
            _ => None,
        }
    }

    /// Forward mapping: wire code (unshifted, high bits cleared per the
    /// decoder's rules) to Unicode. `None` means the code has no mapping
    /// under this charset.
    pub fn recode(&self, code: u16) -> Option<char> {
        match &self.repr {
            Repr::Mapped { shift, forward, .. } => forward.get(&(code + shift)).copied(),
            Repr::Unknown => char::from_u32(u32::from(code)),
            Repr::Stream { .. } => None,
        }
    }

    /// Reverse mapping: Unicode to wire code, validated against the
    /// kind's byte ranges. `None` means the character is not
    /// representable in this charset.
    pub fn reverse(&self, ch: char) -> Option<u16> {
        let Repr::Mapped { shift, reverse, .. } = &self.repr else {
            return None;
        };
        let n = *reverse.get(&ch)?;
        if n < *shift {
            return None;
        }
        let n = n - shift;
        self.kind.contains_code(n).then_some(n)
    }

    /// Mapped (shifted code, Unicode) pairs in ascending code order.
    /// Empty for non-table charsets.
    pub(crate) fn forward_pairs(&self) -> Vec<(u16, char)> {
        match &self.repr {
            Repr::Mapped { forward, .. } => {
                let mut pairs: Vec<(u16, char)> = forward.iter().map(|(&k, &v)| (k, v)).collect();
                pairs.sort_unstable_by_key(|&(k, _)| k);
                pairs
            }
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Debug for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Charset")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("final_byte", &self.final_byte)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_charsets_recode_as_identity_and_never_reverse() {
        let u = Charset::unknown(CharsetKind::Set96);
        assert_eq!(u.recode(0x41), Some('A'));
        assert_eq!(u.reverse('A'), None);
        assert!(u.is_unknown());
    }

    #[test]
    fn reverse_validates_code_ranges() {
        let mut forward = HashMap::new();
        let mut reverse = HashMap::new();
        // 'X' deliberately lands on a control code after shift removal.
        forward.insert(0x10u16, 'X');
        reverse.insert('X', 0x10u16);
        forward.insert(0x41u16, 'Y');
        reverse.insert('Y', 0x41u16);
        let c = Charset::mapped("test", CharsetKind::Set94, b'?', 0, forward, reverse);
        assert_eq!(c.reverse('X'), None);
        assert_eq!(c.reverse('Y'), Some(0x41));
    }

    #[test]
    fn code_spaces_have_expected_sizes() {
        assert_eq!(CharsetKind::Set94.code_points().len(), 94);
        assert_eq!(CharsetKind::Set96.code_points().len(), 96);
        assert_eq!(CharsetKind::Set128.code_points().len(), 128);
        assert_eq!(CharsetKind::Set9494.code_points().len(), 94 * 94);
        assert_eq!(CharsetKind::Set9696.code_points().len(), 96 * 96);
        assert_eq!(CharsetKind::Set94x192.code_points().len(), 94 * 222);
        assert!(CharsetKind::Other.code_points().is_empty());
    }
}
