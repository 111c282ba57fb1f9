use crate::charset::{Charset, CharsetKind};
use crate::locale::LocaleState;
use crate::registry;
use crate::{decode, encode};
use std::fmt::Write as _;
use std::sync::Arc;

/// Flags governing the child-output (decoder) direction.
#[derive(Debug, Clone, Copy)]
pub struct OutputFlags {
    /// Honor SS2/SS3 single shifts seen in the stream.
    pub single_shifts: bool,
    /// Honor SI/SO and the ESC-based locking shifts.
    pub locking_shifts: bool,
    /// Honor charset designation sequences.
    pub designations: bool,
    /// Interpret the stream at all. When cleared every byte passes
    /// through untouched.
    pub interpret: bool,
}

impl Default for OutputFlags {
    fn default() -> Self {
        Self {
            single_shifts: true,
            locking_shifts: true,
            designations: true,
            interpret: true,
        }
    }
}

/// Flags governing the user-input (encoder) direction.
#[derive(Debug, Clone, Copy)]
pub struct InputFlags {
    /// Allowed to emit bytes with the high bit set.
    pub eight_bit: bool,
    /// Allowed to emit SS2/SS3 to reach G2/G3.
    pub single_shifts: bool,
    /// Present single-shifted bytes through GR (high bit set) rather
    /// than GL. Only effective in 8-bit mode.
    pub ss_gr: bool,
    /// Allowed to emit SI/SO locking shifts to move G0/G1 into GL.
    pub locking_shifts: bool,
}

impl Default for InputFlags {
    fn default() -> Self {
        Self {
            eight_bit: true,
            single_shifts: true,
            ss_gr: true,
            locking_shifts: false,
        }
    }
}

/// Decoder position between bytes. `Ground` is both the initial and the
/// steady state; everything else is a partially consumed construct that
/// survives across [Iso2022::copy_out] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Parser {
    Ground,
    /// After ESC.
    Escape,
    /// After ESC $.
    EscapeDollar,
    /// Waiting for the final byte of a designation.
    Designate { slot: usize, kind: CharsetKind },
    /// First byte of a two-byte character accepted (already stripped to
    /// its 7-bit value where the kind calls for it).
    Multibyte { bank: usize, first: u8 },
}

/// Per-direction state of a stream in a non-ISO-2022 encoding. Created
/// fresh for each direction so the shared charset stays immutable.
pub(crate) struct OtherCodec {
    pub(crate) charset: Arc<Charset>,
    pub(crate) decoder: encoding_rs::Decoder,
    pub(crate) encoder: encoding_rs::Encoder,
}

impl OtherCodec {
    fn new(charset: Arc<Charset>) -> Option<Self> {
        let encoding = charset.encoding()?;
        Some(Self {
            charset,
            decoder: encoding.new_decoder_without_bom_handling(),
            encoder: encoding.new_encoder(),
        })
    }
}

/// Mutable transcoder state for one direction of the byte stream.
///
/// Holds the four charset banks, the GL/GR pointers, the armed single
/// shift, the escape parser position and, for the input direction, the
/// tail of a UTF-8 character cut by a read boundary. Two instances exist
/// per translator, one per direction; they share nothing but the cached
/// charset objects.
pub struct Iso2022 {
    g: [Arc<Charset>; 4],
    gl: usize,
    gr: usize,
    pub(crate) single_shift: Option<usize>,
    pub(crate) parser: Parser,
    /// Bytes of the escape sequence being parsed, kept for byte-for-byte
    /// passthrough of unrecognized sequences.
    pub(crate) esc: Vec<u8>,
    pub(crate) utf8_pending: [u8; 4],
    pub(crate) utf8_pending_len: usize,
    pub(crate) other: Option<OtherCodec>,
    pub output: OutputFlags,
    pub input: InputFlags,
}

impl Iso2022 {
    /// Fresh state with sentinel banks; use [Self::from_locale] or
    /// [Self::merge_from] to make it useful.
    pub fn new() -> Self {
        Self {
            g: [
                registry::get_unknown(CharsetKind::Set94),
                registry::get_unknown(CharsetKind::Set96),
                registry::get_unknown(CharsetKind::Set96),
                registry::get_unknown(CharsetKind::Set96),
            ],
            gl: 0,
            gr: 2,
            single_shift: None,
            parser: Parser::Ground,
            esc: Vec::new(),
            utf8_pending: [0; 4],
            utf8_pending_len: 0,
            other: None,
            output: OutputFlags::default(),
            input: InputFlags::default(),
        }
    }

    /// State initialized from a locale resolution.
    pub fn from_locale(locale: &LocaleState) -> Self {
        let mut state = Self::new();
        state.g = locale.g.clone();
        state.gl = locale.gl;
        state.gr = locale.gr;
        state.other = locale
            .other
            .as_ref()
            .and_then(|c| OtherCodec::new(c.clone()));
        state
    }

    /// Copy the other direction's bank configuration into this state, so
    /// both directions speak the same encoding by default. Flags and
    /// parser state stay untouched; direction-specific overrides are
    /// applied by the caller afterwards.
    pub fn merge_from(&mut self, from: &Iso2022) {
        self.g = from.g.clone();
        self.gl = from.gl;
        self.gr = from.gr;
        self.other = from
            .other
            .as_ref()
            .and_then(|oc| OtherCodec::new(oc.charset.clone()));
    }

    pub fn bank(&self, slot: usize) -> &Arc<Charset> {
        &self.g[slot]
    }

    pub fn set_bank(&mut self, slot: usize, charset: Arc<Charset>) {
        self.g[slot] = charset;
    }

    /// Bank index currently shifted into the left half.
    pub fn gl(&self) -> usize {
        self.gl
    }

    /// Bank index currently shifted into the right half.
    pub fn gr(&self) -> usize {
        self.gr
    }

    pub fn set_gl(&mut self, slot: usize) {
        self.gl = slot;
    }

    pub fn set_gr(&mut self, slot: usize) {
        self.gr = slot;
    }

    /// Whether this state bypasses the banks with a non-ISO-2022 codec.
    pub fn is_other(&self) -> bool {
        self.other.is_some()
    }

    /// Decode child output under this state and append it to `out` as
    /// UTF-8. Consumes all of `input`; partial constructs are buffered
    /// in the state for the next call.
    pub fn copy_out(&mut self, input: &[u8], out: &mut Vec<u8>) {
        decode::copy_out(self, input, out)
    }

    /// Encode UTF-8 user input under this state and append the encoded
    /// bytes to `out`. Consumes all of `input`; a trailing partial UTF-8
    /// character is buffered for the next call.
    pub fn copy_in(&mut self, input: &[u8], out: &mut Vec<u8>) {
        encode::copy_in(self, input, out)
    }

    /// One-line description of the configuration, for diagnostics.
    pub fn describe(&self, direction: &str) -> String {
        if let Some(oc) = &self.other {
            return format!("{direction}: non-ISO-2022 encoding {}", oc.charset.name());
        }
        let mut s = format!("{direction}: GL -> G{}, GR -> G{}", self.gl, self.gr);
        for (i, g) in self.g.iter().enumerate() {
            let _ = write!(s, ", G{i}: {}", g.name());
        }
        s
    }
}

impl Default for Iso2022 {
    fn default() -> Self {
        Self::new()
    }
}
