//! # Purpose:
//! Transcoding engine between a locale-specific byte encoding and UTF-8.
//!
//! The engine sits between a legacy application speaking an ISO 2022
//! stateful encoding (or a standalone multibyte encoding such as UTF-8,
//! GBK, Big5-HKSCS, GB18030 or Shift_JIS) and a terminal that expects
//! UTF-8. It is purely computational: the caller owns the file
//! descriptors and feeds byte slices in, the engine hands byte vectors
//! back. Partial escape sequences and partial multibyte characters
//! survive inside the state between calls, so a stream may be cut at any
//! byte boundary.
//!
//! ## Examples:
//! ```
//! use ptyglot_charset::{locale, Iso2022};
//!
//! // Latin-1 child output becomes UTF-8:
//! let state = locale::locale_state("ISO8859-1").unwrap();
//! let mut output = Iso2022::from_locale(&state);
//! let mut bytes = Vec::new();
//! output.copy_out(b"\xA9 2024", &mut bytes);
//! assert_eq!(bytes, "\u{A9} 2024".as_bytes());
//!
//! // ... and UTF-8 user input becomes Latin-1:
//! let mut input = Iso2022::new();
//! input.merge_from(&output);
//! let mut bytes = Vec::new();
//! input.copy_in("\u{A9} 2024".as_bytes(), &mut bytes);
//! assert_eq!(bytes, b"\xA9 2024");
//! ```

pub mod charset;
mod decode;
mod encode;
pub mod locale;
pub mod registry;
pub mod report;
pub mod state;

pub use charset::Charset;
pub use charset::CharsetKind;
pub use locale::LocaleState;
pub use state::InputFlags;
pub use state::Iso2022;
pub use state::OutputFlags;
