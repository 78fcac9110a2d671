//! Specific Character Set (0008,0005) handling.
//!
//! Only text VRs that the standard allows to leave the default repertoire are
//! decoded through the declared character set. ISO 2022 escape sequences are not
//! interpreted; a code-extension term selects the same single-byte or multi-byte
//! set as its non-extended form.

use crate::tags::Vr;
use encoding_rs::Encoding;

/// VRs whose values may use the declared character set.
pub(crate) fn is_affected(vr: &Vr) -> bool {
    matches!(vr, b"SH" | b"LO" | b"ST" | b"PN" | b"LT" | b"UC" | b"UT")
}

/// Encoding for a Specific Character Set value, or `None` for the default repertoire.
///
/// Multi-valued terms (`ISO 2022 IR 6\ISO 2022 IR 100`) resolve to the first value that
/// names a non-default set.
pub(crate) fn encoding_for(value: &str) -> Option<&'static Encoding> {
    value.split('\\').map(str::trim).find_map(encoding_for_term)
}

fn encoding_for_term(term: &str) -> Option<&'static Encoding> {
    let encoding = match term {
        // latin-1 decodes identically under windows-1252 for printable text
        "ISO_IR 100" | "ISO 2022 IR 100" => encoding_rs::WINDOWS_1252,
        "ISO_IR 101" | "ISO 2022 IR 101" => encoding_rs::ISO_8859_2,
        "ISO_IR 109" | "ISO 2022 IR 109" => encoding_rs::ISO_8859_3,
        "ISO_IR 110" | "ISO 2022 IR 110" => encoding_rs::ISO_8859_4,
        "ISO_IR 144" | "ISO 2022 IR 144" => encoding_rs::ISO_8859_5,
        "ISO_IR 127" | "ISO 2022 IR 127" => encoding_rs::ISO_8859_6,
        "ISO_IR 126" | "ISO 2022 IR 126" => encoding_rs::ISO_8859_7,
        "ISO_IR 138" | "ISO 2022 IR 138" => encoding_rs::ISO_8859_8,
        "ISO_IR 148" | "ISO 2022 IR 148" => encoding_rs::WINDOWS_1254,
        "ISO_IR 203" | "ISO 2022 IR 203" => encoding_rs::ISO_8859_15,
        "ISO_IR 166" | "ISO 2022 IR 166" => encoding_rs::WINDOWS_874,
        "ISO_IR 13" | "ISO 2022 IR 13" => encoding_rs::SHIFT_JIS,
        "ISO_IR 192" => encoding_rs::UTF_8,
        "GB18030" => encoding_rs::GB18030,
        "GBK" => encoding_rs::GBK,
        _ => return None,
    };
    Some(encoding)
}
