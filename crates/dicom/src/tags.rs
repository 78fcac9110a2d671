//! Tag dictionary for the attributes the survey extracts.

use std::fmt;

/// Two-character value representation code, e.g. `*b"CS"`.
pub type Vr = [u8; 2];

/// A DICOM attribute tag `(group,element)`.
///
/// Ordering follows the on-disk ordering of a dataset: group first, then element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub group: u16,
    pub element: u16,
}

impl Tag {
    pub const fn new(group: u16, element: u16) -> Self {
        Self { group, element }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.group, self.element)
    }
}

/// Dictionary entry for one extracted attribute.
#[derive(Debug, Clone, Copy)]
pub struct HeaderField {
    pub tag: Tag,
    pub keyword: &'static str,
    pub vr: Vr,
}

pub const TRANSFER_SYNTAX_UID: Tag = Tag::new(0x0002, 0x0010);
pub const SPECIFIC_CHARACTER_SET: Tag = Tag::new(0x0008, 0x0005);
pub const PIXEL_DATA: Tag = Tag::new(0x7FE0, 0x0010);

pub(crate) const ITEM: Tag = Tag::new(0xFFFE, 0xE000);
pub(crate) const ITEM_DELIMITATION: Tag = Tag::new(0xFFFE, 0xE00D);
pub(crate) const SEQUENCE_DELIMITATION: Tag = Tag::new(0xFFFE, 0xE0DD);

/// Attributes read from every representative file, sorted by tag.
pub const HEADER_FIELDS: &[HeaderField] = &[
    field(0x0008, 0x0005, "SpecificCharacterSet", b"CS"),
    field(0x0008, 0x0008, "ImageType", b"CS"),
    field(0x0008, 0x0060, "Modality", b"CS"),
    field(0x0008, 0x0070, "Manufacturer", b"LO"),
    field(0x0008, 0x103E, "SeriesDescription", b"LO"),
    field(0x0010, 0x0010, "PatientName", b"PN"),
    field(0x0010, 0x0020, "PatientID", b"LO"),
    field(0x0010, 0x0040, "PatientSex", b"CS"),
    field(0x0010, 0x1010, "PatientAge", b"AS"),
    field(0x0010, 0x1020, "PatientSize", b"DS"),
    field(0x0010, 0x1030, "PatientWeight", b"DS"),
    field(0x0018, 0x0024, "SequenceName", b"SH"),
    field(0x0018, 0x0050, "SliceThickness", b"DS"),
    field(0x0018, 0x0080, "RepetitionTime", b"DS"),
    field(0x0018, 0x0081, "EchoTime", b"DS"),
    field(0x0040, 0x0244, "PerformedProcedureStepStartDate", b"DA"),
    field(0x0040, 0x0245, "PerformedProcedureStepStartTime", b"TM"),
];

const fn field(group: u16, element: u16, keyword: &'static str, vr: &Vr) -> HeaderField {
    HeaderField {
        tag: Tag::new(group, element),
        keyword,
        vr: *vr,
    }
}

pub(crate) fn lookup(tag: Tag) -> Option<&'static HeaderField> {
    HEADER_FIELDS
        .binary_search_by(|f| f.tag.cmp(&tag))
        .ok()
        .map(|i| &HEADER_FIELDS[i])
}

/// Last tag of interest; anything after it can be left unread.
pub(crate) fn last_wanted() -> Tag {
    HEADER_FIELDS[HEADER_FIELDS.len() - 1].tag
}

/// VRs whose explicit encoding carries two reserved bytes and a 32-bit length.
pub(crate) fn has_long_length(vr: &Vr) -> bool {
    matches!(
        vr,
        b"OB" | b"OD" | b"OF" | b"OL" | b"OV" | b"OW" | b"SQ" | b"SV" | b"UC" | b"UN" | b"UR"
            | b"UT" | b"UV"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_fields_are_sorted_for_lookup() {
        let sorted = HEADER_FIELDS.windows(2).all(|w| w[0].tag < w[1].tag);
        assert!(sorted, "HEADER_FIELDS must stay sorted by tag");
    }

    #[test]
    fn test_lookup_finds_known_and_rejects_unknown() {
        let modality = lookup(Tag::new(0x0008, 0x0060)).expect("Modality should be known");
        assert_eq!(modality.keyword, "Modality");
        assert!(lookup(Tag::new(0x0009, 0x0010)).is_none());
    }

    #[test]
    fn test_tag_display_is_uppercase_hex() {
        assert_eq!(PIXEL_DATA.to_string(), "(7FE0,0010)");
    }
}
