//! Part 10 element stream reader.
//!
//! The reader walks the element stream with `Read + Seek`, seeking over every
//! value it does not need. Sequences and items of undefined length are skipped
//! structurally, never decoded.

use crate::charset;
use crate::tags::{
    self, has_long_length, lookup, Tag, Vr, ITEM, ITEM_DELIMITATION, PIXEL_DATA,
    SEQUENCE_DELIMITATION, SPECIFIC_CHARACTER_SET, TRANSFER_SYNTAX_UID,
};
use crate::{HeaderError, HeaderResult};
use encoding_rs::Encoding;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

const PREAMBLE_LEN: u64 = 128;
const MAGIC: &[u8; 4] = b"DICM";
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Largest value the decoder will buffer for a wanted attribute.
const MAX_VALUE_LEN: u32 = 64 * 1024;

/// Dataset encodings the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSyntax {
    ImplicitVrLittleEndian,
    ExplicitVrLittleEndian,
    ExplicitVrBigEndian,
}

impl TransferSyntax {
    /// Maps a transfer syntax UID to its dataset encoding.
    ///
    /// Encapsulated (compressed) syntaxes keep an explicit little endian dataset,
    /// so any UID not listed here decodes as explicit VR little endian. Deflated
    /// datasets are rejected.
    pub fn from_uid(uid: &str) -> HeaderResult<Self> {
        match uid {
            "1.2.840.10008.1.2" => Ok(Self::ImplicitVrLittleEndian),
            "1.2.840.10008.1.2.2" => Ok(Self::ExplicitVrBigEndian),
            "1.2.840.10008.1.2.1.99" => {
                Err(HeaderError::UnsupportedTransferSyntax(uid.to_string()))
            }
            _ => Ok(Self::ExplicitVrLittleEndian),
        }
    }

    fn is_explicit(self) -> bool {
        !matches!(self, Self::ImplicitVrLittleEndian)
    }

    fn is_big_endian(self) -> bool {
        matches!(self, Self::ExplicitVrBigEndian)
    }
}

/// Header attributes decoded from one file, keyed by DICOM keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DicomHeader {
    pub transfer_syntax: String,
    pub elements: BTreeMap<String, String>,
}

impl DicomHeader {
    /// Returns the decoded value for a keyword such as `"PatientSex"`.
    pub fn get(&self, keyword: &str) -> Option<&str> {
        self.elements.get(keyword).map(String::as_str)
    }
}

/// Opens `path` and decodes its header.
///
/// The file handle lives only for the duration of this call.
pub fn read_header(path: &Path) -> HeaderResult<DicomHeader> {
    let file = File::open(path)?;
    read_header_from(BufReader::new(file))
}

/// Decodes a header from any seekable byte source positioned at the preamble.
pub fn read_header_from<R: Read + Seek>(source: R) -> HeaderResult<DicomHeader> {
    let mut reader = ElementReader::new(source);
    reader.expect_magic()?;

    let uid = reader.read_meta_group()?;
    let syntax = TransferSyntax::from_uid(&uid)?;
    reader.syntax = syntax;

    let elements = reader.read_dataset()?;
    Ok(DicomHeader {
        transfer_syntax: uid,
        elements,
    })
}

#[derive(Debug)]
struct ElementHeader {
    tag: Tag,
    vr: Option<Vr>,
    length: u32,
}

struct ElementReader<R> {
    inner: R,
    syntax: TransferSyntax,
    /// Total stream length, used to detect skips past the end.
    len: u64,
    charset: Option<&'static Encoding>,
}

impl<R: Read + Seek> ElementReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            // the file meta group is always explicit VR little endian
            syntax: TransferSyntax::ExplicitVrLittleEndian,
            len: 0,
            charset: None,
        }
    }

    fn expect_magic(&mut self) -> HeaderResult<()> {
        self.len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(PREAMBLE_LEN))?;
        let mut magic = [0u8; 4];
        match self.inner.read_exact(&mut magic) {
            Ok(()) if &magic == MAGIC => Ok(()),
            Ok(()) => Err(HeaderError::NotDicom),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(HeaderError::NotDicom),
            Err(e) => Err(HeaderError::Io(e)),
        }
    }

    /// Reads group 0002 and returns the transfer syntax UID.
    fn read_meta_group(&mut self) -> HeaderResult<String> {
        let mut uid = None;
        loop {
            let start = self.inner.stream_position()?;
            let Some(header) = self.next_header()? else {
                break;
            };
            if header.tag.group != 0x0002 {
                self.inner.seek(SeekFrom::Start(start))?;
                break;
            }
            if header.length == UNDEFINED_LENGTH {
                return Err(HeaderError::Malformed(format!(
                    "undefined length in file meta element {}",
                    header.tag
                )));
            }
            if header.tag == TRANSFER_SYNTAX_UID {
                let bytes = self.read_value(&header)?;
                uid = Some(decode_text(&bytes, None));
            } else {
                self.skip(&header)?;
            }
        }

        uid.filter(|u| !u.is_empty())
            .ok_or_else(|| HeaderError::Malformed("missing transfer syntax UID".into()))
    }

    fn read_dataset(&mut self) -> HeaderResult<BTreeMap<String, String>> {
        let last = tags::last_wanted();
        let mut elements = BTreeMap::new();

        while let Some(header) = self.next_header()? {
            if header.tag == PIXEL_DATA || header.tag > last {
                break;
            }
            if header.length == UNDEFINED_LENGTH {
                self.skip_undefined(&header)?;
                continue;
            }

            match lookup(header.tag) {
                Some(field) => {
                    let bytes = self.read_value(&header)?;
                    let vr = header.vr.unwrap_or(field.vr);
                    let value = self.decode(&vr, &bytes);
                    // sorts first, so every later text value sees it
                    if header.tag == SPECIFIC_CHARACTER_SET {
                        self.charset = charset::encoding_for(&value);
                    }
                    elements.insert(field.keyword.to_string(), value);
                }
                None => self.skip(&header)?,
            }
        }

        Ok(elements)
    }

    /// Reads the next element header, or `None` at a clean end of stream.
    fn next_header(&mut self) -> HeaderResult<Option<ElementHeader>> {
        let mut raw = [0u8; 4];
        let filled = read_up_to(&mut self.inner, &mut raw)?;
        if filled == 0 {
            return Ok(None);
        }
        if filled < raw.len() {
            return Err(HeaderError::Truncated("incomplete element tag".into()));
        }

        let tag = Tag::new(self.u16_from(&raw[0..2]), self.u16_from(&raw[2..4]));

        // item and delimiter tags never carry a VR
        if tag.group == 0xFFFE || !self.syntax.is_explicit() {
            let length = self.read_u32()?;
            return Ok(Some(ElementHeader {
                tag,
                vr: None,
                length,
            }));
        }

        let mut vr = [0u8; 2];
        self.fill(&mut vr, tag)?;
        let length = if has_long_length(&vr) {
            let mut reserved = [0u8; 2];
            self.fill(&mut reserved, tag)?;
            self.read_u32()?
        } else {
            u32::from(self.read_u16()?)
        };

        Ok(Some(ElementHeader {
            tag,
            vr: Some(vr),
            length,
        }))
    }

    /// Skips an element of undefined length.
    ///
    /// An explicit `UN` element of undefined length holds implicit VR little endian
    /// content regardless of the dataset's transfer syntax.
    fn skip_undefined(&mut self, header: &ElementHeader) -> HeaderResult<()> {
        if header.vr.as_ref() != Some(b"UN") {
            return self.skip_sequence();
        }
        let outer = std::mem::replace(&mut self.syntax, TransferSyntax::ImplicitVrLittleEndian);
        let skipped = self.skip_sequence();
        self.syntax = outer;
        skipped
    }

    /// Skips a sequence of undefined length, up to and including its delimiter.
    fn skip_sequence(&mut self) -> HeaderResult<()> {
        loop {
            let header = self
                .next_header()?
                .ok_or_else(|| HeaderError::Truncated("unterminated sequence".into()))?;
            match header.tag {
                SEQUENCE_DELIMITATION => return Ok(()),
                ITEM if header.length == UNDEFINED_LENGTH => self.skip_item()?,
                ITEM => self.skip(&header)?,
                other => {
                    return Err(HeaderError::Malformed(format!(
                        "unexpected element {other} inside sequence"
                    )))
                }
            }
        }
    }

    /// Skips the body of an item of undefined length.
    fn skip_item(&mut self) -> HeaderResult<()> {
        loop {
            let header = self
                .next_header()?
                .ok_or_else(|| HeaderError::Truncated("unterminated item".into()))?;
            if header.tag == ITEM_DELIMITATION {
                return Ok(());
            }
            if header.length == UNDEFINED_LENGTH {
                self.skip_undefined(&header)?;
            } else {
                self.skip(&header)?;
            }
        }
    }

    fn read_value(&mut self, header: &ElementHeader) -> HeaderResult<Vec<u8>> {
        if header.length > MAX_VALUE_LEN {
            return Err(HeaderError::Malformed(format!(
                "value of {} is {} bytes long",
                header.tag, header.length
            )));
        }
        let mut bytes = vec![0u8; header.length as usize];
        self.fill(&mut bytes, header.tag)?;
        Ok(bytes)
    }

    /// Seeks over the value of `header`; a value running past the end of the
    /// stream is a truncation, even though the seek itself succeeds.
    fn skip(&mut self, header: &ElementHeader) -> HeaderResult<()> {
        let end = self.inner.seek(SeekFrom::Current(i64::from(header.length)))?;
        if end > self.len {
            return Err(HeaderError::Truncated(format!(
                "value of {} ends past the end of the file",
                header.tag
            )));
        }
        Ok(())
    }

    fn fill(&mut self, buf: &mut [u8], tag: Tag) -> HeaderResult<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => HeaderError::Truncated(format!("element {tag}")),
            _ => HeaderError::Io(e),
        })
    }

    fn read_u16(&mut self) -> HeaderResult<u16> {
        let mut raw = [0u8; 2];
        self.inner.read_exact(&mut raw).map_err(truncated_length)?;
        Ok(self.u16_from(&raw))
    }

    fn read_u32(&mut self) -> HeaderResult<u32> {
        let mut raw = [0u8; 4];
        self.inner.read_exact(&mut raw).map_err(truncated_length)?;
        Ok(if self.syntax.is_big_endian() {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        })
    }

    fn u16_from(&self, raw: &[u8]) -> u16 {
        let pair = [raw[0], raw[1]];
        if self.syntax.is_big_endian() {
            u16::from_be_bytes(pair)
        } else {
            u16::from_le_bytes(pair)
        }
    }

    fn decode(&self, vr: &Vr, bytes: &[u8]) -> String {
        let big = self.syntax.is_big_endian();
        match vr {
            b"US" => join_numbers(bytes, 2, |c| {
                let pair = [c[0], c[1]];
                (if big { u16::from_be_bytes(pair) } else { u16::from_le_bytes(pair) }).to_string()
            }),
            b"SS" => join_numbers(bytes, 2, |c| {
                let pair = [c[0], c[1]];
                (if big { i16::from_be_bytes(pair) } else { i16::from_le_bytes(pair) }).to_string()
            }),
            b"UL" => join_numbers(bytes, 4, |c| {
                let quad = [c[0], c[1], c[2], c[3]];
                (if big { u32::from_be_bytes(quad) } else { u32::from_le_bytes(quad) }).to_string()
            }),
            b"SL" => join_numbers(bytes, 4, |c| {
                let quad = [c[0], c[1], c[2], c[3]];
                (if big { i32::from_be_bytes(quad) } else { i32::from_le_bytes(quad) }).to_string()
            }),
            b"FL" => join_numbers(bytes, 4, |c| {
                let quad = [c[0], c[1], c[2], c[3]];
                (if big { f32::from_be_bytes(quad) } else { f32::from_le_bytes(quad) }).to_string()
            }),
            b"FD" => join_numbers(bytes, 8, |c| {
                let mut oct = [0u8; 8];
                oct.copy_from_slice(c);
                (if big { f64::from_be_bytes(oct) } else { f64::from_le_bytes(oct) }).to_string()
            }),
            _ if charset::is_affected(vr) => decode_text(bytes, self.charset),
            _ => decode_text(bytes, None),
        }
    }
}

fn join_numbers(bytes: &[u8], width: usize, render: impl Fn(&[u8]) -> String) -> String {
    bytes
        .chunks_exact(width)
        .map(render)
        .collect::<Vec<_>>()
        .join("\\")
}

/// Decodes a text value with `encoding`, or as UTF-8 for the default repertoire.
fn decode_text(bytes: &[u8], encoding: Option<&'static Encoding>) -> String {
    let text = match encoding {
        Some(encoding) => encoding.decode_without_bom_handling(bytes).0,
        None => String::from_utf8_lossy(bytes),
    };
    text.trim_matches(|c| c == ' ' || c == '\0').to_string()
}

fn truncated_length(e: std::io::Error) -> HeaderError {
    match e.kind() {
        ErrorKind::UnexpectedEof => HeaderError::Truncated("incomplete element length".into()),
        _ => HeaderError::Io(e),
    }
}

/// Like `read_exact`, but reports how many bytes were available instead of failing at EOF.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> HeaderResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(HeaderError::Io(e)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::DicomFileBuilder;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn decode(bytes: Vec<u8>) -> HeaderResult<DicomHeader> {
        read_header_from(Cursor::new(bytes))
    }

    #[test]
    fn test_reads_explicit_little_endian_text_fields() {
        let bytes = DicomFileBuilder::explicit_little()
            .text(0x0008, 0x0060, b"CS", "MR")
            .text(0x0010, 0x0010, b"PN", "Doe^Jane")
            .text(0x0010, 0x0040, b"CS", "F")
            .text(0x0018, 0x0081, b"DS", "2.46")
            .build();

        let header = decode(bytes).expect("header should decode");

        assert_eq!(header.transfer_syntax, "1.2.840.10008.1.2.1");
        assert_eq!(header.get("Modality"), Some("MR"));
        assert_eq!(header.get("PatientName"), Some("Doe^Jane"));
        assert_eq!(header.get("PatientSex"), Some("F"));
        assert_eq!(header.get("EchoTime"), Some("2.46"));
        assert_eq!(header.get("Manufacturer"), None);
    }

    #[test]
    fn test_reads_implicit_little_endian_using_dictionary_vr() {
        let bytes = DicomFileBuilder::implicit_little()
            .text(0x0008, 0x0070, b"LO", "SIEMENS")
            .text(0x0010, 0x1010, b"AS", "034Y")
            .build();

        let header = decode(bytes).expect("implicit VR header should decode");

        assert_eq!(header.get("Manufacturer"), Some("SIEMENS"));
        assert_eq!(header.get("PatientAge"), Some("034Y"));
    }

    #[test]
    fn test_reads_explicit_big_endian_binary_values() {
        let bytes = DicomFileBuilder::explicit_big()
            .text(0x0008, 0x0060, b"CS", "CT")
            .us(0x0010, 0x1020, 180)
            .build();

        let header = decode(bytes).expect("big endian header should decode");

        assert_eq!(header.get("Modality"), Some("CT"));
        assert_eq!(header.get("PatientSize"), Some("180"));
    }

    #[test]
    fn test_multi_valued_text_keeps_backslash_separator() {
        let bytes = DicomFileBuilder::explicit_little()
            .text(0x0008, 0x0008, b"CS", "ORIGINAL\\PRIMARY\\M")
            .build();

        let header = decode(bytes).unwrap();
        assert_eq!(header.get("ImageType"), Some("ORIGINAL\\PRIMARY\\M"));
    }

    #[test]
    fn test_skips_undefined_length_sequences_and_private_elements() {
        let bytes = DicomFileBuilder::explicit_little()
            .text(0x0008, 0x0060, b"CS", "MR")
            .undefined_sequence(0x0008, 0x1140, 0x0008, 0x1150, "1.2.3")
            .text(0x0009, 0x0010, b"LO", "PRIVATE CREATOR")
            .text(0x0010, 0x0040, b"CS", "M")
            .build();

        let header = decode(bytes).expect("sequence should be skipped");

        assert_eq!(header.get("Modality"), Some("MR"));
        assert_eq!(header.get("PatientSex"), Some("M"));
        assert_eq!(header.elements.len(), 2);
    }

    #[test]
    fn test_stops_at_pixel_data() {
        let bytes = DicomFileBuilder::explicit_little()
            .text(0x0010, 0x0040, b"CS", "F")
            .pixel_data(&[0u8; 512])
            .build();

        let header = decode(bytes).expect("pixel data should end decoding");
        assert_eq!(header.get("PatientSex"), Some("F"));
    }

    #[test]
    fn test_rejects_missing_magic() {
        let mut bytes = DicomFileBuilder::explicit_little().build();
        bytes[128..132].copy_from_slice(b"NOPE");

        let err = decode(bytes).expect_err("missing DICM should fail");
        assert!(matches!(err, HeaderError::NotDicom));
    }

    #[test]
    fn test_rejects_short_file_as_not_dicom() {
        let err = decode(b"plain text".to_vec()).expect_err("short file should fail");
        assert!(matches!(err, HeaderError::NotDicom));
    }

    #[test]
    fn test_rejects_deflated_transfer_syntax() {
        let bytes = DicomFileBuilder::with_transfer_syntax("1.2.840.10008.1.2.1.99").build();

        let err = decode(bytes).expect_err("deflated syntax should fail");
        assert!(matches!(err, HeaderError::UnsupportedTransferSyntax(uid) if uid.ends_with(".99")));
    }

    #[test]
    fn test_truncated_value_is_reported() {
        let mut bytes = DicomFileBuilder::explicit_little()
            .text(0x0010, 0x0010, b"PN", "Doe^Jane")
            .build();
        bytes.truncate(bytes.len() - 3);

        let err = decode(bytes).expect_err("truncated value should fail");
        assert!(matches!(err, HeaderError::Truncated(_)));
    }

    #[test]
    fn test_decodes_text_with_declared_latin1_character_set() {
        let bytes = DicomFileBuilder::explicit_little()
            .text(0x0008, 0x0005, b"CS", "ISO_IR 100")
            .raw_text(0x0008, 0x103E, b"LO", b"T1 K\xF6rper")
            .raw_text(0x0010, 0x0010, b"PN", b"M\xFCller^Jo")
            .build();

        let header = decode(bytes).expect("latin-1 header should decode");

        assert_eq!(header.get("SpecificCharacterSet"), Some("ISO_IR 100"));
        assert_eq!(header.get("PatientName"), Some("Müller^Jo"));
        assert_eq!(header.get("SeriesDescription"), Some("T1 Körper"));
    }

    #[test]
    fn test_text_without_character_set_stays_utf8() {
        let bytes = DicomFileBuilder::explicit_little()
            .text(0x0010, 0x0010, b"PN", "Müller^Jo")
            .build();

        let header = decode(bytes).unwrap();
        assert_eq!(header.get("PatientName"), Some("Müller^Jo"));
    }

    #[test]
    fn test_skips_undefined_length_un_element_as_implicit_content() {
        let bytes = DicomFileBuilder::explicit_little()
            .text(0x0008, 0x0060, b"CS", "MR")
            .undefined_unknown(0x0008, 0x1140, 0x0008, 0x1150, "1.2.840.10008.5.1.4.1.1.4")
            .text(0x0010, 0x0040, b"CS", "F")
            .build();

        let header = decode(bytes).expect("UN content should be skipped");

        assert_eq!(header.get("Modality"), Some("MR"));
        assert_eq!(header.get("PatientSex"), Some("F"));
    }

    #[test]
    fn test_skipped_value_running_past_end_is_truncated() {
        let mut bytes = DicomFileBuilder::explicit_little()
            .text(0x0008, 0x0060, b"CS", "MR")
            .text(0x0009, 0x0010, b"LO", "PRIVATE CREATOR")
            .build();
        bytes.truncate(bytes.len() - 3);

        let err = decode(bytes).expect_err("short private value should fail");
        assert!(matches!(err, HeaderError::Truncated(_)));
    }

    #[test]
    fn test_read_header_opens_file_from_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("IM0001.DCM");
        DicomFileBuilder::explicit_little()
            .text(0x0008, 0x0060, b"CS", "MR")
            .write_to(&path)
            .expect("fixture should be written");

        let header = read_header(&path).expect("file should decode");
        assert_eq!(header.get("Modality"), Some("MR"));
    }
}
