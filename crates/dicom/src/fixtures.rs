//! Synthetic Part 10 files for tests.
//!
//! Elements are written in the order they are added; callers add them in
//! ascending tag order, as a real dataset would be.

use crate::tags::{has_long_length, Vr};
use std::io;
use std::path::Path;

const EXPLICIT_LITTLE: &str = "1.2.840.10008.1.2.1";
const IMPLICIT_LITTLE: &str = "1.2.840.10008.1.2";
const EXPLICIT_BIG: &str = "1.2.840.10008.1.2.2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    ImplicitLittle,
    ExplicitLittle,
    ExplicitBig,
}

/// Builder for minimal DICOM files.
#[derive(Debug, Clone)]
pub struct DicomFileBuilder {
    transfer_syntax: String,
    encoding: Encoding,
    dataset: Vec<u8>,
}

impl DicomFileBuilder {
    pub fn explicit_little() -> Self {
        Self::with_transfer_syntax(EXPLICIT_LITTLE)
    }

    pub fn implicit_little() -> Self {
        Self::with_transfer_syntax(IMPLICIT_LITTLE)
    }

    pub fn explicit_big() -> Self {
        Self::with_transfer_syntax(EXPLICIT_BIG)
    }

    /// Any other UID encodes the dataset as explicit VR little endian.
    pub fn with_transfer_syntax(uid: &str) -> Self {
        let encoding = match uid {
            IMPLICIT_LITTLE => Encoding::ImplicitLittle,
            EXPLICIT_BIG => Encoding::ExplicitBig,
            _ => Encoding::ExplicitLittle,
        };
        Self {
            transfer_syntax: uid.to_string(),
            encoding,
            dataset: Vec::new(),
        }
    }

    /// Adds a text element, space padded to even length.
    pub fn text(self, group: u16, element: u16, vr: &Vr, value: &str) -> Self {
        self.raw_text(group, element, vr, value.as_bytes())
    }

    /// Adds a text element from already encoded bytes, space padded to even length.
    pub fn raw_text(mut self, group: u16, element: u16, vr: &Vr, value: &[u8]) -> Self {
        let mut bytes = value.to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(b' ');
        }
        self.push_element(group, element, vr, &bytes);
        self
    }

    /// Adds a single unsigned short value.
    pub fn us(mut self, group: u16, element: u16, value: u16) -> Self {
        let bytes = match self.encoding {
            Encoding::ExplicitBig => value.to_be_bytes(),
            _ => value.to_le_bytes(),
        };
        self.push_element(group, element, b"US", &bytes);
        self
    }

    /// Adds an undefined-length sequence holding one undefined-length item with one
    /// text element.
    pub fn undefined_sequence(
        mut self,
        group: u16,
        element: u16,
        item_group: u16,
        item_element: u16,
        item_value: &str,
    ) -> Self {
        self.push_header(group, element, b"SQ", u32::MAX);
        self.push_delimiter(0xE000, u32::MAX);

        let mut value = item_value.as_bytes().to_vec();
        if value.len() % 2 == 1 {
            value.push(0);
        }
        self.push_element(item_group, item_element, b"UI", &value);

        self.push_delimiter(0xE00D, 0);
        self.push_delimiter(0xE0DD, 0);
        self
    }

    /// Adds an explicit `UN` element of undefined length whose content, one
    /// undefined-length item with one `UI` element, is implicit VR little endian.
    pub fn undefined_unknown(
        mut self,
        group: u16,
        element: u16,
        item_group: u16,
        item_element: u16,
        item_value: &str,
    ) -> Self {
        self.push_header(group, element, b"UN", u32::MAX);

        let mut value = item_value.as_bytes().to_vec();
        if value.len() % 2 == 1 {
            value.push(0);
        }
        implicit_le(&mut self.dataset, 0xFFFE, 0xE000, u32::MAX);
        implicit_le(&mut self.dataset, item_group, item_element, value.len() as u32);
        self.dataset.extend_from_slice(&value);
        implicit_le(&mut self.dataset, 0xFFFE, 0xE00D, 0);
        implicit_le(&mut self.dataset, 0xFFFE, 0xE0DD, 0);
        self
    }

    /// Adds native Pixel Data `(7FE0,0010)`.
    pub fn pixel_data(mut self, bytes: &[u8]) -> Self {
        self.push_element(0x7FE0, 0x0010, b"OW", bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; 128];
        out.extend_from_slice(b"DICM");

        let mut uid = self.transfer_syntax.as_bytes().to_vec();
        if uid.len() % 2 == 1 {
            uid.push(0);
        }

        let mut meta = Vec::new();
        explicit_le(&mut meta, 0x0002, 0x0001, b"OB", &[0x00, 0x01]);
        explicit_le(&mut meta, 0x0002, 0x0010, b"UI", &uid);

        let group_length = (meta.len() as u32).to_le_bytes();
        explicit_le(&mut out, 0x0002, 0x0000, b"UL", &group_length);
        out.extend_from_slice(&meta);
        out.extend_from_slice(&self.dataset);
        out
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.build())
    }

    fn push_element(&mut self, group: u16, element: u16, vr: &Vr, value: &[u8]) {
        self.push_header(group, element, vr, value.len() as u32);
        self.dataset.extend_from_slice(value);
    }

    fn push_header(&mut self, group: u16, element: u16, vr: &Vr, length: u32) {
        let big = self.encoding == Encoding::ExplicitBig;
        let u16_bytes = |v: u16| if big { v.to_be_bytes() } else { v.to_le_bytes() };
        let u32_bytes = |v: u32| if big { v.to_be_bytes() } else { v.to_le_bytes() };

        self.dataset.extend_from_slice(&u16_bytes(group));
        self.dataset.extend_from_slice(&u16_bytes(element));

        if self.encoding == Encoding::ImplicitLittle {
            self.dataset.extend_from_slice(&u32_bytes(length));
            return;
        }

        self.dataset.extend_from_slice(vr);
        if has_long_length(vr) {
            self.dataset.extend_from_slice(&[0, 0]);
            self.dataset.extend_from_slice(&u32_bytes(length));
        } else {
            self.dataset.extend_from_slice(&u16_bytes(length as u16));
        }
    }

    fn push_delimiter(&mut self, element: u16, length: u32) {
        let big = self.encoding == Encoding::ExplicitBig;
        let (group, element, length) = if big {
            (
                0xFFFEu16.to_be_bytes(),
                element.to_be_bytes(),
                length.to_be_bytes(),
            )
        } else {
            (
                0xFFFEu16.to_le_bytes(),
                element.to_le_bytes(),
                length.to_le_bytes(),
            )
        };
        self.dataset.extend_from_slice(&group);
        self.dataset.extend_from_slice(&element);
        self.dataset.extend_from_slice(&length);
    }
}

fn explicit_le(out: &mut Vec<u8>, group: u16, element: u16, vr: &Vr, value: &[u8]) {
    out.extend_from_slice(&group.to_le_bytes());
    out.extend_from_slice(&element.to_le_bytes());
    out.extend_from_slice(vr);
    if has_long_length(vr) {
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    } else {
        out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    }
    out.extend_from_slice(value);
}

fn implicit_le(out: &mut Vec<u8>, group: u16, element: u16, length: u32) {
    out.extend_from_slice(&group.to_le_bytes());
    out.extend_from_slice(&element.to_le_bytes());
    out.extend_from_slice(&length.to_le_bytes());
}
