//! DICOM Header Decoder
//!
//! This crate reads the handful of header attributes the study survey needs from
//! DICOM Part 10 files, without decoding pixel data.
//!
//! ## File Layout
//!
//! ```text
//! +-----------------+--------+-----------------------+------------------------+
//! | 128-byte        | "DICM" | file meta group 0002  | dataset, encoded with  |
//! | preamble        |        | explicit VR LE        | the transfer syntax    |
//! +-----------------+--------+-----------------------+------------------------+
//! ```
//!
//! Decoding stops at Pixel Data `(7FE0,0010)` or once every wanted tag has been
//! passed, so only the head of each file is read. Text attributes are decoded
//! through the Specific Character Set `(0008,0005)` declared by the file.
//!
//! ## Example Usage
//!
//! ```no_run
//! use dicom_header::read_header;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let header = read_header(Path::new("study/BP001/T1/IM0001.DCM"))?;
//! println!("{}", header.get("Modality").unwrap_or("Unknown"));
//! # Ok(())
//! # }
//! ```

mod charset;
mod reader;
mod tags;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use reader::{read_header, read_header_from, DicomHeader, TransferSyntax};
pub use tags::{
    HeaderField, Tag, Vr, HEADER_FIELDS, PIXEL_DATA, SPECIFIC_CHARACTER_SET, TRANSFER_SYNTAX_UID,
};

/// Errors that can occur while decoding a DICOM header
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    /// The preamble is missing or not followed by the `DICM` marker
    #[error("Not a DICOM Part 10 file: missing DICM marker")]
    NotDicom,

    /// The dataset uses an encoding this decoder does not read
    #[error("Unsupported transfer syntax: {0}")]
    UnsupportedTransferSyntax(String),

    /// The file ended inside an element
    #[error("Truncated header: {0}")]
    Truncated(String),

    /// The element stream violates the Part 10 structure
    #[error("Malformed header: {0}")]
    Malformed(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for header decoding.
pub type HeaderResult<T> = Result<T, HeaderError>;
