use std::io::Read;

use log::{debug, warn};
use serde::Serialize;

use crate::err::{FlpError, Result};
use crate::utils::read_ext::{OffsetReader, ReadExt};

pub const FLP_HEADER_MAGIC: &[u8; 4] = b"FLhd";
pub const FLP_DATA_MAGIC: &[u8; 4] = b"FLdt";

/// The header chunk and the data chunk header, i.e. everything in front of the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlpFileHeader {
    /// Length of the header chunk body, as declared in the file.
    pub header_size: u32,
    pub format_version: u16,
    /// Total byte count of the event stream that follows.
    pub data_size: u32,
}

impl FlpFileHeader {
    /// Reads and validates both chunk headers.
    /// On success the reader is positioned on the first event.
    pub(crate) fn from_stream<R: Read>(stream: &mut OffsetReader<R>) -> Result<FlpFileHeader> {
        let magic = stream.try_magic::<4>()?;
        if magic != FLP_HEADER_MAGIC {
            return Err(FlpError::InvalidHeader { found: magic });
        }

        let header_size = stream.try_u32_named("header chunk size")?;
        let format_version = stream.try_u16_named("format version")?;
        debug!("FLP format version: {}", format_version);

        // Fields after the version are not interpreted.
        if header_size > 2 {
            let to_skip = u64::from(header_size - 2);
            let offset = stream.offset();
            let skipped = stream
                .skip(to_skip)
                .map_err(|source| FlpError::FailedToRead {
                    what: "header chunk",
                    offset,
                    source,
                })?;
            if skipped < to_skip {
                warn!(
                    "Header chunk declares {} bytes, stream ended after {}",
                    header_size,
                    skipped + 2
                );
            }
        }

        let magic = stream.try_magic::<4>()?;
        if magic != FLP_DATA_MAGIC {
            return Err(FlpError::InvalidDataHeader { found: magic });
        }

        let data_size = stream.try_u32_named("data chunk size")?;
        debug!("FLP data chunk size: {}", data_size);

        Ok(FlpFileHeader {
            header_size,
            format_version,
            data_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(header_size: u32, version: u16, extra: &[u8], data_size: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(b"FLhd");
        data.extend_from_slice(&header_size.to_le_bytes());
        data.extend_from_slice(&version.to_le_bytes());
        data.extend_from_slice(extra);
        data.extend_from_slice(b"FLdt");
        data.extend_from_slice(&data_size.to_le_bytes());
        data
    }

    #[test]
    fn test_parses_flp_file_header() {
        // Typical header: format, channel count and PPQ.
        let data = header_bytes(6, 0, &[0x10, 0x00, 0x60, 0x00], 1234);
        let mut reader = OffsetReader::new(Cursor::new(data));

        let header = FlpFileHeader::from_stream(&mut reader).unwrap();

        assert_eq!(
            header,
            FlpFileHeader {
                header_size: 6,
                format_version: 0,
                data_size: 1234,
            }
        );
        assert_eq!(reader.offset(), 22);
    }

    #[test]
    fn test_header_without_extra_fields() {
        let data = header_bytes(2, 2008, &[], 0);
        let mut reader = OffsetReader::new(Cursor::new(data));

        let header = FlpFileHeader::from_stream(&mut reader).unwrap();
        assert_eq!(header.format_version, 2008);
        assert_eq!(reader.offset(), 18);
    }

    #[test]
    fn test_rejects_bad_header_magic() {
        let mut data = header_bytes(2, 2008, &[], 0);
        data[0] = b'X';

        let err = FlpFileHeader::from_stream(&mut OffsetReader::new(Cursor::new(data)));
        match err {
            Err(FlpError::InvalidHeader { found }) => assert_eq!(found, b"XLhd"),
            other => panic!("expected InvalidHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_stream_is_an_invalid_header() {
        let err = FlpFileHeader::from_stream(&mut OffsetReader::new(Cursor::new(vec![])));
        assert!(matches!(err, Err(FlpError::InvalidHeader { found }) if found.is_empty()));
    }

    #[test]
    fn test_rejects_bad_data_magic() {
        let mut data = header_bytes(2, 2008, &[], 0);
        data[10..14].copy_from_slice(b"FLDT");

        let err = FlpFileHeader::from_stream(&mut OffsetReader::new(Cursor::new(data)));
        assert!(matches!(err, Err(FlpError::InvalidDataHeader { .. })));
    }

    #[test]
    fn test_header_size_larger_than_file() {
        let mut data = Vec::new();
        data.extend_from_slice(b"FLhd");
        data.extend_from_slice(&100_u32.to_le_bytes());
        data.extend_from_slice(&2008_u16.to_le_bytes());
        data.extend_from_slice(&[0; 3]);

        let err = FlpFileHeader::from_stream(&mut OffsetReader::new(Cursor::new(data)));
        assert!(matches!(err, Err(FlpError::InvalidDataHeader { found }) if found.is_empty()));
    }

    #[test]
    fn test_truncated_version_is_a_read_error() {
        let mut data = Vec::new();
        data.extend_from_slice(b"FLhd");
        data.extend_from_slice(&6_u32.to_le_bytes());
        data.push(0x08);

        let err = FlpFileHeader::from_stream(&mut OffsetReader::new(Cursor::new(data)));
        match err {
            Err(FlpError::FailedToRead { what, offset, .. }) => {
                assert_eq!(what, "format version");
                assert_eq!(offset, 8);
            }
            other => panic!("expected FailedToRead, got {:?}", other),
        }
    }
}
