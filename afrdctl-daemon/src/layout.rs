//! Byte layout of the status region the daemon publishes.
//!
//! ```text
//! 0       u32   stamp = CRC-32 of bytes [4, size-4)
//! 4       u16   declared size of the whole record
//! 6..=8   u8    enabled, modified, blackened
//! 9..=11  u8    version major, minor, patch
//! 12      24B   build date, NUL padded
//! 36      i32   current refresh rate, Q8
//! 40      i32   original refresh rate, Q8
//! 44      8B    version suffix, NUL padded (records of 52+ bytes)
//! size-4  u32   trailing copy of the stamp
//! ```
//!
//! All integers are little-endian. The writer fills every field, computes
//! the checksum and stores it at both ends; a reader that sees the two copies
//! disagree, or a checksum that does not match, caught the writer mid-update.

use std::fmt;

use serde::Serialize;

pub const STAMP: usize = 0;
pub const SIZE: usize = 4;
pub const ENABLED: usize = 6;
pub const MODIFIED: usize = 7;
pub const BLACKENED: usize = 8;
pub const VERSION_MAJOR: usize = 9;
pub const VERSION_MINOR: usize = 10;
pub const VERSION_PATCH: usize = 11;
pub const BUILD_DATE: usize = 12;
pub const BUILD_DATE_LEN: usize = 24;
pub const CURRENT_HZ: usize = 36;
pub const ORIGINAL_HZ: usize = 40;
pub const VERSION_SUFFIX: usize = 44;
pub const VERSION_SUFFIX_LEN: usize = 8;

/// Smallest decodable record: fixed fields plus the trailing stamp.
pub const MIN_RECORD_LEN: usize = VERSION_SUFFIX + 4;
/// Record produced by [`encode_record`]: suffix included.
pub const RECORD_LEN: usize = VERSION_SUFFIX + VERSION_SUFFIX_LEN + 4;

// ---------------------------------------------------------------------------
// Refresh rate
// ---------------------------------------------------------------------------

/// Refresh rate in 24.8 fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Hz(pub i32);

impl Hz {
    pub fn from_hz(whole: i32) -> Self {
        Hz(whole << 8)
    }
}

impl fmt::Display for Hz {
    /// `<whole>.<hundredths>`, hundredths rounded rather than truncated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = i64::from(self.0);
        let hundredths = (raw.abs() * 100 + 128) >> 8;
        let sign = if raw < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:02}", hundredths / 100, hundredths % 100)
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One consistent generation of the daemon's published status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub change_stamp: u32,
    pub enabled: bool,
    pub modified: bool,
    pub blackened: bool,
    pub version_major: u8,
    pub version_minor: u8,
    pub version_patch: u8,
    pub version_suffix: String,
    pub build_date: String,
    pub current_hz: Hz,
    pub original_hz: Hz,
}

impl StatusSnapshot {
    /// `major.minor.patch` followed by the suffix, e.g. `0.2.1-beta`.
    pub fn version(&self) -> String {
        format!(
            "{}.{}.{}{}",
            self.version_major, self.version_minor, self.version_patch, self.version_suffix
        )
    }
}

/// Why a copied record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFault {
    TooShort { len: usize },
    SizeMismatch { declared: usize, actual: usize },
    TornStamp { leading: u32, trailing: u32 },
    BadChecksum { stamp: u32, computed: u32 },
}

impl fmt::Display for RecordFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFault::TooShort { len } => write!(f, "record too short ({len} bytes)"),
            RecordFault::SizeMismatch { declared, actual } => {
                write!(f, "declared size {declared} != {actual} bytes")
            }
            RecordFault::TornStamp { leading, trailing } => {
                write!(f, "torn read: stamp {leading:#010x} != {trailing:#010x}")
            }
            RecordFault::BadChecksum { stamp, computed } => {
                write!(f, "checksum {computed:#010x} != stamp {stamp:#010x}")
            }
        }
    }
}

pub(crate) fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

pub(crate) fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_i32(bytes: &[u8], at: usize) -> i32 {
    read_u32(bytes, at) as i32
}

fn read_cstr(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// CRC-32 of the bytes between the leading and trailing stamps.
pub fn checksum(record: &[u8]) -> u32 {
    crc32fast::hash(&record[SIZE..record.len() - 4])
}

/// Validate and decode a private copy of the region.
pub fn decode_record(record: &[u8]) -> Result<StatusSnapshot, RecordFault> {
    let len = record.len();
    if len < MIN_RECORD_LEN {
        return Err(RecordFault::TooShort { len });
    }

    let declared = usize::from(read_u16(record, SIZE));
    if declared != len {
        return Err(RecordFault::SizeMismatch {
            declared,
            actual: len,
        });
    }

    let leading = read_u32(record, STAMP);
    let trailing = read_u32(record, len - 4);
    if leading != trailing {
        return Err(RecordFault::TornStamp { leading, trailing });
    }

    let computed = checksum(record);
    if computed != leading {
        return Err(RecordFault::BadChecksum {
            stamp: leading,
            computed,
        });
    }

    // The suffix never extends into the trailing stamp.
    let version_suffix = if len >= VERSION_SUFFIX + VERSION_SUFFIX_LEN {
        let end = (VERSION_SUFFIX + VERSION_SUFFIX_LEN).min(len - 4);
        read_cstr(&record[VERSION_SUFFIX..end])
    } else {
        String::new()
    };

    Ok(StatusSnapshot {
        change_stamp: leading,
        enabled: record[ENABLED] != 0,
        modified: record[MODIFIED] != 0,
        blackened: record[BLACKENED] != 0,
        version_major: record[VERSION_MAJOR],
        version_minor: record[VERSION_MINOR],
        version_patch: record[VERSION_PATCH],
        version_suffix,
        build_date: read_cstr(&record[BUILD_DATE..BUILD_DATE + BUILD_DATE_LEN]),
        current_hz: Hz(read_i32(record, CURRENT_HZ)),
        original_hz: Hz(read_i32(record, ORIGINAL_HZ)),
    })
}

/// Writer side: serialize `snapshot` into a [`RECORD_LEN`]-byte record with
/// both stamps set to the checksum. `change_stamp` is ignored.
pub fn encode_record(snapshot: &StatusSnapshot) -> Vec<u8> {
    let mut record = vec![0u8; RECORD_LEN];
    record[SIZE..SIZE + 2].copy_from_slice(&(RECORD_LEN as u16).to_le_bytes());
    record[ENABLED] = u8::from(snapshot.enabled);
    record[MODIFIED] = u8::from(snapshot.modified);
    record[BLACKENED] = u8::from(snapshot.blackened);
    record[VERSION_MAJOR] = snapshot.version_major;
    record[VERSION_MINOR] = snapshot.version_minor;
    record[VERSION_PATCH] = snapshot.version_patch;
    write_cstr(
        &mut record[BUILD_DATE..BUILD_DATE + BUILD_DATE_LEN],
        &snapshot.build_date,
    );
    record[CURRENT_HZ..CURRENT_HZ + 4].copy_from_slice(&snapshot.current_hz.0.to_le_bytes());
    record[ORIGINAL_HZ..ORIGINAL_HZ + 4].copy_from_slice(&snapshot.original_hz.0.to_le_bytes());
    write_cstr(
        &mut record[VERSION_SUFFIX..VERSION_SUFFIX + VERSION_SUFFIX_LEN],
        &snapshot.version_suffix,
    );
    seal(&mut record);
    record
}

/// Recompute the checksum of `record` and store it in both stamp slots.
pub fn seal(record: &mut [u8]) {
    let stamp = checksum(record).to_le_bytes();
    let len = record.len();
    record[STAMP..STAMP + 4].copy_from_slice(&stamp);
    record[len - 4..].copy_from_slice(&stamp);
}

/// Copy `text` truncated to the field; the rest stays NUL.
fn write_cstr(field: &mut [u8], text: &str) {
    let bytes = text.as_bytes();
    let n = bytes.len().min(field.len());
    field[..n].copy_from_slice(&bytes[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> StatusSnapshot {
        StatusSnapshot {
            change_stamp: 0,
            enabled: true,
            modified: false,
            blackened: false,
            version_major: 0,
            version_minor: 2,
            version_patch: 1,
            version_suffix: "-beta".into(),
            build_date: "2019-03-01 12:00".into(),
            current_hz: Hz::from_hz(60),
            original_hz: Hz::from_hz(50),
        }
    }

    #[rstest]
    #[case(0x1802, "24.01")]
    #[case(60 << 8, "60.00")]
    #[case(6138, "23.98")]
    #[case(0x18ff, "25.00")]
    #[case(0, "0.00")]
    fn hz_formatting_rounds(#[case] raw: i32, #[case] expected: &str) {
        assert_eq!(Hz(raw).to_string(), expected);
    }

    #[test]
    fn encoded_record_decodes() {
        let record = encode_record(&sample());
        assert_eq!(record.len(), RECORD_LEN);
        let snap = decode_record(&record).expect("decode");
        assert_eq!(snap.change_stamp, read_u32(&record, 0));
        assert_eq!(snap.change_stamp, crc32fast::hash(&record[4..RECORD_LEN - 4]));
        assert_eq!(snap.version(), "0.2.1-beta");
        assert_eq!(snap.build_date, "2019-03-01 12:00");
        assert_eq!(snap.current_hz, Hz::from_hz(60));
        assert!(snap.enabled && !snap.modified && !snap.blackened);
    }

    #[test]
    fn short_record_without_suffix() {
        let full = encode_record(&sample());
        let mut record = full[..MIN_RECORD_LEN].to_vec();
        record[SIZE..SIZE + 2].copy_from_slice(&(MIN_RECORD_LEN as u16).to_le_bytes());
        seal(&mut record);
        let snap = decode_record(&record).expect("decode");
        assert_eq!(snap.version_suffix, "");
        assert_eq!(snap.version(), "0.2.1");
    }

    #[rstest]
    #[case(0, 0xdead_beef)]
    #[case(RECORD_LEN - 4, 0x0000_0001)]
    #[case(RECORD_LEN - 1, 0xff00_0000)]
    fn torn_stamps_are_rejected(#[case] at: usize, #[case] flip: u32) {
        let mut record = encode_record(&sample());
        let start = at.min(RECORD_LEN - 4);
        let value = read_u32(&record, start) ^ flip;
        record[start..start + 4].copy_from_slice(&value.to_le_bytes());
        assert!(matches!(
            decode_record(&record),
            Err(RecordFault::TornStamp { .. })
        ));
    }

    #[test]
    fn interior_corruption_fails_checksum() {
        let mut record = encode_record(&sample());
        record[CURRENT_HZ] ^= 0x40;
        assert!(matches!(
            decode_record(&record),
            Err(RecordFault::BadChecksum { .. })
        ));
    }

    #[test]
    fn declared_size_must_match() {
        let mut record = encode_record(&sample());
        record.extend_from_slice(&[0; 4]);
        assert_eq!(
            decode_record(&record),
            Err(RecordFault::SizeMismatch {
                declared: RECORD_LEN,
                actual: RECORD_LEN + 4
            })
        );
        assert_eq!(
            decode_record(&record[..10]),
            Err(RecordFault::TooShort { len: 10 })
        );
    }

    #[test]
    fn long_text_fields_are_truncated() {
        let mut snap = sample();
        snap.version_suffix = "-verylongsuffix".into();
        let decoded = decode_record(&encode_record(&snap)).expect("decode");
        assert_eq!(decoded.version_suffix, "-verylon");
    }
}
