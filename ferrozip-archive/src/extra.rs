//! Extra-field registry for local and central headers.
//!
//! Two field types are understood; everything else is preserved verbatim as
//! an opaque blob and round-trips untouched. The same field id can appear in
//! both the local and central record of one entry with different payloads,
//! so the two sets merge field-wise with present values winning over absent
//! ones.

use ferrozip_core::binary::{read_u16, write_u16};
use ferrozip_core::{FerroZipError, Result};
use std::io::Cursor;

/// Field id of the extended-timestamp field.
pub const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;
/// Field id of the Info-ZIP Unix ownership field.
pub const UNIX_OWNERSHIP_ID: u16 = 0x5855;

/// Unix timestamps at second resolution, each individually optional.
///
/// The flag byte on the wire declares which stamps follow. Central records
/// habitually declare the access time but omit its bytes, so a declared but
/// absent atime parses as `None`; the same omission on any other stamp is
/// corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedTimestamp {
    /// Modification time, seconds since the Unix epoch.
    pub mtime: Option<i32>,
    /// Access time.
    pub atime: Option<i32>,
    /// Creation time.
    pub crtime: Option<i32>,
}

const FLAG_MTIME: u8 = 0x01;
const FLAG_ATIME: u8 = 0x02;
const FLAG_CRTIME: u8 = 0x04;

impl ExtendedTimestamp {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(FerroZipError::structural(
                "extended timestamp field has no flag byte",
            ));
        }
        let flags = data[0];
        let mut rest = &data[1..];
        let mtime = take_stamp(&mut rest, flags & FLAG_MTIME != 0, false, "mtime")?;
        let atime = take_stamp(&mut rest, flags & FLAG_ATIME != 0, true, "atime")?;
        let crtime = take_stamp(&mut rest, flags & FLAG_CRTIME != 0, false, "crtime")?;
        Ok(Self {
            mtime,
            atime,
            crtime,
        })
    }

    fn dump(&self) -> Vec<u8> {
        let mut flags = 0u8;
        let mut out = vec![0u8];
        for (bit, stamp) in [
            (FLAG_MTIME, self.mtime),
            (FLAG_ATIME, self.atime),
            (FLAG_CRTIME, self.crtime),
        ] {
            if let Some(secs) = stamp {
                flags |= bit;
                out.extend_from_slice(&secs.to_le_bytes());
            }
        }
        out[0] = flags;
        out
    }

    fn merge(&mut self, incoming: &Self) {
        if incoming.mtime.is_some() {
            self.mtime = incoming.mtime;
        }
        if incoming.atime.is_some() {
            self.atime = incoming.atime;
        }
        if incoming.crtime.is_some() {
            self.crtime = incoming.crtime;
        }
    }
}

fn take_stamp(
    rest: &mut &[u8],
    flagged: bool,
    tolerate_absent: bool,
    name: &str,
) -> Result<Option<i32>> {
    if !flagged {
        return Ok(None);
    }
    if rest.len() < 4 {
        if tolerate_absent && rest.is_empty() {
            return Ok(None);
        }
        return Err(FerroZipError::structural(format!(
            "extended timestamp field declares {} but is truncated",
            name
        )));
    }
    let (bytes, tail) = rest.split_at(4);
    *rest = tail;
    Ok(Some(i32::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3],
    ])))
}

/// Info-ZIP Unix field: access/modification times plus owner and group ids.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnixOwnership {
    /// Access time, seconds since the Unix epoch.
    pub atime: i32,
    /// Modification time.
    pub mtime: i32,
    /// Owner user id.
    pub uid: u16,
    /// Owner group id.
    pub gid: u16,
    /// Trailing bytes some producers append; preserved verbatim.
    pub tail: Vec<u8>,
}

impl UnixOwnership {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(FerroZipError::structural(format!(
                "unix ownership field is {} bytes, need at least 12",
                data.len()
            )));
        }
        Ok(Self {
            atime: i32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            mtime: i32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            uid: u16::from_le_bytes([data[8], data[9]]),
            gid: u16::from_le_bytes([data[10], data[11]]),
            tail: data[12..].to_vec(),
        })
    }

    fn dump(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.tail.len());
        out.extend_from_slice(&self.atime.to_le_bytes());
        out.extend_from_slice(&self.mtime.to_le_bytes());
        out.extend_from_slice(&self.uid.to_le_bytes());
        out.extend_from_slice(&self.gid.to_le_bytes());
        out.extend_from_slice(&self.tail);
        out
    }
}

/// One parsed extra field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
    /// Extended timestamp, id 0x5455.
    ExtendedTimestamp(ExtendedTimestamp),
    /// Info-ZIP Unix ownership, id 0x5855.
    UnixOwnership(UnixOwnership),
    /// Any field outside the registry, kept opaque.
    Raw {
        /// Wire field id.
        id: u16,
        /// Field payload, excluding the 4-byte id/length header.
        data: Vec<u8>,
    },
}

impl ExtraField {
    /// The wire field id.
    pub fn id(&self) -> u16 {
        match self {
            Self::ExtendedTimestamp(_) => EXTENDED_TIMESTAMP_ID,
            Self::UnixOwnership(_) => UNIX_OWNERSHIP_ID,
            Self::Raw { id, .. } => *id,
        }
    }

    fn payload(&self) -> Vec<u8> {
        match self {
            Self::ExtendedTimestamp(field) => field.dump(),
            Self::UnixOwnership(field) => field.dump(),
            Self::Raw { data, .. } => data.clone(),
        }
    }
}

/// The ordered extra-field set of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtraFields(Vec<ExtraField>);

impl ExtraFields {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the concatenated (id, length, payload) blob of one header.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(blob);
        let mut fields = Vec::new();
        while (cursor.position() as usize) < blob.len() {
            if blob.len() - (cursor.position() as usize) < 4 {
                return Err(FerroZipError::structural(
                    "trailing bytes too short for an extra field header",
                ));
            }
            let id = read_u16(&mut cursor)?;
            let len = read_u16(&mut cursor)? as usize;
            let start = cursor.position() as usize;
            if blob.len() - start < len {
                return Err(FerroZipError::structural(format!(
                    "extra field {:#06x} declares {} bytes but only {} remain",
                    id,
                    len,
                    blob.len() - start
                )));
            }
            let data = &blob[start..start + len];
            cursor.set_position((start + len) as u64);
            fields.push(match id {
                EXTENDED_TIMESTAMP_ID => {
                    ExtraField::ExtendedTimestamp(ExtendedTimestamp::parse(data)?)
                }
                UNIX_OWNERSHIP_ID => ExtraField::UnixOwnership(UnixOwnership::parse(data)?),
                _ => ExtraField::Raw {
                    id,
                    data: data.to_vec(),
                },
            });
        }
        Ok(Self(fields))
    }

    /// Serialize back to the concatenated wire form.
    pub fn dump(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for field in &self.0 {
            let payload = field.payload();
            // Infallible: writing to a Vec.
            let _ = write_u16(&mut out, field.id());
            let _ = write_u16(&mut out, payload.len() as u16);
            out.extend_from_slice(&payload);
        }
        out
    }

    /// Add or merge one field. A same-id extended timestamp merges
    /// stamp-wise with present values winning; any other same-id field is
    /// replaced wholesale.
    pub fn insert(&mut self, incoming: ExtraField) {
        if let ExtraField::ExtendedTimestamp(ref ts) = incoming {
            if let Some(ExtraField::ExtendedTimestamp(existing)) = self
                .0
                .iter_mut()
                .find(|f| matches!(f, ExtraField::ExtendedTimestamp(_)))
            {
                existing.merge(ts);
                return;
            }
        }
        if let Some(slot) = self.0.iter_mut().find(|f| f.id() == incoming.id()) {
            *slot = incoming;
        } else {
            self.0.push(incoming);
        }
    }

    /// Merge every field of `other` into this set.
    pub fn merge(&mut self, other: &ExtraFields) {
        for field in &other.0 {
            self.insert(field.clone());
        }
    }

    /// The extended timestamp field, if present.
    pub fn extended_timestamp(&self) -> Option<&ExtendedTimestamp> {
        self.0.iter().find_map(|f| match f {
            ExtraField::ExtendedTimestamp(ts) => Some(ts),
            _ => None,
        })
    }

    /// The Unix ownership field, if present.
    pub fn unix_ownership(&self) -> Option<&UnixOwnership> {
        self.0.iter().find_map(|f| match f {
            ExtraField::UnixOwnership(own) => Some(own),
            _ => None,
        })
    }

    /// Iterate the fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ExtraField> {
        self.0.iter()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extended_timestamp_all_stamps() {
        let mut blob = vec![0x55, 0x54, 13, 0, 0x07];
        blob.extend_from_slice(&100i32.to_le_bytes());
        blob.extend_from_slice(&200i32.to_le_bytes());
        blob.extend_from_slice(&300i32.to_le_bytes());
        let fields = ExtraFields::parse(&blob).unwrap();
        let ts = fields.extended_timestamp().unwrap();
        assert_eq!(ts.mtime, Some(100));
        assert_eq!(ts.atime, Some(200));
        assert_eq!(ts.crtime, Some(300));
    }

    #[test]
    fn test_parse_tolerates_declared_but_absent_atime() {
        // Flag byte declares mtime and atime, payload carries mtime only.
        let mut blob = vec![0x55, 0x54, 5, 0, 0x03];
        blob.extend_from_slice(&100i32.to_le_bytes());
        let fields = ExtraFields::parse(&blob).unwrap();
        let ts = fields.extended_timestamp().unwrap();
        assert_eq!(ts.mtime, Some(100));
        assert_eq!(ts.atime, None);
    }

    #[test]
    fn test_parse_rejects_truncated_mtime() {
        let blob = vec![0x55, 0x54, 3, 0, 0x01, 0xAA, 0xBB];
        assert!(ExtraFields::parse(&blob).is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_crtime() {
        let mut blob = vec![0x55, 0x54, 7, 0, 0x05];
        blob.extend_from_slice(&100i32.to_le_bytes());
        blob.extend_from_slice(&[0xAA, 0xBB]);
        assert!(ExtraFields::parse(&blob).is_err());
    }

    #[test]
    fn test_unix_ownership_roundtrip() {
        let field = UnixOwnership {
            atime: 1_700_000_000,
            mtime: 1_700_000_100,
            uid: 1000,
            gid: 100,
            tail: vec![1, 2, 3],
        };
        let mut fields = ExtraFields::new();
        fields.insert(ExtraField::UnixOwnership(field.clone()));
        let reparsed = ExtraFields::parse(&fields.dump()).unwrap();
        assert_eq!(reparsed.unix_ownership(), Some(&field));
    }

    #[test]
    fn test_unknown_field_roundtrips_verbatim() {
        let blob = vec![0x99, 0x99, 3, 0, 0xDE, 0xAD, 0xBF];
        let fields = ExtraFields::parse(&blob).unwrap();
        assert_eq!(fields.dump(), blob);
    }

    #[test]
    fn test_parse_rejects_overlong_declared_length() {
        let blob = vec![0x99, 0x99, 10, 0, 0x01];
        assert!(ExtraFields::parse(&blob).is_err());
    }

    #[test]
    fn test_merge_timestamp_fields_stamp_wise() {
        let mut local = ExtraFields::new();
        local.insert(ExtraField::ExtendedTimestamp(ExtendedTimestamp {
            mtime: Some(100),
            atime: Some(200),
            crtime: None,
        }));
        let mut central = ExtraFields::new();
        central.insert(ExtraField::ExtendedTimestamp(ExtendedTimestamp {
            mtime: Some(150),
            atime: None,
            crtime: None,
        }));
        local.merge(&central);
        let ts = local.extended_timestamp().unwrap();
        // Incoming present values win; absent ones leave the old value.
        assert_eq!(ts.mtime, Some(150));
        assert_eq!(ts.atime, Some(200));
        assert_eq!(ts.crtime, None);
    }

    #[test]
    fn test_merge_replaces_same_id_raw_field() {
        let mut a = ExtraFields::new();
        a.insert(ExtraField::Raw {
            id: 0x1234,
            data: vec![1],
        });
        let mut b = ExtraFields::new();
        b.insert(ExtraField::Raw {
            id: 0x1234,
            data: vec![2],
        });
        a.merge(&b);
        assert_eq!(a.dump(), b.dump());
    }
}
