//! Engine resource pack ("GDPC") container.
//!
//! The pack is a flat directory: fixed header, per-file records with an
//! absolute payload offset, length and MD5 digest, then the payloads.
//! This layer only moves raw byte buffers; what the buffers mean (and
//! any path extension remapping) is the caller's business.

use std::io::{Cursor, Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{GdscError, Result};

pub const PCK_MAGIC: &[u8; 4] = b"GDPC";

const RESERVED_WORDS: usize = 16;

#[derive(Debug, Clone)]
pub struct PckEntry {
    pub path: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct PckFile {
    pub pack_format_version: u32,
    pub version_major: u32,
    pub version_minor: u32,
    pub version_patch: u32,
    pub entries: Vec<PckEntry>,
}

impl PckFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut buf = Cursor::new(bytes);

        let mut magic = [0u8; 4];
        buf.read_exact(&mut magic)?;
        if &magic != PCK_MAGIC {
            return Err(GdscError::Format(
                "invalid pack file: missing magic header".to_string(),
            ));
        }

        let pack_format_version = buf.read_u32::<LittleEndian>()?;
        let version_major = buf.read_u32::<LittleEndian>()?;
        let version_minor = buf.read_u32::<LittleEndian>()?;
        let version_patch = buf.read_u32::<LittleEndian>()?;

        buf.seek(SeekFrom::Current(4 * RESERVED_WORDS as i64))?;

        let file_count = buf.read_u32::<LittleEndian>()?;
        let mut entries = Vec::with_capacity(file_count as usize);
        for _ in 0..file_count {
            let path_len = buf.read_u32::<LittleEndian>()? as usize;
            let mut path_bytes = vec![0u8; path_len];
            buf.read_exact(&mut path_bytes)?;
            // Paths may be NUL-padded to an alignment boundary.
            path_bytes.retain(|b| *b != 0);
            let path = String::from_utf8(path_bytes)
                .map_err(|e| GdscError::Format(format!("pack entry path is not UTF-8: {e}")))?;

            let offset = buf.read_u64::<LittleEndian>()? as usize;
            let length = buf.read_u64::<LittleEndian>()? as usize;
            let mut digest = [0u8; 16];
            buf.read_exact(&mut digest)?;

            let end = offset.checked_add(length).filter(|end| *end <= bytes.len());
            let data = match end {
                Some(end) => bytes[offset..end].to_vec(),
                None => {
                    return Err(GdscError::Format(format!(
                        "pack entry {path:?} points outside the file"
                    )));
                }
            };
            entries.push(PckEntry { path, data });
        }

        Ok(Self {
            pack_format_version,
            version_major,
            version_minor,
            version_patch,
            entries,
        })
    }

    /// Serialize the pack: header, directory, then payloads in entry
    /// order. Offsets and digests are computed here.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(PCK_MAGIC);
        buf.write_u32::<LittleEndian>(self.pack_format_version)?;
        buf.write_u32::<LittleEndian>(self.version_major)?;
        buf.write_u32::<LittleEndian>(self.version_minor)?;
        buf.write_u32::<LittleEndian>(self.version_patch)?;
        buf.extend_from_slice(&[0u8; 4 * RESERVED_WORDS]);
        buf.write_u32::<LittleEndian>(self.entries.len() as u32)?;

        // Directory first with placeholder offsets, patched once the
        // payload positions are known.
        let mut offset_slots = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let path_bytes = entry.path.as_bytes();
            buf.write_u32::<LittleEndian>(path_bytes.len() as u32)?;
            buf.extend_from_slice(path_bytes);
            offset_slots.push(buf.len());
            buf.write_u64::<LittleEndian>(0)?;
            buf.write_u64::<LittleEndian>(entry.data.len() as u64)?;
            let digest = md5::compute(&entry.data);
            buf.extend_from_slice(&digest.0);
        }

        for (entry, slot) in self.entries.iter().zip(offset_slots) {
            let offset = buf.len() as u64;
            buf[slot..slot + 8].copy_from_slice(&offset.to_le_bytes());
            buf.extend_from_slice(&entry.data);
        }

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> PckFile {
        PckFile {
            pack_format_version: 1,
            version_major: 3,
            version_minor: 2,
            version_patch: 0,
            entries: vec![
                PckEntry {
                    path: "res://scripts/main.gdc".to_string(),
                    data: vec![1, 2, 3, 4],
                },
                PckEntry {
                    path: "res://icon.png".to_string(),
                    data: vec![0xFF; 32],
                },
            ],
        }
    }

    #[test]
    fn pack_round_trips_entries_and_versions() {
        let original = sample();
        let bytes = original.to_bytes().unwrap();
        let parsed = PckFile::parse(&bytes).unwrap();
        assert_eq!(parsed.pack_format_version, 1);
        assert_eq!(
            (parsed.version_major, parsed.version_minor, parsed.version_patch),
            (3, 2, 0)
        );
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].path, "res://scripts/main.gdc");
        assert_eq!(parsed.entries[0].data, vec![1, 2, 3, 4]);
        assert_eq!(parsed.entries[1].data, vec![0xFF; 32]);
    }

    #[test]
    fn directory_records_digests() {
        let bytes = sample().to_bytes().unwrap();
        // Fixed header is 88 bytes: magic, 4 version words, 16 reserved
        // words, file count. The digest sits after offset and length.
        let record = 88 + 4 + "res://scripts/main.gdc".len();
        let digest = &bytes[record + 16..record + 32];
        assert_eq!(digest, md5::compute([1u8, 2, 3, 4]).0);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(PckFile::parse(&bytes), Err(GdscError::Format(_))));
    }

    #[test]
    fn out_of_range_payload_is_rejected() {
        let pck = sample();
        let mut bytes = pck.to_bytes().unwrap();
        let len = bytes.len();
        bytes.truncate(len - 8);
        assert!(matches!(PckFile::parse(&bytes), Err(GdscError::Format(_))));
    }
}
