//! On-disk container format (§4.I, §6): a fixed header followed by
//! concatenated, 8-byte-aligned sections. Mirrors `database.h`'s
//! `FileHeader_t` (magic+version, the `slots` constant, `interleaveFactor`,
//! and a `(count, element_size, offset)` triple per section) but keeps the
//! section list as a named table rather than one fixed struct field per
//! section, so the set of sections carried can grow without a format
//! version bump for every new one.
//!
//! Freshly built sections are plain owned byte buffers; a container opened
//! read-only instead borrows its sections from a `memmap2::Mmap`, the way
//! `other_examples/.../btreeindex-mod.rs.rs`'s `MmapStorage` borrows pages
//! straight out of a mapped file rather than copying them.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const FILE_MAGIC: u32 = 0x5554_4347; // "UTCG": Untangle Tree CataloGue
pub const FORMAT_VERSION: u32 = 1;

fn align8(n: u64) -> u64 {
    (n + 7) & !7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionEntry {
    pub name: String,
    pub count: u32,
    pub element_size: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub slots: u32,
    pub interleave: u32,
    pub sections: Vec<SectionEntry>,
}

impl FileHeader {
    fn validate_against(&self, expected_slots: u32) -> Result<()> {
        if self.magic != FILE_MAGIC {
            return Err(Error::FormatMismatch {
                field: "magic",
                expected: format!("{:#x}", FILE_MAGIC),
                found: format!("{:#x}", self.magic),
            });
        }
        if self.version != FORMAT_VERSION {
            return Err(Error::FormatMismatch {
                field: "version",
                expected: FORMAT_VERSION.to_string(),
                found: self.version.to_string(),
            });
        }
        if self.slots != expected_slots {
            return Err(Error::FormatMismatch {
                field: "slots",
                expected: expected_slots.to_string(),
                found: self.slots.to_string(),
            });
        }
        Ok(())
    }

    pub fn section(&self, name: &str) -> Option<&SectionEntry> {
        self.sections.iter().find(|s| s.name == name)
    }
}

/// A section present in a container, whose absence (size 0) signals that
/// callers must rebuild it lazily (§6).
pub enum SectionBytes<'a> {
    Owned(Vec<u8>),
    Borrowed(&'a [u8]),
}

impl<'a> SectionBytes<'a> {
    pub fn as_slice(&self) -> &[u8] {
        match self {
            SectionBytes::Owned(v) => v.as_slice(),
            SectionBytes::Borrowed(s) => s,
        }
    }
}

/// A container being assembled for write. Sections are appended in the
/// order a build pass produces them; names must be unique.
pub struct ContainerWriter {
    slots: u32,
    interleave: u32,
    sections: Vec<(SectionEntry, Vec<u8>)>,
}

impl ContainerWriter {
    pub fn new(slots: u32, interleave: u32) -> Self {
        Self { slots, interleave, sections: Vec::new() }
    }

    /// Serialises `value` with `bincode` and appends it as one section.
    pub fn add_section<T: Serialize>(&mut self, name: &'static str, count: u32, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        self.sections.push((
            SectionEntry {
                name: name.to_string(),
                count,
                element_size: if count == 0 { 0 } else { bytes.len() as u32 / count.max(1) },
                offset: 0,
            },
            bytes,
        ));
        Ok(())
    }

    pub fn write_to(self, path: &Path) -> Result<()> {
        let mut sections = self.sections;
        // Header offset is resolved after we know the header's own encoded
        // length, so lay out data sections first and patch offsets in.
        let mut header = FileHeader {
            magic: FILE_MAGIC,
            version: FORMAT_VERSION,
            slots: self.slots,
            interleave: self.interleave,
            sections: Vec::with_capacity(sections.len()),
        };

        // Two-pass: compute header size with placeholder offsets, then lay
        // out real offsets starting right after the encoded header.
        for (entry, _) in &sections {
            header.sections.push(entry.clone());
        }
        let header_len = bincode::serialized_size(&header).map_err(Error::from)? as u64;
        let mut offset = align8(header_len);

        for (entry, bytes) in sections.iter_mut() {
            entry.offset = offset;
            offset = align8(offset + bytes.len() as u64);
        }
        header.sections = sections.iter().map(|(e, _)| e.clone()).collect();

        let header_bytes = bincode::serialize(&header)?;
        let mut file = File::create(path)?;
        file.write_all(&header_bytes)?;
        pad_to(&mut file, align8(header_bytes.len() as u64))?;

        for (entry, bytes) in &sections {
            pad_to(&mut file, entry.offset)?;
            file.write_all(bytes)?;
        }
        let end = sections.last().map(|(e, b)| align8(e.offset + b.len() as u64)).unwrap_or(align8(header_bytes.len() as u64));
        pad_to(&mut file, end)?;
        Ok(())
    }
}

fn pad_to(file: &mut File, target: u64) -> Result<()> {
    let current = file.metadata()?.len();
    if current < target {
        file.set_len(target)?;
    }
    Ok(())
}

/// A container opened for reading. Small/administrative sections (the
/// header itself) are copied out; bulk sections are read lazily from the
/// memory map via `section_bytes`.
pub struct ContainerReader {
    header: FileHeader,
    mmap: Mmap,
}

impl ContainerReader {
    pub fn open(path: &Path, expected_slots: u32) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the container file is treated as read-only for the
        // lifetime of this mapping; concurrent external truncation is the
        // caller's responsibility to avoid, same contract memmap2 users
        // accept elsewhere in the corpus.
        let mmap = unsafe { Mmap::map(&file)? };
        let header: FileHeader = bincode::deserialize(&mmap).map_err(Error::from)?;
        header.validate_against(expected_slots)?;
        Ok(Self { header, mmap })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Borrows the raw bytes of `name`'s section straight from the mapped
    /// file, or `None` if the section is absent (size 0).
    pub fn section_bytes(&self, name: &str) -> Option<SectionBytes<'_>> {
        let entry = self.header.section(name)?;
        if entry.count == 0 {
            return None;
        }
        let start = entry.offset as usize;
        let len = entry.element_size as usize * entry.count as usize;
        self.mmap.get(start..start + len).map(SectionBytes::Borrowed)
    }

    pub fn decode_section<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Result<T> {
        let bytes = self
            .section_bytes(name)
            .ok_or(Error::MissingSection { section: section_name_leak(name) })?;
        bincode::deserialize(bytes.as_slice()).map_err(Error::from)
    }
}

/// `Error::MissingSection` wants a `&'static str`; section names in this
/// crate are always compile-time literals passed through, so this only ever
/// sees one of those. Leaking a handful of short strings over a container's
/// lifetime is a non-issue.
fn section_name_leak(name: &str) -> &'static str {
    Box::leak(name.to_string().into_boxed_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Dummy {
        values: Vec<u32>,
    }

    #[test]
    fn round_trips_a_section_through_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.cgb");

        let mut writer = ContainerWriter::new(9, 504);
        let payload = Dummy { values: vec![1, 2, 3, 4] };
        writer.add_section("dummy", payload.values.len() as u32, &payload).unwrap();
        writer.write_to(&path).unwrap();

        let reader = ContainerReader::open(&path, 9).unwrap();
        let decoded: Dummy = reader.decode_section("dummy").unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn opening_with_the_wrong_slot_count_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.cgb");
        let writer = ContainerWriter::new(9, 504);
        writer.write_to(&path).unwrap();
        assert!(ContainerReader::open(&path, 7).is_err());
    }

    #[test]
    fn a_missing_section_is_reported_by_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.cgb");
        let writer = ContainerWriter::new(9, 504);
        writer.write_to(&path).unwrap();
        let reader = ContainerReader::open(&path, 9).unwrap();
        let result: Result<Dummy> = reader.decode_section("dummy");
        assert!(matches!(result, Err(Error::MissingSection { .. })));
    }
}
