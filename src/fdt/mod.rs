// Copyright (c) 2021 HUST IoT Security Lab
// serde_device_tree is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Read-only, bounds-checked view of a device tree blob.
//!
//! Nodes and properties are addressed by their byte offset into the
//! structure block, the way the blob itself addresses them. No offset handed
//! in by a caller is trusted: every access is checked against the block
//! bounds and reported as an [`Error`] when it falls outside.

mod node;
mod prop;

pub use node::Subnodes;
pub use prop::{Properties, Property, be32, be64};

use crate::{
    common::*,
    error::{Error, Result},
    tag::{Tag, Tags},
};

/// A validated device tree blob borrowed from the caller.
#[derive(Clone, Copy, Debug)]
pub struct Fdt<'a> {
    data: &'a [u8],
    header: Header,
}

impl<'a> Fdt<'a> {
    /// Validates the header of `data` and returns a reader over it.
    ///
    /// The blob may be shorter than `data`; bytes past the header's total
    /// size are ignored.
    pub fn from_bytes(data: &'a [u8]) -> Result<Self> {
        let header = Header::parse(data)?;
        header.verify(data.len())?;
        log::trace!(
            "fdt header: total size {:#x}, version {}, structure {:#x}+{:#x}, strings {:#x}+{:#x}",
            header.total_size,
            header.version,
            header.off_dt_struct,
            header.size_dt_struct,
            header.off_dt_strings,
            header.size_dt_strings,
        );
        Ok(Fdt {
            data: &data[..header.total_size as usize],
            header,
        })
    }

    /// Header of this blob in native byte order.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }
    #[inline]
    pub fn total_size(&self) -> usize {
        self.header.total_size as usize
    }
    #[inline]
    pub fn version(&self) -> u32 {
        self.header.version
    }
    #[inline]
    pub fn last_comp_version(&self) -> u32 {
        self.header.last_comp_version
    }
    #[inline]
    pub fn boot_cpuid_phys(&self) -> u32 {
        self.header.boot_cpuid_phys
    }
    #[inline]
    pub fn off_dt_struct(&self) -> usize {
        self.header.off_dt_struct as usize
    }
    #[inline]
    pub fn off_dt_strings(&self) -> usize {
        self.header.off_dt_strings as usize
    }
    #[inline]
    pub fn off_mem_rsvmap(&self) -> usize {
        self.header.off_mem_rsvmap as usize
    }
    #[inline]
    pub fn size_dt_struct(&self) -> usize {
        self.header.size_dt_struct as usize
    }
    #[inline]
    pub fn size_dt_strings(&self) -> usize {
        self.header.size_dt_strings as usize
    }

    /// The whole blob, `total_size` bytes long.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Structure block.
    #[inline]
    pub(crate) fn structure(&self) -> &'a [u8] {
        let begin = self.off_dt_struct();
        &self.data[begin..begin + self.size_dt_struct()]
    }

    /// Strings block.
    #[inline]
    pub(crate) fn strings(&self) -> &'a [u8] {
        let begin = self.off_dt_strings();
        &self.data[begin..begin + self.size_dt_strings()]
    }

    /// Blob offset of a structure block offset, used for error positions.
    #[inline]
    pub(crate) fn file_index(&self, offset: usize) -> usize {
        self.off_dt_struct().saturating_add(offset)
    }

    /// Raw token stream of the structure block, from the root node on.
    pub fn tags(&self) -> Tags<'a> {
        Tags::new(self.structure(), 0, self.off_dt_struct())
    }

    /// Reads the token at `offset`, returning it with the offset just past it.
    pub fn tag_at(&self, offset: usize) -> Result<(Tag<'a>, usize)> {
        if offset >= self.size_dt_struct() {
            return Err(Error::tag_eof_unexpected(
                offset.min(u32::MAX as usize) as u32,
                self.size_dt_struct() as u32,
                self.file_index(offset),
            ));
        }
        let mut tags = Tags::new(self.structure(), offset, self.off_dt_struct());
        let tag = tags.read_tag()?;
        Ok((tag, tags.cur))
    }

    /// Checks that a node begins at `offset`, returning the offset after its name.
    pub(crate) fn check_node_offset(&self, offset: usize) -> Result<usize> {
        match self.tag_at(offset) {
            Ok((Tag::Begin(_), next)) => Ok(next),
            Ok(_) | Err(_) => Err(Error::bad_node_offset(offset, self.file_index(offset))),
        }
    }

    /// Checks that a property begins at `offset`, returning the offset after it.
    pub(crate) fn check_prop_offset(&self, offset: usize) -> Result<usize> {
        if offset % U32_LEN != 0 || offset >= self.size_dt_struct() {
            return Err(Error::bad_property_offset(offset, self.file_index(offset)));
        }
        match self.tag_at(offset) {
            Ok((Tag::Prop(..), next)) => Ok(next),
            Ok(_) => Err(Error::bad_property_offset(offset, self.file_index(offset))),
            Err(e) => Err(e),
        }
    }

    /// Reads the NUL-terminated string at `string_offset` in the strings block.
    pub fn get_string(&self, string_offset: u32) -> Result<&'a str> {
        let strings = self.strings();
        let begin = string_offset as usize;
        let file_index = self.off_dt_strings() + begin;
        if begin >= strings.len() {
            return Err(Error::table_string_offset(
                string_offset,
                strings.len() as u32,
                file_index,
            ));
        }
        match strings[begin..].iter().position(|&b| b == b'\0') {
            Some(len) => core::str::from_utf8(&strings[begin..begin + len])
                .map_err(|e| Error::utf8(e, file_index)),
            None => Err(Error::table_string_offset(
                string_offset,
                strings.len() as u32,
                file_index,
            )),
        }
    }

    /// Name of the node at `offset`, unit address included; empty for the root.
    pub fn get_name(&self, offset: usize) -> Result<&'a str> {
        match self.tag_at(offset) {
            Ok((Tag::Begin(name), _)) => {
                core::str::from_utf8(name).map_err(|e| Error::utf8(e, self.file_index(offset)))
            }
            Ok(_) | Err(_) => Err(Error::bad_node_offset(offset, self.file_index(offset))),
        }
    }

    /// Entries of the memory reservation map, up to the terminating empty pair.
    pub fn reserved_entries(&self) -> ReservedEntries<'a> {
        ReservedEntries {
            data: self.data,
            cur: self.off_mem_rsvmap(),
        }
    }
}

/// Iterator over `(address, size)` pairs of the memory reservation map.
#[derive(Clone, Debug)]
pub struct ReservedEntries<'a> {
    data: &'a [u8],
    cur: usize,
}

impl Iterator for ReservedEntries<'_> {
    type Item = Result<(u64, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.data.get(self.cur..self.cur + RSVMAP_ENTRY_LEN as usize);
        let Some(entry) = entry else {
            let cur = self.cur;
            self.cur = self.data.len();
            if cur >= self.data.len() {
                return None;
            }
            return Some(Err(Error::slice_eof_unpexpected(
                RSVMAP_ENTRY_LEN,
                (self.data.len() - cur) as u32,
                cur,
            )));
        };
        let address = be64(&entry[..8]).unwrap_or(0);
        let size = be64(&entry[8..]).unwrap_or(0);
        if address == 0 && size == 0 {
            self.cur = self.data.len();
            return None;
        }
        self.cur += RSVMAP_ENTRY_LEN as usize;
        Some(Ok((address, size)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::Fdt;
    use crate::error::ErrorType;
    use std::vec::Vec;

    /// Hand-assembles a blob: `structure` words and `strings` bytes behind a
    /// header and an empty reservation map.
    pub(crate) fn assemble(structure: &[u8], strings: &[u8]) -> Vec<u8> {
        assemble_with_reserved(structure, strings, &[])
    }

    fn assemble_with_reserved(structure: &[u8], strings: &[u8], reserved: &[(u64, u64)]) -> Vec<u8> {
        let off_rsvmap = 40u32;
        let off_struct = off_rsvmap + 16 * (reserved.len() as u32 + 1);
        let off_strings = off_struct + structure.len() as u32;
        let total = off_strings + strings.len() as u32;
        let fields = [
            0xd00dfeed,
            total,
            off_struct,
            off_strings,
            off_rsvmap,
            17,
            16,
            0,
            strings.len() as u32,
            structure.len() as u32,
        ];
        let mut out: Vec<u8> = fields.iter().flat_map(|f| f.to_be_bytes()).collect();
        for (address, size) in reserved {
            out.extend_from_slice(&address.to_be_bytes());
            out.extend_from_slice(&size.to_be_bytes());
        }
        out.extend_from_slice(&[0; 16]);
        out.extend_from_slice(structure);
        out.extend_from_slice(strings);
        out
    }

    /// Version 16 layout: the header stops before `size_dt_struct`.
    fn assemble_v16(structure: &[u8], strings: &[u8]) -> Vec<u8> {
        let off_rsvmap = 36u32;
        let off_struct = off_rsvmap + 16;
        let off_strings = off_struct + structure.len() as u32;
        let total = off_strings + strings.len() as u32;
        let fields = [
            0xd00dfeed,
            total,
            off_struct,
            off_strings,
            off_rsvmap,
            16,
            16,
            0,
            strings.len() as u32,
        ];
        let mut out: Vec<u8> = fields.iter().flat_map(|f| f.to_be_bytes()).collect();
        out.extend_from_slice(&[0; 16]);
        out.extend_from_slice(structure);
        out.extend_from_slice(strings);
        out
    }

    pub(crate) fn words(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    /// Root with a `model` property and one `chosen` child.
    fn small_structure() -> Vec<u8> {
        let mut s = words(&[1, 0]);
        s.extend(words(&[3, 4, 0]));
        s.extend_from_slice(b"qemu");
        s.extend(words(&[1]));
        s.extend_from_slice(b"chosen\0\0");
        s.extend(words(&[2, 2, 9]));
        s
    }

    pub(crate) fn small_blob() -> Vec<u8> {
        assemble(&small_structure(), b"model\0")
    }

    #[test]
    fn header_accessors() {
        let raw = small_blob();
        let fdt = Fdt::from_bytes(&raw).unwrap();
        assert_eq!(fdt.total_size(), raw.len());
        assert_eq!(fdt.version(), 17);
        assert_eq!(fdt.last_comp_version(), 16);
        assert_eq!(fdt.off_dt_struct(), 56);
        assert_eq!(fdt.get_name(0).unwrap(), "");
        assert_eq!(fdt.get_string(0).unwrap(), "model");
    }

    #[test]
    fn string_offset_out_of_range_is_format_error() {
        let raw = small_blob();
        let fdt = Fdt::from_bytes(&raw).unwrap();
        let err = fdt.get_string(0x40).unwrap_err();
        assert!(err.is_format_error());
        assert!(matches!(
            err.error_type(),
            ErrorType::TableStringOffset {
                given_offset: 0x40,
                ..
            }
        ));
    }

    #[test]
    fn name_at_non_node_offset_is_rejected() {
        let raw = small_blob();
        let fdt = Fdt::from_bytes(&raw).unwrap();
        // offset 8 is the property token, 2 is not aligned, 0x1000 is outside
        for offset in [8, 2, 0x1000] {
            assert!(matches!(
                fdt.get_name(offset).unwrap_err().error_type(),
                ErrorType::BadNodeOffset { .. }
            ));
        }
    }

    #[test]
    fn truncated_buffer_fails_to_open() {
        let raw = small_blob();
        assert!(Fdt::from_bytes(&raw[..raw.len() - 4]).is_err());
    }

    #[test]
    fn reservation_map_stops_at_empty_entry() {
        let raw = small_blob();
        let fdt = Fdt::from_bytes(&raw).unwrap();
        assert_eq!(fdt.reserved_entries().count(), 0);

        let reserved = [(0x8000_0000, 0x20_0000), (0xfe00_0000, 0x1000)];
        let raw = assemble_with_reserved(&small_structure(), b"model\0", &reserved);
        let fdt = Fdt::from_bytes(&raw).unwrap();
        let entries: Vec<(u64, u64)> = fdt.reserved_entries().map(|e| e.unwrap()).collect();
        assert_eq!(entries, reserved);
        assert_eq!(fdt.off_dt_struct(), 88);
        assert_eq!(fdt.get_string(0).unwrap(), "model");
    }

    #[test]
    fn offsets_near_usize_max_are_rejected() {
        let raw = small_blob();
        let fdt = Fdt::from_bytes(&raw).unwrap();
        let offset = usize::MAX & !3;
        let err = fdt.get_name(offset).unwrap_err();
        assert!(matches!(err.error_type(), ErrorType::BadNodeOffset { .. }));
        assert_eq!(err.file_index(), usize::MAX);
        assert!(matches!(
            fdt.first_property_offset(offset).unwrap_err().error_type(),
            ErrorType::BadNodeOffset { .. }
        ));
        assert!(matches!(
            fdt.get_property_by_offset(offset).unwrap_err().error_type(),
            ErrorType::BadPropertyOffset { .. }
        ));
        assert!(matches!(
            fdt.next_property_offset(offset).unwrap_err().error_type(),
            ErrorType::BadPropertyOffset { .. }
        ));
        assert!(fdt.tag_at(offset).is_err());
        assert!(fdt.next_node(offset, 0).is_err());
        assert!(fdt.subnodes(offset).next().unwrap().is_err());
    }

    #[test]
    fn version_16_structure_runs_to_strings() {
        let structure = small_structure();
        let raw = assemble_v16(&structure, b"model\0");
        let fdt = Fdt::from_bytes(&raw).unwrap();
        assert_eq!(fdt.version(), 16);
        assert_eq!(fdt.off_dt_struct(), 52);
        assert_eq!(fdt.size_dt_struct(), structure.len());
        let chosen = fdt.subnode_offset_namelen(0, "chosen", 6).unwrap();
        assert_eq!(chosen.map(|c| fdt.get_name(c).unwrap()), Some("chosen"));
        let model = fdt.get_property(0, "model").unwrap().unwrap();
        assert_eq!(model.value, b"qemu");
        assert_eq!(fdt.reserved_entries().count(), 0);
    }
}
