//! Minimal in-place device tree blob writer.
//!
//! Enough to produce blobs for the extractor: an empty tree, nodes appended
//! under a parent and properties set on a node. The blob lives in a caller
//! buffer laid out as header, reservation map, structure block and strings
//! block, with the remaining bytes free. Each operation checks that its
//! growth fits the buffer before it touches a byte, so a failed call leaves
//! the blob as it was.

pub mod pointer;
pub mod string_block;

use crate::{
    common::*,
    error::{Error, Result},
    fdt::Fdt,
};
use pointer::Pointer;
use string_block::StringBlock;

/// BEGIN_NODE, empty root name, END_NODE, END.
const EMPTY_STRUCT_LEN: u32 = 4 * U32_LEN as u32;
/// PROP token, value length and name offset.
const PROP_HEADER_LEN: usize = 3 * U32_LEN;

/// Writes an empty tree (a root node without properties) to the start of `buf`.
///
/// Returns the blob's total size.
pub fn create_empty_tree(buf: &mut [u8]) -> Result<usize> {
    let off_mem_rsvmap = HEADER_LEN;
    let off_dt_struct = off_mem_rsvmap + RSVMAP_ENTRY_LEN;
    let off_dt_strings = off_dt_struct + EMPTY_STRUCT_LEN;
    let total_size = off_dt_strings;
    if buf.len() < total_size as usize {
        return Err(Error::no_space(total_size as usize, buf.len()));
    }
    let header = Header {
        magic: DEVICE_TREE_MAGIC,
        total_size,
        off_dt_struct,
        off_dt_strings,
        off_mem_rsvmap,
        version: SUPPORTED_VERSION,
        last_comp_version: LAST_COMP_VERSION,
        boot_cpuid_phys: 0,
        size_dt_strings: 0,
        size_dt_struct: EMPTY_STRUCT_LEN,
    };
    let mut dst = Pointer::new(buf, 0);
    dst.step_by_header(&header)?;
    dst.step_by_bytes(&[0; RSVMAP_ENTRY_LEN as usize])?;
    dst.step_by_u32(FDT_BEGIN_NODE)?;
    dst.step_by_u32(0)?;
    dst.step_by_u32(FDT_END_NODE)?;
    dst.step_by_u32(FDT_END)?;
    log::trace!("empty tree written, {:#x} bytes", total_size);
    Ok(total_size as usize)
}

/// Edits a blob in place inside a fixed-capacity buffer.
pub struct FdtWriter<'a> {
    data: &'a mut [u8],
    header: Header,
}

impl<'a> FdtWriter<'a> {
    /// Opens the blob at the start of `data`; the rest of `data` is free space.
    ///
    /// The strings block must be the last block of the blob, directly
    /// followed by free space, as [`create_empty_tree`] leaves it, and the
    /// blob must be version 17 or later.
    pub fn new(data: &'a mut [u8]) -> Result<Self> {
        let header = *Fdt::from_bytes(data)?.header();
        // The header is rewritten whole, so it must have room for `size_dt_struct`.
        if header.version < STRUCT_SIZE_VERSION {
            return Err(Error::unsupported_version(
                header.version,
                STRUCT_SIZE_VERSION,
                OFF_VERSION,
            ));
        }
        let struct_end = header.off_dt_struct + header.size_dt_struct;
        let strings_end = header.off_dt_strings + header.size_dt_strings;
        if header.off_mem_rsvmap > header.off_dt_struct {
            return Err(Error::bad_layout(OFF_MEM_RSVMAP));
        }
        if struct_end > header.off_dt_strings || strings_end != header.total_size {
            return Err(Error::bad_layout(OFF_DT_STRINGS));
        }
        Ok(FdtWriter { data, header })
    }

    /// Creates an empty tree in `data` and opens it.
    pub fn create(data: &'a mut [u8]) -> Result<Self> {
        create_empty_tree(data)?;
        Self::new(data)
    }

    /// Reader over the current state of the blob.
    pub fn fdt(&self) -> Result<Fdt<'_>> {
        Fdt::from_bytes(self.data)
    }

    #[inline]
    pub fn total_size(&self) -> usize {
        self.header.total_size as usize
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The blob written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.total_size()]
    }

    /// Appends a child named `name` as the last subnode of `parent` and
    /// returns its offset.
    pub fn add_subnode(&mut self, parent: usize, name: &str) -> Result<usize> {
        check_name(name)?;
        let at = {
            let fdt = self.fdt()?;
            for child in fdt.subnodes(parent) {
                let child = child?;
                if fdt.get_name(child)? == name {
                    return Err(Error::exists(fdt.file_index(child)));
                }
            }
            fdt.node_end_offset(parent)?
        };
        let len = 2 * U32_LEN + align_up_u32(name.len() + 1);
        self.ensure_space(len)?;
        self.splice_struct(at, 0, len)?;

        let mut dst = Pointer::new(self.data, self.header.off_dt_struct as usize + at);
        dst.step_by_u32(FDT_BEGIN_NODE)?;
        dst.step_by_name(name)?;
        dst.step_by_u32(FDT_END_NODE)?;
        log::trace!("node `{}` added at {:#x} under {:#x}", name, at, parent);
        Ok(at)
    }

    /// Sets property `name` of `node` to `value`.
    ///
    /// An existing property is rewritten in place, growing or shrinking the
    /// structure block as needed. A new one goes after the node's last
    /// property, reusing the name from the strings block when it is there.
    pub fn set_prop(&mut self, node: usize, name: &str, value: &[u8]) -> Result<()> {
        check_name(name)?;
        if u32::try_from(value.len()).is_err() {
            return Err(Error::no_space(value.len(), self.capacity()));
        }
        let plan = {
            let fdt = self.fdt()?;
            match fdt.get_property(node, name)? {
                Some(prop) => Plan::Rewrite {
                    offset: prop.offset,
                    old_len: prop.len(),
                },
                None => {
                    let mut at = fdt.check_node_offset(node)?;
                    let mut cur = fdt.first_property_offset(node)?;
                    while let Some(prop) = cur {
                        at = fdt.check_prop_offset(prop)?;
                        cur = fdt.next_property_offset(prop)?;
                    }
                    Plan::Insert {
                        at,
                        name_offset: StringBlock::new(fdt.strings()).find(name),
                    }
                }
            }
        };
        match plan {
            Plan::Rewrite { offset, old_len } => self.rewrite_prop(offset, old_len, value),
            Plan::Insert { at, name_offset } => self.insert_prop(at, name_offset, name, value),
        }
    }

    pub fn set_prop_u32(&mut self, node: usize, name: &str, value: u32) -> Result<()> {
        self.set_prop(node, name, &value.to_be_bytes())
    }

    pub fn set_prop_u64(&mut self, node: usize, name: &str, value: u64) -> Result<()> {
        self.set_prop(node, name, &value.to_be_bytes())
    }

    fn rewrite_prop(&mut self, offset: usize, old_len: usize, value: &[u8]) -> Result<()> {
        let old_padded = align_up_u32(old_len);
        let new_padded = align_up_u32(value.len());
        if new_padded > old_padded {
            self.ensure_space(new_padded - old_padded)?;
        }
        self.splice_struct(offset + PROP_HEADER_LEN, old_padded, new_padded)?;

        let base = self.header.off_dt_struct as usize + offset;
        let mut dst = Pointer::new(self.data, base + U32_LEN);
        dst.step_by_u32(value.len() as u32)?;
        dst.step_by_len(U32_LEN);
        dst.step_by_bytes(value)?;
        dst.step_align()?;
        log::trace!("property at {:#x} rewritten, {} bytes", offset, value.len());
        Ok(())
    }

    fn insert_prop(
        &mut self,
        at: usize,
        name_offset: Option<usize>,
        name: &str,
        value: &[u8],
    ) -> Result<()> {
        let prop_len = PROP_HEADER_LEN + align_up_u32(value.len());
        let string_len = match name_offset {
            Some(_) => 0,
            None => name.len() + 1,
        };
        self.ensure_space(prop_len + string_len)?;
        let name_offset = match name_offset {
            Some(offset) => offset,
            None => self.append_string(name)?,
        };
        self.splice_struct(at, 0, prop_len)?;

        let mut dst = Pointer::new(self.data, self.header.off_dt_struct as usize + at);
        dst.step_by_prop(name_offset as u32, value)?;
        log::trace!("property `{}` added at {:#x}", name, at);
        Ok(())
    }

    fn ensure_space(&self, extra: usize) -> Result<()> {
        let required = self.total_size() + extra;
        if required > self.capacity() {
            return Err(Error::no_space(required, self.capacity()));
        }
        Ok(())
    }

    /// Appends `name` to the strings block, returning its offset there.
    fn append_string(&mut self, name: &str) -> Result<usize> {
        let offset = self.header.size_dt_strings as usize;
        let mut dst = Pointer::new(self.data, self.total_size());
        dst.step_by_bytes(name.as_bytes())?;
        dst.step_by_bytes(&[0])?;
        let len = (name.len() + 1) as u32;
        self.header.size_dt_strings += len;
        self.header.total_size += len;
        self.store_header()?;
        Ok(offset)
    }

    /// Replaces `old_len` bytes at structure offset `at` with `new_len`
    /// bytes of room, moving everything behind them. The caller has
    /// checked that the buffer can hold the result.
    fn splice_struct(&mut self, at: usize, old_len: usize, new_len: usize) -> Result<()> {
        let total = self.total_size();
        let from = self.header.off_dt_struct as usize + at + old_len;
        let to = self.header.off_dt_struct as usize + at + new_len;
        let new_total = total - old_len + new_len;
        if new_total > self.capacity() {
            return Err(Error::no_space(new_total, self.capacity()));
        }
        self.data.copy_within(from..total, to);
        if new_total < total {
            self.data[new_total..total].fill(0);
        }
        let (old_len, new_len) = (old_len as u32, new_len as u32);
        self.header.size_dt_struct = self.header.size_dt_struct - old_len + new_len;
        self.header.off_dt_strings = self.header.off_dt_strings - old_len + new_len;
        self.header.total_size = new_total as u32;
        self.store_header()
    }

    fn store_header(&mut self) -> Result<()> {
        Pointer::new(self.data, 0).step_by_header(&self.header)
    }
}

enum Plan {
    Rewrite { offset: usize, old_len: usize },
    Insert { at: usize, name_offset: Option<usize> },
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('\0') {
        return Err(Error::invalid_name());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{FdtWriter, create_empty_tree};
    use crate::error::ErrorType;
    use crate::fdt::Fdt;

    const MAX_SIZE: usize = 256;

    #[test]
    fn empty_tree_reads_back() {
        let mut buf = [0u8; MAX_SIZE];
        let total = create_empty_tree(&mut buf).unwrap();
        assert_eq!(total, 72);
        let fdt = Fdt::from_bytes(&buf).unwrap();
        assert_eq!(fdt.total_size(), 72);
        assert_eq!(fdt.get_name(0).unwrap(), "");
        assert_eq!(fdt.first_subnode(0).unwrap(), None);
        assert_eq!(fdt.first_property_offset(0).unwrap(), None);
        assert_eq!(fdt.next_node(0, 0).unwrap(), None);
    }

    #[test]
    fn empty_tree_needs_room() {
        let mut buf = [0u8; 40];
        let err = create_empty_tree(&mut buf).unwrap_err();
        assert_eq!(
            err.error_type(),
            ErrorType::NoSpace {
                required: 72,
                available: 40
            }
        );
    }

    #[test]
    fn nodes_and_properties_read_back() {
        let mut buf = [0u8; MAX_SIZE];
        let mut w = FdtWriter::create(&mut buf).unwrap();
        let acpi = w.add_subnode(0, "acpi").unwrap();
        w.set_prop_u64(acpi, "rsdp", 0x7fe0_0000).unwrap();
        let cpu = w.add_subnode(0, "cpu-info").unwrap();
        w.set_prop_u32(cpu, "memoryspace", 39).unwrap();
        w.set_prop(0, "model", b"upl\0").unwrap();

        let fdt = w.fdt().unwrap();
        let acpi = fdt.subnode_offset_namelen(0, "acpi", 4).unwrap().unwrap();
        let cpu = fdt.subnode_offset_namelen(0, "cpu-info", 8).unwrap().unwrap();
        let rsdp = fdt.get_property(acpi, "rsdp").unwrap().unwrap();
        assert_eq!(rsdp.u64_at(0), Some(0x7fe0_0000));
        let space = fdt.get_property(cpu, "memoryspace").unwrap().unwrap();
        assert_eq!(space.u32_at(0), Some(39));
        let model = fdt.get_property(0, "model").unwrap().unwrap();
        assert_eq!(model.value, b"upl\0");
        let names: std::vec::Vec<&str> = fdt
            .subnodes(0)
            .map(|c| fdt.get_name(c.unwrap()).unwrap())
            .collect();
        assert_eq!(names, ["acpi", "cpu-info"]);
    }

    #[test]
    fn property_names_are_interned() {
        let mut buf = [0u8; MAX_SIZE];
        let mut w = FdtWriter::create(&mut buf).unwrap();
        let a = w.add_subnode(0, "a").unwrap();
        w.set_prop_u32(a, "reg", 1).unwrap();
        let b = w.add_subnode(0, "b").unwrap();
        let before = w.fdt().unwrap().size_dt_strings();
        w.set_prop_u32(b, "reg", 2).unwrap();
        assert_eq!(w.fdt().unwrap().size_dt_strings(), before);
        assert_eq!(before, 4);
    }

    #[test]
    fn rewrite_resizes_in_place() {
        let mut buf = [0u8; MAX_SIZE];
        let mut w = FdtWriter::create(&mut buf).unwrap();
        let node = w.add_subnode(0, "serial@3f8").unwrap();
        w.set_prop_u32(node, "current-speed", 9600).unwrap();
        w.set_prop_u32(node, "stride", 1).unwrap();
        let size = w.total_size();

        w.set_prop_u64(node, "current-speed", 115200).unwrap();
        assert_eq!(w.total_size(), size + 4);
        w.set_prop(node, "current-speed", b"").unwrap();
        assert_eq!(w.total_size(), size - 4);
        w.set_prop_u32(node, "current-speed", 115200).unwrap();
        assert_eq!(w.total_size(), size);

        let fdt = w.fdt().unwrap();
        let speed = fdt.get_property(node, "current-speed").unwrap().unwrap();
        assert_eq!(speed.u32_at(0), Some(115200));
        let stride = fdt.get_property(node, "stride").unwrap().unwrap();
        assert_eq!(stride.u32_at(0), Some(1));
        assert_eq!(fdt.properties(node).count(), 2);
    }

    #[test]
    fn duplicate_child_is_refused() {
        let mut buf = [0u8; MAX_SIZE];
        let mut w = FdtWriter::create(&mut buf).unwrap();
        w.add_subnode(0, "smbios").unwrap();
        let err = w.add_subnode(0, "smbios").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Exists);
        let err = w.add_subnode(0, "").unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidName);
    }

    #[test]
    fn failed_write_leaves_blob_untouched() {
        let mut buf = [0u8; 96];
        let mut w = FdtWriter::create(&mut buf).unwrap();
        w.add_subnode(0, "acpi").unwrap();
        let before: std::vec::Vec<u8> = w.as_bytes().to_vec();
        let err = w.set_prop(0, "filename", &[0x41; 32]).unwrap_err();
        assert!(matches!(err.error_type(), ErrorType::NoSpace { .. }));
        assert_eq!(w.as_bytes(), &before[..]);
        drop(w);
        assert!(buf[before.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_blob_with_strings_before_structure() {
        let mut buf = [0u8; MAX_SIZE];
        create_empty_tree(&mut buf).unwrap();
        // move the (empty) strings block in front of the structure block
        buf[12..16].copy_from_slice(&56u32.to_be_bytes());
        let err = FdtWriter::new(&mut buf).err().unwrap();
        assert_eq!(err.error_type(), ErrorType::BadLayout);
    }
}
