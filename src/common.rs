use crate::error::Error;

/// Device tree blob header, with every field already converted to native order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub total_size: u32,
    pub off_dt_struct: u32,
    pub off_dt_strings: u32,
    pub off_mem_rsvmap: u32,
    pub version: u32,
    pub last_comp_version: u32,
    pub boot_cpuid_phys: u32,
    pub size_dt_strings: u32,
    /// Derived from the block offsets for version 16 blobs.
    pub size_dt_struct: u32,
}

pub(crate) const DEVICE_TREE_MAGIC: u32 = 0xD00DFEED;
pub(crate) const U32_LEN: usize = core::mem::size_of::<u32>();

pub(crate) const HEADER_LEN: u32 = 10 * U32_LEN as u32;
/// Version 16 headers end before `size_dt_struct`.
pub(crate) const HEADER_LEN_V16: u32 = 9 * U32_LEN as u32;
/// First version whose header carries `size_dt_struct`.
pub(crate) const STRUCT_SIZE_VERSION: u32 = 17;
pub(crate) const FDT_BEGIN_NODE: u32 = 0x1;
pub(crate) const FDT_END_NODE: u32 = 0x2;
pub(crate) const FDT_PROP: u32 = 0x3;
pub(crate) const FDT_NOP: u32 = 0x4;
pub(crate) const FDT_END: u32 = 0x9;
pub(crate) const SUPPORTED_VERSION: u32 = 17;
pub(crate) const MINIMUM_VERSION: u32 = 16;
pub(crate) const LAST_COMP_VERSION: u32 = 16;
/// One (address, size) pair of the memory reservation map.
pub(crate) const RSVMAP_ENTRY_LEN: u32 = 16;

// Byte offsets of header fields, in on-disk order.
pub(crate) const OFF_TOTAL_SIZE: usize = 4;
pub(crate) const OFF_DT_STRUCT: usize = 8;
pub(crate) const OFF_DT_STRINGS: usize = 12;
pub(crate) const OFF_MEM_RSVMAP: usize = 16;
pub(crate) const OFF_VERSION: usize = 20;
pub(crate) const OFF_LAST_COMP_VERSION: usize = 24;
pub(crate) const OFF_SIZE_DT_STRINGS: usize = 32;
pub(crate) const OFF_SIZE_DT_STRUCT: usize = 36;

#[inline]
pub(crate) const fn align_up_u32(val: usize) -> usize {
    val + (4 - (val % 4)) % 4
}

/// Reads a big-endian `u32` at `offset`, `None` if it would run past `data`.
#[inline]
pub(crate) fn read_be_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(U32_LEN)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

impl Header {
    /// Reads the header fields from the start of `data`.
    ///
    /// Version 16 headers have no `size_dt_struct`; the structure block is
    /// then taken to run up to the strings block, or to the end of the blob
    /// when the strings block comes first.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        let field = |index: usize, at_least: u32| {
            read_be_u32(data, index * U32_LEN)
                .ok_or(Error::header_too_short(data.len() as u32, at_least, 0))
        };
        let mut header = Header {
            magic: field(0, HEADER_LEN_V16)?,
            total_size: field(1, HEADER_LEN_V16)?,
            off_dt_struct: field(2, HEADER_LEN_V16)?,
            off_dt_strings: field(3, HEADER_LEN_V16)?,
            off_mem_rsvmap: field(4, HEADER_LEN_V16)?,
            version: field(5, HEADER_LEN_V16)?,
            last_comp_version: field(6, HEADER_LEN_V16)?,
            boot_cpuid_phys: field(7, HEADER_LEN_V16)?,
            size_dt_strings: field(8, HEADER_LEN_V16)?,
            size_dt_struct: 0,
        };
        header.size_dt_struct = if header.version >= STRUCT_SIZE_VERSION {
            field(9, HEADER_LEN)?
        } else if header.off_dt_strings > header.off_dt_struct {
            header.off_dt_strings - header.off_dt_struct
        } else {
            header.total_size.saturating_sub(header.off_dt_struct)
        };
        Ok(header)
    }

    /// Length of the header for this blob's version.
    #[inline]
    pub fn header_len(&self) -> u32 {
        if self.version >= STRUCT_SIZE_VERSION {
            HEADER_LEN
        } else {
            HEADER_LEN_V16
        }
    }

    /// Checks magic, versions and that every block lies within the blob.
    pub fn verify(&self, buffer_length: usize) -> Result<(), Error> {
        // ---
        if self.magic != DEVICE_TREE_MAGIC {
            return Err(Error::invalid_magic(self.magic));
        }
        // ---
        if self.version < MINIMUM_VERSION {
            return Err(Error::unsupported_version(
                self.version,
                MINIMUM_VERSION,
                OFF_VERSION,
            ));
        }
        if self.last_comp_version > SUPPORTED_VERSION {
            return Err(Error::incompatible_version(
                self.last_comp_version,
                SUPPORTED_VERSION,
                OFF_LAST_COMP_VERSION,
            ));
        }
        // ---
        let header_len = self.header_len();
        let total_size = self.total_size;
        if total_size < header_len {
            return Err(Error::header_too_short(
                total_size,
                header_len,
                OFF_TOTAL_SIZE,
            ));
        }
        if total_size as usize > buffer_length {
            return Err(Error::buffer_too_short(total_size, buffer_length));
        }
        // ---
        if self.off_dt_struct < header_len {
            return Err(Error::structure_index_underflow(
                self.off_dt_struct,
                header_len,
                OFF_DT_STRUCT,
            ));
        }
        match self.off_dt_struct.checked_add(self.size_dt_struct) {
            Some(end) if end <= total_size => {}
            _ => {
                return Err(Error::structure_index_overflow(
                    self.off_dt_struct.saturating_add(self.size_dt_struct),
                    total_size,
                    OFF_SIZE_DT_STRUCT,
                ));
            }
        }
        // ---
        if self.off_dt_strings < header_len {
            return Err(Error::string_index_underflow(
                self.off_dt_strings,
                header_len,
                OFF_DT_STRINGS,
            ));
        }
        match self.off_dt_strings.checked_add(self.size_dt_strings) {
            Some(end) if end <= total_size => {}
            _ => {
                return Err(Error::string_index_overflow(
                    self.off_dt_strings.saturating_add(self.size_dt_strings),
                    total_size,
                    OFF_SIZE_DT_STRINGS,
                ));
            }
        }
        // ---
        if self.off_mem_rsvmap < header_len || self.off_mem_rsvmap >= total_size {
            return Err(Error::structure_index_overflow(
                self.off_mem_rsvmap,
                total_size,
                OFF_MEM_RSVMAP,
            ));
        }
        Ok(())
    }
}
