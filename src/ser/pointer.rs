use crate::common::*;
use crate::error::{Error, Result};

/// Write cursor over a blob under construction.
///
/// Every step is checked against the end of `data`, so a write that does
/// not fit fails instead of running off the buffer.
pub struct Pointer<'se> {
    pub offset: usize,
    pub data: &'se mut [u8],
}

impl<'se> Pointer<'se> {
    pub fn new(dst: &'se mut [u8], offset: usize) -> Pointer<'se> {
        Pointer { offset, data: dst }
    }

    fn slot(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let available = self.data.len();
        let end = offset.checked_add(len).ok_or(Error::no_space(usize::MAX, available))?;
        self.data
            .get_mut(offset..end)
            .ok_or(Error::no_space(end, available))
    }

    pub fn write_to_offset_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.slot(offset, U32_LEN)?
            .copy_from_slice(&u32::to_be_bytes(value));
        Ok(())
    }

    pub fn step_by_len(&mut self, len: usize) {
        self.offset += len
    }

    pub fn step_by_u32(&mut self, value: u32) -> Result<()> {
        self.write_to_offset_u32(self.offset, value)?;
        self.step_by_len(U32_LEN);
        Ok(())
    }

    pub fn step_by_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.slot(self.offset, bytes.len())?.copy_from_slice(bytes);
        self.step_by_len(bytes.len());
        Ok(())
    }

    pub fn step_align(&mut self) -> Result<()> {
        let pad = align_up_u32(self.offset) - self.offset;
        self.slot(self.offset, pad)?.fill(0);
        self.step_by_len(pad);
        Ok(())
    }

    /// NUL-terminated node name, padded to the next token boundary.
    pub fn step_by_name(&mut self, name: &str) -> Result<()> {
        self.step_by_bytes(name.as_bytes())?;
        self.step_by_bytes(&[0])?;
        self.step_align()
    }

    /// PROP token, header and padded value.
    pub fn step_by_prop(&mut self, name_offset: u32, value: &[u8]) -> Result<()> {
        self.step_by_u32(FDT_PROP)?;
        self.step_by_u32(value.len() as u32)?;
        self.step_by_u32(name_offset)?;
        self.step_by_bytes(value)?;
        self.step_align()
    }

    /// The ten header fields, big-endian, in on-disk order.
    pub fn step_by_header(&mut self, header: &Header) -> Result<()> {
        for field in [
            header.magic,
            header.total_size,
            header.off_dt_struct,
            header.off_dt_strings,
            header.off_mem_rsvmap,
            header.version,
            header.last_comp_version,
            header.boot_cpuid_phys,
            header.size_dt_strings,
            header.size_dt_struct,
        ] {
            self.step_by_u32(field)?;
        }
        Ok(())
    }
}
