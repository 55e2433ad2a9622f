use crate::common::{FDT_BEGIN_NODE, FDT_END, FDT_END_NODE, FDT_NOP, FDT_PROP, U32_LEN, align_up_u32};
use crate::error::{Error, Result};

/// Token reader over the structure block.
///
/// `cur` is a byte offset into the structure block; `offset_from_file_begin`
/// only serves to report error positions relative to the blob start.
#[derive(Debug, Clone)]
pub struct Tags<'a> {
    pub(crate) structure: &'a [u8],
    pub(crate) cur: usize,
    pub(crate) offset_from_file_begin: usize,
    done: bool,
}

impl<'a> Tags<'a> {
    pub(crate) fn new(structure: &'a [u8], cur: usize, offset_from_file_begin: usize) -> Self {
        Tags {
            structure,
            cur,
            offset_from_file_begin,
            done: false,
        }
    }

    #[inline]
    fn file_index(&self) -> usize {
        self.cur.saturating_add(self.offset_from_file_begin)
    }
    #[inline]
    fn read_cur_u32(&mut self) -> Result<u32> {
        match crate::common::read_be_u32(self.structure, self.cur) {
            Some(ans) => {
                self.cur += U32_LEN;
                Ok(ans)
            }
            None => Err(Error::tag_eof_unexpected(
                self.cur as u32,
                self.structure.len() as u32,
                self.file_index(),
            )),
        }
    }
    #[inline]
    fn read_string0_align(&mut self) -> Result<&'a [u8]> {
        let begin = self.cur;
        while self.cur < self.structure.len() {
            if self.structure[self.cur] == b'\0' {
                let end = self.cur;
                self.cur = align_up_u32(end + 1);
                return Ok(&self.structure[begin..end]);
            }
            self.cur += 1;
        }
        Err(Error::string_eof_unpexpected(self.file_index()))
    }
    #[inline]
    fn read_slice_align(&mut self, len: u32) -> Result<&'a [u8]> {
        let begin = self.cur;
        let remaining_length = self.structure.len().saturating_sub(begin) as u32;
        if len > remaining_length {
            return Err(Error::slice_eof_unpexpected(
                len,
                remaining_length,
                self.file_index(),
            ));
        }
        let end = begin + len as usize;
        self.cur = align_up_u32(end);
        Ok(&self.structure[begin..end])
    }

    /// Reads the token at the cursor and moves past it, including its payload.
    pub fn read_tag(&mut self) -> Result<Tag<'a>> {
        if self.cur % U32_LEN != 0 {
            return Err(Error::bad_node_offset(self.cur, self.file_index()));
        }
        let tag_index = self.file_index();
        match self.read_cur_u32()? {
            FDT_BEGIN_NODE => self.read_string0_align().map(Tag::Begin),
            FDT_PROP => {
                let val_size = self.read_cur_u32()?;
                let name_offset = self.read_cur_u32()?;
                let val = self.read_slice_align(val_size)?;
                Ok(Tag::Prop(val, name_offset))
            }
            FDT_END_NODE => Ok(Tag::End),
            FDT_NOP => Ok(Tag::Nop),
            FDT_END => Ok(Tag::Eof),
            invalid => Err(Error::invalid_tag_id(invalid, tag_index)),
        }
    }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Result<(Tag<'a>, usize)>; // Tag, byte index from structure block begin
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let begin = self.cur;
        match self.read_tag() {
            Ok(Tag::Eof) => {
                self.done = true;
                None
            }
            Ok(tag) => Some(Ok((tag, begin))),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// One token of the structure block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag<'a> {
    /// Node begin, with the inline name.
    Begin(&'a [u8]),
    /// Property value and the offset of its name in the strings block.
    Prop(&'a [u8], u32),
    End,
    Nop,
    Eof,
}

#[cfg(test)]
mod tests {
    use super::{Tag, Tags};
    use crate::error::ErrorType;

    fn be(words: &[u32]) -> std::vec::Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn reads_node_and_property_tokens() {
        let mut raw = be(&[1]);
        raw.extend_from_slice(b"cpu@0\0\0\0");
        raw.extend(be(&[3, 2, 0]));
        raw.extend_from_slice(&[0xab, 0xcd, 0, 0]);
        raw.extend(be(&[4, 2, 9]));

        let tags: std::vec::Vec<_> = Tags::new(&raw, 0, 0).map(|t| t.unwrap()).collect();
        assert_eq!(
            tags,
            [
                (Tag::Begin(b"cpu@0"), 0),
                (Tag::Prop(&[0xab, 0xcd], 0), 12),
                (Tag::Nop, 28),
                (Tag::End, 32),
            ]
        );
    }

    #[test]
    fn oversized_property_is_an_error() {
        let raw = be(&[3, 0x100, 0, 9]);
        let err = Tags::new(&raw, 0, 0x38).read_tag().unwrap_err();
        assert!(matches!(
            err.error_type(),
            ErrorType::SliceEofUnexpected {
                expected_length: 0x100,
                remaining_length: 4
            }
        ));
    }

    #[test]
    fn unknown_token_is_reported_at_its_index() {
        let raw = be(&[7]);
        let err = Tags::new(&raw, 0, 0x38).read_tag().unwrap_err();
        assert_eq!(err.error_type(), ErrorType::InvalidTagId { wrong_id: 7 });
        assert_eq!(err.file_index(), 0x38);
    }

    #[test]
    fn truncated_stream_stops_iteration() {
        let raw = [0u8, 0, 0];
        let mut tags = Tags::new(&raw, 0, 0);
        assert!(tags.next().unwrap().is_err());
        assert!(tags.next().is_none());
    }
}
