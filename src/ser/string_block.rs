/// Strings block of a blob under construction, for name lookup.
pub struct StringBlock<'se> {
    data: &'se [u8],
}

impl<'se> StringBlock<'se> {
    #[inline(always)]
    pub fn new(data: &'se [u8]) -> StringBlock<'se> {
        StringBlock { data }
    }

    /// Return (Result String, End Offset), `None` past the end or without terminator.
    #[inline(always)]
    pub fn get_str_by_offset(&self, offset: usize) -> Option<(&'se [u8], usize)> {
        let current_slice = self.data.get(offset..)?;
        let pos = current_slice.iter().position(|&x| x == b'\0')?;
        Some((&current_slice[..pos], pos + offset + 1))
    }

    /// Offset of an existing copy of `name`.
    #[inline(always)]
    pub fn find(&self, name: &str) -> Option<usize> {
        let mut current_pos = 0;
        while current_pos < self.data.len() {
            let (result, new_pos) = self.get_str_by_offset(current_pos)?;
            if result == name.as_bytes() {
                return Some(current_pos);
            }
            current_pos = new_pos;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::StringBlock;

    #[test]
    fn finds_whole_names_only() {
        let block = StringBlock::new(b"reg\0Attr\0attr\0");
        assert_eq!(block.find("reg"), Some(0));
        assert_eq!(block.find("attr"), Some(9));
        assert_eq!(block.find("Attr"), Some(4));
        assert_eq!(block.find("ttr"), None);
        assert_eq!(block.get_str_by_offset(14), None);
    }
}
