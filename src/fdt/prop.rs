use super::Fdt;
use crate::{error::Result, tag::Tag};

/// Converts the first four bytes of `bytes` from big-endian.
#[inline]
pub fn be32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(..4)?.try_into().ok()?))
}

/// Converts the first eight bytes of `bytes` from big-endian.
#[inline]
pub fn be64(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.get(..8)?.try_into().ok()?))
}

/// A property as stored in the structure block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Property<'a> {
    /// Offset of the PROP token in the structure block.
    pub offset: usize,
    /// Offset of the name in the strings block.
    pub name_offset: u32,
    /// Raw payload.
    pub value: &'a [u8],
}

impl<'a> Property<'a> {
    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The `index`-th 32-bit cell.
    #[inline]
    pub fn u32_at(&self, index: usize) -> Option<u32> {
        be32(self.value.get(index.checked_mul(4)?..)?)
    }

    /// The `index`-th 64-bit value, counted in whole 8-byte steps.
    #[inline]
    pub fn u64_at(&self, index: usize) -> Option<u64> {
        be64(self.value.get(index.checked_mul(8)?..)?)
    }

    /// A `<u64 address, u64 size>` pair, the way `reg` is laid out in hand-off trees.
    #[inline]
    pub fn reg(&self) -> Option<(u64, u64)> {
        Some((self.u64_at(0)?, self.u64_at(1)?))
    }
}

impl<'a> Fdt<'a> {
    /// Offset of the first property of the node at `node`.
    pub fn first_property_offset(&self, node: usize) -> Result<Option<usize>> {
        let next = self.check_node_offset(node)?;
        self.property_from(next)
    }

    /// Offset of the property following the one at `offset`, in the same node.
    pub fn next_property_offset(&self, offset: usize) -> Result<Option<usize>> {
        let next = self.check_prop_offset(offset)?;
        self.property_from(next)
    }

    // Properties precede child nodes; skip NOPs until something else shows up.
    fn property_from(&self, mut offset: usize) -> Result<Option<usize>> {
        loop {
            let (tag, next) = self.tag_at(offset)?;
            match tag {
                Tag::Prop(..) => return Ok(Some(offset)),
                Tag::Nop => offset = next,
                Tag::Begin(_) | Tag::End | Tag::Eof => return Ok(None),
            }
        }
    }

    /// Property at `offset`, with its name offset and payload.
    pub fn get_property_by_offset(&self, offset: usize) -> Result<Property<'a>> {
        self.check_prop_offset(offset)?;
        match self.tag_at(offset)? {
            (Tag::Prop(value, name_offset), _) => Ok(Property {
                offset,
                name_offset,
                value,
            }),
            _ => Err(crate::Error::bad_property_offset(
                offset,
                self.file_index(offset),
            )),
        }
    }

    /// Name of `prop`, read from the strings block.
    #[inline]
    pub fn property_name(&self, prop: &Property) -> Result<&'a str> {
        self.get_string(prop.name_offset)
    }

    /// Properties of the node at `node`, in blob order.
    pub fn properties(&self, node: usize) -> Properties<'a> {
        Properties {
            fdt: *self,
            state: PropertyState::Start(node),
        }
    }

    /// Property of the node at `node` whose name is exactly `name`.
    ///
    /// Only the node's own properties are searched; the comparison is
    /// case-sensitive.
    pub fn get_property(&self, node: usize, name: &str) -> Result<Option<Property<'a>>> {
        for prop in self.properties(node) {
            let prop = prop?;
            if self.property_name(&prop)? == name {
                return Ok(Some(prop));
            }
        }
        Ok(None)
    }
}

#[derive(Clone, Copy, Debug)]
enum PropertyState {
    Start(usize),
    After(usize),
    Done,
}

/// Iterator over the properties of one node.
#[derive(Clone, Debug)]
pub struct Properties<'a> {
    fdt: Fdt<'a>,
    state: PropertyState,
}

impl<'a> Iterator for Properties<'a> {
    type Item = Result<Property<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let found = match self.state {
            PropertyState::Start(node) => self.fdt.first_property_offset(node),
            PropertyState::After(prev) => self.fdt.next_property_offset(prev),
            PropertyState::Done => return None,
        };
        let found = found.and_then(|offset| {
            offset
                .map(|offset| self.fdt.get_property_by_offset(offset))
                .transpose()
        });
        match found {
            Ok(Some(prop)) => {
                self.state = PropertyState::After(prop.offset);
                Some(Ok(prop))
            }
            Ok(None) => {
                self.state = PropertyState::Done;
                None
            }
            Err(e) => {
                self.state = PropertyState::Done;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assemble, words};
    use super::{be32, be64};
    use crate::fdt::Fdt;
    use std::vec::Vec;

    // / { memory@0 { reg = <0 0x1000>; Attr = <7>; attr = <3>; }; }
    fn props_blob() -> Vec<u8> {
        let mut s = words(&[1, 0, 1]);
        s.extend_from_slice(b"memory@0\0\0\0\0");
        s.extend(words(&[3, 16, 0]));
        s.extend_from_slice(&0u64.to_be_bytes());
        s.extend_from_slice(&0x1000u64.to_be_bytes());
        s.extend(words(&[4]));
        s.extend(words(&[3, 4, 4, 7]));
        s.extend(words(&[3, 4, 9, 3]));
        s.extend(words(&[2, 2, 9]));
        assemble(&s, b"reg\0Attr\0attr\0")
    }

    #[test]
    fn big_endian_scalars() {
        assert_eq!(be32(&[0, 0, 0, 0x10]), Some(16));
        assert_eq!(be64(&[0, 0, 0, 0, 0, 0, 0x10, 0]), Some(0x1000));
        assert_eq!(be32(&[0, 0, 0x10]), None);
    }

    #[test]
    fn iterates_every_property_across_nop() {
        let raw = props_blob();
        let fdt = Fdt::from_bytes(&raw).unwrap();
        let node = fdt.first_subnode(0).unwrap().unwrap();
        let names: Vec<&str> = fdt
            .properties(node)
            .map(|p| fdt.property_name(&p.unwrap()).unwrap())
            .collect();
        assert_eq!(names, ["reg", "Attr", "attr"]);

        let first = fdt.first_property_offset(node).unwrap().unwrap();
        let second = fdt.next_property_offset(first).unwrap().unwrap();
        let prop = fdt.get_property_by_offset(second).unwrap();
        assert_eq!(prop.name_offset, 4);
        assert_eq!(prop.u32_at(0), Some(7));
        // the root has no properties of its own
        assert_eq!(fdt.first_property_offset(0).unwrap(), None);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let raw = props_blob();
        let fdt = Fdt::from_bytes(&raw).unwrap();
        let node = fdt.first_subnode(0).unwrap().unwrap();
        let lower = fdt.get_property(node, "attr").unwrap().unwrap();
        let upper = fdt.get_property(node, "Attr").unwrap().unwrap();
        assert_eq!(lower.u32_at(0), Some(3));
        assert_eq!(upper.u32_at(0), Some(7));
        assert_eq!(fdt.get_property(node, "ATTR").unwrap(), None);
        // not inherited by or from other nodes
        assert_eq!(fdt.get_property(0, "reg").unwrap(), None);
    }

    #[test]
    fn reg_pair_decodes() {
        let raw = props_blob();
        let fdt = Fdt::from_bytes(&raw).unwrap();
        let node = fdt.first_subnode(0).unwrap().unwrap();
        let reg = fdt.get_property(node, "reg").unwrap().unwrap();
        assert_eq!(reg.len(), 16);
        assert_eq!(reg.reg(), Some((0, 0x1000)));
        assert_eq!(reg.u64_at(2), None);
    }
}
