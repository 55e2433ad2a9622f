use super::Fdt;
use crate::{error::Result, tag::Tag};

impl<'a> Fdt<'a> {
    /// Offset and depth of the root node, where a whole-tree walk begins.
    pub fn first_node(&self) -> Result<(usize, i32)> {
        self.check_node_offset(0)?;
        Ok((0, 0))
    }

    /// Next node in preorder after the node at `offset`.
    ///
    /// `depth` is the depth of the node at `offset`; the returned depth is one
    /// more when the walk goes down into a child and less when it climbs back
    /// out of finished subtrees. Returns `None` once the walk would climb above
    /// depth 0, or when the token stream ends at depth 0.
    pub fn next_node(&self, offset: usize, depth: i32) -> Result<Option<(usize, i32)>> {
        let mut next = self.check_node_offset(offset)?;
        let mut depth = depth;
        loop {
            let this = next;
            let (tag, after) = self.tag_at(this)?;
            next = after;
            match tag {
                Tag::Begin(_) => return Ok(Some((this, depth + 1))),
                Tag::End => {
                    depth -= 1;
                    if depth < 0 {
                        return Ok(None);
                    }
                }
                Tag::Prop(..) | Tag::Nop => {}
                Tag::Eof if depth == 0 => return Ok(None),
                Tag::Eof => {
                    return Err(crate::Error::tag_eof_unexpected(
                        this as u32,
                        self.size_dt_struct() as u32,
                        self.file_index(this),
                    ));
                }
            }
        }
    }

    /// First immediate child of the node at `parent`.
    pub fn first_subnode(&self, parent: usize) -> Result<Option<usize>> {
        match self.next_node(parent, 0)? {
            Some((offset, 1)) => Ok(Some(offset)),
            _ => Ok(None),
        }
    }

    /// Next sibling of the node at `offset`.
    pub fn next_subnode(&self, offset: usize) -> Result<Option<usize>> {
        let mut cur = offset;
        let mut depth = 1;
        loop {
            match self.next_node(cur, depth)? {
                Some((next, 1)) => return Ok(Some(next)),
                Some((next, d)) if d > 1 => {
                    cur = next;
                    depth = d;
                }
                _ => return Ok(None),
            }
        }
    }

    /// Immediate children of the node at `parent`, in blob order.
    pub fn subnodes(&self, parent: usize) -> Subnodes<'a> {
        Subnodes {
            fdt: *self,
            state: SubnodeState::Start(parent),
        }
    }

    /// Finds a child of `parent` by the first `match_len` bytes of `name`.
    ///
    /// A child matches when its name is exactly those bytes, or, if they hold
    /// no unit address, those bytes followed by `@` and any unit address.
    pub fn subnode_offset_namelen(
        &self,
        parent: usize,
        name: &str,
        match_len: usize,
    ) -> Result<Option<usize>> {
        let wanted = &name.as_bytes()[..match_len.min(name.len())];
        for child in self.subnodes(parent) {
            let child = child?;
            if node_name_eq(self.get_name(child)?.as_bytes(), wanted) {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// First node after `start` in traversal order whose `property_name`
    /// property holds exactly `value`; the root is included when `start` is
    /// `None`.
    pub fn node_offset_by_prop_value(
        &self,
        start: Option<usize>,
        property_name: &str,
        value: &[u8],
    ) -> Result<Option<usize>> {
        let mut cur = Some(self.first_node()?);
        while let Some((offset, depth)) = cur {
            if start.is_none_or(|start| offset > start) {
                if let Some(prop) = self.get_property(offset, property_name)? {
                    if prop.value == value {
                        return Ok(Some(offset));
                    }
                }
            }
            cur = self.next_node(offset, depth)?;
        }
        Ok(None)
    }

    /// Offset of the END_NODE token closing the node at `offset`.
    pub(crate) fn node_end_offset(&self, offset: usize) -> Result<usize> {
        let mut next = self.check_node_offset(offset)?;
        let mut level = 1;
        loop {
            let this = next;
            let (tag, after) = self.tag_at(this)?;
            next = after;
            match tag {
                Tag::Begin(_) => level += 1,
                Tag::End => {
                    level -= 1;
                    if level == 0 {
                        return Ok(this);
                    }
                }
                Tag::Prop(..) | Tag::Nop => {}
                Tag::Eof => {
                    return Err(crate::Error::tag_eof_unexpected(
                        this as u32,
                        self.size_dt_struct() as u32,
                        self.file_index(this),
                    ));
                }
            }
        }
    }
}

fn node_name_eq(candidate: &[u8], wanted: &[u8]) -> bool {
    match candidate.strip_prefix(wanted) {
        Some([]) => true,
        Some([b'@', ..]) => !wanted.contains(&b'@'),
        _ => false,
    }
}

#[derive(Clone, Copy, Debug)]
enum SubnodeState {
    Start(usize),
    After(usize),
    Done,
}

/// Iterator over the immediate children of a node.
#[derive(Clone, Debug)]
pub struct Subnodes<'a> {
    fdt: Fdt<'a>,
    state: SubnodeState,
}

impl Iterator for Subnodes<'_> {
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let found = match self.state {
            SubnodeState::Start(parent) => self.fdt.first_subnode(parent),
            SubnodeState::After(prev) => self.fdt.next_subnode(prev),
            SubnodeState::Done => return None,
        };
        match found {
            Ok(Some(offset)) => {
                self.state = SubnodeState::After(offset);
                Some(Ok(offset))
            }
            Ok(None) => {
                self.state = SubnodeState::Done;
                None
            }
            Err(e) => {
                self.state = SubnodeState::Done;
                Some(Err(e))
            }
        }
    }
}
