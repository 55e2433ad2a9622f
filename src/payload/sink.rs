use super::record::ConfigRecord;
use crate::error::Result;

/// Receives finished records, in the order they are produced.
///
/// The record store behind it decides how records are kept; the extractor
/// never reads a record back once emitted. A store that runs out of room
/// returns [`Error::out_of_resources`](crate::Error::out_of_resources),
/// which ends the pass.
pub trait RecordSink {
    fn emit(&mut self, record: ConfigRecord) -> Result<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    #[inline]
    fn emit(&mut self, record: ConfigRecord) -> Result<()> {
        (**self).emit(record)
    }
}

#[cfg(feature = "alloc")]
impl RecordSink for alloc::vec::Vec<ConfigRecord> {
    #[inline]
    fn emit(&mut self, record: ConfigRecord) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

/// A fixed-capacity store for heap-less callers.
#[derive(Debug)]
pub struct ArraySink<const N: usize> {
    records: [Option<ConfigRecord>; N],
    len: usize,
}

impl<const N: usize> ArraySink<N> {
    pub const fn new() -> Self {
        ArraySink {
            records: [None; N],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigRecord> {
        self.records[..self.len].iter().flatten()
    }
}

impl<const N: usize> Default for ArraySink<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RecordSink for ArraySink<N> {
    fn emit(&mut self, record: ConfigRecord) -> Result<()> {
        let slot = self
            .records
            .get_mut(self.len)
            .ok_or(crate::Error::out_of_resources())?;
        *slot = Some(record);
        self.len += 1;
        Ok(())
    }
}
