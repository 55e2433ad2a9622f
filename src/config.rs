//! Run-time knobs of the extractor.

/// Size of the region at the bottom of hand-off memory kept for the
/// payload's own use, before free memory starts.
pub const DEFAULT_UEFI_REGION_SIZE: u32 = 0x0400_0000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Bytes reserved above the bottom of the `uefi` reserved-memory node.
    pub uefi_region_size: u32,
    /// Fail the pass when a recognized node lacks a required property,
    /// instead of skipping its record.
    pub strict_required: bool,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            uefi_region_size: DEFAULT_UEFI_REGION_SIZE,
            strict_required: false,
        }
    }

    pub const fn with_uefi_region_size(mut self, size: u32) -> Self {
        self.uefi_region_size = size;
        self
    }

    pub const fn strict(mut self, strict_required: bool) -> Self {
        self.strict_required = strict_required;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
