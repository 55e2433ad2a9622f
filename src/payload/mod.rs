//! Extracts boot hand-off records from a device tree.
//!
//! A previous boot stage describes memory, consoles, firmware tables and the
//! like as direct children of the root node. [`parse_dtb`] walks the tree
//! once, picks every such node whose name it recognizes, decodes its
//! properties and hands the resulting [`ConfigRecord`]s to a [`RecordSink`].
//! Nodes it does not know are passed over, so newer producers can add
//! nodes without breaking older payloads.

mod decode;
mod handoff;
mod record;
mod sink;

pub use handoff::{Handoff, HandoffRegion, find_handoff_region, init_from_fdt};
pub use record::{
    ConfigRecord, Cpu, GraphicsMode, MemoryAllocation, MemoryRegion, MemoryRegionKind,
    MemoryType, PciRootBridges, RecordKind, SerialPort, attribute,
};
pub use sink::{ArraySink, RecordSink};

use crate::{Config, error::Result, fdt::Fdt};

/// How a node name is compared against a category pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameMatch {
    Exact(&'static str),
    /// The pattern, then any suffix such as a unit address.
    Prefix(&'static str),
}

impl NameMatch {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NameMatch::Exact(pattern) => name == *pattern,
            NameMatch::Prefix(pattern) => name.starts_with(pattern),
        }
    }
}

type Decode = for<'a> fn(&Fdt<'a>, usize, &mut Emitter<'_>) -> Result<()>;

/// One recognized kind of top-level node.
pub(crate) struct Category {
    pub name: NameMatch,
    pub kind: RecordKind,
    decode: Decode,
}

pub(crate) const CATEGORIES: &[Category] = &[
    Category {
        name: NameMatch::Prefix("memory@"),
        kind: RecordKind::MemoryRegion,
        decode: decode::memory,
    },
    Category {
        name: NameMatch::Exact("reserved-memory"),
        kind: RecordKind::MemoryRegion,
        decode: decode::reserved_memory,
    },
    Category {
        name: NameMatch::Exact("memory-allocation"),
        kind: RecordKind::MemoryAllocation,
        decode: decode::memory_allocation,
    },
    Category {
        name: NameMatch::Prefix("serial@"),
        kind: RecordKind::SerialPort,
        decode: decode::serial,
    },
    Category {
        name: NameMatch::Exact("graphic-info"),
        kind: RecordKind::GraphicsMode,
        decode: decode::graphics,
    },
    Category {
        name: NameMatch::Exact("cpu-info"),
        kind: RecordKind::Cpu,
        decode: decode::cpu,
    },
    Category {
        name: NameMatch::Exact("acpi"),
        kind: RecordKind::Acpi,
        decode: decode::acpi,
    },
    Category {
        name: NameMatch::Exact("smbios"),
        kind: RecordKind::Smbios,
        decode: decode::smbios,
    },
    Category {
        name: NameMatch::Exact("pcirbinfo"),
        kind: RecordKind::PciRootBridges,
        decode: decode::pci_root_bridges,
    },
    Category {
        name: NameMatch::Exact("DebugPrintErrorLevel"),
        kind: RecordKind::DebugPrintErrorLevel,
        decode: decode::debug_print_error_level,
    },
    Category {
        name: NameMatch::Exact("BootManagerMenuFile"),
        kind: RecordKind::BootManagerMenuFile,
        decode: decode::boot_manager_menu_file,
    },
    Category {
        name: NameMatch::Exact("PayloadBase"),
        kind: RecordKind::PayloadBase,
        decode: decode::payload_base,
    },
];

fn category_of(name: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.name.matches(name))
}

/// Kind of record a top-level node named `name` produces, if any.
pub fn classify(name: &str) -> Option<RecordKind> {
    category_of(name).map(|c| c.kind)
}

/// Counters of one extraction pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Top-level nodes looked at.
    pub nodes_visited: usize,
    /// Records handed to the sink.
    pub records_emitted: usize,
    /// Records left out for a missing property or an unknown subnode kind.
    pub records_skipped: usize,
}

/// Decoder side of a pass: forwards records and keeps the counters.
pub(crate) struct Emitter<'s> {
    sink: &'s mut dyn RecordSink,
    config: Config,
    summary: ParseSummary,
}

impl Emitter<'_> {
    pub(crate) fn emit(&mut self, record: ConfigRecord) -> Result<()> {
        log::debug!("emit {:?}", record);
        self.sink.emit(record)?;
        self.summary.records_emitted += 1;
        Ok(())
    }

    /// A required property is absent or too short.
    pub(crate) fn missing(
        &mut self,
        fdt: &Fdt,
        node: usize,
        node_name: &str,
        property: &'static str,
    ) -> Result<()> {
        if self.config.strict_required {
            return Err(crate::Error::missing_property(
                property,
                fdt.file_index(node),
            ));
        }
        log::warn!(
            "node `{}` at {:#x}: required property `{}` missing, record skipped",
            node_name,
            node,
            property
        );
        self.summary.records_skipped += 1;
        Ok(())
    }

    /// A subnode whose name selects no record kind.
    pub(crate) fn unknown_subnode(&mut self, node: usize, node_name: &str) {
        log::debug!("subnode `{}` at {:#x} not recognized", node_name, node);
        self.summary.records_skipped += 1;
    }
}

/// Walks `fdt` once and emits a record for every recognized top-level node.
///
/// Any malformed part of the blob aborts the pass with an error; records
/// emitted before that point must not be trusted by the caller.
pub fn parse_dtb(fdt: &Fdt, config: &Config, sink: &mut dyn RecordSink) -> Result<ParseSummary> {
    let mut emitter = Emitter {
        sink,
        config: *config,
        summary: ParseSummary::default(),
    };
    log::info!("start parsing device tree, {:#x} bytes", fdt.total_size());
    let mut cur = fdt.next_node(0, 0)?;
    while let Some((node, depth)) = cur {
        if depth == 1 {
            let name = fdt.get_name(node)?;
            log::debug!("node {:#010x} `{}` depth {}", node, name, depth);
            emitter.summary.nodes_visited += 1;
            match category_of(name) {
                Some(category) => (category.decode)(fdt, node, &mut emitter)?,
                None => log::debug!("node `{}` not recognized, skipped", name),
            }
        }
        cur = fdt.next_node(node, depth)?;
    }
    log::info!(
        "device tree parsed: {} nodes, {} records, {} skipped",
        emitter.summary.nodes_visited,
        emitter.summary.records_emitted,
        emitter.summary.records_skipped
    );
    Ok(emitter.summary)
}

#[cfg(test)]
mod tests {
    use super::{NameMatch, RecordKind, classify};

    #[test]
    fn prefix_categories_ignore_suffix() {
        assert_eq!(classify("memory@0"), Some(RecordKind::MemoryRegion));
        assert_eq!(classify("memory@deadbeef"), Some(RecordKind::MemoryRegion));
        assert_eq!(classify("serial@3f8"), Some(RecordKind::SerialPort));
    }

    #[test]
    fn exact_categories_need_whole_name() {
        assert_eq!(classify("memory"), None);
        assert_eq!(classify("memory-allocation"), Some(RecordKind::MemoryAllocation));
        assert_eq!(classify("acpi@0"), None);
        assert_eq!(classify("ACPI"), None);
        assert_eq!(classify("PayloadBase"), Some(RecordKind::PayloadBase));
        assert_eq!(classify("vendor-ext"), None);
    }

    #[test]
    fn name_match_kinds() {
        assert!(NameMatch::Exact("acpi").matches("acpi"));
        assert!(!NameMatch::Exact("acpi").matches("acpi2"));
        assert!(NameMatch::Prefix("serial@").matches("serial@"));
        assert!(!NameMatch::Prefix("serial@").matches("serial"));
    }
}
