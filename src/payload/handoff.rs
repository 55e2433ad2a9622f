use super::{ParseSummary, RecordSink, parse_dtb};
use crate::{Config, error::Result, fdt::Fdt};

const SIZE_1MB: u64 = 0x10_0000;

/// Memory the payload builds its own record list in, taken from the
/// `/reserved-memory/uefi` node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandoffRegion {
    pub memory_bottom: u64,
    pub memory_top: u64,
    pub free_memory_bottom: u64,
    pub free_memory_top: u64,
}

/// Result of [`init_from_fdt`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Handoff {
    pub region: Option<HandoffRegion>,
    pub summary: ParseSummary,
}

/// Looks up `/reserved-memory/uefi` and derives the hand-off region from its `reg`.
///
/// The first `uefi_region_size` bytes stay reserved; free memory starts at
/// the next 1 MiB boundary above them and runs to the end of the node's range.
pub fn find_handoff_region(fdt: &Fdt, config: &Config) -> Result<Option<HandoffRegion>> {
    let Some(reserved) = fdt.subnode_offset_namelen(0, "reserved-memory", 15)? else {
        return Ok(None);
    };
    let Some(uefi) = fdt.subnode_offset_namelen(reserved, "uefi", 4)? else {
        return Ok(None);
    };
    let Some((start, size)) = fdt.get_property(uefi, "reg")?.and_then(|p| p.reg()) else {
        log::warn!("uefi memory node at {:#x} has no usable reg", uefi);
        return Ok(None);
    };
    log::debug!("found uefi memory node ({:#010x}) reg {:#018x} {:#018x}", uefi, start, size);

    let region = start.checked_add(size).and_then(|memory_top| {
        let free_memory_bottom = start
            .checked_add(config.uefi_region_size as u64)?
            .checked_next_multiple_of(SIZE_1MB)?;
        Some(HandoffRegion {
            memory_bottom: start,
            memory_top,
            free_memory_bottom,
            free_memory_top: memory_top,
        })
    });
    match region {
        Some(region) if region.free_memory_bottom <= region.free_memory_top => Ok(Some(region)),
        _ => {
            log::warn!(
                "uefi memory {:#x}+{:#x} cannot hold a {:#x} byte region",
                start,
                size,
                config.uefi_region_size
            );
            Ok(None)
        }
    }
}

/// Opens `data`, finds the hand-off region and extracts every record into `sink`.
pub fn init_from_fdt(data: &[u8], config: &Config, sink: &mut dyn RecordSink) -> Result<Handoff> {
    let fdt = Fdt::from_bytes(data)?;
    let header = fdt.header();
    log::debug!("fdt magic {:#010x}", header.magic);
    log::debug!("fdt total size {:#x}", header.total_size);
    log::debug!("fdt version {} (compatible {})", header.version, header.last_comp_version);
    log::debug!(
        "fdt structure {:#x}+{:#x}, strings {:#x}+{:#x}, reservation map {:#x}",
        header.off_dt_struct,
        header.size_dt_struct,
        header.off_dt_strings,
        header.size_dt_strings,
        header.off_mem_rsvmap
    );
    let region = find_handoff_region(&fdt, config)?;
    let summary = parse_dtb(&fdt, config, sink)?;
    Ok(Handoff { region, summary })
}
