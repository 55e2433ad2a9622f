//! Property decoding for each recognized node kind.
//!
//! Scalars are stored big-endian. A property shorter than its layout counts
//! as absent: a required one skips the record, an optional one keeps its
//! default.

use super::{
    Emitter,
    record::{
        ConfigRecord, Cpu, GraphicsMode, MemoryAllocation, MemoryRegion, MemoryRegionKind,
        MemoryType, PciRootBridges, SerialPort, attribute,
    },
};
use crate::{
    error::Result,
    fdt::{Fdt, Property},
};

/// Width of the I/O port space reported with every CPU record.
const IO_SPACE_SIZE: u8 = 16;

fn decoded<'a, T: core::fmt::Debug>(
    prop: Option<Property<'a>>,
    name: &str,
    decode: impl FnOnce(&Property<'a>) -> Option<T>,
) -> Option<T> {
    let prop = prop?;
    let value = decode(&prop);
    match &value {
        Some(v) => log::trace!("  property `{}` = {:x?}", name, v),
        None => log::warn!(
            "  property `{}` has {} bytes, too short, ignored",
            name,
            prop.len()
        ),
    }
    value
}

fn u32_prop(fdt: &Fdt, node: usize, name: &str) -> Result<Option<u32>> {
    let prop = fdt.get_property(node, name)?;
    Ok(decoded(prop, name, |p| p.u32_at(0)))
}

fn u64_prop(fdt: &Fdt, node: usize, name: &str) -> Result<Option<u64>> {
    let prop = fdt.get_property(node, name)?;
    Ok(decoded(prop, name, |p| p.u64_at(0)))
}

fn reg_prop(fdt: &Fdt, node: usize) -> Result<Option<(u64, u64)>> {
    let prop = fdt.get_property(node, "reg")?;
    Ok(decoded(prop, "reg", Property::reg))
}

pub(super) fn memory(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    let name = fdt.get_name(node)?;
    let Some((start, size)) = reg_prop(fdt, node)? else {
        return out.missing(fdt, node, name, "reg");
    };
    let attributes = u32_prop(fdt, node, "attr")?.unwrap_or(attribute::DEFAULT);
    out.emit(ConfigRecord::MemoryRegion(MemoryRegion {
        start,
        size,
        attributes,
        kind: MemoryRegionKind::System,
    }))
}

pub(super) fn reserved_memory(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    for sub in fdt.subnodes(node) {
        let sub = sub?;
        let name = fdt.get_name(sub)?;
        log::debug!("   subnode {:#010x} `{}`", sub, name);
        let kind = if name.starts_with("mmio") {
            MemoryRegionKind::Mmio
        } else if name.starts_with("reserved") {
            MemoryRegionKind::Reserved
        } else {
            out.unknown_subnode(sub, name);
            continue;
        };
        let Some((start, size)) = reg_prop(fdt, sub)? else {
            out.missing(fdt, sub, name, "reg")?;
            continue;
        };
        // This node kind spells its attribute property with a capital A.
        let attributes = u32_prop(fdt, sub, "Attr")?.unwrap_or(attribute::DEFAULT);
        out.emit(ConfigRecord::MemoryRegion(MemoryRegion {
            start,
            size,
            attributes,
            kind,
        }))?;
    }
    Ok(())
}

pub(super) fn memory_allocation(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    for sub in fdt.subnodes(node) {
        let sub = sub?;
        let name = fdt.get_name(sub)?;
        log::debug!("   subnode {:#010x} `{}`", sub, name);
        let Some(memory_type) = MemoryType::from_node_name(name) else {
            out.unknown_subnode(sub, name);
            continue;
        };
        let Some((start, size)) = reg_prop(fdt, sub)? else {
            out.missing(fdt, sub, name, "reg")?;
            continue;
        };
        out.emit(ConfigRecord::MemoryAllocation(MemoryAllocation {
            start,
            size,
            memory_type,
        }))?;
    }
    Ok(())
}

pub(super) fn serial(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    let mut serial = SerialPort::default();
    if let Some(baud_rate) = u32_prop(fdt, node, "current-speed")? {
        serial.baud_rate = baud_rate;
    }
    if let Some(register_base) = u64_prop(fdt, node, "reg")? {
        serial.register_base = register_base;
    }
    if let Some(stride) = u32_prop(fdt, node, "stride")? {
        serial.register_stride = stride as u8;
    }
    if let Some(mmio) = u32_prop(fdt, node, "mmio")? {
        serial.use_mmio = mmio != 0;
    }
    out.emit(ConfigRecord::SerialPort(serial))
}

pub(super) fn graphics(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    let mut mode = GraphicsMode::default();
    // Base is always 64-bit; the size is a 64-bit value truncated to 32 bits,
    // or a single 32-bit cell in the 12-byte form.
    let reg = fdt.get_property(node, "reg")?;
    if let Some((base, size)) = decoded(reg, "reg", |p| {
        let size = if p.len() >= 16 {
            p.u64_at(1)? as u32
        } else {
            p.u32_at(2)?
        };
        Some((p.u64_at(0)?, size))
    }) {
        mode.frame_buffer_base = base;
        mode.frame_buffer_size = size;
    }
    let resolution = fdt.get_property(node, "resolution")?;
    if let Some((h, v)) = decoded(resolution, "resolution", |p| {
        Some((p.u32_at(0)?, p.u32_at(1)?))
    }) {
        mode.horizontal_resolution = h;
        mode.vertical_resolution = v;
    }
    if let Some(format) = u32_prop(fdt, node, "pixel-format")? {
        mode.pixel_format = format;
    }
    let mask = fdt.get_property(node, "pixel-mask")?;
    if let Some((r, g, b)) = decoded(mask, "pixel-mask", |p| {
        Some((p.u32_at(0)?, p.u32_at(1)?, p.u32_at(2)?))
    }) {
        mode.red_mask = r;
        mode.green_mask = g;
        mode.blue_mask = b;
    }
    // Producers spell it this way.
    if let Some(scanline) = u32_prop(fdt, node, "pixe-scanline")? {
        mode.pixels_per_scan_line = scanline;
    }
    out.emit(ConfigRecord::GraphicsMode(mode))
}

pub(super) fn cpu(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    match u32_prop(fdt, node, "memoryspace")? {
        Some(size) => out.emit(ConfigRecord::Cpu(Cpu {
            address_space_size: size as u8,
            io_space_size: IO_SPACE_SIZE,
        })),
        None => out.missing(fdt, node, "cpu-info", "memoryspace"),
    }
}

pub(super) fn acpi(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    match u64_prop(fdt, node, "rsdp")? {
        Some(rsdp) => out.emit(ConfigRecord::Acpi { rsdp }),
        None => out.missing(fdt, node, "acpi", "rsdp"),
    }
}

pub(super) fn smbios(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    match u64_prop(fdt, node, "entry")? {
        Some(entry_point) => out.emit(ConfigRecord::Smbios { entry_point }),
        None => out.missing(fdt, node, "smbios", "entry"),
    }
}

pub(super) fn pci_root_bridges(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    let mut bridges = PciRootBridges::default();
    if let Some(count) = u32_prop(fdt, node, "count")? {
        bridges.count = count as u8;
    }
    if let Some(assigned) = u32_prop(fdt, node, "ResourceAssigned")? {
        bridges.resource_assigned = assigned != 0;
    }
    out.emit(ConfigRecord::PciRootBridges(bridges))
}

pub(super) fn debug_print_error_level(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    match u32_prop(fdt, node, "errorlevel")? {
        Some(error_level) => out.emit(ConfigRecord::DebugPrintErrorLevel { error_level }),
        None => out.missing(fdt, node, "DebugPrintErrorLevel", "errorlevel"),
    }
}

pub(super) fn boot_manager_menu_file(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    let prop = fdt.get_property(node, "filename")?;
    let file_name: Option<[u8; 16]> = decoded(prop, "filename", |p| p.value.get(..16)?.try_into().ok());
    match file_name {
        Some(file_name) => out.emit(ConfigRecord::BootManagerMenuFile { file_name }),
        None => out.missing(fdt, node, "BootManagerMenuFile", "filename"),
    }
}

pub(super) fn payload_base(fdt: &Fdt, node: usize, out: &mut Emitter) -> Result<()> {
    match u64_prop(fdt, node, "entry")? {
        Some(entry) => out.emit(ConfigRecord::PayloadBase { entry }),
        None => out.missing(fdt, node, "PayloadBase", "entry"),
    }
}
