//! Configuration records handed to the next boot stage.

use serde::{Deserialize, Serialize};

/// Resource attribute bits carried by memory region records.
pub mod attribute {
    pub const PRESENT: u32 = 0x0000_0001;
    pub const INITIALIZED: u32 = 0x0000_0002;
    pub const TESTED: u32 = 0x0000_0004;
    pub const UNCACHEABLE: u32 = 0x0000_0400;
    pub const WRITE_COMBINEABLE: u32 = 0x0000_0800;
    pub const WRITE_THROUGH_CACHEABLE: u32 = 0x0000_1000;
    pub const WRITE_BACK_CACHEABLE: u32 = 0x0000_2000;

    /// Attributes of a region whose node carries none.
    pub const DEFAULT: u32 = PRESENT
        | INITIALIZED
        | TESTED
        | UNCACHEABLE
        | WRITE_COMBINEABLE
        | WRITE_THROUGH_CACHEABLE
        | WRITE_BACK_CACHEABLE;
}

/// What a memory region is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryRegionKind {
    System,
    Mmio,
    Reserved,
}

/// UEFI memory type of an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum MemoryType {
    Reserved = 0,
    LoaderCode = 1,
    LoaderData = 2,
    BootServicesCode = 3,
    BootServicesData = 4,
    RuntimeServicesCode = 5,
    RuntimeServicesData = 6,
    ConventionalMemory = 7,
    UnusableMemory = 8,
    AcpiReclaimMemory = 9,
    AcpiMemoryNvs = 10,
    MemoryMappedIo = 11,
    MemoryMappedIoPortSpace = 12,
    PalCode = 13,
    PersistentMemory = 14,
}

impl MemoryType {
    // Longer names sharing a prefix come first, so `MemoryMappedIOPortSpace`
    // is not taken for `MemoryMappedIO`.
    const NODE_PREFIXES: [(&'static str, MemoryType); 15] = [
        ("Reserved", MemoryType::Reserved),
        ("LoaderCode", MemoryType::LoaderCode),
        ("LoaderData", MemoryType::LoaderData),
        ("BootServicesCode", MemoryType::BootServicesCode),
        ("BootServicesData", MemoryType::BootServicesData),
        ("RuntimeServicesCode", MemoryType::RuntimeServicesCode),
        ("RuntimeServicesData", MemoryType::RuntimeServicesData),
        ("ConventionalMemory", MemoryType::ConventionalMemory),
        ("UnusableMemory", MemoryType::UnusableMemory),
        ("ACPIReclaimMemory", MemoryType::AcpiReclaimMemory),
        ("ACPIMemoryNVS", MemoryType::AcpiMemoryNvs),
        ("MemoryMappedIOPortSpace", MemoryType::MemoryMappedIoPortSpace),
        ("MemoryMappedIO", MemoryType::MemoryMappedIo),
        ("PalCode", MemoryType::PalCode),
        ("PersistentMemory", MemoryType::PersistentMemory),
    ];

    /// Memory type named by the start of a `memory-allocation` subnode name.
    pub fn from_node_name(name: &str) -> Option<Self> {
        Self::NODE_PREFIXES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, ty)| *ty)
    }
}

/// Well-known identifier a record store files each record under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    MemoryRegion,
    MemoryAllocation,
    SerialPort,
    GraphicsMode,
    Cpu,
    Acpi,
    Smbios,
    PciRootBridges,
    DebugPrintErrorLevel,
    BootManagerMenuFile,
    PayloadBase,
}

/// A resource descriptor for a memory range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    pub start: u64,
    pub size: u64,
    pub attributes: u32,
    pub kind: MemoryRegionKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryAllocation {
    pub start: u64,
    pub size: u64,
    pub memory_type: MemoryType,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPort {
    pub register_base: u64,
    pub baud_rate: u32,
    pub register_stride: u8,
    pub use_mmio: bool,
}

/// Frame buffer and mode of the boot graphics device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphicsMode {
    pub frame_buffer_base: u64,
    pub frame_buffer_size: u32,
    pub horizontal_resolution: u32,
    pub vertical_resolution: u32,
    pub pixel_format: u32,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
    pub pixels_per_scan_line: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    /// Width of the physical memory address space, in bits.
    pub address_space_size: u8,
    /// Width of the I/O port space, in bits.
    pub io_space_size: u8,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciRootBridges {
    pub count: u8,
    pub resource_assigned: bool,
}

/// One record produced from the hand-off tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigRecord {
    MemoryRegion(MemoryRegion),
    MemoryAllocation(MemoryAllocation),
    SerialPort(SerialPort),
    GraphicsMode(GraphicsMode),
    Cpu(Cpu),
    Acpi { rsdp: u64 },
    Smbios { entry_point: u64 },
    PciRootBridges(PciRootBridges),
    DebugPrintErrorLevel { error_level: u32 },
    BootManagerMenuFile { file_name: [u8; 16] },
    PayloadBase { entry: u64 },
}

impl ConfigRecord {
    pub const fn kind(&self) -> RecordKind {
        match self {
            ConfigRecord::MemoryRegion(_) => RecordKind::MemoryRegion,
            ConfigRecord::MemoryAllocation(_) => RecordKind::MemoryAllocation,
            ConfigRecord::SerialPort(_) => RecordKind::SerialPort,
            ConfigRecord::GraphicsMode(_) => RecordKind::GraphicsMode,
            ConfigRecord::Cpu(_) => RecordKind::Cpu,
            ConfigRecord::Acpi { .. } => RecordKind::Acpi,
            ConfigRecord::Smbios { .. } => RecordKind::Smbios,
            ConfigRecord::PciRootBridges(_) => RecordKind::PciRootBridges,
            ConfigRecord::DebugPrintErrorLevel { .. } => RecordKind::DebugPrintErrorLevel,
            ConfigRecord::BootManagerMenuFile { .. } => RecordKind::BootManagerMenuFile,
            ConfigRecord::PayloadBase { .. } => RecordKind::PayloadBase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigRecord, Cpu, MemoryAllocation, MemoryRegion, MemoryRegionKind, MemoryType,
        attribute,
    };

    #[test]
    fn default_attributes() {
        assert_eq!(attribute::DEFAULT, 0x3c07);
    }

    #[test]
    fn memory_type_by_prefix() {
        assert_eq!(
            MemoryType::from_node_name("BootServicesData@7f000000"),
            Some(MemoryType::BootServicesData)
        );
        assert_eq!(
            MemoryType::from_node_name("MemoryMappedIOPortSpace@0"),
            Some(MemoryType::MemoryMappedIoPortSpace)
        );
        assert_eq!(
            MemoryType::from_node_name("MemoryMappedIO@fe000000"),
            Some(MemoryType::MemoryMappedIo)
        );
        assert_eq!(MemoryType::from_node_name("reserved@0"), None);
        assert_eq!(MemoryType::PersistentMemory as u32, 14);
    }

    #[test]
    fn records_round_trip_through_serde() {
        let records = [
            ConfigRecord::MemoryRegion(MemoryRegion {
                start: 0x8000_0000,
                size: 0x4000_0000,
                attributes: attribute::DEFAULT,
                kind: MemoryRegionKind::Reserved,
            }),
            ConfigRecord::MemoryAllocation(MemoryAllocation {
                start: 0x7f00_0000,
                size: 0x10_0000,
                memory_type: MemoryType::AcpiMemoryNvs,
            }),
            ConfigRecord::Cpu(Cpu {
                address_space_size: 39,
                io_space_size: 16,
            }),
            ConfigRecord::BootManagerMenuFile {
                file_name: *b"BootMenuApp.efi\0",
            },
        ];
        let text = serde_json::to_string(&records).unwrap();
        let back: std::vec::Vec<ConfigRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, records);

        let value = serde_json::to_value(ConfigRecord::Acpi { rsdp: 0xe0000 }).unwrap();
        assert_eq!(value, serde_json::json!({ "Acpi": { "rsdp": 0xe0000 } }));
    }
}
