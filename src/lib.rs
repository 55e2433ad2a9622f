// Copyright (c) 2021 HUST IoT Security Lab
// serde_device_tree is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! This library reads flattened device tree blobs handed over by an earlier
//! boot stage and turns the nodes it recognizes into boot hand-off records.
//!
//! The reader in [`fdt`] works on a borrowed byte slice without alloc. The
//! extractor in [`payload`] walks the tree once and emits one
//! [`ConfigRecord`] per recognized node into a caller-provided
//! [`RecordSink`]. A small writer in [`ser`] builds blobs in place.
//!
//! ```
//! use upl_fdt::{Config, ConfigRecord, Fdt, parse_dtb, ser::FdtWriter};
//!
//! let mut buf = [0u8; 256];
//! let mut writer = FdtWriter::create(&mut buf).unwrap();
//! let acpi = writer.add_subnode(0, "acpi").unwrap();
//! writer.set_prop_u64(acpi, "rsdp", 0x7fe0_0000).unwrap();
//! drop(writer);
//!
//! let fdt = Fdt::from_bytes(&buf).unwrap();
//! let mut records = Vec::new();
//! parse_dtb(&fdt, &Config::default(), &mut records).unwrap();
//! assert_eq!(records, [ConfigRecord::Acpi { rsdp: 0x7fe0_0000 }]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod config;
pub mod error;
pub mod fdt;
pub mod payload;
#[cfg(feature = "ser")]
pub mod ser;
pub mod tag;

mod common;

pub use common::Header;

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use error::{Error, ErrorType, Result};

#[doc(inline)]
pub use fdt::{Fdt, Property};

#[doc(inline)]
pub use payload::{ConfigRecord, RecordSink, init_from_fdt, parse_dtb};
