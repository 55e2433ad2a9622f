// Copyright (c) 2021 HUST IoT Security Lab
// serde_device_tree is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! When reading, extracting from or writing a device tree goes wrong.

use core::fmt;

/// Represents all possible errors that can occur when reading or writing device tree blobs.
#[derive(Clone, Debug)]
pub enum Error {
    Typed {
        error_type: ErrorType,
        file_index: usize,
    },
}

/// All error types that would occur from device tree reading, extraction and writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    InvalidMagic {
        wrong_magic: u32,
    },
    IncompatibleVersion {
        last_comp_version: u32,
        library_supported_version: u32,
    },
    UnsupportedVersion {
        version: u32,
        minimum_version: u32,
    },
    HeaderTooShort {
        header_length: u32,
        at_least_length: u32,
    },
    BufferTooShort {
        total_size: u32,
        buffer_length: usize,
    },
    StructureIndex {
        current_index: u32,
        bound_index: u32,
        structure_or_string: bool,
        overflow_or_underflow: bool,
    },
    StringEofUnexpected,
    SliceEofUnexpected {
        expected_length: u32,
        remaining_length: u32,
    },
    TableStringOffset {
        given_offset: u32,
        bound_offset: u32,
    },
    TagEofUnexpected {
        current_index: u32,
        bound_index: u32,
    },
    InvalidTagId {
        wrong_id: u32,
    },
    BadNodeOffset {
        offset: usize,
    },
    BadPropertyOffset {
        offset: usize,
    },
    Utf8(core::str::Utf8Error),
    NoSpace {
        required: usize,
        available: usize,
    },
    Exists,
    InvalidName,
    BadLayout,
    MissingProperty {
        name: &'static str,
    },
    OutOfResources,
}

impl Error {
    #[inline]
    pub const fn invalid_magic(wrong_magic: u32) -> Error {
        Error::Typed {
            error_type: ErrorType::InvalidMagic { wrong_magic },
            file_index: 0,
        }
    }
    #[inline]
    pub const fn incompatible_version(
        last_comp_version: u32,
        library_supported_version: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::IncompatibleVersion {
                last_comp_version,
                library_supported_version,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn unsupported_version(
        version: u32,
        minimum_version: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::UnsupportedVersion {
                version,
                minimum_version,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn header_too_short(
        header_length: u32,
        at_least_length: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::HeaderTooShort {
                header_length,
                at_least_length,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn buffer_too_short(total_size: u32, buffer_length: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::BufferTooShort {
                total_size,
                buffer_length,
            },
            file_index: 0,
        }
    }
    #[inline]
    pub const fn structure_index_underflow(
        begin_index: u32,
        at_least_index: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::StructureIndex {
                current_index: begin_index,
                bound_index: at_least_index,
                structure_or_string: true,
                overflow_or_underflow: false,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn structure_index_overflow(
        end_index: u32,
        at_most_index: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::StructureIndex {
                current_index: end_index,
                bound_index: at_most_index,
                structure_or_string: true,
                overflow_or_underflow: true,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn string_index_underflow(
        begin_index: u32,
        at_least_index: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::StructureIndex {
                current_index: begin_index,
                bound_index: at_least_index,
                structure_or_string: false,
                overflow_or_underflow: false,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn string_index_overflow(
        end_index: u32,
        at_most_index: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::StructureIndex {
                current_index: end_index,
                bound_index: at_most_index,
                structure_or_string: false,
                overflow_or_underflow: true,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn string_eof_unpexpected(file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::StringEofUnexpected,
            file_index,
        }
    }
    #[inline]
    pub const fn slice_eof_unpexpected(
        expected_length: u32,
        remaining_length: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::SliceEofUnexpected {
                expected_length,
                remaining_length,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn table_string_offset(
        given_offset: u32,
        bound_offset: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::TableStringOffset {
                given_offset,
                bound_offset,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn tag_eof_unexpected(
        current_index: u32,
        bound_index: u32,
        file_index: usize,
    ) -> Error {
        Error::Typed {
            error_type: ErrorType::TagEofUnexpected {
                current_index,
                bound_index,
            },
            file_index,
        }
    }
    #[inline]
    pub const fn invalid_tag_id(wrong_id: u32, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::InvalidTagId { wrong_id },
            file_index,
        }
    }
    #[inline]
    pub const fn bad_node_offset(offset: usize, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::BadNodeOffset { offset },
            file_index,
        }
    }
    #[inline]
    pub const fn bad_property_offset(offset: usize, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::BadPropertyOffset { offset },
            file_index,
        }
    }
    #[inline]
    pub const fn utf8(error: core::str::Utf8Error, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::Utf8(error),
            file_index,
        }
    }
    #[inline]
    pub const fn no_space(required: usize, available: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::NoSpace {
                required,
                available,
            },
            file_index: 0,
        }
    }
    #[inline]
    pub const fn exists(file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::Exists,
            file_index,
        }
    }
    #[inline]
    pub const fn invalid_name() -> Error {
        Error::Typed {
            error_type: ErrorType::InvalidName,
            file_index: 0,
        }
    }
    #[inline]
    pub const fn bad_layout(file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::BadLayout,
            file_index,
        }
    }
    #[inline]
    pub const fn missing_property(name: &'static str, file_index: usize) -> Error {
        Error::Typed {
            error_type: ErrorType::MissingProperty { name },
            file_index,
        }
    }
    #[inline]
    pub const fn out_of_resources() -> Error {
        Error::Typed {
            error_type: ErrorType::OutOfResources,
            file_index: 0,
        }
    }

    /// What went wrong.
    pub const fn error_type(&self) -> ErrorType {
        match self {
            Error::Typed { error_type, .. } => *error_type,
        }
    }

    /// Byte offset in the blob where the error was detected.
    pub const fn file_index(&self) -> usize {
        match self {
            Error::Typed { file_index, .. } => *file_index,
        }
    }

    /// Returns `true` for errors caused by a malformed blob.
    ///
    /// These abort an extraction pass; capacity, duplicate-name and sink
    /// errors are reported on the call that caused them.
    pub const fn is_format_error(&self) -> bool {
        !matches!(
            self.error_type(),
            ErrorType::NoSpace { .. }
                | ErrorType::Exists
                | ErrorType::InvalidName
                | ErrorType::MissingProperty { .. }
                | ErrorType::OutOfResources
        )
    }
}

/// Alias for a Result with the error type `upl_fdt::Error`.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::InvalidMagic { wrong_magic } => {
                write!(f, "invalid magic {:#010x}", wrong_magic)
            }
            ErrorType::IncompatibleVersion {
                last_comp_version,
                library_supported_version,
            } => write!(
                f,
                "last compatible version {} is newer than supported version {}",
                last_comp_version, library_supported_version
            ),
            ErrorType::UnsupportedVersion {
                version,
                minimum_version,
            } => write!(
                f,
                "version {} is older than minimum version {}",
                version, minimum_version
            ),
            ErrorType::HeaderTooShort {
                header_length,
                at_least_length,
            } => write!(
                f,
                "total size {} is shorter than header length {}",
                header_length, at_least_length
            ),
            ErrorType::BufferTooShort {
                total_size,
                buffer_length,
            } => write!(
                f,
                "total size {} exceeds buffer length {}",
                total_size, buffer_length
            ),
            ErrorType::StructureIndex {
                current_index,
                bound_index,
                structure_or_string,
                overflow_or_underflow,
            } => write!(
                f,
                "{} block index {} {} bound {}",
                if *structure_or_string {
                    "structure"
                } else {
                    "strings"
                },
                current_index,
                if *overflow_or_underflow {
                    "exceeds"
                } else {
                    "is below"
                },
                bound_index
            ),
            ErrorType::StringEofUnexpected => write!(f, "unterminated string"),
            ErrorType::SliceEofUnexpected {
                expected_length,
                remaining_length,
            } => write!(
                f,
                "value of {} bytes overruns block with {} bytes left",
                expected_length, remaining_length
            ),
            ErrorType::TableStringOffset {
                given_offset,
                bound_offset,
            } => write!(
                f,
                "string offset {} out of strings block bound {}",
                given_offset, bound_offset
            ),
            ErrorType::TagEofUnexpected {
                current_index,
                bound_index,
            } => write!(
                f,
                "token at {} runs past structure block end {}",
                current_index, bound_index
            ),
            ErrorType::InvalidTagId { wrong_id } => write!(f, "invalid token {:#x}", wrong_id),
            ErrorType::BadNodeOffset { offset } => write!(f, "no node at offset {:#x}", offset),
            ErrorType::BadPropertyOffset { offset } => {
                write!(f, "no property at offset {:#x}", offset)
            }
            ErrorType::Utf8(e) => write!(f, "{}", e),
            ErrorType::NoSpace {
                required,
                available,
            } => write!(
                f,
                "need {} bytes but buffer holds {}",
                required, available
            ),
            ErrorType::Exists => write!(f, "node already exists"),
            ErrorType::InvalidName => write!(f, "invalid node or property name"),
            ErrorType::BadLayout => write!(f, "blocks are not in writable order"),
            ErrorType::MissingProperty { name } => write!(f, "required property `{}` absent", name),
            ErrorType::OutOfResources => write!(f, "record store is full"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Typed {
                error_type,
                file_index,
            } => write!(f, "Error({}, index: {})", error_type, file_index),
        }
    }
}
