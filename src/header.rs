use std::fmt::Display;
use std::fmt::Error;
use std::fmt::Formatter;

use crate::error::DecodeError;

/// Size of the fixed container header in bytes.
pub const HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub reserved1: u32,
    pub command_block_size: u16,
    pub command_block_for_text_size: u16,
    pub string_table_size: u16,
    pub reserved2: u16,
}

fn le_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

impl FileHeader {
    /// Decode the five little-endian header fields.
    pub fn parse(bytes: &[u8]) -> Result<FileHeader, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::EmptyFile);
        }
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::TooSmall { len: bytes.len() });
        }
        Ok(FileHeader {
            reserved1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            command_block_size: le_u16(bytes, 4),
            command_block_for_text_size: le_u16(bytes, 6),
            string_table_size: le_u16(bytes, 8),
            reserved2: le_u16(bytes, 10),
        })
    }

    /// Offset of the command segment within the file.
    pub fn command_data_start(&self) -> usize {
        HEADER_SIZE + self.command_block_size as usize
    }

    /// Offset of the text segment within the file.
    pub fn text_data_start(&self) -> usize {
        self.command_data_start() + self.command_block_for_text_size as usize
    }

    /// Minimum file size implied by the declared segment sizes.
    pub fn required_size(&self) -> usize {
        self.text_data_start() + self.string_table_size as usize
    }
}

impl Display for FileHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "Header Information:
Reserved1:                   {:#010x}
Command Block Size:          {:#06x} ({})
Command Block for Text Size: {:#06x} ({})
String Table Size:           {:#06x} ({})
Reserved2:                   {:#06x}
",
            self.reserved1,
            self.command_block_size,
            self.command_block_size,
            self.command_block_for_text_size,
            self.command_block_for_text_size,
            self.string_table_size,
            self.string_table_size,
            self.reserved2,
        )
    }
}
