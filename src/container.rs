//! Container loading and segmentation.
//!
//! Layout: 12-byte header, a command block that is skipped, the command
//! segment interpreted by the dispatchers, then the text segment.

use crate::context::ParseContext;
use crate::error::DecodeError;
use crate::header::FileHeader;
use log::{debug, info};
use memmap2::Mmap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::ops::Deref;
use std::path::Path;

/// Raw file contents, either mapped or read into memory.
pub enum FileBytes {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Mapped(map) => &map[..],
            FileBytes::Buffered(bytes) => &bytes[..],
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> DecodeError {
    if source.kind() == ErrorKind::NotFound {
        DecodeError::FileNotFound(path.to_path_buf())
    } else {
        DecodeError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Read a script file. Files above `mmap_threshold` bytes are memory mapped.
pub fn load_file(path: &Path, mmap_threshold: u64) -> Result<FileBytes, DecodeError> {
    let mut file = File::open(path).map_err(|e| io_error(path, e))?;
    let file_size = file.metadata().map_err(|e| io_error(path, e))?.len();
    if file_size == 0 {
        return Err(DecodeError::EmptyFile);
    }

    if file_size > mmap_threshold {
        info!("Mapping {} ({} bytes)", path.display(), file_size);
        // Read-only map; the file must not be truncated while mapped.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| io_error(path, e))?;
        Ok(FileBytes::Mapped(map))
    } else {
        info!("Reading {} ({} bytes)", path.display(), file_size);
        let mut bytes = Vec::with_capacity(file_size as usize);
        file.read_to_end(&mut bytes).map_err(|e| io_error(path, e))?;
        Ok(FileBytes::Buffered(bytes))
    }
}

/// Validate the header and cut the command and text segments out of `data`.
pub fn parse(data: &[u8]) -> Result<(FileHeader, ParseContext), DecodeError> {
    let header = FileHeader::parse(data)?;

    let required = header.required_size();
    if data.len() < required {
        return Err(DecodeError::TruncatedFile {
            actual: data.len(),
            required,
        });
    }

    let command_start = header.command_data_start();
    let text_start = header.text_data_start();
    let command_data = data[command_start..text_start].to_vec();
    let text_data = data[text_start..required].to_vec();

    debug!(
        "Command segment {:#06x}..{:#06x}, text segment {:#06x}..{:#06x}",
        command_start, text_start, text_start, required
    );

    Ok((header, ParseContext::new(command_data, text_data)))
}
