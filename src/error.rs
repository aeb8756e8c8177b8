// Decoder error handling

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// How far an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Aborts the decode run.
    Fatal,
    /// Recorded as a diagnostic; decoding carries on.
    Recoverable,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    // Container errors
    #[error("file is empty")]
    EmptyFile,
    #[error("file too small to contain a valid header ({len} bytes, need 12)")]
    TooSmall { len: usize },
    #[error("file size {actual} is smaller than required {required}")]
    TruncatedFile { actual: usize, required: usize },

    // IO errors
    #[error("file '{}' not found", .0.display())]
    FileNotFound(PathBuf),
    #[error("cannot read file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Stream errors
    #[error("unexpected end of command data at offset {offset} while reading {wanted}")]
    UnexpectedEndOfStream { offset: usize, wanted: &'static str },
    #[error("unknown opcode {opcode} ({opcode:#04x}) at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },
    #[error("unhandled syscall opcode {opcode:#04x} at offset {offset}")]
    UnhandledOpcode { offset: usize, opcode: u8 },
    #[error("modulo by zero in expression at offset {offset}")]
    ModuloByZero { offset: usize },
    #[error("text at offset {text_offset} is not valid Shift_JIS")]
    StringDecodeFailure { text_offset: usize },
    #[error("invalid text offset {text_offset} (max: {limit})")]
    InvalidTextOffset { text_offset: usize, limit: usize },

    // Configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl DecodeError {
    pub fn severity(&self) -> Severity {
        match self {
            DecodeError::UnhandledOpcode { .. }
            | DecodeError::ModuloByZero { .. }
            | DecodeError::InvalidTextOffset { .. } => Severity::Recoverable,
            _ => Severity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// A recoverable condition observed while decoding, tagged with the
/// command-data offset where it was detected: the instruction, or the start
/// of the expression for expression errors.
#[derive(Debug)]
pub struct Diagnostic {
    pub offset: usize,
    pub error: DecodeError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{:#06x}] {}", self.offset, self.error)
    }
}

/// Collects recoverable diagnostics for one decode run.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a recoverable condition. Also emitted as a warning so it shows
    /// up in the log stream next to the dispatch trace.
    pub fn report(&mut self, offset: usize, error: DecodeError) {
        log::warn!("{:#06x}: {}", offset, error);
        self.entries.push(Diagnostic { offset, error });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
