use crate::config::DecoderConfig;
use crate::container;
use crate::context::ParseContext;
use crate::error::{DecodeError, Diagnostic, Diagnostics};
use crate::header::FileHeader;
use crate::syscall::{SysCallDispatcher, SysCallRecord};
use crate::tables::AuxTables;
use log::{debug, info, warn};
use std::fmt;
use std::path::Path;

/// Result of one decode run.
///
/// A fatal error in the middle of the command stream does not discard the
/// work done so far: `records` holds everything decoded before it and
/// `aborted` holds the error.
#[derive(Debug)]
pub struct DecodeReport {
    pub header: FileHeader,
    pub records: Vec<SysCallRecord>,
    pub diagnostics: Vec<Diagnostic>,
    pub aborted: Option<DecodeError>,
    /// Names held in the name cache when decoding stopped.
    pub names_cached: usize,
}

impl DecodeReport {
    /// Whether the command segment was decoded to its end.
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

impl fmt::Display for DecodeReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        writeln!(
            f,
            "Command data: {} bytes, text data: {} bytes",
            self.header.command_block_for_text_size, self.header.string_table_size
        )?;
        writeln!(f)?;

        for record in &self.records {
            writeln!(f, "{}", record)?;
        }

        writeln!(f)?;
        writeln!(
            f,
            "Decoded {} syscalls, {} names cached",
            self.records.len(),
            self.names_cached
        )?;
        if !self.diagnostics.is_empty() {
            writeln!(f, "{} diagnostics:", self.diagnostics.len())?;
            for diagnostic in &self.diagnostics {
                writeln!(f, "  {}", diagnostic)?;
            }
        }
        if let Some(error) = &self.aborted {
            writeln!(f, "Decoding aborted: {}", error)?;
        }
        Ok(())
    }
}

/// Static decoder for AIL scenario scripts.
///
/// Holds no per-file state; every call builds its own `ParseContext`, so a
/// single instance can decode any number of files.
#[derive(Debug, Clone, Default)]
pub struct Disassembler {
    config: DecoderConfig,
    tables: AuxTables,
}

impl Disassembler {
    pub fn new(config: DecoderConfig) -> Self {
        let tables = config.aux_tables();
        Disassembler { config, tables }
    }

    pub fn tables(&self) -> &AuxTables {
        &self.tables
    }

    pub fn disassemble_file(&self, path: &Path) -> Result<DecodeReport, DecodeError> {
        let bytes = container::load_file(path, self.config.mmap_threshold)?;
        self.disassemble_bytes(&bytes)
    }

    /// Decode a whole container held in memory.
    ///
    /// Header and layout errors are returned as `Err`. Errors inside the
    /// command stream end up in the report.
    pub fn disassemble_bytes(&self, bytes: &[u8]) -> Result<DecodeReport, DecodeError> {
        let (header, mut ctx) = container::parse(bytes)?;
        info!(
            "Decoding {} bytes of commands, {} bytes of text",
            ctx.command_data().len(),
            ctx.text_data().len()
        );
        Ok(self.decode(header, &mut ctx))
    }

    fn decode(&self, header: FileHeader, ctx: &mut ParseContext) -> DecodeReport {
        let mut dispatcher = SysCallDispatcher::new(&self.tables);
        let mut diagnostics = Diagnostics::new();
        let mut records = Vec::new();

        let aborted = match dispatcher.run(ctx, &mut diagnostics, &mut records) {
            Ok(()) => {
                debug!("Command data exhausted after {} syscalls", records.len());
                None
            }
            Err(e) => {
                warn!("Decoding stopped at {:#06x}: {}", ctx.cursor(), e);
                Some(e)
            }
        };

        DecodeReport {
            header,
            records,
            diagnostics: diagnostics.into_vec(),
            aborted,
            names_cached: dispatcher.normal().strings().cache().len(),
        }
    }
}
