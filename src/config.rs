//! Decoder configuration.
//!
//! Read from a TOML file:
//!
//! ```toml
//! mmap_threshold = 1048576
//!
//! [tables]
//! bit_field_words = [0, 0, 0x00f0]
//! jump_pairs = [[1, 0x0040], [2, 0x0080]]
//! ```

use crate::error::DecodeError;
use crate::tables::{AuxTables, BIT_FIELD_TABLE_LEN, JUMP_TABLE_PAIRS};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Environment variable naming a configuration file for the CLI.
pub const CONFIG_ENV_VAR: &str = "AILDASM_CONFIG";

/// Files larger than this are memory mapped instead of read into a buffer.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 1024 * 1024;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DecoderConfig {
    pub mmap_threshold: u64,
    pub tables: TableConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    pub bit_field_words: Vec<u16>,
    pub jump_pairs: Vec<[u16; 2]>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            tables: TableConfig::default(),
        }
    }
}

impl DecoderConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, DecodeError> {
        let config: DecoderConfig =
            toml::from_str(text).map_err(|e| DecodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, DecodeError> {
        let text = fs::read_to_string(path).map_err(|e| {
            DecodeError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load the file named by `AILDASM_CONFIG`, or defaults when unset.
    pub fn from_env() -> Result<Self, DecodeError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), DecodeError> {
        if self.tables.bit_field_words.len() > BIT_FIELD_TABLE_LEN {
            return Err(DecodeError::Config(format!(
                "bit_field_words has {} entries, at most {} allowed",
                self.tables.bit_field_words.len(),
                BIT_FIELD_TABLE_LEN
            )));
        }
        if self.tables.jump_pairs.len() > JUMP_TABLE_PAIRS {
            return Err(DecodeError::Config(format!(
                "jump_pairs has {} entries, at most {} allowed",
                self.tables.jump_pairs.len(),
                JUMP_TABLE_PAIRS
            )));
        }
        Ok(())
    }

    pub fn aux_tables(&self) -> AuxTables {
        let pairs: Vec<(u16, u16)> = self
            .tables
            .jump_pairs
            .iter()
            .map(|[key, target]| (*key, *target))
            .collect();
        AuxTables::new(&self.tables.bit_field_words, &pairs)
    }
}
