//! Auxiliary lookup tables used by the runtime but not stored in the script.
//!
//! The bit-field word table feeds `extract_bit_field` (operand transforms and
//! switch parameters); the jump table maps a conditional-jump value to a
//! target. Their contents have not been recovered from the runtime, so both
//! default to zero. They are plain inputs to the decoder so they can be
//! populated from configuration once known.

/// Entries in the bit-field word table.
pub const BIT_FIELD_TABLE_LEN: usize = 256;

/// Key/target pairs in the jump lookup table (0xEE bytes of 4-byte pairs).
pub const JUMP_TABLE_PAIRS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxTables {
    bit_field_words: [u16; BIT_FIELD_TABLE_LEN],
    jump_pairs: Vec<(u16, u16)>,
}

impl Default for AuxTables {
    fn default() -> Self {
        AuxTables {
            bit_field_words: [0; BIT_FIELD_TABLE_LEN],
            jump_pairs: vec![(0, 0); JUMP_TABLE_PAIRS],
        }
    }
}

impl AuxTables {
    /// Build tables from partial data. Missing entries stay zero; entries
    /// past the table capacity are ignored.
    pub fn new(words: &[u16], pairs: &[(u16, u16)]) -> Self {
        let mut tables = AuxTables::default();
        for (slot, word) in tables.bit_field_words.iter_mut().zip(words) {
            *slot = *word;
        }
        for (slot, pair) in tables.jump_pairs.iter_mut().zip(pairs) {
            *slot = *pair;
        }
        tables
    }

    pub fn bit_field_word(&self, index: u8) -> u16 {
        self.bit_field_words[index as usize]
    }

    pub fn set_bit_field_word(&mut self, index: u8, value: u16) {
        self.bit_field_words[index as usize] = value;
    }

    /// Target paired with `key`, scanning pairs in order; 0 when absent.
    pub fn jump_target(&self, key: u16) -> u16 {
        self.jump_pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, target)| *target)
            .unwrap_or(0)
    }
}
