//! Segment buffers and the shared read cursor.
//!
//! A `ParseContext` owns the command segment, the text segment and the single
//! cursor into the command segment. Both dispatchers and the expression VM
//! advance the same cursor, so the context is handed down by `&mut` and never
//! cloned: its cursor position *is* "what comes next".

use crate::error::DecodeError;

/// Sentinel returned by [`ParseContext::next_byte_or_sentinel`] at end of data.
pub const END_OF_DATA: u8 = 0xFF;

#[derive(Debug)]
pub struct ParseContext {
    command_data: Vec<u8>,
    text_data: Vec<u8>,
    cursor: usize,
}

impl ParseContext {
    pub fn new(command_data: Vec<u8>, text_data: Vec<u8>) -> Self {
        ParseContext {
            command_data,
            text_data,
            cursor: 0,
        }
    }

    pub fn command_data(&self) -> &[u8] {
        &self.command_data
    }

    pub fn text_data(&self) -> &[u8] {
        &self.text_data
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.command_data.len().saturating_sub(self.cursor)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.command_data.len()
    }

    /// Read one byte, or `None` at end of the command segment.
    pub fn next_byte(&mut self) -> Option<u8> {
        let byte = *self.command_data.get(self.cursor)?;
        self.cursor += 1;
        Some(byte)
    }

    /// Read one byte, treating end of data as the `0xFF` terminator.
    ///
    /// The expression VM relies on this: an expression that runs off the end
    /// of the command segment terminates instead of failing.
    pub fn next_byte_or_sentinel(&mut self) -> u8 {
        self.next_byte().unwrap_or(END_OF_DATA)
    }

    /// Read a little-endian 16-bit word, or `None` if fewer than two bytes
    /// remain. The cursor is not moved on failure.
    pub fn next_word(&mut self) -> Option<u16> {
        let bytes = self.command_data.get(self.cursor..self.cursor + 2)?;
        let word = u16::from_le_bytes([bytes[0], bytes[1]]);
        self.cursor += 2;
        Some(word)
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let offset = self.cursor;
        self.next_byte().ok_or(DecodeError::UnexpectedEndOfStream {
            offset,
            wanted: "byte",
        })
    }

    pub fn read_word(&mut self) -> Result<u16, DecodeError> {
        let offset = self.cursor;
        self.next_word().ok_or(DecodeError::UnexpectedEndOfStream {
            offset,
            wanted: "word",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance_shared_cursor() {
        let mut ctx = ParseContext::new(vec![0x12, 0x34, 0x56, 0x78], vec![]);
        assert_eq!(ctx.read_byte().unwrap(), 0x12);
        assert_eq!(ctx.read_word().unwrap(), 0x5634);
        assert_eq!(ctx.cursor(), 3);
        assert_eq!(ctx.remaining(), 1);
        assert!(!ctx.is_exhausted());
        assert_eq!(ctx.next_byte(), Some(0x78));
        assert!(ctx.is_exhausted());
    }

    #[test]
    fn test_word_past_end_leaves_cursor() {
        let mut ctx = ParseContext::new(vec![0x01, 0x02, 0x03], vec![]);
        ctx.read_word().unwrap();
        let err = ctx.read_word().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnexpectedEndOfStream {
                offset: 2,
                wanted: "word"
            }
        ));
        assert_eq!(ctx.cursor(), 2);
    }

    #[test]
    fn test_sentinel_at_end() {
        let mut ctx = ParseContext::new(vec![0x00], vec![]);
        assert_eq!(ctx.next_byte_or_sentinel(), 0x00);
        assert_eq!(ctx.next_byte_or_sentinel(), END_OF_DATA);
        assert_eq!(ctx.cursor(), 1);
    }
}
