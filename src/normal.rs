//! Inner ("normal") instruction set: display, media cues and expression
//! evaluation. One call to [`NormalDispatcher::step`] decodes one opcode.

use crate::context::ParseContext;
use crate::error::{DecodeError, Diagnostics};
use crate::expression::ExpressionVm;
use crate::opcode_tables::{normal_opcode, NormalKind, NormalOpcode};
use crate::tables::AuxTables;
use crate::text::{DecodedText, StringDecoder};
use log::{debug, warn};
use std::fmt;

/// One decoded normal instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalInstruction {
    pub offset: usize,
    pub opcode: NormalOpcode,
    /// Expression results in evaluation order.
    pub results: Vec<u16>,
    /// Resolved text, if the opcode carries a text offset that could be read.
    pub text: Option<DecodedText>,
}

impl fmt::Display for NormalInstruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:#06x}: [Normal] {:<18} ({:#04x})",
            self.offset,
            self.opcode.name().to_string(),
            self.opcode.opcode
        )?;
        if !self.results.is_empty() {
            write!(f, " results={:?}", self.results)?;
        }
        if let Some(text) = &self.text {
            write!(f, "\n        -> {}", text)?;
        }
        Ok(())
    }
}

/// Outcome of one dispatcher step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalStep {
    Executed(NormalInstruction),
    EndOfStream,
}

pub struct NormalDispatcher<'a> {
    vm: ExpressionVm<'a>,
    strings: StringDecoder,
}

impl<'a> NormalDispatcher<'a> {
    pub fn new(tables: &'a AuxTables) -> Self {
        NormalDispatcher {
            vm: ExpressionVm::new(tables),
            strings: StringDecoder::new(),
        }
    }

    pub fn strings(&self) -> &StringDecoder {
        &self.strings
    }

    /// Decode one normal opcode at the cursor.
    ///
    /// Returns `EndOfStream` when the command segment is exhausted and
    /// `UnknownOpcode` for a value outside the catalog.
    pub fn step(
        &mut self,
        ctx: &mut ParseContext,
        diagnostics: &mut Diagnostics,
    ) -> Result<NormalStep, DecodeError> {
        let offset = ctx.cursor();
        let Some(byte) = ctx.next_byte() else {
            return Ok(NormalStep::EndOfStream);
        };
        let opcode = normal_opcode(byte).ok_or(DecodeError::UnknownOpcode {
            offset,
            opcode: byte,
        })?;
        debug!(
            "[Normal] {:#06x}: {} ({:#04x})",
            offset,
            opcode.name(),
            byte
        );

        let mut results = Vec::new();
        let mut text = None;

        match opcode.kind {
            NormalKind::EmitOnly => {}
            NormalKind::Evaluate(count) => {
                results = self.vm.evaluate_many(ctx, diagnostics, count as usize)?;
            }
            NormalKind::Display { resolve_names } => {
                text = self.display(ctx, diagnostics, offset, resolve_names)?;
            }
            NormalKind::EvaluateThenText(count) => {
                results = self.vm.evaluate_many(ctx, diagnostics, count as usize)?;
                text = Some(self.text_operand(ctx)?);
            }
            NormalKind::TextThenEvaluate(count) => {
                text = Some(self.text_operand(ctx)?);
                results = self.vm.evaluate_many(ctx, diagnostics, count as usize)?;
            }
            NormalKind::Text => {
                text = Some(self.text_operand(ctx)?);
            }
        }

        Ok(NormalStep::Executed(NormalInstruction {
            offset,
            opcode,
            results,
            text,
        }))
    }

    /// Step until the command segment is exhausted.
    pub fn run_to_end(
        &mut self,
        ctx: &mut ParseContext,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<NormalInstruction>, DecodeError> {
        let mut instructions = Vec::new();
        while let NormalStep::Executed(instruction) = self.step(ctx, diagnostics)? {
            instructions.push(instruction);
        }
        Ok(instructions)
    }

    /// Text displayed by opcodes 0x00 and 0x01.
    fn display(
        &mut self,
        ctx: &mut ParseContext,
        diagnostics: &mut Diagnostics,
        offset: usize,
        resolve_names: bool,
    ) -> Result<Option<DecodedText>, DecodeError> {
        // Scripts carry some unused command data at the end
        let Some(word) = ctx.next_word() else {
            warn!(
                "end of command data while reading text offset at {:#06x} (size {})",
                offset,
                ctx.command_data().len()
            );
            return Ok(None);
        };

        let text_offset = word as usize;
        let limit = ctx.text_data().len();
        if text_offset >= limit {
            diagnostics.report(offset, DecodeError::InvalidTextOffset { text_offset, limit });
            return Ok(None);
        }

        let decoded = self
            .strings
            .decode(ctx.text_data(), text_offset, resolve_names)?;
        Ok(Some(decoded))
    }

    /// A plain text operand: offset word, no name resolution.
    fn text_operand(&mut self, ctx: &mut ParseContext) -> Result<DecodedText, DecodeError> {
        let text_offset = ctx.read_word()? as usize;
        self.strings.decode(ctx.text_data(), text_offset, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_once(command: Vec<u8>, text: Vec<u8>) -> (NormalStep, ParseContext, Diagnostics) {
        let tables = AuxTables::default();
        let mut dispatcher = NormalDispatcher::new(&tables);
        let mut ctx = ParseContext::new(command, text);
        let mut diags = Diagnostics::new();
        let step = dispatcher.step(&mut ctx, &mut diags).unwrap();
        (step, ctx, diags)
    }

    fn executed(step: NormalStep) -> NormalInstruction {
        match step {
            NormalStep::Executed(instruction) => instruction,
            NormalStep::EndOfStream => panic!("expected an instruction"),
        }
    }

    #[test]
    fn test_end_of_stream() {
        let (step, _, _) = step_once(vec![], vec![]);
        assert_eq!(step, NormalStep::EndOfStream);
    }

    #[test]
    fn test_emit_only() {
        let (step, ctx, _) = step_once(vec![0x04, 0x99], vec![]);
        let instruction = executed(step);
        assert_eq!(instruction.opcode.name().to_string(), "NEWLINE");
        assert!(instruction.results.is_empty());
        assert_eq!(ctx.cursor(), 1);
    }

    #[test]
    fn test_unknown_opcode() {
        let tables = AuxTables::default();
        let mut dispatcher = NormalDispatcher::new(&tables);
        let mut ctx = ParseContext::new(vec![0x04, 0x03], vec![]);
        let mut diags = Diagnostics::new();
        dispatcher.step(&mut ctx, &mut diags).unwrap();
        let err = dispatcher.step(&mut ctx, &mut diags).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::UnknownOpcode {
                offset: 1,
                opcode: 0x03
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_evaluate_two_expressions() {
        // PLAY_WAV: two expressions
        let command = vec![0x44, 0x00, 0xFF, 0x07, 0x00, 0xFF, 0xFF];
        let (step, ctx, _) = step_once(command, vec![]);
        let instruction = executed(step);
        assert_eq!(instruction.results, vec![7, 0]);
        assert!(ctx.is_exhausted());
    }

    #[test]
    fn test_display_text() {
        let (step, ctx, diags) = step_once(vec![0x00, 0x02, 0x00], b"xxHi\0".to_vec());
        let text = executed(step).text.unwrap();
        assert_eq!(text.text, "Hi");
        assert_eq!(text.offset, 2);
        assert_eq!(ctx.cursor(), 3);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_display_invalid_offset_is_recoverable() {
        let (step, _, diags) = step_once(vec![0x01, 0x10, 0x00], b"Hi\0".to_vec());
        assert!(executed(step).text.is_none());
        assert_eq!(diags.len(), 1);
        assert!(matches!(
            diags.entries()[0].error,
            DecodeError::InvalidTextOffset {
                text_offset: 0x10,
                limit: 3
            }
        ));
    }

    #[test]
    fn test_display_trailing_data() {
        let (step, ctx, diags) = step_once(vec![0x00, 0x05], b"Hi\0".to_vec());
        assert!(executed(step).text.is_none());
        assert!(diags.is_empty());
        assert_eq!(ctx.cursor(), 1);
    }

    #[test]
    fn test_undecodable_text_is_fatal() {
        let tables = AuxTables::default();
        let mut dispatcher = NormalDispatcher::new(&tables);
        let mut diags = Diagnostics::new();
        let text = vec![0x41, 0x81, 0x20, 0x00];

        // Display opcode
        let mut ctx = ParseContext::new(vec![0x00, 0x00, 0x00], text.clone());
        let err = dispatcher.step(&mut ctx, &mut diags).unwrap_err();
        assert!(matches!(err, DecodeError::StringDecodeFailure { text_offset: 0 }));
        assert!(err.is_fatal());

        // Plain text operand
        let mut ctx = ParseContext::new(vec![0x8A, 0x00, 0x00], text);
        assert!(matches!(
            dispatcher.step(&mut ctx, &mut diags),
            Err(DecodeError::StringDecodeFailure { text_offset: 0 })
        ));
        assert!(diags.is_empty());
    }

    #[test]
    fn test_evaluate_then_text() {
        let mut command = vec![0x6C];
        command.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0x00, 0xFF, 0x09, 0x00, 0xFF]);
        command.extend_from_slice(&[0x00, 0x00]);
        let (step, ctx, _) = step_once(command, b"scene\0".to_vec());
        let instruction = executed(step);
        assert_eq!(instruction.results, vec![0, 0, 0, 9]);
        assert_eq!(instruction.text.unwrap().text, "scene");
        assert!(ctx.is_exhausted());
    }

    #[test]
    fn test_text_then_evaluate() {
        let command = vec![0x6E, 0x00, 0x00, 0x00, 0xFF, 0x03, 0x00, 0xFF];
        let (step, _, _) = step_once(command, b"s01\0".to_vec());
        let instruction = executed(step);
        assert_eq!(instruction.opcode.name().to_string(), "SCENARIO_VM");
        assert_eq!(instruction.text.unwrap().text, "s01");
        assert_eq!(instruction.results, vec![3]);
    }

    #[test]
    fn test_text_operand_requires_word() {
        let tables = AuxTables::default();
        let mut dispatcher = NormalDispatcher::new(&tables);
        let mut ctx = ParseContext::new(vec![0x8A, 0x01], b"op\0".to_vec());
        let mut diags = Diagnostics::new();
        assert!(matches!(
            dispatcher.step(&mut ctx, &mut diags),
            Err(DecodeError::UnexpectedEndOfStream { offset: 1, .. })
        ));
    }

    #[test]
    fn test_run_to_end() {
        let tables = AuxTables::default();
        let mut dispatcher = NormalDispatcher::new(&tables);
        let mut ctx = ParseContext::new(vec![0x04, 0x05, 0x02, 0xFF, 0xFF], vec![]);
        let mut diags = Diagnostics::new();
        let instructions = dispatcher.run_to_end(&mut ctx, &mut diags).unwrap();
        let opcodes: Vec<u8> = instructions.iter().map(|i| i.opcode.opcode).collect();
        assert_eq!(opcodes, vec![0x04, 0x05, 0x02, 0xFF]);
    }
}
