/// Expression VM for inline scripted values
///
/// Expressions are embedded directly in the command stream and evaluated
/// with two stacks kept in step: the value stack holds pushed operands, the
/// accumulator stack holds running results. The encoding is:
///
/// - `0xFF` terminates the expression (end of data reads as `0xFF` too)
/// - `0x00 idx lo hi` pushes the word `hi:lo`, transformed through the
///   bit-field table when `idx != 0xFF`
/// - any other byte is a marker followed by one operator byte
///
/// The result is the bottom of the accumulator stack, masked to 16 bits.
use crate::context::{ParseContext, END_OF_DATA};
use crate::error::{DecodeError, Diagnostics};
use crate::tables::AuxTables;
use log::trace;

/// Operator codes below this are comparisons / tests.
const ARITHMETIC_BASE: u8 = 12;

const OP_GREATER: u8 = 0;
const OP_LESS_EQUAL: u8 = 1;
const OP_NOT_EQUAL: u8 = 2;
const OP_EQUAL: u8 = 3;
const OP_GREATER_EQUAL: u8 = 4;
const OP_LESS: u8 = 5;
const OP_ZERO_TEST: u8 = 10;
const OP_NOT: u8 = 11;

// Offsets from ARITHMETIC_BASE
const OP_NOT_OR: u8 = 0;
const OP_ADD: u8 = 8;
const OP_SUB: u8 = 9;
const OP_MUL: u8 = 10;
const OP_DIV: u8 = 11;
const OP_MOD: u8 = 12;

/// Extract a bit field from the auxiliary word table.
///
/// `pattern` is a mask: its trailing zero count gives the shift and the run
/// of ones above that gives the width. A zero pattern yields zero.
pub fn extract_bit_field(tables: &AuxTables, table_index: u8, pattern: u16) -> u16 {
    if pattern == 0 {
        return 0;
    }
    let shift = pattern.trailing_zeros();
    let width = (pattern >> shift).trailing_ones();
    let mask = ((1u32 << width) - 1) as u16;
    (tables.bit_field_word(table_index) >> shift) & mask
}

/// The paired operand/result stacks of one evaluation.
#[derive(Debug, Default)]
struct ExpressionStacks {
    values: Vec<u32>,
    accumulators: Vec<u32>,
}

impl ExpressionStacks {
    fn push(&mut self, value: u32) {
        self.values.push(value);
        self.accumulators.push(value);
    }

    /// Pop the right-hand operand and fold it into the accumulator below it.
    fn binary(&mut self, op: impl FnOnce(u32, u32) -> u32) {
        let Some(rhs) = self.values.pop() else {
            return;
        };
        if self.accumulators.len() > 1 {
            self.accumulators.pop();
        }
        if let Some(lhs) = self.accumulators.last_mut() {
            *lhs = op(*lhs, rhs);
        }
    }

    /// Operator 10: replace the top operand with `top == 0`.
    fn zero_test(&mut self) {
        if let Some(top) = self.values.last_mut() {
            *top = (*top == 0) as u32;
            if let Some(acc) = self.accumulators.last_mut() {
                *acc = *top;
            }
        }
    }

    /// Operator 11: logical NOT of the accumulator top, nothing popped.
    fn not(&mut self) {
        if let Some(acc) = self.accumulators.last_mut() {
            *acc = (*acc == 0) as u32;
        }
    }

    /// Operator 12: true if either the accumulator top or the value top is
    /// set. Pops the value stack; the accumulator only while it has two or
    /// more entries.
    fn not_or(&mut self) {
        let Some(acc) = self.accumulators.last().copied() else {
            return;
        };
        let value = self.values.last().copied().unwrap_or(0);
        let result = (acc != 0 || value != 0) as u32;
        self.values.pop();
        if self.accumulators.len() >= 2 {
            self.accumulators.pop();
        }
        if let Some(top) = self.accumulators.last_mut() {
            *top = result;
        }
    }

    fn result(&self) -> u16 {
        self.accumulators.first().map_or(0, |v| (*v & 0xFFFF) as u16)
    }
}

pub struct ExpressionVm<'a> {
    tables: &'a AuxTables,
}

impl<'a> ExpressionVm<'a> {
    pub fn new(tables: &'a AuxTables) -> Self {
        ExpressionVm { tables }
    }

    /// Read one pushed operand: table index byte then a 16-bit word.
    fn read_operand(&self, ctx: &mut ParseContext) -> Result<u32, DecodeError> {
        let table_index = ctx.next_byte_or_sentinel();
        let mut word = ctx.read_word()?;
        if table_index != END_OF_DATA {
            word = extract_bit_field(self.tables, table_index, word);
        }
        Ok(word as u32)
    }

    /// Evaluate one expression at the cursor.
    ///
    /// Modulo by zero yields 0 and is reported to `diagnostics`; division by
    /// zero silently yields 0. Running out of data inside an operand word is
    /// an error.
    pub fn evaluate(
        &self,
        ctx: &mut ParseContext,
        diagnostics: &mut Diagnostics,
    ) -> Result<u16, DecodeError> {
        let start = ctx.cursor();
        let mut stacks = ExpressionStacks::default();

        loop {
            // Operand phase
            loop {
                match ctx.next_byte_or_sentinel() {
                    END_OF_DATA => {
                        let result = stacks.result();
                        trace!("expression at {:#06x} = {}", start, result);
                        return Ok(result);
                    }
                    0 => {
                        let value = self.read_operand(ctx)?;
                        trace!("push {}", value);
                        stacks.push(value);
                    }
                    _ => break,
                }
            }

            // Operator phase
            let operator_offset = ctx.cursor();
            let operator = ctx.next_byte_or_sentinel();
            trace!(
                "operator {} with values {:?} accumulators {:?}",
                operator,
                stacks.values,
                stacks.accumulators
            );

            if operator >= ARITHMETIC_BASE {
                match operator - ARITHMETIC_BASE {
                    OP_NOT_OR => stacks.not_or(),
                    OP_ADD => stacks.binary(|a, b| a.wrapping_add(b)),
                    OP_SUB => stacks.binary(|a, b| a.wrapping_sub(b)),
                    OP_MUL => stacks.binary(|a, b| a.wrapping_mul(b)),
                    OP_DIV => stacks.binary(|a, b| a.checked_div(b).unwrap_or(0)),
                    OP_MOD => {
                        if stacks.values.last() == Some(&0) {
                            diagnostics
                                .report(start, DecodeError::ModuloByZero { offset: operator_offset });
                        }
                        stacks.binary(|a, b| a.checked_rem(b).unwrap_or(0));
                    }
                    _ => {}
                }
            } else {
                match operator {
                    OP_GREATER => stacks.binary(|a, b| (a > b) as u32),
                    OP_LESS_EQUAL => stacks.binary(|a, b| (a <= b) as u32),
                    OP_NOT_EQUAL => stacks.binary(|a, b| (a != b) as u32),
                    OP_EQUAL => stacks.binary(|a, b| (a == b) as u32),
                    OP_GREATER_EQUAL => stacks.binary(|a, b| (a >= b) as u32),
                    OP_LESS => stacks.binary(|a, b| (a < b) as u32),
                    OP_ZERO_TEST => stacks.zero_test(),
                    OP_NOT => stacks.not(),
                    _ => {}
                }
            }
        }
    }

    /// Evaluate `count` consecutive expressions.
    pub fn evaluate_many(
        &self,
        ctx: &mut ParseContext,
        diagnostics: &mut Diagnostics,
        count: usize,
    ) -> Result<Vec<u16>, DecodeError> {
        (0..count).map(|_| self.evaluate(ctx, diagnostics)).collect()
    }
}
