//! Outer ("syscall") instruction set: control flow, calls, audio and
//! scenario opcodes. Opcode 0x00 hands one step to the normal dispatcher.
//!
//! Nothing here changes control flow. Jump and case targets are decoded and
//! reported; the cursor always moves straight on.

use crate::context::ParseContext;
use crate::error::{DecodeError, Diagnostics};
use crate::expression::{extract_bit_field, ExpressionVm};
use crate::normal::{NormalDispatcher, NormalStep};
use crate::opcode_tables::SysCallOpcode;
use crate::tables::AuxTables;
use log::debug;
use std::fmt;

/// Case value that matches any parameter.
pub const WILDCARD_CASE: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchCase {
    pub value: u8,
    pub target: u16,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTable {
    pub param: u8,
    pub comparison: u16,
    /// `param` after bit-field extraction.
    pub processed: u16,
    pub default_target: u16,
    pub cases: Vec<SwitchCase>,
}

impl SwitchTable {
    pub fn matches(&self) -> impl Iterator<Item = &SwitchCase> {
        self.cases.iter().filter(|case| case.matched)
    }

    /// Whether no case matched, leaving the default target.
    pub fn uses_default(&self) -> bool {
        self.matches().next().is_none()
    }
}

/// Read a switch/case table at the cursor.
///
/// Every case is scanned; all matching cases are flagged.
pub fn read_switch(ctx: &mut ParseContext, tables: &AuxTables) -> Result<SwitchTable, DecodeError> {
    let param = ctx.read_byte()?;
    let comparison = ctx.read_word()?;
    let default_target = ctx.read_word()?;
    let case_count = ctx.read_byte()?;
    let processed = extract_bit_field(tables, param, comparison);

    let mut cases = Vec::with_capacity(case_count as usize);
    for _ in 0..case_count {
        let value = ctx.read_byte()?;
        let target = ctx.read_word()?;
        let matched = value == WILDCARD_CASE || value as u16 == processed;
        cases.push(SwitchCase {
            value,
            target,
            matched,
        });
    }

    Ok(SwitchTable {
        param,
        comparison,
        processed,
        default_target,
        cases,
    })
}

/// A decoded syscall with its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysCallOp {
    Normal(NormalStep),
    PlayAudio { param: u8, id: u16, value: u16 },
    AudioOp { param: u8, id: u16, step: NormalStep },
    Jump { target: u16 },
    Switch(SwitchTable),
    /// `padding` counts the zero bytes skipped after the expression.
    LoadScenario { scenario: u16, padding: usize },
    Call { target: u16, return_address: u16 },
    ConditionalJump { condition: u16, target: u16 },
    Return,
    CallScenario { scenario: u16, return_point: u16, param: u16 },
    End,
    /// The skip target is only present when the condition was false.
    ConditionalSkip { condition: u16, skip_target: Option<u16> },
    Unhandled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysCallRecord {
    pub offset: usize,
    pub opcode: u8,
    pub op: SysCallOp,
}

fn fmt_step(f: &mut fmt::Formatter, step: &NormalStep) -> fmt::Result {
    match step {
        NormalStep::Executed(instruction) => write!(f, "\n    {}", instruction),
        NormalStep::EndOfStream => write!(f, "\n    <end of command data>"),
    }
}

impl fmt::Display for SysCallRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = SysCallOpcode::from_byte(self.opcode).map_or("unhandled", |op| op.name());
        write!(f, "{:#06x}: [SysCall] {:<14} ({:#04x})", self.offset, name, self.opcode)?;

        match &self.op {
            SysCallOp::Normal(step) => fmt_step(f, step),
            SysCallOp::PlayAudio { param, id, value } => {
                write!(f, " param={} id={} expr={}", param, id, value)
            }
            SysCallOp::AudioOp { param, id, step } => {
                write!(f, " param={} id={}", param, id)?;
                fmt_step(f, step)
            }
            SysCallOp::Jump { target } => write!(f, " target={:#06x}", target),
            SysCallOp::Switch(table) => {
                write!(
                    f,
                    " param={} value={:#06x} processed={} default={:#06x} cases={}",
                    table.param,
                    table.comparison,
                    table.processed,
                    table.default_target,
                    table.cases.len()
                )?;
                for (i, case) in table.cases.iter().enumerate() {
                    write!(
                        f,
                        "\n    case {}: value={} target={:#06x}{}",
                        i,
                        case.value,
                        case.target,
                        if case.matched { " <match>" } else { "" }
                    )?;
                }
                if table.uses_default() {
                    write!(f, "\n    no match, default target {:#06x}", table.default_target)?;
                }
                Ok(())
            }
            SysCallOp::LoadScenario { scenario, padding } => {
                write!(f, " scenario={} padding={}", scenario, padding)
            }
            SysCallOp::Call {
                target,
                return_address,
            } => write!(f, " target={} return={}", target, return_address),
            SysCallOp::ConditionalJump { condition, target } => {
                write!(f, " condition={} target={:#06x}", condition, target)
            }
            SysCallOp::Return | SysCallOp::End | SysCallOp::Unhandled => Ok(()),
            SysCallOp::CallScenario {
                scenario,
                return_point,
                param,
            } => write!(
                f,
                " scenario={} return={} param={}",
                scenario, return_point, param
            ),
            SysCallOp::ConditionalSkip {
                condition,
                skip_target,
            } => match skip_target {
                Some(target) => write!(f, " condition={} skip to {:#06x}", condition, target),
                None => write!(f, " condition={}", condition),
            },
        }
    }
}

pub struct SysCallDispatcher<'a> {
    tables: &'a AuxTables,
    vm: ExpressionVm<'a>,
    normal: NormalDispatcher<'a>,
}

impl<'a> SysCallDispatcher<'a> {
    pub fn new(tables: &'a AuxTables) -> Self {
        SysCallDispatcher {
            tables,
            vm: ExpressionVm::new(tables),
            normal: NormalDispatcher::new(tables),
        }
    }

    pub fn normal(&self) -> &NormalDispatcher<'a> {
        &self.normal
    }

    /// Decode one syscall. `None` once the command segment is exhausted.
    pub fn step(
        &mut self,
        ctx: &mut ParseContext,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<SysCallRecord>, DecodeError> {
        let offset = ctx.cursor();
        let Some(opcode) = ctx.next_byte() else {
            return Ok(None);
        };

        let Some(syscall) = SysCallOpcode::from_byte(opcode) else {
            diagnostics.report(offset, DecodeError::UnhandledOpcode { offset, opcode });
            return Ok(Some(SysCallRecord {
                offset,
                opcode,
                op: SysCallOp::Unhandled,
            }));
        };
        debug!("[SysCall] {:#06x}: {} ({:#04x})", offset, syscall.name(), opcode);

        let op = match syscall {
            SysCallOpcode::Normal => SysCallOp::Normal(self.normal.step(ctx, diagnostics)?),
            SysCallOpcode::PlayAudio => {
                let param = ctx.read_byte()?;
                let id = ctx.read_word()?;
                let value = self.vm.evaluate(ctx, diagnostics)?;
                SysCallOp::PlayAudio { param, id, value }
            }
            SysCallOpcode::AudioOp => {
                let param = ctx.read_byte()?;
                let id = ctx.read_word()?;
                let step = self.normal.step(ctx, diagnostics)?;
                SysCallOp::AudioOp { param, id, step }
            }
            SysCallOpcode::Jump => SysCallOp::Jump {
                target: ctx.read_word()?,
            },
            SysCallOpcode::Switch => SysCallOp::Switch(read_switch(ctx, self.tables)?),
            SysCallOpcode::LoadScenario => {
                let scenario = self.vm.evaluate(ctx, diagnostics)?;
                // Skips zero padding; the first non-zero byte goes with it
                let mut padding = 0;
                while ctx.next_byte() == Some(0) {
                    padding += 1;
                }
                SysCallOp::LoadScenario { scenario, padding }
            }
            SysCallOpcode::Call => {
                let target = self.vm.evaluate(ctx, diagnostics)?;
                let return_address = self.vm.evaluate(ctx, diagnostics)?;
                SysCallOp::Call {
                    target,
                    return_address,
                }
            }
            SysCallOpcode::ConditionalJump => {
                let condition = self.vm.evaluate(ctx, diagnostics)?;
                let target = self.tables.jump_target(condition);
                SysCallOp::ConditionalJump { condition, target }
            }
            SysCallOpcode::Return => SysCallOp::Return,
            SysCallOpcode::CallScenario => {
                let scenario = self.vm.evaluate(ctx, diagnostics)?;
                let return_point = self.vm.evaluate(ctx, diagnostics)?;
                let param = self.vm.evaluate(ctx, diagnostics)?;
                SysCallOp::CallScenario {
                    scenario,
                    return_point,
                    param,
                }
            }
            SysCallOpcode::End => SysCallOp::End,
            SysCallOpcode::ConditionalSkip => {
                let condition = self.vm.evaluate(ctx, diagnostics)?;
                let skip_target = if condition == 0 {
                    Some(ctx.read_word()?)
                } else {
                    None
                };
                SysCallOp::ConditionalSkip {
                    condition,
                    skip_target,
                }
            }
        };

        Ok(Some(SysCallRecord { offset, opcode, op }))
    }

    /// Decode syscalls until the command segment is exhausted, appending to
    /// `records`. On a fatal error the records decoded so far are kept.
    pub fn run(
        &mut self,
        ctx: &mut ParseContext,
        diagnostics: &mut Diagnostics,
        records: &mut Vec<SysCallRecord>,
    ) -> Result<(), DecodeError> {
        while let Some(record) = self.step(ctx, diagnostics)? {
            records.push(record);
        }
        Ok(())
    }
}
