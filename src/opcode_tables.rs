//! Static opcode catalogs for the normal and syscall instruction sets.

use std::fmt;

/// How a normal opcode consumes its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalKind {
    /// Nothing beyond the opcode byte.
    EmitOnly,
    /// `n` inline expressions.
    Evaluate(u8),
    /// A text offset word displayed through the string decoder.
    Display { resolve_names: bool },
    /// `n` expressions followed by a text offset word.
    EvaluateThenText(u8),
    /// A text offset word followed by `n` expressions.
    TextThenEvaluate(u8),
    /// A text offset word.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalOpcode {
    pub opcode: u8,
    pub kind: NormalKind,
}

impl NormalOpcode {
    pub fn name(&self) -> NormalName {
        NormalName(self.opcode)
    }
}

/// Mnemonic of a normal opcode, `UNK_0xNN` where none is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalName(pub u8);

impl fmt::Display for NormalName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match get_normal_mnemonic(self.0) {
            Some(name) => f.write_str(name),
            None => write!(f, "UNK_{:#04X}", self.0),
        }
    }
}

/// Names for the normal opcodes whose purpose is known.
fn get_normal_mnemonic(opcode: u8) -> Option<&'static str> {
    match opcode {
        0x00 => Some("STRING_TYPE_0"),
        0x01 => Some("STRING_TYPE_1"),
        0x04 => Some("NEWLINE"),
        0x15 => Some("SHOW_IMAGES"),
        0x1E => Some("SHOW_STANDSTILLS"),
        0x44 => Some("PLAY_WAV"),
        0x48 => Some("PLAY_VOICELINES"),
        0x6E => Some("SCENARIO_VM"),
        0x78 => Some("SET_DELAY"),
        0x8A => Some("PLAY_MPG_VIDEO"),
        0xD7 => Some("GET_CHOICE_HINTS"),
        _ => None,
    }
}

/// Look up a normal opcode. `None` for values outside the catalog.
pub fn normal_opcode(opcode: u8) -> Option<NormalOpcode> {
    use NormalKind::*;

    let kind = match opcode {
        0x00 => Display {
            resolve_names: false,
        },
        0x01 => Display {
            resolve_names: true,
        },

        0x04 | 0x05 | 0x0B | 0x13 | 0x76 | 0x93 | 0xA6 | 0xA8 | 0xB3 | 0xCA | 0xD8 | 0xE2
        | 0xFF => EmitOnly,

        0x02 | 0x10 | 0x12 | 0x15 | 0x17 | 0x18 | 0x32..=0x35 | 0x3D | 0x41 | 0x45 | 0x47
        | 0x4E | 0x4F | 0x58 | 0x5B | 0x5D | 0x5E | 0x61 | 0x71 | 0x72 | 0x78 | 0x79
        | 0x82 | 0x8B..=0x8E | 0x96 | 0xA2 | 0xA9 | 0xAD | 0xD6 | 0xE3 | 0xEE | 0xF0
        | 0xF2 | 0xF6..=0xF8 | 0xFC => Evaluate(1),

        0x0A | 0x1F | 0x28 | 0x30 | 0x38 | 0x3A | 0x44 | 0x48 | 0x60 | 0x66 | 0x7A | 0x95
        | 0x98 | 0xC6 => Evaluate(2),

        0x1E | 0x46 => Evaluate(3),
        0xAC => Evaluate(4),
        0xB4 => Evaluate(9),
        0xF1 => Evaluate(10),

        0x09 | 0x6C => EvaluateThenText(4),
        0x6E => TextThenEvaluate(1),
        0x8A | 0xD7 => Text,

        _ => return None,
    };

    Some(NormalOpcode { opcode, kind })
}

/// Outer instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysCallOpcode {
    Normal,
    PlayAudio,
    AudioOp,
    Jump,
    Switch,
    LoadScenario,
    Call,
    ConditionalJump,
    Return,
    CallScenario,
    End,
    ConditionalSkip,
}

/// Opcodes above this are extended: their table index is `opcode - 12`.
pub const SYSCALL_EXTENDED_BASE: u8 = 0x0B;

impl SysCallOpcode {
    pub fn from_byte(opcode: u8) -> Option<SysCallOpcode> {
        if opcode > SYSCALL_EXTENDED_BASE {
            return match opcode - (SYSCALL_EXTENDED_BASE + 1) {
                0 => Some(SysCallOpcode::ConditionalJump),
                1 => Some(SysCallOpcode::Return),
                4 => Some(SysCallOpcode::CallScenario),
                5 => Some(SysCallOpcode::End),
                6 => Some(SysCallOpcode::ConditionalSkip),
                _ => None,
            };
        }
        match opcode {
            0x00 => Some(SysCallOpcode::Normal),
            0x04 => Some(SysCallOpcode::PlayAudio),
            0x05 => Some(SysCallOpcode::AudioOp),
            0x08 => Some(SysCallOpcode::Jump),
            0x09 => Some(SysCallOpcode::Switch),
            0x0A => Some(SysCallOpcode::LoadScenario),
            0x0B => Some(SysCallOpcode::Call),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SysCallOpcode::Normal => "normal",
            SysCallOpcode::PlayAudio => "play_wav",
            SysCallOpcode::AudioOp => "audio_op",
            SysCallOpcode::Jump => "jump",
            SysCallOpcode::Switch => "switch",
            SysCallOpcode::LoadScenario => "load_scenario",
            SysCallOpcode::Call => "call",
            SysCallOpcode::ConditionalJump => "cond_jump",
            SysCallOpcode::Return => "return",
            SysCallOpcode::CallScenario => "call_scenario",
            SysCallOpcode::End => "end",
            SysCallOpcode::ConditionalSkip => "cond_skip",
        }
    }
}
