//! Static decoder for AIL scenario scripts.
//!
//! A script is a 12-byte header, a skipped command block, the command
//! segment and a Shift_JIS text segment. [`disassembler::Disassembler`] cuts
//! the file into segments and runs the syscall dispatcher over the command
//! segment, which hands inner opcodes to the normal dispatcher. Both share
//! the expression VM and the single cursor in [`context::ParseContext`].

pub mod config;
pub mod container;
pub mod context;
pub mod disassembler;
pub mod error;
pub mod expression;
pub mod header;
pub mod normal;
pub mod opcode_tables;
pub mod syscall;
pub mod tables;
pub mod text;


pub use disassembler::{DecodeReport, Disassembler};
pub use error::{DecodeError, Severity};
