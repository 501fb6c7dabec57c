//! Block, transaction and instruction walkers. The walkers own the pairing
//! between the instruction tree and the flat log-group sequence; protocol
//! parsers only ever see their matched group.

mod block;
mod instruction;
mod transaction;

pub use block::{parse_block, ParsedBlock};
pub use instruction::{is_ignored_program, walk_instruction};
pub use transaction::parse_transaction;
