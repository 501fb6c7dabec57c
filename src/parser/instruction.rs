//! Per-instruction walk: runs every parser over a top-level instruction and
//! its inner instructions, consuming one log group per visited instruction.

use crate::block::Instruction;
use crate::events::IndexerEvent;
use crate::logtree::LogGroupCursor;
use crate::protocols::{InstructionView, ProtocolParser, TxContext};

const VOTE_PROGRAM_ID: &str = "Vote111111111111111111111111111111111111111";
const COMPUTE_BUDGET_PROGRAM_ID: &str = "ComputeBudget111111111111111111111111111111";

// The system program is not ignored; it feeds the transfer parsing.
const PROGRAM_IDS_TO_IGNORE: [&str; 2] = [VOTE_PROGRAM_ID, COMPUTE_BUDGET_PROGRAM_ID];

/// Programs whose instructions are never handed to parsers. They still
/// consume their log group so the pairing stays aligned.
pub fn is_ignored_program(program_id: &str) -> bool {
    PROGRAM_IDS_TO_IGNORE.contains(&program_id)
}

fn run_parsers(
    tx: &TxContext<'_>,
    instruction: &Instruction,
    cursor: &LogGroupCursor<'_>,
    parsers: &[Box<dyn ProtocolParser>],
    events: &mut Vec<IndexerEvent>,
) {
    let Some(program_id) = tx.addresses.get(instruction.program_id_index) else {
        tracing::error!(
            signature = tx.signature,
            program_id_index = instruction.program_id_index,
            "instruction program index outside the address table"
        );
        return;
    };
    if is_ignored_program(program_id) {
        return;
    }
    let view = InstructionView {
        instruction,
        program_id,
        log_group: cursor.peek(),
    };
    for parser in parsers {
        events.extend(parser.parse_instruction(tx, &view));
    }
}

/// Walks one top-level instruction and its inner instructions in execution
/// order. Every visited instruction, ignored or not, advances the log-group
/// cursor exactly once.
pub fn walk_instruction(
    tx: &TxContext<'_>,
    instruction: &Instruction,
    instruction_index: usize,
    cursor: &mut LogGroupCursor<'_>,
    parsers: &[Box<dyn ProtocolParser>],
) -> Vec<IndexerEvent> {
    let mut events = Vec::new();

    run_parsers(tx, instruction, cursor, parsers, &mut events);
    cursor.advance();

    // Inner instructions are recorded flat under their top-level index; the
    // log tree's pre-order matches that flat order.
    if let Some(inner_group) = tx.meta.inner_instructions_at(instruction_index) {
        for raw_inner in &inner_group.instructions {
            let inner = raw_inner.normalize();
            run_parsers(tx, &inner, cursor, parsers, &mut events);
            cursor.advance();
        }
    }

    events
}
