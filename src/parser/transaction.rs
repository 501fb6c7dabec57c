//! Per-transaction walk: builds the unified address table, reconstructs the
//! log groups, runs the transaction hooks, then walks the instructions.

use crate::block::TransactionWithMeta;
use crate::events::IndexerEvent;
use crate::logtree::{parse_transaction_logs, LogGroupCursor};
use crate::protocols::{ProtocolParser, TxContext};

use super::instruction::walk_instruction;

pub fn parse_transaction(
    slot: u64,
    block_time: Option<i64>,
    transaction: &TransactionWithMeta,
    parsers: &[Box<dyn ProtocolParser>],
) -> Vec<IndexerEvent> {
    let addresses = transaction.address_table();
    let tx = TxContext {
        slot,
        block_time,
        signature: transaction.signature(),
        meta: &transaction.meta,
        addresses: &addresses,
        failed: transaction.failed(),
    };

    let log_groups = parse_transaction_logs(transaction);

    let mut events = Vec::new();
    for parser in parsers {
        events.extend(parser.parse_transaction(&tx, &log_groups));
    }

    let mut cursor = LogGroupCursor::new(&log_groups);
    for (index, raw) in transaction.transaction.message.raw_instructions().iter().enumerate() {
        let instruction = raw.normalize();
        events.extend(walk_instruction(&tx, &instruction, index, &mut cursor, parsers));
    }

    if cursor.remaining() > 0 {
        tracing::error!(
            signature = tx.signature,
            remaining = cursor.remaining(),
            "log groups left unconsumed after the instruction walk"
        );
    }

    events
}
