//! Block-level entry point.

use std::time::{Duration, Instant};

use crate::block::RawBlock;
use crate::events::IndexerEvent;
use crate::protocols::ProtocolParser;

use super::transaction::parse_transaction;

/// All events of one block, in transaction order, plus how long parsing
/// took.
#[derive(Debug)]
pub struct ParsedBlock {
    pub events: Vec<IndexerEvent>,
    pub elapsed: Duration,
}

pub fn parse_block(
    slot: u64,
    block: &RawBlock,
    parsers: &[Box<dyn ProtocolParser>],
) -> ParsedBlock {
    let begin = Instant::now();

    let mut events = Vec::new();
    for transaction in &block.transactions {
        events.extend(parse_transaction(slot, block.block_time, transaction, parsers));
    }

    ParsedBlock {
        events,
        elapsed: begin.elapsed(),
    }
}
